pub mod extractor;
pub mod fragment_merger;
pub mod llm_service;
pub mod output_writer;
pub mod point_allocator;
pub mod prompts;
pub mod rate_limit;
pub mod response_decoder;

pub use extractor::{ExtractionBackend, ExtractionRequest, MockBackend};
pub use fragment_merger::merge;
pub use llm_service::LlmExtractor;
pub use output_writer::OutputWriter;
pub use point_allocator::{allocate, allocate_in_place};
pub use rate_limit::{CallPacer, RateLimitPolicy};
