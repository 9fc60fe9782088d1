pub mod loaders;
pub mod question;
pub mod raw;
pub mod strategy;
pub mod validation;

pub use loaders::{load_all_documents, load_raw_document};
pub use question::{Context, Diagram, DiagramKind, StructuredQuestion, SubQuestion};
pub use raw::{RawDocument, RawQuestion};
pub use strategy::ExtractionStrategy;
pub use validation::{validate_document, validate_points, validate_question, TOTAL_POINTS};
