pub mod document_loader;

pub use document_loader::{document_id, load_all_documents, load_raw_document};
