pub mod document_store_errors;
pub mod local_store_errors;
