pub mod classroom_repository;
pub mod document_store;
pub mod dynamo_document_store;
pub mod errors;
pub mod local_store;
