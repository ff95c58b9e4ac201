pub mod bm25;
pub mod hybrid;
pub mod registry;
pub mod retriever;
pub mod semantic;
pub mod tokenizer;
pub mod vector;
