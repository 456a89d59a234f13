pub mod db;
pub mod embedding_cache;
pub mod store;
pub mod types;
