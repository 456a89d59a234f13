pub mod indexer;
pub mod publisher;
pub mod spreadsheet;

pub use indexer::TabularIngestor;
