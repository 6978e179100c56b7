pub mod collection_cache;
pub mod indexing;
pub mod store;

pub use collection_cache::{CollectionConfig, CollectionConfigCache};
pub use store::{DocumentRef, DocumentStore};
