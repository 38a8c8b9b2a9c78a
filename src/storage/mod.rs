pub mod engine;
pub mod memory;

pub use engine::{EntityStore, StoredRecord, load_record, write_record};
pub use memory::InMemoryEntityStore;
