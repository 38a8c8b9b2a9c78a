pub mod error;
pub mod types;

pub use error::{RegistryError, Result};
pub use types::{EntityKind, EntityStatus, RecordMeta, RelationStatus};
