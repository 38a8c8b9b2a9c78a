pub mod catalog;
pub mod organization;
pub mod record;
pub mod user;

pub use catalog::{DatabaseServer, Extension, GlobalPrivilege};
pub use organization::{ExtensionAttachment, Organization};
pub use record::{Changes, CycleSnapshot, Record, apply_changes};
pub use user::{OrganizationMembership, User};
