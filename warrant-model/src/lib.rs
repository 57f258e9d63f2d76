//! Core entry model for Warrant.
//!
//! Defines the types every Warrant subsystem operates on:
//! - [`Entry`]: the permission-bearing record for one resource instance
//! - [`Grants`]: the eight {admin,read,write,execute} × {users,groups} lists
//! - [`KindSchema`]: per-kind indexed fields, backend mapping and initial group rights
//! - [`Selection`]: caller-supplied boolean filter tree over entry fields
//! - [`Identity`]: the resolved caller (user id plus group memberships)
//! - [`EntryHandler`]: optional per-kind validation and post-load hooks
//!
//! Features and annotations are generic ordered JSON documents; their shape
//! is driven by configuration, not by this crate.

mod entry;
mod handler;
mod identity;
mod schema;
mod selection;

pub use entry::{Entry, Grants};
pub use handler::EntryHandler;
pub use identity::Identity;
pub use schema::{FieldType, IndexedField, KindSchema};
pub use selection::{Condition, IdentityRef, Operator, Selection};
