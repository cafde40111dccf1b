//! Core types and trait definitions for itemstore.
//!
//! A table stores items of one [`Record`] shape with revision-checked
//! create/read/update/delete and unique secondary indexes. This crate holds
//! the contract and the pieces every backend shares; it has no storage
//! dependencies of its own.

pub mod database;
pub mod error;
pub mod identifier;
pub mod index;
pub mod item;
pub mod key;
pub mod occ;
pub mod record;
pub mod revision;
pub mod table;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use database::{Backend, Database};
pub use error::{BackendContext, Error, Result};
pub use index::Index;
pub use item::{Item, TableRef};
pub use key::Key;
pub use record::{Field, FieldKind, FieldValue, Record, Schema};
pub use revision::Revision;
pub use table::{AnyTable, Table};
