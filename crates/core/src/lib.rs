//! Core domain types for the blockgate block metadata filters.
//!
//! This crate defines the data model shared by the other crates:
//! - Block identifiers and block metadata
//! - Deletion mark documents
//! - Clock sources
//! - Configuration

pub mod block;
pub mod clock;
pub mod config;
pub mod deletion_mark;
pub mod error;

pub use block::{BlockId, BlockMeta, WorkingSet};
pub use clock::{Clock, FixedClock, SystemClock};
pub use deletion_mark::{DELETION_MARK_FILENAME, DELETION_MARK_VERSION_1, DeletionMark};
pub use error::{Error, Result};
