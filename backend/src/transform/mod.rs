//! Transformation module.
//!
//! This module turns a loaded statement into claim records:
//! - Resolver: semantic roles for statement columns
//! - Cleaner: amount coercion and description scrubbing
//! - Grouper: per-employee partition and schema projection
//! - Schema: the destination claim layout
//! - Pipeline: the end-to-end conversion

pub mod cleaner;
pub mod grouper;
pub mod pipeline;
pub mod resolver;
pub mod schema;

pub use cleaner::{clean, parse_amount, scrub_digits};
pub use grouper::{partition, project, Partition};
pub use pipeline::*;
pub use resolver::{is_header_row, resolve};
pub use schema::{ClaimField, ClaimSchema, FieldSource};
