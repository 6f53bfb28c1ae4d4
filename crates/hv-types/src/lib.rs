//! # hv-types
//!
//! Core types shared across the Hive distributed-search workspace: parameter
//! space definitions, evaluation records, and the error taxonomy.

pub mod errors;
pub mod record;
pub mod space;

pub use errors::*;
pub use record::*;
pub use space::*;
