//! Coinset Common Types
//!
//! Shared types used across coinset: coin identifiers, the coin entity
//! and its inputs, minor-unit helpers and the error taxonomy.

pub mod coin;
pub mod error;
pub mod identifiers;
pub mod monetary;

pub use coin::*;
pub use error::*;
pub use identifiers::*;
pub use monetary::*;
