//! # Domain Layer (Inner Hexagon)
//!
//! Pure types and functions for contract execution.
//! No I/O, no async.
//!
//! - Dependencies point inward only: adapters and the service depend on this
//!   layer, never the reverse.

pub mod entities;
pub mod invariants;
pub mod services;
pub mod value_objects;

pub use entities::*;
pub use invariants::*;
pub use services::*;
pub use value_objects::*;
