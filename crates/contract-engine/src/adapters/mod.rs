//! # Adapters Layer (Outer Hexagon)
//!
//! Concrete implementations of the ports.
//!
//! - `state_adapter.rs` - In-memory `ContractStore`
//! - `event_handler.rs` - Inbound transaction events to `ContractEngineApi`

pub mod event_handler;
pub mod state_adapter;

pub use event_handler::*;
pub use state_adapter::*;
