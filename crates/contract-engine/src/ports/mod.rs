//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions between the engine and the outside world.
//!
//! - **Driving Ports (Inbound)**: `ContractEngineApi`
//! - **Driven Ports (Outbound)**: `StorageView`, `ContractStore`
//! - No concrete implementations in this module

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
