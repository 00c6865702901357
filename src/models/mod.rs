//! Message envelope models.

pub use address::*;
pub use message::*;
pub use state_init::*;

pub mod address;
pub mod message;
pub mod state_init;
