//! Core domain types for the Tradepilot system.

pub mod decision;
pub mod incident;
pub mod model;
pub mod trade;

pub use decision::*;
pub use incident::*;
pub use model::*;
pub use trade::*;
