//! Type definitions

pub mod coordinates;
pub mod messages;
pub mod trip;

pub use coordinates::*;
pub use messages::*;
pub use trip::*;
