//! Adapters layer (Hexagonal Architecture)

mod clock;
mod signature;
mod subscriber;

pub use clock::*;
pub use signature::*;
pub use subscriber::*;
