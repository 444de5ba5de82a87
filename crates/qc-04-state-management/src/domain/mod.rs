pub mod checksum;
pub mod diff_engine;
pub mod errors;
pub mod sets;

pub use checksum::*;
pub use diff_engine::*;
pub use errors::*;
pub use sets::*;
