pub mod controller;
pub mod frame;
pub mod snapshot;
pub mod source;

#[cfg(test)]
pub mod testing;

pub use controller::*;
pub use frame::*;
pub use snapshot::*;
pub use source::*;
