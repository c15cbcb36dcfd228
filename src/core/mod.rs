pub mod config;
pub mod error;
pub mod ledger;


pub use config::*;
pub use error::*;
pub use ledger::*;
