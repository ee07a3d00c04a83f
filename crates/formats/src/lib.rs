pub mod boundary;
pub mod config;
pub mod error;
pub mod export;
pub mod occurrence;

pub use boundary::*;
pub use config::*;
pub use error::*;
pub use occurrence::*;
