pub mod spatial;
pub mod species;
pub mod statistics;

pub use spatial::*;
pub use species::*;
pub use statistics::*;
