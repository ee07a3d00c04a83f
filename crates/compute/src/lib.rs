pub mod analysis;
pub mod cleaner;
pub mod dashboard;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod records;

pub use analysis::*;
pub use cleaner::*;
pub use dashboard::*;
pub use error::*;
pub use filter::*;
pub use metrics::*;
pub use records::*;
