//! citemill-common: shared errors, record models, and the capped HTTP
//! client used across all Citemill crates.

pub mod error;
pub mod net;
pub mod works;

// Re-export commonly used types
pub use error::{CitemillError, Result};
pub use works::{FlatRow, RawWork};
