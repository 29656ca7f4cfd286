pub mod error;
pub mod intervals;
pub mod io;
pub mod lag;
pub mod metrics;
pub mod pipeline;
pub mod signal;

pub use error::{Error, Result};
pub use intervals::*;
pub use lag::*;
pub use metrics::*;
pub use pipeline::*;
pub use signal::*;
