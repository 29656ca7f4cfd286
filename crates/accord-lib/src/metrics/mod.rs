pub mod matching;
pub mod rate;

pub use matching::*;
pub use rate::*;
