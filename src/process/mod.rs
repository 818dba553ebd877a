//! Bot process spawning and output pumping.

mod handle;
mod pump;

pub use handle::*;
pub use pump::*;
