//! Supervisor module: process lifecycle, shutdown and event delivery.

mod error;
mod runner;
mod shutdown;
mod sink;
mod state;

pub use error::*;
pub use runner::*;
pub use shutdown::*;
pub use sink::*;
pub use state::*;
