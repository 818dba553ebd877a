//! Log line model and classification.

mod classify;
mod line;

pub use classify::*;
pub use line::*;
