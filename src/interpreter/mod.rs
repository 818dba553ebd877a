//! Interpreter discovery.

mod locator;

pub use locator::*;
