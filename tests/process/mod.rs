//! Process module tests.

mod handle_test;
mod pump_test;
