//! Lucia Launcher - supervises a long-running bot process and streams its log output.

pub mod config;
pub mod display;
pub mod interpreter;
pub mod launcher;
pub mod log;
pub mod process;
pub mod supervisor;
