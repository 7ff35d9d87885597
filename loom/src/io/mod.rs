//! I/O helpers for loom commands.

pub mod assistant;
pub mod config;
pub mod decisions;
pub mod input;
pub mod paths;
pub mod process;
pub mod prompt;
pub mod render;
pub mod state_store;
