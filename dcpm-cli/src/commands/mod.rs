//! Command implementations for the dcpm CLI

pub mod check;
pub mod serve;

pub use check::run_check;
pub use serve::run_serve;
