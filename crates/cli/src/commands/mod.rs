//! Command handlers for the llamaserve CLI.

pub mod index;
pub mod loadtest;
pub mod serve;

pub use index::IndexCommand;
pub use loadtest::LoadTestCommand;
pub use serve::ServeCommand;
