//! CLI command handlers, one file per command.

mod checksum;
mod fetch;
mod plan;
mod serve;

pub use checksum::run_checksum;
pub use fetch::run_fetch;
pub use plan::run_plan;
pub use serve::run_serve;
