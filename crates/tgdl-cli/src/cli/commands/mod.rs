//! CLI command handlers, one file per command.

mod cancel;
mod clear;
mod files;
mod get;
mod list;
mod retry;
mod sources;
mod status;

pub use cancel::run_cancel;
pub use clear::run_clear;
pub use files::run_files;
pub use get::{run_get, GetOptions};
#[cfg(test)]
pub(crate) use get::progress_line;
pub use list::run_list;
pub use retry::run_retry;
pub use sources::run_sources;
pub use status::run_status;
#[cfg(test)]
pub(crate) use status::detail;
