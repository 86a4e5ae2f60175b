pub mod check;
pub mod common;
pub mod completions;
pub mod config;
pub mod lock;
pub mod records;
pub mod status;
pub mod sync;
pub mod watch;
