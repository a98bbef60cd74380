//! CLI command implementations

pub mod calibrate;
pub mod check;
pub mod discover;
pub mod exec;
pub mod list;
pub mod logs;
pub mod run;
pub mod timer;
