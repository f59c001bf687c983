//! Real browser backends.

pub mod chromium;

pub use chromium::{ChromiumLauncher, ChromiumSession};
