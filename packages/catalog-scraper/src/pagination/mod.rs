//! Pagination: the per-job collection loop and its two strategies.
//!
//! - Click: find a "next" control, click it, wait for the first item to change.
//! - Scroll: scroll to the bottom until the document stops growing.

pub mod click;
mod driver;
pub mod scroll;

pub use driver::{Collection, Interrupted, PaginationDriver, ProgressSender, StopReason};
