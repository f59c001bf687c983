//! Core trait abstractions for the scraping library.
//!
//! These traits define the seams to external collaborators: the browser,
//! model endpoints, robots retrieval, and storage.

pub mod ai;
pub mod browser;
pub mod robots;
pub mod store;
