//! Core data types for the scraping library.

pub mod config;
pub mod job;
pub mod layout;
pub mod policy;
pub mod record;
pub mod request;
pub mod summary;
