//! Storage implementations for scrape jobs and their results.
//!
//! Available backends:
//! - `MemoryStore` - In-memory storage (always available)

pub mod memory;

pub use memory::MemoryStore;
