//! Text generator implementations.

pub mod openai;

pub use openai::OpenAiTextGenerator;
