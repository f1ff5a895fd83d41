//! Client for OpenAI compatible chat completion APIs.
mod core;
pub mod sse;
pub use self::core::*;
