pub mod client;

pub use client::{GeminiClient, GenerationClient};
