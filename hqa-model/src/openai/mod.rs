//! OpenAI-compatible chat backends.
//!
//! Both [`AzureOpenAIChat`] and [`OpenAIChat`] speak the chat-completions
//! protocol through `async-openai`; they differ only in how the endpoint is
//! addressed. Azure routes by deployment id, which is passed in explicitly
//! rather than recovered from the client's base URL.

mod client;
mod convert;

pub use client::{AzureOpenAIChat, OpenAIChat};
