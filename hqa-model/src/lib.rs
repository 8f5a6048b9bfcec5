//! # hqa-model
//!
//! Chat provider strategies for the hybrid QA pipeline.
//!
//! ## Overview
//!
//! Every backend implements [`ChatModel::generate_response`], which turns an
//! ordered list of `{role, content}` messages into a single answer string:
//!
//! - [`AzureOpenAIChat`] - an Azure OpenAI deployment (`azure_openai`)
//! - [`OpenAIChat`] - OpenAI or any OpenAI-compatible server (`openai`)
//! - [`CohereChat`] - Cohere's hosted chat API (`cohere`)
//! - [`MockChatModel`] - scripted replies for tests
//!
//! Backends are selected by a [`ProviderKind`] discriminator plus a model id
//! through a [`ProviderFactory`]. Parsing an unknown discriminator fails with
//! [`ModelError::UnsupportedProvider`] before anything touches the network.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hqa_model::{ChatMessage, ChatModel, EnvProviderFactory, ProviderCredentials, ProviderFactory};
//!
//! let factory = EnvProviderFactory::new(ProviderCredentials::default())?;
//! let model = factory.create("cohere".parse()?, "command-r-plus-08-2024")?;
//! let answer = model
//!     .generate_response(&[ChatMessage::user("What is the capital of France?")])
//!     .await?;
//! ```

pub mod cohere;
pub mod config;
pub mod error;
pub mod message;
pub mod mock;
pub mod openai;
pub mod provider;

pub use cohere::CohereChat;
pub use config::{AzureSettings, CohereSettings, OpenAISettings, ProviderCredentials};
pub use error::{FailureKind, ModelError, Result};
pub use message::{ChatMessage, ProviderRequest, Role};
pub use mock::{MockChatModel, MockProviderFactory};
pub use openai::{AzureOpenAIChat, OpenAIChat};
pub use provider::{ChatModel, ChatProvider, EnvProviderFactory, ProviderFactory, ProviderKind};
