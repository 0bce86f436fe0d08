//! OpenAI-compatible API client.
//!
//! One wire protocol covers every provider the pipeline talks to
//! (OpenRouter, OpenAI, Nvidia, Voyage): chat completions, JSON-schema
//! structured output, and embeddings. Components depend on the
//! [`ChatAgent`] / [`EmbedAgent`] traits so tests can swap in mocks.

pub mod openai;
pub mod schema;
pub mod traits;
pub mod util;

pub use openai::OpenAi;
pub use schema::StructuredOutput;
pub use traits::{ChatAgent, EmbedAgent};
