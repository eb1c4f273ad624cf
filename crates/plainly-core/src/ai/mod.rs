pub mod cohere;

pub use cohere::{parse_generation, CohereClient};

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::message::{GenerationResult, PageData};

/// Operations the background router needs from a text-generation backend.
#[async_trait]
pub trait TextGateway: Send + Sync {
    /// Minimal request with `api_key`; succeeds iff the status is 2xx.
    async fn test_connection(&self, api_key: &str) -> Result<(), GatewayError>;

    /// Summarize `page` using the stored credential.
    async fn summarize(&self, page: &PageData) -> Result<GenerationResult, GatewayError>;

    /// A single simpler alternative for `text`.
    async fn simplify_phrase(&self, api_key: &str, text: &str) -> Result<String, GatewayError>;
}
