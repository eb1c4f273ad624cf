use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info};

use super::TextGateway;
use crate::config::{Config, DEFAULT_API_URL, DEFAULT_MODEL};
use crate::error::GatewayError;
use crate::message::{GenerationResult, PageData};
use crate::settings::SettingsStore;

pub const NO_SUMMARY: &str = "No summary generated";
pub const NO_SIMPLIFIED: &str = "No simplified version generated";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct Generation {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    generations: Vec<Generation>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Clone)]
pub struct CohereClient {
    client: Client,
    api_url: String,
    model: String,
    settings: Arc<dyn SettingsStore>,
}

impl CohereClient {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self::with_url(settings, DEFAULT_API_URL)
    }

    /// Point the client at a different generate endpoint.
    pub fn with_url(settings: Arc<dyn SettingsStore>, api_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.to_string(),
            model: DEFAULT_MODEL.to_string(),
            settings,
        }
    }

    pub fn with_config(settings: Arc<dyn SettingsStore>, config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            ..Self::with_url(settings, &config.api_url)
        }
    }

    fn build_request(&self, prompt: String, max_tokens: u32, temperature: Option<f32>) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt,
            max_tokens,
            temperature,
        }
    }

    async fn send_request(&self, api_key: &str, request: &GenerateRequest) -> Result<Response, GatewayError> {
        self.client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))
    }

    async fn first_generation(response: Response) -> Result<String, GatewayError> {
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))?;

        body.generations
            .into_iter()
            .next()
            .map(|g| g.text)
            .ok_or(GatewayError::EmptyResponse)
    }
}

/// Build a `Connection` error from the upstream `message` field, falling back
/// to the status text.
async fn upstream_error(response: Response) -> GatewayError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status_text(status));

    GatewayError::Connection(message)
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

fn summary_prompt(page: &PageData) -> String {
    format!(
        "Webpage Title: {title}

Content: {content}

Based on the above content, please provide:
1. A comprehensive summary of the main points
2. A simplified version that's easy to understand (use simple language)

Format your response as follows:
SUMMARY:
[Your comprehensive summary here]

SIMPLIFIED:
[Your simplified version here]",
        title = page.title,
        content = page.content,
    )
}

fn phrase_prompt(text: &str) -> String {
    format!(
        "Provide a simpler alternative for the word or phrase: \"{}\". Reply with only the simplified word or short phrase.",
        text
    )
}

fn summary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)SUMMARY:\s*(.*?)(?:SIMPLIFIED:|\z)").expect("summary regex"))
}

fn simplified_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)SIMPLIFIED:\s*(.*)\z").expect("simplified regex"))
}

/// Split a completion into its `SUMMARY:` and `SIMPLIFIED:` sections.
///
/// Never fails: a missing section becomes placeholder text.
pub fn parse_generation(text: &str) -> GenerationResult {
    let capture = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
    };

    GenerationResult {
        summary: capture(summary_regex()).unwrap_or_else(|| NO_SUMMARY.to_string()),
        simplified: capture(simplified_regex()).unwrap_or_else(|| NO_SIMPLIFIED.to_string()),
    }
}

#[async_trait]
impl TextGateway for CohereClient {
    async fn test_connection(&self, api_key: &str) -> Result<(), GatewayError> {
        let request = self.build_request("Hello".to_string(), 5, None);
        let response = self.send_request(api_key, &request).await?;

        if !response.status().is_success() {
            return Err(upstream_error(response).await);
        }

        Ok(())
    }

    async fn summarize(&self, page: &PageData) -> Result<GenerationResult, GatewayError> {
        info!(title = %page.title, "Fetching AI summary");

        let api_key = self
            .settings
            .api_key()
            .await
            .map_err(|e| GatewayError::Settings(e.to_string()))?
            .ok_or(GatewayError::MissingApiKey)?;

        let request = self.build_request(summary_prompt(page), 1000, Some(0.7));
        let response = self.send_request(&api_key, &request).await?;

        if !response.status().is_success() {
            let err = upstream_error(response).await;
            error!("Summary request failed: {}", err);
            return Err(err);
        }

        let text = Self::first_generation(response).await?;
        debug!(chars = text.len(), "Summary completion received");
        Ok(parse_generation(&text))
    }

    async fn simplify_phrase(&self, api_key: &str, text: &str) -> Result<String, GatewayError> {
        let request = self.build_request(phrase_prompt(text), 50, Some(0.3));
        let response = self.send_request(api_key, &request).await?;

        if !response.status().is_success() {
            return Err(GatewayError::Status(response.status().as_u16()));
        }

        let text = Self::first_generation(response).await?;
        Ok(text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;

    fn client() -> CohereClient {
        CohereClient::new(Arc::new(MemorySettings::new()))
    }

    #[test]
    fn test_parse_both_sections() {
        let result = parse_generation("SUMMARY:\nA.\nSIMPLIFIED:\nB.");
        assert_eq!(result.summary, "A.");
        assert_eq!(result.simplified, "B.");
    }

    #[test]
    fn test_parse_neither_section() {
        let result = parse_generation("The model ignored the format entirely.");
        assert_eq!(result.summary, NO_SUMMARY);
        assert_eq!(result.simplified, NO_SIMPLIFIED);
    }

    #[test]
    fn test_parse_summary_only_runs_to_end() {
        let result = parse_generation("Intro\nSUMMARY:  Line one.\nLine two.\n");
        assert_eq!(result.summary, "Line one.\nLine two.");
        assert_eq!(result.simplified, NO_SIMPLIFIED);
    }

    #[test]
    fn test_parse_simplified_only() {
        let result = parse_generation("SIMPLIFIED: short words");
        assert_eq!(result.summary, NO_SUMMARY);
        assert_eq!(result.simplified, "short words");
    }

    #[test]
    fn test_parse_multiline_sections() {
        let text = "SUMMARY:\n- point one\n- point two\n\nSIMPLIFIED:\nIt is about two things.\nThat's all.\n";
        let result = parse_generation(text);
        assert_eq!(result.summary, "- point one\n- point two");
        assert_eq!(result.simplified, "It is about two things.\nThat's all.");
    }

    #[test]
    fn test_summary_prompt_embeds_page() {
        let prompt = summary_prompt(&PageData {
            title: "Rust".to_string(),
            content: "Ownership rules.".to_string(),
        });
        assert!(prompt.starts_with("Webpage Title: Rust"));
        assert!(prompt.contains("Content: Ownership rules."));
        assert!(prompt.contains("SUMMARY:"));
        assert!(prompt.contains("SIMPLIFIED:"));
    }

    #[test]
    fn test_phrase_prompt_quotes_text() {
        let prompt = phrase_prompt("ubiquitous");
        assert!(prompt.contains("\"ubiquitous\""));
        assert!(prompt.ends_with("Reply with only the simplified word or short phrase."));
    }

    #[test]
    fn test_build_request_omits_missing_temperature() {
        let request = client().build_request("Hello".to_string(), 5, None);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, serde_json::json!({ "model": "command", "prompt": "Hello", "max_tokens": 5 }));
    }

    #[test]
    fn test_with_config_uses_model_and_url() {
        let config = Config {
            api_url: "http://localhost:1234/generate".to_string(),
            model: "command-light".to_string(),
            ..Config::default()
        };
        let client = CohereClient::with_config(Arc::new(MemorySettings::new()), &config);
        assert_eq!(client.api_url, "http://localhost:1234/generate");
        assert_eq!(client.model, "command-light");
    }

    // Wiremock-based tests for actual HTTP calls
    mod http_tests {
        use super::*;
        use serde_json::json;
        use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

        fn generations(text: &str) -> serde_json::Value {
            json!({ "id": "gen-1", "generations": [{ "id": "g-1", "text": text }] })
        }

        fn client_for(server: &MockServer, settings: MemorySettings) -> CohereClient {
            CohereClient::with_url(Arc::new(settings), &format!("{}/v1/generate", server.uri()))
        }

        #[tokio::test]
        async fn test_summarize_success() {
            let server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .and(matchers::path("/v1/generate"))
                .and(matchers::header("Authorization", "Bearer co-key"))
                .and(matchers::header("Accept", "application/json"))
                .and(matchers::body_partial_json(json!({
                    "model": "command",
                    "max_tokens": 1000,
                    "temperature": 0.7
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(generations("SUMMARY:\nA.\nSIMPLIFIED:\nB.")))
                .expect(1)
                .mount(&server)
                .await;

            let client = client_for(&server, MemorySettings::with_api_key("co-key"));
            let page = PageData {
                title: "User Input".to_string(),
                content: "hello".to_string(),
            };

            let result = client.summarize(&page).await.unwrap();
            assert_eq!(result.summary, "A.");
            assert_eq!(result.simplified, "B.");
        }

        #[tokio::test]
        async fn test_summarize_is_repeatable() {
            let server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(generations("SUMMARY: x SIMPLIFIED: y")))
                .expect(2)
                .mount(&server)
                .await;

            let client = client_for(&server, MemorySettings::with_api_key("co-key"));
            let page = PageData {
                title: "T".to_string(),
                content: "C".to_string(),
            };

            let first = client.summarize(&page).await.unwrap();
            let second = client.summarize(&page).await.unwrap();
            assert_eq!(first, second);
        }

        #[tokio::test]
        async fn test_summarize_without_key_makes_no_request() {
            let server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&server)
                .await;

            let client = client_for(&server, MemorySettings::new());
            let page = PageData {
                title: "T".to_string(),
                content: "C".to_string(),
            };

            let err = client.summarize(&page).await.unwrap_err();
            assert!(matches!(err, GatewayError::MissingApiKey));
        }

        #[tokio::test]
        async fn test_summarize_upstream_message() {
            let server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "invalid api token" })))
                .mount(&server)
                .await;

            let client = client_for(&server, MemorySettings::with_api_key("bad"));
            let page = PageData {
                title: "T".to_string(),
                content: "C".to_string(),
            };

            let err = client.summarize(&page).await.unwrap_err();
            assert_eq!(err.to_string(), "API request failed: invalid api token");
        }

        #[tokio::test]
        async fn test_summarize_non_json_error_uses_status_text() {
            let server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
                .expect(1)
                .mount(&server)
                .await;

            let client = client_for(&server, MemorySettings::with_api_key("co-key"));
            let page = PageData {
                title: "T".to_string(),
                content: "C".to_string(),
            };

            let err = client.summarize(&page).await.unwrap_err();
            assert_eq!(err.to_string(), "API request failed: Bad Gateway");
        }

        #[tokio::test]
        async fn test_summarize_empty_generations() {
            let server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "generations": [] })))
                .mount(&server)
                .await;

            let client = client_for(&server, MemorySettings::with_api_key("co-key"));
            let page = PageData {
                title: "T".to_string(),
                content: "C".to_string(),
            };

            let err = client.summarize(&page).await.unwrap_err();
            assert!(matches!(err, GatewayError::EmptyResponse));
        }

        #[tokio::test]
        async fn test_connection_success() {
            let server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .and(matchers::header("Authorization", "Bearer co-key"))
                .and(matchers::body_json(json!({ "model": "command", "prompt": "Hello", "max_tokens": 5 })))
                .respond_with(ResponseTemplate::new(200).set_body_json(generations(" Hi")))
                .expect(1)
                .mount(&server)
                .await;

            let client = client_for(&server, MemorySettings::new());
            assert!(client.test_connection("co-key").await.is_ok());
        }

        #[tokio::test]
        async fn test_connection_unauthorized() {
            let server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "invalid api token" })))
                .mount(&server)
                .await;

            let client = client_for(&server, MemorySettings::new());
            let err = client.test_connection("well-formed-but-wrong").await.unwrap_err();
            assert!(err.to_string().contains("invalid api token"));
        }

        #[tokio::test]
        async fn test_connection_falls_back_to_status_text() {
            let server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
                .mount(&server)
                .await;

            let client = client_for(&server, MemorySettings::new());
            let err = client.test_connection("co-key").await.unwrap_err();
            assert_eq!(err.to_string(), "API request failed: Internal Server Error");
        }

        #[tokio::test]
        async fn test_simplify_phrase_trims() {
            let server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .and(matchers::body_partial_json(json!({ "max_tokens": 50, "temperature": 0.3 })))
                .respond_with(ResponseTemplate::new(200).set_body_json(generations("\n  everywhere \n")))
                .expect(1)
                .mount(&server)
                .await;

            let client = client_for(&server, MemorySettings::new());
            let word = client.simplify_phrase("co-key", "ubiquitous").await.unwrap();
            assert_eq!(word, "everywhere");
        }

        #[tokio::test]
        async fn test_simplify_phrase_reports_status_only() {
            let server = MockServer::start().await;

            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(429).set_body_json(json!({ "message": "slow down" })))
                .mount(&server)
                .await;

            let client = client_for(&server, MemorySettings::new());
            let err = client.simplify_phrase("co-key", "ubiquitous").await.unwrap_err();
            assert_eq!(err.to_string(), "API request failed with status 429");
        }

        #[tokio::test]
        async fn test_network_failure() {
            let client = CohereClient::with_url(Arc::new(MemorySettings::new()), "http://127.0.0.1:1/v1/generate");
            let err = client.test_connection("co-key").await.unwrap_err();
            assert!(matches!(err, GatewayError::Network(_)));
        }
    }
}
