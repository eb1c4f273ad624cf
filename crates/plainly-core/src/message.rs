//! Wire types exchanged between the background, content, and popup contexts
//!
//! This module contains the message shapes that travel over the bus. They
//! serialize to the same JSON the extension contexts exchange, so a host can
//! forward them verbatim.

use serde::{Deserialize, Serialize};

/// Page text submitted for summarization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageData {
    pub title: String,
    pub content: String,
}

/// Parsed two-section answer from the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub summary: String,
    pub simplified: String,
}

/// A request sent over the bus. The `action` tag selects the handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ActionMessage {
    #[serde(rename = "generateVisual")]
    GenerateVisual,
    #[serde(rename = "createPPT")]
    CreatePpt,
    #[serde(rename = "getAISummary")]
    GetAiSummary { data: PageData },
    #[serde(rename = "testApiConnection")]
    TestApiConnection {
        #[serde(rename = "apiKey")]
        api_key: String,
    },
    #[serde(rename = "replaceWord")]
    ReplaceWord {
        #[serde(rename = "simplifiedWord")]
        simplified_word: String,
        /// Text that was selected when the request was issued.
        #[serde(rename = "originalText", default, skip_serializing_if = "Option::is_none")]
        original_text: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl ActionMessage {
    pub fn action(&self) -> &'static str {
        match self {
            ActionMessage::GenerateVisual => "generateVisual",
            ActionMessage::CreatePpt => "createPPT",
            ActionMessage::GetAiSummary { .. } => "getAISummary",
            ActionMessage::TestApiConnection { .. } => "testApiConnection",
            ActionMessage::ReplaceWord { .. } => "replaceWord",
            ActionMessage::Unknown => "unknown",
        }
    }

    pub fn summarize(title: &str, content: &str) -> Self {
        ActionMessage::GetAiSummary {
            data: PageData {
                title: title.to_string(),
                content: content.to_string(),
            },
        }
    }

    pub fn replace_word(simplified_word: &str, original_text: Option<&str>) -> Self {
        ActionMessage::ReplaceWord {
            simplified_word: simplified_word.to_string(),
            original_text: original_text.map(str::to_string),
        }
    }
}

/// Reply to an `ActionMessage`. `success` is the discriminant; which of the
/// other fields are present depends on the originating action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simplified: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn summary(result: GenerationResult) -> Self {
        Self {
            success: true,
            summary: Some(result.summary),
            simplified: Some(result.simplified),
            ..Self::default()
        }
    }

    pub fn connected() -> Self {
        Self {
            success: true,
            message: Some("API connection successful".to_string()),
            ..Self::default()
        }
    }

    pub fn acknowledged(status: &str) -> Self {
        Self {
            success: true,
            status: Some(status.to_string()),
            ..Self::default()
        }
    }

    /// Error text for a failed or missing reply.
    pub fn describe_error(response: Option<&ActionResponse>) -> String {
        response
            .and_then(|r| r.error.clone())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| "Unknown error occurred".to_string())
    }
}
