// External (language-model) email extraction

use crate::error::{LeadError, Result};
use crate::model::EmailType;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You extract business contact email addresses from web page text. \
Only return addresses that appear verbatim in the text; never guess or construct one. \
Respond with JSON of the form {\"emails\": [{\"email\": string, \"type\": \"generic\" or \"personal\", \"confidence\": number from 0 to 1}]}. \
Return {\"emails\": []} when there are none.";

/// Default confidence when the model omits one.
const DEFAULT_CONFIDENCE: f32 = 0.7;

/// An address reported by an external source, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalEmail {
    pub email: String,
    pub email_type: EmailType,
    pub confidence: f32,
}

/// Anything that can read page text and report email addresses.
///
/// Implementations never fail: errors degrade to an empty result.
#[async_trait]
pub trait ExternalEmailSource: Send + Sync {
    async fn extract_emails(&self, text: &str, source_url: &str) -> Vec<ExternalEmail>;
}

/// Used when external extraction is disabled.
pub struct NoExternalSource;

#[async_trait]
impl ExternalEmailSource for NoExternalSource {
    async fn extract_emails(&self, _text: &str, _source_url: &str) -> Vec<ExternalEmail> {
        Vec::new()
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct EmailsPayload {
    #[serde(default)]
    emails: Vec<ReportedEmail>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReportedEmail {
    email: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

/// OpenAI-compatible chat completions client.
#[derive(Clone)]
pub struct OpenAiEmailSource {
    http_client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiEmailSource {
    pub fn new(api_key: Option<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(leadsift_scanner::ScanError::from)?;
        Ok(Self {
            http_client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }

    /// Set a custom base URL (proxies, compatible providers, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    async fn request(&self, api_key: &str, text: &str, source_url: &str) -> Result<Vec<ExternalEmail>> {
        let start = Instant::now();
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": format!("Page: {}\n\n{}", source_url, text) },
            ],
        });

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LeadError::External(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LeadError::External(format!(
                "API returned {}: {}",
                status, error_text
            )));
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| LeadError::External(e.to_string()))?;
        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LeadError::External("empty completion".to_string()))?;

        let payload: EmailsPayload = serde_json::from_str(&content)?;
        debug!(
            url = source_url,
            count = payload.emails.len(),
            duration_ms = start.elapsed().as_millis(),
            "External extraction"
        );

        Ok(payload
            .emails
            .into_iter()
            .map(|reported| ExternalEmail {
                email: reported.email,
                email_type: reported
                    .kind
                    .as_deref()
                    .map(EmailType::from_label)
                    .unwrap_or(EmailType::Unknown),
                confidence: reported
                    .confidence
                    .unwrap_or(DEFAULT_CONFIDENCE)
                    .clamp(0.0, 1.0),
            })
            .collect())
    }
}

#[async_trait]
impl ExternalEmailSource for OpenAiEmailSource {
    async fn extract_emails(&self, text: &str, source_url: &str) -> Vec<ExternalEmail> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Vec::new();
        };
        match self.request(api_key, text, source_url).await {
            Ok(emails) => emails,
            Err(e) => {
                warn!(url = source_url, error = %e, "External extraction failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(content: &str) -> serde_json::Value {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] })
    }

    async fn source_for(server: &MockServer, key: Option<&str>) -> OpenAiEmailSource {
        OpenAiEmailSource::new(key.map(String::from), "gpt-4o-mini", Duration::from_secs(5))
            .unwrap()
            .with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_parses_reported_emails() {
        let server = MockServer::start().await;
        let content = r#"{"emails":[{"email":"info@site.com","type":"generic","confidence":0.95},{"email":"maria@site.com","type":"personal"}]}"#;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(content)))
            .expect(1)
            .mount(&server)
            .await;

        let source = source_for(&server, Some("test-key")).await;
        let emails = source.extract_emails("Contact info@site.com", "https://site.com/").await;

        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].email, "info@site.com");
        assert_eq!(emails[0].email_type, EmailType::Generic);
        assert_eq!(emails[0].confidence, 0.95);
        assert_eq!(emails[1].email_type, EmailType::Personal);
        assert_eq!(emails[1].confidence, DEFAULT_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_api_error_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let source = source_for(&server, Some("test-key")).await;
        assert!(source.extract_emails("text", "https://site.com/").await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_content_yields_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("not json")))
            .mount(&server)
            .await;

        let source = source_for(&server, Some("test-key")).await;
        assert!(source.extract_emails("text", "https://site.com/").await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_skips_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
            .expect(0)
            .mount(&server)
            .await;

        let source = source_for(&server, None).await;
        assert!(source.extract_emails("text", "https://site.com/").await.is_empty());
    }
}
