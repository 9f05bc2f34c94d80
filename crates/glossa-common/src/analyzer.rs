//! The external term analyzer and the shape of what it returns.
//!
//! An analyzer takes plain text and returns a raw payload that should be a
//! JSON array of `{term, definition}` objects. Parsing is deliberately lenient:
//! annotation is advisory, so anything unexpected becomes "no terms".

use std::future::Future;

use n0_future::time::{Duration, timeout};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::config::AnalyzerConfig;
use crate::error::AnalyzerError;

/// A term the analyzer picked out of the text, with a short definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecognizedTerm {
    pub term: SmolStr,
    pub definition: String,
}

impl RecognizedTerm {
    pub fn new(term: impl Into<SmolStr>, definition: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            definition: definition.into(),
        }
    }
}

/// Parse an analyzer payload into terms.
///
/// Anything that is not a JSON array of `{term, definition}` objects yields an
/// empty list. Entries with a blank `term` are dropped.
pub fn parse_terms(payload: &str) -> Vec<RecognizedTerm> {
    match serde_json::from_str::<Vec<RecognizedTerm>>(payload.trim()) {
        Ok(terms) => terms
            .into_iter()
            .filter(|t| !t.term.trim().is_empty())
            .collect(),
        Err(e) => {
            tracing::warn!(
                target: "glossa::analyzer",
                error = %e,
                payload_len = payload.len(),
                "failed to parse terms payload, treating as no terms"
            );
            Vec::new()
        }
    }
}

/// Something that can look at plain text and name its important terms.
///
/// Returns the raw response payload; callers parse it with [`parse_terms`].
/// The returned future is not required to be `Send` so browser-backed
/// implementations can hold JS values across awaits.
pub trait Analyzer {
    fn analyze(&self, text: String) -> impl Future<Output = Result<String, AnalyzerError>>;
}

impl<A: Analyzer + ?Sized> Analyzer for &A {
    fn analyze(&self, text: String) -> impl Future<Output = Result<String, AnalyzerError>> {
        (**self).analyze(text)
    }
}

impl<A: Analyzer + ?Sized> Analyzer for std::rc::Rc<A> {
    fn analyze(&self, text: String) -> impl Future<Output = Result<String, AnalyzerError>> {
        (**self).analyze(text)
    }
}

/// Analyzer backed by an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatAnalyzer {
    client: reqwest::Client,
    config: AnalyzerConfig,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl ChatAnalyzer {
    pub fn new(config: AnalyzerConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            api_key: api_key.into(),
        }
    }

    /// Build from config, reading the api key from the configured env var.
    pub fn from_env(config: AnalyzerConfig) -> Result<Self, AnalyzerError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AnalyzerError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(Self::new(config, api_key))
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    async fn request(&self, text: &str) -> Result<String, AnalyzerError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalyzerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        Ok(reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_else(|| "[]".to_owned()))
    }
}

impl Analyzer for ChatAnalyzer {
    async fn analyze(&self, text: String) -> Result<String, AnalyzerError> {
        let limit = Duration::from_millis(self.config.timeout_ms);
        tracing::debug!(
            target: "glossa::analyzer",
            model = %self.config.model,
            chars = text.chars().count(),
            "requesting term analysis"
        );
        timeout(limit, self.request(&text))
            .await
            .map_err(|_| AnalyzerError::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_terms_array() {
        let terms = parse_terms(
            r#"[{"term":"Neural networks","definition":"A computing model"},
                {"term":"GPU","definition":"Graphics processor"}]"#,
        );
        assert_eq!(
            terms,
            vec![
                RecognizedTerm::new("Neural networks", "A computing model"),
                RecognizedTerm::new("GPU", "Graphics processor"),
            ]
        );
    }

    #[test]
    fn test_parse_terms_invalid_json_is_empty() {
        assert!(parse_terms("not json at all").is_empty());
        assert!(parse_terms(r#"[{"term":"x""#).is_empty());
    }

    #[test]
    fn test_parse_terms_wrong_shape_is_empty() {
        assert!(parse_terms(r#"{"term":"x","definition":"y"}"#).is_empty());
        assert!(parse_terms(r#"["x", "y"]"#).is_empty());
        assert!(parse_terms(r#"[{"name":"x"}]"#).is_empty());
    }

    #[test]
    fn test_parse_terms_drops_blank_terms() {
        let terms = parse_terms(r#"[{"term":"  ","definition":"y"},{"term":"z","definition":""}]"#);
        assert_eq!(terms, vec![RecognizedTerm::new("z", "")]);
    }

    #[test]
    fn test_completions_url() {
        let config = AnalyzerConfig {
            endpoint: "https://example.test/v1/".into(),
            ..AnalyzerConfig::default()
        };
        let analyzer = ChatAnalyzer::new(config, "key");
        assert_eq!(
            analyzer.completions_url(),
            "https://example.test/v1/chat/completions"
        );
    }

    #[test]
    fn test_from_env_missing_key() {
        let config = AnalyzerConfig {
            api_key_env: "GLOSSA_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..AnalyzerConfig::default()
        };
        assert!(matches!(
            ChatAnalyzer::from_env(config),
            Err(AnalyzerError::MissingApiKey(_))
        ));
    }
}
