//! Knowledge sources: where the reference document comes from.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use turnstile_config::KnowledgeConfig;
use turnstile_core::error::KnowledgeError;
use turnstile_core::knowledge::{KnowledgeFetch, KnowledgeSource};

/// No document is ever available.
pub struct NoKnowledge;

#[async_trait]
impl KnowledgeSource for NoKnowledge {
    fn name(&self) -> &str {
        "none"
    }

    async fn fetch(&self) -> Result<KnowledgeFetch, KnowledgeError> {
        Ok(KnowledgeFetch::default())
    }
}

/// A fixed, in-memory document.
pub struct StaticKnowledge {
    text: String,
}

impl StaticKnowledge {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl KnowledgeSource for StaticKnowledge {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> Result<KnowledgeFetch, KnowledgeError> {
        Ok(KnowledgeFetch {
            documentation: Some(self.text.clone()),
        })
    }
}

/// Reads the document from disk on every fetch, so edits are picked up
/// at the next refresh.
pub struct FileKnowledge {
    path: PathBuf,
}

impl FileKnowledge {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl KnowledgeSource for FileKnowledge {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self) -> Result<KnowledgeFetch, KnowledgeError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| KnowledgeError::Read {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!(path = %self.path.display(), chars = text.len(), "Knowledge document read");
        Ok(KnowledgeFetch {
            documentation: Some(text),
        })
    }
}

/// Fetches the document from an HTTP endpoint.
///
/// A JSON body with a `documentation` field is unwrapped; any other body
/// is used as the document text.
pub struct HttpKnowledge {
    url: String,
    headers: Vec<(String, String)>,
    client: reqwest::Client,
}

impl HttpKnowledge {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            url: url.into(),
            headers: Vec::new(),
            client,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[async_trait]
impl KnowledgeSource for HttpKnowledge {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self) -> Result<KnowledgeFetch, KnowledgeError> {
        let mut request = self.client.get(&self.url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| KnowledgeError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| KnowledgeError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            return Err(KnowledgeError::Http {
                status_code: status.as_u16(),
                message: body,
            });
        }

        debug!(url = %self.url, chars = body.len(), "Knowledge document fetched");
        Ok(decode_body(body))
    }
}

fn decode_body(body: String) -> KnowledgeFetch {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(&body) {
        if let Some(doc) = map.get("documentation") {
            return KnowledgeFetch {
                documentation: doc.as_str().map(String::from),
            };
        }
    }
    KnowledgeFetch {
        documentation: Some(body),
    }
}

/// Build the knowledge source selected by `[knowledge]`.
pub fn build_from_config(config: &KnowledgeConfig) -> Result<Arc<dyn KnowledgeSource>, KnowledgeError> {
    match config.source.as_str() {
        "none" => Ok(Arc::new(NoKnowledge)),
        "static" => Ok(Arc::new(StaticKnowledge::new(
            config.text.clone().unwrap_or_default(),
        ))),
        "file" => {
            let path = config.path.as_ref().ok_or_else(|| {
                KnowledgeError::Unavailable("knowledge.path is not set".into())
            })?;
            Ok(Arc::new(FileKnowledge::new(path)))
        }
        "http" => {
            let url = config.url.as_ref().ok_or_else(|| {
                KnowledgeError::Unavailable("knowledge.url is not set".into())
            })?;
            let mut source = HttpKnowledge::new(url, config.timeout_secs);
            for (name, value) in &config.headers {
                source = source.with_header(name, value);
            }
            Ok(Arc::new(source))
        }
        other => Err(KnowledgeError::Unavailable(format!(
            "Unknown knowledge source: {other}"
        ))),
    }
}
