//! Knowledge-fetch contract.
//!
//! A knowledge source produces the large reference document (the domain
//! schema) that may be injected into a turn. It is a black box: the
//! orchestrator only cares whether a non-empty document came back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::KnowledgeError;

/// Result of one fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeFetch {
    #[serde(default)]
    pub documentation: Option<String>,
}

impl KnowledgeFetch {
    /// The document text, if present and not blank.
    pub fn non_empty(self) -> Option<String> {
        self.documentation.filter(|doc| !doc.trim().is_empty())
    }
}

#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> std::result::Result<KnowledgeFetch, KnowledgeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_documentation_is_empty() {
        let fetch = KnowledgeFetch {
            documentation: Some("   \n".into()),
        };
        assert!(fetch.non_empty().is_none());
        assert!(KnowledgeFetch::default().non_empty().is_none());
    }
}
