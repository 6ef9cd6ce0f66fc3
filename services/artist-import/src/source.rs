//!
//! src/source.rs
//!
//! Collaborator seams of the import flows. Production implementations
//! live in fetch.rs, images.rs and persistent.rs, tests use in-memory fakes
//!

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ImportError;
use crate::knowledge_base::KnowledgeEntity;
use crate::types::{ArticleRef, ReleasePayload};

/// Short form of an article
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub title: String,
    pub extract: String,
    pub description: Option<String>,
    pub image_url: Option<String>
}

#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// `NotFound` when the article does not exist
    async fn summary(&self, article: &ArticleRef) -> Result<ArticleSummary, ImportError>;

    /// Raw source markup of the article
    async fn source(&self, article: &ArticleRef) -> Result<String, ImportError>;

    /// Linked knowledge base entry id, `None` when the article has none
    async fn entity_id(&self, article: &ArticleRef) -> Result<Option<String>, ImportError>;
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn entity(&self, id: &str) -> Result<KnowledgeEntity, ImportError>;

    /// Display labels for `ids` in `lang`, ids without a label are omitted
    async fn labels(
        &self,
        ids: &[String],
        lang: &str
    ) -> Result<HashMap<String, String>, ImportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub success: bool
}

impl Translation {
    pub fn untranslated(text: &str) -> Self {
        Self { text: text.to_string(), success: false }
    }
}

#[async_trait]
pub trait Translator: Send + Sync {
    /// Never fails, a failed translation returns the input with `success = false`
    async fn translate(&self, text: &str) -> Translation;
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Stable url of the stored copy
    async fn store(&self, source_url: &str) -> Result<String, ImportError>;
}

#[async_trait]
pub trait ReleaseStore: Send + Sync {
    /// Created release id
    async fn create_release(&self, payload: &ReleasePayload) -> Result<String, ImportError>;
}
