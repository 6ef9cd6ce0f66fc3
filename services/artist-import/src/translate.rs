//!
//! src/translate.rs
//!
//! Best-effort biography translation. A failure is a flag on the
//! result, never an error
//!

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{HttpConfig, RetryConfig, TranslationConfig};
use crate::errors::ImportError;
use crate::fetch::{base_client, send_with_retry};
use crate::source::{Translation, Translator};

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String
}

/// LibreTranslate-compatible `POST {q, source, target, format}`
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    http: Client,
    cfg: TranslationConfig,
    retry: RetryConfig
}

impl HttpTranslator {
    pub fn new(http_config: &HttpConfig, cfg: &TranslationConfig) -> Result<Self, ImportError> {
        if cfg.endpoint.is_none() {
            return Err(ImportError::Config("TRANSLATE_URL was not set".to_string()));
        }
        Ok( Self {
            http: base_client(http_config)?,
            cfg: cfg.clone(),
            retry: http_config.retry.clone()
        })
    }

    async fn request(&self, text: &str) -> Result<String, ImportError> {
        let endpoint = self.cfg.endpoint.clone()
            .ok_or_else(|| ImportError::Config("translation disabled".to_string()))?;
        let body = TranslateRequest {
            q: text,
            source: &self.cfg.source_lang,
            target: &self.cfg.target_lang,
            format: "text",
            api_key: self.cfg.api_key.as_deref()
        };
        let resp = send_with_retry(self.http.post(endpoint).json(&body), &self.retry).await?;
        let parsed: TranslateResponse = resp.json().await?;
        Ok(parsed.translated_text)
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str) -> Translation {
        match self.request(text).await {
            Ok(out) if !out.trim().is_empty() => Translation { text: out, success: true },
            Ok(_) => {
                warn!("translate.empty");
                Translation::untranslated(text)
            }
            Err(e) => {
                warn!(error = %e, "translate.fail");
                Translation::untranslated(text)
            }
        }
    }
}

/// Used when no endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledTranslator;

#[async_trait]
impl Translator for DisabledTranslator {
    async fn translate(&self, text: &str) -> Translation {
        Translation::untranslated(text)
    }
}

/// Picks the implementation the configuration allows
pub fn translator(http: &HttpConfig, cfg: &TranslationConfig) ->
    Result<Arc<dyn Translator>, ImportError> {
    match cfg.endpoint {
        Some(_) => Ok(Arc::new(HttpTranslator::new(http, cfg)?)),
        None => Ok(Arc::new(DisabledTranslator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled_cfg() -> TranslationConfig {
        TranslationConfig {
            endpoint: None,
            api_key: None,
            source_lang: "auto".into(),
            target_lang: "en".into()
        }
    }

    #[tokio::test]
    async fn disabled_translator_reports_failure() {
        let out = DisabledTranslator.translate("Radiohead sind eine Band").await;
        assert!(!out.success);
        assert_eq!(out.text, "Radiohead sind eine Band");
    }

    #[test]
    fn request_body_shape() {
        let body = TranslateRequest {
            q: "Hallo", source: "auto", target: "en", format: "text", api_key: None
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v, serde_json::json!({ "q": "Hallo", "source": "auto", "target": "en", "format": "text" }));

        let parsed: TranslateResponse =
            serde_json::from_str(r#"{"translatedText":"Hello"}"#).unwrap();
        assert_eq!(parsed.translated_text, "Hello");
    }

    #[test]
    fn http_translator_requires_endpoint() {
        assert!(HttpTranslator::new(&HttpConfig::default(), &disabled_cfg()).is_err());
        assert!(translator(&HttpConfig::default(), &disabled_cfg()).is_ok());
    }

    #[tokio::test]
    async fn unreachable_endpoint_keeps_original_text() {
        let cfg = TranslationConfig {
            endpoint: Some(url::Url::parse("https://127.0.0.1:9/translate").unwrap()),
            ..disabled_cfg()
        };
        let mut http = HttpConfig::default();
        http.retry.max_attempts = 0;
        let translator = HttpTranslator::new(&http, &cfg).unwrap();
        let out = translator.translate("Bonjour").await;
        assert!(!out.success);
        assert_eq!(out.text, "Bonjour");
    }
}
