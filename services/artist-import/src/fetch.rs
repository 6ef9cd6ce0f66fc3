//!
//! src/fetch.rs
//!
//! HTTP clients for the article source and the knowledge base, with
//! shared retry, backoff and per-client request pacing
//!

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use reqwest::{header, redirect, Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::{HttpConfig, IdentityConfig, RetryConfig, WikidataConfig, WikipediaConfig};
use crate::errors::ImportError;
use crate::knowledge_base::KnowledgeEntity;
use crate::source::{ArticleSource, ArticleSummary, KnowledgeBase};
use crate::types::ArticleRef;

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

fn client_with_headers(http: &HttpConfig, headers: header::HeaderMap) ->
    Result<Client, ImportError> {
    client_helper(http)
        .default_headers(headers)
        .build()
        .map_err(|e| ImportError::Http(format!("build client: {e}")))
}

/// Wikimedia rejects requests without an identifying user agent
pub fn wikimedia_client(http: &HttpConfig, id: &IdentityConfig) ->
    Result<Client, ImportError> {

    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    h.insert(
        header::USER_AGENT,
        header::HeaderValue::from_str(&id.user_agent)
            .map_err(|e| ImportError::Config(
                format!("invalid user-agent {e}")
            ))?
    );
    client_with_headers(http, h)
}

pub fn base_client(http: &HttpConfig) -> Result<Client, ImportError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_with_headers(http, h)
}

/// Enforces a minimum interval between requests through one client
#[derive(Debug)]
pub struct RateGate {
    min_interval: Duration,
    state: tokio::sync::Mutex<Instant>
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        let start = Instant::now().checked_sub(min_interval).unwrap_or_else(Instant::now);
        Self {
            min_interval,
            state: tokio::sync::Mutex::new(start)
        }
    }

    pub async fn wait(&self) {
        let mut last = self.state.lock().await;
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }
        *last = Instant::now();
    }
}

/// Simple function to generate random wait for send_with_retry
fn generate_backoff(base: Duration, attempt: usize, rng: &mut SmallRng) -> Duration {
    let exp = (1_u32 << attempt.min(6)) * base.as_millis() as u32;
    let jitter = rng.gen_range(50..=200);
    Duration::from_millis(u64::from(exp) + jitter)
}

/// Retries 429 and 5xx with exponential backoff. 404 is `NotFound`,
/// any other failure status is returned at once
pub async fn send_with_retry(
    request: RequestBuilder,
    retry: &RetryConfig
) -> Result<Response, ImportError> {
    let mut rng = SmallRng::from_entropy();
    let mut attempt = 0_usize;
    loop {
        let response = request.try_clone()
            .ok_or_else(|| ImportError::Http("non-cloneable request".to_string()))?
            .send()
            .await;
        match response {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp);
                }
                if status == StatusCode::NOT_FOUND {
                    return Err(ImportError::NotFound(resp.url().to_string()));
                }
                let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                if !retryable {
                    return Err(ImportError::Http(format!("{status} from {}", resp.url())));
                }
                if attempt >= retry.max_attempts {
                    return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                        ImportError::RateLimited(resp.url().to_string())
                    } else {
                        ImportError::Http(format!("{status} after {attempt} retries"))
                    });
                }
                let backoff = generate_backoff(retry.base_backoff, attempt, &mut rng);
                warn!(status = %status, backoff = ?backoff.as_millis(), "http.retry");
                sleep(backoff).await;
                attempt += 1;
            },
            Err(e) => {
                if attempt >= retry.max_attempts {
                    return Err(e.into());
                }
                let backoff = generate_backoff(retry.base_backoff, attempt, &mut rng);
                warn!(error = %e, backoff = ?backoff.as_millis(), "http.retry.error");
                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

pub async fn http_json(request: RequestBuilder, retry: &RetryConfig) ->
    Result<Value, ImportError> {
    let resp = send_with_retry(request, retry).await?;
    Ok(resp.json::<Value>().await?)
}

///
/// Encyclopedic article source
///
#[derive(Debug, Clone)]
pub struct WikipediaClient {
    pub http: Client,
    pub cfg: WikipediaConfig,
    retry: RetryConfig,
    rate: Arc<RateGate>
}

impl WikipediaClient {
    pub fn new(http_config: &HttpConfig, id: &IdentityConfig, cfg: &WikipediaConfig) ->
        Result<Self, ImportError> {
        let http = wikimedia_client(http_config, id)?;
        Ok( Self {
            http,
            cfg: cfg.clone(),
            retry: http_config.retry.clone(),
            rate: Arc::new(RateGate::new(http_config.min_request_interval))
        })
    }

    /// GET /api/rest_v1/page/summary/{title}
    pub fn summary_request(&self, article: &ArticleRef) -> Result<RequestBuilder, ImportError> {
        let title = urlencoding::encode(&article.url_title()).into_owned();
        let url = self.cfg.rest_base(&article.lang)?.join(&format!("page/summary/{title}"))?;
        Ok(self.http.get(url))
    }

    /// GET /w/index.php?action=raw&title=...
    pub fn raw_request(&self, article: &ArticleRef) -> Result<RequestBuilder, ImportError> {
        let url = self.cfg.index_php(&article.lang)?;
        Ok(self.http.get(url).query(&[
            ("action", "raw"),
            ("title", article.url_title().as_str())
        ]))
    }

    /// GET /w/api.php?action=query&prop=pageprops&ppprop=wikibase_item&titles=...
    pub fn pageprops_request(&self, article: &ArticleRef) -> Result<RequestBuilder, ImportError> {
        let url = self.cfg.action_api(&article.lang)?;
        Ok(self.http.get(url).query(&[
            ("action", "query"),
            ("prop", "pageprops"),
            ("ppprop", "wikibase_item"),
            ("redirects", "1"),
            ("format", "json"),
            ("formatversion", "2"),
            ("titles", article.title.as_str())
        ]))
    }
}

pub fn parse_summary(v: &Value) -> Result<ArticleSummary, ImportError> {
    let title = v["title"].as_str()
        .ok_or_else(|| ImportError::Parse("summary without title".to_string()))?;
    let image_url = v.pointer("/originalimage/source")
        .or_else(|| v.pointer("/thumbnail/source"))
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok( ArticleSummary {
        title: title.to_string(),
        extract: v["extract"].as_str().unwrap_or_default().trim().to_string(),
        description: v["description"].as_str().map(str::to_string),
        image_url
    })
}

pub fn parse_pageprops(v: &Value) -> Option<String> {
    v.pointer("/query/pages")?
        .as_array()?
        .iter()
        .find_map(|p| p.pointer("/pageprops/wikibase_item").and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl ArticleSource for WikipediaClient {
    async fn summary(&self, article: &ArticleRef) -> Result<ArticleSummary, ImportError> {
        self.rate.wait().await;
        let v = http_json(self.summary_request(article)?, &self.retry).await?;
        debug!(article = %article, "wikipedia.summary");
        parse_summary(&v)
    }

    async fn source(&self, article: &ArticleRef) -> Result<String, ImportError> {
        self.rate.wait().await;
        let resp = send_with_retry(self.raw_request(article)?, &self.retry).await?;
        let text = resp.text().await?;
        debug!(article = %article, bytes = text.len(), "wikipedia.source");
        Ok(text)
    }

    async fn entity_id(&self, article: &ArticleRef) -> Result<Option<String>, ImportError> {
        self.rate.wait().await;
        let v = http_json(self.pageprops_request(article)?, &self.retry).await?;
        Ok(parse_pageprops(&v))
    }
}

///
/// Structured knowledge base
///
#[derive(Debug, Clone)]
pub struct WikidataClient {
    pub http: Client,
    pub cfg: WikidataConfig,
    retry: RetryConfig,
    rate: Arc<RateGate>
}

impl WikidataClient {
    pub fn new(http_config: &HttpConfig, id: &IdentityConfig, cfg: &WikidataConfig) ->
        Result<Self, ImportError> {
        let http = wikimedia_client(http_config, id)?;
        Ok( Self {
            http,
            cfg: cfg.clone(),
            retry: http_config.retry.clone(),
            rate: Arc::new(RateGate::new(http_config.min_request_interval))
        })
    }

    /// GET ?action=wbgetentities&ids=Q..&props=claims
    pub fn claims_request(&self, id: &str) -> RequestBuilder {
        self.http.get(self.cfg.api_url.clone()).query(&[
            ("action", "wbgetentities"),
            ("ids", id),
            ("props", "claims"),
            ("format", "json")
        ])
    }

    /// GET ?action=wbgetentities&ids=Q1|Q2..&props=labels&languages=xx|en
    pub fn labels_request(&self, ids: &[String], lang: &str) -> RequestBuilder {
        let languages = if lang == "en" { "en".to_string() } else { format!("{lang}|en") };
        self.http.get(self.cfg.api_url.clone()).query(&[
            ("action", "wbgetentities"),
            ("ids", ids.join("|").as_str()),
            ("props", "labels"),
            ("languages", languages.as_str()),
            ("format", "json")
        ])
    }

    async fn labels_chunk(&self, ids: &[String], lang: &str) ->
        Result<HashMap<String, String>, ImportError> {
        self.rate.wait().await;
        let v = http_json(self.labels_request(ids, lang), &self.retry).await?;
        Ok(parse_labels(&v, lang))
    }
}

/// Label in `lang`, falling back to English
pub fn parse_labels(v: &Value, lang: &str) -> HashMap<String, String> {
    let Some(entities) = v["entities"].as_object() else {
        return HashMap::new();
    };
    entities.iter()
        .filter_map(|(id, entity)| {
            let labels = &entity["labels"];
            let label = labels[lang]["value"].as_str()
                .or_else(|| labels["en"]["value"].as_str())?;
            Some((id.clone(), label.to_string()))
        })
        .collect()
}

#[async_trait]
impl KnowledgeBase for WikidataClient {
    async fn entity(&self, id: &str) -> Result<KnowledgeEntity, ImportError> {
        self.rate.wait().await;
        let v = http_json(self.claims_request(id), &self.retry).await?;
        if let Some(code) = v.pointer("/error/code").and_then(Value::as_str) {
            return Err(if code == "no-such-entity" {
                ImportError::NotFound(format!("entity {id}"))
            } else {
                ImportError::Http(format!("wbgetentities {code}"))
            });
        }
        KnowledgeEntity::from_json(id, &v["entities"][id])
    }

    /// Chunked to the API id limit, a failed chunk only loses its labels
    async fn labels(&self, ids: &[String], lang: &str) ->
        Result<HashMap<String, String>, ImportError> {
        let mut out = HashMap::new();
        for chunk in ids.chunks(self.cfg.label_batch.max(1)) {
            match self.labels_chunk(chunk, lang).await {
                Ok(labels) => out.extend(labels),
                Err(e) => warn!(error = %e, ids = chunk.len(), "wikidata.labels.chunk.fail")
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn live() -> bool {
        std::env::var("LIVE_HTTP").ok().as_deref() == Some("1")
    }

    #[test]
    fn backoff_grows_with_attempts() {
        let mut rng = SmallRng::seed_from_u64(7);
        let base = Duration::from_millis(100);
        let first = generate_backoff(base, 0, &mut rng);
        let third = generate_backoff(base, 2, &mut rng);
        assert!(first >= Duration::from_millis(150) && first <= Duration::from_millis(300));
        assert!(third >= Duration::from_millis(450) && third <= Duration::from_millis(600));
    }

    #[tokio::test]
    async fn rate_gate_spaces_requests() {
        let gate = RateGate::new(Duration::from_millis(40));
        let start = Instant::now();
        gate.wait().await;
        gate.wait().await;
        gate.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }

    #[test]
    fn summary_prefers_original_image() {
        let v = json!({
            "title": "Radiohead",
            "description": "English rock band",
            "extract": "Radiohead are an English rock band formed in Abingdon.\n",
            "thumbnail": { "source": "https://upload.wikimedia.org/thumb.jpg" },
            "originalimage": { "source": "https://upload.wikimedia.org/full.jpg" }
        });
        let summary = parse_summary(&v).unwrap();
        assert_eq!(summary.image_url.as_deref(), Some("https://upload.wikimedia.org/full.jpg"));
        assert!(summary.extract.ends_with("Abingdon."));

        assert!(parse_summary(&json!({ "type": "https://mediawiki.org/wiki/HyperSwitch/errors/not_found" })).is_err());
    }

    #[test]
    fn pageprops_and_labels() {
        let pages = json!({ "query": { "pages": [
            { "title": "Radiohead", "pageprops": { "wikibase_item": "Q44190" } }
        ]}});
        assert_eq!(parse_pageprops(&pages).as_deref(), Some("Q44190"));
        assert_eq!(parse_pageprops(&json!({ "query": { "pages": [{ "missing": true }] } })), None);

        let labels = json!({ "entities": {
            "Q11366": { "labels": { "de": { "value": "Alternative Rock" }, "en": { "value": "alternative rock" } } },
            "Q9778": { "labels": { "en": { "value": "electronic music" } } },
            "Q1": { "labels": {} }
        }});
        let parsed = parse_labels(&labels, "de");
        assert_eq!(parsed.get("Q11366").map(String::as_str), Some("Alternative Rock"));
        assert_eq!(parsed.get("Q9778").map(String::as_str), Some("electronic music"));
        assert!(!parsed.contains_key("Q1"));
    }

    #[test]
    fn requests_target_the_language_edition() {
        let identity = IdentityConfig { user_agent: "artist-import-test (ops@example.org)".into() };
        let client = WikipediaClient::new(
            &HttpConfig::default(), &identity, &WikipediaConfig::default()).unwrap();
        let article = ArticleRef { lang: "de".into(), title: "AC/DC".into() };

        let req = client.summary_request(&article).unwrap().build().unwrap();
        assert_eq!(req.url().as_str(), "https://de.wikipedia.org/api/rest_v1/page/summary/AC%2FDC");

        let raw = client.raw_request(&article).unwrap().build().unwrap();
        assert_eq!(raw.url().host_str(), Some("de.wikipedia.org"));
        assert!(raw.url().query().unwrap_or_default().contains("action=raw"));
    }

    #[tokio::test]
    #[allow(dead_code)]
    async fn wikipedia_client_testbench() -> Result<(), ImportError> {
        dotenvy::dotenv().ok();

        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(())
        }

        let cfgs = crate::config::load_config()?;
        let wikipedia = WikipediaClient::new(&cfgs.http, &cfgs.identity, &cfgs.wikipedia)?;
        let article = ArticleRef::parse("https://en.wikipedia.org/wiki/Radiohead", "en")?;

        let summary = wikipedia.summary(&article).await?;
        println!("summary: {summary:#?}");
        let source = wikipedia.source(&article).await?;
        assert!(source.to_lowercase().contains("infobox"));
        let qid = wikipedia.entity_id(&article).await?;
        assert_eq!(qid.as_deref(), Some("Q44190"));

        Ok(())
    }

    #[tokio::test]
    #[allow(dead_code)]
    async fn wikidata_client_testbench() -> Result<(), ImportError> {
        dotenvy::dotenv().ok();

        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(())
        }

        let cfgs = crate::config::load_config()?;
        let wikidata = WikidataClient::new(&cfgs.http, &cfgs.identity, &cfgs.wikidata)?;

        let entity = wikidata.entity("Q44190").await?;
        println!("claims: {}", entity.claims.len());
        let genres: Vec<String> = entity.items("P136").into_iter().map(str::to_string).collect();
        let labels = wikidata.labels(&genres, "en").await?;
        println!("labels: {labels:#?}");

        Ok(())
    }
}
