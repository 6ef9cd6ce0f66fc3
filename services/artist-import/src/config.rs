//!
//! src/config.rs
//!
//! Loads the environment into typed configuration for the article,
//! knowledge base, translation, image and persistence collaborators
//!

use std::path::PathBuf;
use std::time;

use url::Url;

use crate::errors::ImportError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 8;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

pub const RETRY_MAX_ATTEMPTS: usize = 3;
pub const RETRY_BASE_BACKOFF: u64 = 250;

/// Minimum spacing between requests to one Wikimedia host, in ms
pub const MIN_REQUEST_INTERVAL: u64 = 200;

pub const TRACKLIST_DELAY: u64 = 500;
pub const PERSIST_DELAY: u64 = 300;

/// Wrapper over env::var to return an invalid enviroment var error
fn env_check(s: &str) -> Result<String, ImportError> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ImportError::Config(format!("{s} was not set"))),
    }
}

fn env_or(s: &str, default: &str) -> String {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => default.to_string()
    }
}

fn env_optional(s: &str) -> Option<String> {
    std::env::var(s).ok().filter(|v| !v.trim().is_empty())
}

fn env_to_u64(s: &str, default: u64) -> u64 {
    match std::env::var(s) {
        Ok(s) => s.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default
    }
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

/// Identity expected by the Wikimedia user-agent policy
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub user_agent: String,
}

fn build_identity() -> Result<IdentityConfig, ImportError> {
    let application = env_check("APPLICATION")?;
    let contact     = env_check("CONTACT")?;
    let user_agent  = format!("{application} ({contact})");
    Ok( IdentityConfig { user_agent } )
}

///
/// Configuration for the encyclopedic article source
///
#[derive(Debug, Clone)]
pub struct WikipediaConfig {
    pub default_lang: String,  // language used for bare titles
    pub host_suffix: String,   // wikipedia.org
}

impl WikipediaConfig {
    fn site(&self, lang: &str) -> Result<Url, ImportError> {
        let url = Url::parse(&format!("https://{lang}.{}/", self.host_suffix))?;
        Ok(url)
    }

    /// https://{lang}.wikipedia.org/api/rest_v1/
    pub fn rest_base(&self, lang: &str) -> Result<Url, ImportError> {
        Ok( self.site(lang)?.join("api/rest_v1/")? )
    }

    /// https://{lang}.wikipedia.org/w/api.php
    pub fn action_api(&self, lang: &str) -> Result<Url, ImportError> {
        Ok( self.site(lang)?.join("w/api.php")? )
    }

    /// https://{lang}.wikipedia.org/w/index.php
    pub fn index_php(&self, lang: &str) -> Result<Url, ImportError> {
        Ok( self.site(lang)?.join("w/index.php")? )
    }
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            default_lang: "en".to_string(),
            host_suffix: "wikipedia.org".to_string()
        }
    }
}

fn build_wikipedia() -> Result<WikipediaConfig, ImportError> {
    let default_lang = env_or("WIKI_LANG", "en").to_ascii_lowercase();
    if !default_lang.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ImportError::Config(format!("WIKI_LANG invalid: {default_lang}")));
    }
    let host_suffix = env_or("WIKIPEDIA_HOST_SUFFIX", "wikipedia.org");
    Ok( WikipediaConfig { default_lang, host_suffix } )
}

///
/// Configuration for the structured knowledge base
///
#[derive(Debug, Clone)]
pub struct WikidataConfig {
    pub api_url: Url,           // https://www.wikidata.org/w/api.php
    pub label_batch: usize,     // wbgetentities accepts at most 50 ids
}

fn build_wikidata() -> Result<WikidataConfig, ImportError> {
    let api_url = env_or("WIKIDATA_API_URL", "https://www.wikidata.org/w/api.php");
    let api_url = Url::parse(&api_url)
        .map_err(|e| ImportError::Config(format!("WIKIDATA_API_URL invalid {e}")))?;

    ensure_https(&api_url).map_err(ImportError::Config)?;
    ensure_host(&api_url, "www.wikidata.org").map_err(ImportError::Config)?;

    Ok( WikidataConfig { api_url, label_batch: 50 } )
}

///
/// Configuration for the translation collaborator, disabled without a url
///
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    pub endpoint: Option<Url>,
    pub api_key: Option<String>,
    pub source_lang: String,
    pub target_lang: String
}

fn build_translation() -> Result<TranslationConfig, ImportError> {
    let endpoint = match env_optional("TRANSLATE_URL") {
        Some(raw) => {
            let url = Url::parse(&raw)
                .map_err(|e| ImportError::Config(format!("TRANSLATE_URL invalid {e}")))?;
            ensure_https(&url).map_err(ImportError::Config)?;
            Some(url)
        }
        None => None
    };

    Ok( TranslationConfig {
        endpoint,
        api_key: env_optional("TRANSLATE_API_KEY"),
        source_lang: env_or("TRANSLATE_SOURCE", "auto"),
        target_lang: env_or("TRANSLATE_TARGET", "en")
    })
}

///
/// Configuration for the avatar image store
///
#[derive(Debug, Clone)]
pub struct ImageStoreConfig {
    pub root: PathBuf,
    pub public_base: Url
}

fn build_images() -> Result<ImageStoreConfig, ImportError> {
    let root = PathBuf::from(env_or("IMAGE_STORE_ROOT", "./data/images"));
    let public_base = env_or("IMAGE_PUBLIC_BASE", "https://localhost/images/");
    let mut public_base = Url::parse(&public_base)
        .map_err(|e| ImportError::Config(format!("IMAGE_PUBLIC_BASE invalid {e}")))?;
    ensure_trailing_slash(&mut public_base);
    Ok( ImageStoreConfig { root, public_base } )
}

///
/// Configuration for persistent storage in sqlite and the raw archive
///
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub db_url: String,
    pub snapshot_root: Option<PathBuf>,
    pub snapshot_level: i32
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_url: "sqlite:./data/releases.db".to_string(),
            snapshot_root: None,
            snapshot_level: 3
        }
    }
}

fn build_persistence() -> PersistenceConfig {
    let defaults = PersistenceConfig::default();
    PersistenceConfig {
        db_url: env_or("DATABASE_URL", &defaults.db_url),
        snapshot_root: env_optional("SNAPSHOT_ROOT").map(PathBuf::from),
        snapshot_level: defaults.snapshot_level
    }
}

///
/// Configuration for Http timeouts, retries, etc.
///
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: time::Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            base_backoff: time::Duration::from_millis(RETRY_BASE_BACKOFF),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
    pub min_request_interval: time::Duration,
    pub retry: RetryConfig
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
            min_request_interval: time::Duration::from_millis(MIN_REQUEST_INTERVAL),
            retry: RetryConfig::default()
        }
    }
}

///
/// Pacing and defaults for the import flows
///
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub default_country: Option<String>,
    pub tracklist_delay: time::Duration,  // between per-release source fetches
    pub persist_delay: time::Duration,    // between per-release create calls
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_country: None,
            tracklist_delay: time::Duration::from_millis(TRACKLIST_DELAY),
            persist_delay: time::Duration::from_millis(PERSIST_DELAY)
        }
    }
}

fn build_import() -> ImportConfig {
    ImportConfig {
        default_country: env_optional("DEFAULT_COUNTRY"),
        tracklist_delay: time::Duration::from_millis(
            env_to_u64("TRACKLIST_DELAY_MS", TRACKLIST_DELAY)
        ),
        persist_delay: time::Duration::from_millis(
            env_to_u64("PERSIST_DELAY_MS", PERSIST_DELAY)
        )
    }
}

///
/// Configuration for Logger
///

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub format: LogFormat,
    pub with_ansi: bool,
    pub include_file_line: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,artist_import=debug,reqwest=warn,sqlx=warn".to_string(),
            format: LogFormat::Json,
            with_ansi: true,
            include_file_line: true,
            include_target: true,
        }
    }
}

fn build_logging() -> LoggingConfig {
    let mut logging = LoggingConfig::default();
    if env_or("LOG_FORMAT", "json").eq_ignore_ascii_case("pretty") {
        logging.format = LogFormat::Pretty;
    }
    logging
}

///
/// AppConfig which holds everything the collaborators need
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub identity: IdentityConfig,
    pub wikipedia: WikipediaConfig,
    pub wikidata: WikidataConfig,
    pub translation: TranslationConfig,
    pub images: ImageStoreConfig,
    pub persistence: PersistenceConfig,
    pub import: ImportConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, ImportError> {
    dotenvy::dotenv().ok();

    let identity    = build_identity()?;
    let wikipedia   = build_wikipedia()?;
    let wikidata    = build_wikidata()?;
    let translation = build_translation()?;
    let images      = build_images()?;
    let persistence = build_persistence();
    let import      = build_import();
    let http        = HttpConfig::default();
    let logging     = build_logging();

    Ok( AppConfig {
        identity, wikipedia, wikidata, translation, images,
        persistence, import, http, logging
    } )
}
