//!
//! src/types.rs
//!
//! Records produced by the import flows. Nothing here is persisted
//! directly, the caller decides what becomes durable
//!

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::ImportError;

/// An article on a specific language edition of the encyclopedia
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleRef {
    pub lang: String,
    pub title: String
}

impl ArticleRef {
    /// Accepts `https://xx.wikipedia.org/wiki/Title` or a bare title
    pub fn parse(reference: &str, default_lang: &str) -> Result<Self, ImportError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ImportError::NotFound("empty article reference".into()));
        }

        if let Ok(url) = url::Url::parse(reference) {
            if matches!(url.scheme(), "http" | "https") {
                return Self::from_url(&url);
            }
        }

        Ok( Self {
            lang: default_lang.to_string(),
            title: normalize_title(reference)
        })
    }

    fn from_url(url: &url::Url) -> Result<Self, ImportError> {
        let host = url.host_str()
            .ok_or_else(|| ImportError::NotFound(format!("no host in {url}")))?;
        let lang = host.split('.')
            .next()
            .filter(|l| !l.is_empty() && *l != "www" && *l != "m")
            .unwrap_or("en")
            .to_string();

        let raw = url.path()
            .strip_prefix("/wiki/")
            .ok_or_else(|| ImportError::NotFound(format!("not an article url: {url}")))?;
        let decoded = urlencoding::decode(raw)
            .map_err(|e| ImportError::Parse(format!("title encoding: {e}")))?;
        let title = normalize_title(&decoded);
        if title.is_empty() {
            return Err(ImportError::NotFound(format!("no title in {url}")));
        }
        Ok( Self { lang, title } )
    }

    /// Same language, different page
    pub fn sibling(&self, title: &str) -> Self {
        Self { lang: self.lang.clone(), title: normalize_title(title) }
    }

    /// Title as it appears in urls (spaces as underscores)
    pub fn url_title(&self) -> String {
        self.title.replace(' ', "_")
    }
}

impl fmt::Display for ArticleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lang, self.title)
    }
}

fn normalize_title(s: &str) -> String {
    let spaced = s.replace('_', " ");
    let spaced = spaced.split('#').next().unwrap_or_default();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    #[default]
    Person,
    Group
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown
}

/// A date where any trailing component may be missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDate {
    pub year: i32,
    pub month: Option<u8>,
    pub day: Option<u8>
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.month, self.day) {
            (Some(m), Some(d)) => write!(f, "{:04}-{:02}-{:02}", self.year, m, d),
            (Some(m), None) => write!(f, "{:04}-{:02}", self.year, m),
            _ => write!(f, "{:04}", self.year)
        }
    }
}

/// A career gap, `to_year` absent means the gap end is unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiatusInterval {
    pub from_year: i32,
    pub to_year: Option<i32>
}

/// One comma-separated piece of a years-active string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearSegment {
    pub from_year: i32,
    pub to_year: Option<i32>,
    pub is_single_year: bool
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub name: String,
    pub entity_type: EntityType,
    pub country: Option<String>,
    pub genre: Option<String>,
    pub sub_styles: Vec<String>,
    pub biography: String,
    pub biography_translated: bool,
    pub career_start: Option<i32>,
    pub career_end: Option<i32>,
    pub hiatus_intervals: Vec<HiatusInterval>,
    pub birth_date: Option<PartialDate>,
    pub death_date: Option<PartialDate>,
    pub gender: Gender,
    pub avatar_image_ref: Option<String>,
    pub website: Option<String>,
    pub social_links: BTreeMap<String, String>,
    pub source_article: Option<ArticleRef>,
    pub knowledge_base_id: Option<String>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Studio,
    Ep,
    Single,
    Compilation,
    Live
}

impl ReleaseType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReleaseType::Studio      => "studio",
            ReleaseType::Ep          => "ep",
            ReleaseType::Single      => "single",
            ReleaseType::Compilation => "compilation",
            ReleaseType::Live        => "live"
        }
    }
    pub fn parse(s: &str) -> Option<ReleaseType> {
        match s {
            "studio"      => Some(ReleaseType::Studio),
            "ep"          => Some(ReleaseType::Ep),
            "single"      => Some(ReleaseType::Single),
            "compilation" => Some(ReleaseType::Compilation),
            "live"        => Some(ReleaseType::Live),
            _ => None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscographyEntry {
    pub title: String,
    pub year: Option<i32>,
    pub release_type: ReleaseType,
    pub source_ref: Option<String>
}

impl DiscographyEntry {
    /// Page used to look up the tracklist
    pub fn lookup_key(&self) -> &str {
        self.source_ref.as_deref().unwrap_or(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackListEntry {
    pub title: String,
    pub duration: Option<String>,
    pub position: u32
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum ReleaseStatus {
    Pending,
    Fetched,
    Created(String),
    Failed(String)
}

/// A discography entry as the operator sees it before persisting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectableRelease {
    pub entry: DiscographyEntry,
    pub selected: bool,
    pub tracks: Option<Vec<TrackListEntry>>,
    pub status: ReleaseStatus
}

impl SelectableRelease {
    pub fn new(entry: DiscographyEntry) -> Self {
        Self { entry, selected: true, tracks: None, status: ReleaseStatus::Pending }
    }
}

/// What the persistence collaborator receives for one release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePayload {
    pub artist_id: String,
    pub title: String,
    pub slug: String,
    pub year: Option<i32>,
    pub release_type: ReleaseType,
    pub ordering: u32,
    pub is_ep: bool,
    pub is_single: bool,
    pub is_compilation: bool,
    pub is_live: bool,
    pub tracks: Vec<TrackListEntry>
}

impl ReleasePayload {
    pub fn new(
        artist_id: &str,
        entry: &DiscographyEntry,
        ordering: u32,
        tracks: Vec<TrackListEntry>
    ) -> Self {
        let kind = entry.release_type;
        Self {
            artist_id: artist_id.to_string(),
            title: entry.title.clone(),
            slug: slugify(&entry.title),
            year: entry.year,
            release_type: kind,
            ordering,
            is_ep: kind == ReleaseType::Ep,
            is_single: kind == ReleaseType::Single,
            is_compilation: kind == ReleaseType::Compilation,
            is_live: kind == ReleaseType::Live,
            tracks
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    pub title: String,
    pub result: Result<String, String>
}

impl ReleaseOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

pub fn slugify(title: &str) -> String {
    let slug = title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() { "release".to_string() } else { slug }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Step,
    Success,
    Failure
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceLine {
    pub level: TraceLevel,
    pub message: String,
    pub at: chrono::DateTime<chrono::Utc>
}

/// Append-only operator log for one session, mirrored to tracing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTrace {
    lines: Vec<TraceLine>
}

impl ImportTrace {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, level: TraceLevel, message: String) {
        self.lines.push(TraceLine { level, message, at: chrono::Utc::now() });
    }

    pub fn step(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(%message, "import.step");
        self.push(TraceLevel::Step, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(%message, "import.success");
        self.push(TraceLevel::Success, message);
    }

    pub fn failure(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(%message, "import.failure");
        self.push(TraceLevel::Failure, message);
    }

    pub fn lines(&self) -> &[TraceLine] {
        &self.lines
    }

    pub fn failures(&self) -> impl Iterator<Item = &TraceLine> {
        self.lines.iter().filter(|l| l.level == TraceLevel::Failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_ref_from_url_and_title() {
        let from_url = ArticleRef::parse(
            "https://de.wikipedia.org/wiki/Die_%C3%84rzte", "en").unwrap();
        assert_eq!(from_url.lang, "de");
        assert_eq!(from_url.title, "Die Ärzte");
        assert_eq!(from_url.url_title(), "Die_Ärzte");

        let bare = ArticleRef::parse("  Massive_Attack ", "en").unwrap();
        assert_eq!(bare, ArticleRef { lang: "en".into(), title: "Massive Attack".into() });
    }

    #[test]
    fn article_ref_rejects_empty_and_non_article_urls() {
        assert!(ArticleRef::parse("   ", "en").unwrap_err().is_not_found());
        assert!(ArticleRef::parse("https://en.wikipedia.org/w/index.php", "en")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn slugs_are_ascii_and_never_empty() {
        assert_eq!(slugify("OK Computer"), "ok-computer");
        assert_eq!(slugify("Kid A (Special Edition)"), "kid-a-special-edition");
        assert_eq!(slugify("???"), "release");
    }

    #[test]
    fn payload_flags_follow_release_type() {
        let entry = DiscographyEntry {
            title: "My Iron Lung".into(),
            year: Some(1994),
            release_type: ReleaseType::Ep,
            source_ref: None
        };
        let payload = ReleasePayload::new("artist-1", &entry, 3, Vec::new());
        assert!(payload.is_ep);
        assert!(!payload.is_single && !payload.is_live && !payload.is_compilation);
        assert_eq!(payload.slug, "my-iron-lung");
        assert_eq!(payload.ordering, 3);
        assert_eq!(entry.lookup_key(), "My Iron Lung");
    }

    #[test]
    fn partial_date_display_drops_missing_parts() {
        let d = PartialDate { year: 1968, month: Some(10), day: None };
        assert_eq!(d.to_string(), "1968-10");
    }

    #[test]
    fn trace_counts_failures() {
        let mut trace = ImportTrace::new();
        trace.step("fetching summary");
        trace.failure("knowledge base unavailable");
        trace.success("done");
        assert_eq!(trace.lines().len(), 3);
        assert_eq!(trace.failures().count(), 1);
    }
}
