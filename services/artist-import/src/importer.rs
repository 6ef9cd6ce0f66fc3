//!
//! src/importer.rs
//!
//! Import flows over the collaborator seams: one artist record from an
//! article plus its knowledge base entry, the discography listing, and
//! the sequential tracklist and release passes
//!

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::ImportConfig;
use crate::country::{self, CountryHints};
use crate::discography::extract_discography;
use crate::errors::ImportError;
use crate::genre;
use crate::infobox::Infobox;
use crate::knowledge_base::{self, KnowledgeFacts, Precedence};
use crate::sink::{SnapshotKind, SnapshotSink};
use crate::source::{ArticleSource, ArticleSummary, ImageStore, KnowledgeBase, ReleaseStore, Translator};
use crate::tracklist::extract_tracklist;
use crate::types::{
    ArticleRef, ArtistRecord, DiscographyEntry, ImportTrace, ReleaseOutcome, ReleasePayload,
    ReleaseStatus, SelectableRelease, TrackListEntry,
};
use crate::years_active::{parse_years_active, YearsActive};

static DISAMBIGUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^()]*\)\s*$").unwrap());

/// Everything the import flows talk to
#[derive(Clone)]
pub struct Collaborators {
    pub articles: Arc<dyn ArticleSource>,
    pub knowledge: Arc<dyn KnowledgeBase>,
    pub translator: Arc<dyn Translator>,
    pub images: Arc<dyn ImageStore>,
    pub releases: Arc<dyn ReleaseStore>
}

pub struct Importer {
    deps: Collaborators,
    cfg: ImportConfig,
    default_lang: String,
    sink: Option<SnapshotSink>
}

impl Importer {
    pub fn new(deps: Collaborators, cfg: ImportConfig, default_lang: &str) -> Self {
        Self { deps, cfg, default_lang: default_lang.to_string(), sink: None }
    }

    /// Archive every fetched summary, source and entity under the sink
    pub fn with_sink(mut self, sink: SnapshotSink) -> Self {
        self.sink = Some(sink);
        self
    }

    fn archive_text(&self, kind: SnapshotKind, key: &str, text: &str) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.write_text(kind, key, text) {
                warn!(key = %key, error = %e, "snapshot.fail");
            }
        }
    }

    fn archive_json<T: Serialize>(&self, kind: SnapshotKind, key: &str, value: &T) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.write_json(kind, key, value) {
                warn!(key = %key, error = %e, "snapshot.fail");
            }
        }
    }

    /// Builds one artist record. Only a missing article is an error,
    /// every other failure narrows the record and leaves a trace line
    pub async fn import_artist(&self, reference: &str) ->
        Result<(ArtistRecord, ImportTrace), ImportError> {
        let mut trace = ImportTrace::new();
        let article = ArticleRef::parse(reference, &self.default_lang)?;
        info!(article = %article, "import.artist.start");

        trace.step(format!("Fetching summary of {article}"));
        let summary = match self.deps.articles.summary(&article).await {
            Ok(s) => s,
            Err(e) => {
                trace.failure(format!("No article found for {article}: {e}"));
                return Err(match e {
                    ImportError::NotFound(m) => ImportError::NotFound(m),
                    other => ImportError::NotFound(format!("{article}: {other}"))
                });
            }
        };
        self.archive_json(SnapshotKind::Summary, &article.to_string(), &summary);
        trace.success(format!("Summary found: {}", summary.title));

        trace.step("Reading infobox");
        let infobox = match self.deps.articles.source(&article).await {
            Ok(source) => {
                self.archive_text(SnapshotKind::ArticleSource, &article.to_string(), &source);
                Infobox::parse(&source)
            }
            Err(e) => {
                trace.failure(format!("Article source unavailable: {e}"));
                Infobox::default()
            }
        };
        let infobox_genres = infobox.genres();
        let infobox_website = infobox.website();
        let infobox_years = infobox.years_active_raw()
            .map(|raw| parse_years_active(&raw))
            .filter(|y| !y.is_empty());
        let origin = infobox.origin();
        trace.step(format!(
            "Infobox: {} genres, website {}, years active {}",
            infobox_genres.len(),
            if infobox_website.is_some() { "found" } else { "missing" },
            if infobox_years.is_some() { "found" } else { "missing" }
        ));

        let fallback_text = [
            origin.as_deref(),
            Some(summary.extract.as_str()),
            summary.description.as_deref()
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n");

        let (knowledge_base_id, facts) = self.knowledge(
            &article, &mut trace, &Precedence {
                has_website: infobox_website.is_some(),
                has_years_active: infobox_years.is_some(),
                has_genres: !infobox_genres.is_empty(),
                fallback_text: &fallback_text,
                lang: &article.lang
            }
        ).await;

        let years = infobox_years
            .or_else(|| {
                facts.as_ref()
                    .and_then(|f| f.years_active_raw.as_deref())
                    .map(parse_years_active)
            })
            .unwrap_or_default();

        let genre_labels = if infobox_genres.is_empty() {
            facts.as_ref().map(|f| f.genre_labels.clone()).unwrap_or_default()
        } else {
            infobox_genres
        };
        let genres = genre::classify(&genre_labels);

        let country = facts.as_ref()
            .and_then(|f| f.country.clone())
            .or_else(|| country::resolve_country(&CountryHints::default(), &fallback_text))
            .or_else(|| self.cfg.default_country.clone());

        let entity_type = facts.as_ref()
            .and_then(|f| f.entity_type)
            .or_else(|| infobox.entity_hint())
            .unwrap_or_default();

        let name = infobox.name().unwrap_or_else(|| display_name(&summary));

        let mut record = ArtistRecord {
            name,
            entity_type,
            country,
            genre: genres.canonical_genre,
            sub_styles: genres.sub_styles,
            biography: summary.extract.clone(),
            website: infobox_website,
            source_article: Some(article.clone()),
            knowledge_base_id,
            ..Default::default()
        };
        apply_years(&mut record, &years);
        if let Some(f) = facts {
            record.birth_date = f.birth_date;
            record.death_date = f.death_date;
            record.gender = f.gender;
            record.social_links = f.social_links;
            if record.website.is_none() {
                record.website = f.website;
            }
        }

        self.translate_biography(&mut record, &mut trace).await;
        self.store_avatar(&mut record, summary.image_url.as_deref(), &mut trace).await;

        trace.success(format!("Imported {}", record.name));
        info!(
            article = %article,
            name = %record.name,
            genre = ?record.genre,
            country = ?record.country,
            failures = trace.failures().count(),
            "import.artist.done"
        );
        Ok((record, trace))
    }

    /// Linked entry id and its facts, both absent when anything fails
    async fn knowledge(
        &self,
        article: &ArticleRef,
        trace: &mut ImportTrace,
        precedence: &Precedence<'_>
    ) -> (Option<String>, Option<KnowledgeFacts>) {
        trace.step("Looking up knowledge base entry");
        let id = match self.deps.articles.entity_id(article).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                trace.step("Article has no knowledge base entry");
                return (None, None);
            }
            Err(e) => {
                trace.failure(format!("Knowledge base link unavailable: {e}"));
                return (None, None);
            }
        };

        let entity = match self.deps.knowledge.entity(&id).await {
            Ok(entity) => entity,
            Err(e) => {
                trace.failure(format!("Knowledge base entry {id} unavailable: {e}"));
                return (Some(id), None);
            }
        };
        self.archive_json(SnapshotKind::Entity, &id, &entity);

        let facts = knowledge_base::resolve_entity(
            self.deps.knowledge.as_ref(), &entity, precedence
        ).await;
        trace.success(format!("Knowledge base entry {id}: {} claims", entity.claims.len()));
        (Some(id), Some(facts))
    }

    async fn translate_biography(&self, record: &mut ArtistRecord, trace: &mut ImportTrace) {
        if record.biography.trim().is_empty() {
            return;
        }
        trace.step("Translating biography");
        let out = self.deps.translator.translate(&record.biography).await;
        record.biography_translated = out.success;
        if out.success {
            record.biography = out.text;
            trace.success("Biography translated");
        } else {
            trace.failure("Translation failed, keeping original biography");
        }
    }

    async fn store_avatar(
        &self,
        record: &mut ArtistRecord,
        image_url: Option<&str>,
        trace: &mut ImportTrace
    ) {
        let Some(url) = image_url else {
            return;
        };
        trace.step("Storing avatar image");
        match self.deps.images.store(url).await {
            Ok(stored) => {
                trace.success("Avatar stored");
                record.avatar_image_ref = Some(stored);
            }
            Err(e) => {
                trace.failure(format!("Avatar upload failed, keeping source url: {e}"));
                record.avatar_image_ref = Some(url.to_string());
            }
        }
    }

    /// Entries of `<Title> discography` when that page lists any, the
    /// artist page otherwise. `NotFound` only when the artist page is missing
    pub async fn search_discography(&self, reference: &str) ->
        Result<Vec<DiscographyEntry>, ImportError> {
        let article = ArticleRef::parse(reference, &self.default_lang)?;
        let dedicated = article.sibling(&format!("{} discography", article.title));

        match self.deps.articles.source(&dedicated).await {
            Ok(source) => {
                self.archive_text(SnapshotKind::ArticleSource, &dedicated.to_string(), &source);
                let entries = extract_discography(&source);
                if !entries.is_empty() {
                    info!(article = %dedicated, entries = entries.len(), "discography.found");
                    return Ok(entries);
                }
            }
            Err(e) => debug!(article = %dedicated, error = %e, "discography.page.missing")
        }

        match self.deps.articles.source(&article).await {
            Ok(source) => {
                self.archive_text(SnapshotKind::ArticleSource, &article.to_string(), &source);
                let entries = extract_discography(&source);
                info!(article = %article, entries = entries.len(), "discography.found");
                Ok(entries)
            }
            Err(e) if e.is_not_found() => Err(e),
            Err(e) => {
                warn!(article = %article, error = %e, "discography.source.fail");
                Ok(Vec::new())
            }
        }
    }

    /// Tracks listed on the release's own page, empty when it lists none
    pub async fn fetch_tracklist(&self, entry: &DiscographyEntry) ->
        Result<Vec<TrackListEntry>, ImportError> {
        let article = ArticleRef::parse(entry.lookup_key(), &self.default_lang)?;
        let source = self.deps.articles.source(&article).await?;
        self.archive_text(SnapshotKind::ReleaseSource, &article.to_string(), &source);
        Ok(extract_tracklist(&source))
    }

    /// One selected release at a time, paced by the tracklist delay.
    /// A failed fetch marks that release and moves on
    pub async fn fetch_all_tracklists(&self, releases: &mut [SelectableRelease]) -> ImportTrace {
        let mut trace = ImportTrace::new();
        let total = releases.iter().filter(|r| r.selected).count();
        trace.step(format!("Fetching tracklists for {total} releases"));

        let mut first = true;
        for release in releases.iter_mut().filter(|r| r.selected) {
            if !first {
                pause(self.cfg.tracklist_delay).await;
            }
            first = false;

            match self.fetch_tracklist(&release.entry).await {
                Ok(tracks) => {
                    trace.success(format!("{}: {} tracks", release.entry.title, tracks.len()));
                    release.tracks = Some(tracks);
                    release.status = ReleaseStatus::Fetched;
                }
                Err(e) => {
                    trace.failure(format!("{}: tracklist unavailable: {e}", release.entry.title));
                    release.status = ReleaseStatus::Failed(e.to_string());
                }
            }
        }
        trace
    }

    /// Persists selected releases in order, one create call at a time.
    /// Ordering is the 1-based position among selected releases, a
    /// failure is recorded on the release and never stops the batch
    pub async fn import_selected_releases(
        &self,
        releases: &mut [SelectableRelease],
        artist_id: &str
    ) -> (Vec<ReleaseOutcome>, ImportTrace) {
        let mut trace = ImportTrace::new();
        let total = releases.iter().filter(|r| r.selected).count();
        trace.step(format!("Importing {total} selected releases"));

        let mut outcomes = Vec::with_capacity(total);
        for (i, release) in releases.iter_mut().filter(|r| r.selected).enumerate() {
            if i > 0 {
                pause(self.cfg.persist_delay).await;
            }

            let tracks = release.tracks.clone().unwrap_or_default();
            let payload = ReleasePayload::new(artist_id, &release.entry, i as u32 + 1, tracks);
            let title = release.entry.title.clone();

            match self.deps.releases.create_release(&payload).await {
                Ok(id) => {
                    trace.success(format!("Created {title}"));
                    release.status = ReleaseStatus::Created(id.clone());
                    outcomes.push(ReleaseOutcome { title, result: Ok(id) });
                }
                Err(e) => {
                    trace.failure(format!("{title}: {e}"));
                    release.status = ReleaseStatus::Failed(e.to_string());
                    outcomes.push(ReleaseOutcome { title, result: Err(e.to_string()) });
                }
            }
        }

        let created = outcomes.iter().filter(|o| o.is_success()).count();
        trace.step(format!("{created} of {total} releases created"));
        (outcomes, trace)
    }
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}

fn apply_years(record: &mut ArtistRecord, years: &YearsActive) {
    record.career_start = years.start;
    record.career_end = years.end;
    record.hiatus_intervals = years.hiatuses.clone();
}

/// Summary title without a trailing "(band)" style qualifier
fn display_name(summary: &ArticleSummary) -> String {
    let stripped = DISAMBIGUATION.replace(&summary.title, "");
    if stripped.trim().is_empty() {
        summary.title.clone()
    } else {
        stripped.trim().to_string()
    }
}
