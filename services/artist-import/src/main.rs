//!
//! src/main.rs
//!
//! Command line entry: wires the production collaborators from the
//! environment and runs one import flow, printing its result as json
//!
//!   artist-import artist <url-or-title>
//!   artist-import discography <url-or-title>
//!   artist-import releases <url-or-title> <artist-id>
//!

use std::path::Path;
use std::sync::Arc;

use artist_import::config::{self, AppConfig};
use artist_import::errors::ImportError;
use artist_import::fetch::{WikidataClient, WikipediaClient};
use artist_import::images::DiskImageStore;
use artist_import::importer::{Collaborators, Importer};
use artist_import::persistent::Persistent;
use artist_import::sink::SnapshotSink;
use artist_import::translate;
use artist_import::types::SelectableRelease;
use artist_import::logging;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Artist(String),
    Discography(String),
    Releases { reference: String, artist_id: String }
}

const USAGE: &str =
    "usage: artist-import (artist <ref> | discography <ref> | releases <ref> <artist-id>)";

fn parse_args(args: &[String]) -> Result<Command, ImportError> {
    let usage = || ImportError::Config(USAGE.to_string());
    match args {
        [cmd, reference] if cmd == "artist" => Ok(Command::Artist(reference.clone())),
        [cmd, reference] if cmd == "discography" => Ok(Command::Discography(reference.clone())),
        [cmd, reference, artist_id] if cmd == "releases" => Ok(Command::Releases {
            reference: reference.clone(),
            artist_id: artist_id.clone()
        }),
        _ => Err(usage())
    }
}

/// Creates the parent directory of a file-backed sqlite url
fn ensure_db_dir(db_url: &str) -> Result<(), ImportError> {
    let Some(path) = db_url.strip_prefix("sqlite://").or_else(|| db_url.strip_prefix("sqlite:"))
    else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        return Ok(());
    }
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(std::fs::create_dir_all(parent)?),
        _ => Ok(())
    }
}

async fn build_importer(cfgs: &AppConfig) -> Result<Importer, ImportError> {
    ensure_db_dir(&cfgs.persistence.db_url)?;
    let db = Persistent::init(&cfgs.persistence.db_url).await?;

    let deps = Collaborators {
        articles: Arc::new(WikipediaClient::new(&cfgs.http, &cfgs.identity, &cfgs.wikipedia)?),
        knowledge: Arc::new(WikidataClient::new(&cfgs.http, &cfgs.identity, &cfgs.wikidata)?),
        translator: translate::translator(&cfgs.http, &cfgs.translation)?,
        images: Arc::new(DiskImageStore::new(&cfgs.http, &cfgs.identity, &cfgs.images)?),
        releases: Arc::new(db)
    };

    let importer = Importer::new(deps, cfgs.import.clone(), &cfgs.wikipedia.default_lang);
    Ok(match &cfgs.persistence.snapshot_root {
        Some(root) => importer.with_sink(SnapshotSink::new(root, cfgs.persistence.snapshot_level)),
        None => importer
    })
}

async fn run(importer: &Importer, command: Command) -> Result<serde_json::Value, ImportError> {
    match command {
        Command::Artist(reference) => {
            let (record, trace) = importer.import_artist(&reference).await?;
            Ok(serde_json::json!({ "artist": record, "trace": trace }))
        }
        Command::Discography(reference) => {
            let entries = importer.search_discography(&reference).await?;
            Ok(serde_json::json!({ "discography": entries }))
        }
        Command::Releases { reference, artist_id } => {
            let mut releases: Vec<SelectableRelease> = importer.search_discography(&reference)
                .await?
                .into_iter()
                .map(SelectableRelease::new)
                .collect();
            let tracklists = importer.fetch_all_tracklists(&mut releases).await;
            let (outcomes, persisted) =
                importer.import_selected_releases(&mut releases, &artist_id).await;
            Ok(serde_json::json!({
                "releases": releases,
                "outcomes": outcomes,
                "trace": { "tracklists": tracklists, "persist": persisted }
            }))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ImportError> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let cfgs = config::load_config()?;
    let _logger = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service = "artist-import",
        version = %env!("CARGO_PKG_VERSION"),
        command = ?command,
        "starting"
    );

    let importer = build_importer(&cfgs).await?;
    let out = run(&importer, command).await?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
