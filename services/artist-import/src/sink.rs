//!
//! src/sink.rs
//!
//! Optional zstd archive of fetched raw material: article source,
//! summaries and knowledge base entities
//!

use std::io::Write;
use std::path::{Path, PathBuf};
use std::fs;

use serde::Serialize;

use crate::errors::ImportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotKind {
    ArticleSource,
    Summary,
    Entity,
    ReleaseSource
}

impl SnapshotKind {
    fn dir(self) -> &'static str {
        match self {
            SnapshotKind::ArticleSource => "raw/article",
            SnapshotKind::Summary       => "raw/summary",
            SnapshotKind::Entity        => "raw/entity",
            SnapshotKind::ReleaseSource => "raw/release"
        }
    }

    fn ext(self) -> &'static str {
        match self {
            SnapshotKind::ArticleSource | SnapshotKind::ReleaseSource => "wiki",
            SnapshotKind::Summary | SnapshotKind::Entity => "json"
        }
    }
}

pub struct SnapshotSink {
    root: PathBuf,
    level: i32
}

impl SnapshotSink {
    pub fn new(root: impl AsRef<Path>, level: i32) -> Self {
        Self { root: root.as_ref().to_path_buf(), level: level.clamp(0, 21) }
    }

    pub fn write_text(&self, kind: SnapshotKind, key: &str, text: &str) ->
        Result<PathBuf, ImportError> {
        self.write_with(kind, key, |enc| enc.write_all(text.as_bytes()).map_err(ImportError::from))
    }

    pub fn write_json<T: Serialize>(&self, kind: SnapshotKind, key: &str, value: &T) ->
        Result<PathBuf, ImportError> {
        self.write_with(kind, key, |enc| {
            serde_json::to_writer(enc, value)
                .map_err(|e| ImportError::Parse(format!("serialize json: {e}")))
        })
    }

    fn write_with<F>(&self, kind: SnapshotKind, key: &str, body: F) -> Result<PathBuf, ImportError>
    where
        F: FnOnce(&mut zstd::stream::write::Encoder<'_, &fs::File>) -> Result<(), ImportError>
    {
        let path = self.root.join(Self::rel_path(kind, &Self::sanitize_key(key)));
        let parent = path.parent()
            .ok_or_else(|| ImportError::Config(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(parent)?;

        let temp = tempfile::NamedTempFile::new_in(parent)?;
        {
            let mut enc = zstd::stream::write::Encoder::new(temp.as_file(), self.level)?;
            body(&mut enc)?;
            enc.finish()?;
        }

        temp.persist(&path).map_err(|e| ImportError::Io(e.error))?;
        Ok(path)
    }

    fn rel_path(kind: SnapshotKind, sanitized_key: &str) -> PathBuf {
        PathBuf::from(kind.dir()).join(format!("{sanitized_key}.{}.zst", kind.ext()))
    }

    fn sanitize_key(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}
