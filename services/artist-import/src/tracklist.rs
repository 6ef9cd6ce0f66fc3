//!
//! src/tracklist.rs
//!
//! Ordered track list of one release. Structured track listing
//! templates first, numbered list lines when none of them yield tracks
//!

use once_cell::sync::Lazy;
use regex::Regex;

use crate::markup::{self, TemplateFields};
use crate::types::TrackListEntry;

static NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\s*([^#*:].*)$").unwrap());
static TRAILING_DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*(?:[–—-]\s*\(?|\()(\d{1,2}:\d{2}(?::\d{2})?)\)?\s*$").unwrap()
});

const TEMPLATE_NAMES: [&str; 3] = ["track listing", "tracklist", "track list"];

fn strip_quotes(s: &str) -> &str {
    s.trim().trim_matches(|c| matches!(c, '"' | '“' | '”')).trim()
}

fn clean_title(raw: &str) -> String {
    strip_quotes(&markup::clean_inline(raw)).to_string()
}

/// Tracks of one template block, stopping at the first missing index
fn template_tracks(block: &str, position: &mut u32, out: &mut Vec<TrackListEntry>) {
    let fields = TemplateFields::parse(block);
    for n in 1.. {
        let Some(raw) = fields.get(&[format!("title{n}").as_str()]) else {
            break;
        };
        let title = clean_title(raw);
        let duration = fields.get(&[format!("length{n}").as_str()])
            .map(markup::clean_inline)
            .filter(|d| !d.is_empty());

        *position += 1;
        out.push(TrackListEntry { title, duration, position: *position });
    }
}

fn numbered_tracks(source: &str) -> Vec<TrackListEntry> {
    let mut out = Vec::new();
    for line in source.lines() {
        let line = line.trim();
        if line.to_lowercase().starts_with("#redirect") {
            continue;
        }
        let Some(caps) = NUMBERED.captures(line) else {
            continue;
        };
        let text = markup::clean_inline(&caps[1]);

        let (text, duration) = match TRAILING_DURATION.captures(&text) {
            Some(d) => {
                let start = d.get(0).map_or(text.len(), |m| m.start());
                (text[..start].to_string(), Some(d[1].to_string()))
            }
            None => (text.clone(), None)
        };
        let title = strip_quotes(&text).to_string();
        if title.is_empty() {
            continue;
        }
        out.push(TrackListEntry {
            title,
            duration,
            position: out.len() as u32 + 1
        });
    }
    out
}

/// Zero tracks is a valid result
pub fn extract_tracklist(source: &str) -> Vec<TrackListEntry> {
    let source = markup::strip_comments(source);

    let mut position = 0;
    let mut tracks = Vec::new();
    for block in markup::template_blocks(&source, |n| TEMPLATE_NAMES.contains(&n)) {
        template_tracks(block, &mut position, &mut tracks);
    }
    if !tracks.is_empty() {
        return tracks;
    }
    numbered_tracks(&source)
}
