//!
//! src/discography.rs
//!
//! Single pass over a discography-style document. Section headers
//! switch the current release type and whether list items count as
//! releases at all
//!

use once_cell::sync::Lazy;
use regex::Regex;

use crate::markup;
use crate::types::{DiscographyEntry, ReleaseType};

static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(=+)\s*(.*?)\s*=+\s*$").unwrap());
static LIST_ITEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[*#]+\s*(.*)$").unwrap());
static LEADING_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\[([^\[\]|]+)(?:\|([^\[\]]*))?\]\]").unwrap());
static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^()]*?\b(\d{4})\b[^()]*\)").unwrap());

const SECTION_KEYWORDS: [&str; 6] =
    ["discography", "album", "single", "extended play", "release", "recording"];

/// Checked in order, "live albums" is live before it is studio
pub fn release_type_for(header: &str) -> Option<ReleaseType> {
    let lower = header.to_lowercase();
    let words: Vec<&str> = lower.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has = |w: &str| words.iter().any(|x| *x == w);

    if lower.contains("compilation") || lower.contains("greatest hits") {
        Some(ReleaseType::Compilation)
    } else if has("live") {
        Some(ReleaseType::Live)
    } else if has("ep") || has("eps") || lower.contains("extended play") {
        Some(ReleaseType::Ep)
    } else if lower.contains("single") {
        Some(ReleaseType::Single)
    } else if has("studio") || lower.contains("album") {
        Some(ReleaseType::Studio)
    } else {
        None
    }
}

fn enters_section(header: &str) -> bool {
    let lower = header.to_lowercase();
    SECTION_KEYWORDS.iter().any(|k| lower.contains(k)) || release_type_for(header).is_some()
}

/// Title, link target and trailing text of a release list item
fn split_item(item: &str) -> Option<(String, Option<String>, &str)> {
    let italic = item.starts_with("''");
    // singles are written "[[Song|Song]]", the quotes wrap the link
    let body = item.trim_start_matches(['\'', '"', '“']).trim_start();

    if let Some(caps) = LEADING_LINK.captures(body) {
        let target = caps.get(1)?.as_str().trim();
        let display = caps.get(2)
            .map(|d| d.as_str().trim())
            .filter(|d| !d.is_empty())
            .unwrap_or(target);
        let rest = &body[caps.get(0)?.end()..];
        let title = markup::clean_inline(display);
        return if title.is_empty() { None } else { Some((title, Some(target.to_string()), rest)) };
    }

    if italic {
        let end = body.find("''")?;
        let title = markup::clean_inline(&body[..end]);
        let rest = &body[end..];
        return if title.is_empty() { None } else { Some((title, None, rest)) };
    }
    None
}

#[derive(Debug, Clone, Copy)]
struct Section {
    level: usize
}

/// Entries in document order, duplicates kept
pub fn extract_discography(source: &str) -> Vec<DiscographyEntry> {
    let source = markup::strip_comments(source);
    let mut current = ReleaseType::Studio;
    let mut section: Option<Section> = None;
    let mut out = Vec::new();

    for line in source.lines() {
        let line = line.trim();

        if let Some(caps) = HEADER.captures(line) {
            let level = caps[1].len();
            let text = markup::clean_inline(&caps[2]);
            if let Some(kind) = release_type_for(&text) {
                current = kind;
            }
            match (enters_section(&text), section) {
                (true, None) => section = Some(Section { level }),
                (true, Some(s)) if level < s.level => section = Some(Section { level }),
                (false, Some(s)) if level <= s.level => section = None,
                _ => {}
            }
            continue;
        }

        if section.is_none() {
            continue;
        }
        let Some(caps) = LIST_ITEM.captures(line) else {
            continue;
        };
        let Some((title, source_ref, rest)) = split_item(caps[1].trim()) else {
            continue;
        };
        let year = YEAR.captures(rest).and_then(|c| c[1].parse().ok());

        out.push(DiscographyEntry { title, year, release_type: current, source_ref });
    }
    out
}
