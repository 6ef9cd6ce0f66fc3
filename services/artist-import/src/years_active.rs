//!
//! src/years_active.rs
//!
//! Parses free-form "years active" text into a career span and the
//! hiatus gaps between closed career segments
//!

use once_cell::sync::Lazy;
use regex::Regex;

use crate::markup;
use crate::types::{HiatusInterval, YearSegment};

static SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d{4})(?:\s*-\s*(\d{4}|\d{2}|present|now|current|today)\b)?").unwrap()
});
static BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

const DASHES: [char; 7] = ['–', '—', '‒', '―', '−', '‐', '-'];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YearsActive {
    pub start: Option<i32>,
    pub end: Option<i32>,
    pub hiatuses: Vec<HiatusInterval>,
    pub segments: Vec<YearSegment>
}

impl YearsActive {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Reduces residual markup to plain comma separated segments
fn normalize(raw: &str) -> String {
    let s = markup::strip_comments(raw);
    let s = markup::strip_refs(&s);
    let s = s.replace("&ndash;", "-").replace("&mdash;", "-");
    let s = markup::unwrap_list_templates(&s);
    let s = markup::unlink(&s);
    let s = markup::strip_emphasis(&s);
    let s = BREAK.replace_all(&s, ",");

    s.chars()
        .map(|c| match c {
            c if DASHES.contains(&c) => '-',
            '\n' | ';' | '*' | '•' | '·' => ',',
            c => c
        })
        .collect()
}

fn parse_segment(piece: &str) -> Option<YearSegment> {
    let caps = SEGMENT.captures(piece)?;
    let from_year: i32 = caps.get(1)?.as_str().parse().ok()?;

    let Some(end) = caps.get(2) else {
        return Some(YearSegment { from_year, to_year: None, is_single_year: true });
    };

    let end = end.as_str();
    if end.chars().all(|c| c.is_ascii_digit()) {
        let mut to_year: i32 = end.parse().ok()?;
        if end.len() == 2 {
            // 1998-04 style
            to_year += from_year - from_year % 100;
            if to_year < from_year {
                to_year += 100;
            }
        }
        Some(YearSegment { from_year, to_year: Some(to_year), is_single_year: false })
    } else {
        Some(YearSegment { from_year, to_year: None, is_single_year: false })
    }
}

pub fn segments(raw: &str) -> Vec<YearSegment> {
    normalize(raw)
        .split(',')
        .filter_map(parse_segment)
        .collect()
}

/// Never fails, unparseable pieces are skipped
pub fn parse_years_active(raw: &str) -> YearsActive {
    let segments = segments(raw);
    let Some(first) = segments.first() else {
        return YearsActive::default();
    };

    let ranges: Vec<&YearSegment> = segments.iter()
        .filter(|s| !s.is_single_year)
        .collect();

    let start = Some(first.from_year);
    // only single years: the last one closes the span, a lone one leaves it open
    let end = match ranges.last() {
        Some(last) => last.to_year,
        None if segments.len() > 1 => segments.last().map(|s| s.to_year.unwrap_or(s.from_year)),
        None => None
    };

    let hiatuses = ranges.windows(2)
        .filter_map(|pair| {
            let closed_end = pair[0].to_year?;
            let next_start = pair[1].from_year;
            if closed_end == next_start {
                None
            } else {
                Some(HiatusInterval { from_year: closed_end, to_year: Some(next_start) })
            }
        })
        .collect();

    YearsActive { start, end, hiatuses, segments }
}
