//!
//! src/country.rs
//!
//! Resolves a country of origin from structured identifiers, falling
//! back to a phrase scan over biographical prose
//!

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Knowledge base item id -> country display name
pub const COUNTRY_IDS: &[(&str, &str)] = &[
    ("Q30", "United States"),
    ("Q145", "United Kingdom"),
    ("Q21", "United Kingdom"),   // England
    ("Q22", "United Kingdom"),   // Scotland
    ("Q25", "United Kingdom"),   // Wales
    ("Q26", "United Kingdom"),   // Northern Ireland
    ("Q16", "Canada"),
    ("Q408", "Australia"),
    ("Q664", "New Zealand"),
    ("Q27", "Ireland"),
    ("Q183", "Germany"),
    ("Q142", "France"),
    ("Q38", "Italy"),
    ("Q29", "Spain"),
    ("Q45", "Portugal"),
    ("Q55", "Netherlands"),
    ("Q31", "Belgium"),
    ("Q39", "Switzerland"),
    ("Q40", "Austria"),
    ("Q34", "Sweden"),
    ("Q20", "Norway"),
    ("Q33", "Finland"),
    ("Q35", "Denmark"),
    ("Q189", "Iceland"),
    ("Q36", "Poland"),
    ("Q213", "Czech Republic"),
    ("Q28", "Hungary"),
    ("Q218", "Romania"),
    ("Q41", "Greece"),
    ("Q43", "Turkey"),
    ("Q159", "Russia"),
    ("Q15180", "Russia"),        // Soviet Union
    ("Q212", "Ukraine"),
    ("Q184", "Belarus"),
    ("Q17", "Japan"),
    ("Q884", "South Korea"),
    ("Q148", "China"),
    ("Q865", "Taiwan"),
    ("Q668", "India"),
    ("Q155", "Brazil"),
    ("Q96", "Mexico"),
    ("Q414", "Argentina"),
    ("Q298", "Chile"),
    ("Q739", "Colombia"),
    ("Q241", "Cuba"),
    ("Q766", "Jamaica"),
    ("Q1183", "Puerto Rico"),
    ("Q258", "South Africa"),
    ("Q1033", "Nigeria"),
    ("Q801", "Israel"),
];

static COUNTRY_BY_ID: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| COUNTRY_IDS.iter().copied().collect());

/// Checked before any single-word phrase so "new zealand" never
/// resolves through a shorter fragment
pub const MULTI_WORD_PHRASES: &[(&str, &str)] = &[
    ("united states of america", "United States"),
    ("united states", "United States"),
    ("united kingdom", "United Kingdom"),
    ("great britain", "United Kingdom"),
    ("northern ireland", "United Kingdom"),
    ("new zealand", "New Zealand"),
    ("south korea", "South Korea"),
    ("south korean", "South Korea"),
    ("south africa", "South Africa"),
    ("south african", "South Africa"),
    ("czech republic", "Czech Republic"),
    ("puerto rico", "Puerto Rico"),
    ("puerto rican", "Puerto Rico"),
    ("new york", "United States"),
    ("los angeles", "United States"),
];

pub const SINGLE_WORD_PHRASES: &[(&str, &str)] = &[
    ("american", "United States"),
    ("usa", "United States"),
    ("british", "United Kingdom"),
    ("english", "United Kingdom"),
    ("england", "United Kingdom"),
    ("scottish", "United Kingdom"),
    ("scotland", "United Kingdom"),
    ("welsh", "United Kingdom"),
    ("wales", "United Kingdom"),
    ("london", "United Kingdom"),
    ("canadian", "Canada"),
    ("canada", "Canada"),
    ("australian", "Australia"),
    ("australia", "Australia"),
    ("irish", "Ireland"),
    ("ireland", "Ireland"),
    ("german", "Germany"),
    ("germany", "Germany"),
    ("french", "France"),
    ("france", "France"),
    ("italian", "Italy"),
    ("italy", "Italy"),
    ("spanish", "Spain"),
    ("spain", "Spain"),
    ("portuguese", "Portugal"),
    ("dutch", "Netherlands"),
    ("netherlands", "Netherlands"),
    ("belgian", "Belgium"),
    ("swiss", "Switzerland"),
    ("austrian", "Austria"),
    ("swedish", "Sweden"),
    ("sweden", "Sweden"),
    ("norwegian", "Norway"),
    ("norway", "Norway"),
    ("finnish", "Finland"),
    ("finland", "Finland"),
    ("danish", "Denmark"),
    ("icelandic", "Iceland"),
    ("iceland", "Iceland"),
    ("polish", "Poland"),
    ("czech", "Czech Republic"),
    ("hungarian", "Hungary"),
    ("greek", "Greece"),
    ("turkish", "Turkey"),
    ("russian", "Russia"),
    ("russia", "Russia"),
    ("soviet", "Russia"),
    ("ukrainian", "Ukraine"),
    ("ukraine", "Ukraine"),
    ("belarusian", "Belarus"),
    ("japanese", "Japan"),
    ("japan", "Japan"),
    ("korean", "South Korea"),
    ("chinese", "China"),
    ("taiwanese", "Taiwan"),
    ("indian", "India"),
    ("brazilian", "Brazil"),
    ("brazil", "Brazil"),
    ("mexican", "Mexico"),
    ("mexico", "Mexico"),
    ("argentine", "Argentina"),
    ("argentinian", "Argentina"),
    ("chilean", "Chile"),
    ("colombian", "Colombia"),
    ("cuban", "Cuba"),
    ("jamaican", "Jamaica"),
    ("nigerian", "Nigeria"),
    ("israeli", "Israel"),
];

/// Structured values, already mapped to display names where possible
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountryHints {
    pub nationality: Option<String>,
    pub origin: Option<String>,
    pub country: Option<String>
}

pub fn country_for_id(id: &str) -> Option<&'static str> {
    COUNTRY_BY_ID.get(id).copied()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
}

/// Earliest whole-word occurrence of `needle` in `hay` (both lowercase)
fn find_phrase(hay: &str, needle: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(rel) = hay[from..].find(needle) {
        let at = from + rel;
        let end = at + needle.len();
        let before_ok = hay[..at].chars().next_back().is_none_or(|c| !is_word_char(c));
        let after_ok = hay[end..].chars().next().is_none_or(|c| !is_word_char(c));
        if before_ok && after_ok {
            return Some(at);
        }
        from = at + needle.chars().next().map_or(1, char::len_utf8);
    }
    None
}

/// First phrase of a tier by position in the text
fn scan_tier(hay: &str, tier: &[(&str, &'static str)]) -> Option<&'static str> {
    tier.iter()
        .filter_map(|(phrase, country)| find_phrase(hay, phrase).map(|at| (at, *country)))
        .min_by_key(|(at, _)| *at)
        .map(|(_, country)| country)
}

pub fn scan_text(text: &str) -> Option<&'static str> {
    let hay = text.to_lowercase();
    scan_tier(&hay, MULTI_WORD_PHRASES)
        .or_else(|| scan_tier(&hay, SINGLE_WORD_PHRASES))
}

/// Structured hints in priority order, then the text scan
pub fn resolve_country(hints: &CountryHints, fallback_text: &str) -> Option<String> {
    [&hints.nationality, &hints.origin, &hints.country]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| scan_text(fallback_text).map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_hint_beats_text() {
        let hints = CountryHints {
            nationality: None,
            origin: Some("Canada".into()),
            country: Some("France".into())
        };
        let text = "An English rock band formed in London";
        assert_eq!(resolve_country(&hints, text).as_deref(), Some("Canada"));
    }

    #[test]
    fn nationality_has_top_priority() {
        let hints = CountryHints {
            nationality: Some("Iceland".into()),
            origin: Some("United Kingdom".into()),
            country: None
        };
        assert_eq!(resolve_country(&hints, "").as_deref(), Some("Iceland"));
    }

    #[test]
    fn blank_hints_fall_through_to_text() {
        let hints = CountryHints { nationality: Some("  ".into()), ..Default::default() };
        let text = "Radiohead are an English rock band formed in Abingdon";
        assert_eq!(resolve_country(&hints, text).as_deref(), Some("United Kingdom"));
    }

    #[test]
    fn multi_word_phrases_win_over_fragments() {
        // "dutch" appears first but the multi-word tier is scanned before it
        let text = "A Dutch-born duo based in New Zealand";
        assert_eq!(scan_text(text), Some("New Zealand"));
    }

    #[test]
    fn earliest_single_word_wins() {
        let text = "a Swedish band that later relocated to Germany";
        assert_eq!(scan_text(text), Some("Sweden"));
    }

    #[test]
    fn whole_words_only() {
        assert_eq!(scan_text("the frenchkiss label, an englishman"), None);
        assert_eq!(scan_text("nothing to see"), None);
    }

    #[test]
    fn id_table_lookup() {
        assert_eq!(country_for_id("Q145"), Some("United Kingdom"));
        assert_eq!(country_for_id("Q21"), Some("United Kingdom"));
        assert_eq!(country_for_id("Q999999"), None);
    }
}
