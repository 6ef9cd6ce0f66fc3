//!
//! src/infobox.rs
//!
//! Pulls the labeled fields we care about out of an article's infobox:
//! genres, website, raw years-active text, origin and background.
//! Every field is optional and extracted independently
//!

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::markup::{self, TemplateFields};
use crate::types::EntityType;

static FIELD_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\|\s*([A-Za-z_ ]+?)\s*=(.*)$").unwrap());

const GENRE_KEYS: [&str; 2] = ["genre", "genres"];
const WEBSITE_KEYS: [&str; 3] = ["website", "url", "homepage"];
const YEARS_KEYS: [&str; 2] = ["years_active", "yearsactive"];
const ORIGIN_KEYS: [&str; 3] = ["origin", "birth_place", "location"];

/// Leftovers of list templates that are never genres
const GENRE_ARTIFACTS: [&str; 12] = [
    "hlist", "flatlist", "flat list", "plainlist", "plain list", "ubl",
    "unbulleted list", "nowrap", "br", "small", "citation needed", "cn",
];

const URL_TEMPLATES: [&str; 4] = ["url", "official url", "official website", "website"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Infobox {
    pub fields: TemplateFields,
    /// false when no infobox block exists and fields came from loose lines
    pub from_block: bool
}

impl Infobox {
    pub fn parse(source: &str) -> Self {
        let blocks = markup::template_blocks(source, |name| name.starts_with("infobox"));
        if let Some(block) = blocks.first() {
            return Self { fields: TemplateFields::parse(block), from_block: true };
        }

        // no block, settle for single-line `| key = value` fields
        let fields = FIELD_LINE.captures_iter(source)
            .map(|c| (markup::normalize_key(&c[1]), c[2].trim().to_string()))
            .collect();
        Self {
            fields: TemplateFields { name: String::new(), fields },
            from_block: false
        }
    }

    pub fn get(&self, keys: &[&str]) -> Option<&str> {
        self.fields.get(keys)
    }

    /// Linked genres when any exist, otherwise split plain text
    pub fn genres(&self) -> Vec<String> {
        let Some(raw) = self.get(&GENRE_KEYS) else {
            return Vec::new();
        };
        let raw = markup::strip_refs(&markup::strip_comments(raw));

        let linked: Vec<String> = markup::links(&raw)
            .into_iter()
            .filter(|l| !l.target.contains(':'))
            .map(|l| markup::strip_emphasis(&l.display).trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        if !linked.is_empty() {
            return linked;
        }

        let flat = markup::unwrap_list_templates(&raw);
        let flat = markup::strip_emphasis(&markup::unlink(&flat));
        flat.split([',', '\n', '*', '•', '·'])
            .map(|t| t.trim().trim_matches(|c| c == '{' || c == '}' || c == '|').trim())
            .filter(|t| t.chars().count() > 1)
            .filter(|t| !GENRE_ARTIFACTS.contains(&t.to_lowercase().as_str()))
            .map(str::to_string)
            .collect()
    }

    pub fn website(&self) -> Option<String> {
        let raw = self.get(&WEBSITE_KEYS)?;
        let raw = markup::strip_refs(&markup::strip_comments(raw));

        let templated = markup::template_blocks(&raw, |n| URL_TEMPLATES.contains(&n))
            .into_iter()
            .find_map(|block| {
                TemplateFields::parse(block).positional().first().map(|s| s.to_string())
            });
        if let Some(candidate) = templated {
            return normalize_website(&candidate);
        }

        if let Some((url, _)) = markup::external_links(&raw).into_iter().next() {
            return normalize_website(&url);
        }

        let plain = markup::clean_inline(&raw);
        plain.split_whitespace().find_map(normalize_website)
    }

    /// Unprocessed, the years-active parser owns the interpretation
    pub fn years_active_raw(&self) -> Option<String> {
        self.get(&YEARS_KEYS).map(|s| s.trim().to_string())
    }

    pub fn origin(&self) -> Option<String> {
        let origin = markup::clean_inline(self.get(&ORIGIN_KEYS)?);
        if origin.is_empty() { None } else { Some(origin) }
    }

    pub fn name(&self) -> Option<String> {
        let name = markup::clean_inline(self.get(&["name"])?);
        if name.is_empty() { None } else { Some(name) }
    }

    pub fn entity_hint(&self) -> Option<EntityType> {
        let background = self.get(&["background"])?.trim().to_lowercase();
        match background.as_str() {
            "group_or_band" | "group" | "band" | "classical_ensemble"
                | "cover_band" => Some(EntityType::Group),
            "solo_singer" | "non_vocal_instrumentalist" | "non_performing_personnel"
                | "classical_composer" | "solo" => Some(EntityType::Person),
            _ => None
        }
    }
}

/// Scheme-prefixed, trailing slash stripped, or nothing
pub fn normalize_website(candidate: &str) -> Option<String> {
    let c = candidate.trim().trim_matches(|c| c == '<' || c == '>' || c == '"');
    if c.is_empty() {
        return None;
    }
    let prefixed = if c.starts_with("//") {
        format!("https:{c}")
    } else if c.contains("://") {
        c.to_string()
    } else {
        format!("https://{c}")
    };

    let url = Url::parse(&prefixed).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    if !url.host_str().is_some_and(|h| h.contains('.')) {
        return None;
    }
    Some(url.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RADIOHEAD: &str = r#"
{{Short description|English rock band}}
{{Infobox musical artist
| name = Radiohead
| image = Radiohead.jpg
| background = group_or_band
| origin = [[Abingdon-on-Thames|Abingdon]], Oxfordshire, England
| genre = {{flatlist|
* [[Alternative rock]]
* [[art rock]]
* [[Experimental rock|experimental]]<ref>{{cite web|title=[[Rock]]}}</ref>
* [[electronica]]
}}
| years_active = 1985–present
| label = {{hlist|[[Parlophone]]|[[XL Recordings|XL]]}}
| website = {{URL|radiohead.com}}
}}
'''Radiohead''' are an English rock band formed in Abingdon, Oxfordshire, in 1985.
"#;

    #[test]
    fn genres_prefer_links() {
        let infobox = Infobox::parse(RADIOHEAD);
        assert!(infobox.from_block);
        assert_eq!(
            infobox.genres(),
            vec!["Alternative rock", "art rock", "experimental", "electronica"]
        );
    }

    #[test]
    fn genres_fall_back_to_plain_text() {
        let src = "{{Infobox musical artist\n| genre = {{hlist|Post-rock|ambient|x}}, drone\n}}";
        let infobox = Infobox::parse(src);
        assert_eq!(infobox.genres(), vec!["Post-rock", "ambient", "drone"]);
    }

    #[test]
    fn website_forms() {
        assert_eq!(
            Infobox::parse(RADIOHEAD).website().as_deref(),
            Some("https://radiohead.com")
        );

        let wrapped = "{{Infobox musical artist\n| website = {{url|https://www.sigur-ros.co.uk/|Official site}}\n}}";
        assert_eq!(
            Infobox::parse(wrapped).website().as_deref(),
            Some("https://www.sigur-ros.co.uk")
        );

        let bracketed = "{{Infobox musical artist\n| website = [http://portishead.co.uk/ portishead.co.uk]\n}}";
        assert_eq!(
            Infobox::parse(bracketed).website().as_deref(),
            Some("http://portishead.co.uk")
        );

        let bare = "{{Infobox musical artist\n| website = www.bjork.com\n}}";
        assert_eq!(Infobox::parse(bare).website().as_deref(), Some("https://www.bjork.com"));

        let wikidata_only = "{{Infobox musical artist\n| website = {{Official URL}}\n}}";
        assert_eq!(Infobox::parse(wikidata_only).website(), None);
    }

    #[test]
    fn years_active_is_raw() {
        let infobox = Infobox::parse(RADIOHEAD);
        assert_eq!(infobox.years_active_raw().as_deref(), Some("1985–present"));
    }

    #[test]
    fn other_fields() {
        let infobox = Infobox::parse(RADIOHEAD);
        assert_eq!(infobox.origin().as_deref(), Some("Abingdon, Oxfordshire, England"));
        assert_eq!(infobox.name().as_deref(), Some("Radiohead"));
        assert_eq!(infobox.entity_hint(), Some(EntityType::Group));
    }

    #[test]
    fn background_hints() {
        let hint = |bg: &str| {
            Infobox::parse(&format!("{{{{Infobox musical artist\n| background = {bg}\n}}}}"))
                .entity_hint()
        };
        assert_eq!(hint("cover_band"), Some(EntityType::Group));
        assert_eq!(hint("solo_singer"), Some(EntityType::Person));
        assert_eq!(hint("unknown"), None);
    }

    #[test]
    fn fields_are_independent() {
        let src = "{{Infobox musical artist\n| years_active = 2001–2008\n}}";
        let infobox = Infobox::parse(src);
        assert!(infobox.genres().is_empty());
        assert_eq!(infobox.website(), None);
        assert_eq!(infobox.years_active_raw().as_deref(), Some("2001–2008"));
    }

    #[test]
    fn loose_fields_without_block() {
        let src = "some text\n| genre = [[Trip hop]]\n| website = massiveattack.com\n";
        let infobox = Infobox::parse(src);
        assert!(!infobox.from_block);
        assert_eq!(infobox.genres(), vec!["Trip hop"]);
        assert_eq!(infobox.website().as_deref(), Some("https://massiveattack.com"));
    }

    #[test]
    fn junk_website_is_rejected() {
        assert_eq!(normalize_website("n/a"), None);
        assert_eq!(normalize_website("ftp://files.example.com"), None);
        assert_eq!(normalize_website("//cdn.example.org/"), Some("https://cdn.example.org".into()));
    }
}
