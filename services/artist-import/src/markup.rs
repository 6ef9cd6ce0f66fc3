//!
//! src/markup.rs
//!
//! Small helpers over article source markup: template blocks, top level
//! field splitting, link and emphasis stripping. Nothing here fails,
//! malformed markup just yields less
//!

use once_cell::sync::Lazy;
use regex::Regex;

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static REF_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<ref[^>/]*>.*?</ref\s*>").unwrap());
static REF_SELF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<ref[^>]*/>").unwrap());
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\[\]|]+)(?:\|([^\[\]]*))?\]\]").unwrap());
static EXT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(https?://[^\s\]]+)(?:\s+([^\]]*))?\]").unwrap());
static EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"'{2,}").unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

/// A `[[target|display]]` link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiLink {
    pub target: String,
    pub display: String
}

pub fn strip_comments(s: &str) -> String {
    COMMENT.replace_all(s, "").into_owned()
}

pub fn strip_refs(s: &str) -> String {
    let s = REF_PAIR.replace_all(s, "");
    REF_SELF.replace_all(&s, "").into_owned()
}

pub fn links(s: &str) -> Vec<WikiLink> {
    LINK.captures_iter(s)
        .filter_map(|c| {
            let target = c.get(1)?.as_str().trim().to_string();
            let display = c.get(2)
                .map(|d| d.as_str().trim())
                .filter(|d| !d.is_empty())
                .unwrap_or(&target)
                .to_string();
            if target.is_empty() { None } else { Some(WikiLink { target, display }) }
        })
        .collect()
}

/// Replaces every internal link with its display text
pub fn unlink(s: &str) -> String {
    LINK.replace_all(s, |c: &regex::Captures| {
        match c.get(2).map(|d| d.as_str().trim()).filter(|d| !d.is_empty()) {
            Some(display) => display.to_string(),
            None => c[1].trim().to_string()
        }
    }).into_owned()
}

pub fn strip_emphasis(s: &str) -> String {
    EMPHASIS.replace_all(s, "").into_owned()
}

/// External `[url label]` links, in order
pub fn external_links(s: &str) -> Vec<(String, Option<String>)> {
    EXT_LINK.captures_iter(s)
        .map(|c| {
            let label = c.get(2)
                .map(|l| l.as_str().trim().to_string())
                .filter(|l| !l.is_empty());
            (c[1].to_string(), label)
        })
        .collect()
}

/// Byte offset just past the `}}` that closes the `{{` at `start`
pub fn block_end(s: &str, start: usize) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut depth = 0_usize;
    let mut i = start;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            depth += 1;
            i += 2;
            continue;
        }
        if bytes[i] == b'}' && bytes[i + 1] == b'}' {
            depth = depth.saturating_sub(1);
            i += 2;
            if depth == 0 {
                return Some(i);
            }
            continue;
        }
        i += 1;
    }
    None
}

/// Lowercased name of the template opening at `start`, underscores as spaces
fn template_name_at(s: &str, start: usize) -> String {
    let rest = &s[start + 2..];
    let end = rest.find(['|', '}', '\n']).unwrap_or(rest.len());
    rest[..end].trim().to_lowercase().replace('_', " ")
}

/// Inner text (without the outer braces) of every template whose name
/// satisfies `accept`, in document order
pub fn template_blocks<'a, F>(source: &'a str, accept: F) -> Vec<&'a str>
where
    F: Fn(&str) -> bool
{
    let mut out = Vec::new();
    let mut from = 0;
    while let Some(rel) = source[from..].find("{{") {
        let start = from + rel;
        let name = template_name_at(source, start);
        if accept(&name) {
            match block_end(source, start) {
                Some(end) => {
                    out.push(&source[start + 2..end - 2]);
                    from = end;
                }
                None => {
                    // unterminated, take the rest
                    out.push(&source[start + 2..]);
                    break;
                }
            }
        } else {
            from = start + 2;
        }
    }
    out
}

/// Drops every `{{…}}` block, keeping the surrounding text
pub fn strip_templates(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut from = 0;
    while let Some(rel) = s[from..].find("{{") {
        let start = from + rel;
        out.push_str(&s[from..start]);
        match block_end(s, start) {
            Some(end) => from = end,
            None => return out
        }
    }
    out.push_str(&s[from..]);
    out
}

const LIST_TEMPLATES: [&str; 10] = [
    "hlist", "flatlist", "flat list", "plainlist", "plain list", "ubl",
    "ubil", "unbulleted list", "nowrap", "br separated entries",
];

const DASH_TEMPLATES: [&str; 4] = ["ndash", "snd", "mdash", "spaced ndash"];

/// Replaces list-style templates with their items, one per line, dash
/// templates with a dash, and drops every other template
pub fn unwrap_list_templates(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut from = 0;
    while let Some(rel) = s[from..].find("{{") {
        let start = from + rel;
        out.push_str(&s[from..start]);
        let Some(end) = block_end(s, start) else {
            return out;
        };
        let name = template_name_at(s, start);
        if DASH_TEMPLATES.contains(&name.as_str()) {
            out.push('–');
        } else if LIST_TEMPLATES.contains(&name.as_str()) {
            let fields = TemplateFields::parse(&s[start + 2..end - 2]);
            let items: Vec<String> = fields.positional()
                .into_iter()
                .map(unwrap_list_templates)
                .collect();
            out.push('\n');
            out.push_str(&items.join("\n"));
            out.push('\n');
        }
        from = end;
    }
    out.push_str(&s[from..]);
    out
}

/// Splits on `sep` where it is not nested inside `{{…}}` or `[[…]]`
pub fn split_top_level(s: &str, sep: u8) -> Vec<&str> {
    let bytes = s.as_bytes();
    let mut parts = Vec::new();
    let mut braces = 0_i32;
    let mut brackets = 0_i32;
    let mut last = 0;
    let mut i = 0;
    while i < bytes.len() {
        let pair = if i + 1 < bytes.len() { Some((bytes[i], bytes[i + 1])) } else { None };
        match pair {
            Some((b'{', b'{')) => { braces += 1; i += 2; continue; }
            Some((b'}', b'}')) => { braces = (braces - 1).max(0); i += 2; continue; }
            Some((b'[', b'[')) => { brackets += 1; i += 2; continue; }
            Some((b']', b']')) => { brackets = (brackets - 1).max(0); i += 2; continue; }
            _ => {}
        }
        if bytes[i] == sep && braces == 0 && brackets == 0 {
            parts.push(&s[last..i]);
            last = i + 1;
        }
        i += 1;
    }
    parts.push(&s[last..]);
    parts
}

/// Parameters of one template, named keys normalized to
/// lowercase with underscores, positional ones numbered from 1
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateFields {
    pub name: String,
    pub fields: Vec<(String, String)>
}

impl TemplateFields {
    pub fn parse(inner: &str) -> Self {
        let inner = strip_comments(inner);
        let mut parts = split_top_level(&inner, b'|').into_iter();
        let name = parts.next().unwrap_or_default().trim().to_lowercase();

        let mut fields = Vec::new();
        let mut positional = 0;
        for part in parts {
            let eq = split_top_level(part, b'=');
            if eq.len() > 1 {
                let key = normalize_key(eq[0]);
                let value = part[eq[0].len() + 1..].trim().to_string();
                if !key.is_empty() {
                    fields.push((key, value));
                    continue;
                }
            }
            positional += 1;
            fields.push((positional.to_string(), part.trim().to_string()));
        }
        Self { name, fields }
    }

    /// First non-empty value among `keys`
    pub fn get(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| {
            self.fields.iter()
                .find(|(key, value)| key == k && !value.trim().is_empty())
                .map(|(_, value)| value.as_str())
        })
    }

    pub fn positional(&self) -> Vec<&str> {
        self.fields.iter()
            .filter(|(k, _)| k.chars().all(|c| c.is_ascii_digit()))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
}

/// Markup reduced to readable text: no refs, templates, links or tags
pub fn clean_inline(s: &str) -> String {
    let s = strip_comments(s);
    let s = strip_refs(&s);
    let s = strip_templates(&s);
    let s = unlink(&s);
    let s = EXT_LINK.replace_all(&s, |c: &regex::Captures| {
        c.get(2).map(|l| l.as_str().to_string()).unwrap_or_default()
    });
    let s = strip_emphasis(&s);
    let s = HTML_TAG.replace_all(&s, " ");
    let s = s.replace("&nbsp;", " ");
    SPACES.replace_all(s.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_prefer_display_text() {
        let found = links("[[Alternative rock]], [[Rock music|rock]] and [[ ]]");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].display, "Alternative rock");
        assert_eq!(found[1], WikiLink { target: "Rock music".into(), display: "rock".into() });
        assert_eq!(unlink("the [[Pablo Honey|debut]] album"), "the debut album");
    }

    #[test]
    fn template_blocks_respect_nesting() {
        let src = "intro {{Infobox musical artist\n| genre = {{hlist|[[Rock]]|[[Pop]]}}\n| origin = Oxford}} tail {{other}}";
        let blocks = template_blocks(src, |n| n.starts_with("infobox"));
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].ends_with("Oxford"));
        assert_eq!(strip_templates(src), "intro  tail ");
    }

    #[test]
    fn fields_split_at_top_level_only() {
        let fields = TemplateFields::parse(
            "Track listing\n| title1 = [[Airbag (song)|Airbag]] | length1 = 4:44\n| note1 = {{small|a=b}}\n| extra"
        );
        assert_eq!(fields.name, "track listing");
        assert_eq!(fields.get(&["title1"]), Some("[[Airbag (song)|Airbag]]"));
        assert_eq!(fields.get(&["length1"]), Some("4:44"));
        assert_eq!(fields.get(&["note1"]), Some("{{small|a=b}}"));
        assert_eq!(fields.positional(), vec!["extra"]);
    }

    #[test]
    fn keys_are_normalized() {
        let fields = TemplateFields::parse("Infobox\n| Years Active = 1991–present");
        assert_eq!(fields.get(&["years_active"]), Some("1991–present"));
    }

    #[test]
    fn clean_inline_reduces_markup() {
        let s = "''[[OK Computer]]''<ref>{{cite web|url=x}}</ref> <!-- c -->by '''Radiohead'''<br/>[https://radiohead.com site]";
        assert_eq!(clean_inline(s), "OK Computer by Radiohead site");
    }

    #[test]
    fn list_templates_unwrap_to_lines() {
        let s = "{{hlist|1991{{ndash}}2001|2005–present}}{{citation needed}}";
        assert_eq!(unwrap_list_templates(s), "\n1991–2001\n2005–present\n");

        // flatlist keeps its bullet body as one positional item
        let s = "{{flatlist|\n* [[Rock music|Rock]]\n* [[Jazz]]\n}}";
        assert!(unwrap_list_templates(s).contains("* [[Jazz]]"));
    }

    #[test]
    fn unterminated_template_does_not_panic() {
        assert_eq!(template_blocks("{{Tracklist | title1 = A", |n| n == "tracklist").len(), 1);
        assert_eq!(strip_templates("a {{b"), "a ");
        assert_eq!(block_end("{{a", 0), None);
    }
}
