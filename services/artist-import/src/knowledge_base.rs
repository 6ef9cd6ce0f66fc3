//!
//! src/knowledge_base.rs
//!
//! Reads biographical facts out of a knowledge base entity: entity type,
//! dates, gender, website, career span, country, social links and genre
//! labels. Missing claims are absent values, never errors
//!

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::country::{self, CountryHints};
use crate::errors::ImportError;
use crate::infobox::normalize_website;
use crate::source::KnowledgeBase;
use crate::types::{EntityType, Gender, PartialDate};

pub const INSTANCE_OF: &str = "P31";
pub const BIRTH_DATE: &str = "P569";
pub const DEATH_DATE: &str = "P570";
pub const SEX_OR_GENDER: &str = "P21";
pub const OFFICIAL_WEBSITE: &str = "P856";
pub const WORK_PERIOD_START: &str = "P2031";
pub const WORK_PERIOD_END: &str = "P2032";
pub const CITIZENSHIP: &str = "P27";
pub const COUNTRY_OF_ORIGIN: &str = "P495";
pub const COUNTRY: &str = "P17";
pub const FORMATION_LOCATION: &str = "P740";
pub const GENRE: &str = "P136";

pub const HUMAN: &str = "Q5";

pub const GROUP_TYPES: &[&str] = &[
    "Q215380",   // musical group
    "Q5741069",  // rock band
    "Q2088357",  // musical ensemble
    "Q9212979",  // musical duo
    "Q216337",   // girl group
    "Q641066",   // boy band
];

pub const GENDERS: &[(&str, Gender)] = &[
    ("Q6581097", Gender::Male),
    ("Q6581072", Gender::Female),
];

/// Claim id, platform key, url template (`{}` is the claim value)
pub const SOCIAL_PLATFORMS: &[(&str, &str, &str)] = &[
    ("P2002", "twitter", "https://twitter.com/{}"),
    ("P2003", "instagram", "https://www.instagram.com/{}"),
    ("P2013", "facebook", "https://www.facebook.com/{}"),
    ("P2397", "youtube", "https://www.youtube.com/channel/{}"),
    ("P1902", "spotify", "https://open.spotify.com/artist/{}"),
    ("P2850", "apple_music", "https://music.apple.com/artist/{}"),
    ("P3040", "soundcloud", "https://soundcloud.com/{}"),
    ("P3283", "bandcamp", "https://{}.bandcamp.com"),
    ("P7085", "tiktok", "https://www.tiktok.com/@{}"),
    ("P3185", "vk", "https://vk.com/{}"),
    ("P1953", "discogs", "https://www.discogs.com/artist/{}"),
    ("P434", "musicbrainz", "https://musicbrainz.org/artist/{}"),
    ("P3192", "lastfm", "https://www.last.fm/music/{}"),
    ("P2373", "genius", "https://genius.com/artists/{}"),
];

/// Hosts (and their subdomains) that belong in social links, not website
pub const WEBSITE_DENYLIST: &[&str] = &[
    "facebook.com", "twitter.com", "x.com", "instagram.com", "youtube.com", "youtu.be",
    "soundcloud.com", "bandcamp.com", "spotify.com", "apple.com", "amazon.com",
    "amazon.co.uk", "amazon.de", "amazon.fr", "amazon.co.jp", "discogs.com",
    "musicbrainz.org", "myspace.com", "last.fm", "vk.com", "tiktok.com", "allmusic.com",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ClaimValue {
    Item(String),
    Time { time: String, precision: u8 },
    Str(String),
    Other
}

/// Claims of one entity keyed by claim id, deprecated statements dropped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KnowledgeEntity {
    pub id: String,
    pub claims: HashMap<String, Vec<ClaimValue>>
}

impl KnowledgeEntity {
    /// Parses one `entities[id]` object of a `wbgetentities` response
    pub fn from_json(id: &str, entity: &Value) -> Result<Self, ImportError> {
        if entity.get("missing").is_some() {
            return Err(ImportError::NotFound(format!("entity {id}")));
        }
        let Some(claims) = entity.get("claims").and_then(Value::as_object) else {
            return Ok( Self { id: id.to_string(), claims: HashMap::new() } );
        };

        let claims = claims.iter()
            .map(|(prop, statements)| {
                let values = statements.as_array()
                    .map(|arr| {
                        arr.iter()
                            .filter(|s| s["rank"].as_str() != Some("deprecated"))
                            .filter_map(|s| parse_snak(&s["mainsnak"]))
                            .collect()
                    })
                    .unwrap_or_default();
                (prop.clone(), values)
            })
            .collect();

        Ok( Self { id: id.to_string(), claims } )
    }

    pub fn values(&self, prop: &str) -> &[ClaimValue] {
        self.claims.get(prop).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has(&self, prop: &str) -> bool {
        !self.values(prop).is_empty()
    }

    pub fn items(&self, prop: &str) -> Vec<&str> {
        self.values(prop).iter()
            .filter_map(|v| match v {
                ClaimValue::Item(id) => Some(id.as_str()),
                _ => None
            })
            .collect()
    }

    pub fn strings(&self, prop: &str) -> Vec<&str> {
        self.values(prop).iter()
            .filter_map(|v| match v {
                ClaimValue::Str(s) => Some(s.as_str()),
                _ => None
            })
            .collect()
    }

    pub fn first_date(&self, prop: &str) -> Option<PartialDate> {
        self.values(prop).iter().find_map(|v| match v {
            ClaimValue::Time { time, precision } => parse_time(time, *precision),
            _ => None
        })
    }
}

fn parse_snak(snak: &Value) -> Option<ClaimValue> {
    if snak["snaktype"].as_str() != Some("value") {
        return None;
    }
    let data = &snak["datavalue"];
    let value = &data["value"];
    let parsed = match data["type"].as_str()? {
        "wikibase-entityid" => ClaimValue::Item(value["id"].as_str()?.to_string()),
        "time" => ClaimValue::Time {
            time: value["time"].as_str()?.to_string(),
            precision: value["precision"].as_u64().unwrap_or(0) as u8
        },
        "string" => ClaimValue::Str(value.as_str()?.to_string()),
        "monolingualtext" => ClaimValue::Str(value["text"].as_str()?.to_string()),
        _ => ClaimValue::Other
    };
    Some(parsed)
}

/// `+1968-10-07T00:00:00Z` at precision 9 (year), 10 (month) or 11 (day)
pub fn parse_time(time: &str, precision: u8) -> Option<PartialDate> {
    if precision < 9 {
        return None;
    }
    let negative = time.starts_with('-');
    let date = time.trim_start_matches(['+', '-']).split('T').next()?;
    let mut parts = date.split('-');

    let year: i32 = parts.next()?.parse().ok()?;
    let year = if negative { -year } else { year };
    let nonzero = |p: Option<&str>| p.and_then(|s| s.parse::<u8>().ok()).filter(|n| *n > 0);
    let month = if precision >= 10 { nonzero(parts.next()) } else { None };
    let day = match month {
        Some(_) if precision >= 11 => nonzero(parts.next()),
        _ => None
    };
    Some(PartialDate { year, month, day })
}

/// `None` when the entity carries no evidence either way
pub fn entity_type(entity: &KnowledgeEntity) -> Option<EntityType> {
    let kinds = entity.items(INSTANCE_OF);
    if entity.has(BIRTH_DATE) || kinds.contains(&HUMAN) {
        return Some(EntityType::Person);
    }
    if kinds.iter().any(|k| GROUP_TYPES.contains(k)) {
        return Some(EntityType::Group);
    }
    None
}

pub fn gender(entity: &KnowledgeEntity) -> Gender {
    entity.items(SEX_OR_GENDER)
        .into_iter()
        .find_map(|id| GENDERS.iter().find(|(g, _)| *g == id).map(|(_, g)| *g))
        .unwrap_or_default()
}

fn is_denylisted(url: &str) -> bool {
    let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    else {
        return false;
    };
    WEBSITE_DENYLIST.iter().any(|d| {
        host == *d || host.strip_suffix(*d).is_some_and(|sub| sub.ends_with('.'))
    })
}

pub fn website(entity: &KnowledgeEntity) -> Option<String> {
    entity.strings(OFFICIAL_WEBSITE)
        .into_iter()
        .filter_map(normalize_website)
        .find(|url| !is_denylisted(url))
}

/// Synthesized so the years-active parser handles both sources
pub fn years_active_text(entity: &KnowledgeEntity) -> Option<String> {
    let start = entity.first_date(WORK_PERIOD_START)?.year;
    match entity.first_date(WORK_PERIOD_END) {
        Some(end) => Some(format!("{start}–{}", end.year)),
        None => Some(format!("{start}–present"))
    }
}

fn first_country(entity: &KnowledgeEntity, props: &[&str]) -> Option<String> {
    props.iter()
        .flat_map(|p| entity.items(p))
        .find_map(country::country_for_id)
        .map(str::to_string)
}

pub fn country_hints(entity: &KnowledgeEntity) -> CountryHints {
    CountryHints {
        nationality: first_country(entity, &[CITIZENSHIP]),
        origin: first_country(entity, &[COUNTRY_OF_ORIGIN, FORMATION_LOCATION]),
        country: first_country(entity, &[COUNTRY])
    }
}

pub fn social_links(entity: &KnowledgeEntity) -> BTreeMap<String, String> {
    SOCIAL_PLATFORMS.iter()
        .filter_map(|(prop, key, template)| {
            let handle = entity.strings(prop).into_iter().map(str::trim).find(|s| !s.is_empty())?;
            Some((key.to_string(), template.replace("{}", handle)))
        })
        .collect()
}

/// Which fields the infobox already supplied, plus the text the country
/// scan falls back to
#[derive(Debug, Clone, Default)]
pub struct Precedence<'a> {
    pub has_website: bool,
    pub has_years_active: bool,
    pub has_genres: bool,
    pub fallback_text: &'a str,
    pub lang: &'a str
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeFacts {
    pub entity_type: Option<EntityType>,
    pub birth_date: Option<PartialDate>,
    pub death_date: Option<PartialDate>,
    pub gender: Gender,
    pub website: Option<String>,
    pub years_active_raw: Option<String>,
    pub country: Option<String>,
    pub social_links: BTreeMap<String, String>,
    pub genre_labels: Vec<String>
}

impl KnowledgeFacts {
    pub fn entity_type_or_default(&self) -> EntityType {
        self.entity_type.unwrap_or_default()
    }
}

/// Everything except genre labels, which need a second lookup
pub fn facts(entity: &KnowledgeEntity, precedence: &Precedence<'_>) -> KnowledgeFacts {
    KnowledgeFacts {
        entity_type: entity_type(entity),
        birth_date: entity.first_date(BIRTH_DATE),
        death_date: entity.first_date(DEATH_DATE),
        gender: gender(entity),
        website: if precedence.has_website { None } else { website(entity) },
        years_active_raw: if precedence.has_years_active { None } else { years_active_text(entity) },
        country: country::resolve_country(&country_hints(entity), precedence.fallback_text),
        social_links: social_links(entity),
        genre_labels: Vec::new()
    }
}

/// Resolves the facts of a fetched entity. A failed label lookup only
/// drops the genre labels
pub async fn resolve_entity(
    kb: &dyn KnowledgeBase,
    entity: &KnowledgeEntity,
    precedence: &Precedence<'_>
) -> KnowledgeFacts {
    let mut out = facts(entity, precedence);
    debug!(entity = %entity.id, claims = entity.claims.len(), "kb.entity");

    if precedence.has_genres {
        return out;
    }
    let genre_ids: Vec<String> = entity.items(GENRE).into_iter().map(str::to_string).collect();
    if genre_ids.is_empty() {
        return out;
    }

    match kb.labels(&genre_ids, precedence.lang).await {
        Ok(labels) => {
            out.genre_labels = genre_ids.iter()
                .filter_map(|id| labels.get(id).cloned())
                .collect();
        }
        Err(e) => warn!(entity = %entity.id, error = %e, "kb.labels.fail")
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    fn item(id: &str) -> Value {
        json!({ "mainsnak": { "snaktype": "value",
            "datavalue": { "type": "wikibase-entityid", "value": { "id": id } } },
            "rank": "normal" })
    }

    fn time(t: &str, precision: u8) -> Value {
        json!({ "mainsnak": { "snaktype": "value",
            "datavalue": { "type": "time", "value": { "time": t, "precision": precision } } },
            "rank": "normal" })
    }

    fn string(s: &str) -> Value {
        json!({ "mainsnak": { "snaktype": "value",
            "datavalue": { "type": "string", "value": s } },
            "rank": "normal" })
    }

    fn thom_yorke() -> KnowledgeEntity {
        let raw = json!({
            "id": "Q49481",
            "claims": {
                "P31": [item("Q5")],
                "P569": [time("+1968-10-07T00:00:00Z", 11)],
                "P21": [item("Q6581097")],
                "P27": [item("Q145")],
                "P856": [string("https://www.facebook.com/thomyorke"), string("thomyorke.com/")],
                "P2003": [string("thomyorke")],
                "P1902": [string("4CvTDPKA6W06DRfBnZKrau")],
                "P3283": [string("thomyorke")],
                "P136": [item("Q11366"), item("Q236932"), item("Q9778")]
            }
        });
        KnowledgeEntity::from_json("Q49481", &raw).unwrap()
    }

    struct FakeKb {
        entity: KnowledgeEntity,
        labels_fail: bool
    }

    #[async_trait]
    impl KnowledgeBase for FakeKb {
        async fn entity(&self, id: &str) -> Result<KnowledgeEntity, ImportError> {
            if id == self.entity.id {
                Ok(self.entity.clone())
            } else {
                Err(ImportError::NotFound(id.to_string()))
            }
        }

        async fn labels(
            &self,
            ids: &[String],
            _lang: &str
        ) -> Result<HashMap<String, String>, ImportError> {
            if self.labels_fail {
                return Err(ImportError::Http("503".into()));
            }
            let known = [("Q11366", "alternative rock"), ("Q9778", "electronic music")];
            Ok(ids.iter()
                .filter_map(|id| known.iter().find(|(k, _)| *k == id.as_str()))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect())
        }
    }

    #[test]
    fn partial_dates_follow_precision() {
        assert_eq!(
            parse_time("+1968-10-07T00:00:00Z", 11),
            Some(PartialDate { year: 1968, month: Some(10), day: Some(7) })
        );
        assert_eq!(
            parse_time("+1968-10-00T00:00:00Z", 10),
            Some(PartialDate { year: 1968, month: Some(10), day: None })
        );
        assert_eq!(
            parse_time("+1968-00-00T00:00:00Z", 11),
            Some(PartialDate { year: 1968, month: None, day: None })
        );
        assert_eq!(parse_time("+1960-00-00T00:00:00Z", 8), None);
    }

    #[test]
    fn entity_type_evidence() {
        assert_eq!(entity_type(&thom_yorke()), Some(EntityType::Person));

        let band = KnowledgeEntity::from_json("Q44190", &json!({
            "claims": { "P31": [item("Q5741069")] }
        })).unwrap();
        assert_eq!(entity_type(&band), Some(EntityType::Group));

        // a birth date alone is enough
        let born = KnowledgeEntity::from_json("Q1", &json!({
            "claims": { "P31": [item("Q215380")], "P569": [time("+1980-01-01T00:00:00Z", 9)] }
        })).unwrap();
        assert_eq!(entity_type(&born), Some(EntityType::Person));

        let unknown = KnowledgeEntity::from_json("Q2", &json!({ "claims": {} })).unwrap();
        assert_eq!(entity_type(&unknown), None);
        assert_eq!(facts(&unknown, &Precedence::default()).entity_type_or_default(), EntityType::Person);
    }

    #[test]
    fn website_skips_denylisted_hosts() {
        assert_eq!(website(&thom_yorke()).as_deref(), Some("https://thomyorke.com"));
    }

    #[test]
    fn denylist_matches_whole_hosts_only() {
        let raw = json!({ "claims": { "P856": [
            string("https://x.com/phoenix"),
            string("https://m.facebook.com/phoenix"),
            string("https://www.wearephoenix.com")
        ] } });
        let phoenix = KnowledgeEntity::from_json("Q1136524", &raw).unwrap();
        assert_eq!(website(&phoenix).as_deref(), Some("https://www.wearephoenix.com"));

        assert!(is_denylisted("https://artist.bandcamp.com/album/x"));
        assert!(!is_denylisted("https://foxx.com"));
        assert!(!is_denylisted("https://max.com"));
    }

    #[test]
    fn social_links_use_templates() {
        let links = social_links(&thom_yorke());
        assert_eq!(links.get("instagram").map(String::as_str), Some("https://www.instagram.com/thomyorke"));
        assert_eq!(links.get("bandcamp").map(String::as_str), Some("https://thomyorke.bandcamp.com"));
        assert_eq!(
            links.get("spotify").map(String::as_str),
            Some("https://open.spotify.com/artist/4CvTDPKA6W06DRfBnZKrau")
        );
        assert!(!links.contains_key("twitter"));
    }

    #[test]
    fn deprecated_and_novalue_claims_are_dropped() {
        let raw = json!({ "claims": {
            "P21": [
                { "mainsnak": { "snaktype": "novalue" }, "rank": "normal" },
                { "mainsnak": { "snaktype": "value", "datavalue":
                    { "type": "wikibase-entityid", "value": { "id": "Q6581072" } } },
                  "rank": "deprecated" }
            ]
        }});
        let entity = KnowledgeEntity::from_json("Q3", &raw).unwrap();
        assert!(!entity.has(SEX_OR_GENDER));
        assert_eq!(gender(&entity), Gender::Unknown);
    }

    #[test]
    fn missing_entity_is_not_found() {
        let err = KnowledgeEntity::from_json("Q0", &json!({ "id": "Q0", "missing": "" })).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn years_active_from_work_period() {
        let open = KnowledgeEntity::from_json("Q4", &json!({ "claims": {
            "P2031": [time("+1985-00-00T00:00:00Z", 9)]
        }})).unwrap();
        assert_eq!(years_active_text(&open).as_deref(), Some("1985–present"));

        let closed = KnowledgeEntity::from_json("Q5", &json!({ "claims": {
            "P2031": [time("+1998-00-00T00:00:00Z", 9)],
            "P2032": [time("+2004-00-00T00:00:00Z", 9)]
        }})).unwrap();
        assert_eq!(years_active_text(&closed).as_deref(), Some("1998–2004"));
    }

    #[test]
    fn identifier_country_beats_text() {
        let facts = facts(&thom_yorke(), &Precedence {
            fallback_text: "an American musician",
            ..Default::default()
        });
        assert_eq!(facts.country.as_deref(), Some("United Kingdom"));

        let bare = KnowledgeEntity::from_json("Q6", &json!({ "claims": {} })).unwrap();
        let scanned = super::facts(&bare, &Precedence {
            fallback_text: "an American musician",
            ..Default::default()
        });
        assert_eq!(scanned.country.as_deref(), Some("United States"));
    }

    #[test]
    fn infobox_precedence_suppresses_fields() {
        let facts = facts(&thom_yorke(), &Precedence {
            has_website: true,
            has_years_active: true,
            ..Default::default()
        });
        assert_eq!(facts.website, None);
        assert_eq!(facts.years_active_raw, None);
        assert_eq!(facts.gender, Gender::Male);
    }

    #[tokio::test]
    async fn genre_labels_resolve_in_claim_order() {
        let kb = FakeKb { entity: thom_yorke(), labels_fail: false };
        let entity = kb.entity("Q49481").await.unwrap();
        let precedence = Precedence { lang: "en", ..Default::default() };
        let facts = resolve_entity(&kb, &entity, &precedence).await;
        assert_eq!(facts.genre_labels, vec!["alternative rock", "electronic music"]);
    }

    #[tokio::test]
    async fn infobox_genres_skip_label_lookup() {
        let kb = FakeKb { entity: thom_yorke(), labels_fail: false };
        let entity = kb.entity("Q49481").await.unwrap();
        let precedence = Precedence { has_genres: true, lang: "en", ..Default::default() };
        let facts = resolve_entity(&kb, &entity, &precedence).await;
        assert!(facts.genre_labels.is_empty());
    }

    #[tokio::test]
    async fn failed_labels_keep_other_facts() {
        let kb = FakeKb { entity: thom_yorke(), labels_fail: true };
        let entity = kb.entity("Q49481").await.unwrap();
        let precedence = Precedence { lang: "en", ..Default::default() };
        let facts = resolve_entity(&kb, &entity, &precedence).await;
        assert!(facts.genre_labels.is_empty());
        assert_eq!(facts.birth_date.map(|d| d.year), Some(1968));
    }
}
