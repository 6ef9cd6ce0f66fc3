//!
//! src/genre.rs
//!
//! Maps free-text genre labels onto one canonical genre and the exact
//! sub-style names we know about
//!

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct GenreRule {
    pub canonical: &'static str,
    pub keywords: &'static [&'static str]
}

/// Table order is the tie-break, the earlier rule wins on equal scores
pub const GENRE_RULES: &[GenreRule] = &[
    GenreRule {
        canonical: "Rock",
        keywords: &["rock", "grunge", "britpop", "shoegaze", "new wave"]
    },
    GenreRule {
        canonical: "Metal",
        keywords: &["metal", "metalcore", "deathcore", "djent", "grindcore"]
    },
    GenreRule {
        canonical: "Punk",
        keywords: &["punk", "hardcore", "emo", "oi!"]
    },
    GenreRule {
        canonical: "Pop",
        keywords: &["pop", "synth-pop", "synthpop", "k-pop", "j-pop", "dance-pop", "teen pop"]
    },
    GenreRule {
        canonical: "Hip-Hop",
        keywords: &["hip hop", "hip-hop", "rap", "trap", "grime", "drill"]
    },
    GenreRule {
        canonical: "Electronic",
        keywords: &[
            "electronic", "electronica", "techno", "house", "trance", "dubstep",
            "drum and bass", "edm", "ambient", "idm", "electro", "synthwave", "trip hop",
        ]
    },
    GenreRule {
        canonical: "R&B",
        keywords: &["r&b", "rhythm and blues", "soul", "funk", "disco"]
    },
    GenreRule {
        canonical: "Jazz",
        keywords: &["jazz", "bebop", "swing", "bossa nova"]
    },
    GenreRule {
        canonical: "Blues",
        keywords: &["blues", "delta blues"]
    },
    GenreRule {
        canonical: "Folk",
        keywords: &["folk", "singer-songwriter", "bluegrass", "celtic"]
    },
    GenreRule {
        canonical: "Country",
        keywords: &["country", "americana", "honky-tonk"]
    },
    GenreRule {
        canonical: "Classical",
        keywords: &["classical", "opera", "orchestral", "baroque", "contemporary classical"]
    },
    GenreRule {
        canonical: "Reggae",
        keywords: &["reggae", "dub", "ska", "dancehall", "rocksteady"]
    },
    GenreRule {
        canonical: "Latin",
        keywords: &["latin", "reggaeton", "salsa", "bachata", "cumbia"]
    },
    GenreRule {
        canonical: "Soundtrack",
        keywords: &["soundtrack", "film score", "video game music"]
    },
];

/// Sub-styles only count on an exact (case-insensitive) match
pub const SUB_STYLES: &[&str] = &[
    "alternative rock", "art rock", "blues rock", "britpop", "dream pop",
    "experimental rock", "folk rock", "garage rock", "glam rock", "gothic rock",
    "grunge", "hard rock", "indie rock", "post-punk", "post-rock", "progressive rock",
    "psychedelic rock", "punk rock", "shoegaze", "soft rock", "space rock",
    "black metal", "death metal", "doom metal", "heavy metal", "metalcore",
    "nu metal", "power metal", "progressive metal", "sludge metal", "thrash metal",
    "hardcore punk", "pop punk", "emo", "ska punk",
    "dance-pop", "electropop", "indie pop", "k-pop", "j-pop", "synth-pop", "teen pop",
    "boom bap", "gangsta rap", "trap", "conscious hip hop", "drill", "grime",
    "ambient", "drum and bass", "dubstep", "house", "idm", "industrial",
    "synthwave", "techno", "trance", "trip hop",
    "disco", "funk", "neo soul", "soul",
    "bebop", "bossa nova", "jazz fusion", "smooth jazz",
    "new wave", "noise rock", "math rock",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreClassification {
    pub canonical_genre: Option<String>,
    pub sub_styles: Vec<String>
}

fn dedup_labels<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    labels.iter()
        .map(|l| l.as_ref().trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .filter(|l| seen.insert(l.clone()))
        .collect()
}

fn score(rule: &GenreRule, labels: &[String]) -> usize {
    labels.iter()
        .map(|label| {
            rule.keywords.iter()
                .filter(|kw| label.as_str() == **kw || label.contains(**kw))
                .count()
        })
        .sum()
}

/// Canonical genre with the strictly highest score, first rule on ties
pub fn canonical_genre<S: AsRef<str>>(labels: &[S]) -> Option<&'static str> {
    // duplicates would inflate one rule's score, count each label once
    let labels = dedup_labels(labels);

    let mut best: Option<(&GenreRule, usize)> = None;
    for rule in GENRE_RULES {
        let s = score(rule, &labels);
        if s == 0 {
            continue;
        }
        match best {
            Some((_, top)) if s <= top => {}
            _ => best = Some((rule, s))
        }
    }
    best.map(|(rule, _)| rule.canonical)
}

/// Input labels that are exactly a known sub-style, first occurrence order
pub fn sub_styles<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    labels.iter()
        .map(|l| l.as_ref().trim())
        .filter(|l| {
            let lower = l.to_lowercase();
            SUB_STYLES.contains(&lower.as_str()) && seen.insert(lower)
        })
        .map(str::to_string)
        .collect()
}

pub fn classify<S: AsRef<str>>(labels: &[S]) -> GenreClassification {
    GenreClassification {
        canonical_genre: canonical_genre(labels).map(str::to_string),
        sub_styles: sub_styles(labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn highest_score_wins() {
        let labels = ["Alternative rock", "art rock", "trip hop", "Experimental rock"];
        assert_eq!(canonical_genre(&labels), Some("Rock"));

        let metal = ["Death metal", "Thrash metal", "hard rock"];
        assert_eq!(canonical_genre(&metal), Some("Metal"));
    }

    #[test]
    fn compound_labels_score_for_each_keyword() {
        // "synth-pop" hits both "pop" and "synth-pop"
        let labels = ["synth-pop", "rock"];
        assert_eq!(canonical_genre(&labels), Some("Pop"));
    }

    #[test]
    fn ties_keep_table_order() {
        let labels = ["jazz", "rock"];
        assert_eq!(canonical_genre(&labels), Some("Rock"));
        let reversed = ["rock", "jazz"];
        assert_eq!(canonical_genre(&reversed), Some("Rock"));
    }

    #[test]
    fn duplicates_never_change_the_winner() {
        let base = ["rock", "pop"];
        let dup = ["pop", "rock", "Pop", "pop "];
        assert_eq!(canonical_genre(&base), canonical_genre(&dup));
    }

    #[test]
    fn no_match_is_empty() {
        let labels = ["spoken word", "comedy"];
        assert_eq!(canonical_genre(&labels), None);
        let empty: [&str; 0] = [];
        assert_eq!(classify(&empty), GenreClassification::default());
    }

    #[test]
    fn sub_styles_require_exact_match() {
        let labels = ["Alternative rock", "alternative rock", "art-rock", "Trip hop", "rockish"];
        assert_eq!(sub_styles(&labels), vec!["Alternative rock", "Trip hop"]);
    }

    #[test]
    fn sub_styles_ignore_the_winning_rule() {
        let labels = ["Techno", "Rock", "Post-rock", "Indie rock"];
        let result = classify(&labels);
        assert_eq!(result.canonical_genre.as_deref(), Some("Rock"));
        assert_eq!(result.sub_styles, vec!["Techno", "Post-rock", "Indie rock"]);
    }
}
