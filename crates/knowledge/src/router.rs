//! Keyword router: question -> intent -> retrieval plan.
//!
//! Classification is a walk over [`ROUTES`] in priority order; the first
//! route whose keywords occur in the question wins and [`GENERAL`] catches
//! the rest. Each route carries its filter template and prompt id, so adding
//! an intent means adding a table row.

use crate::document::{DocType, TYPE_KEY};
use crate::normalize::canonical_city;
use crate::vector_index::MetadataFilter;
use serde::{Deserialize, Serialize};
use std::fmt;
use umrah_prompt::defaults;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Ritual,
    Attraction,
    Hotel,
    HotelLive,
    Review,
    Package,
    Train,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Ritual => "ritual",
            Intent::Attraction => "attraction",
            Intent::Hotel => "hotel",
            Intent::HotelLive => "hotel_live",
            Intent::Review => "review",
            Intent::Package => "package",
            Intent::Train => "train",
            Intent::General => "general",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a route turns a question into a metadata filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterTemplate {
    pub doc_type: Option<DocType>,
    /// Restrict to a city named in the question.
    pub lift_city: bool,
    /// Restrict by hotel features named in the question (views, stars, ...).
    pub lift_hotel_features: bool,
}

impl FilterTemplate {
    const NONE: FilterTemplate = FilterTemplate {
        doc_type: None,
        lift_city: false,
        lift_hotel_features: false,
    };

    const fn of(doc_type: DocType) -> Self {
        FilterTemplate {
            doc_type: Some(doc_type),
            lift_city: false,
            lift_hotel_features: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub intent: Intent,
    /// Any of these words or phrases selects the route.
    pub keywords: &'static [&'static str],
    /// When non-empty, one of these must also appear.
    pub requires: &'static [&'static str],
    pub filter: FilterTemplate,
    pub template_id: &'static str,
}

const HOTEL_WORDS: &[&str] = &[
    "hotel",
    "hotels",
    "room",
    "rooms",
    "stay",
    "accommodation",
    "lodging",
];

const HOTEL_FILTER: FilterTemplate = FilterTemplate {
    doc_type: Some(DocType::Hotel),
    lift_city: true,
    lift_hotel_features: true,
};

/// Routes in priority order.
pub static ROUTES: &[Route] = &[
    Route {
        intent: Intent::Ritual,
        keywords: &[
            "ritual",
            "rituals",
            "tawaf",
            "sai",
            "sa'i",
            "saee",
            "ihram",
            "miqat",
            "talbiyah",
            "halq",
            "taqsir",
            "niyyah",
            "how to perform",
            "steps of umrah",
        ],
        requires: &[],
        filter: FilterTemplate::of(DocType::RitualGuide),
        template_id: defaults::RITUAL,
    },
    Route {
        intent: Intent::Attraction,
        keywords: &[
            "attraction",
            "attractions",
            "visit",
            "places",
            "sightseeing",
            "ziyarat",
            "ziyarah",
            "museum",
            "historical",
            "things to do",
            "shopping",
            "restaurant",
            "restaurants",
        ],
        requires: &[],
        filter: FilterTemplate {
            doc_type: Some(DocType::DestinationInfo),
            lift_city: true,
            lift_hotel_features: false,
        },
        template_id: defaults::ATTRACTION,
    },
    Route {
        intent: Intent::HotelLive,
        keywords: &[
            "available",
            "availability",
            "vacancy",
            "book now",
            "booking",
            "tonight",
            "current price",
            "current prices",
            "price today",
            "live price",
            "right now",
        ],
        requires: HOTEL_WORDS,
        filter: HOTEL_FILTER,
        template_id: defaults::HOTEL_LIVE,
    },
    Route {
        intent: Intent::Hotel,
        keywords: &[
            "hotel",
            "hotels",
            "accommodation",
            "lodging",
            "stay",
            "room",
            "rooms",
            "kaaba view",
            "haram view",
            "walking distance",
            "shuttle",
        ],
        requires: &[],
        filter: HOTEL_FILTER,
        template_id: defaults::HOTEL,
    },
    Route {
        intent: Intent::Review,
        keywords: &[
            "review",
            "reviews",
            "experience",
            "experiences",
            "reddit",
            "opinion",
            "opinions",
            "recommend",
            "recommendation",
        ],
        requires: &[],
        filter: FilterTemplate::of(DocType::UserReview),
        template_id: defaults::REVIEW,
    },
    Route {
        intent: Intent::Package,
        keywords: &[
            "package",
            "packages",
            "tour operator",
            "travel agent",
            "agency",
            "all inclusive",
            "budget",
        ],
        requires: &[],
        filter: FilterTemplate::NONE,
        template_id: defaults::PACKAGE,
    },
    Route {
        intent: Intent::Train,
        keywords: &[
            "train",
            "trains",
            "haramain",
            "railway",
            "rail",
            "station",
            "transport",
            "bus",
            "taxi",
            "airport",
        ],
        requires: &[],
        filter: FilterTemplate::NONE,
        template_id: defaults::TRAIN,
    },
];

/// Fallback when no route matches.
pub static GENERAL: Route = Route {
    intent: Intent::General,
    keywords: &[],
    requires: &[],
    filter: FilterTemplate::NONE,
    template_id: defaults::GENERAL,
};

/// Retrieval configuration for one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalPlan {
    pub intent: Intent,
    pub filter: MetadataFilter,
    pub template_id: &'static str,
}

/// Lowercase, fold punctuation to spaces, drop possessive `'s` and pad, so
/// that `contains(" kw ")` is a whole-word (or whole-phrase) test.
fn normalize_question(question: &str) -> String {
    let folded: String = question
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '\u{2019}' | '\u{2018}' | '`' => '\'',
            c if c.is_alphanumeric() || c == '\'' => c,
            _ => ' ',
        })
        .collect();
    let words: Vec<&str> = folded
        .split_whitespace()
        .map(|word| word.strip_suffix("'s").unwrap_or(word))
        .collect();
    format!(" {} ", words.join(" "))
}

fn mentions(normalized: &str, phrase: &str) -> bool {
    normalized.contains(&format!(" {} ", phrase))
}

fn mentions_any(normalized: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| mentions(normalized, p))
}

impl Route {
    fn matches(&self, normalized: &str) -> bool {
        mentions_any(normalized, self.keywords)
            && (self.requires.is_empty() || mentions_any(normalized, self.requires))
    }
}

/// The route selected for `question`.
pub fn route_for(question: &str) -> &'static Route {
    let normalized = normalize_question(question);
    ROUTES
        .iter()
        .find(|route| route.matches(&normalized))
        .unwrap_or(&GENERAL)
}

pub fn classify(question: &str) -> Intent {
    route_for(question).intent
}

const CITY_NAMES: &[&str] = &["makkah", "mecca", "makka", "madinah", "madina", "medina"];

/// The single city the question names, if exactly one.
fn lift_city(normalized: &str) -> Option<String> {
    let mut found: Option<String> = None;
    for name in CITY_NAMES.iter().filter(|n| mentions(normalized, n)) {
        let canonical = canonical_city(name);
        match &found {
            Some(city) if *city != canonical => return None,
            _ => found = Some(canonical),
        }
    }
    found
}

const HOTEL_FEATURES: &[(&str, &str)] = &[
    ("kaaba view", "has_kaaba_view"),
    ("haram view", "has_haram_view"),
    ("walking distance", "walking_distance"),
    ("shuttle", "has_shuttle"),
];

/// Star rating from "5 star", "5-star" or "5 stars".
fn lift_stars(normalized: &str) -> Option<i64> {
    let words: Vec<&str> = normalized.split_whitespace().collect();
    words.windows(2).find_map(|pair| match pair {
        [n, "star" | "stars"] => n.parse::<i64>().ok().filter(|s| (1..=5).contains(s)),
        _ => None,
    })
}

/// Classify `question` and build its metadata filter.
pub fn plan(question: &str) -> RetrievalPlan {
    let route = route_for(question);
    let normalized = normalize_question(question);
    let mut filter = MetadataFilter::new();

    if let Some(doc_type) = route.filter.doc_type {
        filter.insert(TYPE_KEY, doc_type.as_str());
    }
    if route.filter.lift_city {
        if let Some(city) = lift_city(&normalized) {
            filter.insert("city", city);
        }
    }
    if route.filter.lift_hotel_features {
        for (phrase, key) in HOTEL_FEATURES {
            if mentions(&normalized, phrase) {
                filter.insert(*key, true);
            }
        }
        if let Some(stars) = lift_stars(&normalized) {
            filter.insert("stars", stars);
        }
    }

    RetrievalPlan {
        intent: route.intent,
        filter,
        template_id: route.template_id,
    }
}
