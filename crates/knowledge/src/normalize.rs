//! Record normalisation: one deterministic text template per source type.

use crate::document::{DocType, Document, MetaValue, Metadata, TYPE_KEY};
use crate::records::{
    DestinationRecord, HotelRecord, ReviewRecord, RitualRecord, SourceKind, SourceRecord,
};
use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use umrah_core::{AppError, AppResult};

/// Canonical lowercase city name, folding common spellings together.
pub fn canonical_city(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "mecca" | "makka" | "makkah" | "mekkah" | "makkah al mukarramah" => "makkah".to_string(),
        "medina" | "madina" | "madinah" | "al madinah" | "madinah al munawwarah" => {
            "madinah".to_string()
        }
        _ => lower,
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Feature flags derived from a hotel's room types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HotelFlags {
    pub has_kaaba_view: bool,
    pub has_haram_view: bool,
    pub walking_distance: bool,
    pub has_shuttle: bool,
}

impl HotelFlags {
    /// Case-insensitive membership tests over `room_types`.
    pub fn from_room_types(room_types: &[String]) -> Self {
        let has = |needle: &str| room_types.iter().any(|r| r.trim().eq_ignore_ascii_case(needle));
        Self {
            has_kaaba_view: has("Kaaba view"),
            has_haram_view: has("Haram view"),
            walking_distance: has("walking distance"),
            has_shuttle: has("shuttle"),
        }
    }

    fn write_to(&self, metadata: &mut Metadata) {
        insert(metadata, "has_kaaba_view", self.has_kaaba_view);
        insert(metadata, "has_haram_view", self.has_haram_view);
        insert(metadata, "walking_distance", self.walking_distance);
        insert(metadata, "has_shuttle", self.has_shuttle);
    }
}

fn insert(metadata: &mut Metadata, key: &str, value: impl Into<MetaValue>) {
    metadata.insert(key.to_string(), value.into());
}

fn reject(kind: SourceKind, reason: &str) -> AppError {
    AppError::NormalizationRejected {
        kind: kind.to_string(),
        reason: reason.to_string(),
    }
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Normalise one record into a document.
///
/// # Errors
/// `AppError::NormalizationRejected` when the record lacks a required field.
pub fn normalize(record: &SourceRecord) -> AppResult<Document> {
    match record {
        SourceRecord::Ritual(r) => normalize_ritual(r),
        SourceRecord::Destination(d) => normalize_destination(d),
        SourceRecord::Hotel(h) => normalize_hotel(h),
        SourceRecord::Review(r) => normalize_review(r),
        SourceRecord::Malformed(m) => Err(reject(m.kind, &m.reason)),
    }
}

fn normalize_ritual(ritual: &RitualRecord) -> AppResult<Document> {
    if blank(&ritual.section) {
        return Err(reject(SourceKind::Ritual, "missing section"));
    }
    let has_sub_content = ritual
        .sub_sections
        .iter()
        .any(|s| s.content.iter().any(|line| !blank(line)));
    if blank(&ritual.title) && blank(&ritual.content) && !has_sub_content {
        return Err(reject(SourceKind::Ritual, "no title or content"));
    }

    let mut body = format!(
        "Ritual Section: {}\nTitle: {}\nContent: {}\n",
        ritual.section, ritual.title, ritual.content
    );
    for sub in &ritual.sub_sections {
        body.push_str(&format!("\n{}:\n", sub.heading));
        body.push_str(&sub.content.join("\n"));
    }

    let mut metadata = Metadata::new();
    insert(&mut metadata, "source", "nusuk_rituals");
    insert(&mut metadata, TYPE_KEY, DocType::RitualGuide.as_str());
    insert(&mut metadata, "section", ritual.section.as_str());
    insert(&mut metadata, "url", ritual.url.as_str());

    Ok(Document::new(body, metadata))
}

fn normalize_destination(dest: &DestinationRecord) -> AppResult<Document> {
    if blank(&dest.city) {
        return Err(reject(SourceKind::Destination, "missing city"));
    }
    if blank(&dest.content) {
        return Err(reject(SourceKind::Destination, "empty content"));
    }

    let city = canonical_city(&dest.city);
    let body = format!(
        "City: {}\nSection: {}\nContent: {}\n",
        title_case(&city),
        dest.section,
        dest.content
    );

    let mut metadata = Metadata::new();
    insert(&mut metadata, "source", "nusuk_destinations");
    insert(&mut metadata, TYPE_KEY, DocType::DestinationInfo.as_str());
    insert(&mut metadata, "city", city);
    insert(&mut metadata, "section", dest.section.as_str());
    insert(&mut metadata, "url", dest.url.as_str());

    Ok(Document::new(body, metadata))
}

fn normalize_hotel(hotel: &HotelRecord) -> AppResult<Document> {
    if blank(&hotel.name) {
        return Err(reject(SourceKind::Hotel, "missing name"));
    }
    if blank(&hotel.city) {
        return Err(reject(SourceKind::Hotel, "missing city"));
    }

    let city = canonical_city(&hotel.city);
    let body = format!(
        "Hotel: {}\nCity: {}\nArea: {}\nStars: {}\nDistance to Haram: {}\nPrice: {}\nRoom Types: {}\nAmenities: {}\n",
        hotel.name,
        title_case(&city),
        hotel.area,
        hotel.stars,
        hotel.distance_to_haram,
        hotel.price,
        hotel.room_types.join(", "),
        hotel.amenities.join(", "),
    );

    let source = if blank(&hotel.source) {
        "hotel_listing"
    } else {
        hotel.source.as_str()
    };

    let mut metadata = Metadata::new();
    insert(&mut metadata, "source", source);
    insert(&mut metadata, TYPE_KEY, DocType::Hotel.as_str());
    insert(&mut metadata, "name", hotel.name.as_str());
    insert(&mut metadata, "city", city);
    insert(&mut metadata, "stars", hotel.stars);
    insert(&mut metadata, "area", hotel.area.as_str());
    insert(&mut metadata, "distance_to_haram", hotel.distance_to_haram.as_str());
    insert(&mut metadata, "price", hotel.price.as_str());
    HotelFlags::from_room_types(&hotel.room_types).write_to(&mut metadata);

    Ok(Document::new(body, metadata))
}

/// Accepts naive ISO-8601 (as written by the collector) or RFC 3339.
fn parse_created(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc()))
}

fn normalize_review(review: &ReviewRecord) -> AppResult<Document> {
    if blank(&review.title) {
        return Err(reject(SourceKind::Review, "empty title"));
    }
    if blank(&review.content) {
        return Err(reject(SourceKind::Review, "empty body"));
    }

    let body = format!(
        "Reddit Review - {}\nSubreddit: r/{}\nScore: {}\nContent: {}\n",
        review.title, review.subreddit, review.score, review.content
    );

    let mut metadata = Metadata::new();
    insert(&mut metadata, "source", "reddit");
    insert(&mut metadata, TYPE_KEY, DocType::UserReview.as_str());
    insert(&mut metadata, "subreddit", review.subreddit.as_str());
    insert(&mut metadata, "score", review.score);
    match parse_created(&review.created) {
        Some(created) => insert(
            &mut metadata,
            "created",
            created.format("%Y-%m-%dT%H:%M:%S").to_string(),
        ),
        None if !blank(&review.created) => {
            tracing::debug!(created = %review.created, "Unparseable review timestamp dropped");
        }
        None => {}
    }
    insert(&mut metadata, "url", review.url.as_str());
    insert(&mut metadata, "search_term", review.search_term.as_str());

    Ok(Document::new(body, metadata))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub accepted: usize,
    pub rejected: usize,
}

/// Outcome of normalising a batch. `received == accepted + rejected`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub received: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub by_kind: BTreeMap<SourceKind, KindCounts>,
}

/// Normalise every record, skipping (and counting) rejected ones.
pub fn normalize_batch(
    records: impl IntoIterator<Item = SourceRecord>,
) -> (Vec<Document>, NormalizeReport) {
    let mut documents = Vec::new();
    let mut report = NormalizeReport::default();

    for record in records {
        let kind = record.kind();
        let counts = report.by_kind.entry(kind).or_default();
        report.received += 1;

        match normalize(&record) {
            Ok(doc) => {
                counts.accepted += 1;
                report.accepted += 1;
                documents.push(doc);
            }
            Err(e) => {
                counts.rejected += 1;
                report.rejected += 1;
                tracing::debug!("Skipping record: {}", e);
            }
        }
    }

    for (kind, counts) in &report.by_kind {
        tracing::info!(
            kind = %kind,
            accepted = counts.accepted,
            rejected = counts.rejected,
            "Normalised records"
        );
    }

    (documents, report)
}
