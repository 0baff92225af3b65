//! Source records as delivered by the collection stage.
//!
//! The collector writes one JSON snapshot with four arrays: `rituals`,
//! `destinations` (grouped by city), `hotels` and `reddit_reviews`. Every
//! field is optional on the wire; required-field checks happen during
//! normalisation so that a bad record is counted rather than failing the
//! whole snapshot. Records whose fields have the wrong JSON type (a `null`
//! name, a string `stars`) are parsed one at a time and carried as
//! [`MalformedRecord`]s, which normalisation rejects and counts.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use umrah_core::{AppError, AppResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RitualSubSection {
    pub heading: String,
    pub content: Vec<String>,
}

/// One section of the ritual guide (e.g. Ihram, Tawaf).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RitualRecord {
    pub section: String,
    pub url: String,
    pub title: String,
    pub content: String,
    pub sub_sections: Vec<RitualSubSection>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationSection {
    pub section: String,
    pub url: String,
    pub content: String,
}

/// Destination guide pages for one city, as grouped by the collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationGroup {
    pub city: String,
    pub sections: Vec<DestinationSection>,
}

/// A single destination section, flattened out of its city group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationRecord {
    pub city: String,
    pub section: String,
    pub url: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotelRecord {
    pub name: String,
    pub city: String,
    pub area: String,
    pub stars: i64,
    pub distance_to_haram: String,
    pub price: String,
    pub room_types: Vec<String>,
    pub amenities: Vec<String>,
    pub source: String,
}

/// A community post about the pilgrimage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewRecord {
    pub title: String,
    pub content: String,
    pub subreddit: String,
    pub score: i64,
    /// ISO-8601 timestamp as written by the collector.
    pub created: String,
    pub url: String,
    pub search_term: String,
}

/// Which source a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Ritual,
    Destination,
    Hotel,
    Review,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Ritual => "ritual",
            SourceKind::Destination => "destination",
            SourceKind::Hotel => "hotel",
            SourceKind::Review => "review",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A snapshot entry that did not fit its record shape.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedRecord {
    pub kind: SourceKind,
    pub reason: String,
}

/// One raw record of a known source type.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRecord {
    Ritual(RitualRecord),
    Destination(DestinationRecord),
    Hotel(HotelRecord),
    Review(ReviewRecord),
    Malformed(MalformedRecord),
}

impl SourceRecord {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceRecord::Ritual(_) => SourceKind::Ritual,
            SourceRecord::Destination(_) => SourceKind::Destination,
            SourceRecord::Hotel(_) => SourceKind::Hotel,
            SourceRecord::Review(_) => SourceKind::Review,
            SourceRecord::Malformed(m) => m.kind,
        }
    }
}

/// Wire shape of the snapshot: arrays are kept untyped until each entry is
/// converted on its own.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSnapshot {
    rituals: Vec<Value>,
    destinations: Vec<Value>,
    hotels: Vec<Value>,
    reddit_reviews: Vec<Value>,
}

fn parse_each<T: DeserializeOwned>(
    values: Vec<Value>,
    kind: SourceKind,
    malformed: &mut Vec<MalformedRecord>,
) -> Vec<T> {
    let mut records = Vec::with_capacity(values.len());
    for (position, value) in values.into_iter().enumerate() {
        match serde_json::from_value(value) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(kind = %kind, position, "Malformed record: {}", e);
                malformed.push(MalformedRecord {
                    kind,
                    reason: format!("malformed entry {}: {}", position, e),
                });
            }
        }
    }
    records
}

/// The complete ingestion snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordBatch {
    pub rituals: Vec<RitualRecord>,
    pub destinations: Vec<DestinationGroup>,
    pub hotels: Vec<HotelRecord>,
    pub reddit_reviews: Vec<ReviewRecord>,
    /// Entries that could not be read as their record type. A malformed
    /// destination group counts once.
    #[serde(skip)]
    pub malformed: Vec<MalformedRecord>,
}

impl RecordBatch {
    /// Parse the collector's snapshot. Only a document that is not a JSON
    /// object of arrays fails; bad entries land in `malformed`.
    pub fn from_json_str(json: &str) -> AppResult<Self> {
        let raw: RawSnapshot = serde_json::from_str(json)
            .map_err(|e| AppError::Serialization(format!("Invalid record snapshot: {}", e)))?;

        let mut malformed = Vec::new();
        let rituals = parse_each(raw.rituals, SourceKind::Ritual, &mut malformed);
        let destinations = parse_each(raw.destinations, SourceKind::Destination, &mut malformed);
        let hotels = parse_each(raw.hotels, SourceKind::Hotel, &mut malformed);
        let reddit_reviews = parse_each(raw.reddit_reviews, SourceKind::Review, &mut malformed);

        Ok(Self {
            rituals,
            destinations,
            hotels,
            reddit_reviews,
            malformed,
        })
    }

    /// Number of records after destination groups are flattened, malformed
    /// entries included.
    pub fn len(&self) -> usize {
        self.rituals.len()
            + self
                .destinations
                .iter()
                .map(|g| g.sections.len())
                .sum::<usize>()
            + self.hotels.len()
            + self.reddit_reviews.len()
            + self.malformed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into tagged records, in source order: rituals, destinations,
    /// hotels, reviews, then malformed entries.
    pub fn into_records(self) -> Vec<SourceRecord> {
        let mut records = Vec::with_capacity(self.len());

        records.extend(self.rituals.into_iter().map(SourceRecord::Ritual));

        for group in self.destinations {
            let city = group.city;
            records.extend(group.sections.into_iter().map(|s| {
                SourceRecord::Destination(DestinationRecord {
                    city: city.clone(),
                    section: s.section,
                    url: s.url,
                    content: s.content,
                })
            }));
        }

        records.extend(self.hotels.into_iter().map(SourceRecord::Hotel));
        records.extend(self.reddit_reviews.into_iter().map(SourceRecord::Review));
        records.extend(self.malformed.into_iter().map(SourceRecord::Malformed));

        records
    }
}

/// Supplies the ingestion snapshot. Only consulted when an index must be built.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    /// Short description for logs.
    fn describe(&self) -> String;

    async fn load(&self) -> AppResult<RecordBatch>;
}

/// Reads the collector's JSON snapshot from disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl RecordSource for JsonFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn load(&self) -> AppResult<RecordBatch> {
        if !self.path.exists() {
            return Err(AppError::Knowledge(format!(
                "Source data not found at {}. Run the collector first.",
                self.path.display()
            )));
        }

        let json = tokio::fs::read_to_string(&self.path).await?;
        let batch = RecordBatch::from_json_str(&json)?;

        tracing::info!(
            path = %self.path.display(),
            records = batch.len(),
            "Loaded source records"
        );

        Ok(batch)
    }
}

#[async_trait::async_trait]
impl RecordSource for RecordBatch {
    fn describe(&self) -> String {
        format!("in-memory batch ({} records)", self.len())
    }

    async fn load(&self) -> AppResult<RecordBatch> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SNAPSHOT: &str = r#"{
        "rituals": [{"section": "tawaf", "url": "https://example.org/tawaf", "title": "Tawaf",
                     "content": "Circle the Kaaba seven times.",
                     "sub_sections": [{"heading": "Tips", "content": ["Start at the Black Stone"]}]}],
        "destinations": [{"city": "makkah", "sections": [
            {"section": "shopping", "url": "u1", "content": "Malls near the Haram."},
            {"section": "dining", "url": "u2", "content": "Food courts."}]}],
        "hotels": [{"name": "Dar Al Eiman", "city": "makkah", "stars": 4, "room_types": ["Kaaba view"]}],
        "reddit_reviews": [{"title": "My trip", "content": "Great", "subreddit": "umrah", "score": 12}]
    }"#;

    #[test]
    fn test_snapshot_flattens_destinations() {
        let batch = RecordBatch::from_json_str(SNAPSHOT).unwrap();
        assert_eq!(batch.len(), 5);

        let records = batch.into_records();
        let kinds: Vec<_> = records.iter().map(SourceRecord::kind).collect();
        assert_eq!(
            kinds,
            vec![
                SourceKind::Ritual,
                SourceKind::Destination,
                SourceKind::Destination,
                SourceKind::Hotel,
                SourceKind::Review
            ]
        );

        match &records[2] {
            SourceRecord::Destination(d) => {
                assert_eq!(d.city, "makkah");
                assert_eq!(d.section, "dining");
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[test]
    fn test_missing_fields_default() {
        let batch = RecordBatch::from_json_str(r#"{"hotels": [{"name": "Only a name"}]}"#).unwrap();
        assert_eq!(batch.hotels[0].stars, 0);
        assert!(batch.hotels[0].room_types.is_empty());
        assert!(batch.rituals.is_empty());
    }

    #[test]
    fn test_malformed_entry_does_not_sink_the_snapshot() {
        let json = r#"{
            "rituals": [{"section": "tawaf", "title": "Tawaf", "content": "Seven circuits."}],
            "hotels": [
                {"name": null, "city": "makkah", "stars": 5},
                {"name": "Pullman Zamzam", "city": "makkah", "stars": "five"},
                {"name": "Dar Al Eiman", "city": "makkah", "stars": 4}
            ]
        }"#;

        let batch = RecordBatch::from_json_str(json).unwrap();
        assert_eq!(batch.rituals.len(), 1);
        assert_eq!(batch.hotels.len(), 1);
        assert_eq!(batch.hotels[0].name, "Dar Al Eiman");
        assert_eq!(batch.malformed.len(), 2);
        assert!(batch.malformed.iter().all(|m| m.kind == SourceKind::Hotel));
        assert_eq!(batch.len(), 4);

        let records = batch.into_records();
        assert_eq!(records[0].kind(), SourceKind::Ritual);
        assert!(matches!(records.last(), Some(SourceRecord::Malformed(_))));
    }

    #[test]
    fn test_non_array_section_is_serialization_error() {
        let result = RecordBatch::from_json_str(r#"{"hotels": {"name": "not a list"}}"#);
        assert!(matches!(result, Err(AppError::Serialization(_))));
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let result = RecordBatch::from_json_str("{not json");
        assert!(matches!(result, Err(AppError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_json_file_source() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("umrah_scraped_data.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let source = JsonFileSource::new(&path);
        let batch = source.load().await.unwrap();
        assert_eq!(batch.hotels[0].name, "Dar Al Eiman");
    }

    #[tokio::test]
    async fn test_json_file_source_missing() {
        let temp = TempDir::new().unwrap();
        let source = JsonFileSource::new(temp.path().join("absent.json"));
        let err = source.load().await.unwrap_err();
        assert!(err.to_string().contains("Run the collector first"));
    }
}
