use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use toontick_catalogue::CatalogueEntry;

/// Catalogue identifier of a title. Sources hand these out as either
/// numbers or strings, so both deserialize into the same value.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ManhwaId(String);

impl ManhwaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl<'de> Deserialize<'de> for ManhwaId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Str(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(id) => Self(id.to_string()),
            RawId::Str(id) => Self(id),
        })
    }
}

impl From<i64> for ManhwaId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ManhwaId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ManhwaId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ManhwaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadingStatus {
    #[default]
    Reading,
    Completed,
    OnHold,
    Dropped,
    PlanToRead,
}

impl ReadingStatus {
    pub const ALL: &[ReadingStatus] = &[
        Self::Reading,
        Self::Completed,
        Self::OnHold,
        Self::Dropped,
        Self::PlanToRead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reading => "reading",
            Self::Completed => "completed",
            Self::OnHold => "on_hold",
            Self::Dropped => "dropped",
            Self::PlanToRead => "plan_to_read",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps any status string onto the closed set. Unknown input reads as `reading`.
pub fn normalize_status(status: &str) -> ReadingStatus {
    let normalized: String = status
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c == '_' { c } else { '_' })
        .collect();

    match normalized.as_str() {
        "reading" => ReadingStatus::Reading,
        "completed" | "finished" | "complete" => ReadingStatus::Completed,
        "on_hold" | "onhold" | "paused" => ReadingStatus::OnHold,
        "dropped" => ReadingStatus::Dropped,
        "plan_to_read" | "planning" | "planned" | "want_to_read" | "to_read" | "ptw" => {
            ReadingStatus::PlanToRead
        }
        _ => ReadingStatus::Reading,
    }
}

/// Keeps progress within `[0, chapters]`; only the lower bound applies to ongoing series.
pub fn clamp_progress(progress: i64, chapters: Option<i64>) -> i64 {
    let progress = progress.max(0);
    match chapters {
        Some(chapters) => progress.min(chapters.max(0)),
        None => progress,
    }
}

/// Trimmed, case-insensitive key used to spot the same title under different ids.
pub fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

/// A title as handed in by the caller, before it is stored anywhere.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManhwaItem {
    pub id: ManhwaId,
    pub title: String,
    pub image: Option<String>,
    pub status: Option<String>,
    pub chapters: Option<i64>,
    pub progress: Option<i64>,
    pub average_score: Option<i64>,
    pub popularity: Option<i64>,
    pub year: Option<i64>,
}

impl From<CatalogueEntry> for ManhwaItem {
    fn from(entry: CatalogueEntry) -> Self {
        Self {
            id: entry.id.into(),
            title: entry.title,
            image: entry.image,
            status: Some(entry.status),
            chapters: entry.chapters,
            progress: None,
            average_score: entry.average_score,
            popularity: entry.popularity,
            year: entry.year.map(i64::from),
        }
    }
}

/// A row of an account library.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryItem {
    pub id: i64,
    pub user_id: String,
    pub manhwa_id: ManhwaId,
    pub title: String,
    pub image: Option<String>,
    pub status: ReadingStatus,
    pub chapters: Option<i64>,
    pub progress: i64,
    pub average_score: Option<i64>,
    pub popularity: Option<i64>,
    pub year: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A normalized row ready to be written to an account library.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLibraryItem {
    pub user_id: String,
    pub manhwa_id: ManhwaId,
    pub title: String,
    pub image: Option<String>,
    pub status: ReadingStatus,
    pub chapters: Option<i64>,
    pub progress: i64,
    pub average_score: Option<i64>,
    pub popularity: Option<i64>,
    pub year: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewLibraryItem {
    pub fn from_item(user_id: &str, item: ManhwaItem, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            manhwa_id: item.id,
            title: item.title,
            image: item.image,
            status: normalize_status(item.status.as_deref().unwrap_or_default()),
            progress: clamp_progress(item.progress.unwrap_or(0), item.chapters),
            chapters: item.chapters,
            average_score: item.average_score,
            popularity: item.popularity,
            year: item.year,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_guest(user_id: &str, entry: GuestEntry, now: DateTime<Utc>) -> Self {
        Self::from_item(user_id, entry.into(), now)
    }
}

/// Changes to apply to an existing account row. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibraryPatch {
    pub status: Option<String>,
    pub progress: Option<i64>,
    pub chapters: Option<i64>,
    pub title: Option<String>,
    pub image: Option<String>,
    pub average_score: Option<i64>,
    pub popularity: Option<i64>,
    pub year: Option<i64>,
}

impl LibraryPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// An entry of the guest library slot. The status is kept as written and
/// only normalized when the entry moves into an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestEntry {
    pub id: ManhwaId,
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub chapters: Option<i64>,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub average_score: Option<i64>,
    #[serde(default)]
    pub popularity: Option<i64>,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<GuestEntry> for ManhwaItem {
    fn from(entry: GuestEntry) -> Self {
        Self {
            id: entry.id,
            title: entry.title,
            image: entry.image,
            status: entry.status,
            chapters: entry.chapters,
            progress: entry.progress,
            average_score: entry.average_score,
            popularity: entry.popularity,
            year: entry.year,
        }
    }
}

/// An entry in whichever library is active.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredItem {
    Guest(GuestEntry),
    Account(LibraryItem),
}

impl StoredItem {
    pub fn manhwa_id(&self) -> &ManhwaId {
        match self {
            StoredItem::Guest(entry) => &entry.id,
            StoredItem::Account(item) => &item.manhwa_id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            StoredItem::Guest(entry) => &entry.title,
            StoredItem::Account(item) => &item.title,
        }
    }

    pub fn status(&self) -> ReadingStatus {
        match self {
            StoredItem::Guest(entry) => normalize_status(entry.status.as_deref().unwrap_or_default()),
            StoredItem::Account(item) => item.status,
        }
    }

    pub fn progress(&self) -> i64 {
        match self {
            StoredItem::Guest(entry) => entry.progress.unwrap_or(0),
            StoredItem::Account(item) => item.progress,
        }
    }

    pub fn chapters(&self) -> Option<i64> {
        match self {
            StoredItem::Guest(entry) => entry.chapters,
            StoredItem::Account(item) => item.chapters,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupReport {
    pub duplicates_found: usize,
    pub duplicates_removed: usize,
    pub details: Vec<(String, ManhwaId)>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status("Plan To Read"), ReadingStatus::PlanToRead);
        assert_eq!(normalize_status("???"), ReadingStatus::Reading);
        assert_eq!(normalize_status(""), ReadingStatus::Reading);
        assert_eq!(normalize_status("FINISHED"), ReadingStatus::Completed);
        assert_eq!(normalize_status("on-hold"), ReadingStatus::OnHold);
        assert_eq!(normalize_status("OnHold"), ReadingStatus::OnHold);
        assert_eq!(normalize_status("paused"), ReadingStatus::OnHold);
        assert_eq!(normalize_status("PTW"), ReadingStatus::PlanToRead);
        assert_eq!(normalize_status("want to read"), ReadingStatus::PlanToRead);
        assert_eq!(normalize_status("dropped"), ReadingStatus::Dropped);
        assert_eq!(normalize_status("releasing"), ReadingStatus::Reading);
    }

    #[test]
    fn test_normalize_status_is_idempotent() {
        let inputs = [
            "Reading",
            "completed",
            "Complete",
            "on hold",
            "Paused",
            "dropped",
            "planning",
            "to-read",
            "  ptw  ",
            "???",
            "",
            "日本語",
            "plan_to_read",
        ];

        for input in inputs {
            let once = normalize_status(input);
            assert!(ReadingStatus::ALL.contains(&once));
            assert_eq!(normalize_status(once.as_str()), once, "input {input:?}");
        }
    }

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(-5, Some(10)), 0);
        assert_eq!(clamp_progress(15, Some(10)), 10);
        assert_eq!(clamp_progress(7, Some(10)), 7);
        assert_eq!(clamp_progress(500, None), 500);
        assert_eq!(clamp_progress(-1, None), 0);
        assert_eq!(clamp_progress(3, Some(0)), 0);
    }

    #[test]
    fn test_manhwa_id_deserialize() {
        let ids: Vec<ManhwaId> = serde_json::from_str(r#"[42, "abc"]"#).unwrap();
        assert_eq!(ids, vec![ManhwaId::from(42), ManhwaId::from("abc")]);
        assert_eq!(serde_json::to_string(&ids[0]).unwrap(), r#""42""#);
    }

    #[test]
    fn test_guest_entry_camel_case() {
        let entry: GuestEntry = serde_json::from_str(
            r#"{"id": 105398, "title": "Solo Leveling", "status": "Plan To Read", "averageScore": 85, "chapters": null}"#,
        )
        .unwrap();

        assert_eq!(entry.id, ManhwaId::from(105398));
        assert_eq!(entry.average_score, Some(85));
        assert_eq!(entry.chapters, None);
        assert_eq!(entry.status.as_deref(), Some("Plan To Read"));
    }

    #[test]
    fn test_new_library_item_normalizes() {
        let item = ManhwaItem {
            id: 1.into(),
            title: "Sweet Home".to_string(),
            status: Some("Finished".to_string()),
            chapters: Some(141),
            progress: Some(300),
            ..Default::default()
        };

        let row = NewLibraryItem::from_item("u1", item, Utc::now());
        assert_eq!(row.status, ReadingStatus::Completed);
        assert_eq!(row.progress, 141);
        assert_eq!(row.created_at, row.updated_at);
    }
}
