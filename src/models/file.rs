use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// Trash state of a file record. Untrashing clears the timestamp by
/// construction: an active record has nowhere to keep one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrashState {
    Active,
    Trashed { at: DateTime<Utc> },
}

impl TrashState {
    pub fn is_trashed(&self) -> bool {
        matches!(self, TrashState::Trashed { .. })
    }

    pub fn trashed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            TrashState::Active => None,
            TrashState::Trashed { at } => Some(*at),
        }
    }
}

/// File record - one logical, deduplicated content blob plus upload metadata
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: String,
    pub owner_id: String,
    /// Weak reference to a folder; cleared (not cascaded) on folder deletion
    pub folder_id: Option<String>,
    pub name: String,
    /// Hex-encoded SHA-256 of the content; globally unique dedup key
    pub content_digest: String,
    pub media_type: String,
    pub size_bytes: i64,
    /// Blob location relative to the upload root, derived from the digest
    pub storage_path: String,
    pub starred: bool,
    pub trash: TrashState,
    pub created_at: DateTime<Utc>,
}

fn parse_timestamp(column: &str, value: &str) -> std::result::Result<DateTime<Utc>, sqlx::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

impl FromRow<'_, SqliteRow> for FileRecord {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let created_at: String = row.try_get("created_at")?;
        let trashed: bool = row.try_get("trashed")?;
        let trashed_at: Option<String> = row.try_get("trashed_at")?;

        let trash = if trashed {
            let at = trashed_at.ok_or_else(|| sqlx::Error::ColumnDecode {
                index: "trashed_at".to_string(),
                source: "trashed record without timestamp".into(),
            })?;
            TrashState::Trashed {
                at: parse_timestamp("trashed_at", &at)?,
            }
        } else {
            TrashState::Active
        };

        Ok(Self {
            id: row.try_get("id")?,
            owner_id: row.try_get("owner_id")?,
            folder_id: row.try_get("folder_id")?,
            name: row.try_get("name")?,
            content_digest: row.try_get("content_digest")?,
            media_type: row.try_get("media_type")?,
            size_bytes: row.try_get("size_bytes")?,
            storage_path: row.try_get("storage_path")?,
            starred: row.try_get("starred")?,
            trash,
            created_at: parse_timestamp("created_at", &created_at)?,
        })
    }
}

/// File payload as exposed over the API
#[derive(Debug, Clone, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub size: i64,
    #[serde(rename = "modifiedAt")]
    pub modified_at: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub starred: bool,
    /// Sharing is unimplemented; always false
    pub shared: bool,
    pub folder_id: Option<String>,
    pub trashed: bool,
    #[serde(rename = "trashedAt")]
    pub trashed_at: Option<String>,
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

impl From<FileRecord> for FileResponse {
    fn from(record: FileRecord) -> Self {
        let created_at = format_timestamp(record.created_at);
        Self {
            id: record.id,
            name: record.name,
            media_type: record.media_type,
            size: record.size_bytes,
            modified_at: created_at.clone(),
            created_at,
            starred: record.starred,
            shared: false,
            folder_id: record.folder_id,
            trashed: record.trash.is_trashed(),
            trashed_at: record.trash.trashed_at().map(format_timestamp),
        }
    }
}

/// Optional conjunctive filters for listing files
#[derive(Debug, Default, Deserialize)]
pub struct FileFilters {
    /// Case-insensitive name substring
    pub name: Option<String>,
    /// Exact media type
    pub content_type: Option<String>,
    /// Inclusive creation-date lower bound (YYYY-MM-DD)
    pub date_from: Option<String>,
    /// Inclusive creation-date upper bound (YYYY-MM-DD)
    pub date_to: Option<String>,
}

/// Query parameters for the recent-files listing
#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

/// Duplicate-check response
#[derive(Debug, Serialize)]
pub struct DuplicateCheckResponse {
    pub duplicate_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(trash: TrashState) -> FileRecord {
        FileRecord {
            id: "f1".to_string(),
            owner_id: "u1".to_string(),
            folder_id: None,
            name: "report.pdf".to_string(),
            content_digest: "ab".repeat(32),
            media_type: "application/pdf".to_string(),
            size_bytes: 1234,
            storage_path: format!("{}/report.pdf", "ab".repeat(32)),
            starred: false,
            trash,
            created_at: Utc.with_ymd_and_hms(2026, 8, 25, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn response_formats_timestamps() {
        let response = FileResponse::from(record(TrashState::Active));

        assert_eq!(response.created_at, "2026-08-25T09:30:00Z");
        assert_eq!(response.modified_at, "2026-08-25T09:30:00Z");
        assert_eq!(response.trashed_at, None);
        assert!(!response.trashed);
        assert!(!response.shared);
    }

    #[test]
    fn response_carries_trash_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 8, 26, 10, 0, 0).unwrap();
        let response = FileResponse::from(record(TrashState::Trashed { at }));

        assert!(response.trashed);
        assert_eq!(response.trashed_at.as_deref(), Some("2026-08-26T10:00:00Z"));
    }

    #[test]
    fn trash_state_accessors() {
        assert!(!TrashState::Active.is_trashed());
        assert_eq!(TrashState::Active.trashed_at(), None);

        let at = Utc::now();
        let trashed = TrashState::Trashed { at };
        assert!(trashed.is_trashed());
        assert_eq!(trashed.trashed_at(), Some(at));
    }
}
