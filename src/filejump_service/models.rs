use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Entry: a remote file or folder record.
/// Ids are unique across the whole account; `path` lists the ancestor ids
/// from the root down to the entry itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawEntry")]
pub struct Entry {
    pub id: u64,
    pub parent_id: Option<u64>,
    pub name: String,
    pub path: Vec<u64>,
    pub size: u64,
    pub is_dir: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wire shape of an entry as returned by the API
#[derive(Debug, Deserialize)]
struct RawEntry {
    id: u64,
    #[serde(default)]
    parent_id: Option<u64>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(rename = "type", default)]
    entry_type: Option<String>,
    #[serde(default)]
    file_size: Option<u64>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

impl From<RawEntry> for Entry {
    fn from(raw: RawEntry) -> Self {
        let is_dir = raw.entry_type.as_deref() == Some("folder");
        Self {
            id: raw.id,
            parent_id: raw.parent_id,
            name: raw.name,
            path: raw.path.as_deref().map(split_id_path).unwrap_or_default(),
            size: if is_dir { 0 } else { raw.file_size.unwrap_or(0) },
            is_dir,
            created_at: parse_timestamp(raw.created_at.as_deref()),
            updated_at: parse_timestamp(raw.updated_at.as_deref()),
        }
    }
}

impl Entry {
    /// Parent id with the root folded to 0
    pub fn parent(&self) -> u64 {
        self.parent_id.unwrap_or(0)
    }

    pub fn created_time(&self) -> SystemTime {
        to_system_time(&self.created_at)
    }

    pub fn modified_time(&self) -> SystemTime {
        to_system_time(&self.updated_at)
    }
}

/// "12/40/41" -> [12, 40, 41]; non-numeric segments are skipped
pub fn split_id_path(path: &str) -> Vec<u64> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<u64>().ok())
        .collect()
}

fn parse_timestamp(value: Option<&str>) -> DateTime<Utc> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

/// Microsecond source precision is truncated to milliseconds
fn to_system_time(dt: &DateTime<Utc>) -> SystemTime {
    let millis = dt.timestamp_millis();
    if millis <= 0 {
        return UNIX_EPOCH;
    }
    UNIX_EPOCH + Duration::from_millis(millis as u64)
}

/// One page of a directory listing
#[derive(Debug, Deserialize, Default)]
pub struct ListPage {
    #[serde(default)]
    pub data: Vec<Entry>,
    #[serde(default)]
    pub next_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub token_name: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub user: Option<LoginUser>,
}

#[derive(Debug, Deserialize)]
pub struct LoginUser {
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateFolderRequest<'a> {
    pub name: &'a str,
    #[serde(rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderResponse {
    pub folder: Entry,
}

#[derive(Debug, Serialize)]
pub struct DeleteRequest {
    #[serde(rename = "entryIds")]
    pub entry_ids: Vec<u64>,
    #[serde(rename = "deleteForever")]
    pub delete_forever: bool,
}

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    #[serde(rename = "fileEntry")]
    pub file_entry: Option<Entry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_entry_parsing() {
        let json = r#"{
            "id": 41,
            "parent_id": 40,
            "name": "report.pdf",
            "path": "12/40/41",
            "type": "pdf",
            "file_size": 2048,
            "created_at": "2024-03-05T10:20:30.123456Z",
            "updated_at": "2024-03-06T11:00:00.999999Z"
        }"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.id, 41);
        assert_eq!(entry.parent(), 40);
        assert_eq!(entry.path, vec![12, 40, 41]);
        assert_eq!(entry.size, 2048);
        assert!(!entry.is_dir);

        let created = entry
            .created_time()
            .duration_since(UNIX_EPOCH)
            .unwrap();
        assert_eq!(created.subsec_millis(), 123);
        assert_eq!(created.subsec_nanos(), 123_000_000);
    }

    #[test]
    fn test_folder_entry_has_zero_size_and_root_parent() {
        let json = r#"{
            "id": 12,
            "parent_id": null,
            "name": "Documents",
            "path": "12",
            "type": "folder",
            "file_size": 999,
            "created_at": "2024-03-05T10:20:30.000000Z",
            "updated_at": "2024-03-05T10:20:30.000000Z"
        }"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert!(entry.is_dir);
        assert_eq!(entry.size, 0);
        assert_eq!(entry.parent(), 0);
    }

    #[test]
    fn test_bad_timestamp_falls_back_to_epoch() {
        let json = r#"{"id": 5, "name": "x", "type": "text", "created_at": "yesterday"}"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.created_time(), UNIX_EPOCH);
        assert_eq!(entry.modified_time(), UNIX_EPOCH);
    }

    #[test]
    fn test_list_page_without_next_page() {
        let page: ListPage = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(page.data.is_empty());
        assert!(page.next_page.is_none());

        let page: ListPage =
            serde_json::from_str(r#"{"data": [], "next_page": null}"#).unwrap();
        assert!(page.next_page.is_none());
    }

    #[test]
    fn test_create_folder_body_omits_root_parent() {
        let root = CreateFolderRequest {
            name: "new",
            parent_id: None,
        };
        assert_eq!(serde_json::to_string(&root).unwrap(), r#"{"name":"new"}"#);

        let nested = CreateFolderRequest {
            name: "new",
            parent_id: Some(12),
        };
        assert_eq!(
            serde_json::to_string(&nested).unwrap(),
            r#"{"name":"new","parentId":12}"#
        );
    }

    #[test]
    fn test_delete_body_shape() {
        let body = DeleteRequest {
            entry_ids: vec![7],
            delete_forever: true,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"entryIds":[7],"deleteForever":true}"#
        );
    }

    #[test]
    fn test_split_id_path_ignores_garbage() {
        assert_eq!(split_id_path("/1//2/x/3/"), vec![1, 2, 3]);
        assert!(split_id_path("").is_empty());
    }
}
