use serde::Deserialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use crate::errors::MichiError::BackendError;
use crate::errors::MichiResult;
use crate::types::FileStatistics;

/// Object resource of the Cloud Storage JSON API. Numbers arrive as strings.
#[derive(Deserialize, Debug)]
pub struct GcsObject {
    pub(crate) name: String,
    size: Option<String>,
    updated: Option<String>,
    #[serde(rename = "contentType")]
    content_type: Option<String>,
    generation: Option<String>,
    #[serde(rename = "md5Hash")]
    md5_hash: Option<String>,
}

impl GcsObject {
    pub(crate) fn to_statistics(&self) -> MichiResult<FileStatistics> {
        let size = match self.size.as_deref() {
            Some(size) => size.parse::<u64>()
                .map_err(|e| BackendError(format!("Invalid size {:?} for {}: {}", size, self.name, e)))?,
            None => 0,
        };
        let modified = self.updated.as_deref()
            .and_then(|updated| OffsetDateTime::parse(updated, &Rfc3339).ok());

        let mut stat = FileStatistics::file(size).with_modified(modified);
        if let Some(content_type) = &self.content_type {
            stat = stat.with_metadata("content_type", content_type);
        }
        if let Some(generation) = &self.generation {
            stat = stat.with_metadata("generation", generation);
        }
        if let Some(md5_hash) = &self.md5_hash {
            stat = stat.with_metadata("md5_hash", md5_hash);
        }
        Ok(stat)
    }
}

/// One page of `objects.list`.
#[derive(Deserialize, Debug, Default)]
pub struct GcsObjectList {
    #[serde(rename = "nextPageToken")]
    pub(crate) next_page_token: Option<String>,
    #[serde(default)]
    pub(crate) items: Vec<GcsObject>,
    #[serde(default)]
    pub(crate) prefixes: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_to_statistics() {
        let object: GcsObject = serde_json::from_str(r#"{
            "kind": "storage#object",
            "name": "data/train.csv",
            "size": "1024",
            "updated": "2024-05-01T12:30:00.000Z",
            "contentType": "text/csv",
            "generation": "1714566600000000"
        }"#).unwrap();
        let stat = object.to_statistics().unwrap();
        assert_eq!(stat.size, 1024);
        assert_eq!(stat.modified.unwrap().unix_timestamp(), 1714566600);
        assert_eq!(stat.metadata.get("content_type").map(String::as_str), Some("text/csv"));
    }

    #[test]
    fn test_object_invalid_size() {
        let object: GcsObject = serde_json::from_str(r#"{"name": "a", "size": "big"}"#).unwrap();
        assert!(object.to_statistics().is_err());
    }

    #[test]
    fn test_list_without_items() {
        let list: GcsObjectList = serde_json::from_str(r#"{"kind": "storage#objects"}"#).unwrap();
        assert!(list.items.is_empty() && list.prefixes.is_empty() && list.next_page_token.is_none());
    }
}
