use serde::Deserialize;
use time::OffsetDateTime;
use crate::types::FileStatistics;

#[derive(Deserialize, Debug)]
pub struct FileStatusResponse {
    #[serde(rename = "FileStatus")]
    pub(crate) file_status: HdfsFileStatus,
}

#[derive(Deserialize, Debug)]
pub struct ListStatusResponse {
    #[serde(rename = "FileStatuses")]
    pub(crate) file_statuses: HdfsFileStatuses,
}

#[derive(Deserialize, Debug)]
pub struct HdfsFileStatuses {
    #[serde(rename = "FileStatus", default)]
    pub(crate) file_status: Vec<HdfsFileStatus>,
}

/// Answer of `op=CREATE&noredirect=true` style gateways.
#[derive(Deserialize, Debug)]
pub struct CreateLocation {
    #[serde(rename = "Location")]
    pub(crate) location: String,
}

#[derive(Deserialize, Debug)]
pub struct HdfsFileStatus {
    /// Empty for `GETFILESTATUS`, the child name for `LISTSTATUS`.
    #[serde(rename = "pathSuffix", default)]
    pub(crate) path_suffix: String,
    /// `FILE`, `DIRECTORY` or `SYMLINK`.
    #[serde(rename = "type")]
    file_type: String,
    #[serde(default)]
    length: u64,
    /// Milliseconds since the epoch.
    #[serde(rename = "modificationTime", default)]
    modification_time: i64,
    owner: Option<String>,
    group: Option<String>,
    permission: Option<String>,
    replication: Option<u32>,
}

impl HdfsFileStatus {
    pub(crate) fn is_dir(&self) -> bool {
        self.file_type == "DIRECTORY"
    }

    pub(crate) fn to_statistics(&self) -> FileStatistics {
        let stat = if self.is_dir() {
            FileStatistics::dir()
        } else {
            FileStatistics::file(self.length)
        };
        let modified = OffsetDateTime::from_unix_timestamp_nanos(self.modification_time as i128 * 1_000_000).ok();

        let mut stat = stat.with_modified(modified);
        if let Some(owner) = &self.owner {
            stat = stat.with_metadata("owner", owner);
        }
        if let Some(group) = &self.group {
            stat = stat.with_metadata("group", group);
        }
        if let Some(permission) = &self.permission {
            stat = stat.with_metadata("permission", permission);
        }
        if let Some(replication) = self.replication {
            stat = stat.with_metadata("replication", replication);
        }
        stat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_status_to_statistics() {
        let response: FileStatusResponse = serde_json::from_str(r#"{
            "FileStatus": {
                "accessTime": 0,
                "blockSize": 134217728,
                "group": "supergroup",
                "length": 24930,
                "modificationTime": 1320173277227,
                "owner": "webuser",
                "pathSuffix": "",
                "permission": "644",
                "replication": 3,
                "type": "FILE"
            }
        }"#).unwrap();
        let stat = response.file_status.to_statistics();
        assert_eq!(stat.size, 24930);
        assert!(!stat.is_dir);
        assert_eq!(stat.modified.unwrap().unix_timestamp(), 1320173277);
        assert_eq!(stat.metadata.get("owner").map(String::as_str), Some("webuser"));
    }

    #[test]
    fn test_list_status_directory() {
        let response: ListStatusResponse = serde_json::from_str(r#"{
            "FileStatuses": {"FileStatus": [
                {"pathSuffix": "a.patch", "type": "FILE", "length": 24930, "modificationTime": 1320171722771},
                {"pathSuffix": "bar", "type": "DIRECTORY", "length": 0, "modificationTime": 1320895981256}
            ]}
        }"#).unwrap();
        let statuses = response.file_statuses.file_status;
        assert_eq!(statuses.len(), 2);
        assert!(!statuses[0].is_dir());
        assert!(statuses[1].is_dir());
        assert_eq!(statuses[1].path_suffix, "bar");
    }
}
