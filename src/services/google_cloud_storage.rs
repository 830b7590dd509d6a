use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode, Url};
use crate::config::MichiConfig;
use crate::errors::MichiError::{BackendError, InvalidArgumentError, NotFoundError};
use crate::errors::MichiResult;
use crate::services::{child_entry, ObjectStore};
use crate::types::google_cloud_storage::{GcsObject, GcsObjectList};
use crate::types::{FileStatistics, ListEntry};
use crate::utils::parser::{ObjectLocation, Scheme};
use crate::utils::reqwest::AuthType::Bearer;
use crate::utils::reqwest::{check_response, get_client_with_token, send_error};

/// Google Cloud Storage client over the JSON API.
///
/// Directories follow the usual prefix convention: `gs://bucket/data` is a directory
/// when any object name starts with `data/`.
pub struct GcsStore {
    client: Client,
    endpoint: Url,
}

impl GcsStore {
    /// # Arguments
    /// - `endpoint`: API base URL, `https://storage.googleapis.com` or an emulator.
    /// - `token`: Bearer token sent with every request. Anonymous access when [None].
    pub fn new(endpoint: &str, token: Option<&str>) -> MichiResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| {
                error!("Failed to parse endpoint: {:?}", e);
                InvalidArgumentError(format!("Invalid GCS endpoint {}: {}", endpoint, e))
            })?;
        let client = get_client_with_token(token, Bearer)?;

        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &MichiConfig) -> MichiResult<Self> {
        Self::new(&config.gcs_endpoint, config.gcs_token.as_deref())
    }

    fn url(&self, segments: &[&str]) -> MichiResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| InvalidArgumentError(format!("GCS endpoint {} cannot be a base", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, location: &ObjectLocation) -> MichiResult<Url> {
        self.url(&["storage", "v1", "b", location.namespace(), "o", location.object_key()])
    }

    /// Object metadata, [None] when the object does not exist.
    async fn object(&self, location: &ObjectLocation) -> MichiResult<Option<GcsObject>> {
        if location.object_key().is_empty() {
            return Ok(None);
        }
        let target = location.to_string();
        let response = self.client.get(self.object_url(location)?)
            .send()
            .await
            .map_err(|e| send_error(&target, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let object = check_response(&target, response).await?
            .json::<GcsObject>()
            .await
            .map_err(|e| BackendError(format!("Failed to parse object metadata of {}: {}", target, e)))?;
        Ok(Some(object))
    }

    async fn list_page(
        &self,
        location: &ObjectLocation,
        prefix: &str,
        delimiter: bool,
        page_token: Option<&str>,
        max_results: Option<u32>,
    ) -> MichiResult<GcsObjectList> {
        let mut url = self.url(&["storage", "v1", "b", location.namespace(), "o"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("prefix", prefix);
            if delimiter {
                query.append_pair("delimiter", "/");
            }
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
            if let Some(max_results) = max_results {
                query.append_pair("maxResults", &max_results.to_string());
            }
        }

        let target = location.to_string();
        let response = self.client.get(url)
            .send()
            .await
            .map_err(|e| send_error(&target, e))?;
        check_response(&target, response).await?
            .json::<GcsObjectList>()
            .await
            .map_err(|e| BackendError(format!("Failed to parse object list of {}: {}", target, e)))
    }

    async fn bucket_exists(&self, location: &ObjectLocation) -> MichiResult<bool> {
        let target = format!("gs://{}", location.namespace());
        let response = self.client.get(self.url(&["storage", "v1", "b", location.namespace()])?)
            .send()
            .await
            .map_err(|e| send_error(&target, e))?;
        match check_response(&target, response).await {
            Ok(_) => Ok(true),
            Err(NotFoundError(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    fn scheme(&self) -> Scheme {
        Scheme::Gs
    }

    async fn exists(&self, location: &ObjectLocation) -> MichiResult<bool> {
        if self.object(location).await?.is_some() {
            return Ok(true);
        }
        self.is_dir(location).await
    }

    async fn is_dir(&self, location: &ObjectLocation) -> MichiResult<bool> {
        if location.object_key().is_empty() {
            return self.bucket_exists(location).await;
        }
        let page = self.list_page(location, &location.dir_prefix(), true, None, Some(1)).await?;
        Ok(!page.items.is_empty() || !page.prefixes.is_empty())
    }

    async fn list(&self, location: &ObjectLocation) -> MichiResult<Vec<ListEntry>> {
        let prefix = location.dir_prefix();
        let mut entries = Vec::new();
        let mut has_marker = false;
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(location, &prefix, true, page_token.as_deref(), None).await?;
            for object in &page.items {
                match child_entry(&prefix, &object.name) {
                    Some(entry) => entries.push(entry),
                    None => has_marker |= object.name == prefix,
                }
            }
            entries.extend(page.prefixes.iter().filter_map(|dir| child_entry(&prefix, dir)));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        if entries.is_empty() && !has_marker {
            // An empty bucket is an empty directory.
            if location.object_key().is_empty() {
                if self.bucket_exists(location).await? {
                    return Ok(entries);
                }
                return Err(NotFoundError(location.to_string()));
            }
            return match self.object(location).await? {
                Some(_) => Err(BackendError(format!("{} is not a directory", location))),
                None => Err(NotFoundError(location.to_string())),
            };
        }

        debug!("Listed {} entries in {}", entries.len(), location);
        Ok(entries)
    }

    async fn list_recursive(&self, location: &ObjectLocation) -> MichiResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = self.list_page(location, location.key(), false, page_token.as_deref(), None).await?;
            keys.extend(page.items.into_iter()
                .map(|object| object.name)
                .filter(|name| !name.ends_with('/')));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} objects with prefix {}", keys.len(), location);
        Ok(keys)
    }

    async fn stat(&self, location: &ObjectLocation) -> MichiResult<FileStatistics> {
        if let Some(object) = self.object(location).await? {
            return object.to_statistics();
        }
        if self.is_dir(location).await? {
            return Ok(FileStatistics::dir());
        }
        Err(NotFoundError(location.to_string()))
    }

    async fn get(&self, location: &ObjectLocation) -> MichiResult<Vec<u8>> {
        let target = location.to_string();
        let mut url = self.object_url(location)?;
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self.client.get(url)
            .send()
            .await
            .map_err(|e| send_error(&target, e))?;
        let bytes = check_response(&target, response).await?
            .bytes()
            .await
            .map_err(|e| send_error(&target, e))?;

        debug!("Downloaded {} bytes from {}", bytes.len(), target);
        Ok(bytes.to_vec())
    }

    async fn put(&self, location: &ObjectLocation, data: Vec<u8>) -> MichiResult<()> {
        let target = location.to_string();
        if location.object_key().is_empty() {
            return Err(BackendError(format!("{} does not name an object", target)));
        }

        let mut url = self.url(&["upload", "storage", "v1", "b", location.namespace(), "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", location.object_key());

        let size = data.len();
        let response = self.client.post(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| send_error(&target, e))?;
        check_response(&target, response).await?;

        debug!("Uploaded {} bytes to {}", size, target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use super::*;
    use crate::utils::parser::parse_object_location;

    fn location(path: &str) -> ObjectLocation {
        parse_object_location(path).unwrap()
    }

    #[tokio::test]
    async fn test_stat_object() {
        let server = MockServer::start_async().await;
        let mock = server.mock_async(|when, then| {
            when.method(GET).path("/storage/v1/b/bucket/o/train.csv");
            then.status(200).json_body(serde_json::json!({
                "name": "train.csv",
                "size": "42",
                "updated": "2024-05-01T12:30:00Z"
            }));
        }).await;

        let store = GcsStore::new(&server.base_url(), None).unwrap();
        let stat = store.stat(&location("gs://bucket/train.csv")).await.unwrap();
        mock.assert_async().await;
        assert_eq!(stat.size, 42);
        assert!(!stat.is_dir);
    }

    #[tokio::test]
    async fn test_stat_missing_object() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET).path("/storage/v1/b/bucket/o/none.txt");
            then.status(404);
        }).await;
        server.mock_async(|when, then| {
            when.method(GET).path("/storage/v1/b/bucket/o").query_param("prefix", "none.txt/");
            then.status(200).json_body(serde_json::json!({"kind": "storage#objects"}));
        }).await;

        let store = GcsStore::new(&server.base_url(), None).unwrap();
        let error = store.stat(&location("gs://bucket/none.txt")).await.unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_list_empty_bucket() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET).path("/storage/v1/b/empty-bucket");
            then.status(200).json_body(serde_json::json!({"name": "empty-bucket"}));
        }).await;
        server.mock_async(|when, then| {
            when.method(GET).path("/storage/v1/b/empty-bucket/o");
            then.status(200).json_body(serde_json::json!({"kind": "storage#objects"}));
        }).await;
        server.mock_async(|when, then| {
            when.method(GET).path("/storage/v1/b/no-bucket");
            then.status(404);
        }).await;
        server.mock_async(|when, then| {
            when.method(GET).path("/storage/v1/b/no-bucket/o");
            then.status(404);
        }).await;

        let store = GcsStore::new(&server.base_url(), None).unwrap();
        let bucket = location("gs://empty-bucket/");
        assert!(store.is_dir(&bucket).await.unwrap());
        assert!(store.exists(&bucket).await.unwrap());
        assert!(store.list(&bucket).await.unwrap().is_empty());

        let error = store.list(&location("gs://no-bucket/")).await.unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_list_follows_pages_and_strips_prefix() {
        let server = MockServer::start_async().await;
        // Registered first so the page token request does not fall into the first page mock.
        server.mock_async(|when, then| {
            when.method(GET)
                .path("/storage/v1/b/bucket/o")
                .query_param("prefix", "data/")
                .query_param("delimiter", "/")
                .query_param("pageToken", "next");
            then.status(200).json_body(serde_json::json!({
                "items": [{"name": "data/b.txt", "size": "2"}]
            }));
        }).await;
        server.mock_async(|when, then| {
            when.method(GET)
                .path("/storage/v1/b/bucket/o")
                .query_param("prefix", "data/");
            then.status(200).json_body(serde_json::json!({
                "items": [{"name": "data/", "size": "0"}, {"name": "data/a.txt", "size": "1"}],
                "prefixes": ["data/nested/"],
                "nextPageToken": "next"
            }));
        }).await;

        let store = GcsStore::new(&server.base_url(), None).unwrap();
        let mut entries = store.list(&location("gs://bucket/data")).await.unwrap();
        entries.sort();
        assert_eq!(entries, vec![
            ListEntry::file("a.txt"),
            ListEntry::file("b.txt"),
            ListEntry::dir("nested"),
        ]);
    }

    #[tokio::test]
    async fn test_get_and_put() {
        let server = MockServer::start_async().await;
        let download = server.mock_async(|when, then| {
            when.method(GET).path("/storage/v1/b/bucket/o/a.txt").query_param("alt", "media");
            then.status(200).body("hello");
        }).await;
        let upload = server.mock_async(|when, then| {
            when.method(POST)
                .path("/upload/storage/v1/b/bucket/o")
                .query_param("uploadType", "media")
                .query_param("name", "dir/b.txt")
                .header("authorization", "Bearer token")
                .body("world");
            then.status(200).json_body(serde_json::json!({"name": "dir/b.txt", "size": "5"}));
        }).await;

        let store = GcsStore::new(&server.base_url(), Some("token")).unwrap();
        assert_eq!(store.get(&location("gs://bucket/a.txt")).await.unwrap(), b"hello");
        store.put(&location("gs://bucket/dir/b.txt"), b"world".to_vec()).await.unwrap();
        download.assert_async().await;
        upload.assert_async().await;
    }

    #[tokio::test]
    async fn test_backend_error_is_propagated() {
        let server = MockServer::start_async().await;
        server.mock_async(|when, then| {
            when.method(GET).path("/storage/v1/b/bucket/o/secret.txt");
            then.status(403).body("permission denied");
        }).await;

        let store = GcsStore::new(&server.base_url(), None).unwrap();
        let error = store.exists(&location("gs://bucket/secret.txt")).await.unwrap_err();
        assert!(matches!(error, BackendError(ref message) if message.contains("permission denied")));
    }
}
