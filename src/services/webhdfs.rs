use async_trait::async_trait;
use log::{debug, error};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client, StatusCode, Url};
use crate::config::MichiConfig;
use crate::errors::MichiError::{BackendError, InvalidArgumentError, NotFoundError};
use crate::errors::MichiResult;
use crate::services::ObjectStore;
use crate::types::webhdfs::{CreateLocation, FileStatusResponse, HdfsFileStatus, ListStatusResponse};
use crate::types::{FileStatistics, ListEntry};
use crate::utils::parser::{ObjectLocation, Scheme};
use crate::utils::reqwest::AuthType::Bearer;
use crate::utils::reqwest::{check_response, get_client_with_token, get_client_without_redirect, send_error};

pub const DEFAULT_WEBHDFS_PORT: u16 = 9870;

/// HDFS client over the WebHDFS REST API.
///
/// `hdfs://namenode:9870/user/data` is served by
/// `http://namenode:9870/webhdfs/v1/user/data?op=...`. HDFS has real directories,
/// so the directory checks ask the namenode instead of looking at key prefixes.
pub struct WebHdfsStore {
    client: Client,
    // CREATE answers with a redirect to a datanode, the body goes in a second request.
    redirect_client: Client,
    http_scheme: String,
    default_namenode: String,
    user: Option<String>,
}

impl WebHdfsStore {
    pub fn new(http_scheme: &str, default_namenode: &str, user: Option<&str>) -> MichiResult<Self> {
        if !["http", "https"].contains(&http_scheme) {
            error!("WebHDFS scheme is invalid: {}", http_scheme);
            return Err(InvalidArgumentError(format!("WebHDFS scheme must be http or https, got {}", http_scheme)));
        }

        Ok(Self {
            client: get_client_with_token(None, Bearer)?,
            redirect_client: get_client_without_redirect()?,
            http_scheme: http_scheme.to_string(),
            default_namenode: default_namenode.to_string(),
            user: user.map(String::from),
        })
    }

    pub fn from_config(config: &MichiConfig) -> MichiResult<Self> {
        Self::new(&config.webhdfs_scheme, &config.hdfs_namenode, config.hdfs_user.as_deref())
    }

    fn url(&self, location: &ObjectLocation, key: &str, op: &str, params: &[(&str, &str)]) -> MichiResult<Url> {
        let authority = match location.namespace() {
            "" => self.default_namenode.clone(),
            namespace if namespace.contains(':') => namespace.to_string(),
            namespace => format!("{}:{}", namespace, DEFAULT_WEBHDFS_PORT),
        };
        let base = format!("{}://{}/webhdfs/v1", self.http_scheme, authority);
        let mut url = Url::parse(&base)
            .map_err(|e| BackendError(format!("Invalid namenode address {}: {}", authority, e)))?;

        let mut segments = key.split('/').filter(|segment| !segment.is_empty()).peekable();
        {
            let mut path = url.path_segments_mut()
                .map_err(|_| BackendError(format!("{} cannot be a base", base)))?;
            if segments.peek().is_none() {
                path.push("");
            }
            path.extend(segments);
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            if let Some(user) = &self.user {
                query.append_pair("user.name", user);
            }
            for (name, value) in params {
                query.append_pair(name, value);
            }
        }
        Ok(url)
    }

    /// Status of the path, [None] when HDFS doesn't know it.
    async fn file_status(&self, location: &ObjectLocation) -> MichiResult<Option<HdfsFileStatus>> {
        let target = location.to_string();
        let url = self.url(location, location.object_key(), "GETFILESTATUS", &[])?;
        let response = self.client.get(url)
            .send()
            .await
            .map_err(|e| send_error(&target, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = check_response(&target, response).await?
            .json::<FileStatusResponse>()
            .await
            .map_err(|e| BackendError(format!("Failed to parse file status of {}: {}", target, e)))?;
        Ok(Some(status.file_status))
    }

    async fn list_status(&self, location: &ObjectLocation, key: &str) -> MichiResult<Vec<HdfsFileStatus>> {
        let target = location.with_key(key).to_string();
        let url = self.url(location, key, "LISTSTATUS", &[])?;
        let response = self.client.get(url)
            .send()
            .await
            .map_err(|e| send_error(&target, e))?;

        let statuses = check_response(&target, response).await?
            .json::<ListStatusResponse>()
            .await
            .map_err(|e| BackendError(format!("Failed to parse directory listing of {}: {}", target, e)))?;
        Ok(statuses.file_statuses.file_status)
    }

    /// Ask the namenode where the data goes, either by redirect or by a JSON `Location`.
    async fn create_location(&self, location: &ObjectLocation) -> MichiResult<String> {
        let target = location.to_string();
        let url = self.url(location, location.object_key(), "CREATE", &[("overwrite", "true")])?;
        let response = self.redirect_client.put(url)
            .send()
            .await
            .map_err(|e| send_error(&target, e))?;

        if response.status().is_redirection() {
            return response.headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(String::from)
                .ok_or_else(|| BackendError(format!("Namenode redirect for {} has no Location", target)));
        }

        let redirect = check_response(&target, response).await?
            .json::<CreateLocation>()
            .await
            .map_err(|e| BackendError(format!("Failed to parse create location of {}: {}", target, e)))?;
        Ok(redirect.location)
    }
}

#[async_trait]
impl ObjectStore for WebHdfsStore {
    fn scheme(&self) -> Scheme {
        Scheme::Hdfs
    }

    async fn exists(&self, location: &ObjectLocation) -> MichiResult<bool> {
        Ok(self.file_status(location).await?.is_some())
    }

    async fn is_dir(&self, location: &ObjectLocation) -> MichiResult<bool> {
        Ok(self.file_status(location).await?.is_some_and(|status| status.is_dir()))
    }

    async fn list(&self, location: &ObjectLocation) -> MichiResult<Vec<ListEntry>> {
        let statuses = self.list_status(location, location.object_key()).await?;

        // LISTSTATUS on a file answers with the file itself.
        if let [status] = statuses.as_slice() {
            if status.path_suffix.is_empty() && !status.is_dir() {
                return Err(BackendError(format!("{} is not a directory", location)));
            }
        }

        let entries = statuses.into_iter()
            .map(|status| ListEntry {
                is_dir: status.is_dir(),
                name: status.path_suffix,
            })
            .collect::<Vec<_>>();
        debug!("Listed {} entries in {}", entries.len(), location);
        Ok(entries)
    }

    async fn list_recursive(&self, location: &ObjectLocation) -> MichiResult<Vec<String>> {
        let prefix = location.key();
        let start = prefix.rsplit_once('/').map(|(dir, _)| dir).unwrap_or_default();

        let mut keys = Vec::new();
        let mut pending = vec![start.to_string()];
        while let Some(dir) = pending.pop() {
            let statuses = match self.list_status(location, &dir).await {
                Ok(statuses) => statuses,
                Err(NotFoundError(_)) if dir == start => break,
                Err(e) => return Err(e),
            };

            for status in statuses {
                let key = if dir.is_empty() {
                    status.path_suffix.clone()
                } else {
                    format!("{}/{}", dir, status.path_suffix)
                };
                if status.is_dir() {
                    let dir_prefix = format!("{}/", key);
                    if dir_prefix.starts_with(prefix) || prefix.starts_with(&dir_prefix) {
                        pending.push(key);
                    }
                } else if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        debug!("Listed {} files with prefix {}", keys.len(), location);
        Ok(keys)
    }

    async fn stat(&self, location: &ObjectLocation) -> MichiResult<FileStatistics> {
        self.file_status(location)
            .await?
            .map(|status| status.to_statistics())
            .ok_or_else(|| NotFoundError(location.to_string()))
    }

    async fn get(&self, location: &ObjectLocation) -> MichiResult<Vec<u8>> {
        let target = location.to_string();
        let url = self.url(location, location.object_key(), "OPEN", &[])?;
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
        let datanode = self.create_location(location).await?;

        let size = data.len();
        let response = self.client.put(&datanode)
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
