use std::fmt::{Display, Formatter};
use std::sync::LazyLock;
use log::error;
use regex::Regex;
use crate::errors::MichiError::BackendError;
use crate::errors::MichiResult;

pub const GCS_PREFIX: &str = "gs://";
pub const HDFS_PREFIX: &str = "hdfs://";

// Splits `namespace/key` after the prefix was removed. The key keeps its trailing slash
// because it is meaningful for prefix listings.
static NAMESPACE_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: The regex statement is const string so this is always Ok().
    Regex::new(r"(?s)^([^/]*)(?:/(.*))?$").unwrap()
});

// Google Cloud Storage bucket naming rules (dotted names can be longer).
static GCS_BUCKET_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: The regex statement is const string so this is always Ok().
    Regex::new(r"^[a-z0-9][a-z0-9._-]{1,220}[a-z0-9]$").unwrap()
});

/// Storage scheme a path string belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Local,
    Gs,
    Hdfs,
}

impl Scheme {
    /// Every scheme served by a remote object store, in prefix-check order.
    pub const REMOTE: [Scheme; 2] = [Scheme::Gs, Scheme::Hdfs];

    /// Get prefix(e.x. `gs://`, `hdfs://`). Local paths have no prefix.
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Scheme::Local => None,
            Scheme::Gs => Some(GCS_PREFIX),
            Scheme::Hdfs => Some(HDFS_PREFIX),
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, Scheme::Local)
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Local => write!(f, "local"),
            Scheme::Gs => write!(f, "gs"),
            Scheme::Hdfs => write!(f, "hdfs"),
        }
    }
}

/// Classify the path by its prefix only. No disk or network access happens here,
/// and every input (including the empty string) has an answer.
pub fn classify(path: &str) -> Scheme {
    Scheme::REMOTE
        .into_iter()
        .find(|scheme| scheme.prefix().is_some_and(|prefix| path.starts_with(prefix)))
        .unwrap_or(Scheme::Local)
}

/// Remote path split into the namespace and the object key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    scheme: Scheme,
    namespace: String,
    key: String,
}

impl ObjectLocation {
    pub(crate) fn new(scheme: Scheme, namespace: &str, key: &str) -> Self {
        Self {
            scheme,
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Get namespace(GCS bucket name, HDFS namenode authority).
    /// `hdfs:///path` has an empty namespace and uses the configured namenode.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Get object key except for namespace. It never starts with `/`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Key without trailing slashes, as used for single object lookups.
    pub fn object_key(&self) -> &str {
        self.key.trim_end_matches('/')
    }

    /// Prefix that selects the children of this location when it is a "directory".
    pub fn dir_prefix(&self) -> String {
        let key = self.object_key();
        if key.is_empty() {
            String::new()
        } else {
            format!("{}/", key)
        }
    }

    /// Location of a key in the same namespace.
    pub fn with_key(&self, key: &str) -> Self {
        Self::new(self.scheme, &self.namespace, key)
    }
}

impl Display for ObjectLocation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let prefix = self.scheme.prefix().unwrap_or_default();
        write!(f, "{}{}/{}", prefix, self.namespace, self.key)
    }
}

/// Parse a remote path into its scheme, namespace and key.
///
/// # Arguments
/// - `input`: Path that starts with `gs://` or `hdfs://`.
///
/// # Returns
/// - MichiResult<[ObjectLocation]>: when the path can't address an object
///   (no bucket, bad bucket name, `//` in the key, local path), returns [BackendError]
///   the same way the object store client would refuse it.
pub fn parse_object_location(input: &str) -> MichiResult<ObjectLocation> {
    let scheme = classify(input);
    let rest = match scheme.prefix() {
        // SAFETY: classify() returned this prefix so the input always starts with it.
        Some(prefix) => input.strip_prefix(prefix).unwrap(),
        None => {
            error!("Input path is not a remote path: {}", input);
            return Err(BackendError(format!("Invalid Path: {} has no remote prefix", input)));
        }
    };

    // SAFETY: Every string matches the regex, the first group accepts empty input.
    let captures = NAMESPACE_KEY_REGEX.captures(rest).unwrap();
    let namespace = captures.get(1).map(|c| c.as_str()).unwrap_or_default();
    let key = captures.get(2).map(|c| c.as_str()).unwrap_or_default();

    if scheme == Scheme::Gs && !GCS_BUCKET_REGEX.is_match(namespace) {
        error!("Input path has an invalid bucket name: {}", input);
        return Err(BackendError(format!("Invalid Path: {} has an invalid bucket name '{}'", input, namespace)));
    }

    // When the key has '//' or so, it can be ambiguous so refuse it.
    if key.contains("//") || key.starts_with('/') {
        error!("Input path is invalid due to have 2 or more chained slash: {}", input);
        return Err(BackendError(format!(
            "Invalid Path: {} is invalid path. To avoid ambiguous process, \
            '//' or more chain slash cannot use.", input)));
    }

    Ok(ObjectLocation::new(scheme, namespace, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_remote_prefixes() {
        assert_eq!(classify("gs://bucket/key"), Scheme::Gs);
        assert_eq!(classify("hdfs://namenode:9870/user/data"), Scheme::Hdfs);
        assert_eq!(classify("gs://"), Scheme::Gs);
        assert!(classify("hdfs:///tmp").is_remote());
    }

    #[test]
    fn test_classify_local() {
        assert_eq!(classify(""), Scheme::Local);
        assert_eq!(classify("/tmp/data.txt"), Scheme::Local);
        assert_eq!(classify("relative/gs://nested"), Scheme::Local);
        assert_eq!(classify("GS://bucket/key"), Scheme::Local);
        assert_eq!(classify("s3://bucket/key"), Scheme::Local);
        assert_eq!(classify("gs:/bucket"), Scheme::Local);
    }

    #[test]
    fn test_parse_gcs_location() {
        let location = parse_object_location("gs://my-bucket/data/train.csv").unwrap();
        assert_eq!(location.scheme(), Scheme::Gs);
        assert_eq!(location.namespace(), "my-bucket");
        assert_eq!(location.key(), "data/train.csv");
        assert_eq!(location.to_string(), "gs://my-bucket/data/train.csv");

        let location = parse_object_location("gs://my-bucket").unwrap();
        assert_eq!(location.key(), "");
        assert_eq!(location.dir_prefix(), "");

        let location = parse_object_location("gs://my-bucket/data/").unwrap();
        assert_eq!(location.key(), "data/");
        assert_eq!(location.object_key(), "data");
        assert_eq!(location.dir_prefix(), "data/");
    }

    #[test]
    fn test_parse_hdfs_location() {
        let location = parse_object_location("hdfs://namenode:9870/user/shima/file").unwrap();
        assert_eq!(location.namespace(), "namenode:9870");
        assert_eq!(location.key(), "user/shima/file");

        let location = parse_object_location("hdfs:///user/shima/file").unwrap();
        assert_eq!(location.namespace(), "");
        assert_eq!(location.key(), "user/shima/file");
    }

    #[test]
    fn test_parse_invalid_bucket() {
        for input in ["gs://", "gs:///key", "gs://Upper/key", "gs://a/key"] {
            let result = parse_object_location(input);
            assert!(matches!(result, Err(BackendError(_))), "{}", input);
        }
    }

    #[test]
    fn test_parse_invalid_path() {
        let error = parse_object_location("gs://bucket/test//key").unwrap_err();
        assert_eq!(
            error.to_string(),
            BackendError(
                "Invalid Path: gs://bucket/test//key is invalid path. \
                To avoid ambiguous process, '//' or more chain slash cannot use.".to_string()).to_string());

        assert!(parse_object_location("/local/path").is_err());
    }
}
