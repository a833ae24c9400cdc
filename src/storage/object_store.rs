// Copyright 2025 Adobe. All rights reserved.
// This file is licensed to you under the Apache License,
// Version 2.0 (http://www.apache.org/licenses/LICENSE-2.0)
// or the MIT license (http://opensource.org/licenses/MIT),
// at your option.
//
// Unless required by applicable law or agreed to in writing,
// this software is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR REPRESENTATIONS OF ANY KIND, either express or
// implied. See the LICENSE-MIT and LICENSE-APACHE files for the
// specific language governing permissions and limitations under
// each license.

use super::client::{ByteRange, ListPage, ListRequest, ObjectClient, ObjectHead};
use super::config::StorageConfig;
use super::error::{from_object_store, StorageError, StorageResult};
use super::locator::{AddressingStyle, Locator};
use super::path::DELIMITER;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{StreamExt, TryStreamExt};
use object_store::{
    aws::AmazonS3Builder, path::Path, ClientOptions, GetOptions, GetRange, ObjectStore,
    PutPayload, RetryConfig,
};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Object name standing in for a directory marker.
const DIRECTORY_MARKER: &str = ".directory-marker";

/// [`ObjectClient`] over any `object_store` backend.
///
/// object_store paths cannot end in a separator, so a directory marker
/// `a/b/` is stored as the object `a/b/.directory-marker` and listed back
/// under its marker key. The empty key has no location: it cannot be written
/// and never exists. Buckets cannot be provisioned through object_store.
pub struct ObjectStoreClient {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStoreClient {
    /// Wrap an existing store that is rooted at `bucket`.
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Build an S3 store for the bucket a locator addresses.
    ///
    /// # Arguments
    ///
    /// * `config` - Storage configuration with credentials and connection options
    /// * `locator` - Parsed container root
    ///
    /// # Returns
    ///
    /// A `Result` containing:
    /// * `Ok(ObjectStoreClient)` - A client for the locator's bucket
    /// * `Err(StorageError)` - If the S3 store cannot be created
    pub fn from_config(config: &StorageConfig, locator: &Locator) -> StorageResult<Self> {
        let store = Self::build_aws_store(config, locator)?;
        info!(
            "Created object_store client for bucket={}, endpoint={:?}",
            locator.bucket(),
            locator.endpoint_url()
        );
        Ok(Self::new(Arc::new(store), locator.bucket()))
    }

    /// Build connection options from configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Storage configuration with optional timeout and connection settings
    ///
    /// # Returns
    ///
    /// A `ClientOptions` instance configured with timeout and connection settings from the config.
    fn build_connection_options(config: &StorageConfig) -> ClientOptions {
        let mut client_options = ClientOptions::default();
        if let Some(timeout_str) = config.get_option("timeout") {
            if timeout_str == "0" || timeout_str == "disabled" {
                client_options = client_options.with_timeout_disabled();
            } else if let Ok(sec) = timeout_str.parse::<u64>() {
                client_options = client_options.with_timeout(Duration::from_secs(sec))
            }
        };
        if let Some(connect_timeout_str) = config.get_option("connect_timeout") {
            if connect_timeout_str == "0" || connect_timeout_str == "disabled" {
                client_options = client_options.with_connect_timeout_disabled();
            } else if let Ok(sec) = connect_timeout_str.parse::<u64>() {
                client_options = client_options.with_connect_timeout(Duration::from_secs(sec))
            }
        }
        if let Some(pool_idle_timeout_str) = config.get_option("pool_idle_timeout") {
            if let Ok(sec) = pool_idle_timeout_str.parse::<u64>() {
                client_options = client_options.with_pool_idle_timeout(Duration::from_secs(sec))
            }
        }
        if let Some(pool_max_idle_per_host_str) = config.get_option("pool_max_idle_per_host") {
            if let Ok(max_idle) = pool_max_idle_per_host_str.parse::<usize>() {
                client_options = client_options.with_pool_max_idle_per_host(max_idle)
            }
        }
        if config.flag("allow_http") {
            client_options = client_options.with_allow_http(true);
        }
        client_options
    }

    /// Build retry options from configuration.
    ///
    /// Retries are owned by the HTTP client; these settings are passed through.
    fn build_retry_options(config: &StorageConfig) -> RetryConfig {
        let default_retry_config = RetryConfig::default();
        let max_retries = config
            .get_option("max_retries")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(default_retry_config.max_retries);
        let retry_timeout = config
            .get_option("retry_timeout")
            .and_then(|s| Some(Duration::from_secs(s.parse::<u64>().ok()?)))
            .unwrap_or(default_retry_config.retry_timeout);
        RetryConfig {
            backoff: Default::default(),
            max_retries,
            retry_timeout,
        }
    }

    /// Build an S3 store.
    ///
    /// # Errors
    ///
    /// This function will return an error if the builder rejects the configuration.
    fn build_aws_store(
        config: &StorageConfig,
        locator: &Locator,
    ) -> StorageResult<object_store::aws::AmazonS3> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(locator.bucket())
            .with_region(locator.region().unwrap_or("us-east-1"))
            .with_client_options(Self::build_connection_options(config))
            .with_retry(Self::build_retry_options(config));

        if let Some(endpoint) = locator.endpoint_url() {
            builder = builder.with_endpoint(endpoint);
        }
        if locator.style() == AddressingStyle::VirtualHosted {
            builder = builder.with_virtual_hosted_style_request(true);
        }

        for (key, value) in &config.options {
            match key.as_str() {
                "region" => builder = builder.with_region(value),
                "endpoint" => builder = builder.with_endpoint(value),
                "access_key_id" => builder = builder.with_access_key_id(value),
                "secret_access_key" => builder = builder.with_secret_access_key(value),
                "session_token" | "token" => builder = builder.with_token(value),
                "anonymous" => builder = builder.with_skip_signature(config.flag(key)),
                "force_path_style" => {
                    builder = builder.with_virtual_hosted_style_request(!config.flag(key))
                }
                // Already handled by `build_connection_options` and `build_retry_options`
                "allow_http"
                | "timeout"
                | "connect_timeout"
                | "max_retries"
                | "retry_timeout"
                | "pool_idle_timeout"
                | "pool_max_idle_per_host" => (),
                _ => {
                    tracing::warn!("Unknown object_store S3 option: {}", key);
                }
            }
        }

        builder
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to create S3 store: {}", e)))
    }

    /// Store location of a key, `None` for the empty key.
    fn location(key: &str) -> Option<Path> {
        if key.is_empty() {
            None
        } else if key.ends_with(DELIMITER) {
            Some(Path::from(format!("{}{}", key, DIRECTORY_MARKER)))
        } else {
            Some(Path::from(key))
        }
    }

    /// Key of a stored location; marker objects map back to `prefix/`.
    fn key_of(location: &Path) -> String {
        let raw = location.to_string();
        match raw.strip_suffix(DIRECTORY_MARKER) {
            Some(prefix) if prefix.ends_with(DELIMITER) => prefix.to_string(),
            _ => raw,
        }
    }

    fn to_range(range: ByteRange) -> Option<GetRange> {
        if range.is_full() {
            None
        } else if range.length == 0 {
            Some(GetRange::Offset(range.offset))
        } else {
            Some(GetRange::Bounded(range.offset..range.offset.saturating_add(range.length)))
        }
    }
}

#[async_trait]
impl ObjectClient for ObjectStoreClient {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> StorageResult<bool> {
        match self.store.list_with_delimiter(None).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = from_object_store(e, "bucket_exists", &self.bucket);
                if err.is_not_found() {
                    Ok(false)
                } else if err.is_forbidden() {
                    Ok(true)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn create_bucket(&self) -> StorageResult<()> {
        Err(StorageError::OperationNotPermitted(format!(
            "object_store cannot create bucket {}",
            self.bucket
        )))
    }

    async fn delete_bucket(&self) -> StorageResult<()> {
        Err(StorageError::OperationNotPermitted(format!(
            "object_store cannot delete bucket {}",
            self.bucket
        )))
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectHead> {
        let location = Self::location(key).ok_or_else(|| StorageError::not_found("head", key))?;
        let meta = self
            .store
            .head(&location)
            .await
            .map_err(|e| from_object_store(e, "head", key))?;
        Ok(ObjectHead {
            key: key.to_string(),
            size: meta.size,
            e_tag: meta.e_tag,
            last_modified: Some(meta.last_modified),
        })
    }

    async fn get(&self, key: &str, range: ByteRange, if_match: Option<&str>) -> StorageResult<Bytes> {
        let location = Self::location(key).ok_or_else(|| StorageError::not_found("get", key))?;
        let options = GetOptions {
            if_match: if_match.map(String::from),
            range: Self::to_range(range),
            ..Default::default()
        };
        let result = self
            .store
            .get_opts(&location, options)
            .await
            .map_err(|e| from_object_store(e, "get", key))?;
        result.bytes().await.map_err(|e| from_object_store(e, "get", key))
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<Option<String>> {
        let location = Self::location(key).ok_or_else(|| {
            StorageError::OperationNotPermitted(format!("cannot write the bucket root of {}", self.bucket))
        })?;
        let result = self
            .store
            .put(&location, PutPayload::from(data))
            .await
            .map_err(|e| from_object_store(e, "put", key))?;
        Ok(result.e_tag)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let Some(location) = Self::location(key) else {
            return Ok(());
        };
        match self.store.delete(&location).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(from_object_store(e, "delete", key)),
        }
    }

    async fn delete_batch(&self, keys: &[String]) -> StorageResult<()> {
        let locations: Vec<object_store::Result<Path>> = keys
            .iter()
            .filter_map(|key| Self::location(key))
            .map(Ok)
            .collect();
        let mut deleted = self.store.delete_stream(futures::stream::iter(locations).boxed());
        while let Some(result) = deleted.next().await {
            match result {
                Ok(_) | Err(object_store::Error::NotFound { .. }) => {}
                Err(e) => return Err(from_object_store(e, "delete_batch", &self.bucket)),
            }
        }
        Ok(())
    }

    async fn list_page(&self, request: &ListRequest) -> StorageResult<ListPage> {
        let trimmed = request.prefix.trim_end_matches(DELIMITER);
        let prefix = (!trimmed.is_empty()).then(|| Path::from(trimmed));
        let limit = request.max_keys.unwrap_or(usize::MAX);

        let mut page = ListPage::default();
        if request.delimiter.is_some() {
            let result = self
                .store
                .list_with_delimiter(prefix.as_ref())
                .await
                .map_err(|e| from_object_store(e, "list", &request.prefix))?;
            page.common_prefixes = result
                .common_prefixes
                .iter()
                .map(|p| format!("{}{}", p, DELIMITER))
                .filter(|p| p.starts_with(request.prefix.as_str()))
                .take(limit)
                .collect();
            let remaining = limit.saturating_sub(page.common_prefixes.len());
            page.keys = result
                .objects
                .iter()
                .map(|meta| Self::key_of(&meta.location))
                .filter(|key| key.starts_with(request.prefix.as_str()))
                .take(remaining)
                .collect();
        } else {
            let objects: Vec<_> = self
                .store
                .list(prefix.as_ref())
                .try_collect()
                .await
                .map_err(|e| from_object_store(e, "list", &request.prefix))?;
            page.keys = objects
                .iter()
                .map(|meta| Self::key_of(&meta.location))
                .filter(|key| key.starts_with(request.prefix.as_str()))
                .take(limit)
                .collect();
        }

        debug!(
            "Listed prefix={}, found count={} entries",
            request.prefix,
            page.common_prefixes.len() + page.keys.len()
        );
        Ok(page)
    }
}

impl Debug for ObjectStoreClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectClient(type=object_store, bucket={}, store={})", self.bucket, self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn client() -> ObjectStoreClient {
        ObjectStoreClient::new(Arc::new(InMemory::new()), "bucket")
    }

    #[test]
    fn test_build_connection_options_with_timeouts() {
        let config = StorageConfig::object_store("s3://bucket")
            .with_option("timeout", "disabled")
            .with_option("connect_timeout", "10")
            .with_option("pool_max_idle_per_host", "not_a_number");

        let _options = ObjectStoreClient::build_connection_options(&config);
        // No assertion, just make sure is does not panic
    }

    #[test]
    fn test_build_retry_options_custom() {
        let config = StorageConfig::object_store("s3://bucket")
            .with_option("max_retries", "5")
            .with_option("retry_timeout", "300");

        let retry_config = ObjectStoreClient::build_retry_options(&config);
        assert_eq!(retry_config.max_retries, 5);
        assert_eq!(retry_config.retry_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_build_retry_options_invalid_values() {
        let config = StorageConfig::object_store("s3://bucket")
            .with_option("max_retries", "invalid")
            .with_option("retry_timeout", "not_a_number");

        let retry_config = ObjectStoreClient::build_retry_options(&config);
        assert_eq!(retry_config.max_retries, RetryConfig::default().max_retries);
    }

    #[test]
    fn test_from_config_self_hosted() {
        let config = StorageConfig::object_store("http://localhost:9000/bucket/root")
            .with_option("access_key_id", "minio")
            .with_option("secret_access_key", "minio123")
            .with_option("allow_http", "true");
        let locator = Locator::parse(&config.uri).unwrap();

        let client = ObjectStoreClient::from_config(&config, &locator).unwrap();
        assert_eq!(client.bucket(), "bucket");
        assert!(format!("{:?}", client).contains("type=object_store"));
    }

    #[test]
    fn test_range_conversion() {
        assert_eq!(ObjectStoreClient::to_range(ByteRange::full()), None);
        assert_eq!(
            ObjectStoreClient::to_range(ByteRange::new(3, 0)),
            Some(GetRange::Offset(3))
        );
        assert_eq!(
            ObjectStoreClient::to_range(ByteRange::new(3, 4)),
            Some(GetRange::Bounded(3..7))
        );
        assert_eq!(
            ObjectStoreClient::to_range(ByteRange::new(u64::MAX - 1, 10)),
            Some(GetRange::Bounded(u64::MAX - 1..u64::MAX))
        );
    }

    #[tokio::test]
    async fn test_put_head_get_range() {
        let client = client();
        client.put("a/b", Bytes::from_static(b"0123456789")).await.unwrap();

        let head = client.head("a/b").await.unwrap();
        assert_eq!(head.size, 10);
        assert!(head.e_tag.is_some());

        let part = client.get("a/b", ByteRange::new(2, 3), None).await.unwrap();
        assert_eq!(&part[..], b"234");
        let tail = client.get("a/b", ByteRange::new(8, 0), None).await.unwrap();
        assert_eq!(&tail[..], b"89");
    }

    #[tokio::test]
    async fn test_if_match_mismatch_is_concurrent_modification() {
        let client = client();
        client.put("k", Bytes::from_static(b"one")).await.unwrap();
        let e_tag = client.head("k").await.unwrap().e_tag.unwrap();
        client.put("k", Bytes::from_static(b"two")).await.unwrap();

        let err = client.get("k", ByteRange::full(), Some(&e_tag)).await.unwrap_err();
        assert!(err.is_concurrent_modification());
    }

    #[test]
    fn test_marker_locations() {
        assert_eq!(ObjectStoreClient::location(""), None);
        assert_eq!(ObjectStoreClient::location("a/b"), Some(Path::from("a/b")));
        let marker = ObjectStoreClient::location("a/b/").unwrap();
        assert_eq!(marker.to_string(), "a/b/.directory-marker");
        assert_eq!(ObjectStoreClient::key_of(&marker), "a/b/");
        assert_eq!(ObjectStoreClient::key_of(&Path::from("a/x.directory-marker")), "a/x.directory-marker");
    }

    #[tokio::test]
    async fn test_markers_are_stored_and_listed() {
        let client = client();
        assert!(client.put("a/", Bytes::new()).await.unwrap().is_some());
        assert_eq!(client.head("a/").await.unwrap().size, 0);
        assert!(client.head("a").await.unwrap_err().is_not_found());
        assert!(client.head("missing").await.unwrap_err().is_not_found());

        let root = client.list_page(&ListRequest::delimited("", '/')).await.unwrap();
        assert_eq!(root.common_prefixes, vec!["a/"]);
        let inside = client.list_page(&ListRequest::delimited("a/", '/')).await.unwrap();
        assert_eq!(inside.keys, vec!["a/"]);

        client.delete("a/").await.unwrap();
        assert!(client.head("a/").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_root_key_cannot_be_written() {
        let client = client();
        assert!(matches!(
            client.put("", Bytes::new()).await,
            Err(StorageError::OperationNotPermitted(_))
        ));
        assert!(client.head("").await.unwrap_err().is_not_found());
        client.delete("").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_page_groups_and_filters() {
        let client = client();
        for key in ["a/b/c", "a/b/d", "a/e", "f"] {
            client.put(key, Bytes::from_static(b"x")).await.unwrap();
        }

        let page = client.list_page(&ListRequest::delimited("a/", '/')).await.unwrap();
        assert_eq!(page.common_prefixes, vec!["a/b/"]);
        assert_eq!(page.keys, vec!["a/e"]);
        assert!(!page.is_truncated());

        let probe = client
            .list_page(&ListRequest::delimited("a/b/", '/').with_max_keys(1))
            .await
            .unwrap();
        assert_eq!(probe.keys.len(), 1);

        let recursive = client.list_page(&ListRequest::recursive("a/")).await.unwrap();
        assert_eq!(recursive.keys.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_batch_and_missing_keys() {
        let client = client();
        client.put("a/1", Bytes::new()).await.unwrap();
        client.put("a/2", Bytes::new()).await.unwrap();

        client.put("a/", Bytes::new()).await.unwrap();

        client
            .delete_batch(&["a/1".to_string(), "a/2".to_string(), "a/".to_string(), "".to_string()])
            .await
            .unwrap();
        client.delete("a/1").await.unwrap();

        let page = client.list_page(&ListRequest::recursive("")).await.unwrap();
        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_buckets_are_not_provisioned() {
        let client = client();
        assert!(client.bucket_exists().await.unwrap());
        assert!(matches!(
            client.create_bucket().await,
            Err(StorageError::OperationNotPermitted(_))
        ));
        assert!(matches!(
            client.delete_bucket().await,
            Err(StorageError::OperationNotPermitted(_))
        ));
    }
}
