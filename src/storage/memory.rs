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

//! Process-local object store with S3 listing semantics.
//!
//! Keys are kept sorted so prefix/delimiter grouping and start-after
//! pagination behave like the real service, including a configurable page
//! cap small enough to force multi-page listings in tests.

use super::client::{ByteRange, ListPage, ListRequest, ObjectClient, ObjectHead};
use super::error::{classify_status, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Listing page cap of S3.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

const KEY_TOKEN: &str = "k:";
const PREFIX_TOKEN: &str = "p:";

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    e_tag: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct State {
    bucket_exists: bool,
    objects: BTreeMap<String, StoredObject>,
    version: u64,
}

/// In-memory [`ObjectClient`] for a single bucket.
#[derive(Debug)]
pub struct InMemoryClient {
    bucket: String,
    page_size: usize,
    state: RwLock<State>,
    requests: AtomicUsize,
}

impl InMemoryClient {
    /// Client whose bucket already exists.
    pub fn new(bucket: impl Into<String>) -> Self {
        let client = Self::without_bucket(bucket);
        client.state.write().bucket_exists = true;
        client
    }

    /// Client whose bucket has not been created yet.
    pub fn without_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            page_size: DEFAULT_PAGE_SIZE,
            state: RwLock::new(State::default()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Cap every listing page at `page_size` entries.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Number of requests served so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// All stored keys in order.
    pub fn keys(&self) -> Vec<String> {
        self.state.read().objects.keys().cloned().collect()
    }

    fn count_request(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn no_such_bucket(&self, operation: &'static str) -> StorageError {
        classify_status(404, Some("NoSuchBucket"), operation, &self.bucket, "bucket does not exist")
    }
}

#[async_trait]
impl ObjectClient for InMemoryClient {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> StorageResult<bool> {
        self.count_request();
        Ok(self.state.read().bucket_exists)
    }

    async fn create_bucket(&self) -> StorageResult<()> {
        self.count_request();
        self.state.write().bucket_exists = true;
        Ok(())
    }

    async fn delete_bucket(&self) -> StorageResult<()> {
        self.count_request();
        let mut state = self.state.write();
        if !state.bucket_exists {
            return Err(self.no_such_bucket("delete_bucket"));
        }
        if !state.objects.is_empty() {
            return Err(classify_status(
                409,
                Some("BucketNotEmpty"),
                "delete_bucket",
                &self.bucket,
                "the bucket you tried to delete is not empty",
            ));
        }
        state.bucket_exists = false;
        Ok(())
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectHead> {
        self.count_request();
        let state = self.state.read();
        if !state.bucket_exists {
            return Err(self.no_such_bucket("head"));
        }
        let object = state
            .objects
            .get(key)
            .ok_or_else(|| classify_status(404, None, "head", key, "no such key"))?;
        Ok(ObjectHead {
            key: key.to_string(),
            size: object.data.len() as u64,
            e_tag: Some(object.e_tag.clone()),
            last_modified: Some(object.last_modified),
        })
    }

    async fn get(&self, key: &str, range: ByteRange, if_match: Option<&str>) -> StorageResult<Bytes> {
        self.count_request();
        let state = self.state.read();
        if !state.bucket_exists {
            return Err(self.no_such_bucket("get"));
        }
        let object = state
            .objects
            .get(key)
            .ok_or_else(|| classify_status(404, Some("NoSuchKey"), "get", key, "no such key"))?;
        if let Some(expected) = if_match {
            if expected != object.e_tag {
                return Err(classify_status(
                    412,
                    Some("PreconditionFailed"),
                    "get",
                    key,
                    format!("expected ETag {}, found {}", expected, object.e_tag),
                ));
            }
        }
        let size = object.data.len() as u64;
        if !range.is_full() && range.offset >= size {
            return Err(classify_status(
                416,
                Some("InvalidRange"),
                "get",
                key,
                format!("range starts at {} beyond size {}", range.offset, size),
            ));
        }
        let bounds = range.bounds(size);
        Ok(object.data.slice(bounds.start as usize..bounds.end as usize))
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<Option<String>> {
        self.count_request();
        let mut state = self.state.write();
        if !state.bucket_exists {
            return Err(self.no_such_bucket("put"));
        }
        state.version += 1;
        let e_tag = format!("\"{:016x}\"", state.version);
        state.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                e_tag: e_tag.clone(),
                last_modified: Utc::now(),
            },
        );
        Ok(Some(e_tag))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.count_request();
        let mut state = self.state.write();
        if !state.bucket_exists {
            return Err(self.no_such_bucket("delete"));
        }
        state.objects.remove(key);
        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> StorageResult<()> {
        self.count_request();
        let mut state = self.state.write();
        if !state.bucket_exists {
            return Err(self.no_such_bucket("delete_batch"));
        }
        for key in keys {
            state.objects.remove(key);
        }
        Ok(())
    }

    async fn list_page(&self, request: &ListRequest) -> StorageResult<ListPage> {
        self.count_request();
        let state = self.state.read();
        if !state.bucket_exists {
            return Err(self.no_such_bucket("list"));
        }

        let limit = request
            .max_keys
            .unwrap_or(self.page_size)
            .min(self.page_size)
            .max(1);
        let prefix = request.prefix.as_str();

        let (start, skip_prefix) = match request.continuation_token.as_deref() {
            Some(token) if token.starts_with(PREFIX_TOKEN) => {
                let last = &token[PREFIX_TOKEN.len()..];
                (Bound::Excluded(last.to_string()), Some(last.to_string()))
            }
            Some(token) => {
                let last = token.strip_prefix(KEY_TOKEN).unwrap_or(token);
                (Bound::Excluded(last.to_string()), None)
            }
            None => (Bound::Included(prefix.to_string()), None),
        };

        let mut page = ListPage::default();
        let mut emitted = 0usize;
        let mut last_token: Option<String> = None;

        for key in state
            .objects
            .range::<String, _>((start, Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
        {
            if let Some(skip) = &skip_prefix {
                if key.starts_with(skip.as_str()) {
                    continue;
                }
            }

            let rest = &key[prefix.len()..];
            let grouped = request
                .delimiter
                .and_then(|d| rest.find(d).map(|idx| &key[..prefix.len() + idx + d.len_utf8()]));

            let token = match grouped {
                Some(common_prefix) => {
                    if page.common_prefixes.last().map(String::as_str) == Some(common_prefix) {
                        continue;
                    }
                    format!("{}{}", PREFIX_TOKEN, common_prefix)
                }
                None => format!("{}{}", KEY_TOKEN, key),
            };

            if emitted == limit {
                page.next_continuation_token = last_token;
                break;
            }

            match grouped {
                Some(common_prefix) => page.common_prefixes.push(common_prefix.to_string()),
                None => page.keys.push(key.clone()),
            }
            emitted += 1;
            last_token = Some(token);
        }

        debug!(
            "Listed prefix={}, found count={} entries, truncated={}",
            prefix,
            emitted,
            page.is_truncated()
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    async fn client_with(keys: &[&str], page_size: usize) -> InMemoryClient {
        let client = InMemoryClient::new("bucket").with_page_size(page_size);
        for key in keys {
            client.put(key, Bytes::from_static(b"x")).await.unwrap();
        }
        client
    }

    async fn drain(client: &InMemoryClient, request: ListRequest) -> (Vec<String>, Vec<String>, usize) {
        let mut prefixes = Vec::new();
        let mut keys = Vec::new();
        let mut pages = 0;
        let mut token = None;
        loop {
            let page = client
                .list_page(&request.clone().with_continuation_token(token))
                .await
                .unwrap();
            pages += 1;
            prefixes.extend(page.common_prefixes);
            keys.extend(page.keys);
            token = page.next_continuation_token;
            if token.is_none() {
                break;
            }
        }
        (prefixes, keys, pages)
    }

    #[tokio::test]
    async fn test_put_head_get() {
        let client = InMemoryClient::new("bucket");
        let e_tag = client.put("a/b", Bytes::from_static(b"hello")).await.unwrap();

        let head = client.head("a/b").await.unwrap();
        assert_eq!(head.size, 5);
        assert_eq!(head.e_tag, e_tag);
        assert!(head.last_modified.is_some());

        let data = client.get("a/b", ByteRange::full(), None).await.unwrap();
        assert_eq!(&data[..], b"hello");
        let part = client.get("a/b", ByteRange::new(1, 3), None).await.unwrap();
        assert_eq!(&part[..], b"ell");
        let tail = client.get("a/b", ByteRange::new(2, 0), None).await.unwrap();
        assert_eq!(&tail[..], b"llo");
    }

    #[tokio::test]
    async fn test_missing_key_is_not_found() {
        let client = InMemoryClient::new("bucket");
        assert!(client.head("missing").await.unwrap_err().is_not_found());
        assert!(client
            .get("missing", ByteRange::full(), None)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_every_put_changes_etag() {
        let client = InMemoryClient::new("bucket");
        let first = client.put("k", Bytes::from_static(b"1")).await.unwrap();
        let second = client.put("k", Bytes::from_static(b"1")).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_if_match_precondition() {
        let client = InMemoryClient::new("bucket");
        let e_tag = client.put("k", Bytes::from_static(b"one")).await.unwrap().unwrap();
        assert!(client.get("k", ByteRange::full(), Some(&e_tag)).await.is_ok());

        client.put("k", Bytes::from_static(b"two")).await.unwrap();
        let err = client.get("k", ByteRange::full(), Some(&e_tag)).await.unwrap_err();
        assert!(err.is_concurrent_modification());
    }

    #[tokio::test]
    async fn test_range_beyond_end_is_io_error() {
        let client = client_with(&["k"], 10).await;
        let err = client.get("k", ByteRange::new(5, 1), None).await.unwrap_err();
        match err {
            StorageError::IoError { status, .. } => assert_eq!(status, Some(416)),
            other => panic!("Expected IoError variant, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delimited_listing_groups_prefixes() {
        let client = client_with(&["a/b/c/", "a/b/d", "a/e", "a/f/g", "b/h"], 100).await;
        let page = client
            .list_page(&ListRequest::delimited("a/", '/'))
            .await
            .unwrap();
        assert_eq!(page.common_prefixes, vec!["a/b/", "a/f/"]);
        assert_eq!(page.keys, vec!["a/e"]);
        assert!(!page.is_truncated());
    }

    #[tokio::test]
    async fn test_marker_at_prefix_is_listed_as_key() {
        let client = client_with(&["a/", "a/b/", "a/c/d"], 1).await;
        let (prefixes, keys, pages) = drain(&client, ListRequest::delimited("a/", '/')).await;
        assert_eq!(keys, vec!["a/"]);
        assert_eq!(prefixes, vec!["a/b/", "a/c/"]);
        assert_eq!(pages, 3);
    }

    #[tokio::test]
    async fn test_paged_listing_matches_unpaged() {
        let keys: Vec<String> = (0..23)
            .flat_map(|i| vec![format!("root/d{:02}/x", i), format!("root/d{:02}/y", i), format!("root/f{:02}", i)])
            .collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();

        let paged = client_with(&refs, 4).await;
        let unpaged = client_with(&refs, DEFAULT_PAGE_SIZE).await;

        let request = ListRequest::delimited("root/", '/');
        let (paged_prefixes, paged_keys, pages) = drain(&paged, request.clone()).await;
        let (prefixes, all_keys, single) = drain(&unpaged, request).await;

        assert_eq!(single, 1);
        assert!(pages > 1);
        assert_eq!(paged_prefixes, prefixes);
        assert_eq!(paged_keys, all_keys);
        assert_eq!(prefixes.iter().collect::<BTreeSet<_>>().len(), 23);
        assert_eq!(all_keys.len(), 23);
    }

    #[tokio::test]
    async fn test_recursive_listing_with_max_keys() {
        let client = client_with(&["p/1", "p/2/3", "p/4", "q"], 100).await;
        let page = client
            .list_page(&ListRequest::recursive("p/").with_max_keys(2))
            .await
            .unwrap();
        assert_eq!(page.keys, vec!["p/1", "p/2/3"]);
        assert!(page.is_truncated());

        let (_, keys, _) = drain(&client, ListRequest::recursive("p/")).await;
        assert_eq!(keys, vec!["p/1", "p/2/3", "p/4"]);
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let client = InMemoryClient::without_bucket("bucket");
        assert!(!client.bucket_exists().await.unwrap());
        assert!(client.put("k", Bytes::new()).await.unwrap_err().is_not_found());

        client.create_bucket().await.unwrap();
        client.create_bucket().await.unwrap();
        assert!(client.bucket_exists().await.unwrap());

        client.put("k", Bytes::new()).await.unwrap();
        let err = client.delete_bucket().await.unwrap_err();
        assert!(matches!(err, StorageError::IoError { status: Some(409), .. }));

        client.delete_batch(&["k".to_string()]).await.unwrap();
        client.delete_bucket().await.unwrap();
        assert!(!client.bucket_exists().await.unwrap());
        assert!(client.delete_bucket().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_request_counter() {
        let client = InMemoryClient::new("bucket");
        client.put("k", Bytes::new()).await.unwrap();
        client.head("k").await.unwrap();
        client.delete("k").await.unwrap();
        client.delete("k").await.unwrap();
        assert_eq!(client.request_count(), 4);
        assert!(client.keys().is_empty());
    }
}
