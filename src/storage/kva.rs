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

use super::bucket::BucketLifecycle;
use super::channel::ObjectChannel;
use super::client::ObjectClient;
use super::config::IoPolicyKind;
use super::error::{StorageError, StorageResult};
use super::listing::ListingEngine;
use super::locator::Locator;
use super::path;
use super::policy::{policy_for, IoPolicy};
use super::provider::KeyValueAccess;
use super::read::LazyRead;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};

/// [`KeyValueAccess`] over an S3-style object store.
///
/// Container paths are translated to object keys under the locator's root
/// key. Mutations run through the configured consistency policy and, on a
/// provisioning adapter, create the bucket first if it is missing.
#[derive(Debug)]
pub struct S3KeyValueAccess {
    locator: Locator,
    client: Arc<dyn ObjectClient>,
    listing: ListingEngine,
    policy: Arc<dyn IoPolicy>,
    lifecycle: Arc<BucketLifecycle>,
}

impl S3KeyValueAccess {
    /// Open a container.
    ///
    /// # Arguments
    ///
    /// * `client` - Object client bound to the locator's bucket
    /// * `locator` - Root of the container
    /// * `create_bucket` - Whether the adapter may create and delete the bucket
    /// * `io_policy` - Consistency policy for reads and mutations
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the bucket does not exist and `create_bucket` is
    /// off, or the client's error if the existence check fails.
    pub async fn open(
        client: Arc<dyn ObjectClient>,
        locator: Locator,
        create_bucket: bool,
        io_policy: IoPolicyKind,
    ) -> StorageResult<Self> {
        let lifecycle = Arc::new(BucketLifecycle::new(client.clone(), create_bucket));
        if !create_bucket && !lifecycle.bucket_exists().await? {
            return Err(StorageError::not_found("open", locator.bucket()));
        }
        info!(
            "Opened container root={}, io_policy={}, create_bucket={}",
            locator, io_policy, create_bucket
        );
        Ok(Self {
            listing: ListingEngine::new(client.clone()),
            policy: policy_for(io_policy, client.clone()),
            locator,
            client,
            lifecycle,
        })
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn client(&self) -> &Arc<dyn ObjectClient> {
        &self.client
    }

    fn key(&self, container_path: &str) -> String {
        self.locator.key(container_path)
    }

    fn is_container_root(container_path: &str) -> bool {
        path::normalize(container_path).is_empty()
    }

    fn channel(&self, container_path: &str, read_only: bool) -> ObjectChannel {
        ObjectChannel::new(
            self.policy.clone(),
            self.lifecycle.clone(),
            self.key(container_path),
            read_only,
        )
    }
}

#[async_trait]
impl KeyValueAccess for S3KeyValueAccess {
    fn uri(&self, container_path: &str) -> String {
        self.locator.uri(container_path)
    }

    fn io_policy(&self) -> IoPolicyKind {
        self.policy.kind()
    }

    async fn exists(&self, container_path: &str) -> StorageResult<bool> {
        Ok(self.is_file(container_path).await? || self.is_directory(container_path).await?)
    }

    async fn is_file(&self, container_path: &str) -> StorageResult<bool> {
        self.listing.is_file(&self.key(container_path)).await
    }

    async fn is_directory(&self, container_path: &str) -> StorageResult<bool> {
        let key = self.key(container_path);
        if key.is_empty() {
            return self.lifecycle.bucket_exists().await;
        }
        self.listing.is_directory(&key).await
    }

    async fn list(&self, container_path: &str) -> StorageResult<Vec<String>> {
        self.listing.list(&self.key(container_path)).await
    }

    async fn list_directories(&self, container_path: &str) -> StorageResult<Vec<String>> {
        self.listing.list_directories(&self.key(container_path)).await
    }

    async fn create_directories(&self, container_path: &str) -> StorageResult<()> {
        self.lifecycle.ensure_bucket().await?;
        self.listing.create_directories(&self.key(container_path)).await
    }

    async fn size(&self, container_path: &str) -> StorageResult<u64> {
        let head = self.client.head(&self.key(container_path)).await?;
        Ok(head.size)
    }

    fn create_read_data(&self, container_path: &str) -> LazyRead {
        self.policy.read(&self.key(container_path))
    }

    async fn write(&self, container_path: &str, data: Bytes) -> StorageResult<()> {
        self.lifecycle.ensure_bucket().await?;
        let key = self.key(container_path);
        debug!("Writing key={}, size={} bytes", key, data.len());
        self.policy.write(&key, data).await
    }

    async fn delete(&self, container_path: &str) -> StorageResult<()> {
        if Self::is_container_root(container_path)
            && self.locator.is_bucket_root()
            && self.lifecycle.create_allowed()
        {
            return self.lifecycle.delete_bucket().await;
        }
        self.policy.delete(&self.key(container_path)).await
    }

    fn lock_for_reading(&self, container_path: &str) -> ObjectChannel {
        self.channel(container_path, true)
    }

    fn lock_for_writing(&self, container_path: &str) -> ObjectChannel {
        self.channel(container_path, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::InMemoryClient;
    use std::io::{Read, Write};

    async fn open_with(
        client: Arc<InMemoryClient>,
        root_key: &str,
        create_bucket: bool,
        io_policy: IoPolicyKind,
    ) -> S3KeyValueAccess {
        let locator = Locator::native(client.bucket(), root_key).unwrap();
        S3KeyValueAccess::open(client, locator, create_bucket, io_policy)
            .await
            .unwrap()
    }

    async fn container() -> (S3KeyValueAccess, Arc<InMemoryClient>) {
        let client = Arc::new(InMemoryClient::new("zarr-n5-demo"));
        let kva = open_with(client.clone(), "", false, IoPolicyKind::EtagMatch).await;
        (kva, client)
    }

    #[tokio::test]
    async fn test_open_missing_bucket_without_provisioning() {
        let client = Arc::new(InMemoryClient::without_bucket("missing"));
        let locator = Locator::native("missing", "").unwrap();
        let err = S3KeyValueAccess::open(client, locator, false, IoPolicyKind::Unsafe)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_root_is_directory_once_bucket_exists() {
        let client = Arc::new(InMemoryClient::without_bucket("bucket"));
        let kva = open_with(client.clone(), "", true, IoPolicyKind::EtagMatch).await;
        assert!(!kva.is_directory("").await.unwrap());

        kva.create_directories("").await.unwrap();
        assert!(client.bucket_exists().await.unwrap());
        assert!(kva.is_directory("").await.unwrap());
        assert!(kva.is_directory("/").await.unwrap());
        assert!(kva.list("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_directories_then_list() {
        let (kva, _) = container().await;
        kva.create_directories("/a/b/c").await.unwrap();

        assert_eq!(kva.list("/a").await.unwrap(), vec!["b"]);
        assert_eq!(kva.list("/a/b").await.unwrap(), vec!["c"]);
        assert!(kva.list("/a/b/c").await.unwrap().is_empty());
        assert_eq!(kva.list_directories("a").await.unwrap(), vec!["b"]);

        let err = kva.list("/a/x").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("not a valid group"));
    }

    #[tokio::test]
    async fn test_create_directories_is_idempotent() {
        let (kva, client) = container().await;
        kva.create_directories("a/b").await.unwrap();
        let keys = client.keys();
        kva.create_directories("a/b").await.unwrap();
        assert_eq!(client.keys(), keys);
    }

    #[tokio::test]
    async fn test_delete_leaves_ancestors() {
        let (kva, _) = container().await;
        kva.create_directories("/a/b/c").await.unwrap();

        kva.delete("/a/b/c").await.unwrap();
        assert!(!kva.exists("/a/b/c").await.unwrap());
        assert!(kva.exists("/a/b").await.unwrap());
        assert!(kva.exists("/a").await.unwrap());

        kva.delete("/a").await.unwrap();
        assert!(!kva.exists("/a/b").await.unwrap());
        assert!(!kva.exists("/a").await.unwrap());
    }

    #[tokio::test]
    async fn test_files_and_directories() {
        let (kva, _) = container().await;
        kva.write("group/attributes.json", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        assert!(kva.is_file("group/attributes.json").await.unwrap());
        assert!(!kva.is_directory("group/attributes.json").await.unwrap());
        assert!(kva.is_directory("group").await.unwrap());
        assert!(!kva.is_file("group").await.unwrap());
        assert!(!kva.is_file("group/").await.unwrap());
        assert!(!kva.exists("other").await.unwrap());
        assert_eq!(kva.list("group").await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let (kva, _) = container().await;
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        kva.write("data/0/0", Bytes::from(data.clone())).await.unwrap();

        assert_eq!(kva.size("data/0/0").await.unwrap(), 1000);
        let read = kva.create_read_data("data/0/0");
        let full = read.read_all().await.unwrap();
        assert_eq!(&full[..], &data[..]);
        assert_eq!(read.materialize(100, 50).await.unwrap(), full.slice(100..150));
        assert_eq!(read.materialize(990, 0).await.unwrap(), full.slice(990..));
    }

    #[tokio::test]
    async fn test_size_of_missing_key() {
        let (kva, _) = container().await;
        assert!(kva.size("missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_etag_bound_read_detects_concurrent_write() {
        let (kva, _) = container().await;
        kva.write("attributes.json", Bytes::from_static(b"{\"n5\":\"4.0.0\"}"))
            .await
            .unwrap();

        let read = kva.create_read_data("attributes.json");
        let size = read.size().await.unwrap();
        kva.write("attributes.json", Bytes::from_static(b"{}")).await.unwrap();

        let err = read.materialize(0, size).await.unwrap_err();
        assert!(err.is_concurrent_modification());
    }

    #[tokio::test]
    async fn test_unsafe_policy_reads_latest() {
        let client = Arc::new(InMemoryClient::new("bucket"));
        let kva = open_with(client, "", false, IoPolicyKind::Unsafe).await;
        kva.write("k", Bytes::from_static(b"one")).await.unwrap();

        let read = kva.create_read_data("k");
        read.size().await.unwrap();
        kva.write("k", Bytes::from_static(b"three")).await.unwrap();
        assert_eq!(&read.read_all().await.unwrap()[..], b"three");
    }

    #[tokio::test]
    async fn test_paged_listing_matches_unpaged() {
        let paged = Arc::new(InMemoryClient::new("bucket").with_page_size(3));
        let unpaged = Arc::new(InMemoryClient::new("bucket"));
        let paged_kva = open_with(paged, "", false, IoPolicyKind::EtagMatch).await;
        let unpaged_kva = open_with(unpaged, "", false, IoPolicyKind::EtagMatch).await;

        for kva in [&paged_kva, &unpaged_kva] {
            for i in 0..17 {
                kva.write(&format!("grid/{}/0", i), Bytes::from_static(b"x"))
                    .await
                    .unwrap();
            }
            kva.write("grid/attributes.json", Bytes::from_static(b"{}"))
                .await
                .unwrap();
        }

        let mut expected = unpaged_kva.list("grid").await.unwrap();
        let mut actual = paged_kva.list("grid").await.unwrap();
        expected.sort();
        actual.sort();
        assert_eq!(expected.len(), 17);
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_root_key_prefixes_every_key() {
        let client = Arc::new(InMemoryClient::new("bucket"));
        let kva = open_with(client.clone(), "containers/sample.n5", false, IoPolicyKind::EtagMatch).await;

        kva.write("s0/attributes.json", Bytes::from_static(b"{}")).await.unwrap();
        assert_eq!(client.keys(), vec!["containers/sample.n5/s0/attributes.json"]);
        assert!(kva.is_directory("").await.unwrap());
        assert_eq!(kva.list("").await.unwrap(), vec!["s0"]);
        assert_eq!(kva.uri("s0"), "s3://bucket/containers/sample.n5/s0");

        kva.delete("").await.unwrap();
        assert!(client.keys().is_empty());
        assert!(client.bucket_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_root_of_provisioned_bucket() {
        let client = Arc::new(InMemoryClient::without_bucket("scratch"));
        let kva = open_with(client.clone(), "", true, IoPolicyKind::EtagMatch).await;
        kva.write("a/b", Bytes::from_static(b"1")).await.unwrap();

        kva.delete("/").await.unwrap();
        assert!(!client.bucket_exists().await.unwrap());
        assert!(!kva.is_directory("").await.unwrap());
    }

    #[tokio::test]
    async fn test_channels() {
        let (kva, _) = container().await;

        let channel = kva.lock_for_writing("attributes.json");
        channel.new_writer().unwrap().write_all(b"{\"a\":1}").unwrap();
        channel.close().await.unwrap();
        channel.close().await.unwrap();

        let channel = kva.lock_for_reading("attributes.json");
        let mut text = String::new();
        channel.new_reader().await.unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "{\"a\":1}");
        assert!(channel.new_writer().is_err());
        channel.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_directories_over_object_store_backend() {
        use crate::storage::object_store::ObjectStoreClient;
        use object_store::memory::InMemory;

        let client = Arc::new(ObjectStoreClient::new(Arc::new(InMemory::new()), "bucket"));
        let locator = Locator::native("bucket", "").unwrap();
        let kva = S3KeyValueAccess::open(client, locator, false, IoPolicyKind::EtagMatch)
            .await
            .unwrap();

        kva.create_directories("/a/b/c").await.unwrap();
        assert!(kva.exists("/a").await.unwrap());
        assert!(kva.is_directory("/a/b/c").await.unwrap());
        assert!(!kva.is_file("/a/b").await.unwrap());
        assert_eq!(kva.list("/a").await.unwrap(), vec!["b"]);
        assert_eq!(kva.list("/a/b").await.unwrap(), vec!["c"]);
        assert!(kva.list("/a/b/c").await.unwrap().is_empty());
        assert!(kva.list("/a/x").await.unwrap_err().is_not_found());

        kva.delete("/a/b/c").await.unwrap();
        assert!(!kva.exists("/a/b/c").await.unwrap());
        assert!(kva.exists("/a/b").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_writers_and_readers() {
        let kva: Arc<dyn KeyValueAccess> = Arc::new(container().await.0);
        kva.write("shared", Bytes::from_static(b"seed")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let writer = kva.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("group/{}/0", i);
                let data = Bytes::from(vec![i as u8; i + 1]);
                writer.write(&key, data.clone()).await?;
                assert_eq!(writer.size(&key).await?, data.len() as u64);
                assert_eq!(writer.create_read_data(&key).read_all().await?, data);
                StorageResult::Ok(())
            }));
            let kva = kva.clone();
            handles.push(tokio::spawn(async move {
                let read = kva.create_read_data("shared");
                assert_eq!(&read.read_all().await?[..], b"seed");
                kva.exists("group").await?;
                StorageResult::Ok(())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut children = kva.list("group").await.unwrap();
        children.sort_by_key(|name| name.parse::<usize>().unwrap());
        let expected: Vec<String> = (0..16).map(|i| i.to_string()).collect();
        assert_eq!(children, expected);
    }

    #[tokio::test]
    async fn test_path_algebra_defaults() {
        let kva: Arc<dyn KeyValueAccess> = Arc::new(container().await.0);

        assert_eq!(kva.normalize("//a///b/"), "a/b/");
        assert_eq!(kva.components("/a/b"), vec!["a", "b"]);
        assert_eq!(kva.compose(&["a", "", "b"]), "a/b");
        assert_eq!(kva.parent("a/b"), Some("a".to_string()));
        assert_eq!(kva.relativize("a/b/c", "a"), "b/c");
        assert_eq!(kva.uri(""), "s3://zarr-n5-demo");
        assert_eq!(format!("{:?}", kva), "KeyValueAccess(root=s3://zarr-n5-demo, io_policy=etag-match)");
    }
}
