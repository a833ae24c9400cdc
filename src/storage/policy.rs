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

//! Consistency policies governing writes, reads and deletes.
//!
//! Writes are last-writer-wins under every policy. [`EtagMatch`] only
//! protects reads, by binding each read handle to the first ETag it sees.

use super::client::{ListRequest, ObjectClient};
use super::config::IoPolicyKind;
use super::error::StorageResult;
use super::path::{self, DELIMITER};
use super::read::LazyRead;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

/// How mutations and reads interact with concurrent writers.
#[async_trait]
pub trait IoPolicy: Send + Sync + Debug {
    fn kind(&self) -> IoPolicyKind;

    /// Store `data` at `key`.
    async fn write(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Handle for reading `key`. Performs no I/O.
    fn read(&self, key: &str) -> LazyRead;

    /// Delete the object at `key` and every object under `key/`.
    ///
    /// # Errors
    ///
    /// A failure part way leaves the objects already deleted removed; there
    /// is no rollback.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// Unconditional writes, unverified reads, recursive deletes.
#[derive(Debug, Clone)]
pub struct Unsafe {
    client: Arc<dyn ObjectClient>,
}

impl Unsafe {
    pub fn new(client: Arc<dyn ObjectClient>) -> Self {
        Self { client }
    }

    async fn delete_prefix(&self, prefix: &str) -> StorageResult<usize> {
        let mut deleted = 0usize;
        let mut token: Option<String> = None;
        loop {
            let request = ListRequest::recursive(prefix).with_continuation_token(token);
            let page = self.client.list_page(&request).await?;
            if !page.keys.is_empty() {
                self.client.delete_batch(&page.keys).await?;
                deleted += page.keys.len();
                debug!("Deleted page of count={} keys under prefix={}", page.keys.len(), prefix);
            }
            token = page.next_continuation_token;
            if token.is_none() {
                break;
            }
        }
        Ok(deleted)
    }
}

#[async_trait]
impl IoPolicy for Unsafe {
    fn kind(&self) -> IoPolicyKind {
        IoPolicyKind::Unsafe
    }

    async fn write(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.client.put(key, data).await?;
        Ok(())
    }

    fn read(&self, key: &str) -> LazyRead {
        LazyRead::new(self.client.clone(), key, false)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if !key.is_empty() && !key.ends_with(DELIMITER) {
            match self.client.delete(key).await {
                Err(e) if !e.is_not_found() => return Err(e),
                _ => {}
            }
        }
        let prefix = path::add_trailing_delimiter(key);
        let deleted = self.delete_prefix(&prefix).await?;
        info!("Deleted key={}, removed count={} objects under prefix", key, deleted);
        Ok(())
    }
}

/// Reads bound to the first observed ETag; writes and deletes as [`Unsafe`].
#[derive(Debug, Clone)]
pub struct EtagMatch {
    inner: Unsafe,
}

impl EtagMatch {
    pub fn new(client: Arc<dyn ObjectClient>) -> Self {
        Self {
            inner: Unsafe::new(client),
        }
    }
}

#[async_trait]
impl IoPolicy for EtagMatch {
    fn kind(&self) -> IoPolicyKind {
        IoPolicyKind::EtagMatch
    }

    async fn write(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.inner.write(key, data).await
    }

    fn read(&self, key: &str) -> LazyRead {
        LazyRead::new(self.inner.client.clone(), key, true)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }
}

/// The policy implementation for `kind`.
pub fn policy_for(kind: IoPolicyKind, client: Arc<dyn ObjectClient>) -> Arc<dyn IoPolicy> {
    match kind {
        IoPolicyKind::Unsafe => Arc::new(Unsafe::new(client)),
        IoPolicyKind::EtagMatch => Arc::new(EtagMatch::new(client)),
    }
}
