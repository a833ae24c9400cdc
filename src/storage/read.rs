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

use super::client::{ByteRange, ObjectClient};
use super::error::StorageResult;
use bytes::Bytes;
use parking_lot::Mutex;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Deferred handle on one object.
///
/// Creating a handle performs no I/O, and no connection is held between
/// calls. When ETag verification is on, the first ETag the handle observes
/// is attached as an `If-Match` precondition to every later read, so a size
/// check and the reads that follow it always see the same object state.
pub struct LazyRead {
    client: Arc<dyn ObjectClient>,
    key: String,
    verify_etag: bool,
    e_tag: Mutex<Option<String>>,
}

impl LazyRead {
    pub fn new(client: Arc<dyn ObjectClient>, key: impl Into<String>, verify_etag: bool) -> Self {
        Self {
            client,
            key: key.into(),
            verify_etag,
            e_tag: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn verifies_etag(&self) -> bool {
        self.verify_etag
    }

    /// ETag currently bound to this handle.
    pub fn bound_e_tag(&self) -> Option<String> {
        self.e_tag.lock().clone()
    }

    fn bind(&self, e_tag: Option<String>) -> Option<String> {
        let mut bound = self.e_tag.lock();
        if bound.is_none() {
            *bound = e_tag;
        }
        bound.clone()
    }

    /// Size of the object in bytes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the object does not exist.
    pub async fn size(&self) -> StorageResult<u64> {
        let head = self.client.head(&self.key).await?;
        if self.verify_etag {
            self.bind(head.e_tag);
        }
        Ok(head.size)
    }

    /// Read `length` bytes starting at `offset`.
    ///
    /// `offset == 0 && length == 0` reads the whole object and `length == 0`
    /// reads to the end. Each call issues exactly one GET, plus one HEAD on
    /// the first verified access.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification` if the object changed since the handle
    /// bound its ETag.
    pub async fn materialize(&self, offset: u64, length: u64) -> StorageResult<Bytes> {
        let if_match = if self.verify_etag {
            match self.bound_e_tag() {
                Some(e_tag) => Some(e_tag),
                None => {
                    let head = self.client.head(&self.key).await?;
                    self.bind(head.e_tag)
                }
            }
        } else {
            None
        };
        self.client
            .get(&self.key, ByteRange::new(offset, length), if_match.as_deref())
            .await
    }

    pub async fn read_all(&self) -> StorageResult<Bytes> {
        self.materialize(0, 0).await
    }

    /// Forget the bound ETag; the next access binds afresh.
    pub fn close(&self) {
        self.e_tag.lock().take();
    }
}

impl Debug for LazyRead {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyRead")
            .field("bucket", &self.client.bucket())
            .field("key", &self.key)
            .field("verify_etag", &self.verify_etag)
            .finish()
    }
}
