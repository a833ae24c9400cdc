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

use super::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Metadata returned by a HEAD probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub key: String,
    pub size: u64,
    pub e_tag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Byte range of a GET.
///
/// `offset == 0 && length == 0` reads the whole object, `length == 0` reads
/// from `offset` to the end, anything else reads
/// `[offset, offset + length - 1]` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn full() -> Self {
        Self::default()
    }

    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    pub fn is_full(&self) -> bool {
        self.offset == 0 && self.length == 0
    }

    /// Value of the HTTP `Range` header, `None` for a full read.
    pub fn header_value(&self) -> Option<String> {
        if self.is_full() {
            None
        } else if self.length == 0 {
            Some(format!("bytes={}-", self.offset))
        } else {
            Some(format!(
                "bytes={}-{}",
                self.offset,
                self.offset.saturating_add(self.length - 1)
            ))
        }
    }

    /// Half-open byte bounds within an object of `size` bytes.
    pub fn bounds(&self, size: u64) -> std::ops::Range<u64> {
        let start = self.offset.min(size);
        let end = if self.length == 0 {
            size
        } else {
            self.offset.saturating_add(self.length).min(size)
        };
        start..end
    }
}

/// One listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    pub prefix: String,
    pub delimiter: Option<char>,
    pub max_keys: Option<usize>,
    pub continuation_token: Option<String>,
}

impl ListRequest {
    /// Request all keys under `prefix`, without grouping.
    pub fn recursive(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Request one hierarchy level under `prefix`.
    pub fn delimited(prefix: impl Into<String>, delimiter: char) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: Some(delimiter),
            ..Default::default()
        }
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = Some(max_keys);
        self
    }

    pub fn with_continuation_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Grouped prefixes, each ending in the delimiter
    pub common_prefixes: Vec<String>,
    /// Keys directly under the prefix
    pub keys: Vec<String>,
    pub next_continuation_token: Option<String>,
}

impl ListPage {
    pub fn is_truncated(&self) -> bool {
        self.next_continuation_token.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.common_prefixes.is_empty() && self.keys.is_empty()
    }
}

/// Minimal capability surface of an object-storage client.
///
/// Path handling, existence, listing and consistency policies are written
/// once against this trait; each backing client only has to translate these
/// calls and funnel its failures through
/// [`classify_status`](super::error::classify_status).
#[async_trait]
pub trait ObjectClient: Send + Sync + Debug {
    /// Name of the bucket this client addresses.
    fn bucket(&self) -> &str;

    /// Check whether the bucket exists.
    ///
    /// # Errors
    ///
    /// Returns an error for failures other than "bucket not found".
    async fn bucket_exists(&self) -> StorageResult<bool>;

    /// Create the bucket. Creating a bucket the caller already owns succeeds.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotPermitted` if the client cannot provision buckets.
    async fn create_bucket(&self) -> StorageResult<()>;

    /// Delete the (empty) bucket.
    async fn delete_bucket(&self) -> StorageResult<()>;

    /// Fetch object metadata.
    ///
    /// # Arguments
    ///
    /// * `key` - The object key
    ///
    /// # Returns
    ///
    /// * `Ok(ObjectHead)` - Size, ETag and modification time of the object
    /// * `Err(StorageError::NotFound)` - If no object exists at `key`
    async fn head(&self, key: &str) -> StorageResult<ObjectHead>;

    /// Read a byte range of an object.
    ///
    /// # Arguments
    ///
    /// * `key` - The object key
    /// * `range` - The byte range to read
    /// * `if_match` - ETag the object must still carry
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification` if `if_match` no longer matches.
    async fn get(&self, key: &str, range: ByteRange, if_match: Option<&str>) -> StorageResult<Bytes>;

    /// Write an object unconditionally, returning its new ETag if the store reports one.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<Option<String>>;

    /// Delete one object. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Delete several objects in as few requests as the store allows.
    async fn delete_batch(&self, keys: &[String]) -> StorageResult<()>;

    /// Fetch one listing page.
    async fn list_page(&self, request: &ListRequest) -> StorageResult<ListPage>;
}
