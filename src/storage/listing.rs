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

//! Existence checks and one-level listings over a flat key namespace.
//!
//! All operations take object keys, not container paths. Probes cannot tell
//! a missing object from one the caller may not read: both answer `false`.

use super::client::{ListRequest, ObjectClient};
use super::error::{StorageError, StorageResult};
use super::path::{self, DELIMITER};
use bytes::Bytes;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ListingEngine {
    client: Arc<dyn ObjectClient>,
}

/// Turn "absent" and "forbidden" into `false`, propagate everything else.
fn absent_as_false(result: StorageResult<bool>) -> StorageResult<bool> {
    match result {
        Err(e) if e.is_not_found() || e.is_forbidden() => Ok(false),
        other => other,
    }
}

impl ListingEngine {
    pub fn new(client: Arc<dyn ObjectClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<dyn ObjectClient> {
        &self.client
    }

    /// Whether an object exists at exactly `key`.
    ///
    /// Keys ending in the delimiter are directory markers and never files.
    pub async fn is_file(&self, key: &str) -> StorageResult<bool> {
        if key.is_empty() || key.ends_with(DELIMITER) {
            return Ok(false);
        }
        absent_as_false(self.client.head(key).await.map(|_| true))
    }

    /// Whether any key lives under `key`, or, for the empty key, whether the
    /// bucket exists.
    pub async fn is_directory(&self, key: &str) -> StorageResult<bool> {
        if key.is_empty() {
            return absent_as_false(self.client.bucket_exists().await);
        }
        let request = ListRequest::delimited(path::add_trailing_delimiter(key), DELIMITER).with_max_keys(1);
        absent_as_false(self.client.list_page(&request).await.map(|page| !page.is_empty()))
    }

    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.is_file(key).await? || self.is_directory(key).await?)
    }

    /// Immediate children of the directory at `key`, relative to it.
    ///
    /// # Arguments
    ///
    /// * `key` - Object key of the directory
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<String>)` - Child names, drained across every listing page
    /// * `Err(StorageError::NotFound)` - If `key` is not a directory
    pub async fn list(&self, key: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .list_common_prefixes(key)
            .await?
            .into_iter()
            .map(|(_, relative)| relative)
            .collect())
    }

    /// Like [`ListingEngine::list`], restricted to entries grouped on the
    /// delimiter, without trailing delimiters.
    pub async fn list_directories(&self, key: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .list_common_prefixes(key)
            .await?
            .into_iter()
            .filter(|(raw, _)| raw.ends_with(DELIMITER))
            .map(|(_, relative)| relative.trim_end_matches(DELIMITER).to_string())
            .collect())
    }

    async fn list_common_prefixes(&self, key: &str) -> StorageResult<Vec<(String, String)>> {
        if !self.is_directory(key).await? {
            return Err(StorageError::NotFound {
                operation: "list",
                key: format!("{} is not a valid group", key),
            });
        }

        let prefix = path::add_trailing_delimiter(key);
        let mut entries = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let request = ListRequest::delimited(prefix.clone(), DELIMITER).with_continuation_token(token);
            let page = self.client.list_page(&request).await?;
            pages += 1;
            for common_prefix in page.common_prefixes {
                let relative = path::relativize(&common_prefix, &prefix);
                if !relative.is_empty() {
                    entries.push((common_prefix, relative));
                }
            }
            token = page.next_continuation_token;
            if token.is_none() {
                break;
            }
        }
        debug!(
            "Listed prefix={}, found count={} entries in pages={}",
            prefix,
            entries.len(),
            pages
        );
        Ok(entries)
    }

    /// Write a zero-length marker for every ancestor prefix of `key`,
    /// including `key` itself. Existing markers are left untouched.
    pub async fn create_directories(&self, key: &str) -> StorageResult<()> {
        let mut prefix = String::new();
        for component in path::components(key) {
            prefix.push_str(&component);
            prefix.push(DELIMITER);
            match self.client.head(&prefix).await {
                Ok(_) => continue,
                Err(e) if e.is_not_found() => {
                    self.client.put(&prefix, Bytes::new()).await?;
                    debug!("Created directory marker key={}", prefix);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
