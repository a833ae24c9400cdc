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

use super::client::{ListRequest, ObjectClient};
use super::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Provisioning of the bucket a container lives in.
///
/// The existence answer is memoized per instance and cleared whenever this
/// instance creates or deletes the bucket.
#[derive(Debug)]
pub struct BucketLifecycle {
    client: Arc<dyn ObjectClient>,
    create_allowed: bool,
    exists: Mutex<Option<bool>>,
}

impl BucketLifecycle {
    pub fn new(client: Arc<dyn ObjectClient>, create_allowed: bool) -> Self {
        Self {
            client,
            create_allowed,
            exists: Mutex::new(None),
        }
    }

    pub fn create_allowed(&self) -> bool {
        self.create_allowed
    }

    pub fn bucket(&self) -> &str {
        self.client.bucket()
    }

    pub async fn bucket_exists(&self) -> StorageResult<bool> {
        if let Some(exists) = *self.exists.lock() {
            return Ok(exists);
        }
        let exists = self.client.bucket_exists().await?;
        *self.exists.lock() = Some(exists);
        Ok(exists)
    }

    fn invalidate(&self) {
        self.exists.lock().take();
    }

    fn check_allowed(&self, operation: &str) -> StorageResult<()> {
        if self.create_allowed {
            Ok(())
        } else {
            Err(StorageError::OperationNotPermitted(format!(
                "{} of bucket {} is disabled for this container",
                operation,
                self.bucket()
            )))
        }
    }

    /// Create the bucket unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotPermitted` if provisioning is disabled.
    pub async fn create_bucket(&self) -> StorageResult<()> {
        self.check_allowed("Creation")?;
        if self.bucket_exists().await? {
            return Ok(());
        }
        self.client.create_bucket().await?;
        self.invalidate();
        info!("Provisioned bucket={}", self.bucket());
        Ok(())
    }

    /// Create the bucket if provisioning is enabled and it is missing.
    pub async fn ensure_bucket(&self) -> StorageResult<()> {
        if self.create_allowed && !self.bucket_exists().await? {
            self.create_bucket().await?;
        }
        Ok(())
    }

    /// Empty the bucket, then delete it.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotPermitted` if provisioning is disabled. A failure
    /// while emptying leaves the objects already removed deleted.
    pub async fn delete_bucket(&self) -> StorageResult<()> {
        self.check_allowed("Deletion")?;
        if !self.bucket_exists().await? {
            return Ok(());
        }

        let mut deleted = 0usize;
        loop {
            let page = self.client.list_page(&ListRequest::recursive("")).await?;
            if page.keys.is_empty() {
                break;
            }
            self.client.delete_batch(&page.keys).await?;
            deleted += page.keys.len();
        }
        self.client.delete_bucket().await?;
        self.invalidate();
        info!("Deleted bucket={}, removed count={} objects", self.bucket(), deleted);
        Ok(())
    }
}
