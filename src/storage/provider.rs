// Copyright 2022 Adobe. All rights reserved.
// This file is licensed to you under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License. You may obtain a copy
// of the License at http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under
// the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR REPRESENTATIONS
// OF ANY KIND, either express or implied. See the License for the specific language
// governing permissions and limitations under the License.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt::{Debug, Formatter, Result as FmtResult};

use super::channel::ObjectChannel;
use super::config::IoPolicyKind;
use super::error::StorageResult;
use super::path;
use super::read::LazyRead;

/// Key-value access to a hierarchical container on object storage
///
/// This trait is the whole surface a container reader/writer needs: path
/// algebra, existence checks, one-level listings, reads, writes and deletes.
/// All paths are container-relative; the empty path is the container root.
#[async_trait]
pub trait KeyValueAccess: Send + Sync {
    /// Normalize a path.
    fn normalize(&self, path: &str) -> String {
        path::normalize(path)
    }

    /// Named components of a path.
    fn components(&self, path: &str) -> Vec<String> {
        path::components(path)
    }

    /// Join path parts.
    fn compose(&self, parts: &[&str]) -> String {
        path::compose(parts)
    }

    /// Parent of a path, `None` for the root.
    fn parent(&self, path: &str) -> Option<String> {
        path::parent(path)
    }

    /// `path` relative to `base`.
    fn relativize(&self, path: &str, base: &str) -> String {
        path::relativize(path, base)
    }

    /// Render the locator of a path.
    ///
    /// # Returns
    ///
    /// A URI in the native scheme for Amazon-hosted containers, or a
    /// path-style URI on the container's endpoint otherwise.
    fn uri(&self, path: &str) -> String;

    /// The consistency policy this adapter runs with.
    fn io_policy(&self) -> IoPolicyKind;

    /// Check whether a path is a file or a directory.
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Check whether an object exists at exactly this path.
    ///
    /// # Returns
    ///
    /// `Ok(false)` both for missing objects and for objects the caller may
    /// not read; the two cannot be told apart.
    ///
    /// # Errors
    ///
    /// This function will return an error if the store fails for any other reason.
    async fn is_file(&self, path: &str) -> StorageResult<bool>;

    /// Check whether anything is stored under this path.
    async fn is_directory(&self, path: &str) -> StorageResult<bool>;

    /// List the immediate children of a directory.
    ///
    /// # Arguments
    ///
    /// * `path` - The directory to list
    ///
    /// # Returns
    ///
    /// A `Result` containing:
    /// * `Ok(Vec<String>)` - Names of the children, relative to `path`
    /// * `Err(StorageError)` - If listing fails
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * `path` is not a directory (`NotFound`, "not a valid group")
    /// * Network or storage access errors occur
    async fn list(&self, path: &str) -> StorageResult<Vec<String>>;

    /// List the child directories of a directory.
    async fn list_directories(&self, path: &str) -> StorageResult<Vec<String>>;

    /// Create a directory and all its ancestors.
    async fn create_directories(&self, path: &str) -> StorageResult<()>;

    /// Size in bytes of the object at `path`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no object exists at `path`.
    async fn size(&self, path: &str) -> StorageResult<u64>;

    /// Deferred read handle for `path`. Performs no I/O.
    fn create_read_data(&self, path: &str) -> LazyRead;

    /// Replace the object at `path`.
    async fn write(&self, path: &str, data: Bytes) -> StorageResult<()>;

    /// Delete `path` and everything below it.
    async fn delete(&self, path: &str) -> StorageResult<()>;

    /// Open a read-only channel on `path`.
    fn lock_for_reading(&self, path: &str) -> ObjectChannel;

    /// Open a read-write channel on `path`; writers are flushed on close.
    fn lock_for_writing(&self, path: &str) -> ObjectChannel;
}

impl Debug for dyn KeyValueAccess {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "KeyValueAccess(root={}, io_policy={})", self.uri(""), self.io_policy())
    }
}
