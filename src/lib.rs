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

//! # s3-kva
//!
//! Key-value access for chunked-array containers stored on S3 and
//! S3-compatible object stores.
//!
//! A container is a hierarchy of groups, attribute documents and data
//! blocks. Object stores only offer a flat key namespace with prefix and
//! delimiter listing, so this crate simulates directories on top of it:
//! existence checks, one-level listings, recursive deletes and directory
//! markers, plus ETag-bound reads that detect concurrent modification.
//!
//! ## Features
//!
//! - **Three addressing styles**: `s3://bucket/key`, virtual-hosted and path-style HTTP(S)
//! - **Three clients**: aws-sdk-s3, object_store, and an in-memory reference store
//! - **Consistency policies**: `unsafe` or `etag-match`, selected with `S3_IO_POLICY`
//! - **Bucket provisioning**: optional lazy creation and recursive removal of the bucket
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use s3_kva::{KeyValueAccess, StorageConfig, StorageProviderFactory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = StorageConfig::aws("https://zarr-n5-demo.s3.eu-west-1.amazonaws.com/foo.n5")
//!     .with_option("anonymous", "true");
//! let kva = StorageProviderFactory::from_config(config).await?;
//!
//! if kva.is_directory("").await? {
//!     for child in kva.list("").await? {
//!         println!("{}", kva.uri(&child));
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### S3-compatible services
//!
//! ```rust,no_run
//! use bytes::Bytes;
//! use s3_kva::{KeyValueAccess, StorageConfig, StorageProviderFactory};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = StorageConfig::object_store("http://localhost:9000/bucket/container.n5")
//!     .with_option("access_key_id", "minio")
//!     .with_option("secret_access_key", "minio123")
//!     .with_option("allow_http", "true");
//! let kva = StorageProviderFactory::from_config(config).await?;
//!
//! kva.write("attributes.json", Bytes::from_static(b"{\"n5\":\"4.0.0\"}")).await?;
//! let read = kva.create_read_data("attributes.json");
//! let size = read.size().await?;
//! let data = read.materialize(0, size).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`storage`] - Path algebra, object clients, listing, consistency policies and the façade

pub mod storage;

// Re-export commonly used types
pub use storage::{
    IoPolicyKind, KeyValueAccess, LazyRead, Locator, S3KeyValueAccess, StorageConfig, StorageError,
    StorageProviderFactory, StorageResult,
};
