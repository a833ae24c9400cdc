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

//! S3 key-value access for chunked containers
//!
//! This module simulates a directory hierarchy over a flat object key
//! namespace. Path algebra and locators live in [`path`] and [`locator`],
//! the network is reached through the [`client::ObjectClient`] capability
//! trait, and [`kva::S3KeyValueAccess`] ties listing, consistency policy and
//! bucket provisioning together behind [`provider::KeyValueAccess`].

pub mod aws;
pub mod bucket;
pub mod channel;
pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod kva;
pub mod listing;
pub mod locator;
pub mod memory;
pub mod object_store;
pub mod path;
pub mod policy;
pub mod provider;
pub mod read;

// Public exports
pub use channel::{ChannelReader, ChannelWriter, ObjectChannel};
pub use client::{ByteRange, ListPage, ListRequest, ObjectClient, ObjectHead};
pub use config::{ClientType, IoPolicyKind, StorageConfig};
pub use error::{ErrorKind, StorageError, StorageResult};
pub use factory::StorageProviderFactory;
pub use kva::S3KeyValueAccess;
pub use locator::{AddressingStyle, Locator};
pub use path::ContainerPath;
pub use provider::KeyValueAccess;
pub use read::LazyRead;
