// Copyright 2022 Adobe. All rights reserved.
// This file is licensed to you under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License. You may obtain a copy
// of the License at http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software distributed under
// the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR REPRESENTATIONS
// OF ANY KIND, either express or implied. See the License for the specific language
// governing permissions and limitations under the License.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::warn;

/// Environment variable selecting the process-wide consistency policy.
pub const IO_POLICY_ENV: &str = "S3_IO_POLICY";

/// Which network client backs the adapter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// aws-sdk-s3, supports bucket provisioning
    AwsSdk,
    /// object_store's S3 implementation
    ObjectStore,
    /// Process-local store, used for tests and demos
    Memory,
}

/// Consistency policy applied to reads and mutations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IoPolicyKind {
    /// Last writer wins, reads are not version-bound
    Unsafe,
    /// Reads are bound to the ETag observed first
    #[default]
    EtagMatch,
}

impl FromStr for IoPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unsafe" => Ok(IoPolicyKind::Unsafe),
            "atomic" | "etag-match" | "etag_match" => Ok(IoPolicyKind::EtagMatch),
            other => Err(format!("Unknown IO policy: {}", other)),
        }
    }
}

impl Display for IoPolicyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IoPolicyKind::Unsafe => write!(f, "unsafe"),
            IoPolicyKind::EtagMatch => write!(f, "etag-match"),
        }
    }
}

impl IoPolicyKind {
    /// Resolve a policy from an optional raw setting; unset or invalid values
    /// fall back to [`IoPolicyKind::EtagMatch`].
    pub fn from_setting(value: Option<&str>) -> Self {
        match value {
            None => IoPolicyKind::default(),
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("{}, falling back to {}", e, IoPolicyKind::default());
                IoPolicyKind::default()
            }),
        }
    }

    /// The process-wide policy, read once from [`IO_POLICY_ENV`].
    pub fn process_default() -> Self {
        static PROCESS_POLICY: OnceLock<IoPolicyKind> = OnceLock::new();
        *PROCESS_POLICY.get_or_init(|| {
            IoPolicyKind::from_setting(std::env::var(IO_POLICY_ENV).ok().as_deref())
        })
    }
}

/// Configuration for a key-value access adapter.
///
/// Client options live in a string map and are interpreted by the client the
/// factory builds, so the same config shape serves every backend.
///
/// # Examples
///
/// ## AWS S3
/// ```
/// use s3_kva::storage::StorageConfig;
///
/// let config = StorageConfig::aws("s3://my-bucket/container.n5")
///     .with_option("region", "eu-west-1")
///     .with_create_bucket(true);
/// ```
///
/// ## S3-compatible service through object_store
/// ```
/// use s3_kva::storage::StorageConfig;
///
/// let config = StorageConfig::object_store("http://localhost:9000/bucket/container.n5")
///     .with_option("access_key_id", "minio")
///     .with_option("secret_access_key", "minio123")
///     .with_option("allow_http", "true");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root locator of the container
    pub uri: String,

    /// Client implementation
    #[serde(rename = "type")]
    pub client_type: ClientType,

    /// Whether the adapter may create (and remove) its bucket
    #[serde(default)]
    pub create_bucket: bool,

    /// Overrides the process-wide policy for this adapter
    #[serde(default)]
    pub io_policy: Option<IoPolicyKind>,

    /// Client options
    ///
    /// - region: AWS region (e.g., "us-east-1")
    /// - endpoint: Custom endpoint URL (for S3-compatible services)
    /// - access_key_id / secret_access_key / session_token: static credentials
    /// - anonymous: "true" to send unsigned requests
    /// - allow_http: "true" to allow HTTP connections
    /// - force_path_style: "true" to address the bucket in the path
    /// - page_size: listing page cap of the memory client
    /// - timeout, connect_timeout, pool_idle_timeout, pool_max_idle_per_host,
    ///   max_retries, retry_timeout: passed to the HTTP client
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl StorageConfig {
    /// Create a new configuration.
    ///
    /// # Arguments
    ///
    /// * `uri` - Root locator of the container
    /// * `client_type` - Client implementation to build
    ///
    /// # Returns
    ///
    /// A new `StorageConfig` with default connection options, provisioning disabled
    /// and the process-wide policy.
    pub fn new(uri: impl Into<String>, client_type: ClientType) -> Self {
        Self {
            uri: uri.into(),
            client_type,
            create_bucket: false,
            io_policy: None,
            options: Self::default_options(),
        }
    }

    /// Configuration backed by aws-sdk-s3.
    pub fn aws(uri: impl Into<String>) -> Self {
        Self::new(uri, ClientType::AwsSdk)
    }

    /// Configuration backed by object_store.
    pub fn object_store(uri: impl Into<String>) -> Self {
        Self::new(uri, ClientType::ObjectStore)
    }

    /// Configuration backed by the in-memory client.
    ///
    /// The memory client ignores connection options, so none are set.
    pub fn memory(uri: impl Into<String>) -> Self {
        Self {
            options: HashMap::new(),
            ..Self::new(uri, ClientType::Memory)
        }
    }

    /// Get default connection options.
    ///
    /// # Returns
    ///
    /// A HashMap containing default timeout, retry, and connection pool settings.
    pub fn default_options() -> HashMap<String, String> {
        [
            ("timeout", "1200"),
            ("connect_timeout", "30"),
            ("max_retries", "20"),
            ("retry_timeout", "1200"),
            ("pool_idle_timeout", "15"),
            ("pool_max_idle_per_host", "5"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    /// Add a configuration option.
    ///
    /// # Arguments
    ///
    /// * `key` - The option key
    /// * `value` - The option value
    ///
    /// # Returns
    ///
    /// The `StorageConfig` instance with the added option (for method chaining).
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Add multiple configuration options.
    pub fn with_options(mut self, options: HashMap<String, String>) -> Self {
        self.options.extend(options);
        self
    }

    pub fn with_create_bucket(mut self, create_bucket: bool) -> Self {
        self.create_bucket = create_bucket;
        self
    }

    pub fn with_io_policy(mut self, io_policy: IoPolicyKind) -> Self {
        self.io_policy = Some(io_policy);
        self
    }

    /// Get a configuration option.
    ///
    /// # Returns
    ///
    /// `Some(&String)` if the option exists, `None` otherwise.
    pub fn get_option(&self, key: &str) -> Option<&String> {
        self.options.get(key)
    }

    /// Interpret an option as a boolean flag; absent means `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.get_option(key)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false)
    }

    /// The policy this adapter runs with.
    pub fn resolved_io_policy(&self) -> IoPolicyKind {
        self.io_policy.unwrap_or_else(IoPolicyKind::process_default)
    }
}
