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

use super::error::{StorageError, StorageResult};
use super::path::{self, ContainerPath};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use std::fmt::{Display, Formatter};
use std::sync::LazyLock;
use url::Url;

/// Native object-storage scheme.
pub const S3_SCHEME: &str = "s3";

/// Amazon S3 endpoint hosts, optionally prefixed by a virtual-hosted bucket.
static AWS_ENDPOINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+\.)?(s3[.-][a-z0-9.-]*amazonaws\.com)$").expect("valid endpoint pattern")
});

static AWS_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^s3[.-](?:dualstack\.)?([a-z0-9-]+)\.amazonaws\.com$").expect("valid region pattern")
});

/// Characters escaped when a key is rendered into a URI path.
const KEY_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// How the bucket was encoded in the locator the caller supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingStyle {
    /// `s3://bucket/key`
    Native,
    /// `https://bucket.endpoint/key`
    VirtualHosted,
    /// `https://endpoint/bucket/key`
    PathStyle,
}

/// Absolute address of a container root.
///
/// Whatever addressing style a locator is parsed from, [`Locator::key`]
/// resolves a container path to the same object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    scheme: String,
    authority: Option<String>,
    bucket: String,
    root_key: String,
    style: AddressingStyle,
    region: Option<String>,
    aws: bool,
}

impl Locator {
    /// Locator in the native scheme for `bucket` and a root key prefix.
    pub fn native(bucket: impl Into<String>, root_key: &str) -> StorageResult<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() {
            return Err(StorageError::ConfigError("Bucket name must not be empty".to_string()));
        }
        Ok(Self {
            scheme: S3_SCHEME.to_string(),
            authority: None,
            bucket,
            root_key: ContainerPath::parse(root_key).as_key(),
            style: AddressingStyle::Native,
            region: None,
            aws: true,
        })
    }

    /// Parse a root locator in any of the supported addressing styles.
    ///
    /// # Arguments
    ///
    /// * `uri` - `s3://bucket/key`, `https://bucket.s3.<region>.amazonaws.com/key`
    ///   or `http(s)://endpoint/bucket/key`
    ///
    /// # Returns
    ///
    /// * `Ok(Locator)` - The bucket, root key and endpoint recovered from `uri`
    /// * `Err(StorageError)` - If the URI is malformed, uses another scheme or names no bucket
    pub fn parse(uri: &str) -> StorageResult<Self> {
        let url = Url::parse(uri)?;
        let scheme = url.scheme().to_ascii_lowercase();
        let host = url.host_str().unwrap_or_default().to_string();
        let raw_path = percent_decode_str(url.path()).decode_utf8_lossy().into_owned();
        let raw_path = path::remove_leading_delimiter(&raw_path).to_string();

        let locator = match scheme.as_str() {
            S3_SCHEME => Self {
                scheme,
                authority: None,
                bucket: host,
                root_key: ContainerPath::parse(&raw_path).as_key(),
                style: AddressingStyle::Native,
                region: None,
                aws: true,
            },
            "http" | "https" => {
                let authority = match url.port() {
                    Some(port) => format!("{}:{}", host, port),
                    None => host.clone(),
                };
                match AWS_ENDPOINT.captures(&host) {
                    Some(captures) => {
                        let endpoint = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
                        let region = region_from_endpoint(endpoint);
                        match captures.get(1) {
                            Some(bucket) => Self {
                                scheme,
                                authority: Some(endpoint.to_string()),
                                bucket: bucket.as_str().trim_end_matches('.').to_string(),
                                root_key: ContainerPath::parse(&raw_path).as_key(),
                                style: AddressingStyle::VirtualHosted,
                                region,
                                aws: true,
                            },
                            None => {
                                let (bucket, key) = split_bucket(&raw_path);
                                Self {
                                    scheme,
                                    authority: Some(authority),
                                    bucket,
                                    root_key: key,
                                    style: AddressingStyle::PathStyle,
                                    region,
                                    aws: true,
                                }
                            }
                        }
                    }
                    // Self-hosted services are addressed path-style.
                    None => {
                        let (bucket, key) = split_bucket(&raw_path);
                        Self {
                            scheme,
                            authority: Some(authority),
                            bucket,
                            root_key: key,
                            style: AddressingStyle::PathStyle,
                            region: None,
                            aws: false,
                        }
                    }
                }
            }
            other => {
                return Err(StorageError::ConfigError(format!(
                    "Unsupported scheme '{}' in locator {}",
                    other, uri
                )))
            }
        };

        if locator.bucket.is_empty() {
            return Err(StorageError::ConfigError(format!("No bucket in locator {}", uri)));
        }
        Ok(locator)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn root_key(&self) -> &str {
        &self.root_key
    }

    pub fn style(&self) -> AddressingStyle {
        self.style
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Whether the locator addresses Amazon S3 rather than a compatible service.
    pub fn is_aws(&self) -> bool {
        self.aws
    }

    /// Whether the container root is the bucket itself.
    pub fn is_bucket_root(&self) -> bool {
        self.root_key.is_empty()
    }

    /// Endpoint URL for clients talking to a non-Amazon service.
    pub fn endpoint_url(&self) -> Option<String> {
        if self.aws {
            return None;
        }
        self.authority
            .as_ref()
            .map(|authority| format!("{}://{}", self.scheme, authority))
    }

    /// Object key for a container-relative path.
    ///
    /// A trailing separator on `path` is preserved so directory prefixes and
    /// markers can be derived from the same call.
    pub fn key(&self, container_path: &str) -> String {
        let relative = path::normalize(container_path);
        if self.root_key.is_empty() {
            return relative;
        }
        path::compose(&[self.root_key.as_str(), relative.as_str()])
    }

    /// Render the locator of a container-relative path.
    ///
    /// Amazon locators use the native scheme, other services keep their
    /// endpoint and render path-style. The trailing separator is dropped.
    pub fn uri(&self, container_path: &str) -> String {
        let key = self.key(container_path);
        let key = key.trim_end_matches(path::DELIMITER);
        let base = if self.aws {
            format!("{}://{}", S3_SCHEME, self.bucket)
        } else {
            format!(
                "{}://{}/{}",
                self.scheme,
                self.authority.as_deref().unwrap_or_default(),
                self.bucket
            )
        };
        if key.is_empty() {
            base
        } else {
            format!("{}/{}", base, utf8_percent_encode(key, KEY_ENCODE_SET))
        }
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri(""))
    }
}

fn split_bucket(raw_path: &str) -> (String, String) {
    match raw_path.split_once(path::DELIMITER) {
        Some((bucket, key)) => (bucket.to_string(), ContainerPath::parse(key).as_key()),
        None => (raw_path.to_string(), String::new()),
    }
}

fn region_from_endpoint(endpoint: &str) -> Option<String> {
    let region = AWS_REGION.captures(endpoint)?.get(1)?.as_str().to_ascii_lowercase();
    if region.starts_with("external") {
        Some("us-east-1".to_string())
    } else {
        Some(region)
    }
}
