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

use super::client::{ByteRange, ListPage, ListRequest, ObjectClient, ObjectHead};
use super::config::StorageConfig;
use super::error::{classify_status, StorageError, StorageResult};
use super::locator::{AddressingStyle, Locator};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, ConfigLoader};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::fmt::{Debug, Formatter};
use tracing::{debug, info, warn};

/// Region used when neither the configuration nor the endpoint names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// DeleteObjects accepts at most this many keys per request.
const DELETE_BATCH_SIZE: usize = 1000;

/// [`ObjectClient`] over the AWS SDK, the only client that can provision buckets.
pub struct AwsS3Client {
    client: Client,
    bucket: String,
    region: String,
}

impl AwsS3Client {
    pub fn new(client: Client, bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            region: region.into(),
        }
    }

    /// Build an SDK client for the bucket a locator addresses.
    ///
    /// Credentials come from `anonymous`, then the static key pair, then the
    /// default provider chain. When the chain finds nothing the client falls
    /// back to unsigned requests, and an unsigned client that cannot list the
    /// bucket is rebuilt on the default chain.
    ///
    /// # Arguments
    ///
    /// * `config` - Storage configuration with credentials and addressing options
    /// * `locator` - Parsed container root
    ///
    /// # Returns
    ///
    /// A `Result` containing:
    /// * `Ok(AwsS3Client)` - A configured client
    /// * `Err(StorageError)` - If the credential options are inconsistent
    ///
    /// # Errors
    ///
    /// This function will return an error if only one of `access_key_id` and
    /// `secret_access_key` is set.
    pub async fn from_config(config: &StorageConfig, locator: &Locator) -> StorageResult<Self> {
        for key in config.options.keys() {
            match key.as_str() {
                "region" | "endpoint" | "access_key_id" | "secret_access_key" | "session_token"
                | "anonymous" | "force_path_style" => (),
                // Connection settings are owned by the SDK's own defaults
                "allow_http"
                | "timeout"
                | "connect_timeout"
                | "max_retries"
                | "retry_timeout"
                | "pool_idle_timeout"
                | "pool_max_idle_per_host" => (),
                _ => warn!("Unknown AWS S3 option: {}", key),
            }
        }

        let region = config
            .get_option("region")
            .cloned()
            .or_else(|| locator.region().map(String::from))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let credentials = if config.flag("anonymous") {
            CredentialSource::Anonymous
        } else if let Some(credentials) = static_credentials(config)? {
            CredentialSource::Static(credentials)
        } else {
            let chain = loader(&region).load().await.credentials_provider();
            if default_chain_resolves(chain).await {
                CredentialSource::DefaultChain
            } else {
                info!("Could not load AWS credentials, falling back to anonymous access");
                CredentialSource::Anonymous
            }
        };

        let client = Self::connect(config, locator, &region, &credentials).await;
        if matches!(credentials, CredentialSource::Anonymous) && !client.can_list_bucket().await {
            info!(
                "Anonymous access cannot list bucket={}, using the default credentials chain",
                locator.bucket()
            );
            return Ok(Self::connect(config, locator, &region, &CredentialSource::DefaultChain).await);
        }
        Ok(client)
    }

    async fn connect(
        config: &StorageConfig,
        locator: &Locator,
        region: &str,
        credentials: &CredentialSource,
    ) -> Self {
        let endpoint = config
            .get_option("endpoint")
            .cloned()
            .or_else(|| locator.endpoint_url());
        let force_path_style = config.flag("force_path_style")
            || (endpoint.is_some() && locator.style() != AddressingStyle::VirtualHosted);

        let shared = match credentials {
            CredentialSource::Static(credentials) => {
                loader(region).credentials_provider(credentials.clone())
            }
            CredentialSource::DefaultChain => loader(region),
            CredentialSource::Anonymous => loader(region).no_credentials(),
        }
        .load()
        .await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(force_path_style);
        if let Some(endpoint_url) = &endpoint {
            builder = builder.endpoint_url(endpoint_url);
        }

        info!(
            "Created AWS S3 client for bucket={}, region={}, endpoint={:?}, path_style={}, credentials={}",
            locator.bucket(),
            region,
            endpoint,
            force_path_style,
            credentials.name()
        );
        Self::new(Client::from_conf(builder.build()), locator.bucket(), region)
    }

    async fn can_list_bucket(&self) -> bool {
        self.client
            .list_objects_v2()
            .bucket(&self.bucket)
            .max_keys(1)
            .send()
            .await
            .is_ok()
    }

    fn location_constraint(&self) -> Option<&str> {
        (self.region != DEFAULT_REGION).then_some(self.region.as_str())
    }
}

/// How requests to S3 are signed.
#[derive(Debug, Clone)]
enum CredentialSource {
    Static(Credentials),
    DefaultChain,
    Anonymous,
}

impl CredentialSource {
    fn name(&self) -> &'static str {
        match self {
            CredentialSource::Static(_) => "static",
            CredentialSource::DefaultChain => "default_chain",
            CredentialSource::Anonymous => "anonymous",
        }
    }
}

fn loader(region: &str) -> ConfigLoader {
    aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()))
}

/// The configured key pair, if any.
fn static_credentials(config: &StorageConfig) -> StorageResult<Option<Credentials>> {
    match (config.get_option("access_key_id"), config.get_option("secret_access_key")) {
        (Some(key_id), Some(secret)) => Ok(Some(Credentials::new(
            key_id,
            secret,
            config.get_option("session_token").cloned(),
            None,
            "s3-kva-config",
        ))),
        (None, None) => Ok(None),
        _ => Err(StorageError::ConfigError(
            "S3 config requires both access_key_id and secret_access_key when either is set".to_string(),
        )),
    }
}

/// Whether a provider chain yields credentials at all.
async fn default_chain_resolves(chain: Option<SharedCredentialsProvider>) -> bool {
    let Some(chain) = chain else {
        return false;
    };
    match chain.provide_credentials().await {
        Ok(_) => true,
        Err(e) => {
            debug!("Default credentials chain found no credentials: {}", e);
            false
        }
    }
}

/// Route an SDK failure through the status/code classifier.
fn map_sdk_error<E>(err: SdkError<E>, operation: &'static str, key: &str) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(service_err) => {
            let status = service_err.raw().status().as_u16();
            classify_status(
                status,
                service_err.err().code(),
                operation,
                key,
                DisplayErrorContext(&err).to_string(),
            )
        }
        _ => StorageError::io(operation, key, DisplayErrorContext(&err)),
    }
}

fn max_keys(max_keys: usize) -> i32 {
    i32::try_from(max_keys).unwrap_or(i32::MAX)
}

#[async_trait]
impl ObjectClient for AwsS3Client {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn bucket_exists(&self) -> StorageResult<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) => {
                let err = map_sdk_error(err, "bucket_exists", &self.bucket);
                if err.is_not_found() {
                    Ok(false)
                } else if err.is_forbidden() {
                    debug!("HeadBucket forbidden for bucket={}, treating as existing", self.bucket);
                    Ok(true)
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn create_bucket(&self) -> StorageResult<()> {
        let mut request = self.client.create_bucket().bucket(&self.bucket);
        if let Some(region) = self.location_constraint() {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }
        match request.send().await {
            Ok(_) => {
                info!("Created bucket={} in region={}", self.bucket, self.region);
                Ok(())
            }
            Err(err) => {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_bucket_already_owned_by_you())
                {
                    return Ok(());
                }
                Err(map_sdk_error(err, "create_bucket", &self.bucket))
            }
        }
    }

    async fn delete_bucket(&self) -> StorageResult<()> {
        self.client
            .delete_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "delete_bucket", &self.bucket))?;
        info!("Deleted bucket={}", self.bucket);
        Ok(())
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectHead> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "head", key))?;

        let last_modified = output
            .last_modified()
            .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos()));

        Ok(ObjectHead {
            key: key.to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            e_tag: output.e_tag().map(String::from),
            last_modified,
        })
    }

    async fn get(&self, key: &str, range: ByteRange, if_match: Option<&str>) -> StorageResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range.header_value())
            .set_if_match(if_match.map(String::from))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "get", key))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::io("get", key, e))?
            .into_bytes();
        Ok(bytes)
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<Option<String>> {
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "put", key))?;
        Ok(output.e_tag().map(String::from))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        match self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err) => {
                let err = map_sdk_error(err, "delete", key);
                if err.is_not_found() {
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn delete_batch(&self, keys: &[String]) -> StorageResult<()> {
        for chunk in keys.chunks(DELETE_BATCH_SIZE) {
            let objects = chunk
                .iter()
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| StorageError::io("delete_batch", key.as_str(), e))
                })
                .collect::<StorageResult<Vec<_>>>()?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| StorageError::io("delete_batch", &self.bucket, e))?;

            let output = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| map_sdk_error(e, "delete_batch", &self.bucket))?;

            if let Some(failure) = output
                .errors()
                .iter()
                .find(|e| e.code() != Some("NoSuchKey"))
            {
                return Err(StorageError::IoError {
                    operation: "delete_batch",
                    key: failure.key().unwrap_or_default().to_string(),
                    status: None,
                    message: format!(
                        "{}: {}",
                        failure.code().unwrap_or("unknown"),
                        failure.message().unwrap_or("no message")
                    ),
                });
            }
            debug!("Deleted batch of count={} keys from bucket={}", chunk.len(), self.bucket);
        }
        Ok(())
    }

    async fn list_page(&self, request: &ListRequest) -> StorageResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&request.prefix)
            .set_delimiter(request.delimiter.map(|d| d.to_string()))
            .set_max_keys(request.max_keys.map(max_keys))
            .set_continuation_token(request.continuation_token.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "list", &request.prefix))?;

        let next_continuation_token = if output.is_truncated() == Some(true) {
            output.next_continuation_token().map(String::from)
        } else {
            None
        };

        Ok(ListPage {
            common_prefixes: output
                .common_prefixes()
                .iter()
                .filter_map(|p| p.prefix().map(String::from))
                .collect(),
            keys: output
                .contents()
                .iter()
                .filter_map(|o| o.key().map(String::from))
                .collect(),
            next_continuation_token,
        })
    }
}

impl Debug for AwsS3Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ObjectClient(type=aws_sdk, bucket={}, region={})",
            self.bucket, self.region
        )
    }
}
