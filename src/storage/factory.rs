use std::sync::Arc;

use super::aws::AwsS3Client;
use super::client::ObjectClient;
use super::config::{ClientType, StorageConfig};
use super::error::{StorageError, StorageResult};
use super::kva::S3KeyValueAccess;
use super::locator::Locator;
use super::memory::InMemoryClient;
use super::object_store::ObjectStoreClient;
use super::provider::KeyValueAccess;

/// Factory for opening containers
pub struct StorageProviderFactory;

impl StorageProviderFactory {
    /// Open a container from a configuration.
    ///
    /// The root locator is parsed from `config.uri`, the object client is
    /// chosen by `config.client_type`, and the consistency policy is the
    /// config's own or else the process-wide default.
    ///
    /// # Arguments
    ///
    /// * `config` - The storage configuration specifying the locator, client and options
    ///
    /// # Returns
    ///
    /// A `Result` containing:
    /// * `Ok(Arc<dyn KeyValueAccess>)` - A thread-safe handle on the container
    /// * `Err(StorageError)` - If the container cannot be opened
    ///
    /// # Errors
    ///
    /// This function will return an error if:
    /// * The locator is malformed or names no bucket
    /// * Required configuration options are missing or invalid
    /// * The bucket does not exist and `create_bucket` is off
    pub async fn from_config(config: StorageConfig) -> StorageResult<Arc<dyn KeyValueAccess>> {
        let locator = Locator::parse(&config.uri)?;
        let client = Self::build_client(&config, &locator).await?;
        let kva = S3KeyValueAccess::open(
            client,
            locator,
            config.create_bucket,
            config.resolved_io_policy(),
        )
        .await?;
        Ok(Arc::new(kva))
    }

    async fn build_client(
        config: &StorageConfig,
        locator: &Locator,
    ) -> StorageResult<Arc<dyn ObjectClient>> {
        let client: Arc<dyn ObjectClient> = match config.client_type {
            ClientType::AwsSdk => Arc::new(AwsS3Client::from_config(config, locator).await?),
            ClientType::ObjectStore => Arc::new(ObjectStoreClient::from_config(config, locator)?),
            ClientType::Memory => Arc::new(Self::build_memory_client(config, locator)?),
        };
        Ok(client)
    }

    fn build_memory_client(config: &StorageConfig, locator: &Locator) -> StorageResult<InMemoryClient> {
        let client = if config.create_bucket {
            InMemoryClient::without_bucket(locator.bucket())
        } else {
            InMemoryClient::new(locator.bucket())
        };
        match config.get_option("page_size") {
            Some(value) => {
                let page_size = value
                    .parse()
                    .map_err(|_| StorageError::ConfigError(format!("Invalid page_size: {}", value)))?;
                Ok(client.with_page_size(page_size))
            }
            None => Ok(client),
        }
    }
}
