use bytes::Bytes;
use s3_kva::{IoPolicyKind, KeyValueAccess, StorageConfig, StorageProviderFactory};
use std::error::Error;
use std::io::{Read, Write};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Swap in StorageConfig::aws(..) or StorageConfig::object_store(..) to run against a real bucket
    let storage_config = StorageConfig::memory("https://zarr-n5-demo.s3.eu-west-1.amazonaws.com/sample.n5")
        .with_create_bucket(true)
        .with_option("page_size", "4")
        .with_io_policy(IoPolicyKind::EtagMatch);
    let kva = StorageProviderFactory::from_config(storage_config).await?;
    info!("Container root is {}", kva.uri(""));

    kva.create_directories("volumes/raw/s0").await?;
    kva.write("attributes.json", Bytes::from_static(b"{\"n5\":\"4.0.0\"}"))
        .await?;
    for x in 0..6 {
        let block: Vec<u8> = (0..64).map(|i| (i * x) as u8).collect();
        kva.write(&format!("volumes/raw/s0/{}/0", x), Bytes::from(block))
            .await?;
    }

    info!("Groups under volumes: {:?}", kva.list_directories("volumes").await?);
    info!("Blocks under s0: {:?}", kva.list("volumes/raw/s0").await?);

    let read = kva.create_read_data("volumes/raw/s0/3/0");
    let size = read.size().await?;
    let head = read.materialize(0, 8).await?;
    info!("Block size={} bytes, first bytes={:?}", size, &head[..]);

    // Another writer replaces the block between size() and materialize()
    kva.write("volumes/raw/s0/3/0", Bytes::from_static(b"replaced"))
        .await?;
    match read.materialize(8, size - 8).await {
        Err(e) if e.is_concurrent_modification() => info!("Detected concurrent write: {}", e),
        other => info!("Unexpected read result: {:?}", other.map(|b| b.len())),
    }

    let channel = kva.lock_for_writing("volumes/raw/attributes.json");
    channel
        .new_writer()?
        .write_all(b"{\"dimensions\":[6,64],\"dataType\":\"uint8\"}")?;
    channel.close().await?;

    let channel = kva.lock_for_reading("volumes/raw/attributes.json");
    let mut attributes = String::new();
    channel.new_reader().await?.read_to_string(&mut attributes)?;
    channel.close().await?;
    info!("Attributes: {}", attributes);

    kva.delete("volumes/raw/s0").await?;
    info!(
        "After delete: s0 exists={}, raw exists={}",
        kva.exists("volumes/raw/s0").await?,
        kva.exists("volumes/raw").await?
    );

    kva.delete("").await?;
    info!("Container removed, root exists={}", kva.exists("").await?);
    Ok(())
}
