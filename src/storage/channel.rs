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

use super::bucket::BucketLifecycle;
use super::error::{StorageError, StorageResult};
use super::policy::IoPolicy;
use super::read::LazyRead;
use bytes::Bytes;
use parking_lot::Mutex;
use std::io::{self, Cursor, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

enum ChannelResource {
    Reader(Arc<LazyRead>),
    Writer(Arc<Mutex<Vec<u8>>>),
}

/// Handle on a single key that owns every reader and writer opened through it.
///
/// Readers are materialized when opened. Writers buffer in memory and are
/// written through the consistency policy when the channel closes, in the
/// order they were opened. Closing is idempotent and safe from several
/// tasks at once; only the first call does any work.
pub struct ObjectChannel {
    policy: Arc<dyn IoPolicy>,
    lifecycle: Arc<BucketLifecycle>,
    key: String,
    read_only: bool,
    resources: Mutex<Vec<ChannelResource>>,
    closed: AtomicBool,
}

impl ObjectChannel {
    pub fn new(
        policy: Arc<dyn IoPolicy>,
        lifecycle: Arc<BucketLifecycle>,
        key: impl Into<String>,
        read_only: bool,
    ) -> Self {
        Self {
            policy,
            lifecycle,
            key: key.into(),
            read_only,
            resources: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.is_closed() {
            Err(StorageError::io("channel", self.key.as_str(), "channel is closed"))
        } else {
            Ok(())
        }
    }

    /// Read the object and return a reader over its bytes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the object does not exist.
    pub async fn new_reader(&self) -> StorageResult<ChannelReader> {
        self.check_open()?;
        let read = Arc::new(self.policy.read(&self.key));
        let data = read.read_all().await?;
        self.resources.lock().push(ChannelResource::Reader(read));
        Ok(ChannelReader {
            cursor: Cursor::new(data),
        })
    }

    /// Open a writer that replaces the object's content when the channel closes.
    ///
    /// # Errors
    ///
    /// Returns `OperationNotPermitted` on a read-only channel.
    pub fn new_writer(&self) -> StorageResult<ChannelWriter> {
        self.check_open()?;
        if self.read_only {
            return Err(StorageError::OperationNotPermitted(format!(
                "channel for {} is read-only",
                self.key
            )));
        }
        let buffer = Arc::new(Mutex::new(Vec::new()));
        self.resources
            .lock()
            .push(ChannelResource::Writer(buffer.clone()));
        Ok(ChannelWriter { buffer })
    }

    /// Flush writers and release readers. Later calls return `Ok(())` at once.
    ///
    /// Every resource is released even if a flush fails; the first failure
    /// is returned.
    pub async fn close(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let resources = std::mem::take(&mut *self.resources.lock());

        let mut first_error = None;
        for resource in resources {
            match resource {
                ChannelResource::Reader(read) => read.close(),
                ChannelResource::Writer(buffer) => {
                    let data = Bytes::from(std::mem::take(&mut *buffer.lock()));
                    let result = match self.lifecycle.ensure_bucket().await {
                        Ok(()) => self.policy.write(&self.key, data).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = result {
                        first_error.get_or_insert(e);
                    }
                }
            }
        }
        debug!("Closed channel for key={}", self.key);
        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for ObjectChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectChannel")
            .field("key", &self.key)
            .field("read_only", &self.read_only)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Reader over a materialized object.
#[derive(Debug)]
pub struct ChannelReader {
    cursor: Cursor<Bytes>,
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.cursor.read(buf)
    }
}

/// In-memory writer flushed by [`ObjectChannel::close`].
#[derive(Debug, Clone)]
pub struct ChannelWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
