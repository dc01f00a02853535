// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Byte-range-addressable source abstraction (spec §6, §9 "Async/streaming").
//!
//! The teacher reads a local `File` directly with `Seek`/`Read` inside
//! `SerializedFileReader`/`SerializedRowGroupReader` (`file/reader.rs`); this
//! core generalizes that to any random-access byte range, local or remote,
//! behind a single `async fn slice`. Suspension only ever happens inside
//! that call (spec §5) so decoding itself stays synchronous and
//! deterministic across transports.

use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{general_err, Result};

/// Opaque random-access byte source. Implementors only need to answer
/// `byte_length` and serve `slice(start, end)`; everything above this layer
/// is synchronous.
#[async_trait]
pub trait ByteSource: Send + Sync {
    fn byte_length(&self) -> u64;

    /// `start < end <= byte_length()`. Returns exactly `end - start` bytes.
    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>>;
}

/// Lets a borrowed source (e.g. `&dyn ByteSource`) stand in anywhere an
/// owned one is expected, notably as `PrefetchedSource<S>`'s `S`.
#[async_trait]
impl<T: ByteSource + ?Sized> ByteSource for &T {
    fn byte_length(&self) -> u64 {
        (**self).byte_length()
    }

    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        (**self).slice(start, end).await
    }
}

/// A source backed by an in-memory buffer.
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    fn byte_length(&self) -> u64 {
        self.data.len() as u64
    }

    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        if end < start || end > self.byte_length() {
            return Err(general_err!("slice [{}, {}) out of range for {} bytes", start, end, self.byte_length()));
        }
        Ok(self.data[start as usize..end as usize].to_vec())
    }
}

/// A source backed by a local file. Reads run on the blocking thread pool
/// (`tokio::task::spawn_blocking`) so they never stall the async executor,
/// mirroring the teacher's plain `BufReader<File>` but without blocking the
/// caller's task. Native targets only; wasm32 builds have no thread pool to
/// spawn onto and read their bytes through a host-provided `ByteSource`
/// instead (spec §9, "Async/streaming").
#[cfg(feature = "tokio")]
pub struct FileSource {
    path: PathBuf,
    len: u64,
}

#[cfg(feature = "tokio")]
impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = std::fs::metadata(&path)
            .map_err(|e| general_err!("could not stat {}: {}", path.display(), e))?
            .len();
        Ok(Self { path, len })
    }
}

#[cfg(feature = "tokio")]
#[async_trait]
impl ByteSource for FileSource {
    fn byte_length(&self) -> u64 {
        self.len
    }

    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        if end < start || end > self.len {
            return Err(general_err!("slice [{}, {}) out of range for {} bytes", start, end, self.len));
        }
        let path = self.path.clone();
        let len = (end - start) as usize;
        tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut file = std::fs::File::open(&path)
                .map_err(|e| general_err!("could not open {}: {}", path.display(), e))?;
            file.seek(SeekFrom::Start(start))
                .map_err(|e| general_err!("seek failed on {}: {}", path.display(), e))?;
            let mut buf = vec![0u8; len];
            file.read_exact(&mut buf)
                .map_err(|e| general_err!("read failed on {}: {}", path.display(), e))?;
            Ok(buf)
        })
        .await
        .map_err(|e| general_err!("blocking read task panicked: {}", e))?
    }
}

/// Wraps a source plus a set of already-fetched ranges (the query engine's
/// prefetch buffers, spec §5 "Shared-resource policy"); sub-slices fully
/// contained in an already-fetched range are served without re-fetching.
pub struct PrefetchedSource<S: ByteSource> {
    inner: S,
    ranges: Mutex<Vec<(u64, u64, Arc<[u8]>)>>,
}

impl<S: ByteSource> PrefetchedSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, ranges: Mutex::new(Vec::new()) }
    }

    /// Registers bytes already fetched for `[start, start + data.len())` so
    /// later `slice` calls within that span avoid re-fetching.
    pub fn prefetch(&self, start: u64, data: Vec<u8>) {
        let end = start + data.len() as u64;
        self.ranges.lock().unwrap().push((start, end, Arc::from(data)));
    }
}

#[async_trait]
impl<S: ByteSource> ByteSource for PrefetchedSource<S> {
    fn byte_length(&self) -> u64 {
        self.inner.byte_length()
    }

    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>> {
        {
            let ranges = self.ranges.lock().unwrap();
            for (r_start, r_end, data) in ranges.iter() {
                if *r_start <= start && end <= *r_end {
                    let lo = (start - r_start) as usize;
                    let hi = (end - r_start) as usize;
                    return Ok(data[lo..hi].to_vec());
                }
            }
        }
        self.inner.slice(start, end).await
    }
}
