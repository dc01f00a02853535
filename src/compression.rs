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

//! Compressor table (spec §6). The core only ever consumes a mapping from
//! codec to decompression function; this module just supplies a
//! ready-made table built from the same codec crates the teacher links
//! against (`snap`, `flate2`, `brotli`) plus `lz4_flex`/`zstd`, enriched
//! from `paiml-trueno-db`'s `Cargo.toml` for the codecs the teacher never
//! needed (ZSTD, LZ4_RAW). Callers may always supply their own table
//! instead (spec §9, "Globals").

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use crate::basic::Compression;
use crate::error::{general_err, ParquetError, Result};

type DecompressFn = dyn Fn(&[u8], usize) -> Result<Vec<u8>> + Send + Sync;

/// Mapping from codec to `(compressed, expected_uncompressed_len) ->
/// uncompressed bytes`. `UNCOMPRESSED` is always a pass-through regardless
/// of what's registered.
#[derive(Clone, Default)]
pub struct Compressors {
    table: HashMap<Compression, Arc<DecompressFn>>,
}

impl Compressors {
    pub fn new() -> Self {
        Self { table: HashMap::new() }
    }

    pub fn register(&mut self, codec: Compression, f: impl Fn(&[u8], usize) -> Result<Vec<u8>> + Send + Sync + 'static) {
        self.table.insert(codec, Arc::new(f));
    }

    pub fn decompress(&self, codec: Compression, compressed: &[u8], uncompressed_len: usize) -> Result<Vec<u8>> {
        if codec == Compression::Uncompressed {
            return Ok(compressed.to_vec());
        }
        match self.table.get(&codec) {
            Some(f) => f(compressed, uncompressed_len),
            None => Err(ParquetError::UnsupportedCodec(codec.name().to_string())),
        }
    }
}

/// Builds the default table from whichever codec crates are enabled as
/// Cargo features. LZO is intentionally absent: there is no maintained
/// pure-Rust LZO decoder in the dependency stack, so `LZO`-compressed
/// files require a caller-supplied compressor.
pub fn default_compressors() -> Compressors {
    let mut c = Compressors::new();

    #[cfg(feature = "snappy")]
    c.register(Compression::Snappy, |compressed, _len| {
        snap::raw::Decoder::new()
            .decompress_vec(compressed)
            .map_err(|e| general_err!("snappy decompression failed: {}", e))
    });

    #[cfg(feature = "gzip")]
    c.register(Compression::Gzip, |compressed, len| {
        let mut decoder = flate2::read::GzDecoder::new(compressed);
        let mut out = Vec::with_capacity(len);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| general_err!("gzip decompression failed: {}", e))?;
        Ok(out)
    });

    #[cfg(feature = "brotli")]
    c.register(Compression::Brotli, |compressed, len| {
        let mut decoder = brotli::Decompressor::new(compressed, 4096);
        let mut out = Vec::with_capacity(len);
        decoder
            .read_to_end(&mut out)
            .map_err(|e| general_err!("brotli decompression failed: {}", e))?;
        Ok(out)
    });

    #[cfg(feature = "lz4")]
    {
        c.register(Compression::Lz4Raw, |compressed, len| {
            lz4_flex::block::decompress(compressed, len).map_err(|e| general_err!("lz4_raw decompression failed: {}", e))
        });
        // Parquet's legacy LZ4 codec is Hadoop-framed rather than a raw
        // block; most modern writers emit LZ4_RAW instead. Treat LZ4 as an
        // alias of the raw decoder, which covers the common case.
        c.register(Compression::Lz4, |compressed, len| {
            lz4_flex::block::decompress(compressed, len).map_err(|e| general_err!("lz4 decompression failed: {}", e))
        });
    }

    #[cfg(feature = "zstd")]
    c.register(Compression::Zstd, |compressed, len| {
        zstd::bulk::decompress(compressed, len.max(1)).map_err(|e| general_err!("zstd decompression failed: {}", e))
    });

    c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_is_always_a_pass_through() {
        let c = Compressors::new();
        let out = c.decompress(Compression::Uncompressed, b"hello", 5).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn unregistered_codec_is_unsupported() {
        let c = Compressors::new();
        let err = c.decompress(Compression::Lzo, b"x", 1).unwrap_err();
        assert!(matches!(err, ParquetError::UnsupportedCodec(_)));
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn default_table_round_trips_gzip() {
        use std::io::Write;
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"round trip me").unwrap();
        let compressed = encoder.finish().unwrap();
        let c = default_compressors();
        let out = c.decompress(Compression::Gzip, &compressed, 13).unwrap();
        assert_eq!(out, b"round trip me");
    }
}
