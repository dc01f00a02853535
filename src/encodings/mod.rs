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

//! Page-value encodings (spec §4.E). Grounded on the teacher's
//! `encodings` module (`decoding.rs`, `levels.rs`, `encoding.rs`), which
//! dispatches per encoding over a `default impl<T: DataType>`
//! specialization only available on nightly Rust. This core has no
//! compile-time column type (schemas are discovered at runtime), so
//! decoders here return a runtime `PhysicalValue` enum instead of a typed
//! buffer, and dispatch happens through plain `match` on `basic::Type` and
//! `basic::Encoding` rather than trait specialization.

pub mod bit_util;
pub mod byte_stream_split;
pub mod delta;
pub mod dictionary;
pub mod levels;
pub mod plain;
pub mod rle;

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::basic::{Encoding, Type};
use crate::error::{eof_err, general_err, ParquetError, Result};

/// A reference-counted, cheaply-cloneable byte buffer. Backs BYTE_ARRAY,
/// FIXED_LEN_BYTE_ARRAY and dictionary entries so that dereferencing a
/// dictionary index never re-copies the underlying bytes (spec §9,
/// "Dictionary lifetimes").
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Bytes(Arc<[u8]>);

impl From<&[u8]> for Bytes {
    fn from(slice: &[u8]) -> Self {
        Bytes(Arc::from(slice))
    }
}

impl Deref for Bytes {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0[..], f)
    }
}

/// A 96-bit integer as laid out by INT96: an unsigned low 64 bits and a
/// signed high 32 bits (spec §9, "INT96 nanos sign" open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Int96 {
    pub lo: u64,
    pub hi: i32,
}

/// Runtime-typed decoded value. Dispatch on `basic::Type` replaces the
/// teacher's compile-time `DataType` generic.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalValue {
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Int96(Int96),
    Float(f32),
    Double(f64),
    Bytes(Bytes),
}

/// Decodes one page's worth of leaf values (everything except dictionary
/// index streams, which go through [`dictionary::decode_indices`] instead
/// since they need the chunk's dictionary table to dereference against).
/// Returns the decoded values and the number of bytes of `data` consumed.
pub fn decode_page_values(
    encoding: Encoding,
    ty: Type,
    data: &[u8],
    num_values: usize,
    type_length: i32,
) -> Result<(Vec<PhysicalValue>, usize)> {
    match encoding {
        Encoding::Plain => plain::decode(data, ty, num_values, type_length),
        Encoding::Rle => {
            if ty != Type::Boolean {
                return Err(ParquetError::UnsupportedEncoding(encoding));
            }
            let (bools, consumed) = decode_rle_boolean(data, num_values)?;
            Ok((bools.into_iter().map(PhysicalValue::Boolean).collect(), consumed))
        }
        Encoding::BitPacked => {
            if ty != Type::Boolean {
                return Err(ParquetError::UnsupportedEncoding(encoding));
            }
            plain::decode(data, Type::Boolean, num_values, 0)
        }
        Encoding::DeltaBinaryPacked => {
            let (ints, consumed) = delta::decode_binary_packed(data)?;
            let values = match ty {
                Type::Int32 => ints.into_iter().map(|v| PhysicalValue::Int32(v as i32)).collect(),
                Type::Int64 => ints.into_iter().map(PhysicalValue::Int64).collect(),
                other => return Err(general_err!("DELTA_BINARY_PACKED is not valid for type {:?}", other)),
            };
            Ok((values, consumed))
        }
        Encoding::DeltaLengthByteArray => {
            let (vals, consumed) = delta::decode_length_byte_array(data, num_values)?;
            Ok((
                vals.into_iter().map(|v| PhysicalValue::Bytes(Bytes::from(&v[..]))).collect(),
                consumed,
            ))
        }
        Encoding::DeltaByteArray => {
            let (vals, consumed) = delta::decode_byte_array(data)?;
            Ok((
                vals.into_iter().map(|v| PhysicalValue::Bytes(Bytes::from(&v[..]))).collect(),
                consumed,
            ))
        }
        Encoding::ByteStreamSplit => decode_byte_stream_split(data, ty, num_values, type_length),
        Encoding::PlainDictionary | Encoding::RleDictionary => Err(general_err!(
            "dictionary-encoded pages must be decoded via decode_indices, not decode_page_values"
        )),
    }
}

fn decode_byte_stream_split(data: &[u8], ty: Type, num_values: usize, type_length: i32) -> Result<(Vec<PhysicalValue>, usize)> {
    let width = match ty {
        Type::Float => 4,
        Type::Double => 8,
        Type::Int32 => 4,
        Type::Int64 => 8,
        Type::FixedLenByteArray => {
            if type_length <= 0 {
                return Err(eof_err!("BYTE_STREAM_SPLIT on FIXED_LEN_BYTE_ARRAY requires a positive type_length"));
            }
            type_length as usize
        }
        other => return Err(general_err!("BYTE_STREAM_SPLIT is not valid for type {:?}", other)),
    };
    let raw = byte_stream_split::untranspose(data, width, num_values)?;
    let values = match ty {
        Type::Float => (0..num_values)
            .map(|i| PhysicalValue::Float(LittleEndian::read_f32(&raw[i * width..i * width + width])))
            .collect(),
        Type::Double => (0..num_values)
            .map(|i| PhysicalValue::Double(LittleEndian::read_f64(&raw[i * width..i * width + width])))
            .collect(),
        Type::Int32 => (0..num_values)
            .map(|i| PhysicalValue::Int32(LittleEndian::read_i32(&raw[i * width..i * width + width])))
            .collect(),
        Type::Int64 => (0..num_values)
            .map(|i| PhysicalValue::Int64(LittleEndian::read_i64(&raw[i * width..i * width + width])))
            .collect(),
        Type::FixedLenByteArray => (0..num_values)
            .map(|i| PhysicalValue::Bytes(Bytes::from(&raw[i * width..(i + 1) * width])))
            .collect(),
        _ => unreachable!(),
    };
    Ok((values, width * num_values))
}

/// RLE-encoded BOOLEAN data (spec §9, "boolean RLE width" open question):
/// some writers emit a 4-byte length prefix ahead of the hybrid stream
/// (mirroring the def/rep level sections), others emit the hybrid stream
/// directly. Tries the prefixed form first and falls back to the
/// unprefixed form if it doesn't yield exactly `num_values` values.
pub fn decode_rle_boolean(data: &[u8], num_values: usize) -> Result<(Vec<bool>, usize)> {
    if data.len() >= 4 {
        let len = LittleEndian::read_u32(&data[0..4]) as usize;
        if 4 + len <= data.len() {
            if let Ok((values, _consumed)) = rle::decode_hybrid(&data[4..4 + len], 1, num_values) {
                if values.len() == num_values {
                    return Ok((values.into_iter().map(|v| v != 0).collect(), 4 + len));
                }
            }
        }
    }
    let (values, consumed) = rle::decode_hybrid(data, 1, num_values)?;
    Ok((values.into_iter().map(|v| v != 0).collect(), consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_rle_falls_back_without_length_prefix() {
        // No sane 4-byte prefix here (would claim a huge length), so the
        // fallback path reads the hybrid stream directly from byte 0.
        let bytes = [0x03u8, 0b10110100];
        let (values, consumed) = decode_rle_boolean(&bytes, 8).unwrap();
        assert_eq!(values, vec![false, false, true, false, true, true, false, true]);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn boolean_rle_honors_length_prefix_when_present() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.push(0x03);
        bytes.push(0b10110100);
        let (values, consumed) = decode_rle_boolean(&bytes, 8).unwrap();
        assert_eq!(values, vec![false, false, true, false, true, true, false, true]);
        assert_eq!(consumed, 6);
    }
}
