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

//! DELTA_BINARY_PACKED, DELTA_LENGTH_BYTE_ARRAY and DELTA_BYTE_ARRAY
//! decoders (spec §4.E). Grounded on the teacher's `DeltaBitPackDecoder` and
//! `DeltaLengthByteArrayDecoder`/`DeltaByteArrayDecoder` (`encodings/decoding.rs`),
//! generalized off the generic `DataType` parameter since this core only
//! ever materializes `i64` deltas and casts to `i32` at the column-reader
//! boundary.

use super::bit_util::{ceil_div, read_unsigned_varint, read_zigzag_varint, unpack_bit_packed};
use crate::error::{eof_err, Result};

/// Decodes a DELTA_BINARY_PACKED integer sequence. Returns the values and
/// the number of bytes of `data` consumed.
pub fn decode_binary_packed(data: &[u8]) -> Result<(Vec<i64>, usize)> {
    let mut pos = 0usize;
    let block_size = read_unsigned_varint(data, &mut pos)? as usize;
    let miniblocks_per_block = read_unsigned_varint(data, &mut pos)? as usize;
    let total_value_count = read_unsigned_varint(data, &mut pos)? as usize;
    let first_value = read_zigzag_varint(data, &mut pos)?;

    let mut out = Vec::with_capacity(total_value_count);
    out.push(first_value);
    if total_value_count == 0 {
        return Ok((out, pos));
    }
    let values_per_miniblock = if miniblocks_per_block == 0 {
        0
    } else {
        block_size / miniblocks_per_block
    };
    let mut prev = first_value;

    while out.len() < total_value_count {
        let min_delta = read_zigzag_varint(data, &mut pos)?;
        let mut bit_widths = Vec::with_capacity(miniblocks_per_block);
        for _ in 0..miniblocks_per_block {
            if pos >= data.len() {
                return Err(eof_err!("truncated delta block bit-width table"));
            }
            bit_widths.push(data[pos]);
            pos += 1;
        }
        for &bw in &bit_widths {
            let bytes_needed = ceil_div(values_per_miniblock * bw as usize, 8);
            if pos + bytes_needed > data.len() {
                return Err(eof_err!("truncated delta miniblock"));
            }
            let deltas = unpack_bit_packed(&data[pos..pos + bytes_needed], bw, values_per_miniblock)?;
            pos += bytes_needed;
            for d in deltas {
                if out.len() >= total_value_count {
                    continue;
                }
                let v = prev + min_delta + d as i64;
                out.push(v);
                prev = v;
            }
        }
    }
    Ok((out, pos))
}

/// One DELTA_BINARY_PACKED length sequence followed by concatenated bytes.
pub fn decode_length_byte_array(data: &[u8], num_values: usize) -> Result<(Vec<Vec<u8>>, usize)> {
    let (lengths, consumed) = decode_binary_packed(data)?;
    let mut pos = consumed;
    let mut out = Vec::with_capacity(num_values);
    for &len in lengths.iter().take(num_values) {
        let len = len as usize;
        if pos + len > data.len() {
            return Err(eof_err!("truncated delta-length-byte-array value"));
        }
        out.push(data[pos..pos + len].to_vec());
        pos += len;
    }
    Ok((out, pos))
}

/// Two DELTA_BINARY_PACKED sequences (prefix lengths, suffix lengths)
/// followed by concatenated suffix bytes; value `i` is
/// `prev[0..prefixLen_i] ++ suffix_i`, `prev` being the previously
/// assembled value (empty for `i == 0`).
pub fn decode_byte_array(data: &[u8]) -> Result<(Vec<Vec<u8>>, usize)> {
    let (prefix_lens, c1) = decode_binary_packed(data)?;
    let mut pos = c1;
    let (suffix_lens, c2) = decode_binary_packed(&data[pos..])?;
    pos += c2;

    let n = prefix_lens.len().min(suffix_lens.len());
    let mut out = Vec::with_capacity(n);
    let mut prev: Vec<u8> = Vec::new();
    for i in 0..n {
        let suffix_len = suffix_lens[i] as usize;
        if pos + suffix_len > data.len() {
            return Err(eof_err!("truncated delta-byte-array suffix"));
        }
        let suffix = &data[pos..pos + suffix_len];
        pos += suffix_len;
        let prefix_len = prefix_lens[i] as usize;
        if prefix_len > prev.len() {
            return Err(eof_err!("delta-byte-array prefix longer than previous value"));
        }
        let mut value = Vec::with_capacity(prefix_len + suffix_len);
        value.extend_from_slice(&prev[..prefix_len]);
        value.extend_from_slice(suffix);
        prev = value.clone();
        out.push(value);
    }
    Ok((out, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_packed_single_miniblock() {
        // header: block_size=8, miniblocks=1, count=5, first_value=zigzag(5)=10
        // block: min_delta=zigzag(1)=2, bit_widths=[8], deltas=[0,1,2,3,0,0,0,0]
        let bytes = [0x08u8, 0x01, 0x05, 0x0A, 0x02, 0x08, 0, 1, 2, 3, 0, 0, 0, 0];
        let (values, consumed) = decode_binary_packed(&bytes).unwrap();
        assert_eq!(values, vec![5, 6, 8, 11, 15]);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn length_byte_array_splits_concatenated_bytes() {
        let mut bytes = vec![0x08u8, 0x01, 0x02, 0x06, 0x01, 0x08, 0, 0, 0, 0, 0, 0, 0, 0];
        bytes.extend_from_slice(b"abcde");
        let (values, consumed) = decode_length_byte_array(&bytes, 2).unwrap();
        assert_eq!(values, vec![b"abc".to_vec(), b"de".to_vec()]);
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn byte_array_reuses_prefix_of_previous_value() {
        let mut bytes = vec![0x08u8, 0x01, 0x02, 0x00, 0x02, 0x08, 0, 0, 0, 0, 0, 0, 0, 0];
        bytes.extend_from_slice(&[0x08, 0x01, 0x02, 0x06, 0x01, 0x08, 0, 0, 0, 0, 0, 0, 0, 0]);
        bytes.extend_from_slice(b"abcde");
        let (values, consumed) = decode_byte_array(&bytes).unwrap();
        assert_eq!(values, vec![b"abc".to_vec(), b"ade".to_vec()]);
        assert_eq!(consumed, bytes.len());
    }
}
