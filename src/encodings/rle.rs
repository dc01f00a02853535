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

//! RLE/BIT_PACKED hybrid decoder (spec §4.E), used for definition/repetition
//! levels, dictionary indices and RLE-encoded boolean pages. Grounded on the
//! teacher's `RleDecoder` (referenced from `encodings/levels.rs`'s
//! `InternalDecoder::RLE` arm), rewritten to return plain `u32` buffers
//! instead of threading through a generic `DataType`.

use super::bit_util::{ceil_div, read_unsigned_varint, unpack_bit_packed};
use crate::error::{eof_err, Result};

/// Decodes up to `num_values` values of `bit_width` bits from `data`.
/// Returns the decoded values and the number of bytes of `data` consumed.
pub fn decode_hybrid(data: &[u8], bit_width: u8, num_values: usize) -> Result<(Vec<u32>, usize)> {
    let mut pos = 0usize;
    let mut out = Vec::with_capacity(num_values);
    if bit_width == 0 {
        return Ok((vec![0; num_values], 0));
    }
    while out.len() < num_values && pos < data.len() {
        let header = read_unsigned_varint(data, &mut pos)?;
        if header & 1 == 0 {
            // Run of `header >> 1` repeats of a value, stored in
            // `ceil(bit_width/8)` little-endian bytes.
            let run_len = (header >> 1) as usize;
            let byte_width = ceil_div(bit_width as usize, 8);
            if pos + byte_width > data.len() {
                return Err(eof_err!("RLE run value truncated: need {} bytes at offset {}, have {}", byte_width, pos, data.len()));
            }
            let mut value: u64 = 0;
            for i in 0..byte_width {
                value |= (data[pos + i] as u64) << (8 * i);
            }
            pos += byte_width;
            let take = run_len.min(num_values - out.len());
            out.extend(std::iter::repeat(value as u32).take(take));
        } else {
            // Bit-packed run of `(header >> 1) * 8` values.
            let values_in_run = (header >> 1) as usize * 8;
            let bytes_needed = ceil_div(values_in_run * bit_width as usize, 8);
            if pos + bytes_needed > data.len() {
                return Err(eof_err!("bit-packed run truncated: need {} bytes at offset {}, have {}", bytes_needed, pos, data.len()));
            }
            let group = &data[pos..pos + bytes_needed];
            let values = unpack_bit_packed(group, bit_width, values_in_run)?;
            pos += bytes_needed;
            let take = values_in_run.min(num_values - out.len());
            out.extend(values.into_iter().take(take).map(|v| v as u32));
        }
    }
    Ok((out, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rle_run_of_repeated_value() {
        // header = (300 << 1) | 0 = 600 -> varint [0xD8, 0x04]; value byte-width
        // for bit_width=8 is 1 byte, value = 7.
        let mut bytes = vec![];
        let header = 300u64 << 1;
        let mut h = header;
        loop {
            let mut b = (h & 0x7f) as u8;
            h >>= 7;
            if h != 0 {
                b |= 0x80;
            }
            bytes.push(b);
            if h == 0 {
                break;
            }
        }
        bytes.push(7u8);
        let (values, consumed) = decode_hybrid(&bytes, 8, 300).unwrap();
        assert_eq!(values.len(), 300);
        assert!(values.iter().all(|&v| v == 7));
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn bit_packed_run_matches_spec_example() {
        let bytes = [0x03u8, 0b10110100];
        let (values, _consumed) = decode_hybrid(&bytes, 1, 8).unwrap();
        assert_eq!(values, vec![0, 0, 1, 0, 1, 1, 0, 1]);
    }

    #[test]
    fn truncated_bit_packed_run_is_an_error_not_a_panic() {
        // Header claims a bit-packed run but the payload is cut short.
        let bytes = [0x03u8];
        assert!(decode_hybrid(&bytes, 1, 8).is_err());
    }

    #[test]
    fn truncated_rle_run_value_is_an_error_not_a_panic() {
        // header = (5 << 1) | 0, bit_width=32 needs 4 value bytes but none follow.
        let bytes = [10u8];
        assert!(decode_hybrid(&bytes, 32, 5).is_err());
    }
}
