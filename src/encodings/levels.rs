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

//! Definition/repetition level decoding (spec §4.E). Grounded on the
//! teacher's `LevelDecoder` (`encodings/levels.rs`), which dispatches
//! between a V1-style length-prefixed section and a V2 explicit-length
//! section; here the two entry points are split out explicitly since V1 and
//! V2 pages carry the length information in different places.

use byteorder::{ByteOrder, LittleEndian};

use super::bit_util::bit_width;
use super::rle::decode_hybrid;
use crate::error::{eof_err, Result};

/// Reads one data-page-v1 level section: `[u32 length][RLE/BIT_PACKED bytes]`.
/// Returns the decoded levels and the number of bytes consumed from `data`
/// (the 4-byte length prefix plus the section itself).
pub fn decode_v1_section(data: &[u8], max_level: i32, num_values: usize) -> Result<(Vec<u32>, usize)> {
    if max_level == 0 {
        return Ok((vec![0; num_values], 0));
    }
    if data.len() < 4 {
        return Err(eof_err!("truncated level section length prefix"));
    }
    let len = LittleEndian::read_u32(&data[0..4]) as usize;
    if data.len() < 4 + len {
        return Err(eof_err!("truncated level section body"));
    }
    let width = bit_width(max_level);
    let (levels, _consumed) = decode_hybrid(&data[4..4 + len], width, num_values)?;
    Ok((levels, 4 + len))
}

/// Reads a data-page-v2 level section of exactly `byte_len` bytes; no length
/// prefix, the byte length comes from the page header instead.
pub fn decode_v2_section(data: &[u8], max_level: i32, num_values: usize, byte_len: usize) -> Result<Vec<u32>> {
    if max_level == 0 {
        return Ok(vec![0; num_values]);
    }
    if data.len() < byte_len {
        return Err(eof_err!("truncated v2 level section"));
    }
    let width = bit_width(max_level);
    let (levels, _consumed) = decode_hybrid(&data[..byte_len], width, num_values)?;
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_section_with_zero_max_level_is_trivial() {
        let (levels, consumed) = decode_v1_section(&[], 0, 5).unwrap();
        assert_eq!(levels, vec![0; 5]);
        assert_eq!(consumed, 0);
    }

    #[test]
    fn v1_section_respects_length_prefix() {
        // bit_width(1) = 1; one bit-packed group of 8 values from 0b10110100.
        let mut bytes = vec![];
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.push(0x03);
        bytes.push(0b10110100);
        let (levels, consumed) = decode_v1_section(&bytes, 1, 8).unwrap();
        assert_eq!(levels, vec![0, 0, 1, 0, 1, 1, 0, 1]);
        assert_eq!(consumed, 6);
    }

    #[test]
    fn v2_section_has_no_prefix() {
        let bytes = [0x03u8, 0b10110100];
        let levels = decode_v2_section(&bytes, 1, 8, 2).unwrap();
        assert_eq!(levels, vec![0, 0, 1, 0, 1, 1, 0, 1]);
    }
}
