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

//! PLAIN_DICTIONARY/RLE_DICTIONARY index decoder (spec §4.E). Grounded on
//! the teacher's `DictDecoder` (`encodings/decoding.rs`), which reads an
//! embedded bit-width byte ahead of the RLE/BIT_PACKED hybrid stream; here
//! it hands off to `rle::decode_hybrid` rather than a stateful
//! bit-reader object.

use super::rle::decode_hybrid;
use crate::error::{eof_err, Result};

/// Decodes `num_values` dictionary indices. The first byte of `data` is the
/// bit width of the indices; the remainder is an RLE/BIT_PACKED hybrid
/// stream. Returns the indices and the number of bytes of `data` consumed.
pub fn decode_indices(data: &[u8], num_values: usize) -> Result<(Vec<u32>, usize)> {
    if data.is_empty() {
        return Err(eof_err!("dictionary index stream missing bit-width byte"));
    }
    let bit_width = data[0];
    let (indices, consumed) = decode_hybrid(&data[1..], bit_width, num_values)?;
    Ok((indices, 1 + consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_bit_width_then_hybrid_stream() {
        // bit_width byte = 1, then bit-packed header 0x03 + one data byte.
        let bytes = [1u8, 0x03, 0b10110100];
        let (indices, consumed) = decode_indices(&bytes, 8).unwrap();
        assert_eq!(indices, vec![0, 0, 1, 0, 1, 1, 0, 1]);
        assert_eq!(consumed, 3);
    }
}
