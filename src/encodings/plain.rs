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

//! PLAIN decoder (spec §4.E). Grounded on the teacher's `PlainDecoder`
//! (`encodings/decoding.rs`), rewritten to dispatch on the runtime
//! `basic::Type` instead of the teacher's `DataType` generic and to produce
//! `PhysicalValue`s directly.

use byteorder::{ByteOrder, LittleEndian};

use super::bit_util::unpack_bit_packed;
use super::{Bytes, Int96, PhysicalValue};
use crate::basic::Type;
use crate::error::{eof_err, Result};

/// Decodes `num_values` PLAIN-encoded values of physical type `ty`.
/// `type_length` is only consulted for `FixedLenByteArray`. Returns the
/// decoded values and the number of bytes of `data` consumed.
pub fn decode(data: &[u8], ty: Type, num_values: usize, type_length: i32) -> Result<(Vec<PhysicalValue>, usize)> {
    match ty {
        Type::Boolean => {
            let values = unpack_bit_packed(data, 1, num_values)?;
            let consumed = (num_values + 7) / 8;
            Ok((values.into_iter().map(|v| PhysicalValue::Boolean(v != 0)).collect(), consumed))
        }
        Type::Int32 => decode_fixed(data, num_values, 4, |b| PhysicalValue::Int32(LittleEndian::read_i32(b))),
        Type::Int64 => decode_fixed(data, num_values, 8, |b| PhysicalValue::Int64(LittleEndian::read_i64(b))),
        Type::Float => decode_fixed(data, num_values, 4, |b| PhysicalValue::Float(LittleEndian::read_f32(b))),
        Type::Double => decode_fixed(data, num_values, 8, |b| PhysicalValue::Double(LittleEndian::read_f64(b))),
        Type::Int96 => decode_fixed(data, num_values, 12, |b| {
            let lo = LittleEndian::read_u64(&b[0..8]);
            let hi = LittleEndian::read_i32(&b[8..12]);
            PhysicalValue::Int96(Int96 { lo, hi })
        }),
        Type::ByteArray => decode_byte_array(data, num_values),
        Type::FixedLenByteArray => {
            if type_length <= 0 {
                return Err(eof_err!("FIXED_LEN_BYTE_ARRAY requires a positive type_length"));
            }
            decode_fixed(data, num_values, type_length as usize, |b| PhysicalValue::Bytes(Bytes::from(b)))
        }
    }
}

fn decode_fixed(
    data: &[u8],
    num_values: usize,
    width: usize,
    convert: impl Fn(&[u8]) -> PhysicalValue,
) -> Result<(Vec<PhysicalValue>, usize)> {
    let needed = width * num_values;
    if data.len() < needed {
        return Err(eof_err!(
            "PLAIN data too short: need {} bytes for {} values of width {}, have {}",
            needed,
            num_values,
            width,
            data.len()
        ));
    }
    let mut out = Vec::with_capacity(num_values);
    for i in 0..num_values {
        out.push(convert(&data[i * width..(i + 1) * width]));
    }
    Ok((out, needed))
}

fn decode_byte_array(data: &[u8], num_values: usize) -> Result<(Vec<PhysicalValue>, usize)> {
    let mut pos = 0usize;
    let mut out = Vec::with_capacity(num_values);
    for _ in 0..num_values {
        if pos + 4 > data.len() {
            return Err(eof_err!("truncated BYTE_ARRAY length prefix"));
        }
        let len = LittleEndian::read_u32(&data[pos..pos + 4]) as usize;
        pos += 4;
        if pos + len > data.len() {
            return Err(eof_err!("truncated BYTE_ARRAY payload"));
        }
        out.push(PhysicalValue::Bytes(Bytes::from(&data[pos..pos + len])));
        pos += len;
    }
    Ok((out, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_int32_little_endian() {
        let bytes = [1, 0, 0, 0, 2, 0, 0, 0];
        let (values, consumed) = decode(&bytes, Type::Int32, 2, 0).unwrap();
        assert_eq!(values, vec![PhysicalValue::Int32(1), PhysicalValue::Int32(2)]);
        assert_eq!(consumed, 8);
    }

    #[test]
    fn decodes_byte_array_with_length_prefix() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(b"abc");
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(b"de");
        let (values, consumed) = decode(&bytes, Type::ByteArray, 2, 0).unwrap();
        match (&values[0], &values[1]) {
            (PhysicalValue::Bytes(a), PhysicalValue::Bytes(b)) => {
                assert_eq!(&a[..], b"abc");
                assert_eq!(&b[..], b"de");
            }
            _ => panic!("expected bytes"),
        }
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn decodes_int96_as_unsigned_low_signed_high() {
        let mut bytes = vec![];
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(&(-1i32).to_le_bytes());
        let (values, _consumed) = decode(&bytes, Type::Int96, 1, 0).unwrap();
        assert_eq!(values[0], PhysicalValue::Int96(Int96 { lo: u64::MAX, hi: -1 }));
    }

    #[test]
    fn decodes_boolean_bits_lsb_first() {
        let bytes = [0b10110100u8];
        let (values, consumed) = decode(&bytes, Type::Boolean, 8, 0).unwrap();
        let bools: Vec<bool> = values
            .into_iter()
            .map(|v| matches!(v, PhysicalValue::Boolean(true)))
            .collect();
        assert_eq!(bools, vec![false, false, true, false, true, true, false, true]);
        assert_eq!(consumed, 1);
    }
}
