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

//! Logical-type parsers (spec §4.J). The teacher has no logical-type layer
//! (`ordered_float`'s only use there is making PLAIN float/double values
//! hashable for its dictionary encoder); this module is grounded directly
//! in spec §4.J's conversion table and the float16/INT96 bit-level examples
//! in spec §8, using `serde_json` (already in the ambient stack, spec §9
//! "Dynamic maps") for the JSON conversion.

use std::sync::Arc;

use crate::basic::{ConvertedType, LogicalType, TimeUnit};
use crate::encodings::{Bytes, Int96, PhysicalValue};
use crate::error::{general_err, ParquetError, Result};
use crate::schema::SchemaNode;

/// A value after logical/converted-type conversion. Distinct from
/// `PhysicalValue`: e.g. a `PhysicalValue::Int32` holding days becomes a
/// `LogicalValue::Date`.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalValue {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Bytes),
    /// Days since the Unix epoch, as returned by `date_from_days`.
    Date(i64),
    /// Milliseconds since the Unix epoch, as returned by the `timestamp_from_*` parsers.
    TimestampMillis(i64),
    Decimal(f64),
    Json(serde_json::Value),
    Float16(f32),
    Geometry(Bytes),
    Geography(Bytes),
}

/// Caller-overridable conversion functions (spec §6, "ParserTable").
#[derive(Clone)]
pub struct ParserTable {
    pub timestamp_from_millis: Arc<dyn Fn(i64) -> i64 + Send + Sync>,
    pub timestamp_from_micros: Arc<dyn Fn(i64) -> i64 + Send + Sync>,
    pub timestamp_from_nanos: Arc<dyn Fn(i64) -> i64 + Send + Sync>,
    pub date_from_days: Arc<dyn Fn(i64) -> i64 + Send + Sync>,
    pub string_from_bytes: Arc<dyn Fn(&[u8]) -> Result<String> + Send + Sync>,
    pub geometry_from_bytes: Arc<dyn Fn(&[u8]) -> Bytes + Send + Sync>,
    pub geography_from_bytes: Arc<dyn Fn(&[u8]) -> Bytes + Send + Sync>,
}

impl Default for ParserTable {
    fn default() -> Self {
        Self {
            timestamp_from_millis: Arc::new(|ms| ms),
            timestamp_from_micros: Arc::new(|us| us.div_euclid(1_000)),
            timestamp_from_nanos: Arc::new(|ns| ns.div_euclid(1_000_000)),
            date_from_days: Arc::new(|d| d),
            string_from_bytes: Arc::new(|b| std::str::from_utf8(b).map(str::to_string).map_err(|e| general_err!("invalid utf-8 string: {}", e))),
            geometry_from_bytes: Arc::new(|b| Bytes::from(b)),
            geography_from_bytes: Arc::new(|b| Bytes::from(b)),
        }
    }
}

/// INT96 timestamp derivation (spec §4.J): `days = (value >> 64) -
/// 2440588` (the Julian-to-Unix epoch offset), `nanos` is the
/// nanoseconds-of-day stored in the low 64 bits. Negative values are not
/// guaranteed to round-trip (spec §9, "INT96 nanos sign" open question).
fn int96_to_millis(v: Int96) -> i64 {
    const JULIAN_DAY_OF_EPOCH: i64 = 2440588;
    let days = v.hi as i64 - JULIAN_DAY_OF_EPOCH;
    let nanos = v.lo / 1_000_000;
    days * 86_400_000 + nanos as i64
}

/// IEEE 754 binary16 decode (spec §4.J, exact edge cases checked in §8).
pub fn decode_float16(bits: u16) -> f32 {
    let sign = if bits & 0x8000 != 0 { -1.0f32 } else { 1.0f32 };
    let exp = (bits >> 10) & 0x1F;
    let frac = (bits & 0x3FF) as f32;
    if exp == 0 {
        sign * 2f32.powi(-14) * (frac / 1024.0)
    } else if exp == 31 {
        if frac != 0.0 {
            f32::NAN
        } else {
            sign * f32::INFINITY
        }
    } else {
        sign * 2f32.powi(exp as i32 - 15) * (1.0 + frac / 1024.0)
    }
}

/// Parses a big-endian two's-complement byte array (as used by DECIMAL
/// statistics/values) into an `i128`. Decimal precisions requiring more
/// than 16 bytes are not supported.
fn decimal_bytes_to_i128(bytes: &[u8]) -> Result<i128> {
    if bytes.is_empty() {
        return Err(general_err!("empty DECIMAL byte array"));
    }
    if bytes.len() > 16 {
        return Err(general_err!("DECIMAL byte array of {} bytes exceeds the supported 16-byte width", bytes.len()));
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut buf = [if negative { 0xFFu8 } else { 0u8 }; 16];
    let start = 16 - bytes.len();
    buf[start..].copy_from_slice(bytes);
    Ok(i128::from_be_bytes(buf))
}

/// Converts one decoded physical value to its logical representation
/// (spec §4.J). `utf8` controls whether a plain BYTE_ARRAY with no
/// converted/logical type is treated as a UTF-8 string.
pub fn convert(value: PhysicalValue, leaf: &SchemaNode, parsers: &ParserTable, utf8: bool) -> Result<LogicalValue> {
    if let Some(logical) = &leaf.logical_type {
        if let Some(v) = convert_logical(&value, logical, parsers)? {
            return Ok(v);
        }
    }
    if let Some(converted) = leaf.converted_type {
        if let Some(v) = convert_converted(&value, converted, leaf, parsers)? {
            return Ok(v);
        }
    }

    Ok(match value {
        PhysicalValue::Boolean(b) => LogicalValue::Boolean(b),
        PhysicalValue::Int32(v) => LogicalValue::Int32(v),
        PhysicalValue::Int64(v) => LogicalValue::Int64(v),
        PhysicalValue::Float(v) => LogicalValue::Float(v),
        PhysicalValue::Double(v) => LogicalValue::Double(v),
        PhysicalValue::Int96(v) => LogicalValue::TimestampMillis((parsers.timestamp_from_millis)(int96_to_millis(v))),
        PhysicalValue::Bytes(b) => {
            if utf8 {
                LogicalValue::String((parsers.string_from_bytes)(&b)?)
            } else {
                LogicalValue::Bytes(b)
            }
        }
    })
}

fn convert_logical(value: &PhysicalValue, logical: &LogicalType, parsers: &ParserTable) -> Result<Option<LogicalValue>> {
    Ok(match logical {
        LogicalType::String => Some(match value {
            PhysicalValue::Bytes(b) => LogicalValue::String((parsers.string_from_bytes)(b)?),
            other => return Err(general_err!("STRING logical type on non-byte-array value {:?}", other)),
        }),
        LogicalType::Integer { bit_width, is_signed } => Some(reinterpret_integer(value, *bit_width, *is_signed)?),
        LogicalType::Timestamp { unit, .. } => Some(match (value, unit) {
            (PhysicalValue::Int64(v), TimeUnit::Millis) => LogicalValue::TimestampMillis((parsers.timestamp_from_millis)(*v)),
            (PhysicalValue::Int64(v), TimeUnit::Micros) => LogicalValue::TimestampMillis((parsers.timestamp_from_micros)(*v)),
            (PhysicalValue::Int64(v), TimeUnit::Nanos) => LogicalValue::TimestampMillis((parsers.timestamp_from_nanos)(*v)),
            (other, _) => return Err(general_err!("TIMESTAMP logical type on non-int64 value {:?}", other)),
        }),
        LogicalType::Float16 => Some(match value {
            PhysicalValue::Bytes(b) if b.len() == 2 => LogicalValue::Float16(decode_float16(u16::from_le_bytes([b[0], b[1]]))),
            other => return Err(general_err!("FLOAT16 logical type on value {:?}", other)),
        }),
        LogicalType::Geometry { .. } => Some(match value {
            PhysicalValue::Bytes(b) => LogicalValue::Geometry((parsers.geometry_from_bytes)(b)),
            other => return Err(general_err!("GEOMETRY logical type on non-byte-array value {:?}", other)),
        }),
        LogicalType::Geography { .. } => Some(match value {
            PhysicalValue::Bytes(b) => LogicalValue::Geography((parsers.geography_from_bytes)(b)),
            other => return Err(general_err!("GEOGRAPHY logical type on non-byte-array value {:?}", other)),
        }),
        LogicalType::Date => Some(match value {
            PhysicalValue::Int32(days) => LogicalValue::Date((parsers.date_from_days)(*days as i64)),
            other => return Err(general_err!("DATE logical type on non-int32 value {:?}", other)),
        }),
        LogicalType::Decimal { scale, .. } => Some(convert_decimal(value, *scale)?),
        LogicalType::Json => Some(convert_json(value, parsers)?),
        LogicalType::Bson => return Err(ParquetError::UnsupportedConversion("BSON".to_string())),
        // MAP/LIST/ENUM/UNKNOWN/UUID/GEOMETRY crs et al. carry no leaf-value conversion of their own.
        _ => None,
    })
}

fn convert_converted(value: &PhysicalValue, converted: ConvertedType, leaf: &SchemaNode, parsers: &ParserTable) -> Result<Option<LogicalValue>> {
    Ok(match converted {
        ConvertedType::Utf8 => Some(match value {
            PhysicalValue::Bytes(b) => LogicalValue::String((parsers.string_from_bytes)(b)?),
            other => return Err(general_err!("UTF8 converted type on non-byte-array value {:?}", other)),
        }),
        ConvertedType::Date => Some(match value {
            PhysicalValue::Int32(days) => LogicalValue::Date((parsers.date_from_days)(*days as i64)),
            other => return Err(general_err!("DATE converted type on non-int32 value {:?}", other)),
        }),
        ConvertedType::TimestampMillis => Some(match value {
            PhysicalValue::Int64(v) => LogicalValue::TimestampMillis((parsers.timestamp_from_millis)(*v)),
            other => return Err(general_err!("TIMESTAMP_MILLIS converted type on non-int64 value {:?}", other)),
        }),
        ConvertedType::TimestampMicros => Some(match value {
            PhysicalValue::Int64(v) => LogicalValue::TimestampMillis((parsers.timestamp_from_micros)(*v)),
            other => return Err(general_err!("TIMESTAMP_MICROS converted type on non-int64 value {:?}", other)),
        }),
        ConvertedType::Decimal => Some(convert_decimal(value, leaf.scale.unwrap_or(0))?),
        ConvertedType::Json => Some(convert_json(value, parsers)?),
        ConvertedType::Bson => return Err(ParquetError::UnsupportedConversion("BSON".to_string())),
        ConvertedType::Interval => return Err(ParquetError::UnsupportedConversion("INTERVAL".to_string())),
        ConvertedType::Uint32 => Some(match value {
            PhysicalValue::Int32(v) => LogicalValue::UInt32(*v as u32),
            other => return Err(general_err!("UINT_32 converted type on non-int32 value {:?}", other)),
        }),
        ConvertedType::Uint64 => Some(match value {
            PhysicalValue::Int64(v) => LogicalValue::UInt64(*v as u64),
            other => return Err(general_err!("UINT_64 converted type on non-int64 value {:?}", other)),
        }),
        // ENUM/LIST/MAP/MAP_KEY_VALUE/*_8/*_16 reinterpretations and TIME_* fall through to the
        // raw PhysicalValue; TIME support is left to a caller-supplied ParserTable override.
        _ => None,
    })
}

fn convert_decimal(value: &PhysicalValue, scale: i32) -> Result<LogicalValue> {
    let unscaled = match value {
        PhysicalValue::Int32(v) => *v as i128,
        PhysicalValue::Int64(v) => *v as i128,
        PhysicalValue::Bytes(b) => decimal_bytes_to_i128(b)?,
        other => return Err(general_err!("DECIMAL conversion on unsupported value {:?}", other)),
    };
    Ok(LogicalValue::Decimal(unscaled as f64 * 10f64.powi(-scale)))
}

fn convert_json(value: &PhysicalValue, parsers: &ParserTable) -> Result<LogicalValue> {
    let bytes = match value {
        PhysicalValue::Bytes(b) => b,
        other => return Err(general_err!("JSON conversion on non-byte-array value {:?}", other)),
    };
    let s = (parsers.string_from_bytes)(bytes)?;
    let parsed = serde_json::from_str(&s).map_err(|e| general_err!("invalid JSON payload: {}", e))?;
    Ok(LogicalValue::Json(parsed))
}

fn reinterpret_integer(value: &PhysicalValue, bit_width: u8, is_signed: bool) -> Result<LogicalValue> {
    Ok(match (value, is_signed) {
        (PhysicalValue::Int32(v), true) => LogicalValue::Int32(*v),
        (PhysicalValue::Int32(v), false) => LogicalValue::UInt32(*v as u32),
        (PhysicalValue::Int64(v), true) => LogicalValue::Int64(*v),
        (PhysicalValue::Int64(v), false) => LogicalValue::UInt64(*v as u64),
        (other, _) => return Err(general_err!("INTEGER({}) logical type on unsupported value {:?}", bit_width, other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float16_matches_spec_edge_cases() {
        assert_eq!(decode_float16(0x0000), 0.0);
        assert!(decode_float16(0x8000) == 0.0 && decode_float16(0x8000).is_sign_negative());
        assert_eq!(decode_float16(0x3C00), 1.0);
        assert_eq!(decode_float16(0x7C00), f32::INFINITY);
        assert_eq!(decode_float16(0xFC00), f32::NEG_INFINITY);
        assert!(decode_float16(0x7E00).is_nan());
        let expected = 2f32.powi(-14) * (1023.0 / 1024.0);
        assert!((decode_float16(0x03FF) - expected).abs() < 1e-12);
    }

    #[test]
    fn int96_derives_millis_from_julian_day_and_nanos() {
        // Unix epoch (1970-01-01) is Julian day 2440588, time-of-day 0.
        let millis = int96_to_millis(Int96 { lo: 0, hi: 2440588 });
        assert_eq!(millis, 0);
        let one_day_later = int96_to_millis(Int96 { lo: 0, hi: 2440589 });
        assert_eq!(one_day_later, 86_400_000);
    }

    #[test]
    fn decimal_from_int32_applies_scale() {
        let v = convert_decimal(&PhysicalValue::Int32(12345), 2).unwrap();
        assert_eq!(v, LogicalValue::Decimal(123.45));
    }

    #[test]
    fn decimal_from_bytes_is_twos_complement() {
        let v = convert_decimal(&PhysicalValue::Bytes(Bytes::from(&(-12345i32).to_be_bytes()[..])), 2).unwrap();
        assert_eq!(v, LogicalValue::Decimal(-123.45));
    }
}
