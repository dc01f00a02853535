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

//! Canonical enums shared across the metadata, schema and encoding layers.

use std::fmt;

use crate::error::{general_err, ParquetError, Result};

/// Physical storage type of a leaf column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Boolean,
    Int32,
    Int64,
    Int96,
    Float,
    Double,
    ByteArray,
    FixedLenByteArray,
}

impl Type {
    pub fn from_thrift_i32(v: i32) -> Result<Self> {
        Ok(match v {
            0 => Type::Boolean,
            1 => Type::Int32,
            2 => Type::Int64,
            3 => Type::Int96,
            4 => Type::Float,
            5 => Type::Double,
            6 => Type::ByteArray,
            7 => Type::FixedLenByteArray,
            other => return Err(general_err!("unknown physical type id {}", other)),
        })
    }
}

/// Field repetition: REQUIRED/OPTIONAL/REPEATED ancestors drive def/rep levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repetition {
    Required,
    Optional,
    Repeated,
}

impl Repetition {
    pub fn from_thrift_i32(v: i32) -> Result<Self> {
        Ok(match v {
            0 => Repetition::Required,
            1 => Repetition::Optional,
            2 => Repetition::Repeated,
            other => return Err(general_err!("unknown repetition id {}", other)),
        })
    }
}

/// Page/value encodings (spec §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Plain,
    PlainDictionary,
    Rle,
    BitPacked,
    DeltaBinaryPacked,
    DeltaLengthByteArray,
    DeltaByteArray,
    RleDictionary,
    ByteStreamSplit,
}

impl Encoding {
    pub fn from_thrift_i32(v: i32) -> Result<Self> {
        Ok(match v {
            0 => Encoding::Plain,
            2 => Encoding::PlainDictionary,
            3 => Encoding::Rle,
            4 => Encoding::BitPacked,
            5 => Encoding::DeltaBinaryPacked,
            6 => Encoding::DeltaLengthByteArray,
            7 => Encoding::DeltaByteArray,
            8 => Encoding::RleDictionary,
            9 => Encoding::ByteStreamSplit,
            other => return Err(general_err!("unknown encoding id {}", other)),
        })
    }

    pub fn is_dictionary(self) -> bool {
        matches!(self, Encoding::PlainDictionary | Encoding::RleDictionary)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Compression codec name, used both as a Thrift enum and as a key into the
/// caller-supplied `Compressors` table (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {
    Uncompressed,
    Snappy,
    Gzip,
    Lzo,
    Brotli,
    Lz4,
    Zstd,
    Lz4Raw,
}

impl Compression {
    pub fn from_thrift_i32(v: i32) -> Result<Self> {
        Ok(match v {
            0 => Compression::Uncompressed,
            1 => Compression::Snappy,
            2 => Compression::Gzip,
            3 => Compression::Lzo,
            4 => Compression::Brotli,
            5 => Compression::Lz4,
            6 => Compression::Zstd,
            7 => Compression::Lz4Raw,
            other => return Err(general_err!("unknown codec id {}", other)),
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Compression::Uncompressed => "UNCOMPRESSED",
            Compression::Snappy => "SNAPPY",
            Compression::Gzip => "GZIP",
            Compression::Lzo => "LZO",
            Compression::Brotli => "BROTLI",
            Compression::Lz4 => "LZ4",
            Compression::Zstd => "ZSTD",
            Compression::Lz4Raw => "LZ4_RAW",
        }
    }
}

/// Legacy (pre logical-type) converted types, decoded from Thrift field 6 of
/// `SchemaElement`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvertedType {
    Utf8,
    Map,
    MapKeyValue,
    List,
    Enum,
    Decimal,
    Date,
    TimeMillis,
    TimeMicros,
    TimestampMillis,
    TimestampMicros,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Json,
    Bson,
    Interval,
}

impl ConvertedType {
    pub fn from_thrift_i32(v: i32) -> Result<Self> {
        use ConvertedType::*;
        Ok(match v {
            0 => Utf8,
            1 => Map,
            2 => MapKeyValue,
            3 => List,
            4 => Enum,
            5 => Decimal,
            6 => Date,
            7 => TimeMillis,
            8 => TimeMicros,
            9 => TimestampMillis,
            10 => TimestampMicros,
            11 => Uint8,
            12 => Uint16,
            13 => Uint32,
            14 => Uint64,
            15 => Int8,
            16 => Int16,
            17 => Int32,
            18 => Int64,
            19 => Json,
            20 => Bson,
            21 => Interval,
            other => return Err(general_err!("unknown converted type id {}", other)),
        })
    }
}

/// Modern (nested) logical type, decoded from Thrift field 10 of
/// `SchemaElement`. Only the variants the core's `logical` module (§4.J)
/// needs to discriminate are kept structured; the rest collapse to `Other`.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalType {
    String,
    Map,
    List,
    Enum,
    Decimal { scale: i32, precision: i32 },
    Date,
    Time { is_adjusted_to_utc: bool, unit: TimeUnit },
    Timestamp { is_adjusted_to_utc: bool, unit: TimeUnit },
    Integer { bit_width: u8, is_signed: bool },
    Unknown,
    Json,
    Bson,
    Uuid,
    Float16,
    Geometry { crs: Option<String> },
    Geography { crs: Option<String>, edges: Option<String> },
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Millis,
    Micros,
    Nanos,
}

/// `Err(ParquetError::SchemaConflict)` helper used by the schema builder;
/// kept here instead of in `schema` to avoid a dependency cycle on a trivial
/// helper.
pub fn schema_conflict(msg: impl Into<String>) -> ParquetError {
    ParquetError::SchemaConflict(msg.into())
}
