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

use quick_error::quick_error;

use crate::basic::Encoding;

quick_error! {
    /// The error taxonomy for the crate (spec §7).
    #[derive(Debug)]
    pub enum ParquetError {
        /// Trailer or header magic was not `PAR1`.
        InvalidMagic(detail: String) {
            display("invalid parquet magic: {}", detail)
        }
        /// Declared metadata length exceeds the number of bytes in the file.
        MetadataTooLarge(detail: String) {
            display("metadata too large: {}", detail)
        }
        /// Page or value bytes shorter than declared.
        Truncated(detail: String) {
            display("truncated input: {}", detail)
        }
        /// A Thrift type id this core does not implement (MAP, SET, UUID, ...).
        UnsupportedType(detail: String) {
            display("unsupported thrift type: {}", detail)
        }
        /// Codec not present in the caller-supplied compressor table.
        UnsupportedCodec(detail: String) {
            display("unsupported codec: {}", detail)
        }
        /// Page encoding this core does not implement.
        UnsupportedEncoding(encoding: Encoding) {
            display("unsupported encoding: {:?}", encoding)
        }
        /// A page's declared compressed size exceeds the configured guard.
        PageTooLarge(detail: String) {
            display("page too large: {}", detail)
        }
        /// A page's encoding is not among the chunk metadata's declared `encodings`.
        EncodingMismatch(detail: String) {
            display("encoding mismatch: {}", detail)
        }
        /// BSON/INTERVAL converted types, explicitly unsupported by §4.J.
        UnsupportedConversion(detail: String) {
            display("unsupported logical conversion: {}", detail)
        }
        /// Requested projection or filter column does not exist.
        ColumnNotFound(name: String) {
            display("column not found: {}", name)
        }
        /// Schema tree invariant violated.
        SchemaConflict(detail: String) {
            display("schema conflict: {}", detail)
        }
        /// `rowStart < 0` or `rowStart > rowEnd`.
        OutOfRange(detail: String) {
            display("out of range: {}", detail)
        }
        /// Propagated verbatim from `ByteSource::slice`.
        Transport(detail: String) {
            display("transport error: {}", detail)
        }
        /// Catch-all for invariant violations not covered by a dedicated variant.
        General(detail: String) {
            display("{}", detail)
        }
    }
}

pub type Result<T> = std::result::Result<T, ParquetError>;

macro_rules! general_err {
    ($fmt:expr) => (crate::error::ParquetError::General(format!($fmt)));
    ($fmt:expr, $($args:expr),*) => (crate::error::ParquetError::General(format!($fmt, $($args),*)));
}

macro_rules! eof_err {
    ($fmt:expr) => (crate::error::ParquetError::Truncated(format!($fmt)));
    ($fmt:expr, $($args:expr),*) => (crate::error::ParquetError::Truncated(format!($fmt, $($args),*)));
}

pub(crate) use general_err;
pub(crate) use eof_err;
