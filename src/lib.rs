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

//! A streaming, byte-range-aware reader for the Apache Parquet format.
//!
//! Unlike a reader built over `Read + Seek`, every module above [`source`]
//! talks to the file through the [`source::ByteSource`] trait: an opaque
//! `async fn slice(start, end)` that the caller backs with a local file, an
//! HTTP range request, or anything else that can serve bytes on demand.
//! Suspension only ever happens inside that call; footer parsing, page
//! decoding and Dremel assembly are synchronous and deterministic regardless
//! of the transport underneath.
//!
//! The pipeline from bytes to rows:
//!
//! 1. [`metadata`] reads the trailer and parses the Thrift-encoded
//!    `FileMetaData` ([`thrift`]).
//! 2. [`schema`] turns the flat `schema` array into a typed tree, recognizing
//!    the list/map conventions Dremel assembly needs.
//! 3. [`query::plan`] resolves a projection/filter/row-range request against
//!    that metadata into a coalesced set of byte-range fetches, skipping row
//!    groups that statistics rule out.
//! 4. [`column::reader`] decodes one column chunk's pages ([`encodings`],
//!    [`column::page`]), dereferencing dictionaries and converting physical
//!    values to their logical representation ([`logical`]).
//! 5. [`column::dremel`] reassembles the flat definition/repetition-level
//!    streams into nested [`value::Value`]s.
//! 6. [`query::engine`] drives the above end to end behind `read`/
//!    `read_chunks`/`query`, additionally applying [`query::filter`] and
//!    `orderBy`.
//!
//! [`geoparquet`] and [`compression`] are cross-cutting: the former marks
//! GeoParquet geometry columns during metadata parsing, the latter is the
//! caller-overridable decompression table every column chunk decode goes
//! through.

pub mod basic;
pub mod column;
pub mod compression;
pub mod encodings;
pub mod error;
pub mod geoparquet;
pub mod logical;
pub mod metadata;
pub mod query;
pub mod schema;
pub mod source;
pub mod thrift;
pub mod value;

pub use compression::{default_compressors, Compressors};
pub use error::{ParquetError, Result};
pub use logical::{LogicalValue, ParserTable};
pub use metadata::{read_metadata_from_buffer, read_metadata_from_source, FileMetaData, MetadataReadOptions};
pub use query::{parse_filter, query, read, read_chunks, FilterNode, PlanOptions, QueryPlan, ReadOptions, Row, INDEX_COLUMN};
pub use schema::{build_schema_tree, SchemaNode};
pub use source::{ByteSource, MemorySource, PrefetchedSource};
#[cfg(feature = "tokio")]
pub use source::FileSource;
pub use value::Value;
