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

//! Page header parsing and the page cursor (spec §4.E). Page headers are
//! Thrift-encoded directly in the byte stream, using the same stable field
//! ids as `FileMetaData` (spec §4.C); grounded on the teacher's
//! `SerializedPageReader` (`file/reader.rs`), which owns an analogous cursor
//! over a `BufReader<File>` rather than an in-memory slice.

use std::collections::HashMap;

use crate::basic::{Compression, Encoding};
use crate::error::{eof_err, general_err, ParquetError, Result};
use crate::metadata::Statistics;
use crate::thrift::{read_struct, ThriftValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    DataPage,
    IndexPage,
    DictionaryPage,
    DataPageV2,
}

impl PageType {
    fn from_thrift_i32(v: i32) -> Result<Self> {
        Ok(match v {
            0 => PageType::DataPage,
            1 => PageType::IndexPage,
            2 => PageType::DictionaryPage,
            3 => PageType::DataPageV2,
            other => return Err(general_err!("unknown page type id {}", other)),
        })
    }
}

#[derive(Debug, Clone)]
pub struct DataPageHeader {
    pub num_values: i32,
    pub encoding: Encoding,
    pub definition_level_encoding: Encoding,
    pub repetition_level_encoding: Encoding,
    pub statistics: Option<Statistics>,
}

#[derive(Debug, Clone)]
pub struct DataPageHeaderV2 {
    pub num_values: i32,
    pub num_nulls: i32,
    pub num_rows: i32,
    pub encoding: Encoding,
    pub definition_levels_byte_length: i32,
    pub repetition_levels_byte_length: i32,
    pub is_compressed: bool,
    pub statistics: Option<Statistics>,
}

#[derive(Debug, Clone)]
pub struct DictionaryPageHeader {
    pub num_values: i32,
    pub encoding: Encoding,
    pub is_sorted: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct PageHeader {
    pub page_type: PageType,
    pub uncompressed_page_size: i32,
    pub compressed_page_size: i32,
    pub data_page_header: Option<DataPageHeader>,
    pub data_page_header_v2: Option<DataPageHeaderV2>,
    pub dictionary_page_header: Option<DictionaryPageHeader>,
}

fn fields(value: &ThriftValue) -> Result<&HashMap<i16, ThriftValue>> {
    value.as_struct().ok_or_else(|| general_err!("expected a Thrift struct"))
}

fn get<'a>(f: &'a HashMap<i16, ThriftValue>, id: i16) -> Option<&'a ThriftValue> {
    f.get(&id)
}

fn req_i32(f: &HashMap<i16, ThriftValue>, id: i16, what: &str) -> Result<i32> {
    get(f, id).and_then(|v| v.as_i32()).ok_or_else(|| general_err!("missing required field {}", what))
}

fn project_statistics(value: &ThriftValue) -> Result<Statistics> {
    let f = fields(value)?;
    Ok(Statistics {
        max: get(f, 1).and_then(|v| v.as_binary()).map(|b| b.to_vec()),
        min: get(f, 2).and_then(|v| v.as_binary()).map(|b| b.to_vec()),
        null_count: get(f, 3).and_then(|v| v.as_i64()),
        distinct_count: get(f, 4).and_then(|v| v.as_i64()),
        max_value: get(f, 5).and_then(|v| v.as_binary()).map(|b| b.to_vec()),
        min_value: get(f, 6).and_then(|v| v.as_binary()).map(|b| b.to_vec()),
        is_max_value_exact: get(f, 7).and_then(|v| v.as_bool()),
        is_min_value_exact: get(f, 8).and_then(|v| v.as_bool()),
    })
}

fn project_data_page_header(value: &ThriftValue) -> Result<DataPageHeader> {
    let f = fields(value)?;
    Ok(DataPageHeader {
        num_values: req_i32(f, 1, "DataPageHeader.num_values")?,
        encoding: Encoding::from_thrift_i32(req_i32(f, 2, "DataPageHeader.encoding")?)?,
        definition_level_encoding: Encoding::from_thrift_i32(req_i32(f, 3, "DataPageHeader.definition_level_encoding")?)?,
        repetition_level_encoding: Encoding::from_thrift_i32(req_i32(f, 4, "DataPageHeader.repetition_level_encoding")?)?,
        statistics: get(f, 5).map(project_statistics).transpose()?,
    })
}

fn project_data_page_header_v2(value: &ThriftValue) -> Result<DataPageHeaderV2> {
    let f = fields(value)?;
    Ok(DataPageHeaderV2 {
        num_values: req_i32(f, 1, "DataPageHeaderV2.num_values")?,
        num_nulls: req_i32(f, 2, "DataPageHeaderV2.num_nulls")?,
        num_rows: req_i32(f, 3, "DataPageHeaderV2.num_rows")?,
        encoding: Encoding::from_thrift_i32(req_i32(f, 4, "DataPageHeaderV2.encoding")?)?,
        definition_levels_byte_length: req_i32(f, 5, "DataPageHeaderV2.definition_levels_byte_length")?,
        repetition_levels_byte_length: req_i32(f, 6, "DataPageHeaderV2.repetition_levels_byte_length")?,
        is_compressed: get(f, 7).and_then(|v| v.as_bool()).unwrap_or(true),
        statistics: get(f, 8).map(project_statistics).transpose()?,
    })
}

fn project_dictionary_page_header(value: &ThriftValue) -> Result<DictionaryPageHeader> {
    let f = fields(value)?;
    Ok(DictionaryPageHeader {
        num_values: req_i32(f, 1, "DictionaryPageHeader.num_values")?,
        encoding: Encoding::from_thrift_i32(req_i32(f, 2, "DictionaryPageHeader.encoding")?)?,
        is_sorted: get(f, 3).and_then(|v| v.as_bool()),
    })
}

fn project_page_header(value: &ThriftValue) -> Result<PageHeader> {
    let f = fields(value)?;
    Ok(PageHeader {
        page_type: PageType::from_thrift_i32(req_i32(f, 1, "PageHeader.type")?)?,
        uncompressed_page_size: req_i32(f, 2, "PageHeader.uncompressed_page_size")?,
        compressed_page_size: req_i32(f, 3, "PageHeader.compressed_page_size")?,
        data_page_header: get(f, 5).map(project_data_page_header).transpose()?,
        dictionary_page_header: get(f, 7).map(project_dictionary_page_header).transpose()?,
        data_page_header_v2: get(f, 8).map(project_data_page_header_v2).transpose()?,
    })
}

/// Parses one `PageHeader` starting at the beginning of `buf`. Returns the
/// header and the number of bytes it occupied.
pub fn parse_page_header(buf: &[u8]) -> Result<(PageHeader, usize)> {
    let (value, consumed) = read_struct(buf)?;
    Ok((project_page_header(&value)?, consumed))
}

/// A lazy cursor over the pages within one column chunk's physical byte
/// range (spec §4.E: "a lazy cursor yielding ... triples until the
/// compressed byte range is exhausted").
pub struct PageCursor<'a> {
    data: &'a [u8],
    pos: usize,
    max_page_bytes: u64,
}

impl<'a> PageCursor<'a> {
    pub fn new(data: &'a [u8], max_page_bytes: u64) -> Self {
        Self { data, pos: 0, max_page_bytes }
    }

    /// Parses the next page header and returns it with a slice over its
    /// (still compressed) payload, or `None` once `data` is exhausted.
    pub fn next_page(&mut self) -> Result<Option<(PageHeader, &'a [u8])>> {
        if self.pos >= self.data.len() {
            return Ok(None);
        }
        let (header, header_len) = parse_page_header(&self.data[self.pos..])?;
        if header.compressed_page_size < 0 || header.uncompressed_page_size < 0 {
            return Err(general_err!("page declares a negative size"));
        }
        if header.compressed_page_size as u64 > self.max_page_bytes {
            return Err(ParquetError::PageTooLarge(format!(
                "page of {} compressed bytes exceeds the {}-byte guard",
                header.compressed_page_size, self.max_page_bytes
            )));
        }
        let start = self.pos + header_len;
        let end = start + header.compressed_page_size as usize;
        if end > self.data.len() {
            return Err(eof_err!(
                "page header claims {} compressed bytes but only {} remain in the chunk",
                header.compressed_page_size,
                self.data.len() - start
            ));
        }
        let payload = &self.data[start..end];
        self.pos = end;
        Ok(Some((header, payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn struct_bytes(fields: &[u8]) -> Vec<u8> {
        let mut out = fields.to_vec();
        out.push(0); // STOP
        out
    }

    fn zigzag_field(delta: u8, type_id: u8, value: i32) -> Vec<u8> {
        let mut out = vec![(delta << 4) | type_id];
        let z = ((value << 1) ^ (value >> 31)) as u32;
        let mut v = z as u64;
        loop {
            let mut b = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                b |= 0x80;
            }
            out.push(b);
            if v == 0 {
                break;
            }
        }
        out
    }

    #[test]
    fn parses_minimal_data_page_header() {
        // DataPageHeader: num_values=5 (field 1, I32), encoding=PLAIN=0 (field 2),
        // definition_level_encoding=RLE=3 (field 3), repetition_level_encoding=RLE=3 (field 4).
        let mut dph = vec![];
        dph.extend(zigzag_field(1, 5, 5));
        dph.extend(zigzag_field(1, 5, 0));
        dph.extend(zigzag_field(1, 5, 3));
        dph.extend(zigzag_field(1, 5, 3));
        let dph = struct_bytes(&dph);

        let mut header = vec![];
        header.extend(zigzag_field(1, 5, 0)); // type = DATA_PAGE
        header.extend(zigzag_field(1, 5, 20)); // uncompressed_page_size
        header.extend(zigzag_field(1, 5, 20)); // compressed_page_size
        header.push((2u8 << 4) | 12); // field 5 (delta 2 from field 3), STRUCT
        header.extend(dph);
        let header = struct_bytes(&header);

        let (parsed, consumed) = parse_page_header(&header).unwrap();
        assert_eq!(parsed.page_type, PageType::DataPage);
        assert_eq!(consumed, header.len());
        let dp = parsed.data_page_header.unwrap();
        assert_eq!(dp.num_values, 5);
        assert_eq!(dp.encoding, Encoding::Plain);
    }

    #[test]
    fn cursor_rejects_oversized_page() {
        let mut header = vec![];
        header.extend(zigzag_field(1, 5, 2)); // type = DICTIONARY_PAGE
        header.extend(zigzag_field(1, 5, 100)); // uncompressed_page_size
        header.extend(zigzag_field(1, 5, 100)); // compressed_page_size
        let header = struct_bytes(&header);

        let mut cursor = PageCursor::new(&header, 10);
        let err = cursor.next_page().unwrap_err();
        assert!(matches!(err, ParquetError::PageTooLarge(_)));
    }

    #[test]
    fn cursor_stops_when_data_exhausted() {
        let mut cursor = PageCursor::new(&[], 1 << 20);
        assert!(cursor.next_page().unwrap().is_none());
    }
}
