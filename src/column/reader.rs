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

//! Column chunk decoding (spec §4.F). Drives the page cursor (§4.E) over
//! one column chunk's physical byte range, dereferences dictionary-encoded
//! pages against a chunk-lifetime dictionary built once from the leading
//! `DICTIONARY_PAGE`, and converts every physical value to its logical
//! representation (§4.J). Grounded on the teacher's `SerializedRowGroupReader`
//! column iteration (`file/reader.rs`), generalized from its per-type
//! `ColumnReader<T: DataType>` to a schema-driven runtime dispatch (see
//! SPEC_FULL.md §3).

use crate::basic::{Encoding, Type};
use crate::column::page::{PageCursor, PageType};
use crate::compression::Compressors;
use crate::encodings::{self, dictionary, levels};
use crate::error::{eof_err, general_err, ParquetError, Result};
use crate::logical::{self, LogicalValue, ParserTable};
use crate::metadata::ColumnMetaData;
use crate::schema::SchemaNode;

/// Everything a column chunk's decode needs that isn't already implied by
/// the chunk's own `ColumnMetaData` (spec §4.F: "schemaPath, leaf element,
/// codec, parsers, compressors, utf8 flag" — codec/compressors are threaded
/// through `read_column_chunk`'s own parameters instead of living here,
/// since a single `Compressors` table is shared across every column in a
/// read rather than cloned per decoder).
#[derive(Clone)]
pub struct ColumnDecoder {
    pub schema_path: String,
    pub leaf: SchemaNode,
    pub parsers: ParserTable,
    pub utf8: bool,
    /// Guards an individual page's declared compressed size (spec §4.F
    /// `PageTooLarge`; spec §1 "the viewer skips chunks >1 GiB").
    pub max_page_bytes: u64,
}

/// One leaf column's decoded chunk: full-length definition/repetition
/// level arrays (one entry per logical value, including nulls and
/// placeholders) plus the flat value stream (only `def == maxDef` entries,
/// already logically converted and dictionary-dereferenced). Consumed by
/// [`crate::column::dremel::assemble_leaf`].
pub struct DecodedColumn {
    pub definition_levels: Vec<i32>,
    pub repetition_levels: Vec<i32>,
    pub values: Vec<LogicalValue>,
}

/// Decodes one column chunk's entire physical byte range (spec §4.F steps
/// 1-5). `chunk_bytes` must start at `meta.physical_start()`, i.e. at the
/// dictionary page when present, else the first data page.
pub fn read_column_chunk(decoder: &ColumnDecoder, meta: &ColumnMetaData, chunk_bytes: &[u8], compressors: &Compressors) -> Result<DecodedColumn> {
    let leaf = &decoder.leaf;
    let physical_type = leaf
        .physical_type
        .ok_or_else(|| general_err!("column '{}' has no physical type (not a leaf?)", decoder.schema_path))?;
    let type_length = leaf.type_length.unwrap_or(0);

    let mut cursor = PageCursor::new(chunk_bytes, decoder.max_page_bytes);
    let mut dictionary: Option<Vec<LogicalValue>> = None;
    let mut definition_levels: Vec<i32> = Vec::new();
    let mut repetition_levels: Vec<i32> = Vec::new();
    let mut values: Vec<LogicalValue> = Vec::new();

    while let Some((header, payload)) = cursor.next_page()? {
        match header.page_type {
            PageType::DictionaryPage => {
                let dict_header = header
                    .dictionary_page_header
                    .as_ref()
                    .ok_or_else(|| general_err!("DICTIONARY_PAGE without a dictionary_page_header"))?;
                let decompressed = compressors.decompress(meta.codec, payload, header.uncompressed_page_size as usize)?;
                let (physical, _consumed) =
                    encodings::decode_page_values(Encoding::Plain, physical_type, &decompressed, dict_header.num_values as usize, type_length)?;
                let converted = physical
                    .into_iter()
                    .map(|v| logical::convert(v, leaf, &decoder.parsers, decoder.utf8))
                    .collect::<Result<Vec<_>>>()?;
                dictionary = Some(converted);
            }
            PageType::DataPage => {
                let dp = header.data_page_header.as_ref().ok_or_else(|| general_err!("DATA_PAGE without a data_page_header"))?;
                check_declared_encoding(meta, dp.encoding)?;
                let decompressed = compressors.decompress(meta.codec, payload, header.uncompressed_page_size as usize)?;
                let num_values = dp.num_values as usize;

                let mut pos = 0usize;
                let (reps, consumed) = if leaf.max_rep > 0 {
                    levels::decode_v1_section(&decompressed[pos..], leaf.max_rep, num_values)?
                } else {
                    (vec![0u32; num_values], 0)
                };
                pos += consumed;
                let (defs, consumed) = if leaf.max_def > 0 {
                    levels::decode_v1_section(&decompressed[pos..], leaf.max_def, num_values)?
                } else {
                    (vec![0u32; num_values], 0)
                };
                pos += consumed;

                let num_nulls = defs.iter().filter(|&&d| (d as i32) < leaf.max_def).count();
                let num_present = num_values - num_nulls;

                decode_values_into(&decompressed[pos..], dp.encoding, physical_type, type_length, num_present, &dictionary, leaf, &decoder.parsers, decoder.utf8, &mut values)?;

                repetition_levels.extend(reps.into_iter().map(|v| v as i32));
                definition_levels.extend(defs.into_iter().map(|v| v as i32));
            }
            PageType::DataPageV2 => {
                let dp = header
                    .data_page_header_v2
                    .as_ref()
                    .ok_or_else(|| general_err!("DATA_PAGE_V2 without a data_page_header_v2"))?;
                check_declared_encoding(meta, dp.encoding)?;
                let num_values = dp.num_values as usize;
                let rep_len = dp.repetition_levels_byte_length as usize;
                let def_len = dp.definition_levels_byte_length as usize;
                if payload.len() < rep_len + def_len {
                    return Err(eof_err!("DATA_PAGE_V2 payload shorter than its declared level section lengths"));
                }

                let reps = if leaf.max_rep > 0 {
                    levels::decode_v2_section(&payload[..rep_len], leaf.max_rep, num_values, rep_len)?
                } else {
                    vec![0u32; num_values]
                };
                let defs = if leaf.max_def > 0 {
                    levels::decode_v2_section(&payload[rep_len..rep_len + def_len], leaf.max_def, num_values, def_len)?
                } else {
                    vec![0u32; num_values]
                };

                let value_payload = &payload[rep_len + def_len..];
                let num_present = (num_values as i64 - dp.num_nulls as i64).max(0) as usize;
                let decompressed_values = if dp.is_compressed {
                    let uncompressed_len = (header.uncompressed_page_size as usize)
                        .checked_sub(rep_len + def_len)
                        .ok_or_else(|| general_err!("DATA_PAGE_V2 uncompressed_page_size smaller than its level sections"))?;
                    compressors.decompress(meta.codec, value_payload, uncompressed_len)?
                } else {
                    value_payload.to_vec()
                };

                decode_values_into(&decompressed_values, dp.encoding, physical_type, type_length, num_present, &dictionary, leaf, &decoder.parsers, decoder.utf8, &mut values)?;

                repetition_levels.extend(reps.into_iter().map(|v| v as i32));
                definition_levels.extend(defs.into_iter().map(|v| v as i32));
            }
            PageType::IndexPage => {
                // Column/offset index pages live outside a chunk's physical
                // data range; if one ever turns up here it carries nothing
                // a value-level reader needs.
                continue;
            }
        }
    }

    if definition_levels.len() != meta.num_values as usize {
        return Err(ParquetError::SchemaConflict(format!(
            "column '{}' decoded {} definition-level entries but chunk metadata declares num_values={}",
            decoder.schema_path,
            definition_levels.len(),
            meta.num_values
        )));
    }

    Ok(DecodedColumn { definition_levels, repetition_levels, values })
}

fn check_declared_encoding(meta: &ColumnMetaData, encoding: Encoding) -> Result<()> {
    if meta.encodings.contains(&encoding) {
        Ok(())
    } else {
        Err(ParquetError::EncodingMismatch(format!(
            "page encoding {:?} is not among the chunk's declared encodings {:?}",
            encoding, meta.encodings
        )))
    }
}

/// Decodes `num_present` physical values (dictionary indices or raw
/// values, depending on `encoding`) and appends their logical conversions
/// to `out` (spec §4.F steps 3-4).
#[allow(clippy::too_many_arguments)]
fn decode_values_into(
    data: &[u8],
    encoding: Encoding,
    ty: Type,
    type_length: i32,
    num_present: usize,
    dictionary: &Option<Vec<LogicalValue>>,
    leaf: &SchemaNode,
    parsers: &ParserTable,
    utf8: bool,
    out: &mut Vec<LogicalValue>,
) -> Result<()> {
    if encoding.is_dictionary() {
        let dict = dictionary
            .as_ref()
            .ok_or_else(|| general_err!("dictionary-encoded page encountered before the chunk's DICTIONARY_PAGE"))?;
        let (indices, _consumed) = dictionary::decode_indices(data, num_present)?;
        for idx in indices {
            let v = dict
                .get(idx as usize)
                .ok_or_else(|| general_err!("dictionary index {} out of range ({} entries)", idx, dict.len()))?;
            out.push(v.clone());
        }
        return Ok(());
    }
    let (physical, _consumed) = encodings::decode_page_values(encoding, ty, data, num_present, type_length)?;
    for v in physical {
        out.push(logical::convert(v, leaf, parsers, utf8)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{Compression, Repetition};
    use crate::metadata::KeyValue;

    fn scalar_leaf(physical_type: Type) -> SchemaNode {
        SchemaNode {
            element_index: 0,
            name: "a".to_string(),
            path: "a".to_string(),
            count: 1,
            children: vec![],
            repetition: Some(Repetition::Required),
            physical_type: Some(physical_type),
            type_length: None,
            converted_type: None,
            logical_type: None,
            scale: None,
            precision: None,
            max_def: 0,
            max_rep: 0,
        }
    }

    fn chunk_meta(encodings: Vec<Encoding>, num_values: i64) -> ColumnMetaData {
        ColumnMetaData {
            type_: Type::Int32,
            encodings,
            path_in_schema: vec!["a".to_string()],
            codec: Compression::Uncompressed,
            num_values,
            total_uncompressed_size: 0,
            total_compressed_size: 0,
            key_value_metadata: Vec::<KeyValue>::new(),
            data_page_offset: 0,
            index_page_offset: None,
            dictionary_page_offset: None,
            statistics: None,
            bloom_filter_offset: None,
            bloom_filter_length: None,
        }
    }

    fn thrift_struct_stop() -> u8 {
        0
    }

    fn data_page_header_bytes(num_values: i32, encoding: i32) -> Vec<u8> {
        // DataPageHeader: num_values (field1,I32), encoding (field2,I32),
        // definition_level_encoding=RLE=3 (field3), repetition_level_encoding=RLE=3 (field4).
        fn zz(delta: u8, ty: u8, value: i32) -> Vec<u8> {
            let mut out = vec![(delta << 4) | ty];
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
        let mut out = vec![];
        out.extend(zz(1, 5, num_values));
        out.extend(zz(1, 5, encoding));
        out.extend(zz(1, 5, 3));
        out.extend(zz(1, 5, 3));
        out.push(thrift_struct_stop());
        out
    }

    fn page_header_bytes(page_type: i32, uncompressed: i32, compressed: i32, dph: Vec<u8>) -> Vec<u8> {
        fn zz(delta: u8, ty: u8, value: i32) -> Vec<u8> {
            let mut out = vec![(delta << 4) | ty];
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
        let mut out = vec![];
        out.extend(zz(1, 5, page_type));
        out.extend(zz(1, 5, uncompressed));
        out.extend(zz(1, 5, compressed));
        out.push((2u8 << 4) | 12); // field 5 (delta 2 from field 3), STRUCT
        out.extend(dph);
        out.push(thrift_struct_stop());
        out
    }

    #[test]
    fn decodes_single_plain_data_page_scalar_column() {
        let values_bytes: Vec<u8> = vec![7, 0, 0, 0, 8, 0, 0, 0, 9, 0, 0, 0];
        let dph = data_page_header_bytes(3, 0); // PLAIN=0
        let header = page_header_bytes(0, values_bytes.len() as i32, values_bytes.len() as i32, dph);
        let mut chunk = header;
        chunk.extend(values_bytes);

        let decoder = ColumnDecoder {
            schema_path: "a".to_string(),
            leaf: scalar_leaf(Type::Int32),
            parsers: ParserTable::default(),
            utf8: false,
            max_page_bytes: 1 << 20,
        };
        let meta = chunk_meta(vec![Encoding::Plain], 3);
        let compressors = Compressors::new();
        let decoded = read_column_chunk(&decoder, &meta, &chunk, &compressors).unwrap();
        assert_eq!(decoded.definition_levels, vec![0, 0, 0]);
        assert_eq!(decoded.repetition_levels, vec![0, 0, 0]);
        assert_eq!(decoded.values, vec![LogicalValue::Int32(7), LogicalValue::Int32(8), LogicalValue::Int32(9)]);
    }

    #[test]
    fn rejects_encoding_not_declared_by_chunk_metadata() {
        let values_bytes: Vec<u8> = vec![1, 0, 0, 0];
        let dph = data_page_header_bytes(1, 0); // PLAIN=0
        let header = page_header_bytes(0, values_bytes.len() as i32, values_bytes.len() as i32, dph);
        let mut chunk = header;
        chunk.extend(values_bytes);

        let decoder = ColumnDecoder {
            schema_path: "a".to_string(),
            leaf: scalar_leaf(Type::Int32),
            parsers: ParserTable::default(),
            utf8: false,
            max_page_bytes: 1 << 20,
        };
        // Chunk only declares RLE_DICTIONARY, so a PLAIN page should fail.
        let meta = chunk_meta(vec![Encoding::RleDictionary], 1);
        let compressors = Compressors::new();
        let err = read_column_chunk(&decoder, &meta, &chunk, &compressors).unwrap_err();
        assert!(matches!(err, ParquetError::EncodingMismatch(_)));
    }
}
