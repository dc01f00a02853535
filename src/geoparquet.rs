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

//! GeoParquet `geo` key convention (spec §4.C, GLOSSARY). Not present in
//! the teacher (it predates GeoParquet); grounded on the viewer's metadata
//! summary needs in `other_examples/3d02985a_XiangpengHao-parquet-viewer`,
//! which surfaces per-column geometry metadata to callers. Parsed with
//! `serde`/`serde_json`, the same JSON stack the rest of the ambient layer
//! uses (spec §9, "Dynamic maps vs tagged variants" — this is exactly the
//! kind of externally-shaped document that module note calls out).

use std::collections::HashMap;

use serde::Deserialize;

use crate::basic::LogicalType;
use crate::error::{general_err, Result};
use crate::metadata::FileMetaData;

#[derive(Debug, Deserialize)]
struct GeoMetadata {
    columns: HashMap<String, GeoColumn>,
}

#[derive(Debug, Deserialize)]
struct GeoColumn {
    encoding: String,
    #[serde(default)]
    edges: Option<String>,
    #[serde(default)]
    crs: Option<serde_json::Value>,
}

fn crs_string(crs: &serde_json::Value) -> Option<String> {
    let id = crs.get("id")?;
    let authority = id.get("authority")?.as_str()?;
    let code = id.get("code")?;
    Some(format!("{}:{}", authority, code))
}

/// If `key_value_metadata` contains a `geo` entry, mark each listed WKB
/// column's schema element as `GEOMETRY` (or `GEOGRAPHY` when
/// `edges == "spherical"`), deriving `crs` from `columns[name].crs.id`.
/// A file with no `geo` entry is left untouched.
pub fn apply_geoparquet_marking(metadata: &mut FileMetaData) -> Result<()> {
    let geo_json = match metadata.key_value("geo") {
        Some(s) => s.to_string(),
        None => return Ok(()),
    };
    let geo: GeoMetadata = serde_json::from_str(&geo_json).map_err(|e| general_err!("invalid geo key_value_metadata JSON: {}", e))?;

    for element in metadata.schema.iter_mut() {
        if let Some(col) = geo.columns.get(&element.name) {
            if col.encoding != "WKB" {
                continue;
            }
            let crs = col.crs.as_ref().and_then(crs_string);
            element.logical_type = Some(if col.edges.as_deref() == Some("spherical") {
                LogicalType::Geography { crs, edges: col.edges.clone() }
            } else {
                LogicalType::Geometry { crs }
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{Repetition, Type};
    use crate::metadata::{KeyValue, SchemaElement};

    fn element(name: &str) -> SchemaElement {
        SchemaElement {
            physical_type: Some(Type::ByteArray),
            type_length: None,
            repetition: Some(Repetition::Optional),
            name: name.to_string(),
            num_children: None,
            converted_type: None,
            scale: None,
            precision: None,
            field_id: None,
            logical_type: None,
        }
    }

    fn empty_file_metadata(schema: Vec<SchemaElement>, geo_json: Option<&str>) -> FileMetaData {
        FileMetaData {
            version: 1,
            schema,
            num_rows: 0,
            row_groups: vec![],
            key_value_metadata: geo_json
                .map(|j| vec![KeyValue { key: "geo".to_string(), value: Some(j.to_string()) }])
                .unwrap_or_default(),
            created_by: None,
            metadata_length: 0,
        }
    }

    #[test]
    fn marks_wkb_column_as_geometry_with_crs() {
        let geo = r#"{"columns":{"geom":{"encoding":"WKB","crs":{"id":{"authority":"EPSG","code":4326}}}}}"#;
        let mut metadata = empty_file_metadata(vec![element("geom")], Some(geo));
        apply_geoparquet_marking(&mut metadata).unwrap();
        match &metadata.schema[0].logical_type {
            Some(LogicalType::Geometry { crs }) => assert_eq!(crs.as_deref(), Some("EPSG:4326")),
            other => panic!("expected Geometry, got {:?}", other),
        }
    }

    #[test]
    fn spherical_edges_mark_geography() {
        let geo = r#"{"columns":{"geom":{"encoding":"WKB","edges":"spherical"}}}"#;
        let mut metadata = empty_file_metadata(vec![element("geom")], Some(geo));
        apply_geoparquet_marking(&mut metadata).unwrap();
        assert!(matches!(metadata.schema[0].logical_type, Some(LogicalType::Geography { .. })));
    }

    #[test]
    fn absent_geo_key_is_a_no_op() {
        let mut metadata = empty_file_metadata(vec![element("geom")], None);
        apply_geoparquet_marking(&mut metadata).unwrap();
        assert!(metadata.schema[0].logical_type.is_none());
    }
}
