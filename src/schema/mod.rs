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

//! Typed schema tree (spec §4.D). The teacher's `schema::types::from_thrift`
//! (referenced, not retrieved, from `file/reader.rs`) builds a tree from the
//! same flat preorder `schema[]` shape; this module follows that contract
//! but carries `maxDef`/`maxRep` and list/map recognition needed by the
//! Dremel assembler (§4.G) rather than arrow-rs's full logical type system.

use crate::basic::{ConvertedType, LogicalType, Repetition, Type};
use crate::basic::schema_conflict;
use crate::error::Result;
use crate::metadata::SchemaElement;

#[derive(Debug, Clone)]
pub struct SchemaNode {
    /// Index into the owning `FileMetaData.schema` flat array.
    pub element_index: usize,
    pub name: String,
    /// Dotted path from the root, exclusive of the root itself.
    pub path: String,
    /// Subtree size including self, used to skip subtrees in flat iteration.
    pub count: usize,
    pub children: Vec<SchemaNode>,
    pub repetition: Option<Repetition>,
    pub physical_type: Option<Type>,
    pub type_length: Option<i32>,
    pub converted_type: Option<ConvertedType>,
    pub logical_type: Option<LogicalType>,
    pub scale: Option<i32>,
    pub precision: Option<i32>,
    /// Count of OPTIONAL or REPEATED ancestors including self.
    pub max_def: i32,
    /// Count of REPEATED ancestors including self.
    pub max_rep: i32,
}

impl SchemaNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Preorder leaves under this node. For the root this is the flat
    /// sequence whose index `i` must line up with `RowGroup.columns[i]`
    /// (spec §3, RowGroup invariant).
    pub fn leaves(&self) -> Vec<&SchemaNode> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a SchemaNode>) {
        if self.is_leaf() {
            out.push(self);
        } else {
            for child in &self.children {
                child.collect_leaves(out);
            }
        }
    }

    fn is_list_convention(&self) -> bool {
        matches!(self.converted_type, Some(ConvertedType::List)) || matches!(self.logical_type, Some(LogicalType::List))
    }

    fn is_map_convention(&self) -> bool {
        matches!(self.converted_type, Some(ConvertedType::Map) | Some(ConvertedType::MapKeyValue))
            || matches!(self.logical_type, Some(LogicalType::Map))
    }

    /// Returns the single REPEATED grandchild-bearing child for a
    /// list-like node (spec §4.D), or `None` if this node doesn't match
    /// the list convention.
    pub fn list_like_child(&self) -> Option<&SchemaNode> {
        if !self.is_list_convention() || self.children.len() != 1 {
            return None;
        }
        let repeated = &self.children[0];
        if repeated.repetition != Some(Repetition::Repeated) || repeated.children.len() != 1 {
            return None;
        }
        Some(repeated)
    }

    /// Returns `(key, value)` children for a map-like node, detected by
    /// name rather than position (spec §9, "map-key ordering" open
    /// question). `Err(SchemaConflict)` if the convention matches but
    /// `key` is missing.
    pub fn map_like_children(&self) -> Result<Option<(&SchemaNode, &SchemaNode)>> {
        if !self.is_map_convention() || self.children.len() != 1 {
            return Ok(None);
        }
        let repeated = &self.children[0];
        if repeated.repetition != Some(Repetition::Repeated) || repeated.children.len() != 2 {
            return Ok(None);
        }
        let key = repeated.children.iter().find(|c| c.name == "key");
        let value = repeated.children.iter().find(|c| c.name == "value");
        match (key, value) {
            (Some(k), Some(v)) => Ok(Some((k, v))),
            _ => Err(schema_conflict(format!("map-like node '{}' has a repeated child without a 'key' element", self.path))),
        }
    }
}

/// Builds the typed tree from `FileMetaData.schema` (spec §4.D). `schema[0]`
/// is the root; each node consumes `numChildren` direct children taken as
/// the next `numChildren` preorder subtrees.
pub fn build_schema_tree(schema: &[SchemaElement]) -> Result<SchemaNode> {
    if schema.is_empty() {
        return Err(schema_conflict("schema is empty"));
    }
    let root_el = &schema[0];
    let mut pos = 1usize;
    let num_children = root_el.num_children.unwrap_or(0) as usize;
    let mut children = Vec::with_capacity(num_children);
    for _ in 0..num_children {
        children.push(build_node(schema, &mut pos, "", 0, 0)?);
    }
    if pos != schema.len() {
        return Err(schema_conflict(format!(
            "schema has {} trailing element(s) not reachable via numChildren",
            schema.len() - pos
        )));
    }

    let mut seen = std::collections::HashSet::new();
    for child in &children {
        if !seen.insert(child.name.as_str()) {
            return Err(schema_conflict(format!("duplicate top-level column name '{}'", child.name)));
        }
    }

    let count = 1 + children.iter().map(|c| c.count).sum::<usize>();
    Ok(SchemaNode {
        element_index: 0,
        name: root_el.name.clone(),
        path: String::new(),
        count,
        children,
        repetition: root_el.repetition,
        physical_type: root_el.physical_type,
        type_length: root_el.type_length,
        converted_type: root_el.converted_type,
        logical_type: root_el.logical_type.clone(),
        scale: root_el.scale,
        precision: root_el.precision,
        max_def: 0,
        max_rep: 0,
    })
}

fn build_node(schema: &[SchemaElement], pos: &mut usize, parent_path: &str, parent_def: i32, parent_rep: i32) -> Result<SchemaNode> {
    if *pos >= schema.len() {
        return Err(schema_conflict("schema truncated: declared numChildren exceeds flat schema length"));
    }
    let idx = *pos;
    *pos += 1;
    let el = &schema[idx];

    let adds_def = matches!(el.repetition, Some(Repetition::Optional) | Some(Repetition::Repeated));
    let adds_rep = matches!(el.repetition, Some(Repetition::Repeated));
    let max_def = parent_def + i32::from(adds_def);
    let max_rep = parent_rep + i32::from(adds_rep);

    let path = if parent_path.is_empty() { el.name.clone() } else { format!("{}.{}", parent_path, el.name) };

    let num_children = el.num_children.unwrap_or(0) as usize;
    let mut children = Vec::with_capacity(num_children);
    for _ in 0..num_children {
        children.push(build_node(schema, pos, &path, max_def, max_rep)?);
    }
    let count = 1 + children.iter().map(|c| c.count).sum::<usize>();

    Ok(SchemaNode {
        element_index: idx,
        name: el.name.clone(),
        path,
        count,
        children,
        repetition: el.repetition,
        physical_type: el.physical_type,
        type_length: el.type_length,
        converted_type: el.converted_type,
        logical_type: el.logical_type.clone(),
        scale: el.scale,
        precision: el.precision,
        max_def,
        max_rep,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParquetError;

    fn el(name: &str, repetition: Option<Repetition>, num_children: Option<i32>, physical_type: Option<Type>) -> SchemaElement {
        SchemaElement {
            physical_type,
            type_length: None,
            repetition,
            name: name.to_string(),
            num_children,
            converted_type: None,
            scale: None,
            precision: None,
            field_id: None,
            logical_type: None,
        }
    }

    #[test]
    fn flat_schema_builds_two_leaf_tree() {
        let schema = vec![
            el("root", None, Some(2), None),
            el("a", Some(Repetition::Optional), None, Some(Type::ByteArray)),
            el("b", Some(Repetition::Required), None, Some(Type::Int32)),
        ];
        let root = build_schema_tree(&schema).unwrap();
        assert_eq!(root.children.len(), 2);
        let leaves = root.leaves();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].path, "a");
        assert_eq!(leaves[0].max_def, 1);
        assert_eq!(leaves[1].path, "b");
        assert_eq!(leaves[1].max_def, 0);
    }

    #[test]
    fn duplicate_top_level_names_conflict() {
        let schema = vec![
            el("root", None, Some(2), None),
            el("a", Some(Repetition::Required), None, Some(Type::Int32)),
            el("a", Some(Repetition::Required), None, Some(Type::Int32)),
        ];
        let err = build_schema_tree(&schema).unwrap_err();
        assert!(matches!(err, ParquetError::SchemaConflict(_)));
    }

    #[test]
    fn list_like_child_requires_one_repeated_grandchild() {
        let mut list_el = el("tags", Some(Repetition::Optional), Some(1), None);
        list_el.converted_type = Some(ConvertedType::List);
        let schema = vec![
            el("root", None, Some(1), None),
            list_el,
            el("list", Some(Repetition::Repeated), Some(1), None),
            el("element", Some(Repetition::Optional), None, Some(Type::ByteArray)),
        ];
        let root = build_schema_tree(&schema).unwrap();
        let tags = &root.children[0];
        let repeated = tags.list_like_child().unwrap();
        assert_eq!(repeated.path, "tags.list");
        assert_eq!(repeated.children[0].path, "tags.list.element");
    }

    #[test]
    fn map_like_children_detected_by_name_not_position() {
        let mut map_el = el("m", Some(Repetition::Optional), Some(1), None);
        map_el.converted_type = Some(ConvertedType::Map);
        let schema = vec![
            el("root", None, Some(1), None),
            map_el,
            el("key_value", Some(Repetition::Repeated), Some(2), None),
            el("value", Some(Repetition::Required), None, Some(Type::ByteArray)),
            el("key", Some(Repetition::Required), None, Some(Type::ByteArray)),
        ];
        let root = build_schema_tree(&schema).unwrap();
        let (key, value) = root.children[0].map_like_children().unwrap().unwrap();
        assert_eq!(key.path, "m.key_value.key");
        assert_eq!(value.path, "m.key_value.value");
    }
}
