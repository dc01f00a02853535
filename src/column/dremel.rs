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

//! Dremel record assembly (spec §4.G). The teacher predates nested-type
//! support (its `ColumnReader` returns flat typed buffers only, per
//! `file/reader.rs`'s `SerializedRowGroupReader`), so this module is
//! grounded directly in spec §4.G's stack-based algorithm and the literal
//! `repetitionLevels`/`definitionLevels` examples in spec §8, rather than
//! adapted from a teacher source file.

use crate::basic::Repetition;
use crate::error::Result;
use crate::logical::LogicalValue;
use crate::schema::SchemaNode;
use crate::value::{zip_map_entries, zip_struct_fields, Value};

/// One step along the repetition path from a top-level column down to a
/// leaf (spec §4.G "the sequence of REQUIRED/OPTIONAL/REPEATED along the
/// path"). `def_threshold` is this node's own cumulative `maxDef`, used to
/// decide presence; `rep_depth` is its cumulative `maxRep`, used to decide
/// which entries continue this node's list versus a shallower/deeper one.
#[derive(Debug, Clone, Copy)]
struct PathStep {
    is_repeated: bool,
    def_threshold: i32,
    rep_depth: i32,
}

/// Builds the chain of [`PathStep`]s from `column_node` (a direct child of
/// the file root) down to and including `leaf`, by walking the schema tree
/// and matching dotted-path prefixes. Plain OPTIONAL/REQUIRED wrapper nodes
/// above a REPEATED ancestor are dropped: their own presence is subsumed by
/// the repeated step's def-threshold check (and its padding-skip rescue),
/// so keeping a separate gate for them would reject rows the repeated
/// step's rescue is meant to recover (spec §8's `defs=[3,0,3]` example).
/// Only REPEATED ancestors and the leaf's own step survive.
fn path_steps(column_node: &SchemaNode, leaf: &SchemaNode) -> Vec<PathStep> {
    let mut raw = Vec::new();
    collect_steps(column_node, leaf, &mut raw);
    let leaf_step = *raw.last().expect("path always includes at least the leaf");
    let mut steps: Vec<PathStep> = raw[..raw.len() - 1].iter().filter(|s| s.is_repeated).copied().collect();
    steps.push(leaf_step);
    steps
}

fn collect_steps(node: &SchemaNode, leaf: &SchemaNode, out: &mut Vec<PathStep>) {
    out.push(PathStep {
        is_repeated: node.repetition == Some(Repetition::Repeated),
        def_threshold: node.max_def,
        rep_depth: node.max_rep,
    });
    if node.path == leaf.path {
        return;
    }
    for child in &node.children {
        if leaf.path == child.path || leaf.path.starts_with(&format!("{}.", child.path)) {
            collect_steps(child, leaf, out);
            return;
        }
    }
}

/// Reconstructs one leaf's per-row nested [`Value`]s from its flat
/// `definitionLevels`/`repetitionLevels`/`values` (spec §4.G). `defs` and
/// `reps` must be the same length; `values` holds exactly the entries with
/// `def == maxDef`.
///
/// A `def` below a repeated ancestor's own `def_threshold` normally means
/// that list is entirely absent (`Value::Null`, dropped by the row
/// builder). But when the very next entry continues at that list's
/// `rep_depth`, the low-`def` entry is a placeholder rather than a genuine
/// absence (spec §8's `defs=[3,0,3]`/`reps=[0,0,1]` example): it is skipped
/// and the list is built from the following entries instead.
pub fn assemble_leaf(column_node: &SchemaNode, leaf: &SchemaNode, defs: &[i32], reps: &[i32], values: Vec<LogicalValue>) -> Result<Vec<Value>> {
    let steps = path_steps(column_node, leaf);
    let mut value_iter = values.into_iter();
    let mut rows = Vec::new();
    let mut i = 0usize;
    while i < defs.len() {
        let (value, next_i) = build(&steps, 0, defs, reps, &mut value_iter, i);
        rows.push(value);
        i = next_i;
    }
    Ok(rows)
}

fn build(steps: &[PathStep], depth: usize, defs: &[i32], reps: &[i32], values: &mut impl Iterator<Item = LogicalValue>, i: usize) -> (Value, usize) {
    let step = steps[depth];
    let terminal = depth == steps.len() - 1;

    if step.is_repeated {
        return build_repeated_list(steps, depth, defs, reps, values, i, terminal);
    }

    debug_assert!(terminal, "non-repeated steps only survive path_steps filtering as the final (leaf) step");
    if defs[i] == step.def_threshold {
        (Value::Scalar(values.next().expect("value stream shorter than def levels claim")), i + 1)
    } else {
        (Value::Null, i + 1)
    }
}

/// Builds one REPEATED step's list, consuming entries while `reps` keeps
/// continuing at `step.rep_depth`. `terminal` selects whether each item is
/// read directly off `values` (a bare repeated scalar leaf) or assembled
/// recursively from the next path step (a list wrapping further nesting).
fn build_repeated_list(
    steps: &[PathStep],
    depth: usize,
    defs: &[i32],
    reps: &[i32],
    values: &mut impl Iterator<Item = LogicalValue>,
    i: usize,
    terminal: bool,
) -> (Value, usize) {
    let step = steps[depth];
    let mut j = i;
    // Skip placeholder entries: a def below this list's own threshold
    // whose successor still continues the same list.
    while defs[j] < step.def_threshold && j + 1 < defs.len() && reps[j + 1] >= step.rep_depth {
        j += 1;
    }
    if defs[j] < step.def_threshold {
        return (Value::Null, j + 1);
    }
    if defs[j] == step.def_threshold {
        return (Value::List(vec![]), j + 1);
    }

    let mut items = Vec::new();
    loop {
        let (item, next_j) = if terminal {
            (Value::Scalar(values.next().expect("value stream shorter than def levels claim")), j + 1)
        } else {
            build(steps, depth + 1, defs, reps, values, j)
        };
        items.push(item);
        j = next_j;
        if j >= defs.len() || reps[j] < step.rep_depth {
            break;
        }
    }
    (Value::List(items), j)
}

/// Assembles a top-level projected column (spec §4.G list/map/struct
/// rules) from its descendant leaves' already-decoded def/rep/value
/// triples, keyed by dotted leaf path.
pub fn assemble_column(schema_root: &SchemaNode, column_node: &SchemaNode, leaves: &std::collections::HashMap<String, (Vec<i32>, Vec<i32>, Vec<LogicalValue>)>) -> Result<Vec<Value>> {
    let _ = schema_root;
    if column_node.is_leaf() {
        let (defs, reps, values) = leaves
            .get(&column_node.path)
            .ok_or_else(|| crate::error::ParquetError::General(format!("no decoded data for leaf '{}'", column_node.path)))?;
        return assemble_leaf(column_node, column_node, defs, reps, values.clone());
    }

    if let Some(repeated) = column_node.list_like_child() {
        let element = &repeated.children[0];
        return assemble_nested(schema_root, column_node, element, leaves);
    }

    if let Some((key, value)) = column_node.map_like_children()? {
        let key_rows = assemble_nested(schema_root, column_node, key, leaves)?;
        let value_rows = assemble_nested(schema_root, column_node, value, leaves)?;
        return Ok(key_rows.into_iter().zip(value_rows).map(|(k, v)| zip_map_entries(k, v)).collect());
    }

    let mut per_child = Vec::with_capacity(column_node.children.len());
    for child in &column_node.children {
        per_child.push((child.name.clone(), assemble_nested(schema_root, column_node, child, leaves)?));
    }
    let num_rows = per_child.first().map(|(_, v)| v.len()).unwrap_or(0);
    let mut rows = Vec::with_capacity(num_rows);
    for i in 0..num_rows {
        let fields: Vec<(String, Value)> = per_child.iter().map(|(name, vs)| (name.clone(), vs[i].clone())).collect();
        rows.push(zip_struct_fields(fields));
    }
    Ok(rows)
}

/// Like [`assemble_column`] but for a node that need not be a direct child
/// of the file root (list elements, map keys/values, nested struct
/// fields); leaf assembly still walks the full path from `column_node`
/// (the outermost projected ancestor) so shared repeated ancestors above
/// `node` are reflected in every descendant's nesting.
fn assemble_nested(schema_root: &SchemaNode, column_node: &SchemaNode, node: &SchemaNode, leaves: &std::collections::HashMap<String, (Vec<i32>, Vec<i32>, Vec<LogicalValue>)>) -> Result<Vec<Value>> {
    if node.is_leaf() {
        let (defs, reps, values) = leaves
            .get(&node.path)
            .ok_or_else(|| crate::error::ParquetError::General(format!("no decoded data for leaf '{}'", node.path)))?;
        return assemble_leaf(column_node, node, defs, reps, values.clone());
    }

    if let Some(repeated) = node.list_like_child() {
        let element = &repeated.children[0];
        return assemble_nested(schema_root, column_node, element, leaves);
    }

    if let Some((key, value)) = node.map_like_children()? {
        let key_rows = assemble_nested(schema_root, column_node, key, leaves)?;
        let value_rows = assemble_nested(schema_root, column_node, value, leaves)?;
        return Ok(key_rows.into_iter().zip(value_rows).map(|(k, v)| zip_map_entries(k, v)).collect());
    }

    let mut per_child = Vec::with_capacity(node.children.len());
    for child in &node.children {
        per_child.push((child.name.clone(), assemble_nested(schema_root, column_node, child, leaves)?));
    }
    let num_rows = per_child.first().map(|(_, v)| v.len()).unwrap_or(0);
    let mut rows = Vec::with_capacity(num_rows);
    for i in 0..num_rows {
        let fields: Vec<(String, Value)> = per_child.iter().map(|(name, vs)| (name.clone(), vs[i].clone())).collect();
        rows.push(zip_struct_fields(fields));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::{ConvertedType, Repetition, Type};

    fn node(name: &str, path: &str, repetition: Repetition, max_def: i32, max_rep: i32, physical_type: Option<Type>, children: Vec<SchemaNode>) -> SchemaNode {
        SchemaNode {
            element_index: 0,
            name: name.to_string(),
            path: path.to_string(),
            count: 1,
            children,
            repetition: Some(repetition),
            physical_type,
            type_length: None,
            converted_type: None,
            logical_type: None,
            scale: None,
            precision: None,
            max_def,
            max_rep,
        }
    }

    /// `e: list<INT32>` with standard 3-level encoding: OPTIONAL group "e"
    /// containing REPEATED group "list" containing OPTIONAL "element".
    fn list_of_int32_column() -> (SchemaNode, SchemaNode) {
        let element = node("element", "e.list.element", Repetition::Optional, 3, 1, Some(Type::Int32), vec![]);
        let list = node("list", "e.list", Repetition::Repeated, 2, 1, None, vec![element]);
        let mut e = node("e", "e", Repetition::Optional, 1, 0, None, vec![list]);
        e.converted_type = Some(ConvertedType::List);
        (e.clone(), e.children[0].children[0].clone())
    }

    #[test]
    fn assembles_single_row_two_element_list() {
        let (column, leaf) = list_of_int32_column();
        let defs = vec![3, 3];
        let reps = vec![0, 1];
        let values = vec![LogicalValue::String("a".into()), LogicalValue::String("b".into())];
        let rows = assemble_leaf(&column, &leaf, &defs, &reps, values).unwrap();
        assert_eq!(
            rows,
            vec![Value::List(vec![Value::Scalar(LogicalValue::String("a".into())), Value::Scalar(LogicalValue::String("b".into()))])]
        );
    }

    #[test]
    fn assembles_two_rows_with_placeholder_null_in_middle() {
        let (column, leaf) = list_of_int32_column();
        let defs = vec![3, 0, 3];
        let reps = vec![0, 0, 1];
        let values = vec![LogicalValue::String("a".into()), LogicalValue::String("c".into())];
        let rows = assemble_leaf(&column, &leaf, &defs, &reps, values).unwrap();
        assert_eq!(
            rows,
            vec![
                Value::List(vec![Value::Scalar(LogicalValue::String("a".into()))]),
                Value::List(vec![Value::Scalar(LogicalValue::String("c".into()))]),
            ]
        );
    }

    #[test]
    fn scalar_leaf_assembles_one_value_per_row() {
        let leaf = node("a", "a", Repetition::Optional, 1, 0, Some(Type::ByteArray), vec![]);
        let defs = vec![1, 0, 1];
        let reps = vec![0, 0, 0];
        let values = vec![LogicalValue::String("abc".into()), LogicalValue::String("abc".into())];
        let rows = assemble_leaf(&leaf, &leaf, &defs, &reps, values).unwrap();
        assert_eq!(
            rows,
            vec![
                Value::Scalar(LogicalValue::String("abc".into())),
                Value::Null,
                Value::Scalar(LogicalValue::String("abc".into())),
            ]
        );
    }

    #[test]
    fn empty_list_is_distinct_from_absent_list() {
        let (column, leaf) = list_of_int32_column();
        // def==2 (the list's own threshold, element absent): present-but-empty.
        // def==0: the whole "e" field absent for that row.
        let defs = vec![2, 0];
        let reps = vec![0, 0];
        let rows = assemble_leaf(&column, &leaf, &defs, &reps, vec![]).unwrap();
        assert_eq!(rows, vec![Value::List(vec![]), Value::Null]);
    }
}
