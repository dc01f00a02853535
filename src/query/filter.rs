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

//! MongoDB-style filter tree: parsing, statistics pushdown (spec §4.H) and
//! row-level evaluation (spec §4.I). Novel relative to the teacher, which
//! has no query layer; grounded directly in spec §4.H's skip-rule table and
//! §4.I's strict/non-strict equality rule.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value as Json;

use crate::encodings;
use crate::error::{general_err, Result};
use crate::logical::{self, LogicalValue, ParserTable};
use crate::metadata::RowGroup;
use crate::schema::SchemaNode;
use crate::value::{compare_logical, Value};

/// A single column's predicate. Multiple operators on the same column
/// (`{$gte: 1, $lt: 10}`) combine as an implicit AND.
#[derive(Debug, Clone)]
pub enum Condition {
    Eq(Json),
    Ne(Json),
    Gt(Json),
    Gte(Json),
    Lt(Json),
    Lte(Json),
    In(Vec<Json>),
    Nin(Vec<Json>),
    Not(Box<Condition>),
    All(Vec<Condition>),
}

/// The filter tree (spec §4.H "a tree of `{$and|$or|$nor|$not}` nodes
/// combined with per-column conditions").
#[derive(Debug, Clone)]
pub enum FilterNode {
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Nor(Vec<FilterNode>),
    Not(Box<FilterNode>),
    Column(String, Condition),
}

/// Parses a JSON-shaped filter document into a [`FilterNode`] tree.
pub fn parse(value: &Json) -> Result<FilterNode> {
    let obj = value.as_object().ok_or_else(|| general_err!("filter must be a JSON object"))?;
    let mut nodes = Vec::with_capacity(obj.len());
    for (key, val) in obj {
        nodes.push(parse_entry(key, val)?);
    }
    Ok(match nodes.len() {
        0 => FilterNode::And(vec![]),
        1 => nodes.into_iter().next().unwrap(),
        _ => FilterNode::And(nodes),
    })
}

fn parse_entry(key: &str, val: &Json) -> Result<FilterNode> {
    match key {
        "$and" => Ok(FilterNode::And(parse_node_array(val)?)),
        "$or" => Ok(FilterNode::Or(parse_node_array(val)?)),
        "$nor" => Ok(FilterNode::Nor(parse_node_array(val)?)),
        "$not" => Ok(FilterNode::Not(Box::new(parse(val)?))),
        column => Ok(FilterNode::Column(column.to_string(), parse_condition(val)?)),
    }
}

fn parse_node_array(val: &Json) -> Result<Vec<FilterNode>> {
    let arr = val.as_array().ok_or_else(|| general_err!("combinator operand must be an array"))?;
    arr.iter().map(parse).collect()
}

fn parse_condition(val: &Json) -> Result<Condition> {
    if let Some(obj) = val.as_object() {
        if !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')) {
            let mut conditions = Vec::with_capacity(obj.len());
            for (op, v) in obj {
                conditions.push(match op.as_str() {
                    "$eq" => Condition::Eq(v.clone()),
                    "$ne" => Condition::Ne(v.clone()),
                    "$gt" => Condition::Gt(v.clone()),
                    "$gte" => Condition::Gte(v.clone()),
                    "$lt" => Condition::Lt(v.clone()),
                    "$lte" => Condition::Lte(v.clone()),
                    "$in" => Condition::In(v.as_array().ok_or_else(|| general_err!("$in operand must be an array"))?.clone()),
                    "$nin" => Condition::Nin(v.as_array().ok_or_else(|| general_err!("$nin operand must be an array"))?.clone()),
                    "$not" => Condition::Not(Box::new(parse_condition(v)?)),
                    other => return Err(general_err!("unknown filter operator '{}'", other)),
                });
            }
            return Ok(if conditions.len() == 1 { conditions.into_iter().next().unwrap() } else { Condition::All(conditions) });
        }
    }
    Ok(Condition::Eq(val.clone()))
}

fn literal_to_logical(v: &Json) -> Option<LogicalValue> {
    match v {
        Json::Bool(b) => Some(LogicalValue::Boolean(*b)),
        Json::Number(n) => Some(LogicalValue::Double(n.as_f64().unwrap_or(f64::NAN))),
        Json::String(s) => Some(LogicalValue::String(s.clone())),
        _ => None,
    }
}

fn is_category_match(lit: &LogicalValue, scalar: &LogicalValue) -> bool {
    use LogicalValue::*;
    matches!(
        (lit, scalar),
        (Boolean(_), Boolean(_))
            | (String(_), String(_) | Bytes(_))
            | (Double(_), Int32(_) | Int64(_) | UInt32(_) | UInt64(_) | Float(_) | Double(_) | Decimal(_) | Date(_) | TimestampMillis(_) | Float16(_))
    )
}

/// Coerced equality used by non-strict row-level matching (spec §4.I): a
/// string literal compared against a numeric column (or vice versa) is
/// compared numerically when the string parses cleanly, mirroring `==`.
fn coerced_equal(lit: &LogicalValue, scalar: &LogicalValue) -> bool {
    match (lit, scalar) {
        (LogicalValue::Double(n), LogicalValue::String(s)) => s.parse::<f64>().map(|parsed| parsed == *n).unwrap_or(false),
        (LogicalValue::String(s), _) => s.parse::<f64>().map(|n| compare_logical(&LogicalValue::Double(n), scalar) == Some(Ordering::Equal)).unwrap_or(false),
        _ => false,
    }
}

fn values_equal(literal: &Json, scalar: Option<&LogicalValue>, strict: bool) -> bool {
    let scalar = match scalar {
        Some(s) => s,
        None => return matches!(literal, Json::Null),
    };
    let lit = match literal_to_logical(literal) {
        Some(l) => l,
        None => return false,
    };
    if !is_category_match(&lit, scalar) {
        return !strict && coerced_equal(&lit, scalar);
    }
    compare_logical(&lit, scalar) == Some(Ordering::Equal)
}

fn compare_scalar_literal(scalar: Option<&LogicalValue>, literal: &Json) -> Option<Ordering> {
    let scalar = scalar?;
    let lit = literal_to_logical(literal)?;
    compare_logical(scalar, &lit)
}

fn condition_matches(cond: &Condition, scalar: Option<&LogicalValue>, strict: bool) -> bool {
    match cond {
        Condition::Eq(v) => values_equal(v, scalar, strict),
        Condition::Ne(v) => !values_equal(v, scalar, strict),
        Condition::Gt(v) => compare_scalar_literal(scalar, v) == Some(Ordering::Greater),
        Condition::Gte(v) => matches!(compare_scalar_literal(scalar, v), Some(Ordering::Greater) | Some(Ordering::Equal)),
        Condition::Lt(v) => compare_scalar_literal(scalar, v) == Some(Ordering::Less),
        Condition::Lte(v) => matches!(compare_scalar_literal(scalar, v), Some(Ordering::Less) | Some(Ordering::Equal)),
        Condition::In(list) => list.iter().any(|v| values_equal(v, scalar, strict)),
        Condition::Nin(list) => !list.iter().any(|v| values_equal(v, scalar, strict)),
        Condition::Not(c) => !condition_matches(c, scalar, strict),
        Condition::All(list) => list.iter().all(|c| condition_matches(c, scalar, strict)),
    }
}

/// Row-level filter evaluation (spec §4.I). `row` holds the projected
/// top-level columns by name, already assembled into [`Value`]s.
pub fn row_matches(node: &FilterNode, row: &HashMap<String, Value>, strict: bool) -> bool {
    match node {
        FilterNode::And(nodes) => nodes.iter().all(|n| row_matches(n, row, strict)),
        FilterNode::Or(nodes) => nodes.iter().any(|n| row_matches(n, row, strict)),
        FilterNode::Nor(nodes) => !nodes.iter().any(|n| row_matches(n, row, strict)),
        FilterNode::Not(n) => !row_matches(n, row, strict),
        FilterNode::Column(name, cond) => {
            let scalar = row.get(name).and_then(|v| v.as_scalar());
            condition_matches(cond, scalar, strict)
        }
    }
}

/// Every top-level column name a filter tree references, used by the query
/// engine to widen its read projection to cover filter-only columns.
pub fn referenced_columns(node: &FilterNode, out: &mut Vec<String>) {
    match node {
        FilterNode::And(nodes) | FilterNode::Or(nodes) | FilterNode::Nor(nodes) => {
            for n in nodes {
                referenced_columns(n, out);
            }
        }
        FilterNode::Not(n) => referenced_columns(n, out),
        FilterNode::Column(name, _) => out.push(name.clone()),
    }
}

fn decode_stat_bound(bytes: &[u8], leaf: &SchemaNode, parsers: &ParserTable, utf8: bool) -> Result<LogicalValue> {
    let ty = leaf.physical_type.ok_or_else(|| general_err!("statistics present on non-leaf column '{}'", leaf.path))?;
    let type_length = leaf.type_length.unwrap_or(0);
    let (values, _consumed) = encodings::plain::decode(bytes, ty, 1, type_length)?;
    let value = values.into_iter().next().ok_or_else(|| general_err!("empty statistics payload for '{}'", leaf.path))?;
    logical::convert(value, leaf, parsers, utf8)
}

/// Does this single column's `(min, max)` rule out every row in the group
/// (spec §4.H per-column skip rules)? `None` for either bound means "do not
/// skip based on statistics" per spec.
fn condition_allows_skip(cond: &Condition, min: Option<&LogicalValue>, max: Option<&LogicalValue>) -> bool {
    match cond {
        Condition::Eq(v) => {
            let lit = match literal_to_logical(v) {
                Some(l) => l,
                None => return false,
            };
            match (min, max) {
                (Some(mn), Some(mx)) => compare_logical(&lit, mn) == Some(Ordering::Less) || compare_logical(&lit, mx) == Some(Ordering::Greater),
                _ => false,
            }
        }
        Condition::Ne(v) => {
            let lit = match literal_to_logical(v) {
                Some(l) => l,
                None => return false,
            };
            match (min, max) {
                (Some(mn), Some(mx)) => compare_logical(mn, mx) == Some(Ordering::Equal) && compare_logical(mn, &lit) == Some(Ordering::Equal),
                _ => false,
            }
        }
        Condition::Gt(v) => {
            let lit = match literal_to_logical(v) {
                Some(l) => l,
                None => return false,
            };
            max.map(|mx| matches!(compare_logical(mx, &lit), Some(Ordering::Less) | Some(Ordering::Equal))).unwrap_or(false)
        }
        Condition::Gte(v) => {
            let lit = match literal_to_logical(v) {
                Some(l) => l,
                None => return false,
            };
            max.map(|mx| compare_logical(mx, &lit) == Some(Ordering::Less)).unwrap_or(false)
        }
        Condition::Lt(v) => {
            let lit = match literal_to_logical(v) {
                Some(l) => l,
                None => return false,
            };
            min.map(|mn| matches!(compare_logical(mn, &lit), Some(Ordering::Greater) | Some(Ordering::Equal))).unwrap_or(false)
        }
        Condition::Lte(v) => {
            let lit = match literal_to_logical(v) {
                Some(l) => l,
                None => return false,
            };
            min.map(|mn| compare_logical(mn, &lit) == Some(Ordering::Greater)).unwrap_or(false)
        }
        Condition::In(list) => {
            let (mn, mx) = match (min, max) {
                (Some(mn), Some(mx)) => (mn, mx),
                _ => return false,
            };
            list.iter().all(|v| match literal_to_logical(v) {
                Some(lit) => compare_logical(&lit, mn) == Some(Ordering::Less) || compare_logical(&lit, mx) == Some(Ordering::Greater),
                None => true,
            })
        }
        Condition::Nin(list) => {
            let (mn, mx) = match (min, max) {
                (Some(mn), Some(mx)) => (mn, mx),
                _ => return false,
            };
            if compare_logical(mn, mx) != Some(Ordering::Equal) {
                return false;
            }
            list.iter().any(|v| literal_to_logical(v).map(|lit| compare_logical(&lit, mn) == Some(Ordering::Equal)).unwrap_or(false))
        }
        // $not and multi-operator columns are evaluated conservatively: never skip.
        Condition::Not(_) => false,
        Condition::All(list) => list.iter().any(|c| condition_allows_skip(c, min, max)),
    }
}

/// `canSkipRowGroup` (spec §4.H): true iff every row in `row_group` is
/// provably excluded by `filter` according to column statistics. `leaves`
/// must be `root.leaves()` (index-aligned with `row_group.columns`).
pub fn can_skip_row_group(row_group: &RowGroup, leaves: &[&SchemaNode], node: &FilterNode, parsers: &ParserTable, utf8: bool, strict: bool) -> Result<bool> {
    let _ = strict;
    match node {
        FilterNode::And(nodes) => {
            for n in nodes {
                if can_skip_row_group(row_group, leaves, n, parsers, utf8, strict)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        FilterNode::Or(nodes) => {
            for n in nodes {
                if !can_skip_row_group(row_group, leaves, n, parsers, utf8, strict)? {
                    return Ok(false);
                }
            }
            Ok(!nodes.is_empty())
        }
        // $nor is conservative: never skip based on its branches (spec §4.H).
        FilterNode::Nor(_) => Ok(false),
        // $not is likewise conservative: negating a skip rule does not
        // generally produce a valid skip rule for the complement.
        FilterNode::Not(_) => Ok(false),
        FilterNode::Column(name, cond) => {
            let leaf = match leaves.iter().find(|l| l.path == *name) {
                Some(l) => l,
                None => return Ok(false),
            };
            let index = match leaves.iter().position(|l| l.path == *name) {
                Some(i) => i,
                None => return Ok(false),
            };
            let chunk = match row_group.columns.get(index) {
                Some(c) => c,
                None => return Ok(false),
            };
            let stats = match chunk.meta_data.as_ref().and_then(|m| m.statistics.as_ref()) {
                Some(s) => s,
                None => return Ok(false),
            };
            let min = match stats.effective_min() {
                Some(b) => Some(decode_stat_bound(b, leaf, parsers, utf8)?),
                None => None,
            };
            let max = match stats.effective_max() {
                Some(b) => Some(decode_stat_bound(b, leaf, parsers, utf8)?),
                None => None,
            };
            Ok(condition_allows_skip(cond, min.as_ref(), max.as_ref()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::Repetition;

    fn leaf(name: &str, ty: crate::basic::Type) -> SchemaNode {
        SchemaNode {
            element_index: 0,
            name: name.to_string(),
            path: name.to_string(),
            count: 1,
            children: vec![],
            repetition: Some(Repetition::Required),
            physical_type: Some(ty),
            type_length: None,
            converted_type: None,
            logical_type: None,
            scale: None,
            precision: None,
            max_def: 0,
            max_rep: 0,
        }
    }

    fn statistics(min: i32, max: i32) -> crate::metadata::Statistics {
        crate::metadata::Statistics {
            max: Some(max.to_le_bytes().to_vec()),
            min: Some(min.to_le_bytes().to_vec()),
            null_count: None,
            distinct_count: None,
            max_value: None,
            min_value: None,
            is_max_value_exact: None,
            is_min_value_exact: None,
        }
    }

    fn row_group_with_stats(min: i32, max: i32) -> RowGroup {
        RowGroup {
            columns: vec![crate::metadata::ColumnChunk {
                file_path: None,
                file_offset: 0,
                meta_data: Some(crate::metadata::ColumnMetaData {
                    type_: crate::basic::Type::Int32,
                    encodings: vec![],
                    path_in_schema: vec!["c".to_string()],
                    codec: crate::basic::Compression::Uncompressed,
                    num_values: 10,
                    total_uncompressed_size: 0,
                    total_compressed_size: 0,
                    key_value_metadata: vec![],
                    data_page_offset: 0,
                    index_page_offset: None,
                    dictionary_page_offset: None,
                    statistics: Some(statistics(min, max)),
                    bloom_filter_offset: None,
                    bloom_filter_length: None,
                }),
                offset_index_offset: None,
                offset_index_length: None,
                column_index_offset: None,
                column_index_length: None,
            }],
            num_rows: 10,
            total_byte_size: None,
            sorting_columns: None,
            file_offset: None,
            ordinal: None,
        }
    }

    #[test]
    fn gt_skips_when_max_does_not_exceed_literal() {
        let filter = parse(&serde_json::json!({"c": {"$gt": 10}})).unwrap();
        let rg = row_group_with_stats(1, 10);
        let leaves = vec![leaf("c", crate::basic::Type::Int32)];
        let leaf_refs: Vec<&SchemaNode> = leaves.iter().collect();
        let parsers = ParserTable::default();
        assert!(can_skip_row_group(&rg, &leaf_refs, &filter, &parsers, true, true).unwrap());
    }

    #[test]
    fn gt_does_not_skip_when_max_exceeds_literal() {
        let filter = parse(&serde_json::json!({"c": {"$gt": 5}})).unwrap();
        let rg = row_group_with_stats(1, 10);
        let leaves = vec![leaf("c", crate::basic::Type::Int32)];
        let leaf_refs: Vec<&SchemaNode> = leaves.iter().collect();
        let parsers = ParserTable::default();
        assert!(!can_skip_row_group(&rg, &leaf_refs, &filter, &parsers, true, true).unwrap());
    }

    #[test]
    fn implicit_equality_literal_parses_as_eq() {
        let filter = parse(&serde_json::json!({"c": 2})).unwrap();
        assert!(matches!(filter, FilterNode::Column(ref name, Condition::Eq(_)) if name == "c"));
    }

    #[test]
    fn row_level_strict_equality_rejects_cross_type_match() {
        let filter = parse(&serde_json::json!({"c": "2"})).unwrap();
        let mut row = HashMap::new();
        row.insert("c".to_string(), Value::Scalar(LogicalValue::Int32(2)));
        assert!(!row_matches(&filter, &row, true));
        assert!(row_matches(&filter, &row, false));
    }

    #[test]
    fn or_only_skips_when_every_branch_skips() {
        let filter = parse(&serde_json::json!({"$or": [{"c": {"$gt": 10}}, {"c": {"$gt": 20}}]})).unwrap();
        let rg = row_group_with_stats(1, 10);
        let leaves = vec![leaf("c", crate::basic::Type::Int32)];
        let leaf_refs: Vec<&SchemaNode> = leaves.iter().collect();
        let parsers = ParserTable::default();
        assert!(can_skip_row_group(&rg, &leaf_refs, &filter, &parsers, true, true).unwrap());
    }
}
