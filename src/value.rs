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

//! Assembled row/column value tree (spec §3 `DecodedArray`, §4.G). The
//! teacher has no nested-type output (its `RowAccessor`/`RowFormatter` work
//! is not in the retrieved material); this shape is grounded directly in
//! spec §4.G's list/map/struct assembly contract, with `Null` doing double
//! duty for "absent field" (dropped by the engine when building output
//! rows) and "present but null" (kept, per the `a:null` end-to-end example
//! in spec §8).

use std::cmp::Ordering;

use crate::logical::LogicalValue;

/// One assembled (possibly nested) value, produced by [`crate::column::dremel`]
/// and consumed by the query engine's row builder.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Scalar(LogicalValue),
    List(Vec<Value>),
    /// Field order mirrors schema declaration order, not an arbitrary map.
    Struct(Vec<(String, Value)>),
    /// Pairs mirror on-disk entry order; null keys are dropped during
    /// assembly (spec §4.G map-like rule).
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_scalar(&self) -> Option<&LogicalValue> {
        match self {
            Value::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

/// Zips sibling fields assembled independently (one [`Value`] per field,
/// same outer list-nesting shape since that nesting only ever comes from
/// ancestors shared by every field) into a single [`Value`] tree. At a
/// leaf position (no field is a `List`), the position becomes `Struct` if
/// any field is present, or collapses to `Null` if every field is null
/// (spec §4.G "zip at the parent's ... depth"; an all-null position cannot
/// be distinguished here from the whole group being absent, an accepted
/// limitation noted in DESIGN.md).
pub fn zip_struct_fields(fields: Vec<(String, Value)>) -> Value {
    let all_list = !fields.is_empty() && fields.iter().all(|(_, v)| matches!(v, Value::List(_)));
    if all_list {
        let len = fields
            .iter()
            .map(|(_, v)| if let Value::List(items) = v { items.len() } else { 0 })
            .min()
            .unwrap_or(0);
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let position: Vec<(String, Value)> = fields
                .iter()
                .map(|(name, v)| {
                    let item = match v {
                        Value::List(items) => items[i].clone(),
                        _ => Value::Null,
                    };
                    (name.clone(), item)
                })
                .collect();
            out.push(zip_struct_fields(position));
        }
        return Value::List(out);
    }
    if fields.iter().all(|(_, v)| v.is_null()) {
        return Value::Null;
    }
    Value::Struct(fields)
}

/// Pairs a map-like column's independently-assembled `key`/`value` fields
/// (spec §4.G "pair them index-by-index into key-keyed objects"), dropping
/// null-keyed entries. Descends through any shared outer `List` nesting
/// (a map nested inside another repeated ancestor) before pairing at the
/// map's own entry list.
pub fn zip_map_entries(key: Value, value: Value) -> Value {
    match (key, value) {
        (Value::List(ks), Value::List(vs)) => {
            let entry_level = ks.first().map(|v| !matches!(v, Value::List(_))).unwrap_or(true);
            if entry_level {
                let mut out = Vec::with_capacity(ks.len());
                for (k, v) in ks.into_iter().zip(vs.into_iter()) {
                    if k.is_null() {
                        continue;
                    }
                    out.push((k, v));
                }
                Value::Map(out)
            } else {
                Value::List(ks.into_iter().zip(vs.into_iter()).map(|(k, v)| zip_map_entries(k, v)).collect())
            }
        }
        (Value::Null, _) | (_, Value::Null) => Value::Null,
        (k, v) => Value::Map(vec![(k, v)]),
    }
}

/// Orders two scalar values for `orderBy`/statistics comparisons. Numeric
/// variants compare as `f64`; mismatched variants (e.g. a string against a
/// number) are incomparable (`None`), which callers treat as "neither side
/// sorts before the other" rather than a hard error.
pub fn compare_logical(a: &LogicalValue, b: &LogicalValue) -> Option<Ordering> {
    use LogicalValue::*;
    match (a, b) {
        (Boolean(x), Boolean(y)) => x.partial_cmp(y),
        (Int32(x), Int32(y)) => x.partial_cmp(y),
        (Int64(x), Int64(y)) => x.partial_cmp(y),
        (UInt32(x), UInt32(y)) => x.partial_cmp(y),
        (UInt64(x), UInt64(y)) => x.partial_cmp(y),
        (Date(x), Date(y)) => x.partial_cmp(y),
        (TimestampMillis(x), TimestampMillis(y)) => x.partial_cmp(y),
        (String(x), String(y)) => x.partial_cmp(y),
        (Bytes(x), Bytes(y)) => (&x[..]).partial_cmp(&y[..]),
        (Float16(x), Float16(y)) => as_f64(Float(*x)).partial_cmp(&as_f64(Float(*y))),
        _ => as_f64(a.clone()).partial_cmp(&as_f64(b.clone())),
    }
}

fn as_f64(v: LogicalValue) -> f64 {
    use LogicalValue::*;
    match v {
        Int32(x) => x as f64,
        Int64(x) => x as f64,
        UInt32(x) => x as f64,
        UInt64(x) => x as f64,
        Float(x) => x as f64,
        Double(x) => x,
        Decimal(x) => x,
        Date(x) => x as f64,
        TimestampMillis(x) => x as f64,
        Float16(x) => x as f64,
        Boolean(b) => {
            if b {
                1.0
            } else {
                0.0
            }
        }
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_struct_collapses_all_null_fields() {
        let fields = vec![("x".to_string(), Value::Null), ("y".to_string(), Value::Null)];
        assert_eq!(zip_struct_fields(fields), Value::Null);
    }

    #[test]
    fn zip_struct_builds_struct_when_any_field_present() {
        let fields = vec![("x".to_string(), Value::Scalar(LogicalValue::Int32(1))), ("y".to_string(), Value::Null)];
        let v = zip_struct_fields(fields.clone());
        assert_eq!(v, Value::Struct(fields));
    }

    #[test]
    fn zip_struct_zips_sibling_lists_elementwise() {
        let fields = vec![
            ("x".to_string(), Value::List(vec![Value::Scalar(LogicalValue::Int32(1)), Value::Scalar(LogicalValue::Int32(2))])),
            ("y".to_string(), Value::List(vec![Value::Null, Value::Scalar(LogicalValue::Int32(9))])),
        ];
        let v = zip_struct_fields(fields);
        let expected = Value::List(vec![
            Value::Struct(vec![("x".to_string(), Value::Scalar(LogicalValue::Int32(1))), ("y".to_string(), Value::Null)]),
            Value::Struct(vec![
                ("x".to_string(), Value::Scalar(LogicalValue::Int32(2))),
                ("y".to_string(), Value::Scalar(LogicalValue::Int32(9))),
            ]),
        ]);
        assert_eq!(v, expected);
    }

    #[test]
    fn zip_map_entries_drops_null_keys() {
        let keys = Value::List(vec![Value::Scalar(LogicalValue::String("a".into())), Value::Null]);
        let values = Value::List(vec![Value::Scalar(LogicalValue::Int32(1)), Value::Scalar(LogicalValue::Int32(2))]);
        let v = zip_map_entries(keys, values);
        assert_eq!(v, Value::Map(vec![(Value::Scalar(LogicalValue::String("a".into())), Value::Scalar(LogicalValue::Int32(1)))]));
    }

    #[test]
    fn compare_logical_orders_same_variant() {
        assert_eq!(compare_logical(&LogicalValue::Int32(1), &LogicalValue::Int32(2)), Some(Ordering::Less));
        assert_eq!(compare_logical(&LogicalValue::String("a".into()), &LogicalValue::String("b".into())), Some(Ordering::Less));
    }
}
