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

//! The query engine (spec §4.I): ties the planner, filter, column reader and
//! Dremel assembler together behind `read`/`read_chunks`/`query`. Novel
//! relative to the teacher, which has no query layer at all; the
//! row-group-parallel shape is grounded on `paiml-trueno-db`'s
//! `query::executor`, which fans a plan out over independent units of work
//! and combines them once every unit resolves.

use std::collections::HashMap;

use futures::future::try_join_all;
use serde_json::Value as Json;
use tracing::Instrument;

use crate::compression::{default_compressors, Compressors};
use crate::error::{general_err, Result};
use crate::logical::{LogicalValue, ParserTable};
use crate::metadata::{self, ColumnMetaData, FileMetaData, MetadataReadOptions};
use crate::query::filter::{self, FilterNode};
use crate::query::plan::{build_plan, GroupPlan, PlanOptions, DEFAULT_GAP_THRESHOLD, DEFAULT_MAX_FETCH_BYTES};
use crate::schema::{build_schema_tree, SchemaNode};
use crate::source::{ByteSource, PrefetchedSource};
use crate::value::{compare_logical, Value};

/// One output row: the projected top-level columns in projection order.
/// `orderBy`-only queries additionally carry a reserved `__index__` column
/// (spec §4.I) holding the row's position in the unfiltered, unsorted file.
#[derive(Debug, Clone, Default)]
pub struct Row {
    pub columns: Vec<(String, Value)>,
}

impl Row {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// The reserved column name a sorted, filterless query attaches each row's
/// original row index under (spec §4.I).
pub const INDEX_COLUMN: &str = "__index__";

/// Caller-facing knobs. Mirrors spec §6's `options` shape; `file` and
/// `on_chunk`/`on_complete` are represented by the call site instead of a
/// struct field (the source is the first argument to each entry point, and
/// Rust has no natural place for a single-shot completion callback beyond
/// the function's own return).
pub struct ReadOptions {
    pub metadata: Option<FileMetaData>,
    pub columns: Option<Vec<String>>,
    pub filter: Option<Json>,
    pub strict: bool,
    pub order_by: Option<String>,
    pub order_desc: bool,
    pub row_start: i64,
    pub row_end: Option<i64>,
    pub compressors: Compressors,
    pub parsers: ParserTable,
    pub utf8: bool,
    pub geoparquet: bool,
    pub max_fetch_bytes: u64,
    pub gap_threshold: u64,
    pub max_page_bytes: u64,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            metadata: None,
            columns: None,
            filter: None,
            strict: true,
            order_by: None,
            order_desc: false,
            row_start: 0,
            row_end: None,
            compressors: default_compressors(),
            parsers: ParserTable::default(),
            utf8: true,
            geoparquet: true,
            max_fetch_bytes: DEFAULT_MAX_FETCH_BYTES,
            gap_threshold: DEFAULT_GAP_THRESHOLD,
            max_page_bytes: 16 * 1024 * 1024,
        }
    }
}

async fn resolve_metadata(source: &dyn ByteSource, options: &ReadOptions) -> Result<FileMetaData> {
    match &options.metadata {
        Some(meta) => Ok(meta.clone()),
        None => metadata::read_metadata_from_source(source, MetadataReadOptions::default(), options.geoparquet).await,
    }
}

fn parse_filter(options: &ReadOptions) -> Result<Option<FilterNode>> {
    options.filter.as_ref().map(filter::parse).transpose()
}

/// Fetches every byte range a plan names and wraps `source` in a
/// `PrefetchedSource` so every subsequent `slice` the group readers issue
/// is served from memory (spec §4.H: fetches are planned once, up front).
async fn prefetch<'s>(source: &'s dyn ByteSource, fetches: &[(u64, u64)]) -> Result<PrefetchedSource<&'s dyn ByteSource>> {
    let prefetched = PrefetchedSource::new(source);
    let futures = fetches.iter().map(|&(start, end)| {
        async move {
            let data = source.slice(start, end).await?;
            Result::Ok((start, data))
        }
        .instrument(tracing::debug_span!("parquet_stream::fetch", start, end))
    });
    for (start, data) in try_join_all(futures).await? {
        prefetched.prefetch(start, data);
    }
    Ok(prefetched)
}

/// Decodes and Dremel-assembles every `wanted` top-level column for one row
/// group, sliced to that group's `select_start..select_end` rows.
async fn read_group_columns(
    source: &dyn ByteSource,
    root: &SchemaNode,
    rg_columns: &[ColumnMetaData],
    group: &GroupPlan,
    wanted: &[&SchemaNode],
    parsers: &ParserTable,
    utf8: bool,
    compressors: &Compressors,
    max_page_bytes: u64,
) -> Result<HashMap<String, Vec<Value>>> {
    let mut leaf_columns: HashMap<String, (Vec<i32>, Vec<i32>, Vec<LogicalValue>)> = HashMap::new();

    for top in wanted {
        for leaf in top.leaves() {
            if leaf_columns.contains_key(&leaf.path) {
                continue;
            }
            let chunk = group
                .chunks
                .iter()
                .find(|c| c.leaf_path == leaf.path)
                .ok_or_else(|| general_err!("row group {} has no planned chunk for column {}", group.row_group_index, leaf.path))?;
            let meta = rg_columns
                .get(chunk.column_index)
                .ok_or_else(|| general_err!("row group {} is missing column chunk {}", group.row_group_index, chunk.column_index))?;
            let bytes = source.slice(chunk.range.0, chunk.range.1).await?;

            let decoder = crate::column::ColumnDecoder {
                schema_path: leaf.path.clone(),
                leaf: (*leaf).clone(),
                parsers: parsers.clone(),
                utf8,
                max_page_bytes,
            };
            let decoded = crate::column::read_column_chunk(&decoder, meta, &bytes, compressors)?;
            leaf_columns.insert(leaf.path.clone(), (decoded.definition_levels, decoded.repetition_levels, decoded.values));
        }
    }

    let mut out = HashMap::with_capacity(wanted.len());
    for top in wanted {
        let assembled = crate::column::dremel::assemble_column(root, top, &leaf_columns)?;
        let select_start = group.select_start as usize;
        let select_end = group.select_end as usize;
        let sliced = assembled.get(select_start..select_end).map(|s| s.to_vec()).unwrap_or_default();
        out.insert(top.name.clone(), sliced);
    }
    Ok(out)
}

fn columns_to_rows(names: &[String], columns: HashMap<String, Vec<Value>>, count: usize) -> Vec<Row> {
    let mut rows = Vec::with_capacity(count);
    for i in 0..count {
        let mut cols = Vec::with_capacity(names.len());
        for name in names {
            let value = columns.get(name).and_then(|v| v.get(i)).cloned().unwrap_or(Value::Null);
            cols.push((name.clone(), value));
        }
        rows.push(Row { columns: cols });
    }
    rows
}

fn row_to_map(row: &Row) -> HashMap<String, Value> {
    row.columns.iter().map(|(n, v)| (n.clone(), v.clone())).collect()
}

fn sort_key(rows: &[Row], order_by: &str) -> Vec<Option<LogicalValue>> {
    rows.iter()
        .map(|r| match r.get(order_by) {
            Some(Value::Scalar(v)) => Some(v.clone()),
            _ => None,
        })
        .collect()
}

/// Stable sort of row indices by `order_by`, nulls last ascending / nulls
/// first descending (spec §4.I "orderBy" paragraph).
fn sorted_indices(rows: &[Row], order_by: &str, desc: bool) -> Vec<usize> {
    let keys = sort_key(rows, order_by);
    let mut idx: Vec<usize> = (0..rows.len()).collect();
    idx.sort_by(|&a, &b| {
        match (&keys[a], &keys[b]) {
            (Some(x), Some(y)) => {
                let ord = compare_logical(x, y).unwrap_or(std::cmp::Ordering::Equal);
                if desc {
                    ord.reverse()
                } else {
                    ord
                }
            }
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
    idx
}

/// The four execution strategies of spec §4.I, selected by which of
/// `filter`/`order_by` are present.
enum Strategy {
    /// No filter, no orderBy: every selected row group is read concurrently
    /// and concatenated in file order.
    Plain,
    /// Filter only, with a bounded `rowEnd`: groups stream in file order and
    /// decoding stops once enough matching rows have accumulated.
    FilterOnly,
    /// Filter and orderBy together: every matching row is read regardless
    /// of `rowStart`/`rowEnd`, sorted, then sliced.
    FilterAndOrder,
    /// orderBy only: the sort column is read for the whole file first, the
    /// final row window is resolved against the sort permutation, and only
    /// the row groups that contribute to that window have their remaining
    /// columns decoded.
    OrderOnly,
}

fn choose_strategy(has_filter: bool, has_order: bool) -> Strategy {
    match (has_filter, has_order) {
        (false, false) => Strategy::Plain,
        (true, false) => Strategy::FilterOnly,
        (true, true) => Strategy::FilterAndOrder,
        (false, true) => Strategy::OrderOnly,
    }
}

/// `query` (spec §4.I): resolves metadata, plans the read, executes the
/// strategy matching the given filter/orderBy combination, and returns the
/// final row window.
pub async fn query(source: &dyn ByteSource, options: ReadOptions) -> Result<Vec<Row>> {
    let metadata = resolve_metadata(source, &options).await?;
    let root = build_schema_tree(&metadata.schema)?;
    let filter_node = parse_filter(&options)?;

    match choose_strategy(filter_node.is_some(), options.order_by.is_some()) {
        Strategy::Plain => run_plain(source, &metadata, &root, &options).await,
        Strategy::FilterOnly => run_filter_only(source, &metadata, &root, &options, filter_node.unwrap()).await,
        Strategy::FilterAndOrder => run_filter_and_order(source, &metadata, &root, &options, filter_node.unwrap()).await,
        Strategy::OrderOnly => run_order_only(source, &metadata, &root, &options).await,
    }
}

/// `read` (spec §4.I): identical to `query`, offered as the plain-language
/// entry point callers reach for when they are not thinking in query-engine
/// terms.
pub async fn read(source: &dyn ByteSource, options: ReadOptions) -> Result<Vec<Row>> {
    query(source, options).await
}

/// `readChunks` (spec §4.I): like `read`, but invokes `on_chunk` once per
/// row group as its rows become available instead of buffering the whole
/// result. `FnMut` rather than an `async` callback keeps the call site
/// synchronous; callers needing to await inside the callback can channel
/// the rows out instead.
pub async fn read_chunks(source: &dyn ByteSource, options: ReadOptions, mut on_chunk: impl FnMut(Vec<Row>)) -> Result<()> {
    let metadata = resolve_metadata(source, &options).await?;
    let root = build_schema_tree(&metadata.schema)?;
    let filter_node = parse_filter(&options)?;

    let mut plan_options = PlanOptions {
        columns: options.columns.clone(),
        filter: filter_node.clone(),
        strict: options.strict,
        row_start: options.row_start,
        row_end: options.row_end,
        max_fetch_bytes: options.max_fetch_bytes,
        gap_threshold: options.gap_threshold,
    };
    if options.order_by.is_some() {
        // orderBy cannot stream by definition (the final order depends on
        // every row); fall back to scanning the whole requested range.
        plan_options.row_start = 0;
        plan_options.row_end = None;
    }
    let plan = tracing::debug_span!("parquet_stream::plan").in_scope(|| build_plan(&metadata, &root, &plan_options, &options.parsers, options.utf8)?)?;
    let prefetched = prefetch(source, &plan.fetches).await?;
    let wanted = wanted_columns(&root, &plan.columns, &filter_node);
    let row_names = columns_with_filter(&plan.columns, &filter_node);

    let mut all_rows: Vec<Row> = Vec::new();
    for group in &plan.groups {
        let rg = &metadata.row_groups[group.row_group_index];
        let rg_meta = column_metas(rg)?;
        let columns = read_group_columns(&prefetched, &root, &rg_meta, group, &wanted, &options.parsers, options.utf8, &options.compressors, options.max_page_bytes).await?;
        let count = (group.select_end - group.select_start).max(0) as usize;
        let mut rows = columns_to_rows(&row_names, columns, count);
        if let Some(node) = &filter_node {
            rows.retain(|r| filter::row_matches(node, &row_to_map(r), options.strict));
        }
        drop_reserved_columns(&mut rows, &plan.columns);
        if options.order_by.is_none() {
            on_chunk(rows.clone());
        }
        all_rows.extend(rows);
    }

    if let Some(order_by) = &options.order_by {
        let idx = sorted_indices(&all_rows, order_by, options.order_desc);
        let start = (options.row_start.max(0) as usize).min(idx.len());
        let end = options.row_end.map(|e| e as usize).unwrap_or(idx.len()).min(idx.len()).max(start);
        let window: Vec<Row> = idx[start..end].iter().map(|&i| all_rows[i].clone()).collect();
        on_chunk(window);
    }

    Ok(())
}

/// Unions `base` with every column `filter_node` references (spec §4.I: a
/// filter/orderBy column not in the caller's projection is still read and
/// used for filtering, only dropped from the final rows afterward). Used
/// both to decide which leaves to decode (`wanted_columns`) and which names
/// `columns_to_rows` should materialize before the filter runs.
fn columns_with_filter(base: &[String], filter_node: &Option<FilterNode>) -> Vec<String> {
    let mut names: Vec<String> = base.to_vec();
    if let Some(node) = filter_node {
        let mut refs = Vec::new();
        filter::referenced_columns(node, &mut refs);
        for name in refs {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

fn wanted_columns<'a>(root: &'a SchemaNode, projection: &[String], filter_node: &Option<FilterNode>) -> Vec<&'a SchemaNode> {
    let names = columns_with_filter(projection, filter_node);
    names.iter().filter_map(|n| root.children.iter().find(|c| &c.name == n)).collect()
}

fn column_metas(rg: &crate::metadata::RowGroup) -> Result<Vec<ColumnMetaData>> {
    rg.columns
        .iter()
        .map(|c| c.meta_data.clone().ok_or_else(|| general_err!("row group column is missing metadata")))
        .collect()
}

/// Strategy 1: no filter, no orderBy. Every selected group's columns are
/// decoded concurrently (spec §4.I, §5 concurrency note) and concatenated
/// in row-group order, which already yields exactly the requested window
/// because `GroupPlan::select_start/select_end` were computed against it.
async fn run_plain(source: &dyn ByteSource, metadata: &FileMetaData, root: &SchemaNode, options: &ReadOptions) -> Result<Vec<Row>> {
    let plan_options = PlanOptions {
        columns: options.columns.clone(),
        filter: None,
        strict: options.strict,
        row_start: options.row_start,
        row_end: options.row_end,
        max_fetch_bytes: options.max_fetch_bytes,
        gap_threshold: options.gap_threshold,
    };
    let plan = tracing::debug_span!("parquet_stream::plan").in_scope(|| build_plan(metadata, root, &plan_options, &options.parsers, options.utf8)?)?;
    let prefetched = prefetch(source, &plan.fetches).await?;
    let wanted = wanted_columns(root, &plan.columns, &None);

    // Every group's metadata is resolved up front so the futures built below
    // only ever borrow already-settled `Vec`s, never a value that would
    // otherwise be dropped at the end of a loop iteration.
    let rg_metas: Vec<Vec<ColumnMetaData>> = plan.groups.iter().map(|g| column_metas(&metadata.row_groups[g.row_group_index])).collect::<Result<_>>()?;

    let futures = plan.groups.iter().zip(rg_metas.iter()).map(|(group, rg_meta)| {
        read_group_columns(&prefetched, root, rg_meta, group, &wanted, &options.parsers, options.utf8, &options.compressors, options.max_page_bytes)
    });
    let results = try_join_all(futures).await?;

    let mut rows = Vec::new();
    for (group, columns) in plan.groups.iter().zip(results) {
        let count = (group.select_end - group.select_start).max(0) as usize;
        rows.extend(columns_to_rows(&plan.columns, columns, count));
    }
    Ok(rows)
}

/// Strategy 2: filter only. Groups stream in file order (the planner has
/// already skipped the ones statistics rule out); rows are filtered as each
/// group finishes, and once `rowStart + (rowEnd - rowStart)` matches have
/// accumulated the remaining groups are never fetched or decoded.
async fn run_filter_only(source: &dyn ByteSource, metadata: &FileMetaData, root: &SchemaNode, options: &ReadOptions, filter_node: FilterNode) -> Result<Vec<Row>> {
    let plan_options = PlanOptions {
        columns: options.columns.clone(),
        filter: Some(filter_node.clone()),
        strict: options.strict,
        row_start: 0,
        row_end: None,
        max_fetch_bytes: options.max_fetch_bytes,
        gap_threshold: options.gap_threshold,
    };
    let plan = tracing::debug_span!("parquet_stream::plan").in_scope(|| build_plan(metadata, root, &plan_options, &options.parsers, options.utf8)?)?;
    let filter_opt = Some(filter_node.clone());
    let wanted = wanted_columns(root, &plan.columns, &filter_opt);
    let row_names = columns_with_filter(&plan.columns, &filter_opt);

    let row_start = options.row_start.max(0) as usize;
    let limit = options.row_end.map(|e| (e - options.row_start).max(0) as usize);

    let mut matched: Vec<Row> = Vec::new();
    for group in &plan.groups {
        if let Some(limit) = limit {
            if matched.len() >= row_start + limit {
                break;
            }
        }
        let fetches: Vec<(u64, u64)> = group.chunks.iter().map(|c| c.range).collect();
        let prefetched = prefetch(source, &fetches).await?;
        let rg = &metadata.row_groups[group.row_group_index];
        let rg_meta = column_metas(rg)?;
        let columns = read_group_columns(&prefetched, root, &rg_meta, group, &wanted, &options.parsers, options.utf8, &options.compressors, options.max_page_bytes).await?;
        let count = (group.select_end - group.select_start).max(0) as usize;
        let rows = columns_to_rows(&row_names, columns, count);
        for row in rows {
            if filter::row_matches(&filter_node, &row_to_map(&row), options.strict) {
                matched.push(row);
                if let Some(limit) = limit {
                    if matched.len() >= row_start + limit {
                        break;
                    }
                }
            }
        }
    }

    let end = matched.len();
    let start = row_start.min(end);
    let end = limit.map(|l| (start + l).min(end)).unwrap_or(end);
    let mut out: Vec<Row> = matched.drain(start..end).collect();
    drop_reserved_columns(&mut out, &plan.columns);
    Ok(out)
}

/// Strategy 3: filter and orderBy together. Every matching row is read
/// ignoring `rowStart`/`rowEnd`, sorted once, then the final window is
/// sliced out (spec §4.I: `rowStart`/`rowEnd` apply to the sorted result).
async fn run_filter_and_order(source: &dyn ByteSource, metadata: &FileMetaData, root: &SchemaNode, options: &ReadOptions, filter_node: FilterNode) -> Result<Vec<Row>> {
    let plan_options = PlanOptions {
        columns: options.columns.clone(),
        filter: Some(filter_node.clone()),
        strict: options.strict,
        row_start: 0,
        row_end: None,
        max_fetch_bytes: options.max_fetch_bytes,
        gap_threshold: options.gap_threshold,
    };
    let order_by = options.order_by.as_ref().expect("run_filter_and_order requires order_by");
    let plan = tracing::debug_span!("parquet_stream::plan").in_scope(|| build_plan(metadata, root, &plan_options, &options.parsers, options.utf8)?)?;
    let prefetched = prefetch(source, &plan.fetches).await?;

    let mut names = plan.columns.clone();
    if !names.contains(order_by) {
        names.push(order_by.clone());
    }
    let names = columns_with_filter(&names, &Some(filter_node.clone()));
    let wanted = wanted_columns(root, &names, &Some(filter_node.clone()));

    let mut matched: Vec<Row> = Vec::new();
    for group in &plan.groups {
        let rg = &metadata.row_groups[group.row_group_index];
        let rg_meta = column_metas(rg)?;
        let columns = read_group_columns(&prefetched, root, &rg_meta, group, &wanted, &options.parsers, options.utf8, &options.compressors, options.max_page_bytes).await?;
        let count = (group.select_end - group.select_start).max(0) as usize;
        let rows = columns_to_rows(&names, columns, count);
        matched.extend(rows.into_iter().filter(|r| filter::row_matches(&filter_node, &row_to_map(r), options.strict)));
    }

    let idx = sorted_indices(&matched, order_by, options.order_desc);
    let start = options.row_start.max(0) as usize;
    let end = options.row_end.map(|e| e as usize).unwrap_or(idx.len()).min(idx.len());
    let start = start.min(end);
    let mut out: Vec<Row> = idx[start..end].iter().map(|&i| matched[i].clone()).collect();
    drop_reserved_columns(&mut out, &plan.columns);
    Ok(out)
}

/// Strategy 4: orderBy only. First pass reads just the sort column for the
/// whole requested range to build the permutation and resolve which row
/// groups actually land inside the final window; second pass decodes the
/// remaining projected columns only for those groups (spec §4.I: "a sparse
/// row buffer keyed by original index").
async fn run_order_only(source: &dyn ByteSource, metadata: &FileMetaData, root: &SchemaNode, options: &ReadOptions) -> Result<Vec<Row>> {
    let order_by = options.order_by.as_ref().expect("run_order_only requires order_by");
    let plan_options = PlanOptions {
        columns: options.columns.clone(),
        filter: None,
        strict: options.strict,
        row_start: 0,
        row_end: None,
        max_fetch_bytes: options.max_fetch_bytes,
        gap_threshold: options.gap_threshold,
    };
    let plan = tracing::debug_span!("parquet_stream::plan").in_scope(|| build_plan(metadata, root, &plan_options, &options.parsers, options.utf8)?)?;

    // Pass 1: decode only the sort column, everywhere.
    let order_wanted = wanted_columns(root, std::slice::from_ref(order_by), &None);
    let order_fetches: Vec<(u64, u64)> = plan
        .groups
        .iter()
        .flat_map(|g| g.chunks.iter().filter(|c| order_wanted.iter().any(|w| w.leaves().iter().any(|l| l.path == c.leaf_path))).map(|c| c.range))
        .collect();
    let order_prefetched = prefetch(source, &order_fetches).await?;

    let mut order_values: Vec<Value> = Vec::with_capacity(metadata.num_rows as usize);
    let mut group_row_offsets: Vec<(usize, usize)> = Vec::with_capacity(plan.groups.len());
    for group in &plan.groups {
        let offset = order_values.len();
        let rg = &metadata.row_groups[group.row_group_index];
        let rg_meta = column_metas(rg)?;
        let columns = read_group_columns(&order_prefetched, root, &rg_meta, group, &order_wanted, &options.parsers, options.utf8, &options.compressors, options.max_page_bytes).await?;
        let count = (group.select_end - group.select_start).max(0) as usize;
        let rows = columns_to_rows(std::slice::from_ref(order_by), columns, count);
        order_values.extend(rows.into_iter().map(|r| r.get(order_by).cloned().unwrap_or(Value::Null)));
        group_row_offsets.push((group.row_group_index, offset));
    }

    let order_rows: Vec<Row> = order_values.iter().map(|v| Row { columns: vec![(order_by.clone(), v.clone())] }).collect();
    let idx = sorted_indices(&order_rows, order_by, options.order_desc);
    let start = options.row_start.max(0) as usize;
    let end = options.row_end.map(|e| e as usize).unwrap_or(idx.len()).min(idx.len());
    let start = start.min(end);
    let window: Vec<usize> = idx[start..end].to_vec();

    // Resolve which row group each selected original index falls in.
    let group_bounds: Vec<(usize, usize, usize)> = plan
        .groups
        .iter()
        .zip(&group_row_offsets)
        .map(|(g, &(rg_idx, offset))| (rg_idx, offset, offset + (g.select_end - g.select_start).max(0) as usize))
        .collect();
    let touched_groups: std::collections::HashSet<usize> = window
        .iter()
        .filter_map(|&i| group_bounds.iter().find(|&&(_, lo, hi)| i >= lo && i < hi).map(|&(rg_idx, _, _)| rg_idx))
        .collect();

    let wanted = wanted_columns(root, &plan.columns, &None);
    let mut buffer: HashMap<usize, Row> = HashMap::new();
    for group in plan.groups.iter().filter(|g| touched_groups.contains(&g.row_group_index)) {
        let fetches: Vec<(u64, u64)> = group.chunks.iter().map(|c| c.range).collect();
        let prefetched = prefetch(source, &fetches).await?;
        let rg = &metadata.row_groups[group.row_group_index];
        let rg_meta = column_metas(rg)?;
        let columns = read_group_columns(&prefetched, root, &rg_meta, group, &wanted, &options.parsers, options.utf8, &options.compressors, options.max_page_bytes).await?;
        let count = (group.select_end - group.select_start).max(0) as usize;
        let rows = columns_to_rows(&plan.columns, columns, count);
        let (_, offset, _) = *group_bounds.iter().find(|&&(rg_idx, _, _)| rg_idx == group.row_group_index).unwrap();
        for (i, row) in rows.into_iter().enumerate() {
            buffer.insert(offset + i, row);
        }
    }

    let mut out = Vec::with_capacity(window.len());
    for original_index in window {
        let mut row = buffer.remove(&original_index).unwrap_or_default();
        row.columns.push((INDEX_COLUMN.to_string(), Value::Scalar(LogicalValue::Int64(original_index as i64))));
        out.push(row);
    }
    Ok(out)
}

/// `run_filter_only`/`run_filter_and_order` may have pulled in filter-only
/// columns beyond the caller's projection; this drops anything not in
/// `projection` before returning rows to the caller.
fn drop_reserved_columns(rows: &mut [Row], projection: &[String]) {
    for row in rows {
        row.columns.retain(|(name, _)| projection.contains(name));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, value: LogicalValue) -> Row {
        Row { columns: vec![(name.to_string(), Value::Scalar(value))] }
    }

    #[test]
    fn plain_strategy_chosen_without_filter_or_order() {
        assert!(matches!(choose_strategy(false, false), Strategy::Plain));
    }

    #[test]
    fn filter_only_strategy_chosen_with_filter_and_no_order() {
        assert!(matches!(choose_strategy(true, false), Strategy::FilterOnly));
        assert!(matches!(choose_strategy(true, false), Strategy::FilterOnly));
    }

    #[test]
    fn filter_and_order_strategy_chosen_when_both_present() {
        assert!(matches!(choose_strategy(true, true), Strategy::FilterAndOrder));
    }

    #[test]
    fn order_only_strategy_chosen_with_order_and_no_filter() {
        assert!(matches!(choose_strategy(false, true), Strategy::OrderOnly));
    }

    #[test]
    fn sorted_indices_put_nulls_last_ascending() {
        let rows = vec![row("n", LogicalValue::Int32(3)), Row { columns: vec![("n".to_string(), Value::Null)] }, row("n", LogicalValue::Int32(1))];
        let idx = sorted_indices(&rows, "n", false);
        assert_eq!(idx, vec![2, 0, 1]);
    }

    #[test]
    fn sorted_indices_put_nulls_first_descending() {
        let rows = vec![row("n", LogicalValue::Int32(3)), Row { columns: vec![("n".to_string(), Value::Null)] }, row("n", LogicalValue::Int32(1))];
        let idx = sorted_indices(&rows, "n", true);
        assert_eq!(idx, vec![1, 0, 2]);
    }

    #[test]
    fn sorted_indices_is_stable_for_equal_keys() {
        let rows = vec![row("n", LogicalValue::Int32(1)), row("n", LogicalValue::Int32(1))];
        let idx = sorted_indices(&rows, "n", false);
        assert_eq!(idx, vec![0, 1]);
    }

    #[test]
    fn columns_to_rows_fills_missing_values_with_null() {
        let mut columns = HashMap::new();
        columns.insert("a".to_string(), vec![Value::Scalar(LogicalValue::Int32(1))]);
        let rows = columns_to_rows(&["a".to_string(), "b".to_string()], columns, 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("a"), Some(&Value::Scalar(LogicalValue::Int32(1))));
        assert_eq!(rows[0].get("b"), Some(&Value::Null));
    }

    #[test]
    fn drop_reserved_columns_keeps_only_projection() {
        let mut rows = vec![Row { columns: vec![("a".to_string(), Value::Null), ("b".to_string(), Value::Null)] }];
        drop_reserved_columns(&mut rows, &["a".to_string()]);
        assert_eq!(rows[0].columns.len(), 1);
        assert_eq!(rows[0].columns[0].0, "a");
    }

    #[test]
    fn columns_with_filter_adds_filter_referenced_names_not_in_projection() {
        let filter_node = filter::parse(&serde_json::json!({"age": {"$gt": 30}})).unwrap();
        let names = columns_with_filter(&["name".to_string()], &Some(filter_node));
        assert_eq!(names, vec!["name".to_string(), "age".to_string()]);
    }

    #[test]
    fn columns_with_filter_is_unchanged_without_a_filter() {
        let names = columns_with_filter(&["name".to_string()], &None);
        assert_eq!(names, vec!["name".to_string()]);
    }
}
