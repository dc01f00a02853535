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

//! Byte-range planning (spec §4.H), MongoDB-style filtering, and the query
//! engine that executes a plan against a `ByteSource` (§4.I).

pub mod engine;
pub mod filter;
pub mod plan;

pub use engine::{query, read, read_chunks, ReadOptions, Row, INDEX_COLUMN};
pub use filter::{parse as parse_filter, FilterNode};
pub use plan::{build_plan, PlanOptions, QueryPlan};
