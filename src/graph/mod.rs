//! The graph overlay: two record stores — `nodes` and `edges` — sharing
//! one string store, with `node.*`/`edge.*` qualified series routed to
//! the matching store. Each `Graph` value represents one shard's view:
//! the node/edge rows it physically stores, plus a `Comm` handle for the
//! collectives and messaging that make those per-shard views add up to
//! one logical graph.

pub mod series_name;
pub mod where_clause;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::index::sample as sample_indices;
use rand::SeedableRng;
use rustc_hash::FxHasher;
use serde_json::Value as JsonValue;
use std::hash::{Hash, Hasher};

use crate::column::ColumnScalar;
use crate::coordination::Comm;
use crate::error::{CoreError, CoreResult};
use crate::json_store::JsonDocStore;
use crate::predicate::{self, Row};
use crate::record_store::{RecordId, RecordStore};
use crate::strings::{StringLocator, StringStore};
use crate::value::{CellValue, ColumnType};

use series_name::{Prefix, SeriesName};
use where_clause::WhereClause;

/// How a datastore directory is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    CreateOnly,
    OpenOnly,
    OpenReadOnly,
}

/// The return-code envelope every mutating core operation produces:
/// empty `error` means success; warnings accumulate by key.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ReturnCode {
    pub error: Option<String>,
    pub warnings: HashMap<String, u64>,
    pub return_info: HashMap<String, JsonValue>,
}

impl ReturnCode {
    pub fn ok() -> Self {
        Self::default()
    }

    fn warn(&mut self, key: &str) {
        *self.warnings.entry(key.to_string()).or_insert(0) += 1;
    }
}

fn owner_rank(id: &str, size: usize) -> usize {
    if size <= 1 {
        return 0;
    }
    let mut hasher = FxHasher::default();
    id.hash(&mut hasher);
    (hasher.finish() % size as u64) as usize
}

pub struct Graph {
    nodes: RecordStore,
    edges: RecordStore,
    strings: Rc<RefCell<StringStore>>,
    docs: JsonDocStore,
    directed: bool,
    node_lookup: HashMap<String, RecordId>,
    comm: Arc<dyn Comm>,
}

impl Graph {
    /// Open (or create) the datastore directory at `path` and install
    /// or validate the reserved series (`node.id`, `edge.u`, `edge.v`).
    /// The directory itself only encodes the open-mode contract; the
    /// real persistent-memory allocator that would back it is an
    /// external collaborator this crate does not implement.
    pub fn open(
        comm: Arc<dyn Comm>,
        path: impl AsRef<Path>,
        mode: OpenMode,
        directed: bool,
    ) -> CoreResult<Self> {
        let path: PathBuf = path.as_ref().to_path_buf();
        match mode {
            OpenMode::CreateOnly => {
                if path.exists() {
                    return Err(CoreError::DatastorePath(format!(
                        "{} already exists",
                        path.display()
                    )));
                }
                std::fs::create_dir_all(&path)?;
            }
            OpenMode::OpenOnly | OpenMode::OpenReadOnly => {
                if !path.exists() {
                    return Err(CoreError::DatastorePath(format!(
                        "{} does not exist",
                        path.display()
                    )));
                }
            }
        }

        let strings = Rc::new(RefCell::new(StringStore::new()));
        let mut nodes = RecordStore::new(strings.clone());
        let mut edges = RecordStore::new(strings.clone());

        match mode {
            OpenMode::CreateOnly => {
                nodes.add_series::<StringLocator>("id")?;
                edges.add_series::<StringLocator>("u")?;
                edges.add_series::<StringLocator>("v")?;
            }
            OpenMode::OpenOnly | OpenMode::OpenReadOnly => {
                if !nodes.has_series("id") || !edges.has_series("u") || !edges.has_series("v") {
                    return Err(CoreError::DatastorePath(
                        "datastore is missing reserved series".into(),
                    ));
                }
            }
        }

        Ok(Self {
            nodes,
            edges,
            strings,
            docs: JsonDocStore::new(),
            directed,
            node_lookup: HashMap::new(),
            comm,
        })
    }

    pub fn directed(&self) -> bool {
        self.directed
    }

    fn store_for(&self, prefix: Prefix) -> &RecordStore {
        match prefix {
            Prefix::Node => &self.nodes,
            Prefix::Edge => &self.edges,
        }
    }

    fn store_for_mut(&mut self, prefix: Prefix) -> &mut RecordStore {
        match prefix {
            Prefix::Node => &mut self.nodes,
            Prefix::Edge => &mut self.edges,
        }
    }

    /// Add a node for `id` to this shard. Only ever called for ids this
    /// shard owns (`owner_rank(id) == comm.rank()`); a caller asking to
    /// add an id owned elsewhere gets it silently routed away — there is
    /// nothing local to create.
    pub fn ensure_local_node(&mut self, id: &str) -> CoreResult<RecordId> {
        if let Some(&existing) = self.node_lookup.get(id) {
            return Ok(existing);
        }
        let record = self.nodes.add_record();
        let locator = self.strings.borrow_mut().intern(id.as_bytes())?;
        self.nodes.set::<StringLocator>("id", record, locator)?;
        self.node_lookup.insert(id.to_string(), record);
        Ok(record)
    }

    pub fn owns_node(&self, id: &str) -> bool {
        owner_rank(id, self.comm.size()) == self.comm.rank()
    }

    fn add_local_edge(&mut self, u: &str, v: &str) -> CoreResult<RecordId> {
        let record = self.edges.add_record();
        let u_loc = self.strings.borrow_mut().intern(u.as_bytes())?;
        let v_loc = self.strings.borrow_mut().intern(v.as_bytes())?;
        self.edges.set::<StringLocator>("u", record, u_loc)?;
        self.edges.set::<StringLocator>("v", record, v_loc)?;
        Ok(record)
    }

    // ---- series management -------------------------------------------------

    pub fn add_series<T: ColumnScalar>(&mut self, qname: &str) -> CoreResult<()> {
        let name = SeriesName::parse(qname)?;
        self.store_for_mut(name.prefix).add_series::<T>(&name.local)
    }

    pub fn drop_series(&mut self, qname: &str) -> CoreResult<()> {
        let name = SeriesName::parse(qname)?;
        self.store_for_mut(name.prefix).drop_series(&name.local)
    }

    pub fn has_series(&self, qname: &str) -> bool {
        match SeriesName::parse(qname) {
            Ok(name) => self.store_for(name.prefix).has_series(&name.local),
            Err(_) => false,
        }
    }

    pub fn series_names(&self, prefix: Prefix) -> Vec<String> {
        self.store_for(prefix)
            .series_names()
            .into_iter()
            .map(|local| SeriesName { prefix, local: local.to_string() }.qualified())
            .collect()
    }

    // ---- where-clause application -------------------------------------------

    /// Resolve `where_clause.required` to local series indices (step 1),
    /// build a row for each candidate record (step 2), and visit those
    /// for which the predicate holds (step 3). Node where-clauses that
    /// reference edge series take a special path — see
    /// `node_ids_from_edge_where`.
    fn for_all_matching(&self, prefix: Prefix, where_clause: &WhereClause, mut visitor: impl FnMut(RecordId)) {
        let references_other_store = where_clause
            .required
            .iter()
            .any(|n| n.prefix != prefix);

        if prefix == Prefix::Node && references_other_store {
            let node_ids = self.node_ids_from_edge_where(where_clause);
            self.nodes.for_all_rows(|id| {
                if let Some(CellValue::Str(loc)) = self.nodes.get_dynamic("id", id).unwrap_or(None)
                {
                    if let Some(id_str) = self.strings.borrow().get_str(loc) {
                        if node_ids.contains(id_str) {
                            visitor(id);
                        }
                    }
                }
            });
            return;
        }

        let store = self.store_for(prefix);
        let local_required: Vec<&SeriesName> = where_clause
            .required
            .iter()
            .filter(|n| n.prefix == prefix)
            .collect();

        // Step 1: if any required column is missing here, this shard
        // contributes no rows (not an error).
        if local_required.iter().any(|n| !store.has_series(&n.local)) {
            return;
        }

        store.for_all_rows(|id| {
            let mut row: Row = HashMap::new();
            let mut complete = true;
            for name in &local_required {
                match store.get_dynamic(&name.local, id) {
                    Ok(Some(cell)) => {
                        row.insert(
                            name.qualified(),
                            predicate::cell_to_eval(&cell, &self.strings.borrow()),
                        );
                    }
                    _ => {
                        complete = false;
                        break;
                    }
                }
            }
            if complete && where_clause.predicate.eval(&row) {
                visitor(id);
            }
        });
    }

    /// Node where-clause referencing edge series: enumerate edges first
    /// and collect a distributed node-id set. "Distributed" here means
    /// gathered through `Comm`; in a single-shard run that gather is a
    /// no-op round trip.
    fn node_ids_from_edge_where(&self, where_clause: &WhereClause) -> HashSet<String> {
        let mut ids = HashSet::new();
        let edge_required: Vec<&SeriesName> = where_clause
            .required
            .iter()
            .filter(|n| n.prefix == Prefix::Edge)
            .collect();

        if edge_required.iter().any(|n| !self.edges.has_series(&n.local)) {
            return ids;
        }

        self.edges.for_all_rows(|id| {
            let mut row: Row = HashMap::new();
            let mut complete = true;
            for name in &edge_required {
                match self.edges.get_dynamic(&name.local, id) {
                    Ok(Some(cell)) => {
                        row.insert(
                            name.qualified(),
                            predicate::cell_to_eval(&cell, &self.strings.borrow()),
                        );
                    }
                    _ => {
                        complete = false;
                        break;
                    }
                }
            }
            if complete && where_clause.predicate.eval(&row) {
                if let (Ok(Some(CellValue::Str(u))), Ok(Some(CellValue::Str(v)))) =
                    (self.edges.get_dynamic("u", id), self.edges.get_dynamic("v", id))
                {
                    let strings = self.strings.borrow();
                    if let Some(s) = strings.get_str(u) {
                        ids.insert(s.to_string());
                    }
                    if let Some(s) = strings.get_str(v) {
                        ids.insert(s.to_string());
                    }
                }
            }
        });
        ids
    }

    pub fn for_all_nodes(&self, where_clause: &WhereClause, mut visitor: impl FnMut(RecordId)) {
        self.for_all_matching(Prefix::Node, where_clause, &mut visitor)
    }

    pub fn for_all_edges(&self, where_clause: &WhereClause, mut visitor: impl FnMut(RecordId)) {
        self.for_all_matching(Prefix::Edge, where_clause, &mut visitor)
    }

    /// Confirm every variable `where_clause` references names a series
    /// that exists on *some* shard in the cluster. A column missing only
    /// on this shard is not an error by itself — that shard simply
    /// contributes no rows; this check is what distinguishes "missing
    /// here" from "missing everywhere", and needs a collective to tell
    /// the two apart.
    async fn validate_where_clause(&self, where_clause: &WhereClause) -> CoreResult<()> {
        for name in &where_clause.required {
            let local_exists = self.store_for(name.prefix).has_series(&name.local);
            let anywhere = self.comm.all_reduce_sum_u64(local_exists as u64).await;
            if anywhere == 0 {
                return Err(CoreError::UnknownVariable(name.qualified()));
            }
        }
        Ok(())
    }

    // ---- assign / add_faker_series ------------------------------------------

    pub fn assign<T: ColumnScalar>(
        &mut self,
        qname: &str,
        value: T,
        where_clause: &WhereClause,
    ) -> CoreResult<()> {
        let name = SeriesName::parse(qname)?;
        if !self.store_for(name.prefix).has_series(&name.local) {
            self.store_for_mut(name.prefix).add_series::<T>(&name.local)?;
        }
        let mut matches = Vec::new();
        self.for_all_matching(name.prefix, where_clause, |id| matches.push(id));
        let store = self.store_for_mut(name.prefix);
        for id in matches {
            store.set::<T>(&name.local, id, value.clone())?;
        }
        Ok(())
    }

    pub fn add_faker_series<T: ColumnScalar>(
        &mut self,
        qname: &str,
        mut generator: impl FnMut() -> T,
        where_clause: &WhereClause,
    ) -> CoreResult<()> {
        let name = SeriesName::parse(qname)?;
        if !self.store_for(name.prefix).has_series(&name.local) {
            self.store_for_mut(name.prefix).add_series::<T>(&name.local)?;
        }
        let mut matches = Vec::new();
        self.for_all_matching(name.prefix, where_clause, |id| matches.push(id));
        let store = self.store_for_mut(name.prefix);
        for id in matches {
            store.set::<T>(&name.local, id, generator())?;
        }
        Ok(())
    }

    // ---- cardinality, reduced across shards ---------------------------------

    pub async fn num_nodes(&self) -> u64 {
        self.comm.all_reduce_sum_u64(self.nodes.num_records() as u64).await
    }

    pub async fn num_edges(&self) -> u64 {
        self.comm.all_reduce_sum_u64(self.edges.num_records() as u64).await
    }

    // ---- degrees -------------------------------------------------------------

    /// Writes `node.in_degree`/`node.out_degree`/both into node columns,
    /// counting local edges only (each edge is only visible on shards
    /// that store it, matching the per-shard view this type represents).
    pub fn degrees(&mut self) -> CoreResult<()> {
        self.in_degree()?;
        self.out_degree()
    }

    pub fn in_degree(&mut self) -> CoreResult<()> {
        self.accumulate_degree("in_degree", |_u, v| v)
    }

    pub fn out_degree(&mut self) -> CoreResult<()> {
        self.accumulate_degree("out_degree", |u, _v| u)
    }

    fn accumulate_degree(
        &mut self,
        column: &str,
        pick: impl Fn(String, String) -> String,
    ) -> CoreResult<()> {
        let mut counts: HashMap<String, u64> = HashMap::new();
        self.edges.for_all_rows(|id| {
            if let (Ok(Some(CellValue::Str(u))), Ok(Some(CellValue::Str(v)))) =
                (self.edges.get_dynamic("u", id), self.edges.get_dynamic("v", id))
            {
                let strings = self.strings.borrow();
                if let (Some(u), Some(v)) = (strings.get_str(u), strings.get_str(v)) {
                    *counts.entry(pick(u.to_string(), v.to_string())).or_insert(0) += 1;
                    if !self.directed {
                        let (u, v) = (u.to_string(), v.to_string());
                        *counts.entry(pick(v, u)).or_insert(0) += 1;
                    }
                }
            }
        });

        if !self.nodes.has_series(column) {
            self.nodes.add_series::<u64>(column)?;
        }
        let node_ids: Vec<(RecordId, String)> = {
            let strings = self.strings.borrow();
            let mut out = Vec::new();
            self.nodes.for_all_rows(|id| {
                if let Ok(Some(CellValue::Str(loc))) = self.nodes.get_dynamic("id", id) {
                    if let Some(s) = strings.get_str(loc) {
                        out.push((id, s.to_string()));
                    }
                }
            });
            out
        };
        for (id, id_str) in node_ids {
            let count = counts.get(&id_str).copied().unwrap_or(0);
            self.nodes.set::<u64>(column, id, count)?;
        }
        Ok(())
    }

    // ---- n-hop reachability ---------------------------------------------------

    /// BFS to depth `k` from `seeds`, writing the hop distance at which
    /// each reached node was first visited into `output_series`
    /// (`u64`). Frontier expansion with per-hop barrier/message
    /// exchange over `Comm` — on a single shard this degenerates to a
    /// purely local BFS with barriers that are no-ops.
    pub async fn nhops(
        &mut self,
        output_series: &str,
        k: u32,
        seeds: &[String],
        where_clause: &WhereClause,
    ) -> CoreResult<()> {
        let name = SeriesName::parse(output_series)?;
        if name.prefix != Prefix::Node {
            return Err(CoreError::UnqualifiedName(format!(
                "nhops output series must be node.*: {output_series}"
            )));
        }
        self.validate_where_clause(where_clause).await?;
        if !self.nodes.has_series(&name.local) {
            self.nodes.add_series::<u64>(&name.local)?;
        }

        let mut visited: HashMap<String, u32> = HashMap::new();
        for seed in seeds {
            if self.node_lookup.contains_key(seed) {
                visited.entry(seed.clone()).or_insert(0);
            }
        }
        let mut frontier: HashSet<String> = visited.keys().cloned().collect();

        // Only edges matching `where_clause` participate in the frontier
        // expansion.
        let mut local_edges: Vec<(String, String)> = Vec::new();
        self.for_all_matching(Prefix::Edge, where_clause, |id| {
            if let (Ok(Some(CellValue::Str(u))), Ok(Some(CellValue::Str(v)))) =
                (self.edges.get_dynamic("u", id), self.edges.get_dynamic("v", id))
            {
                let strings = self.strings.borrow();
                if let (Some(u), Some(v)) = (strings.get_str(u), strings.get_str(v)) {
                    local_edges.push((u.to_string(), v.to_string()));
                }
            }
        });

        for hop in 1..=k {
            let mut next_frontier: HashSet<String> = HashSet::new();
            for (u, v) in &local_edges {
                if frontier.contains(u) && !visited.contains_key(v) {
                    next_frontier.insert(v.clone());
                }
                if !self.directed && frontier.contains(v) && !visited.contains_key(u) {
                    next_frontier.insert(u.clone());
                }
            }
            self.comm.barrier().await;
            for node in &next_frontier {
                // A node already visited (at an earlier, smaller hop)
                // never has its hop distance overwritten.
                visited.entry(node.clone()).or_insert(hop);
            }
            frontier = next_frontier;
            if frontier.is_empty() {
                break;
            }
        }

        for (id_str, hop) in visited {
            // Ingest already creates a node row for every edge endpoint,
            // so every id reached here should already exist locally;
            // never fabricate one that doesn't.
            if let Some(&record) = self.node_lookup.get(&id_str) {
                self.nodes.set::<u64>(&name.local, record, hop as u64)?;
            }
        }
        Ok(())
    }

    // ---- random sampling --------------------------------------------------

    async fn sample_ids(
        &self,
        prefix: Prefix,
        k: usize,
        seed: Option<u64>,
        where_clause: &WhereClause,
    ) -> CoreResult<Vec<RecordId>> {
        self.validate_where_clause(where_clause).await?;
        let mut local_matches = Vec::new();
        self.for_all_matching(prefix, where_clause, |id| local_matches.push(id));

        let local_count = local_matches.len() as u64;
        let lo = self.comm.prefix_sum_u64(local_count).await;
        let n: u64 = self.comm.all_reduce_sum_u64(local_count).await;
        let k_eff = (k as u64).min(n) as usize;

        let drawn: Vec<u64> = if self.comm.rank() == 0 {
            let seed = seed.unwrap_or_else(|| rand::random());
            let mut rng = StdRng::seed_from_u64(seed);
            let mut drawn: Vec<u64> = if n == 0 || k_eff == 0 {
                Vec::new()
            } else {
                sample_indices(&mut rng, n as usize, k_eff)
                    .into_iter()
                    .map(|v| v as u64)
                    .collect()
            };
            drawn.sort_unstable();
            drawn
        } else {
            Vec::new()
        };

        let drawn = self.comm.broadcast_u64_vec(drawn).await;

        let hi = lo + local_count;
        let mut selected = Vec::new();
        for global_idx in drawn {
            if global_idx >= lo && global_idx < hi {
                let local_idx = (global_idx - lo) as usize;
                selected.push(local_matches[local_idx]);
            }
        }
        Ok(selected)
    }

    pub async fn sample_edges(
        &mut self,
        out_series: &str,
        k: usize,
        seed: Option<u64>,
        where_clause: &WhereClause,
    ) -> CoreResult<()> {
        let selected = self.sample_ids(Prefix::Edge, k, seed, where_clause).await?;
        let name = SeriesName::parse(out_series)?;
        if !self.edges.has_series(&name.local) {
            self.edges.add_series::<bool>(&name.local)?;
        }
        for id in selected {
            self.edges.set::<bool>(&name.local, id, true)?;
        }
        Ok(())
    }

    pub async fn sample_nodes(
        &mut self,
        out_series: &str,
        k: usize,
        seed: Option<u64>,
        where_clause: &WhereClause,
    ) -> CoreResult<()> {
        let selected = self.sample_ids(Prefix::Node, k, seed, where_clause).await?;
        let name = SeriesName::parse(out_series)?;
        if !self.nodes.has_series(&name.local) {
            self.nodes.add_series::<bool>(&name.local)?;
        }
        for id in selected {
            self.nodes.set::<bool>(&name.local, id, true)?;
        }
        Ok(())
    }

    async fn select_sample(
        &mut self,
        prefix: Prefix,
        k: usize,
        metadata: &[String],
        seed: Option<u64>,
        where_clause: &WhereClause,
    ) -> CoreResult<Vec<JsonValue>> {
        let selected = self.sample_ids(prefix, k, seed, where_clause).await?;
        let store = self.store_for(prefix);
        let mut local_rows = Vec::new();
        for id in selected {
            let mut map = serde_json::Map::new();
            for col in metadata {
                if let Ok(Some(cell)) = store.get_dynamic(col, id) {
                    let value = crate::value::Value::from(cell);
                    map.insert(col.clone(), self.docs.to_json(&value, &self.strings.borrow()));
                }
            }
            local_rows.push(JsonValue::Object(map));
        }
        Ok(self.comm.gather_to_rank0_json(local_rows).await)
    }

    pub async fn select_sample_edges(
        &mut self,
        k: usize,
        metadata: &[String],
        seed: Option<u64>,
        where_clause: &WhereClause,
    ) -> CoreResult<Vec<JsonValue>> {
        self.select_sample(Prefix::Edge, k, metadata, seed, where_clause).await
    }

    pub async fn select_sample_nodes(
        &mut self,
        k: usize,
        metadata: &[String],
        seed: Option<u64>,
        where_clause: &WhereClause,
    ) -> CoreResult<Vec<JsonValue>> {
        self.select_sample(Prefix::Node, k, metadata, seed, where_clause).await
    }

    // ---- columnar file <-> record store bridge -------------------------------

    /// Ingest edges from one or more Parquet files under `path`. Sets
    /// `directed` on this graph to match the ingest call (a per-ingest
    /// argument, not a construction-time-only flag). Each row's
    /// `u_col`/`v_col` become `edge.u`/`edge.v`; `meta` names additional
    /// columns to carry over as edge series.
    #[tracing::instrument(skip(self, path, meta))]
    pub async fn ingest_parquet_edges(
        &mut self,
        path: impl AsRef<Path>,
        recursive: bool,
        u_col: &str,
        v_col: &str,
        directed: bool,
        meta: &[String],
    ) -> CoreResult<ReturnCode> {
        self.directed = directed;
        let batches = crate::parquet_bridge::read_parquet_files(path.as_ref(), recursive)?;
        let mut rc = ReturnCode::ok();
        let mut rows_ingested: u64 = 0;

        for batch in &batches {
            let schema = batch.schema();
            let u_idx = schema
                .index_of(u_col)
                .map_err(|_| CoreError::SeriesNotFound(u_col.to_string()))?;
            let v_idx = schema
                .index_of(v_col)
                .map_err(|_| CoreError::SeriesNotFound(v_col.to_string()))?;
            // Validated once per batch: the endpoint columns must map to
            // a byte-array (string) logical type, or ingest aborts
            // outright rather than skipping rows.
            crate::parquet_bridge::arrow_type_to_column_type(schema.field(u_idx).data_type(), u_col)?;
            crate::parquet_bridge::arrow_type_to_column_type(schema.field(v_idx).data_type(), v_col)?;

            let mut meta_cols = Vec::new();
            for name in meta {
                match schema.index_of(name) {
                    Ok(idx) => {
                        let column_type = crate::parquet_bridge::arrow_type_to_column_type(
                            schema.field(idx).data_type(),
                            name,
                        )?;
                        meta_cols.push((name.clone(), idx, column_type));
                    }
                    Err(_) => rc.warn("missing_meta_column"),
                }
            }

            for row in 0..batch.num_rows() {
                let u = match crate::parquet_bridge::raw_cell_at(batch, u_idx, row) {
                    Some(crate::parquet_bridge::RawCell::Bytes(b)) => {
                        String::from_utf8_lossy(&b).into_owned()
                    }
                    _ => {
                        rc.warn("null_edge_endpoint");
                        continue;
                    }
                };
                let v = match crate::parquet_bridge::raw_cell_at(batch, v_idx, row) {
                    Some(crate::parquet_bridge::RawCell::Bytes(b)) => {
                        String::from_utf8_lossy(&b).into_owned()
                    }
                    _ => {
                        rc.warn("null_edge_endpoint");
                        continue;
                    }
                };

                let edge_id = self.add_local_edge(&u, &v)?;
                if self.owns_node(&u) {
                    self.ensure_local_node(&u)?;
                }
                if self.owns_node(&v) {
                    self.ensure_local_node(&v)?;
                }

                for (name, idx, column_type) in &meta_cols {
                    match crate::parquet_bridge::raw_cell_at(batch, *idx, row) {
                        Some(raw) => {
                            if !self.edges.has_series(name) {
                                match column_type {
                                    ColumnType::Bool => self.edges.add_series::<bool>(name)?,
                                    ColumnType::I64 => self.edges.add_series::<i64>(name)?,
                                    ColumnType::U64 => self.edges.add_series::<u64>(name)?,
                                    ColumnType::F64 => self.edges.add_series::<f64>(name)?,
                                    ColumnType::Str => {
                                        self.edges.add_series::<StringLocator>(name)?
                                    }
                                }
                            }
                            match raw {
                                crate::parquet_bridge::RawCell::Bool(b) => {
                                    self.edges.set::<bool>(name, edge_id, b)?
                                }
                                crate::parquet_bridge::RawCell::I64(i) => {
                                    self.edges.set::<i64>(name, edge_id, i)?
                                }
                                crate::parquet_bridge::RawCell::F64(f) => {
                                    self.edges.set::<f64>(name, edge_id, f)?
                                }
                                crate::parquet_bridge::RawCell::Bytes(bytes) => {
                                    let locator = self.strings.borrow_mut().intern(&bytes)?;
                                    self.edges.set::<StringLocator>(name, edge_id, locator)?
                                }
                            }
                        }
                        None => rc.warn("null_meta_value"),
                    }
                }
                rows_ingested += 1;
            }
        }

        self.count_dangling_edge_endpoints(&mut rc).await;
        rc.return_info
            .insert("rows_ingested".into(), JsonValue::from(rows_ingested));
        Ok(rc)
    }

    /// Dangling edge endpoints are kept rather than dropped, but
    /// counted and reported as a warning: gather every node id any shard
    /// knows about, then count how many local edge endpoints appear in
    /// none of them.
    async fn count_dangling_edge_endpoints(&self, rc: &mut ReturnCode) {
        let local_known: Vec<JsonValue> = self
            .node_lookup
            .keys()
            .cloned()
            .map(JsonValue::from)
            .collect();
        let gathered = self.comm.gather_to_rank0_json(local_known).await;
        let global_ids: HashSet<String> = if self.comm.rank() == 0 {
            gathered
                .into_iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        } else {
            HashSet::new()
        };
        let broadcast = self
            .comm
            .broadcast_json(serde_json::to_value(global_ids).unwrap_or_default())
            .await;
        let known_anywhere: HashSet<String> = serde_json::from_value(broadcast).unwrap_or_default();

        let mut dangling = 0u64;
        self.edges.for_all_rows(|id| {
            if let (Ok(Some(CellValue::Str(u))), Ok(Some(CellValue::Str(v)))) =
                (self.edges.get_dynamic("u", id), self.edges.get_dynamic("v", id))
            {
                let strings = self.strings.borrow();
                for loc in [u, v] {
                    if let Some(s) = strings.get_str(loc) {
                        if !known_anywhere.contains(s) {
                            dangling += 1;
                        }
                    }
                }
            }
        });
        if dangling > 0 {
            rc.warnings.insert("dangling_edge_endpoint".into(), dangling);
        }
    }

    /// Dumping is purely local — each shard writes only its own rows to
    /// its own file — so unlike `ingest_parquet_edges` this needs no
    /// `Comm` round trip and stays a synchronous method.
    pub fn dump_parquet_nodes(
        &self,
        path_prefix: impl AsRef<Path>,
        meta: &[String],
        overwrite: bool,
    ) -> CoreResult<ReturnCode> {
        self.dump_parquet(Prefix::Node, path_prefix, meta, overwrite)
    }

    pub fn dump_parquet_edges(
        &self,
        path_prefix: impl AsRef<Path>,
        meta: &[String],
        overwrite: bool,
    ) -> CoreResult<ReturnCode> {
        self.dump_parquet(Prefix::Edge, path_prefix, meta, overwrite)
    }

    /// One file per shard: `<prefix>_{nodes|edges}_rank<N>.parquet`.
    fn dump_parquet(
        &self,
        prefix: Prefix,
        path_prefix: impl AsRef<Path>,
        meta: &[String],
        overwrite: bool,
    ) -> CoreResult<ReturnCode> {
        let store = self.store_for(prefix);
        let kind = match prefix {
            Prefix::Node => "nodes",
            Prefix::Edge => "edges",
        };
        let mut columns: Vec<String> = match prefix {
            Prefix::Node => vec!["id".to_string()],
            Prefix::Edge => vec!["u".to_string(), "v".to_string()],
        };
        columns.extend(meta.iter().cloned());

        let batch = crate::parquet_bridge::build_record_batch(store, &self.strings.borrow(), &columns)?;
        let file_path = PathBuf::from(format!(
            "{}_{}_rank{}.parquet",
            path_prefix.as_ref().display(),
            kind,
            self.comm.rank(),
        ));
        crate::parquet_bridge::write_parquet(&batch, &file_path, overwrite)?;

        let mut rc = ReturnCode::ok();
        rc.return_info
            .insert("path".into(), JsonValue::from(file_path.display().to_string()));
        rc.return_info
            .insert("rows".into(), JsonValue::from(batch.num_rows()));
        Ok(rc)
    }

    // ---- erase -----------------------------------------------------------------

    pub fn erase_edges_where(&mut self, where_clause: &WhereClause) -> CoreResult<ReturnCode> {
        let mut matches = Vec::new();
        self.for_all_matching(Prefix::Edge, where_clause, |id| matches.push(id));
        let erased = matches.len();
        for id in matches {
            self.edges.remove_record(id)?;
        }
        let mut rc = ReturnCode::ok();
        rc.return_info.insert("erased".into(), JsonValue::from(erased));
        Ok(rc)
    }

    /// Erase every edge whose value in `series` is in `haystack`.
    pub fn erase_edges_in_set(&mut self, series: &str, haystack: &HashSet<String>) -> CoreResult<ReturnCode> {
        let name = SeriesName::parse(series)?;
        if name.prefix != Prefix::Edge {
            return Err(CoreError::UnknownPrefix(series.to_string()));
        }
        let mut rc = ReturnCode::ok();
        if !self.edges.has_series(&name.local) {
            return Err(CoreError::SeriesNotFound(series.to_string()));
        }
        let mut matches = Vec::new();
        let strings = self.strings.clone();
        self.edges.for_all_rows(|id| {
            if let Ok(Some(CellValue::Str(loc))) = self.edges.get_dynamic(&name.local, id) {
                if let Some(s) = strings.borrow().get_str(loc) {
                    if haystack.contains(s) {
                        matches.push(id);
                    }
                }
            }
        });
        let erased = matches.len();
        for id in matches {
            self.edges.remove_record(id)?;
        }
        rc.return_info.insert("erased".into(), JsonValue::from(erased));
        Ok(rc)
    }
}
