//! Solver trace capture.
//!
//! The allocation routines emit `tracing::info!` events, one per probe or
//! bidding round, under a per-routine target (`"bisection"`, `"market"`, ...).
//! This crate installs a subscriber that files each event as a row of a
//! column table keyed by that target. Columns appear as fields are first seen,
//! so no schema is declared up front.
//!
//! # Usage
//!
//! ```ignore
//! // In solver code:
//! tracing::info!(target: "bisection", round, t = mid, sum);
//!
//! // In a test:
//! instrument::install_subscriber();
//! instrument::clear();
//! // ... run a solver ...
//! let traces = instrument::drain();
//! let sums = traces.table("bisection").unwrap().f64s("sum").unwrap();
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Metadata, Subscriber};

// ============================================================================
// Tables
// ============================================================================

/// One typed column of a trace table.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceColumn {
    U64(Vec<u64>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl TraceColumn {
    pub fn len(&self) -> usize {
        match self {
            Self::U64(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill with the type's zero value up to `rows` entries.
    fn pad_to(&mut self, rows: usize) {
        let missing = rows.saturating_sub(self.len());
        match self {
            Self::U64(v) => v.extend(std::iter::repeat_n(0, missing)),
            Self::I64(v) => v.extend(std::iter::repeat_n(0, missing)),
            Self::F64(v) => v.extend(std::iter::repeat_n(0.0, missing)),
            Self::Bool(v) => v.extend(std::iter::repeat_n(false, missing)),
            Self::Str(v) => v.extend(std::iter::repeat_n(String::new(), missing)),
        }
    }
}

/// Events recorded under one target. Every column has `rows` entries.
#[derive(Debug, Clone, Default)]
pub struct TraceTable {
    pub columns: HashMap<String, TraceColumn>,
    pub rows: usize,
}

impl TraceTable {
    pub fn f64s(&self, name: &str) -> Option<&[f64]> {
        match self.columns.get(name)? {
            TraceColumn::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn u64s(&self, name: &str) -> Option<&[u64]> {
        match self.columns.get(name)? {
            TraceColumn::U64(v) => Some(v),
            _ => None,
        }
    }

    pub fn bools(&self, name: &str) -> Option<&[bool]> {
        match self.columns.get(name)? {
            TraceColumn::Bool(v) => Some(v),
            _ => None,
        }
    }

    fn align(&mut self) {
        let rows = self.rows;
        self.columns.values_mut().for_each(|c| c.pad_to(rows));
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        let columns = self
            .columns
            .iter()
            .map(|(name, col)| match col {
                TraceColumn::U64(v) => Column::new(name.into(), v),
                TraceColumn::I64(v) => Column::new(name.into(), v),
                TraceColumn::F64(v) => Column::new(name.into(), v),
                TraceColumn::Bool(v) => Column::new(name.into(), v),
                TraceColumn::Str(v) => Column::new(name.into(), v),
            })
            .collect();
        DataFrame::new(columns)
    }
}

/// All tables captured on this thread, keyed by event target.
#[derive(Debug, Clone, Default)]
pub struct Traces {
    pub tables: HashMap<String, TraceTable>,
}

impl Traces {
    pub fn table(&self, target: &str) -> Option<&TraceTable> {
        self.tables.get(target)
    }

    pub fn to_dataframes(&self) -> HashMap<String, DataFrame> {
        self.tables
            .iter()
            .filter_map(|(name, table)| table.to_dataframe().ok().map(|df| (name.clone(), df)))
            .collect()
    }
}

thread_local! {
    static TRACES: RefCell<Traces> = RefCell::default();
}

// ============================================================================
// Subscriber
// ============================================================================

/// Writes one event's fields into the current row.
struct RowVisitor<'a> {
    table: &'a mut TraceTable,
}

impl RowVisitor<'_> {
    /// Column for `field`, created zero-padded for earlier rows if new.
    fn column(&mut self, field: &Field, empty: impl FnOnce(usize) -> TraceColumn) -> &mut TraceColumn {
        let rows = self.table.rows;
        self.table
            .columns
            .entry(field.name().to_string())
            .or_insert_with(|| empty(rows))
    }
}

impl Visit for RowVisitor<'_> {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if let TraceColumn::U64(v) = self.column(field, |n| TraceColumn::U64(vec![0; n])) {
            v.push(value);
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if let TraceColumn::I64(v) = self.column(field, |n| TraceColumn::I64(vec![0; n])) {
            v.push(value);
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let TraceColumn::F64(v) = self.column(field, |n| TraceColumn::F64(vec![0.0; n])) {
            v.push(value);
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if let TraceColumn::Bool(v) = self.column(field, |n| TraceColumn::Bool(vec![false; n])) {
            v.push(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if let TraceColumn::Str(v) = self.column(field, |n| TraceColumn::Str(vec![String::new(); n])) {
            v.push(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{value:?}"));
    }
}

/// Files info-level events into the thread-local [`Traces`]. Spans are ignored.
pub struct TraceSubscriber;

impl Subscriber for TraceSubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event() && *metadata.level() <= tracing::Level::INFO
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let target = event.metadata().target().to_string();
        TRACES.with(|t| {
            let mut traces = t.borrow_mut();
            let table = traces.tables.entry(target).or_default();
            table.align();
            event.record(&mut RowVisitor { table: &mut *table });
            table.rows += 1;
            // Fields this event did not carry.
            table.align();
        });
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Install [`TraceSubscriber`] as the global default. Later calls are no-ops.
pub fn install_subscriber() {
    let _ = tracing::subscriber::set_global_default(TraceSubscriber);
}

/// Take everything recorded on this thread so far.
pub fn drain() -> Traces {
    TRACES.with(|t| std::mem::take(&mut *t.borrow_mut()))
}

/// Drop everything recorded on this thread so far.
pub fn clear() {
    TRACES.with(|t| *t.borrow_mut() = Traces::default());
}

pub fn drain_to_dataframes() -> HashMap<String, DataFrame> {
    drain().to_dataframes()
}

// ============================================================================
// Parquet export
// ============================================================================

/// Write each frame to `{dir}/{target}.parquet`.
pub fn save_parquet(dfs: &mut HashMap<String, DataFrame>, dir: &Path) -> PolarsResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| PolarsError::IO {
        error: e.into(),
        msg: None,
    })?;
    for (name, df) in dfs.iter_mut() {
        let file = std::fs::File::create(dir.join(format!("{name}.parquet"))).map_err(|e| {
            PolarsError::IO {
                error: e.into(),
                msg: None,
            }
        })?;
        ParquetWriter::new(file).finish(df)?;
    }
    Ok(())
}

/// Keep ASCII alphanumerics, replace the rest with `_`, cap at 60 chars.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(60)
        .collect()
}

/// Clears traces on creation and writes them as parquet on drop.
///
/// Each run lands in `{parent}/{name}_{unix_seconds}/`, followed by an empty
/// `_ready` file once every table is written.
///
/// ```ignore
/// let mut rec = instrument::ScopedRecorder::new("data", "bisection_sweep");
/// // ... run solvers ...
/// let dfs = rec.get();
/// ```
pub struct ScopedRecorder {
    run_dir: PathBuf,
    run_name: String,
    dfs: Option<HashMap<String, DataFrame>>,
}

impl ScopedRecorder {
    pub fn new(parent: impl Into<PathBuf>, name: &str) -> Self {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let run_name = format!("{}_{secs}", sanitize(name));
        let run_dir = parent.into().join(&run_name);
        clear();
        install_subscriber();
        Self {
            run_dir,
            run_name,
            dfs: None,
        }
    }

    /// Frames recorded so far. The first call drains the thread's traces;
    /// later calls return the same frames.
    pub fn get(&mut self) -> &HashMap<String, DataFrame> {
        self.dfs.get_or_insert_with(drain_to_dataframes)
    }

    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}

impl Drop for ScopedRecorder {
    fn drop(&mut self) {
        let mut dfs = self.dfs.take().unwrap_or_else(drain_to_dataframes);
        if dfs.is_empty() {
            return;
        }
        if let Err(e) = save_parquet(&mut dfs, &self.run_dir) {
            eprintln!("ScopedRecorder({}): failed to write parquet: {e}", self.run_name);
            return;
        }
        if let Err(e) = std::fs::File::create(self.run_dir.join("_ready")) {
            eprintln!("ScopedRecorder({}): failed to write _ready: {e}", self.run_name);
        }
    }
}
