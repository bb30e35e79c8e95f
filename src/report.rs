//! End-to-end report evaluation over a warehouse snapshot.
//!
//! ```text
//! ReportConfig ─┬─▶ build_rows → apply_filters → sort_rows ─▶ TableView
//!               └─▶ evaluate_formula (blocks, then calculation) ─▶ FormulaResult
//! ```
//!
//! Both halves read the same snapshot and the same effective window, so
//! table totals and metric values reconcile. Results are memoized per
//! warehouse version when the engine carries a cache.
//!
//! # Example
//!
//! ```ignore
//! use ledgerview::report::{load_report_config, load_required, ReportEngine};
//! use ledgerview::warehouse::{JsonDirLoader, Warehouse};
//!
//! let config = load_report_config("reports/monthly.toml")?;
//! let warehouse = Warehouse::new(JsonDirLoader::new("./data"));
//! load_required(&warehouse, &config).await;
//!
//! let engine = ReportEngine::new(Schema::ledger());
//! let output = engine.run(&warehouse.snapshot(), &config)?;
//! println!("{} rows", output.table.rows.len());
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::{compute_hash, CacheError, CacheKey, ReportCache};
use crate::config::Settings;
use crate::metric::{
    average_per_bucket, block_unit, evaluate_block_series, evaluate_formula, EvaluationContext,
    FormulaResult, SeriesPoint,
};
use crate::model::{
    FieldRef, FilterSet, MetricFormula, ReportConfig, Schema, SelectedField, SortItem, TimeGrain,
    TimeWindow,
};
use crate::units::UnitType;
use crate::view::{apply_filters, build_rows, infer_primary_entity, sort_rows, TableView};
use crate::warehouse::{EntityLoader, LoadError, Warehouse, WarehouseSnapshot};

/// Errors that can occur while loading or running a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to read report file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid report configuration in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("Unsupported report file format: {0} (expected .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Options for report evaluation.
#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Grain used when the report does not set one.
    pub default_grain: Option<TimeGrain>,
}

/// Everything a report produces for one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOutput {
    /// Warehouse version the output was computed from.
    pub version: u64,
    pub table: TableView,
    /// `None` when the report has no formula.
    pub formula: Option<FormulaResult>,
}

/// Per-bucket values of one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSeries {
    pub block_id: String,
    pub unit: UnitType,
    pub points: Vec<SeriesPoint>,
}

impl BlockSeries {
    pub fn average_per_bucket(&self) -> Option<f64> {
        average_per_bucket(&self.points)
    }
}

/// Runs report configurations against warehouse snapshots.
pub struct ReportEngine {
    schema: Schema,
    options: ReportOptions,
    cache: Option<ReportCache>,
}

impl ReportEngine {
    /// An engine without memoization.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            options: ReportOptions::default(),
            cache: None,
        }
    }

    /// An engine configured from settings: merged schema, default grain and
    /// cache switch.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut engine = Self::new(settings.effective_schema());
        engine.options.default_grain = settings.report.default_grain;
        if settings.report.cache_enabled {
            engine = engine.with_cache();
        }
        engine
    }

    pub fn with_cache(mut self) -> Self {
        self.cache = Some(ReportCache::new());
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn cache(&self) -> Option<&ReportCache> {
        self.cache.as_ref()
    }

    /// Materialize, filter and sort the report table.
    pub fn table(
        &self,
        snapshot: &WarehouseSnapshot,
        config: &ReportConfig,
    ) -> ReportResult<TableView> {
        let request = TableRequest::from(config);
        self.memoized(snapshot, CacheKey::table, &request, || {
            compute_table(snapshot, &self.schema, config)
        })
    }

    /// Evaluate the report formula. `None` when the report has none.
    ///
    /// Block values always cover the whole window. The report grain only
    /// shapes [`Self::series`].
    pub fn metrics(
        &self,
        snapshot: &WarehouseSnapshot,
        config: &ReportConfig,
    ) -> ReportResult<Option<FormulaResult>> {
        let Some(formula) = &config.formula else {
            return Ok(None);
        };
        let window = config.effective_window();
        let request = FormulaRequest {
            formula,
            window: window.as_ref(),
            grain: None,
        };

        self.memoized(snapshot, CacheKey::formula, &request, || {
            let ctx = self.context(snapshot, window.as_ref(), None);
            evaluate_formula(formula, &ctx)
        })
        .map(Some)
    }

    /// One series per formula block, bucketed by the report grain.
    pub fn series(
        &self,
        snapshot: &WarehouseSnapshot,
        config: &ReportConfig,
    ) -> ReportResult<Vec<BlockSeries>> {
        let Some(formula) = &config.formula else {
            return Ok(Vec::new());
        };
        let window = config.effective_window();
        let request = FormulaRequest {
            formula,
            window: window.as_ref(),
            grain: self.grain(config),
        };

        self.memoized(snapshot, CacheKey::series, &request, || {
            let ctx = self.context(snapshot, window.as_ref(), request.grain);
            formula
                .blocks
                .iter()
                .map(|block| BlockSeries {
                    block_id: block.id.clone(),
                    unit: block_unit(block, &self.schema),
                    points: evaluate_block_series(block, &ctx),
                })
                .collect()
        })
    }

    /// Table and formula in one recomputation pass.
    pub fn run(
        &self,
        snapshot: &WarehouseSnapshot,
        config: &ReportConfig,
    ) -> ReportResult<ReportOutput> {
        if let Some(cache) = &self.cache {
            cache.retain_version(snapshot.version());
        }

        Ok(ReportOutput {
            version: snapshot.version(),
            table: self.table(snapshot, config)?,
            formula: self.metrics(snapshot, config)?,
        })
    }

    fn grain(&self, config: &ReportConfig) -> Option<TimeGrain> {
        config.grain.or(self.options.default_grain)
    }

    fn context<'a>(
        &'a self,
        snapshot: &'a WarehouseSnapshot,
        window: Option<&'a TimeWindow>,
        grain: Option<TimeGrain>,
    ) -> EvaluationContext<'a> {
        let mut ctx = EvaluationContext::new(snapshot, &self.schema);
        ctx.window = window;
        ctx.grain = grain;
        ctx
    }

    fn memoized<R, T, F>(
        &self,
        snapshot: &WarehouseSnapshot,
        key: fn(u64, &str) -> String,
        request: &R,
        compute: F,
    ) -> ReportResult<T>
    where
        R: Serialize,
        T: Serialize + serde::de::DeserializeOwned,
        F: FnOnce() -> T,
    {
        let Some(cache) = &self.cache else {
            return Ok(compute());
        };
        let hash = compute_hash(request).map_err(CacheError::from)?;
        let key = key(snapshot.version(), &hash);
        Ok(cache.get_or_compute(&key, snapshot.version(), compute)?)
    }
}

/// The inputs that determine a table.
#[derive(Serialize)]
struct TableRequest<'a> {
    fields: &'a [SelectedField],
    field_order: &'a [String],
    primary: Option<&'a str>,
    filters: &'a FilterSet,
    window: Option<TimeWindow>,
    sort: Option<&'a SortItem>,
}

impl<'a> From<&'a ReportConfig> for TableRequest<'a> {
    fn from(config: &'a ReportConfig) -> Self {
        Self {
            fields: &config.fields,
            field_order: &config.field_order,
            primary: config.primary.as_deref(),
            filters: &config.filters,
            window: config.effective_window(),
            sort: config.sort.as_ref(),
        }
    }
}

/// The inputs that determine a formula evaluation.
#[derive(Serialize)]
struct FormulaRequest<'a> {
    formula: &'a MetricFormula,
    window: Option<&'a TimeWindow>,
    grain: Option<TimeGrain>,
}

/// Build the report table without memoization.
///
/// Filter conditions on fields that are not displayed are evaluated against
/// hidden columns, which are dropped from the returned rows.
pub fn compute_table(snapshot: &WarehouseSnapshot, schema: &Schema, config: &ReportConfig) -> TableView {
    let Some(primary) = config
        .primary
        .clone()
        .or_else(|| infer_primary_entity(&config.fields))
    else {
        return TableView::default();
    };

    let mut projection: Vec<SelectedField> = config.fields.clone();
    let mut hidden: Vec<String> = Vec::new();
    for condition in &config.filters.conditions {
        let field = &condition.field;
        let reachable =
            field.entity == primary || schema.join_keys(&primary, &field.entity).is_some();
        if reachable && !projection.contains(field) {
            hidden.push(field.qualified());
            projection.push(field.clone());
        }
    }

    let window = config.effective_window();
    let mut table = build_rows(snapshot, schema, &projection, Some(&primary), window.as_ref());

    table.columns.retain(|c| !hidden.contains(c));
    table.reorder_columns(&config.field_order);

    let mut rows = apply_filters(table.rows, &config.filters.conditions, schema);
    if let Some(sort) = &config.sort {
        rows = sort_rows(rows, &sort.column, sort.direction);
    }
    if !hidden.is_empty() {
        for row in &mut rows {
            row.values.retain(|column, _| !hidden.contains(column));
        }
    }
    table.rows = rows;
    table
}

/// Load every entity the report reads. Failures are returned rather than
/// raised: a missing entity simply reads as empty.
pub async fn load_required<L: EntityLoader>(
    warehouse: &Warehouse<L>,
    config: &ReportConfig,
) -> Vec<LoadError> {
    warehouse
        .preload(&config.required_entities())
        .await
        .into_iter()
        .filter_map(|(_, result)| result.err())
        .collect()
}

/// Load a report configuration from a `.toml` or `.json` file.
pub fn load_report_config<P: AsRef<Path>>(path: P) -> ReportResult<ReportConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let invalid = |message: String| ReportError::InvalidConfig {
        path: path.to_path_buf(),
        message,
    };

    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| invalid(e.to_string())),
        Some("json") => serde_json::from_str(&content).map_err(|e| invalid(e.to_string())),
        _ => Err(ReportError::UnsupportedFormat(path.to_path_buf())),
    }
}

impl ReportConfig {
    /// Entities the report reads, in first-reference order: selected fields,
    /// table filters, then block sources and block filters.
    pub fn required_entities(&self) -> Vec<String> {
        let mut refs: Vec<&FieldRef> = self.fields.iter().collect();
        refs.extend(self.filters.conditions.iter().map(|c| &c.field));
        if let Some(formula) = &self.formula {
            for block in &formula.blocks {
                refs.extend(block.source.iter());
                refs.extend(block.active_filter().map(|c| &c.field));
            }
        }

        let mut entities: Vec<String> = Vec::new();
        for field in refs {
            if !entities.contains(&field.entity) {
                entities.push(field.entity.clone());
            }
        }
        if let Some(primary) = &self.primary {
            if !entities.contains(primary) {
                entities.insert(0, primary.clone());
            }
        }
        entities
    }
}

/// A committed value plus an optional pending draft.
///
/// Edits go to the draft; the engine is only ever handed
/// [`committed`](Staged::committed). `apply` promotes the draft, `discard`
/// drops it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Staged<T: Clone> {
    committed: T,
    pending: Option<T>,
}

impl<T: Clone> Staged<T> {
    pub fn new(committed: T) -> Self {
        Self {
            committed,
            pending: None,
        }
    }

    pub fn committed(&self) -> &T {
        &self.committed
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.pending.is_some()
    }

    /// Mutable access to the draft, started from the committed value.
    pub fn edit(&mut self) -> &mut T {
        let committed = &self.committed;
        self.pending.get_or_insert_with(|| committed.clone())
    }

    /// Promote the draft. Returns false when there was nothing to apply.
    pub fn apply(&mut self) -> bool {
        match self.pending.take() {
            Some(draft) => {
                self.committed = draft;
                true
            }
            None => false,
        }
    }

    pub fn discard(&mut self) {
        self.pending = None;
    }
}
