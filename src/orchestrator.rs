//! Query execution across years and partitions.
//!
//! A query moves through `Init -> Resolving -> Streaming -> Finalized`, or ends
//! in `Failed` from `Resolving`/`Streaming`. Partitions are streamed batch by
//! batch into per-partition counters which are merged in plan order, so the
//! result does not depend on batch sizes or on whether partitions ran in
//! parallel. A failed query never returns partial counts.

use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use tracing::{debug, info, warn};

use crate::aggregate::{Aggregator, RunningCounters};
use crate::config::{DatasetProfile, QueryConfig};
use crate::errors::TallyError;
use crate::geography::RegionFilterSet;
use crate::metrics::ScanStats;
use crate::normalize::RowNormalizer;
use crate::source::{PartitionReader, PartitionRef};
use crate::summary::{SummaryBuilder, SummaryOutcome};
use crate::types::{ColumnName, GroupCode, RegionAbbr, Year};

/// Lifecycle state of one query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryState {
    /// Created, nothing resolved yet.
    Init,
    /// Validating regions and planning partitions.
    Resolving,
    /// Reading batches and aggregating.
    Streaming,
    /// Summary built.
    Finalized,
    /// Aborted; counters were discarded.
    Failed,
}

/// Validated state machine for a query.
#[derive(Debug)]
pub struct QueryLifecycle {
    state: QueryState,
}

impl Default for QueryLifecycle {
    fn default() -> Self {
        Self {
            state: QueryState::Init,
        }
    }
}

impl QueryLifecycle {
    /// Lifecycle in `Init`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> QueryState {
        self.state
    }

    /// Move to `to`, rejecting transitions the lifecycle does not allow.
    pub fn advance(&mut self, to: QueryState) -> Result<(), TallyError> {
        use QueryState::*;
        let allowed = matches!(
            (self.state, to),
            (Init, Resolving)
                | (Resolving, Streaming)
                | (Streaming, Finalized)
                | (Resolving, Failed)
                | (Streaming, Failed)
        );
        if !allowed {
            return Err(TallyError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!(from = ?self.state, to = ?to, "query state transition");
        self.state = to;
        Ok(())
    }
}

/// Shared cancellation flag checked between batches.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once `cancel` was called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn check(&self) -> Result<(), TallyError> {
        if self.is_cancelled() {
            return Err(TallyError::Cancelled);
        }
        Ok(())
    }
}

/// What to aggregate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryRequest {
    /// Dataset group, e.g. `DENG` or `DO`.
    pub group_code: GroupCode,
    /// Years to include; duplicates are ignored.
    pub years: Vec<Year>,
    /// Optional state abbreviations restricting municipalities.
    pub regions: Option<Vec<RegionAbbr>>,
}

impl QueryRequest {
    /// Request covering every region.
    pub fn new(group_code: impl Into<GroupCode>, years: impl IntoIterator<Item = Year>) -> Self {
        Self {
            group_code: group_code.into(),
            years: years.into_iter().collect(),
            regions: None,
        }
    }

    /// Restrict the request to the given state abbreviations.
    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RegionAbbr>,
    {
        self.regions = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    fn distinct_years(&self) -> Vec<Year> {
        let mut years = Vec::with_capacity(self.years.len());
        for year in &self.years {
            if !years.contains(year) {
                years.push(*year);
            }
        }
        years
    }
}

/// Successful query result plus scan counters.
#[derive(Clone, Debug)]
pub struct QueryReport {
    /// Summary, tagged complete or empty.
    pub outcome: SummaryOutcome,
    /// Row and partition counters.
    pub stats: ScanStats,
}

#[derive(Default)]
struct PartitionScan {
    counters: RunningCounters,
    stats: ScanStats,
    schema: Option<Arc<Vec<ColumnName>>>,
}

impl PartitionScan {
    /// Fold `next`, which follows `self` in plan order.
    fn absorb(mut self, next: PartitionScan) -> Self {
        self.counters.merge_from(next.counters);
        self.stats.merge(&next.stats);
        if self.schema.is_none() {
            self.schema = next.schema;
        }
        self
    }
}

/// Drives partition reading, normalization, filtering, and aggregation for
/// one dataset profile.
pub struct Orchestrator<R> {
    reader: Arc<R>,
    profile: DatasetProfile,
    config: QueryConfig,
}

impl<R> Clone for Orchestrator<R> {
    fn clone(&self) -> Self {
        Self {
            reader: Arc::clone(&self.reader),
            profile: self.profile.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: PartitionReader> Orchestrator<R> {
    /// Orchestrator with default query settings.
    pub fn new(reader: R, profile: DatasetProfile) -> Self {
        Self {
            reader: Arc::new(reader),
            profile,
            config: QueryConfig::default(),
        }
    }

    /// Replace the query settings.
    pub fn with_config(mut self, config: QueryConfig) -> Self {
        self.config = config;
        self
    }

    /// Profile this orchestrator aggregates with.
    pub fn profile(&self) -> &DatasetProfile {
        &self.profile
    }

    /// Run a query to completion on the calling thread.
    pub fn execute(
        &self,
        request: &QueryRequest,
        partitions: &[PartitionRef],
    ) -> Result<QueryReport, TallyError> {
        self.execute_with_cancel(request, partitions, &CancellationToken::new())
    }

    /// Run a query, aborting with `Cancelled` once `token` is cancelled.
    pub fn execute_with_cancel(
        &self,
        request: &QueryRequest,
        partitions: &[PartitionRef],
        token: &CancellationToken,
    ) -> Result<QueryReport, TallyError> {
        let mut lifecycle = QueryLifecycle::new();
        lifecycle.advance(QueryState::Resolving)?;
        info!(
            system = %self.profile.system,
            group = %request.group_code,
            years = ?request.years,
            regions = ?request.regions,
            "query started"
        );

        let resolved = self.resolve(request, partitions);
        let (filter, plan, mut stats) = match resolved {
            Ok(resolved) => resolved,
            Err(err) => return Err(self.fail(&mut lifecycle, err)),
        };
        lifecycle.advance(QueryState::Streaming)?;

        let (counters, scan_stats, schema) = match self.stream(&plan, &filter, token) {
            Ok(streamed) => streamed,
            Err(err) => return Err(self.fail(&mut lifecycle, err)),
        };
        stats.merge(&scan_stats);

        let columns = schema.map(|schema| schema.as_ref().clone()).unwrap_or_default();
        let summary = SummaryBuilder::for_profile(&self.profile).build(counters, columns);
        lifecycle.advance(QueryState::Finalized)?;
        info!(
            system = %self.profile.system,
            group = %request.group_code,
            total_records = summary.total_records(),
            municipalities = summary.municipalities().len(),
            rows_scanned = stats.rows_scanned,
            partitions_missing = stats.partitions_missing,
            "query finished"
        );
        Ok(QueryReport {
            outcome: SummaryOutcome::from_summary(summary),
            stats,
        })
    }

    /// Run a query on a background thread.
    pub fn spawn(&self, request: QueryRequest, partitions: Vec<PartitionRef>) -> QueryHandle
    where
        R: 'static,
    {
        let orchestrator = self.clone();
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let (sender, receiver) = mpsc::sync_channel(1);
        let handle = thread::spawn(move || {
            let result = orchestrator.execute_with_cancel(&request, &partitions, &worker_token);
            let _ = sender.send(result);
        });
        QueryHandle {
            receiver,
            handle: Some(handle),
            token,
            ready: None,
        }
    }

    fn fail(&self, lifecycle: &mut QueryLifecycle, err: TallyError) -> TallyError {
        warn!(
            system = %self.profile.system,
            state = ?lifecycle.state(),
            error = %err,
            "query failed"
        );
        match lifecycle.advance(QueryState::Failed) {
            Ok(()) => err,
            Err(transition) => transition,
        }
    }

    fn resolve(
        &self,
        request: &QueryRequest,
        partitions: &[PartitionRef],
    ) -> Result<(RegionFilterSet, Vec<PartitionRef>, ScanStats), TallyError> {
        self.profile.validate()?;
        let filter =
            RegionFilterSet::from_abbreviations(request.regions.as_deref(), self.config.region_policy)?;
        let years = request.distinct_years();
        let mut stats = ScanStats::default();
        let mut plan = Vec::new();
        for year in &years {
            let before = plan.len();
            plan.extend(
                partitions
                    .iter()
                    .filter(|partition| partition.year == *year)
                    .cloned(),
            );
            if plan.len() == before {
                warn!(year = *year, "no partition provided for year; skipping");
                stats.partitions_missing += 1;
            }
        }
        let ignored = partitions
            .iter()
            .filter(|partition| !years.contains(&partition.year))
            .count();
        if ignored > 0 {
            debug!(ignored, "ignoring partitions for years outside the request");
        }
        debug!(
            partitions = plan.len(),
            prefixes = ?filter.prefixes().collect::<Vec<_>>(),
            "query planned"
        );
        Ok((filter, plan, stats))
    }

    fn stream(
        &self,
        plan: &[PartitionRef],
        filter: &RegionFilterSet,
        token: &CancellationToken,
    ) -> Result<(RunningCounters, ScanStats, Option<Arc<Vec<ColumnName>>>), TallyError> {
        let columns = self.profile.required_columns();
        let scan = |partition: &PartitionRef| self.scan_partition(partition, &columns, filter, token);
        let merged = if self.config.parallel_partitions {
            plan.par_iter()
                .map(scan)
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .fold(PartitionScan::default(), PartitionScan::absorb)
        } else {
            plan.iter()
                .try_fold(PartitionScan::default(), |running, partition| {
                    scan(partition).map(|next| running.absorb(next))
                })?
        };
        Ok((merged.counters, merged.stats, merged.schema))
    }

    fn scan_partition(
        &self,
        partition: &PartitionRef,
        columns: &[ColumnName],
        filter: &RegionFilterSet,
        token: &CancellationToken,
    ) -> Result<PartitionScan, TallyError> {
        token.check()?;
        let batches = match self.reader.read(partition, columns) {
            Ok(batches) => batches,
            Err(err) if err.is_recoverable() => {
                warn!(
                    year = partition.year,
                    path = %partition.path.display(),
                    error = %err,
                    "partition not found; skipping"
                );
                let mut scan = PartitionScan::default();
                scan.stats.partitions_missing = 1;
                return Ok(scan);
            }
            Err(err) => return Err(err),
        };

        let mut scan = PartitionScan::default();
        scan.stats.partitions_read = 1;
        let mut aggregator = Aggregator::new();
        let mut bound: Option<(Arc<Vec<ColumnName>>, RowNormalizer)> = None;
        let mut last_source: Option<PathBuf> = None;

        for batch in batches {
            token.check()?;
            let batch = batch?;
            scan.stats.batches += 1;
            if last_source.as_ref() != Some(&batch.source) {
                scan.stats.files += 1;
                last_source = Some(batch.source.clone());
            }
            if scan.schema.is_none() && !batch.is_empty() {
                scan.schema = Some(Arc::clone(&batch.columns));
            }
            let stale = bound
                .as_ref()
                .is_none_or(|(schema, _)| !Arc::ptr_eq(schema, &batch.columns));
            if stale {
                let normalizer = RowNormalizer::for_columns(&self.profile, &batch.columns);
                if normalizer.municipality_column().is_none() {
                    warn!(
                        year = partition.year,
                        path = %batch.source.display(),
                        candidates = ?self.profile.municipality_columns,
                        "file has no municipality column; its rows are not counted"
                    );
                }
                bound = Some((Arc::clone(&batch.columns), normalizer));
            }
            let Some((_, normalizer)) = bound.as_ref() else {
                continue;
            };

            let counted_before = scan.stats.rows_counted;
            for row in &batch.rows {
                scan.stats.rows_scanned += 1;
                match normalizer.normalize(row) {
                    Ok(key) if filter.accepts(&key.municipality) => {
                        aggregator.observe(key);
                        scan.stats.rows_counted += 1;
                    }
                    Ok(_) => scan.stats.rows_out_of_region += 1,
                    Err(rejection) => scan.stats.record_rejection(rejection),
                }
            }
            debug!(
                year = partition.year,
                path = %batch.source.display(),
                rows = batch.len(),
                counted = scan.stats.rows_counted - counted_before,
                "batch aggregated"
            );
        }

        debug!(
            year = partition.year,
            path = %partition.path.display(),
            files = scan.stats.files,
            rows = scan.stats.rows_scanned,
            counted = scan.stats.rows_counted,
            "partition scanned"
        );
        scan.counters = aggregator.into_counters();
        Ok(scan)
    }
}

/// Handle to a query running on a background thread.
///
/// Dropping the handle cancels the query and waits for the worker to exit.
pub struct QueryHandle {
    receiver: mpsc::Receiver<Result<QueryReport, TallyError>>,
    handle: Option<thread::JoinHandle<()>>,
    token: CancellationToken,
    ready: Option<Result<QueryReport, TallyError>>,
}

impl QueryHandle {
    /// Request cancellation; the worker stops at the next batch boundary.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token shared with the worker.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Non-blocking check for completion.
    pub fn is_finished(&mut self) -> bool {
        if self.ready.is_some() {
            return true;
        }
        match self.receiver.try_recv() {
            Ok(result) => {
                self.ready = Some(result);
                true
            }
            Err(mpsc::TryRecvError::Empty) => false,
            Err(mpsc::TryRecvError::Disconnected) => {
                self.ready = Some(Err(TallyError::WorkerStopped));
                true
            }
        }
    }

    /// Return the result if the query has finished, or the handle otherwise.
    pub fn try_join(mut self) -> Result<Result<QueryReport, TallyError>, QueryHandle> {
        if self.is_finished() {
            return Ok(self.join());
        }
        Err(self)
    }

    /// Block until the query finishes.
    pub fn join(mut self) -> Result<QueryReport, TallyError> {
        let result = match self.ready.take() {
            Some(result) => result,
            None => self
                .receiver
                .recv()
                .unwrap_or(Err(TallyError::WorkerStopped)),
        };
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        result
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.token.cancel();
            let _ = handle.join();
        }
    }
}
