//! In-memory record collection and the reference query executor.

use crate::plan::Direction;
use crate::{QueryPlan, Record, RecordPage, RecordStore, ResultDate, ResultSet, ResultSetId, Row, ScanRecord, StatsBundle};
use anyhow::{bail, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

/// Apply `plan` to `records`, which must be in insertion order.
/// Returns the requested page and the number of records that matched the search.
pub fn execute<'a, I>(records: I, plan: &QueryPlan) -> (Vec<Row>, u64)
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut matched: Vec<&Record> = records
        .into_iter()
        .filter(|r| plan.search.is_empty() || r.matches(&plan.search))
        .collect();
    let filtered = matched.len() as u64;

    // sort_by is stable: equal keys keep insertion order in both directions
    match plan.direction {
        Direction::Asc => matched.sort_by(|a, b| plan.column.compare(a, b)),
        Direction::Desc => matched.sort_by(|a, b| plan.column.compare(b, a)),
    }

    let start = usize::try_from(plan.start).unwrap_or(usize::MAX);
    let length = usize::try_from(plan.length).unwrap_or(usize::MAX);
    let rows = matched.into_iter().skip(start).take(length).map(Record::row).collect();
    (rows, filtered)
}

#[derive(Default)]
struct Inner {
    result_sets: Vec<ResultSet>,
    records: Vec<Record>,
}

/// Thread-safe record store kept in process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    aggregate_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a whole result set at once. Ids continue the dataset-wide sequence.
    pub fn insert_result_set(&self, date: ResultDate, scans: Vec<ScanRecord>) -> Result<ResultSet> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.result_sets.iter().any(|rs| rs.date == date) {
            bail!("result set for {date} already exists");
        }
        let rs = ResultSet { id: inner.result_sets.len() as ResultSetId + 1, date };
        let mut next_id = inner.records.len() as i64 + 1;
        for scan in scans {
            inner.records.push(Record::from_scan(next_id, rs.id, scan));
            next_id += 1;
        }
        inner.result_sets.push(rs);
        Ok(rs)
    }

    pub fn result_sets(&self) -> Vec<ResultSet> {
        self.read().result_sets.clone()
    }

    /// How many times the statistics aggregation has run.
    pub fn aggregate_calls(&self) -> usize {
        self.aggregate_calls.load(Ordering::SeqCst)
    }
}

impl RecordStore for MemoryStore {
    fn find_result_set(&self, date: ResultDate) -> Result<Option<ResultSet>> {
        Ok(self.read().result_sets.iter().find(|rs| rs.date == date).copied())
    }

    fn count_records(&self, result_set: Option<ResultSetId>) -> Result<u64> {
        let inner = self.read();
        Ok(match result_set {
            Some(id) => inner.records.iter().filter(|r| r.result_set == id).count() as u64,
            None => inner.records.len() as u64,
        })
    }

    fn query_records(&self, result_set: ResultSetId, plan: &QueryPlan) -> Result<RecordPage> {
        let inner = self.read();
        let (rows, filtered) = execute(inner.records.iter().filter(|r| r.result_set == result_set), plan);
        Ok(RecordPage { rows, total: inner.records.len() as u64, filtered })
    }

    fn aggregate_stats(&self, result_set: ResultSetId) -> Result<StatsBundle> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        let inner = self.read();
        let mut stats = StatsBundle::default();
        for r in inner.records.iter().filter(|r| r.result_set == result_set) {
            stats.add(r);
        }
        Ok(stats)
    }
}
