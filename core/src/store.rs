use crate::{Error, QueryPlan, RecordPage, ResultDate, ResultSet, ResultSetId, StatsBundle};
use anyhow::Result;
use tracing::{debug, info, warn};

/// Read access to the scan records, in memory or persisted.
pub trait RecordStore {
    fn find_result_set(&self, date: ResultDate) -> Result<Option<ResultSet>>;

    /// Count records of one result set, or of the whole dataset with `None`.
    fn count_records(&self, result_set: Option<ResultSetId>) -> Result<u64>;

    /// Filter, order and paginate the records of `result_set`.
    fn query_records(&self, result_set: ResultSetId, plan: &QueryPlan) -> Result<RecordPage>;

    fn aggregate_stats(&self, result_set: ResultSetId) -> Result<StatsBundle>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn find_result_set(&self, date: ResultDate) -> Result<Option<ResultSet>> {
        (**self).find_result_set(date)
    }

    fn count_records(&self, result_set: Option<ResultSetId>) -> Result<u64> {
        (**self).count_records(result_set)
    }

    fn query_records(&self, result_set: ResultSetId, plan: &QueryPlan) -> Result<RecordPage> {
        (**self).query_records(result_set, plan)
    }

    fn aggregate_stats(&self, result_set: ResultSetId) -> Result<StatsBundle> {
        (**self).aggregate_stats(result_set)
    }
}

/// Materializes the result set of a date that has not been loaded yet.
pub trait Ingest {
    /// `Ok(None)` when there is no scan output for `date`.
    fn ingest(&self, date: ResultDate) -> Result<Option<ResultSet>>;
}

impl<F> Ingest for F
where
    F: Fn(ResultDate) -> Result<Option<ResultSet>>,
{
    fn ingest(&self, date: ResultDate) -> Result<Option<ResultSet>> {
        self(date)
    }
}

/// Look up the result set for `date`, ingesting it on first use.
pub fn resolve<S, I>(store: &S, ingester: &I, date: ResultDate) -> Result<ResultSet, Error>
where
    S: RecordStore + ?Sized,
    I: Ingest + ?Sized,
{
    if let Some(rs) = store.find_result_set(date)? {
        debug!(%date, id = rs.id, "result set found");
        return Ok(rs);
    }
    match ingester.ingest(date) {
        Ok(Some(rs)) => {
            info!(%date, id = rs.id, "ingested result set");
            Ok(rs)
        }
        Ok(None) => Err(Error::NotFound(date)),
        Err(e) => {
            warn!(%date, error = %e, "ingestion failed");
            Err(Error::IngestionFailed { date, source: e.into() })
        }
    }
}
