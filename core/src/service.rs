use crate::params::ParamTree;
use crate::store::resolve;
use crate::{translate, Error, Ingest, RecordStore, ResultDate, ResultSet, Row, StatsBundle, StatsCache};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Payload of the data endpoint, in the DataTables server-side format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResponse {
    /// Always a JSON number; the request value never reaches the output as text.
    pub draw: i64,
    pub records_total: u64,
    pub records_filtered: u64,
    pub data: Vec<Row>,
}

/// Everything the results page template renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageContext {
    pub records_length: u64,
    /// `YYYY-MM-DD`
    pub date: String,
    pub stats: StatsBundle,
    pub ajax_url: String,
}

/// Request handling state shared by every worker: the record store, the
/// ingestion collaborator and the statistics cache.
pub struct Tracker<S, I> {
    store: S,
    ingester: I,
    stats: StatsCache,
}

impl<S: RecordStore, I: Ingest> Tracker<S, I> {
    pub fn new(store: S, ingester: I) -> Self {
        Tracker { store, ingester, stats: StatsCache::new() }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn stats_cache(&self) -> &StatsCache {
        &self.stats
    }

    pub fn resolve(&self, date: ResultDate) -> Result<ResultSet, Error> {
        resolve(&self.store, &self.ingester, date)
    }

    pub fn stats(&self, rs: &ResultSet) -> Result<Arc<StatsBundle>, Error> {
        self.stats.get_or_compute(rs.id, |id| self.store.aggregate_stats(id))
    }

    pub fn page(&self, date: ResultDate) -> Result<PageContext, Error> {
        let rs = self.resolve(date)?;
        let records_length = self.store.count_records(Some(rs.id))?;
        let stats = self.stats(&rs)?;
        Ok(PageContext { records_length, date: date.iso(), stats: (*stats).clone(), ajax_url: data_url(date) })
    }

    /// Serve one grid request. The parameters are validated before the
    /// result set is resolved, so a malformed request never triggers ingestion.
    pub fn data<P, K, V>(&self, date: ResultDate, params: P) -> Result<DataResponse, Error>
    where
        P: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.data_from_tree(date, &ParamTree::from_pairs(params))
    }

    pub fn data_from_query(&self, date: ResultDate, query: &str) -> Result<DataResponse, Error> {
        self.data_from_tree(date, &ParamTree::from_query_string(query))
    }

    fn data_from_tree(&self, date: ResultDate, tree: &ParamTree) -> Result<DataResponse, Error> {
        let plan = translate(tree)?;
        debug!(%date, column = %plan.column, direction = ?plan.direction, start = plan.start, length = plan.length, "data request");
        let rs = self.resolve(date)?;
        let page = self.store.query_records(rs.id, &plan)?;
        Ok(DataResponse {
            draw: plan.draw,
            records_total: page.total,
            records_filtered: page.filtered,
            data: page.rows,
        })
    }
}

pub fn data_url(date: ResultDate) -> String {
    format!("/results/{date}/data")
}
