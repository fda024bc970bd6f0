use crate::ResultDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A required query parameter is missing, has the wrong type or is out of range.
    #[error("malformed query: {0}")]
    MalformedQuery(String),
    #[error("invalid date key {0}, expected YYYYMMDD")]
    InvalidDate(i64),
    /// The ingestion collaborator has no data for this date.
    #[error("no results for {0}")]
    NotFound(ResultDate),
    #[error("ingestion failed for {date}: {source}")]
    IngestionFailed {
        date: ResultDate,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedQuery(msg.into())
    }

    /// True for errors caused by the caller's input rather than the backend.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::MalformedQuery(_) | Error::InvalidDate(_) | Error::NotFound(_))
    }
}
