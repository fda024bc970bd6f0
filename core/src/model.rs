use crate::Error;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use time::{Date, Month};

pub type ResultSetId = i64;
pub type RecordId = i64;

/// Calendar day of an ingestion run, keyed on the wire as `YYYYMMDD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResultDate(Date);

impl ResultDate {
    pub fn from_key(key: i64) -> Result<Self, Error> {
        if !(10000101..=99991231).contains(&key) {
            return Err(Error::InvalidDate(key));
        }
        let (year, month, day) = (key / 10_000, (key / 100) % 100, key % 100);
        let month = Month::try_from(month as u8).map_err(|_| Error::InvalidDate(key))?;
        Date::from_calendar_date(year as i32, month, day as u8)
            .map(ResultDate)
            .map_err(|_| Error::InvalidDate(key))
    }

    pub fn key(&self) -> i64 {
        let d = self.0;
        d.year() as i64 * 10_000 + u8::from(d.month()) as i64 * 100 + d.day() as i64
    }

    /// `YYYY-MM-DD`, used by the page view.
    pub fn iso(&self) -> String {
        let d = self.0;
        format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
    }

    pub fn date(&self) -> Date {
        self.0
    }
}

impl fmt::Display for ResultDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08}", self.key())
    }
}

impl FromStr for ResultDate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.len() != 8 || !t.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidDate(t.parse().unwrap_or(-1)));
        }
        let key: i64 = t.parse().map_err(|_| Error::InvalidDate(-1))?;
        ResultDate::from_key(key)
    }
}

impl Serialize for ResultDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    pub id: ResultSetId,
    pub date: ResultDate,
}

/// One scanned target as produced by the ingestion process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub url: String,
    #[serde(default)]
    pub ipv4: Option<String>,
    #[serde(default)]
    pub header_v4: Option<String>,
    #[serde(default)]
    pub ipv6: Option<String>,
    #[serde(default)]
    pub header_v6: Option<String>,
    #[serde(default)]
    pub advertise_gquic: bool,
    #[serde(default)]
    pub advertise_ietf_quic: bool,
    #[serde(default)]
    pub supported_versions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub result_set: ResultSetId,
    pub url: String,
    pub ipv4: Option<String>,
    pub header_v4: Option<String>,
    pub ipv6: Option<String>,
    pub header_v6: Option<String>,
    pub advertise_gquic: bool,
    pub advertise_ietf_quic: bool,
    pub supported_versions: Vec<String>,
}

impl Record {
    pub fn from_scan(id: RecordId, result_set: ResultSetId, scan: ScanRecord) -> Self {
        Record {
            id,
            result_set,
            url: scan.url,
            ipv4: scan.ipv4,
            header_v4: scan.header_v4,
            ipv6: scan.ipv6,
            header_v6: scan.header_v6,
            advertise_gquic: scan.advertise_gquic,
            advertise_ietf_quic: scan.advertise_ietf_quic,
            supported_versions: scan.supported_versions,
        }
    }

    /// True if `needle` occurs in any of the searchable columns. Null columns never match.
    pub fn matches(&self, needle: &str) -> bool {
        self.url.contains(needle)
            || [&self.ipv4, &self.header_v4, &self.ipv6, &self.header_v6]
                .into_iter()
                .flatten()
                .any(|v| v.contains(needle))
    }

    pub fn row(&self) -> Row {
        Row {
            id: self.id,
            url: self.url.clone(),
            ipv4: self.ipv4.clone(),
            header_v4: self.header_v4.clone(),
            ipv6: self.ipv6.clone(),
            header_v6: self.header_v6.clone(),
        }
    }
}

/// Projection of a record into the grid. Serialized as
/// `[id, url, ipv4, header_v4, ipv6, header_v6]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: RecordId,
    pub url: String,
    pub ipv4: Option<String>,
    pub header_v4: Option<String>,
    pub ipv6: Option<String>,
    pub header_v6: Option<String>,
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.id, &self.url, &self.ipv4, &self.header_v4, &self.ipv6, &self.header_v6).serialize(serializer)
    }
}

/// One page of the grid plus the counts DataTables needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPage {
    pub rows: Vec<Row>,
    /// Records across the whole dataset, every result set included.
    pub total: u64,
    /// Records of the queried result set matching the search, before pagination.
    pub filtered: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsBundle {
    pub gquic_advertisements: u64,
    pub ietf_quic_advertisements: u64,
    pub ipv6_supports: u64,
    pub unique_versions: BTreeSet<String>,
    pub versions_count: BTreeMap<String, u64>,
}

impl StatsBundle {
    /// Fold one record into the bundle.
    pub fn add(&mut self, record: &Record) {
        self.gquic_advertisements += record.advertise_gquic as u64;
        self.ietf_quic_advertisements += record.advertise_ietf_quic as u64;
        self.ipv6_supports += record.ipv6.is_some() as u64;
        for v in &record.supported_versions {
            self.add_version(v, 1);
        }
    }

    pub fn add_version(&mut self, version: &str, count: u64) {
        if !self.unique_versions.contains(version) {
            self.unique_versions.insert(version.to_string());
        }
        *self.versions_count.entry(version.to_string()).or_insert(0) += count;
    }
}
