use crate::Db;
use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row as SqlRow};
use tracker_core::{QueryPlan, RecordPage, RecordStore, ResultDate, ResultSet, ResultSetId, Row, StatsBundle};

// ?1 result id, ?2 search text; instr() is case-sensitive and NULL never matches
const FILTER: &str = "result_id = ?1 AND (?2 = '' OR instr(url, ?2) > 0 OR instr(ipv4, ?2) > 0 \
     OR instr(header_v4, ?2) > 0 OR instr(ipv6, ?2) > 0 OR instr(header_v6, ?2) > 0)";

fn grid_row(r: &SqlRow<'_>) -> rusqlite::Result<Row> {
    Ok(Row {
        id: r.get(0)?,
        url: r.get(1)?,
        ipv4: r.get(2)?,
        header_v4: r.get(3)?,
        ipv6: r.get(4)?,
        header_v6: r.get(5)?,
    })
}

impl Db {
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let cnt: i64 = self.conn.query_row(
            "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name=?",
            [name],
            |r| r.get(0),
        )?;
        Ok(cnt > 0)
    }

    /// All stored result sets, oldest first.
    pub fn result_sets(&self) -> Result<Vec<ResultSet>> {
        let mut stmt = self.conn.prepare("SELECT id, date FROM result ORDER BY date")?;
        let rows = stmt.query_map([], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?)))?;
        let mut out = Vec::new();
        for row in rows {
            let (id, key) = row?;
            out.push(ResultSet { id, date: ResultDate::from_key(key)? });
        }
        Ok(out)
    }
}

impl RecordStore for Db {
    fn find_result_set(&self, date: ResultDate) -> Result<Option<ResultSet>> {
        let id: Option<i64> = self
            .conn
            .query_row("SELECT id FROM result WHERE date=?", [date.key()], |r| r.get(0))
            .optional()?;
        Ok(id.map(|id| ResultSet { id, date }))
    }

    fn count_records(&self, result_set: Option<ResultSetId>) -> Result<u64> {
        let n: i64 = match result_set {
            Some(id) => self.conn.query_row("SELECT COUNT(*) FROM record WHERE result_id=?", [id], |r| r.get(0))?,
            None => self.conn.query_row("SELECT COUNT(*) FROM record", [], |r| r.get(0))?,
        };
        Ok(n as u64)
    }

    fn query_records(&self, result_set: ResultSetId, plan: &QueryPlan) -> Result<RecordPage> {
        let total = self.count_records(None)?;
        let filtered: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM record WHERE {FILTER}"),
            params![result_set, plan.search],
            |r| r.get(0),
        )?;

        let mut rows = Vec::new();
        if plan.length > 0 && plan.start < filtered as u64 {
            // column and direction come from closed enums, never from request text
            let sql = format!(
                "SELECT id, url, ipv4, header_v4, ipv6, header_v6 FROM record WHERE {FILTER} \
                 ORDER BY {} {}, id ASC LIMIT ?3 OFFSET ?4",
                plan.column.name(),
                plan.direction.sql(),
            );
            let limit = i64::try_from(plan.length).unwrap_or(i64::MAX);
            let offset = plan.start as i64;
            let mut stmt = self.conn.prepare(&sql)?;
            for row in stmt.query_map(params![result_set, plan.search, limit, offset], grid_row)? {
                rows.push(row?);
            }
        }
        Ok(RecordPage { rows, total, filtered: filtered as u64 })
    }

    fn aggregate_stats(&self, result_set: ResultSetId) -> Result<StatsBundle> {
        let (gquic, ietf, ipv6): (i64, i64, i64) = self.conn.query_row(
            "SELECT COALESCE(SUM(advertise_gquic),0), COALESCE(SUM(advertise_ietf_quic),0), COUNT(ipv6) FROM record WHERE result_id=?",
            [result_set],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )?;
        let mut stats = StatsBundle {
            gquic_advertisements: gquic as u64,
            ietf_quic_advertisements: ietf as u64,
            ipv6_supports: ipv6 as u64,
            ..Default::default()
        };
        let mut stmt = self.conn.prepare(
            "SELECT SV.version, COUNT(SV.version) FROM record R JOIN supported_version SV ON R.id = SV.record_id \
             WHERE R.result_id = ? GROUP BY SV.version",
        )?;
        let versions = stmt.query_map([result_set], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
        for v in versions {
            let (version, count) = v?;
            stats.add_version(&version, count as u64);
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::{Column, Direction, MemoryStore, ScanRecord};

    fn scan(url: &str, ipv4: Option<&str>, header_v4: Option<&str>) -> ScanRecord {
        ScanRecord {
            url: url.to_string(),
            ipv4: ipv4.map(str::to_string),
            header_v4: header_v4.map(str::to_string),
            ..Default::default()
        }
    }

    fn fixture() -> Vec<ScanRecord> {
        vec![
            scan("https://c.example", Some("10.0.0.1"), Some("alt-svc: quic")),
            scan("https://a.example", None, Some("server: gws")),
            scan("https://b.test", Some("10.0.0.2"), Some("alt-svc: quic")),
            scan("https://d.test", Some("10.0.0.3"), Some("server: gws")),
        ]
    }

    fn date(key: i64) -> ResultDate {
        ResultDate::from_key(key).unwrap()
    }

    fn ids(page: &RecordPage) -> Vec<i64> {
        page.rows.iter().map(|r| r.id).collect()
    }

    #[test]
    fn migrates_fresh_database() {
        let db = Db::open_in_memory().unwrap();
        assert!(db.table_exists("result").unwrap());
        assert!(db.table_exists("supported_version").unwrap());
        assert!(!db.table_exists("runs").unwrap());
    }

    #[test]
    fn finds_inserted_result_set() {
        let db = Db::open_in_memory().unwrap();
        assert!(db.find_result_set(date(20180101)).unwrap().is_none());
        let rs = db.insert_result_set(date(20180101), &fixture()).unwrap();
        assert_eq!(db.find_result_set(date(20180101)).unwrap(), Some(rs));
        assert_eq!(db.count_records(Some(rs.id)).unwrap(), 4);
        assert_eq!(db.result_sets().unwrap(), vec![rs]);
        assert!(db.insert_result_set(date(20180101), &[]).is_err());
    }

    #[test]
    fn sql_matches_in_memory_executor() {
        let db = Db::open_in_memory().unwrap();
        let mem = MemoryStore::new();
        let rs = db.insert_result_set(date(20180101), &fixture()).unwrap();
        mem.insert_result_set(date(20180101), fixture()).unwrap();

        let searches = ["", "quic", "10.0.0", "QUIC", ".test"];
        for column in Column::ALL {
            for direction in [Direction::Asc, Direction::Desc] {
                for search in searches {
                    for (start, length) in [(0, 10), (1, 2), (3, 5), (9, 1), (0, 0)] {
                        let plan = QueryPlan::new(column, direction, start, length, 1).with_search(search);
                        let sql = db.query_records(rs.id, &plan).unwrap();
                        let expected = mem.query_records(rs.id, &plan).unwrap();
                        assert_eq!(sql, expected, "{plan:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn total_counts_whole_dataset() {
        let db = Db::open_in_memory().unwrap();
        db.insert_result_set(date(20180101), &fixture()).unwrap();
        let empty = db.insert_result_set(date(20180102), &[]).unwrap();
        let plan = QueryPlan::new(Column::Url, Direction::Asc, 0, 10, 1);
        let page = db.query_records(empty.id, &plan).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!((page.filtered, page.total), (0, 4));
    }

    #[test]
    fn aggregates_versions_and_flags() {
        let db = Db::open_in_memory().unwrap();
        let mut a = scan("https://a", None, None);
        a.advertise_gquic = true;
        a.ipv6 = Some("2001:db8::1".into());
        a.supported_versions = vec!["Q039".into(), "Q043".into()];
        let mut b = scan("https://b", None, None);
        b.advertise_gquic = true;
        b.advertise_ietf_quic = true;
        b.supported_versions = vec!["Q043".into(), "Q043".into()];
        let rs = db.insert_result_set(date(20180101), &[a, b, scan("https://c", None, None)]).unwrap();
        // other result sets do not leak into the aggregate
        let mut other = scan("https://x", None, None);
        other.supported_versions = vec!["ff0000000b".into()];
        db.insert_result_set(date(20180102), &[other]).unwrap();

        let stats = db.aggregate_stats(rs.id).unwrap();
        assert_eq!(stats.gquic_advertisements, 2);
        assert_eq!(stats.ietf_quic_advertisements, 1);
        assert_eq!(stats.ipv6_supports, 1);
        assert_eq!(stats.unique_versions.len(), 2);
        assert_eq!(stats.versions_count.get("Q043"), Some(&3));
        assert!(!stats.versions_count.contains_key("ff0000000b"));
    }
}
