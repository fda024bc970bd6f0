use crate::Db;
use anyhow::{bail, Result};
use rusqlite::params;
use tracing::debug;
use tracker_core::{ResultDate, ResultSet, ScanRecord};

impl Db {
    /// Store one day of scan output. Either every record lands or none does.
    pub fn insert_result_set(&self, date: ResultDate, scans: &[ScanRecord]) -> Result<ResultSet> {
        let tx = self.conn.unchecked_transaction()?;
        let taken: i64 = tx.query_row("SELECT COUNT(1) FROM result WHERE date=?", [date.key()], |r| r.get(0))?;
        if taken > 0 {
            bail!("result set for {date} already exists");
        }
        tx.execute("INSERT INTO result(date) VALUES (?)", [date.key()])?;
        let id = tx.last_insert_rowid();
        {
            let mut rec = tx.prepare(
                "INSERT INTO record(result_id,url,ipv4,header_v4,ipv6,header_v6,advertise_gquic,advertise_ietf_quic) VALUES (?,?,?,?,?,?,?,?)",
            )?;
            let mut ver = tx.prepare("INSERT INTO supported_version(record_id,version) VALUES (?,?)")?;
            for s in scans {
                rec.execute(params![id, s.url, s.ipv4, s.header_v4, s.ipv6, s.header_v6, s.advertise_gquic, s.advertise_ietf_quic])?;
                let record_id = tx.last_insert_rowid();
                for v in &s.supported_versions {
                    ver.execute(params![record_id, v])?;
                }
            }
        }
        tx.commit()?;
        debug!(%date, id, records = scans.len(), "inserted result set");
        Ok(ResultSet { id, date })
    }
}
