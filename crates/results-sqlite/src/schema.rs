pub const MIG_0001_INIT: &str = r#"
BEGIN;

CREATE TABLE result (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  date            INTEGER NOT NULL UNIQUE
);

CREATE TABLE record (
  id                  INTEGER PRIMARY KEY AUTOINCREMENT,
  result_id           INTEGER NOT NULL REFERENCES result(id) ON DELETE CASCADE,
  url                 TEXT NOT NULL,
  ipv4                TEXT,
  header_v4           TEXT,
  ipv6                TEXT,
  header_v6           TEXT,
  advertise_gquic     INTEGER NOT NULL CHECK (advertise_gquic IN (0,1)) DEFAULT 0,
  advertise_ietf_quic INTEGER NOT NULL CHECK (advertise_ietf_quic IN (0,1)) DEFAULT 0
);

CREATE TABLE supported_version (
  id              INTEGER PRIMARY KEY AUTOINCREMENT,
  record_id       INTEGER NOT NULL REFERENCES record(id) ON DELETE CASCADE,
  version         TEXT NOT NULL
);

CREATE INDEX idx_record_result ON record(result_id);
CREATE INDEX idx_sv_record ON supported_version(record_id);

COMMIT;
"#
;
