//! 端到端测试：日志文件 → 流水线 → SQLite

use chrono::{NaiveDate, NaiveDateTime};
use logfiler::{Config, Database, Error, LogLevel, Value, pipeline};
use std::io::Write;
use tempfile::{NamedTempFile, tempdir};

const PATTERN: &str = "{timestamp:date:yyyy-MM-ddTHH:mm:ss.ffffffZ} {level:enum-level} {source} {message}";

const LOG: &str = "\
2024-07-24T11:21:27.169996Z I i.q.g.e.QueryProgress fin [id=1245, sql=`SELECT instance_name, instance_rgb, current_user`, principal=admin, cache=true, time=99001]
2024-07-24T11:21:27.170000Z I i.q.c.h.p.JsonQueryProcessorState [48] timings [compiler: 0, count: 0, execute: 126701, q=`SELECT instance_name, instance_rgb, current_user`]
2024-07-24T11:21:27.170020Z I i.q.c.h.p.JsonQueryProcessor all sent [fd=48, lastRequestBytesSent=596, nCompletedRequests=18, totalBytesSent=92374570]
2024-07-24T11:21:27.171601Z I i.q.g.e.QueryProgress exe [id=1246, sql=`(show parameters) where property_path ilike 'cairo.sql.copy.root'`, principal=admin, cache=true]
2024-07-24T11:21:27.171707Z I i.q.g.e.QueryProgress fin [id=1246, sql=`(show parameters) where property_path ilike 'cairo.sql.copy.root'`, principal=admin, cache=true, time=107801]
2024-07-24T11:21:27.171709Z I i.q.c.h.p.JsonQueryProcessorState [157826] timings [compiler: 0, count: 0, execute: 117801, q=`(show parameters) where property_path ilike 'cairo.sql.copy.root'`]
2024-07-24T11:21:27.171720Z U i.q.c.h.p.JsonQueryProcessor all sent [fd=157826, lastRequestBytesSent=776, nCompletedRequests=16, totalBytesSent=110036398]
2024-07-24T11:21:27.171935Z W i.q.g.e.QueryProgress exe [id=1247, sql=`tables();`, principal=admin, cache=true]
2024-07-24T11:21:27.172152Z E i.q.c.h.p.StaticContentProcessor [157825] incoming [url=/assets/vs/loader.js]
";

fn at(h: u32, m: u32, s: u32, micro: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 7, 24)
        .and_then(|d| d.and_hms_micro_opt(h, m, s, micro))
        .unwrap()
}

fn write_log(content: &str) -> Result<NamedTempFile, Box<dyn std::error::Error>> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn nine_lines_in_one_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let log = write_log(LOG)?;
    let dir = tempdir()?;
    let db_path = dir.path().join("entries.db");

    let mut config = Config::new(log.path(), PATTERN);
    config.db_path = Some(db_path.clone());
    config.silent = true;

    let summary = pipeline::run(&config)?;
    assert_eq!(summary.lines_processed, 9);
    assert_eq!(summary.rows_accepted, 9);
    assert_eq!(summary.batches_committed, 1);
    assert_eq!(summary.rows_written, 9);
    assert!(summary.to_string().contains("Processed 9 lines"));

    assert!(db_path.exists());
    assert!(std::fs::metadata(&db_path)?.len() > 0);

    let db = Database::open(&db_path, false)?;
    let rows = db.read_all()?;
    assert_eq!(rows.len(), 9);

    let first = &rows[0];
    assert_eq!(first[0], ("timestamp".to_string(), Value::Timestamp(at(11, 21, 27, 169_996))));
    assert_eq!(first[1].1, Value::Integer(LogLevel::Info.code()));
    assert_eq!(first[2].1, Value::Text("i.q.g.e.QueryProgress".into()));
    assert_eq!(
        first[3].1,
        Value::Text(
            "fin [id=1245, sql=`SELECT instance_name, instance_rgb, current_user`, principal=admin, cache=true, time=99001]"
                .into()
        )
    );

    let unknown = &rows[6];
    assert_eq!(unknown[1].1, Value::Integer(LogLevel::Unknown.code()));

    let last = &rows[8];
    assert_eq!(last[0].1, Value::Timestamp(at(11, 21, 27, 172_152)));
    assert_eq!(last[1].1, Value::Integer(LogLevel::Error.code()));
    assert_eq!(last[2].1, Value::Text("i.q.c.h.p.StaticContentProcessor".into()));
    assert_eq!(
        last[3].1,
        Value::Text("[157825] incoming [url=/assets/vs/loader.js]".into())
    );

    Ok(())
}

#[test]
fn default_database_path_replaces_existing_file() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let log_path = dir.path().join("app.log");
    std::fs::write(&log_path, "1 first\nnot a match\n2 second\n")?;

    let db_path = dir.path().join("app.log.db");
    std::fs::write(&db_path, b"stale contents that are not a database")?;

    let mut config = Config::new(&log_path, "{id:int} {message}");
    config.silent = true;
    assert_eq!(config.database_path(), db_path);

    let summary = pipeline::run(&config)?;
    assert_eq!(summary.lines_processed, 3);
    assert_eq!(summary.rows_accepted, 2);
    assert_eq!(summary.rows_rejected(), 1);

    let rows = Database::open(&db_path, false)?.read_all()?;
    let ids: Vec<Value> = rows.iter().map(|row| row[0].1.clone()).collect();
    assert_eq!(ids, vec![Value::Integer(1), Value::Integer(2)]);
    Ok(())
}

#[test]
fn small_batches_preserve_line_order() -> Result<(), Box<dyn std::error::Error>> {
    let content: String = (0..250).map(|i| format!("{} payload-{}\n", i, i)).collect();
    let log = write_log(&content)?;
    let dir = tempdir()?;

    let mut config = Config::new(log.path(), "{seq:int} {payload}");
    config.db_path = Some(dir.path().join("ordered.db"));
    config.batch_size = 16;
    config.queue_depth = 1;
    config.silent = true;

    let summary = pipeline::run(&config)?;
    assert_eq!(summary.batches_committed, 16);
    assert_eq!(summary.rows_written, 250);

    let rows = Database::open(dir.path().join("ordered.db"), false)?.read_all()?;
    let seqs: Vec<i64> = rows
        .iter()
        .filter_map(|row| row[0].1.as_integer())
        .collect();
    assert_eq!(seqs, (0..250).collect::<Vec<i64>>());
    Ok(())
}

#[test]
fn pattern_error_happens_before_any_side_effect() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let log_path = dir.path().join("app.log");
    std::fs::write(&log_path, "1 first\n")?;
    let db_path = dir.path().join("keep.db");
    std::fs::write(&db_path, b"keep me")?;

    let mut config = Config::new(&log_path, "{a} {a}");
    config.db_path = Some(db_path.clone());

    let err = pipeline::run(&config).unwrap_err();
    assert!(matches!(err, Error::Pattern(_)));
    assert_eq!(std::fs::read(&db_path)?, b"keep me");
    Ok(())
}

#[test]
fn missing_log_file_is_io_failure() {
    let dir = tempdir().unwrap();
    let config = Config::new(dir.path().join("nope.log"), "{message}");
    let err = pipeline::run(&config).unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert!(!config.database_path().exists());
}

#[test]
fn invalid_utf8_line_does_not_abort_the_run() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let log_path = dir.path().join("a.log");
    std::fs::write(&log_path, b"1 ok\n2 caf\xe9\n3 ok\n")?;

    let mut config = Config::new(&log_path, "{n:int} {m}");
    config.silent = true;
    let summary = pipeline::run(&config)?;
    assert_eq!(summary.lines_processed, 3);
    assert_eq!(summary.rows_written, 3);

    let rows = Database::open(config.database_path(), false)?.read_all()?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1][1].1, Value::Text("caf\u{FFFD}".into()));
    Ok(())
}

#[test]
fn case_insensitive_duplicate_fails_before_touching_database() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let log_path = dir.path().join("app.log");
    std::fs::write(&log_path, "a b\n")?;
    let db_path = dir.path().join("keep.db");
    std::fs::write(&db_path, b"keep me")?;

    let mut config = Config::new(&log_path, "{Msg} {msg}");
    config.db_path = Some(db_path.clone());

    let err = pipeline::run(&config).unwrap_err();
    assert!(matches!(err, Error::Pattern(_)));
    assert_eq!(std::fs::read(&db_path)?, b"keep me");
    Ok(())
}
