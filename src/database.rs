//! 批量写入 SQLite
//!
//! - [`PersistenceHandle`]：持久化目标需要提供的接口；
//! - [`Database`]：基于 rusqlite 的实现，所有记录写入 `log_entries` 表；
//! - [`BatchWriter`]：按提交顺序逐批写入，首个非空批次触发建表。

use crate::error::StorageError;
use crate::record::{Record, Value};
use chrono::NaiveDateTime;
use once_cell::unsync::OnceCell;
use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, params_from_iter};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// 目标表名
pub const TABLE_NAME: &str = "log_entries";

/// 持久化目标
///
/// 由写入线程独占，因此要求 `Send`。
pub trait PersistenceHandle: Send {
    /// 根据样本记录准备表结构，只在第一次调用时生效
    fn prepare_schema(&mut self, sample: &Record) -> Result<(), StorageError>;

    /// 在一个事务中写入整批记录：要么全部写入，要么全部回滚
    fn write_batch(&mut self, records: &[Record]) -> Result<(), StorageError>;

    /// 关闭连接
    fn close(self) -> Result<(), StorageError>
    where
        Self: Sized;
}

/// 列的 SQL 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Date,
    Integer,
    Text,
}

impl SqlType {
    /// 由样本值推断列类型：时间戳 → DATE，整数 → INTEGER，其余 → TEXT
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Timestamp(_) => SqlType::Date,
            Value::Integer(_) => SqlType::Integer,
            Value::Text(_) | Value::Null => SqlType::Text,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SqlType::Date => "DATE",
            SqlType::Integer => "INTEGER",
            SqlType::Text => "TEXT",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 表中的一列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Value::Text(s) => Ok(ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes()))),
            Value::Integer(i) => Ok(ToSqlOutput::from(*i)),
            Value::Timestamp(ts) => ts.to_sql(),
            Value::Null => Ok(ToSqlOutput::from(rusqlite::types::Null)),
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite 数据库
pub struct Database {
    conn: Connection,
    columns: OnceCell<Vec<Column>>,
}

impl Database {
    /// 打开数据库文件
    ///
    /// # 参数
    ///
    /// * `path` - 数据库文件路径
    /// * `overwrite` - 为 `true` 时先删除已存在的同名文件
    pub fn open<P: AsRef<Path>>(path: P, overwrite: bool) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if overwrite && path.exists() {
            std::fs::remove_file(path).map_err(|source| StorageError::RemoveExisting {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(path = %path.display(), "removed existing database");
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// 内存数据库，主要用于测试
    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        Ok(Self {
            conn,
            columns: OnceCell::new(),
        })
    }

    /// 已确定的列；建表之前为 `None`
    pub fn columns(&self) -> Option<&[Column]> {
        self.columns.get().map(Vec::as_slice)
    }

    /// 读取 `log_entries` 中的所有行，每行为按列顺序排列的 `(列名, 值)`
    ///
    /// DATE 列中的文本会还原为时间戳。
    pub fn read_all(&self) -> Result<Vec<Vec<(String, Value)>>, StorageError> {
        let mut info = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(TABLE_NAME)))?;
        let declared: Vec<(String, String)> = info
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<rusqlite::Result<_>>()?;

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {}", quote_ident(TABLE_NAME)))?;
        let rows = stmt.query_map([], |row| {
            let mut out = Vec::with_capacity(declared.len());
            for (idx, (name, decl)) in declared.iter().enumerate() {
                let value = match row.get_ref(idx)? {
                    ValueRef::Null => Value::Null,
                    ValueRef::Integer(i) => Value::Integer(i),
                    ValueRef::Real(f) => Value::Text(f.to_string()),
                    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                        let text = String::from_utf8_lossy(bytes).into_owned();
                        if decl.eq_ignore_ascii_case("DATE") {
                            match row.get::<_, NaiveDateTime>(idx) {
                                Ok(ts) => Value::Timestamp(ts),
                                Err(_) => Value::Text(text),
                            }
                        } else {
                            Value::Text(text)
                        }
                    }
                };
                out.push((name.clone(), value));
            }
            Ok(out)
        })?;

        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn check_fields(columns: &[Column], record: &Record) -> Result<(), StorageError> {
        let matches = columns.len() == record.len()
            && columns
                .iter()
                .zip(record.names())
                .all(|(column, name)| &column.name == name);
        if matches {
            Ok(())
        } else {
            Err(StorageError::SchemaMismatch {
                expected: columns.iter().map(|c| c.name.clone()).collect(),
                actual: record.names().to_vec(),
            })
        }
    }
}

impl PersistenceHandle for Database {
    fn prepare_schema(&mut self, sample: &Record) -> Result<(), StorageError> {
        let conn = &self.conn;
        self.columns.get_or_try_init(|| {
            let columns: Vec<Column> = sample
                .iter()
                .map(|(name, value)| Column {
                    name: name.to_string(),
                    sql_type: SqlType::infer(value),
                })
                .collect();

            let definition = columns
                .iter()
                .map(|c| format!("{} {}", quote_ident(&c.name), c.sql_type))
                .collect::<Vec<_>>()
                .join(", ");
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} ({})",
                    quote_ident(TABLE_NAME),
                    definition
                ),
                [],
            )?;
            info!(table = TABLE_NAME, columns = %definition, "prepared table");
            Ok::<_, StorageError>(columns)
        })?;
        Ok(())
    }

    fn write_batch(&mut self, records: &[Record]) -> Result<(), StorageError> {
        let columns = self.columns.get().ok_or(StorageError::SchemaNotPrepared)?;
        for record in records {
            Self::check_fields(columns, record)?;
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(TABLE_NAME),
            columns
                .iter()
                .map(|c| quote_ident(&c.name))
                .collect::<Vec<_>>()
                .join(", "),
            (1..=columns.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ")
        );

        // 事务未提交即被丢弃时自动回滚
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&sql)?;
            for record in records {
                stmt.execute(params_from_iter(record.values()))?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn close(self) -> Result<(), StorageError> {
        self.conn.close().map_err(|(_, e)| StorageError::Sqlite(e))
    }
}

/// 写入统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// 已提交的事务数
    pub batches: usize,
    /// 已写入的行数
    pub rows: usize,
}

/// 批次写入器
///
/// 严格按提交顺序写入，不合并也不重排批次。
pub struct BatchWriter<P: PersistenceHandle> {
    handle: P,
    prepared: bool,
    stats: WriterStats,
}

impl<P: PersistenceHandle> BatchWriter<P> {
    pub fn new(handle: P) -> Self {
        Self {
            handle,
            prepared: false,
            stats: WriterStats::default(),
        }
    }

    /// 提交一个批次
    ///
    /// 空批次直接忽略；第一个非空批次的首条记录决定表结构。
    pub fn submit(&mut self, batch: Vec<Record>) -> Result<(), StorageError> {
        let Some(first) = batch.first() else {
            return Ok(());
        };

        if !self.prepared {
            self.handle.prepare_schema(first)?;
            self.prepared = true;
        }

        self.handle.write_batch(&batch)?;
        self.stats.batches += 1;
        self.stats.rows += batch.len();
        debug!(rows = batch.len(), batches = self.stats.batches, "committed batch");
        Ok(())
    }

    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    /// 关闭持久化目标并返回统计
    pub fn finish(self) -> Result<WriterStats, StorageError> {
        self.handle.close()?;
        Ok(self.stats)
    }
}
