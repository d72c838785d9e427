//! # logfiler
//!
//! 按模板从文本日志中提取结构化字段，并批量写入 SQLite 数据库。
//!
//! ## 功能特性
//!
//! - **模板编译**: `{name:type:format}` 占位符编译为整行匹配的正则表达式和类型转换表
//! - **流式读取**: 逐行读取，内存占用与文件大小无关
//! - **批量写入**: 每批一个事务，独立写入线程，有界队列提供背压
//! - **容错**: 不匹配的行直接跳过，单个字段转换失败记为 NULL
//!
//! ## 快速开始
//!
//! ```rust
//! use logfiler::{Transformer, Value};
//!
//! let transformer = Transformer::from_pattern(
//!     "{timestamp:date:yyyy-MM-dd} {level:enum-level} {source} {message}",
//!     false,
//! ).unwrap();
//!
//! let record = transformer
//!     .transform_line("2023-10-01 I SourceA This is a log message")
//!     .unwrap();
//!
//! assert_eq!(record.get("source"), Some(&Value::Text("SourceA".into())));
//! assert_eq!(record.get("level"), Some(&Value::Integer(0)));
//! ```
//!
//! ### 导入整个文件
//!
//! ```rust,no_run
//! use logfiler::{Config, pipeline};
//!
//! let config = Config::new("app.log", "{timestamp:date} {level:enum-level} {source} {message}");
//! let summary = pipeline::run(&config)?;
//! println!("{}", summary);
//! # Ok::<(), logfiler::Error>(())
//! ```
//!
//! ## 模板格式
//!
//! ```text
//! {name}                 文本
//! {name:int}             十进制整数
//! {name:enum-level}      日志级别 I / W / E，其余为 Unknown
//! {name:date}            日期，默认格式 yyyy-MM-ddTHH:mm:ss.ffffffZ
//! {name:date:MM/dd/yyyy} 指定格式的日期
//! {{                     字面量 {（其余不构成占位符的花括号也按字面量处理）
//! ```

pub mod config;
pub mod database;
pub mod date_format;
pub mod error;
pub mod logging;
pub mod pattern;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod transform;

pub use config::Config;
pub use database::{BatchWriter, Database, PersistenceHandle};
pub use error::{Error, PatternError, Result, StorageError};
pub use pattern::{CompiledPattern, FieldType, compile};
pub use pipeline::{Pipeline, PipelineOptions, PipelineState, RunSummary};
pub use reader::LineSource;
pub use record::{LogLevel, Record, Value};
pub use transform::Transformer;
