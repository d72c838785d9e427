//! 错误类型定义
//!
//! 定义了模板编译、文件读取和数据库写入过程中可能出现的所有错误类型。
//! 行级的"不匹配"和字段级的"转换失败"不属于错误：前者表现为 `None`，
//! 后者表现为 `Value::Null`。

use std::path::PathBuf;
use thiserror::Error;

/// 模板编译错误
///
/// 在读取任何一行日志之前就会暴露，属于启动期的致命错误。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// 模板为空
    #[error("empty pattern")]
    Empty,

    /// 模板中没有任何占位符
    #[error("pattern contains no placeholders: {0}")]
    NoPlaceholders(String),

    /// 占位符名称重复
    #[error("duplicate placeholder name '{name}'")]
    DuplicateName {
        /// 重复的名称
        name: String,
    },

    /// 未知的字段类型
    #[error("unknown type '{kind}' for placeholder '{name}'")]
    UnknownType {
        /// 占位符名称
        name: String,
        /// 类型标签
        kind: String,
    },

    /// 生成的正则表达式无法编译
    #[error("failed to build matcher: {0}")]
    Regex(String),
}

/// 持久化错误
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite 返回的错误
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// 记录的字段集合与首条记录推断出的表结构不一致
    #[error("record fields {actual:?} do not match table columns {expected:?}")]
    SchemaMismatch {
        /// 表中的列
        expected: Vec<String>,
        /// 记录中的字段
        actual: Vec<String>,
    },

    /// 在准备表结构之前就写入了数据
    #[error("table schema has not been prepared")]
    SchemaNotPrepared,

    /// 无法删除已存在的数据库文件
    #[error("failed to remove existing database {path}: {source}")]
    RemoveExisting {
        /// 数据库路径
        path: PathBuf,
        /// 底层 I/O 错误
        #[source]
        source: std::io::Error,
    },
}

/// 顶层错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 模板错误
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// 调用方违反了接口约定（例如传入了缺失的行）
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// 文件无法打开或读取中途失败
    #[error("failed to read {path}: {source}")]
    Io {
        /// 日志文件路径
        path: PathBuf,
        /// 底层 I/O 错误
        #[source]
        source: std::io::Error,
    },

    /// 批次写入失败
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// 无法启动写入线程
    #[error("failed to start database writer thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// 写入线程异常退出
    #[error("database writer thread panicked")]
    WriterPanicked,

    /// 命令行参数或配置错误
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// 库内统一使用的 Result 别名
pub type Result<T> = std::result::Result<T, Error>;
