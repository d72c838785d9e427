use chrono::NaiveDateTime;
use std::fmt;
use std::sync::Arc;

/// 日志级别
///
/// 由 `enum-level` 类型的占位符产生，写入数据库时使用 [`LogLevel::code`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Unknown,
}

impl LogLevel {
    /// 按首字母（不区分大小写）识别级别：`I`、`W`、`E`，其余为 `Unknown`
    pub fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("i") {
            LogLevel::Info
        } else if token.eq_ignore_ascii_case("w") {
            LogLevel::Warn
        } else if token.eq_ignore_ascii_case("e") {
            LogLevel::Error
        } else {
            LogLevel::Unknown
        }
    }

    /// 写入数据库的整数编码
    pub fn code(self) -> i64 {
        match self {
            LogLevel::Info => 0,
            LogLevel::Warn => 1,
            LogLevel::Error => 2,
            LogLevel::Unknown => 3,
        }
    }
}

/// 字段值
///
/// 每个占位符经过类型转换后得到的值。转换失败的字段为 `Null`。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Value {
    Text(String),
    Integer(i64),
    Timestamp(NaiveDateTime),
    Null,
}

impl Value {
    /// 是否为空值
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Null => f.write_str("NULL"),
        }
    }
}

/// 一条成功匹配的日志记录
///
/// 字段顺序与模板中占位符的出现顺序一致。字段名列表在模板编译时确定，
/// 同一个模板产生的所有记录共享同一份名称列表。
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Record {
    names: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    /// 创建记录
    ///
    /// `values` 的长度必须与 `names` 相同，超出或不足的部分会被截断或补 `Null`。
    pub fn new(names: Arc<[String]>, mut values: Vec<Value>) -> Self {
        values.resize(names.len(), Value::Null);
        Self { names, values }
    }

    /// 按字段名取值
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|idx| &self.values[idx])
    }

    /// 字段名（按模板顺序）
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 字段值（按模板顺序）
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// 按顺序遍历 `(字段名, 值)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 所有字段都为空值
    pub fn all_null(&self) -> bool {
        self.values.iter().all(Value::is_null)
    }
}
