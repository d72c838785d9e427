//! 模板编译器
//!
//! 把 `{timestamp:date:yyyy-MM-dd} {level:enum-level} {source} {message}` 这样的模板
//! 编译成整行匹配的正则表达式，以及一张"字段名 → 类型转换"的表。
//!
//! 编译分两步：
//! 1. [`tokenize`] 把模板切分成字面量片段和占位符片段；
//! 2. [`compile`] 根据片段序列同时生成正则表达式和字段表。
//!
//! 模板中占位符以外的文本一律按字面量匹配，其中的正则元字符会被转义。

use crate::date_format::{self, DateFormat};
use crate::error::PatternError;
use crate::record::{LogLevel, Record, Value};
use memchr::memchr;
use regex::Regex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 占位符的字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// 原样保留的文本（默认）
    Text,
    /// 按格式解析的日期时间
    Date,
    /// 日志级别，转换为整数编码
    Level,
    /// 十进制整数
    Int,
}

impl FieldType {
    /// 解析类型标签。`None` 或空标签表示文本。
    ///
    /// `graphql-level` 与 `enum-level` 等价，`text` / `string` 与缺省等价。
    pub fn from_tag(tag: Option<&str>) -> Option<Self> {
        match tag {
            None | Some("") | Some("text") | Some("string") => Some(FieldType::Text),
            Some("date") => Some(FieldType::Date),
            Some("enum-level") | Some("graphql-level") | Some("level") => Some(FieldType::Level),
            Some("int") | Some("integer") => Some(FieldType::Int),
            Some(_) => None,
        }
    }

    /// 该类型在正则表达式中的捕获子模式
    fn sub_pattern(self) -> &'static str {
        match self {
            FieldType::Int => "([0-9]+)",
            FieldType::Text | FieldType::Date | FieldType::Level => "(.+?)",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::Text => "text",
            FieldType::Date => "date",
            FieldType::Level => "enum-level",
            FieldType::Int => "int",
        };
        f.write_str(s)
    }
}

/// 模板中的一个占位符 `{name[:type[:format]]}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub kind: FieldType,
    pub format: Option<String>,
}

/// 模板切分后的片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Literal(&'a str),
    Placeholder(Placeholder),
}

/// 把模板切分为字面量与占位符
///
/// 只有形如 `{name[:type[:format]]}` 且名称合法的片段才是占位符，
/// 其余的花括号（例如 JSON 日志中的 `{"msg": ...}`）都按字面量处理。
/// 需要字面量 `{name}` 时写成 `{{name}`：`{{` 表示一个字面量 `{`。
///
/// # 错误
///
/// - `Empty` - 模板为空
/// - `UnknownType` - 占位符的类型标签无法识别
pub fn tokenize(pattern: &str) -> Result<Vec<Segment<'_>>, PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }

    let bytes = pattern.as_bytes();
    let mut segments = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;

    while let Some(offset) = memchr(b'{', &bytes[pos..]) {
        let open = pos + offset;

        if bytes.get(open + 1) == Some(&b'{') {
            segments.push(Segment::Literal(&pattern[literal_start..=open]));
            pos = open + 2;
            literal_start = pos;
            continue;
        }

        let Some(close) = memchr(b'}', &bytes[open + 1..]).map(|offset| open + 1 + offset) else {
            break;
        };

        match parse_placeholder(&pattern[open + 1..close])? {
            Some(placeholder) => {
                if open > literal_start {
                    segments.push(Segment::Literal(&pattern[literal_start..open]));
                }
                segments.push(Segment::Placeholder(placeholder));
                pos = close + 1;
                literal_start = pos;
            }
            // 不是占位符：这个 `{` 留在字面量里，从下一个字节继续找
            None => pos = open + 1,
        }
    }

    if literal_start < pattern.len() {
        segments.push(Segment::Literal(&pattern[literal_start..]));
    }

    Ok(segments)
}

fn is_name(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// 名称不合法时返回 `None`，该片段按字面量处理
fn parse_placeholder(inner: &str) -> Result<Option<Placeholder>, PatternError> {
    let mut parts = inner.splitn(3, ':');
    let name = parts.next().unwrap_or_default();
    if !is_name(name) {
        return Ok(None);
    }

    let tag = parts.next();
    let format = parts.next().filter(|f| !f.is_empty()).map(str::to_string);

    let kind = FieldType::from_tag(tag).ok_or_else(|| PatternError::UnknownType {
        name: name.to_string(),
        kind: tag.unwrap_or_default().to_string(),
    })?;

    Ok(Some(Placeholder {
        name: name.to_string(),
        kind,
        format,
    }))
}

/// 单个字段的类型转换
#[derive(Debug, Clone)]
enum Coercion {
    Text,
    Int,
    Level,
    Date(DateFormat),
}

impl Coercion {
    fn for_placeholder(placeholder: &Placeholder) -> Self {
        match placeholder.kind {
            FieldType::Text => Coercion::Text,
            FieldType::Int => Coercion::Int,
            FieldType::Level => Coercion::Level,
            FieldType::Date => Coercion::Date(match placeholder.format.as_deref() {
                Some(format) => DateFormat::new(format),
                None => date_format::DEFAULT.clone(),
            }),
        }
    }

    /// 转换失败时返回 `Value::Null`，不会让整行失败
    fn apply(&self, raw: &str) -> Value {
        match self {
            Coercion::Text => Value::Text(raw.to_string()),
            Coercion::Int => raw.parse::<i64>().map(Value::Integer).unwrap_or(Value::Null),
            Coercion::Level => Value::Integer(LogLevel::from_token(raw).code()),
            Coercion::Date(format) => format.parse(raw).map(Value::Timestamp).unwrap_or(Value::Null),
        }
    }
}

/// 字段定义：名称、类型及其转换函数
#[derive(Debug, Clone)]
pub struct Field {
    placeholder: Placeholder,
    coercion: Coercion,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.placeholder.name
    }

    pub fn kind(&self) -> FieldType {
        self.placeholder.kind
    }

    pub fn format(&self) -> Option<&str> {
        self.placeholder.format.as_deref()
    }
}

/// 编译后的模板
///
/// 构造后不可变。第 `i` 个字段对应正则表达式的第 `i + 1` 个捕获组。
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    regex: Regex,
    fields: Vec<Field>,
    names: Arc<[String]>,
}

/// 编译模板
///
/// 对同一个模板多次编译得到的匹配行为完全一致。
///
/// # 示例
///
/// ```
/// use logfiler::pattern::compile;
///
/// let pattern = compile("{level:enum-level} [{source}] {message}").unwrap();
/// let record = pattern.parse("W [db] slow query").unwrap();
///
/// assert_eq!(record.get("level").and_then(|v| v.as_integer()), Some(1));
/// assert_eq!(record.get("source").and_then(|v| v.as_str()), Some("db"));
/// assert!(pattern.parse("W db slow query").is_none());
/// ```
///
/// # 错误
///
/// 除 [`tokenize`] 的错误外，还可能返回：
/// - `NoPlaceholders` - 模板中没有占位符
/// - `DuplicateName` - 占位符名称重复（不区分大小写）
pub fn compile(pattern: &str) -> Result<CompiledPattern, PatternError> {
    let segments = tokenize(pattern)?;

    let mut expr = String::with_capacity(pattern.len() * 2 + 2);
    let mut fields: Vec<Field> = Vec::new();
    let mut seen = HashSet::new();

    expr.push('^');
    for segment in segments {
        match segment {
            Segment::Literal(text) => expr.push_str(&regex::escape(text)),
            Segment::Placeholder(placeholder) => {
                // SQLite 列名不区分大小写
                if !seen.insert(placeholder.name.to_lowercase()) {
                    return Err(PatternError::DuplicateName {
                        name: placeholder.name,
                    });
                }
                expr.push_str(placeholder.kind.sub_pattern());
                let coercion = Coercion::for_placeholder(&placeholder);
                fields.push(Field {
                    placeholder,
                    coercion,
                });
            }
        }
    }
    expr.push('$');

    if fields.is_empty() {
        return Err(PatternError::NoPlaceholders(pattern.to_string()));
    }

    let regex = Regex::new(&expr).map_err(|e| PatternError::Regex(e.to_string()))?;
    let names: Arc<[String]> = fields.iter().map(|f| f.name().to_string()).collect();

    Ok(CompiledPattern {
        source: pattern.to_string(),
        regex,
        fields,
        names,
    })
}

impl CompiledPattern {
    /// 原始模板
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 生成的正则表达式
    pub fn as_regex(&self) -> &str {
        self.regex.as_str()
    }

    /// 字段表（按模板顺序）
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// 字段名列表，由该模板产生的所有记录共享
    pub fn names(&self) -> &Arc<[String]> {
        &self.names
    }

    /// 整行是否符合模板结构（不做类型转换）
    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// 匹配一行并转换所有字段
    ///
    /// 以下情况返回 `None`：
    /// - 行不符合模板结构；
    /// - 所有字段转换后都是空值。
    pub fn parse(&self, line: &str) -> Option<Record> {
        let caps = self.regex.captures(line)?;

        let values: Vec<Value> = self
            .fields
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                caps.get(idx + 1)
                    .map(|m| field.coercion.apply(m.as_str()))
                    .unwrap_or(Value::Null)
            })
            .collect();

        if values.iter().all(Value::is_null) {
            return None;
        }

        Some(Record::new(Arc::clone(&self.names), values))
    }
}
