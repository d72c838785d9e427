//! 行转换器
//!
//! 持有一个编译好的模板，把单行文本转换为 [`Record`]，不匹配的行被丢弃。

use crate::error::{Error, Result};
use crate::pattern::{self, CompiledPattern};
use crate::record::Record;
use tracing::debug;

/// 行转换器
///
/// 不匹配或所有字段都为空的行被视为"拒绝"，返回 `None` 而不是错误。
/// 详细模式下被拒绝的行会以 `debug` 级别写入日志，不影响返回值。
#[derive(Debug, Clone)]
pub struct Transformer {
    pattern: CompiledPattern,
    verbose: bool,
}

impl Transformer {
    pub fn new(pattern: CompiledPattern, verbose: bool) -> Self {
        Self { pattern, verbose }
    }

    /// 编译模板并创建转换器
    pub fn from_pattern(pattern: &str, verbose: bool) -> Result<Self> {
        Ok(Self::new(pattern::compile(pattern)?, verbose))
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    /// 转换一行
    ///
    /// # 返回
    ///
    /// * `Ok(Some(record))` - 匹配成功
    /// * `Ok(None)` - 行被拒绝
    /// * `Err(Error::InvalidInput)` - 传入了缺失的行
    pub fn transform(&self, line: Option<&str>) -> Result<Option<Record>> {
        match line {
            Some(line) => Ok(self.transform_line(line)),
            None => Err(Error::InvalidInput("missing log line")),
        }
    }

    /// 转换一行（行一定存在）
    pub fn transform_line(&self, line: &str) -> Option<Record> {
        let record = self.pattern.parse(line);
        if record.is_none() && self.verbose {
            debug!(target: "logfiler::rejected", line, "skipping invalid log entry");
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{LogLevel, Value};
    use chrono::NaiveDate;

    const PATTERN: &str = "{timestamp:date:yyyy-MM-dd} {level:enum-level} {source} {message}";
    const PATTERN_WITH_NUMBER: &str =
        "{timestamp:date:yyyy-MM-dd} {level:enum-level} {source} {number:int} {message}";

    #[test]
    fn missing_line_is_invalid_input() {
        let transformer = Transformer::from_pattern(PATTERN, false).unwrap();
        assert!(matches!(
            transformer.transform(None),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn valid_line_yields_typed_record() {
        let transformer = Transformer::from_pattern(PATTERN, false).unwrap();
        let record = transformer
            .transform(Some("2023-10-01 I SourceA This is a log message"))
            .unwrap()
            .unwrap();

        let expected_ts = NaiveDate::from_ymd_opt(2023, 10, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        assert_eq!(record.get("timestamp"), Some(&Value::Timestamp(expected_ts)));
        assert_eq!(
            record.get("level"),
            Some(&Value::Integer(LogLevel::Info.code()))
        );
        assert_eq!(record.get("source").and_then(Value::as_str), Some("SourceA"));
        assert_eq!(
            record.get("message").and_then(Value::as_str),
            Some("This is a log message")
        );
    }

    #[test]
    fn int_field_is_coerced() {
        let transformer = Transformer::from_pattern(PATTERN_WITH_NUMBER, false).unwrap();
        let record = transformer
            .transform_line("2023-10-01 I SourceA 5000 This is a log message")
            .unwrap();
        assert_eq!(record.get("number"), Some(&Value::Integer(5000)));
        assert_eq!(record.len(), 5);
    }

    #[test]
    fn missing_groups_are_rejected() {
        let transformer = Transformer::from_pattern(PATTERN_WITH_NUMBER, true).unwrap();
        assert!(transformer
            .transform_line("2023-10-01 I This is a log message")
            .is_none());
    }

    #[test]
    fn non_digit_number_is_rejected() {
        let transformer =
            Transformer::from_pattern("{timestamp:date:yyyy-MM-dd} {number:int} {message}", false)
                .unwrap();
        assert!(transformer
            .transform_line("2023-10-01 1g3 I This is a log message")
            .is_none());
    }

    #[test]
    fn garbage_lines_are_rejected() {
        let transformer = Transformer::from_pattern(PATTERN, false).unwrap();
        assert_eq!(transformer.transform(Some("Invalid log line")).unwrap(), None);
        assert_eq!(transformer.transform(Some("")).unwrap(), None);

        let single = Transformer::from_pattern("{timestamp:date:yyyy-MM-dd}", false).unwrap();
        assert_eq!(single.transform(Some("This")).unwrap(), None);
    }
}
