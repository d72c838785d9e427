use chrono::NaiveDate;
use logfiler::{FieldType, LogLevel, PatternError, Transformer, Value, compile};

const LEVEL_PATTERN: &str = "{timestamp:date:yyyy-MM-dd} {level:enum-level} {source} {message}";
const NUMBER_PATTERN: &str =
    "{timestamp:date:yyyy-MM-dd} {level:enum-level} {source} {number:int} {message}";

#[test]
fn scenario_level_source_message() {
    let transformer = Transformer::from_pattern(LEVEL_PATTERN, false).unwrap();
    let record = transformer
        .transform_line("2023-10-01 I SourceA This is a log message")
        .unwrap();

    let midnight = NaiveDate::from_ymd_opt(2023, 10, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap();
    assert_eq!(record.get("timestamp"), Some(&Value::Timestamp(midnight)));
    assert_eq!(record.get("level"), Some(&Value::Integer(LogLevel::Info.code())));
    assert_eq!(record.get("source"), Some(&Value::Text("SourceA".into())));
    assert_eq!(
        record.get("message"),
        Some(&Value::Text("This is a log message".into()))
    );
}

#[test]
fn scenario_number_field() {
    let transformer = Transformer::from_pattern(NUMBER_PATTERN, false).unwrap();
    let record = transformer
        .transform_line("2023-10-01 I SourceA 5000 This is a log message")
        .unwrap();
    assert_eq!(record.get("number"), Some(&Value::Integer(5000)));
    assert_eq!(
        record.names(),
        &["timestamp", "level", "source", "number", "message"]
    );
}

#[test]
fn scenario_missing_groups() {
    let transformer = Transformer::from_pattern(NUMBER_PATTERN, false).unwrap();
    assert!(
        transformer
            .transform_line("2023-10-01 I This is a log message")
            .is_none()
    );
}

#[test]
fn scenario_single_date_field_unparsable() {
    let transformer = Transformer::from_pattern("{timestamp:date:yyyy-MM-dd}", false).unwrap();
    assert!(transformer.transform_line("This").is_none());
}

#[test]
fn declared_types_drive_value_types() {
    let pattern = compile("{at:date:yyyy-MM-dd HH:mm:ss} [{lvl:enum-level}] #{id:int} {text}").unwrap();
    let kinds: Vec<FieldType> = pattern.fields().iter().map(|f| f.kind()).collect();
    assert_eq!(
        kinds,
        vec![FieldType::Date, FieldType::Level, FieldType::Int, FieldType::Text]
    );

    let record = pattern
        .parse("2024-02-29 23:59:59 [w] #17 disk almost full")
        .unwrap();
    assert!(matches!(record.get("at"), Some(Value::Timestamp(_))));
    assert_eq!(record.get("lvl"), Some(&Value::Integer(LogLevel::Warn.code())));
    assert_eq!(record.get("id"), Some(&Value::Integer(17)));
    assert_eq!(record.get("text"), Some(&Value::Text("disk almost full".into())));
}

#[test]
fn lines_without_literal_structure_never_panic() {
    let pattern = compile("<{a}|{b:int}>").unwrap();
    for line in ["", "<", "<>", "<x|>", "x|1>", "<x|1", "<x|y>", "<<x|1>>x", "\u{1F600}"] {
        assert!(pattern.parse(line).is_none(), "line {:?} should be rejected", line);
    }
    assert!(pattern.parse("<x|1>").is_some());
}

#[test]
fn compiling_twice_behaves_identically() {
    let first = compile(NUMBER_PATTERN).unwrap();
    let second = compile(NUMBER_PATTERN).unwrap();
    assert_eq!(first.as_regex(), second.as_regex());

    for line in [
        "2023-10-01 I SourceA 5000 This is a log message",
        "2023-10-01 I This is a log message",
        "garbage",
        "2023-13-45 E src 1 bad date",
    ] {
        assert_eq!(first.parse(line), second.parse(line));
    }
}

#[test]
fn unknown_level_letters_map_to_unknown() {
    let pattern = compile("{level:enum-level} {message}").unwrap();
    let record = pattern.parse("U something").unwrap();
    assert_eq!(record.get("level"), Some(&Value::Integer(LogLevel::Unknown.code())));
}

#[test]
fn startup_errors() {
    assert_eq!(compile("").unwrap_err(), PatternError::Empty);
    assert!(matches!(
        compile("{source} {source}"),
        Err(PatternError::DuplicateName { .. })
    ));
    assert!(matches!(
        compile("{Source} {source}"),
        Err(PatternError::DuplicateName { .. })
    ));
    assert!(matches!(
        Transformer::from_pattern("{broken", false),
        Err(logfiler::Error::Pattern(PatternError::NoPlaceholders(_)))
    ));
    assert!(matches!(
        Transformer::from_pattern("{n:float}", false),
        Err(logfiler::Error::Pattern(PatternError::UnknownType { .. }))
    ));
}
