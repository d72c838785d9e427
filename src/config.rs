//! 运行配置
//!
//! 命令行选项以一张普通的数据表 [`OPTIONS`] 描述，由它构建 clap 的 `Command`，
//! 解析结果再转换为强类型的 [`Config`]。

use crate::error::{Error, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::ffi::OsString;
use std::path::PathBuf;

/// 默认每批提交的记录数
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// 默认的待写批次队列深度
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

const BANNER: &str = r"
    __            _____ __
   / /___  ____ _/ __(_) /__  _____
  / / __ \/ __ `/ /_/ / / _ \/ ___/
 / / /_/ / /_/ / __/ / /  __/ /
/_/\____/\__, /_/ /_/_/\___/_/
        /____/
";

const ABOUT: &str = "Reads a log file and stores it in a sqlite database";

const PATTERN_HELP: &str = "\
Pattern Format:
 {name:type:format}
  name: name of the group
  type: type of the group (date, enum-level, int, or text) (optional, default text)
  format: format of the group, used by date (optional, default yyyy-MM-ddTHH:mm:ss.ffffffZ)

Example:
 {timestamp:date:yyyy-MM-dd} {level:enum-level} {source} {message}";

/// 一个命令行选项的声明
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    /// 对应 [`Config`] 中的字段，同时作为 clap 的参数 id
    pub id: &'static str,
    pub short: char,
    pub long: &'static str,
    pub description: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
    /// `false` 表示开关选项
    pub takes_value: bool,
}

/// 所有命令行选项
pub const OPTIONS: &[OptionSpec] = &[
    OptionSpec {
        id: "file",
        short: 'f',
        long: "file",
        description: "path to the log file, also the base name of the sqlite database if db not specified. Any existing database with the same name will be replaced.",
        required: true,
        default: None,
        takes_value: true,
    },
    OptionSpec {
        id: "db",
        short: 'd',
        long: "db",
        description: "path to the sqlite database file. Any existing database with the same name will be replaced.",
        required: false,
        default: None,
        takes_value: true,
    },
    OptionSpec {
        id: "pattern",
        short: 'p',
        long: "pattern",
        description: "pattern to parse the log file, for example {timestamp:date:MM/dd/yyyy} {level:enum-level} {source} {message}",
        required: true,
        default: None,
        takes_value: true,
    },
    OptionSpec {
        id: "silent",
        short: 's',
        long: "silent",
        description: "Silent mode (no step reporting)",
        required: false,
        default: None,
        takes_value: false,
    },
    OptionSpec {
        id: "verbose",
        short: 'v',
        long: "verbose",
        description: "Far more logs",
        required: false,
        default: None,
        takes_value: false,
    },
    OptionSpec {
        id: "commit-size",
        short: 'c',
        long: "commit-size",
        description: "Number of entries to commit to the database at once",
        required: false,
        default: Some("100000"),
        takes_value: true,
    },
    OptionSpec {
        id: "queue-depth",
        short: 'q',
        long: "queue-depth",
        description: "Number of committed batches allowed to wait for the database writer",
        required: false,
        default: Some("4"),
        takes_value: true,
    },
];

impl OptionSpec {
    fn to_arg(self) -> Arg {
        let arg = Arg::new(self.id)
            .short(self.short)
            .long(self.long)
            .help(self.description)
            .required(self.required);

        if !self.takes_value {
            return arg.action(ArgAction::SetTrue);
        }

        let arg = arg.action(ArgAction::Set).value_name("value");
        match self.default {
            Some(default) => arg.default_value(default),
            None => arg,
        }
    }
}

/// 根据 [`OPTIONS`] 构建命令行定义
pub fn command() -> Command {
    Command::new("logfiler")
        .version(env!("CARGO_PKG_VERSION"))
        .about(ABOUT)
        .before_help(BANNER)
        .after_help(PATTERN_HELP)
        .args(OPTIONS.iter().map(|spec| spec.to_arg()))
}

/// 一次运行的配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub file_path: PathBuf,
    pub db_path: Option<PathBuf>,
    pub pattern: String,
    pub batch_size: usize,
    pub queue_depth: usize,
    pub verbose: bool,
    pub silent: bool,
}

impl Config {
    /// 使用默认参数创建配置
    pub fn new<P: Into<PathBuf>, S: Into<String>>(file_path: P, pattern: S) -> Self {
        Self {
            file_path: file_path.into(),
            db_path: None,
            pattern: pattern.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            verbose: false,
            silent: false,
        }
    }

    /// 解析命令行参数（第一个元素为程序名）
    ///
    /// `--help` / `--version` 以及 clap 自身的参数错误以 `clap::Error` 返回，
    /// 由调用方决定如何输出。
    pub fn try_parse_from<I, T>(args: I) -> std::result::Result<Result<Self>, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().try_get_matches_from(args)?;
        Ok(Self::from_matches(&matches))
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let text = |id: &str| matches.get_one::<String>(id).cloned();
        let number = |id: &str| -> Result<usize> {
            let raw = text(id).unwrap_or_default();
            let value = raw
                .parse::<usize>()
                .map_err(|_| Error::Config(format!("--{} expects a positive integer, got '{}'", id, raw)))?;
            if value == 0 {
                return Err(Error::Config(format!("--{} must be greater than zero", id)));
            }
            Ok(value)
        };

        let file_path = text("file")
            .map(PathBuf::from)
            .ok_or_else(|| Error::Config("file missing in arguments".into()))?;
        let pattern = text("pattern").ok_or_else(|| Error::Config("pattern missing in arguments".into()))?;

        Ok(Self {
            file_path,
            db_path: text("db").map(PathBuf::from),
            pattern,
            batch_size: number("commit-size")?,
            queue_depth: number("queue-depth")?,
            verbose: matches.get_flag("verbose"),
            silent: matches.get_flag("silent"),
        })
    }

    /// 数据库路径：未指定时为 `<日志文件>.db`
    pub fn database_path(&self) -> PathBuf {
        match &self.db_path {
            Some(path) => path.clone(),
            None => {
                let mut name = self.file_path.clone().into_os_string();
                name.push(".db");
                PathBuf::from(name)
            }
        }
    }
}
