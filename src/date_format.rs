//! 日期格式解析
//!
//! 模板中的 `date` 占位符使用 `yyyy-MM-dd HH:mm:ss.ffffff` 风格的格式串。
//! 此模块在模板编译时把它一次性翻译成 chrono 的格式项，解析每一行时不再重复处理格式串。
//!
//! 支持的记号：
//!
//! | 记号            | 含义                         |
//! |-----------------|------------------------------|
//! | `yyyy` / `yy`   | 四位 / 两位年份              |
//! | `M` `MM`        | 月份数字                     |
//! | `MMM` `MMMM`    | 月份缩写 / 全称              |
//! | `d` `dd`        | 日                           |
//! | `ddd` `dddd`    | 星期缩写 / 全称              |
//! | `H` `HH`        | 24 小时制                    |
//! | `h` `hh`        | 12 小时制（需配合 `tt`）     |
//! | `m` `mm`        | 分钟                         |
//! | `s` `ss`        | 秒                           |
//! | `.f…`           | 小数点加小数秒（任意位数）   |
//! | `f…` / `F…`     | 恰好 / 至多 n 位小数秒       |
//! | `tt`            | AM / PM                      |
//! | `z…` / `K`      | 时区偏移，结果换算为 UTC     |
//! | `'…'` `"…"` `\c`| 字面量                       |
//!
//! 其余字符均按字面量匹配。

use chrono::format::{self, Fixed, Item, Parsed, StrftimeItems};
use chrono::{NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;

/// 未指定格式时使用的默认日期格式
pub const DEFAULT_DATE_FORMAT: &str = "yyyy-MM-ddTHH:mm:ss.ffffffZ";

/// 默认格式只翻译一次
pub static DEFAULT: Lazy<DateFormat> = Lazy::new(|| DateFormat::new(DEFAULT_DATE_FORMAT));

/// chrono 只支持 3/6/9 位的无点小数秒，其余位数单独处理
#[derive(Debug, Clone)]
enum Piece {
    Items(Vec<Item<'static>>),
    /// `f` 要求恰好 `digits` 位，`F` 允许 0 到 `digits` 位
    Fraction { digits: usize, exact: bool },
}

/// 编译后的日期格式
#[derive(Debug, Clone)]
pub struct DateFormat {
    source: String,
    pieces: Vec<Piece>,
    has_time: bool,
    has_offset: bool,
}

/// 是否含有引号和转义之外的 `t`（AM/PM 标记）
fn has_designator(chars: &[char]) -> bool {
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            't' => return true,
            quote @ ('\'' | '"') => {
                let quoted = chars[i + 1..].iter().take_while(|&&x| x != quote).count();
                i += quoted + 2;
            }
            '\\' => i += 2,
            _ => i += 1,
        }
    }
    false
}

impl DateFormat {
    /// 翻译格式串。无法识别的字符都按字面量处理，因此该函数不会失败。
    pub fn new(source: &str) -> Self {
        let chars: Vec<char> = source.chars().collect();
        let has_ampm = has_designator(&chars);
        let mut pieces: Vec<Piece> = Vec::new();
        let mut items: Vec<Item<'static>> = Vec::new();
        let mut literal = String::new();
        let mut has_time = false;
        let mut has_offset = false;

        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let run = chars[i..].iter().take_while(|&&x| x == c).count();

            let spec: Option<&'static str> = match c {
                'y' => Some(if run >= 3 { "%Y" } else { "%y" }),
                'M' => Some(match run {
                    1 | 2 => "%m",
                    3 => "%b",
                    _ => "%B",
                }),
                'd' => Some(match run {
                    1 | 2 => "%d",
                    3 => "%a",
                    _ => "%A",
                }),
                'H' => Some("%H"),
                'h' => Some(if has_ampm { "%I" } else { "%H" }),
                'm' => Some("%M"),
                's' => Some("%S"),
                't' => Some("%p"),
                'z' => Some("%:z"),
                _ => None,
            };

            if let Some(spec) = spec {
                flush_literal(&mut literal, &mut items);
                items.extend(StrftimeItems::new(spec));
                has_time |= matches!(c, 'H' | 'h' | 'm' | 's' | 't');
                has_offset |= c == 'z';
                i += run;
                continue;
            }

            match c {
                // 小数点后紧跟 f 时整体作为"带点的小数秒"，位数不限
                '.' if matches!(chars.get(i + 1), Some(&'f') | Some(&'F')) => {
                    flush_literal(&mut literal, &mut items);
                    items.push(Item::Fixed(Fixed::Nanosecond));
                    has_time = true;
                    let frac = chars[i + 1..]
                        .iter()
                        .take_while(|&&x| x == 'f' || x == 'F')
                        .count();
                    i += 1 + frac;
                }
                'f' | 'F' => {
                    flush_literal(&mut literal, &mut items);
                    if !items.is_empty() {
                        pieces.push(Piece::Items(std::mem::take(&mut items)));
                    }
                    pieces.push(Piece::Fraction {
                        digits: run,
                        exact: c == 'f',
                    });
                    has_time = true;
                    i += run;
                }
                'K' => {
                    flush_literal(&mut literal, &mut items);
                    items.push(Item::Fixed(Fixed::TimezoneOffsetColonZ));
                    has_offset = true;
                    i += 1;
                }
                '\'' | '"' => {
                    let quoted: String = chars[i + 1..].iter().take_while(|&&x| x != c).collect();
                    literal.push_str(&quoted);
                    // 跳过起止引号；未闭合的引号吞掉剩余部分
                    i += quoted.chars().count() + 2;
                }
                '\\' => {
                    if let Some(&next) = chars.get(i + 1) {
                        literal.push(next);
                    }
                    i += 2;
                }
                '%' => i += 1,
                _ => {
                    literal.push(c);
                    i += 1;
                }
            }
        }
        flush_literal(&mut literal, &mut items);
        if !items.is_empty() {
            pieces.push(Piece::Items(items));
        }

        Self {
            source: source.to_string(),
            pieces,
            has_time,
            has_offset,
        }
    }

    /// 原始格式串
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 按格式解析，必须完整消费输入。失败返回 `None`。
    ///
    /// 只含日期的格式得到当天零点；带时区偏移的格式换算为 UTC。
    pub fn parse(&self, input: &str) -> Option<NaiveDateTime> {
        let mut parsed = Parsed::new();
        let mut rest = input;
        for piece in &self.pieces {
            rest = match piece {
                Piece::Items(items) => format::parse_and_remainder(&mut parsed, rest, items.iter()).ok()?,
                Piece::Fraction { digits, exact } => parse_fraction(&mut parsed, rest, *digits, *exact)?,
            };
        }
        if !rest.is_empty() {
            return None;
        }

        if self.has_offset {
            return parsed.to_datetime().ok().map(|dt| dt.naive_utc());
        }

        let date = parsed.to_naive_date().ok()?;
        let time = if self.has_time {
            parsed.to_naive_time().ok()?
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)?
        };
        Some(date.and_time(time))
    }
}

/// 读取至多 `digits` 位小数秒（超过 9 位的部分被截断），返回剩余输入
fn parse_fraction<'a>(parsed: &mut Parsed, input: &'a str, digits: usize, exact: bool) -> Option<&'a str> {
    let len = input
        .bytes()
        .take(digits)
        .take_while(|b| b.is_ascii_digit())
        .count();
    if exact && len < digits {
        return None;
    }

    let mut nanos: i64 = 0;
    for b in input.bytes().take(len.min(9)) {
        nanos = nanos * 10 + i64::from(b - b'0');
    }
    for _ in len.min(9)..9 {
        nanos *= 10;
    }
    parsed.set_nanosecond(nanos).ok()?;
    Some(&input[len..])
}

fn flush_literal(literal: &mut String, items: &mut Vec<Item<'static>>) {
    if !literal.is_empty() {
        items.push(Item::OwnedLiteral(std::mem::take(literal).into_boxed_str()));
    }
}
