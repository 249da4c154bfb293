//! Banner 模板
//!
//! 只识别固定的几个占位符, 不执行任何模板内容:
//! - `{date}`      -> `2024-05-01`
//! - `{datetime}`  -> `2024-05-01 13:45:00`
//! - `{{` / `}}`   -> 字面量花括号
//!
//! 其余 `{...}` 在加载配置时即报错。

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::error::SanitizerError;

/// `{date}` 展开格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// `{datetime}` 展开格式, 也用于 keylist 中的文件时间戳
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Date,
    DateTime,
}

/// 解析后的 banner 模板
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BannerTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl BannerTemplate {
    /// 解析模板, 未知占位符或未闭合的花括号返回 `ConfigError`
    pub fn parse(template: &str) -> Result<Self, SanitizerError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.char_indices().peekable();

        while let Some((pos, c)) = chars.next() {
            match c {
                '{' if chars.peek().map(|&(_, n)| n) == Some('{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek().map(|&(_, n)| n) == Some('}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let rest = &template[pos + 1..];
                    let end = rest.find('}').ok_or_else(|| {
                        SanitizerError::ConfigError(format!(
                            "Unclosed '{{' at offset {} in banner template",
                            pos
                        ))
                    })?;
                    let token = &rest[..end];
                    let segment = match token {
                        "date" => Segment::Date,
                        "datetime" => Segment::DateTime,
                        other => {
                            return Err(SanitizerError::ConfigError(format!(
                                "Unknown banner token '{{{}}}'",
                                other
                            )))
                        }
                    };
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(segment);
                    // 跳过 token 和右括号
                    for _ in 0..token.chars().count() + 1 {
                        chars.next();
                    }
                }
                '}' => {
                    return Err(SanitizerError::ConfigError(format!(
                        "Unmatched '}}' at offset {} in banner template",
                        pos
                    )))
                }
                _ => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// 以指定时间展开
    pub fn expand_at(&self, now: NaiveDateTime) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Date => out.push_str(&now.format(DATE_FORMAT).to_string()),
                Segment::DateTime => out.push_str(&now.format(DATETIME_FORMAT).to_string()),
            }
        }
        out
    }

    /// 以当前本地时间展开
    pub fn expand(&self) -> String {
        self.expand_at(Local::now().naive_local())
    }

    /// 展开后占用的行数 (空模板为 0)
    pub fn line_count(&self) -> usize {
        if self.source.is_empty() {
            return 0;
        }
        let trimmed = self.source.strip_suffix('\n').unwrap_or(&self.source);
        trimmed.matches('\n').count() + 1
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }
}

impl TryFrom<String> for BannerTemplate {
    type Error = SanitizerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BannerTemplate> for String {
    fn from(template: BannerTemplate) -> Self {
        template.source
    }
}
