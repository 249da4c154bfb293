//! 内置 Indicator 定义
//!
//! Indicator = (正则, 标签)。正则的第一个捕获组是要脱敏的片段,
//! 标签是占位符的前缀 (如 `Address` -> `Address1`)。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::error::SanitizerError;

/// 脱敏 Indicator (未编译形式, 用于配置文件)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    /// 正则表达式模式
    pub pattern: String,
    /// 占位符标签
    pub label: String,
    /// 是否启用
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Indicator {
    /// 创建新 Indicator
    pub fn new(pattern: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            label: label.into(),
            enabled: true,
        }
    }
}

/// 编译后的 Indicator
#[derive(Debug, Clone)]
pub struct CompiledIndicator {
    label: String,
    regex: Regex,
}

impl CompiledIndicator {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 找出所有需要脱敏的片段
    ///
    /// 有捕获组时取第一个捕获组, 否则取整个匹配。
    /// 未参与匹配的捕获组和空片段会被跳过。
    pub fn spans<'t>(&'t self, text: &'t str) -> impl Iterator<Item = &'t str> + 't {
        let use_group = self.regex.captures_len() > 1;
        self.regex.captures_iter(text).filter_map(move |caps| {
            let span = if use_group { caps.get(1) } else { caps.get(0) };
            span.map(|m| m.as_str()).filter(|s| !s.is_empty())
        })
    }
}

/// 有序的 Indicator 集合
///
/// 顺序只影响占位符的分配顺序, 不影响最终被替换的文本。
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    indicators: Vec<CompiledIndicator>,
}

impl IndicatorSet {
    /// 编译并校验 Indicator 列表, 跳过未启用的
    pub fn new(indicators: &[Indicator]) -> Result<Self, SanitizerError> {
        let mut compiled = Vec::with_capacity(indicators.len());
        for indicator in indicators.iter().filter(|i| i.enabled) {
            validate_label(&indicator.label)?;
            validate_regex_pattern(&indicator.pattern)?;
            compiled.push(CompiledIndicator {
                label: indicator.label.clone(),
                regex: Regex::new(&indicator.pattern)?,
            });
        }
        Ok(Self {
            indicators: compiled,
        })
    }

    /// 使用内置 Indicator 创建
    pub fn with_defaults() -> Result<Self, SanitizerError> {
        Self::new(&BUILTIN_INDICATORS)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledIndicator> {
        self.indicators.iter()
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }
}

/// 免脱敏字面量集合
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoreList(HashSet<String>);

impl IgnoreList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.contains(value)
    }

    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        self.0.insert(value.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for IgnoreList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// 验证正则表达式是否有效
pub fn validate_regex_pattern(pattern: &str) -> Result<(), SanitizerError> {
    if pattern.trim().is_empty() {
        return Err(SanitizerError::ConfigError(
            "Regex pattern cannot be empty".to_string(),
        ));
    }
    Regex::new(pattern)?;
    Ok(())
}

/// 标签不能为空, 也不能含空白 (占位符会被写进 keylist 的 `<placeholder> <value>` 行)
pub fn validate_label(label: &str) -> Result<(), SanitizerError> {
    if label.is_empty() {
        return Err(SanitizerError::ConfigError(
            "Indicator label cannot be empty".to_string(),
        ));
    }
    if label.chars().any(char::is_whitespace) {
        return Err(SanitizerError::ConfigError(format!(
            "Indicator label '{}' cannot contain whitespace",
            label
        )));
    }
    Ok(())
}

/// 内置 Indicator 集
pub static BUILTIN_INDICATORS: Lazy<Vec<Indicator>> = Lazy::new(|| {
    vec![
        // IPv4 地址
        Indicator::new(r"\b((?:\d{1,3}\.){3}\d{1,3})\b", "Address"),
        // UNC 路径中的主机名: \\server\share
        Indicator::new(r"\\\\([A-Za-z0-9][A-Za-z0-9.\-]*)\\", "Hostname"),
        // Windows 用户目录中的用户名: C:\Users\alice\
        Indicator::new(r"(?i)[A-Z]:\\Users\\([^\\\s/:*?<>|]+)", "Username"),
        // 邮箱地址
        Indicator::new(
            r"\b([A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,})\b",
            "Email",
        ),
    ]
});

/// 内置免脱敏字面量
pub static BUILTIN_IGNORE: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec!["127.0.0.1", "0.0.0.0", "255.255.255.255", "Public", "Default"]
});
