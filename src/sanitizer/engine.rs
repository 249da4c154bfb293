//! Sanitizer 核心引擎实现
//!
//! 按原始值长度从长到短做字面量替换。
//! 较短的值可能是较长值的子串 (如 `10.0.0.1` 与 `10.0.0.15`),
//! 先替换长值才不会把长值拆坏。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::key_table::KeyTable;

/// 脱敏统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizationStats {
    /// 各标签替换计数
    pub counts: HashMap<String, usize>,
    /// 总替换数
    pub total: usize,
}

impl SanitizationStats {
    /// 创建新统计
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次替换
    pub fn record(&mut self, label: &str, count: usize) {
        *self.counts.entry(label.to_string()).or_insert(0) += count;
        self.total += count;
    }

    /// 合并另一份统计
    pub fn absorb(&mut self, other: &SanitizationStats) {
        for (label, count) in &other.counts {
            self.record(label, *count);
        }
    }
}

/// 脱敏结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizationResult {
    /// 脱敏后的文本 (含 banner)
    pub sanitized_text: String,
    /// 统计信息
    pub stats: SanitizationStats,
    /// 是否有任何替换
    pub has_matches: bool,
}

#[derive(Debug, Clone)]
struct Substitution {
    value: String,
    placeholder: String,
    label: String,
}

/// Sanitizer 核心引擎
///
/// 由一张已定稿的 Key 表构建, 替换顺序只计算一次, 可在多个文件间共享。
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    substitutions: Vec<Substitution>,
}

impl Sanitizer {
    /// 从 Key 表创建 Sanitizer
    pub fn new(table: &KeyTable) -> Self {
        let mut substitutions: Vec<_> = table
            .iter()
            .filter(|e| !e.original_value.is_empty())
            .map(|e| Substitution {
                value: e.original_value.clone(),
                placeholder: e.placeholder.clone(),
                label: e.label.clone(),
            })
            .collect();

        // 稳定排序: 等长的值保持表内顺序
        substitutions.sort_by(|a, b| b.value.chars().count().cmp(&a.value.chars().count()));

        Self { substitutions }
    }

    /// 对文本进行脱敏处理
    ///
    /// # Arguments
    /// * `content` - 原始文件内容
    /// * `banner` - 已展开的首行文本, 为空则不添加
    ///
    /// # Returns
    /// * `SanitizationResult` - 脱敏结果，包含处理后文本和统计信息
    pub fn sanitize(&self, content: &str, banner: &str) -> SanitizationResult {
        let mut result = content.to_string();
        let mut stats = SanitizationStats::new();

        for sub in &self.substitutions {
            let count = result.matches(sub.value.as_str()).count();
            if count == 0 {
                continue;
            }
            stats.record(&sub.label, count);
            result = result.replace(sub.value.as_str(), &sub.placeholder);
        }

        SanitizationResult {
            sanitized_text: with_banner(banner, result),
            has_matches: stats.total > 0,
            stats,
        }
    }
}

fn with_banner(banner: &str, body: String) -> String {
    if banner.is_empty() {
        return body;
    }
    let mut out = String::with_capacity(banner.len() + 1 + body.len());
    out.push_str(banner);
    if !banner.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&body);
    out
}

/// 用 Key 表对文本脱敏并添加 banner
pub fn sanitize(content: &str, table: &KeyTable, banner: &str) -> String {
    Sanitizer::new(table).sanitize(content, banner).sanitized_text
}
