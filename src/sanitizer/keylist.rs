//! Key 列表文件
//!
//! 文本格式:
//! ```text
//! <banner 行, 已展开>
//! <placeholder> <originalValue>
//! List of files using this Key:
//! <timestamp> - <outputPath>
//! ```
//! 读取时需要知道 banner 的行数 (见 `BannerTemplate::line_count`),
//! 因为 banner 中的日期每次运行都不同。

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::banner::DATETIME_FORMAT;
use super::error::SanitizerError;
use super::key_table::{KeyEntry, KeyTable};
use super::output::atomic_write;

/// Key 列表与文件记录之间的分隔行
pub const FILES_HEADER: &str = "List of files using this Key:";

/// 一个已脱敏文件的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizedRecord {
    /// 输出路径
    pub output_path: PathBuf,
    /// 脱敏时间 (`%Y-%m-%d %H:%M:%S`)
    pub timestamp: String,
}

impl SanitizedRecord {
    pub fn new(output_path: impl Into<PathBuf>, timestamp: impl Into<String>) -> Self {
        Self {
            output_path: output_path.into(),
            timestamp: timestamp.into(),
        }
    }

    /// 以当前本地时间创建记录
    pub fn now(output_path: impl Into<PathBuf>) -> Self {
        Self::new(output_path, Local::now().format(DATETIME_FORMAT).to_string())
    }
}

/// 持久化的 Key 列表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyList {
    /// 已展开的 banner (可多行)
    pub banner: String,
    pub table: KeyTable,
    pub records: Vec<SanitizedRecord>,
}

impl KeyList {
    pub fn new(banner: impl Into<String>, table: KeyTable, records: Vec<SanitizedRecord>) -> Self {
        Self {
            banner: banner.into(),
            table,
            records,
        }
    }

    /// 渲染为文本 (以换行结尾)
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.banner.is_empty() {
            out.push_str(self.banner.strip_suffix('\n').unwrap_or(&self.banner));
            out.push('\n');
        }
        for entry in self.table.iter() {
            out.push_str(&entry.placeholder);
            out.push(' ');
            out.push_str(&entry.original_value);
            out.push('\n');
        }
        out.push_str(FILES_HEADER);
        out.push('\n');
        for record in &self.records {
            out.push_str(&record.timestamp);
            out.push_str(" - ");
            out.push_str(&record.output_path.to_string_lossy());
            out.push('\n');
        }
        out
    }

    /// 解析文本
    ///
    /// # Arguments
    /// * `text` - keylist 文件内容
    /// * `banner_lines` - 开头需要跳过的 banner 行数
    pub fn parse(text: &str, banner_lines: usize) -> Result<Self, SanitizerError> {
        let mut lines = text.lines().enumerate();
        let mut banner = Vec::with_capacity(banner_lines);
        for _ in 0..banner_lines {
            match lines.next() {
                Some((_, line)) => banner.push(line),
                None => {
                    return Err(parse_error(text.lines().count() + 1, "file ends inside the banner"))
                }
            }
        }

        let mut table = KeyTable::new();
        let mut saw_header = false;
        for (idx, line) in lines.by_ref() {
            if line == FILES_HEADER {
                saw_header = true;
                break;
            }
            let (placeholder, value) = line
                .split_once(' ')
                .ok_or_else(|| parse_error(idx + 1, "expected '<placeholder> <value>'"))?;
            if placeholder.is_empty() || value.is_empty() {
                return Err(parse_error(idx + 1, "empty placeholder or value"));
            }
            let entry = KeyEntry::new(placeholder, value, label_of(placeholder));
            match table.insert(entry) {
                Ok(true) => {}
                Ok(false) => return Err(parse_error(idx + 1, "value listed more than once")),
                Err(_) => return Err(parse_error(idx + 1, "placeholder listed more than once")),
            }
        }
        if !saw_header {
            return Err(parse_error(
                text.lines().count() + 1,
                "missing 'List of files using this Key:' line",
            ));
        }

        let mut records = Vec::new();
        for (idx, line) in lines {
            if line.is_empty() {
                continue;
            }
            let (timestamp, path) = line
                .split_once(" - ")
                .ok_or_else(|| parse_error(idx + 1, "expected '<timestamp> - <path>'"))?;
            records.push(SanitizedRecord::new(path, timestamp));
        }

        Ok(Self {
            banner: banner.join("\n"),
            table,
            records,
        })
    }

    /// 写入文件
    pub fn write_to(&self, path: &Path) -> Result<(), SanitizerError> {
        atomic_write(path, self.render().as_bytes()).map_err(|e| SanitizerError::input(path, e))
    }

    /// 从文件读取
    pub fn read_from(path: &Path, banner_lines: usize) -> Result<Self, SanitizerError> {
        let text = fs::read_to_string(path).map_err(|e| SanitizerError::input(path, e))?;
        Self::parse(&text, banner_lines)
    }
}

fn parse_error(line: usize, message: &str) -> SanitizerError {
    SanitizerError::KeyListParse {
        line,
        message: message.to_string(),
    }
}

/// 导入时从占位符恢复标签: 去掉末尾计数
///
/// 只用于统计显示; 导入的占位符本身原样保留, 不会被重新编号。
fn label_of(placeholder: &str) -> &str {
    let label = placeholder.trim_end_matches(|c: char| c.is_ascii_digit());
    if label.is_empty() {
        placeholder
    } else {
        label
    }
}
