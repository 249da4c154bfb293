//! Key 表与占位符命名
//!
//! `KeyTable` 是占位符 -> 原始值的有序映射, 同时保证:
//! - 占位符唯一 (重复即内部错误)
//! - 原始值唯一 (重复插入直接跳过)

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::error::SanitizerError;

/// 单条 Key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyEntry {
    /// 占位符 (如 `Address1`)
    pub placeholder: String,
    /// 被替换的原始值
    pub original_value: String,
    /// 分配占位符时使用的标签
    pub label: String,
}

impl KeyEntry {
    pub fn new(
        placeholder: impl Into<String>,
        original_value: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            placeholder: placeholder.into(),
            original_value: original_value.into(),
            label: label.into(),
        }
    }
}

/// 占位符分配器
///
/// 同一标签第 n 次调用得到 `{label}{n}`。每个实例独立计数,
/// 并且不会发出本实例已发出或已保留的名字。
#[derive(Debug, Clone, Default)]
pub struct KeyNamer {
    counters: HashMap<String, u64>,
    issued: HashSet<String>,
}

impl KeyNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 标记一个已被占用的占位符, 之后 `next` 会跳过它
    pub fn reserve(&mut self, placeholder: impl Into<String>) {
        self.issued.insert(placeholder.into());
    }

    /// 分配下一个占位符
    pub fn next(&mut self, label: &str) -> String {
        let counter = self.counters.entry(label.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}{}", label, counter);
            if self.issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

/// 占位符 -> 原始值映射 (保持插入顺序)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<KeyEntry>", try_from = "Vec<KeyEntry>")]
pub struct KeyTable {
    entries: Vec<KeyEntry>,
    by_value: HashMap<String, usize>,
    by_placeholder: HashMap<String, usize>,
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一条 Key
    ///
    /// 原始值已存在时返回 `Ok(false)` 且不做修改;
    /// 占位符已存在 (指向另一个值) 时返回 `InvariantViolation`。
    pub fn insert(&mut self, entry: KeyEntry) -> Result<bool, SanitizerError> {
        if self.by_value.contains_key(&entry.original_value) {
            return Ok(false);
        }
        if self.by_placeholder.contains_key(&entry.placeholder) {
            return Err(SanitizerError::InvariantViolation(format!(
                "placeholder '{}' is already assigned to another value",
                entry.placeholder
            )));
        }

        let idx = self.entries.len();
        self.by_value.insert(entry.original_value.clone(), idx);
        self.by_placeholder.insert(entry.placeholder.clone(), idx);
        self.entries.push(entry);
        Ok(true)
    }

    /// 为新值分配占位符并插入; 值已存在时返回已有的占位符
    pub fn insert_value(
        &mut self,
        namer: &mut KeyNamer,
        label: &str,
        value: &str,
    ) -> Result<&str, SanitizerError> {
        let idx = match self.by_value.get(value) {
            Some(&idx) => idx,
            None => {
                let placeholder = namer.next(label);
                self.insert(KeyEntry::new(placeholder, value, label))?;
                self.entries.len() - 1
            }
        };
        Ok(&self.entries[idx].placeholder)
    }

    pub fn contains_value(&self, value: &str) -> bool {
        self.by_value.contains_key(value)
    }

    pub fn placeholder_for(&self, value: &str) -> Option<&str> {
        self.by_value
            .get(value)
            .map(|&idx| self.entries[idx].placeholder.as_str())
    }

    pub fn get(&self, placeholder: &str) -> Option<&KeyEntry> {
        self.by_placeholder
            .get(placeholder)
            .map(|&idx| &self.entries[idx])
    }

    pub fn value_of(&self, placeholder: &str) -> Option<&str> {
        self.get(placeholder).map(|e| e.original_value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyEntry> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a KeyTable {
    type Item = &'a KeyEntry;
    type IntoIter = std::slice::Iter<'a, KeyEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl From<KeyTable> for Vec<KeyEntry> {
    fn from(table: KeyTable) -> Self {
        table.entries
    }
}

impl TryFrom<Vec<KeyEntry>> for KeyTable {
    type Error = SanitizerError;

    fn try_from(entries: Vec<KeyEntry>) -> Result<Self, Self::Error> {
        let mut table = KeyTable::new();
        for entry in entries {
            let value = entry.original_value.clone();
            if !table.insert(entry)? {
                return Err(SanitizerError::InvariantViolation(format!(
                    "value '{}' appears more than once",
                    value
                )));
            }
        }
        Ok(table)
    }
}
