//! Merger: 把各文件的 Key 表合并为全局 Key 表
//!
//! 同一个原始值无论出现在多少个文件里, 合并后只有一个占位符。
//! 第一个贡献该值的文件决定其编号, 所以输入顺序必须稳定
//! (与文件发现顺序一致), 重复运行才能得到相同的占位符。

use tracing::{debug, error};

use super::error::SanitizerError;
use super::key_table::{KeyEntry, KeyNamer, KeyTable};
use super::scout::FileKeyList;

/// 全局 Key 表, 合并完成后只读
pub type GlobalKeyTable = KeyTable;

/// 带运行级 `KeyNamer` 的合并器
#[derive(Debug, Default)]
pub struct Merger {
    table: GlobalKeyTable,
    namer: KeyNamer,
    seeded: bool,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以先前持久化的 Key 表为种子
    ///
    /// 种子中的占位符原样保留并在 namer 中预留, 之后新值的编号不会与之冲突。
    pub fn seeded(seed: KeyTable) -> Self {
        let mut namer = KeyNamer::new();
        for entry in seed.iter() {
            namer.reserve(entry.placeholder.clone());
        }
        Self {
            seeded: !seed.is_empty(),
            table: seed,
            namer,
        }
    }

    /// 合并一个文件的 Key 表, 返回新增的条目数
    pub fn absorb(&mut self, file_keys: &FileKeyList) -> Result<usize, SanitizerError> {
        let mut added = 0;
        for entry in file_keys.iter() {
            if self.table.contains_value(&entry.original_value) {
                continue;
            }
            let placeholder = self.namer.next(&entry.label);
            let renamed = KeyEntry::new(
                placeholder,
                entry.original_value.clone(),
                entry.label.clone(),
            );
            if let Err(err) = self.table.insert(renamed) {
                error!(error = %err, "merge emitted a duplicate placeholder");
                return Err(err);
            }
            added += 1;
        }
        Ok(added)
    }

    /// 按顺序合并所有文件的 Key 表
    ///
    /// 未加种子且只有一个输入时原样返回 (不重新编号)。
    pub fn merge(
        mut self,
        mut file_keys: Vec<FileKeyList>,
    ) -> Result<GlobalKeyTable, SanitizerError> {
        if !self.seeded && file_keys.len() == 1 {
            return Ok(file_keys.remove(0));
        }

        for (idx, keys) in file_keys.iter().enumerate() {
            let added = self.absorb(keys)?;
            debug!(file_index = idx, added, total = self.table.len(), "merged file keys");
        }
        Ok(self.table)
    }
}

/// 合并有序的文件 Key 表
pub fn merge(file_keys: Vec<FileKeyList>) -> Result<GlobalKeyTable, SanitizerError> {
    Merger::new().merge(file_keys)
}
