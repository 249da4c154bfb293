//! Scout: 单文件敏感值提取
//!
//! 每个 Indicator 都匹配 **原始** 文本, 互相看不到对方的替换结果,
//! 因此 Scout 是输入的纯函数, 可以在多个文件上并发执行。

use tracing::error;

use super::key_table::{KeyNamer, KeyTable};
use super::patterns::{IgnoreList, IndicatorSet};

/// 单文件的 Key 表 (由一次 Scout 调用产生, 交给 Merger 后丢弃)
pub type FileKeyList = KeyTable;

/// 从文本中提取敏感值
///
/// # Arguments
/// * `content` - 已解码的文件内容
/// * `indicators` - 有序 Indicator 集合
/// * `ignore` - 免脱敏字面量
///
/// # Returns
/// 使用本地 `KeyNamer` 编号的 `FileKeyList`
pub fn scout(content: &str, indicators: &IndicatorSet, ignore: &IgnoreList) -> FileKeyList {
    let mut table = KeyTable::new();
    let mut namer = KeyNamer::new();

    for indicator in indicators.iter() {
        for value in indicator.spans(content) {
            if table.contains_value(value) || ignore.contains(value) {
                continue;
            }
            // 本地 namer 只会发出未用过的名字
            let inserted = table.insert_value(&mut namer, indicator.label(), value);
            debug_assert!(inserted.is_ok(), "scout produced a duplicate placeholder");
            if let Err(err) = inserted {
                error!(error = %err, "scout produced a duplicate placeholder");
            }
        }
    }

    table
}
