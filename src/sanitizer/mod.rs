//! Sanitizer 模块 - 可逆的敏感信息脱敏引擎
//!
//! 用稳定的占位符 (如 `Address1`) 替换敏感字面量, 同时保留占位符 -> 原始值的 Key 表,
//! 使多个文件、多次运行对同一个值使用同一个占位符。
//!
//! 流程: Scout (并发提取) -> Merger (顺序合并) -> Sanitizer (并发替换)。

mod banner;
mod config;
mod engine;
mod error;
mod key_table;
mod keylist;
mod merger;
mod orchestrator;
mod output;
mod patterns;
mod scout;

pub use banner::{BannerTemplate, DATETIME_FORMAT, DATE_FORMAT};
pub use config::{SanitizerConfig, CONFIG_FILENAME};
pub use engine::{sanitize, SanitizationResult, SanitizationStats, Sanitizer};
pub use error::{ErrorResponse, FileFailure, Phase, SanitizerError};
pub use key_table::{KeyEntry, KeyNamer, KeyTable};
pub use keylist::{KeyList, SanitizedRecord, FILES_HEADER};
pub use merger::{merge, GlobalKeyTable, Merger};
pub use orchestrator::{Orchestrator, RunEvent, RunReport, SourceFile};
pub use output::{atomic_write, DirectorySink, MemorySink, OutputSink};
pub use patterns::{
    CompiledIndicator, IgnoreList, Indicator, IndicatorSet, BUILTIN_IGNORE, BUILTIN_INDICATORS,
};
pub use scout::{scout, FileKeyList};

#[cfg(test)]
mod tests;
