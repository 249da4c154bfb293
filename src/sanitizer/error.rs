//! Sanitizer 错误类型定义

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Sanitizer 错误类型
#[derive(Debug, Error)]
pub enum SanitizerError {
    /// 无效的正则表达式模式
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// 配置错误 (加载阶段即失败, 早于任何 Scout)
    #[error("Config error: {0}")]
    ConfigError(String),

    /// 单个文件读写失败
    #[error("Input error on {}: {source}", path.display())]
    InputError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key 表内部不变式被破坏
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// 没有任何可用文件
    #[error("No usable files: {} file(s) failed during scouting", failures.len())]
    NoUsableFiles { failures: Vec<FileFailure> },

    /// Key 列表解析错误
    #[error("Keylist parse error at line {line}: {message}")]
    KeyListParse { line: usize, message: String },

    /// 后台任务异常退出
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// 序列化错误
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SanitizerError {
    /// Create an input error for `path`
    pub fn input(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::InputError {
            path: path.into(),
            source,
        }
    }

    /// 错误码 (供调用方区分处理)
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidPattern(_) => "INVALID_PATTERN",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InputError { .. } => "INPUT_ERROR",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
            Self::NoUsableFiles { .. } => "NO_USABLE_FILES",
            Self::KeyListParse { .. } => "KEYLIST_PARSE_ERROR",
            Self::TaskFailed(_) => "TASK_FAILED",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// 是否只影响单个文件 (不应中断同阶段的其他任务)
    pub fn is_file_scoped(&self) -> bool {
        matches!(self, Self::InputError { .. })
    }
}

/// Serializable error response
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code for client-side handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl From<&SanitizerError> for ErrorResponse {
    fn from(err: &SanitizerError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl Serialize for SanitizerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        ErrorResponse::from(self).serialize(serializer)
    }
}

/// Which phase a per-file failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Scout,
    Sanitize,
}

/// 单个文件的失败记录, 汇总进运行报告
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: PathBuf,
    pub phase: Phase,
    pub error: ErrorResponse,
}

impl FileFailure {
    pub fn new(path: impl Into<PathBuf>, phase: Phase, err: &SanitizerError) -> Self {
        Self {
            path: path.into(),
            phase,
            error: ErrorResponse::from(err),
        }
    }
}
