//! 脱敏配置模块
//!
//! 从 JSON 加载 Indicator、免脱敏列表和 banner 模板。
//! 所有校验在加载时完成, 任何文件被扫描之前配置错误就会暴露。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::banner::BannerTemplate;
use super::error::SanitizerError;
use super::patterns::{
    validate_label, validate_regex_pattern, IgnoreList, Indicator, IndicatorSet,
    BUILTIN_IGNORE, BUILTIN_INDICATORS,
};

/// 配置文件名
pub const CONFIG_FILENAME: &str = "keyscrub.json";

const DEFAULT_BANNER: &str = "Sanitized on {date}";
const DEFAULT_KEYLIST_BANNER: &str = "Key list generated {datetime}";
const DEFAULT_OUTPUT_SUFFIX: &str = "_sanitized";

/// 脱敏配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// 是否包含内置 Indicator (在自定义 Indicator 之前)
    pub use_builtin_indicators: bool,
    /// 自定义 Indicator, 顺序即占位符分配顺序
    pub indicators: Vec<Indicator>,
    /// 免脱敏字面量
    pub ignore: Vec<String>,
    /// 脱敏输出的首行模板
    pub banner: BannerTemplate,
    /// keylist 文件的首行模板
    pub keylist_banner: BannerTemplate,
    /// 输出文件名后缀
    pub output_suffix: String,
    /// 输出目录, 为空时写在源文件旁边
    pub output_dir: Option<PathBuf>,
    /// 最大并发任务数, 为空时取 CPU 数
    pub max_concurrent: Option<usize>,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            use_builtin_indicators: true,
            indicators: Vec::new(),
            ignore: BUILTIN_IGNORE.iter().map(|s| s.to_string()).collect(),
            banner: BannerTemplate::parse(DEFAULT_BANNER).unwrap_or_default(),
            keylist_banner: BannerTemplate::parse(DEFAULT_KEYLIST_BANNER).unwrap_or_default(),
            output_suffix: DEFAULT_OUTPUT_SUFFIX.to_string(),
            output_dir: None,
            max_concurrent: None,
        }
    }
}

impl SanitizerConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从配置目录加载配置, 文件不存在时返回默认配置
    pub fn load(config_dir: &Path) -> Result<Self, SanitizerError> {
        let config_path = config_dir.join(CONFIG_FILENAME);

        if !config_path.exists() {
            debug!(path = %config_path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_file(&config_path)
    }

    /// 从指定文件加载并校验配置
    pub fn load_file(path: &Path) -> Result<Self, SanitizerError> {
        let content = fs::read_to_string(path).map_err(|e| {
            SanitizerError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            SanitizerError::ConfigError(format!("Failed to parse config file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// 保存配置到配置目录
    pub fn save(&self, config_dir: &Path) -> Result<(), SanitizerError> {
        let config_path = config_dir.join(CONFIG_FILENAME);

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(|e| {
                SanitizerError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;

        fs::write(&config_path, content).map_err(|e| {
            SanitizerError::ConfigError(format!("Failed to write config file: {}", e))
        })
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), SanitizerError> {
        self.indicator_set()?;

        if self.max_concurrent == Some(0) {
            return Err(SanitizerError::ConfigError(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.output_dir.is_none() && self.output_suffix.is_empty() {
            return Err(SanitizerError::ConfigError(
                "output_suffix cannot be empty when output_dir is not set".to_string(),
            ));
        }
        Ok(())
    }

    /// 获取合并后的 Indicator 列表 (内置在前, 自定义在后)
    pub fn merged_indicators(&self) -> Vec<Indicator> {
        let mut indicators = Vec::new();
        if self.use_builtin_indicators {
            indicators.extend(BUILTIN_INDICATORS.iter().cloned());
        }
        indicators.extend(self.indicators.iter().cloned());
        indicators
    }

    /// 编译 Indicator 集合
    pub fn indicator_set(&self) -> Result<IndicatorSet, SanitizerError> {
        IndicatorSet::new(&self.merged_indicators())
    }

    pub fn ignore_list(&self) -> IgnoreList {
        self.ignore.iter().cloned().collect()
    }

    /// 添加自定义 Indicator
    ///
    /// 相同 pattern 已存在时返回错误
    pub fn add_indicator(&mut self, indicator: Indicator) -> Result<(), SanitizerError> {
        if self.indicators.iter().any(|i| i.pattern == indicator.pattern) {
            return Err(SanitizerError::ConfigError(format!(
                "Indicator with pattern '{}' already exists",
                indicator.pattern
            )));
        }

        validate_label(&indicator.label)?;
        validate_regex_pattern(&indicator.pattern)?;

        self.indicators.push(indicator);
        Ok(())
    }

    /// 按 pattern 删除自定义 Indicator
    pub fn remove_indicator(&mut self, pattern: &str) -> Result<(), SanitizerError> {
        let original_len = self.indicators.len();
        self.indicators.retain(|i| i.pattern != pattern);

        if self.indicators.len() == original_len {
            return Err(SanitizerError::ConfigError(format!(
                "Indicator with pattern '{}' not found",
                pattern
            )));
        }
        Ok(())
    }

    /// 添加免脱敏字面量, 返回是否新增
    pub fn add_ignore(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.ignore.contains(&value) {
            return false;
        }
        self.ignore.push(value);
        true
    }
}
