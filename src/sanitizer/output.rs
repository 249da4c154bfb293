//! 脱敏输出写入
//!
//! 输出文件使用 tempfile + atomic rename 模式写入,
//! 写入失败不会留下半截文件。

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::config::SanitizerConfig;
use super::error::SanitizerError;

/// 原子写入文件
///
/// 1. 在目标目录创建临时文件
/// 2. 写入内容并 flush
/// 3. 原子重命名为目标路径
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// 在文件名 (扩展名之前) 加后缀: `a/app.log` + `_sanitized` -> `a/app_sanitized.log`
pub fn suffixed_file_name(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match source.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    PathBuf::from(name)
}

/// 脱敏结果的去向
pub trait OutputSink: Send + Sync {
    /// `source` 将被写到的位置, 用于在写入前发现两个文件争用同一输出
    fn target(&self, source: &Path) -> PathBuf {
        source.to_path_buf()
    }

    /// 写入 `source` 对应的脱敏内容, 返回实际输出路径
    fn write(&self, source: &Path, content: &str) -> Result<PathBuf, SanitizerError>;
}

/// 写入磁盘: 输出目录 (或源文件所在目录) 下的 `<stem><suffix>.<ext>`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    out_dir: Option<PathBuf>,
    suffix: String,
}

impl DirectorySink {
    pub fn new(out_dir: Option<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            out_dir,
            suffix: suffix.into(),
        }
    }

    /// 使用配置中的 `output_dir` 与 `output_suffix`
    pub fn from_config(config: &SanitizerConfig) -> Self {
        Self::new(config.output_dir.clone(), config.output_suffix.clone())
    }

    /// 计算源文件对应的输出路径
    pub fn output_path(&self, source: &Path) -> PathBuf {
        let file_name = suffixed_file_name(source, &self.suffix);
        match &self.out_dir {
            Some(dir) => dir.join(file_name),
            None => source
                .parent()
                .map(|p| p.join(&file_name))
                .unwrap_or(file_name),
        }
    }
}

impl OutputSink for DirectorySink {
    fn target(&self, source: &Path) -> PathBuf {
        self.output_path(source)
    }

    fn write(&self, source: &Path, content: &str) -> Result<PathBuf, SanitizerError> {
        let target = self.output_path(source);
        if target == source {
            return Err(SanitizerError::input(
                &target,
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "output path equals source path; refusing to overwrite the original",
                ),
            ));
        }
        atomic_write(&target, content.as_bytes()).map_err(|e| SanitizerError::input(&target, e))?;
        Ok(target)
    }
}

/// 内存输出, 按写入顺序保存 (源路径, 内容)
#[derive(Debug, Default)]
pub struct MemorySink {
    outputs: Mutex<Vec<(PathBuf, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取某个源文件的脱敏内容
    pub fn get(&self, source: &Path) -> Option<String> {
        self.outputs
            .lock()
            .ok()?
            .iter()
            .find(|(p, _)| p == source)
            .map(|(_, c)| c.clone())
    }

    pub fn len(&self) -> usize {
        self.outputs.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputSink for MemorySink {
    fn write(&self, source: &Path, content: &str) -> Result<PathBuf, SanitizerError> {
        let mut outputs = self
            .outputs
            .lock()
            .map_err(|_| SanitizerError::TaskFailed("memory sink lock poisoned".to_string()))?;
        outputs.push((source.to_path_buf(), content.to_string()));
        Ok(source.to_path_buf())
    }
}
