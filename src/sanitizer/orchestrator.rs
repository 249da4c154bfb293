//! 三阶段并发编排: Scout -> Merge -> Sanitize
//!
//! - Scout 阶段: 每个文件一个任务, 各自持有内容和 `KeyNamer`, 互不通信
//! - Merge 屏障: 所有 Scout 完成后单线程合并, 按文件发现顺序 (而非完成顺序)
//! - Sanitize 阶段: 每个文件一个任务, 共享只读的全局 Key 表
//!
//! 单个文件失败只记录在报告里, 不影响同阶段的其他任务。

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use super::banner::BannerTemplate;
use super::config::SanitizerConfig;
use super::engine::{SanitizationStats, Sanitizer};
use super::error::{FileFailure, Phase, SanitizerError};
use super::key_table::KeyTable;
use super::keylist::{KeyList, SanitizedRecord};
use super::merger::{GlobalKeyTable, Merger};
use super::output::OutputSink;
use super::patterns::{IgnoreList, IndicatorSet};
use super::scout::{scout, FileKeyList};

/// 待处理文件: 已解码内容, 或由 Scout 任务自行读取的路径
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub content: Option<String>,
}

impl SourceFile {
    pub fn loaded(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: Some(content.into()),
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            content: None,
        }
    }
}

/// 进度事件
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    Scouted {
        path: PathBuf,
        keys: usize,
        completed: usize,
        total: usize,
    },
    Merged {
        files: usize,
        keys: usize,
    },
    Sanitized {
        path: PathBuf,
        output: PathBuf,
        completed: usize,
        total: usize,
    },
    Failed {
        failure: FileFailure,
    },
}

/// 一次运行的汇总
#[derive(Debug, Clone)]
pub struct RunReport {
    /// 合并后的全局 Key 表
    pub global_table: GlobalKeyTable,
    /// 成功脱敏的文件记录 (按输入顺序)
    pub records: Vec<SanitizedRecord>,
    /// 失败的文件
    pub failures: Vec<FileFailure>,
    /// 所有文件的替换统计
    pub stats: SanitizationStats,
}

impl RunReport {
    /// 生成 keylist (banner 以当前时间展开)
    pub fn keylist(&self, banner: &BannerTemplate) -> KeyList {
        KeyList::new(banner.expand(), self.global_table.clone(), self.records.clone())
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Scouted {
    path: PathBuf,
    content: String,
    keys: FileKeyList,
}

/// 编排器
#[derive(Debug, Clone)]
pub struct Orchestrator {
    indicators: Arc<IndicatorSet>,
    ignore: Arc<IgnoreList>,
    banner: BannerTemplate,
    max_concurrent: usize,
    seed: Option<KeyTable>,
    progress: Option<mpsc::Sender<RunEvent>>,
}

impl Orchestrator {
    pub fn new(indicators: IndicatorSet, ignore: IgnoreList) -> Self {
        Self {
            indicators: Arc::new(indicators),
            ignore: Arc::new(ignore),
            banner: BannerTemplate::default(),
            max_concurrent: default_concurrency(),
            seed: None,
            progress: None,
        }
    }

    /// 从已校验的配置创建
    pub fn from_config(config: &SanitizerConfig) -> Result<Self, SanitizerError> {
        config.validate()?;
        let mut orchestrator = Self::new(config.indicator_set()?, config.ignore_list())
            .with_banner(config.banner.clone());
        if let Some(n) = config.max_concurrent {
            orchestrator = orchestrator.with_max_concurrent(n);
        }
        Ok(orchestrator)
    }

    pub fn with_banner(mut self, banner: BannerTemplate) -> Self {
        self.banner = banner;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// 以上一次运行的 Key 表为种子, 保持跨运行的占位符一致
    pub fn with_seed(mut self, seed: KeyTable) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_progress(mut self, sender: mpsc::Sender<RunEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// 按路径运行, 文件由 Scout 任务读取
    pub async fn run_paths(
        &self,
        paths: Vec<PathBuf>,
        sink: Arc<dyn OutputSink>,
    ) -> Result<RunReport, SanitizerError> {
        self.run(paths.into_iter().map(SourceFile::from_path).collect(), sink)
            .await
    }

    /// 执行完整的三阶段流程
    pub async fn run(
        &self,
        sources: Vec<SourceFile>,
        sink: Arc<dyn OutputSink>,
    ) -> Result<RunReport, SanitizerError> {
        let total = sources.len();
        info!(files = total, max_concurrent = self.max_concurrent, "starting scout phase");

        let mut failures = Vec::new();
        let scouted = self.scout_phase(sources, &mut failures).await;

        let usable: Vec<Scouted> = scouted.into_iter().flatten().collect();
        if usable.is_empty() {
            warn!(failed = failures.len(), "no usable files after scouting");
            return Err(SanitizerError::NoUsableFiles { failures });
        }

        // 合并屏障: 所有 Scout 已完成
        let mut contents = Vec::with_capacity(usable.len());
        let mut file_keys = Vec::with_capacity(usable.len());
        for item in usable {
            contents.push((item.path, item.content));
            file_keys.push(item.keys);
        }
        let merger = match &self.seed {
            Some(seed) => Merger::seeded(seed.clone()),
            None => Merger::new(),
        };
        let files = file_keys.len();
        let global = merger.merge(file_keys)?;
        info!(files, keys = global.len(), "merge complete");
        self.emit(RunEvent::Merged {
            files,
            keys: global.len(),
        });

        let global = Arc::new(global);
        let (records, stats) = self
            .sanitize_phase(contents, Arc::clone(&global), sink, &mut failures)
            .await;

        let global_table = Arc::try_unwrap(global).unwrap_or_else(|shared| (*shared).clone());
        info!(
            sanitized = records.len(),
            failed = failures.len(),
            replacements = stats.total,
            "run complete"
        );

        Ok(RunReport {
            global_table,
            records,
            failures,
            stats,
        })
    }

    async fn scout_phase(
        &self,
        sources: Vec<SourceFile>,
        failures: &mut Vec<FileFailure>,
    ) -> Vec<Option<Scouted>> {
        let total = sources.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let paths: Vec<PathBuf> = sources.iter().map(|s| s.path.clone()).collect();
        let mut tasks = FuturesUnordered::new();

        for (idx, source) in sources.into_iter().enumerate() {
            let sem = Arc::clone(&semaphore);
            let indicators = Arc::clone(&self.indicators);
            let ignore = Arc::clone(&self.ignore);

            let handle = tokio::spawn(scout_task(source, sem, indicators, ignore));
            tasks.push(async move { (idx, handle.await) });
        }

        let mut results: Vec<Option<Scouted>> = (0..total).map(|_| None).collect();
        let mut completed = 0;

        while let Some((idx, joined)) = tasks.next().await {
            completed += 1;
            let path = paths[idx].clone();
            let outcome = joined
                .map_err(|e| SanitizerError::TaskFailed(e.to_string()))
                .and_then(|r| r);

            match outcome {
                Ok((content, keys)) => {
                    debug!(path = %path.display(), keys = keys.len(), completed, total, "scouted");
                    self.emit(RunEvent::Scouted {
                        path: path.clone(),
                        keys: keys.len(),
                        completed,
                        total,
                    });
                    results[idx] = Some(Scouted {
                        path,
                        content,
                        keys,
                    });
                }
                Err(err) => self.record_failure(failures, path, Phase::Scout, &err),
            }
        }

        results
    }

    async fn sanitize_phase(
        &self,
        contents: Vec<(PathBuf, String)>,
        global: Arc<GlobalKeyTable>,
        sink: Arc<dyn OutputSink>,
        failures: &mut Vec<FileFailure>,
    ) -> (Vec<SanitizedRecord>, SanitizationStats) {
        let contents = self.claim_targets(contents, sink.as_ref(), failures);
        let total = contents.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let sanitizer = Arc::new(Sanitizer::new(&global));
        let banner = Arc::new(self.banner.expand());
        let paths: Vec<PathBuf> = contents.iter().map(|(p, _)| p.clone()).collect();
        let mut tasks = FuturesUnordered::new();

        for (idx, (path, content)) in contents.into_iter().enumerate() {
            let sem = Arc::clone(&semaphore);
            let sanitizer = Arc::clone(&sanitizer);
            let banner = Arc::clone(&banner);
            let sink = Arc::clone(&sink);

            let handle = tokio::spawn(sanitize_task(path, content, sem, sanitizer, banner, sink));
            tasks.push(async move { (idx, handle.await) });
        }

        let mut records: Vec<Option<SanitizedRecord>> = (0..total).map(|_| None).collect();
        let mut stats = SanitizationStats::new();
        let mut completed = 0;

        while let Some((idx, joined)) = tasks.next().await {
            completed += 1;
            let path = paths[idx].clone();
            let outcome = joined
                .map_err(|e| SanitizerError::TaskFailed(e.to_string()))
                .and_then(|r| r);

            match outcome {
                Ok((output, file_stats)) => {
                    debug!(
                        path = %path.display(),
                        output = %output.display(),
                        replacements = file_stats.total,
                        "sanitized"
                    );
                    stats.absorb(&file_stats);
                    self.emit(RunEvent::Sanitized {
                        path,
                        output: output.clone(),
                        completed,
                        total,
                    });
                    records[idx] = Some(SanitizedRecord::now(output));
                }
                Err(err) => self.record_failure(failures, path, Phase::Sanitize, &err),
            }
        }

        (records.into_iter().flatten().collect(), stats)
    }

    /// 为每个文件预留输出路径, 目标已被先前文件占用的文件记为失败
    fn claim_targets(
        &self,
        contents: Vec<(PathBuf, String)>,
        sink: &dyn OutputSink,
        failures: &mut Vec<FileFailure>,
    ) -> Vec<(PathBuf, String)> {
        let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::with_capacity(contents.len());
        let mut accepted = Vec::with_capacity(contents.len());

        for (path, content) in contents {
            let target = sink.target(&path);
            if let Some(owner) = claimed.get(&target) {
                let err = SanitizerError::input(
                    &path,
                    io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!(
                            "output {} is already claimed by {}",
                            target.display(),
                            owner.display()
                        ),
                    ),
                );
                self.record_failure(failures, path, Phase::Sanitize, &err);
                continue;
            }
            claimed.insert(target, path.clone());
            accepted.push((path, content));
        }

        accepted
    }

    fn record_failure(
        &self,
        failures: &mut Vec<FileFailure>,
        path: PathBuf,
        phase: Phase,
        err: &SanitizerError,
    ) {
        if err.is_file_scoped() {
            warn!(path = %path.display(), ?phase, error = %err, "file failed");
        } else {
            error!(path = %path.display(), ?phase, error = %err, "file task failed");
        }
        let failure = FileFailure::new(path, phase, err);
        self.emit(RunEvent::Failed {
            failure: failure.clone(),
        });
        failures.push(failure);
    }

    /// 进度事件不阻塞运行: 通道已满或已关闭时丢弃
    fn emit(&self, event: RunEvent) {
        if let Some(sender) = &self.progress {
            if let Err(err) = sender.try_send(event) {
                debug!(error = %err, "progress event dropped");
            }
        }
    }
}

/// 单个 Scout 任务: 读取 (如需要) 并提取 Key
async fn scout_task(
    source: SourceFile,
    sem: Arc<Semaphore>,
    indicators: Arc<IndicatorSet>,
    ignore: Arc<IgnoreList>,
) -> Result<(String, FileKeyList), SanitizerError> {
    let _permit = sem
        .acquire_owned()
        .await
        .map_err(|e| SanitizerError::TaskFailed(e.to_string()))?;

    let content = match source.content {
        Some(content) => content,
        None => read_source(&source.path).await?,
    };

    tokio::task::spawn_blocking(move || {
        let keys = scout(&content, &indicators, &ignore);
        (content, keys)
    })
    .await
    .map_err(|e| SanitizerError::TaskFailed(e.to_string()))
}

/// 单个 Sanitize 任务: 替换并写出
async fn sanitize_task(
    path: PathBuf,
    content: String,
    sem: Arc<Semaphore>,
    sanitizer: Arc<Sanitizer>,
    banner: Arc<String>,
    sink: Arc<dyn OutputSink>,
) -> Result<(PathBuf, SanitizationStats), SanitizerError> {
    let _permit = sem
        .acquire_owned()
        .await
        .map_err(|e| SanitizerError::TaskFailed(e.to_string()))?;

    tokio::task::spawn_blocking(move || -> Result<(PathBuf, SanitizationStats), SanitizerError> {
        let result = sanitizer.sanitize(&content, &banner);
        let output = sink.write(&path, &result.sanitized_text)?;
        Ok((output, result.stats))
    })
    .await
    .map_err(|e| SanitizerError::TaskFailed(e.to_string()))?
}

async fn read_source(path: &Path) -> Result<String, SanitizerError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SanitizerError::input(path, e))
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}
