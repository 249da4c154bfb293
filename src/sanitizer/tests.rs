//! Sanitizer 模块集成测试

use super::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

const IPV4: &str = r"\b((?:\d{1,3}\.){3}\d{1,3})\b";
const UNC: &str = r"\\\\([A-Za-z0-9][A-Za-z0-9.\-]*)\\";

fn ip_only() -> IndicatorSet {
    IndicatorSet::new(&[Indicator::new(IPV4, "Address")]).unwrap()
}

fn unc_only() -> IndicatorSet {
    IndicatorSet::new(&[Indicator::new(UNC, "Hostname")]).unwrap()
}

/// 对指定路径写入失败的输出
struct FailingSink {
    fail_on: PathBuf,
    inner: MemorySink,
}

impl OutputSink for FailingSink {
    fn write(&self, source: &Path, content: &str) -> Result<PathBuf, SanitizerError> {
        if source == self.fail_on {
            return Err(SanitizerError::input(
                source,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ));
        }
        self.inner.write(source, content)
    }
}

#[test]
fn test_module_exports() {
    let _indicator = Indicator::new(IPV4, "Address");
    let _namer = KeyNamer::new();
    assert!(IndicatorSet::with_defaults().is_ok());
    assert!(!BUILTIN_INDICATORS.is_empty());
}

#[test]
fn test_end_to_end_ip_scenario() {
    let content = "connect to 10.0.0.5 and 10.0.0.55";
    let table = scout(content, &ip_only(), &IgnoreList::new());

    assert_eq!(table.len(), 2);
    let p5 = table.placeholder_for("10.0.0.5").unwrap().to_string();
    let p55 = table.placeholder_for("10.0.0.55").unwrap().to_string();
    assert_ne!(p5, p55);

    let out = sanitize(content, &table, "");
    assert!(!out.contains("10.0.0."));
    assert_eq!(out.matches(p5.as_str()).count(), 1);
    assert_eq!(out.matches(p55.as_str()).count(), 1);
    assert_eq!(out, format!("connect to {} and {}", p5, p55));
}

#[test]
fn test_end_to_end_unc_scenario() {
    let file_a = r"copy \\server1\share\report.txt";
    let file_b = r"net use Z: \\server1\share\ /persistent";

    let keys_a = scout(file_a, &unc_only(), &IgnoreList::new());
    let keys_b = scout(file_b, &unc_only(), &IgnoreList::new());
    let global = merge(vec![keys_a, keys_b]).unwrap();

    assert_eq!(global.len(), 1);
    assert_eq!(global.placeholder_for("server1"), Some("Hostname1"));

    let out_a = sanitize(file_a, &global, "");
    let out_b = sanitize(file_b, &global, "");
    assert_eq!(out_a, r"copy \\Hostname1\share\report.txt");
    assert_eq!(out_b, r"net use Z: \\Hostname1\share\ /persistent");
}

#[test]
fn test_sanitize_tolerates_keys_missing_from_file() {
    let global = merge(vec![
        scout("10.1.1.1", &ip_only(), &IgnoreList::new()),
        scout("10.2.2.2", &ip_only(), &IgnoreList::new()),
    ])
    .unwrap();
    assert_eq!(sanitize("only 10.2.2.2 here", &global, ""), "only Address2 here");
}

#[tokio::test]
async fn test_orchestrator_shares_placeholders_across_files() {
    let sink = Arc::new(MemorySink::new());
    let orchestrator = Orchestrator::new(ip_only(), IgnoreList::new())
        .with_banner(BannerTemplate::parse("# sanitized").unwrap())
        .with_max_concurrent(4);

    let report = orchestrator
        .run(
            vec![
                SourceFile::loaded("a.log", "up 10.0.0.1 down 10.0.0.2"),
                SourceFile::loaded("b.log", "seen 10.0.0.2 and 10.0.0.3"),
            ],
            sink.clone(),
        )
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.global_table.len(), 3);
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.stats.total, 4);

    assert_eq!(
        sink.get(Path::new("a.log")).unwrap(),
        "# sanitized\nup Address1 down Address2"
    );
    assert_eq!(
        sink.get(Path::new("b.log")).unwrap(),
        "# sanitized\nseen Address2 and Address3"
    );
}

#[tokio::test]
async fn test_orchestrator_is_deterministic_across_concurrency() {
    let sources: Vec<_> = (0..12)
        .map(|i| {
            SourceFile::loaded(
                format!("f{i}.log"),
                format!("10.0.{i}.1 10.0.0.{} 192.168.0.{}", i % 3, i),
            )
        })
        .collect();

    let serial = Orchestrator::new(ip_only(), IgnoreList::new())
        .with_max_concurrent(1)
        .run(sources.clone(), Arc::new(MemorySink::new()))
        .await
        .unwrap();
    let parallel = Orchestrator::new(ip_only(), IgnoreList::new())
        .with_max_concurrent(8)
        .run(sources, Arc::new(MemorySink::new()))
        .await
        .unwrap();

    assert_eq!(serial.global_table, parallel.global_table);
    let serial_paths: Vec<_> = serial.records.iter().map(|r| &r.output_path).collect();
    let parallel_paths: Vec<_> = parallel.records.iter().map(|r| &r.output_path).collect();
    assert_eq!(serial_paths, parallel_paths);
}

#[tokio::test]
async fn test_unreadable_file_is_isolated() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.log");
    std::fs::write(&good, "host 10.9.9.9").unwrap();
    let missing = dir.path().join("missing.log");

    let sink = Arc::new(DirectorySink::new(None, "_sanitized"));
    let report = Orchestrator::new(ip_only(), IgnoreList::new())
        .run_paths(vec![missing.clone(), good.clone()], sink)
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, missing);
    assert_eq!(report.failures[0].phase, Phase::Scout);
    assert_eq!(report.failures[0].error.code, "INPUT_ERROR");

    assert_eq!(report.records.len(), 1);
    let output = dir.path().join("good_sanitized.log");
    assert_eq!(report.records[0].output_path, output);
    assert_eq!(std::fs::read_to_string(output).unwrap(), "host Address1");
}

#[tokio::test]
async fn test_write_failure_is_isolated() {
    let sink = Arc::new(FailingSink {
        fail_on: PathBuf::from("b.log"),
        inner: MemorySink::new(),
    });
    let report = Orchestrator::new(ip_only(), IgnoreList::new())
        .run(
            vec![
                SourceFile::loaded("a.log", "10.0.0.1"),
                SourceFile::loaded("b.log", "10.0.0.2"),
                SourceFile::loaded("c.log", "10.0.0.3"),
            ],
            sink.clone(),
        )
        .await
        .unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].phase, Phase::Sanitize);
    assert_eq!(report.records.len(), 2);
    // 写入失败不影响全局 Key 表
    assert_eq!(report.global_table.len(), 3);
    assert_eq!(sink.inner.get(Path::new("c.log")).unwrap(), "Address3");
}

#[tokio::test]
async fn test_no_usable_files() {
    let dir = tempdir().unwrap();
    let result = Orchestrator::new(ip_only(), IgnoreList::new())
        .run_paths(
            vec![dir.path().join("nope.log")],
            Arc::new(MemorySink::new()),
        )
        .await;
    match result {
        Err(SanitizerError::NoUsableFiles { failures }) => assert_eq!(failures.len(), 1),
        other => panic!("expected NoUsableFiles, got {:?}", other),
    }

    let result = Orchestrator::new(ip_only(), IgnoreList::new())
        .run(vec![], Arc::new(MemorySink::new()))
        .await;
    assert!(matches!(result, Err(SanitizerError::NoUsableFiles { .. })));
}

#[tokio::test]
async fn test_progress_events() {
    let (tx, mut rx) = mpsc::channel(64);
    let orchestrator = Orchestrator::new(ip_only(), IgnoreList::new()).with_progress(tx);

    orchestrator
        .run(
            vec![
                SourceFile::loaded("a.log", "10.0.0.1"),
                SourceFile::loaded("b.log", "10.0.0.2"),
            ],
            Arc::new(MemorySink::new()),
        )
        .await
        .unwrap();
    drop(orchestrator);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let scouted = events
        .iter()
        .filter(|e| matches!(e, RunEvent::Scouted { .. }))
        .count();
    let sanitized = events
        .iter()
        .filter(|e| matches!(e, RunEvent::Sanitized { .. }))
        .count();
    let merged_at = events
        .iter()
        .position(|e| matches!(e, RunEvent::Merged { keys: 2, files: 2 }))
        .unwrap();

    assert_eq!(scouted, 2);
    assert_eq!(sanitized, 2);
    // 合并事件在所有 Scout 事件之后, 所有 Sanitize 事件之前
    assert!(events[..merged_at]
        .iter()
        .all(|e| matches!(e, RunEvent::Scouted { .. })));
    assert!(events[merged_at + 1..]
        .iter()
        .all(|e| matches!(e, RunEvent::Sanitized { .. })));
}

#[tokio::test]
async fn test_full_progress_channel_does_not_stall_run() {
    let (tx, mut rx) = mpsc::channel(1);
    let orchestrator = Orchestrator::new(ip_only(), IgnoreList::new()).with_progress(tx);

    // 接收端存在但不读取
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.run(
            vec![
                SourceFile::loaded("a.log", "10.0.0.1"),
                SourceFile::loaded("b.log", "10.0.0.2"),
                SourceFile::loaded("c.log", "10.0.0.3"),
            ],
            Arc::new(MemorySink::new()),
        ),
    )
    .await
    .expect("run stalled on a full progress channel")
    .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.records.len(), 3);

    drop(orchestrator);
    assert!(matches!(rx.recv().await, Some(RunEvent::Scouted { .. })));
    assert!(rx.recv().await.is_none());
}

#[tokio::test]
async fn test_same_output_target_is_reported_not_overwritten() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a").join("app.log");
    let b = dir.path().join("b").join("app.log");
    std::fs::create_dir_all(a.parent().unwrap()).unwrap();
    std::fs::create_dir_all(b.parent().unwrap()).unwrap();
    std::fs::write(&a, "host 10.0.0.1").unwrap();
    std::fs::write(&b, "host 10.0.0.2").unwrap();
    let out = dir.path().join("out");

    let report = Orchestrator::new(ip_only(), IgnoreList::new())
        .run_paths(
            vec![a.clone(), b.clone()],
            Arc::new(DirectorySink::new(Some(out.clone()), "_sanitized")),
        )
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, b);
    assert_eq!(report.failures[0].phase, Phase::Sanitize);
    assert_eq!(report.failures[0].error.code, "INPUT_ERROR");

    let target = out.join("app_sanitized.log");
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].output_path, target);
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "host Address1");
    // 全局 Key 表仍包含两个文件的值
    assert_eq!(report.global_table.len(), 2);
}

#[tokio::test]
async fn test_config_drives_output_location() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("app.log");
    std::fs::write(&source, "host 10.4.4.4").unwrap();

    let mut config = SanitizerConfig::new();
    config.banner = BannerTemplate::default();
    config.output_dir = Some(dir.path().join("clean"));
    config.output_suffix = "_redacted".to_string();

    let report = Orchestrator::from_config(&config)
        .unwrap()
        .run_paths(
            vec![source],
            Arc::new(DirectorySink::from_config(&config)),
        )
        .await
        .unwrap();

    let output = dir.path().join("clean").join("app_redacted.log");
    assert_eq!(report.records[0].output_path, output);
    assert_eq!(std::fs::read_to_string(output).unwrap(), "host Address1");
}

#[tokio::test]
async fn test_keylist_round_trip_seeds_next_run() {
    let dir = tempdir().unwrap();
    let keylist_path = dir.path().join("keylist.txt");
    let keylist_banner = BannerTemplate::parse("Key list generated {datetime}").unwrap();

    let first = Orchestrator::new(ip_only(), IgnoreList::new())
        .run(
            vec![SourceFile::loaded("day1.log", "10.0.0.7 10.0.0.8")],
            Arc::new(MemorySink::new()),
        )
        .await
        .unwrap();
    first.keylist(&keylist_banner).write_to(&keylist_path).unwrap();

    let text = std::fs::read_to_string(&keylist_path).unwrap();
    assert!(text.starts_with("Key list generated "));
    assert!(text.contains("\nAddress1 10.0.0.7\nAddress2 10.0.0.8\nList of files using this Key:\n"));
    assert!(text.ends_with(" - day1.log\n"));

    let previous = KeyList::read_from(&keylist_path, keylist_banner.line_count()).unwrap();
    let sink = Arc::new(MemorySink::new());
    let second = Orchestrator::new(ip_only(), IgnoreList::new())
        .with_seed(previous.table)
        .run(
            vec![SourceFile::loaded("day2.log", "10.0.0.9 then 10.0.0.8")],
            sink.clone(),
        )
        .await
        .unwrap();

    assert_eq!(second.global_table.placeholder_for("10.0.0.7"), Some("Address1"));
    assert_eq!(second.global_table.placeholder_for("10.0.0.8"), Some("Address2"));
    assert_eq!(second.global_table.placeholder_for("10.0.0.9"), Some("Address3"));
    assert_eq!(
        sink.get(Path::new("day2.log")).unwrap(),
        "Address3 then Address2"
    );
}

#[tokio::test]
async fn test_orchestrator_from_config() {
    let mut config = SanitizerConfig::new();
    config.use_builtin_indicators = false;
    config
        .add_indicator(Indicator::new(r"user=(\w+)", "Username"))
        .unwrap();
    config.add_ignore("root");
    config.banner = BannerTemplate::default();

    let sink = Arc::new(MemorySink::new());
    let report = Orchestrator::from_config(&config)
        .unwrap()
        .run(
            vec![SourceFile::loaded("auth.log", "user=root user=alice")],
            sink.clone(),
        )
        .await
        .unwrap();

    assert_eq!(report.global_table.len(), 1);
    assert_eq!(
        sink.get(Path::new("auth.log")).unwrap(),
        "user=root user=Username1"
    );
}
