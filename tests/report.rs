use std::{
    convert::Infallible,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use bytes::Bytes;
use dashboard_load::{
    assault::{reportable::Summary, script::CHECK_NAME},
    interface::{
        command::{LoadTest, ReportFormat},
        options::Options,
    },
    LoadError,
};
use indoc::indoc;
use tower::{service_fn, util::BoxCloneService};

fn ok(calls: Arc<AtomicUsize>) -> BoxCloneService<http::Request<Bytes>, http::Response<Bytes>, Infallible> {
    BoxCloneService::new(service_fn(move |_req: http::Request<Bytes>| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Ok(http::Response::builder().status(200).body(Bytes::from_static(b"[]")).unwrap()) }
    }))
}

#[test]
fn test_shipped_options_are_exported_verbatim() {
    let options = Options::read("config/dashboard/options.json").unwrap();
    let content = std::fs::read_to_string("config/dashboard/options.json").unwrap();
    assert_json_diff::assert_json_eq!(options.exported(), serde_json::from_str::<serde_json::Value>(&content).unwrap());
}

#[test]
fn test_missing_options_file_fails_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let cmd = LoadTest { options: Some(dir.path().join("options.json")), ..Default::default() };

    match cmd.read_options() {
        Ok(options) => panic!("options must not be loaded, but got {:?}", options.exported()),
        Err(err) => assert!(matches!(err, LoadError::OptionsError(_))),
    }
}

#[test]
fn test_malformed_options_file_fails_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("options.json");
    std::fs::write(&path, r#"{"vus": 5, "duration": "10s""#).unwrap();
    let cmd = LoadTest { options: Some(path), ..Default::default() };

    assert!(matches!(cmd.read_options(), Err(LoadError::OptionsError(_))));
}

#[tokio::test(start_paused = true)]
async fn test_summary_export() {
    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("summary.json");
    let cmd = LoadTest {
        report_format: ReportFormat::NullDevice,
        summary_export: Some(export.clone()),
        ..Default::default()
    };
    let options: Options = indoc! {r#"
        {
            "vus": 2,
            "iterations": 4,
            "thresholds": {
                "checks": ["rate==1"],
                "http_reqs": ["count>=4"],
                "iteration_duration": ["p(95)<1500"]
            }
        }
    "#}
    .parse()
    .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let summary = cmd.assault_with(&cmd.control(ok(calls.clone())), options).await.unwrap();
    cmd.report(&summary).unwrap();

    let exported: Summary = serde_json::from_reader(std::fs::File::open(&export).unwrap()).unwrap();
    assert_eq!(exported.vus, 2);
    assert_eq!(exported.checks[CHECK_NAME].pass, 4);
    assert_eq!(exported.thresholds.len(), 3);
    assert!(exported.thresholds.iter().all(|t| t.ok));
    assert_eq!(summary.code(), 0);
}

#[tokio::test(start_paused = true)]
#[cfg(feature = "console-report")]
async fn test_console_report() {
    let cmd = LoadTest { no_color: true, ..Default::default() };
    let calls = Arc::new(AtomicUsize::new(0));
    let summary = cmd.assault_with(&cmd.control(ok(calls)), "{}".parse().unwrap()).await.unwrap();

    let mut buf = Vec::new();
    cmd.report_with(&summary, &mut buf).unwrap();
    let report = String::from_utf8(buf).unwrap();
    assert!(report.contains(CHECK_NAME));
    assert!(report.contains("http_req_duration"));
    assert!(report.contains("p(90)="));
    assert!(report.contains("p(95)="));
}
