// End-to-end loads through the engine: manifest fetch, group ordering, tier
// fallthrough, failure isolation, and the fatal manifest path.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use modloader_engine::host::wasm::WasmHost;
use modloader_engine::store::fallback::FallbackCache;
use modloader_engine::store::kv::KvStore;
use modloader_engine::{
    LaunchContext, LoaderConfig, LoaderEngine, LoaderError, ModuleStatus, Origin,
};

/// Module whose init registers `<stem>-cap`. The entry point traps unless
/// its payload looks like a JSON object.
fn capability_module(stem: &str) -> String {
    let name = format!("{}-cap", stem);
    format!(
        r#"(module
  (import "loader" "register" (func $register (param i32 i32 i32 i32 i32 i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "{name}")
  (data (i32.const 64) "1.0.0")
  (data (i32.const 128) "run")
  (func (export "init")
    (call $register
      (i32.const 0) (i32.const {name_len})
      (i32.const 64) (i32.const 5)
      (i32.const 128) (i32.const 3)))
  (func (export "run") (param $ptr i32) (param $len i32)
    (if (i32.lt_s (local.get $len) (i32.const 2)) (then unreachable))
    (if (i32.ne (i32.load8_u (local.get $ptr)) (i32.const 123)) (then unreachable))
    (if (i32.ne
          (i32.load8_u (i32.sub (i32.add (local.get $ptr) (local.get $len)) (i32.const 1)))
          (i32.const 125))
      (then unreachable)))
)"#,
        name = name,
        name_len = name.len(),
    )
}

#[derive(Clone)]
struct Scenario {
    base: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    // Module files currently answering 500.
    down: Arc<Mutex<HashSet<String>>>,
    // Module files answering 200 with text that is not a module.
    broken: Arc<Mutex<HashSet<String>>>,
    extra_modules: Arc<Mutex<Vec<String>>>,
    manifest_down: Arc<AtomicBool>,
}

async fn manifest_handler(State(scenario): State<Scenario>) -> impl IntoResponse {
    if scenario.manifest_down.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "maintenance".to_string());
    }
    let base = &scenario.base;
    let mut modules = vec![
        format!("{}/mods/m1.wat", base),
        format!("{}/mods/m2.wat", base),
    ];
    modules.extend(scenario.extra_modules.lock().iter().cloned());
    let document = serde_json::json!({
        "helpers": [format!("{}/mods/helpers.wat", base)],
        "launcher": format!("{}/mods/launcher.wat", base),
        "modules": modules,
    });
    (StatusCode::OK, document.to_string())
}

async fn module_handler(
    Path(file): Path<String>,
    State(scenario): State<Scenario>,
) -> impl IntoResponse {
    *scenario.hits.lock().entry(file.clone()).or_insert(0) += 1;
    if scenario.down.lock().contains(&file) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "down".to_string());
    }
    if scenario.broken.lock().contains(&file) {
        return (StatusCode::OK, "not a module at all".to_string());
    }
    let stem = file.trim_end_matches(".wat").to_string();
    (StatusCode::OK, capability_module(&stem))
}

async fn start_scenario() -> Scenario {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let scenario = Scenario {
        base: format!("http://{}", addr),
        hits: Arc::new(Mutex::new(HashMap::new())),
        down: Arc::new(Mutex::new(HashSet::new())),
        broken: Arc::new(Mutex::new(HashSet::new())),
        extra_modules: Arc::new(Mutex::new(Vec::new())),
        manifest_down: Arc::new(AtomicBool::new(false)),
    };
    let app = Router::new()
        .route("/manifest.json", get(manifest_handler))
        .route("/mods/{file}", get(module_handler))
        .with_state(scenario.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    scenario
}

fn build_engine(scenario: &Scenario, state_dir: &std::path::Path) -> LoaderEngine {
    let config = LoaderConfig {
        manifest_url: format!("{}/manifest.json", scenario.base),
        state_dir: state_dir.to_str().unwrap().to_string(),
        fetch_attempts: 2,
        fetch_backoff_ms: 5,
        ..LoaderConfig::default()
    };
    LoaderEngine::new(config, Arc::new(WasmHost::new())).unwrap()
}

#[tokio::test]
async fn test_load_mixes_remote_cache_and_unavailable() {
    // 1. Upstream with m1 and m2 both down; m2 has a last-known-good copy.
    let scenario = start_scenario().await;
    scenario.down.lock().insert("m1.wat".to_string());
    scenario.down.lock().insert("m2.wat".to_string());

    let dir = tempfile::tempdir().unwrap();
    let kv = Arc::new(KvStore::open(dir.path()).unwrap());
    FallbackCache::new(kv)
        .put("m2.wat", &capability_module("m2"))
        .unwrap();

    // 2. Load.
    let engine = build_engine(&scenario, dir.path());
    let report = engine.load().await.unwrap();

    // 3. Group order is helpers, launcher, modules.
    let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["helpers.wat", "launcher.wat", "m1.wat", "m2.wat"]);

    // 4. Outcome per tier.
    assert_eq!(
        report.status_of("helpers.wat"),
        Some(&ModuleStatus::Loaded(Origin::Remote))
    );
    assert_eq!(
        report.status_of("launcher.wat"),
        Some(&ModuleStatus::Loaded(Origin::Remote))
    );
    assert_eq!(report.status_of("m1.wat"), Some(&ModuleStatus::Unavailable));
    assert_eq!(
        report.status_of("m2.wat"),
        Some(&ModuleStatus::Loaded(Origin::Cache))
    );
    assert_eq!(report.loaded(), 3);
    assert_eq!(report.skipped(), 1);

    // 5. Registry holds capabilities in execution order, nothing from m1.
    let registry = engine.registry();
    let caps: Vec<_> = registry.list().into_iter().map(|d| d.name).collect();
    assert_eq!(caps, vec!["helpers-cap", "launcher-cap", "m2-cap"]);

    // 6. The down modules spent the full attempt budget, the rest one hit.
    {
        let hits = scenario.hits.lock();
        assert_eq!(hits.get("helpers.wat"), Some(&1));
        assert_eq!(hits.get("launcher.wat"), Some(&1));
        assert_eq!(hits.get("m1.wat"), Some(&2));
        assert_eq!(hits.get("m2.wat"), Some(&2));
    }

    // 7. Remote successes refreshed the fallback store.
    let cached = engine.console().cached_modules().unwrap();
    assert_eq!(cached, vec!["helpers.wat", "launcher.wat", "m2.wat"]);

    // 8. A registered capability dispatches end to end.
    let context = LaunchContext {
        credential: "tok-1".to_string(),
        api_base: format!("{}/api", scenario.base),
        org_info: serde_json::json!({"org": "acme"}),
    };
    (registry.list()[0].invoke)(&context).unwrap();
}

#[tokio::test]
async fn test_console_override_redirects_load() {
    let scenario = start_scenario().await;
    let state_dir = tempfile::tempdir().unwrap();
    let local_dir = tempfile::tempdir().unwrap();
    let engine = build_engine(&scenario, state_dir.path());

    // Point the launcher at a local build registering a different name.
    let local = local_dir.path().join("local-launcher.wat");
    std::fs::write(&local, capability_module("local-launcher")).unwrap();
    engine
        .console()
        .set_override("launcher.wat", local.to_str().unwrap())
        .unwrap();

    let report = engine.load().await.unwrap();

    assert_eq!(
        report.status_of("launcher.wat"),
        Some(&ModuleStatus::Loaded(Origin::Override))
    );
    // The launcher URL was never fetched.
    assert_eq!(scenario.hits.lock().get("launcher.wat"), None);

    let caps: Vec<_> = engine
        .registry()
        .list()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert!(caps.contains(&"local-launcher-cap".to_string()));
    assert!(!caps.contains(&"launcher-cap".to_string()));
}

#[tokio::test]
async fn test_unusable_manifest_aborts_load() {
    let scenario = start_scenario().await;
    scenario.manifest_down.store(true, Ordering::SeqCst);
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(&scenario, dir.path());

    let err = engine.load().await.unwrap_err();

    assert!(matches!(err, LoaderError::ManifestUnavailable { .. }));
    assert!(engine.registry().is_empty());
    // No module URL was ever tried.
    assert!(scenario.hits.lock().is_empty());
}

#[tokio::test]
async fn test_execution_failure_does_not_stop_the_load() {
    let scenario = start_scenario().await;
    scenario.broken.lock().insert("m1.wat".to_string());
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(&scenario, dir.path());

    let report = engine.load().await.unwrap();

    assert!(matches!(
        report.status_of("m1.wat"),
        Some(ModuleStatus::Failed(_))
    ));
    assert_eq!(
        report.status_of("m2.wat"),
        Some(&ModuleStatus::Loaded(Origin::Remote))
    );
    let caps: Vec<_> = engine
        .registry()
        .list()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(caps, vec!["helpers-cap", "launcher-cap", "m2-cap"]);

    // The fetch succeeded, so the broken text still became the fallback copy.
    let cached = engine.console().cached_modules().unwrap();
    assert!(cached.contains(&"m1.wat".to_string()));
}

#[tokio::test]
async fn test_duplicate_manifest_names_load_twice() {
    let scenario = start_scenario().await;
    scenario
        .extra_modules
        .lock()
        .push(format!("{}/mods/m1.wat?flavor=alt", scenario.base));
    let dir = tempfile::tempdir().unwrap();
    let engine = build_engine(&scenario, dir.path());

    let report = engine.load().await.unwrap();

    // Both entries derive the same name and both execute.
    let m1_outcomes = report
        .outcomes
        .iter()
        .filter(|o| o.name == "m1.wat")
        .count();
    assert_eq!(m1_outcomes, 2);
    assert_eq!(scenario.hits.lock().get("m1.wat"), Some(&2));

    let caps: Vec<_> = engine
        .registry()
        .list()
        .into_iter()
        .map(|d| d.name)
        .collect();
    assert_eq!(caps.iter().filter(|c| *c == "m1-cap").count(), 2);
}
