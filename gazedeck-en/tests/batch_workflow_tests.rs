//! End-to-end batch workflow tests against a loopback mock vision service

use axum::{routing::post, Json, Router};
use base64::{engine::general_purpose, Engine};
use serde_json::{json, Value};
use std::sync::Arc;

use gazedeck_en::config::{EnhanceConfig, ExecutionStrategy};
use gazedeck_en::layout::SessionLayout;
use gazedeck_en::models::EnhancementJob;
use gazedeck_en::services::BatchDriver;
use gazedeck_en::store::{FileJobStore, JobStore, LockGuard};

const ENHANCED_BYTES: &[u8] = b"ENHANCED-FRAME-PAYLOAD";

/// Bind a mock vision service on an ephemeral port and return its base URL.
async fn spawn_mock_vision(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock vision listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn success_response() -> Value {
    json!({
        "success": true,
        "face_detected": true,
        "image": {"data": general_purpose::STANDARD.encode(ENHANCED_BYTES)},
        "metrics": {"head_pose": {"pitch": 5.0, "yaw": -3.0, "roll": 1.0}}
    })
}

/// Mock that always detects a face and returns an enhanced image.
fn success_router() -> Router {
    Router::new()
        .route("/analyze", post(|| async { Json(success_response()) }))
        .route(
            "/analyze_batch",
            post(|Json(request): Json<Value>| async move {
                let results: Vec<Value> = request["frames"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|frame| {
                        let mut item = success_response();
                        item["set_number"] = frame["set_number"].clone();
                        item
                    })
                    .collect();
                Json(json!({"success": true, "results": results}))
            }),
        )
}

fn session_in_tempdir() -> (tempfile::TempDir, SessionLayout, Arc<dyn JobStore>) {
    let temp = tempfile::tempdir().unwrap();
    let layout = SessionLayout::new(temp.path());
    layout.ensure_directories().unwrap();
    let store: Arc<dyn JobStore> = Arc::new(FileJobStore::new(layout.enhanced_dir()));
    (temp, layout, store)
}

fn config_for(base_url: &str, strategy: ExecutionStrategy) -> EnhanceConfig {
    EnhanceConfig {
        vision_base_url: base_url.to_string(),
        vision_timeout_seconds: 5,
        inter_set_delay_ms: 0,
        strategy,
        ..Default::default()
    }
}

/// Acquire the lock and drive one job to completion.
async fn run_job(
    config: EnhanceConfig,
    layout: &SessionLayout,
    store: &Arc<dyn JobStore>,
    set_numbers: Vec<u32>,
) {
    let driver = BatchDriver::new(config, layout.clone(), store.clone()).unwrap();
    assert!(store.try_acquire().unwrap(), "lock must be free before a run");
    let progress = store
        .initialize_progress(set_numbers.len() as u32)
        .unwrap();
    driver
        .run(
            EnhancementJob::new(set_numbers),
            LockGuard::new(store.clone()),
            progress,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_scenario_full_batch_with_one_missing_set() {
    let base_url = spawn_mock_vision(success_router()).await;
    let (_temp, layout, store) = session_in_tempdir();

    // Set 1 has a webcam frame; set 2 has nothing
    std::fs::write(layout.webcam_input(1), b"raw-frame-1").unwrap();

    run_job(
        config_for(&base_url, ExecutionStrategy::Local),
        &layout,
        &store,
        vec![1, 2],
    )
    .await;

    // Set 1: enhanced image differs from the original, head pose rows present
    let enhanced = std::fs::read(layout.webcam_output(1)).unwrap();
    assert_eq!(enhanced, ENHANCED_BYTES);
    assert_ne!(enhanced, b"raw-frame-1");

    let table = std::fs::read_to_string(layout.parameter_output(1)).unwrap();
    assert!(table.contains("pitch,5\n"));
    assert!(table.contains("yaw,-3\n"));
    assert!(table.contains("roll,1\n"));

    // Set 2: skipped, but a placeholder parameter artifact exists
    assert!(!layout.webcam_output(2).exists());
    let table = std::fs::read_to_string(layout.parameter_output(2)).unwrap();
    assert!(table.contains("face_detected,false"));

    // Progress: both sets processed, in order, lock gone
    let progress = store.read_progress();
    assert_eq!(progress.processed_sets, vec![1, 2]);
    assert_eq!(progress.total_sets, 2);
    assert!(!store.is_locked());
}

#[tokio::test]
async fn test_no_face_keeps_original_bytes() {
    let router = Router::new().route(
        "/analyze",
        post(|| async { Json(json!({"success": true, "face_detected": false})) }),
    );
    let base_url = spawn_mock_vision(router).await;
    let (_temp, layout, store) = session_in_tempdir();

    let original = b"raw-frame-bytes".to_vec();
    std::fs::write(layout.webcam_input(3), &original).unwrap();

    run_job(
        config_for(&base_url, ExecutionStrategy::Local),
        &layout,
        &store,
        vec![3],
    )
    .await;

    assert_eq!(std::fs::read(layout.webcam_output(3)).unwrap(), original);
    let table = std::fs::read_to_string(layout.parameter_output(3)).unwrap();
    assert!(table.contains("face_detected,false"));
}

#[tokio::test]
async fn test_service_rejection_falls_back_to_copy() {
    let router = Router::new().route(
        "/analyze",
        post(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base_url = spawn_mock_vision(router).await;
    let (_temp, layout, store) = session_in_tempdir();

    let original = b"untouched-frame".to_vec();
    std::fs::write(layout.webcam_input(1), &original).unwrap();

    run_job(
        config_for(&base_url, ExecutionStrategy::Local),
        &layout,
        &store,
        vec![1],
    )
    .await;

    assert_eq!(std::fs::read(layout.webcam_output(1)).unwrap(), original);
    assert!(layout.parameter_output(1).exists());
    assert!(!store.is_locked());
}

#[tokio::test]
async fn test_explicit_failure_preserves_original_derived_values() {
    let router = Router::new().route(
        "/analyze",
        post(|| async { Json(json!({"success": false, "error": "analysis failed"})) }),
    );
    let base_url = spawn_mock_vision(router).await;
    let (_temp, layout, store) = session_in_tempdir();

    std::fs::write(layout.webcam_input(1), b"frame").unwrap();
    std::fs::write(
        layout.capture_dir().join("parameters_1.csv"),
        "Parameter,Value\nparticipant_id,P07\npitch,2.5\n",
    )
    .unwrap();

    run_job(
        config_for(&base_url, ExecutionStrategy::Local),
        &layout,
        &store,
        vec![1],
    )
    .await;

    let table = std::fs::read_to_string(layout.parameter_output(1)).unwrap();
    // Custom field passes through; stale measurement re-emitted, not dropped
    assert!(table.contains("participant_id,P07"));
    assert!(table.contains("pitch,2.5"));
}

#[tokio::test]
async fn test_malformed_response_notes_missing_face() {
    let router = Router::new().route(
        "/analyze",
        post(|| async { Json(json!({"success": true, "face_detected": true})) }),
    );
    let base_url = spawn_mock_vision(router).await;
    let (_temp, layout, store) = session_in_tempdir();

    let original = b"frame".to_vec();
    std::fs::write(layout.webcam_input(1), &original).unwrap();

    run_job(
        config_for(&base_url, ExecutionStrategy::Local),
        &layout,
        &store,
        vec![1],
    )
    .await;

    assert_eq!(std::fs::read(layout.webcam_output(1)).unwrap(), original);
    let table = std::fs::read_to_string(layout.parameter_output(1)).unwrap();
    assert!(table.contains("face_detected,false"));
}

#[tokio::test]
async fn test_custom_fields_survive_successful_enhancement() {
    let base_url = spawn_mock_vision(success_router()).await;
    let (_temp, layout, store) = session_in_tempdir();

    std::fs::write(layout.webcam_input(1), b"frame").unwrap();
    std::fs::write(
        layout.capture_dir().join("parameters_1.csv"),
        "Parameter,Value\nparticipant_id,P07\nscreen_resolution,2560x1440\npitch,99\n",
    )
    .unwrap();

    run_job(
        config_for(&base_url, ExecutionStrategy::Local),
        &layout,
        &store,
        vec![1],
    )
    .await;

    let table = std::fs::read_to_string(layout.parameter_output(1)).unwrap();
    assert!(table.contains("participant_id,P07"));
    assert!(table.contains("screen_resolution,2560x1440"));
    // Fresh measurement replaced the stale one
    assert!(table.contains("pitch,5\n"));
    assert!(!table.contains("pitch,99"));
}

#[tokio::test]
async fn test_rerun_overwrites_cleanly() {
    let base_url = spawn_mock_vision(success_router()).await;
    let (_temp, layout, store) = session_in_tempdir();

    std::fs::write(layout.webcam_input(1), b"frame").unwrap();
    std::fs::write(layout.screen_input(1), b"screen").unwrap();

    for _ in 0..2 {
        run_job(
            config_for(&base_url, ExecutionStrategy::Local),
            &layout,
            &store,
            vec![1],
        )
        .await;
    }

    assert_eq!(std::fs::read(layout.webcam_output(1)).unwrap(), ENHANCED_BYTES);
    assert_eq!(std::fs::read(layout.screen_output(1)).unwrap(), b"screen");
    let progress = store.read_progress();
    assert_eq!(progress.processed_sets, vec![1]);
    assert!(!store.is_locked());
}

#[tokio::test]
async fn test_remote_batch_strategy_converges_with_local() {
    let base_url = spawn_mock_vision(success_router()).await;

    // Local run
    let (_temp_a, layout_a, store_a) = session_in_tempdir();
    std::fs::write(layout_a.webcam_input(1), b"frame-1").unwrap();
    std::fs::write(layout_a.screen_input(1), b"screen-1").unwrap();
    run_job(
        config_for(&base_url, ExecutionStrategy::Local),
        &layout_a,
        &store_a,
        vec![1, 2],
    )
    .await;

    // Remote-batch run over identical inputs
    let (_temp_b, layout_b, store_b) = session_in_tempdir();
    std::fs::write(layout_b.webcam_input(1), b"frame-1").unwrap();
    std::fs::write(layout_b.screen_input(1), b"screen-1").unwrap();
    run_job(
        config_for(&base_url, ExecutionStrategy::RemoteBatch),
        &layout_b,
        &store_b,
        vec![1, 2],
    )
    .await;

    // Same artifact layout, byte for byte
    assert_eq!(
        std::fs::read(layout_a.webcam_output(1)).unwrap(),
        std::fs::read(layout_b.webcam_output(1)).unwrap()
    );
    assert_eq!(
        std::fs::read(layout_a.screen_output(1)).unwrap(),
        std::fs::read(layout_b.screen_output(1)).unwrap()
    );
    assert_eq!(
        std::fs::read_to_string(layout_a.parameter_output(1)).unwrap(),
        std::fs::read_to_string(layout_b.parameter_output(1)).unwrap()
    );
    assert_eq!(
        layout_a.webcam_output(2).exists(),
        layout_b.webcam_output(2).exists()
    );
    assert!(layout_b.parameter_output(2).exists());

    // Same progress semantics
    assert_eq!(
        store_a.read_progress().processed_sets,
        store_b.read_progress().processed_sets
    );
}

#[tokio::test]
async fn test_output_coverage_across_outcome_mix() {
    // Sets alternate between success and no-face responses
    let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let router = Router::new().route(
        "/analyze",
        post({
            let counter = counter.clone();
            move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    if n % 2 == 0 {
                        Json(success_response())
                    } else {
                        Json(json!({"success": true, "face_detected": false}))
                    }
                }
            }
        }),
    );
    let base_url = spawn_mock_vision(router).await;
    let (_temp, layout, store) = session_in_tempdir();

    let set_numbers: Vec<u32> = (1..=4).collect();
    for &n in &set_numbers {
        std::fs::write(layout.webcam_input(n), format!("frame-{}", n)).unwrap();
    }

    run_job(
        config_for(&base_url, ExecutionStrategy::Local),
        &layout,
        &store,
        set_numbers.clone(),
    )
    .await;

    // Every set in the batch has both artifacts, whatever its outcome
    for &n in &set_numbers {
        assert!(layout.webcam_output(n).exists(), "webcam artifact for set {}", n);
        assert!(
            layout.parameter_output(n).exists(),
            "parameter artifact for set {}",
            n
        );
    }
    assert_eq!(store.read_progress().processed_sets, set_numbers);
}
