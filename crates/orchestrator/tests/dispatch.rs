use std::collections::BTreeSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use synopticon_events::EventBus;
use synopticon_orchestrator::{Orchestrator, OrchestratorConfig, ProcessRequest};
use synopticon_pipeline::testing::ScriptedModule;
use synopticon_pipeline::{Frame, Pipeline};
use synopticon_types::{Capability, Impact, PerformanceProfile, PipelineDescriptor};

fn descriptor(name: &str) -> PipelineDescriptor {
    let mut caps = BTreeSet::new();
    let _ = caps.insert(Capability::FaceDetection);
    PipelineDescriptor::new(
        name,
        "1.0.0",
        caps,
        PerformanceProfile { fps: 30, latency_ms: 20, cpu: Impact::Low, memory: Impact::Low, battery: Impact::Low, model_size_mb: 1.0 },
    )
}

fn frame() -> Frame {
    let mut caps = BTreeSet::new();
    let _ = caps.insert(Capability::FaceDetection);
    Frame::new("cam0", 1, vec![], caps)
}

fn request() -> ProcessRequest {
    let mut caps = BTreeSet::new();
    let _ = caps.insert(Capability::FaceDetection);
    ProcessRequest::new(caps, frame())
}

#[tokio::test]
async fn happy_path_dispatch_returns_deterministic_face() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default(), Arc::new(EventBus::default()));
    let pipeline = Arc::new(Pipeline::new(descriptor("Pα"), ScriptedModule::always_ok()));
    pipeline.initialize(serde_json::Value::Null).await.unwrap();
    orchestrator.register(pipeline).await.unwrap();

    let result = orchestrator.process(request()).await;
    match result {
        synopticon_types::AnalysisResult::Success { source, fallback_depth, faces, .. } => {
            assert_eq!(source, "Pα");
            assert_eq!(fallback_depth, 0);
            assert_eq!(faces.len(), 1);
            assert_eq!(faces[0].bbox.x, 10.0);
            assert_eq!(faces[0].confidence, 0.9);
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn fallback_to_second_pipeline_on_first_failure() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default(), Arc::new(EventBus::default()));
    let alpha_module = Arc::new(ScriptedModule::always_fails());
    let alpha = Arc::new(Pipeline::new(descriptor("Pα"), alpha_module));
    alpha.initialize(serde_json::Value::Null).await.unwrap();
    let beta = Arc::new(Pipeline::new(descriptor("Pβ"), ScriptedModule::always_ok()));
    beta.initialize(serde_json::Value::Null).await.unwrap();

    orchestrator.register(alpha.clone()).await.unwrap();
    orchestrator.register(beta).await.unwrap();

    let result = orchestrator.process(request()).await;
    match result {
        synopticon_types::AnalysisResult::Success { source, fallback_depth, .. } => {
            assert_eq!(source, "Pβ");
            assert_eq!(fallback_depth, 1);
        }
        other => panic!("expected success from Pβ, got {other:?}"),
    }
    assert_eq!(alpha.get_metrics().error_count, 1);
}

#[tokio::test]
async fn breaker_opens_after_five_failures_and_skips_pipeline() {
    let orchestrator = Orchestrator::new(OrchestratorConfig::default(), Arc::new(EventBus::default()));
    let failing_module = Arc::new(ScriptedModule::always_fails());
    let alpha = Arc::new(Pipeline::new(descriptor("Pα"), failing_module.clone()));
    alpha.initialize(serde_json::Value::Null).await.unwrap();
    let beta = Arc::new(Pipeline::new(descriptor("Pβ"), ScriptedModule::always_ok()));
    beta.initialize(serde_json::Value::Null).await.unwrap();

    orchestrator.register(alpha).await.unwrap();
    orchestrator.register(beta).await.unwrap();

    // Scenario 2 then 3: 1 call already counted above would duplicate
    // setup, so drive exactly 5 failing attempts against Pα via fallback
    // dispatch (balanced strategy still always prefers Pα while its
    // breaker is closed, since it ties/loses to Pβ only on fps; use
    // max_fallbacks=0 to force a single attempt and deterministic
    // targeting is not required here since we just need Pα attempted 5
    // times total across calls).
    for _ in 0..5 {
        let _ = orchestrator.process(request()).await;
    }

    let calls_after_five = failing_module.call_count();
    assert!(calls_after_five >= 5);

    // A 6th call must not increase Pα's attempt count once its breaker is
    // open (spec scenario 3).
    let _ = orchestrator.process(request()).await;
    let calls_after_six = failing_module.call_count();
    assert_eq!(calls_after_five, calls_after_six, "Pα must not be invoked while its breaker is open");
}

#[tokio::test]
async fn half_open_probe_recovers_breaker_to_closed() {
    let mut config = OrchestratorConfig::default();
    config.breaker.cooldown = Duration::from_millis(50);
    config.max_fallbacks = 0; // force single-candidate dispatch against Pα only
    let orchestrator = Orchestrator::new(config, Arc::new(EventBus::default()));

    let module = Arc::new(ScriptedModule::new(5));
    let alpha = Arc::new(Pipeline::new(descriptor("Pα"), module));
    alpha.initialize(serde_json::Value::Null).await.unwrap();
    orchestrator.register(alpha.clone()).await.unwrap();

    for _ in 0..5 {
        let _ = orchestrator.process(request()).await;
    }

    tokio::time::sleep(Duration::from_millis(80)).await;

    let result = orchestrator.process(request()).await;
    assert!(result.is_success(), "probe call should succeed and close the breaker");
}
