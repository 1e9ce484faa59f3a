//! Process entry point (spec §6 "Exit codes for CLI entry"): wires the
//! orchestrator, event bus, stream session manager and media streaming
//! pipeline together, then serves the control API until shutdown.

use std::process::ExitCode;
use std::sync::Arc;

use synopticon_config::ServerConfig;
use synopticon_control_api::AppState;
use synopticon_distribution::{SessionConfig, StreamSessionManager};
use synopticon_events::EventBus;
use synopticon_media::{FrameSink, MediaStreamingModule};
use synopticon_orchestrator::{Orchestrator, OrchestratorConfig, ProcessRequest};
use synopticon_pipeline::{Frame, Pipeline, PipelineHandle};
use synopticon_types::{CapabilitySet, Impact, PerformanceProfile, PipelineDescriptor};
use tracing::{error, info};

/// Name the media producer registers under; never a real `Capability`, so
/// it never wins ordinary capability-based dispatch (spec §4.J).
const MEDIA_PIPELINE_NAME: &str = "media-producer";

/// Builds the callback the media streaming pipeline emits frames through.
/// Each produced frame is re-dispatched for analysis against every
/// capability any other registered pipeline declares, then the result is
/// fanned out to distribution streams sourced from whichever capability
/// the winning pipeline provides (spec §4.J: "Emits frames via a callback
/// the orchestrator registers").
fn make_frame_sink(orchestrator: Arc<Orchestrator>, sessions: Arc<StreamSessionManager>) -> FrameSink {
    Arc::new(move |frame: Frame| {
        let orchestrator = orchestrator.clone();
        let sessions = sessions.clone();
        tokio::spawn(async move {
            let descriptors = orchestrator.list_descriptors();
            let capabilities: CapabilitySet = descriptors
                .iter()
                .filter(|d| d.name != MEDIA_PIPELINE_NAME)
                .flat_map(|d| d.capabilities.clone())
                .collect();
            if capabilities.is_empty() {
                return;
            }
            let result = orchestrator.process(ProcessRequest::new(capabilities, frame)).await;
            let source_capability =
                descriptors.iter().find(|d| d.name == result.source()).and_then(|d| d.capabilities.iter().next().copied());
            if let Some(capability) = source_capability {
                sessions.submit(capability, &result).await;
            }
        });
    })
}

async fn register_media_pipeline(orchestrator: Arc<Orchestrator>, sessions: Arc<StreamSessionManager>) -> anyhow::Result<()> {
    let sink = make_frame_sink(orchestrator.clone(), sessions);
    let descriptor = PipelineDescriptor::new(
        MEDIA_PIPELINE_NAME,
        env!("CARGO_PKG_VERSION"),
        CapabilitySet::new(),
        PerformanceProfile { fps: 30, latency_ms: 0, cpu: Impact::Low, memory: Impact::Low, battery: Impact::Medium, model_size_mb: 0.0 },
    );
    let module = MediaStreamingModule::new("default-camera", false, sink);
    let pipeline = Arc::new(Pipeline::new(descriptor, module));
    pipeline.initialize(serde_json::Value::Null).await.map_err(|e| anyhow::anyhow!(e.message))?;
    orchestrator.register(pipeline).await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("ctrl-c received, shutting down");
}

async fn run(config: ServerConfig) -> Result<(), synopticon_control_api::Error> {
    let events = Arc::new(EventBus::default());
    let orchestrator = Arc::new(Orchestrator::new(OrchestratorConfig::default(), events.clone()));
    let sessions = Arc::new(StreamSessionManager::new(events.clone(), SessionConfig::default()));

    if let Err(err) = register_media_pipeline(orchestrator.clone(), sessions.clone()).await {
        error!(%err, "failed to register the media streaming pipeline; continuing without it");
    }

    let state = AppState::new(orchestrator, sessions, events, Arc::new(config.clone()));
    synopticon_control_api::serve(&config, state, shutdown_signal()).await
}

fn main() -> ExitCode {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(1);
        }
    };

    synopticon_telemetry::init(&config.log_level);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start the async runtime: {err}");
            return ExitCode::from(3);
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => {
            info!("clean shutdown");
            ExitCode::from(0)
        }
        Err(synopticon_control_api::Error::Bind(addr, err)) => {
            error!(%addr, %err, "failed to bind the control API");
            ExitCode::from(2)
        }
        Err(synopticon_control_api::Error::Config(err)) => {
            error!(%err, "invalid bind configuration");
            ExitCode::from(1)
        }
        Err(err) => {
            error!(%err, "unrecoverable server error");
            ExitCode::from(3)
        }
    }
}
