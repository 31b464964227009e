use glasses_text_sync::domain::models::{AppEvent, DeviceHandle, MessageSeverity};
use glasses_text_sync::domain::settings::SettingsService;
use glasses_text_sync::infrastructure::capture::{
    CaptureEvent, CaptureEventKind, CapturePipeline, UiNode,
};
use glasses_text_sync::infrastructure::glasses::sdk::NoSystemLink;
use glasses_text_sync::infrastructure::glasses::simulated::SimulatedSdk;
use glasses_text_sync::infrastructure::glasses::{GlassesService, ServiceHandle};
use glasses_text_sync::infrastructure::logging;
use glasses_text_sync::infrastructure::session_store::JsonSessionStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const SIMULATED_LATENCY: Duration = Duration::from_millis(150);

fn main() -> anyhow::Result<()> {
    let config_dir = SettingsService::config_dir()?;
    let settings_service = SettingsService::load(config_dir.join("settings.json"));

    let _logging_guard = logging::init_logger(&settings_service.get().log_settings, &config_dir)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting glasses text sync");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(async move {
        let settings = Arc::new(Mutex::new(settings_service));
        let store = Arc::new(JsonSessionStore::open(config_dir.join("session.json")));
        let sdk = Arc::new(SimulatedSdk::new(
            tokio::runtime::Handle::current(),
            SIMULATED_LATENCY,
        ));

        let (pipeline, snapshots) = CapturePipeline::new();
        let (app_tx, app_rx) = mpsc::unbounded_channel();
        let (service, handle) = GlassesService::new(
            sdk,
            Arc::new(NoSystemLink),
            store,
            settings,
            snapshots,
            app_tx,
        )?;

        let service_task = tokio::spawn(service.run());
        tokio::spawn(report_events(app_rx));

        if let Err(e) = handle.request_auto_reconnect() {
            warn!("Auto reconnect not requested: {}", e);
        }

        read_commands(pipeline, &handle).await;

        let _ = handle.shutdown();
        let _ = service_task.await;
        anyhow::Ok(())
    })
}

async fn report_events(mut events: mpsc::UnboundedReceiver<AppEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            AppEvent::LogMessage(msg) => match msg.severity {
                MessageSeverity::Error => error!("{}", msg.message),
                MessageSeverity::Warning => warn!("{}", msg.message),
                MessageSeverity::Info | MessageSeverity::Success => info!("{}", msg.message),
            },
            AppEvent::ConnectionFailed { error, origin } => {
                warn!("{:?} connection failed ({:?}): {}", origin, error.code(), error)
            }
            AppEvent::DisplayDisabledByPeer => {
                warn!("Display closed on the glasses; mirroring turned off")
            }
            other => info!("{:?}", other),
        }
    }
}

/// Stdin stands in for the UI and the accessibility host. Plain lines are
/// captured screen text (`\n` splits lines); `:` lines are commands.
async fn read_commands(mut pipeline: CapturePipeline, handle: &ServiceHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                break;
            }
        };

        let Some(command) = line.strip_prefix(':') else {
            let root = UiNode::default().with_children(
                line.split("\\n").map(UiNode::text).collect(),
            );
            pipeline.handle_event(&CaptureEvent::window(CaptureEventKind::ContentChanged, root));
            continue;
        };

        let mut parts = command.split_whitespace();
        let result = match (parts.next(), parts.next(), parts.next()) {
            (Some("connect"), Some(name), Some(address)) => {
                handle.request_connect(DeviceHandle::new(name, address))
            }
            (Some("reconnect"), ..) => handle.request_auto_reconnect(),
            (Some("disconnect"), ..) => handle.request_disconnect(),
            (Some("enable"), ..) => handle.enable_display(),
            (Some("disable"), ..) => handle.disable_display(),
            (Some("size"), Some(sp), _) => match sp.parse::<f32>() {
                Ok(sp) => handle.set_text_size(sp),
                Err(_) => {
                    warn!("Not a text size: {}", sp);
                    Ok(())
                }
            },
            (Some("status"), ..) => match handle.status().await {
                Ok(status) => {
                    info!("{:?}", status);
                    Ok(())
                }
                Err(e) => Err(e),
            },
            (Some("quit"), ..) => break,
            _ => {
                warn!("Unknown command: {}", command);
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("{}", e);
            break;
        }
    }

    pipeline.interrupt();
}
