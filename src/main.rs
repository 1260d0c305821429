use anyhow::Context;
use media_converter::constants::APP_NAME;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

mod app;
mod ui;

use app::MediaConverterApp;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    tracing::info!("Starting {}", APP_NAME);

    // Jobs and probes run here; the UI thread only drains their events.
    let runtime = Runtime::new().context("Failed to create async runtime")?;
    let handle = runtime.handle().clone();

    let config = media_converter::config::AppConfig::load();
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_min_inner_size([760.0, 560.0])
            .with_title(APP_NAME)
            .with_resizable(true),
        ..Default::default()
    };

    let app_creator =
        move |_cc: &eframe::CreationContext| -> Box<dyn eframe::App> { Box::new(MediaConverterApp::new(handle)) };

    eframe::run_native(APP_NAME, options, Box::new(app_creator))
        .map_err(|e| anyhow::anyhow!("Failed to run the user interface: {}", e))?;

    tracing::info!("Application shutting down");
    runtime.shutdown_timeout(std::time::Duration::from_secs(2));
    Ok(())
}
