#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod app;
mod clicker;
mod delay;
mod hotkey;
mod keys;
mod settings;

use app::{AutoClickerApp, APP_TITLE, APP_VERSION, WINDOW_SIZE};
use clap::Parser;
use clicker::ClickSession;
use delay::DelayRange;
use eframe::egui;
use settings::{Settings, SettingsStore, SETTINGS_FILE};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "autoclicker", about = "Clicks the mouse at random intervals, toggled by a global hotkey", version)]
struct Cli {
    /// Read and write settings at this path instead of the user config directory
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Log debug output from the clicker
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "info,autoclicker=debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .try_init()
        .ok();
}

fn settings_store(explicit: Option<PathBuf>) -> SettingsStore {
    if let Some(path) = explicit {
        return SettingsStore::new(path);
    }
    SettingsStore::default_location().unwrap_or_else(|e| {
        tracing::warn!("{}; using ./{}", e, SETTINGS_FILE);
        SettingsStore::new(SETTINGS_FILE)
    })
}

/// Display size in physical pixels.
fn screen_size() -> Option<(i32, i32)> {
    match rdev::display_size() {
        Ok((w, h)) => Some((w as i32, h as i32)),
        Err(e) => {
            tracing::warn!("Could not read display size: {:?}", e);
            None
        }
    }
}

fn main() -> eframe::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::info!("{} {}", APP_TITLE, APP_VERSION);

    let store = settings_store(cli.settings);
    let settings = store.load().unwrap_or_else(|e| {
        tracing::warn!("{}; starting with defaults", e);
        Settings::default()
    });
    tracing::debug!("Settings file: {}", store.path().display());

    let mut viewport = egui::ViewportBuilder::default()
        .with_title(APP_TITLE)
        .with_inner_size(WINDOW_SIZE)
        .with_resizable(false);
    // The app pulls a saved position back on screen once the display scale is known.
    if let Some((x, y)) = settings.saved_position() {
        viewport = viewport.with_position(egui::pos2(x as f32, y as f32));
    }
    if settings.always_on_top {
        viewport = viewport.with_always_on_top();
    }
    let native_options = eframe::NativeOptions {
        viewport,
        centered: settings.saved_position().is_none(),
        ..Default::default()
    };

    let session = Arc::new(ClickSession::with_simulated_mouse(DelayRange::default()));
    let app = AutoClickerApp::new(store, settings, session, screen_size());

    eframe::run_native(
        APP_TITLE,
        native_options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(egui::Visuals::dark());
            app.attach(&cc.egui_ctx);
            Box::new(app)
        }),
    )
}
