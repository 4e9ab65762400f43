use crate::clicker::{ClickSession, RepaintHook};
use crate::delay::{format_secs, DelayRange};
use crate::hotkey::{spawn_listener, Bindings, HotkeyRequests, HotkeyState, Slot};
use crate::keys::{display_name, key_name};
use crate::settings::{screen_in_points, window_origin, Settings, SettingsError, SettingsStore};
use eframe::egui::{self, Color32, RichText, ViewportCommand};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub const APP_TITLE: &str = "AutoClicker";
pub const APP_VERSION: &str = "1.4";
pub const WINDOW_SIZE: [f32; 2] = [490.0, 180.0];
const PROMPT_WINDOW_SIZE: [f32; 2] = [490.0, 210.0];

const STOPPED_COLOR: Color32 = Color32::from_rgb(0xb8, 0x02, 0x02);
const PROMPT_COLOR: Color32 = Color32::from_rgb(0xff, 0xaa, 0x00);
const KEY_BADGE_COLOR: Color32 = Color32::from_rgb(0x1f, 0x7a, 0x1f);

pub struct AutoClickerApp {
    store: SettingsStore,
    loaded: Settings,
    fallback_delays: DelayRange,
    session: Arc<ClickSession>,
    hotkeys: Arc<Mutex<HotkeyState>>,
    requests: Arc<HotkeyRequests>,
    screen_px: Option<(i32, i32)>,
    placed: bool,
    min_delay_text: String,
    max_delay_text: String,
    always_on_top: bool,
    save_settings: bool,
    prompt_visible: bool,
    shut_down: bool,
}

impl AutoClickerApp {
    /// `screen_px` is the display size in physical pixels, when known.
    pub fn new(
        store: SettingsStore,
        settings: Settings,
        session: Arc<ClickSession>,
        screen_px: Option<(i32, i32)>,
    ) -> Self {
        let fallback_delays =
            DelayRange::new(settings.min_delay, settings.max_delay).unwrap_or_else(|e| {
                tracing::warn!("Ignoring saved delays: {}", e);
                DelayRange::default()
            });
        session.set_delays(fallback_delays);
        let bindings = Bindings::from_names(&settings.start_key, &settings.quit_key);

        Self {
            store,
            fallback_delays,
            session,
            hotkeys: Arc::new(Mutex::new(HotkeyState::new(bindings))),
            requests: Arc::new(HotkeyRequests::default()),
            screen_px,
            placed: false,
            min_delay_text: format_secs(fallback_delays.min()),
            max_delay_text: format_secs(fallback_delays.max()),
            always_on_top: settings.always_on_top,
            save_settings: settings.save_settings,
            prompt_visible: false,
            shut_down: false,
            loaded: settings,
        }
    }

    /// Hooks the click loop and the global keyboard listener up to the UI context.
    pub fn attach(&self, ctx: &egui::Context) {
        let repaint_ctx = ctx.clone();
        let repaint: RepaintHook = Arc::new(move || repaint_ctx.request_repaint());
        self.session.set_repaint_hook(Arc::clone(&repaint));
        spawn_listener(
            Arc::clone(&self.hotkeys),
            Arc::clone(&self.requests),
            repaint,
        );
    }

    fn commit_delays(&mut self) {
        let range = DelayRange::commit(&self.min_delay_text, &self.max_delay_text, self.fallback_delays);
        self.min_delay_text = format_secs(range.min());
        self.max_delay_text = format_secs(range.max());
        self.session.set_delays(range);
    }

    fn snapshot(&self, window_pos: Option<(i32, i32)>) -> Settings {
        let bindings = self.hotkeys.lock().bindings();
        let delays = self.session.delays();
        let (window_x, window_y) = match window_pos {
            Some((x, y)) => (Some(x), Some(y)),
            None => (self.loaded.window_x, self.loaded.window_y),
        };
        Settings {
            min_delay: delays.min(),
            max_delay: delays.max(),
            start_key: key_name(bindings.start).unwrap_or("f8").to_string(),
            quit_key: key_name(bindings.quit).unwrap_or("f9").to_string(),
            save_settings: self.save_settings,
            window_x,
            window_y,
            always_on_top: self.always_on_top,
        }
    }

    /// Writes the current state out when "Save settings" is on, otherwise forgets it.
    fn persist(&self, window_pos: Option<(i32, i32)>) -> Result<(), SettingsError> {
        if self.save_settings {
            self.store.save(&self.snapshot(window_pos))
        } else {
            self.store.reset()
        }
    }

    fn shutdown(&mut self, ctx: &egui::Context) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        self.commit_delays();
        let window_pos = ctx
            .input(|i| i.viewport().outer_rect)
            .map(|r| (r.min.x.round() as i32, r.min.y.round() as i32));
        if let Err(e) = self.persist(window_pos) {
            tracing::warn!("{}", e);
        }
        self.session.stop();
        tracing::info!("Exiting");
    }

    /// Carries out hotkey presses on the UI thread. Returns true when quit was pressed.
    fn apply_requests(&mut self) -> bool {
        if self.requests.take_toggle() {
            self.session.toggle();
        }
        self.requests.take_quit()
    }

    /// Pulls a saved window position back on screen once the display scale is known.
    fn place_window(&mut self, ctx: &egui::Context) {
        if self.placed {
            return;
        }
        self.placed = true;
        let (Some(saved), Some(screen_px)) = (self.loaded.saved_position(), self.screen_px) else {
            return;
        };
        let pixels_per_point = ctx
            .input(|i| i.viewport().native_pixels_per_point)
            .unwrap_or(1.0);
        let screen = screen_in_points(screen_px, pixels_per_point);
        let size = (WINDOW_SIZE[0] as i32, WINDOW_SIZE[1] as i32);
        let (x, y) = window_origin(Some(saved), screen, size);
        if (x, y) != saved {
            tracing::debug!("Moving window from {:?} to {:?}", saved, (x, y));
            ctx.send_viewport_cmd(ViewportCommand::OuterPosition(egui::pos2(x as f32, y as f32)));
        }
    }

    fn sync_prompt(&mut self, ctx: &egui::Context) {
        let listening = self.hotkeys.lock().is_listening();
        if listening == self.prompt_visible {
            return;
        }
        self.prompt_visible = listening;
        let size = if listening { PROMPT_WINDOW_SIZE } else { WINDOW_SIZE };
        ctx.send_viewport_cmd(ViewportCommand::InnerSize(egui::vec2(size[0], size[1])));
    }

    fn settings_column(&mut self, ui: &mut egui::Ui) {
        let (bindings, capture) = {
            let hotkeys = self.hotkeys.lock();
            (hotkeys.bindings(), hotkeys.capture())
        };
        let clicking = self.session.is_running();
        let can_rebind = !clicking && capture.slot().is_none();

        egui::Grid::new("hotkeys")
            .num_columns(3)
            .spacing([6.0, 4.0])
            .show(ui, |ui| {
                for (slot, label) in [(Slot::Start, "Start/Stop hotkey:"), (Slot::Quit, "Exit hotkey:")] {
                    ui.label(label);
                    ui.label(key_badge(bindings.key(slot)));
                    if ui
                        .add_enabled(can_rebind, egui::Button::new("Set hotkey"))
                        .clicked()
                    {
                        self.hotkeys.lock().begin_capture(slot, clicking);
                    }
                    ui.end_row();
                }
            });

        if let Some(slot) = capture.slot() {
            ui.horizontal(|ui| {
                ui.colored_label(PROMPT_COLOR, capture_prompt(slot));
                if ui.small_button("Cancel").clicked() {
                    self.hotkeys.lock().cancel_capture();
                }
            });
        }

        let mut edited = false;
        let mut committed = false;
        egui::Grid::new("delays")
            .num_columns(2)
            .spacing([6.0, 4.0])
            .show(ui, |ui| {
                for (label, text) in [
                    ("Min. delay (sec):", &mut self.min_delay_text),
                    ("Max. delay (sec):", &mut self.max_delay_text),
                ] {
                    ui.label(label);
                    let response = ui.add(egui::TextEdit::singleline(text).desired_width(60.0));
                    edited |= response.changed();
                    committed |= response.lost_focus();
                    ui.end_row();
                }
            });
        if committed {
            self.commit_delays();
        } else if edited {
            // Valid edits apply to a running loop right away; bad ones wait for commit.
            if let Ok(range) = DelayRange::parse(&self.min_delay_text, &self.max_delay_text) {
                self.session.set_delays(range);
            }
        }

        if ui.checkbox(&mut self.always_on_top, "Always on top").changed() {
            let level = if self.always_on_top {
                egui::WindowLevel::AlwaysOnTop
            } else {
                egui::WindowLevel::Normal
            };
            ui.ctx().send_viewport_cmd(ViewportCommand::WindowLevel(level));
        }
        ui.checkbox(&mut self.save_settings, "Save settings");
    }

    fn status_column(&self, ui: &mut egui::Ui) {
        let (status, color) = if self.session.is_running() {
            ("Status: Clicking", Color32::GREEN)
        } else {
            ("Status: Stopped", STOPPED_COLOR)
        };
        ui.label(RichText::new(status).color(color).size(16.0).strong());
        ui.add_space(10.0);
        ui.label(RichText::new(format!("Clicks: {}", self.session.clicks())).size(14.0));
        ui.add_space(5.0);
        ui.label(
            RichText::new(format!(
                "Time elapsed: {} sec",
                self.session.elapsed().as_secs()
            ))
            .size(14.0),
        );
        ui.add_space(10.0);
        ui.weak(format!("v{}", APP_VERSION));
    }
}

impl eframe::App for AutoClickerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.place_window(ctx);
        if self.apply_requests() {
            self.shutdown(ctx);
            ctx.send_viewport_cmd(ViewportCommand::Close);
        }
        if ctx.input(|i| i.viewport().close_requested()) {
            self.shutdown(ctx);
        }

        self.sync_prompt(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |columns| {
                self.settings_column(&mut columns[0]);
                self.status_column(&mut columns[1]);
            });
        });

        if self.session.is_running() {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}

fn key_badge(key: rdev::Key) -> RichText {
    RichText::new(format!(" {} ", display_name(key)))
        .size(14.0)
        .strong()
        .color(Color32::WHITE)
        .background_color(KEY_BADGE_COLOR)
}

fn capture_prompt(slot: Slot) -> &'static str {
    match slot {
        Slot::Start => "Press any key to set Start hotkey...",
        Slot::Quit => "Press any key to set Exit hotkey...",
    }
}
