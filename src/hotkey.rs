use crate::clicker::RepaintHook;
use crate::keys::{key_name, parse_key};
use parking_lot::Mutex;
use rdev::{listen, Event, EventType, Key};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

pub const DEFAULT_START_KEY: Key = Key::F8;
pub const DEFAULT_QUIT_KEY: Key = Key::F9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    Start,
    Quit,
}

impl Slot {
    fn other(self) -> Slot {
        match self {
            Slot::Start => Slot::Quit,
            Slot::Quit => Slot::Start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bindings {
    pub start: Key,
    pub quit: Key,
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_KEY,
            quit: DEFAULT_QUIT_KEY,
        }
    }
}

impl Bindings {
    /// Resolves stored key names. Unknown names and clashing keys fall back to the defaults.
    pub fn from_names(start: &str, quit: &str) -> Self {
        let start_key = parse_key(start).unwrap_or_else(|| {
            tracing::warn!("Unknown start key {:?}, using default", start);
            DEFAULT_START_KEY
        });
        let quit_key = parse_key(quit).unwrap_or_else(|| {
            tracing::warn!("Unknown quit key {:?}, using default", quit);
            DEFAULT_QUIT_KEY
        });
        if start_key == quit_key {
            tracing::warn!("Start and quit keys are both {:?}, using defaults", start_key);
            return Self::default();
        }
        Self {
            start: start_key,
            quit: quit_key,
        }
    }

    pub fn key(&self, slot: Slot) -> Key {
        match slot {
            Slot::Start => self.start,
            Slot::Quit => self.quit,
        }
    }

    fn set(&mut self, slot: Slot, key: Key) {
        match slot {
            Slot::Start => self.start = key,
            Slot::Quit => self.quit = key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CaptureState {
    Idle,
    ListeningForStart,
    ListeningForQuit,
}

impl CaptureState {
    pub fn slot(self) -> Option<Slot> {
        match self {
            CaptureState::Idle => None,
            CaptureState::ListeningForStart => Some(Slot::Start),
            CaptureState::ListeningForQuit => Some(Slot::Quit),
        }
    }

    fn listening_for(slot: Slot) -> Self {
        match slot {
            Slot::Start => CaptureState::ListeningForStart,
            Slot::Quit => CaptureState::ListeningForQuit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HotkeyAction {
    ToggleClicking,
    Quit,
}

/// Hotkey bindings plus the capture mode, shared between the GUI and the keyboard hook.
#[derive(Debug)]
pub struct HotkeyState {
    bindings: Bindings,
    capture: CaptureState,
    held: Vec<Key>,
}

impl HotkeyState {
    pub fn new(bindings: Bindings) -> Self {
        Self {
            bindings,
            capture: CaptureState::Idle,
            held: Vec::new(),
        }
    }

    pub fn bindings(&self) -> Bindings {
        self.bindings
    }

    pub fn capture(&self) -> CaptureState {
        self.capture
    }

    pub fn is_listening(&self) -> bool {
        self.capture != CaptureState::Idle
    }

    pub fn begin_capture(&mut self, slot: Slot, clicking: bool) -> bool {
        if clicking || self.is_listening() {
            return false;
        }
        self.capture = CaptureState::listening_for(slot);
        tracing::debug!("Listening for new {:?} hotkey", slot);
        true
    }

    pub fn cancel_capture(&mut self) {
        self.capture = CaptureState::Idle;
    }

    pub fn handle(&mut self, event: &EventType) -> Option<HotkeyAction> {
        match *event {
            EventType::KeyPress(key) => {
                // Held keys repeat their press events.
                if self.held.contains(&key) {
                    return None;
                }
                self.held.push(key);

                match self.capture.slot() {
                    Some(slot) => {
                        self.try_bind(slot, key);
                        None
                    }
                    None if key == self.bindings.start => Some(HotkeyAction::ToggleClicking),
                    None if key == self.bindings.quit => Some(HotkeyAction::Quit),
                    None => None,
                }
            }
            EventType::KeyRelease(key) => {
                self.held.retain(|k| *k != key);
                None
            }
            _ => None,
        }
    }

    fn try_bind(&mut self, slot: Slot, key: Key) {
        if key_name(key).is_none() {
            tracing::debug!("Ignoring unnamed key {:?} for {:?} hotkey", key, slot);
            return;
        }
        if key == self.bindings.key(slot.other()) {
            tracing::debug!("{:?} is already the {:?} hotkey", key, slot.other());
            return;
        }
        self.bindings.set(slot, key);
        self.capture = CaptureState::Idle;
        tracing::info!("{:?} hotkey set to {:?}", slot, key);
    }
}

/// Actions raised by the keyboard hook for the UI thread to carry out.
/// The hook callback must never block, so it only flips these flags.
#[derive(Debug, Default)]
pub struct HotkeyRequests {
    toggle: AtomicBool,
    quit: AtomicBool,
}

impl HotkeyRequests {
    pub fn raise(&self, action: HotkeyAction) {
        match action {
            // Two presses before the UI catches up cancel out.
            HotkeyAction::ToggleClicking => {
                self.toggle.fetch_xor(true, Ordering::SeqCst);
            }
            HotkeyAction::Quit => self.quit.store(true, Ordering::SeqCst),
        }
    }

    pub fn take_toggle(&self) -> bool {
        self.toggle.swap(false, Ordering::SeqCst)
    }

    pub fn take_quit(&self) -> bool {
        self.quit.swap(false, Ordering::SeqCst)
    }
}

/// Runs the global keyboard hook on its own thread for the life of the process.
pub fn spawn_listener(
    state: Arc<Mutex<HotkeyState>>,
    requests: Arc<HotkeyRequests>,
    repaint: RepaintHook,
) {
    thread::spawn(move || {
        let callback = move |event: Event| {
            let (action, was_listening) = {
                let mut state = state.lock();
                let was_listening = state.is_listening();
                (state.handle(&event.event_type), was_listening)
            };

            if let Some(action) = action {
                requests.raise(action);
            }
            if action.is_some() || was_listening {
                repaint();
            }
        };

        if let Err(error) = listen(callback) {
            tracing::error!("Failed to start global hotkey listener: {:?}", error);
        }
    });
}
