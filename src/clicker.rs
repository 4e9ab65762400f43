use crate::delay::DelayRange;
use parking_lot::Mutex;
use rdev::{simulate, Button, EventType};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;

const SLEEP_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ClickError {
    #[error("failed to simulate {0}")]
    Simulate(&'static str),
}

pub trait ClickSink: Send {
    fn click(&mut self) -> Result<(), ClickError>;
}

/// Left button click through the OS input simulation layer.
#[derive(Default)]
pub struct SimulatedMouse;

impl ClickSink for SimulatedMouse {
    fn click(&mut self) -> Result<(), ClickError> {
        simulate(&EventType::ButtonPress(Button::Left))
            .map_err(|_| ClickError::Simulate("left button press"))?;
        thread::sleep(Duration::from_millis(1));
        simulate(&EventType::ButtonRelease(Button::Left))
            .map_err(|_| ClickError::Simulate("left button release"))
    }
}

pub type RepaintHook = Arc<dyn Fn() + Send + Sync>;
type SinkFactory = Box<dyn Fn() -> Box<dyn ClickSink> + Send + Sync>;

struct Shared {
    running: AtomicBool,
    clicks: AtomicU64,
    delays: Mutex<DelayRange>,
    started_at: Mutex<Option<Instant>>,
    repaint: Mutex<Option<RepaintHook>>,
}

impl Shared {
    fn notify(&self) {
        if let Some(hook) = self.repaint.lock().clone() {
            hook();
        }
    }
}

pub struct ClickSession {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    new_sink: SinkFactory,
}

impl ClickSession {
    pub fn new<F>(delays: DelayRange, new_sink: F) -> Self
    where
        F: Fn() -> Box<dyn ClickSink> + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                clicks: AtomicU64::new(0),
                delays: Mutex::new(delays),
                started_at: Mutex::new(None),
                repaint: Mutex::new(None),
            }),
            worker: Mutex::new(None),
            new_sink: Box::new(new_sink),
        }
    }

    pub fn with_simulated_mouse(delays: DelayRange) -> Self {
        Self::new(delays, || Box::new(SimulatedMouse))
    }

    /// Called after every click and whenever the session stops on its own.
    pub fn set_repaint_hook(&self, hook: RepaintHook) {
        *self.shared.repaint.lock() = Some(hook);
    }

    pub fn set_delays(&self, delays: DelayRange) {
        *self.shared.delays.lock() = delays;
    }

    pub fn delays(&self) -> DelayRange {
        *self.shared.delays.lock()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn clicks(&self) -> u64 {
        self.shared.clicks.load(Ordering::SeqCst)
    }

    pub fn elapsed(&self) -> Duration {
        if !self.is_running() {
            return Duration::ZERO;
        }
        let started_at = *self.shared.started_at.lock();
        started_at.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    /// Returns false when a click loop is already running.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();
        self.start_locked(&mut worker)
    }

    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        self.stop_locked(&mut worker);
    }

    pub fn toggle(&self) {
        let mut worker = self.worker.lock();
        if self.is_running() {
            self.stop_locked(&mut worker);
        } else {
            self.start_locked(&mut worker);
        }
    }

    fn start_locked(&self, worker: &mut Option<JoinHandle<()>>) -> bool {
        if self.is_running() {
            return false;
        }
        // A loop that ended on a click failure leaves its handle behind.
        if let Some(stale) = worker.take() {
            if stale.join().is_err() {
                tracing::error!("Previous click loop panicked");
            }
        }

        self.shared.clicks.store(0, Ordering::SeqCst);
        *self.shared.started_at.lock() = Some(Instant::now());
        self.shared.running.store(true, Ordering::SeqCst);

        let sink = (self.new_sink)();
        let shared = Arc::clone(&self.shared);
        tracing::info!("Clicking started with delays {:?}", self.delays());
        *worker = Some(thread::spawn(move || click_loop(sink, shared)));
        true
    }

    fn stop_locked(&self, worker: &mut Option<JoinHandle<()>>) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = worker.take() {
            if handle.join().is_err() {
                tracing::error!("Click loop panicked");
            }
            tracing::info!("Clicking stopped after {} clicks", self.clicks());
        }
    }
}

impl Drop for ClickSession {
    fn drop(&mut self) {
        self.stop();
    }
}

// Clears the running flag however the loop exits, panics included.
struct ExitGuard<'a>(&'a Shared);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::SeqCst);
        self.0.notify();
    }
}

fn click_loop(mut sink: Box<dyn ClickSink>, shared: Arc<Shared>) {
    let _guard = ExitGuard(&shared);
    let mut rng = rand::thread_rng();
    while shared.running.load(Ordering::SeqCst) {
        if let Err(e) = sink.click() {
            tracing::warn!("Stopping click loop: {}", e);
            return;
        }
        let count = shared.clicks.fetch_add(1, Ordering::SeqCst) + 1;
        shared.notify();

        let delay = shared.delays.lock().sample(&mut rng);
        tracing::trace!(count, ?delay, "click");
        sleep_while_running(delay, &shared.running);
    }
}

fn sleep_while_running(delay: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + delay;
    loop {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep((deadline - now).min(SLEEP_SLICE));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingSink(Arc<AtomicUsize>);

    impl ClickSink for CountingSink {
        fn click(&mut self) -> Result<(), ClickError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct BrokenSink;

    impl ClickSink for BrokenSink {
        fn click(&mut self) -> Result<(), ClickError> {
            Err(ClickError::Simulate("left button press"))
        }
    }

    struct PanickingSink;

    impl ClickSink for PanickingSink {
        fn click(&mut self) -> Result<(), ClickError> {
            panic!("input backend went away");
        }
    }

    fn counting_session(delays: DelayRange) -> (ClickSession, Arc<AtomicUsize>) {
        let total = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&total);
        let session = ClickSession::new(delays, move || {
            Box::new(CountingSink(Arc::clone(&counter))) as Box<dyn ClickSink>
        });
        (session, total)
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_clicks_until_stopped() {
        let (session, total) = counting_session(DelayRange::new(0.001, 0.002).unwrap());
        assert!(session.start());
        assert!(session.is_running());
        assert!(wait_until(|| session.clicks() >= 5));

        session.stop();
        assert!(!session.is_running());
        let frozen = session.clicks();
        assert!(frozen >= 5);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(session.clicks(), frozen);
        assert_eq!(total.load(Ordering::SeqCst) as u64, frozen);
    }

    #[test]
    fn test_start_while_running_is_refused() {
        let (session, _) = counting_session(DelayRange::new(10.0, 10.0).unwrap());
        assert!(session.start());
        assert!(!session.start());
        session.stop();
    }

    #[test]
    fn test_stop_interrupts_long_delay() {
        let (session, _) = counting_session(DelayRange::new(30.0, 30.0).unwrap());
        session.start();
        assert!(wait_until(|| session.clicks() == 1));

        let begun = Instant::now();
        session.stop();
        assert!(begun.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_restart_resets_click_count() {
        let (session, total) = counting_session(DelayRange::new(30.0, 30.0).unwrap());
        session.start();
        assert!(wait_until(|| session.clicks() == 1));
        session.stop();
        assert_eq!(session.clicks(), 1);

        session.start();
        assert!(wait_until(|| total.load(Ordering::SeqCst) == 2));
        assert_eq!(session.clicks(), 1);
        session.stop();
    }

    #[test]
    fn test_toggle() {
        let (session, _) = counting_session(DelayRange::new(10.0, 10.0).unwrap());
        session.toggle();
        assert!(session.is_running());
        session.toggle();
        assert!(!session.is_running());
        session.toggle();
        assert!(session.is_running());
    }

    #[test]
    fn test_elapsed_is_zero_when_stopped() {
        let (session, _) = counting_session(DelayRange::new(10.0, 10.0).unwrap());
        assert_eq!(session.elapsed(), Duration::ZERO);
        session.start();
        thread::sleep(Duration::from_millis(20));
        assert!(session.elapsed() >= Duration::from_millis(20));
        session.stop();
        assert_eq!(session.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_click_failure_ends_session() {
        let session = ClickSession::new(DelayRange::default(), || {
            Box::new(BrokenSink) as Box<dyn ClickSink>
        });
        let repaints = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&repaints);
        session.set_repaint_hook(Arc::new(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        session.start();
        assert!(wait_until(|| repaints.load(Ordering::SeqCst) == 1));
        assert!(!session.is_running());
        assert_eq!(session.clicks(), 0);

        // The dead loop's handle is reaped and a new loop starts.
        assert!(session.start());
        assert!(wait_until(|| !session.is_running()));
    }

    #[test]
    fn test_panicked_loop_is_reaped_on_next_start() {
        let session = ClickSession::new(DelayRange::default(), || {
            Box::new(PanickingSink) as Box<dyn ClickSink>
        });
        session.start();
        assert!(wait_until(|| !session.is_running()));
        assert_eq!(session.clicks(), 0);

        assert!(session.start());
        assert!(wait_until(|| !session.is_running()));
        session.stop();
    }

    #[test]
    fn test_delay_changes_apply_to_running_loop() {
        let (session, _) = counting_session(DelayRange::new(30.0, 30.0).unwrap());
        session.set_delays(DelayRange::new(0.0, 0.001).unwrap());
        assert_eq!(session.delays(), DelayRange::new(0.0, 0.001).unwrap());
        session.start();
        assert!(wait_until(|| session.clicks() >= 3));
        session.stop();
    }
}
