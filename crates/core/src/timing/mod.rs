//! Frame-synchronized timers.
//!
//! A [`SeqTimer`] never runs on its own thread. The frame loop polls it once
//! per frame through [`SeqTimer::triggered`], passing the frame rate it is
//! currently achieving, and the timer decides whether the frame about to be
//! drawn is the one closest to its next deadline. When frames are longer
//! than the period the timer fires on every frame instead of never.
//!
//! [`TimingHandler`] is the pool a host usually keeps: it owns timers paired
//! with tasks and polls them all in one call per frame.

use std::{cell::Cell, collections::BTreeMap, fmt, rc::Rc, time::Instant};

use crate::{config::TimingConfig, BiasError, Result};

/// Millisecond time source.
pub trait Clock {
    fn now_millis(&self) -> i64;
}

/// Monotonic wall clock, counting from its own creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

/// Clock advanced by hand. Clones share the same time, so one handle can
/// drive every timer created from it.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, millis: i64) {
        self.now.set(self.now.get() + millis);
    }

    pub fn set(&self, millis: i64) {
        self.now.set(millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.get()
    }
}

/// Whole milliseconds per frame at `frame_rate`; zero when the rate is not a
/// positive finite number.
fn millis_per_frame(frame_rate: f32) -> i64 {
    if frame_rate.is_finite() && frame_rate > 0.0 {
        (1000.0 / frame_rate) as i64
    } else {
        0
    }
}

/// Single-threaded periodic or single-shot timer polled by the frame loop.
pub struct SeqTimer<C = SystemClock> {
    clock: C,
    active: bool,
    single_shot: bool,
    counter: i64,
    period: i64,
    start_time: i64,
}

impl<C: Clock> SeqTimer<C> {
    /// Inactive periodic timer with no period set.
    pub fn new(clock: C) -> Self {
        Self::with_mode(clock, false)
    }

    pub fn with_mode(clock: C, single_shot: bool) -> Self {
        Self {
            clock,
            active: false,
            single_shot,
            counter: 0,
            period: 0,
            start_time: 0,
        }
    }

    /// (Re)starts the timer with the current period. A period that is not
    /// positive stops the timer instead.
    pub fn run(&mut self) {
        if self.period <= 0 {
            tracing::debug!(period = self.period, "timer not started");
            self.active = false;
            return;
        }
        self.counter = 1;
        self.active = true;
        self.start_time = self.clock.now_millis();
    }

    /// Sets the period, then behaves like [`SeqTimer::run`].
    pub fn run_with(&mut self, period: i64) {
        self.period = period;
        self.run();
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn cancel(&mut self) {
        self.stop();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the timer fires on the frame being drawn at `frame_rate`.
    ///
    /// Fires once the current deadline has passed, or early when the next
    /// frame would overshoot the deadline by more than this frame undershoots
    /// it. Each fire moves the deadline one period forward. Single-shot timers
    /// keep firing until stopped by the caller.
    pub fn triggered(&mut self, frame_rate: f32) -> bool {
        if !self.active {
            return false;
        }

        let elapsed = self.clock.now_millis().saturating_sub(self.start_time);
        let threshold = self.counter.saturating_mul(self.period);

        let fire = if threshold < elapsed {
            true
        } else {
            let diff = elapsed
                .saturating_add(millis_per_frame(frame_rate))
                .saturating_sub(threshold);
            diff >= 0 && threshold.saturating_sub(elapsed) < diff
        };

        if fire {
            self.counter = self.counter.saturating_add(1);
            tracing::trace!(elapsed, threshold, "timer fired");
        }
        fire
    }

    /// Period in milliseconds.
    pub fn period(&self) -> i64 {
        self.period
    }

    /// Takes effect from the next deadline; the timer is not restarted.
    pub fn set_period(&mut self, period: i64) {
        self.period = period;
    }

    pub fn is_single_shot(&self) -> bool {
        self.single_shot
    }

    pub fn set_single_shot(&mut self, single_shot: bool) {
        self.single_shot = single_shot;
    }

    /// Index of the next deadline, starting at 1 after [`SeqTimer::run`].
    pub fn counter(&self) -> i64 {
        self.counter
    }
}

impl Default for SeqTimer<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock::new())
    }
}

impl<C> PartialEq for SeqTimer<C> {
    fn eq(&self, other: &Self) -> bool {
        self.active == other.active
            && self.single_shot == other.single_shot
            && self.counter == other.counter
            && self.period == other.period
            && self.start_time == other.start_time
    }
}

impl<C> fmt::Debug for SeqTimer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeqTimer")
            .field("active", &self.active)
            .field("single_shot", &self.single_shot)
            .field("counter", &self.counter)
            .field("period", &self.period)
            .field("start_time", &self.start_time)
            .finish()
    }
}

/// Work run by a [`TimingHandler`] when its timer fires. Receives the host's
/// context, typically the scene or grabber.
pub type TimingTask<T> = Box<dyn FnMut(&mut T)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(usize);

struct TimerEntry<T, C> {
    timer: SeqTimer<C>,
    task: TimingTask<T>,
}

/// Owns a set of timers and polls them once per frame.
pub struct TimingHandler<T, C = SystemClock> {
    clock: C,
    frame_rate: f32,
    default_period: i64,
    next_id: usize,
    timers: BTreeMap<TimerId, TimerEntry<T, C>>,
}

impl<T, C: Clock + Clone> TimingHandler<T, C> {
    pub fn new(clock: C, config: &TimingConfig) -> Self {
        Self {
            clock,
            frame_rate: config.nominal_frame_rate,
            default_period: config.default_period_ms,
            next_id: 0,
            timers: BTreeMap::new(),
        }
    }

    /// Frame rate passed to the latest [`TimingHandler::handle`] call, or the
    /// configured nominal rate before the first one.
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// Adds an inactive timer with the configured default period.
    pub fn register<F>(&mut self, single_shot: bool, task: F) -> TimerId
    where
        F: FnMut(&mut T) + 'static,
    {
        let mut timer = SeqTimer::with_mode(self.clock.clone(), single_shot);
        timer.set_period(self.default_period);

        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.insert(
            id,
            TimerEntry {
                timer,
                task: Box::new(task),
            },
        );
        id
    }

    /// Adds a timer and starts it right away.
    pub fn schedule<F>(&mut self, period: i64, single_shot: bool, task: F) -> Result<TimerId>
    where
        F: FnMut(&mut T) + 'static,
    {
        if period <= 0 {
            return Err(BiasError::InvalidPeriod(period));
        }
        let id = self.register(single_shot, task);
        if let Some(entry) = self.timers.get_mut(&id) {
            entry.timer.run_with(period);
        }
        Ok(id)
    }

    pub fn unregister(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn timer(&self, id: TimerId) -> Option<&SeqTimer<C>> {
        self.timers.get(&id).map(|entry| &entry.timer)
    }

    pub fn timer_mut(&mut self, id: TimerId) -> Option<&mut SeqTimer<C>> {
        self.timers.get_mut(&id).map(|entry| &mut entry.timer)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Polls every timer at the last frame rate seen, which is the configured
    /// nominal rate until [`TimingHandler::handle`] reports a measured one.
    pub fn poll(&mut self, context: &mut T) -> usize {
        self.handle(self.frame_rate, context)
    }

    /// Polls every timer at `frame_rate`, running the task of each one that
    /// fires. Single-shot timers are stopped after their fire. Returns the
    /// number of tasks run.
    pub fn handle(&mut self, frame_rate: f32, context: &mut T) -> usize {
        self.frame_rate = frame_rate;
        let mut fired = 0;
        for (id, entry) in &mut self.timers {
            if !entry.timer.triggered(frame_rate) {
                continue;
            }
            (entry.task)(context);
            fired += 1;
            if entry.timer.is_single_shot() {
                tracing::debug!(timer = id.0, "single-shot timer done");
                entry.timer.stop();
            }
        }
        fired
    }
}

impl<T, C> fmt::Debug for TimingHandler<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingHandler")
            .field("frame_rate", &self.frame_rate)
            .field("default_period", &self.default_period)
            .field("timers", &self.timers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FPS: f32 = 60.0;

    /// Advances the clock one 60 fps frame at a time (17, 17, 16 ms, ...)
    /// for `frames` frames and counts fires.
    fn poll_frames(timer: &mut SeqTimer<ManualClock>, clock: &ManualClock, frames: usize) -> (usize, Option<i64>) {
        let mut fires = 0;
        let mut first = None;
        for frame in 0..frames {
            clock.advance(if frame % 3 == 2 { 16 } else { 17 });
            if timer.triggered(FPS) {
                fires += 1;
                if first.is_none() {
                    first = Some(clock.now_millis());
                }
            }
        }
        (fires, first)
    }

    #[test]
    fn fires_within_one_frame_of_the_period() {
        let clock = ManualClock::new();
        let mut timer = SeqTimer::new(clock.clone());
        timer.run_with(100);

        let (_, first) = poll_frames(&mut timer, &clock, 10);
        let first = first.expect("timer should fire");

        assert!(first <= 100 + 17, "first fire at {first} ms");
        assert!(first >= 100 - 17, "first fire at {first} ms");
    }

    #[test]
    fn fire_count_tracks_elapsed_periods() {
        let clock = ManualClock::new();
        let mut timer = SeqTimer::new(clock.clone());
        timer.run_with(100);

        // 180 frames at 60 fps is 3000 ms.
        let (fires, _) = poll_frames(&mut timer, &clock, 180);
        let expected = clock.now_millis() / 100;

        assert!((fires as i64 - expected).abs() <= 1, "{fires} fires, expected {expected}");
    }

    #[test]
    fn fires_every_frame_when_frames_are_longer_than_the_period() {
        let clock = ManualClock::new();
        let mut timer = SeqTimer::new(clock.clone());
        timer.run_with(5);

        let mut fires = 0;
        for _ in 0..10 {
            clock.advance(33);
            if timer.triggered(30.0) {
                fires += 1;
            }
        }
        assert_eq!(fires, 10);
    }

    #[test]
    fn non_positive_period_refuses_to_start() {
        let clock = ManualClock::new();
        let mut timer = SeqTimer::new(clock.clone());

        timer.run_with(0);
        assert!(!timer.is_active());
        timer.run_with(-20);
        assert!(!timer.is_active());

        clock.advance(1000);
        assert!(!timer.triggered(FPS));
        assert_eq!(timer.counter(), 0);
    }

    #[test]
    fn restarting_with_a_bad_period_stops_a_running_timer() {
        let clock = ManualClock::new();
        let mut timer = SeqTimer::new(clock.clone());
        timer.run_with(100);
        assert!(timer.is_active());

        timer.run_with(-5);
        assert!(!timer.is_active());
        for _ in 0..3 {
            clock.advance(1);
            assert!(!timer.triggered(FPS));
        }
    }

    #[test]
    fn huge_periods_saturate_instead_of_overflowing() {
        let clock = ManualClock::new();
        let mut timer = SeqTimer::new(clock.clone());
        timer.run_with(10);
        clock.advance(100);
        assert!(timer.triggered(FPS));
        assert!(timer.triggered(FPS));
        assert_eq!(timer.counter(), 3);

        timer.set_period(i64::MAX / 2);
        assert!(!timer.triggered(FPS));
        clock.set(i64::MAX);
        assert!(!timer.triggered(f32::MIN_POSITIVE));
    }

    #[test]
    fn stop_and_cancel_deactivate() {
        let clock = ManualClock::new();
        let mut timer = SeqTimer::new(clock.clone());
        timer.run_with(10);
        timer.stop();
        clock.advance(500);
        assert!(!timer.triggered(FPS));

        timer.run();
        assert!(timer.is_active());
        timer.cancel();
        assert!(!timer.is_active());
    }

    #[test]
    fn restarting_resets_the_deadline() {
        let clock = ManualClock::new();
        let mut timer = SeqTimer::new(clock.clone());
        timer.run_with(50);
        clock.advance(400);
        assert!(timer.triggered(FPS));
        assert_eq!(timer.counter(), 2);

        timer.run();
        assert_eq!(timer.counter(), 1);
        assert!(!timer.triggered(FPS));
    }

    #[test]
    fn bad_frame_rates_only_fire_after_the_deadline() {
        let clock = ManualClock::new();
        let mut timer = SeqTimer::new(clock.clone());
        timer.run_with(100);

        clock.advance(99);
        assert!(!timer.triggered(0.0));
        clock.advance(2);
        assert!(timer.triggered(f32::NAN));
    }

    #[test]
    fn equality_ignores_the_clock() {
        let a = SeqTimer::with_mode(ManualClock::new(), true);
        let b = SeqTimer::with_mode(ManualClock::new(), true);
        assert_eq!(a, b);
        assert_ne!(a, SeqTimer::new(ManualClock::new()));
    }

    #[test]
    fn handler_runs_tasks_and_retires_single_shots() {
        let clock = ManualClock::new();
        let mut handler: TimingHandler<Vec<&'static str>, _> =
            TimingHandler::new(clock.clone(), &TimingConfig::default());
        let tick = handler
            .schedule(100, false, |log: &mut Vec<&'static str>| log.push("tick"))
            .unwrap();
        let once = handler
            .schedule(100, true, |log: &mut Vec<&'static str>| log.push("once"))
            .unwrap();

        let mut log = Vec::new();
        for _ in 0..25 {
            clock.advance(20);
            handler.handle(FPS, &mut log);
        }

        assert_eq!(log.iter().filter(|entry| **entry == "once").count(), 1);
        let ticks = log.iter().filter(|entry| **entry == "tick").count();
        assert!((4..=6).contains(&ticks), "{ticks} ticks");
        assert!(handler.timer(tick).unwrap().is_active());
        assert!(!handler.timer(once).unwrap().is_active());
        assert_eq!(handler.frame_rate(), FPS);
    }

    #[test]
    fn poll_uses_the_nominal_rate_until_one_is_reported() {
        let clock = ManualClock::new();
        let config = TimingConfig {
            nominal_frame_rate: 10.0,
            ..TimingConfig::default()
        };
        let mut handler: TimingHandler<u32, _> = TimingHandler::new(clock.clone(), &config);
        handler.schedule(100, false, |fires: &mut u32| *fires += 1).unwrap();
        let mut fires = 0;

        // At 10 fps the next frame would land at 160 ms, further from the
        // 100 ms deadline than this one.
        clock.advance(60);
        assert_eq!(handler.poll(&mut fires), 1);

        // At 60 fps, 160 ms is still too early for the 200 ms deadline.
        handler.handle(FPS, &mut fires);
        clock.advance(100);
        assert_eq!(handler.poll(&mut fires), 0);
        assert_eq!(handler.frame_rate(), FPS);
        assert_eq!(fires, 1);
    }

    #[test]
    fn handler_rejects_invalid_periods_and_unregisters() {
        let mut handler: TimingHandler<(), _> =
            TimingHandler::new(ManualClock::new(), &TimingConfig::default());

        assert!(matches!(
            handler.schedule(0, false, |_| {}),
            Err(BiasError::InvalidPeriod(0))
        ));
        assert!(handler.is_empty());

        let id = handler.register(false, |_| {});
        assert!(!handler.timer(id).unwrap().is_active());
        assert_eq!(
            handler.timer(id).unwrap().period(),
            TimingConfig::default().default_period_ms
        );
        handler.timer_mut(id).unwrap().run();
        assert!(handler.timer(id).unwrap().is_active());
        assert!(handler.unregister(id));
        assert!(!handler.unregister(id));
    }
}
