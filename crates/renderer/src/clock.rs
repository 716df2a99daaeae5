use std::time::{Duration, Instant};

/// One display-refresh step handed to the per-tick callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Seconds since the scene started.
    pub elapsed: f32,
    /// Seconds since the previous tick (0 on the first tick).
    pub delta: f32,
    /// Zero-based tick counter.
    pub index: u64,
}

/// Abstraction over where time values originate from.
pub trait TimeSource: Send {
    /// Produces the elapsed time, in seconds, for the next tick.
    fn sample(&mut self) -> f32;
}

/// Time source backed by the system monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    origin: Instant,
}

impl SystemTimeSource {
    /// Creates a system time source initialised to `Instant::now()`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl TimeSource for SystemTimeSource {
    fn sample(&mut self) -> f32 {
        self.origin.elapsed().as_secs_f32()
    }
}

/// Time source that always reports a fixed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource {
    time: f32,
}

impl FixedTimeSource {
    /// Constructs a fixed time source that always returns the provided time.
    pub fn new(time: f32) -> Self {
        Self { time: time.max(0.0) }
    }
}

impl TimeSource for FixedTimeSource {
    fn sample(&mut self) -> f32 {
        self.time
    }
}

/// Time source that advances by a constant interval on every sample.
///
/// Simulates a display running at a fixed refresh rate, which keeps headless
/// exports and tests deterministic. The first sample reports `start`.
#[derive(Debug, Clone, Copy)]
pub struct SteppedTimeSource {
    start: f32,
    interval: f32,
    samples: u64,
}

impl SteppedTimeSource {
    pub fn new(start: f32, interval: Duration) -> Self {
        Self {
            start: start.max(0.0),
            interval: interval.as_secs_f32(),
            samples: 0,
        }
    }

    /// Convenience constructor for a refresh rate in Hz.
    pub fn at_refresh_rate(start: f32, hz: f32) -> Self {
        // Non-positive or non-finite rates hold the clock still.
        let interval = Duration::try_from_secs_f64(1.0 / f64::from(hz)).unwrap_or(Duration::ZERO);
        Self::new(start, interval)
    }
}

impl TimeSource for SteppedTimeSource {
    fn sample(&mut self) -> f32 {
        let value = self.start + self.interval * self.samples as f32;
        self.samples = self.samples.saturating_add(1);
        value
    }
}

/// Convenient alias for owning time sources behind trait objects.
pub type BoxedTimeSource = Box<dyn TimeSource + Send>;

/// Drives the per-tick callback from a [`TimeSource`].
///
/// The clock is single-shot: once [`FrameClock::stop`] is called (the host
/// tore the surface down) no further callbacks fire, and there is no way to
/// restart it short of building a new clock alongside a new scene.
pub struct FrameClock {
    source: BoxedTimeSource,
    last_elapsed: Option<f32>,
    next_index: u64,
    stopped: bool,
}

impl FrameClock {
    pub fn new(source: BoxedTimeSource) -> Self {
        Self {
            source,
            last_elapsed: None,
            next_index: 0,
            stopped: false,
        }
    }

    /// Clock backed by the system monotonic clock.
    pub fn system() -> Self {
        Self::new(Box::new(SystemTimeSource::new()))
    }

    /// Samples the time source and runs `callback` with the resulting tick.
    ///
    /// Returns `false` without invoking the callback once the clock is stopped.
    pub fn tick<F>(&mut self, callback: F) -> bool
    where
        F: FnOnce(Tick),
    {
        match self.advance() {
            Some(tick) => {
                callback(tick);
                true
            }
            None => false,
        }
    }

    /// Produces the next tick without a callback; `None` once stopped.
    pub fn advance(&mut self) -> Option<Tick> {
        if self.stopped {
            return None;
        }

        let sampled = self.source.sample().max(0.0);
        // Elapsed time never runs backwards, even if the source does.
        let elapsed = match self.last_elapsed {
            Some(previous) => sampled.max(previous),
            None => sampled,
        };
        let delta = self
            .last_elapsed
            .map(|previous| elapsed - previous)
            .unwrap_or(0.0);

        let tick = Tick {
            elapsed,
            delta,
            index: self.next_index,
        };
        self.last_elapsed = Some(elapsed);
        self.next_index = self.next_index.saturating_add(1);
        Some(tick)
    }

    /// Stops tick delivery for the rest of the clock's lifetime.
    pub fn stop(&mut self) {
        if !self.stopped {
            tracing::debug!(ticks = self.next_index, "frame clock stopped");
        }
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Number of ticks delivered so far.
    pub fn ticks(&self) -> u64 {
        self.next_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedSource {
        values: Vec<f32>,
        cursor: usize,
    }

    impl TimeSource for ScriptedSource {
        fn sample(&mut self) -> f32 {
            let value = self.values[self.cursor.min(self.values.len() - 1)];
            self.cursor += 1;
            value
        }
    }

    #[test]
    fn stepped_source_advances_by_interval() {
        let mut source = SteppedTimeSource::new(1.0, Duration::from_millis(500));
        assert_eq!(source.sample(), 1.0);
        assert_eq!(source.sample(), 1.5);
        assert_eq!(source.sample(), 2.0);
    }

    #[test]
    fn degenerate_refresh_rates_do_not_advance() {
        for hz in [0.0, -60.0, f32::NAN, 1e-40] {
            let mut source = SteppedTimeSource::at_refresh_rate(1.0, hz);
            assert_eq!(source.sample(), 1.0);
            assert_eq!(source.sample(), 1.0);
        }
    }

    #[test]
    fn fixed_source_never_moves() {
        let mut source = FixedTimeSource::new(2.5);
        assert_eq!(source.sample(), 2.5);
        assert_eq!(source.sample(), 2.5);
        assert_eq!(FixedTimeSource::new(-1.0).sample(), 0.0);
    }

    #[test]
    fn clock_reports_elapsed_delta_and_index() {
        let mut clock = FrameClock::new(Box::new(SteppedTimeSource::new(
            0.0,
            Duration::from_millis(250),
        )));

        let first = clock.advance().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.elapsed, 0.0);
        assert_eq!(first.delta, 0.0);

        let second = clock.advance().unwrap();
        assert_eq!(second.index, 1);
        assert!((second.elapsed - 0.25).abs() < 1e-6);
        assert!((second.delta - 0.25).abs() < 1e-6);
    }

    #[test]
    fn clock_stays_monotonic_when_source_jumps_back() {
        let mut clock = FrameClock::new(Box::new(ScriptedSource {
            values: vec![1.0, 0.5, 2.0],
            cursor: 0,
        }));
        let ticks: Vec<Tick> = (0..3).filter_map(|_| clock.advance()).collect();
        assert_eq!(ticks[0].elapsed, 1.0);
        assert_eq!(ticks[1].elapsed, 1.0);
        assert_eq!(ticks[1].delta, 0.0);
        assert_eq!(ticks[2].elapsed, 2.0);
    }

    #[test]
    fn stopped_clock_never_fires_again() {
        let mut clock = FrameClock::new(Box::new(FixedTimeSource::new(0.0)));
        let mut fired = 0;
        assert!(clock.tick(|_| fired += 1));
        clock.stop();
        assert!(!clock.tick(|_| fired += 1));
        assert!(clock.advance().is_none());
        assert_eq!(fired, 1);
        assert!(clock.is_stopped());
        assert_eq!(clock.ticks(), 1);
    }
}
