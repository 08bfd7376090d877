//! Performance measurement tools.

use std::{
    cell::{Cell, RefCell},
    fmt,
    time::{Duration, Instant},
};

use itertools::Itertools;

use crate::filter::{
    ema::{Ema, EmaState},
    Filter,
};

const EMA_ALPHA: f32 = 0.3;

/// Measures how long an operation takes, averaged over its invocations.
///
/// The perception loop runs on a single thread, so the recorded state lives in plain [`Cell`]s.
/// Displaying the timer with `{}` prints the smoothed average and resets it.
pub struct Timer {
    name: &'static str,
    ema: Ema,
    ema_state: RefCell<EmaState>,
    avg_secs: Cell<f32>,
    count: Cell<usize>,
}

impl Timer {
    /// Creates a new timer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ema: Ema::new(EMA_ALPHA),
            ema_state: RefCell::new(EmaState::default()),
            avg_secs: Cell::new(0.0),
            count: Cell::new(0),
        }
    }

    /// Runs `timee`, recording how long it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation; dropping the returned [`TimerGuard`] records the elapsed
    /// time.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn record(&self, elapsed: Duration) {
        let filtered = self
            .ema
            .filter(&mut *self.ema_state.borrow_mut(), elapsed.as_secs_f32());
        self.avg_secs.set(filtered);
        self.count.set(self.count.get() + 1);
    }
}

/// Displays the average recorded time and resets it.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        *self.ema_state.borrow_mut() = EmaState::default();

        let avg_ms = self.avg_secs.replace(0.0) * 1000.0;
        let count = self.count.replace(0);

        write!(f, "{}: {count}x{avg_ms:.01}ms", self.name)
    }
}

/// Cloning a timer resets its collected timings.
impl Clone for Timer {
    fn clone(&self) -> Self {
        Self::new(self.name)
    }
}

/// Guard returned by [`Timer::start`]; records the elapsed time when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

/// Logs frames per second, with optional extra data attached.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Advances the frame counter by 1 and logs FPS once a second has passed.
    pub fn tick(&mut self) {
        self.frames += 1;
        if self.due() {
            log::debug!("{}: {} FPS", self.name, self.frames);
            self.reset();
        }
    }

    /// Advances the frame counter by 1 and logs FPS and `extra` data once a second has passed.
    ///
    /// This is typically fed the stage [`Timer`]s of the pipeline, which both prints and resets
    /// them once per second.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        self.frames += 1;
        if self.due() {
            log::debug!(
                "{}: {} FPS ({})",
                self.name,
                self.frames,
                extra.into_iter().format(", "),
            );
            self.reset();
        }
    }

    fn due(&self) -> bool {
        self.start.elapsed() > Duration::from_secs(1)
    }

    fn reset(&mut self) {
        self.frames = 0;
        self.start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_records_and_resets() {
        let timer = Timer::new("test");
        timer.time(|| {});
        assert!(timer.to_string().starts_with("test: 1x"));
        // displaying resets the count
        assert!(timer.to_string().starts_with("test: 0x"));
    }
}
