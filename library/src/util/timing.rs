use std::borrow::Cow;
use std::time::Instant;

use log::{self, Level};

/// Logs the elapsed time of a scope when dropped.
pub struct ScopedTimer {
    label: Option<Cow<'static, str>>,
    level: Level,
    start: Option<Instant>,
}

impl ScopedTimer {
    pub fn with_level(label: impl Into<Cow<'static, str>>, level: Level) -> Self {
        Self {
            label: Some(label.into()),
            level,
            start: Some(Instant::now()),
        }
    }

    pub fn debug(label: impl Into<Cow<'static, str>>) -> Self {
        Self::with_level(label, Level::Debug)
    }

    /// Only builds the label (and reads the clock) when debug logging is on.
    pub fn debug_lazy<F>(label: F) -> Self
    where
        F: FnOnce() -> String,
    {
        if log::log_enabled!(Level::Debug) {
            Self::debug(label())
        } else {
            Self {
                label: None,
                level: Level::Debug,
                start: None,
            }
        }
    }

    pub fn elapsed_micros(&self) -> Option<u128> {
        self.start.map(|start| start.elapsed().as_micros())
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        if let (Some(label), Some(start)) = (&self.label, self.start) {
            let elapsed = start.elapsed();
            log::log!(
                self.level,
                "{} took {}.{:03} ms",
                label,
                elapsed.as_millis(),
                elapsed.subsec_micros() % 1000
            );
        }
    }
}

pub fn measure_debug_lazy<T, F, L>(label: L, f: F) -> T
where
    F: FnOnce() -> T,
    L: FnOnce() -> String,
{
    let _timer = ScopedTimer::debug_lazy(label);
    f()
}
