use std::borrow::Cow;
use std::time::{Duration, Instant};

use log::{self, Level};

/// Logs how long a scope took when dropped.
pub struct ScopedTimer {
    label: Option<Cow<'static, str>>,
    level: Level,
    start: Instant,
}

impl ScopedTimer {
    pub fn with_level(label: impl Into<Cow<'static, str>>, level: Level) -> Self {
        Self {
            label: Some(label.into()),
            level,
            start: Instant::now(),
        }
    }

    pub fn info(label: impl Into<Cow<'static, str>>) -> Self {
        Self::with_level(label, Level::Info)
    }

    pub fn debug(label: impl Into<Cow<'static, str>>) -> Self {
        Self::with_level(label, Level::Debug)
    }

    /// Only builds the label when debug logging is enabled.
    pub fn debug_lazy<F>(label_gen: F) -> Self
    where
        F: FnOnce() -> String,
    {
        let label = log::log_enabled!(Level::Debug).then(|| Cow::Owned(label_gen()));
        Self {
            label,
            level: Level::Debug,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        if let Some(label) = &self.label {
            log::log!(self.level, "{} took {} ms", label, self.start.elapsed().as_millis());
        }
    }
}

pub fn measure<T, F>(label: impl Into<Cow<'static, str>>, level: Level, f: F) -> T
where
    F: FnOnce() -> T,
{
    let _timer = ScopedTimer::with_level(label, level);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_returns_the_value() {
        let value = measure("sum", Level::Trace, || (1..=4).sum::<i32>());
        assert_eq!(value, 10);
    }

    #[test]
    fn test_lazy_label_is_skipped_when_disabled() {
        let mut called = false;
        let timer = ScopedTimer::debug_lazy(|| {
            called = true;
            "label".to_string()
        });
        assert_eq!(called, log::log_enabled!(Level::Debug));
        assert!(timer.elapsed() >= Duration::ZERO);
    }
}
