use chrono::{DateTime, Duration, Utc};

use crate::config::DraftsConfig;

pub const DEFAULT_QUIET_PERIOD_MS: u64 = 1_000;

/// Coalesces rapid edits: a save is due once the form has been dirty and idle
/// for the quiet period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AutosaveDebounce {
    quiet_period: Duration,
    last_edit_at: Option<DateTime<Utc>>,
    dirty: bool,
}

impl Default for AutosaveDebounce {
    fn default() -> Self {
        Self::from_millis(DEFAULT_QUIET_PERIOD_MS)
    }
}

impl AutosaveDebounce {
    pub fn new(quiet_period: Duration) -> Self {
        Self { quiet_period, last_edit_at: None, dirty: false }
    }

    pub fn from_millis(millis: u64) -> Self {
        let millis = i64::try_from(millis).unwrap_or(i64::MAX);
        Self::new(Duration::try_milliseconds(millis).unwrap_or(Duration::MAX))
    }

    pub fn from_config(config: &DraftsConfig) -> Self {
        Self::from_millis(config.autosave_debounce_ms)
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn record_edit(&mut self, now: DateTime<Utc>) {
        self.last_edit_at = Some(now);
        self.dirty = true;
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match (self.dirty, self.last_edit_at) {
            (true, Some(last_edit)) => now - last_edit >= self.quiet_period,
            _ => false,
        }
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::AutosaveDebounce;

    #[test]
    fn rapid_edits_push_the_save_back() {
        let start = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).single().expect("timestamp");
        let mut debounce = AutosaveDebounce::default();
        assert!(!debounce.is_due(start));

        debounce.record_edit(start);
        debounce.record_edit(start + Duration::milliseconds(600));
        assert!(!debounce.is_due(start + Duration::milliseconds(1_200)));
        assert!(debounce.is_due(start + Duration::milliseconds(1_600)));

        debounce.mark_saved();
        assert!(!debounce.is_due(start + Duration::seconds(10)));
    }
}
