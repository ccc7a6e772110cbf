use std::time::Duration;

/// Where a run stands relative to its expected duration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// No tick has happened yet for a run with a known duration
    Pending { total: u64 },
    /// Expected duration known; all values in whole seconds
    Determinate { elapsed: u64, total: u64, remaining: u64 },
    /// No expected duration; shown as a busy indicator
    Indeterminate,
    /// No run in flight
    Idle,
}

impl Progress {
    /// Progress at the start of a run
    pub fn initial(expected_secs: Option<u64>) -> Self {
        match expected_secs {
            Some(total) => Progress::Pending { total },
            None => Progress::Indeterminate,
        }
    }

    /// Recompute progress from the time elapsed since the run started
    pub fn compute(expected_secs: Option<u64>, elapsed: Duration) -> Self {
        let Some(total) = expected_secs else {
            return Progress::Indeterminate;
        };
        let elapsed = elapsed.as_secs();
        Progress::Determinate {
            elapsed: elapsed.min(total),
            total,
            remaining: total.saturating_sub(elapsed),
        }
    }

    pub fn eta_text(&self) -> String {
        match *self {
            Progress::Pending { .. } => "ETA: calculating…".to_string(),
            Progress::Determinate { remaining, .. } => format!("ETA: {}", format_mm_ss(remaining)),
            Progress::Indeterminate | Progress::Idle => "ETA: --:--".to_string(),
        }
    }
}

/// Render seconds as `mm:ss`; minutes keep growing past 99
pub fn format_mm_ss(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
