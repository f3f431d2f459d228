use crate::log;
use crate::scramble::ScrambleDetector;

use std::env;
use std::str::FromStr;

/// 15.0 seconds.
pub const DEFAULT_LONG_THINK_TENTHS: u32 = 150;
/// Clock-difference thresholds, in tenths, checked in both directions.
pub const DEFAULT_CLOCK_DIFF_THRESHOLDS: [u32; 4] = [150, 300, 600, 1200];
pub const DEFAULT_EVAL_PLY: u32 = 40;
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// A subject move taking at least this many tenths is a long think.
    pub long_think_threshold: u32,
    pub scramble: ScrambleDetector,
    pub clock_diff_thresholds: Vec<u32>,
    /// Record performance for every `(subject, opponent)` clock pair seen.
    /// Produces many keys.
    pub clock_pair_buckets: bool,
    pub eval_ply: u32,
    pub annotate: bool,
    /// Log progress every this many analysed games; 0 disables it.
    pub progress_interval: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            long_think_threshold: DEFAULT_LONG_THINK_TENTHS,
            scramble: ScrambleDetector::default(),
            clock_diff_thresholds: DEFAULT_CLOCK_DIFF_THRESHOLDS.to_vec(),
            clock_pair_buckets: false,
            eval_ply: DEFAULT_EVAL_PLY,
            annotate: true,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl AnalysisConfig {
    /// Defaults overridden by `CLOCKSTATS_LONG_THINK`,
    /// `CLOCKSTATS_SCRAMBLE_PAIRS` and `CLOCKSTATS_LOW_TIME`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        override_from(&lookup, "CLOCKSTATS_LONG_THINK", &mut config.long_think_threshold);
        override_from(&lookup, "CLOCKSTATS_SCRAMBLE_PAIRS", &mut config.scramble.min_pairs);
        override_from(&lookup, "CLOCKSTATS_LOW_TIME", &mut config.scramble.low_time);
        config
    }
}

fn override_from<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => log::warn(format!("Ignoring {key}='{raw}': not a non-negative integer")),
    }
}
