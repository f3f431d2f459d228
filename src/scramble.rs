//! Time-scramble detection: both clocks critically low for a sustained run.

use shakmaty::Color;

use crate::think::{ClockReading, ThinkTime};

/// 10.0 seconds.
pub const LOW_TIME_TENTHS: u32 = 100;
pub const DEFAULT_MIN_PAIRS: u32 = 5;

/// Consecutive plies during which both sides were below the low-time threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrambleWindow {
    pub start_ply: u32,
    pub plies: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrambleReport {
    pub windows: Vec<ScrambleWindow>,
    pub qualifying_plies: u32,
}

impl ScrambleReport {
    /// Non-overlapping pairs of consecutive low readings. A window opens on
    /// the second side to go low, so the reading just before it is low too.
    pub fn pairs(&self) -> u32 {
        self.windows.iter().map(|w| (w.plies + 1) / 2).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrambleDetector {
    /// Strict upper bound, in tenths, for a clock to count as low.
    pub low_time: u32,
    /// Qualifying ply-pairs needed before a game counts as a scramble.
    pub min_pairs: u32,
}

impl Default for ScrambleDetector {
    fn default() -> Self {
        Self {
            low_time: LOW_TIME_TENTHS,
            min_pairs: DEFAULT_MIN_PAIRS,
        }
    }
}

impl ScrambleDetector {
    pub fn new(low_time: u32, min_pairs: u32) -> Self {
        Self {
            low_time,
            min_pairs,
        }
    }

    pub fn detect(&self, readings: &[ClockReading]) -> ScrambleReport {
        let mut white: Option<u32> = None;
        let mut black: Option<u32> = None;
        let mut report = ScrambleReport::default();
        let mut open: Option<ScrambleWindow> = None;

        for reading in readings {
            match reading.side {
                Color::White => white = Some(reading.remaining),
                Color::Black => black = Some(reading.remaining),
            }

            let low = |clock: Option<u32>| clock.is_some_and(|c| c < self.low_time);
            if low(white) && low(black) {
                report.qualifying_plies += 1;
                match open.as_mut() {
                    Some(window) if window.start_ply + window.plies == reading.ply => {
                        window.plies += 1;
                    }
                    _ => {
                        if let Some(window) = open.take() {
                            report.windows.push(window);
                        }
                        open = Some(ScrambleWindow {
                            start_ply: reading.ply,
                            plies: 1,
                        });
                    }
                }
            } else if let Some(window) = open.take() {
                report.windows.push(window);
            }
        }

        if let Some(window) = open {
            report.windows.push(window);
        }
        report
    }

    pub fn was_time_scramble(&self, readings: &[ClockReading]) -> bool {
        self.is_scramble(&self.detect(readings))
    }

    pub fn is_scramble(&self, report: &ScrambleReport) -> bool {
        report.qualifying_plies > 0 && report.pairs() >= self.min_pairs
    }

    /// The move was played with both clocks already low.
    pub fn in_scramble(&self, think: &ThinkTime) -> bool {
        think.remaining < self.low_time && think.opponent_remaining < self.low_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings(values: &[u32]) -> Vec<ClockReading> {
        values
            .iter()
            .enumerate()
            .map(|(idx, remaining)| ClockReading {
                ply: idx as u32 + 1,
                side: if idx % 2 == 0 { Color::White } else { Color::Black },
                remaining: *remaining,
            })
            .collect()
    }

    #[test]
    fn test_never_low_for_both_is_not_a_scramble() {
        // White drops to zero, Black never goes below 10s.
        let mut values = Vec::new();
        for i in 0..200u32 {
            values.push(600u32.saturating_sub(i * 5));
            values.push(400);
        }
        let detector = ScrambleDetector::default();
        let report = detector.detect(&readings(&values));
        assert_eq!(report.qualifying_plies, 0);
        assert!(report.windows.is_empty());
        assert!(!detector.was_time_scramble(&readings(&values)));
    }

    #[test]
    fn test_sustained_low_clocks_form_one_window() {
        let values = [150, 140, 99, 98, 90, 85, 80, 75, 70, 65, 60, 55, 50];
        let detector = ScrambleDetector::default();
        let report = detector.detect(&readings(&values));

        // Ply 3 leaves Black at 14.0s; both are low from ply 4 onward.
        assert_eq!(
            report.windows,
            vec![ScrambleWindow {
                start_ply: 4,
                plies: 10
            }]
        );
        assert_eq!(report.pairs(), 5);
        assert!(detector.is_scramble(&report));
    }

    #[test]
    fn test_min_pairs_is_configurable() {
        let values = [99, 98, 90, 85, 80, 75, 70, 65, 60];
        let rs = readings(&values);
        // Plies 2..=9 qualify; with ply 1 that is nine low readings, 4 pairs.
        assert!(ScrambleDetector::new(LOW_TIME_TENTHS, 4).was_time_scramble(&rs));
        assert!(!ScrambleDetector::new(LOW_TIME_TENTHS, 5).was_time_scramble(&rs));
    }

    #[test]
    fn test_increment_recovery_splits_windows() {
        let values = [90, 90, 80, 80, 120, 70, 60, 60];
        let report = ScrambleDetector::default().detect(&readings(&values));
        assert_eq!(
            report.windows,
            vec![
                ScrambleWindow {
                    start_ply: 2,
                    plies: 3
                },
                ScrambleWindow {
                    start_ply: 7,
                    plies: 2
                },
            ]
        );
        assert_eq!(report.qualifying_plies, 5);
        assert_eq!(report.pairs(), 3);
    }

    #[test]
    fn test_five_low_moves_each_is_a_scramble() {
        let values = [300, 300, 90, 90, 80, 80, 70, 70, 60, 60, 50, 50];
        let detector = ScrambleDetector::default();
        let report = detector.detect(&readings(&values));
        assert_eq!(report.qualifying_plies, 9);
        assert_eq!(report.pairs(), 5);
        assert!(detector.is_scramble(&report));

        assert!(!detector.was_time_scramble(&readings(&values[..11])));
    }

    #[test]
    fn test_no_readings_never_qualifies() {
        let detector = ScrambleDetector::new(LOW_TIME_TENTHS, 0);
        assert!(!detector.was_time_scramble(&[]));
    }

    #[test]
    fn test_threshold_is_strict() {
        let values = [100, 100, 100, 100];
        let report = ScrambleDetector::default().detect(&readings(&values));
        assert_eq!(report.qualifying_plies, 0);
    }

    #[test]
    fn test_in_scramble_for_single_move() {
        let detector = ScrambleDetector::default();
        let think = ThinkTime {
            ply: 41,
            tenths: 3,
            remaining: 42,
            opponent_remaining: 77,
            clamped: false,
        };
        assert!(detector.in_scramble(&think));
        assert!(!detector.in_scramble(&ThinkTime {
            opponent_remaining: 100,
            ..think
        }));
    }
}
