//! Per-move think-time reconstruction from `%clk` readings.
//!
//! Each side's clock starts at the base time. When a side moves, the comment
//! after its move shows the remaining time with any increment already added,
//! so the time spent is `previous - current + increment`.

use shakmaty::Color;
use smallvec::SmallVec;

use crate::clock::parse_clock;
use crate::error::AnalysisError;
use crate::timecontrol::TimeControl;
use crate::types::GameRecord;

pub type Readings = SmallVec<[ClockReading; 128]>;

/// Decoded remaining time after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockReading {
    /// 1-based ply index.
    pub ply: u32,
    /// Side that just moved.
    pub side: Color,
    /// Tenths of a second.
    pub remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThinkTime {
    pub ply: u32,
    pub tenths: u32,
    /// Mover's clock after the move.
    pub remaining: u32,
    /// Latest known clock of the side not moving.
    pub opponent_remaining: u32,
    /// The raw delta was negative and was clamped to zero.
    pub clamped: bool,
}

impl ThinkTime {
    pub fn is_premove(&self) -> bool {
        self.tenths == 1
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockSeries {
    pub readings: Readings,
    pub white: Vec<ThinkTime>,
    pub black: Vec<ThinkTime>,
    /// Moves whose clock went backwards beyond the increment.
    pub anomalies: u32,
    /// First ply without a decodable clock; the walk stops there.
    pub stopped_at: Option<u32>,
}

impl ClockSeries {
    pub fn side(&self, color: Color) -> &[ThinkTime] {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    pub fn final_remaining(&self, color: Color) -> Option<u32> {
        self.side(color).last().map(|t| t.remaining)
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

fn mover_of(ply_idx: usize, first_mover: Color) -> Color {
    if ply_idx % 2 == 0 {
        first_mover
    } else {
        first_mover.other()
    }
}

/// Decode clock readings until the first ply without one.
///
/// Returns the readings and, if the walk stopped early, the 1-based ply at
/// which no clock could be decoded.
pub fn decode_readings<'a, I>(comments: I, first_mover: Color) -> (Readings, Option<u32>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut readings = Readings::new();
    for (idx, comment) in comments.into_iter().enumerate() {
        let ply = idx as u32 + 1;
        match parse_clock(comment) {
            Ok(remaining) => readings.push(ClockReading {
                ply,
                side: mover_of(idx, first_mover),
                remaining,
            }),
            Err(_) => return (readings, Some(ply)),
        }
    }
    (readings, None)
}

/// Walk the comments of a game's plies and derive both sides' think times.
pub fn reconstruct<'a, I>(comments: I, time_control: TimeControl, first_mover: Color) -> ClockSeries
where
    I: IntoIterator<Item = &'a str>,
{
    let (readings, stopped_at) = decode_readings(comments, first_mover);

    let increment = i64::from(time_control.increment_tenths());
    let mut white_remaining = time_control.base_tenths();
    let mut black_remaining = time_control.base_tenths();
    let mut series = ClockSeries {
        stopped_at,
        ..Default::default()
    };

    for reading in &readings {
        let (own, other) = match reading.side {
            Color::White => (&mut white_remaining, black_remaining),
            Color::Black => (&mut black_remaining, white_remaining),
        };

        let delta = i64::from(*own) - i64::from(reading.remaining) + increment;
        let clamped = delta < 0;
        if clamped {
            series.anomalies += 1;
        }
        *own = reading.remaining;

        let think = ThinkTime {
            ply: reading.ply,
            tenths: u32::try_from(delta.max(0)).unwrap_or(u32::MAX),
            remaining: reading.remaining,
            opponent_remaining: other,
            clamped,
        };
        match reading.side {
            Color::White => series.white.push(think),
            Color::Black => series.black.push(think),
        }
    }

    series.readings = readings;
    series
}

/// Think times of one game split by the subject's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkTimes {
    pub subject_color: Color,
    pub time_control: TimeControl,
    pub series: ClockSeries,
}

impl ThinkTimes {
    pub fn subject(&self) -> &[ThinkTime] {
        self.series.side(self.subject_color)
    }

    pub fn opponent(&self) -> &[ThinkTime] {
        self.series.side(self.subject_color.other())
    }

    /// The walk hit a ply without a clock before the end of the game.
    pub fn missing_clock(&self) -> Option<AnalysisError> {
        self.series
            .stopped_at
            .map(|ply| AnalysisError::MissingClockAnnotation { ply })
    }
}

pub fn think_times(game: &GameRecord, subject: &str) -> Result<ThinkTimes, AnalysisError> {
    let subject_color = game
        .color_of(subject)
        .ok_or_else(|| AnalysisError::NotAParticipant(subject.to_string()))?;

    let raw = game
        .time_control
        .as_deref()
        .ok_or_else(|| AnalysisError::MalformedTimeControl(String::new()))?;
    let time_control: TimeControl = raw.parse()?;

    let series = reconstruct(
        game.plies.iter().map(|ply| ply.comment.as_str()),
        time_control,
        game.first_to_move(),
    );

    Ok(ThinkTimes {
        subject_color,
        time_control,
        series,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::format_clock;
    use crate::types::Ply;

    fn clk(tenths: u32) -> String {
        format!("[%clk {}]", format_clock(tenths))
    }

    fn comments(values: &[u32]) -> Vec<String> {
        values.iter().map(|v| clk(*v)).collect()
    }

    fn game_with_clocks(time_control: &str, values: &[u32]) -> GameRecord {
        GameRecord {
            white: Some("subject".to_string()),
            black: Some("opponent".to_string()),
            time_control: Some(time_control.to_string()),
            plies: values
                .iter()
                .map(|v| Ply {
                    san: "e4".to_string(),
                    comment: clk(*v),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_blitz_trace_attributes_plies_to_each_side() {
        let game = game_with_clocks("180", &[1800, 1790, 1750, 1745]);
        let times = think_times(&game, "subject").unwrap();

        let subject: Vec<u32> = times.subject().iter().map(|t| t.tenths).collect();
        let opponent: Vec<u32> = times.opponent().iter().map(|t| t.tenths).collect();
        assert_eq!(subject, vec![0, 50]);
        assert_eq!(opponent, vec![10, 45]);
        assert_eq!(times.subject()[1].ply, 3);
        assert_eq!(times.subject()[1].opponent_remaining, 1790);
    }

    #[test]
    fn test_subject_as_black_gets_even_plies() {
        let mut game = game_with_clocks("180", &[1800, 1790, 1750, 1745]);
        game.white = Some("opponent".to_string());
        game.black = Some("Subject".to_string());

        let times = think_times(&game, "subject").unwrap();
        assert_eq!(times.subject_color, Color::Black);
        let plies: Vec<u32> = times.subject().iter().map(|t| t.ply).collect();
        assert_eq!(plies, vec![2, 4]);
    }

    #[test]
    fn test_increment_is_credited() {
        // 3+2: White spends 3.0s and gets 2.0s back.
        let series = reconstruct(
            comments(&[1790, 1800, 1760]).iter().map(String::as_str),
            TimeControl::new(180, 2),
            Color::White,
        );
        let white: Vec<u32> = series.white.iter().map(|t| t.tenths).collect();
        assert_eq!(white, vec![30, 50]);
        assert_eq!(series.black[0].tenths, 20);
        assert_eq!(series.anomalies, 0);
    }

    #[test]
    fn test_think_times_are_additive() {
        let tc = TimeControl::new(60, 1);
        let values = [600, 605, 580, 590, 531, 522, 470, 400, 461, 350];
        let series = reconstruct(
            comments(&values).iter().map(String::as_str),
            tc,
            Color::White,
        );
        assert_eq!(series.anomalies, 0);

        for color in [Color::White, Color::Black] {
            let moves = series.side(color);
            let spent: u32 = moves.iter().map(|t| t.tenths).sum();
            let earned = moves.len() as u32 * tc.increment_tenths();
            let left = series.final_remaining(color).unwrap();
            assert_eq!(spent + left, tc.base_tenths() + earned, "{color:?}");
        }
    }

    #[test]
    fn test_clock_going_backwards_is_clamped_and_counted() {
        let series = reconstruct(
            comments(&[600, 600, 650]).iter().map(String::as_str),
            TimeControl::new(60, 0),
            Color::White,
        );
        assert_eq!(series.white[1].tenths, 0);
        assert!(series.white[1].clamped);
        assert!(!series.white[0].clamped);
        assert_eq!(series.anomalies, 1);
    }

    #[test]
    fn test_missing_clock_stops_the_walk() {
        let mut values = comments(&[600, 590]);
        values.push("no clock here".to_string());
        values.push(clk(500));

        let series = reconstruct(
            values.iter().map(String::as_str),
            TimeControl::new(60, 0),
            Color::White,
        );
        assert_eq!(series.readings.len(), 2);
        assert_eq!(series.stopped_at, Some(3));
        assert_eq!(series.white.len(), 1);
        assert_eq!(series.black.len(), 1);
    }

    #[test]
    fn test_game_without_clocks_yields_empty_series() {
        let mut game = game_with_clocks("60", &[]);
        game.plies = vec![Ply {
            san: "e4".to_string(),
            comment: String::new(),
        }];

        let times = think_times(&game, "subject").unwrap();
        assert!(times.subject().is_empty());
        assert!(times.series.is_empty());
        assert_eq!(
            times.missing_clock(),
            Some(AnalysisError::MissingClockAnnotation { ply: 1 })
        );
    }

    #[test]
    fn test_black_to_move_fen_shifts_attribution() {
        let series = reconstruct(
            comments(&[590, 580]).iter().map(String::as_str),
            TimeControl::new(60, 0),
            Color::Black,
        );
        assert_eq!(series.black[0].ply, 1);
        assert_eq!(series.white[0].ply, 2);
    }

    #[test]
    fn test_malformed_time_control_is_reported() {
        let game = game_with_clocks("1/259200", &[600]);
        assert_eq!(
            think_times(&game, "subject"),
            Err(AnalysisError::MalformedTimeControl("1/259200".to_string()))
        );

        let mut game = game_with_clocks("60", &[600]);
        game.time_control = None;
        assert!(matches!(
            think_times(&game, "subject"),
            Err(AnalysisError::MalformedTimeControl(_))
        ));
    }

    #[test]
    fn test_unknown_subject_is_rejected() {
        let game = game_with_clocks("60", &[600]);
        assert_eq!(
            think_times(&game, "stranger"),
            Err(AnalysisError::NotAParticipant("stranger".to_string()))
        );
    }

    #[test]
    fn test_premove_detection() {
        let series = reconstruct(
            comments(&[599, 600, 590]).iter().map(String::as_str),
            TimeControl::new(60, 0),
            Color::White,
        );
        assert!(series.white[0].is_premove());
        assert!(!series.white[1].is_premove());
    }
}
