use std::error::Error;
use std::fmt;

use crate::timecontrol::TimeControlError;

/// Per-game failure while deriving statistics. None of these abort a run:
/// the driver counts them and moves on to the next game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    /// Ply (1-based) whose comment carries no usable `%clk` marker.
    MissingClockAnnotation { ply: u32 },
    UnrecognizedResult(String),
    MalformedTimeControl(String),
    MissingRating,
    NotAParticipant(String),
}

impl AnalysisError {
    /// Short stable name, used as a counter label in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingClockAnnotation { .. } => "missing_clock_annotation",
            Self::UnrecognizedResult(_) => "unrecognized_result",
            Self::MalformedTimeControl(_) => "malformed_time_control",
            Self::MissingRating => "missing_rating",
            Self::NotAParticipant(_) => "not_a_participant",
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingClockAnnotation { ply } => {
                write!(f, "missing clock annotation at ply {ply}")
            }
            Self::UnrecognizedResult(raw) => write!(f, "unrecognized result '{raw}'"),
            Self::MalformedTimeControl(raw) => write!(f, "malformed time control '{raw}'"),
            Self::MissingRating => write!(f, "missing opponent rating"),
            Self::NotAParticipant(user) => write!(f, "'{user}' did not play this game"),
        }
    }
}

impl Error for AnalysisError {}

impl From<TimeControlError> for AnalysisError {
    fn from(e: TimeControlError) -> Self {
        Self::MalformedTimeControl(e.raw)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator(Option<String>);

impl ErrorAccumulator {
    pub fn push(&mut self, msg: &str) {
        match &mut self.0 {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(msg);
            }
            None => {
                self.0 = Some(msg.to_string());
            }
        }
    }

    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_multiple_messages_uses_separator() {
        let mut accumulator = ErrorAccumulator::default();
        accumulator.push("first");
        accumulator.push("second");

        assert_eq!(accumulator.take().as_deref(), Some("first; second"));
    }

    #[test]
    fn test_take_consumes_accumulator() {
        let mut accumulator = ErrorAccumulator::default();
        accumulator.push("error");

        assert_eq!(accumulator.take().as_deref(), Some("error"));
        assert!(accumulator.is_empty());
        assert!(accumulator.take().is_none());
    }

    #[test]
    fn test_analysis_error_kinds_are_distinct() {
        let errors = [
            AnalysisError::MissingClockAnnotation { ply: 3 },
            AnalysisError::UnrecognizedResult("*".to_string()),
            AnalysisError::MalformedTimeControl("-".to_string()),
            AnalysisError::MissingRating,
            AnalysisError::NotAParticipant("nobody".to_string()),
        ];
        let mut kinds: Vec<_> = errors.iter().map(AnalysisError::kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_analysis_error_display() {
        let err = AnalysisError::MissingClockAnnotation { ply: 7 };
        assert_eq!(err.to_string(), "missing clock annotation at ply 7");

        let err = AnalysisError::UnrecognizedResult("*".to_string());
        assert_eq!(err.to_string(), "unrecognized result '*'");
    }

    #[test]
    fn test_time_control_error_converts_to_malformed() {
        let err: AnalysisError = TimeControlError {
            raw: "1/259200".to_string(),
            message: "daily".to_string(),
        }
        .into();
        assert_eq!(
            err,
            AnalysisError::MalformedTimeControl("1/259200".to_string())
        );
    }
}
