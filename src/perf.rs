use std::fmt;
use std::str::FromStr;

use shakmaty::Color;

use crate::error::AnalysisError;
use crate::types::GameRecord;

/// Rating swing credited for a decisive result.
pub const DECISIVE_SWING: i32 = 400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameResult {
    WhiteWins,
    BlackWins,
    Draw,
}

impl FromStr for GameResult {
    type Err = AnalysisError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "1-0" => Ok(Self::WhiteWins),
            "0-1" => Ok(Self::BlackWins),
            "1/2-1/2" => Ok(Self::Draw),
            other => Err(AnalysisError::UnrecognizedResult(other.to_string())),
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WhiteWins => "1-0",
            Self::BlackWins => "0-1",
            Self::Draw => "1/2-1/2",
        })
    }
}

impl GameResult {
    pub fn winner(&self) -> Option<Color> {
        match self {
            Self::WhiteWins => Some(Color::White),
            Self::BlackWins => Some(Color::Black),
            Self::Draw => None,
        }
    }
}

/// Single-game performance: the opponent's rating, ±400 for a win or loss.
pub fn performance(result: GameResult, opp_rating: u32, subject: Color) -> i32 {
    let opp_rating = i32::try_from(opp_rating).unwrap_or(i32::MAX);
    match result.winner() {
        None => opp_rating,
        Some(winner) if winner == subject => opp_rating.saturating_add(DECISIVE_SWING),
        Some(_) => opp_rating.saturating_sub(DECISIVE_SWING),
    }
}

pub fn game_performance(game: &GameRecord, subject: &str) -> Result<i32, AnalysisError> {
    let color = game
        .color_of(subject)
        .ok_or_else(|| AnalysisError::NotAParticipant(subject.to_string()))?;
    let result: GameResult = game.result.as_deref().unwrap_or("").parse()?;
    let opp_rating = game
        .elo(color.other())
        .ok_or(AnalysisError::MissingRating)?;

    Ok(performance(result, opp_rating, color))
}
