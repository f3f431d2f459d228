//! Engine-score bins.
//!
//! Positional evaluation itself is delegated to a [`PositionEvaluator`]
//! supplied by the caller (typically a UCI engine wrapper). This module only
//! replays the mainline to the position of interest and classifies the
//! returned score into half-open bins.

use std::error::Error;
use std::fmt;

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, Color, Position};

use crate::types::GameRecord;

const MATE_SCORE: i64 = 1_000_000;
const CP_LIMIT: i64 = 500_000;

/// Engine score from some side's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawns.
    Cp(i32),
    /// Mate in `n` moves; negative when being mated, `Mate(0)` when already mated.
    Mate(i32),
    /// The side has delivered mate.
    MateGiven,
}

impl Score {
    /// Total order: mated < mated-in-n < centipawns < mate-in-n < mate given.
    pub fn sort_key(&self) -> i64 {
        match *self {
            Self::Cp(cp) => i64::from(cp).clamp(-CP_LIMIT, CP_LIMIT),
            Self::Mate(0) => -MATE_SCORE,
            Self::Mate(n) if n < 0 => -MATE_SCORE - i64::from(n),
            Self::Mate(n) => MATE_SCORE - i64::from(n),
            Self::MateGiven => MATE_SCORE,
        }
    }

    /// Same score seen from the other side.
    pub fn flip(self) -> Self {
        match self {
            Self::Cp(cp) => Self::Cp(cp.saturating_neg()),
            Self::Mate(0) => Self::MateGiven,
            Self::Mate(n) => Self::Mate(-n),
            Self::MateGiven => Self::Mate(0),
        }
    }

    /// Convert a White-relative score to `color`'s point of view.
    pub fn for_color(self, color: Color) -> Self {
        match color {
            Color::White => self,
            Color::Black => self.flip(),
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cp(cp) => write!(f, "{cp:+}"),
            Self::Mate(0) => write!(f, "mated"),
            Self::Mate(n) => write!(f, "#{n:+}"),
            Self::MateGiven => write!(f, "mate"),
        }
    }
}

const EVAL_EDGES: [Score; 11] = [
    Score::Mate(0),
    Score::Mate(-99),
    Score::Cp(-500),
    Score::Cp(-300),
    Score::Cp(-100),
    Score::Cp(0),
    Score::Cp(100),
    Score::Cp(300),
    Score::Cp(500),
    Score::Mate(99),
    Score::MateGiven,
];

/// Index of a half-open `[lo, hi)` interval between consecutive edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EvalBin(u8);

impl EvalBin {
    pub fn classify(score: Score) -> Option<Self> {
        let key = score.sort_key();
        EVAL_EDGES
            .windows(2)
            .position(|pair| pair[0].sort_key() <= key && key < pair[1].sort_key())
            .map(|idx| Self(idx as u8))
    }

    pub fn bounds(&self) -> (Score, Score) {
        let idx = self.0 as usize;
        (EVAL_EDGES[idx], EVAL_EDGES[idx + 1])
    }

    pub fn all() -> impl Iterator<Item = EvalBin> {
        (0..EVAL_EDGES.len() as u8 - 1).map(EvalBin)
    }
}

impl fmt::Display for EvalBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lo, hi) = self.bounds();
        write!(f, "[{lo}, {hi})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    GameTooShort { plies: usize, wanted: usize },
    InvalidFen(String),
    IllegalSan { ply: usize, san: String },
    Oracle(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GameTooShort { plies, wanted } => {
                write!(f, "game has {plies} plies, {wanted} needed")
            }
            Self::InvalidFen(fen) => write!(f, "invalid FEN '{fen}'"),
            Self::IllegalSan { ply, san } => write!(f, "illegal move '{san}' at ply {ply}"),
            Self::Oracle(msg) => write!(f, "evaluator failed: {msg}"),
        }
    }
}

impl Error for EvalError {}

/// External scoring oracle. Scores are reported from White's point of view.
pub trait PositionEvaluator {
    fn evaluate(&mut self, position: &Chess) -> Result<Score, Box<dyn Error + Send + Sync>>;
}

fn starting_position(game: &GameRecord) -> Result<Chess, EvalError> {
    let Some(raw) = game.fen.as_deref() else {
        return Ok(Chess::default());
    };
    let invalid = || EvalError::InvalidFen(raw.to_string());
    let fen: Fen = raw.parse().map_err(|_| invalid())?;
    fen.into_position(CastlingMode::Standard)
        .map_err(|_| invalid())
}

/// Position after the first `ply` half-moves of the mainline.
pub fn position_at_ply(game: &GameRecord, ply: usize) -> Result<Chess, EvalError> {
    if game.plies.len() < ply {
        return Err(EvalError::GameTooShort {
            plies: game.plies.len(),
            wanted: ply,
        });
    }

    let mut pos = starting_position(game)?;
    for (idx, p) in game.plies.iter().take(ply).enumerate() {
        let illegal = || EvalError::IllegalSan {
            ply: idx + 1,
            san: p.san.clone(),
        };
        let san: SanPlus = p.san.parse().map_err(|_| illegal())?;
        let m = san.san.to_move(&pos).map_err(|_| illegal())?;
        pos.play_unchecked(m);
    }
    Ok(pos)
}

/// Evaluate the position after `ply` half-moves from `subject`'s point of view.
pub fn subject_eval(
    evaluator: &mut dyn PositionEvaluator,
    game: &GameRecord,
    ply: usize,
    subject: Color,
) -> Result<Score, EvalError> {
    let pos = position_at_ply(game, ply)?;
    let white_pov = evaluator
        .evaluate(&pos)
        .map_err(|e| EvalError::Oracle(e.to_string()))?;
    Ok(white_pov.for_color(subject))
}
