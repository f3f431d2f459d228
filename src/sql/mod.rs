mod clockstats;
mod scalar;
mod string;

pub use clockstats::{
    ChessClocksScalar, ChessThinkTimesScalar, ChessTimeScrambleScalar, clocks_json,
    movetext_time_scramble, think_times_json,
};
