//! Clock-time analytics for chess games: `%clk` decoding, think-time
//! reconstruction, time-scramble detection and bucketed performance
//! statistics, with a DuckDB extension surface.

pub mod annotate;
pub mod buckets;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod eval;
pub mod filter;
pub mod log;
pub mod perf;
pub mod reader;
pub mod scramble;
pub mod sql;
pub mod think;
pub mod timecontrol;
pub mod types;
pub mod visitor;

pub use config::AnalysisConfig;
pub use driver::{AnalysisReport, Analyzer, BucketKey};
pub use error::AnalysisError;
pub use types::{GameRecord, Ply};

use duckdb::{Connection, Result};
use duckdb_ext_macros::duckdb_extension;
use std::error::Error;

use crate::sql::{ChessClocksScalar, ChessThinkTimesScalar, ChessTimeScrambleScalar};

#[duckdb_extension(name = "chess_clockstats", api_version = "v1.0.0")]
pub unsafe fn extension_entrypoint(con: Connection) -> Result<(), Box<dyn Error>> {
    con.register_scalar_function::<ChessClocksScalar>("chess_clocks")?;
    con.register_scalar_function::<ChessThinkTimesScalar>("chess_think_times")?;
    con.register_scalar_function::<ChessTimeScrambleScalar>("chess_time_scramble")?;

    Ok(())
}
