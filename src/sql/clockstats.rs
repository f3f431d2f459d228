//! SQL scalars over movetext: `chess_clocks`, `chess_think_times`,
//! `chess_time_scramble`.
//!
//! Movetext carries no `FEN` tag, so White is assumed to move first.

use duckdb::{
    Result,
    core::{DataChunkHandle, LogicalTypeHandle, LogicalTypeId},
    vscalar::{ScalarFunctionSignature, VScalar},
    vtab::arrow::WritableVector,
};
use serde_json::json;
use shakmaty::Color;
use std::error::Error;

use super::scalar::{
    VarcharOutput, invoke_binary_varchar_varchar_to_varchar,
    invoke_unary_varchar_to_bool_nullable, invoke_unary_varchar_to_varchar,
};
use crate::clock::parse_clock;
use crate::log;
use crate::scramble::ScrambleDetector;
use crate::think::{ThinkTime, decode_readings, reconstruct};
use crate::timecontrol::TimeControl;
use crate::types::Ply;
use crate::visitor::parse_movetext_plies;

fn comments(plies: &[Ply]) -> impl Iterator<Item = &str> {
    plies.iter().map(|ply| ply.comment.as_str())
}

/// JSON array with each ply's remaining clock in tenths, `null` where a ply
/// has no clock.
pub fn clocks_json(movetext: &str) -> String {
    let clocks: Vec<Option<u32>> = parse_movetext_plies(movetext)
        .iter()
        .map(|ply| parse_clock(&ply.comment).ok())
        .collect();
    json!(clocks).to_string()
}

/// Both sides' think times, or `None` when the time control is unusable.
pub fn think_times_json(movetext: &str, time_control: &str) -> Option<String> {
    let time_control: TimeControl = match time_control.parse() {
        Ok(tc) => tc,
        Err(e) => {
            log::debug(format!("chess_think_times: {e}"));
            return None;
        }
    };

    let plies = parse_movetext_plies(movetext);
    let series = reconstruct(comments(&plies), time_control, Color::White);
    let tenths = |thinks: &[ThinkTime]| thinks.iter().map(|t| t.tenths).collect::<Vec<_>>();

    Some(
        json!({
            "white": tenths(&series.white),
            "black": tenths(&series.black),
            "anomalies": series.anomalies,
            "stopped_at": series.stopped_at,
        })
        .to_string(),
    )
}

pub fn movetext_time_scramble(movetext: &str) -> bool {
    let plies = parse_movetext_plies(movetext);
    let (readings, _) = decode_readings(comments(&plies), Color::White);
    ScrambleDetector::default().was_time_scramble(&readings)
}

pub struct ChessClocksScalar;

impl VScalar for ChessClocksScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_unary_varchar_to_varchar(input, output, |movetext| {
            Ok(VarcharOutput::Value(clocks_json(movetext)))
        })
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)],
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )]
    }
}

pub struct ChessThinkTimesScalar;

impl VScalar for ChessThinkTimesScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_binary_varchar_varchar_to_varchar(input, output, |movetext, time_control| {
            Ok(think_times_json(movetext, time_control).into())
        })
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![
                LogicalTypeHandle::from(LogicalTypeId::Varchar),
                LogicalTypeHandle::from(LogicalTypeId::Varchar),
            ],
            LogicalTypeHandle::from(LogicalTypeId::Varchar),
        )]
    }
}

pub struct ChessTimeScrambleScalar;

impl VScalar for ChessTimeScrambleScalar {
    type State = ();

    unsafe fn invoke(
        _state: &Self::State,
        input: &mut DataChunkHandle,
        output: &mut dyn WritableVector,
    ) -> Result<(), Box<dyn Error>> {
        invoke_unary_varchar_to_bool_nullable(input, output, movetext_time_scramble)
    }

    fn signatures() -> Vec<ScalarFunctionSignature> {
        vec![ScalarFunctionSignature::exact(
            vec![LogicalTypeHandle::from(LogicalTypeId::Varchar)],
            LogicalTypeHandle::from(LogicalTypeId::Boolean),
        )]
    }
}
