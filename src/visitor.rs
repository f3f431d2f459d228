use crate::annotate::render_movetext;
use crate::error::ErrorAccumulator;
use crate::types::{GameRecord, Ply};

use chrono::{NaiveDate, NaiveTime};
use pgn_reader::{Outcome, RawComment, RawTag, Reader, SanPlus, Skip, Visitor};
use std::collections::BTreeMap;
use std::io::Read;
use std::mem;
use std::ops::ControlFlow;

/// Streaming PGN visitor (pgn-reader).
///
/// Collects the mainline as [`Ply`] values, keeping each ply's comment text
/// so `%clk` annotations can be decoded later, and rebuilds a normalized
/// movetext string alongside. Variations are skipped.
pub struct GameVisitor {
    headers: HeaderFields,
    plies: Vec<Ply>,
    result_marker: Option<String>,
    parse_error: ErrorAccumulator,
    pub current_game: Option<GameRecord>,
}

#[derive(Default)]
struct HeaderFields {
    event: String,
    site: String,
    link: String,
    white: String,
    black: String,
    result: String,
    white_elo: String,
    black_elo: String,
    utc_date: String,
    date: String,
    utc_time: String,
    time_control: String,
    termination: String,
    fen: String,
    variant: String,
}

impl HeaderFields {
    fn clear(&mut self) {
        *self = Self::default();
    }

    fn opt_take(field: &mut String) -> Option<String> {
        if field.is_empty() {
            None
        } else {
            Some(mem::take(field))
        }
    }

    fn set_known_tag(&mut self, key: &[u8], value: RawTag<'_>) {
        let slot: &mut String = match key {
            b"Event" => &mut self.event,
            b"Site" => &mut self.site,
            b"Link" => &mut self.link,
            b"White" => &mut self.white,
            b"Black" => &mut self.black,
            b"Result" => &mut self.result,
            b"WhiteElo" => &mut self.white_elo,
            b"BlackElo" => &mut self.black_elo,
            b"UTCDate" => &mut self.utc_date,
            b"Date" => &mut self.date,
            b"UTCTime" => &mut self.utc_time,
            b"TimeControl" => &mut self.time_control,
            b"Termination" => &mut self.termination,
            b"FEN" => &mut self.fen,
            b"Variant" => &mut self.variant,
            _ => return,
        };

        // First occurrence wins.
        if !slot.is_empty() {
            return;
        }

        let bytes = value.as_bytes();
        if bytes.is_empty() {
            return;
        }

        *slot = String::from_utf8_lossy(bytes).into_owned();
    }
}

impl GameVisitor {
    pub fn new() -> Self {
        Self {
            headers: HeaderFields::default(),
            plies: Vec::new(),
            result_marker: None,
            parse_error: ErrorAccumulator::default(),
            current_game: None,
        }
    }

    fn parse_date_field(
        raw: &str,
        label: &str,
        parse_error: &mut ErrorAccumulator,
    ) -> Option<NaiveDate> {
        let s = raw.trim();
        // `????.??.??` is a legal "unknown" placeholder.
        if s.is_empty() || s.starts_with('?') {
            return None;
        }

        let norm = s.replace('.', "-");
        match NaiveDate::parse_from_str(&norm, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(e) => {
                parse_error.push(&format!("Conversion error: {label}='{s}' (chrono: {e})"));
                None
            }
        }
    }

    fn parse_time_field(
        raw: &str,
        label: &str,
        parse_error: &mut ErrorAccumulator,
    ) -> Option<NaiveTime> {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('?') {
            return None;
        }

        match NaiveTime::parse_from_str(s, "%H:%M:%S") {
            Ok(time) => Some(time),
            Err(e) => {
                parse_error.push(&format!("Conversion error: {label}='{s}' (chrono: {e})"));
                None
            }
        }
    }

    fn parse_uinteger_field(
        raw: &str,
        label: &str,
        parse_error: &mut ErrorAccumulator,
    ) -> Option<u32> {
        let s = raw.trim();
        if s.is_empty() || s == "?" {
            return None;
        }
        match s.parse::<u32>() {
            Ok(v) => Some(v),
            Err(_) => {
                parse_error.push(&format!("Conversion error: {label}='{s}'"));
                None
            }
        }
    }

    fn build_game_record(&mut self) {
        let white_elo =
            Self::parse_uinteger_field(&self.headers.white_elo, "WhiteElo", &mut self.parse_error);
        let black_elo =
            Self::parse_uinteger_field(&self.headers.black_elo, "BlackElo", &mut self.parse_error);

        let utc_date = if self.headers.utc_date.is_empty() {
            Self::parse_date_field(&self.headers.date, "UTCDate (from Date)", &mut self.parse_error)
        } else {
            Self::parse_date_field(&self.headers.utc_date, "UTCDate", &mut self.parse_error)
        };
        let utc_time =
            Self::parse_time_field(&self.headers.utc_time, "UTCTime", &mut self.parse_error);

        let plies = mem::take(&mut self.plies);

        let mut game = GameRecord {
            event: HeaderFields::opt_take(&mut self.headers.event),
            site: HeaderFields::opt_take(&mut self.headers.site),
            link: HeaderFields::opt_take(&mut self.headers.link),
            white: HeaderFields::opt_take(&mut self.headers.white),
            black: HeaderFields::opt_take(&mut self.headers.black),
            result: HeaderFields::opt_take(&mut self.headers.result)
                .or_else(|| self.result_marker.take()),
            white_elo,
            black_elo,
            utc_date,
            utc_time,
            time_control: HeaderFields::opt_take(&mut self.headers.time_control),
            termination: HeaderFields::opt_take(&mut self.headers.termination),
            fen: HeaderFields::opt_take(&mut self.headers.fen),
            variant: HeaderFields::opt_take(&mut self.headers.variant),
            plies,
            movetext: String::new(),
            parse_error: self.parse_error.take(),
        };
        game.movetext = render_movetext(&game.plies, game.first_to_move(), &BTreeMap::new());
        self.current_game = Some(game);
    }

    pub fn finalize_game_with_error(&mut self, error_msg: String) {
        self.parse_error.push(&error_msg);
        self.build_game_record();
    }
}

impl Default for GameVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Visitor for GameVisitor {
    type Tags = ();
    type Movetext = ();
    type Output = ();

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        self.headers.clear();
        self.plies.clear();
        self.result_marker = None;
        self.parse_error = ErrorAccumulator::default();
        self.current_game = None;
        ControlFlow::Continue(())
    }

    fn tag(
        &mut self,
        _: &mut Self::Tags,
        key: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        self.headers.set_known_tag(key, value);
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, _: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(())
    }

    fn begin_variation(&mut self, _: &mut Self::Movetext) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn san(&mut self, _: &mut Self::Movetext, san: SanPlus) -> ControlFlow<Self::Output> {
        self.plies.push(Ply {
            san: san.to_string(),
            comment: String::new(),
        });
        ControlFlow::Continue(())
    }

    fn comment(
        &mut self,
        _: &mut Self::Movetext,
        comment: RawComment<'_>,
    ) -> ControlFlow<Self::Output> {
        // Comments before the first move (game links, openings) belong to no ply.
        let Some(ply) = self.plies.last_mut() else {
            return ControlFlow::Continue(());
        };

        let text = String::from_utf8_lossy(comment.as_bytes());
        let text = text.trim();
        if text.is_empty() {
            return ControlFlow::Continue(());
        }
        if !ply.comment.is_empty() {
            ply.comment.push(' ');
        }
        ply.comment.push_str(text);
        ControlFlow::Continue(())
    }

    fn outcome(&mut self, _: &mut Self::Movetext, outcome: Outcome) -> ControlFlow<Self::Output> {
        self.result_marker = Some(outcome.to_string());
        ControlFlow::Continue(())
    }

    fn end_game(&mut self, _: Self::Movetext) -> Self::Output {
        self.build_game_record();
    }
}

/// Parse every game in a PGN stream. A syntax error in one game is recorded
/// in that game's `parse_error` and does not stop the stream.
pub fn read_pgn_stream<R: Read>(input: R, source: &str) -> Vec<GameRecord> {
    let mut reader = Reader::new(input);
    let mut visitor = GameVisitor::new();
    let mut games = Vec::new();
    let mut game_index = 1usize;
    let mut failed_last = false;

    loop {
        match reader.read_game(&mut visitor) {
            Ok(Some(())) => {
                failed_last = false;
                if let Some(game) = visitor.current_game.take() {
                    games.push(game);
                }
            }
            Ok(None) => break,
            // An error straight after another means the input itself is unreadable.
            Err(error) if failed_last => {
                crate::log::error(format!("Giving up on '{source}': {error}"));
                break;
            }
            Err(error) => {
                failed_last = true;
                let error_msg = format!(
                    "Parser-stage error: source='{source}'; game_index={game_index}; error={error}"
                );
                crate::log::warn(&error_msg);
                visitor.finalize_game_with_error(error_msg);
                match visitor.current_game.take() {
                    Some(game) => games.push(game),
                    None => break,
                }
            }
        }
        game_index += 1;
    }

    games
}

pub fn parse_games(pgn: &str) -> Vec<GameRecord> {
    read_pgn_stream(pgn.as_bytes(), "<memory>")
}

/// Mainline plies of a bare movetext string (no tag section required).
pub fn parse_movetext_plies(movetext: &str) -> Vec<Ply> {
    if movetext.trim().is_empty() {
        return Vec::new();
    }

    let mut reader = Reader::new(movetext.as_bytes());
    let mut visitor = GameVisitor::new();
    match reader.read_game(&mut visitor) {
        Ok(Some(())) => visitor
            .current_game
            .take()
            .map(|game| game.plies)
            .unwrap_or_default(),
        Ok(None) | Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visitor_basic_parsing() {
        let pgn = r#"[Event "Live Chess"]
[Site "Chess.com"]
[White "alice"]
[Black "bob"]
[Result "1-0"]
[WhiteElo "1500"]
[BlackElo "1480"]
[TimeControl "180"]
[Link "https://www.chess.com/game/live/1"]
1. e4 {[%clk 0:02:59.9]} 1... e5 {[%clk 0:02:58.3]} 2. Nf3 {[%clk 0:02:57]} 1-0"#;

        let games = parse_games(pgn);
        assert_eq!(games.len(), 1);
        let game = &games[0];
        assert_eq!(game.white.as_deref(), Some("alice"));
        assert_eq!(game.black.as_deref(), Some("bob"));
        assert_eq!(game.result.as_deref(), Some("1-0"));
        assert_eq!(game.white_elo, Some(1500));
        assert_eq!(game.black_elo, Some(1480));
        assert_eq!(game.time_control.as_deref(), Some("180"));
        assert_eq!(game.game_url(), Some("https://www.chess.com/game/live/1"));
        assert_eq!(game.plies.len(), 3);
        assert_eq!(game.plies[0].san, "e4");
        assert_eq!(game.plies[0].comment, "[%clk 0:02:59.9]");
        assert_eq!(game.plies[2].comment, "[%clk 0:02:57]");
        assert!(game.parse_error.is_none());
    }

    #[test]
    fn test_visitor_movetext_rebuild() {
        let pgn = r#"[Event "Comment Test"]
1. e4 { [%clk 0:00:59.8] } e5 { [%clk 0:00:59.1] } 2. Nf3 1-0"#;

        let games = parse_games(pgn);
        assert_eq!(
            games[0].movetext,
            "1. e4 { [%clk 0:00:59.8] } e5 { [%clk 0:00:59.1] } 2. Nf3"
        );
    }

    #[test]
    fn test_visitor_skips_variations_and_leading_comments() {
        let pgn = r#"[Event "Variations"]
{ https://lichess.org/abc } 1. e4 (1. d4 { [%clk 0:09:00] }) 1... e5 { [%clk 0:02:55] } *"#;

        let games = parse_games(pgn);
        let plies = &games[0].plies;
        assert_eq!(plies.len(), 2);
        assert_eq!(plies[0].comment, "");
        assert_eq!(plies[1].comment, "[%clk 0:02:55]");
    }

    #[test]
    fn test_visitor_joins_multiple_comments_on_one_ply() {
        let plies = parse_movetext_plies("1. e4 { [%eval 0.2] } { [%clk 0:01:00] } e5");
        assert_eq!(plies[0].comment, "[%eval 0.2] [%clk 0:01:00]");
    }

    #[test]
    fn test_visitor_duplicate_headers_preserve_first_value() {
        let pgn = r#"[WhiteElo "2000"]
[WhiteElo "2500"]
1. e4 1-0"#;

        let games = parse_games(pgn);
        assert_eq!(games[0].white_elo, Some(2000));
    }

    #[test]
    fn test_visitor_bad_numeric_header_is_reported() {
        let pgn = r#"[WhiteElo "strong"]
1. e4 1-0"#;

        let games = parse_games(pgn);
        assert_eq!(games[0].white_elo, None);
        assert_eq!(
            games[0].parse_error.as_deref(),
            Some("Conversion error: WhiteElo='strong'")
        );
    }

    #[test]
    fn test_visitor_dates_and_times() {
        let pgn = r#"[Date "2021.03.14"]
[UTCDate "2021.03.15"]
[UTCTime "23:59:01"]
1. e4 *"#;

        let games = parse_games(pgn);
        assert_eq!(games[0].utc_date, NaiveDate::from_ymd_opt(2021, 3, 15));
        assert_eq!(games[0].utc_time, NaiveTime::from_hms_opt(23, 59, 1));
    }

    #[test]
    fn test_visitor_unknown_date_is_not_an_error() {
        let pgn = r#"[Date "????.??.??"]
1. e4 *"#;

        let games = parse_games(pgn);
        assert_eq!(games[0].utc_date, None);
        assert!(games[0].parse_error.is_none());
    }

    #[test]
    fn test_visitor_result_falls_back_to_outcome_marker() {
        let games = parse_games("1. e4 e5 0-1");
        assert_eq!(games[0].result.as_deref(), Some("0-1"));
    }

    #[test]
    fn test_parse_games_multiple() {
        let pgn = r#"[White "a"]
1. e4 1-0

[White "b"]
1. d4 0-1
"#;

        let games = parse_games(pgn);
        assert_eq!(games.len(), 2);
        assert_eq!(games[1].white.as_deref(), Some("b"));
        assert_eq!(games[1].plies[0].san, "d4");
    }

    #[test]
    fn test_parse_movetext_plies_empty() {
        assert!(parse_movetext_plies("   ").is_empty());
    }
}
