use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use shakmaty::fen::Fen;
use shakmaty::{Board, Color};

/// One half-move of the mainline with the comment text that followed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ply {
    pub san: String,
    /// Raw comment body (without braces); several comments are joined by a space.
    pub comment: String,
}

/// Parsed game as consumed by the analytics driver.
#[derive(Debug, Clone, Default)]
pub struct GameRecord {
    pub event: Option<String>,
    pub site: Option<String>,
    pub link: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>,
    pub white_elo: Option<u32>,
    pub black_elo: Option<u32>,

    pub utc_date: Option<NaiveDate>,
    pub utc_time: Option<NaiveTime>,

    pub time_control: Option<String>,
    pub termination: Option<String>,
    pub fen: Option<String>,
    pub variant: Option<String>,

    pub plies: Vec<Ply>,
    /// Mainline movetext including `{ ... }` comments, without the result marker.
    pub movetext: String,

    /// `None` for clean games, otherwise `; `-joined diagnostics.
    pub parse_error: Option<String>,
}

impl GameRecord {
    pub fn played_at(&self) -> Option<NaiveDateTime> {
        let date = self.utc_date?;
        Some(date.and_time(self.utc_time.unwrap_or_default()))
    }

    /// chess.com games carry the game URL in `Link`; lichess puts it in `Site`.
    pub fn game_url(&self) -> Option<&str> {
        self.link.as_deref().or(self.site.as_deref())
    }

    /// Colour to move before the first ply, taken from the `FEN` tag when present.
    pub fn first_to_move(&self) -> Color {
        self.fen
            .as_deref()
            .and_then(|fen| fen.parse::<Fen>().ok())
            .map(|fen| fen.as_setup().turn)
            .unwrap_or(Color::White)
    }

    /// Standard chess from the standard starting position.
    pub fn is_standard_chess(&self) -> bool {
        let standard_variant = self.variant.as_deref().is_none_or(|v| {
            v.eq_ignore_ascii_case("standard") || v.eq_ignore_ascii_case("chess")
        });
        if !standard_variant {
            return false;
        }

        match self.fen.as_deref() {
            None => true,
            Some(raw) => raw
                .parse::<Fen>()
                .map(|fen| fen.as_setup().board == Board::new())
                .unwrap_or(false),
        }
    }

    /// Username comparison is case-insensitive, as on chess.com.
    pub fn color_of(&self, username: &str) -> Option<Color> {
        let matches = |name: &Option<String>| {
            name.as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(username))
        };

        if matches(&self.white) {
            Some(Color::White)
        } else if matches(&self.black) {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn elo(&self, color: Color) -> Option<u32> {
        match color {
            Color::White => self.white_elo,
            Color::Black => self.black_elo,
        }
    }

    /// Absolute rating difference, when both ratings are known.
    pub fn rating_gap(&self) -> Option<u32> {
        Some(self.white_elo?.abs_diff(self.black_elo?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_to_move_defaults_to_white() {
        let game = GameRecord::default();
        assert_eq!(game.first_to_move(), Color::White);
    }

    #[test]
    fn test_first_to_move_reads_fen_turn() {
        let game = GameRecord {
            fen: Some("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1".to_string()),
            ..Default::default()
        };
        assert_eq!(game.first_to_move(), Color::Black);
    }

    #[test]
    fn test_standard_chess_detection() {
        let mut game = GameRecord::default();
        assert!(game.is_standard_chess());

        game.fen = Some("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1".to_string());
        assert!(game.is_standard_chess());

        game.fen = Some("bbrknnqr/pppppppp/8/8/8/8/PPPPPPPP/BBRKNNQR w KQkq - 0 1".to_string());
        assert!(!game.is_standard_chess());

        game.fen = None;
        game.variant = Some("Chess960".to_string());
        assert!(!game.is_standard_chess());
    }

    #[test]
    fn test_color_of_is_case_insensitive() {
        let game = GameRecord {
            white: Some("Hikaru".to_string()),
            black: Some("DanielNaroditsky".to_string()),
            ..Default::default()
        };
        assert_eq!(game.color_of("hikaru"), Some(Color::White));
        assert_eq!(game.color_of("danielnaroditsky"), Some(Color::Black));
        assert_eq!(game.color_of("someone"), None);
    }

    #[test]
    fn test_rating_gap_requires_both_ratings() {
        let mut game = GameRecord {
            white_elo: Some(2900),
            ..Default::default()
        };
        assert_eq!(game.rating_gap(), None);
        game.black_elo = Some(2450);
        assert_eq!(game.rating_gap(), Some(450));
    }

    #[test]
    fn test_played_at_defaults_time_to_midnight() {
        let game = GameRecord {
            utc_date: NaiveDate::from_ymd_opt(2021, 3, 14),
            ..Default::default()
        };
        let at = game.played_at().unwrap();
        assert_eq!(at.time(), NaiveTime::default());
    }
}
