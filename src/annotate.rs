//! Movetext rendering and long-think annotation.

use std::collections::BTreeMap;
use std::fmt::Write;

use shakmaty::Color;

use crate::clock::format_duration;
use crate::think::ThinkTime;
use crate::types::{GameRecord, Ply};

/// Render plies as numbered movetext. `notes` maps 1-based plies to extra
/// text appended inside that ply's comment.
pub fn render_movetext(plies: &[Ply], first_mover: Color, notes: &BTreeMap<u32, String>) -> String {
    let offset = usize::from(first_mover == Color::Black);
    let mut movetext = String::with_capacity(plies.len() * 24);

    for (idx, ply) in plies.iter().enumerate() {
        if !movetext.is_empty() {
            movetext.push(' ');
        }
        let n = idx + offset;
        if n % 2 == 0 {
            let _ = write!(movetext, "{}. ", n / 2 + 1);
        } else if idx == 0 {
            movetext.push_str("1... ");
        }
        movetext.push_str(&ply.san);

        let note = notes.get(&(idx as u32 + 1));
        match (ply.comment.is_empty(), note) {
            (true, None) => {}
            (false, None) => {
                let _ = write!(movetext, " {{ {} }}", ply.comment);
            }
            (true, Some(note)) => {
                let _ = write!(movetext, " {{ {note} }}");
            }
            (false, Some(note)) => {
                let _ = write!(movetext, " {{ {} {note} }}", ply.comment);
            }
        }
    }
    movetext
}

/// Moves that took at least `threshold` tenths.
pub fn long_thinks(thinks: &[ThinkTime], threshold: u32) -> impl Iterator<Item = &ThinkTime> {
    thinks.iter().filter(move |t| t.tenths >= threshold)
}

/// Movetext with the duration of every long think appended to its comment,
/// led by the game URL. `None` when no move reached the threshold.
pub fn annotate_long_thinks(
    game: &GameRecord,
    thinks: &[ThinkTime],
    threshold: u32,
) -> Option<String> {
    let notes: BTreeMap<u32, String> = long_thinks(thinks, threshold)
        .map(|t| (t.ply, format_duration(t.tenths)))
        .collect();
    if notes.is_empty() {
        return None;
    }

    let body = render_movetext(&game.plies, game.first_to_move(), &notes);
    Some(match game.game_url() {
        Some(url) => format!("{{ {url} }} {body}"),
        None => body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ply(san: &str, comment: &str) -> Ply {
        Ply {
            san: san.to_string(),
            comment: comment.to_string(),
        }
    }

    fn think(ply: u32, tenths: u32) -> ThinkTime {
        ThinkTime {
            ply,
            tenths,
            remaining: 0,
            opponent_remaining: 0,
            clamped: false,
        }
    }

    #[test]
    fn test_render_plain_movetext() {
        let plies = [ply("e4", ""), ply("e5", "[%clk 0:00:59]"), ply("Nf3", "")];
        assert_eq!(
            render_movetext(&plies, Color::White, &BTreeMap::new()),
            "1. e4 e5 { [%clk 0:00:59] } 2. Nf3"
        );
    }

    #[test]
    fn test_render_black_to_move_numbering() {
        let plies = [ply("e5", ""), ply("Nf3", ""), ply("Nc6", "")];
        assert_eq!(
            render_movetext(&plies, Color::Black, &BTreeMap::new()),
            "1... e5 2. Nf3 Nc6"
        );
    }

    #[test]
    fn test_annotate_appends_durations_to_long_thinks() {
        let game = GameRecord {
            link: Some("https://www.chess.com/game/live/7".to_string()),
            plies: vec![
                ply("e4", "[%clk 0:02:58]"),
                ply("c5", "[%clk 0:02:59]"),
                ply("Nf3", "[%clk 0:02:20]"),
                ply("d6", "[%clk 0:02:57]"),
            ],
            ..Default::default()
        };
        let thinks = [think(1, 20), think(3, 380)];

        let annotated = annotate_long_thinks(&game, &thinks, 150).unwrap();
        assert_eq!(
            annotated,
            "{ https://www.chess.com/game/live/7 } 1. e4 { [%clk 0:02:58] } c5 { [%clk 0:02:59] } \
             2. Nf3 { [%clk 0:02:20] 38.0 sec } d6 { [%clk 0:02:57] }"
        );
        // The source record is left untouched.
        assert_eq!(game.plies[2].comment, "[%clk 0:02:20]");
    }

    #[test]
    fn test_annotate_without_long_thinks_is_none() {
        let game = GameRecord {
            plies: vec![ply("e4", "[%clk 0:00:59]")],
            ..Default::default()
        };
        assert_eq!(annotate_long_thinks(&game, &[think(1, 10)], 150), None);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let thinks = [think(1, 149), think(3, 150), think(5, 151)];
        let plies: Vec<u32> = long_thinks(&thinks, 150).map(|t| t.ply).collect();
        assert_eq!(plies, vec![3, 5]);
    }
}
