use crate::timecontrol::categorize_timecontrol;
use crate::types::GameRecord;

/// Maximum rating gap between the players before a game is excluded.
pub const DEFAULT_MAX_RATING_GAP: u32 = 400;

pub type Predicate = Box<dyn Fn(&GameRecord) -> bool + Send + Sync>;

/// Builder over game predicates. A game is accepted when every predicate
/// holds; an empty filter accepts everything.
#[derive(Default)]
pub struct GameFilter {
    predicates: Vec<(String, Predicate)>,
}

impl GameFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep games whose `TimeControl` tag equals `time_control` exactly.
    pub fn time_control(self, time_control: impl Into<String>) -> Self {
        let wanted = time_control.into();
        let name = format!("time_control == {wanted}");
        self.with(name, move |game| game.time_control.as_deref() == Some(wanted.as_str()))
    }

    /// Keep games of one time class (`bullet`, `blitz`, ...).
    pub fn time_class(self, class: &'static str) -> Self {
        self.with(format!("time_class == {class}"), move |game| {
            game.time_control
                .as_deref()
                .and_then(categorize_timecontrol)
                == Some(class)
        })
    }

    /// Keep standard chess from the initial position.
    pub fn standard_only(self) -> Self {
        self.with("standard_only", GameRecord::is_standard_chess)
    }

    /// Drop games whose rating gap exceeds `max_gap`. Games missing a rating
    /// pass; performance handles them.
    pub fn max_rating_gap(self, max_gap: u32) -> Self {
        self.with(format!("rating_gap <= {max_gap}"), move |game| {
            game.rating_gap().is_none_or(|gap| gap <= max_gap)
        })
    }

    pub fn with(
        mut self,
        name: impl Into<String>,
        predicate: impl Fn(&GameRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicates.push((name.into(), Box::new(predicate)));
        self
    }

    pub fn accepts(&self, game: &GameRecord) -> bool {
        self.rejection(game).is_none()
    }

    /// Name of the first predicate that rejects `game`.
    pub fn rejection(&self, game: &GameRecord) -> Option<&str> {
        self.predicates
            .iter()
            .find(|(_, predicate)| !predicate(game))
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl std::fmt::Debug for GameFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.predicates.iter().map(|(name, _)| name))
            .finish()
    }
}
