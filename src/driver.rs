//! Analytics driver: folds games into bucketed performance aggregates,
//! think-time summaries and annotated movetext.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use serde_json::{Value, json};

use crate::annotate::annotate_long_thinks;
use crate::buckets::{BucketAggregator, RunningMean};
use crate::clock::format_duration;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::eval::{EvalBin, EvalError, PositionEvaluator, subject_eval};
use crate::filter::{GameFilter, Predicate};
use crate::log;
use crate::perf::game_performance;
use crate::think::{ThinkTime, ThinkTimes, think_times};
use crate::timecontrol::categorize_timecontrol;
use crate::types::GameRecord;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BucketKey {
    Overall,
    TimeClass(&'static str),
    Scramble(bool),
    LongThink(bool),
    /// Subject clock minus opponent clock reached this many tenths.
    ClockDiff(i32),
    /// `(subject, opponent)` remaining tenths.
    ClockPair(u32, u32),
    Eval(EvalBin),
    Named(String),
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overall => f.write_str("overall"),
            Self::TimeClass(class) => write!(f, "time_class={class}"),
            Self::Scramble(true) => f.write_str("scramble"),
            Self::Scramble(false) => f.write_str("no_scramble"),
            Self::LongThink(true) => f.write_str("long_think"),
            Self::LongThink(false) => f.write_str("no_long_think"),
            Self::ClockDiff(diff) => write!(f, "clock_diff={diff:+}"),
            Self::ClockPair(own, opp) => write!(f, "clock_pair={own}/{opp}"),
            Self::Eval(bin) => write!(f, "eval={bin}"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Totals over a set of subject moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThinkSummary {
    pub moves: u64,
    pub total_tenths: u64,
    pub premoves: u64,
}

impl ThinkSummary {
    pub fn add(&mut self, think: &ThinkTime) {
        self.moves += 1;
        self.total_tenths += u64::from(think.tenths);
        if think.is_premove() {
            self.premoves += 1;
        }
    }

    pub fn merge(&mut self, other: &ThinkSummary) {
        self.moves += other.moves;
        self.total_tenths += other.total_tenths;
        self.premoves += other.premoves;
    }

    pub fn mean_seconds(&self) -> Option<f64> {
        (self.moves > 0).then(|| self.total_tenths as f64 / self.moves as f64 / 10.0)
    }

    /// Fraction of moves played in exactly one tenth.
    pub fn premove_rate(&self) -> Option<f64> {
        (self.moves > 0).then(|| self.premoves as f64 / self.moves as f64)
    }
}

/// Games left out of some statistic, keyed by [`AnalysisError::kind`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipCounts(BTreeMap<&'static str, u64>);

impl SkipCounts {
    pub fn record(&mut self, err: &AnalysisError) {
        *self.0.entry(err.kind()).or_default() += 1;
    }

    pub fn get(&self, kind: &str) -> u64 {
        self.0.get(kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn merge(&mut self, other: &SkipCounts) {
        for (&kind, n) in &other.0 {
            *self.0.entry(kind).or_default() += n;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        self.0.iter().map(|(kind, n)| (*kind, *n))
    }
}

#[derive(Debug, Clone, Default)]
struct Tally {
    games: u64,
    filtered: u64,
    anomalies: u64,
    skipped: SkipCounts,
    buckets: BucketAggregator<BucketKey>,
    all_thinks: ThinkSummary,
    scramble_thinks: ThinkSummary,
    think_games: u64,
    long_think_moves: u64,
    /// Annotated movetext tagged with the game's position in the input.
    annotated: Vec<(u64, String)>,
}

impl Tally {
    fn merge(mut self, other: Tally) -> Tally {
        self.absorb(other);
        self
    }

    fn absorb(&mut self, other: Tally) {
        self.games += other.games;
        self.filtered += other.filtered;
        self.anomalies += other.anomalies;
        self.skipped.merge(&other.skipped);
        self.buckets.merge(other.buckets);
        self.all_thinks.merge(&other.all_thinks);
        self.scramble_thinks.merge(&other.scramble_thinks);
        self.think_games += other.think_games;
        self.long_think_moves += other.long_think_moves;
        self.annotated.extend(other.annotated);
    }
}

fn describe(game: &GameRecord) -> String {
    match game.game_url() {
        Some(url) => url.to_string(),
        None => format!(
            "{} vs {}",
            game.white.as_deref().unwrap_or("?"),
            game.black.as_deref().unwrap_or("?")
        ),
    }
}

/// Read-only view shared by the sequential and parallel paths.
struct Context<'a> {
    subject: &'a str,
    config: &'a AnalysisConfig,
    filter: &'a GameFilter,
    segments: &'a [(String, Predicate)],
}

impl Context<'_> {
    fn skip(&self, tally: &mut Tally, game: &GameRecord, err: &AnalysisError) {
        log::warn(format!("Skipping {}: {err}", describe(game)));
        tally.skipped.record(err);
    }

    fn progress(&self, analysed: u64) {
        let interval = self.config.progress_interval;
        if interval > 0 && analysed % interval == 0 {
            log::info(format!("{analysed} games complete."));
        }
    }

    fn observe(
        &self,
        tally: &mut Tally,
        ordinal: u64,
        game: &GameRecord,
        evaluator: Option<&mut (dyn PositionEvaluator + Send + 'static)>,
    ) {
        tally.games += 1;

        if let Some(rule) = self.filter.rejection(game) {
            log::debug(format!("Filtered {} ({rule})", describe(game)));
            tally.filtered += 1;
            return;
        }

        let Some(color) = game.color_of(self.subject) else {
            self.skip(tally, game, &AnalysisError::NotAParticipant(self.subject.to_string()));
            return;
        };

        let perf = match game_performance(game, self.subject) {
            Ok(perf) => Some(f64::from(perf)),
            Err(e) => {
                self.skip(tally, game, &e);
                None
            }
        };

        if let Some(perf) = perf {
            tally.buckets.record(BucketKey::Overall, perf);
            if let Some(class) = game.time_control.as_deref().and_then(categorize_timecontrol) {
                tally.buckets.record(BucketKey::TimeClass(class), perf);
            }
            for (name, predicate) in self.segments {
                if predicate(game) {
                    tally.buckets.record(BucketKey::Named(name.clone()), perf);
                }
            }
        }

        match think_times(game, self.subject) {
            Ok(thinks) => {
                // Readings before a missing clock are still counted.
                let truncated = thinks.missing_clock();
                if let Some(e) = &truncated {
                    self.skip(tally, game, e);
                }
                if truncated.is_none() || !thinks.series.readings.is_empty() {
                    self.observe_thinks(tally, ordinal, game, &thinks, perf);
                }
            }
            Err(e) => self.skip(tally, game, &e),
        }

        if let (Some(perf), Some(evaluator)) = (perf, evaluator) {
            let ply = self.config.eval_ply as usize;
            match subject_eval(evaluator, game, ply, color) {
                Ok(score) => {
                    if let Some(bin) = EvalBin::classify(score) {
                        tally.buckets.record(BucketKey::Eval(bin), perf);
                    }
                }
                Err(EvalError::GameTooShort { .. }) => {}
                Err(e) => log::warn(format!("No evaluation for {}: {e}", describe(game))),
            }
        }
    }

    fn observe_thinks(
        &self,
        tally: &mut Tally,
        ordinal: u64,
        game: &GameRecord,
        thinks: &ThinkTimes,
        perf: Option<f64>,
    ) {
        let threshold = self.config.long_think_threshold;
        let detector = &self.config.scramble;
        let scramble = detector.was_time_scramble(&thinks.series.readings);
        let subject = thinks.subject();

        tally.think_games += 1;
        tally.anomalies += u64::from(thinks.series.anomalies);

        let mut long_moves = 0;
        for think in subject {
            tally.all_thinks.add(think);
            if scramble && detector.in_scramble(think) {
                tally.scramble_thinks.add(think);
            }
            if think.tenths >= threshold {
                long_moves += 1;
            }
        }
        tally.long_think_moves += long_moves;

        if let Some(perf) = perf {
            tally.buckets.record(BucketKey::Scramble(scramble), perf);
            tally.buckets.record(BucketKey::LongThink(long_moves > 0), perf);
            self.record_clock_trajectory(tally, thinks, perf);
        }

        if self.config.annotate && long_moves > 0 {
            if let Some(text) = annotate_long_thinks(game, subject, threshold) {
                tally.annotated.push((ordinal, text));
            }
        }
    }

    /// Clock-difference buckets fire once per game on first crossing; clock
    /// pairs, when enabled, fire for the starting clocks and every reading.
    fn record_clock_trajectory(&self, tally: &mut Tally, thinks: &ThinkTimes, perf: f64) {
        let pairs = self.config.clock_pair_buckets;
        let base = thinks.time_control.base_tenths();
        let (mut own, mut opp) = (base, base);
        let mut fired = BTreeSet::new();

        if pairs {
            tally.buckets.record(BucketKey::ClockPair(own, opp), perf);
        }
        for reading in &thinks.series.readings {
            if reading.side == thinks.subject_color {
                own = reading.remaining;
            } else {
                opp = reading.remaining;
            }
            if pairs {
                tally.buckets.record(BucketKey::ClockPair(own, opp), perf);
            }

            let lead = i64::from(own) - i64::from(opp);
            for &threshold in &self.config.clock_diff_thresholds {
                let threshold = i32::try_from(threshold).unwrap_or(i32::MAX);
                for diff in [threshold, -threshold] {
                    let crossed = if diff >= 0 {
                        lead >= i64::from(diff)
                    } else {
                        lead <= i64::from(diff)
                    };
                    if crossed && fired.insert(diff) {
                        tally.buckets.record(BucketKey::ClockDiff(diff), perf);
                    }
                }
            }
        }
    }
}

/// Accumulates statistics for one subject over a stream of games. Owns all
/// of its aggregate state; independent analyzers can be combined with
/// [`Analyzer::merge`].
pub struct Analyzer {
    subject: String,
    config: AnalysisConfig,
    filter: GameFilter,
    segments: Vec<(String, Predicate)>,
    evaluator: Option<Box<dyn PositionEvaluator + Send>>,
    tally: Tally,
}

impl Analyzer {
    pub fn new(subject: impl Into<String>, config: AnalysisConfig) -> Self {
        Self {
            subject: subject.into(),
            config,
            filter: GameFilter::default(),
            segments: Vec::new(),
            evaluator: None,
            tally: Tally::default(),
        }
    }

    pub fn with_filter(mut self, filter: GameFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Also record performance under `BucketKey::Named(name)` for games
    /// matching `predicate`.
    pub fn with_segment(
        mut self,
        name: impl Into<String>,
        predicate: impl Fn(&GameRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.segments.push((name.into(), Box::new(predicate)));
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl PositionEvaluator + Send + 'static) -> Self {
        self.evaluator = Some(Box::new(evaluator));
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn games_seen(&self) -> u64 {
        self.tally.games
    }

    pub fn analyze(&mut self, game: &GameRecord) {
        let Self {
            subject,
            config,
            filter,
            segments,
            evaluator,
            tally,
        } = self;
        let ctx = Context {
            subject,
            config,
            filter,
            segments,
        };

        let ordinal = tally.games;
        ctx.observe(tally, ordinal, game, evaluator.as_deref_mut());
        ctx.progress(tally.games);
    }

    pub fn run<'a>(&mut self, games: impl IntoIterator<Item = &'a GameRecord>) {
        for game in games {
            self.analyze(game);
        }
    }

    /// Analyse `games` on the rayon pool. Each worker folds into its own
    /// partial tally and the partials are merged. With an evaluator attached
    /// the games are analysed sequentially instead.
    pub fn run_parallel(&mut self, games: &[GameRecord]) {
        if self.evaluator.is_some() {
            log::debug("Evaluator attached, analysing sequentially");
            self.run(games);
            return;
        }

        let Self {
            subject,
            config,
            filter,
            segments,
            tally,
            ..
        } = self;
        let ctx = Context {
            subject,
            config,
            filter,
            segments,
        };

        let offset = tally.games;
        let done = AtomicU64::new(offset);
        let partial = games
            .par_iter()
            .enumerate()
            .fold(Tally::default, |mut acc, (idx, game)| {
                ctx.observe(&mut acc, offset + idx as u64, game, None);
                ctx.progress(done.fetch_add(1, Ordering::Relaxed) + 1);
                acc
            })
            .reduce(Tally::default, Tally::merge);

        tally.absorb(partial);
    }

    /// Fold another analyzer's results into this one. The other analyzer's
    /// games are treated as following this one's.
    pub fn merge(&mut self, other: Analyzer) {
        let offset = self.tally.games;
        let mut partial = other.tally;
        for (ordinal, _) in &mut partial.annotated {
            *ordinal += offset;
        }
        self.tally.absorb(partial);
    }

    /// Clear accumulated results, keeping configuration.
    pub fn reset(&mut self) {
        self.tally = Tally::default();
    }

    pub fn report(&self) -> AnalysisReport {
        let tally = &self.tally;
        let mut annotated: Vec<&(u64, String)> = tally.annotated.iter().collect();
        annotated.sort_by_key(|(ordinal, _)| *ordinal);

        AnalysisReport {
            subject: self.subject.clone(),
            long_think_threshold: self.config.long_think_threshold,
            total_games: tally.games,
            filtered: tally.filtered,
            skipped: tally.skipped.clone(),
            anomalies: tally.anomalies,
            buckets: tally.buckets.clone(),
            all_thinks: tally.all_thinks,
            scramble_thinks: tally.scramble_thinks,
            think_games: tally.think_games,
            long_think_moves: tally.long_think_moves,
            annotated: annotated.into_iter().map(|(_, text)| text.clone()).collect(),
        }
    }

    pub fn finish(self) -> AnalysisReport {
        let report = self.report();
        log::info(format!(
            "Analysed {} games for {} ({} filtered, {} skipped)",
            report.total_games,
            report.subject,
            report.filtered,
            report.skipped.total()
        ));
        report
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub subject: String,
    pub long_think_threshold: u32,
    pub total_games: u64,
    pub filtered: u64,
    pub skipped: SkipCounts,
    /// Moves whose clock went backwards beyond the increment.
    pub anomalies: u64,
    pub buckets: BucketAggregator<BucketKey>,
    pub all_thinks: ThinkSummary,
    pub scramble_thinks: ThinkSummary,
    /// Games whose think times could be reconstructed.
    pub think_games: u64,
    pub long_think_moves: u64,
    pub annotated: Vec<String>,
}

impl AnalysisReport {
    pub fn bucket(&self, key: &BucketKey) -> Option<RunningMean> {
        self.buckets.query(key)
    }

    fn mean(&self, key: BucketKey) -> Option<f64> {
        self.bucket(&key).map(|agg| agg.mean)
    }

    pub fn overall_perf(&self) -> Option<f64> {
        self.mean(BucketKey::Overall)
    }

    pub fn scramble_perf(&self) -> Option<f64> {
        self.mean(BucketKey::Scramble(true))
    }

    /// Scramble performance minus overall performance.
    pub fn scramble_delta(&self) -> Option<f64> {
        Some(self.scramble_perf()? - self.overall_perf()?)
    }

    /// Long thinks per game with reconstructed think times.
    pub fn long_think_rate(&self) -> Option<f64> {
        (self.think_games > 0).then(|| self.long_think_moves as f64 / self.think_games as f64)
    }

    pub fn to_json(&self) -> Value {
        let summary = |s: &ThinkSummary| {
            json!({
                "moves": s.moves,
                "mean_seconds": s.mean_seconds(),
                "premove_rate": s.premove_rate(),
            })
        };
        let perf = |key: BucketKey| {
            self.bucket(&key)
                .map(|agg| json!({ "n": agg.count, "perf": agg.mean }))
                .unwrap_or(Value::Null)
        };

        let skipped: serde_json::Map<String, Value> = self
            .skipped
            .iter()
            .map(|(kind, n)| (kind.to_string(), json!(n)))
            .collect();
        let buckets: Vec<Value> = self
            .buckets
            .iter()
            .map(|(key, agg)| json!({ "key": key.to_string(), "n": agg.count, "mean": agg.mean }))
            .collect();

        json!({
            "subject": self.subject,
            "total_games": self.total_games,
            "filtered": self.filtered,
            "skipped": skipped,
            "anomalies": self.anomalies,
            "thinks": summary(&self.all_thinks),
            "scramble_thinks": summary(&self.scramble_thinks),
            "long_think": {
                "threshold_tenths": self.long_think_threshold,
                "rate_per_game": self.long_think_rate(),
                "with": perf(BucketKey::LongThink(true)),
                "without": perf(BucketKey::LongThink(false)),
            },
            "scramble": {
                "games": perf(BucketKey::Scramble(true)),
                "overall": perf(BucketKey::Overall),
                "delta": self.scramble_delta(),
            },
            "buckets": buckets,
            "annotated_games": self.annotated.len(),
        })
    }
}

fn or_na(value: Option<f64>, render: impl Fn(f64) -> String) -> String {
    value.map(render).unwrap_or_else(|| "N/A".to_string())
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = |key: BucketKey| self.bucket(&key).map_or(0, |agg| agg.count);
        let perf = |value: Option<f64>| or_na(value, |v| format!("{v:.0}"));
        let summary = |s: &ThinkSummary| {
            format!(
                "avg={} sec, premove rate={} (n={})",
                or_na(s.mean_seconds(), |v| format!("{v:.2}")),
                or_na(s.premove_rate(), |v| format!("{:.2}%", v * 100.0)),
                s.moves
            )
        };
        let threshold = format_duration(self.long_think_threshold);

        writeln!(f, "{}", self.subject)?;
        writeln!(f, "{}", "=".repeat(self.subject.chars().count()))?;
        writeln!(
            f,
            "n: {} ({} filtered, {} skipped)",
            self.total_games,
            self.filtered,
            self.skipped.total()
        )?;
        for (kind, n) in self.skipped.iter() {
            writeln!(f, "  {kind}: {n}")?;
        }
        if self.anomalies > 0 {
            writeln!(f, "Clock anomalies: {}", self.anomalies)?;
        }
        writeln!(f, "Total thinks: {}", summary(&self.all_thinks))?;
        writeln!(f, "Scramble thinks: {}", summary(&self.scramble_thinks))?;
        writeln!(f)?;
        writeln!(
            f,
            "{threshold} think rate: {}/game",
            or_na(self.long_think_rate(), |v| format!("{v:.3}"))
        )?;
        writeln!(
            f,
            "Games with no {threshold} thinks: {}. Avg perf: {}",
            count(BucketKey::LongThink(false)),
            perf(self.mean(BucketKey::LongThink(false)))
        )?;
        writeln!(
            f,
            "Games with {threshold} thinks: {}. Avg perf: {}",
            count(BucketKey::LongThink(true)),
            perf(self.mean(BucketKey::LongThink(true)))
        )?;
        writeln!(f)?;
        writeln!(f, "Games reaching time scrambles: {}", count(BucketKey::Scramble(true)))?;
        writeln!(
            f,
            "Perf in time scrambles: {} (compared to {} overall, delta {})",
            perf(self.scramble_perf()),
            perf(self.overall_perf()),
            or_na(self.scramble_delta(), |v| format!("{v:+.0}"))
        )?;

        if !self.buckets.is_empty() {
            writeln!(f)?;
            for (key, agg) in self.buckets.iter() {
                writeln!(f, "{key}: n={} perf={:.0}", agg.count, agg.mean)?;
            }
        }
        Ok(())
    }
}
