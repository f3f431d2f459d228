use crate::log;
use crate::types::GameRecord;
use crate::visitor::read_pgn_stream;

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use zstd::stream::read::Decoder as ZstdDecoder;

type PgnInput = Box<dyn Read>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CompressionMode {
    Plain,
    Zstd,
}

impl CompressionMode {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("zst") => Self::Zstd,
            _ => Self::Plain,
        }
    }
}

/// Failure to locate or open PGN input.
#[derive(Debug)]
pub enum ReadError {
    Pattern(glob::PatternError),
    NoMatches(String),
    Open { path: PathBuf, source: io::Error },
    Decoder { path: PathBuf, source: io::Error },
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(e) => write!(f, "Invalid path pattern: {e}"),
            Self::NoMatches(pattern) => write!(f, "No files match '{pattern}'"),
            Self::Open { path, source } => {
                write!(f, "Failed to open file '{}': {source}", path.display())
            }
            Self::Decoder { path, source } => write!(
                f,
                "Failed to initialize zstd decoder for '{}': {source}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pattern(e) => Some(e),
            Self::NoMatches(_) => None,
            Self::Open { source, .. } | Self::Decoder { source, .. } => Some(source),
        }
    }
}

impl From<glob::PatternError> for ReadError {
    fn from(e: glob::PatternError) -> Self {
        Self::Pattern(e)
    }
}

/// Expand a single path or glob pattern into input files.
pub fn resolve_paths(pattern: &str) -> Result<Vec<PathBuf>, ReadError> {
    let paths: Vec<PathBuf> = if pattern.contains('*') || pattern.contains('?') {
        glob::glob(pattern)?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    log::warn(format!("Skipping unreadable glob entry: {e}"));
                    None
                }
            })
            .collect()
    } else {
        vec![PathBuf::from(pattern)]
    };

    if paths.is_empty() {
        return Err(ReadError::NoMatches(pattern.to_string()));
    }
    Ok(paths)
}

fn open_input_stream(path: &Path) -> Result<PgnInput, ReadError> {
    let file = File::open(path).map_err(|source| ReadError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    match CompressionMode::for_path(path) {
        CompressionMode::Plain => Ok(Box::new(file)),
        CompressionMode::Zstd => ZstdDecoder::new(file)
            .map(|decoder| Box::new(decoder) as PgnInput)
            .map_err(|source| ReadError::Decoder {
                path: path.to_path_buf(),
                source,
            }),
    }
}

/// Read every game from the files matching `pattern` (`.zst` files are
/// decompressed), ordered by UTC date and time. Games without a date keep
/// their input order relative to each other.
pub fn read_games(pattern: &str) -> Result<Vec<GameRecord>, ReadError> {
    let mut games = Vec::new();
    for path in resolve_paths(pattern)? {
        let input = open_input_stream(&path)?;
        let source = path.display().to_string();
        let before = games.len();
        games.extend(read_pgn_stream(input, &source));
        log::debug(format!("Read {} games from {source}", games.len() - before));
    }

    sort_by_played_at(&mut games);
    log::info(format!("Loaded {} games from '{pattern}'", games.len()));
    Ok(games)
}

/// Stable sort on `(UTCDate, UTCTime)`; undated games sort first.
pub fn sort_by_played_at(games: &mut [GameRecord]) {
    games.sort_by_key(GameRecord::played_at);
}
