use std::ops::Range;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::Args;
use saturn::prelude::*;

use crate::constants::*;

#[derive(Debug, Clone, Args)]
pub struct AppArgs {
    /// Logging verbosity (error, warn, info, debug)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Use interactive prompts even when arguments are given
    #[arg(short, long, global = true)]
    pub interactive: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SiteArgs {
    /// AnimeSaturn origin every relative link resolves against
    #[arg(long, env = "SATURN_ORIGIN", default_value = DEFAULT_ORIGIN, global = true)]
    pub origin: String,

    /// Timeout for each page request, in seconds
    #[arg(long, env = "SATURN_TIMEOUT", default_value_t = 30, global = true)]
    pub timeout: u64,

    /// Retries for transient request failures
    #[arg(long, env = "SATURN_RETRIES", default_value_t = 2, global = true)]
    pub retries: u32,
}

impl SiteArgs {
    pub fn client(&self) -> Result<SaturnClient> {
        SaturnBuilder::new()
            .origin(&self.origin)
            .timeout(Duration::from_secs(self.timeout))
            .retries(self.retries)
            .build()
    }
}

#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// Words to search for
    #[arg(required = true)]
    pub query: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct EpisodesArgs {
    /// AnimeSaturn anime url (or /anime/... path)
    pub anime: String,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ResolveArgs {
    /// Search query used to pick the anime
    #[arg(short, long)]
    pub query: Option<String>,

    /// AnimeSaturn anime url (or /anime/... path), skips the search
    #[arg(short, long)]
    pub anime: Option<String>,

    /// Episodes to resolve, 1-indexed (e.g. 3, 1-12, all)
    #[arg(short, long)]
    pub episodes: Option<EpisodeRange>,
}

#[derive(Debug, Clone, Args)]
pub struct PlayArgs {
    /// Player command line; the media url is appended as last argument
    #[arg(long, env = "SATURN_PLAYER", default_value = DEFAULT_PLAYER)]
    pub player: String,

    #[command(flatten)]
    pub resolve: ResolveArgs,
}

#[derive(Debug, Clone, Args)]
pub struct DownloadArgs {
    /// Directory episodes are saved into (one sub-directory per series)
    #[arg(short, long, env = "SATURN_DOWNLOAD_DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Episodes downloaded at the same time
    #[arg(short, long, env = "SATURN_JOBS", default_value_t = DEFAULT_JOBS)]
    pub jobs: usize,

    /// Parallel connections per episode when the server supports ranges
    #[arg(short = 'n', long, default_value_t = 1)]
    pub connections: usize,

    /// ffmpeg binary used for hls streams; looked up in PATH when omitted
    #[arg(long, env = "SATURN_FFMPEG")]
    pub ffmpeg: Option<PathBuf>,

    #[command(flatten)]
    pub resolve: ResolveArgs,
}

#[derive(Debug, Clone, Args)]
pub struct PlaylistArgs {
    /// Playlist name; defaults to the series title
    #[arg(long)]
    pub name: Option<String>,

    /// Directory the .m3u file is written into
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    #[command(flatten)]
    pub resolve: ResolveArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeRange {
    All,
    Range { start: usize, end: usize },
}

impl EpisodeRange {
    /// zero-based index range into a list of `len` episodes.
    pub fn indices(&self, len: usize) -> Result<Range<usize>> {
        match *self {
            EpisodeRange::All => Ok(0..len),
            EpisodeRange::Range { start, end } if end <= len => Ok(start - 1..end),
            EpisodeRange::Range { end, .. } => Err(SaturnError::Validation(format!(
                "episode {end} requested but only {len} available"
            ))),
        }
    }
}

impl FromStr for EpisodeRange {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(EpisodeRange::All);
        }

        let (start, end) = match s.split_once('-') {
            Some((start, end)) => (
                start.trim().parse::<usize>().map_err(|_| "invalid start")?,
                end.trim().parse::<usize>().map_err(|_| "invalid end")?,
            ),
            None => {
                let value = s.parse::<usize>().map_err(|_| "invalid number")?;
                (value, value)
            }
        };

        if start == 0 {
            return Err("episodes are numbered from 1".into());
        }
        if start > end {
            return Err("start cannot be greater than end".into());
        }

        Ok(EpisodeRange::Range { start, end })
    }
}

impl std::fmt::Display for EpisodeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EpisodeRange::All => write!(f, "all"),
            EpisodeRange::Range { start, end } if start == end => write!(f, "{start}"),
            EpisodeRange::Range { start, end } => write!(f, "{start}-{end}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_range_and_all() {
        assert_eq!(
            "3".parse::<EpisodeRange>(),
            Ok(EpisodeRange::Range { start: 3, end: 3 })
        );
        assert_eq!(
            "2 - 5".parse::<EpisodeRange>(),
            Ok(EpisodeRange::Range { start: 2, end: 5 })
        );
        assert_eq!("ALL".parse::<EpisodeRange>(), Ok(EpisodeRange::All));
        assert!("0".parse::<EpisodeRange>().is_err());
        assert!("5-2".parse::<EpisodeRange>().is_err());
        assert!("x".parse::<EpisodeRange>().is_err());
    }

    #[test]
    fn display_round_trips_shape() {
        assert_eq!(EpisodeRange::Range { start: 4, end: 4 }.to_string(), "4");
        assert_eq!(EpisodeRange::Range { start: 1, end: 12 }.to_string(), "1-12");
        assert_eq!(EpisodeRange::All.to_string(), "all");
    }

    #[test]
    fn indices_are_bounded_by_episode_count() {
        assert_eq!(EpisodeRange::All.indices(3).unwrap(), 0..3);
        assert_eq!(
            EpisodeRange::Range { start: 2, end: 3 }.indices(3).unwrap(),
            1..3
        );
        assert!(EpisodeRange::Range { start: 2, end: 4 }.indices(3).is_err());
    }
}
