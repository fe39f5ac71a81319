pub mod errors;
pub mod extract;
pub mod fetch;
pub mod media;
pub mod parser;

pub use errors::{ExtractError, Result};
pub use extract::{MediaMatch, VideoExtractor};
pub use fetch::{FetchConfig, HttpFetcher};
pub use media::MatchSource;
pub use parser::{Episode, SearchResult, episode_number};
