use std::sync::LazyLock;

use regex::Regex;

pub use saturn::DEFAULT_ORIGIN;
pub use saturn_downloader::DEFAULT_MAX_CONCURRENT as DEFAULT_JOBS;

pub const DEFAULT_PLAYER: &str = "vlc --play-and-exit";

pub static ANIME_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?://[^/]+)?/anime/([^/?#]+)/?(?:[?#].*)?$")
        .expect("anime link regex must compile")
});
