use std::time::Duration;

use saturn::prelude::*;
use saturn::Url;

use crate::constants::*;

pub fn estimate_eta(downloaded: u64, total: u64, elapsed: Duration) -> Option<Duration> {
    if downloaded == 0 || total <= downloaded || elapsed.is_zero() {
        return None;
    }

    let speed = downloaded as f64 / elapsed.as_secs_f64();
    if speed <= 0.0 {
        return None;
    }

    let remaining = (total - downloaded) as f64 / speed;
    Some(Duration::from_secs_f64(remaining.max(0.0)))
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let mins = secs / 60;
    let rem = secs % 60;
    format!("{mins:02}:{rem:02}")
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0usize;

    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// turns an anime url or `/anime/...` path into an absolute url on `origin`.
pub fn normalize_anime_link(raw: &str, origin: &Url) -> Result<String> {
    let input = raw.trim();
    if !ANIME_LINK_RE.is_match(input) {
        return Err(SaturnError::Validation(
            "invalid --anime value: expected an AnimeSaturn /anime/<name> link".to_string(),
        ));
    }

    origin
        .join(input)
        .map(String::from)
        .map_err(|_| SaturnError::Validation(format!("invalid anime link {input}")))
}

/// readable series title taken from the `/anime/<slug>` part of a link.
pub fn title_from_anime_link(link: &str) -> Option<String> {
    let slug = ANIME_LINK_RE.captures(link.trim())?.get(1)?.as_str();
    let title = slug.replace(['-', '_'], " ");
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}
