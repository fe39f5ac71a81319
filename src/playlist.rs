//! extended m3u playlists built from resolved episodes.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::client::ResolvedEpisode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSeries {
    pub title: String,
    #[serde(default)]
    pub entries: Vec<PlaylistEntry>,
}

impl PlaylistSeries {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            entries: Vec::new(),
        }
    }

    pub fn entry(mut self, title: impl Into<String>, url: impl Into<String>) -> Self {
        self.entries.push(PlaylistEntry {
            title: title.into(),
            url: url.into(),
        });
        self
    }

    /// builds a series from `(episode title, resolution)` pairs, keeping only
    /// episodes with a playable url.
    pub fn from_resolved<'a>(
        title: impl Into<String>,
        episodes: impl IntoIterator<Item = (&'a str, &'a ResolvedEpisode)>,
    ) -> Self {
        let entries = episodes
            .into_iter()
            .filter_map(|(title, resolved)| {
                Some(PlaylistEntry {
                    title: title.to_string(),
                    url: resolved.video_url()?.to_string(),
                })
            })
            .collect();

        Self {
            title: title.into(),
            entries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    #[serde(default)]
    pub series: Vec<PlaylistSeries>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            series: Vec::new(),
        }
    }

    pub fn series(mut self, series: PlaylistSeries) -> Self {
        self.series.push(series);
        self
    }

    pub fn entry_count(&self) -> usize {
        self.series.iter().map(|s| s.entries.len()).sum()
    }

    /// renders the playlist as extended m3u.
    ///
    /// one `#EXTM3U` header, then every series block in order; each entry is an
    /// `#EXTINF:-1,{series} - {episode}` line followed by its url, and each block
    /// is closed by `#EXT-X-ENDLIST`.
    pub fn to_m3u(&self) -> String {
        let mut out = String::from("#EXTM3U\n");
        for series in &self.series {
            for entry in &series.entries {
                let _ = writeln!(
                    out,
                    "#EXTINF:-1,{} - {}",
                    single_line(&series.title),
                    single_line(&entry.title)
                );
                let _ = writeln!(out, "{}", single_line(&entry.url));
            }
            out.push_str("#EXT-X-ENDLIST\n");
        }
        out
    }

    /// download name for the playlist, `{name}.m3u`.
    pub fn file_name(&self) -> String {
        format!("{}.m3u", sanitize_file_name(&self.name))
    }
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ").trim().to_string()
}

/// replaces characters that are unsafe in file names on common platforms.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').trim();
    if cleaned.is_empty() {
        "playlist".to_string()
    } else {
        cleaned.to_string()
    }
}
