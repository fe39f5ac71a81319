use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

/// matches the first direct media url in a blob of text.
///
/// the match is lazy and ends at the first `.m3u8`/`.mp4`, so anything after
/// the extension (query string included) is not part of the result.
pub static MEDIA_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://.*?\.(?:m3u8|mp4)").expect("media url regex must compile")
});

static SCRIPT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("script").expect("script selector must compile"));

/// where in the frame/page chain a media url was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    FrameScript,
    FrameText,
    PageScript,
    PageText,
}

impl MatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrameScript => "frame_script",
            Self::FrameText => "frame_text",
            Self::PageScript => "page_script",
            Self::PageText => "page_text",
        }
    }
}

/// which stage of a single document search produced the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStage {
    Script,
    RawText,
}

/// returns the first media url in `text`.
pub fn find_media_url(text: &str) -> Option<&str> {
    MEDIA_URL_RE.find(text).map(|m| m.as_str())
}

/// two-stage search over one document: every `<script>` element in document
/// order first, then the raw text.
pub fn search_document(raw: &str) -> Option<(String, DocumentStage)> {
    let doc = Html::parse_document(raw);

    for script in doc.select(&SCRIPT_SEL) {
        if let Some(found) = find_media_url(&script.html()) {
            return Some((found.to_string(), DocumentStage::Script));
        }
    }

    find_media_url(raw).map(|found| (found.to_string(), DocumentStage::RawText))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_mp4_and_m3u8() {
        assert_eq!(
            find_media_url(r#"file: "https://cdn.example/video123.mp4""#),
            Some("https://cdn.example/video123.mp4")
        );
        assert_eq!(
            find_media_url("src=http://cdn.example/hls/master.m3u8 type"),
            Some("http://cdn.example/hls/master.m3u8")
        );
    }

    #[test]
    fn truncates_at_first_extension() {
        assert_eq!(
            find_media_url("https://cdn.example/v.mp4?token=abc&e=1"),
            Some("https://cdn.example/v.mp4")
        );
    }

    #[test]
    fn does_not_cross_lines() {
        assert_eq!(find_media_url("https://cdn.example/\nvideo.mp4"), None);
    }

    #[test]
    fn script_match_wins_over_earlier_text() {
        let html = r#"<html><body>
            <a href="https://cdn.example/first.mp4">plain</a>
            <script>var f = "https://cdn.example/from-script.m3u8";</script>
        </body></html>"#;
        let (url, stage) = search_document(html).expect("should match");
        assert_eq!(url, "https://cdn.example/from-script.m3u8");
        assert_eq!(stage, DocumentStage::Script);
    }

    #[test]
    fn falls_back_to_raw_text() {
        let html = r#"<html><body><script>var x = 1;</script>
            <video src="https://cdn.example/raw.mp4"></video></body></html>"#;
        let (url, stage) = search_document(html).expect("should match");
        assert_eq!(url, "https://cdn.example/raw.mp4");
        assert_eq!(stage, DocumentStage::RawText);
    }

    #[test]
    fn no_match_is_none() {
        assert!(search_document("<html><script>play()</script></html>").is_none());
    }
}
