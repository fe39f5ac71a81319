//! html parsing for the animesaturn search, anime and episode pages.
//!
//! every parser is a pure function over the raw html and the site origin that
//! relative links resolve against.

use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

static SEARCH_RESULT_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.badge-archivio").expect("search selector must compile"));

static EPISODE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.bottone-ep").expect("episode selector must compile"));

static STREAMING_LINK_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"a[href*="watch?file="]"#).expect("streaming link selector must compile")
});

static IFRAME_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe").expect("iframe selector must compile"));

static COVER_CONTAINER_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.bg-dark-as-box").expect("cover container selector must compile")
});

static COVER_IMG_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img.cover-anime").expect("cover selector must compile"));

static EPISODE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-ep-(\d+)/?(?:[?#]|$)").expect("episode number regex must compile")
});

/// one anime listed on the search results page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    /// absolute url of the anime page.
    pub url: String,
}

/// one episode link on an anime page, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub title: String,
    /// absolute url of the episode page.
    pub url: String,
    pub thumbnail: Option<String>,
}

/// resolves `href` against `base`, keeping already absolute links untouched.
pub fn absolutize(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(String::from)
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// parses `a.badge-archivio` anchors from the search results page.
pub fn parse_search_results(html: &str, origin: &Url) -> Vec<SearchResult> {
    let doc = Html::parse_document(html);

    doc.select(&SEARCH_RESULT_SEL)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            Some(SearchResult {
                title: element_text(&a),
                url: absolutize(origin, href)?,
            })
        })
        .collect()
}

/// parses `a.bottone-ep` anchors from an anime page.
///
/// the thumbnail is the cover image of the nearest preceding cover container
/// (`div.bg-dark-as-box` holding an `img.cover-anime`), looked up by walking
/// the anchor's ancestors and their preceding siblings. when the page has no
/// such container around the episode list, the first cover image in the
/// document is used instead.
pub fn parse_episodes(html: &str, origin: &Url) -> Vec<Episode> {
    let doc = Html::parse_document(html);
    let page_cover = doc
        .select(&COVER_IMG_SEL)
        .find_map(|img| img.value().attr("src"))
        .and_then(|src| absolutize(origin, src));

    doc.select(&EPISODE_SEL)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let thumbnail = nearest_cover(&a)
                .and_then(|src| absolutize(origin, src))
                .or_else(|| page_cover.clone());

            Some(Episode {
                title: element_text(&a),
                url: absolutize(origin, href)?,
                thumbnail,
            })
        })
        .collect()
}

fn nearest_cover<'a>(anchor: &ElementRef<'a>) -> Option<&'a str> {
    let node = **anchor;

    std::iter::once(node)
        .chain(node.ancestors())
        .flat_map(|n| n.prev_siblings())
        .filter_map(ElementRef::wrap)
        .find_map(cover_in)
}

fn cover_in<'a>(el: ElementRef<'a>) -> Option<&'a str> {
    let is_container = el.value().name() == "div"
        && el.value().classes().any(|c| c == "bg-dark-as-box");

    let containers: Vec<ElementRef<'a>> = if is_container {
        vec![el]
    } else {
        el.select(&COVER_CONTAINER_SEL).collect()
    };

    // the closest container is the last one in document order
    containers.into_iter().rev().find_map(|container| {
        container
            .select(&COVER_IMG_SEL)
            .find_map(|img| img.value().attr("src"))
    })
}

/// reads the episode number out of an episode url (`.../ep/Naruto-ep-7`).
pub fn episode_number(url: &str) -> Option<usize> {
    EPISODE_NUMBER_RE
        .captures(url)
        .and_then(|caps| caps[1].parse().ok())
}

/// finds the first anchor pointing at a `watch?file=` player page.
pub fn find_streaming_link(html: &str, origin: &Url) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&STREAMING_LINK_SEL)
        .find_map(|a| a.value().attr("href"))
        .and_then(|href| absolutize(origin, href))
}

/// returns the trimmed `src` of the first iframe.
///
/// an iframe without a `src` attribute counts as no frame; a present but
/// blank `src` is returned as an empty string for the caller to reject.
pub fn find_frame_src(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&IFRAME_SEL)
        .next()
        .and_then(|frame| frame.value().attr("src"))
        .map(|src| src.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://www.animesaturn.cx";

    fn origin() -> Url {
        Url::parse(ORIGIN).expect("origin should parse")
    }

    const SEARCH_FIXTURE: &str = r#"
        <html><body>
          <ul class="list-group">
            <li><a class="badge badge-archivio" href="/anime/Naruto">  Naruto  </a></li>
            <li><a class="badge badge-archivio" href="https://www.animesaturn.cx/anime/Naruto-Shippuden">Naruto Shippuden</a></li>
            <li><a class="badge" href="/anime/Ignored">Ignored</a></li>
            <li><a class="badge-archivio">No link</a></li>
            <li><a class="badge-archivio-old" href="/anime/AlsoIgnored">Also ignored</a></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn search_results_resolve_against_origin() {
        let results = parse_search_results(SEARCH_FIXTURE, &origin());
        assert_eq!(
            results,
            vec![
                SearchResult {
                    title: "Naruto".into(),
                    url: format!("{ORIGIN}/anime/Naruto"),
                },
                SearchResult {
                    title: "Naruto Shippuden".into(),
                    url: format!("{ORIGIN}/anime/Naruto-Shippuden"),
                },
            ]
        );
    }

    #[test]
    fn episodes_keep_page_order_and_structural_thumbnail() {
        let html = r#"
            <html><body>
              <div class="container shadow rounded bg-dark-as-box mb-3 p-3 w-100 d-flex justify-content-center">
                <img class="img-fluid cover-anime rounded" src="/img/cover.jpg">
              </div>
              <div class="episodes">
                <div class="btn-group"><a class="btn bottone-ep" href="/ep/Naruto-ep-1">Episodio 1</a></div>
                <div class="btn-group"><a class="btn bottone-ep" href="/ep/Naruto-ep-2">Episodio 2</a></div>
              </div>
            </body></html>
        "#;
        let episodes = parse_episodes(html, &origin());
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[0].title, "Episodio 1");
        assert_eq!(episodes[0].url, format!("{ORIGIN}/ep/Naruto-ep-1"));
        assert_eq!(episodes[1].url, format!("{ORIGIN}/ep/Naruto-ep-2"));
        assert_eq!(
            episodes[1].thumbnail.as_deref(),
            Some("https://www.animesaturn.cx/img/cover.jpg")
        );
    }

    #[test]
    fn episodes_use_closest_preceding_cover() {
        let html = r#"
            <html><body>
              <div class="bg-dark-as-box"><img class="cover-anime" src="https://cdn.example/one.jpg"></div>
              <a class="bottone-ep" href="/ep/a-1">1</a>
              <div class="bg-dark-as-box"><img class="cover-anime" src="https://cdn.example/two.jpg"></div>
              <a class="bottone-ep" href="/ep/b-1">1</a>
            </body></html>
        "#;
        let episodes = parse_episodes(html, &origin());
        assert_eq!(
            episodes[0].thumbnail.as_deref(),
            Some("https://cdn.example/one.jpg")
        );
        assert_eq!(
            episodes[1].thumbnail.as_deref(),
            Some("https://cdn.example/two.jpg")
        );
    }

    #[test]
    fn episodes_fall_back_to_page_cover() {
        let html = r#"
            <html><body>
              <a class="bottone-ep" href="/ep/x-1">1</a>
              <footer><img class="cover-anime" src="/late-cover.jpg"></footer>
            </body></html>
        "#;
        let episodes = parse_episodes(html, &origin());
        assert_eq!(
            episodes[0].thumbnail.as_deref(),
            Some("https://www.animesaturn.cx/late-cover.jpg")
        );
    }

    #[test]
    fn episodes_without_cover_have_no_thumbnail() {
        let html = r#"<a class="bottone-ep" href="/ep/x-1">1</a>"#;
        let episodes = parse_episodes(html, &origin());
        assert_eq!(episodes.len(), 1);
        assert!(episodes[0].thumbnail.is_none());
    }

    #[test]
    fn streaming_link_is_first_watch_anchor() {
        let html = r#"
            <a href="/anime/Naruto">back</a>
            <a href="/watch?file=abc123&s=alt">Guarda lo streaming</a>
            <a href="/watch?file=other">second</a>
        "#;
        assert_eq!(
            find_streaming_link(html, &origin()).as_deref(),
            Some("https://www.animesaturn.cx/watch?file=abc123&s=alt")
        );
        assert!(find_streaming_link("<a href='/x'>x</a>", &origin()).is_none());
    }

    #[test]
    fn episode_numbers_come_from_the_url_suffix() {
        assert_eq!(episode_number("https://www.animesaturn.cx/ep/Naruto-ep-7"), Some(7));
        assert_eq!(episode_number("https://www.animesaturn.cx/ep/One-Piece-ITA-ep-1071/"), Some(1071));
        assert_eq!(episode_number("/ep/Bleach-ep-12?s=alt"), Some(12));
        assert_eq!(episode_number("https://www.animesaturn.cx/ep/Naruto-ep-7-extra"), None);
        assert_eq!(episode_number("https://www.animesaturn.cx/anime/Naruto"), None);
    }

    #[test]
    fn frame_src_only_considers_first_iframe() {
        assert_eq!(
            find_frame_src(r#"<iframe src=" https://embed.example/e/1 "></iframe><iframe src="/b"></iframe>"#)
                .as_deref(),
            Some("https://embed.example/e/1")
        );
        assert!(find_frame_src(r#"<iframe></iframe><iframe src="/b"></iframe>"#).is_none());
        assert_eq!(find_frame_src(r#"<iframe src="  "></iframe>"#).as_deref(), Some(""));
        assert!(find_frame_src("<div></div>").is_none());
    }
}
