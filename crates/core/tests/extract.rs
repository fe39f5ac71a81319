use std::sync::Arc;
use std::time::Duration;

use saturn_core::{ExtractError, FetchConfig, HttpFetcher, MatchSource, VideoExtractor};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn extractor() -> VideoExtractor {
    let fetcher = HttpFetcher::new(
        FetchConfig::default()
            .retries(0)
            .timeout(Duration::from_secs(5)),
    )
    .expect("fetcher should build");
    VideoExtractor::new(Arc::new(fetcher))
}

async fn serve(server: &MockServer, at: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn finds_url_in_frame_script() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/watch",
        200,
        r#"<html><body><iframe src="/embed/1"></iframe></body></html>"#,
    )
    .await;
    serve(
        &server,
        "/embed/1",
        200,
        r#"<html><script>jwplayer().setup({file: "https://cdn.example/video123.mp4"});</script></html>"#,
    )
    .await;

    let found = extractor()
        .extract(&format!("{}/watch", server.uri()))
        .await
        .expect("extraction should not fail")
        .expect("a url should be found");

    assert_eq!(found.url, "https://cdn.example/video123.mp4");
    assert_eq!(found.source, MatchSource::FrameScript);
}

#[tokio::test]
async fn falls_back_to_frame_text() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/watch",
        200,
        &format!(r#"<iframe src="{}/embed/2"></iframe>"#, server.uri()),
    )
    .await;
    serve(
        &server,
        "/embed/2",
        200,
        r#"<video><source src="https://cdn.example/hls/index.m3u8"></video>"#,
    )
    .await;

    let found = extractor()
        .extract(&format!("{}/watch", server.uri()))
        .await
        .expect("extraction should not fail")
        .expect("a url should be found");

    assert_eq!(found.url, "https://cdn.example/hls/index.m3u8");
    assert_eq!(found.source, MatchSource::FrameText);
}

#[tokio::test]
async fn falls_back_to_watch_page_when_frame_is_empty() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/watch",
        200,
        r#"<iframe src="/embed/3"></iframe><script>var src = "https://cdn.example/page.mp4";</script>"#,
    )
    .await;
    serve(&server, "/embed/3", 200, "<html><p>nothing here</p></html>").await;

    let found = extractor()
        .extract(&format!("{}/watch", server.uri()))
        .await
        .expect("extraction should not fail")
        .expect("a url should be found");

    assert_eq!(found.url, "https://cdn.example/page.mp4");
    assert_eq!(found.source, MatchSource::PageScript);
}

#[tokio::test]
async fn no_frame_and_no_match_is_absent() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/watch",
        200,
        "<html><script>console.log('no video')</script><p>nope</p></html>",
    )
    .await;

    let found = extractor()
        .extract(&format!("{}/watch", server.uri()))
        .await
        .expect("a page without matches is not an error");

    assert!(found.is_none());
}

#[tokio::test]
async fn frame_fetch_failure_aborts_chain() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/watch",
        200,
        r#"<iframe src="/embed/broken"></iframe><script>"https://cdn.example/page.mp4"</script>"#,
    )
    .await;
    serve(&server, "/embed/broken", 500, "boom").await;

    let err = extractor()
        .extract(&format!("{}/watch", server.uri()))
        .await
        .expect_err("frame failure should abort");

    assert!(matches!(err, ExtractError::HttpStatus { .. }));
}

#[tokio::test]
async fn blank_frame_src_aborts_chain() {
    let server = MockServer::start().await;
    serve(
        &server,
        "/watch",
        200,
        r#"<iframe src=""></iframe><script>"https://cdn.example/page.mp4"</script>"#,
    )
    .await;

    let err = extractor()
        .extract(&format!("{}/watch", server.uri()))
        .await
        .expect_err("a blank frame src should abort");

    assert!(matches!(err, ExtractError::InvalidUrl { url } if url.is_empty()));
}
