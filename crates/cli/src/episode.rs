use owo_colors::OwoColorize;

use saturn::prelude::*;

use crate::args::*;
use crate::logger::*;
use crate::prompt::*;
use crate::utils::*;

/// an anime picked by the user together with the episodes to work on.
#[derive(Debug, Clone)]
pub struct Selection {
    pub series: String,
    pub anime_url: String,
    /// `(1-based episode number, episode)` in page order.
    pub episodes: Vec<(usize, Episode)>,
}

#[derive(Debug, Clone)]
pub struct ResolvedEntry {
    pub number: usize,
    pub title: String,
    pub resolved: ResolvedEpisode,
}

pub async fn select_anime_url(
    client: &SaturnClient,
    args: &ResolveArgs,
    interactive: bool,
    logger: &CliLogger,
) -> Result<(String, String)> {
    if let Some(anime) = &args.anime
        && !interactive
    {
        let url = normalize_anime_link(anime, client.origin())?;
        let title = title_from_anime_link(&url).unwrap_or_else(|| "anime".to_string());
        return Ok((title, url));
    }

    let query = match &args.query {
        Some(query) if !interactive => query.clone(),
        query => prompt_query(query.as_deref())?,
    };

    let results = logger
        .while_loading(
            format!("searching for {}", query.yellow()),
            client.search(&query),
        )
        .await?;

    let picked = match results.len() {
        0 => {
            return Err(SaturnError::Message(format!(
                "no anime found for query {query}"
            )));
        }
        1 if !interactive => 0,
        _ => select_anime(&results)?,
    };

    let result = &results[picked];
    logger.success(format!("anime: {}", result.title.yellow()));
    Ok((result.title.clone(), result.url.clone()))
}

pub async fn select_episodes(
    client: &SaturnClient,
    args: &ResolveArgs,
    interactive: bool,
    logger: &CliLogger,
) -> Result<Selection> {
    let (series, anime_url) = select_anime_url(client, args, interactive, logger).await?;

    let episodes = logger
        .while_loading(
            format!("loading episodes of {}", series.yellow()),
            client.episodes(&anime_url),
        )
        .await?;

    if episodes.is_empty() {
        return Err(SaturnError::NoEpisodes { url: anime_url });
    }
    logger.debug("episode", format!("{} episode(s) listed", episodes.len()));

    let range = match args.episodes {
        Some(range) if !interactive => range,
        _ if episodes.len() == 1 => {
            logger.success("single episode, treating it as a movie");
            EpisodeRange::All
        }
        initial => prompt_episodes(episodes.len(), initial)?,
    };

    let indices = range.indices(episodes.len())?;
    let episodes = episodes
        .into_iter()
        .enumerate()
        .skip(indices.start)
        .take(indices.len())
        .map(|(idx, episode)| (idx + 1, episode))
        .collect();

    Ok(Selection {
        series,
        anime_url,
        episodes,
    })
}

/// resolves every selected episode concurrently, keeping selection order.
pub async fn resolve_selection(
    client: &SaturnClient,
    selection: &Selection,
    logger: &CliLogger,
) -> Vec<ResolvedEntry> {
    let urls: Vec<&str> = selection
        .episodes
        .iter()
        .map(|(_, episode)| episode.url.as_str())
        .collect();

    let resolved = logger
        .while_loading(
            format!("resolving {} episode(s)", urls.len().yellow()),
            client.resolve_batch(&urls),
        )
        .await;

    selection
        .episodes
        .iter()
        .zip(resolved)
        .map(|((number, episode), resolved)| {
            if let Some(err) = &resolved.extraction.error {
                logger.warn(format!("episode {number}: {err}"));
            }
            ResolvedEntry {
                number: *number,
                title: episode.title.clone(),
                resolved,
            }
        })
        .collect()
}

pub async fn select_and_resolve(
    client: &SaturnClient,
    args: &ResolveArgs,
    interactive: bool,
    logger: &CliLogger,
) -> Result<(Selection, Vec<ResolvedEntry>)> {
    let selection = select_episodes(client, args, interactive, logger).await?;
    logger.debug(
        "episode",
        format!(
            "{} episode(s) selected from {}",
            selection.episodes.len(),
            selection.anime_url
        ),
    );
    let entries = resolve_selection(client, &selection, logger).await;
    Ok((selection, entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quiet() -> CliLogger {
        CliLogger::with_level(LogLevel::Error)
    }

    #[tokio::test]
    async fn anime_link_skips_search_and_range_slices_episodes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anime/Naruto"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a class="bottone-ep" href="/ep/Naruto-ep-1">Episodio 1</a>
                   <a class="bottone-ep" href="/ep/Naruto-ep-2">Episodio 2</a>
                   <a class="bottone-ep" href="/ep/Naruto-ep-3">Episodio 3</a>"#,
            ))
            .mount(&server)
            .await;

        let client = SaturnBuilder::new()
            .origin(&server.uri())
            .build()
            .expect("client");
        let args = ResolveArgs {
            anime: Some("/anime/Naruto".to_string()),
            episodes: Some(EpisodeRange::Range { start: 2, end: 3 }),
            ..ResolveArgs::default()
        };

        let selection = select_episodes(&client, &args, false, &quiet())
            .await
            .expect("selection");
        assert_eq!(selection.series, "Naruto");
        let numbers: Vec<usize> = selection.episodes.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![2, 3]);
        assert!(selection.episodes[0].1.url.ends_with("/ep/Naruto-ep-2"));
    }

    #[tokio::test]
    async fn single_search_hit_is_picked_without_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/animelist"))
            .and(query_param("search", "bleach"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a class="badge-archivio" href="/anime/Bleach">Bleach</a>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/anime/Bleach"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<a class="bottone-ep" href="/ep/Bleach-Movie">Film</a>"#,
            ))
            .mount(&server)
            .await;

        let client = SaturnBuilder::new()
            .origin(&server.uri())
            .build()
            .expect("client");
        let args = ResolveArgs {
            query: Some("bleach".to_string()),
            ..ResolveArgs::default()
        };

        let selection = select_episodes(&client, &args, false, &quiet())
            .await
            .expect("selection");
        assert_eq!(selection.series, "Bleach");
        assert_eq!(selection.episodes.len(), 1);
        assert_eq!(selection.episodes[0].0, 1);
    }

    #[tokio::test]
    async fn empty_episode_list_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/anime/Empty"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>nothing</p>"))
            .mount(&server)
            .await;

        let client = SaturnBuilder::new()
            .origin(&server.uri())
            .build()
            .expect("client");
        let args = ResolveArgs {
            anime: Some("/anime/Empty".to_string()),
            episodes: Some(EpisodeRange::All),
            ..ResolveArgs::default()
        };

        let err = select_episodes(&client, &args, false, &quiet())
            .await
            .expect_err("no episodes");
        assert!(matches!(err, SaturnError::NoEpisodes { .. }));
    }
}
