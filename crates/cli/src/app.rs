use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::future::join_all;
use owo_colors::OwoColorize;

use saturn::prelude::*;
use saturn_downloader::{DownloadPool, DownloadRequest, TaskState, episode_output_path};

use crate::args::*;
use crate::episode::*;
use crate::logger::*;
use crate::progress::*;
use crate::prompt::*;
use crate::utils::*;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub app_args: AppArgs,

    #[command(flatten)]
    pub site: SiteArgs,

    #[command(flatten)]
    pub play_args: PlayArgs,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Search the anime list and print the matches
    Search(SearchArgs),
    /// List the episodes of an anime page
    Episodes(EpisodesArgs),
    /// Resolve episodes and print their video URLs
    Resolve(ResolveArgs),
    /// Resolve episodes and open them in a media player (default)
    Play(PlayArgs),
    /// Resolve episodes and download them concurrently
    Download(DownloadArgs),
    /// Resolve episodes and write an .m3u playlist
    Playlist(PlaylistArgs),
}

#[derive(Debug)]
pub struct App {
    cli: Cli,
    logger: Arc<CliLogger>,
}

impl App {
    pub fn new() -> Result<Self> {
        let cli = Cli::parse();
        let logger = Arc::new(CliLogger::new(&cli.app_args.log_level)?);
        init_tracing(Arc::clone(&logger));
        Ok(Self { cli, logger })
    }

    pub async fn run(&self) -> ExitCode {
        let result = match &self.cli.command {
            Some(Commands::Search(args)) => self.search(args).await,
            Some(Commands::Episodes(args)) => self.episodes(args).await,
            Some(Commands::Resolve(args)) => self.resolve(args).await,
            Some(Commands::Play(args)) => self.play(args).await,
            Some(Commands::Download(args)) => self.download(args).await,
            Some(Commands::Playlist(args)) => self.playlist(args).await,
            None => self.play(&self.cli.play_args).await,
        };

        match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                self.logger.failed(format!("{err}"));
                ExitCode::FAILURE
            }
        }
    }

    fn interactive(&self) -> bool {
        self.cli.app_args.interactive
    }

    pub async fn search(&self, args: &SearchArgs) -> Result<()> {
        let logger = &self.logger;
        let client = self.cli.site.client()?;
        let query = args.query.join(" ");

        let results = logger
            .while_loading(
                format!("searching for {}", query.yellow()),
                client.search(&query),
            )
            .await?;

        if results.is_empty() {
            logger.warn(format!("no anime found for {}", query.yellow()));
            return Ok(());
        }

        logger.success(format!("{} result(s)", results.len().yellow()));
        for (i, result) in results.iter().enumerate() {
            logger.line(format!(
                "{:>3}. {}  {}",
                i + 1,
                result.title.bold(),
                result.url.dimmed()
            ));
        }

        Ok(())
    }

    pub async fn episodes(&self, args: &EpisodesArgs) -> Result<()> {
        let logger = &self.logger;
        let client = self.cli.site.client()?;
        let anime_url = normalize_anime_link(&args.anime, client.origin())?;

        let episodes = logger
            .while_loading(
                format!("loading episodes from {}", anime_url.yellow()),
                client.episodes(&anime_url),
            )
            .await?;

        if episodes.is_empty() {
            return Err(SaturnError::NoEpisodes { url: anime_url });
        }

        logger.success(format!("{} episode(s)", episodes.len().yellow()));
        for (i, episode) in episodes.iter().enumerate() {
            logger.line(format!(
                "{:>4}. {}  {}",
                i + 1,
                episode.title.bold(),
                episode.url.dimmed()
            ));
            if let Some(thumbnail) = &episode.thumbnail {
                logger.debug("thumbnail", thumbnail);
            }
        }

        Ok(())
    }

    pub async fn resolve(&self, args: &ResolveArgs) -> Result<()> {
        let logger = &self.logger;
        let client = self.cli.site.client()?;
        let (_, entries) = select_and_resolve(&client, args, self.interactive(), logger).await?;

        for entry in &entries {
            match (entry.resolved.video_url(), &entry.resolved.streaming_url) {
                (Some(url), _) => {
                    logger.success(format!("episode {}: {}", entry.number, url.yellow()))
                }
                (None, Some(streaming)) => logger.warn(format!(
                    "episode {}: no video url, streaming page {}",
                    entry.number,
                    streaming.yellow()
                )),
                (None, None) => {
                    logger.failed(format!("episode {}: not resolved", entry.number))
                }
            }
        }

        Ok(())
    }

    pub async fn play(&self, args: &PlayArgs) -> Result<()> {
        let logger = &self.logger;
        let client = self.cli.site.client()?;
        let (_, entries) =
            select_and_resolve(&client, &args.resolve, self.interactive(), logger).await?;

        for entry in &entries {
            let url = match entry.resolved.playable_url() {
                Some(url) if entry.resolved.video_url().is_some() => Some(url),
                Some(streaming) => confirm(
                    &format!(
                        "no video url for episode {}, open the streaming page instead?",
                        entry.number
                    ),
                    true,
                )?
                .then_some(streaming),
                None => None,
            };
            let Some(url) = url else {
                logger.warn(format!("skipping episode {}", entry.number));
                continue;
            };

            logger.success(format!("playing episode {}: {}", entry.number, entry.title.yellow()));
            launch_player(&args.player, url, logger).await?;
        }

        Ok(())
    }

    pub async fn download(&self, args: &DownloadArgs) -> Result<()> {
        let logger = &self.logger;
        let client = self.cli.site.client()?;
        let (selection, entries) =
            select_and_resolve(&client, &args.resolve, self.interactive(), logger).await?;

        let pool = DownloadPool::new(args.jobs);
        let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
        let mut tasks = Vec::new();
        let mut labels = Vec::new();

        for entry in &entries {
            let Some(url) = entry.resolved.video_url() else {
                logger.warn(format!("episode {}: no video url, skipped", entry.number));
                continue;
            };

            let output = episode_output_path(&args.dir, &selection.series, entry.number);
            logger.debug("download", format!("{} -> {}", url, output.display()));

            let mut request = DownloadRequest::new(url, output)
                .connections(args.connections)
                .read_timeout(Duration::from_secs(self.cli.site.timeout));
            if let Some(referer) = &entry.resolved.streaming_url {
                request = request.referer(referer);
            }
            if let Some(ffmpeg) = &args.ffmpeg {
                request = request.ffmpeg(ffmpeg);
            }

            let idx = tasks.len();
            let tx = events_tx.clone();
            let submitted = pool.submit(
                request,
                Arc::new(move |event| {
                    let _ = tx.send((idx, event));
                }),
            );
            let task = match submitted {
                Ok(task) => task,
                Err(err) => {
                    logger.warn(format!("episode {}: {err}", entry.number));
                    continue;
                }
            };
            tasks.push((entry.number, task));
            labels.push(format!("Episode {}", entry.number));
        }
        drop(events_tx);

        if tasks.is_empty() {
            return Err(SaturnError::Message(
                "none of the selected episodes has a video url".to_string(),
            ));
        }

        logger.success(format!(
            "downloading {} episode(s), {} at a time",
            tasks.len().yellow(),
            pool.max_concurrent().yellow()
        ));

        let mut renderer = DownloadProgressRenderer::new(logger.level >= LogLevel::Info, labels);
        let mut tick = tokio::time::interval(Duration::from_millis(80));
        let mut all_done =
            std::pin::pin!(join_all(tasks.iter().map(|(_, task)| task.wait())));
        let mut interrupted = false;

        let states = loop {
            tokio::select! {
                states = &mut all_done => break states,
                Some((idx, event)) = events_rx.recv() => renderer.handle(idx, event),
                _ = tick.tick() => renderer.tick(),
                _ = tokio::signal::ctrl_c(), if !interrupted => {
                    interrupted = true;
                    tasks.iter().for_each(|(_, task)| task.cancel());
                }
            }
        };

        while let Ok((idx, event)) = events_rx.try_recv() {
            renderer.handle(idx, event);
        }
        for (idx, state) in states.iter().enumerate() {
            renderer.settle(idx, state);
        }
        renderer.tick();

        let mut failed = 0usize;
        for ((number, _), state) in tasks.iter().zip(&states) {
            match state {
                TaskState::Succeeded => {}
                TaskState::Failed(err) => {
                    failed += 1;
                    logger.failed(format!("episode {number}: {err}"));
                }
                _ => {
                    failed += 1;
                    logger.warn(format!("episode {number}: cancelled"));
                }
            }
        }

        if failed > 0 {
            return Err(SaturnError::Message(format!(
                "{failed} of {} download(s) did not complete",
                tasks.len()
            )));
        }

        logger.success(format!(
            "downloads saved under {}",
            args.dir.join(&selection.series).display().yellow()
        ));
        Ok(())
    }

    pub async fn playlist(&self, args: &PlaylistArgs) -> Result<()> {
        let logger = &self.logger;
        let client = self.cli.site.client()?;
        let (selection, entries) =
            select_and_resolve(&client, &args.resolve, self.interactive(), logger).await?;

        let series = PlaylistSeries::from_resolved(
            selection.series.clone(),
            entries
                .iter()
                .map(|entry| (entry.title.as_str(), &entry.resolved)),
        );
        let playlist = Playlist::new(args.name.clone().unwrap_or(selection.series)).series(series);

        if playlist.entry_count() == 0 {
            return Err(SaturnError::Message(
                "no video urls resolved, playlist not written".to_string(),
            ));
        }

        let path = args.dir.join(playlist.file_name());
        let write = async {
            tokio::fs::create_dir_all(&args.dir).await?;
            tokio::fs::write(&path, playlist.to_m3u()).await
        };
        write.await.map_err(|err| {
            SaturnError::Message(format!("failed to write {}: {err}", path.display()))
        })?;

        logger.success(format!(
            "wrote {} entries to {}",
            playlist.entry_count().yellow(),
            path.display().yellow()
        ));
        Ok(())
    }
}

async fn launch_player(player: &str, url: &str, logger: &CliLogger) -> Result<()> {
    let mut parts = player.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| SaturnError::Validation("player command is empty".to_string()))?;

    logger.debug("player", format!("{player} {url}"));
    let status = tokio::process::Command::new(program)
        .args(parts)
        .arg(url)
        .status()
        .await
        .map_err(|err| SaturnError::Message(format!("failed to launch {program}: {err}")))?;

    if !status.success() {
        logger.warn(format!("{program} exited with {status}"));
    }
    Ok(())
}
