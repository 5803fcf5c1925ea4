mod cli;
mod error;
mod probe;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use prep_common::{CancellationToken, ProgressFn, ProgressUpdate};
use source_resolver::SourceKind;
use subprep_engine::{
    ChannelConfig, DirectDownloader, DirectOptions, DownloadOptions, DouyinAdapter, EngineConfig,
    GenericAdapter, HttpMediaServer, Materializer, MediaServer, MemoryStore, PreparedMedia,
    ProgressChannel, SegmentConfig, SegmentPreparer, ServerConfig, SessionManager, SourceAdapter,
    YouTubeAdapter,
};
use tracing::{Level, error, info};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::{Args, Commands};
use crate::error::{AppError, Result};
use crate::probe::FfprobeDurationProbe;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Commands::Download {
            url,
            server,
            quality,
            force_refresh,
            stable_id,
            no_push,
            max_segment_duration,
            skip_segments,
            output,
        } => {
            let resolved = source_resolver::classify(&url).ok_or_else(|| {
                AppError::InvalidInput(format!("`{url}` matches no supported source"))
            })?;
            info!(source = %resolved.kind, id = %resolved.id, "classified URL");

            let config = EngineConfig::default();
            let mut server_config = match resolved.kind {
                SourceKind::YouTube => config.youtube.clone(),
                SourceKind::Douyin => config.douyin.clone(),
                SourceKind::Generic => config.generic.clone(),
            };
            if let Some(base) = server {
                server_config.base_url = base;
            }

            let params = DownloadParams {
                url,
                quality,
                force_refresh,
                // Reuse the id we just resolved so the session key matches
                // what we printed (generic ids are unique per resolution).
                stable_id: stable_id.unwrap_or_else(|| resolved.id.clone()),
                no_push,
                max_segment_duration,
                skip_segments,
                output,
            };
            match resolved.kind {
                SourceKind::YouTube => {
                    run_session(YouTubeAdapter, server_config, &config, params).await
                }
                SourceKind::Douyin => {
                    run_session(DouyinAdapter, server_config, &config, params).await
                }
                SourceKind::Generic => {
                    run_session(GenericAdapter, server_config, &config, params).await
                }
            }
        }

        Commands::Direct {
            url,
            server,
            quality,
            media_type,
            use_cookies,
            no_push,
            output,
        } => {
            let config = EngineConfig::default();
            let mut server_config = config.generic.clone();
            if let Some(base) = server {
                server_config.base_url = base;
            }
            let source = source_resolver::classify(&url)
                .map(|resolved| resolved.kind.as_str().to_string())
                .unwrap_or_else(|| "generic".to_string());
            run_direct(
                server_config,
                &config,
                url,
                DirectOptions {
                    media_type,
                    quality,
                    source,
                    use_cookies,
                },
                no_push,
                output,
            )
            .await
        }

        Commands::Classify { url } => {
            match source_resolver::classify(&url) {
                Some(resolved) => {
                    println!("source: {}", resolved.kind);
                    println!("id:     {}", resolved.id);
                }
                None => {
                    println!("`{url}` matches no supported source");
                }
            }
            Ok(())
        }
    }
}

struct DownloadParams {
    url: String,
    quality: String,
    force_refresh: bool,
    stable_id: String,
    no_push: bool,
    max_segment_duration: f64,
    skip_segments: bool,
    output: Option<PathBuf>,
}

async fn run_session<A: SourceAdapter>(
    adapter: A,
    server_config: ServerConfig,
    config: &EngineConfig,
    params: DownloadParams,
) -> Result<()> {
    let http = Arc::new(HttpMediaServer::new(&server_config)?);
    let channel_config = ChannelConfig {
        enable_push: !params.no_push,
        ws_url: Some(http.websocket_url()),
        ..config.channel.clone()
    };
    let server: Arc<dyn MediaServer> = http;
    let channel = Arc::new(ProgressChannel::new(server.clone(), channel_config));
    let manager = Arc::new(SessionManager::new(
        adapter,
        server.clone(),
        channel,
        config.session.clone(),
    ));

    // Ctrl-C cancels the session; the server is told to abort its job.
    {
        let manager = manager.clone();
        let id = params.stable_id.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("Cancellation requested. Shutting down gracefully...");
                manager.cancel(&id).await;
            }
        });
    }

    let bar = progress_bar("downloading");
    let outcome = manager
        .start_download(
            &params.url,
            Some(bar_callback(&bar)),
            DownloadOptions {
                quality: Some(params.quality.clone()),
                force_refresh: params.force_refresh,
                stable_id: Some(params.stable_id.clone()),
            },
        )
        .await?;
    bar.finish_with_message("download complete");

    let materializer = Materializer::new(server.clone(), config.materialize.clone());
    let file = materializer.materialize(&outcome).await?;
    info!(name = %file.name, size = file.size(), "artifact materialized");

    if let Some(path) = &params.output {
        tokio::fs::write(path, &file.bytes).await?;
        println!(
            "Saved {} ({} bytes) to {}",
            file.name,
            file.size(),
            path.display()
        );
    }

    if params.skip_segments {
        return Ok(());
    }

    let preparer = SegmentPreparer::new(
        server,
        FfprobeDurationProbe::new(),
        MemoryStore::new(),
        SegmentConfig {
            max_segment_duration: params.max_segment_duration,
            ..config.segment.clone()
        },
    );
    let bar = progress_bar("splitting");
    let prepared = preparer.prepare(file, bar_callback(&bar)).await?;
    bar.finish_with_message("split complete");

    print_segments(&prepared);
    Ok(())
}

async fn run_direct(
    server_config: ServerConfig,
    config: &EngineConfig,
    url: String,
    options: DirectOptions,
    no_push: bool,
    output: Option<PathBuf>,
) -> Result<()> {
    let http = Arc::new(HttpMediaServer::new(&server_config)?);
    let channel_config = ChannelConfig {
        enable_push: !no_push,
        ws_url: Some(http.websocket_url()),
        ..config.channel.clone()
    };
    let server: Arc<dyn MediaServer> = http;
    let channel = Arc::new(ProgressChannel::new(server.clone(), channel_config));
    let materializer = Materializer::new(server.clone(), config.materialize.clone());
    let downloader = DirectDownloader::new(server, channel, materializer);

    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("Cancellation requested. Shutting down gracefully...");
                token.cancel();
            }
        });
    }

    let bar = progress_bar("downloading");
    let file = downloader
        .download(&url, &options, Some(bar_callback(&bar)), &token)
        .await?;
    bar.finish_with_message("download complete");

    match output {
        Some(path) => {
            tokio::fs::write(&path, &file.bytes).await?;
            println!(
                "Saved {} ({} bytes) to {}",
                file.name,
                file.size(),
                path.display()
            );
        }
        None => {
            println!("Downloaded {} ({} bytes)", file.name, file.size());
        }
    }
    Ok(())
}

fn print_segments(prepared: &PreparedMedia) {
    println!();
    println!(
        "{} segments over {} of video:",
        prepared.segments.len(),
        prep_common::clock::format_clock(prepared.duration)
    );
    for segment in &prepared.segments {
        println!(
            "  #{:<3} {:<17} {}",
            segment.index + 1,
            segment.time_range,
            segment.state.message()
        );
    }
}

fn progress_bar(label: &str) -> ProgressBar {
    let bar = ProgressBar::new(100);
    if let Ok(style) = ProgressStyle::with_template("{msg:24} [{bar:40.cyan/blue}] {pos:>3}%") {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar.set_message(label.to_string());
    bar
}

fn bar_callback(bar: &ProgressBar) -> ProgressFn {
    let bar = bar.clone();
    Arc::new(move |update: ProgressUpdate| {
        bar.set_position(u64::from(update.percent));
        if let Some(phase) = update.phase {
            bar.set_message(phase);
        }
    })
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
}
