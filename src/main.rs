#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![warn(clippy::perf)]
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![allow(clippy::multiple_crate_versions)]

use std::{net::IpAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, builder::BoolishValueParser};
use playlist::PlaylistAssembler;
use resolver::{ResolverConfig, StreamResolver};
use source::SourceFetcher;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use util::{init_http_client, spawn_ct_watcher};
use ytdlp::YtDlp;

pub mod cache;
pub mod error;
pub mod m3u;
pub mod playlist;
pub mod resolver;
pub mod server;
pub mod source;
pub mod util;
pub mod ytdlp;

/// Serves an IPTV M3U playlist built from a remote JSON playlist
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// URL of the JSON source playlist
    #[arg(long, env = "PLAYLIST_URL")]
    playlist_url: Option<String>,

    /// Skip YouTube items instead of resolving them with yt-dlp
    #[arg(long, env = "YT_DISABLE", action = ArgAction::Set, value_parser = BoolishValueParser::new(), default_value_t = false)]
    yt_disable: bool,

    /// yt-dlp executable
    #[arg(long, env = "YTDLP_PATH", default_value = "yt-dlp")]
    ytdlp_path: String,

    /// Seconds a downloaded source playlist is reused
    #[arg(long, env = "SOURCE_CACHE_TTL", default_value_t = 60)]
    source_ttl: u64,

    /// Seconds a resolved YouTube stream URL is reused
    #[arg(long, env = "RESOLVE_CACHE_TTL", default_value_t = 60 * 60)]
    resolve_ttl: u64,

    /// Seconds allowed for downloading the source playlist
    #[arg(long, env = "FETCH_TIMEOUT", default_value_t = 15)]
    fetch_timeout: u64,

    /// Seconds allowed for a single yt-dlp run
    #[arg(long, env = "RESOLVE_TIMEOUT", default_value_t = 60)]
    resolve_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let client = init_http_client(Duration::from_secs(args.fetch_timeout))?;
    if args.playlist_url.is_none() {
        warn!("PLAYLIST_URL is not set. Every /m3u request will fail until it is configured");
    }

    let ytdlp = YtDlp::new(args.ytdlp_path.as_str());
    if args.yt_disable {
        info!("YouTube resolution is disabled, YouTube items will be skipped");
    } else if !ytdlp.is_installed().await {
        warn!(
            "`{}` is not installed or available in PATH! YouTube items will be skipped",
            args.ytdlp_path
        );
    }

    let assembler = PlaylistAssembler::new(
        SourceFetcher::new(
            client,
            args.playlist_url,
            Duration::from_secs(args.source_ttl),
        ),
        StreamResolver::new(
            Arc::new(ytdlp),
            ResolverConfig {
                youtube_disabled: args.yt_disable,
                cache_ttl: Duration::from_secs(args.resolve_ttl),
                timeout: Duration::from_secs(args.resolve_timeout),
                ..ResolverConfig::default()
            },
        ),
    );

    let ct = CancellationToken::new();
    spawn_ct_watcher(ct.clone());

    let listener = TcpListener::bind((args.host, args.port))
        .await
        .with_context(|| format!("Launching HTTP server on {}:{}", args.host, args.port))?;
    info!("M3U maker running on {}", listener.local_addr()?);

    axum::serve(listener, server::router(Arc::new(assembler)))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .context("Serving HTTP")?;

    info!("Shut down cleanly");
    Ok(())
}
