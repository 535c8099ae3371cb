mod config;
mod error;
mod lyrics;
mod normalize;
mod preview;
mod video;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use crate::lyrics::{GeniusClient, MusixmatchClient};
use crate::preview::{AudioExtractor, PreviewSpec};
use crate::video::{VideoSearch, YoutubeApiSearch, YoutubeScrapeSearch};

#[derive(Debug, Parser)]
#[command(name = "songscout", version, about = "Locate a song's lyrics or audio across sources")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProviderArg {
    Genius,
    Musixmatch,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch cleaned lyrics and print as JSON.
    Lyrics {
        title: String,
        artist: String,
        #[arg(long, value_enum, default_value_t = ProviderArg::Genius)]
        provider: ProviderArg,
    },
    /// Search duration-matched video candidates and print as JSON.
    Search {
        title: String,
        artist: String,
        /// Target track duration in seconds.
        duration: u32,
        /// Scrape the results page instead of using the official API.
        #[arg(long)]
        scrape: bool,
    },
    /// Extract an audio preview clip from the best duration-matched candidate.
    Preview {
        title: String,
        artist: String,
        /// Target track duration in seconds.
        duration: u32,
        #[arg(long)]
        scrape: bool,
        /// Clip start offset in seconds.
        #[arg(long, default_value_t = 0.0)]
        start: f64,
        /// Clip length in seconds (5-90).
        #[arg(long, default_value_t = 30.0)]
        length: f64,
        /// Override the configured bitrate.
        #[arg(long)]
        bitrate: Option<u32>,
        /// Where to write the clip.
        #[arg(long, short)]
        out: std::path::PathBuf,
    },
    /// Store provider credentials in the config file.
    Auth {
        #[command(subcommand)]
        method: AuthCommand,
    },
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    /// Set the Genius API access token.
    Genius { token: String },
    /// Set the official video API key.
    Youtube { key: String },
    /// Set the pre-authorized browser profile directory for Musixmatch.
    MusixmatchProfile { path: std::path::PathBuf },
    /// Clear all stored credentials.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;

    match cli.command {
        Command::Lyrics { title, artist, provider } => {
            let result = match provider {
                ProviderArg::Genius => {
                    let token = cfg
                        .genius
                        .token()
                        .context("no genius token; run `songscout auth genius <token>`")?;
                    let client = GeniusClient::new(&token)?;
                    lyrics::fetch_lyrics(&client, &title, &artist).await?
                }
                ProviderArg::Musixmatch => {
                    let profile = cfg.musixmatch.profile_dir.as_deref().context(
                        "no musixmatch profile; run `songscout auth musixmatch-profile <dir>`",
                    )?;
                    let client = MusixmatchClient::new(profile, &cfg.tools.browser)?;
                    lyrics::fetch_lyrics(&client, &title, &artist).await?
                }
            };
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Search { title, artist, duration, scrape } => {
            let candidates = search_candidates(&cfg, &title, &artist, duration, scrape).await?;
            println!("{}", serde_json::to_string_pretty(&candidates)?);
        }
        Command::Preview { title, artist, duration, scrape, start, length, bitrate, out } => {
            let candidates = search_candidates(&cfg, &title, &artist, duration, scrape).await?;
            let urls: Vec<String> = candidates.into_iter().map(|c| c.url).collect();

            let spec = PreviewSpec {
                start_sec: start,
                length_sec: length,
                bitrate_kbps: bitrate.unwrap_or(cfg.preview.bitrate_kbps),
            };
            let extractor =
                AudioExtractor::new(&cfg.tools.yt_dlp, &cfg.tools.ffmpeg, &cfg.paths.work_dir)?;
            let artifact = extractor.extract(&urls, &spec).await?;

            std::fs::write(&out, &artifact.bytes)
                .with_context(|| format!("write {}", out.display()))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "out": out,
                    "durationSec": artifact.duration_sec,
                    "bitrateKbps": artifact.bitrate_kbps,
                    "codec": artifact.codec,
                    "sourceUrl": artifact.source_url,
                }))?
            );
        }
        Command::Auth { method } => {
            let mut cfg = cfg;
            match method {
                AuthCommand::Genius { token } => cfg.genius.access_token = Some(token),
                AuthCommand::Youtube { key } => cfg.youtube.api_key = Some(key),
                AuthCommand::MusixmatchProfile { path } => {
                    cfg.musixmatch.profile_dir = Some(path)
                }
                AuthCommand::Clear => {
                    cfg.genius.access_token = None;
                    cfg.youtube.api_key = None;
                    cfg.musixmatch.profile_dir = None;
                }
            }
            config::save(&cfg, cli.config.as_deref()).context("save config")?;
            println!("Updated config auth settings.");
        }
    }

    Ok(())
}

async fn search_candidates(
    cfg: &config::Config,
    title: &str,
    artist: &str,
    duration: u32,
    scrape: bool,
) -> anyhow::Result<Vec<video::VideoCandidate>> {
    let candidates = if scrape {
        let search = YoutubeScrapeSearch::new()?;
        search.search(title, artist, duration).await?
    } else {
        let key = cfg
            .youtube
            .key()
            .context("no youtube api key; run `songscout auth youtube <key>` or use --scrape")?;
        let search = YoutubeApiSearch::new(&key)?;
        search.search(title, artist, duration).await?
    };
    Ok(candidates)
}
