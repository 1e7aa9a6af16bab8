mod config;
mod error;
mod lrc;
mod model;
mod normalize;
mod output;
mod provider;
mod util;

use anyhow::Context;
use clap::{Parser, Subcommand};

use model::{SearchSource, SearchType};
use provider::Resolvers;

/// Providers reject default client identifiers; present a desktop browser.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

#[derive(Debug, Parser)]
#[command(name = "verse", version, about = "Resolve music ids and share links to metadata and synced lyrics")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Provider hint when the input doesn't reveal one: netease, qq, soda.
    #[arg(long, default_value = "netease")]
    source: String,

    /// Resource-type hint: song, album, playlist.
    #[arg(long = "type", default_value = "song")]
    search_type: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a song and print its metadata.
    Song { input: String },
    /// Fetch lyrics for a song.
    Lyric {
        input: String,
        /// Prefer word-by-word lyrics where the provider offers them.
        #[arg(long)]
        verbatim: bool,
    },
    /// Print the direct playable media URL for a song.
    Link { input: String },
    /// Search a provider by keyword.
    Search { keyword: String },
    /// List the songs of an album.
    Album { input: String },
    /// List the songs of a playlist.
    Playlist { input: String },
    /// Preview the output file name for a song.
    Name {
        input: String,
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
}

fn parse_source(s: &str) -> anyhow::Result<SearchSource> {
    match s {
        "netease" => Ok(SearchSource::Netease),
        "qq" => Ok(SearchSource::QqMusic),
        "soda" => Ok(SearchSource::Soda),
        other => anyhow::bail!("unknown source '{other}' (expected netease, qq or soda)"),
    }
}

fn parse_type(s: &str) -> anyhow::Result<SearchType> {
    match s {
        "song" => Ok(SearchType::Song),
        "album" => Ok(SearchType::Album),
        "playlist" => Ok(SearchType::Playlist),
        other => anyhow::bail!("unknown type '{other}' (expected song, album or playlist)"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;

    let hint_source = parse_source(&cli.source)?;
    let hint_type = parse_type(&cli.search_type)?;

    let http = reqwest::Client::builder()
        .user_agent(BROWSER_USER_AGENT)
        .timeout(std::time::Duration::from_secs(cfg.http.timeout_secs))
        .build()
        .context("build http client")?;
    let resolvers = Resolvers::new(http.clone(), &cfg);

    match cli.command {
        Command::Song { input } => {
            let id = normalize::normalize(&http, &input, hint_source, hint_type).await?;
            let songs = resolvers.api(id.source).fetch_songs(&[id.id.clone()]).await?;
            let song = songs
                .get(&id.id)
                .cloned()
                .unwrap_or(Err(error::ApiError::SongNotFound))?;
            print_song(&song);
        }
        Command::Lyric { input, verbatim } => {
            let id = normalize::normalize(&http, &input, hint_source, hint_type).await?;
            let lyric = resolvers.api(id.source).fetch_lyric(&id.id, verbatim).await?;
            println!("{}", lyric.lyric);
            if let Some(trans) = &lyric.translate {
                println!("\n--- translation ---\n{trans}");
            }
            if let Some(roma) = &lyric.transliteration {
                println!("\n--- transliteration ---\n{roma}");
            }
        }
        Command::Link { input } => {
            let id = normalize::normalize(&http, &input, hint_source, hint_type).await?;
            let link = resolvers.api(id.source).fetch_link(&id.id).await?;
            println!("{link}");
        }
        Command::Search { keyword } => {
            let result = resolvers.api(hint_source).search(&keyword, hint_type).await?;
            for (i, s) in result.songs.iter().enumerate() {
                println!(
                    "{:02}. {} — {}  [{}]  ({})",
                    i + 1,
                    s.title,
                    s.author.join(", "),
                    s.album,
                    s.display_id
                );
            }
        }
        Command::Album { input } => {
            let id = normalize::normalize(&http, &input, hint_source, SearchType::Album).await?;
            let album = resolvers.api(id.source).fetch_album(&id.id).await?;
            println!("{}", album.name);
            print_entries(&album.songs);
        }
        Command::Playlist { input } => {
            let id = normalize::normalize(&http, &input, hint_source, SearchType::Playlist).await?;
            let playlist = resolvers.api(id.source).fetch_playlist(&id.id).await?;
            println!("{}", playlist.name);
            print_entries(&playlist.songs);
        }
        Command::Name { input, index } => {
            let id = normalize::normalize(&http, &input, hint_source, hint_type).await?;
            let songs = resolvers.api(id.source).fetch_songs(&[id.id.clone()]).await?;
            let song = songs
                .get(&id.id)
                .cloned()
                .unwrap_or(Err(error::ApiError::SongNotFound))?;
            println!(
                "{}",
                output::output_name(
                    &song,
                    index,
                    &cfg.output.file_name_format,
                    &cfg.output.singer_separator
                )
            );
        }
    }

    Ok(())
}

fn print_song(song: &model::Song) {
    println!("{}", song.name);
    println!("  singer:   {}", song.singer.join(", "));
    println!("  album:    {}", song.album);
    println!(
        "  duration: {}:{:02}",
        song.duration_ms / 60_000,
        (song.duration_ms / 1000) % 60
    );
    println!("  id:       {}", song.display_id);
    if let Some(link) = &song.link {
        println!("  link:     {link}");
    }
}

fn print_entries(songs: &[model::SimpleSong]) {
    for (i, s) in songs.iter().enumerate() {
        println!("{:02}. {} — {}  ({})", i + 1, s.name, s.singer.join(", "), s.display_id);
    }
}
