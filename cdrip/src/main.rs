use cdrip_core::album::Album;
use cdrip_core::cddb::{format_for_abcde, parse_record, CddbClient, CddbRecord};
use cdrip_core::config::Config;
use cdrip_core::credentials::read_token;
use cdrip_core::discogs::{DiscogsClient, DiscogsInfo};
use cdrip_core::lastfm::LastFmClient;
use cdrip_core::musicbrainz::{MbRelease, MusicBrainzClient};
use cdrip_core::rip::{CdRipper, RipProgress};
use cdrip_core::text_encoding::read_text_file;
use cdrip_core::toc::{parse_cd_discid_output, read_toc, DiscToc};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

type CliResult = Result<(), Box<dyn Error>>;

/// Identify, look up, rip and tag audio CDs.
#[derive(Parser)]
#[command(name = "cdrip", version)]
struct Args {
    /// CD device to read from (default /dev/cdrom).
    #[arg(long, global = true, env = "CDRIP_DEVICE")]
    device: Option<String>,

    /// Use this TOC instead of reading the drive: "<n> <offset 1> ... <offset n> <leadout>".
    #[arg(long, global = true, value_name = "TOC")]
    toc: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the disc's MusicBrainz id, FreeDB id and track count.
    Info,

    /// Look the disc up in gnudb.
    Gnudb {
        /// Print the raw xmcd record.
        #[arg(long)]
        raw: bool,

        /// Print the record as abcde shell variables.
        #[arg(long, conflicts_with = "raw")]
        abcde: bool,

        /// Read this category directly, skipping the query.
        #[arg(long, requires = "disc_id")]
        category: Option<String>,

        /// Disc id to read together with --category.
        #[arg(long, requires = "category")]
        disc_id: Option<String>,
    },

    /// Look the disc up in MusicBrainz.
    Musicbrainz {
        /// List the tracks of the first release.
        #[arg(long)]
        tracks: bool,

        /// Add genre, style, year and cover from Discogs.
        #[arg(long)]
        discogs: bool,

        /// Show the artist's MusicBrainz tags.
        #[arg(long)]
        tags: bool,
    },

    /// Show Last.fm tags for an album.
    Lastfm { artist: String, album: String },

    /// Rip, encode and tag the disc using its gnudb record.
    Rip {
        /// Where FLAC files go.
        #[arg(long, env = "CDRIP_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,

        /// Use a saved xmcd record instead of querying gnudb.
        #[arg(long)]
        record: Option<PathBuf>,
    },
}

fn configure_logging() {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_line_number(true)
        .with_target(false)
        .with_file(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() {
    configure_logging();
    let args = Args::parse();

    let config = Config::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {e}");
        std::process::exit(1);
    });

    if let Err(e) = run(args, config).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(args: Args, config: Config) -> CliResult {
    let device = args.device.unwrap_or_else(|| config.device.clone());
    let toc = args.toc;
    match args.command {
        Command::Info => {
            let disc = disc_toc(&device, toc.as_deref()).await?;
            print_disc_info(&disc);
        }
        Command::Gnudb {
            raw,
            abcde,
            category,
            disc_id,
        } => {
            let client = CddbClient::new(&config.gnudb_url, &config.hello);
            let record = match (category, disc_id) {
                (Some(category), Some(disc_id)) => client.read(&category, &disc_id).await,
                _ => {
                    let disc = disc_toc(&device, toc.as_deref()).await?;
                    client.lookup(&disc).await
                }
            };
            let Some(raw_record) = record else {
                println!("No gnudb match found");
                return Ok(());
            };
            if raw {
                println!("{}", raw_record.trim_end());
            } else if abcde {
                println!("{}", format_for_abcde(&parse_record(&raw_record)));
            } else {
                print_record(&parse_record(&raw_record));
            }
        }
        Command::Musicbrainz {
            tracks,
            discogs,
            tags,
        } => {
            let disc = disc_toc(&device, toc.as_deref()).await?;
            print_disc_info(&disc);
            musicbrainz(&config, &disc, tracks, discogs, tags).await?;
        }
        Command::Lastfm { artist, album } => {
            let api_key = read_token(&config.lastfm_token_path)?;
            let tags = LastFmClient::new(api_key)
                .album_tags(&artist, &album)
                .await?;
            println!("{} - {}", artist, album);
            if tags.is_empty() {
                println!("  Tags: None");
            } else {
                println!("  Tags: {}", tags.join(", "));
            }
        }
        Command::Rip { output_dir, record } => {
            let raw_record = match record {
                Some(path) => read_text_file(&path)?,
                None => {
                    let disc = disc_toc(&device, toc.as_deref()).await?;
                    CddbClient::new(&config.gnudb_url, &config.hello)
                        .lookup(&disc)
                        .await
                        .ok_or("No gnudb match found; pass --record with a saved xmcd record")?
                }
            };
            let album = Album::from_record(&parse_record(&raw_record));
            let output_dir = output_dir.unwrap_or_else(|| config.output_dir.clone());
            rip(&device, output_dir, &album).await?;
        }
    }
    Ok(())
}

async fn disc_toc(device: &str, toc: Option<&str>) -> Result<DiscToc, Box<dyn Error>> {
    let disc = match toc {
        Some(text) => parse_cd_discid_output(text)?,
        None => {
            info!("Reading TOC from {}", device);
            read_toc(device).await?
        }
    };
    Ok(disc)
}

fn print_disc_info(disc: &DiscToc) {
    println!("Disc ID:      {}", disc.musicbrainz_id());
    println!("FreeDB ID:    {}", disc.freedb_id());
    println!("Tracks:       {}", disc.track_count());
    println!();
}

fn print_record(record: &CddbRecord) {
    println!("Artist: {}", record.artist);
    println!("Album:  {}", record.album);
    println!("Year:   {}", record.year.as_deref().unwrap_or(""));
    println!("Genre:  {}", record.genre.as_deref().unwrap_or(""));
    println!("Tracks:");
    for track in &record.tracks {
        println!("  {:02} - {}", track.number, track.title);
    }
}

async fn musicbrainz(
    config: &Config,
    disc: &DiscToc,
    tracks: bool,
    discogs: bool,
    tags: bool,
) -> CliResult {
    let client = MusicBrainzClient::new(&config.musicbrainz_contact)?;
    let releases = client.lookup_by_discid(&disc.musicbrainz_id()).await?;
    let Some(first) = releases.first() else {
        println!("No MusicBrainz releases found");
        return Ok(());
    };
    print_releases(&releases);

    if tracks {
        print_tracks(first);
    }

    if discogs {
        println!("Discogs lookup...");
        match discogs_info(config, first).await {
            Ok(Some(info)) => print_discogs_info(&info),
            Ok(None) => println!("  No Discogs match found"),
            Err(e) => {
                warn!("Discogs lookup failed: {e}");
                println!("  Discogs lookup failed: {e}");
            }
        }
    }

    if tags {
        println!("Artist tags:");
        let Some(artist_id) = first.artist_id.as_deref() else {
            println!("  None");
            return Ok(());
        };
        match client.artist_tags(artist_id).await {
            Ok(artist_tags) if artist_tags.is_empty() => println!("  None"),
            Ok(artist_tags) => {
                for tag in artist_tags {
                    println!("  {} (count: {})", tag.name, tag.count);
                }
            }
            Err(e) => {
                warn!("MusicBrainz tag lookup failed: {e}");
                println!("  Tag lookup failed: {e}");
            }
        }
    }
    Ok(())
}

async fn discogs_info(
    config: &Config,
    release: &MbRelease,
) -> Result<Option<DiscogsInfo>, Box<dyn Error>> {
    let token = read_token(&config.discogs_token_path)?;
    Ok(DiscogsClient::new(token)
        .lookup(&release.artist, &release.title)
        .await?)
}

fn print_releases(releases: &[MbRelease]) {
    println!("Found {} release(s):", releases.len());
    for (i, release) in releases.iter().enumerate() {
        println!("  {}. {} - {}", i + 1, release.artist, release.title);
    }
    println!();
}

fn print_tracks(release: &MbRelease) {
    println!("Track listing:");
    for track in &release.tracks {
        println!("  {:02} - {}", track.number, track.title);
    }
    println!();
}

fn print_discogs_info(info: &DiscogsInfo) {
    let or_none = |value: Option<String>| value.unwrap_or_else(|| "None".to_string());
    println!("  Genre: {}", or_none(info.genre.clone()));
    println!("  Style: {}", or_none(info.style.clone()));
    println!("  Year:  {}", or_none(info.year.map(|y| y.to_string())));
    println!("  Cover: {}", or_none(info.cover_url.clone()));
}

async fn rip(device: &str, output_dir: PathBuf, album: &Album) -> CliResult {
    println!("{} - {}", album.album_artist, album.title);
    let ripper = CdRipper::new(device, output_dir);

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<RipProgress>();
    let progress = tokio::spawn(async move {
        while let Some(update) = progress_rx.recv().await {
            println!("  [{:>3}%] track {:02}", update.percent, update.track_number);
        }
    });

    let results = ripper.rip_album(album, Some(progress_tx)).await;
    // rip_album drops the sender when it returns, ending the printer task
    wait_for_printer(progress).await;
    let results = results?;

    println!(
        "Ripped {} track(s) into {}",
        results.len(),
        ripper.output_dir().display()
    );
    Ok(())
}

async fn wait_for_printer(printer: tokio::task::JoinHandle<()>) {
    if let Err(e) = printer.await {
        warn!("Progress printer task failed: {e}");
    }
}
