//! CD ripping: cdparanoia to WAV, flac to FLAC, then tags
use crate::album::{Album, AlbumTrack};
use crate::tagging::{write_tags, TagError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RipError {
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        source: std::io::Error,
    },
    #[error("{tool} failed on track {track}: {status}")]
    Tool {
        tool: String,
        track: u32,
        status: ExitStatus,
    },
    #[error("Tagging error: {0}")]
    Tag(#[from] TagError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Task failed: {0}")]
    Task(String),
}

/// Progress update during ripping
#[derive(Debug, Clone)]
pub struct RipProgress {
    /// Overall album progress (0-100%)
    pub percent: u8,
    pub track_number: u32,
}

/// Result of ripping a single track
#[derive(Debug, Clone)]
pub struct RipResult {
    pub track_number: u32,
    pub output_path: PathBuf,
    pub bytes_written: u64,
}

/// Rips through the `cdparanoia` and `flac` binaries
pub struct CdRipper {
    device: String,
    output_dir: PathBuf,
    cdparanoia: OsString,
    flac: OsString,
}

impl CdRipper {
    pub fn new(device: impl Into<String>, output_dir: PathBuf) -> Self {
        Self {
            device: device.into(),
            output_dir,
            cdparanoia: "cdparanoia".into(),
            flac: "flac".into(),
        }
    }

    /// Use other binaries in place of `cdparanoia` and `flac`
    pub fn with_tools(mut self, cdparanoia: impl Into<OsString>, flac: impl Into<OsString>) -> Self {
        self.cdparanoia = cdparanoia.into();
        self.flac = flac.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Rip, encode and tag every track of the album
    pub async fn rip_album(
        &self,
        album: &Album,
        progress_tx: Option<mpsc::UnboundedSender<RipProgress>>,
    ) -> Result<Vec<RipResult>, RipError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let total_tracks = album.total_tracks();
        info!(
            "Starting to rip {} tracks of {} - {} into {}",
            total_tracks,
            album.album_artist,
            album.title,
            self.output_dir.display()
        );
        let mut results = Vec::with_capacity(total_tracks);
        for (idx, track) in album.tracks.iter().enumerate() {
            info!("Ripping track {} ({}/{})", track.number, idx + 1, total_tracks);
            let result = self.rip_track(album, track).await?;
            info!(
                "Track {} done, {} bytes written to {}",
                track.number,
                result.bytes_written,
                result.output_path.display()
            );
            results.push(result);
            if let Some(ref tx) = progress_tx {
                let percent = (((idx + 1) * 100) / total_tracks) as u8;
                let _ = tx.send(RipProgress {
                    percent,
                    track_number: track.number,
                });
            }
        }
        info!("All tracks ripped successfully");
        Ok(results)
    }

    async fn rip_track(&self, album: &Album, track: &AlbumTrack) -> Result<RipResult, RipError> {
        let wav_path = self.wav_path(track);
        let flac_path = self.flac_path(track);

        self.run(
            &self.cdparanoia,
            cdparanoia_args(&self.device, track.number, &wav_path),
            track.number,
        )
        .await?;
        self.run(&self.flac, flac_args(&wav_path, &flac_path), track.number)
            .await?;

        tag_flac(flac_path.clone(), album.clone(), track.clone()).await?;

        if let Err(e) = tokio::fs::remove_file(&wav_path).await {
            warn!("Could not remove {}: {}", wav_path.display(), e);
        }
        let bytes_written = tokio::fs::metadata(&flac_path).await?.len();
        Ok(RipResult {
            track_number: track.number,
            output_path: flac_path,
            bytes_written,
        })
    }

    async fn run(&self, tool: &OsString, args: Vec<OsString>, track: u32) -> Result<(), RipError> {
        let tool_name = tool.to_string_lossy().into_owned();
        debug!("Running {} {:?}", tool_name, args);
        let status = Command::new(tool)
            .args(&args)
            .status()
            .await
            .map_err(|source| RipError::Spawn {
                tool: tool_name.clone(),
                source,
            })?;
        if !status.success() {
            return Err(RipError::Tool {
                tool: tool_name,
                track,
                status,
            });
        }
        Ok(())
    }

    pub fn wav_path(&self, track: &AlbumTrack) -> PathBuf {
        self.output_dir.join(format!("track{:02}.wav", track.number))
    }

    pub fn flac_path(&self, track: &AlbumTrack) -> PathBuf {
        self.output_dir.join(format!("{}.flac", track.file_stem()))
    }
}

/// metaflac does blocking file IO, so tagging runs off the async workers
async fn tag_flac(path: PathBuf, album: Album, track: AlbumTrack) -> Result<(), RipError> {
    tokio::task::spawn_blocking(move || write_tags(&path, &album, &track))
        .await
        .map_err(|e| RipError::Task(e.to_string()))??;
    Ok(())
}

pub fn cdparanoia_args(device: &str, track: u32, wav_path: &Path) -> Vec<OsString> {
    vec![
        "-d".into(),
        device.into(),
        track.to_string().into(),
        wav_path.into(),
    ]
}

pub fn flac_args(wav_path: &Path, flac_path: &Path) -> Vec<OsString> {
    vec![
        "--best".into(),
        "--silent".into(),
        "-f".into(),
        "-o".into(),
        flac_path.into(),
        wav_path.into(),
    ]
}
