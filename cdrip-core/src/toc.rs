//! Disc table of contents and the two disc ids derived from it.
//!
//! Offsets are in CD frames (75 per second) and include the 150-frame
//! lead-in, the same convention libdiscid and `cd-discid --musicbrainz` use.
use base64::{engine::general_purpose, Engine as _};
use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::info;

pub const FRAMES_PER_SECOND: u32 = 75;

#[derive(Debug, Error)]
pub enum TocError {
    #[error("Invalid TOC: {0}")]
    Invalid(String),
    #[error("Failed to read disc in {device}: {message}")]
    Read { device: String, message: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Table of contents of an audio CD
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscToc {
    pub first_track: u8,
    /// Start offset of every track, in frames
    pub offsets: Vec<u32>,
    /// Lead-out offset in frames (total disc length)
    pub leadout: u32,
}

impl DiscToc {
    pub fn new(first_track: u8, offsets: Vec<u32>, leadout: u32) -> Result<Self, TocError> {
        if offsets.is_empty() {
            return Err(TocError::Invalid("disc has no tracks".to_string()));
        }
        if first_track == 0 || first_track as usize + offsets.len() - 1 > 99 {
            return Err(TocError::Invalid(format!(
                "track numbers {}..{} out of range",
                first_track,
                first_track as usize + offsets.len() - 1
            )));
        }
        if offsets.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(TocError::Invalid(
                "track offsets are not ascending".to_string(),
            ));
        }
        let last_offset = offsets[offsets.len() - 1];
        if leadout <= last_offset {
            return Err(TocError::Invalid(format!(
                "lead-out {} is not after last track offset {}",
                leadout, last_offset
            )));
        }
        Ok(Self {
            first_track,
            offsets,
            leadout,
        })
    }

    pub fn track_count(&self) -> usize {
        self.offsets.len()
    }

    pub fn last_track(&self) -> u8 {
        self.first_track + (self.offsets.len() - 1) as u8
    }

    /// Disc length in whole seconds, as sent in a CDDB query
    pub fn total_seconds(&self) -> u32 {
        self.leadout / FRAMES_PER_SECOND
    }

    /// FreeDB/CDDB disc id as 8 lowercase hex digits
    pub fn freedb_id(&self) -> String {
        let checksum: u32 = self
            .offsets
            .iter()
            .map(|offset| digit_sum(offset / FRAMES_PER_SECOND))
            .sum();
        let length = self.total_seconds() - self.offsets[0] / FRAMES_PER_SECOND;
        let id = ((checksum % 0xff) << 24) | (length << 8) | self.last_track() as u32;
        format!("{:08x}", id)
    }

    /// MusicBrainz disc id (28 characters, URL-safe base64 of a SHA-1)
    pub fn musicbrainz_id(&self) -> String {
        let mut toc_string = String::with_capacity(4 + 8 * 100);
        toc_string.push_str(&format!("{:02X}", self.first_track));
        toc_string.push_str(&format!("{:02X}", self.last_track()));
        toc_string.push_str(&format!("{:08X}", self.leadout));
        for track_num in 1..=99u8 {
            let offset = track_num
                .checked_sub(self.first_track)
                .and_then(|idx| self.offsets.get(idx as usize))
                .copied()
                .unwrap_or(0);
            toc_string.push_str(&format!("{:08X}", offset));
        }

        let mut hasher = Sha1::new();
        hasher.update(toc_string.as_bytes());
        general_purpose::STANDARD
            .encode(hasher.finalize())
            .replace('+', ".")
            .replace('/', "_")
            .replace('=', "-")
    }
}

fn digit_sum(mut n: u32) -> u32 {
    let mut sum = 0;
    while n > 0 {
        sum += n % 10;
        n /= 10;
    }
    sum
}

/// Parse `<n> <offset 1> ... <offset n> <leadout>`, the output of
/// `cd-discid --musicbrainz` and the format of the `--toc` CLI flag.
pub fn parse_cd_discid_output(text: &str) -> Result<DiscToc, TocError> {
    let numbers = text
        .split_whitespace()
        .map(|token| {
            token
                .parse::<u32>()
                .map_err(|e| TocError::Invalid(format!("bad number '{}': {}", token, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let (&count, rest) = numbers
        .split_first()
        .ok_or_else(|| TocError::Invalid("empty TOC".to_string()))?;
    if rest.len() != count as usize + 1 {
        return Err(TocError::Invalid(format!(
            "expected {} offsets and a lead-out, got {} values",
            count,
            rest.len()
        )));
    }
    let (&leadout, offsets) = rest
        .split_last()
        .ok_or_else(|| TocError::Invalid("missing lead-out".to_string()))?;
    DiscToc::new(1, offsets.to_vec(), leadout)
}

/// Read the TOC of the disc in `device`
#[cfg(feature = "libdiscid")]
pub async fn read_toc(device: &str) -> Result<DiscToc, TocError> {
    let device_owned = device.to_string();
    let (first_track, offsets, leadout) = tokio::task::spawn_blocking(move || {
        discid::DiscId::read(Some(&device_owned)).map(|disc| {
            let offsets: Vec<u32> = disc.tracks().map(|track| track.offset as u32).collect();
            (disc.first_track_num() as u8, offsets, disc.sectors() as u32)
        })
    })
    .await
    .map_err(|e| TocError::Read {
        device: device.to_string(),
        message: format!("task failed: {}", e),
    })?
    .map_err(|e| TocError::Read {
        device: device.to_string(),
        message: e.to_string(),
    })?;
    let toc = DiscToc::new(first_track, offsets, leadout)?;
    info!("Read TOC via libdiscid: {} tracks", toc.track_count());
    Ok(toc)
}

/// Read the TOC of the disc in `device`
#[cfg(not(feature = "libdiscid"))]
pub async fn read_toc(device: &str) -> Result<DiscToc, TocError> {
    tracing::debug!("Running cd-discid --musicbrainz {}", device);
    let output = tokio::process::Command::new("cd-discid")
        .arg("--musicbrainz")
        .arg(device)
        .output()
        .await?;
    if !output.status.success() {
        return Err(TocError::Read {
            device: device.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    let toc = parse_cd_discid_output(&String::from_utf8_lossy(&output.stdout))?;
    info!("Read TOC via cd-discid: {} tracks", toc.track_count());
    Ok(toc)
}
