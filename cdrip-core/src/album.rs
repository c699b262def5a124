//! Album view of a CDDB record, shaped for tagging and file naming.
use crate::cddb::CddbRecord;

pub const VARIOUS_ARTISTS: &str = "Various";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumTrack {
    pub number: u32,
    pub title: String,
    pub artist: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub artist: String,
    pub album_artist: String,
    pub title: String,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub tracks: Vec<AlbumTrack>,
}

impl Album {
    pub fn from_record(record: &CddbRecord) -> Self {
        let artist = non_empty_or(&record.artist, "Unknown Artist");
        let title = non_empty_or(&record.album, "Unknown Album");
        let tracks: Vec<AlbumTrack> = record
            .tracks
            .iter()
            .map(|track| {
                let (track_artist, track_title) = split_track_artist(&track.title, &artist);
                AlbumTrack {
                    number: track.number,
                    title: track_title,
                    artist: track_artist.unwrap_or_else(|| artist.clone()),
                }
            })
            .collect();
        let album_artist = if tracks.iter().any(|t| t.artist != artist) {
            VARIOUS_ARTISTS.to_string()
        } else {
            artist.clone()
        };
        Self {
            artist,
            album_artist,
            title,
            year: record.year.clone(),
            genre: record.genre.clone(),
            tracks,
        }
    }

    pub fn total_tracks(&self) -> usize {
        self.tracks.len()
    }
}

impl AlbumTrack {
    /// `NN - Artist - Title`, safe to use as a file name
    pub fn file_stem(&self) -> String {
        sanitize_file_name(&format!(
            "{:02} - {} - {}",
            self.number, self.artist, self.title
        ))
    }
}

/// Compilation records title tracks `Track Artist - Title`.
///
/// The split is skipped when the prefix is the album artist itself or looks
/// like a part number (`Part 1 - ...`).
pub fn split_track_artist(title: &str, album_artist: &str) -> (Option<String>, String) {
    let title = title.trim();
    match title.split_once(" - ") {
        Some((prefix, rest)) if prefix != album_artist && !prefix.starts_with("Part") => {
            (Some(prefix.trim().to_string()), rest.trim().to_string())
        }
        _ => (None, title.to_string()),
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.trim().to_string()
    }
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '-',
            c => c,
        })
        .collect()
}
