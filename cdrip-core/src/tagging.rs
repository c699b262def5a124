//! Vorbis comment tagging of ripped FLAC files
use crate::album::{Album, AlbumTrack};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TagError {
    #[error("FLAC metadata error: {0}")]
    Flac(#[from] metaflac::Error),
}

/// The Vorbis comments written for one track, in write order
pub fn track_comments(album: &Album, track: &AlbumTrack) -> Vec<(&'static str, String)> {
    let mut comments = vec![
        ("TITLE", track.title.clone()),
        ("ARTIST", track.artist.clone()),
        ("ALBUM", album.title.clone()),
        ("ALBUMARTIST", album.album_artist.clone()),
    ];
    if let Some(year) = &album.year {
        comments.push(("DATE", year.clone()));
    }
    if let Some(genre) = &album.genre {
        comments.push(("GENRE", genre.clone()));
    }
    comments.push(("TRACKNUMBER", track.number.to_string()));
    comments.push(("TOTALTRACKS", album.total_tracks().to_string()));
    comments
}

/// Replace the track's tags in an existing FLAC file
pub fn write_tags(path: &Path, album: &Album, track: &AlbumTrack) -> Result<(), TagError> {
    let mut tag = metaflac::Tag::read_from_path(path)?;
    for (key, value) in track_comments(album, track) {
        debug!("{}: {}={}", path.display(), key, value);
        tag.set_vorbis(key, vec![value]);
    }
    tag.save()?;
    Ok(())
}

/// `fLaC` marker plus a single, last STREAMINFO block and no frames
#[cfg(test)]
pub(crate) fn write_minimal_flac(path: &Path) {
    let mut bytes = b"fLaC".to_vec();
    bytes.extend_from_slice(&[0x80, 0x00, 0x00, 0x22]);
    let mut stream_info = [0u8; 34];
    // 4096-sample blocks, 44.1 kHz, stereo, 16 bit
    stream_info[0..2].copy_from_slice(&4096u16.to_be_bytes());
    stream_info[2..4].copy_from_slice(&4096u16.to_be_bytes());
    stream_info[10] = 0x0A;
    stream_info[11] = 0xC4;
    stream_info[12] = 0x42;
    stream_info[13] = 0xF0;
    bytes.extend_from_slice(&stream_info);
    std::fs::write(path, bytes).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cddb::parse_record;

    fn album() -> Album {
        Album::from_record(&parse_record(
            "DTITLE=Dire Straits / Dire Straits\nDYEAR=1978\nDGENRE=Rock\nTTITLE0=Down to the waterline\nTTITLE1=Water of love\n",
        ))
    }

    #[test]
    fn test_track_comments() {
        let album = album();
        let comments = track_comments(&album, &album.tracks[1]);
        assert_eq!(
            comments,
            vec![
                ("TITLE", "Water of love".to_string()),
                ("ARTIST", "Dire Straits".to_string()),
                ("ALBUM", "Dire Straits".to_string()),
                ("ALBUMARTIST", "Dire Straits".to_string()),
                ("DATE", "1978".to_string()),
                ("GENRE", "Rock".to_string()),
                ("TRACKNUMBER", "2".to_string()),
                ("TOTALTRACKS", "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_comments_skip_missing_year_and_genre() {
        let album = Album::from_record(&parse_record("DTITLE=A / B\nTTITLE0=x\n"));
        let keys: Vec<_> = track_comments(&album, &album.tracks[0])
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert!(!keys.contains(&"DATE"));
        assert!(!keys.contains(&"GENRE"));
    }

    #[test]
    fn test_write_tags_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("01.flac");
        write_minimal_flac(&path);
        let album = album();

        write_tags(&path, &album, &album.tracks[0]).unwrap();

        let tag = metaflac::Tag::read_from_path(&path).unwrap();
        let title: Vec<&str> = tag.get_vorbis("TITLE").unwrap().collect();
        assert_eq!(title, vec!["Down to the waterline"]);
        let total: Vec<&str> = tag.get_vorbis("TOTALTRACKS").unwrap().collect();
        assert_eq!(total, vec!["2"]);
    }

    #[test]
    fn test_write_tags_on_non_flac_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not.flac");
        std::fs::write(&path, b"RIFF....WAVE").unwrap();
        let album = album();
        assert!(write_tags(&path, &album, &album.tracks[0]).is_err());
    }
}
