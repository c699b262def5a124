use super::CddbRecord;

/// Render a record as abcde-style shell assignments.
///
/// Year and genre are only emitted when present.
pub fn format_for_abcde(record: &CddbRecord) -> String {
    let mut lines = vec![
        format!("ARTIST={}", shell_quote(&record.artist)),
        format!("ALBUM={}", shell_quote(&record.album)),
    ];
    if let Some(year) = &record.year {
        lines.push(format!("YEAR={}", shell_quote(year)));
    }
    if let Some(genre) = &record.genre {
        lines.push(format!("GENRE={}", shell_quote(genre)));
    }
    lines.push(format!("TRACKS={}", record.tracks.len()));
    for track in &record.tracks {
        lines.push(format!("TRACK{}={}", track.number, shell_quote(&track.title)));
    }
    lines.join("\n")
}

/// Single-quote for POSIX sh; `'` becomes `'\''`
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
