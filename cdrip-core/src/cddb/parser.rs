use super::CddbError;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// A CD holds at most 99 tracks, so `TTITLE` indices run 0..=98
const MAX_TRACKS: u32 = 99;

/// A disc picked out of a `cddb query` response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CddbMatch {
    pub category: String,
    pub disc_id: String,
    /// `Artist / Title` text that follows the id, when the server sent one
    pub description: Option<String>,
}

/// One `TTITLE<N>` entry, renumbered from 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CddbTrack {
    pub number: u32,
    pub title: String,
}

/// Album metadata parsed from a `cddb read` record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CddbRecord {
    pub artist: String,
    pub album: String,
    pub year: Option<String>,
    pub genre: Option<String>,
    pub tracks: Vec<CddbTrack>,
}

/// Three-digit code at the start of a response
pub(crate) fn status_code(body: &str) -> Option<u16> {
    let code = body.split_whitespace().next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

/// Interpret a `cddb query` response.
///
/// `200` carries the single match on the status line, `210`/`211` list
/// candidates on the following lines and the first one wins, `202` is a
/// plain miss. Anything else is an error for the caller to report.
pub fn parse_query_response(body: &str) -> Result<Option<CddbMatch>, CddbError> {
    let mut lines = body.lines().map(str::trim_end).filter(|l| !l.is_empty());
    let status_line = lines
        .next()
        .ok_or_else(|| CddbError::Protocol("empty query response".to_string()))?;
    let code = status_code(status_line)
        .ok_or_else(|| CddbError::Protocol(format!("no status code in '{}'", status_line)))?;
    match code {
        200 => {
            let rest = status_line.split_once(' ').map_or("", |(_, rest)| rest);
            parse_match_line(rest).map(Some)
        }
        210 | 211 => {
            let first = lines
                .find(|line| *line != ".")
                .ok_or_else(|| CddbError::Protocol(format!("{} without candidates", code)))?;
            parse_match_line(first).map(Some)
        }
        202 => {
            debug!("CDDB query: no match ({})", status_line);
            Ok(None)
        }
        _ => Err(CddbError::Status(status_line.to_string())),
    }
}

/// `<category> <disc_id> [Artist / Title]`
fn parse_match_line(line: &str) -> Result<CddbMatch, CddbError> {
    let mut parts = line.split_whitespace();
    let (Some(category), Some(disc_id)) = (parts.next(), parts.next()) else {
        return Err(CddbError::Protocol(format!(
            "match line without category and disc id: '{}'",
            line
        )));
    };
    let description = parts.collect::<Vec<_>>().join(" ");
    Ok(CddbMatch {
        category: category.to_string(),
        disc_id: disc_id.to_string(),
        description: (!description.is_empty()).then_some(description),
    })
}

/// Parse a raw xmcd record into album metadata.
///
/// Comment lines, blank lines, the status line and everything after the
/// `.` terminator are ignored. Repeated keys are concatenated, as CDDB
/// splits long values over several lines.
pub fn parse_record(raw: &str) -> CddbRecord {
    let mut fields: HashMap<&str, String> = HashMap::new();
    let mut titles: BTreeMap<u32, String> = BTreeMap::new();

    for line in raw.lines() {
        if line == "." {
            break;
        }
        // Dot-stuffed line
        let line = match line.strip_prefix('.') {
            Some(rest) if rest.starts_with('.') => rest,
            _ => line,
        };
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if let Some(index) = key.strip_prefix("TTITLE") {
            let number = Some(index)
                .filter(|i| !i.is_empty() && i.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|i| i.parse::<u32>().ok())
                .filter(|n| *n < MAX_TRACKS);
            match number {
                Some(n) => titles.entry(n).or_default().push_str(value),
                None => debug!("Ignoring malformed track key '{}'", key),
            }
        } else {
            fields.entry(key).or_default().push_str(value);
        }
    }

    let dtitle = fields.get("DTITLE").map(String::as_str).unwrap_or("");
    let (artist, album) = split_dtitle(dtitle);
    let year = non_empty(fields.get("DYEAR"))
        .or_else(|| fields.get("EXTD").and_then(|extd| extd_year(extd)));
    let genre = non_empty(fields.get("DGENRE"));

    CddbRecord {
        artist,
        album,
        year,
        genre,
        tracks: titles
            .into_iter()
            .map(|(n, title)| CddbTrack {
                number: n + 1,
                title,
            })
            .collect(),
    }
}

/// `Artist / Album`; a DTITLE without separator names both
pub fn split_dtitle(dtitle: &str) -> (String, String) {
    match dtitle.split_once(" / ") {
        Some((artist, album)) => (artist.trim().to_string(), album.trim().to_string()),
        None => (dtitle.trim().to_string(), dtitle.trim().to_string()),
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Pre-protocol-6 records keep the year in `EXTD= YEAR: 1978 ID3G: 17`
fn extd_year(extd: &str) -> Option<String> {
    let pos = extd.find("YEAR:")?;
    extd[pos + "YEAR:".len()..]
        .split_whitespace()
        .next()
        .filter(|year| year.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MUTTER: &str = "210 misc 940c700b CD database entry follows (until terminating `.')
# xmcd
#
# Track frame offsets:
#    150
#    25075
#
# Disc length: 3186 seconds
#
DISCID=940c700b
DTITLE=Rammstein / Mutter
DYEAR=2001
DGENRE=Industrial Metal
TTITLE0=Mein Herz brennt
TTITLE1=Links 2-3-4
TTITLE2=Sonne
TTITLE3=Ich will
TTITLE4=Feuer frei!
TTITLE5=Mutter
TTITLE6=Spieluhr
TTITLE7=Zwitter
TTITLE8=Rein raus
TTITLE9=Adios
TTITLE10=Nebel
EXTD=
EXTT0=
PLAYORDER=
.
";

    fn track(number: u32, title: &str) -> CddbTrack {
        CddbTrack {
            number,
            title: title.to_string(),
        }
    }

    #[test]
    fn test_parse_canonical_record() {
        let record = parse_record(MUTTER);
        let expected = CddbRecord {
            artist: "Rammstein".to_string(),
            album: "Mutter".to_string(),
            year: Some("2001".to_string()),
            genre: Some("Industrial Metal".to_string()),
            tracks: vec![
                track(1, "Mein Herz brennt"),
                track(2, "Links 2-3-4"),
                track(3, "Sonne"),
                track(4, "Ich will"),
                track(5, "Feuer frei!"),
                track(6, "Mutter"),
                track(7, "Spieluhr"),
                track(8, "Zwitter"),
                track(9, "Rein raus"),
                track(10, "Adios"),
                track(11, "Nebel"),
            ],
        };
        assert_eq!(record, expected);
    }

    #[test]
    fn test_parse_is_deterministic() {
        assert_eq!(parse_record(MUTTER), parse_record(MUTTER));
    }

    #[test]
    fn test_track_numbers_follow_key_order() {
        let record = parse_record("DTITLE=A / B\nTTITLE0=zero\nTTITLE2=two\nTTITLE1=one\n");
        assert_eq!(
            record.tracks,
            vec![track(1, "zero"), track(2, "one"), track(3, "two")]
        );
    }

    #[test]
    fn test_dtitle_split() {
        let record = parse_record("DTITLE=Artist / Album\n");
        assert_eq!(record.artist, "Artist");
        assert_eq!(record.album, "Album");

        let record = parse_record("DTITLE=OnlyOneField\n");
        assert_eq!(record.artist, "OnlyOneField");
        assert_eq!(record.album, "OnlyOneField");
    }

    #[test]
    fn test_dtitle_split_keeps_unspaced_slashes() {
        assert_eq!(
            split_dtitle("AC/DC / Back In Black"),
            ("AC/DC".to_string(), "Back In Black".to_string())
        );
    }

    #[test]
    fn test_missing_dtitle_gives_empty_names() {
        let record = parse_record("TTITLE0=Song\n");
        assert_eq!(record.artist, "");
        assert_eq!(record.album, "");
        assert_eq!(record.tracks, vec![track(1, "Song")]);
    }

    #[test]
    fn test_empty_year_and_genre_are_absent() {
        let record = parse_record("DTITLE=A / B\nDYEAR=\nDGENRE=   \n");
        assert_eq!(record.year, None);
        assert_eq!(record.genre, None);
    }

    #[test]
    fn test_year_from_extd_when_dyear_missing() {
        let record = parse_record("DTITLE=A / B\nDYEAR=\nEXTD= YEAR: 1978 ID3G: 17\n");
        assert_eq!(record.year.as_deref(), Some("1978"));

        let record = parse_record("DTITLE=A / B\nDYEAR=2001\nEXTD= YEAR: 1978\n");
        assert_eq!(record.year.as_deref(), Some("2001"));
    }

    #[test]
    fn test_continued_lines_are_concatenated() {
        let record = parse_record(
            "DTITLE=Some Artist / A Very Long\nDTITLE= Album Title\nTTITLE0=Part one\nTTITLE0=, part two\n",
        );
        assert_eq!(record.album, "A Very Long Album Title");
        assert_eq!(record.tracks, vec![track(1, "Part one, part two")]);
    }

    #[test]
    fn test_title_may_contain_equals_sign() {
        let record = parse_record("DTITLE=A / B\nTTITLE0=E=mc2\n");
        assert_eq!(record.tracks[0].title, "E=mc2");
    }

    #[test]
    fn test_lines_after_terminator_are_ignored() {
        let record = parse_record("DTITLE=A / B\nTTITLE0=x\n.\nTTITLE1=y\n");
        assert_eq!(record.tracks.len(), 1);
    }

    #[test]
    fn test_dot_stuffed_line_is_not_a_terminator() {
        let record = parse_record("DTITLE=A / B\n..\nTTITLE0=x\n..\nTTITLE1=y\n.\n");
        assert_eq!(record.tracks, vec![track(1, "x"), track(2, "y")]);
    }

    #[test]
    fn test_crlf_record() {
        let record = parse_record("DTITLE=A / B\r\nTTITLE0=First\r\nTTITLE1=Second\r\n.\r\n");
        assert_eq!(record.tracks, vec![track(1, "First"), track(2, "Second")]);
    }

    #[test]
    fn test_malformed_track_keys_are_skipped() {
        let record = parse_record("TTITLEx=bad\nTTITLE-1=neg\nTTITLE+2=plus\nTTITLE0=good\n");
        assert_eq!(record.tracks, vec![track(1, "good")]);
    }

    #[test]
    fn test_out_of_range_track_keys_are_skipped() {
        let record = parse_record(
            "DTITLE=A / B\nTTITLE4294967295=x\nTTITLE99=y\nTTITLE99999999999=z\nTTITLE98=last\n",
        );
        assert_eq!(record.tracks, vec![track(99, "last")]);
    }

    #[test]
    fn test_query_exact_match() {
        let m = parse_query_response("200 rock 940c700b Rammstein / Mutter\n")
            .unwrap()
            .unwrap();
        assert_eq!(m.category, "rock");
        assert_eq!(m.disc_id, "940c700b");
        assert_eq!(m.description.as_deref(), Some("Rammstein / Mutter"));
    }

    #[test]
    fn test_query_multiple_matches_takes_first() {
        let body = "210 Found exact matches, list follows (until terminating `.')\n\
                    data bd0f4f84 Artist - Album\n\
                    misc bd0f4f84 Artist - Album\n\
                    .\n";
        let m = parse_query_response(body).unwrap().unwrap();
        assert_eq!(m.category, "data");
        assert_eq!(m.disc_id, "bd0f4f84");

        let body = "211 Found inexact matches, list follows\nrock abc123 One / Two\n.\n";
        let m = parse_query_response(body).unwrap().unwrap();
        assert_eq!(m.category, "rock");
        assert_eq!(m.disc_id, "abc123");
    }

    #[test]
    fn test_query_no_match() {
        let result = parse_query_response("202 No match for disc ID 000c4804.\n").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_query_unexpected_status_is_error() {
        assert!(matches!(
            parse_query_response("403 Database entry is corrupt.\n"),
            Err(CddbError::Status(_))
        ));
        assert!(matches!(
            parse_query_response("<html>oops</html>"),
            Err(CddbError::Protocol(_))
        ));
        assert!(matches!(
            parse_query_response("211 close matches\n.\n"),
            Err(CddbError::Protocol(_))
        ));
    }
}
