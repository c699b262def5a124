pub mod album;
pub mod cddb;
pub mod config;
pub mod credentials;
pub mod discogs;
pub mod lastfm;
pub mod musicbrainz;
pub mod rip;
pub mod tagging;
pub mod text_encoding;
pub mod toc;
