use super::parser::{parse_query_response, status_code, CddbMatch};
use super::CddbError;
use crate::text_encoding::decode_body;
use crate::toc::DiscToc;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};

pub const GNUDB_URL: &str = "http://gnudb.gnudb.org/~cddb/cddb.cgi";
/// Level 6 gets UTF-8 records with DYEAR/DGENRE
pub const PROTOCOL_LEVEL: u8 = 6;

/// `cddb query <freedb id> <n> <offsets...> <seconds>`
pub fn query_command(toc: &DiscToc) -> String {
    let offsets = toc
        .offsets
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "cddb query {} {} {} {}",
        toc.freedb_id(),
        toc.track_count(),
        offsets,
        toc.total_seconds()
    )
}

/// `cddb read <category> <disc id>`
pub fn read_command(category: &str, disc_id: &str) -> String {
    format!("cddb read {} {}", category, disc_id)
}

#[derive(Clone)]
pub struct CddbClient {
    client: reqwest::Client,
    base_url: String,
    hello: String,
}

impl CddbClient {
    /// `hello` is the `user host client version` greeting CDDB servers expect
    pub fn new(base_url: impl Into<String>, hello: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            hello: hello.into(),
        }
    }

    async fn send(&self, cmd: &str) -> Result<String, CddbError> {
        debug!("CDDB request: {} cmd='{}'", self.base_url, cmd);
        let proto = PROTOCOL_LEVEL.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("cmd", cmd),
                ("hello", self.hello.as_str()),
                ("proto", proto.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        let body = decode_body(&bytes, content_type.as_deref());
        debug!("CDDB response:\n{}", body);
        Ok(body)
    }

    pub async fn try_query(&self, toc: &DiscToc) -> Result<Option<CddbMatch>, CddbError> {
        let body = self.send(&query_command(toc)).await?;
        parse_query_response(&body)
    }

    /// Find the category and disc id for a TOC; any failure is a miss
    pub async fn query(&self, toc: &DiscToc) -> Option<CddbMatch> {
        info!("CDDB: querying disc {}", toc.freedb_id());
        match self.try_query(toc).await {
            Ok(Some(found)) => {
                info!("CDDB: found {} {}", found.category, found.disc_id);
                Some(found)
            }
            Ok(None) => {
                info!("CDDB: no match for {}", toc.freedb_id());
                None
            }
            Err(e) => {
                warn!("CDDB query failed: {}", e);
                None
            }
        }
    }

    pub async fn try_read(&self, category: &str, disc_id: &str) -> Result<String, CddbError> {
        let body = self.send(&read_command(category, disc_id)).await?;
        match status_code(&body) {
            Some(210) => Ok(body),
            _ => Err(CddbError::Status(
                body.lines().next().unwrap_or_default().to_string(),
            )),
        }
    }

    /// Fetch the raw xmcd record for a query match; any failure is a miss
    pub async fn read(&self, category: &str, disc_id: &str) -> Option<String> {
        match self.try_read(category, disc_id).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("CDDB read of {} {} failed: {}", category, disc_id, e);
                None
            }
        }
    }

    /// Query then read
    pub async fn lookup(&self, toc: &DiscToc) -> Option<String> {
        let found = self.query(toc).await?;
        self.read(&found.category, &found.disc_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HELLO: &str = "user hostname cdrip 0.1";

    fn toc() -> DiscToc {
        DiscToc::new(
            1,
            vec![150, 18051, 42248, 57183, 75952, 89333, 114384, 142453, 163641],
            2476 * 75,
        )
        .unwrap()
    }

    fn client_for(server: &MockServer) -> CddbClient {
        CddbClient::new(format!("{}/~cddb/cddb.cgi", server.uri()), HELLO)
    }

    #[test]
    fn test_query_command() {
        assert_eq!(
            query_command(&toc()),
            "cddb query 6909aa09 9 150 18051 42248 57183 75952 89333 114384 142453 163641 2476"
        );
    }

    #[test]
    fn test_read_command() {
        assert_eq!(read_command("rock", "6909aa09"), "cddb read rock 6909aa09");
    }

    #[tokio::test]
    async fn test_query_sends_protocol_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/~cddb/cddb.cgi"))
            .and(query_param("cmd", query_command(&toc())))
            .and(query_param("hello", HELLO))
            .and(query_param("proto", "6"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("200 rock 6909aa09 Dire Straits / Dire Straits\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let found = client_for(&server).query(&toc()).await.unwrap();
        assert_eq!(found.category, "rock");
        assert_eq!(found.disc_id, "6909aa09");
    }

    #[tokio::test]
    async fn test_query_202_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("202 No match for disc ID 6909aa09.\n"),
            )
            .mount(&server)
            .await;

        assert!(client_for(&server).query(&toc()).await.is_none());
    }

    #[tokio::test]
    async fn test_http_error_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.query(&toc()).await.is_none());
        assert!(client.read("rock", "6909aa09").await.is_none());
        assert!(matches!(
            client.try_query(&toc()).await,
            Err(CddbError::Request(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_not_found() {
        let client = CddbClient::new("http://127.0.0.1:9/~cddb/cddb.cgi", HELLO);
        assert!(client.lookup(&toc()).await.is_none());
    }

    #[tokio::test]
    async fn test_read_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("cmd", "cddb read rock deadbeef"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("401 rock deadbeef No such CD entry in database.\n"),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.try_read("rock", "deadbeef").await,
            Err(CddbError::Status(line)) if line.starts_with("401")
        ));
        assert!(client.read("rock", "deadbeef").await.is_none());
    }

    #[tokio::test]
    async fn test_read_decodes_latin1_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("cmd", "cddb read rock 6909aa09"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(
                    b"210 rock 6909aa09\nDTITLE=Mot\xf6rhead / Ace of Spades\n.\n".to_vec(),
                    "text/plain; charset=ISO-8859-1",
                ),
            )
            .mount(&server)
            .await;

        let record = client_for(&server)
            .read("rock", "6909aa09")
            .await
            .unwrap();
        assert!(record.contains("Motörhead"));
    }
}
