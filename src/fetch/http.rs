//! HTTP content source.

use super::{ContentSource, FetchError};
use crate::config::ContentConfig;
use async_trait::async_trait;
use reqwest::Client;

/// Fetches overlay pages from a live site.
///
/// Paths are joined onto `base_url` as-is; overlay ids are always
/// site-relative (`/about`), so no URL resolution beyond concatenation
/// is needed.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    /// Source for `[content] base_url`, if one is configured.
    pub fn from_config(config: &ContentConfig) -> Option<Self> {
        config.base_url.as_deref().map(Self::new)
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

#[async_trait]
impl ContentSource for HttpSource {
    async fn get(&self, path: &str) -> Result<String, FetchError> {
        let transport = |err: reqwest::Error| FetchError::Transport {
            path: path.to_owned(),
            message: err.to_string(),
        };

        let response = self
            .client
            .get(self.url_for(path))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                path: path.to_owned(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tiny_http::{Response, Server};

    /// Serve `count` requests: `/info` is a page, everything else is 404.
    fn spawn_server(count: usize) -> (String, thread::JoinHandle<()>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let handle = thread::spawn(move || {
            for _ in 0..count {
                let request = server.recv().unwrap();
                let response = if request.url() == "/info" {
                    Response::from_string(r#"<div id="sections"><p>pricing</p></div>"#)
                } else {
                    Response::from_string("not found").with_status_code(404)
                };
                request.respond(response).unwrap();
            }
        });
        (format!("http://{addr}"), handle)
    }

    #[test]
    fn test_url_for_joins_slashes() {
        let source = HttpSource::new("https://example.com/");
        assert_eq!(source.url_for("/info"), "https://example.com/info");
        assert_eq!(source.url_for("info"), "https://example.com/info");
    }

    #[test]
    fn test_from_config_requires_base_url() {
        let mut config = ContentConfig::default();
        assert!(HttpSource::from_config(&config).is_none());

        config.base_url = Some("https://example.com".into());
        let source = HttpSource::from_config(&config).unwrap();
        assert_eq!(source.url_for("/about"), "https://example.com/about");
    }

    #[tokio::test]
    async fn test_get_success_and_not_found() {
        let (base, handle) = spawn_server(2);
        let source = HttpSource::new(base);

        let body = source.get("/info").await.unwrap();
        assert!(body.contains("pricing"));

        let err = source.get("/missing").await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, ref path } if path == "/missing"));

        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_get_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let source = HttpSource::new(format!("http://{addr}"));

        let err = source.get("/info").await.unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
