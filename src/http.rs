//! Reference HTTP probe.
//!
//! Issues one blocking GET per item against a URL template and reports the
//! status and headers. Paired with [`HeaderPresent`] it reproduces the
//! classic "does the server set this header for this item" check.

use crate::config::HttpConfig;
use crate::error::ProbeError;
use crate::probe::{CallSettings, Probe, SuccessPredicate};
use crate::types::{ProbeResponse, WorkItem};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Blocking HTTP worker function
///
/// The underlying client is built lazily on the first call, which always
/// happens on an execution slot. Building or driving a blocking client from
/// inside the async runtime is not allowed.
pub struct HttpProbe {
    config: HttpConfig,
    client: OnceLock<Client>,
}

impl HttpProbe {
    /// Create a probe for the given HTTP settings
    pub fn new(config: HttpConfig) -> Self {
        Self {
            config,
            client: OnceLock::new(),
        }
    }

    /// URL requested for `item`
    pub fn url_for(&self, item: &WorkItem) -> String {
        self.config.url_for(item.as_str())
    }

    fn client(&self, settings: &CallSettings) -> Result<&Client, ProbeError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let built = build_client(&self.config, settings)?;
        Ok(self.client.get_or_init(|| built))
    }
}

impl Probe for HttpProbe {
    fn execute(
        &self,
        item: &WorkItem,
        settings: &CallSettings,
    ) -> Result<ProbeResponse, ProbeError> {
        let url = self.url_for(item);
        let response = self
            .client(settings)?
            .get(&url)
            .timeout(settings.timeout)
            .send()
            .map_err(ProbeError::from_request)?;

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            headers: collect_headers(response.headers()),
        })
    }
}

/// Success when the response has the expected status and carries a header
///
/// Header names are compared case-insensitively.
#[derive(Clone, Debug)]
pub struct HeaderPresent {
    header: String,
    status: u16,
}

impl HeaderPresent {
    /// Require `header` on a 200 response
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            status: 200,
        }
    }

    /// Require a different status code
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

impl SuccessPredicate for HeaderPresent {
    fn is_success(&self, response: &ProbeResponse) -> bool {
        response.status == self.status && response.header(&self.header).is_some()
    }
}

fn build_client(config: &HttpConfig, settings: &CallSettings) -> Result<Client, ProbeError> {
    let mut builder = Client::builder()
        .default_headers(default_headers(&config.headers))
        .timeout(settings.timeout)
        .danger_accept_invalid_certs(config.accept_invalid_certs);

    builder = if config.follow_redirects {
        builder.redirect(reqwest::redirect::Policy::default())
    } else {
        builder.redirect(reqwest::redirect::Policy::none())
    };

    if let Some(proxy) = &settings.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy)?);
    }

    Ok(builder.build()?)
}

fn default_headers(headers: &BTreeMap<String, String>) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "skipping invalid request header"),
        }
    }
    map
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings() -> CallSettings {
        CallSettings {
            timeout: Duration::from_secs(5),
            proxy: None,
        }
    }

    fn probe_for(server: &MockServer) -> Arc<HttpProbe> {
        Arc::new(HttpProbe::new(HttpConfig {
            url_template: format!("{}/check?item={{ITEM}}", server.uri()),
            ..Default::default()
        }))
    }

    async fn execute(
        probe: &Arc<HttpProbe>,
        item: &str,
        settings: CallSettings,
    ) -> Result<ProbeResponse, ProbeError> {
        let probe = probe.clone();
        let item = WorkItem::from(item);
        tokio::task::spawn_blocking(move || probe.execute(&item, &settings))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn reports_status_and_lowercased_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/check"))
            .and(query_param("item", "b"))
            .respond_with(ResponseTemplate::new(200).insert_header("Target_Header", "present"))
            .mount(&server)
            .await;

        let probe = probe_for(&server);
        let response = execute(&probe, "b", settings()).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.header("target_header"), Some("present"));
        assert!(HeaderPresent::new("TARGET_HEADER").is_success(&response));
    }

    #[tokio::test]
    async fn sends_configured_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("DNT", "1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let probe = probe_for(&server);
        let response = execute(&probe, "x", settings()).await.unwrap();
        assert_eq!(response.status, 204);
    }

    #[tokio::test]
    async fn redirects_are_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", "/elsewhere"))
            .mount(&server)
            .await;

        let probe = probe_for(&server);
        let response = execute(&probe, "r", settings()).await.unwrap();
        assert_eq!(response.status, 302);
        assert!(!HeaderPresent::new("location").is_success(&response));
        assert!(
            HeaderPresent::new("location")
                .with_status(302)
                .is_success(&response)
        );
    }

    #[tokio::test]
    async fn slow_server_times_out_as_local_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let probe = probe_for(&server);
        let short = CallSettings {
            timeout: Duration::from_millis(100),
            proxy: None,
        };
        let result = execute(&probe, "slow", short).await;
        assert!(matches!(result, Err(ProbeError::Timeout)));
    }

    #[tokio::test]
    async fn connection_refused_is_a_request_error() {
        let probe = Arc::new(HttpProbe::new(HttpConfig {
            url_template: "http://127.0.0.1:9/?item={ITEM}".to_string(),
            ..Default::default()
        }));
        let result = execute(&probe, "x", settings()).await;
        assert!(matches!(result, Err(ProbeError::Request(_))));
    }

    #[test]
    fn header_present_requires_status() {
        let response = ProbeResponse::new(500).with_header("target_header", "1");
        assert!(!HeaderPresent::new("target_header").is_success(&response));
    }

    #[test]
    fn invalid_request_headers_are_skipped() {
        let mut headers = BTreeMap::new();
        headers.insert("Good".to_string(), "yes".to_string());
        headers.insert("Bad Name".to_string(), "x".to_string());
        let map = default_headers(&headers);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("good").unwrap(), "yes");
    }

    #[test]
    fn repeated_response_headers_are_joined() {
        let mut map = HeaderMap::new();
        map.append("set-cookie", HeaderValue::from_static("a=1"));
        map.append("set-cookie", HeaderValue::from_static("b=2"));
        let collected = collect_headers(&map);
        assert_eq!(collected.get("set-cookie").unwrap(), "a=1, b=2");
    }
}
