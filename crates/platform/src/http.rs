//! Blocking JSON-over-HTTP client for a batch job gateway.
//!
//! Routes (relative to the configured base URL):
//! - `POST batch-endpoints/{endpoint}/jobs` with `{"input": {"uri", "mode"}}` → `{"name"}`
//! - `GET jobs/{name}` → `{"status"}`
//! - `GET jobs/{name}/outputs/score` → `{"uri"}`
//! - `GET {uri}` → raw bytes (absolute URI, or relative to the base)

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use batchscore_core::JobHandle;

use crate::client::MlPlatform;
use crate::error::PlatformError;
use crate::types::{InputReference, OutputReference, RemoteStatus};

/// Connection settings for [`HttpPlatform`].
#[derive(Debug, Clone)]
pub struct HttpPlatformConfig {
    pub base_url: String,
    /// Sent as a bearer token when present.
    pub token: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl HttpPlatformConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    input: &'a InputReference,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct OutputResponse {
    uri: String,
}

/// [`MlPlatform`] backed by an HTTP gateway.
#[derive(Debug, Clone)]
pub struct HttpPlatform {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl HttpPlatform {
    pub fn new(config: HttpPlatformConfig) -> Result<Self, PlatformError> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            PlatformError::InvalidConfig(format!("base url {:?}: {e}", config.base_url))
        })?;
        if base.cannot_be_a_base() {
            return Err(PlatformError::InvalidConfig(format!(
                "base url {:?} cannot carry a path",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PlatformError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            base,
            token: config.token,
        })
    }

    /// Base URL extended with percent-encoded path segments.
    fn url<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Absolute URIs are used as-is; anything else is taken relative to the base.
    fn resolve(&self, uri: &str) -> Url {
        match Url::parse(uri) {
            Ok(url) => url,
            Err(_) => self.url(uri.trim_start_matches('/').split('/')),
        }
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, PlatformError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request
            .send()
            .map_err(|e| PlatformError::Transport(e.to_string()))
    }
}

fn describe_failure(response: Response) -> String {
    let status = response.status();
    let body = response.text().unwrap_or_default();
    if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{status}: {}", body.trim())
    }
}

fn unexpected(response: Response) -> PlatformError {
    if response.status().is_server_error() {
        PlatformError::Transport(describe_failure(response))
    } else {
        PlatformError::Protocol(describe_failure(response))
    }
}

impl MlPlatform for HttpPlatform {
    fn submit_batch_job(
        &self,
        endpoint: &str,
        input: &InputReference,
    ) -> Result<JobHandle, PlatformError> {
        let url = self.url(["batch-endpoints", endpoint, "jobs"]);
        debug!(%url, endpoint, mode = ?input.mode, "submitting batch job");

        let response = self.send(self.client.post(url).json(&SubmitRequest { input }))?;
        match response.status() {
            s if s.is_success() => {
                let body: SubmitResponse = response
                    .json()
                    .map_err(|e| PlatformError::Protocol(e.to_string()))?;
                Ok(JobHandle::new(body.name))
            }
            StatusCode::NOT_FOUND => Err(PlatformError::EndpointNotFound(endpoint.to_string())),
            s if s.is_client_error() => Err(PlatformError::SubmissionRejected {
                endpoint: endpoint.to_string(),
                reason: describe_failure(response),
            }),
            _ => Err(unexpected(response)),
        }
    }

    fn get_job_status(&self, job: &JobHandle) -> Result<RemoteStatus, PlatformError> {
        let response = self.send(self.client.get(self.url(["jobs", job.as_str()])))?;
        match response.status() {
            s if s.is_success() => {
                let body: StatusResponse = response
                    .json()
                    .map_err(|e| PlatformError::Protocol(e.to_string()))?;
                Ok(RemoteStatus::from_platform(&body.status))
            }
            StatusCode::NOT_FOUND => Err(PlatformError::JobNotFound(job.clone())),
            _ => Err(unexpected(response)),
        }
    }

    fn get_job_output_location(&self, job: &JobHandle) -> Result<OutputReference, PlatformError> {
        let url = self.url(["jobs", job.as_str(), "outputs", "score"]);
        let response = self.send(self.client.get(url))?;
        match response.status() {
            s if s.is_success() => {
                let body: OutputResponse = response
                    .json()
                    .map_err(|e| PlatformError::Protocol(e.to_string()))?;
                Ok(OutputReference::new(body.uri))
            }
            StatusCode::NOT_FOUND => Err(PlatformError::OutputUnavailable(job.clone())),
            _ => Err(unexpected(response)),
        }
    }

    fn download(&self, output: &OutputReference) -> Result<Vec<u8>, PlatformError> {
        let url = self.resolve(&output.uri);
        debug!(%url, "downloading job output");

        let response = self.send(self.client.get(url))?;
        if !response.status().is_success() {
            return Err(unexpected(response));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| PlatformError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    use super::*;
    use crate::types::ReferenceMode;

    fn platform(base: &str) -> HttpPlatform {
        HttpPlatform::new(HttpPlatformConfig::new(base)).unwrap()
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(matches!(
            HttpPlatform::new(HttpPlatformConfig::new("not a url")),
            Err(PlatformError::InvalidConfig(_))
        ));
        assert!(matches!(
            HttpPlatform::new(HttpPlatformConfig::new("mailto:ops@example.com")),
            Err(PlatformError::InvalidConfig(_))
        ));
    }

    #[test]
    fn builds_routes_under_the_base_path() {
        let p = platform("https://gateway.example.com/api/v1/");
        assert_eq!(
            p.url(["batch-endpoints", "cherrypt-abies-lasiocarpa", "jobs"])
                .as_str(),
            "https://gateway.example.com/api/v1/batch-endpoints/cherrypt-abies-lasiocarpa/jobs"
        );

        let p = platform("https://gateway.example.com/api");
        assert_eq!(
            p.url(["jobs", "job 1"]).as_str(),
            "https://gateway.example.com/api/jobs/job%201"
        );
    }

    #[test]
    fn resolves_relative_and_absolute_output_uris() {
        let p = platform("https://gateway.example.com/api");
        assert_eq!(
            p.resolve("files/run-1/predictions.csv").as_str(),
            "https://gateway.example.com/api/files/run-1/predictions.csv"
        );
        assert_eq!(
            p.resolve("https://blob.example.net/out/predictions.csv").as_str(),
            "https://blob.example.net/out/predictions.csv"
        );
    }

    #[test]
    fn submit_body_carries_direct_mode() {
        let input = InputReference::direct("azureml://datastores/blob/paths/batch/");
        let body = serde_json::to_value(SubmitRequest { input: &input }).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "input": {"uri": "azureml://datastores/blob/paths/batch/", "mode": "direct"}
            })
        );
        assert_eq!(input.mode, ReferenceMode::Direct);
    }

    #[test]
    fn unreachable_gateway_is_a_transport_error() {
        let p = HttpPlatform::new(
            HttpPlatformConfig::new("http://127.0.0.1:9")
                .with_request_timeout(Duration::from_millis(500)),
        )
        .unwrap();

        let err = p.get_job_status(&JobHandle::new("job-1")).unwrap_err();
        assert!(matches!(err, PlatformError::Transport(_)));
    }

    /// Gateway that answers exactly one request with `status` and `body`.
    /// Joining the handle yields the request as received.
    fn gateway(
        status: &str,
        body: &str,
        token: Option<&str>,
    ) -> (HttpPlatform, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}/api", listener.local_addr().unwrap());
        let mut config =
            HttpPlatformConfig::new(base).with_request_timeout(Duration::from_secs(5));
        if let Some(token) = token {
            config = config.with_token(token);
        }
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() == 0 {
                    break;
                }
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
                request.push_str(&line);
                if line == "\r\n" {
                    break;
                }
            }
            let mut body = vec![0; content_length];
            reader.read_exact(&mut body).unwrap();
            request.push_str(&String::from_utf8_lossy(&body));
            reader.get_mut().write_all(response.as_bytes()).unwrap();
            request
        });

        (HttpPlatform::new(config).unwrap(), server)
    }

    #[test]
    fn submit_posts_direct_input_and_returns_the_job_name() {
        let (p, server) = gateway("200 OK", r#"{"name":"job-42"}"#, Some("secret"));
        let input = InputReference::direct("azureml://datastores/blob/paths/batch/");

        let job = p.submit_batch_job("cherrypt-abies-lasiocarpa", &input).unwrap();

        assert_eq!(job.as_str(), "job-42");
        let request = server.join().unwrap();
        assert!(request.starts_with("POST /api/batch-endpoints/cherrypt-abies-lasiocarpa/jobs "));
        assert!(request.contains(r#""mode":"direct""#));
        assert!(request.contains(r#""uri":"azureml://datastores/blob/paths/batch/""#));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer secret"));
    }

    #[test]
    fn submit_to_missing_endpoint_is_endpoint_not_found() {
        let (p, server) = gateway("404 Not Found", "", None);

        let err = p
            .submit_batch_job("cherrypt-larix-lyallii", &InputReference::direct("batch/"))
            .unwrap_err();

        assert!(matches!(err, PlatformError::EndpointNotFound(e) if e == "cherrypt-larix-lyallii"));
        let request = server.join().unwrap();
        assert!(!request.to_ascii_lowercase().contains("authorization:"));
    }

    #[test]
    fn submit_client_error_is_a_rejection_carrying_the_body() {
        let (p, server) = gateway("400 Bad Request", r#"{"error":"quota exceeded"}"#, None);

        let err = p
            .submit_batch_job("cherrypt-abies-lasiocarpa", &InputReference::direct("batch/"))
            .unwrap_err();

        match err {
            PlatformError::SubmissionRejected { endpoint, reason } => {
                assert_eq!(endpoint, "cherrypt-abies-lasiocarpa");
                assert!(reason.starts_with("400"));
                assert!(reason.contains("quota exceeded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn status_strings_map_onto_remote_statuses() {
        let (p, server) = gateway("200 OK", r#"{"status":"Finalizing"}"#, None);
        assert_eq!(p.get_job_status(&JobHandle::new("job-1")).unwrap(), RemoteStatus::Running);
        assert!(server.join().unwrap().starts_with("GET /api/jobs/job-1 "));

        let (p, server) = gateway("200 OK", r#"{"status":"Finished"}"#, None);
        assert_eq!(p.get_job_status(&JobHandle::new("job-1")).unwrap(), RemoteStatus::Completed);
        server.join().unwrap();
    }

    #[test]
    fn status_failures_map_by_response_code() {
        let (p, server) = gateway("404 Not Found", "", None);
        let err = p.get_job_status(&JobHandle::new("job-gone")).unwrap_err();
        assert!(matches!(err, PlatformError::JobNotFound(job) if job.as_str() == "job-gone"));
        server.join().unwrap();

        let (p, server) = gateway("503 Service Unavailable", "try later", None);
        let err = p.get_job_status(&JobHandle::new("job-1")).unwrap_err();
        assert!(matches!(err, PlatformError::Transport(reason) if reason.contains("try later")));
        server.join().unwrap();

        let (p, server) = gateway("200 OK", "<html>gateway</html>", None);
        let err = p.get_job_status(&JobHandle::new("job-1")).unwrap_err();
        assert!(matches!(err, PlatformError::Protocol(_)));
        server.join().unwrap();
    }

    #[test]
    fn output_location_is_decoded_or_unavailable() {
        let (p, server) = gateway("200 OK", r#"{"uri":"files/job-1/predictions.csv"}"#, None);
        let output = p.get_job_output_location(&JobHandle::new("job-1")).unwrap();
        assert_eq!(output, OutputReference::new("files/job-1/predictions.csv"));
        assert!(server.join().unwrap().starts_with("GET /api/jobs/job-1/outputs/score "));

        let (p, server) = gateway("404 Not Found", "", None);
        let err = p.get_job_output_location(&JobHandle::new("job-1")).unwrap_err();
        assert!(matches!(err, PlatformError::OutputUnavailable(_)));
        server.join().unwrap();
    }

    #[test]
    fn download_fetches_relative_uris_under_the_base() {
        let raw = "batch_input/cherrypt_0001.wav 0.1 0.9\n";
        let (p, server) = gateway("200 OK", raw, None);

        let bytes = p
            .download(&OutputReference::new("files/job-1/predictions.csv"))
            .unwrap();

        assert_eq!(bytes, raw.as_bytes());
        assert!(server.join().unwrap().starts_with("GET /api/files/job-1/predictions.csv "));
    }
}
