//! HTTPS client and the HTTP probe stage

use crate::{
    error::{AppError, Result},
    logging::StageLogger,
    models::{BlockingFactor, ExceptionRecord, HttpResult, StageOutput},
    types::{Phase, Severity},
};
use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::{Duration, Instant};

/// Response headers that carry an explicit block marker, in priority order
pub const BLOCK_HEADERS: [&str; 3] = ["X-Blocked-By", "X-Block-Reason", "X-Squid-Error"];

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 10;

/// HTTP client trait for abstraction and testing
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request with timing measurements
    async fn execute_request(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, RequestFault>;

    /// Execute a HEAD request
    async fn head(&self, url: &str) -> std::result::Result<HttpResponse, RequestFault>;
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: Method,
    /// Overall deadline for the exchange
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn new(url: String, method: Method) -> Self {
        Self {
            url,
            method,
            timeout: crate::defaults::HTTP_TIMEOUT * 2,
            user_agent: Some(format!("{}/{}", crate::PKG_NAME, crate::VERSION)),
            headers: Vec::new(),
        }
    }

    pub fn head(url: String) -> Self {
        Self::new(url, Method::HEAD)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: String, value: String) -> Self {
        self.headers.push((name, value));
        self
    }
}

/// HTTP response with timing information
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status_code: u16,
    /// Canonical reason phrase, empty for unregistered codes
    pub status_message: String,
    /// Header names are lowercase
    pub headers: Vec<(String, String)>,
    pub elapsed_ms: u64,
    pub final_url: String,
}

impl HttpResponse {
    /// First value of the named header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First block marker header present on the response
    pub fn block_header(&self) -> Option<&str> {
        BLOCK_HEADERS.iter().find_map(|name| self.header(name))
    }
}

/// Why a request did not produce a response
#[derive(Debug, Clone, PartialEq)]
pub enum RequestFault {
    Timeout { message: String },
    Connect { message: String },
    Redirect { message: String },
    Other { kind: String, message: String },
}

impl RequestFault {
    pub fn kind(&self) -> &str {
        match self {
            Self::Timeout { .. } => "Timeout",
            Self::Connect { .. } => "ConnectError",
            Self::Redirect { .. } => "RedirectError",
            Self::Other { kind, .. } => kind,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Timeout { message }
            | Self::Connect { message }
            | Self::Redirect { message }
            | Self::Other { message, .. } => message,
        }
    }
}

impl From<reqwest::Error> for RequestFault {
    fn from(error: reqwest::Error) -> Self {
        let message = error_chain(&error);
        if error.is_timeout() {
            Self::Timeout { message }
        } else if error.is_connect() {
            Self::Connect { message }
        } else if error.is_redirect() {
            Self::Redirect { message }
        } else if error.is_request() {
            Self::Other {
                kind: "RequestError".to_string(),
                message,
            }
        } else {
            Self::Other {
                kind: "HttpError".to_string(),
                message,
            }
        }
    }
}

/// Top-level message followed by each source, joined with `: `
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

/// reqwest-backed client
pub struct NetworkClient {
    client: Client,
    /// Overall deadline: one connect plus one read
    request_timeout: Duration,
}

impl NetworkClient {
    /// Client with per-phase connect and read timeouts
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .use_rustls_tls()
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            request_timeout: timeout * 2,
        })
    }

    /// HEAD request carrying this client's deadline
    pub fn head_request(&self, url: &str) -> HttpRequest {
        HttpRequest::head(url.to_string()).with_timeout(self.request_timeout)
    }
}

#[async_trait]
impl HttpClient for NetworkClient {
    async fn execute_request(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, RequestFault> {
        let mut req_builder = self
            .client
            .request(request.method, &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            req_builder = req_builder.header(name, value);
        }
        if let Some(ref ua) = request.user_agent {
            req_builder = req_builder.header("User-Agent", ua);
        }

        let start = Instant::now();
        let response = req_builder.send().await?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();

        Ok(HttpResponse {
            status_code: status.as_u16(),
            status_message: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            elapsed_ms,
            final_url: response.url().to_string(),
        })
    }

    async fn head(&self, url: &str) -> std::result::Result<HttpResponse, RequestFault> {
        self.execute_request(self.head_request(url)).await
    }
}

/// Fold a request outcome into the HTTP stage output
///
/// `elapsed_ms` is used for the sentinel record when the request failed.
pub fn evaluate_response(
    outcome: std::result::Result<HttpResponse, RequestFault>,
    elapsed_ms: u64,
) -> StageOutput<HttpResult> {
    let response = match outcome {
        Ok(response) => response,
        Err(fault) => {
            return StageOutput::completed(HttpResult::failed(fault.message(), elapsed_ms))
                .with_exception(ExceptionRecord::new(
                    Phase::Http,
                    fault.kind(),
                    Some(fault.message().to_string()),
                ))
                .with_factor(
                    BlockingFactor::new(
                        "HTTPS Request Failed",
                        Severity::High,
                        "Could not complete HTTPS request",
                    )
                    .with_detail(fault.message()),
                );
        }
    };

    let block_header = response.block_header().map(str::to_string);
    let mut output = StageOutput::completed(HttpResult {
        status_code: response.status_code,
        status_message: response.status_message.clone(),
        server: response.header("server").map(str::to_string),
        content_type: response.header("content-type").map(str::to_string),
        response_time_ms: response.elapsed_ms,
        block_header: block_header.clone(),
    });

    if let Some(value) = block_header {
        output = output.with_factor(
            BlockingFactor::new(
                "Block Header Detected",
                Severity::Critical,
                format!("Server returned blocking header: {}", value),
            )
            .with_detail("HTTP response contains explicit block indicator"),
        );
    }

    match response.status_code {
        403 => {
            output = output.with_factor(
                BlockingFactor::new(
                    "Access Forbidden",
                    Severity::High,
                    "HTTP 403 Forbidden - Access denied by server or proxy",
                )
                .with_detail("Server explicitly refused the request"),
            );
        }
        code @ (502 | 503) => {
            output = output.with_factor(
                BlockingFactor::new(
                    "Gateway Error",
                    Severity::Medium,
                    format!("HTTP {} - Upstream server error or blocking", code),
                )
                .with_detail("Proxy or gateway returned an error"),
            );
        }
        _ => {}
    }

    output
}

/// Live HTTP stage
pub struct HttpsProbe {
    client: Box<dyn HttpClient>,
    logger: StageLogger,
}

impl HttpsProbe {
    pub fn new(timeout: Duration, logger: StageLogger) -> Result<Self> {
        Ok(Self::with_client(
            Box::new(NetworkClient::with_timeout(timeout)?),
            logger,
        ))
    }

    pub fn with_client(client: Box<dyn HttpClient>, logger: StageLogger) -> Self {
        Self { client, logger }
    }

    /// HEAD `https://<domain>`
    pub async fn check(&self, domain: &str) -> StageOutput<HttpResult> {
        self.probe_url(&format!("https://{}", domain)).await
    }

    pub async fn probe_url(&self, url: &str) -> StageOutput<HttpResult> {
        let start = Instant::now();
        let outcome = self.client.head(url).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let output = evaluate_response(outcome, elapsed_ms);
        if let Some(result) = output.outcome.result() {
            self.logger
                .http_request(url, result.status_code, result.response_time_ms)
                .await;
        }
        output
    }
}
