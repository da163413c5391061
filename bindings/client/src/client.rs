use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use gust_instruments::{Instrumented, Reporter};
use gust_instruments_derive::gust_instrument;
use reqwest::{Method, RequestBuilder};

use crate::error::HttpClientError;
use crate::response::HttpResponse;

/// How long a single request may take before it counts as a transport failure.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything about a request except its verb.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(url: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn header(mut self, name: impl ToString, value: impl ToString) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: Option<String>) -> Self {
        self.body = body;
        self
    }

    pub fn json(self, value: &serde_json::Value) -> Self {
        self.header("Content-Type", "application/json")
            .body(Some(value.to_string()))
    }
}

/// A [reqwest::Client] that reports every call as an operation.
///
/// Operations are named `http_<verb>` and carry the attributes given to
/// [HttpClientInstrumented::with_attrs], usually the scenario tags, so that they count towards
/// that scenario's thresholds.
#[derive(Debug)]
pub struct HttpClientInstrumented {
    client: reqwest::Client,
    reporter: Arc<Reporter>,
    attrs: BTreeMap<String, String>,
}

impl Instrumented for HttpClientInstrumented {
    fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    fn operation_attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }
}

impl HttpClientInstrumented {
    pub fn new(reporter: Arc<Reporter>) -> Result<Self, HttpClientError> {
        Self::with_timeout(reporter, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(reporter: Arc<Reporter>, timeout: Duration) -> Result<Self, HttpClientError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(concat!("gust/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            reporter,
            attrs: BTreeMap::new(),
        })
    }

    /// Attributes added to every operation this client records.
    pub fn with_attrs(mut self, attrs: &BTreeMap<String, String>) -> Self {
        self.attrs
            .extend(attrs.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    #[gust_instrument(prefix = "http_")]
    pub async fn get(&self, request: &HttpRequest) -> Result<HttpResponse, HttpClientError> {
        self.send(self.client.get(&request.url), request).await
    }

    #[gust_instrument(prefix = "http_")]
    pub async fn post(&self, request: &HttpRequest) -> Result<HttpResponse, HttpClientError> {
        self.send(self.client.post(&request.url), request).await
    }

    #[gust_instrument(prefix = "http_")]
    pub async fn put(&self, request: &HttpRequest) -> Result<HttpResponse, HttpClientError> {
        self.send(self.client.put(&request.url), request).await
    }

    #[gust_instrument(prefix = "http_")]
    pub async fn delete(&self, request: &HttpRequest) -> Result<HttpResponse, HttpClientError> {
        self.send(self.client.delete(&request.url), request).await
    }

    /// Any other verb, such as `PATCH` or `HEAD`.
    #[gust_instrument(prefix = "http_")]
    pub async fn request(
        &self,
        method: &Method,
        request: &HttpRequest,
    ) -> Result<HttpResponse, HttpClientError> {
        self.send(self.client.request(method.clone(), &request.url), request)
            .await
    }

    /// Dispatch to the instrumented method for `method`.
    pub async fn call(
        &self,
        method: &Method,
        request: &HttpRequest,
    ) -> Result<HttpResponse, HttpClientError> {
        if *method == Method::GET {
            self.get(request).await
        } else if *method == Method::POST {
            self.post(request).await
        } else if *method == Method::PUT {
            self.put(request).await
        } else if *method == Method::DELETE {
            self.delete(request).await
        } else {
            self.request(method, request).await
        }
    }

    async fn send(
        &self,
        mut builder: RequestBuilder,
        request: &HttpRequest,
    ) -> Result<HttpResponse, HttpClientError> {
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        if status >= 400 {
            return Err(HttpClientError::Status { status, body });
        }

        Ok(HttpResponse::new(status, body))
    }
}
