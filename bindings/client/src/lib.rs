mod client;
mod error;
mod response;

pub use client::{HttpClientInstrumented, HttpRequest, DEFAULT_REQUEST_TIMEOUT};
pub use error::{handle_http_err, HttpClientError};
pub use response::HttpResponse;

pub mod prelude {
    pub use crate::client::HttpClientInstrumented as HttpClient;
    pub use crate::client::HttpRequest;
    pub use crate::error::{handle_http_err, HttpClientError};
    pub use crate::response::HttpResponse;

    // Re-exported so that callers do not need their own reqwest dependency to pick a verb.
    pub use reqwest::Method;
}
