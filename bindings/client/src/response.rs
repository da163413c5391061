use crate::error::HttpClientError;

/// Status and body of a finished call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Flatten the result of a call into something checks can inspect.
    ///
    /// Error statuses keep their status and body. A transport failure becomes status `0` with the
    /// error text as the body.
    pub fn from_outcome(outcome: Result<HttpResponse, HttpClientError>) -> Self {
        match outcome {
            Ok(response) => response,
            Err(HttpClientError::Status { status, body }) => Self { status, body },
            Err(HttpClientError::Transport(e)) => Self {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                body: e.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// A top level field of a JSON object body. `None` if the body is not JSON or lacks the field.
    pub fn json_field(&self, name: &str) -> Option<serde_json::Value> {
        let value: serde_json::Value = serde_json::from_str(&self.body).ok()?;
        value.get(name).cloned()
    }

    /// Whether the JSON body has the field at all, even if it is `null`.
    pub fn has_json_field(&self, name: &str) -> bool {
        self.json_field(name).is_some()
    }

    /// At most `max_chars` characters of the body, for log lines.
    pub fn body_snippet(&self, max_chars: usize) -> &str {
        match self.body.char_indices().nth(max_chars) {
            Some((end, _)) => &self.body[..end],
            None => &self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_is_2xx_only() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(302, "").is_success());
        assert!(!HttpResponse::new(0, "").is_success());
    }

    #[test]
    fn json_fields() {
        let response = HttpResponse::new(200, r#"{"access_token":"abc","refresh":null}"#);

        assert_eq!(
            Some(serde_json::json!("abc")),
            response.json_field("access_token")
        );
        assert!(response.has_json_field("refresh"));
        assert!(!response.has_json_field("results"));
        assert!(!HttpResponse::new(200, "not json").has_json_field("results"));
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let response = HttpResponse::new(500, "ééééé");

        assert_eq!("éé", response.body_snippet(2));
        assert_eq!("ééééé", response.body_snippet(120));
    }

    #[test]
    fn status_error_keeps_body() {
        let response = HttpResponse::from_outcome(Err(HttpClientError::Status {
            status: 401,
            body: "nope".to_string(),
        }));

        assert_eq!(HttpResponse::new(401, "nope"), response);
    }
}
