use std::cell::Cell;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use gust_runner::prelude::{with_retries, RetriesExhausted};
use http_client_instrumented::prelude::{HttpClient, HttpRequest, HttpResponse};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::IdentityConfig;

const LOGIN_ATTEMPTS: u32 = 3;
const LOGIN_RETRY_DELAY: Duration = Duration::from_millis(500);
const LOG_BODY_CHARS: usize = 120;

/// Where a [Credential] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Override,
    Login,
    Signed,
}

impl Display for CredentialSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CredentialSource::Override => "override",
            CredentialSource::Login => "login",
            CredentialSource::Signed => "signed",
        })
    }
}

/// The bearer token shared by every worker of a run. It is never refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub source: CredentialSource,
    /// Unix seconds.
    pub issued_at: i64,
    /// Only known for locally signed tokens.
    pub expires_at: Option<i64>,
}

impl Credential {
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Sign an HS256 token for the configured identity, valid from `now` for the configured TTL.
pub fn sign_local(identity: &IdentityConfig, now: i64) -> anyhow::Result<Credential> {
    let claims = Claims {
        sub: identity.user_id.to_string(),
        iss: identity.issuer.clone(),
        aud: identity.audience.clone(),
        iat: now,
        exp: now.saturating_add(identity.ttl.as_secs() as i64),
    };

    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(identity.secret.as_bytes()),
    )?;

    Ok(Credential {
        token,
        source: CredentialSource::Signed,
        issued_at: now,
        expires_at: Some(claims.exp),
    })
}

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("login rejected with status {status}")]
    Rejected { status: u16 },
    #[error("login response has no access_token")]
    MissingToken,
}

/// The credential for this run and the status of the last login attempt, `0` if none was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedCredential {
    pub credential: Credential,
    pub login_status: u16,
}

/// Obtain the run's credential.
///
/// An override token is used verbatim. Otherwise, if login is enabled, the test user is
/// registered (ignoring failures) and logged in with a few attempts. If that does not produce a
/// token, one is signed locally. Bootstrap failures are logged and never returned.
pub async fn issue_credential(
    client: &HttpClient,
    identity: &IdentityConfig,
) -> anyhow::Result<IssuedCredential> {
    let now = chrono::Utc::now().timestamp();

    if let Some(token) = &identity.override_token {
        return Ok(IssuedCredential {
            credential: Credential {
                token: token.clone(),
                source: CredentialSource::Override,
                issued_at: now,
                expires_at: None,
            },
            login_status: 0,
        });
    }

    let mut login_status = 0;
    if identity.use_login {
        register(client, identity).await;

        match login(client, identity, &mut login_status).await {
            Ok(token) => {
                return Ok(IssuedCredential {
                    credential: Credential {
                        token,
                        source: CredentialSource::Login,
                        issued_at: now,
                        expires_at: None,
                    },
                    login_status,
                });
            }
            Err(e) => log::warn!("Falling back to a locally signed token: {e}"),
        }
    }

    Ok(IssuedCredential {
        credential: sign_local(identity, now)?,
        login_status,
    })
}

fn auth_request(identity: &IdentityConfig, route: &str) -> HttpRequest {
    HttpRequest::new(format!("{}{route}", identity.auth_base_url)).json(&json!({
        "email": identity.email,
        "password": identity.password,
    }))
}

/// Best effort, the user usually exists already.
async fn register(client: &HttpClient, identity: &IdentityConfig) {
    let response = HttpResponse::from_outcome(
        client
            .post(&auth_request(identity, "/auth/register"))
            .await,
    );
    log::debug!("register status={}", response.status);
}

async fn login(
    client: &HttpClient,
    identity: &IdentityConfig,
    last_status: &mut u16,
) -> Result<String, RetriesExhausted<LoginError>> {
    let request = auth_request(identity, "/auth/login");
    let request = &request;
    let status = Cell::new(0_u16);
    let status_ref = &status;

    let result = with_retries(LOGIN_ATTEMPTS, LOGIN_RETRY_DELAY, move |attempt| async move {
        let response = HttpResponse::from_outcome(client.post(request).await);
        status_ref.set(response.status);

        if response.status == 200 {
            if let Some(token) = response
                .json_field("access_token")
                .and_then(|t| t.as_str().map(str::to_string))
                .filter(|t| !t.is_empty())
            {
                return Ok(token);
            }
        }

        log::info!(
            "login_failed attempt={attempt} status={} body={}",
            response.status,
            response.body_snippet(LOG_BODY_CHARS)
        );

        if response.status == 200 {
            Err(LoginError::MissingToken)
        } else {
            Err(LoginError::Rejected {
                status: response.status,
            })
        }
    })
    .await;

    *last_status = status.get();
    result
}
