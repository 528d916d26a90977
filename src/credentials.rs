//! Bearer credential lifecycle for the provider API
//!
//! [`CredentialManager`] owns a single access token, its refresh token and
//! expiry. Callers ask for a header; the manager hands out the cached token
//! while it is valid, and otherwise renews it with one refresh-token grant
//! followed, if that fails, by one password grant.
//!
//! Renewal is single-flight: the check-and-renew runs under a mutex and the
//! validity check is repeated after acquiring it, so concurrent callers that
//! hit an expired token trigger exactly one round of network calls.

use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;
use utoipa::ToSchema;

/// Seconds subtracted from the provider's `expires_in` to absorb clock skew
/// and requests already in flight.
const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

/// In-memory credential state
#[derive(Clone)]
struct Credential {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: DateTime<Utc>,
}

impl Default for Credential {
    fn default() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            expires_at: DateTime::<Utc>::MIN_UTC,
        }
    }
}

impl Credential {
    fn usable_token(&self, now: DateTime<Utc>) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|t| !t.is_empty() && now < self.expires_at)
    }

    fn from_grant(grant: TokenResponse, now: DateTime<Utc>) -> Self {
        let lifetime = i64::try_from(grant.expires_in)
            .unwrap_or(i64::MAX)
            .saturating_sub(EXPIRY_SAFETY_MARGIN_SECS);
        // Lifetimes beyond chrono's range never expire in practice
        let expires_at = ChronoDuration::try_seconds(lifetime)
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            access_token: Some(grant.access_token),
            refresh_token: grant.refresh_token,
            expires_at,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint response
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: u64,
}

/// `expires_in` arrives as a number from some deployments and a string from others
fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Int(n)) => n,
        Some(Raw::Float(f)) if f > 0.0 => f as u64,
        Some(Raw::Text(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// Public view of the credential state (never includes the tokens)
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct CredentialSnapshot {
    /// Whether an access token is currently held
    pub has_token: bool,
    /// Whether a refresh token is currently held
    pub has_refresh_token: bool,
    /// When the held access token stops being used
    pub expires_at: Option<DateTime<Utc>>,
}

/// Shared, lazily-renewed provider credential
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct CredentialManager {
    http: reqwest::Client,
    token_url: Url,
    username: Option<String>,
    password: Option<String>,
    state: RwLock<Credential>,
    refresh_lock: Mutex<()>,
}

impl CredentialManager {
    /// Create a manager for the provider's token endpoint (`{base_url}/token`)
    ///
    /// No network call is made until a header is first requested.
    pub fn new(http: reqwest::Client, provider: &ProviderConfig) -> Result<Self> {
        let token_url = Url::parse(&format!(
            "{}/token",
            provider.base_url.trim_end_matches('/')
        ))
        .map_err(|e| Error::Config {
            message: format!("invalid provider base URL: {e}"),
            key: Some("OCTOPARSE_BASE_URL".to_string()),
        })?;

        Ok(Self {
            http,
            token_url,
            username: provider.username.clone(),
            password: provider.password.clone(),
            state: RwLock::new(Credential::default()),
            refresh_lock: Mutex::new(()),
        })
    }

    /// `Authorization` header value for the current credential
    ///
    /// # Errors
    ///
    /// [`Error::AuthFailure`] when the token is expired and neither the refresh
    /// grant nor the password grant succeeds.
    pub async fn auth_header(&self) -> Result<String> {
        let token = self.access_token().await?;
        Ok(format!("bearer {token}"))
    }

    /// Current access token, renewing it first if it has expired
    pub async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.state.read().await.usable_token(Utc::now()) {
            return Ok(token.to_string());
        }

        let _renewing = self.refresh_lock.lock().await;

        // Another caller may have renewed while we waited for the lock
        let refresh_token = {
            let state = self.state.read().await;
            if let Some(token) = state.usable_token(Utc::now()) {
                debug!("credential renewed by a concurrent caller");
                return Ok(token.to_string());
            }
            state.refresh_token.clone()
        };

        let renewed = match refresh_token {
            Some(refresh_token) => match self.refresh_grant(&refresh_token).await {
                Ok(grant) => Ok(grant),
                Err(e) => {
                    warn!(error = %e, "token refresh failed, falling back to password grant");
                    self.password_grant().await
                }
            },
            None => self.password_grant().await,
        };

        let mut state = self.state.write().await;
        match renewed {
            Ok(grant) => {
                *state = Credential::from_grant(grant, Utc::now());
                info!(expires_at = %state.expires_at, "provider credential renewed");
                Ok(state.access_token.clone().unwrap_or_default())
            }
            Err(e) => {
                *state = Credential::default();
                Err(e)
            }
        }
    }

    /// Force a password grant, replacing any held credential
    pub async fn login(&self) -> Result<CredentialSnapshot> {
        let _renewing = self.refresh_lock.lock().await;
        let result = self.password_grant().await;

        let mut state = self.state.write().await;
        match result {
            Ok(grant) => {
                *state = Credential::from_grant(grant, Utc::now());
                info!(expires_at = %state.expires_at, "provider login succeeded");
                Ok(snapshot_of(&state))
            }
            Err(e) => {
                *state = Credential::default();
                Err(e)
            }
        }
    }

    /// Token-free view of the current state
    pub async fn snapshot(&self) -> CredentialSnapshot {
        snapshot_of(&*self.state.read().await)
    }

    async fn refresh_grant(&self, refresh_token: &str) -> Result<TokenResponse> {
        debug!("requesting refresh-token grant");
        self.request_grant(&[
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn password_grant(&self) -> Result<TokenResponse> {
        let (Some(username), Some(password)) = (&self.username, &self.password) else {
            return Err(Error::AuthFailure(
                "no refresh token and no username/password configured".to_string(),
            ));
        };

        debug!("requesting password grant");
        self.request_grant(&[
            ("username", username.as_str()),
            ("password", password.as_str()),
            ("grant_type", "password"),
        ])
        .await
    }

    async fn request_grant(&self, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .http
            .post(self.token_url.clone())
            .form(form)
            .send()
            .await
            .map_err(|e| Error::AuthFailure(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AuthFailure(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::AuthFailure(format!("invalid token response: {e}")))
    }

    #[cfg(test)]
    pub(crate) async fn seed(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) {
        *self.state.write().await = Credential {
            access_token: access_token.map(str::to_string),
            refresh_token: refresh_token.map(str::to_string),
            expires_at,
        };
    }
}

fn snapshot_of(state: &Credential) -> CredentialSnapshot {
    CredentialSnapshot {
        has_token: state.access_token.is_some(),
        has_refresh_token: state.refresh_token.is_some(),
        expires_at: state.access_token.as_ref().map(|_| state.expires_at),
    }
}
