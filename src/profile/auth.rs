//! Bearer credentials and the refresh-if-needed contract.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::core::config::ProviderConfig;
use crate::core::errors::{ChatifyError, ChatifyResult};

/// Boxed future type for credential operations.
pub type AuthFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Minimum remaining validity, in seconds, before a credential counts as expired.
pub const MIN_VALIDITY_SECS: i64 = 60;

/// OAuth bearer credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token sent to the provider.
    pub access_token: String,
    /// Token used to obtain a new access token.
    pub refresh_token: Option<String>,
    /// Expiry instant of `access_token`.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential valid for `lifetime` from now.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        lifetime: Duration,
    ) -> Self {
        let lifetime = TimeDelta::from_std(lifetime).unwrap_or(TimeDelta::MAX);
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: Utc::now()
                .checked_add_signed(lifetime)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Whether fewer than [`MIN_VALIDITY_SECS`] seconds remain at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.signed_duration_since(now) < TimeDelta::seconds(MIN_VALIDITY_SECS)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// One credential shared by every component acting for the same user.
///
/// A refresh made through any clone is seen by all of them.
#[derive(Clone, Debug)]
pub struct SharedCredential(Arc<Mutex<Credential>>);

impl SharedCredential {
    /// Wrap `credential` for sharing.
    #[must_use]
    pub fn new(credential: Credential) -> Self {
        Self(Arc::new(Mutex::new(credential)))
    }

    /// Exclusive access, held across a whole provider call sequence.
    pub async fn lock(&self) -> MutexGuard<'_, Credential> {
        self.0.lock().await
    }
}

/// Supplier of valid bearer credentials.
pub trait CredentialSupplier: Send + Sync {
    /// Whether the credential has less than a minute of validity left.
    fn is_expired(&self, credential: &Credential) -> bool {
        credential.is_expired_at(Utc::now())
    }

    /// Return a credential valid for at least [`MIN_VALIDITY_SECS`] seconds.
    ///
    /// # Errors
    /// Returns `AuthExpired` if the credential is expired and cannot be refreshed.
    fn refresh_if_needed(&self, credential: Credential) -> AuthFuture<'_, ChatifyResult<Credential>>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
    refresh_token: Option<String>,
}

/// Refresh-token supplier backed by the provider's OAuth token endpoint.
pub struct OAuthRefresher {
    http: ReqwestClient,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
}

impl OAuthRefresher {
    /// Create a refresher from provider settings.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ProviderConfig) -> ChatifyResult<Self> {
        let http = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        })
    }

    async fn refresh(&self, credential: Credential) -> ChatifyResult<Credential> {
        let Some(refresh_token) = credential.refresh_token.clone() else {
            return Err(ChatifyError::AuthExpired);
        };

        let mut form = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.clone()),
        ];
        let request = self.http.post(&self.token_url);
        let request = if let Some(secret) = &self.client_secret {
            request.basic_auth(&self.client_id, Some(secret))
        } else {
            form.push(("client_id", self.client_id.clone()));
            request
        };

        let response = request.form(&form).send().await?;
        if !response.status().is_success() {
            debug!("Token refresh rejected with status {}", response.status());
            return Err(ChatifyError::AuthExpired);
        }

        let body: TokenResponse = response.json().await?;
        info!("Refreshed provider credential");
        Ok(Credential::new(
            body.access_token,
            Some(body.refresh_token.unwrap_or(refresh_token)),
            Duration::from_secs(body.expires_in),
        ))
    }
}

impl CredentialSupplier for OAuthRefresher {
    fn refresh_if_needed(&self, credential: Credential) -> AuthFuture<'_, ChatifyResult<Credential>> {
        Box::pin(async move {
            if !self.is_expired(&credential) {
                return Ok(credential);
            }
            self.refresh(credential).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_margin() {
        let now = Utc::now();
        let mut credential = Credential::new("a", None, Duration::from_secs(3600));
        assert!(!credential.is_expired_at(now));

        credential.expires_at = now + TimeDelta::seconds(59);
        assert!(credential.is_expired_at(now));

        credential.expires_at = now + TimeDelta::seconds(61);
        assert!(!credential.is_expired_at(now));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let credential = Credential::new(
            "secret-access",
            Some("secret-refresh".to_string()),
            Duration::from_secs(10),
        );
        let printed = format!("{credential:?}");
        assert!(!printed.contains("secret-access"));
        assert!(!printed.contains("secret-refresh"));
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token_fails() {
        let refresher = OAuthRefresher::new(&ProviderConfig::default()).unwrap();
        let credential = Credential::new("a", None, Duration::from_secs(0));
        let result = refresher.refresh_if_needed(credential).await;
        assert!(matches!(result, Err(ChatifyError::AuthExpired)));
    }

    #[tokio::test]
    async fn test_valid_credential_is_returned_untouched() {
        let refresher = OAuthRefresher::new(&ProviderConfig::default()).unwrap();
        let credential = Credential::new("a", None, Duration::from_secs(600));
        let result = refresher.refresh_if_needed(credential.clone()).await.unwrap();
        assert_eq!(result, credential);
    }
}
