use crate::error::{AppError, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Refresh a token this long before the provider says it expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the provider's `expires_in` can't be represented.
const FALLBACK_LIFETIME: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Access tokens minted from a long-lived refresh token.
pub struct TokenSource {
    provider: &'static str,
    token_url: String,
    credentials: OAuthCredentials,
    client: Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenSource {
    pub fn new(provider: &'static str, token_url: impl Into<String>, credentials: OAuthCredentials, client: Client) -> Self {
        Self {
            provider,
            token_url: token_url.into(),
            credentials,
            client,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(token.access_token.clone());
            }
        }

        tracing::debug!("Refreshing {} access token", self.provider);

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.credentials.refresh_token.as_str()),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::platform(self.provider, format!("Token request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Auth(format!(
                "{} rejected the refresh token ({}): {}",
                self.provider, status, body
            )));
        }

        let response = check_response(self.provider, response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::platform(self.provider, format!("Failed to parse token response: {}", e)))?;

        let access_token = token.access_token.clone();
        *cached = Some(CachedToken {
            access_token: token.access_token,
            expires_at: expiry_from(Instant::now(), token.expires_in),
        });

        Ok(access_token)
    }
}

fn expiry_from(now: Instant, expires_in: u64) -> Instant {
    now.checked_add(Duration::from_secs(expires_in))
        .unwrap_or(now + FALLBACK_LIFETIME)
}

/// Request pacing shared by all calls of one platform client.
pub fn api_limiter(per_second: u32) -> DefaultDirectRateLimiter {
    let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rate))
}

/// Turn a non-success status into a platform error carrying the body.
pub async fn check_response(provider: &str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::error!("{} API error: {} - {}", provider, status, body);

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(AppError::platform(
            provider,
            format!("Access denied ({}): {}", status, truncate(&body, 200)),
        ));
    }

    Err(AppError::platform(
        provider,
        format!("API returned status: {} - {}", status, truncate(&body, 200)),
    ))
}

pub fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 2), "he");
        assert_eq!(truncate("שלום עולם", 4), "שלום");
    }

    #[test]
    fn test_oversized_expiry_falls_back() {
        let now = Instant::now();
        assert_eq!(expiry_from(now, 3600), now + Duration::from_secs(3600));
        assert_eq!(expiry_from(now, u64::MAX), now + FALLBACK_LIFETIME);
    }

    #[test]
    fn test_limiter_allows_first_request() {
        let limiter = api_limiter(0);
        assert!(limiter.check().is_ok());
    }
}
