use crate::error::{AppError, Result};
use crate::models::IdentifiedSong;
use crate::services::recorder::AudioSample;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const AUDD_URL: &str = "https://api.audd.io/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait Identifier: Send + Sync {
    /// `None` covers both "not recognized" and non-music content.
    async fn identify(&self, sample: &AudioSample) -> Result<Option<IdentifiedSong>>;
}

pub struct AuddIdentifier {
    api_url: String,
    api_token: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct AuddResponse {
    status: String,
    result: Option<AuddResult>,
    error: Option<AuddError>,
}

#[derive(Debug, Deserialize)]
struct AuddResult {
    #[serde(default)]
    artist: String,
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct AuddError {
    error_code: Option<i64>,
    error_message: Option<String>,
}

impl AuddIdentifier {
    pub fn new(api_token: String) -> Self {
        Self {
            api_url: AUDD_URL.to_string(),
            api_token,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl Identifier for AuddIdentifier {
    async fn identify(&self, sample: &AudioSample) -> Result<Option<IdentifiedSong>> {
        let audio = tokio::fs::read(sample.path()).await?;

        let file = Part::bytes(audio)
            .file_name("sample.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| AppError::Identifier(format!("Invalid upload: {}", e)))?;
        let form = Form::new()
            .text("api_token", self.api_token.clone())
            .part("file", file);

        let response = self
            .client
            .post(&self.api_url)
            .timeout(REQUEST_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::Identifier(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Identifier(format!("API returned status: {} - {}", status, body)));
        }

        let body: AuddResponse = response
            .json()
            .await
            .map_err(|e| AppError::Identifier(format!("Failed to parse response: {}", e)))?;

        parse_response(body)
    }
}

fn parse_response(body: AuddResponse) -> Result<Option<IdentifiedSong>> {
    if body.status != "success" {
        let (code, message) = body
            .error
            .map(|e| (e.error_code.unwrap_or_default(), e.error_message.unwrap_or_default()))
            .unwrap_or_default();
        return Err(AppError::Identifier(format!("Recognition failed ({}): {}", code, message)));
    }

    Ok(body.result.and_then(|r| {
        let artist = r.artist.trim();
        let title = r.title.trim();
        if artist.is_empty() || title.is_empty() {
            return None;
        }
        tracing::info!("Identified: {} - {}", artist, title);
        Some(IdentifiedSong::new(artist, title))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Option<IdentifiedSong>> {
        parse_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_recognized_song() {
        let song = parse(r#"{"status":"success","result":{"artist":"Eden Ben Zaken","title":"Malkat HaKita","album":"x"}}"#)
            .unwrap()
            .unwrap();
        assert_eq!(song, IdentifiedSong::new("Eden Ben Zaken", "Malkat HaKita"));
    }

    #[test]
    fn test_no_match_is_none() {
        assert!(parse(r#"{"status":"success","result":null}"#).unwrap().is_none());
        assert!(parse(r#"{"status":"success","result":{"artist":"","title":"Jingle"}}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_api_error_is_transient() {
        let err = parse(r#"{"status":"error","error":{"error_code":901,"error_message":"limit reached"}}"#)
            .unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("901"));
    }
}
