use crate::error::{AppError, Result};
use crate::models::{PlatformKind, PlaylistMode, TrackId};
use crate::services::oauth::{api_limiter, check_response, OAuthCredentials, TokenSource};
use crate::services::platform::PlaylistPlatform;
use crate::services::playlist_maintainer::{InsertPosition, Removal};
use async_trait::async_trait;
use governor::DefaultDirectRateLimiter;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const PAGE_SIZE: &str = "50";
const REQUESTS_PER_SECOND: u32 = 2;

pub struct YouTubePlatform {
    base_url: String,
    playlist_id: String,
    mode: PlaylistMode,
    tokens: TokenSource,
    limiter: DefaultDirectRateLimiter,
    client: Client,
}

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    snippet: ChannelSnippet,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    title: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: SearchResultId,
}

#[derive(Debug, Deserialize)]
struct SearchResultId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PlaylistItem {
    id: String,
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Clone, Deserialize)]
struct PlaylistItemSnippet {
    #[serde(rename = "resourceId")]
    resource_id: ResourceId,
}

#[derive(Debug, Clone, Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: String,
}

impl PlaylistItem {
    fn video_id(&self) -> TrackId {
        TrackId(self.snippet.resource_id.video_id.clone())
    }
}

impl YouTubePlatform {
    pub fn new(credentials: OAuthCredentials, playlist_id: String, mode: PlaylistMode) -> Self {
        let client = Client::new();
        Self {
            base_url: API_BASE.to_string(),
            playlist_id,
            mode,
            tokens: TokenSource::new("YouTube", TOKEN_URL, credentials, client.clone()),
            limiter: api_limiter(REQUESTS_PER_SECOND),
            client,
        }
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        self.limiter.until_ready().await;
        let token = self.tokens.access_token().await?;
        Ok(self
            .client
            .request(method, format!("{}/{}", self.base_url, path))
            .bearer_auth(token))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::platform("YouTube", format!("Request failed: {}", e)))?;
        let response = check_response("YouTube", response).await?;

        response
            .json()
            .await
            .map_err(|e| AppError::platform("YouTube", format!("Failed to parse response: {}", e)))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<()> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::platform("YouTube", format!("Request failed: {}", e)))?;
        check_response("YouTube", response).await?;
        Ok(())
    }

    /// Every playlist item, following page tokens.
    async fn playlist_items(&self) -> Result<Vec<PlaylistItem>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("part", "id,snippet".to_string()),
                ("playlistId", self.playlist_id.clone()),
                ("maxResults", PAGE_SIZE.to_string()),
            ];
            if let Some(token) = page_token.take() {
                params.push(("pageToken", token));
            }

            let page: ListResponse<PlaylistItem> = self
                .send_json(self.request(Method::GET, "playlistItems").await?.query(&params))
                .await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(items)
    }
}

#[async_trait]
impl PlaylistPlatform for YouTubePlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::YouTube
    }

    fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    async fn verify(&self) -> Result<()> {
        let channels: ListResponse<Channel> = self
            .send_json(
                self.request(Method::GET, "channels")
                    .await?
                    .query(&[("part", "snippet"), ("mine", "true")]),
            )
            .await?;

        let name = channels
            .items
            .first()
            .map(|c| c.snippet.title.as_str())
            .unwrap_or("(unknown)");
        tracing::info!("Authenticated as YouTube user: {}", name);

        Ok(())
    }

    async fn search(&self, artist: &str, title: &str) -> Result<Option<TrackId>> {
        let query = format!("{} {} official music video", artist, title);
        let results: ListResponse<SearchResult> = self
            .send_json(self.request(Method::GET, "search").await?.query(&[
                ("part", "id"),
                ("q", query.as_str()),
                ("type", "video"),
                ("maxResults", "1"),
            ]))
            .await?;

        match results.items.into_iter().find_map(|r| r.id.video_id) {
            Some(video_id) => {
                tracing::info!("YouTube match: {} - {} -> {}", artist, title, video_id);
                Ok(Some(TrackId(video_id)))
            }
            None => {
                tracing::warn!("YouTube search found nothing for: {} - {}", artist, title);
                Ok(None)
            }
        }
    }

    async fn last_inserted_track_id(&self) -> Result<Option<TrackId>> {
        let items = self.playlist_items().await?;
        let newest = match self.mode {
            PlaylistMode::InsertAtFront => items.first(),
            PlaylistMode::InsertAtBack => items.last(),
        };
        Ok(newest.map(PlaylistItem::video_id))
    }

    async fn current_track_ids(&self) -> Result<Vec<TrackId>> {
        Ok(self
            .playlist_items()
            .await?
            .iter()
            .map(PlaylistItem::video_id)
            .collect())
    }

    async fn insert_at(&self, track_id: &TrackId, position: InsertPosition) -> Result<()> {
        let mut snippet = json!({
            "playlistId": self.playlist_id,
            "resourceId": { "kind": "youtube#video", "videoId": track_id.as_str() },
        });
        if let InsertPosition::At(index) = position {
            snippet["position"] = json!(index);
        }

        self.send(
            self.request(Method::POST, "playlistItems")
                .await?
                .query(&[("part", "snippet")])
                .json(&json!({ "snippet": snippet })),
        )
        .await?;

        tracing::debug!("Inserted {} into YouTube playlist {} at {:?}", track_id, self.playlist_id, position);
        Ok(())
    }

    async fn remove_at(&self, removals: &[Removal]) -> Result<()> {
        if removals.is_empty() {
            return Ok(());
        }

        // Deletion is by playlist item id; resolve positions against a
        // listing taken after the insert.
        let items = self.playlist_items().await?;

        for removal in removals {
            let Some(item) = items.get(removal.position) else {
                tracing::warn!(
                    "Position {} is past the end of YouTube playlist {} ({} items), skipping",
                    removal.position,
                    self.playlist_id,
                    items.len()
                );
                continue;
            };

            if item.video_id() != removal.track_id {
                tracing::warn!(
                    "YouTube playlist {} changed underneath us: expected {} at {}, found {}",
                    self.playlist_id,
                    removal.track_id,
                    removal.position,
                    item.video_id()
                );
                continue;
            }

            self.send(
                self.request(Method::DELETE, "playlistItems")
                    .await?
                    .query(&[("id", item.id.as_str())]),
            )
            .await?;
        }

        Ok(())
    }
}
