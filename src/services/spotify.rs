use crate::error::{AppError, Result};
use crate::models::{PlatformKind, PlaylistMode, TrackId};
use crate::services::oauth::{api_limiter, check_response, OAuthCredentials, TokenSource};
use crate::services::platform::PlaylistPlatform;
use crate::services::playlist_maintainer::{InsertPosition, Removal};
use async_trait::async_trait;
use governor::DefaultDirectRateLimiter;
use regex::Regex;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::OnceLock;

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const PAGE_SIZE: usize = 100;
const REQUESTS_PER_SECOND: u32 = 5;

pub struct SpotifyPlatform {
    base_url: String,
    playlist_id: String,
    market: String,
    mode: PlaylistMode,
    tokens: TokenSource,
    limiter: DefaultDirectRateLimiter,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: String,
    display_name: Option<String>,
    product: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistMeta {
    name: Option<String>,
    owner: Option<PlaylistOwner>,
}

#[derive(Debug, Deserialize)]
struct PlaylistOwner {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: SearchTracks,
}

#[derive(Debug, Deserialize)]
struct SearchTracks {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemsPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next: Option<String>,
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

impl ItemsPage {
    fn uris(self) -> impl Iterator<Item = TrackId> {
        self.items
            .into_iter()
            .filter_map(|item| item.track.and_then(|t| t.uri))
            .map(TrackId)
    }
}

impl SpotifyPlatform {
    pub fn new(
        credentials: OAuthCredentials,
        playlist_id: String,
        market: String,
        mode: PlaylistMode,
    ) -> Self {
        let client = Client::new();
        Self {
            base_url: API_BASE.to_string(),
            playlist_id,
            market,
            mode,
            tokens: TokenSource::new("Spotify", TOKEN_URL, credentials, client.clone()),
            limiter: api_limiter(REQUESTS_PER_SECOND),
            client,
        }
    }

    async fn request(&self, method: Method, url: &str) -> Result<RequestBuilder> {
        self.limiter.until_ready().await;
        let token = self.tokens.access_token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::platform("Spotify", format!("Request failed: {}", e)))?;
        let response = check_response("Spotify", response).await?;

        response
            .json()
            .await
            .map_err(|e| AppError::platform("Spotify", format!("Failed to parse response: {}", e)))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<()> {
        let response = builder
            .send()
            .await
            .map_err(|e| AppError::platform("Spotify", format!("Request failed: {}", e)))?;
        check_response("Spotify", response).await?;
        Ok(())
    }

    fn items_url(&self) -> String {
        format!("{}/playlists/{}/items", self.base_url, self.playlist_id)
    }

    async fn items_page(&self, offset: usize, limit: usize) -> Result<ItemsPage> {
        let builder = self
            .request(Method::GET, &self.items_url())
            .await?
            .query(&[
                ("fields", "items(track(uri)),next,total".to_string()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ]);
        self.send_json(builder).await
    }
}

#[async_trait]
impl PlaylistPlatform for SpotifyPlatform {
    fn kind(&self) -> PlatformKind {
        PlatformKind::Spotify
    }

    fn playlist_id(&self) -> &str {
        &self.playlist_id
    }

    async fn verify(&self) -> Result<()> {
        let me: CurrentUser = self
            .send_json(self.request(Method::GET, &format!("{}/me", self.base_url)).await?)
            .await?;

        tracing::info!(
            "Authenticated as Spotify user: {}",
            me.display_name.as_deref().unwrap_or(&me.id)
        );

        // Playlist write endpoints require a premium account.
        if me.product.as_deref() != Some("premium") {
            return Err(AppError::Auth(format!(
                "Spotify Premium is required for playlist API access. Account '{}' has product '{}'",
                me.id,
                me.product.as_deref().unwrap_or("unknown")
            )));
        }

        let url = format!("{}/playlists/{}", self.base_url, self.playlist_id);
        let meta: PlaylistMeta = self
            .send_json(
                self.request(Method::GET, &url)
                    .await?
                    .query(&[("fields", "id,name,owner.id")]),
            )
            .await?;

        let owner = meta.owner.map(|o| o.id).unwrap_or_default();
        if owner != me.id {
            tracing::warn!(
                "Playlist '{}' ({}) is owned by '{}', not the authenticated user '{}'; item access may be restricted",
                meta.name.as_deref().unwrap_or(&self.playlist_id),
                self.playlist_id,
                owner,
                me.id
            );
        }

        Ok(())
    }

    async fn search(&self, artist: &str, title: &str) -> Result<Option<TrackId>> {
        let url = format!("{}/search", self.base_url);

        for (index, query) in search_queries(artist, title).iter().enumerate() {
            let builder = self.request(Method::GET, &url).await?.query(&[
                ("q", query.as_str()),
                ("type", "track"),
                ("limit", "1"),
                ("market", self.market.as_str()),
            ]);
            let results: SearchResponse = self.send_json(builder).await?;

            if let Some(uri) = results.tracks.items.into_iter().find_map(|t| t.uri) {
                tracing::info!("Spotify match [query={}]: {} - {} -> {}", index + 1, artist, title, uri);
                return Ok(Some(TrackId(uri)));
            }
        }

        tracing::warn!("Spotify search found nothing for: {} - {}", artist, title);
        Ok(None)
    }

    async fn last_inserted_track_id(&self) -> Result<Option<TrackId>> {
        let first = self.items_page(0, 1).await?;

        match self.mode {
            PlaylistMode::InsertAtFront => Ok(first.uris().next()),
            PlaylistMode::InsertAtBack => match first.total {
                Some(0) | None => Ok(None),
                Some(1) => Ok(first.uris().next()),
                Some(total) => Ok(self.items_page(total - 1, 1).await?.uris().next()),
            },
        }
    }

    async fn current_track_ids(&self) -> Result<Vec<TrackId>> {
        let mut ids = Vec::new();
        let mut page = self.items_page(0, PAGE_SIZE).await?;

        loop {
            let next = page.next.take();
            ids.extend(page.uris());

            match next {
                Some(next_url) => {
                    page = self.send_json(self.request(Method::GET, &next_url).await?).await?;
                }
                None => break,
            }
        }

        Ok(ids)
    }

    async fn insert_at(&self, track_id: &TrackId, position: InsertPosition) -> Result<()> {
        let body = match position {
            InsertPosition::At(index) => json!({ "uris": [track_id.as_str()], "position": index }),
            InsertPosition::Append => json!({ "uris": [track_id.as_str()] }),
        };

        self.send(self.request(Method::POST, &self.items_url()).await?.json(&body))
            .await?;

        tracing::debug!("Inserted {} into Spotify playlist {} at {:?}", track_id, self.playlist_id, position);
        Ok(())
    }

    async fn remove_at(&self, removals: &[Removal]) -> Result<()> {
        if removals.is_empty() {
            return Ok(());
        }

        let items: Vec<_> = removals
            .iter()
            .map(|r| json!({ "uri": r.track_id.as_str(), "positions": [r.position] }))
            .collect();

        self.send(
            self.request(Method::DELETE, &self.items_url())
                .await?
                .json(&json!({ "items": items })),
        )
        .await
    }
}

fn hebrew() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\u{0590}-\u{05FF}]").expect("valid regex"))
}

fn hebrew_in_parens() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^)]*[\u{0590}-\u{05FF}][^)]*)\)").expect("valid regex"))
}

fn trailing_brackets() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*[(\[].*?[)\]]\s*$").expect("valid regex"))
}

/// Search queries from strictest to loosest.
///
/// Recognizers often report Hebrew songs as "Transliteration (עברית)", list
/// several artists, or append "(Live)" style suffixes the catalog lacks.
pub fn search_queries(artist: &str, title: &str) -> Vec<String> {
    let hebrew_title = hebrew_in_parens()
        .captures(title)
        .map(|c| c[1].trim().to_string())
        .or_else(|| hebrew().is_match(title).then(|| title.to_string()));

    let hebrew_artist = hebrew_in_parens()
        .captures(artist)
        .map(|c| c[1].trim().to_string());

    let first_artist = artist
        .split(|c| c == ',' || c == '&')
        .next()
        .unwrap_or(artist)
        .trim()
        .to_string();

    let clean_title = trailing_brackets().replace(title, "").trim().to_string();

    let mut queries = vec![format!("artist:{} track:{}", artist, title)];

    if let Some(ht) = &hebrew_title {
        queries.push(format!("artist:{} track:{}", artist, ht));
        queries.push(format!("{} {}", artist, ht));
    }
    if let Some(ha) = &hebrew_artist {
        queries.push(format!("{} {}", ha, title));
        if let Some(ht) = &hebrew_title {
            queries.push(format!("{} {}", ha, ht));
        }
    }
    queries.push(format!("{} {}", artist, title));
    queries.push(format!("{} - {}", artist, title));
    if first_artist != artist {
        queries.push(format!("{} {}", first_artist, title));
        if let Some(ht) = &hebrew_title {
            queries.push(format!("{} {}", first_artist, ht));
        }
    }
    if clean_title != title {
        queries.push(format!("artist:{} track:{}", artist, clean_title));
    }
    if let Some(ht) = &hebrew_title {
        queries.push(format!("track:{}", ht));
    }

    queries
}
