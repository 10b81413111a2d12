use crate::error::Result;
use crate::models::{
    ArtistCount, ArtistSongCount, DayCount, DowCount, HourCount, IdentifiedSong, PlayRecord, SongCount,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;
use tokio::sync::Mutex;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DOW_LABELS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Play-history destination. Callers treat it as fire-and-forget.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record_play(
        &self,
        station: &str,
        song: &IdentifiedSong,
        played_at: DateTime<Utc>,
        external_id: Option<&str>,
    ) -> Result<()>;
}

/// Optional filters shared by the read queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayFilter {
    pub station: Option<String>,
    pub days: Option<u32>,
}

/// SQLite play history shared by all station workers.
///
/// Writes go through a single lock; reads never take it.
pub struct AnalyticsStore {
    pool: SqlitePool,
    write_lock: Mutex<()>,
    retention: Duration,
}

impl AnalyticsStore {
    pub async fn connect(database_url: &str, retention_days: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(pool, retention_days).await
    }

    pub async fn with_pool(pool: SqlitePool, retention_days: u32) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Analytics database ready");

        Ok(Self {
            pool,
            write_lock: Mutex::new(()),
            retention: Duration::days(retention_days as i64),
        })
    }

    pub async fn top_songs(&self, filter: &PlayFilter, limit: i64) -> Result<Vec<SongCount>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT artist, title, COUNT(*) AS count, MAX(external_id) AS external_id FROM plays",
        );
        push_filters(&mut query, filter, None);
        query.push(
            " GROUP BY artist, title \
             ORDER BY CASE WHEN COUNT(*) > 1 THEN 0 ELSE 1 END, COUNT(*) DESC, MAX(played_at) DESC \
             LIMIT ",
        );
        query.push_bind(limit);

        Ok(query.build_query_as::<SongCount>().fetch_all(&self.pool).await?)
    }

    pub async fn top_artists(&self, filter: &PlayFilter, limit: i64) -> Result<Vec<ArtistCount>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT artist, COUNT(*) AS count FROM plays");
        push_filters(&mut query, filter, None);
        query.push(
            " GROUP BY artist \
             ORDER BY CASE WHEN COUNT(*) > 1 THEN 0 ELSE 1 END, COUNT(*) DESC, MAX(played_at) DESC \
             LIMIT ",
        );
        query.push_bind(limit);

        Ok(query.build_query_as::<ArtistCount>().fetch_all(&self.pool).await?)
    }

    /// 24 buckets, hour 0-23 (UTC).
    pub async fn plays_by_hour(&self, filter: &PlayFilter) -> Result<Vec<HourCount>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT CAST(strftime('%H', played_at) AS INTEGER) AS hour, COUNT(*) AS count FROM plays",
        );
        push_filters(&mut query, filter, None);
        query.push(" GROUP BY hour ORDER BY hour");

        let rows: Vec<(i64, i64)> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok((0..24)
            .map(|hour| HourCount {
                hour,
                count: bucket(&rows, hour),
            })
            .collect())
    }

    /// 7 buckets, 0 = Sunday.
    pub async fn plays_by_dow(&self, filter: &PlayFilter) -> Result<Vec<DowCount>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT CAST(strftime('%w', played_at) AS INTEGER) AS dow, COUNT(*) AS count FROM plays",
        );
        push_filters(&mut query, filter, None);
        query.push(" GROUP BY dow ORDER BY dow");

        let rows: Vec<(i64, i64)> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok((0..7)
            .map(|dow| DowCount {
                dow,
                label: DOW_LABELS[dow as usize],
                count: bucket(&rows, dow),
            })
            .collect())
    }

    pub async fn plays_by_day(&self, filter: &PlayFilter, artist: Option<&str>) -> Result<Vec<DayCount>> {
        let mut query = QueryBuilder::<Sqlite>::new("SELECT date(played_at) AS day, COUNT(*) AS count FROM plays");
        push_filters(&mut query, filter, artist);
        query.push(" GROUP BY day ORDER BY day");

        Ok(query.build_query_as::<DayCount>().fetch_all(&self.pool).await?)
    }

    pub async fn songs_by_artist(&self, artist: &str, filter: &PlayFilter, limit: i64) -> Result<Vec<ArtistSongCount>> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT title, COUNT(*) AS count, MAX(external_id) AS external_id FROM plays",
        );
        push_filters(&mut query, filter, Some(artist));
        query.push(" GROUP BY title ORDER BY count DESC LIMIT ");
        query.push_bind(limit);

        Ok(query.build_query_as::<ArtistSongCount>().fetch_all(&self.pool).await?)
    }

    pub async fn recent_plays(&self, station: Option<&str>, limit: i64) -> Result<Vec<PlayRecord>> {
        let filter = PlayFilter {
            station: station.map(str::to_string),
            days: None,
        };
        let mut query = QueryBuilder::<Sqlite>::new("SELECT station, artist, title, played_at FROM plays");
        push_filters(&mut query, &filter, None);
        query.push(" ORDER BY played_at DESC, id DESC LIMIT ");
        query.push_bind(limit);

        Ok(query.build_query_as::<PlayRecord>().fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl AnalyticsSink for AnalyticsStore {
    async fn record_play(
        &self,
        station: &str,
        song: &IdentifiedSong,
        played_at: DateTime<Utc>,
        external_id: Option<&str>,
    ) -> Result<()> {
        let cutoff = (Utc::now() - self.retention).format(TIMESTAMP_FORMAT).to_string();

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO plays (station, artist, title, played_at, external_id) VALUES (?, ?, ?, ?, ?)")
            .bind(station)
            .bind(&song.artist)
            .bind(&song.title)
            .bind(played_at.format(TIMESTAMP_FORMAT).to_string())
            .bind(external_id)
            .execute(&mut *tx)
            .await?;

        let pruned = sqlx::query("DELETE FROM plays WHERE station = ? AND played_at < ?")
            .bind(station)
            .bind(&cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if pruned > 0 {
            tracing::debug!("Pruned {} plays older than {} for {}", pruned, cutoff, station);
        }
        Ok(())
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &PlayFilter, artist: Option<&str>) {
    let mut separator = " WHERE ";

    if let Some(station) = &filter.station {
        query.push(separator).push("station = ").push_bind(station.clone());
        separator = " AND ";
    }
    if let Some(days) = filter.days.filter(|&d| d > 0) {
        let cutoff = (Utc::now() - Duration::days(days as i64)).format(TIMESTAMP_FORMAT).to_string();
        query.push(separator).push("played_at >= ").push_bind(cutoff);
        separator = " AND ";
    }
    if let Some(artist) = artist {
        query.push(separator).push("artist = ").push_bind(artist.to_string());
    }
}

fn bucket(rows: &[(i64, i64)], key: u32) -> i64 {
    rows.iter()
        .find(|(k, _)| *k == key as i64)
        .map(|(_, count)| *count)
        .unwrap_or(0)
}
