use crate::config::LogFormat;
use crate::error::Result;
use crate::models::StationContext;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Span every worker runs inside; its `name` field selects the log file.
pub const STATION_SPAN: &str = "station";

pub fn init(format: LogFormat, station_files: StationFileLayer) {
    let (text, json) = match format {
        LogFormat::Text => (Some(fmt::layer()), None),
        LogFormat::Json => (None, Some(fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,radio_monitor=debug".into()))
        .with(text)
        .with(json)
        .with(station_files)
        .init();
}

/// Size-capped log file with numbered backups (`x.log.1`, `x.log.2`, ...).
struct RotatingFile {
    path: PathBuf,
    file: File,
    size: u64,
    max_bytes: u64,
    backup_count: usize,
}

impl RotatingFile {
    fn open(path: &Path, max_bytes: u64, backup_count: usize) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
            max_bytes,
            backup_count,
        })
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        let len = line.len() as u64;
        if self.max_bytes > 0 && self.size > 0 && self.size + len > self.max_bytes {
            self.rotate()?;
        }
        self.file.write_all(line.as_bytes())?;
        self.size += len;
        Ok(())
    }

    fn rotate(&mut self) -> std::io::Result<()> {
        if self.backup_count > 0 {
            for n in (1..self.backup_count).rev() {
                let from = self.backup_path(n);
                if from.exists() {
                    std::fs::rename(&from, self.backup_path(n + 1))?;
                }
            }
            std::fs::rename(&self.path, self.backup_path(1))?;
        }

        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        self.size = 0;
        Ok(())
    }

    fn backup_path(&self, n: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }
}

/// Copies events from inside a station span to that station's log file.
pub struct StationFileLayer {
    files: HashMap<String, Mutex<RotatingFile>>,
}

struct StationName(String);

impl StationFileLayer {
    pub fn new(stations: &[StationContext], max_bytes: u64, backup_count: usize) -> Result<Self> {
        let mut files = HashMap::new();
        for station in stations {
            if let Some(path) = &station.log_file {
                let file = RotatingFile::open(path, max_bytes, backup_count)?;
                files.insert(station.name.clone(), Mutex::new(file));
            }
        }
        Ok(Self { files })
    }
}

impl<S> Layer<S> for StationFileLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        if attrs.metadata().name() != STATION_SPAN {
            return;
        }

        let mut visitor = NameVisitor(None);
        attrs.record(&mut visitor);
        if let (Some(name), Some(span)) = (visitor.0, ctx.span(id)) {
            span.extensions_mut().insert(StationName(name));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let Some(scope) = ctx.event_scope(event) else {
            return;
        };
        let Some(station) = scope.from_root().find_map(|span| {
            let extensions = span.extensions();
            extensions.get::<StationName>().map(|n| n.0.clone())
        }) else {
            return;
        };
        let Some(file) = self.files.get(&station) else {
            return;
        };

        let mut line = format!(
            "{} {:<5} ",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            event.metadata().level()
        );
        event.record(&mut LineVisitor(&mut line));
        line.push('\n');

        if let Ok(mut file) = file.lock() {
            // Nowhere to report a failed log write.
            let _ = file.write_line(&line);
        }
    }
}

struct NameVisitor(Option<String>);

impl Visit for NameVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "name" {
            self.0 = Some(value.to_string());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "name" {
            self.0 = Some(format!("{:?}", value));
        }
    }
}

struct LineVisitor<'a>(&'a mut String);

impl Visit for LineVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, "{:?}", value);
        } else {
            let _ = write!(self.0, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::registry::Registry;

    fn station(name: &str, log_file: PathBuf) -> StationContext {
        StationContext {
            name: name.to_string(),
            stream_url: "http://stream.example/live".to_string(),
            skip_ranges: Vec::new(),
            playlists: Vec::new(),
            log_file: Some(log_file),
            analytics: false,
        }
    }

    #[test]
    fn test_events_routed_to_station_file() {
        let dir = tempfile::tempdir().unwrap();
        let kan = dir.path().join("kan88.log");
        let glz = dir.path().join("logs/glz.log");
        let layer = StationFileLayer::new(
            &[station("kan88", kan.clone()), station("glz", glz.clone())],
            1024 * 1024,
            3,
        )
        .unwrap();

        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!(STATION_SPAN, name = %"kan88");
            span.in_scope(|| tracing::info!(track = "T1", "Added to playlist"));
            tracing::info!("outside any station");
        });

        let kan_log = std::fs::read_to_string(&kan).unwrap();
        assert!(kan_log.contains("INFO"));
        assert!(kan_log.contains("Added to playlist track=\"T1\""));
        assert!(!kan_log.contains("outside"));
        assert_eq!(std::fs::read_to_string(&glz).unwrap(), "");
    }

    #[test]
    fn test_rotation_keeps_backup_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("station.log");
        let mut file = RotatingFile::open(&path, 10, 2).unwrap();

        for line in ["first-line\n", "second-line\n", "third-line\n", "fourth-line\n"] {
            file.write_line(line).unwrap();
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fourth-line\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("station.log.1")).unwrap(), "third-line\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("station.log.2")).unwrap(), "second-line\n");
        assert!(!dir.path().join("station.log.3").exists());
    }
}
