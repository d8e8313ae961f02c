use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use broker_config::BrokerConfig;
use broker_proto::{ArchiveSpec, Request, Response};
use tracing::warn;
use tsdb_format::{Error, Slug};
use tsdb_series::{ArchiveConfig, CreateConfig, SeriesEngine};

use crate::audit::append_readings;
use crate::wire::{error_kind, parse_aggregation_type, parse_series_type};

/// Lazily-opened per-series handle. The `Mutex` wrapping it *is* the
/// per-series lock: holding it for the duration of a request serializes
/// that series' operations, while different series' mutexes are acquired
/// independently and run in parallel.
enum SeriesHandle {
    Unopened,
    Open(SeriesEngine),
}

impl SeriesHandle {
    fn ensure_open(&mut self, base_path: &std::path::Path, slug: &Slug) -> Result<&mut SeriesEngine, Error> {
        if matches!(self, SeriesHandle::Unopened) {
            *self = SeriesHandle::Open(SeriesEngine::open(base_path, slug)?);
        }
        match self {
            SeriesHandle::Open(engine) => Ok(engine),
            SeriesHandle::Unopened => unreachable!("just opened above"),
        }
    }
}

/// Owns every open series file for the process lifetime and serializes
/// per-series access. Request handlers take the broker-wide lock only to
/// resolve or install a series' mutex, then release it before touching any
/// file.
pub struct Broker {
    config: Arc<BrokerConfig>,
    base_path: PathBuf,
    series: Mutex<HashMap<String, Arc<Mutex<SeriesHandle>>>>,
}

impl Broker {
    pub fn new(config: BrokerConfig) -> Self {
        let base_path = config.base_path();
        Self {
            config: Arc::new(config),
            base_path,
            series: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    fn handle_for(&self, slug: &str) -> Arc<Mutex<SeriesHandle>> {
        let mut map = self.series.lock().expect("broker coordination lock poisoned");
        map.entry(slug.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SeriesHandle::Unopened)))
            .clone()
    }

    fn evict(&self, slug: &str) {
        let mut map = self.series.lock().expect("broker coordination lock poisoned");
        map.remove(slug);
    }

    pub async fn dispatch(self: &Arc<Self>, request: Request) -> Response {
        match self.clone().handle(request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(error = %error, "request failed");
                Response::error(error_kind(&error), error.to_string())
            }
        }
    }

    async fn handle(self: Arc<Self>, request: Request) -> Result<Response, Error> {
        match request {
            Request::List => self.list().await,
            Request::Create {
                series,
                series_type,
                start_epoch,
                interval,
                timezone_name,
                archives,
            } => {
                self.create(series, series_type, start_epoch, interval, timezone_name, archives)
                    .await
            }
            Request::Update { series, batch } => self.update(series, batch).await,
            Request::Append { series, readings } => self.append(series, readings).await,
            Request::Fetch {
                series,
                aggregation_type,
                resolution,
                period_start,
                period_end,
            } => self.fetch(series, aggregation_type, resolution, period_start, period_end).await,
            Request::Info { series } => self.info(series).await,
            Request::GetConfig { series } => self.info(series).await,
            Request::Exists { series } => self.exists(series).await,
            Request::Delete { series } => self.delete(series).await,
        }
    }

    async fn list(self: Arc<Self>) -> Result<Response, Error> {
        let base_path = self.base_path.clone();
        let names = tokio::task::spawn_blocking(move || -> Result<Vec<String>, Error> {
            let dir = base_path.join("tsdb");
            if !dir.exists() {
                return Ok(Vec::new());
            }
            let mut names = Vec::new();
            for entry in std::fs::read_dir(dir)? {
                let entry = entry?;
                if let Some(name) = entry.path().file_stem().and_then(|s| s.to_str()) {
                    if entry.path().extension().and_then(|e| e.to_str()) == Some("tsdb") {
                        names.push(name.to_string());
                    }
                }
            }
            names.sort();
            Ok(names)
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))??;
        Ok(Response::ok(names))
    }

    #[allow(clippy::too_many_arguments)]
    async fn create(
        self: Arc<Self>,
        series: String,
        series_type: String,
        start_epoch: i64,
        interval: u32,
        timezone_name: String,
        archives: Vec<ArchiveSpec>,
    ) -> Result<Response, Error> {
        let slug = Slug::parse(series)?;
        let base_path = self.base_path.clone();
        let archive_configs = archives
            .into_iter()
            .map(|a| -> Result<ArchiveConfig, Error> {
                Ok(ArchiveConfig {
                    aggregation_type: parse_aggregation_type(&a.aggregation_type)?,
                    aggregation: a.aggregation,
                    count: a.count,
                    threshold: a.threshold,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let series_type = parse_series_type(&series_type)?;
        let start = chrono::DateTime::from_timestamp(start_epoch, 0)
            .ok_or_else(|| Error::InvalidConfig("start_epoch out of range".into()))?;

        tokio::task::spawn_blocking(move || {
            SeriesEngine::create(
                &base_path,
                &slug,
                CreateConfig {
                    series_type,
                    start,
                    interval,
                    timezone_name,
                    archives: archive_configs,
                },
            )
            .map(|engine| engine.close())
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))???;

        Ok(Response::ok(serde_json::Value::Null))
    }

    async fn with_open_series<F, T>(self: &Arc<Self>, series: String, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut SeriesEngine) -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let slug = Slug::parse(series)?;
        let base_path = self.base_path.clone();
        let handle = self.handle_for(slug.as_str());

        tokio::task::spawn_blocking(move || {
            let mut guard = handle.lock().expect("per-series lock poisoned");
            let engine = guard.ensure_open(&base_path, &slug)?;
            f(engine)
        })
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
    }

    async fn update(self: &Arc<Self>, series: String, batch: Vec<(i64, f32)>) -> Result<Response, Error> {
        self.with_open_series(series, move |engine| engine.update(&batch))
            .await?;
        Ok(Response::ok(serde_json::Value::Null))
    }

    async fn append(self: &Arc<Self>, series: String, readings: Vec<(i64, f64)>) -> Result<Response, Error> {
        let base_path = self.base_path.clone();
        let slug = Slug::parse(series.clone())?;

        let (appended, last) = self
            .with_open_series(series, move |engine| {
                let last_before = engine.info().last_epoch;
                let fresh: Vec<(i64, f64)> = readings.into_iter().filter(|&(ts, _)| ts > last_before).collect();
                let batch: Vec<(i64, f32)> = fresh.iter().map(|&(ts, v)| (ts, v as f32)).collect();
                engine.update(&batch)?;
                if !fresh.is_empty() {
                    append_readings(&base_path, &slug, &fresh)?;
                }
                let last = engine.info().last_epoch;
                Ok((fresh.len(), last))
            })
            .await?;

        Ok(Response::ok(serde_json::json!({ "appended": appended, "last": last })))
    }

    async fn fetch(
        self: &Arc<Self>,
        series: String,
        aggregation_type: String,
        resolution: u32,
        period_start: i64,
        period_end: i64,
    ) -> Result<Response, Error> {
        let aggregation_type = parse_aggregation_type(&aggregation_type)?;
        let rows = self
            .with_open_series(series, move |engine| {
                let rows = engine.fetch(aggregation_type, resolution, period_start, period_end)?;
                Ok(rows
                    .into_iter()
                    .map(|(instant, value)| (instant.timestamp(), value))
                    .collect::<Vec<_>>())
            })
            .await?;
        Ok(Response::ok(rows))
    }

    async fn info(self: &Arc<Self>, series: String) -> Result<Response, Error> {
        let info = self
            .with_open_series(series, |engine| Ok(engine.info()))
            .await?;
        Ok(Response::ok(serde_json::json!({
            "series_type": format!("{:?}", info.series_type),
            "interval": info.interval,
            "start_epoch": info.start_epoch,
            "last_epoch": info.last_epoch,
            "timezone_name": info.timezone_name,
            "archives": info.archives.iter().map(|a| serde_json::json!({
                "aggregation_type": a.aggregation_type.as_str(),
                "resolution": a.resolution,
                "count": a.count,
                "aggregation": a.aggregation,
            })).collect::<Vec<_>>(),
        })))
    }

    async fn exists(self: &Arc<Self>, series: String) -> Result<Response, Error> {
        let slug = Slug::parse(series)?;
        let base_path = self.base_path.clone();
        let exists = tokio::task::spawn_blocking(move || SeriesEngine::exists(&base_path, &slug))
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Response::ok(exists))
    }

    async fn delete(self: &Arc<Self>, series: String) -> Result<Response, Error> {
        let slug = Slug::parse(series)?;
        let base_path = self.base_path.clone();
        let slug_for_engine = slug.clone();
        tokio::task::spawn_blocking(move || SeriesEngine::delete(&base_path, &slug_for_engine))
            .await
            .map_err(|e| Error::Internal(e.to_string()))??;
        let _ = std::fs::remove_file(crate::audit::csv_path(&self.base_path, &slug));
        self.evict(slug.as_str());
        Ok(Response::ok(serde_json::Value::Null))
    }
}
