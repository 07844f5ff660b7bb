//! SQLite-based metering store

use crate::metering::{LimitCheck, MeteringEntry, MeteringSink};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::warn;

/// Token and cost totals over a time window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UsageTotals {
    pub invocations: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_units: f64,
}

impl UsageTotals {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// SQLite metering store
#[derive(Clone)]
pub struct SqliteMeteringStore {
    pool: SqlitePool,
    daily_token_cap: Option<u64>,
}

impl SqliteMeteringStore {
    /// Create a new SQLite store
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path))
            .context("Invalid database path")?
            .create_if_missing(true);

        // A single connection keeps `:memory:` databases shared across queries
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        let store = Self {
            pool,
            daily_token_cap: None,
        };
        store.init().await?;

        Ok(store)
    }

    /// Create store with default path
    pub async fn with_default_path() -> Result<Self> {
        let data_dir = dirs::data_local_dir().unwrap_or_else(|| std::path::PathBuf::from("."));
        let db_dir = data_dir.join("skill-pipeline");
        std::fs::create_dir_all(&db_dir)?;

        let db_path = db_dir.join("metering.db");
        let db_path = db_path
            .to_str()
            .context("Database path is not valid UTF-8")?;
        Self::new(db_path).await
    }

    /// Deny new runs once today's tokens reach `cap`
    pub fn with_daily_token_cap(mut self, cap: u64) -> Self {
        self.daily_token_cap = Some(cap);
        self
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS metering (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                pipeline_id TEXT NOT NULL,
                brand_id TEXT,
                skill_id TEXT NOT NULL,
                model TEXT,
                tier TEXT NOT NULL,
                input_tokens INTEGER NOT NULL DEFAULT 0,
                output_tokens INTEGER NOT NULL DEFAULT 0,
                cost_units REAL NOT NULL DEFAULT 0.0,
                recorded_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_metering_recorded_at ON metering(recorded_at);
            CREATE INDEX IF NOT EXISTS idx_metering_run_id ON metering(run_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert one entry
    pub async fn insert(&self, entry: &MeteringEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO metering
            (run_id, pipeline_id, brand_id, skill_id, model, tier, input_tokens, output_tokens, cost_units, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(entry.run_id.to_string())
        .bind(&entry.pipeline_id)
        .bind(&entry.brand_id)
        .bind(&entry.skill_id)
        .bind(&entry.model)
        .bind(entry.tier.as_str())
        .bind(entry.input_tokens as i64)
        .bind(entry.output_tokens as i64)
        .bind(entry.cost_units)
        .bind(entry.recorded_at.timestamp_millis())
        .execute(&self.pool)
        .await
        .context("Failed to save metering entry")?;

        Ok(())
    }

    /// Totals for entries recorded at or after `since`
    pub async fn totals_since(&self, since: DateTime<Utc>) -> Result<UsageTotals> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS invocations,
                   COALESCE(SUM(input_tokens), 0) AS input_tokens,
                   COALESCE(SUM(output_tokens), 0) AS output_tokens,
                   COALESCE(SUM(cost_units), 0.0) AS cost_units
            FROM metering
            WHERE recorded_at >= ?1
            "#,
        )
        .bind(since.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum metering entries")?;

        Ok(UsageTotals {
            invocations: row.get::<i64, _>("invocations") as u64,
            input_tokens: row.get::<i64, _>("input_tokens") as u64,
            output_tokens: row.get::<i64, _>("output_tokens") as u64,
            cost_units: row.get::<f64, _>("cost_units"),
        })
    }

    /// Totals for a single run
    pub async fn totals_for_run(&self, run_id: uuid::Uuid) -> Result<UsageTotals> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS invocations,
                   COALESCE(SUM(input_tokens), 0) AS input_tokens,
                   COALESCE(SUM(output_tokens), 0) AS output_tokens,
                   COALESCE(SUM(cost_units), 0.0) AS cost_units
            FROM metering
            WHERE run_id = ?1
            "#,
        )
        .bind(run_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to sum run metering")?;

        Ok(UsageTotals {
            invocations: row.get::<i64, _>("invocations") as u64,
            input_tokens: row.get::<i64, _>("input_tokens") as u64,
            output_tokens: row.get::<i64, _>("output_tokens") as u64,
            cost_units: row.get::<f64, _>("cost_units"),
        })
    }

    fn start_of_today() -> DateTime<Utc> {
        let midnight = Utc::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default();
        DateTime::from_naive_utc_and_offset(midnight, Utc)
    }
}

#[async_trait::async_trait]
impl MeteringSink for SqliteMeteringStore {
    fn record(&self, entry: MeteringEntry) {
        let store = self.clone();
        tokio::spawn(async move {
            if let Err(e) = store.insert(&entry).await {
                warn!("Dropping metering entry for run {}: {:#}", entry.run_id, e);
            }
        });
    }

    async fn check_limits(&self) -> LimitCheck {
        let Some(cap) = self.daily_token_cap else {
            return LimitCheck::allow();
        };

        match self.totals_since(Self::start_of_today()).await {
            Ok(totals) if totals.total_tokens() >= cap => LimitCheck::deny(format!(
                "daily token cap reached ({}/{})",
                totals.total_tokens(),
                cap
            )),
            Ok(_) => LimitCheck::allow(),
            Err(e) => {
                // Metering outages do not block runs
                warn!("Metering limit check failed: {:#}", e);
                LimitCheck::allow()
            }
        }
    }
}
