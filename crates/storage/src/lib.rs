use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use trip_core::{ItineraryCombination, TripRequest};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionLog {
    pub id: String,
    pub request: TripRequest,
    pub combinations: Vec<ItineraryCombination>,
    pub created_at: DateTime<Utc>,
}

impl PredictionLog {
    pub fn new(request: TripRequest, combinations: Vec<ItineraryCombination>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            request,
            combinations,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedPlan {
    pub id: String,
    pub plan_number: u32,
    pub package_ids: Vec<String>,
    pub full_plan: ItineraryCombination,
    pub confirmed_at: DateTime<Utc>,
}

impl ConfirmedPlan {
    pub fn new(plan_number: u32, full_plan: ItineraryCombination) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            plan_number,
            package_ids: full_plan.package_ids(),
            full_plan,
            confirmed_at: Utc::now(),
        }
    }
}

pub trait PredictionRepository: Send + Sync {
    async fn record_prediction(&self, log: &PredictionLog) -> Result<()>;
    async fn recent_predictions(&self, limit: usize) -> Result<Vec<PredictionLog>>;
}

pub trait ConfirmedPlanRepository: Send + Sync {
    async fn insert_confirmed_plan(&self, plan: &ConfirmedPlan) -> Result<()>;
    async fn list_confirmed_plans(&self) -> Result<Vec<ConfirmedPlan>>;
    async fn delete_confirmed_plan(&self, id: &str) -> Result<bool>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    predictions: Arc<RwLock<Vec<PredictionLog>>>,
    confirmed: Arc<RwLock<Vec<ConfirmedPlan>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PredictionRepository for MemoryStore {
    async fn record_prediction(&self, log: &PredictionLog) -> Result<()> {
        self.predictions.write().push(log.clone());
        Ok(())
    }

    async fn recent_predictions(&self, limit: usize) -> Result<Vec<PredictionLog>> {
        Ok(self
            .predictions
            .read()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect())
    }
}

impl ConfirmedPlanRepository for MemoryStore {
    async fn insert_confirmed_plan(&self, plan: &ConfirmedPlan) -> Result<()> {
        self.confirmed.write().push(plan.clone());
        Ok(())
    }

    async fn list_confirmed_plans(&self) -> Result<Vec<ConfirmedPlan>> {
        let mut plans = self.confirmed.read().clone();
        plans.sort_by(|a, b| b.confirmed_at.cmp(&a.confirmed_at));
        Ok(plans)
    }

    async fn delete_confirmed_plan(&self, id: &str) -> Result<bool> {
        let mut guard = self.confirmed.write();
        let before = guard.len();
        guard.retain(|plan| plan.id != id);
        Ok(guard.len() != before)
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .with_context(|| format!("failed connecting to sqlite at {}", database_url))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
              id TEXT PRIMARY KEY,
              request_json TEXT NOT NULL,
              combinations_json TEXT NOT NULL,
              created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS confirmed_plans (
              id TEXT PRIMARY KEY,
              plan_number INTEGER NOT NULL,
              package_ids_json TEXT NOT NULL,
              full_plan_json TEXT NOT NULL,
              confirmed_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl PredictionRepository for SqliteStore {
    async fn record_prediction(&self, log: &PredictionLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO predictions (id, request_json, combinations_json, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&log.id)
        .bind(serde_json::to_string(&log.request)?)
        .bind(serde_json::to_string(&log.combinations)?)
        .bind(log.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_predictions(&self, limit: usize) -> Result<Vec<PredictionLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, request_json, combinations_json, created_at
            FROM predictions
            ORDER BY created_at DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let request_json: String = row.get("request_json");
                let combinations_json: String = row.get("combinations_json");
                Ok(PredictionLog {
                    id: row.get("id"),
                    request: serde_json::from_str(&request_json)
                        .context("stored prediction request is not valid JSON")?,
                    combinations: serde_json::from_str(&combinations_json)
                        .context("stored combinations are not valid JSON")?,
                    created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
                })
            })
            .collect()
    }
}

impl ConfirmedPlanRepository for SqliteStore {
    async fn insert_confirmed_plan(&self, plan: &ConfirmedPlan) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO confirmed_plans (id, plan_number, package_ids_json, full_plan_json, confirmed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&plan.id)
        .bind(i64::from(plan.plan_number))
        .bind(serde_json::to_string(&plan.package_ids)?)
        .bind(serde_json::to_string(&plan.full_plan)?)
        .bind(plan.confirmed_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_confirmed_plans(&self) -> Result<Vec<ConfirmedPlan>> {
        let rows = sqlx::query(
            r#"
            SELECT id, plan_number, package_ids_json, full_plan_json, confirmed_at
            FROM confirmed_plans
            ORDER BY confirmed_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let package_ids_json: String = row.get("package_ids_json");
                let full_plan_json: String = row.get("full_plan_json");
                Ok(ConfirmedPlan {
                    id: row.get("id"),
                    plan_number: u32::try_from(row.get::<i64, _>("plan_number"))
                        .context("stored plan number is out of range")?,
                    package_ids: serde_json::from_str(&package_ids_json)
                        .context("stored package ids are not valid JSON")?,
                    full_plan: serde_json::from_str(&full_plan_json)
                        .context("stored confirmed plan is not valid JSON")?,
                    confirmed_at: parse_timestamp(&row.get::<String, _>("confirmed_at"))?,
                })
            })
            .collect()
    }

    async fn delete_confirmed_plan(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM confirmed_plans WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse()
        .with_context(|| format!("stored timestamp `{}` is not RFC 3339", raw))
}

#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub fn memory() -> Self {
        Self::Memory(MemoryStore::new())
    }

    pub async fn sqlite(database_url: &str) -> Result<Self> {
        let sqlite = SqliteStore::connect(database_url).await?;
        Ok(Self::Sqlite(sqlite))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
        }
    }
}

impl PredictionRepository for Store {
    async fn record_prediction(&self, log: &PredictionLog) -> Result<()> {
        match self {
            Store::Memory(store) => store.record_prediction(log).await,
            Store::Sqlite(store) => store.record_prediction(log).await,
        }
    }

    async fn recent_predictions(&self, limit: usize) -> Result<Vec<PredictionLog>> {
        match self {
            Store::Memory(store) => store.recent_predictions(limit).await,
            Store::Sqlite(store) => store.recent_predictions(limit).await,
        }
    }
}

impl ConfirmedPlanRepository for Store {
    async fn insert_confirmed_plan(&self, plan: &ConfirmedPlan) -> Result<()> {
        match self {
            Store::Memory(store) => store.insert_confirmed_plan(plan).await,
            Store::Sqlite(store) => store.insert_confirmed_plan(plan).await,
        }
    }

    async fn list_confirmed_plans(&self) -> Result<Vec<ConfirmedPlan>> {
        match self {
            Store::Memory(store) => store.list_confirmed_plans().await,
            Store::Sqlite(store) => store.list_confirmed_plans().await,
        }
    }

    async fn delete_confirmed_plan(&self, id: &str) -> Result<bool> {
        match self {
            Store::Memory(store) => store.delete_confirmed_plan(id).await,
            Store::Sqlite(store) => store.delete_confirmed_plan(id).await,
        }
    }
}
