mod config;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};
use trip_core::{
    Catalog, CatalogStats, FeatureEncoder, GenerationReport, ItineraryAssembler,
    ItineraryCombination, LocationResolution, PlanOutcome, PlannerError, RngSource, TripRequest,
};
use trip_dataset::{load_catalog, LoadedCatalog};
use trip_ml::BudgetMlStack;
use trip_observability::AppMetrics;
use trip_storage::{
    ConfirmedPlan, ConfirmedPlanRepository, PredictionLog, PredictionRepository, Store,
};

pub use config::{PlannerConfig, DEFAULT_BIND, DEFAULT_DATASET_PATH, DEFAULT_MODEL_PATH};

/// Opens the SQLite store when a database URL is configured, memory otherwise.
pub async fn open_store(config: &PlannerConfig) -> Result<Store> {
    match config.database_url.as_deref() {
        Some(database_url) => Store::sqlite(database_url).await,
        None => Ok(Store::memory()),
    }
}

/// Owns the immutable catalog, encoder and model, and the persistence
/// collaborator. Cheap to clone; every request shares the same catalog.
#[derive(Clone)]
pub struct TripPlannerService<S>
where
    S: PredictionRepository + ConfirmedPlanRepository,
{
    catalog: Arc<Catalog>,
    encoder: Arc<FeatureEncoder>,
    ml_stack: BudgetMlStack,
    store: Arc<S>,
    metrics: Arc<AppMetrics>,
    max_options: usize,
    seed: Option<u64>,
}

impl<S> TripPlannerService<S>
where
    S: PredictionRepository + ConfirmedPlanRepository,
{
    pub fn new(
        loaded: LoadedCatalog,
        ml_stack: BudgetMlStack,
        store: Arc<S>,
        metrics: Arc<AppMetrics>,
        config: &PlannerConfig,
    ) -> Self {
        Self {
            catalog: Arc::new(loaded.catalog),
            encoder: Arc::new(loaded.encoder),
            ml_stack,
            store,
            metrics,
            max_options: config.max_options,
            seed: config.seed,
        }
    }

    /// Loads the dataset and budget model named by `config`.
    pub fn bootstrap(
        config: &PlannerConfig,
        store: Arc<S>,
        metrics: Arc<AppMetrics>,
    ) -> Result<Self> {
        let loaded = load_catalog(&config.dataset_path).with_context(|| {
            format!(
                "failed to load package dataset from {}",
                config.dataset_path.display()
            )
        })?;
        let ml_stack = BudgetMlStack::load(&config.model_path).with_context(|| {
            format!(
                "failed to load budget model from {}",
                config.model_path.display()
            )
        })?;

        if ml_stack.fallback {
            warn!(
                model_path = %config.model_path.display(),
                "budget model not found, using per-day baseline"
            );
        }

        let stats = loaded.catalog.stats();
        info!(
            packages = stats.packages,
            locations = stats.locations,
            package_types = stats.package_types,
            model = ml_stack.model_name(),
            burn_enabled = ml_stack.burn_enabled,
            "trip planner ready"
        );

        Ok(Self::new(loaded, ml_stack, store, metrics, config))
    }

    #[instrument(
        skip(self, request),
        fields(locations = request.locations.len(), total_days = request.total_days)
    )]
    pub async fn predict(&self, request: TripRequest) -> Result<GenerationReport> {
        let started = Instant::now();
        self.metrics.inc_prediction();

        let report = self.generate(&request)?;
        self.metrics.add_inference_batches(
            report
                .locations
                .iter()
                .filter(|resolution| resolution.is_resolved())
                .count(),
        );

        for resolution in &report.locations {
            if let LocationResolution::Skipped { location, reason } = resolution {
                debug!(location = %location, reason = ?reason, "location skipped");
            }
        }

        match &report.outcome {
            PlanOutcome::Combinations(combinations) => {
                self.metrics.add_combinations(combinations.len());
                let log = PredictionLog::new(request, combinations.clone());
                self.store
                    .record_prediction(&log)
                    .await
                    .context("failed to record prediction")?;
                info!(
                    prediction_id = %log.id,
                    combinations = combinations.len(),
                    discarded = report.trials.iter().filter(|trial| trial.discarded).count(),
                    "prediction served"
                );
            }
            PlanOutcome::Rejected(rejection) => {
                self.metrics.inc_rejection();
                info!(rejection = %rejection, "prediction rejected");
            }
        }

        self.metrics.observe_latency(started.elapsed());
        Ok(report)
    }

    pub async fn recent_predictions(&self, limit: usize) -> Result<Vec<PredictionLog>> {
        self.store.recent_predictions(limit).await
    }

    #[instrument(skip(self, full_plan), fields(entries = full_plan.plan.len()))]
    pub async fn confirm_plan(
        &self,
        plan_number: u32,
        full_plan: ItineraryCombination,
    ) -> Result<ConfirmedPlan> {
        let plan = ConfirmedPlan::new(plan_number, full_plan);
        self.store
            .insert_confirmed_plan(&plan)
            .await
            .context("failed to store confirmed plan")?;
        self.metrics.inc_confirmed_plan();
        info!(plan_id = %plan.id, plan_number, "plan confirmed");
        Ok(plan)
    }

    pub async fn list_confirmed_plans(&self) -> Result<Vec<ConfirmedPlan>> {
        self.store.list_confirmed_plans().await
    }

    pub async fn delete_confirmed_plan(&self, id: &str) -> Result<bool> {
        let deleted = self.store.delete_confirmed_plan(id).await?;
        info!(plan_id = %id, deleted, "confirmed plan delete");
        Ok(deleted)
    }

    pub fn catalog_stats(&self) -> CatalogStats {
        self.catalog.stats()
    }

    pub fn model_name(&self) -> &'static str {
        self.ml_stack.model_name()
    }

    pub fn uses_fallback_model(&self) -> bool {
        self.ml_stack.fallback
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    fn generate(&self, request: &TripRequest) -> Result<GenerationReport, PlannerError> {
        let assembler = ItineraryAssembler::new(
            self.catalog.as_ref(),
            self.encoder.as_ref(),
            self.ml_stack.predictor.as_ref(),
        );
        match self.seed {
            Some(seed) => {
                assembler.generate(request, self.max_options, &mut RngSource::seeded(seed))
            }
            None => assembler.generate(
                request,
                self.max_options,
                &mut RngSource::from_entropy(),
            ),
        }
    }
}
