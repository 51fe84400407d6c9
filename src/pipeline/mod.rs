//! Batch orchestration: runs the stages in order, each one reading the
//! previous stage's artifact and writing its own.

pub mod artifacts;
pub mod processing;

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};

use crate::app::enrich_use_case::{EnrichStageSummary, EnrichUseCase};
use crate::app::integrate_use_case::{IntegrateSummary, IntegrateUseCase};
use crate::app::kpi_use_case::{KpiStageSummary, KpiUseCase};
use crate::app::ports::ArtifactStorePort;
use crate::config::Config;
use crate::constants::{STAGE_ENRICH, STAGE_INTEGRATE, STAGE_KPIS};
use crate::pipeline::processing::enrich::{DefaultEnricher, SellerAliases};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Integrate,
    Enrich,
    Kpis,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Integrate, Stage::Enrich, Stage::Kpis];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Integrate => STAGE_INTEGRATE,
            Stage::Enrich => STAGE_ENRICH,
            Stage::Kpis => STAGE_KPIS,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one stage run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum StageReport {
    Integrate(IntegrateSummary),
    Enrich(EnrichStageSummary),
    Kpis(KpiStageSummary),
}

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub stages: Vec<StageReport>,
    pub duration_secs: f64,
}

pub struct Pipeline {
    store: Arc<dyn ArtifactStorePort>,
    config: Config,
}

impl Pipeline {
    pub fn new(store: Arc<dyn ArtifactStorePort>, config: Config) -> Self {
        Self { store, config }
    }

    /// Run one stage. A failed stage leaves its output artifact untouched.
    pub async fn run_stage(&self, stage: Stage) -> Result<StageReport> {
        let span = info_span!("stage", stage = stage.as_str());
        let started = Instant::now();

        let outcome = async {
            info!("Starting {} stage", stage);
            match stage {
                Stage::Integrate => self.integrate().execute().await.map(StageReport::Integrate),
                Stage::Enrich => self.enrich().execute().await.map(StageReport::Enrich),
                Stage::Kpis => self.kpis().execute().await.map(StageReport::Kpis),
            }
        }
        .instrument(span)
        .await;

        match &outcome {
            Ok(_) => {
                let secs = started.elapsed().as_secs_f64();
                crate::observability::metrics::stage::completed(stage.as_str(), secs);
                info!("Stage {} finished in {:.3}s", stage, secs);
            }
            Err(e) => {
                crate::observability::metrics::stage::failed(stage.as_str());
                error!("Stage {} failed: {:#}", stage, e);
            }
        }
        outcome
    }

    /// Run every stage in order, stopping at the first failure
    pub async fn run_all(&self) -> Result<PipelineResult> {
        let started = Instant::now();
        let mut stages = Vec::with_capacity(Stage::ALL.len());
        for stage in Stage::ALL {
            stages.push(self.run_stage(stage).await?);
        }

        Ok(PipelineResult {
            stages,
            duration_secs: started.elapsed().as_secs_f64(),
        })
    }

    fn integrate(&self) -> IntegrateUseCase {
        IntegrateUseCase::new(
            self.store.clone(),
            self.config.paths.clone(),
            self.config.sources.clone(),
        )
    }

    fn enrich(&self) -> EnrichUseCase {
        let enricher = DefaultEnricher::new(
            SellerAliases::from_config(&self.config.sellers.aliases),
            self.config.sources.erp_source_label.clone(),
        );
        EnrichUseCase::new(self.store.clone(), self.config.paths.clone(), enricher)
    }

    fn kpis(&self) -> KpiUseCase {
        KpiUseCase::new(self.store.clone(), self.config.paths.clone(), self.config.kpi.top_sellers)
    }
}
