use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::app::extract_use_case::ExtractUseCase;
use crate::app::load_use_case::{LoadReport, LoadUseCase};
use crate::app::ports::{OutputSink, PageSource};
use crate::config::Config;
use crate::error::{PipelineError, Result, Stage, StageFailure};
use crate::infra::arcgis_geocoder::ArcGisGeocoder;
use crate::infra::http_client::ReqwestPageSource;
use crate::infra::sink::build_sink;
use crate::metrics::names::{RUNS, STAGE_DURATION};
use crate::pipeline::handoff::{ExtractHandoff, Handoff, TransformHandoff};
use crate::pipeline::processing::enrich::{EnrichStats, Enricher, EnrichmentStage};
use crate::pipeline::processing::extract::ExtractStats;
use crate::pipeline::processing::geocode::{GeoResolver, Geocoder};
use crate::types::{ExtractedStadium, StadiumRecord};

/// Summary of a completed in-process run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub extract: ExtractStats,
    pub enrich: EnrichStats,
    pub load: LoadReport,
}

/// Wires the stages to their adapters and runs them in order. Stages that were not
/// wired fail with a configuration error when invoked.
pub struct Pipeline {
    extract_use_case: Option<ExtractUseCase>,
    enricher: Option<Box<dyn Enricher>>,
    load_use_case: Option<LoadUseCase>,
}

impl Pipeline {
    /// Build every stage with the HTTP page source, the ArcGIS geocoder and the configured sink
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::for_stages(config, &Stage::ALL)
    }

    /// Build only the adapters the given stages use
    pub fn for_stages(config: &Config, stages: &[Stage]) -> Result<Self> {
        let mut pipeline = Self {
            extract_use_case: None,
            enricher: None,
            load_use_case: None,
        };
        if stages.contains(&Stage::Extract) {
            let source = Arc::new(ReqwestPageSource::new(&config.source)?);
            pipeline.extract_use_case = Some(extract_use_case(config, source));
        }
        if stages.contains(&Stage::Transform) {
            let geocoder = Arc::new(ArcGisGeocoder::new(&config.geocoder)?);
            pipeline.enricher = Some(enricher(config, geocoder));
        }
        if stages.contains(&Stage::Load) {
            pipeline.load_use_case = Some(load_use_case(config, build_sink(&config.sink)?));
        }
        Ok(pipeline)
    }

    pub fn new(
        config: &Config,
        source: Arc<dyn PageSource>,
        geocoder: Arc<dyn Geocoder>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            extract_use_case: Some(extract_use_case(config, source)),
            enricher: Some(enricher(config, geocoder)),
            load_use_case: Some(load_use_case(config, sink)),
        }
    }

    pub async fn extract(&self) -> std::result::Result<(Vec<ExtractedStadium>, ExtractStats), StageFailure> {
        let use_case = self.extract_use_case.as_ref().ok_or_else(|| not_wired(Stage::Extract))?;
        let started = Instant::now();
        let result = use_case.run().await;
        record_duration(Stage::Extract, started);
        result.map_err(|e| StageFailure::new(Stage::Extract, e))
    }

    /// Lookup misses and malformed capacities are absorbed per record
    pub async fn transform(
        &self,
        records: Vec<ExtractedStadium>,
    ) -> std::result::Result<(Vec<StadiumRecord>, EnrichStats), StageFailure> {
        let enricher = self.enricher.as_ref().ok_or_else(|| not_wired(Stage::Transform))?;
        let started = Instant::now();
        let result = enricher.enrich(records).await;
        record_duration(Stage::Transform, started);
        Ok(result)
    }

    pub async fn load(&self, records: &[StadiumRecord]) -> std::result::Result<LoadReport, StageFailure> {
        let use_case = self.load_use_case.as_ref().ok_or_else(|| not_wired(Stage::Load))?;
        let started = Instant::now();
        let result = use_case.run(records).await;
        record_duration(Stage::Load, started);
        result.map_err(|e| StageFailure::new(Stage::Load, e))
    }

    /// Extract, transform and load in one process, passing records by value
    #[instrument(skip(self))]
    pub async fn run(&self) -> std::result::Result<PipelineResult, StageFailure> {
        let run_id = Uuid::new_v4();
        info!(%run_id, "pipeline run started");

        let outcome = self.run_stages(run_id).await;
        match &outcome {
            Ok(result) => {
                ::metrics::counter!(RUNS, "outcome" => "success").increment(1);
                info!(
                    %run_id,
                    records = result.load.records,
                    location = %result.load.location,
                    "pipeline run finished"
                );
            }
            Err(failure) => {
                ::metrics::counter!(RUNS, "outcome" => failure.stage.as_str()).increment(1);
                error!(%run_id, stage = %failure.stage, error = %failure.source, "pipeline run failed");
            }
        }
        outcome
    }

    async fn run_stages(&self, run_id: Uuid) -> std::result::Result<PipelineResult, StageFailure> {
        let (extracted, extract) = self.extract().await?;
        let (records, enrich) = self.transform(extracted).await?;
        let load = self.load(&records).await?;
        Ok(PipelineResult {
            run_id,
            extract,
            enrich,
            load,
        })
    }

    /// Run only the extract stage and write its records to a handoff file
    pub async fn extract_to(&self, out: &Path) -> std::result::Result<ExtractStats, StageFailure> {
        let (records, stats) = self.extract().await?;
        Handoff::new(Uuid::new_v4(), Stage::Extract, records)
            .write_to(out)
            .map_err(|e| StageFailure::new(Stage::Extract, e))?;
        Ok(stats)
    }

    /// Read an extract handoff, enrich it and write a transform handoff
    pub async fn transform_file(
        &self,
        input: &Path,
        out: &Path,
    ) -> std::result::Result<EnrichStats, StageFailure> {
        let fail = |e: PipelineError| StageFailure::new(Stage::Transform, e);
        let handoff = ExtractHandoff::read_stage(input, Stage::Extract).map_err(fail)?;
        let (records, stats) = self.transform(handoff.records).await?;
        Handoff::new(handoff.run_id, Stage::Transform, records)
            .write_to(out)
            .map_err(fail)?;
        Ok(stats)
    }

    /// Read a transform handoff and load its records
    pub async fn load_file(&self, input: &Path) -> std::result::Result<LoadReport, StageFailure> {
        let handoff = TransformHandoff::read_stage(input, Stage::Transform)
            .map_err(|e| StageFailure::new(Stage::Load, e))?;
        info!(run_id = %handoff.run_id, records = handoff.records.len(), "loading handoff");
        self.load(&handoff.records).await
    }
}

fn extract_use_case(config: &Config, source: Arc<dyn PageSource>) -> ExtractUseCase {
    ExtractUseCase::new(source, config.source.url.clone())
}

fn enricher(config: &Config, geocoder: Arc<dyn Geocoder>) -> Box<dyn Enricher> {
    Box::new(
        EnrichmentStage::new(GeoResolver::new(geocoder), &config.enrich)
            .with_concurrency(config.geocoder.concurrency),
    )
}

fn load_use_case(config: &Config, sink: Arc<dyn OutputSink>) -> LoadUseCase {
    LoadUseCase::new(sink, config.sink.file_prefix.clone())
}

fn not_wired(stage: Stage) -> StageFailure {
    StageFailure::new(
        stage,
        PipelineError::Config(format!("the {} stage is not wired in this pipeline", stage)),
    )
}

fn record_duration(stage: Stage, started: Instant) {
    let secs = started.elapsed().as_secs_f64();
    ::metrics::histogram!(STAGE_DURATION, "stage" => stage.as_str()).record(secs);
    info!(stage = %stage, elapsed_ms = (secs * 1000.0) as u64, "stage finished");
}
