use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::constants::{
    BUILDINGS_COLLECTION, CAPITAL_PROJECTS_COLLECTION, DEMOLITIONS_COLLECTION,
};
use crate::domain::RemovalRecord;
use crate::error::Result;
use crate::observability::metrics::{emit_counter, emit_histogram, MetricName};
use crate::pipeline::change_detect::{detect_changes, ChangeVerdict};
use crate::pipeline::dedupe::{dedupe, DedupeReport};
use crate::pipeline::demolition::{
    construction_bbl_set, match_demolitions, standalone_demolitions, DemolitionReport,
};
use crate::pipeline::geometry::simplify_projects;
use crate::pipeline::normalize::{NormalizeReport, RecordNormalizer};
use crate::pipeline::overlay::{build_overlay_index, merge_overlays, OverlayReport};
use crate::pipeline::validation::{
    DatasetValidator, FieldKind, FieldSpec, ValidationFailure, ValidationOutcome,
};
use crate::sources::DataSourcePort;
use crate::storage::Storage;

const BUILDING_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "job_id", kind: FieldKind::String },
    FieldSpec { name: "units", kind: FieldKind::Number },
    FieldSpec { name: "completion_year", kind: FieldKind::Number },
    FieldSpec { name: "borough", kind: FieldKind::String },
    FieldSpec { name: "category", kind: FieldKind::String },
];

const DEMOLITION_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "job_id", kind: FieldKind::String },
    FieldSpec { name: "removal_year", kind: FieldKind::Number },
    FieldSpec { name: "has_later_construction", kind: FieldKind::Bool },
];

const CAPITAL_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "project_id", kind: FieldKind::String },
    FieldSpec { name: "budget", kind: FieldKind::Number },
];

/// What happened to one collection at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionOutcome {
    pub collection: String,
    pub record_count: usize,
    pub verdict: ChangeVerdict,
    pub replaced: bool,
}

/// End-of-run summary for the housing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HousingRunSummary {
    pub run_id: Uuid,
    pub construction_normalize: NormalizeReport,
    pub overlay_normalize: NormalizeReport,
    pub removal_normalize: NormalizeReport,
    pub overlay: OverlayReport,
    pub dedupe: DedupeReport,
    pub demolition: DemolitionReport,
    /// Demolitions with no later construction at the same parcel; the
    /// pure housing-stock loss view
    pub standalone_demolitions: Vec<RemovalRecord>,
    pub validation_passed: bool,
    pub validation_failures: Vec<ValidationFailure>,
    pub collections: Vec<CollectionOutcome>,
}

/// End-of-run summary for the capital-project pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalRunSummary {
    pub run_id: Uuid,
    pub normalize: NormalizeReport,
    pub validation_passed: bool,
    pub validation_failures: Vec<ValidationFailure>,
    pub collections: Vec<CollectionOutcome>,
}

fn to_rows<T: Serialize>(records: &[T]) -> Result<Vec<Value>> {
    records
        .iter()
        .map(|record| serde_json::to_value(record).map_err(Into::into))
        .collect()
}

/// Validate, change-detect, and (when warranted) replace one collection.
/// The replace only happens after every validation gate has passed; a
/// failed run leaves persisted state untouched.
async fn finalize_collection(
    storage: &dyn Storage,
    collection: &str,
    rows: Vec<Value>,
    sample_cap: usize,
    all_validations_passed: bool,
    dry_run: bool,
) -> Result<CollectionOutcome> {
    let verdict = detect_changes(storage, collection, &rows, sample_cap).await;
    let record_count = rows.len();

    let mut replaced = false;
    if !all_validations_passed {
        warn!(collection, "Skipping replace: validation failed");
    } else if !verdict.has_changes {
        info!(collection, "Skipping replace: no changes detected");
    } else if dry_run {
        info!(collection, "Dry run: replace suppressed");
    } else {
        match storage.replace(collection, rows).await {
            Ok(()) => {
                emit_counter(MetricName::StorageReplaceSuccess, 1.0);
                info!(collection, rows = record_count, "Replaced collection");
                replaced = true;
            }
            Err(e) => {
                emit_counter(MetricName::StorageReplaceError, 1.0);
                return Err(e);
            }
        }
    }

    Ok(CollectionOutcome {
        collection: collection.to_string(),
        record_count,
        verdict,
        replaced,
    })
}

/// Orchestrates the housing run: fetch, normalize, classify, overlay merge,
/// dedupe, demolition match, validate, change detect, replace. Stages run
/// strictly in order; the only awaits are fetches and storage calls.
pub struct HousingRunner {
    construction_source: Box<dyn DataSourcePort>,
    overlay_source: Box<dyn DataSourcePort>,
    storage: Arc<dyn Storage>,
    config: Config,
    dry_run: bool,
}

impl HousingRunner {
    pub fn new(
        construction_source: Box<dyn DataSourcePort>,
        overlay_source: Box<dyn DataSourcePort>,
        storage: Arc<dyn Storage>,
        config: Config,
        dry_run: bool,
    ) -> Self {
        Self {
            construction_source,
            overlay_source,
            storage,
            config,
            dry_run,
        }
    }

    pub async fn run(&self) -> Result<HousingRunSummary> {
        let run_id = Uuid::new_v4();
        let started = std::time::Instant::now();
        let span = tracing::info_span!("housing_run", %run_id);
        let _enter = span.enter();
        info!("Starting housing run");

        let construction_envelope = self.construction_source.fetch_all().await?;
        let overlay_envelope = self.overlay_source.fetch_all().await?;

        let normalizer = RecordNormalizer::new(self.config.normalize.clone());
        let construction_payload = Value::Array(construction_envelope.records);
        let overlay_payload = Value::Array(overlay_envelope.records);

        let (constructions, construction_normalize) =
            normalizer.normalize_constructions(&construction_payload)?;
        let (overlays, overlay_normalize) = normalizer.normalize_overlays(&overlay_payload)?;
        let (removals, removal_normalize) = normalizer.normalize_removals(&construction_payload)?;

        let overlay_index = build_overlay_index(&overlays);
        let (merged, overlay_report) = merge_overlays(constructions, &overlay_index);
        let (survivors, dedupe_report) = dedupe(merged);
        let bbls = construction_bbl_set(&survivors);
        let (removals, demolition_report) = match_demolitions(removals, &bbls);
        let standalone: Vec<RemovalRecord> = standalone_demolitions(&removals)
            .into_iter()
            .cloned()
            .collect();

        let building_rows = to_rows(&survivors)?;
        let demolition_rows = to_rows(&removals)?;

        let validator = DatasetValidator::new(self.config.validation.clone());
        let building_outcome =
            validator.validate(BUILDINGS_COLLECTION, &building_rows, BUILDING_FIELDS);
        let demolition_outcome =
            validator.validate(DEMOLITIONS_COLLECTION, &demolition_rows, DEMOLITION_FIELDS);

        let mut validation_failures: Vec<ValidationFailure> = Vec::new();
        validation_failures.extend_from_slice(building_outcome.failures());
        validation_failures.extend_from_slice(demolition_outcome.failures());
        let validation_passed = validation_failures.is_empty();

        let sample_cap = self.config.change_detection.sample_cap;
        let collections = vec![
            finalize_collection(
                self.storage.as_ref(),
                BUILDINGS_COLLECTION,
                building_rows,
                sample_cap,
                validation_passed,
                self.dry_run,
            )
            .await?,
            finalize_collection(
                self.storage.as_ref(),
                DEMOLITIONS_COLLECTION,
                demolition_rows,
                sample_cap,
                validation_passed,
                self.dry_run,
            )
            .await?,
        ];

        emit_histogram(MetricName::HousingRunDuration, started.elapsed().as_secs_f64());
        info!(
            buildings = collections[0].record_count,
            demolitions = collections[1].record_count,
            validation_passed,
            "Housing run complete"
        );

        Ok(HousingRunSummary {
            run_id,
            construction_normalize,
            overlay_normalize,
            removal_normalize,
            overlay: overlay_report,
            dedupe: dedupe_report,
            demolition: demolition_report,
            standalone_demolitions: standalone,
            validation_passed,
            validation_failures,
            collections,
        })
    }
}

/// Orchestrates the capital-project run: fetch GeoJSON, normalize with the
/// budget patch, simplify geometry, validate, change detect, replace.
pub struct CapitalRunner {
    source: Box<dyn DataSourcePort>,
    storage: Arc<dyn Storage>,
    config: Config,
    dry_run: bool,
}

impl CapitalRunner {
    pub fn new(
        source: Box<dyn DataSourcePort>,
        storage: Arc<dyn Storage>,
        config: Config,
        dry_run: bool,
    ) -> Self {
        Self {
            source,
            storage,
            config,
            dry_run,
        }
    }

    pub async fn run(&self) -> Result<CapitalRunSummary> {
        let run_id = Uuid::new_v4();
        let started = std::time::Instant::now();
        let span = tracing::info_span!("capital_run", %run_id);
        let _enter = span.enter();
        info!("Starting capital-project run");

        let envelope = self.source.fetch_all().await?;
        let payload = Value::Array(envelope.records);

        let normalizer = RecordNormalizer::new(self.config.normalize.clone());
        let (projects, normalize_report) = normalizer.normalize_capital_projects(&payload)?;
        let projects = simplify_projects(projects, self.config.geometry.simplify_tolerance);

        let rows = to_rows(&projects)?;
        let validator = DatasetValidator::new(self.config.validation.clone());
        let outcome = validator.validate(CAPITAL_PROJECTS_COLLECTION, &rows, CAPITAL_FIELDS);
        let validation_passed = outcome.passed();
        let validation_failures = match outcome {
            ValidationOutcome::Passed => Vec::new(),
            ValidationOutcome::Failed(failures) => failures,
        };

        let collections = vec![
            finalize_collection(
                self.storage.as_ref(),
                CAPITAL_PROJECTS_COLLECTION,
                rows,
                self.config.change_detection.sample_cap,
                validation_passed,
                self.dry_run,
            )
            .await?,
        ];

        emit_histogram(MetricName::CapitalRunDuration, started.elapsed().as_secs_f64());
        info!(
            projects = collections[0].record_count,
            validation_passed,
            "Capital-project run complete"
        );

        Ok(CapitalRunSummary {
            run_id,
            normalize: normalize_report,
            validation_passed,
            validation_failures,
            collections,
        })
    }
}
