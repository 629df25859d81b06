//! Simple metrics module for the housing pipeline
//!
//! This module provides a straightforward API for recording metrics using
//! the standard Prometheus naming conventions.

use std::fmt;

/// Enum representing all metric names used in the system
/// This eliminates magic strings and provides compile-time safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Source fetch metrics
    SourcesRecordsFetched,
    SourcesPayloadBytes,

    // Normalize metrics
    NormalizeRecordsAccepted,
    NormalizeRecordsDropped,
    NormalizeBudgetCorrections,

    // Overlay metrics
    OverlayRecordsMerged,
    OverlayIndexSize,

    // Dedupe metrics
    DedupeGroupsResolved,
    DedupeRecordsRemoved,

    // Demolition metrics
    DemolitionsMatched,
    DemolitionsStandalone,

    // Geometry metrics
    GeometryRingsSimplified,
    GeometryVerticesRemoved,

    // Change detection metrics
    ChangeDetectRuns,
    ChangeDetectSkips,
    ChangeDetectFailOpens,

    // Storage metrics
    StorageReplaceSuccess,
    StorageReplaceError,

    // Run timing
    HousingRunDuration,
    CapitalRunDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourcesRecordsFetched => "hp_sources_records_fetched_total",
            MetricName::SourcesPayloadBytes => "hp_sources_payload_bytes_total",
            MetricName::NormalizeRecordsAccepted => "hp_normalize_records_accepted_total",
            MetricName::NormalizeRecordsDropped => "hp_normalize_records_dropped_total",
            MetricName::NormalizeBudgetCorrections => "hp_normalize_budget_corrections_total",
            MetricName::OverlayRecordsMerged => "hp_overlay_records_merged_total",
            MetricName::OverlayIndexSize => "hp_overlay_index_size",
            MetricName::DedupeGroupsResolved => "hp_dedupe_groups_resolved_total",
            MetricName::DedupeRecordsRemoved => "hp_dedupe_records_removed_total",
            MetricName::DemolitionsMatched => "hp_demolitions_matched_total",
            MetricName::DemolitionsStandalone => "hp_demolitions_standalone_total",
            MetricName::GeometryRingsSimplified => "hp_geometry_rings_simplified_total",
            MetricName::GeometryVerticesRemoved => "hp_geometry_vertices_removed_total",
            MetricName::ChangeDetectRuns => "hp_change_detect_runs_total",
            MetricName::ChangeDetectSkips => "hp_change_detect_skips_total",
            MetricName::ChangeDetectFailOpens => "hp_change_detect_fail_opens_total",
            MetricName::StorageReplaceSuccess => "hp_storage_replace_success_total",
            MetricName::StorageReplaceError => "hp_storage_replace_error_total",
            MetricName::HousingRunDuration => "hp_housing_run_duration_seconds",
            MetricName::CapitalRunDuration => "hp_capital_run_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Emit a counter increment
pub fn emit_counter(name: MetricName, value: f64) {
    ::metrics::counter!(name.as_str()).increment(value as u64);
}

/// Emit a gauge value
pub fn emit_gauge(name: MetricName, value: f64) {
    ::metrics::gauge!(name.as_str()).set(value);
}

/// Emit a histogram observation
pub fn emit_histogram(name: MetricName, value: f64) {
    ::metrics::histogram!(name.as_str()).record(value);
}

/// Register descriptions for every metric with the installed recorder.
/// Installing a recorder (Prometheus exporter or otherwise) is the
/// embedder's concern.
pub fn describe_metrics() {
    use once_cell::sync::Lazy;

    static DESCRIPTIONS: Lazy<Vec<(MetricName, &'static str)>> = Lazy::new(|| {
        vec![
            (MetricName::SourcesRecordsFetched, "Raw records fetched from source APIs"),
            (MetricName::SourcesPayloadBytes, "Bytes fetched from source APIs"),
            (MetricName::NormalizeRecordsAccepted, "Records accepted by normalization"),
            (MetricName::NormalizeRecordsDropped, "Records dropped by normalization"),
            (MetricName::NormalizeBudgetCorrections, "Capital budget values patched"),
            (MetricName::OverlayRecordsMerged, "Construction records enriched with an overlay"),
            (MetricName::OverlayIndexSize, "Distinct BBLs in the overlay index"),
            (MetricName::DedupeGroupsResolved, "Duplicate groups collapsed"),
            (MetricName::DedupeRecordsRemoved, "Records discarded by deduplication"),
            (MetricName::DemolitionsMatched, "Demolitions with a later construction record"),
            (MetricName::DemolitionsStandalone, "Demolitions with no later construction"),
            (MetricName::GeometryRingsSimplified, "Polygon rings simplified"),
            (MetricName::GeometryVerticesRemoved, "Vertices removed by simplification"),
            (MetricName::ChangeDetectRuns, "Change detection comparisons performed"),
            (MetricName::ChangeDetectSkips, "Runs skipped because content was unchanged"),
            (MetricName::ChangeDetectFailOpens, "Comparisons that failed open to changed"),
            (MetricName::StorageReplaceSuccess, "Successful collection replacements"),
            (MetricName::StorageReplaceError, "Failed collection replacements"),
        ]
    });

    for (name, description) in DESCRIPTIONS.iter() {
        ::metrics::describe_counter!(name.as_str(), *description);
    }

    ::metrics::describe_histogram!(
        MetricName::HousingRunDuration.as_str(),
        "End-to-end housing run duration in seconds"
    );
    ::metrics::describe_histogram!(
        MetricName::CapitalRunDuration.as_str(),
        "End-to-end capital-project run duration in seconds"
    );
}
