use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::domain::{ConstructionRecord, OverlayRecord, Provenance};
use crate::observability::metrics::{emit_counter, emit_gauge, MetricName};
use crate::pipeline::classify::classify;

/// Outcome of merging the affordability overlay onto the construction set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverlayReport {
    pub records_overlaid: usize,
    pub total_units: i64,
    pub total_affordable_units: i64,
    pub affordable_percentage: f64,
}

/// Build the BBL -> best overlay index. When several overlays share a BBL,
/// the one with the greatest affordable-unit count is retained; on an exact
/// tie the first seen wins.
pub fn build_overlay_index(overlays: &[OverlayRecord]) -> HashMap<String, OverlayRecord> {
    let mut index: HashMap<String, OverlayRecord> = HashMap::new();
    for overlay in overlays {
        match index.get(&overlay.bbl) {
            Some(existing) if existing.affordable_units >= overlay.affordable_units => {}
            _ => {
                index.insert(overlay.bbl.clone(), overlay.clone());
            }
        }
    }
    index
}

/// Join the overlay index onto the construction set.
///
/// Matched records take every affordability field from the overlay wholesale
/// (the construction record's zero-defaults are fully replaced), switch
/// provenance, and are reclassified with overlay presence known. Unmatched
/// records and records without a BBL pass through untouched.
pub fn merge_overlays(
    records: Vec<ConstructionRecord>,
    index: &HashMap<String, OverlayRecord>,
) -> (Vec<ConstructionRecord>, OverlayReport) {
    emit_gauge(MetricName::OverlayIndexSize, index.len() as f64);

    let mut report = OverlayReport::default();
    let merged: Vec<ConstructionRecord> = records
        .into_iter()
        .map(|mut record| {
            if let Some(overlay) = record.bbl.as_ref().and_then(|bbl| index.get(bbl)) {
                apply_overlay(&mut record, overlay);
                report.records_overlaid += 1;
                emit_counter(MetricName::OverlayRecordsMerged, 1.0);
            }
            report.total_units += record.units as i64;
            report.total_affordable_units += record.affordable_units as i64;
            record
        })
        .collect();

    if report.total_units > 0 {
        report.affordable_percentage =
            100.0 * report.total_affordable_units as f64 / report.total_units as f64;
    }

    info!(
        overlaid = report.records_overlaid,
        total_units = report.total_units,
        affordable_units = report.total_affordable_units,
        affordable_pct = format!("{:.1}", report.affordable_percentage),
        "Overlay merge complete"
    );
    (merged, report)
}

/// Every affordability field is enumerated here; adding a field to the
/// overlay record must be reflected in this copy.
fn apply_overlay(record: &mut ConstructionRecord, overlay: &OverlayRecord) {
    record.affordable_units = overlay.affordable_units;
    record.units_eli = overlay.units_eli;
    record.units_vli = overlay.units_vli;
    record.units_li = overlay.units_li;
    record.units_mod = overlay.units_mod;
    record.units_mid = overlay.units_mid;
    record.units_other = overlay.units_other;
    record.br_studio = overlay.br_studio;
    record.br_1 = overlay.br_1;
    record.br_2 = overlay.br_2;
    record.br_3plus = overlay.br_3plus;
    record.program = overlay.program.clone();
    record.project_name = overlay.project_name.clone();
    record.start_year = overlay.start_year;
    record.provenance = Provenance::DcpHpd;
    record.category = classify(
        record.units,
        record.building_class.as_deref(),
        &record.job_type,
        true,
        record.affordable_units,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BuildingCategory;
    use crate::test_support::{construction, overlay};

    #[test]
    fn test_index_keeps_greatest_affordable_count() {
        let overlays = vec![
            overlay("1001230456", 10),
            overlay("1001230456", 40),
            overlay("1001230456", 25),
        ];
        let index = build_overlay_index(&overlays);
        assert_eq!(index.len(), 1);
        assert_eq!(index["1001230456"].affordable_units, 40);
    }

    #[test]
    fn test_index_first_seen_wins_exact_tie() {
        let mut first = overlay("1001230456", 10);
        first.program = Some("first".to_string());
        let mut second = overlay("1001230456", 10);
        second.program = Some("second".to_string());

        let index = build_overlay_index(&[first, second]);
        assert_eq!(index["1001230456"].program.as_deref(), Some("first"));
    }

    #[test]
    fn test_merge_overwrites_wholesale_and_reclassifies() {
        let record = construction("100", Some("1001230456"), 2020, 40);
        let index = build_overlay_index(&[overlay("1001230456", 35)]);

        let (merged, report) = merge_overlays(vec![record], &index);
        let record = &merged[0];

        assert_eq!(record.provenance, Provenance::DcpHpd);
        assert_eq!(record.affordable_units, 35);
        assert_eq!(record.category, BuildingCategory::Affordable);
        assert_eq!(report.records_overlaid, 1);
        assert_eq!(report.total_units, 40);
        assert_eq!(report.total_affordable_units, 35);
    }

    #[test]
    fn test_unmatched_and_bbl_less_records_pass_through() {
        let with_bbl = construction("100", Some("9999999999"), 2020, 10);
        let without_bbl = construction("101", None, 2020, 10);
        let index = build_overlay_index(&[overlay("1001230456", 35)]);

        let (merged, report) = merge_overlays(vec![with_bbl, without_bbl], &index);
        assert_eq!(report.records_overlaid, 0);
        for record in &merged {
            assert_eq!(record.provenance, Provenance::Dcp);
            assert_eq!(record.affordable_units, 0);
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let record = construction("100", Some("1001230456"), 2020, 40);
        let index = build_overlay_index(&[overlay("1001230456", 35)]);

        let (once, _) = merge_overlays(vec![record], &index);
        let (twice, _) = merge_overlays(once.clone(), &index);

        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
    }
}
