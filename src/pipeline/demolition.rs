use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use crate::domain::{ConstructionRecord, RemovalRecord};
use crate::observability::metrics::{emit_counter, MetricName};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemolitionReport {
    pub total: usize,
    pub matched: usize,
    /// Demolitions with no later construction at the same parcel: pure
    /// housing-stock loss
    pub standalone: usize,
    pub standalone_units_lost: i64,
}

/// Collect the parcel identifiers of the surviving construction set
pub fn construction_bbl_set(records: &[ConstructionRecord]) -> HashSet<String> {
    records
        .iter()
        .filter_map(|record| record.bbl.clone())
        .collect()
}

/// Flag removals whose parcel also carries a construction record. A removal
/// without a BBL can never be matched.
pub fn match_demolitions(
    removals: Vec<RemovalRecord>,
    construction_bbls: &HashSet<String>,
) -> (Vec<RemovalRecord>, DemolitionReport) {
    let mut report = DemolitionReport {
        total: removals.len(),
        ..Default::default()
    };

    let matched: Vec<RemovalRecord> = removals
        .into_iter()
        .map(|mut removal| {
            removal.has_later_construction = removal
                .bbl
                .as_ref()
                .map(|bbl| construction_bbls.contains(bbl))
                .unwrap_or(false);

            if removal.has_later_construction {
                report.matched += 1;
                emit_counter(MetricName::DemolitionsMatched, 1.0);
            } else {
                report.standalone += 1;
                report.standalone_units_lost += removal.units_lost_estimate as i64;
                emit_counter(MetricName::DemolitionsStandalone, 1.0);
            }
            removal
        })
        .collect();

    info!(
        total = report.total,
        matched = report.matched,
        standalone = report.standalone,
        standalone_units_lost = report.standalone_units_lost,
        "Demolition matching complete"
    );
    (matched, report)
}

/// The standalone subset as a first-class view
pub fn standalone_demolitions(removals: &[RemovalRecord]) -> Vec<&RemovalRecord> {
    removals
        .iter()
        .filter(|removal| !removal.has_later_construction)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{construction, removal};

    #[test]
    fn test_removal_on_construction_parcel_is_matched() {
        let constructions = vec![construction("100", Some("1001230456"), 2020, 40)];
        let bbls = construction_bbl_set(&constructions);

        let (removals, report) =
            match_demolitions(vec![removal("900", Some("1001230456"), 2018, 8)], &bbls);
        assert!(removals[0].has_later_construction);
        assert_eq!(report.matched, 1);
        assert_eq!(report.standalone, 0);
    }

    #[test]
    fn test_removal_on_other_parcel_is_standalone() {
        let constructions = vec![construction("100", Some("1001230456"), 2020, 40)];
        let bbls = construction_bbl_set(&constructions);

        let (removals, report) =
            match_demolitions(vec![removal("900", Some("3009990001"), 2018, 8)], &bbls);
        assert!(!removals[0].has_later_construction);
        assert_eq!(report.standalone, 1);
        assert_eq!(report.standalone_units_lost, 8);
    }

    #[test]
    fn test_removal_without_bbl_never_matches() {
        let constructions = vec![construction("100", None, 2020, 40)];
        let bbls = construction_bbl_set(&constructions);
        assert!(bbls.is_empty());

        let (removals, report) = match_demolitions(vec![removal("900", None, 2018, 8)], &bbls);
        assert!(!removals[0].has_later_construction);
        assert_eq!(report.standalone, 1);
    }

    #[test]
    fn test_standalone_subset_view() {
        let constructions = vec![construction("100", Some("1001230456"), 2020, 40)];
        let bbls = construction_bbl_set(&constructions);

        let (removals, _) = match_demolitions(
            vec![
                removal("900", Some("1001230456"), 2018, 8),
                removal("901", Some("3009990001"), 2018, 4),
            ],
            &bbls,
        );
        let standalone = standalone_demolitions(&removals);
        assert_eq!(standalone.len(), 1);
        assert_eq!(standalone[0].job_id, "901");
    }
}
