use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::info;

use crate::domain::ConstructionRecord;
use crate::observability::metrics::{emit_counter, MetricName};

/// How many group decisions to retain in the report for audit
const DECISION_SAMPLE_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupeReport {
    pub original_count: usize,
    pub surviving_count: usize,
    pub removed_count: usize,
    /// First few group decisions, for audit
    pub sample_decisions: Vec<DedupeDecision>,
}

/// One resolved duplicate group: every competing job and the survivor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupeDecision {
    pub bbl: String,
    pub completion_year: i32,
    pub survivor_job_id: String,
    pub candidates: Vec<DedupeCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupeCandidate {
    pub job_id: String,
    pub units: i32,
    pub address: String,
}

/// Collapse groups of records describing the same physical building.
///
/// Records are grouped by (BBL, completion year); unit count is part of the
/// ambiguity being resolved and is never part of the key. Records without a
/// BBL cannot be grouped and always survive. Within a group the survivor is
/// chosen by sequential tie-break: highest unit count, then overlay
/// presence, then the greater job identifier. Losers are dropped whole,
/// never merged field by field.
pub fn dedupe(records: Vec<ConstructionRecord>) -> (Vec<ConstructionRecord>, DedupeReport) {
    let original_count = records.len();

    let mut ungrouped: Vec<ConstructionRecord> = Vec::new();
    let mut groups: HashMap<(String, i32), Vec<ConstructionRecord>> = HashMap::new();
    for record in records {
        match record.bbl.clone() {
            Some(bbl) => groups
                .entry((bbl, record.completion_year))
                .or_default()
                .push(record),
            None => ungrouped.push(record),
        }
    }

    // Deterministic group order so the audit sample is stable across runs
    let mut keyed: Vec<((String, i32), Vec<ConstructionRecord>)> = groups.into_iter().collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    let mut survivors = ungrouped;
    let mut sample_decisions = Vec::new();
    let mut removed_count = 0usize;

    for ((bbl, completion_year), mut group) in keyed {
        if group.len() == 1 {
            survivors.push(group.pop().unwrap());
            continue;
        }

        removed_count += group.len() - 1;
        emit_counter(MetricName::DedupeGroupsResolved, 1.0);
        emit_counter(MetricName::DedupeRecordsRemoved, (group.len() - 1) as f64);

        let survivor_index = group
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| compare_candidates(a, b))
            .map(|(i, _)| i)
            .unwrap_or(0);

        if sample_decisions.len() < DECISION_SAMPLE_LIMIT {
            sample_decisions.push(DedupeDecision {
                bbl,
                completion_year,
                survivor_job_id: group[survivor_index].job_id.clone(),
                candidates: group
                    .iter()
                    .map(|r| DedupeCandidate {
                        job_id: r.job_id.clone(),
                        units: r.units,
                        address: r.address.clone(),
                    })
                    .collect(),
            });
        }

        survivors.push(group.swap_remove(survivor_index));
    }

    let report = DedupeReport {
        original_count,
        surviving_count: survivors.len(),
        removed_count,
        sample_decisions,
    };

    info!(
        original = report.original_count,
        surviving = report.surviving_count,
        removed = report.removed_count,
        "Deduplication complete"
    );
    (survivors, report)
}

/// Ordered tie-break; each criterion applies only when the prior is tied
fn compare_candidates(a: &ConstructionRecord, b: &ConstructionRecord) -> Ordering {
    a.units
        .cmp(&b.units)
        .then_with(|| a.has_overlay().cmp(&b.has_overlay()))
        .then_with(|| compare_job_ids(&a.job_id, &b.job_id))
}

/// Greater job identifier is treated as most recent. Numeric comparison when
/// both ids parse as integers, lexicographic otherwise.
fn compare_job_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}
