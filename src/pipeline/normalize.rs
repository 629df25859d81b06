use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::NormalizeConfig;
use crate::constants::{
    normalize_borough, BUDGET_CORRECTION_DIVISOR, BUDGET_ERROR_CEILING, BUDGET_ERROR_FLOOR,
};
use crate::domain::{
    CapitalProject, ConstructionRecord, Geometry, OverlayRecord, Provenance, RemovalRecord,
};
use crate::error::{PipelineError, Result};
use crate::observability::metrics::{emit_counter, MetricName};
use crate::pipeline::classify::classify;

static NON_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]").unwrap());

/// Counts of records accepted vs. dropped during normalization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub accepted: usize,
    pub dropped: usize,
}

impl NormalizeReport {
    fn accept(&mut self) {
        self.accepted += 1;
        emit_counter(MetricName::NormalizeRecordsAccepted, 1.0);
    }

    fn drop_record(&mut self, reason: &str, record: &Value) {
        self.dropped += 1;
        emit_counter(MetricName::NormalizeRecordsDropped, 1.0);
        debug!(reason, record = %record, "Dropped record during normalization");
    }
}

/// Normalize a raw property identifier into a canonical 10-digit BBL.
///
/// Strips every non-digit character, accepts 9 or 10 digit results, and
/// left-pads 9-digit values with a leading zero. Anything else is absent,
/// not an error.
pub fn normalize_bbl(raw: &str) -> Option<String> {
    let digits = NON_DIGITS.replace_all(raw, "");
    match digits.len() {
        10 => Some(digits.into_owned()),
        9 => Some(format!("0{}", digits)),
        _ => None,
    }
}

/// Parse a coordinate field. Values that fail to parse, are non-finite, or
/// are exactly zero invalidate the owning record.
fn parse_coordinate(value: Option<&Value>) -> Option<f64> {
    let parsed = value_as_f64(value?)?;
    if !parsed.is_finite() || parsed == 0.0 {
        return None;
    }
    Some(parsed)
}

/// Socrata feeds serve numbers as either JSON numbers or strings
fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn value_as_i32(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().map(|v| v as i32),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|v| v as i32),
        _ => None,
    }
}

fn field_str(record: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| record.get(name))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn field_i32(record: &Value, names: &[&str]) -> Option<i32> {
    names.iter().find_map(|name| record.get(name)).and_then(value_as_i32)
}

fn expect_array<'a>(payload: &'a Value, source: &str) -> Result<&'a Vec<Value>> {
    payload.as_array().ok_or_else(|| {
        PipelineError::MalformedPayload(format!("{} payload is not an array", source))
    })
}

fn is_demolition(job_type: &str) -> bool {
    job_type.eq_ignore_ascii_case("demolition")
}

/// Converts raw per-source rows into canonical typed records.
pub struct RecordNormalizer {
    config: NormalizeConfig,
}

impl RecordNormalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    fn year_in_bounds(&self, year: i32) -> bool {
        year >= self.config.min_year && year <= self.config.max_year
    }

    /// Normalize the construction feed, excluding demolition jobs.
    /// Record-level failures drop the row; only a non-array payload errors.
    pub fn normalize_constructions(
        &self,
        payload: &Value,
    ) -> Result<(Vec<ConstructionRecord>, NormalizeReport)> {
        let rows = expect_array(payload, "construction")?;
        let mut report = NormalizeReport::default();
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            let job_type = match field_str(row, &["job_type"]) {
                Some(t) => t,
                None => {
                    report.drop_record("missing job_type", row);
                    continue;
                }
            };
            if is_demolition(&job_type) {
                continue;
            }

            match self.build_construction(row, job_type) {
                Some(record) => {
                    report.accept();
                    records.push(record);
                }
                None => report.drop_record("invalid construction row", row),
            }
        }

        info!(
            accepted = report.accepted,
            dropped = report.dropped,
            "Construction normalization complete"
        );
        Ok((records, report))
    }

    fn build_construction(&self, row: &Value, job_type: String) -> Option<ConstructionRecord> {
        let job_id = field_str(row, &["job_number", "job__"])?;
        let latitude = parse_coordinate(row.get("latitude"))?;
        let longitude = parse_coordinate(row.get("longitude"))?;
        let units = field_i32(row, &["classa_net", "units_net"])?;
        let completion_year = field_i32(row, &["complete_year", "completion_year"])?;
        if !self.year_in_bounds(completion_year) {
            return None;
        }

        let building_class = field_str(row, &["bldg_class", "building_class"]);
        let category = classify(units, building_class.as_deref(), &job_type, false, 0);

        Some(ConstructionRecord {
            job_id,
            bbl: field_str(row, &["bbl"]).and_then(|raw| normalize_bbl(&raw)),
            borough: normalize_borough(&field_str(row, &["boro", "borough"]).unwrap_or_default()),
            address: field_str(row, &["address"]).unwrap_or_default(),
            latitude,
            longitude,
            units,
            completion_year,
            job_type,
            building_class,
            category,
            provenance: Provenance::Dcp,
            affordable_units: 0,
            units_eli: 0,
            units_vli: 0,
            units_li: 0,
            units_mod: 0,
            units_mid: 0,
            units_other: 0,
            br_studio: 0,
            br_1: 0,
            br_2: 0,
            br_3plus: 0,
            program: None,
            project_name: None,
            start_year: None,
        })
    }

    /// Normalize demolition jobs out of the same construction feed.
    pub fn normalize_removals(
        &self,
        payload: &Value,
    ) -> Result<(Vec<RemovalRecord>, NormalizeReport)> {
        let rows = expect_array(payload, "demolition")?;
        let mut report = NormalizeReport::default();
        let mut records = Vec::new();

        for row in rows {
            let job_type = match field_str(row, &["job_type"]) {
                Some(t) => t,
                None => {
                    report.drop_record("missing job_type", row);
                    continue;
                }
            };
            if !is_demolition(&job_type) {
                continue;
            }

            match self.build_removal(row) {
                Some(record) => {
                    report.accept();
                    records.push(record);
                }
                None => report.drop_record("invalid demolition row", row),
            }
        }

        info!(
            accepted = report.accepted,
            dropped = report.dropped,
            "Demolition normalization complete"
        );
        Ok((records, report))
    }

    fn build_removal(&self, row: &Value) -> Option<RemovalRecord> {
        let job_id = field_str(row, &["job_number", "job__"])?;
        let latitude = parse_coordinate(row.get("latitude"))?;
        let longitude = parse_coordinate(row.get("longitude"))?;
        let removal_year = field_i32(row, &["complete_year", "completion_year"])?;
        if !self.year_in_bounds(removal_year) {
            return None;
        }

        // Net class A change is negative for demolitions; report the loss
        // as a positive estimate
        let units_lost_estimate = field_i32(row, &["classa_net", "units_net"])
            .map(|net| net.abs())
            .unwrap_or(0);

        Some(RemovalRecord {
            job_id,
            bbl: field_str(row, &["bbl"]).and_then(|raw| normalize_bbl(&raw)),
            borough: normalize_borough(&field_str(row, &["boro", "borough"]).unwrap_or_default()),
            address: field_str(row, &["address"]).unwrap_or_default(),
            latitude,
            longitude,
            removal_year,
            units_lost_estimate,
            has_later_construction: false,
        })
    }

    /// Normalize the affordability-program feed.
    pub fn normalize_overlays(
        &self,
        payload: &Value,
    ) -> Result<(Vec<OverlayRecord>, NormalizeReport)> {
        let rows = expect_array(payload, "overlay")?;
        let mut report = NormalizeReport::default();
        let mut records = Vec::new();

        for row in rows {
            match self.build_overlay(row) {
                Some(record) => {
                    report.accept();
                    records.push(record);
                }
                None => report.drop_record("invalid overlay row", row),
            }
        }

        info!(
            accepted = report.accepted,
            dropped = report.dropped,
            "Overlay normalization complete"
        );
        Ok((records, report))
    }

    fn build_overlay(&self, row: &Value) -> Option<OverlayRecord> {
        let bbl = field_str(row, &["bbl"]).and_then(|raw| normalize_bbl(&raw))?;
        let completion_year = field_i32(row, &["project_completion_year", "completion_year"])?;
        if !self.year_in_bounds(completion_year) {
            return None;
        }

        let tier = |names: &[&str]| field_i32(row, names).unwrap_or(0);

        Some(OverlayRecord {
            bbl,
            completion_year,
            affordable_units: tier(&["all_counted_units", "affordable_units"]),
            units_eli: tier(&["extremely_low_income_units"]),
            units_vli: tier(&["very_low_income_units"]),
            units_li: tier(&["low_income_units"]),
            units_mod: tier(&["moderate_income_units"]),
            units_mid: tier(&["middle_income_units"]),
            units_other: tier(&["other_income_units"]),
            br_studio: tier(&["studio_units"]),
            br_1: tier(&["one_br_units", "_1_br_units"]),
            br_2: tier(&["two_br_units", "_2_br_units"]),
            br_3plus: tier(&["three_br_units", "_3_br_units"]),
            program: field_str(row, &["program_group", "program"]),
            project_name: field_str(row, &["project_name"]),
            start_year: field_i32(row, &["project_start_year", "start_year"]),
        })
    }

    /// Normalize a GeoJSON feature collection of capital projects.
    pub fn normalize_capital_projects(
        &self,
        payload: &Value,
    ) -> Result<(Vec<CapitalProject>, NormalizeReport)> {
        // Accept either a full feature collection or a bare feature array
        let features = payload
            .get("features")
            .and_then(|f| f.as_array())
            .or_else(|| payload.as_array())
            .ok_or_else(|| {
                PipelineError::MalformedPayload(
                    "capital projects payload is not a feature collection".to_string(),
                )
            })?;

        let mut report = NormalizeReport::default();
        let mut records = Vec::with_capacity(features.len());

        for feature in features {
            match self.build_capital_project(feature) {
                Some(record) => {
                    report.accept();
                    records.push(record);
                }
                None => report.drop_record("invalid capital project feature", feature),
            }
        }

        info!(
            accepted = report.accepted,
            dropped = report.dropped,
            "Capital project normalization complete"
        );
        Ok((records, report))
    }

    fn build_capital_project(&self, feature: &Value) -> Option<CapitalProject> {
        let properties = feature.get("properties")?;
        let project_id = field_str(properties, &["project_id", "proj_id"])?;
        let geometry: Geometry = serde_json::from_value(feature.get("geometry")?.clone()).ok()?;

        let raw_budget = properties
            .get("budget")
            .or_else(|| properties.get("total_budget"))
            .and_then(value_as_f64)
            .unwrap_or(0.0);
        let budget = self.patch_budget(&project_id, raw_budget);

        Some(CapitalProject {
            project_id,
            name: field_str(properties, &["name", "project_name"]).unwrap_or_default(),
            borough: normalize_borough(
                &field_str(properties, &["boro", "borough"]).unwrap_or_default(),
            ),
            budget,
            geometry,
            simplified_geometry: None,
            centroid: None,
        })
    }

    /// One known data error in the capital feed carries budgets near 100
    /// billion where 100 million was meant. This is a targeted patch for
    /// that cluster, not a general rounding rule.
    fn patch_budget(&self, project_id: &str, budget: f64) -> f64 {
        if (BUDGET_ERROR_FLOOR..=BUDGET_ERROR_CEILING).contains(&budget) {
            let corrected = budget / BUDGET_CORRECTION_DIVISOR;
            emit_counter(MetricName::NormalizeBudgetCorrections, 1.0);
            warn!(
                project_id,
                original = budget,
                corrected,
                "Patched known erroneous capital budget value"
            );
            return corrected;
        }
        budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BuildingCategory;
    use serde_json::json;

    fn normalizer() -> RecordNormalizer {
        RecordNormalizer::new(NormalizeConfig::default())
    }

    fn construction_row() -> Value {
        json!({
            "job_number": "421930",
            "job_type": "New Building",
            "bbl": "1-00123-0456",
            "boro": "1",
            "address": "100 Main St",
            "latitude": "40.7128",
            "longitude": "-74.0060",
            "classa_net": "12",
            "complete_year": "2020",
            "bldg_class": "C1"
        })
    }

    #[test]
    fn test_bbl_normalization() {
        assert_eq!(normalize_bbl("1-00123-0456"), Some("1001230456".to_string()));
        assert_eq!(normalize_bbl("100123045"), Some("0100123045".to_string()));
        assert_eq!(normalize_bbl("12345"), None);
        assert_eq!(normalize_bbl("12345678901"), None);
        assert_eq!(normalize_bbl(""), None);
    }

    #[test]
    fn test_construction_row_normalizes() {
        let (records, report) = normalizer()
            .normalize_constructions(&json!([construction_row()]))
            .unwrap();
        assert_eq!(report.accepted, 1);
        assert_eq!(report.dropped, 0);

        let record = &records[0];
        assert_eq!(record.job_id, "421930");
        assert_eq!(record.bbl.as_deref(), Some("1001230456"));
        assert_eq!(record.borough, "Manhattan");
        assert_eq!(record.units, 12);
        assert_eq!(record.provenance, Provenance::Dcp);
        assert_eq!(record.category, BuildingCategory::MultifamilyWalkup);
    }

    #[test]
    fn test_zero_coordinate_drops_record() {
        let mut row = construction_row();
        row["latitude"] = json!("0");
        let (records, report) = normalizer().normalize_constructions(&json!([row])).unwrap();
        assert!(records.is_empty());
        assert_eq!(report.dropped, 1);
    }

    #[test]
    fn test_unparseable_coordinate_drops_record() {
        let mut row = construction_row();
        row["longitude"] = json!("not a number");
        let (records, _) = normalizer().normalize_constructions(&json!([row])).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_out_of_range_year_drops_record() {
        let mut row = construction_row();
        row["complete_year"] = json!("2010");
        let (records, report) = normalizer().normalize_constructions(&json!([row])).unwrap();
        assert!(records.is_empty());
        assert_eq!(report.dropped, 1);
    }

    #[test]
    fn test_bad_bbl_is_absent_not_an_error() {
        let mut row = construction_row();
        row["bbl"] = json!("garbage");
        let (records, report) = normalizer().normalize_constructions(&json!([row])).unwrap();
        assert_eq!(report.accepted, 1);
        assert_eq!(records[0].bbl, None);
    }

    #[test]
    fn test_demolitions_split_from_constructions() {
        let mut demo = construction_row();
        demo["job_type"] = json!("Demolition");
        demo["classa_net"] = json!("-8");
        let payload = json!([construction_row(), demo]);

        let n = normalizer();
        let (constructions, _) = n.normalize_constructions(&payload).unwrap();
        let (removals, _) = n.normalize_removals(&payload).unwrap();

        assert_eq!(constructions.len(), 1);
        assert_eq!(removals.len(), 1);
        assert_eq!(removals[0].units_lost_estimate, 8);
        assert!(!removals[0].has_later_construction);
    }

    #[test]
    fn test_non_array_payload_errors() {
        let result = normalizer().normalize_constructions(&json!({"rows": []}));
        assert!(result.is_err());
    }

    #[test]
    fn test_budget_patch_applies_only_to_error_cluster() {
        let n = normalizer();
        assert_eq!(n.patch_budget("p1", 100.0e9), 100.0e6);
        assert_eq!(n.patch_budget("p2", 95.0e9), 95.0e6);
        assert_eq!(n.patch_budget("p3", 5.0e9), 5.0e9);
        assert_eq!(n.patch_budget("p4", 100.0e6), 100.0e6);
    }

    #[test]
    fn test_capital_project_feature_collection() {
        let payload = json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"project_id": "HWK123", "name": "Sewer upgrade", "boro": "4", "budget": 100.0e9},
                "geometry": {"type": "Point", "coordinates": [-73.8, 40.7]}
            }]
        });
        let (projects, report) = normalizer().normalize_capital_projects(&payload).unwrap();
        assert_eq!(report.accepted, 1);
        assert_eq!(projects[0].borough, "Queens");
        assert_eq!(projects[0].budget, 100.0e6);
        assert_eq!(projects[0].geometry, Geometry::Point([-73.8, 40.7]));
    }
}
