//! Shared fixture builders for unit tests

use crate::domain::{
    BuildingCategory, ConstructionRecord, OverlayRecord, Provenance, RemovalRecord,
};

pub fn construction(
    job_id: &str,
    bbl: Option<&str>,
    completion_year: i32,
    units: i32,
) -> ConstructionRecord {
    ConstructionRecord {
        job_id: job_id.to_string(),
        bbl: bbl.map(|s| s.to_string()),
        borough: "Brooklyn".to_string(),
        address: format!("{} Test Ave", job_id),
        latitude: 40.68,
        longitude: -73.98,
        units,
        completion_year,
        job_type: "New Building".to_string(),
        building_class: None,
        category: BuildingCategory::Unknown,
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
    }
}

pub fn overlay(bbl: &str, affordable_units: i32) -> OverlayRecord {
    OverlayRecord {
        bbl: bbl.to_string(),
        completion_year: 2020,
        affordable_units,
        units_eli: affordable_units / 2,
        units_vli: 0,
        units_li: affordable_units - affordable_units / 2,
        units_mod: 0,
        units_mid: 0,
        units_other: 0,
        br_studio: 0,
        br_1: affordable_units,
        br_2: 0,
        br_3plus: 0,
        program: Some("Mix and Match".to_string()),
        project_name: Some("Test Project".to_string()),
        start_year: Some(2018),
    }
}

pub fn removal(job_id: &str, bbl: Option<&str>, removal_year: i32, units_lost: i32) -> RemovalRecord {
    RemovalRecord {
        job_id: job_id.to_string(),
        bbl: bbl.map(|s| s.to_string()),
        borough: "Brooklyn".to_string(),
        address: format!("{} Test Ave", job_id),
        latitude: 40.68,
        longitude: -73.98,
        removal_year,
        units_lost_estimate: units_lost,
        has_later_construction: false,
    }
}
