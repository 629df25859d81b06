use crate::constants::{ELEVATOR_UNIT_THRESHOLD, MIXED_USE_CLASS_PREFIX, WALKUP_UNIT_THRESHOLD};
use crate::domain::BuildingCategory;

/// Derive a building category from normalized fields.
///
/// Two tiers, first match wins: program status (affordable overlay, then
/// alteration jobs) overrides physical form. Reclassification happens again
/// after the overlay merge, since overlay presence is only known post-merge.
pub fn classify(
    units: i32,
    building_class: Option<&str>,
    job_type: &str,
    overlay_present: bool,
    affordable_units: i32,
) -> BuildingCategory {
    if overlay_present && affordable_units > 0 {
        return BuildingCategory::Affordable;
    }
    if job_type.to_lowercase().starts_with("alteration") {
        return BuildingCategory::Renovation;
    }
    classify_physical(units, building_class)
}

/// Physical-form fallback, ordered: mixed-use class code, then unit count
/// bands, then unknown.
fn classify_physical(units: i32, building_class: Option<&str>) -> BuildingCategory {
    if building_class
        .map(|class| class.starts_with(MIXED_USE_CLASS_PREFIX))
        .unwrap_or(false)
    {
        return BuildingCategory::MixedUse;
    }
    if units >= ELEVATOR_UNIT_THRESHOLD {
        return BuildingCategory::MultifamilyElevator;
    }
    if units >= WALKUP_UNIT_THRESHOLD {
        return BuildingCategory::MultifamilyWalkup;
    }
    if (1..=2).contains(&units) {
        return BuildingCategory::OneTwoFamily;
    }
    BuildingCategory::Unknown
}
