/// Collection names and borough codes shared across the pipeline.
/// These constants define the canonical names used for storage collections
/// and the mapping between provider borough codes and display names.

// Storage collection names
pub const BUILDINGS_COLLECTION: &str = "buildings";
pub const DEMOLITIONS_COLLECTION: &str = "demolitions";
pub const CAPITAL_PROJECTS_COLLECTION: &str = "capital_projects";

// Structural class codes starting with this prefix denote mixed-use buildings
pub const MIXED_USE_CLASS_PREFIX: &str = "RM";

// Elevator buildings are assumed at this unit count and above
pub const ELEVATOR_UNIT_THRESHOLD: i32 = 50;
// Walkup multifamily starts here
pub const WALKUP_UNIT_THRESHOLD: i32 = 3;

// Known data error: a handful of capital budget lines carry ~100 billion
// where 100 million was meant. Values in this cluster are patched down.
pub const BUDGET_ERROR_FLOOR: f64 = 90.0e9;
pub const BUDGET_ERROR_CEILING: f64 = 110.0e9;
pub const BUDGET_CORRECTION_DIVISOR: f64 = 1000.0;

/// Convert a provider borough code (1-5, or a spelled-out name) to the
/// canonical borough name. Unrecognized codes are passed through as-is.
pub fn normalize_borough(code: &str) -> String {
    match code.trim().to_uppercase().as_str() {
        "1" | "MN" | "MANHATTAN" => "Manhattan".to_string(),
        "2" | "BX" | "BRONX" => "Bronx".to_string(),
        "3" | "BK" | "BROOKLYN" => "Brooklyn".to_string(),
        "4" | "QN" | "QUEENS" => "Queens".to_string(),
        "5" | "SI" | "STATEN ISLAND" => "Staten Island".to_string(),
        _ => code.trim().to_string(),
    }
}
