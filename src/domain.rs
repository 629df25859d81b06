use serde::{Deserialize, Serialize};

/// Raw row as returned from a source API, before normalization
pub type RawRecord = serde_json::Value;

/// Where a canonical record's fields came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Construction feed only
    Dcp,
    /// Construction feed enriched with an affordability overlay
    DcpHpd,
}

/// Closed set of building categories assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildingCategory {
    Affordable,
    Renovation,
    OneTwoFamily,
    MultifamilyWalkup,
    MultifamilyElevator,
    MixedUse,
    Unknown,
}

/// One permitted building job, after normalization and enrichment.
///
/// Affordability fields default to zero and are only populated when an
/// overlay record is merged in (see the overlay stage).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructionRecord {
    /// Stable job identifier from the construction feed
    pub job_id: String,
    /// 10-digit parcel code (borough + block + lot); absent when the source
    /// value could not be normalized
    pub bbl: Option<String>,
    pub borough: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Net unit change; negative for conversions that remove units
    pub units: i32,
    pub completion_year: i32,
    pub job_type: String,
    /// Provider structural class code, used to detect mixed-use buildings
    pub building_class: Option<String>,
    pub category: BuildingCategory,
    pub provenance: Provenance,

    // Affordability fields, overwritten wholesale on overlay merge
    pub affordable_units: i32,
    pub units_eli: i32,
    pub units_vli: i32,
    pub units_li: i32,
    pub units_mod: i32,
    pub units_mid: i32,
    pub units_other: i32,
    pub br_studio: i32,
    pub br_1: i32,
    pub br_2: i32,
    pub br_3plus: i32,
    pub program: Option<String>,
    pub project_name: Option<String>,
    pub start_year: Option<i32>,
}

impl ConstructionRecord {
    pub fn has_overlay(&self) -> bool {
        self.provenance == Provenance::DcpHpd
    }
}

/// One affordability-program project, keyed by (bbl, completion year)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayRecord {
    pub bbl: String,
    pub completion_year: i32,
    pub affordable_units: i32,
    pub units_eli: i32,
    pub units_vli: i32,
    pub units_li: i32,
    pub units_mod: i32,
    pub units_mid: i32,
    pub units_other: i32,
    pub br_studio: i32,
    pub br_1: i32,
    pub br_2: i32,
    pub br_3plus: i32,
    pub program: Option<String>,
    pub project_name: Option<String>,
    pub start_year: Option<i32>,
}

/// One demolition job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovalRecord {
    pub job_id: String,
    pub bbl: Option<String>,
    pub borough: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub removal_year: i32,
    pub units_lost_estimate: i32,
    /// True when a construction record exists at the same parcel,
    /// meaning the demolition made way for new housing
    pub has_later_construction: bool,
}

/// GeoJSON-shaped geometry attached to a capital project.
/// Rings follow the GeoJSON convention: the first ring of a polygon is the
/// outer boundary, subsequent rings are holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point([f64; 2]),
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
    #[serde(untagged)]
    Other(serde_json::Value),
}

impl Geometry {
    /// Total vertex count across all rings; zero for non-polygonal shapes
    pub fn vertex_count(&self) -> usize {
        match self {
            Geometry::Point(_) => 1,
            Geometry::Polygon(rings) => rings.iter().map(|r| r.len()).sum(),
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .flat_map(|p| p.iter())
                .map(|r| r.len())
                .sum(),
            Geometry::Other(_) => 0,
        }
    }
}

/// One capital project with its footprint geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalProject {
    pub project_id: String,
    pub name: String,
    pub borough: String,
    pub budget: f64,
    pub geometry: Geometry,
    /// Vertex-reduced form of `geometry`, populated by the simplifier
    pub simplified_geometry: Option<Geometry>,
    /// Mean of the outer-ring vertices, (longitude, latitude)
    pub centroid: Option<(f64, f64)>,
}

/// Opaque content digest over a record set. Compared for equality only,
/// never used for addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);
