//! Records stored by the analysis engine and the shapes served to clients.
//!
//! Rows are read with `COALESCE` applied in SQL, so the structs here carry
//! plain values instead of nullable wrappers. Per-channel statistics live in
//! JSON columns and are decoded leniently by [`Stats::from_column`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::warn;

/// Summary statistics for one color/shape channel of an analysis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
    pub median: f32,
}

impl Stats {
    /// Decode a stats JSON column. A NULL or malformed value yields zeroed
    /// stats and a warning rather than failing the whole record.
    pub fn from_column(value: Option<&serde_json::Value>, field: &str) -> Stats {
        let Some(value) = value else {
            return Stats::default();
        };
        match serde_json::from_value(value.clone()) {
            Ok(stats) => stats,
            Err(err) => {
                warn!(field, error = %err, "failed to decode stats column");
                Stats::default()
            }
        }
    }
}

/// One row of the `analyses` table as selected by the repository.
#[derive(Debug, Clone, Default, PartialEq, FromRow)]
pub struct AnalysisRow {
    pub id: i32,
    pub date_time: Option<DateTime<Utc>>,
    pub product: String,
    pub color_rhs: String,
    pub id_user: String,
    pub telegram_link: String,
    pub text: String,
    pub file_source: String,
    pub scale_mm_pixel: f64,
    pub mass: f64,
    pub area: f64,
    pub r: Option<serde_json::Value>,
    pub g: Option<serde_json::Value>,
    pub b: Option<serde_json::Value>,
    pub h: Option<serde_json::Value>,
    pub s: Option<serde_json::Value>,
    pub v: Option<serde_json::Value>,
    pub lab_l: Option<serde_json::Value>,
    pub lab_a: Option<serde_json::Value>,
    pub lab_b: Option<serde_json::Value>,
    pub w: Option<serde_json::Value>,
    pub l: Option<serde_json::Value>,
    pub t: Option<serde_json::Value>,
    pub file_output: String,
    pub id_analysis: String,
}

/// An analysis as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: i32,
    pub date_time: Option<DateTime<Utc>>,
    pub product: String,
    pub color_rhs: String,
    pub id_user: String,
    pub telegram_link: String,
    pub text: String,
    pub file_source: String,
    pub scale_mm_pixel: f64,
    pub mass: f64,
    pub area: f64,
    pub r: Stats,
    pub g: Stats,
    pub b: Stats,
    pub h: Stats,
    pub s: Stats,
    pub v: Stats,
    pub lab_l: Stats,
    pub lab_a: Stats,
    pub lab_b: Stats,
    pub w: Stats,
    pub l: Stats,
    pub t: Stats,
    pub file_output: String,
    pub id_analysis: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<Object>>,
}

impl From<AnalysisRow> for Analysis {
    fn from(row: AnalysisRow) -> Self {
        let id_analysis = row.id_analysis.trim().parse::<i64>().unwrap_or_else(|err| {
            warn!(id_analysis = %row.id_analysis, error = %err, "non-numeric analysis identifier");
            0
        });

        Analysis {
            id: row.id,
            date_time: row.date_time,
            r: Stats::from_column(row.r.as_ref(), "r"),
            g: Stats::from_column(row.g.as_ref(), "g"),
            b: Stats::from_column(row.b.as_ref(), "b"),
            h: Stats::from_column(row.h.as_ref(), "h"),
            s: Stats::from_column(row.s.as_ref(), "s"),
            v: Stats::from_column(row.v.as_ref(), "v"),
            lab_l: Stats::from_column(row.lab_l.as_ref(), "lab_l"),
            lab_a: Stats::from_column(row.lab_a.as_ref(), "lab_a"),
            lab_b: Stats::from_column(row.lab_b.as_ref(), "lab_b"),
            w: Stats::from_column(row.w.as_ref(), "w"),
            l: Stats::from_column(row.l.as_ref(), "l"),
            t: Stats::from_column(row.t.as_ref(), "t"),
            product: row.product,
            color_rhs: row.color_rhs,
            id_user: row.id_user,
            telegram_link: row.telegram_link,
            text: row.text,
            file_source: row.file_source,
            scale_mm_pixel: row.scale_mm_pixel,
            mass: row.mass,
            area: row.area,
            file_output: row.file_output,
            id_analysis,
            objects: None,
        }
    }
}

/// Color and shape measurements of one detected object.
///
/// Shared between [`Object`] and [`ObjectMetadata`]; flattened into both on
/// the wire and when reading rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Measurements {
    pub m_h: f64,
    pub m_s: f64,
    pub m_v: f64,
    pub m_r: f64,
    pub m_g: f64,
    pub m_b: f64,
    pub l_avg: f64,
    pub w_avg: f64,
    pub brt_avg: f64,
    pub r_avg: f64,
    pub g_avg: f64,
    pub b_avg: f64,
    pub h_avg: f64,
    pub s_avg: f64,
    pub v_avg: f64,
    pub h: f64,
    pub s: f64,
    pub v: f64,
    pub h_m: f64,
    pub s_m: f64,
    pub v_m: f64,
    pub r_m: f64,
    pub g_m: f64,
    pub b_m: f64,
    pub brt_m: f64,
    pub w_m: f64,
    pub l_m: f64,
    pub l: f64,
    pub w: f64,
    pub l_w: f64,
    pub pr: f64,
    pub sq: f64,
    pub brt: f64,
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub solid: f64,
    pub min_h: f64,
    pub min_s: f64,
    pub min_v: f64,
    pub max_h: f64,
    pub max_s: f64,
    pub max_v: f64,
    pub entropy: f64,
    pub color_rhs: String,
    pub sq_sqcrl: f64,
    pub hu1: f64,
    pub hu2: f64,
    pub hu3: f64,
    pub hu4: f64,
    pub hu5: f64,
    pub hu6: f64,
}

/// Numeric measurement columns, in table order. `color_rhs` is the only text
/// measurement and is handled separately.
pub(crate) const MEASUREMENT_FLOAT_COLUMNS: &[&str] = &[
    "m_h", "m_s", "m_v", "m_r", "m_g", "m_b", "l_avg", "w_avg", "brt_avg", "r_avg", "g_avg",
    "b_avg", "h_avg", "s_avg", "v_avg", "h", "s", "v", "h_m", "s_m", "v_m", "r_m", "g_m", "b_m",
    "brt_m", "w_m", "l_m", "l", "w", "l_w", "pr", "sq", "brt", "r", "g", "b", "solid", "min_h",
    "min_s", "min_v", "max_h", "max_s", "max_v", "entropy", "sq_sqcrl", "hu1", "hu2", "hu3",
    "hu4", "hu5", "hu6",
];

/// A detected object belonging to one analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Object {
    pub id: i32,
    pub id_analysis: i64,
    pub file: String,
    pub class: String,
    pub geometry: String,
    pub id_image: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub measurements: Measurements,
}

/// Measurements of an object without its analysis linkage, returned by the
/// bulk lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ObjectMetadata {
    pub id: i32,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub measurements: Measurements,
}

impl From<&Object> for ObjectMetadata {
    fn from(object: &Object) -> Self {
        ObjectMetadata {
            id: object.id,
            measurements: object.measurements.clone(),
        }
    }
}
