use crate::domain::model::{EnrichedListing, PropertyType};
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const BASE_FEATURES: [&str; 8] = [
    "surface",
    "rooms",
    "bedrooms",
    "bathrooms",
    "dpe_score",
    "is_house",
    "latitude",
    "longitude",
];
pub const SURFACE_PER_ROOM: &str = "surface_per_room";
pub const TARGET_COLUMN: &str = "Prix";

const SURFACE: usize = 0;
const ROOMS: usize = 1;

fn base_values(row: &EnrichedListing) -> [Option<f64>; 8] {
    [
        row.surface.map(f64::from),
        row.rooms.map(f64::from),
        row.bedrooms.map(f64::from),
        row.bathrooms.map(f64::from),
        row.dpe.map(|d| f64::from(d.score())),
        Some(if row.property_type == PropertyType::House { 1.0 } else { 0.0 }),
        row.latitude,
        row.longitude,
    ]
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

/// Feature layout learned from the training rows: imputation medians for the
/// base features and the department codes turned into indicator columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub names: Vec<String>,
    pub medians: Vec<f64>,
    pub departments: Vec<String>,
}

impl FeatureSchema {
    pub fn fit(rows: &[EnrichedListing]) -> Result<Self> {
        if rows.is_empty() {
            return Err(EtlError::model("Cannot fit features on an empty dataset"));
        }

        let columns: Vec<[Option<f64>; 8]> = rows.iter().map(base_values).collect();
        let medians = (0..BASE_FEATURES.len())
            .map(|i| {
                let mut present: Vec<f64> = columns
                    .iter()
                    .filter_map(|values| values[i])
                    .filter(|v| v.is_finite())
                    .collect();
                median(&mut present).unwrap_or(0.0)
            })
            .collect();

        let departments: Vec<String> = rows
            .iter()
            .filter_map(|row| row.department_code.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let names = BASE_FEATURES
            .iter()
            .map(|n| n.to_string())
            .chain(std::iter::once(SURFACE_PER_ROOM.to_string()))
            .chain(departments.iter().map(|d| format!("dep_{}", d)))
            .collect();

        Ok(Self {
            names,
            medians,
            departments,
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn transform(&self, row: &EnrichedListing) -> Vec<f64> {
        let mut features: Vec<f64> = base_values(row)
            .iter()
            .zip(&self.medians)
            .map(|(value, median)| value.filter(|v| v.is_finite()).unwrap_or(*median))
            .collect();

        let per_room = features[SURFACE] / features[ROOMS].max(1.0);
        features.push(per_room);

        let department = row.department_code.as_deref();
        features.extend(
            self.departments
                .iter()
                .map(|d| if Some(d.as_str()) == department { 1.0 } else { 0.0 }),
        );
        features
    }

    pub fn transform_all(&self, rows: &[EnrichedListing]) -> Vec<Vec<f64>> {
        rows.iter().map(|row| self.transform(row)).collect()
    }
}

/// 目標值：log_target 時取 ln(price)
pub fn target_value(price: u64, log_target: bool) -> f64 {
    let price = price as f64;
    if log_target {
        price.ln()
    } else {
        price
    }
}

pub fn price_from_target(value: f64, log_target: bool) -> f64 {
    if log_target {
        value.exp()
    } else {
        value
    }
}
