use crate::config::toml_config::CityColumns;
use crate::domain::model::{City, EnrichedListing, Listing};
use crate::utils::error::{EtlError, Result};
use serde::Serialize;
use std::path::Path;

/// Raw scraped rows; rows that do not deserialize are counted, not fatal.
pub fn read_listings(data: &[u8]) -> Result<(Vec<Listing>, usize)> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(data);
    let mut listings = Vec::new();
    let mut invalid = 0;

    for (line, row) in reader.deserialize::<Listing>().enumerate() {
        match row {
            Ok(listing) if !listing.city.is_empty() => listings.push(listing),
            Ok(_) => invalid += 1,
            Err(e) => {
                tracing::debug!("Skipping raw row {}: {}", line + 2, e);
                invalid += 1;
            }
        }
    }
    Ok((listings, invalid))
}

pub fn read_enriched(data: &[u8]) -> Result<Vec<EnrichedListing>> {
    let mut reader = csv::Reader::from_reader(data);
    let rows = reader
        .deserialize::<EnrichedListing>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn detect_delimiter(data: &[u8]) -> u8 {
    let header = data.split(|b| *b == b'\n').next().unwrap_or_default();
    let commas = header.iter().filter(|b| **b == b',').count();
    let semicolons = header.iter().filter(|b| **b == b';').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// 依設定的欄位名稱讀取市鎮參考資料（逗號或分號分隔）
pub fn read_cities(data: &[u8], columns: &CityColumns) -> Result<Vec<City>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(data))
        .flexible(true)
        .from_reader(data);
    let headers = reader.headers()?.clone();

    let index_of = |name: &str| headers.iter().position(|h| h.trim() == name);
    let required = |field: &str, name: &str| {
        index_of(name).ok_or_else(|| EtlError::ValidationError {
            message: format!(
                "City reference file has no '{}' column (dataset.city_columns.{})",
                name, field
            ),
        })
    };

    let name_idx = required("name", &columns.name)?;
    let insee_idx = required("insee_code", &columns.insee_code)?;
    let postal_idx = index_of(&columns.postal_code);
    let dep_code_idx = index_of(&columns.department_code);
    let dep_name_idx = index_of(&columns.department_name);
    let region_idx = index_of(&columns.region_name);
    let lat_idx = index_of(&columns.latitude);
    let lon_idx = index_of(&columns.longitude);

    let mut cities = Vec::new();
    for record in reader.records() {
        let record = record?;
        let text = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let number = |idx: Option<usize>| text(idx).and_then(|v| v.replace(',', ".").parse::<f64>().ok());

        let (Some(name), Some(insee_code)) = (text(Some(name_idx)), text(Some(insee_idx))) else {
            continue;
        };
        cities.push(City {
            name,
            insee_code,
            postal_code: text(postal_idx),
            department_code: text(dep_code_idx),
            department_name: text(dep_name_idx),
            region_name: text(region_idx),
            latitude: number(lat_idx),
            longitude: number(lon_idx),
        });
    }
    Ok(cities)
}

pub fn write_csv<T: Serialize>(rows: &[T], delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::processing(format!("Failed to flush CSV: {}", e)))
}

/// CSV with an explicit header, written even when there are no rows.
pub fn write_csv_with_header<T: Serialize>(header: &[&str], rows: &[T]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EtlError::processing(format!("Failed to flush CSV: {}", e)))
}

/// Same path with another extension: `data/x.csv` -> `data/x.json`.
pub fn sibling_path(path: &str, extension: &str) -> String {
    Path::new(path)
        .with_extension(extension)
        .to_string_lossy()
        .into_owned()
}
