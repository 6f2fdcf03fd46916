use crate::domain::model::{EnrichedListing, Listing};
use crate::domain::services::city_matcher::{CityIndex, CityMatch};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMode {
    #[default]
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleaningRules {
    pub min_price: u64,
    pub max_price: Option<u64>,
    pub min_surface: u32,
    pub max_surface: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    pub kept: usize,
    pub duplicates: usize,
    pub price_out_of_range: usize,
    pub surface_out_of_range: usize,
    pub inconsistent_rooms: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinReport {
    pub matched: usize,
    pub ambiguous: usize,
    pub unmatched: usize,
    pub written: usize,
}

/// 去重並剔除超出範圍或不一致的資料列
pub fn clean_listings(listings: Vec<Listing>, rules: &CleaningRules) -> (Vec<Listing>, CleaningReport) {
    let mut report = CleaningReport::default();
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(listings.len());

    for listing in listings {
        if !seen.insert(listing.clone()) {
            report.duplicates += 1;
            continue;
        }

        let price_ok = listing.price >= rules.min_price
            && rules.max_price.map_or(true, |max| listing.price <= max);
        if !price_ok {
            report.price_out_of_range += 1;
            continue;
        }

        if listing
            .surface
            .is_some_and(|s| s < rules.min_surface || s > rules.max_surface)
        {
            report.surface_out_of_range += 1;
            continue;
        }

        if let (Some(rooms), Some(bedrooms)) = (listing.rooms, listing.bedrooms) {
            if bedrooms > rooms {
                report.inconsistent_rooms += 1;
                continue;
            }
        }

        kept.push(listing);
    }

    report.kept = kept.len();
    (kept, report)
}

pub fn join_cities(
    listings: Vec<Listing>,
    index: &CityIndex,
    mode: JoinMode,
    preferred_departments: &[String],
) -> (Vec<EnrichedListing>, JoinReport) {
    let mut report = JoinReport::default();
    let mut rows = Vec::with_capacity(listings.len());

    for listing in listings {
        let matched = index.lookup(&listing.city, preferred_departments);
        match &matched {
            CityMatch::Unique(_) => report.matched += 1,
            CityMatch::Ambiguous { city, candidates } => {
                report.matched += 1;
                report.ambiguous += 1;
                tracing::debug!(
                    "Ambiguous city {:?}: {} candidates, using INSEE {}",
                    listing.city,
                    candidates,
                    city.insee_code
                );
            }
            CityMatch::Missing => {
                report.unmatched += 1;
                tracing::debug!("No reference commune for {:?}", listing.city);
                if mode == JoinMode::Inner {
                    continue;
                }
            }
        }
        rows.push(EnrichedListing::new(listing, matched.city()));
    }

    report.written = rows.len();
    (rows, report)
}
