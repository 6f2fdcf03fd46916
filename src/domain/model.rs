use crate::utils::error::EtlError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    #[serde(rename = "Maison")]
    House,
    #[serde(rename = "Appartement")]
    Apartment,
}

impl PropertyType {
    pub fn label(&self) -> &'static str {
        match self {
            PropertyType::House => "Maison",
            PropertyType::Apartment => "Appartement",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PropertyType {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Maison" => Ok(PropertyType::House),
            "Appartement" => Ok(PropertyType::Apartment),
            other => Err(EtlError::rejected(format!("Type non autorisé: {}", other))),
        }
    }
}

/// DPE 能源等級 A (最佳) 到 G
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnergyRating {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

impl EnergyRating {
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'A' => Some(EnergyRating::A),
            'B' => Some(EnergyRating::B),
            'C' => Some(EnergyRating::C),
            'D' => Some(EnergyRating::D),
            'E' => Some(EnergyRating::E),
            'F' => Some(EnergyRating::F),
            'G' => Some(EnergyRating::G),
            _ => None,
        }
    }

    /// A=1 .. G=7
    pub fn score(&self) -> u8 {
        *self as u8 + 1
    }
}

impl fmt::Display for EnergyRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl FromStr for EnergyRating {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) => EnergyRating::from_letter(letter).ok_or_else(|| {
                EtlError::ValidationError {
                    message: format!("Invalid energy rating: {}", s),
                }
            }),
            _ => Err(EtlError::ValidationError {
                message: format!("Invalid energy rating: {}", s),
            }),
        }
    }
}

/// 缺值在 CSV 中以 "-" 表示
mod dash {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Display,
    {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_str("-"),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
        T::Err: Display,
    {
        let raw = String::deserialize(deserializer)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "-" {
            return Ok(None);
        }
        trimmed.parse().map(Some).map_err(de::Error::custom)
    }
}

/// 一筆爬取到的房屋廣告
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Listing {
    #[serde(rename = "Ville")]
    pub city: String,
    #[serde(rename = "Type")]
    pub property_type: PropertyType,
    #[serde(rename = "Surface", with = "dash")]
    pub surface: Option<u32>,
    #[serde(rename = "NbrPieces", with = "dash")]
    pub rooms: Option<u32>,
    #[serde(rename = "NbrChambres", with = "dash")]
    pub bedrooms: Option<u32>,
    #[serde(rename = "NbrSdb", with = "dash")]
    pub bathrooms: Option<u32>,
    #[serde(rename = "DPE", with = "dash")]
    pub dpe: Option<EnergyRating>,
    #[serde(rename = "Prix")]
    pub price: u64,
}

pub const LISTING_HEADER: [&str; 8] = [
    "Ville",
    "Type",
    "Surface",
    "NbrPieces",
    "NbrChambres",
    "NbrSdb",
    "DPE",
    "Prix",
];

/// 參考資料中的法國市鎮
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub insee_code: String,
    pub postal_code: Option<String>,
    pub department_code: Option<String>,
    pub department_name: Option<String>,
    pub region_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Listing joined with its reference commune. City columns stay empty for
/// unmatched rows of a left join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedListing {
    #[serde(rename = "Ville")]
    pub city: String,
    #[serde(rename = "Type")]
    pub property_type: PropertyType,
    #[serde(rename = "Surface", with = "dash")]
    pub surface: Option<u32>,
    #[serde(rename = "NbrPieces", with = "dash")]
    pub rooms: Option<u32>,
    #[serde(rename = "NbrChambres", with = "dash")]
    pub bedrooms: Option<u32>,
    #[serde(rename = "NbrSdb", with = "dash")]
    pub bathrooms: Option<u32>,
    #[serde(rename = "DPE", with = "dash")]
    pub dpe: Option<EnergyRating>,
    #[serde(rename = "Prix")]
    pub price: u64,
    #[serde(rename = "CodeInsee")]
    pub insee_code: Option<String>,
    #[serde(rename = "CodePostal")]
    pub postal_code: Option<String>,
    #[serde(rename = "CodeDepartement")]
    pub department_code: Option<String>,
    #[serde(rename = "Departement")]
    pub department_name: Option<String>,
    #[serde(rename = "Region")]
    pub region_name: Option<String>,
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
}

impl EnrichedListing {
    pub fn new(listing: Listing, city: Option<&City>) -> Self {
        Self {
            city: listing.city,
            property_type: listing.property_type,
            surface: listing.surface,
            rooms: listing.rooms,
            bedrooms: listing.bedrooms,
            bathrooms: listing.bathrooms,
            dpe: listing.dpe,
            price: listing.price,
            insee_code: city.map(|c| c.insee_code.clone()),
            postal_code: city.and_then(|c| c.postal_code.clone()),
            department_code: city.and_then(|c| c.department_code.clone()),
            department_name: city.and_then(|c| c.department_name.clone()),
            region_name: city.and_then(|c| c.region_name.clone()),
            latitude: city.and_then(|c| c.latitude),
            longitude: city.and_then(|c| c.longitude),
        }
    }

    pub fn is_matched(&self) -> bool {
        self.insee_code.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_listing() -> Listing {
        Listing {
            city: "Vincennes".to_string(),
            property_type: PropertyType::Apartment,
            surface: Some(48),
            rooms: Some(2),
            bedrooms: None,
            bathrooms: Some(1),
            dpe: Some(EnergyRating::D),
            price: 389_000,
        }
    }

    #[test]
    fn test_listing_csv_uses_dash_for_missing_values() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(sample_listing()).unwrap();
        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        let mut lines = output.lines();
        assert_eq!(lines.next(), Some(LISTING_HEADER.join(",").as_str()));
        assert_eq!(lines.next(), Some("Vincennes,Appartement,48,2,-,1,D,389000"));
    }

    #[test]
    fn test_listing_reads_dash_and_empty_as_missing() {
        let data = "Ville,Type,Surface,NbrPieces,NbrChambres,NbrSdb,DPE,Prix\n\
                    Meaux,Maison,-,5,,2,-,250000\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let listing: Listing = reader.deserialize().next().unwrap().unwrap();

        assert_eq!(listing.property_type, PropertyType::House);
        assert_eq!(listing.surface, None);
        assert_eq!(listing.rooms, Some(5));
        assert_eq!(listing.bedrooms, None);
        assert_eq!(listing.dpe, None);
        assert_eq!(listing.price, 250_000);
    }

    #[test]
    fn test_unknown_property_type_is_rejected() {
        assert!(matches!(
            "Terrain".parse::<PropertyType>(),
            Err(EtlError::Rejected { .. })
        ));
    }

    #[test]
    fn test_energy_rating_score() {
        assert_eq!(EnergyRating::A.score(), 1);
        assert_eq!(EnergyRating::G.score(), 7);
        assert_eq!("c".parse::<EnergyRating>().unwrap(), EnergyRating::C);
        assert!("H".parse::<EnergyRating>().is_err());
    }

    #[test]
    fn test_enriched_listing_left_join_keeps_empty_city_columns() {
        let row = EnrichedListing::new(sample_listing(), None);
        assert!(!row.is_matched());

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&row).unwrap();
        let output = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert!(output.lines().nth(1).unwrap().ends_with("389000,,,,,,,"));

        let mut reader = csv::Reader::from_reader(output.as_bytes());
        let back: EnrichedListing = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(back, row);
    }
}
