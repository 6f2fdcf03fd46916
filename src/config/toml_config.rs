use crate::domain::services::ad_parser::DEFAULT_MIN_PRICE;
use crate::domain::services::cleaning::{CleaningRules, JoinMode};
use crate::domain::services::price_model::TrainingOptions;
use crate::domain::services::results_page::{compile_ad_pattern, DEFAULT_AD_URL_PATTERN};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_allowed_values, validate_file_extensions, validate_non_empty_string, validate_path,
    validate_positive_number, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

pub const DEFAULT_CONFIG_PATH: &str = "immo.toml";
pub const OUTPUT_FORMATS: [&str; 3] = ["csv", "tsv", "json"];

const IDF_START_URLS: [&str; 2] = [
    "https://ile-de-france.immo-entre-particuliers.com/annonces/france-ile-de-france/vente/maison/",
    "https://ile-de-france.immo-entre-particuliers.com/annonces/france-ile-de-france/vente/appartement/",
];
const IDF_DEPARTMENTS: [&str; 8] = ["75", "77", "78", "91", "92", "93", "94", "95"];
const ENRICHED_DATASET: &str = "data/processed/idf_ventes_enrichies.csv";

static ENV_VAR_RE: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("valid env var regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    pub scrape: ScrapeConfig,
    pub dataset: DatasetConfig,
    pub features: FeaturesConfig,
    pub model: ModelConfig,
    pub predict: PredictConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSection {
    pub name: String,
    /// Base directory every relative path below is resolved against.
    pub root: String,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: "immobilier-idf".to_string(),
            root: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub start_urls: Vec<String>,
    pub output: String,
    pub ad_url_pattern: String,
    pub max_pages: usize,
    pub listing_delay_ms: u64,
    pub ad_delay_ms: u64,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub concurrent_requests: usize,
    pub min_price: u64,
    pub progress_every: usize,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            start_urls: IDF_START_URLS.iter().map(|u| u.to_string()).collect(),
            output: "data/raw/idf_ventes.csv".to_string(),
            ad_url_pattern: DEFAULT_AD_URL_PATTERN.to_string(),
            max_pages: 400,
            listing_delay_ms: 400,
            ad_delay_ms: 400,
            timeout_seconds: 15,
            retry_attempts: 2,
            retry_delay_ms: 800,
            concurrent_requests: 1,
            min_price: DEFAULT_MIN_PRICE,
            progress_every: 25,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "fr-FR,fr;q=0.9,en;q=0.8".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CityColumns {
    pub name: String,
    pub insee_code: String,
    pub postal_code: String,
    pub department_code: String,
    pub department_name: String,
    pub region_name: String,
    pub latitude: String,
    pub longitude: String,
}

impl Default for CityColumns {
    fn default() -> Self {
        Self {
            name: "nom_commune_complet".to_string(),
            insee_code: "code_commune_INSEE".to_string(),
            postal_code: "code_postal".to_string(),
            department_code: "code_departement".to_string(),
            department_name: "nom_departement".to_string(),
            region_name: "nom_region".to_string(),
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub listings: String,
    pub cities: String,
    pub output: String,
    pub output_formats: Vec<String>,
    pub join: JoinMode,
    pub preferred_departments: Vec<String>,
    pub min_price: u64,
    pub max_price: Option<u64>,
    pub min_surface: u32,
    pub max_surface: u32,
    pub city_columns: CityColumns,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            listings: "data/raw/idf_ventes.csv".to_string(),
            cities: "data/external/communes-departement-region.csv".to_string(),
            output: ENRICHED_DATASET.to_string(),
            output_formats: vec!["csv".to_string()],
            join: JoinMode::Inner,
            preferred_departments: IDF_DEPARTMENTS.iter().map(|d| d.to_string()).collect(),
            min_price: DEFAULT_MIN_PRICE,
            max_price: None,
            min_surface: 9,
            max_surface: 1000,
            city_columns: CityColumns::default(),
        }
    }
}

impl DatasetConfig {
    pub fn cleaning_rules(&self) -> CleaningRules {
        CleaningRules {
            min_price: self.min_price,
            max_price: self.max_price,
            min_surface: self.min_surface,
            max_surface: self.max_surface,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub input: String,
    pub output: String,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            input: ENRICHED_DATASET.to_string(),
            output: "data/processed/features.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub input: String,
    pub output: String,
    pub metrics: String,
    pub test_ratio: f64,
    pub seed: u64,
    pub ridge_lambda: f64,
    /// 以 ln(price) 為訓練目標
    pub log_target: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input: ENRICHED_DATASET.to_string(),
            output: "models/price_model.json".to_string(),
            metrics: "reports/metrics.json".to_string(),
            test_ratio: 0.2,
            seed: 42,
            ridge_lambda: 1.0,
            log_target: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictConfig {
    pub input: String,
    pub model: String,
    pub output: String,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            input: ENRICHED_DATASET.to_string(),
            model: "models/price_model.json".to_string(),
            output: "data/processed/predictions.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl ProjectConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Missing file means built-in defaults; any other read error is reported.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(
                "⚠️ Config file {} not found, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DATA_DIR})，未設定者保留原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            test_ratio: self.model.test_ratio,
            seed: self.model.seed,
            ridge_lambda: self.model.ridge_lambda,
            log_target: self.model.log_target,
        }
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_non_empty_string("project.root", &self.project.root)?;

        for url in &self.scrape.start_urls {
            validate_url("scrape.start_urls", url)?;
        }
        validate_path("scrape.output", &self.scrape.output)?;
        compile_ad_pattern(&self.scrape.ad_url_pattern)?;
        validate_positive_number("scrape.max_pages", self.scrape.max_pages, 1)?;
        validate_positive_number("scrape.concurrent_requests", self.scrape.concurrent_requests, 1)?;
        validate_positive_number("scrape.progress_every", self.scrape.progress_every, 1)?;
        validate_range("scrape.timeout_seconds", self.scrape.timeout_seconds, 1, 600)?;

        validate_path("dataset.listings", &self.dataset.listings)?;
        validate_path("dataset.cities", &self.dataset.cities)?;
        validate_path("dataset.output", &self.dataset.output)?;
        validate_file_extensions(
            "dataset.cities",
            std::slice::from_ref(&self.dataset.cities),
            &["csv"],
        )?;
        validate_allowed_values("dataset.output_formats", &self.dataset.output_formats, &OUTPUT_FORMATS)?;
        if self.dataset.output_formats.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "dataset.output_formats".to_string(),
            });
        }
        validate_non_empty_string("dataset.city_columns.name", &self.dataset.city_columns.name)?;
        validate_non_empty_string(
            "dataset.city_columns.insee_code",
            &self.dataset.city_columns.insee_code,
        )?;
        if self.dataset.min_surface > self.dataset.max_surface {
            return Err(EtlError::InvalidConfigValueError {
                field: "dataset.min_surface".to_string(),
                value: self.dataset.min_surface.to_string(),
                reason: format!("Must not exceed max_surface ({})", self.dataset.max_surface),
            });
        }
        if let Some(max_price) = self.dataset.max_price {
            validate_range("dataset.max_price", max_price, self.dataset.min_price, u64::MAX)?;
        }

        validate_path("features.input", &self.features.input)?;
        validate_path("features.output", &self.features.output)?;

        validate_path("model.input", &self.model.input)?;
        validate_path("model.output", &self.model.output)?;
        validate_path("model.metrics", &self.model.metrics)?;
        validate_range("model.test_ratio", self.model.test_ratio, 0.0, 0.9)?;
        validate_range("model.ridge_lambda", self.model.ridge_lambda, 0.0, f64::MAX)?;

        validate_path("predict.input", &self.predict.input)?;
        validate_path("predict.model", &self.predict.model)?;
        validate_path("predict.output", &self.predict.output)?;

        Ok(())
    }
}

impl Validate for ProjectConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
