use crate::app::csv_io::write_csv_with_header;
use crate::config::toml_config::ScrapeConfig;
use crate::core::{Listing, PageFetcher, Pipeline, Storage};
use crate::domain::model::LISTING_HEADER;
use crate::domain::services::ad_parser::{parse_listing, AdPage};
use crate::domain::services::results_page::{compile_ad_pattern, extract_ad_urls, find_next_page_url};
use crate::utils::error::{EtlError, Result};
use regex::Regex;
use scraper::Html;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// 爬取統計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub pages: usize,
    pub visited: usize,
    pub valid: usize,
    pub skipped: usize,
}

pub struct ScrapeOutput {
    pub listings: Vec<Listing>,
    pub stats: CrawlStats,
}

pub struct ScrapePipeline<S: Storage, F: PageFetcher + 'static> {
    storage: S,
    fetcher: Arc<F>,
    config: ScrapeConfig,
    ad_pattern: Regex,
    last_stats: Mutex<CrawlStats>,
}

impl<S: Storage, F: PageFetcher + 'static> ScrapePipeline<S, F> {
    pub fn new(storage: S, fetcher: F, config: ScrapeConfig) -> Result<Self> {
        let ad_pattern = compile_ad_pattern(&config.ad_url_pattern)?;
        Ok(Self {
            storage,
            fetcher: Arc::new(fetcher),
            config,
            ad_pattern,
            last_stats: Mutex::new(CrawlStats::default()),
        })
    }

    /// Statistics of the most recent crawl.
    pub fn stats(&self) -> CrawlStats {
        self.last_stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    async fn crawl_section(
        &self,
        start_url: &str,
        seen_ads: &mut HashSet<String>,
        listings: &mut Vec<Listing>,
        stats: &mut CrawlStats,
    ) -> Result<()> {
        let mut next_url = Some(start_url.to_string());
        let mut seen_pages = HashSet::new();

        while let Some(page_url) = next_url.take() {
            if seen_pages.len() >= self.config.max_pages {
                tracing::info!(
                    "⏹️ max_pages ({}) reached for {}",
                    self.config.max_pages,
                    start_url
                );
                break;
            }
            if !seen_pages.insert(page_url.clone()) {
                tracing::warn!("Pagination loop detected at {}", page_url);
                break;
            }

            let html = match self.fetcher.fetch(&page_url).await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!("⚠️ Result page {} failed, ending section: {}", page_url, e);
                    break;
                }
            };
            stats.pages += 1;

            let base = Url::parse(&page_url).map_err(|e| EtlError::ScrapeError {
                url: page_url.clone(),
                message: e.to_string(),
            })?;
            let ad_urls = extract_ad_urls(&html, &base, &self.ad_pattern)?;
            next_url = find_next_page_url(&html, &base)?;

            let fresh: Vec<String> = ad_urls
                .into_iter()
                .filter(|url| seen_ads.insert(url.clone()))
                .collect();
            tracing::debug!(
                "Page {} ({}): {} new ads",
                seen_pages.len(),
                page_url,
                fresh.len()
            );

            self.fetch_ads(fresh, listings, stats).await;
            tokio::time::sleep(Duration::from_millis(self.config.listing_delay_ms)).await;
        }

        Ok(())
    }

    /// 以 Semaphore 限制同時下載的廣告數量，結果依 URL 順序合併
    async fn fetch_ads(&self, urls: Vec<String>, listings: &mut Vec<Listing>, stats: &mut CrawlStats) {
        if urls.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrent_requests.max(1)));
        let ad_delay = Duration::from_millis(self.config.ad_delay_ms);
        let min_price = self.config.min_price;
        let mut tasks = JoinSet::new();

        for (position, url) in urls.into_iter().enumerate() {
            let fetcher = Arc::clone(&self.fetcher);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = match fetcher.fetch(&url).await {
                    Ok(html) => parse_listing(&html, min_price),
                    Err(e) => Err(e),
                };
                tokio::time::sleep(ad_delay).await;
                (position, url, outcome)
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    tracing::warn!("Ad task aborted: {}", e);
                    stats.visited += 1;
                    stats.skipped += 1;
                }
            }
        }
        results.sort_by_key(|(position, _, _)| *position);

        for (_, url, outcome) in results {
            stats.visited += 1;
            match outcome {
                Ok(listing) => {
                    stats.valid += 1;
                    listings.push(listing);
                }
                Err(EtlError::Rejected { reason }) => {
                    tracing::debug!("Rejected {}: {}", url, reason);
                    stats.skipped += 1;
                }
                Err(e) => {
                    tracing::warn!("⚠️ Ad {} failed: {}", url, e);
                    stats.skipped += 1;
                }
            }

            if stats.visited % self.config.progress_every.max(1) == 0 {
                tracing::info!(
                    "📊 Progress: {} ads visited, {} valid, {} skipped",
                    stats.visited,
                    stats.valid,
                    stats.skipped
                );
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, F: PageFetcher + 'static> Pipeline for ScrapePipeline<S, F> {
    type Extracted = ScrapeOutput;
    type Transformed = ScrapeOutput;

    fn name(&self) -> &str {
        "scrape"
    }

    async fn extract(&self) -> Result<ScrapeOutput> {
        let mut seen_ads = HashSet::new();
        let mut listings = Vec::new();
        let mut stats = CrawlStats::default();

        for start_url in &self.config.start_urls {
            tracing::info!("🌐 Crawling section {}", start_url);
            self.crawl_section(start_url, &mut seen_ads, &mut listings, &mut stats)
                .await?;
        }

        Ok(ScrapeOutput { listings, stats })
    }

    async fn transform(&self, data: ScrapeOutput) -> Result<ScrapeOutput> {
        tracing::info!(
            "🏠 Crawl finished: {} pages, {} ads visited, {} valid, {} skipped",
            data.stats.pages,
            data.stats.visited,
            data.stats.valid,
            data.stats.skipped
        );
        Ok(data)
    }

    async fn load(&self, result: ScrapeOutput) -> Result<String> {
        let csv = write_csv_with_header(&LISTING_HEADER, &result.listings)?;
        self.storage.write_file(&self.config.output, &csv).await?;

        if let Ok(mut stats) = self.last_stats.lock() {
            *stats = result.stats;
        }
        Ok(self.config.output.clone())
    }
}

/// 單一廣告的解析結果（inspect 子命令）
#[derive(Debug)]
pub struct AdInspection {
    pub url: String,
    pub fields: Vec<(&'static str, String)>,
    pub outcome: std::result::Result<Listing, String>,
}

impl AdInspection {
    pub fn from_html(url: &str, html: &str, min_price: u64) -> Self {
        let document = Html::parse_document(html);
        let page = AdPage::new(&document);

        let shown = |value: Result<String>| value.unwrap_or_else(|e| format!("<{}>", e));
        let optional = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());

        let fields = vec![
            ("Ville", shown(page.city())),
            ("Type", shown(page.property_type().map(|t| t.to_string()))),
            ("Surface", optional(page.surface().map(|v| v.to_string()))),
            ("NbrPieces", optional(page.rooms().map(|v| v.to_string()))),
            ("NbrChambres", optional(page.bedrooms().map(|v| v.to_string()))),
            ("NbrSdb", optional(page.bathrooms().map(|v| v.to_string()))),
            ("DPE", optional(page.dpe().map(|v| v.to_string()))),
            ("Prix", shown(page.price(min_price).map(|v| v.to_string()))),
        ];

        Self {
            url: url.to_string(),
            fields,
            outcome: page.listing(min_price).map_err(|e| e.to_string()),
        }
    }
}

impl fmt::Display for AdInspection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🔎 {}", self.url)?;
        for (name, value) in &self.fields {
            writeln!(f, "  {:<12} {}", name, value)?;
        }
        match &self.outcome {
            Ok(_) => write!(f, "✅ Annonce retenue"),
            Err(reason) => write!(f, "❌ Annonce rejetée: {}", reason),
        }
    }
}

pub async fn inspect_ad<F: PageFetcher>(fetcher: &F, url: &str, min_price: u64) -> Result<AdInspection> {
    let html = fetcher.fetch(url).await?;
    Ok(AdInspection::from_html(url, &html, min_price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipelines::test_support::{ad_html, results_html, MapFetcher, MockStorage};
    use crate::domain::model::PropertyType;
    use std::sync::atomic::Ordering;

    const BASE: &str = "http://immo.test";

    fn fast_config(start_urls: Vec<String>) -> ScrapeConfig {
        ScrapeConfig {
            start_urls,
            output: "raw.csv".to_string(),
            listing_delay_ms: 0,
            ad_delay_ms: 0,
            concurrent_requests: 2,
            ..ScrapeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_crawl_deduplicates_and_skips_rejected_ads() {
        let pages = vec![
            (
                format!("{BASE}/maisons"),
                results_html(&["/annonce-maison-evry/1", "/annonce-maison-evry/2"], Some("/maisons?page=2")),
            ),
            (
                format!("{BASE}/maisons?page=2"),
                results_html(&["/annonce-maison-evry/2", "/annonce-terrain-massy/3"], None),
            ),
            (
                format!("{BASE}/apparts"),
                results_html(&["/annonce-maison-evry/1", "/annonce-appart-massy/4"], None),
            ),
            (format!("{BASE}/annonce-maison-evry/1"), ad_html("Maison", "320 000", "Evry")),
            (format!("{BASE}/annonce-maison-evry/2"), ad_html("Maison", "5 000", "Evry")),
            (format!("{BASE}/annonce-terrain-massy/3"), ad_html("Terrain", "90 000", "Massy")),
            (format!("{BASE}/annonce-appart-massy/4"), ad_html("Appartement", "210 000", "Massy")),
        ];
        let storage = MockStorage::new();
        let pipeline = ScrapePipeline::new(
            storage.clone(),
            MapFetcher::new(pages),
            fast_config(vec![format!("{BASE}/maisons"), format!("{BASE}/apparts")]),
        )
        .unwrap();

        let output = pipeline.extract().await.unwrap();
        assert_eq!(
            output.stats,
            CrawlStats {
                pages: 3,
                visited: 4,
                valid: 2,
                skipped: 2
            }
        );
        assert_eq!(output.listings[0].city, "Evry");
        assert_eq!(output.listings[1].property_type, PropertyType::Apartment);
        // 3 result pages + 4 distinct ads
        assert_eq!(pipeline.fetcher.calls.load(Ordering::SeqCst), 7);

        let path = pipeline.load(output).await.unwrap();
        assert_eq!(path, "raw.csv");
        let csv = storage.get_text("raw.csv").await.unwrap();
        assert!(csv.starts_with("Ville,Type,Surface,NbrPieces,NbrChambres,NbrSdb,DPE,Prix\n"));
        assert!(csv.contains("Evry,Maison,70,3,2,-,C,320000"));
        assert_eq!(pipeline.stats().valid, 2);
    }

    #[tokio::test]
    async fn test_max_pages_and_failed_page_end_section() {
        let pages = vec![
            (format!("{BASE}/p1"), results_html(&[], Some("/p2"))),
            (format!("{BASE}/p2"), results_html(&[], Some("/p3"))),
            (format!("{BASE}/p3"), results_html(&[], None)),
        ];
        let mut config = fast_config(vec![format!("{BASE}/p1"), format!("{BASE}/missing")]);
        config.max_pages = 2;
        let storage = MockStorage::new();
        let pipeline = ScrapePipeline::new(storage.clone(), MapFetcher::new(pages), config).unwrap();

        let output = pipeline.extract().await.unwrap();
        assert_eq!(output.stats.pages, 2);
        assert!(output.listings.is_empty());

        pipeline.load(output).await.unwrap();
        assert_eq!(
            storage.get_text("raw.csv").await.unwrap(),
            "Ville,Type,Surface,NbrPieces,NbrChambres,NbrSdb,DPE,Prix\n"
        );
    }

    #[tokio::test]
    async fn test_inspect_reports_rejection() {
        let url = format!("{BASE}/annonce-terrain-massy/3");
        let fetcher = MapFetcher::new(vec![(url.clone(), ad_html("Terrain", "90 000", "Massy"))]);

        let inspection = inspect_ad(&fetcher, &url, 10_000).await.unwrap();
        assert!(inspection.outcome.is_err());
        assert!(inspection.fields.contains(&("Ville", "Massy".to_string())));
        assert!(inspection.fields.contains(&("Prix", "90000".to_string())));
        assert!(inspection.to_string().contains("Terrain"));

        assert!(inspect_ad(&fetcher, "http://immo.test/none", 10_000).await.is_err());
    }
}
