pub mod dataset_pipeline;
pub mod feature_pipeline;
pub mod predict_pipeline;
pub mod scrape_pipeline;
pub mod train_pipeline;

pub use dataset_pipeline::{DatasetPipeline, DatasetReport};
pub use feature_pipeline::FeaturePipeline;
pub use predict_pipeline::{PredictPipeline, PredictionRow};
pub use scrape_pipeline::{inspect_ad, AdInspection, CrawlStats, ScrapePipeline};
pub use train_pipeline::{MetricsReport, TrainPipeline};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::core::{PageFetcher, Storage};
    use crate::utils::error::{EtlError, Result};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// 記憶體內的 Storage，供單元測試使用
    #[derive(Clone, Default)]
    pub struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub async fn put(&self, path: &str, data: &[u8]) {
            self.files.lock().await.insert(path.to_string(), data.to_vec());
        }

        pub async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            self.files.lock().await.get(path).cloned()
        }

        pub async fn get_text(&self, path: &str) -> Option<String> {
            self.get_file(path)
                .await
                .map(|data| String::from_utf8_lossy(&data).into_owned())
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }

        async fn exists(&self, path: &str) -> bool {
            self.files.lock().await.contains_key(path)
        }
    }

    /// 以網址對應固定 HTML 的下載器；未知網址回傳 404
    pub struct MapFetcher {
        pages: HashMap<String, String>,
        pub calls: AtomicUsize,
    }

    impl MapFetcher {
        pub fn new(pages: Vec<(String, String)>) -> Self {
            Self {
                pages: pages.into_iter().collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl PageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages.get(url).cloned().ok_or_else(|| EtlError::ScrapeError {
                url: url.to_string(),
                message: "404".to_string(),
            })
        }
    }

    pub fn ad_html(kind: &str, price: &str, city: &str) -> String {
        format!(
            r#"<html><body>
            <h1>{kind} à vendre</h1>
            <span>{price} €</span>
            <span>France, Ile-de-France, Essonne, {city}</span>
            <div><h3>Caractéristiques</h3><ul>
              <li><span>Type</span><span>{kind}</span></li>
              <li><span>Surface</span><span>70 m²</span></li>
              <li><span>Nb. de pièces</span><span>3</span></li>
              <li><span>Nb. de chambres</span><span>2</span></li>
              <li><span>DPE</span><span>C</span></li>
            </ul></div></body></html>"#
        )
    }

    pub fn results_html(ads: &[&str], next: Option<&str>) -> String {
        let links: String = ads
            .iter()
            .map(|ad| format!(r#"<a href="{}">annonce</a>"#, ad))
            .collect();
        let next = next
            .map(|n| format!(r#"<a rel="next" href="{}">Suivant</a>"#, n))
            .unwrap_or_default();
        format!("<html><body>{}{}</body></html>", links, next)
    }
}
