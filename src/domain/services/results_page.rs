use crate::domain::services::html_text::{element_text, selector};
use crate::utils::error::{EtlError, Result};
use regex::Regex;
use scraper::Html;
use std::collections::BTreeSet;
use url::Url;

pub const DEFAULT_AD_URL_PATTERN: &str = r"/annonce-[^/]+/\d+";

/// 從搜尋結果頁擷取廣告網址（已解析為絕對網址，排序且去重）
pub fn extract_ad_urls(html: &str, page_url: &Url, ad_pattern: &Regex) -> Result<BTreeSet<String>> {
    let document = Html::parse_document(html);
    let anchors = selector("a[href]")?;

    let urls = document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| ad_pattern.is_match(href))
        .filter_map(|href| page_url.join(href).ok())
        .map(String::from)
        .collect();
    Ok(urls)
}

/// Next results page: `rel="next"`, then a "suivant" link, then a link whose
/// class or id mentions `next`.
pub fn find_next_page_url(html: &str, page_url: &Url) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let anchors = selector("a[href]")?;

    let mut by_rel = None;
    let mut by_text = None;
    let mut by_attr = None;

    for a in document.select(&anchors) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };

        let rel_next = a
            .value()
            .attr("rel")
            .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("next")));
        if rel_next {
            by_rel = Some(href);
            break;
        }

        if by_text.is_none() && element_text(a).to_lowercase().contains("suivant") {
            by_text = Some(href);
        }

        if by_attr.is_none() {
            let attrs = format!(
                "{} {}",
                a.value().classes().collect::<Vec<_>>().join(" "),
                a.value().id().unwrap_or_default()
            )
            .to_lowercase();
            if attrs.contains("next") {
                by_attr = Some(href);
            }
        }
    }

    by_rel
        .or(by_text)
        .or(by_attr)
        .map(|href| {
            page_url
                .join(href)
                .map(String::from)
                .map_err(|e| EtlError::ScrapeError {
                    url: page_url.to_string(),
                    message: format!("Invalid next page link {:?}: {}", href, e),
                })
        })
        .transpose()
}

pub fn compile_ad_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("(?i){}", pattern)).map_err(|e| EtlError::InvalidConfigValueError {
        field: "scrape.ad_url_pattern".to_string(),
        value: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_url() -> Url {
        Url::parse("https://ile-de-france.example.com/annonces/vente/maison/").unwrap()
    }

    #[test]
    fn test_extract_ad_urls_resolves_and_dedupes() {
        let html = r#"<html><body>
            <a href="/annonce-val-de-marne-vincennes/411049-appartement">A</a>
            <a href="/annonce-val-de-marne-vincennes/411049-appartement">A (photo)</a>
            <a href="https://other.example.com/ANNONCE-essonne-evry/12-maison">B</a>
            <a href="/contact">Contact</a>
            <a>no href</a>
        </body></html>"#;
        let pattern = compile_ad_pattern(DEFAULT_AD_URL_PATTERN).unwrap();
        let urls: Vec<String> = extract_ad_urls(html, &page_url(), &pattern)
            .unwrap()
            .into_iter()
            .collect();

        assert_eq!(
            urls,
            vec![
                "https://ile-de-france.example.com/annonce-val-de-marne-vincennes/411049-appartement".to_string(),
                "https://other.example.com/ANNONCE-essonne-evry/12-maison".to_string(),
            ]
        );
    }

    #[test]
    fn test_next_page_prefers_rel_next() {
        let html = r#"<a href="?page=9">Page suivante</a><a rel="nofollow next" href="?page=2">2</a>"#;
        assert_eq!(
            find_next_page_url(html, &page_url()).unwrap().as_deref(),
            Some("https://ile-de-france.example.com/annonces/vente/maison/?page=2")
        );
    }

    #[test]
    fn test_next_page_falls_back_to_text_then_class() {
        let html = r#"<a class="pager-next" href="p3">»</a><a href="p2">Suivant</a>"#;
        assert_eq!(
            find_next_page_url(html, &page_url()).unwrap().as_deref(),
            Some("https://ile-de-france.example.com/annonces/vente/maison/p2")
        );

        let html = r#"<a id="nextLink" href="/annonces/vente/maison/p3">»</a>"#;
        assert_eq!(
            find_next_page_url(html, &page_url()).unwrap().as_deref(),
            Some("https://ile-de-france.example.com/annonces/vente/maison/p3")
        );

        assert_eq!(find_next_page_url("<a href='/x'>x</a>", &page_url()).unwrap(), None);
    }
}
