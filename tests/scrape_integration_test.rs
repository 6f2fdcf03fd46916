use httpmock::prelude::*;
use immo_etl::config::toml_config::ScrapeConfig;
use immo_etl::{EtlEngine, HttpFetcher, LocalStorage, ScrapePipeline};
use tempfile::TempDir;

fn ad_page(kind: &str, price: &str, location: &str, surface: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><script>var tracking = {{"price": "1 €", "city": "France, A, B, Nulle part"}};</script></head>
<body>
  <h1>{kind} à vendre</h1>
  <div class="prix">{price}&nbsp;€</div>
  <p>{location}</p>
  <section>
    <h2>Détails De La Propriété</h2>
    <table>
      <tr><td>Type</td><td>{kind}</td></tr>
      <tr><td>Surface</td><td>{surface}</td></tr>
      <tr><td>Nb. de pièces</td><td>4</td></tr>
      <tr><td>Nb. de chambres</td><td>2</td></tr>
      <tr><td>Nb. de salles de bains</td><td>1</td></tr>
      <tr><td>DPE</td><td>e</td></tr>
    </table>
  </section>
</body>
</html>"#
    )
}

fn results_page(ads: &[&str], next: Option<&str>) -> String {
    let mut body = String::from("<html><body><ul>");
    for ad in ads {
        body.push_str(&format!(r#"<li><a href="{}">Voir l'annonce</a></li>"#, ad));
    }
    body.push_str("</ul>");
    if let Some(next) = next {
        body.push_str(&format!(r#"<a class="pagination" href="{}">Page suivante</a>"#, next));
    }
    body.push_str("</body></html>");
    body
}

fn config(server: &MockServer, output: &str, max_pages: usize) -> ScrapeConfig {
    ScrapeConfig {
        start_urls: vec![server.url("/vente/maison/"), server.url("/vente/appartement/")],
        output: output.to_string(),
        max_pages,
        listing_delay_ms: 0,
        ad_delay_ms: 0,
        retry_attempts: 0,
        retry_delay_ms: 1,
        timeout_seconds: 5,
        concurrent_requests: 3,
        ..ScrapeConfig::default()
    }
}

#[tokio::test]
async fn test_crawl_against_http_server() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;

    let houses_p1 = server
        .mock_async(|when, then| {
            when.method(GET).path("/vente/maison/");
            then.status(200).body(results_page(
                &["/annonce-maison-meaux/101", "/annonce-maison-torcy/102"],
                Some("/vente/maison/page-2/"),
            ));
        })
        .await;
    let houses_p2 = server
        .mock_async(|when, then| {
            when.method(GET).path("/vente/maison/page-2/");
            then.status(200).body(results_page(
                &["/annonce-maison-torcy/102", "/annonce-maison-evry/103"],
                None,
            ));
        })
        .await;
    let apartments = server
        .mock_async(|when, then| {
            when.method(GET).path("/vente/appartement/");
            then.status(200).body(results_page(
                &["/annonce-maison-meaux/101", "/annonce-appartement-paris/201"],
                None,
            ));
        })
        .await;

    let meaux = server
        .mock_async(|when, then| {
            when.method(GET).path("/annonce-maison-meaux/101");
            then.status(200).body(ad_page(
                "Maison",
                "350 000",
                "France, Ile-de-France, Seine-et-Marne, Meaux",
                "120 m²",
            ));
        })
        .await;
    let torcy = server
        .mock_async(|when, then| {
            when.method(GET).path("/annonce-maison-torcy/102");
            then.status(200).body(ad_page(
                "Maison",
                "8 000",
                "France, Ile-de-France, Seine-et-Marne, Torcy",
                "60 m²",
            ));
        })
        .await;
    let evry = server
        .mock_async(|when, then| {
            when.method(GET).path("/annonce-maison-evry/103");
            then.status(500);
        })
        .await;
    let paris = server
        .mock_async(|when, then| {
            when.method(GET).path("/annonce-appartement-paris/201");
            then.status(200).body(ad_page(
                "Appartement",
                "412 500",
                "France, Ile-de-France, Paris, Paris 15e Arrondissement",
                "38,5 m²",
            ));
        })
        .await;

    let config = config(&server, "data/raw/ventes.csv", 10);
    let fetcher = HttpFetcher::new(&config).unwrap();
    let storage = LocalStorage::new(temp_dir.path());
    let engine = EtlEngine::new(ScrapePipeline::new(storage, fetcher, config).unwrap());

    let output = engine.run().await.unwrap();
    assert_eq!(output, "data/raw/ventes.csv");

    houses_p1.assert_hits_async(1).await;
    houses_p2.assert_hits_async(1).await;
    apartments.assert_hits_async(1).await;
    meaux.assert_hits_async(1).await;
    torcy.assert_hits_async(1).await;
    evry.assert_hits_async(1).await;
    paris.assert_hits_async(1).await;

    let stats = engine.pipeline().stats();
    assert_eq!(stats.pages, 3);
    assert_eq!(stats.visited, 4);
    assert_eq!(stats.valid, 2);
    assert_eq!(stats.skipped, 2);

    let csv = std::fs::read_to_string(temp_dir.path().join("data/raw/ventes.csv")).unwrap();
    assert_eq!(
        csv,
        "Ville,Type,Surface,NbrPieces,NbrChambres,NbrSdb,DPE,Prix\n\
         Meaux,Maison,120,4,2,1,E,350000\n\
         Paris 15e Arrondissement,Appartement,38,4,2,1,E,412500\n"
    );
}

#[tokio::test]
async fn test_max_pages_limits_each_section() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;

    let first = server
        .mock_async(|when, then| {
            when.method(GET).path("/vente/maison/");
            then.status(200)
                .body(results_page(&[], Some("/vente/maison/page-2/")));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET).path("/vente/maison/page-2/");
            then.status(200).body(results_page(&[], None));
        })
        .await;
    let apartments = server
        .mock_async(|when, then| {
            when.method(GET).path("/vente/appartement/");
            then.status(404);
        })
        .await;

    let config = config(&server, "raw.csv", 1);
    let fetcher = HttpFetcher::new(&config).unwrap();
    let storage = LocalStorage::new(temp_dir.path());
    let engine = EtlEngine::new(ScrapePipeline::new(storage, fetcher, config).unwrap());

    engine.run().await.unwrap();

    first.assert_hits_async(1).await;
    second.assert_hits_async(0).await;
    apartments.assert_hits_async(1).await;
    assert_eq!(engine.pipeline().stats().pages, 1);

    let csv = std::fs::read_to_string(temp_dir.path().join("raw.csv")).unwrap();
    assert_eq!(csv, "Ville,Type,Surface,NbrPieces,NbrChambres,NbrSdb,DPE,Prix\n");
}
