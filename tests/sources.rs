//! End-to-end scraping against a local mock server.

use std::sync::Arc;

use vodostaj::error::AppError;
use vodostaj::models::{Config, Tendency};
use vodostaj::pipeline::{RefreshOutcome, Refresher};
use vodostaj::services::{RecordSource, SourceSet};
use vodostaj::storage::{RiverRepository, SqliteRepository};
use vodostaj::utils::http;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BULLETIN: &str = r#"<html><body>
<div class="col-md-12"><h4>Хидролошки подаци: ПЕТАК 18.04.2025. време: 8:00 (06:00 UTC)</h4></div>
<table><tbody>
  <tr>
    <td>ДУНАВ</td><td>42010</td><td><a href="/st?id=42010">БЕЗДАН</a></td><td>0</td><td>80.97</td>
    <td>312</td><td>-4</td><td>2150</td><td>12.4</td><td><img alt="опада" src="o.gif"></td>
  </tr>
  <tr>
    <td>САВА</td><td>42030</td><td><a href="/st?id=42030">ШАБАЦ</a></td><td>0</td><td>72.0</td>
    <td>190</td><td>+1</td><td>-</td><td>-</td><td><img alt="стагнација" src="s.gif"></td>
  </tr>
</tbody></table>
</body></html>"#;

const SERIES: &str = r#"<table>
  <tr><td>Датум и време</td><td>Водостај</td></tr>
  <tr><td>18.04.2025 07:00</td><td>41</td></tr>
  <tr><td>18.04.2025 06:00</td><td>40</td></tr>
</table>"#;

const LISTING: &str = r#"<ul>
  <li><a href="/bilten/2025-04-20">Редован хидролошки билтен 20.04.2025.</a></li>
</ul>"#;

const REGIONAL: &str = r#"<table>
  <tr><td>НА ДАН 20.04.2025. ГОДИНЕ, У 7:00 ЧАСОВА</td></tr>
  <tr><td>РИЈЕКА</td><td>СТАНИЦА</td><td>КОТА</td><td>H</td><td>ΔH</td><td>T</td><td>Q</td><td>Т</td></tr>
  <tr><td rowspan="2">ДРИНА</td><td>ФОЧА</td><td>0</td><td>145</td><td>-3</td><td>9.5</td><td>88</td><td>▼</td></tr>
  <tr><td>ГОРАЖДЕ</td><td>0</td><td>201</td><td>+2</td><td>-</td><td>-</td><td>▲</td></tr>
</table>"#;

async fn mount(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Default configuration with every source pointed at the mock server.
fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.sources.bulletin.url = format!("{}/bulletin", server.uri());
    config.sources.stations[0].url = format!("{}/series?hm_id=45902&period=7", server.uri());
    config.sources.regional.listing_url = format!("{}/listing", server.uri());
    config
}

fn sources_for(config: &Config) -> SourceSet {
    let client = http::create_async_client(&config.http).unwrap();
    SourceSet::from_config(config, &client).unwrap()
}

#[tokio::test]
async fn test_every_adapter_against_mock_server() {
    let server = MockServer::start().await;
    mount(&server, "/bulletin", 200, BULLETIN).await;
    mount(&server, "/series", 200, SERIES).await;
    mount(&server, "/listing", 200, LISTING).await;
    mount(&server, "/bilten/2025-04-20", 200, REGIONAL).await;

    let sources = sources_for(&config_for(&server));

    let primary = sources.primary.fetch().await.unwrap();
    assert_eq!(primary.len(), 2);
    assert_eq!(primary[1].tendency, Some(Tendency::Stable));
    assert_eq!(primary[1].discharge, "");

    let series = sources.secondary[0].fetch().await.unwrap();
    let levels: Vec<&str> = series.iter().map(|r| r.water_level.as_str()).collect();
    assert_eq!(levels, vec!["40", "41"]);

    let regional = sources.secondary[1].fetch().await.unwrap();
    let stations: Vec<(&str, &str)> = regional
        .iter()
        .map(|r| (r.river.as_str(), r.station.as_str()))
        .collect();
    assert_eq!(stations, vec![("ДРИНА", "ФОЧА"), ("ДРИНА", "ГОРАЖДЕ")]);
}

#[tokio::test]
async fn test_non_success_status_is_fetch_error() {
    let server = MockServer::start().await;
    mount(&server, "/bulletin", 503, "maintenance").await;

    let sources = sources_for(&config_for(&server));
    let err = sources.primary.fetch().await.unwrap_err();
    match err {
        AppError::Fetch { url, status } => {
            assert_eq!(status, 503);
            assert!(url.ends_with("/bulletin"));
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_listing_without_bulletin_link_is_discovery_error() {
    let server = MockServer::start().await;
    mount(&server, "/listing", 200, r#"<a href="/x">Хидролошка прогноза</a>"#).await;

    let sources = sources_for(&config_for(&server));
    let err = sources.secondary[1].fetch().await.unwrap_err();
    assert!(matches!(err, AppError::Discovery(_)));
}

#[tokio::test]
async fn test_refresh_into_database_file() {
    let server = MockServer::start().await;
    mount(&server, "/bulletin", 200, BULLETIN).await;
    mount(&server, "/series", 200, SERIES).await;
    // regional listing is not mounted and answers 404

    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&server);
    config.storage.database_path = dir.path().join("data").join("riverdata.db");

    let repo = Arc::new(SqliteRepository::open(&config.storage.database_path).await.unwrap());
    let refresher = Refresher::new(sources_for(&config), repo.clone());

    let RefreshOutcome::Completed(report) = refresher.refresh().await.unwrap() else {
        panic!("refresh was skipped");
    };
    assert_eq!(report.primary_count, 2);
    assert_eq!(report.saved, 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "regional");

    // a second identical refresh updates in place
    refresher.refresh().await.unwrap();

    assert_eq!(
        repo.get_unique_rivers().await.unwrap(),
        vec!["ГРАДАЦ", "ДУНАВ", "САВА"]
    );
    let gradac = repo.get_by_river_name("ГРАДАЦ").await.unwrap();
    assert_eq!(gradac.len(), 1);
    assert_eq!(gradac[0].water_level, "41");

    let last = repo.get_last_update_time().await.unwrap().unwrap();
    assert_eq!(last.to_rfc3339(), "2025-04-18T07:00:00+00:00");
}
