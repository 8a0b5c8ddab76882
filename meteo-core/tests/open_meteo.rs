//! End-to-end tests against a local stand-in for the Open-Meteo API.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{Router, extract::Query, http::StatusCode, routing::get};
use meteo_core::{
    ErrorKind, FetchError, Fetcher, Location, LocationGroup, OpenMeteoProvider, Orchestrator,
    aggregate, group_key, report,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
    time::Instant,
};

type Params = Query<HashMap<String, String>>;

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    format!("http://{addr}")
}

async fn serve_forecast<H, T>(handler: H) -> Arc<OpenMeteoProvider>
where
    H: axum::handler::Handler<T, ()>,
    T: 'static,
{
    let base = serve(Router::new().route("/v1/forecast", get(handler))).await;
    Arc::new(OpenMeteoProvider::new(&base))
}

/// Answers every connection with `response` verbatim, then closes it.
async fn serve_raw(response: &'static str) -> Arc<OpenMeteoProvider> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind raw server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    Arc::new(OpenMeteoProvider::new(&format!("http://{addr}")))
}

/// 15.3 °C for Berlin's latitude, HTTP 500 for latitude 0.5, latitude echoed otherwise.
async fn by_latitude(Query(params): Params) -> (StatusCode, String) {
    if !params.contains_key("longitude") || !params.contains_key("current") {
        return (StatusCode::BAD_REQUEST, "missing query parameter".to_string());
    }
    match params.get("latitude").map(String::as_str) {
        Some("52.52") => (
            StatusCode::OK,
            r#"{"current": {"temperature_2m": 15.3}}"#.to_string(),
        ),
        Some("0.5") => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        ),
        Some(lat) => (
            StatusCode::OK,
            format!(r#"{{"current": {{"temperature_2m": {lat}}}}}"#),
        ),
        None => (StatusCode::BAD_REQUEST, "missing latitude".to_string()),
    }
}

fn deadline_in(ms: u64) -> Instant {
    Instant::now() + Duration::from_millis(ms)
}

fn berlin() -> Location {
    Location::new("Berlin", 52.52, 13.41)
}

#[tokio::test]
async fn fetch_success_decodes_temperature() {
    let fetcher = Fetcher::new(serve_forecast(by_latitude).await);

    let result = fetcher.fetch(berlin(), deadline_in(5_000)).await;

    assert_eq!(result.location.name, "Berlin");
    assert_eq!(result.temperature(), Some(15.3));
    assert!(result.error().is_none());
    assert!(result.elapsed > Duration::ZERO);
}

#[tokio::test]
async fn server_error_becomes_status_failure() {
    let fetcher = Fetcher::new(serve_forecast(by_latitude).await);

    let result = fetcher
        .fetch(Location::new("TestCity", 0.5, 0.0), deadline_in(5_000))
        .await;

    match result.error() {
        Some(FetchError::Status { status, body }) => {
            assert_eq!(*status, 500);
            assert_eq!(body, "Internal Server Error");
        }
        other => panic!("expected status error, got {other:?}"),
    }
    assert!(result.elapsed > Duration::ZERO);
}

#[tokio::test]
async fn server_error_with_truncated_body_is_still_a_status_failure() {
    let provider = serve_raw(
        "HTTP/1.1 503 Service Unavailable\r\n\
         Content-Type: text/plain\r\n\
         Content-Length: 100\r\n\
         Connection: close\r\n\
         \r\n\
         short",
    )
    .await;
    let fetcher = Fetcher::new(provider);

    let result = fetcher.fetch(berlin(), deadline_in(5_000)).await;

    assert_eq!(
        result.error().map(FetchError::kind),
        Some(ErrorKind::Status)
    );
    assert!(matches!(
        result.error(),
        Some(FetchError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn invalid_json_becomes_decode_failure() {
    let fetcher = Fetcher::new(serve_forecast(|| async { "invalid json {" }).await);

    let result = fetcher.fetch(berlin(), deadline_in(5_000)).await;

    assert_eq!(
        result.error().map(FetchError::kind),
        Some(ErrorKind::Decode)
    );
}

#[tokio::test]
async fn empty_body_becomes_decode_failure() {
    let fetcher = Fetcher::new(serve_forecast(|| async { "" }).await);

    let result = fetcher.fetch(berlin(), deadline_in(5_000)).await;

    assert!(matches!(result.error(), Some(FetchError::Decode(_))));
}

#[tokio::test]
async fn missing_temperature_becomes_decode_failure() {
    let hourly_only = || async { r#"{"hourly": {"temperature_2m": []}}"# };
    let fetcher = Fetcher::new(serve_forecast(hourly_only).await);

    let result = fetcher.fetch(berlin(), deadline_in(5_000)).await;

    assert!(matches!(result.error(), Some(FetchError::Decode(_))));
}

#[tokio::test]
async fn unreachable_server_becomes_transport_failure() {
    // bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let provider = OpenMeteoProvider::new(&format!("http://{addr}"));
    let fetcher = Fetcher::new(Arc::new(provider));
    let result = fetcher.fetch(berlin(), deadline_in(5_000)).await;

    assert!(matches!(result.error(), Some(FetchError::Transport(_))));
}

#[tokio::test]
async fn slow_endpoint_is_cut_off_at_deadline() {
    let slow = || async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        r#"{"current": {"temperature_2m": 15.3}}"#
    };
    let fetcher = Fetcher::new(serve_forecast(slow).await);

    let started = Instant::now();
    let result = fetcher.fetch(berlin(), deadline_in(100)).await;

    assert!(result.error().is_some_and(FetchError::is_deadline));
    assert!(started.elapsed() < Duration::from_millis(1_000));
}

#[tokio::test]
async fn fan_out_isolates_the_failing_location() {
    let orchestrator = Orchestrator::new(serve_forecast(by_latitude).await);
    let locations = vec![
        Location::new("A", 10.0, 0.0),
        Location::new("B", 20.0, 0.0),
        Location::new("Broken", 0.5, 0.0),
        Location::new("C", 30.0, 0.0),
        Location::new("D", 40.0, 0.0),
    ];

    let results = orchestrator.fetch_all(locations, deadline_in(5_000)).await;

    assert_eq!(results.len(), 5);
    let names: Vec<_> = results.iter().map(|r| r.location.name.as_str()).collect();
    assert_eq!(names, ["A", "B", "Broken", "C", "D"]);

    let temps: Vec<_> = results.iter().map(|r| r.temperature()).collect();
    assert_eq!(
        temps,
        [Some(10.0), Some(20.0), None, Some(30.0), Some(40.0)]
    );
    assert_eq!(
        results[2].error().map(FetchError::kind),
        Some(ErrorKind::Status)
    );
}

#[tokio::test]
async fn report_for_one_success_and_one_failure() {
    let orchestrator = Orchestrator::new(serve_forecast(by_latitude).await);
    let groups = vec![LocationGroup {
        name: "Europe".into(),
        locations: vec![berlin(), Location::new("Broken", 0.5, 0.0)],
    }];

    let grouped = orchestrator.fetch_grouped(groups, deadline_in(5_000)).await;

    let successes: Vec<_> = grouped
        .results
        .iter()
        .filter_map(|r| r.temperature())
        .collect();
    assert_eq!(successes, [15.3]);
    assert_eq!(
        grouped.results.iter().filter(|r| !r.is_success()).count(),
        1
    );

    let stats = aggregate(&grouped.results, group_key, &grouped.durations);
    let europe = &stats["Europe"];
    assert_eq!(europe.temperature.map(|t| t.avg), Some(15.3));
    assert!(europe.wall_time.is_some());

    let rendered = report::render(&stats, &grouped.results, group_key);
    assert!(rendered.contains("Group: Europe"));
    assert!(rendered.contains("Avg: 15.30 °C"));
    assert!(!rendered.contains("No valid temperature data"));
    assert!(rendered.contains("Broken: ERROR: API returned status 500"));
}

#[tokio::test]
async fn report_flags_group_where_everything_failed() {
    let orchestrator = Orchestrator::new(serve_forecast(by_latitude).await);
    let groups = vec![LocationGroup {
        name: "Nowhere".into(),
        locations: vec![Location::new("X", 0.5, 0.0), Location::new("Y", 0.5, 1.0)],
    }];

    let grouped = orchestrator.fetch_grouped(groups, deadline_in(5_000)).await;
    let stats = aggregate(&grouped.results, group_key, &grouped.durations);
    let rendered = report::render(&stats, &grouped.results, group_key);

    assert_eq!(stats["Nowhere"].valid, 0);
    assert!(rendered.contains("No valid temperature data"));
    assert_eq!(rendered.matches("ERROR:").count(), 2);
}
