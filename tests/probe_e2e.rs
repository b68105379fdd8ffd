use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use probespeed::{
    ChannelHandler, Direction, ProbeResult, ProbeState, ResultsToFile, Settings, TrafficGenerator,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::time::{sleep, Duration, Instant};

const MB: u64 = 1_000_000;

struct TestServer {
    base: String,
    uploads: Arc<AtomicUsize>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

async fn spawn_server() -> TestServer {
    let uploads = Arc::new(AtomicUsize::new(0));
    let counter = uploads.clone();

    let app = Router::new()
        .route(
            "/up",
            post(move |body: Bytes| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    body.len().to_string()
                }
            }),
        )
        .route(
            "/testfiles/:size",
            get(|Path(size): Path<usize>| async move { vec![0x5au8; size] }),
        )
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .layer(DefaultBodyLimit::disable());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base: format!("http://{addr}"),
        uploads,
    }
}

/// Polls the generator the way a caller without a handler would.
async fn poll_until_idle(tg: &TrafficGenerator) -> ProbeResult {
    let deadline = Instant::now() + Duration::from_secs(30);
    while tg.is_busy() {
        assert!(Instant::now() < deadline, "probe did not finish in time");
        sleep(Duration::from_millis(100)).await;
    }
    tg.status()
}

fn assert_fresh(tg: &TrafficGenerator) {
    assert!(!tg.is_busy());
    let res = tg.status();
    assert_eq!(res.state, ProbeState::Undefined);
    assert_eq!(res.datarate_dl, 0.0);
    assert_eq!(res.datarate_ul, 0.0);
    assert_eq!(res.total_transfer_time, 0.0);
    assert_eq!(res.payload_size, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_reaches_finished() {
    let server = spawn_server().await;
    let tg = TrafficGenerator::new();
    assert_fresh(&tg);

    assert!(tg.perform_upload(MB, &server.url("/up")));
    let res = poll_until_idle(&tg).await;

    assert_eq!(res.state, ProbeState::Finished);
    assert!(res.datarate_ul > 0.0);
    assert_eq!(res.datarate_dl, 0.0);
    assert!(res.total_transfer_time > 0.0);
    assert_eq!(res.payload_size, MB);
    tg.cleanup().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_upload_split_into_requests() {
    let server = spawn_server().await;
    let settings = Settings {
        upload_chunk_bytes: 250_000,
        ..Settings::default()
    };
    let tg = TrafficGenerator::with_settings(&settings);

    assert!(tg.perform_upload(MB, &server.url("/up")));
    let res = poll_until_idle(&tg).await;

    assert_eq!(res.state, ProbeState::Finished);
    assert_eq!(res.payload_size, MB);
    assert_eq!(server.uploads.load(Ordering::SeqCst), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_smaller_than_budget_completes_naturally() {
    let server = spawn_server().await;
    let tg = TrafficGenerator::new();
    assert_fresh(&tg);

    assert!(tg.perform_download(20 * MB, &server.url("/testfiles/1000000")));
    let res = poll_until_idle(&tg).await;

    assert_eq!(res.state, ProbeState::Finished);
    assert_eq!(res.payload_size, MB);
    assert!(res.datarate_dl > 0.0);
    assert_eq!(res.datarate_ul, 0.0);
    tg.cleanup().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_truncated_at_budget() {
    let server = spawn_server().await;
    let tg = TrafficGenerator::new();

    assert!(tg.perform_download(MB, &server.url("/testfiles/20000000")));
    let res = poll_until_idle(&tg).await;

    assert_eq!(res.state, ProbeState::Finished);
    assert!(res.payload_size >= MB);
    assert!(res.payload_size < 20 * MB);
    assert!(res.datarate_dl > 0.0);
    tg.cleanup().unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_download_results_saved_to_file() {
    let server = spawn_server().await;
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("results.txt");

    let tg = TrafficGenerator::new();
    let sink = Arc::new(ResultsToFile::new(&path));
    tg.set_event_handler(sink.clone());

    assert!(tg.perform_download(20 * MB, &server.url("/testfiles/1000000")));
    let res = poll_until_idle(&tg).await;
    tg.cleanup().unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 1);

    let saved = ProbeResult::from_csv(lines[0], ',').unwrap();
    assert_eq!(saved.state, res.state);
    assert!((saved.datarate_dl - res.datarate_dl).abs() < 1e-5);
    assert!((saved.datarate_ul - res.datarate_ul).abs() < 1e-5);
    assert!((saved.total_transfer_time - res.total_transfer_time).abs() < 1e-5);
    assert_eq!(saved.payload_size, res.payload_size);
    assert_eq!(sink.failures(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_channel_handler_receives_each_probe() {
    let server = spawn_server().await;
    let (handler, mut rx) = ChannelHandler::channel();
    let tg = TrafficGenerator::new();
    tg.set_event_handler(Arc::new(handler));

    assert!(tg.perform_download(MB, &server.url("/testfiles/1000")));
    let first = poll_until_idle(&tg).await;
    tg.cleanup().unwrap();
    assert!(tg.perform_upload(1_000, &server.url("/up")));
    let second = poll_until_idle(&tg).await;
    tg.cleanup().unwrap();

    let (request, result) = rx.recv().await.unwrap();
    assert_eq!(request.direction, Direction::Download);
    assert_eq!(result, first);
    let (request, result) = rx.recv().await.unwrap();
    assert_eq!(request.direction, Direction::Upload);
    assert_eq!(result, second);
    assert!(rx.try_recv().is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_http_error_status_is_error_state() {
    let server = spawn_server().await;
    let tg = TrafficGenerator::new();

    assert!(tg.perform_download(MB, &server.url("/missing")));
    let res = poll_until_idle(&tg).await;

    assert_eq!(res.state, ProbeState::Error);
    assert_eq!(res.payload_size, 0);
    assert_eq!(res.datarate_dl, 0.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_refused_is_error_state() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let tg = TrafficGenerator::new();

    assert!(tg.perform_upload(1_000, &format!("http://127.0.0.1:{port}/up")));
    let res = poll_until_idle(&tg).await;

    assert_eq!(res.state, ProbeState::Error);
    assert_eq!(res.datarate_ul, 0.0);
    assert!(!tg.is_busy());
    tg.cleanup().unwrap();
}
