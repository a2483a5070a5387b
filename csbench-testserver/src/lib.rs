use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha1::Sha1;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

mod cloud;

pub use cloud::{
    AccountRec, ApiFault, Cloud, DomainRec, JOB_FAILED, JOB_PENDING, JOB_SUCCEEDED, NetworkRec,
    VmRec, VolumeRec,
};

pub const PATH_API: &str = "/client/api";
pub const DEFAULT_API_KEY: &str = "csbench-api-key";
pub const DEFAULT_SECRET_KEY: &str = "csbench-secret-key";

/// Error code sent for commands listed in [`TestServerOptions::failing_commands`].
pub const SCRIPTED_ERROR_CODE: u16 = 431;

type HmacSha1 = Hmac<Sha1>;

#[derive(Debug, Clone)]
pub struct TestServerOptions {
    /// `apiKey` to secret pairs accepted by the signature check.
    pub credentials: HashMap<String, String>,
    /// Commands answered with an error regardless of their parameters.
    pub failing_commands: HashSet<String>,
    /// `count` reported for commands the in-memory cloud does not model.
    pub canned_count: u64,
    pub latency: Option<Duration>,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            credentials: HashMap::from([(
                DEFAULT_API_KEY.to_string(),
                DEFAULT_SECRET_KEY.to_string(),
            )]),
            failing_commands: HashSet::new(),
            canned_count: 1,
            latency: None,
        }
    }
}

impl TestServerOptions {
    pub fn with_credentials(mut self, api_key: &str, secret_key: &str) -> Self {
        self.credentials
            .insert(api_key.to_string(), secret_key.to_string());
        self
    }

    pub fn with_failing_command(mut self, command: &str) -> Self {
        self.failing_commands.insert(command.to_string());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    signature_failures: Arc<AtomicU64>,
    errors_sent: Arc<AtomicU64>,
    commands: Arc<Mutex<BTreeMap<String, u64>>>,
}

impl TestServerStats {
    fn inc_requests_total(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_signature_failures(&self) {
        self.signature_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_errors_sent(&self) {
        self.errors_sent.fetch_add(1, Ordering::Relaxed);
    }

    fn inc_command(&self, command: &str) {
        let mut commands = self.commands.lock().unwrap_or_else(|p| p.into_inner());
        *commands.entry(command.to_string()).or_default() += 1;
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn signature_failures(&self) -> u64 {
        self.signature_failures.load(Ordering::Relaxed)
    }

    pub fn errors_sent(&self) -> u64 {
        self.errors_sent.load(Ordering::Relaxed)
    }

    /// Requests seen for `command` that passed the signature check.
    pub fn command(&self, command: &str) -> u64 {
        let commands = self.commands.lock().unwrap_or_else(|p| p.into_inner());
        commands.get(command).copied().unwrap_or(0)
    }
}

/// Shared handle on the in-memory cloud, for seeding and assertions.
#[derive(Debug, Clone, Default)]
pub struct CloudHandle(Arc<Mutex<Cloud>>);

impl CloudHandle {
    pub fn lock(&self) -> MutexGuard<'_, Cloud> {
        self.0.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[derive(Debug, Clone)]
struct AppState {
    options: Arc<TestServerOptions>,
    stats: TestServerStats,
    cloud: CloudHandle,
}

pub fn router(options: TestServerOptions, stats: TestServerStats, cloud: CloudHandle) -> Router {
    let state = AppState {
        options: Arc::new(options),
        stats,
        cloud,
    };
    Router::new()
        .route(PATH_API, any(handle_api))
        .route(&format!("{PATH_API}/"), any(handle_api))
        .with_state(state)
}

/// Accepts parameters from the query string and from a form body.
async fn handle_api(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    state.stats.inc_requests_total();
    if let Some(latency) = state.options.latency {
        sleep(latency).await;
    }

    let mut params: BTreeMap<String, String> = BTreeMap::new();
    if let Some(query) = query {
        params.extend(url::form_urlencoded::parse(query.as_bytes()).into_owned());
    }
    params.extend(url::form_urlencoded::parse(&body).into_owned());

    let command = params.get("command").cloned().unwrap_or_default();
    let key = format!("{}response", command.to_lowercase());

    if !verify_signature(&state.options, &params) {
        state.stats.inc_signature_failures();
        return error_response(
            &state.stats,
            &key,
            401,
            "unable to verify user credentials and/or request signature",
        );
    }
    state.stats.inc_command(&command);

    if state.options.failing_commands.contains(&command) {
        return error_response(
            &state.stats,
            &key,
            SCRIPTED_ERROR_CODE,
            &format!("scripted failure for {command}"),
        );
    }

    let handled = state.cloud.lock().handle(&command, &params);
    match handled {
        Some(Ok(body)) => (StatusCode::OK, axum::Json(json!({ key: body }))).into_response(),
        Some(Err(fault)) => error_response(&state.stats, &key, fault.status, &fault.text),
        None => {
            let body = json!({ key: { "count": state.options.canned_count } });
            (StatusCode::OK, axum::Json(body)).into_response()
        }
    }
}

fn error_response(stats: &TestServerStats, key: &str, code: u16, text: &str) -> Response {
    stats.inc_errors_sent();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    let body = json!({ key: { "errorcode": code, "errortext": text } });
    (status, axum::Json(body)).into_response()
}

fn verify_signature(options: &TestServerOptions, params: &BTreeMap<String, String>) -> bool {
    let (Some(api_key), Some(signature)) = (params.get("apiKey"), params.get("signature")) else {
        return false;
    };
    let Some(secret) = options.credentials.get(api_key) else {
        return false;
    };

    let mut ser = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in params.iter().filter(|(k, _)| k.as_str() != "signature") {
        ser.append_pair(k, v);
    }
    let canonical = ser.finish().replace('+', "%20").to_lowercase();

    let Ok(mut mac) = HmacSha1::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(canonical.as_bytes());
    let Ok(expected) = STANDARD.decode(signature) else {
        return false;
    };
    mac.verify_slice(&expected).is_ok()
}

#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    cloud: CloudHandle,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(TestServerOptions::default()).await
    }

    pub async fn start_with(options: TestServerOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let cloud = CloudHandle::default();

        let app = router(options, stats.clone(), cloud.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            cloud,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_url(&self) -> String {
        format!("{}{PATH_API}", self.base_url)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub fn cloud(&self) -> &CloudHandle {
        &self.cloud
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
