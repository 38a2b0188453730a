//! Control surface for instadoc.
//!
//! Serves the fixture lifecycle routes over HTTP on top of an
//! [`Orchestrator`], and wires a whole instance together at startup: an
//! ephemeral store on the database port, then the control server on the REST
//! port.
//!
//! The [`TestServer`] helper starts both on random ports for integration
//! testing.

pub mod config;

pub use config::{ConfigError, FileConfig, InitialFixture, Overrides, Settings};

use instadoc_core::{CollectionParams, CoreError, FixtureParams, OperationError, Orchestrator};
use instadoc_store::{EphemeralStore, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to start database server: {0}")]
    Store(#[from] StoreError),
    #[error("failed to connect to database server: {0}")]
    Connect(#[from] CoreError),
    #[error("failed to bind REST server on {addr}: {reason}")]
    Bind { addr: String, reason: String },
    #[error("initial fixture load failed: {0}")]
    InitialLoad(#[source] OperationError),
}

/// Routes of the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRoute {
    IsAlive,
    LoadFixture,
    UnloadFixture,
    DropCollection,
    GetCollection,
}

impl ControlRoute {
    pub fn parse(path: &str) -> Option<Self> {
        match path {
            "/is-alive" => Some(Self::IsAlive),
            "/load-fixture" => Some(Self::LoadFixture),
            "/unload-fixture" => Some(Self::UnloadFixture),
            "/drop-collection" => Some(Self::DropCollection),
            "/get-collection" => Some(Self::GetCollection),
            _ => None,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::IsAlive => "/is-alive",
            Self::LoadFixture => "/load-fixture",
            Self::UnloadFixture => "/unload-fixture",
            Self::DropCollection => "/drop-collection",
            Self::GetCollection => "/get-collection",
        }
    }
}

/// Split a request target into path and raw query string.
pub fn split_url(url: &str) -> (&str, &str) {
    url.split_once('?').unwrap_or((url, ""))
}

/// Percent-decode a query string into typed parameters. Unknown keys are
/// ignored.
pub fn parse_query<T: DeserializeOwned>(query: &str) -> Result<T, String> {
    serde_urlencoded::from_str(query).map_err(|e| format!("invalid query string: {e}"))
}

fn respond_err(req: tiny_http::Request, code: u16, msg: &str) {
    let _ = req.respond(Response::from_string(msg).with_status_code(StatusCode(code)));
}

fn respond_ok(req: tiny_http::Request) {
    let _ = req.respond(Response::empty(200));
}

fn respond_json(req: tiny_http::Request, value: &impl Serialize) {
    match serde_json::to_vec(value) {
        Ok(body) => {
            let header =
                Header::from_bytes("Content-Type", "application/json").expect("valid header");
            let _ = req.respond(Response::from_data(body).with_header(header));
        }
        Err(e) => {
            error!("failed to encode response: {e}");
            respond_err(req, 500, "encode error");
        }
    }
}

fn rejection(route: ControlRoute, reason: &str) -> String {
    format!("{} rejected: {reason}", route.path())
}

fn respond_rejected(req: tiny_http::Request, route: ControlRoute, msg: &str) {
    warn!("{}", rejection(route, msg));
    respond_err(req, 400, msg);
}

fn respond_failure(req: tiny_http::Request, route: ControlRoute, err: &OperationError) {
    let msg = err.to_string();
    if err.is_invalid() {
        warn!("{}", rejection(route, &msg));
    }
    respond_err(req, 400, &msg);
}

/// Handle a single control-surface request.
pub fn handle_request(orch: &Orchestrator, req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    let (path, query) = split_url(&url);
    let Some(route) = ControlRoute::parse(path) else {
        respond_err(req, 404, "not found");
        return;
    };
    if method != Method::Get {
        respond_err(req, 405, "method not allowed");
        return;
    }

    match route {
        ControlRoute::IsAlive => respond_json(req, &serde_json::json!({ "ok": true })),
        ControlRoute::LoadFixture | ControlRoute::UnloadFixture => {
            let params: FixtureParams = match parse_query(query) {
                Ok(p) => p,
                Err(msg) => return respond_rejected(req, route, &msg),
            };
            let result = if route == ControlRoute::LoadFixture {
                orch.load_fixture(&params).map(|_| ())
            } else {
                orch.unload_fixture(&params).map(|_| ())
            };
            match result {
                Ok(()) => respond_ok(req),
                Err(e) => respond_failure(req, route, &e),
            }
        }
        ControlRoute::DropCollection | ControlRoute::GetCollection => {
            let params: CollectionParams = match parse_query(query) {
                Ok(p) => p,
                Err(msg) => return respond_rejected(req, route, &msg),
            };
            if route == ControlRoute::DropCollection {
                match orch.drop_collection(&params) {
                    Ok(_) => respond_ok(req),
                    Err(e) => respond_failure(req, route, &e),
                }
            } else {
                match orch.get_collection(&params) {
                    Ok(docs) => respond_json(req, &docs),
                    Err(e) => respond_failure(req, route, &e),
                }
            }
        }
    }
}

/// The control surface, served by a pool of worker threads.
///
/// Dropping it stops the workers.
pub struct ControlServer {
    url: String,
    port: u16,
    server: Arc<Server>,
    workers: Vec<JoinHandle<()>>,
}

impl ControlServer {
    pub fn start(
        addr: &str,
        orch: &Arc<Orchestrator>,
        workers: usize,
    ) -> Result<Self, StartupError> {
        let server = Server::http(addr).map_err(|e| StartupError::Bind {
            addr: addr.to_owned(),
            reason: e.to_string(),
        })?;
        let server = Arc::new(server);
        let port = server.server_addr().to_ip().map_or(0, |a| a.port());
        let url = format!("http://localhost:{port}");

        let workers = (0..workers.max(1))
            .map(|_| {
                let srv = Arc::clone(&server);
                let orch = Arc::clone(orch);
                std::thread::spawn(move || {
                    for request in srv.incoming_requests() {
                        handle_request(&orch, request);
                    }
                })
            })
            .collect();

        Ok(Self {
            url,
            port,
            server,
            workers,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        for _ in &self.workers {
            self.server.unblock();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        debug!("REST server on port {} stopped", self.port);
    }
}

/// A running instance: store plus control surface.
///
/// Field order matters: the control server stops before the store.
pub struct Instance {
    control: ControlServer,
    store: EphemeralStore,
    orchestrator: Arc<Orchestrator>,
}

impl Instance {
    /// Start the store, load the initial fixture if any, then start serving
    /// the control surface.
    pub fn start(settings: &Settings) -> Result<Self, StartupError> {
        let store = EphemeralStore::start(settings.db_port, settings.workers)?;
        info!("database server is running at: {}", store.uri());

        let orchestrator = Arc::new(Orchestrator::connect(store.uri(), &settings.fixtures)?);
        info!("fixtures directory: {}", settings.fixtures.display());

        if let Some(initial) = &settings.initial {
            let params = FixtureParams::new(&initial.database, &initial.fixture);
            orchestrator
                .load_fixture(&params)
                .map_err(StartupError::InitialLoad)?;
        }

        let addr = format!("0.0.0.0:{}", settings.rest_port);
        let control = ControlServer::start(&addr, &orchestrator, settings.workers)?;
        log_usage(control.url());

        Ok(Self {
            control,
            store,
            orchestrator,
        })
    }

    pub fn store(&self) -> &EphemeralStore {
        &self.store
    }

    pub fn control(&self) -> &ControlServer {
        &self.control
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }
}

fn log_usage(url: &str) {
    info!("REST server is running at: {url}");
    info!("  {url}/is-alive");
    info!("  {url}/load-fixture?db=<database-name>&fix=<fixture-name>");
    info!("  {url}/unload-fixture?db=<database-name>&fix=<fixture-name>");
    info!("  {url}/drop-collection?db=<database-name>&col=<collection-name>");
    info!("  {url}/get-collection?db=<database-name>&col=<collection-name>");
}

/// A test helper that starts a store and a control server on random ports.
///
/// Both listen on `127.0.0.1`. Drop the `TestServer` to stop them.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub fixtures: PathBuf,
    control: ControlServer,
    store: EphemeralStore,
}

impl TestServer {
    /// Start a test server serving fixtures from `fixtures`.
    pub fn start(fixtures: PathBuf) -> Self {
        let store = EphemeralStore::start(0, 2).expect("failed to start test store");
        let orch = Arc::new(
            Orchestrator::connect(store.uri(), &fixtures).expect("failed to connect test store"),
        );
        let control = ControlServer::start("127.0.0.1:0", &orch, 2)
            .expect("failed to bind test HTTP server");
        let port = control.port();

        Self {
            url: format!("http://127.0.0.1:{port}"),
            port,
            fixtures,
            control,
            store,
        }
    }

    pub fn store(&self) -> &EphemeralStore {
        &self.store
    }

    pub fn control(&self) -> &ControlServer {
        &self.control
    }
}
