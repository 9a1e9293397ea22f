// Server RPC - Binary HTTP endpoints served with warp
//
// Routes:
//   POST /executor/commit_block   ExecBlock        -> CommitBlockResponse
//   POST /executor/verify_tx      ProtoTransaction -> VerifyResult
//   POST /txpool/submit           ProtoTransaction -> SubmitResult
//   POST /txpool/relay            ProtoTransaction -> SubmitResult

use super::gateway::ConsensusGateway;
use super::types::{CommitBlockResponse, ExecBlock, ProtoTransaction, SubmitResult, VerifyResult};
use crate::execution::ValidationOutcome;
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{Filter, Reply};

// =============================================================================
// RPC SERVER
// =============================================================================

pub struct RpcServer {
    config: RpcConfig,
}

impl RpcServer {
    pub fn new(config: RpcConfig) -> Self {
        Self { config }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.config.address, self.config.port))
    }

    /// Bind the listener and serve in the background until the handle is stopped
    pub fn start_background(self, gateway: ConsensusGateway) -> Result<RpcServerHandle, RpcServerError> {
        let addr = self.socket_addr();
        let routes = routes(gateway, self.config.max_request_size);

        let (tx, rx) = oneshot::channel::<()>();
        let (bound_addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(addr, async {
                rx.await.ok();
            })
            .map_err(|e| RpcServerError::BindError(format!("{}: {}", addr, e)))?;

        info!("🌐 RPC server listening on http://{}", bound_addr);
        let task = tokio::spawn(server);

        Ok(RpcServerHandle {
            addr: bound_addr,
            shutdown_tx: Some(tx),
            task: Some(task),
        })
    }
}

/// Handle for a running RPC server
pub struct RpcServerHandle {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RpcServerHandle {
    /// Stop accepting connections and wait for in-flight requests to drain
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("RPC server task ended abnormally: {}", e);
            }
        }
        info!("RPC server stopped");
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for RpcServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// =============================================================================
// ROUTES
// =============================================================================

fn routes(
    gateway: ConsensusGateway,
    max_request_size: u64,
) -> impl Filter<Extract = (warp::reply::Response,), Error = warp::Rejection> + Clone {
    let body = warp::body::content_length_limit(max_request_size).and(warp::body::bytes());

    let commit = warp::path!("executor" / "commit_block")
        .and(warp::post())
        .and(body.clone())
        .and(with_gateway(gateway.clone()))
        .and_then(handle_commit_block);

    let verify = warp::path!("executor" / "verify_tx")
        .and(warp::post())
        .and(body.clone())
        .and(with_gateway(gateway.clone()))
        .and_then(handle_verify_tx);

    let submit = warp::path!("txpool" / "submit")
        .and(warp::post())
        .and(body.clone())
        .and(with_gateway(gateway.clone()))
        .and_then(handle_submit);

    let relay = warp::path!("txpool" / "relay")
        .and(warp::post())
        .and(body)
        .and(with_gateway(gateway))
        .and_then(handle_relay);

    commit.or(verify).unify().or(submit).unify().or(relay).unify()
}

/// Filter to inject the gateway into handlers
fn with_gateway(
    gateway: ConsensusGateway,
) -> impl Filter<Extract = (ConsensusGateway,), Error = Infallible> + Clone {
    warp::any().map(move || gateway.clone())
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn handle_commit_block(
    body: Bytes,
    gateway: ConsensusGateway,
) -> Result<warp::reply::Response, Infallible> {
    let block: ExecBlock = match bincode::deserialize(&body) {
        Ok(block) => block,
        Err(e) => return Ok(bad_request(e)),
    };
    debug!("CommitBlock with {} entries", block.txs.len());

    let error = gateway
        .commit_finalized_batch(block)
        .await
        .err()
        .map(|e| e.to_string());
    Ok(binary(&CommitBlockResponse { error }))
}

async fn handle_verify_tx(
    body: Bytes,
    gateway: ConsensusGateway,
) -> Result<warp::reply::Response, Infallible> {
    let success = match ProtoTransaction::decode(&body) {
        Ok(envelope) => {
            let outcome = gateway.verify_transaction(&envelope).await;
            if let ValidationOutcome::Rejected(reason) = &outcome {
                debug!("VerifyTx rejected: {}", reason);
            }
            outcome.is_accepted()
        }
        Err(e) => {
            debug!("VerifyTx with undecodable envelope: {}", e);
            false
        }
    };
    Ok(binary(&VerifyResult { success }))
}

async fn handle_submit(
    body: Bytes,
    gateway: ConsensusGateway,
) -> Result<warp::reply::Response, Infallible> {
    let envelope = match ProtoTransaction::decode(&body) {
        Ok(envelope) => envelope,
        Err(e) => return Ok(bad_request(e)),
    };

    let result = match gateway.submit_local(&envelope).await {
        Ok(hash) => {
            debug!("Local transaction {} accepted", hash);
            SubmitResult::ok(hash)
        }
        Err(e) => SubmitResult::err(e),
    };
    Ok(binary(&result))
}

async fn handle_relay(
    body: Bytes,
    gateway: ConsensusGateway,
) -> Result<warp::reply::Response, Infallible> {
    let envelope = match ProtoTransaction::decode(&body) {
        Ok(envelope) => envelope,
        Err(e) => return Ok(bad_request(e)),
    };

    let result = match gateway.relay_transaction(&envelope).await {
        Ok(hash) => {
            trace!("Relayed transaction {} pooled", hash);
            SubmitResult::ok(hash)
        }
        Err(e) => SubmitResult::err(e),
    };
    Ok(binary(&result))
}

fn binary<T: Serialize>(value: &T) -> warp::reply::Response {
    match bincode::serialize(value) {
        Ok(bytes) => warp::reply::with_header(bytes, "content-type", "application/octet-stream").into_response(),
        Err(e) => warp::reply::with_status(e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

fn bad_request(e: impl std::fmt::Display) -> warp::reply::Response {
    warp::reply::with_status(format!("Malformed body: {}", e), StatusCode::BAD_REQUEST).into_response()
}

// =============================================================================
// RPC SERVER ERROR
// =============================================================================

/// RPC Server errors
#[derive(Debug, thiserror::Error)]
pub enum RpcServerError {
    #[error("Bind error: {0}")]
    BindError(String),
}

// =============================================================================
// RPC CONFIG
// =============================================================================

/// RPC server configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Listen port
    pub port: u16,
    /// Listen address (0.0.0.0 for all interfaces)
    pub address: [u8; 4],
    /// Max request size in bytes
    pub max_request_size: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            port: 9877,
            address: [127, 0, 0, 1], // localhost only by default
            max_request_size: 10 * 1024 * 1024, // 10 MB
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
