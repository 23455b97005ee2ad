use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use minichain_core::chain::{Blockchain, MineOutcome};
use minichain_core::constants::DEFAULT_DIFFICULTY;
use minichain_core::{Block, Transaction};
use minichain_storage::sled_store::SledStore;
use minichain_storage::{load_chain, save_chain, Storage};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Data directory for sled
    #[arg(long, default_value = "./data")]
    data_dir: String,

    /// Leading zero hex characters required of every mined block. Ignored
    /// when an existing chain is loaded from the data directory.
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: usize,

    /// Give up on a mining request after this many seconds.
    #[arg(long, default_value_t = 30)]
    mine_timeout_secs: u64,
}

#[derive(Clone)]
struct AppState {
    ledger: Arc<Mutex<Blockchain>>,
    store: Arc<SledStore>,
    mine_timeout: Duration,
}

#[derive(Deserialize)]
struct TxIn {
    sender: String,
    recipient: String,
    amount: u64,
}

#[derive(Deserialize)]
struct MineIn {
    reward_address: String,
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn chain(State(state): State<AppState>) -> Json<Vec<Block>> {
    let ledger = state.ledger.lock().expect("ledger mutex poisoned");
    Json(ledger.blocks().to_vec())
}

async fn head(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ledger = state.ledger.lock().expect("ledger mutex poisoned");
    let tip = ledger.latest_block();
    Json(json!({ "height": tip.index, "hash": tip.hash }))
}

async fn block(State(state): State<AppState>, Path(index): Path<u64>) -> Response {
    let ledger = state.ledger.lock().expect("ledger mutex poisoned");
    match ledger.blocks().get(index as usize) {
        Some(block) => Json(block.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no block at index {index}") })),
        )
            .into_response(),
    }
}

async fn submit_tx(State(state): State<AppState>, Json(tx): Json<TxIn>) -> Response {
    let mut ledger = state.ledger.lock().expect("ledger mutex poisoned");
    match ledger.add_transaction(Transaction::new(tx.sender, tx.recipient, tx.amount)) {
        Ok(block_index) => (
            StatusCode::CREATED,
            Json(json!({ "accepted": true, "block_index": block_index })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "accepted": false, "error": err.to_string() })),
        )
            .into_response(),
    }
}

/// Outcome of a mining round, with the block cloned out of the ledger so it
/// can cross the blocking-task boundary.
enum Mined {
    Block(Box<Block>),
    NothingPending,
    Cancelled,
}

async fn mine(State(state): State<AppState>, Json(req): Json<MineIn>) -> Response {
    let cancel = Arc::new(AtomicBool::new(false));

    // Deadline watchdog: raise the cancel flag once the timeout expires.
    let deadline = {
        let cancel = cancel.clone();
        let timeout = state.mine_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            cancel.store(true, Ordering::Relaxed);
        })
    };

    // Proof-of-work is CPU-bound; keep it off the async runtime.
    let outcome = {
        let ledger = state.ledger.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || {
            let mut ledger = ledger.lock().expect("ledger mutex poisoned");
            match ledger.mine_pending_transactions_cancellable(&req.reward_address, &cancel) {
                MineOutcome::Mined(block) => Mined::Block(Box::new(block.clone())),
                MineOutcome::NothingPending => Mined::NothingPending,
                MineOutcome::Cancelled => Mined::Cancelled,
            }
        })
        .await
        .expect("mining task panicked")
    };
    deadline.abort();

    match outcome {
        Mined::Block(block) => {
            if let Err(err) = state.store.put_block(&block) {
                error!(%err, index = block.index, "failed to persist mined block");
            }
            Json(json!({ "mined": *block })).into_response()
        }
        Mined::NothingPending => {
            Json(json!({ "mined": null, "reason": "no pending transactions" })).into_response()
        }
        Mined::Cancelled => (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({ "mined": null, "reason": "mining deadline expired" })),
        )
            .into_response(),
    }
}

async fn balance(State(state): State<AppState>, Path(address): Path<String>) -> Json<serde_json::Value> {
    let ledger = state.ledger.lock().expect("ledger mutex poisoned");
    let balance = ledger.balance_of(&address);
    Json(json!({ "address": address, "balance": balance }))
}

async fn validate(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ledger = state.ledger.lock().expect("ledger mutex poisoned");
    match ledger.validate() {
        Ok(()) => Json(json!({ "valid": true, "fault": null })),
        Err(fault) => Json(json!({ "valid": false, "fault": fault })),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = Arc::new(SledStore::open(&args.data_dir)?);

    let ledger = match load_chain(store.as_ref())? {
        Some(ledger) => {
            info!(
                height = ledger.latest_block().index,
                difficulty = ledger.difficulty(),
                "loaded chain from disk"
            );
            if ledger.difficulty() != args.difficulty {
                warn!(
                    stored = ledger.difficulty(),
                    requested = args.difficulty,
                    "ignoring --difficulty; the stored chain fixes it"
                );
            }
            ledger
        }
        None => {
            let ledger = Blockchain::new(args.difficulty);
            save_chain(store.as_ref(), &ledger)?;
            info!(difficulty = args.difficulty, "started a fresh chain");
            ledger
        }
    };

    let state = AppState {
        ledger: Arc::new(Mutex::new(ledger)),
        store,
        mine_timeout: Duration::from_secs(args.mine_timeout_secs),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/chain", get(chain))
        .route("/chain/head", get(head))
        .route("/block/{index}", get(block))
        .route("/tx", post(submit_tx))
        .route("/mine", post(mine))
        .route("/balance/{address}", get(balance))
        .route("/validate", get(validate))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = args.listen.parse()?;
    info!("minichain-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
