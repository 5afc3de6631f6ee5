//! Headless listing driver for end-to-end scripting.
//!
//! Drives any number of named viewers against one shared in-memory store,
//! each with its own identity and live session, via JSON-over-stdio IPC.
//! Logging goes to stderr; stdout is reserved for the IPC protocol.
//!
//! On startup, emits a `Ready` JSON line to stdout.
//! Then reads `Command` JSON lines from stdin and writes `Response` lines.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use market::mocks::{MockIdentity, MockListingStore, SharedStoreHandle};
use market::{
    ListingAction, ListingDetails, ListingId, ListingSession, MarketConfig, MarketError,
    SessionEvent, SystemTimeProvider, ThreadRng, UserId,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_POLL_WAIT_MS: u64 = 100;

// ── IPC types ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ReadyEvent {
    event: &'static str,
    consistency: String,
}

#[derive(Deserialize)]
#[serde(tag = "cmd")]
enum Command {
    CreateListing {
        owner: String,
        details: ListingDetails,
    },
    Open {
        viewer: String,
        listing_id: String,
    },
    Login {
        viewer: String,
        uid: String,
    },
    Logout {
        viewer: String,
    },
    Dispatch {
        viewer: String,
        action: ListingAction,
    },
    View {
        viewer: String,
    },
    /// Drain the viewer's pending session events, waiting up to `wait_ms`
    /// for each one.
    Poll {
        viewer: String,
        wait_ms: Option<u64>,
    },
    Close {
        viewer: String,
    },
    Shutdown,
}

#[derive(Serialize)]
#[serde(tag = "status")]
enum Response {
    Ok {
        data: Option<serde_json::Value>,
    },
    Err {
        kind: Option<market::RejectionKind>,
        message: String,
    },
}

impl Response {
    fn ok(data: serde_json::Value) -> Self {
        Self::Ok { data: Some(data) }
    }

    fn market_err(e: &MarketError) -> Self {
        Self::Err {
            kind: Some(e.kind()),
            message: e.to_string(),
        }
    }

    fn usage(message: impl Into<String>) -> Self {
        Self::Err {
            kind: None,
            message: message.into(),
        }
    }
}

// ── Viewers ──────────────────────────────────────────────────────────

struct Viewer {
    identity: MockIdentity,
    store: MockListingStore,
    session: Option<ListingSession<MockListingStore>>,
}

struct Driver {
    handle: SharedStoreHandle,
    config: MarketConfig,
    viewers: HashMap<String, Viewer>,
}

impl Driver {
    fn new(config: MarketConfig) -> Self {
        Self {
            handle: SharedStoreHandle::with_clock(SystemTimeProvider::new(), ThreadRng::new()),
            config,
            viewers: HashMap::new(),
        }
    }

    fn viewer(&mut self, name: &str) -> &mut Viewer {
        let handle = &self.handle;
        self.viewers.entry(name.to_string()).or_insert_with(|| Viewer {
            identity: MockIdentity::new(),
            store: handle.connect(name),
            session: None,
        })
    }

    async fn execute(&mut self, cmd: Command) -> Response {
        match cmd {
            Command::CreateListing { owner, details } => {
                let store = self.handle.connect("headless-admin");
                match store.create_listing(&UserId::new(owner), details).await {
                    Ok(listing) => Response::ok(serde_json::json!({ "listing": listing })),
                    Err(e) => Response::market_err(&e),
                }
            }

            Command::Open { viewer, listing_id } => {
                let config = self.config.clone();
                let v = self.viewer(&viewer);
                let opened = ListingSession::open(
                    v.store.clone(),
                    &v.identity,
                    &ListingId::new(listing_id),
                    config,
                )
                .await;
                match opened {
                    Ok(session) => {
                        let view = session.view();
                        v.session = Some(session);
                        Response::ok(serde_json::json!({ "view": view }))
                    }
                    Err(e) => Response::market_err(&e),
                }
            }

            Command::Login { viewer, uid } => {
                self.viewer(&viewer).identity.sign_in(&uid);
                Response::Ok { data: None }
            }

            Command::Logout { viewer } => {
                self.viewer(&viewer).identity.sign_out();
                Response::Ok { data: None }
            }

            Command::Dispatch { viewer, action } => {
                let Some(session) = self.viewer(&viewer).session.as_mut() else {
                    return Response::usage(format!("viewer {viewer} has no open listing"));
                };
                match session.dispatch(action).await {
                    Ok(accepted) => Response::ok(serde_json::json!({
                        "action": accepted.action,
                        "committed_revision": accepted.expectation.committed_revision,
                    })),
                    Err(e) => Response::market_err(&e),
                }
            }

            Command::View { viewer } => {
                let Some(session) = self.viewer(&viewer).session.as_ref() else {
                    return Response::usage(format!("viewer {viewer} has no open listing"));
                };
                let view = session.view();
                Response::ok(serde_json::json!({
                    "view": view,
                    "permitted": view.permitted_intents(),
                    "listing": session.snapshot().listing(),
                    "actor": session.actor(),
                    "stale": session.is_stale(),
                }))
            }

            Command::Poll { viewer, wait_ms } => {
                let Some(session) = self.viewer(&viewer).session.as_mut() else {
                    return Response::usage(format!("viewer {viewer} has no open listing"));
                };
                let wait = Duration::from_millis(wait_ms.unwrap_or(DEFAULT_POLL_WAIT_MS));
                let mut events: Vec<SessionEvent> = Vec::new();
                while let Ok(Some(event)) = tokio::time::timeout(wait, session.next_event()).await
                {
                    events.push(event);
                }
                Response::ok(serde_json::json!({ "events": events }))
            }

            Command::Close { viewer } => {
                if let Some(mut session) = self.viewer(&viewer).session.take() {
                    session.close();
                }
                Response::Ok { data: None }
            }

            Command::Shutdown => Response::Ok { data: None },
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn init_logging_stderr() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

fn emit_json(value: &impl Serialize) -> anyhow::Result<()> {
    let line = serde_json::to_string(value).context("JSON serialization failed")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").context("stdout write failed")?;
    stdout.flush().context("stdout flush failed")?;
    Ok(())
}

// ── Main ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging_stderr();
    let config = MarketConfig::from_env().context("invalid MARKET_* environment")?;
    info!(?config, "listing-headless starting");

    let mut driver = Driver::new(config);
    emit_json(&ReadyEvent {
        event: "Ready",
        consistency: format!("{:?}", driver.config.consistency),
    })?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => {
                info!("stdin closed, shutting down");
                break;
            }
            Err(e) => {
                error!("stdin read error: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let cmd: Command = match serde_json::from_str(&line) {
            Ok(c) => c,
            Err(e) => {
                emit_json(&Response::usage(format!("Invalid command JSON: {e}")))?;
                continue;
            }
        };

        let shutdown = matches!(cmd, Command::Shutdown);
        let response = driver.execute(cmd).await;
        emit_json(&response)?;
        if shutdown {
            info!("Shutdown command received");
            break;
        }
    }

    // Sessions release their subscriptions on drop.
    driver.viewers.clear();
    info!("Shutdown complete");
    Ok(())
}
