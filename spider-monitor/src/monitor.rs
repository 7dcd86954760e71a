use anyhow::{Context, Result};
use frontend::config::{apply_env_overrides, load_config_or_default};
use frontend::connection::{SessionEvents, TungsteniteTransport, resolve_endpoint};
use frontend::spider_detail::SpiderDetail;
use frontend::{SocketListeners, SocketSession, SocketState};
use shared::ToolkitConfig;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

pub struct WatchOptions {
    pub spider_id: u64,
    pub run: bool,
    pub timeout_ms: Option<u64>,
    pub path: Option<String>,
}

pub fn load(path: Option<&Path>) -> Result<ToolkitConfig> {
    let mut config = load_config_or_default(path)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn print_endpoint(config: &ToolkitConfig, path: &str) -> Result<bool> {
    let endpoint = resolve_endpoint(&config.socket.page_scheme, &config.socket.host, path)?;
    println!("{}", endpoint);
    Ok(true)
}

/// How long a closed socket gets to confirm the close once the deadline hit.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Returns false when the socket never opened or the run reported an error.
/// `timeout_ms` bounds the whole watch, handshake included.
pub async fn run_watch(config: ToolkitConfig, options: WatchOptions) -> Result<bool> {
    let transport = TungsteniteTransport::from_current()?;
    let (session, mut events) = SocketSession::new(config.socket, transport);
    let detail = SpiderDetail::new(options.spider_id, session.clone());
    let deadline = options
        .timeout_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));

    let connection = match &options.path {
        Some(path) => {
            log::info!("Watching custom path {}; pushes are only logged", path);
            let listeners = SocketListeners::new().on_message(|text| log::info!("<- {}", text));
            session.connect(path, listeners)
        }
        None => detail.watch(),
    }
    .context("Failed to open socket")?;
    log::debug!("Socket {} is connecting", connection);

    let state = drive_before(&session, &mut events, deadline, |state| {
        state != SocketState::Connecting
    })
    .await;
    if state != SocketState::Open {
        log::error!("Socket to {:?} ended as {}", session.endpoint(), state);
        return Ok(false);
    }

    if options.run {
        let wire = detail.run_spider().context("Failed to send run command")?;
        log::info!("-> {}", wire);
    }

    let state = drive_before(&session, &mut events, deadline, SocketState::is_settled).await;
    let status = detail.status();
    match &status.last_push {
        Some(push) => log::info!("Last push: {:?}", push),
        None => log::info!("No run status received"),
    }
    if let Some(error) = &status.last_error {
        log::error!("Spider {} reported: {}", options.spider_id, error);
    }

    Ok(state == SocketState::Closed && status.last_error.is_none())
}

/// Drives until `done` holds. Past the deadline the socket is closed and
/// given [`CLOSE_GRACE`] to report it; whatever state it reached is returned.
async fn drive_before(
    session: &SocketSession,
    events: &mut SessionEvents,
    deadline: Option<Instant>,
    done: impl Fn(SocketState) -> bool,
) -> SocketState {
    let Some(deadline) = deadline else {
        return session.drive_until(events, done).await;
    };

    match tokio::time::timeout_at(deadline, session.drive_until(events, &done)).await {
        Ok(state) => state,
        Err(_) => {
            log::info!("Deadline reached while {}, closing", session.state());
            session.close();
            tokio::time::timeout(CLOSE_GRACE, session.drive_until_closed(events))
                .await
                .unwrap_or_else(|_| {
                    log::warn!("Socket did not confirm the close within {:?}", CLOSE_GRACE);
                    session.state()
                })
        }
    }
}
