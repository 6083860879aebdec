//! Streaming connection manager.
//!
//! Owns the connection lifecycle as an explicit state machine:
//!
//! ```text
//! Closed -> Connecting -> Open -> Closed            (start / handshake / shutdown)
//! Connecting|Open -> Reauthenticating               (handshake 401 / AUTH_REQUIRED)
//! Reauthenticating -> Connecting                    (token acquired after handshake 401)
//! Reauthenticating -> Reauthenticating              (token acquisition failed; backoff)
//! ```
//!
//! The reauthentication retry is a single awaited sleep inside the loop, so
//! at most one pending retry exists at any time and `shutdown()` cancels it
//! through the cancellation token. The bearer credential is injected into
//! the handshake request at connect time.

use crate::backoff::{BackoffConfig, ReauthBackoff};
use crate::dispatcher::{DispatchOutcome, EventDispatcher};
use crate::error::{WsError, WsResult};
use crate::message::AuthFrame;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use relay_api::{ApiResult, Credential, TokenProvider};
use relay_telemetry::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async_tls_with_config, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Source of bearer credentials for the connection.
///
/// `TokenProvider` is the production implementation; the seam exists so the
/// reauthentication loop can be exercised with scripted fakes.
pub trait TokenSource: Send + Sync {
    /// Acquire a fresh credential, storing it as current.
    fn acquire(&self) -> BoxFuture<'_, ApiResult<Credential>>;
    /// The most recently acquired credential.
    fn current(&self) -> Option<Credential>;
}

impl TokenSource for TokenProvider {
    fn acquire(&self) -> BoxFuture<'_, ApiResult<Credential>> {
        Box::pin(TokenProvider::acquire(self))
    }

    fn current(&self) -> Option<Credential> {
        TokenProvider::current(self)
    }
}

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Stream endpoint URL.
    pub url: String,
    /// Reauthentication backoff policy.
    pub backoff: BackoffConfig,
    /// Delay before reconnecting after a non-auth transport failure.
    pub transport_retry_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            backoff: BackoffConfig::default(),
            transport_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Reauthenticating,
}

impl ConnectionState {
    /// Lowercase label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reauthenticating => "reauthenticating",
        }
    }
}

type WsSink = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Streaming connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    tokens: Arc<dyn TokenSource>,
    dispatcher: Arc<EventDispatcher>,
    state: RwLock<ConnectionState>,
    backoff: Mutex<ReauthBackoff>,
    /// Replaced with a fresh token when `run()` is entered after a shutdown.
    shutdown: RwLock<CancellationToken>,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new(
        config: ConnectionConfig,
        tokens: Arc<dyn TokenSource>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        let backoff = ReauthBackoff::new(config.backoff.clone());
        Self {
            config,
            tokens,
            dispatcher,
            state: RwLock::new(ConnectionState::Closed),
            backoff: Mutex::new(backoff),
            shutdown: RwLock::new(CancellationToken::new()),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Request shutdown.
    ///
    /// Idempotent: closing an already-closed connection is a no-op. Cancels
    /// any pending reauthentication retry and tears down the live socket.
    pub fn shutdown(&self) {
        let token = self.shutdown.read().clone();
        if token.is_cancelled() {
            return;
        }
        info!("Connection shutdown requested");
        token.cancel();
    }

    /// Maintain the connection until shutdown.
    ///
    /// Intended to be spawned once per `start`; entering again after a
    /// shutdown installs a fresh cancellation token, so `shutdown()` followed
    /// by another `run()` behaves like a clean restart.
    pub async fn run(&self) -> WsResult<()> {
        let shutdown = self.refresh_shutdown_token();

        loop {
            if shutdown.is_cancelled() {
                self.set_state(ConnectionState::Closed);
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);

            match self.connect_and_stream(&shutdown).await {
                Ok(()) => {
                    if shutdown.is_cancelled() {
                        self.set_state(ConnectionState::Closed);
                        return Ok(());
                    }
                    warn!("Stream ended, reconnecting");
                }
                Err(WsError::AuthRejected) => {
                    info!("Handshake rejected (401), reauthenticating");
                    if !self.reauthenticate(&shutdown).await {
                        self.set_state(ConnectionState::Closed);
                        return Ok(());
                    }
                    // Fresh credential stored; loop back for an immediate
                    // reconnect attempt.
                }
                Err(e) => {
                    error!(error = %e, "Transport error, reconnecting");
                    // Generic transport retry; the reauth backoff is not
                    // involved for non-auth failures.
                    tokio::select! {
                        () = tokio::time::sleep(self.config.transport_retry_delay) => {}
                        () = shutdown.cancelled() => {
                            self.set_state(ConnectionState::Closed);
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    async fn connect_and_stream(&self, shutdown: &CancellationToken) -> WsResult<()> {
        let request = self.handshake_request()?;
        info!(url = %self.config.url, "Connecting to price stream");

        let (stream, _response) = connect_async_tls_with_config(request, None, true, None)
            .await
            .map_err(classify_handshake_error)?;

        self.set_state(ConnectionState::Open);
        self.backoff.lock().reset();
        info!("Connected to price stream");

        let (mut write, mut read) = stream.split();

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Shutdown signal received, closing stream");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(error = %e, "Failed to send close frame during shutdown");
                    }
                    return Ok(());
                }

                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        if self.dispatcher.dispatch(&text) == DispatchOutcome::ReauthRequired
                            && !self.reauthenticate_in_place(&mut write, shutdown).await?
                        {
                            return Ok(());
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (f.code.into(), f.reason.to_string()))
                            .unwrap_or((1000, "Normal close".to_string()));
                        warn!(code, %reason, "Stream closed by server");
                        return Err(WsError::ConnectionClosed { code, reason });
                    }
                    Some(Err(e)) => {
                        return Err(e.into());
                    }
                    None => {
                        warn!("Stream ended");
                        return Ok(());
                    }
                    _ => {}
                }
            }
        }
    }

    /// Mid-session reauthentication triggered by an `AUTH_REQUIRED` frame.
    ///
    /// Acquires a fresh credential (with backoff on failure) and presents it
    /// in an `AUTH` control frame on the live socket, so subscriptions
    /// survive without a reconnect. Returns `false` if shutdown was
    /// requested while waiting.
    async fn reauthenticate_in_place(
        &self,
        write: &mut WsSink,
        shutdown: &CancellationToken,
    ) -> WsResult<bool> {
        if !self.reauthenticate(shutdown).await {
            return Ok(false);
        }

        let credential = self.tokens.current().ok_or_else(|| {
            WsError::ConnectionFailed("No credential after reauthentication".to_string())
        })?;
        let frame = AuthFrame::new(credential.token());
        write.send(Message::Text(frame.to_text()?)).await?;

        self.set_state(ConnectionState::Open);
        info!("Re-authenticated on live stream");
        Ok(true)
    }

    /// Acquire a fresh credential, retrying with exponential backoff.
    ///
    /// The single awaited sleep here is the only pending retry timer; a new
    /// failure replaces it rather than stacking another. Returns `false` if
    /// shutdown was requested while waiting.
    async fn reauthenticate(&self, shutdown: &CancellationToken) -> bool {
        self.set_state(ConnectionState::Reauthenticating);

        loop {
            match self.tokens.acquire().await {
                Ok(_) => {
                    self.backoff.lock().reset();
                    Metrics::reauth("ok");
                    info!("Reauthentication succeeded");
                    return true;
                }
                Err(e) => {
                    Metrics::reauth("failed");
                    let (delay, attempts) = {
                        let mut backoff = self.backoff.lock();
                        let delay = backoff.record_failure();
                        (delay, backoff.attempts())
                    };
                    warn!(
                        error = %e,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Token acquisition failed, retrying"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = shutdown.cancelled() => return false,
                    }
                }
            }
        }
    }

    /// Build the handshake request with the current bearer credential.
    fn handshake_request(&self) -> WsResult<tungstenite::handshake::client::Request> {
        let mut request = self.config.url.as_str().into_client_request()?;
        if let Some(credential) = self.tokens.current() {
            let value = HeaderValue::from_str(&credential.bearer()).map_err(|e| {
                WsError::ConnectionFailed(format!("Invalid authorization header: {e}"))
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(request)
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        Metrics::stream_state_set(state.as_str());
        if state == ConnectionState::Open {
            Metrics::stream_connected();
        } else {
            Metrics::stream_disconnected();
        }
    }

    fn refresh_shutdown_token(&self) -> CancellationToken {
        let mut guard = self.shutdown.write();
        if guard.is_cancelled() {
            *guard = CancellationToken::new();
        }
        guard.clone()
    }

    #[cfg(test)]
    fn backoff_attempts(&self) -> u32 {
        self.backoff.lock().attempts()
    }
}

/// Map a handshake failure to the auth-rejection path when the server
/// answered 401; everything else stays a generic transport error.
fn classify_handshake_error(error: tungstenite::Error) -> WsError {
    match error {
        tungstenite::Error::Http(ref response)
            if response.status() == StatusCode::UNAUTHORIZED =>
        {
            WsError::AuthRejected
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    /// Token source driven by a script of successes and failures.
    struct ScriptedTokens {
        script: PlMutex<VecDeque<bool>>,
        calls: PlMutex<Vec<Instant>>,
        current: PlMutex<Option<Credential>>,
    }

    impl ScriptedTokens {
        fn new(script: impl IntoIterator<Item = bool>) -> Arc<Self> {
            Arc::new(Self {
                script: PlMutex::new(script.into_iter().collect()),
                calls: PlMutex::new(Vec::new()),
                current: PlMutex::new(None),
            })
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().clone()
        }
    }

    impl TokenSource for ScriptedTokens {
        fn acquire(&self) -> BoxFuture<'_, ApiResult<Credential>> {
            Box::pin(async move {
                self.calls.lock().push(Instant::now());
                // Empty script keeps failing
                let ok = self.script.lock().pop_front().unwrap_or(false);
                if ok {
                    let credential = Credential::new("fresh-token");
                    *self.current.lock() = Some(credential.clone());
                    Ok(credential)
                } else {
                    Err(relay_api::ApiError::AuthFailure(
                        "scripted failure".to_string(),
                    ))
                }
            })
        }

        fn current(&self) -> Option<Credential> {
            self.current.lock().clone()
        }
    }

    fn manager(tokens: Arc<ScriptedTokens>) -> ConnectionManager {
        let config = ConnectionConfig {
            url: "wss://stream.example.com".to_string(),
            backoff: BackoffConfig {
                floor: Duration::from_secs(1),
                max: Duration::from_secs(60),
            },
            transport_retry_delay: Duration::from_secs(1),
        };
        ConnectionManager::new(config, tokens, Arc::new(EventDispatcher::new()))
    }

    #[test]
    fn test_initial_state_is_closed() {
        let manager = manager(ScriptedTokens::new([]));
        assert_eq!(manager.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let manager = manager(ScriptedTokens::new([]));
        manager.shutdown();
        manager.shutdown();
        assert!(manager.shutdown.read().is_cancelled());
    }

    #[test]
    fn test_restart_installs_fresh_token() {
        let manager = manager(ScriptedTokens::new([]));
        manager.shutdown();
        assert!(manager.shutdown.read().is_cancelled());

        let token = manager.refresh_shutdown_token();
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reauthenticate_backs_off_with_increasing_delays() {
        let tokens = ScriptedTokens::new([false, false, false, true]);
        let manager = manager(Arc::clone(&tokens));
        let shutdown = manager.refresh_shutdown_token();

        let started = Instant::now();
        assert!(manager.reauthenticate(&shutdown).await);

        // 3 failures then success: waits of 1s, 2s, 4s between the 4 calls
        let calls = tokens.call_times();
        assert_eq!(calls.len(), 4);
        let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps, vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
        ]);
        assert!(gaps[1] > gaps[0] && gaps[2] > gaps[1]);
        assert_eq!(started.elapsed(), Duration::from_secs(7));

        // Success resets the counter to its floor
        assert_eq!(manager.backoff_attempts(), 0);
        assert_eq!(tokens.current().unwrap().token(), "fresh-token");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reauthenticate_state_is_reauthenticating_while_waiting() {
        let tokens = ScriptedTokens::new([true]);
        let manager = manager(tokens);
        let shutdown = manager.refresh_shutdown_token();

        assert!(manager.reauthenticate(&shutdown).await);
        assert_eq!(manager.state(), ConnectionState::Reauthenticating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_reauth_retry() {
        let tokens = ScriptedTokens::new([]); // never succeeds
        let manager = Arc::new(manager(tokens));
        let shutdown = manager.refresh_shutdown_token();

        let task = {
            let manager = Arc::clone(&manager);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { manager.reauthenticate(&shutdown).await })
        };

        // Let the first failure happen and the retry sleep start
        tokio::time::sleep(Duration::from_millis(10)).await;
        manager.shutdown();

        assert!(!task.await.unwrap());
    }

    #[test]
    fn test_handshake_401_maps_to_auth_rejected() {
        let response = tungstenite::http::Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .body(None)
            .unwrap();
        let error = classify_handshake_error(tungstenite::Error::Http(response));
        assert!(matches!(error, WsError::AuthRejected));
    }

    #[test]
    fn test_handshake_other_http_error_stays_transport() {
        let response = tungstenite::http::Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(None)
            .unwrap();
        let error = classify_handshake_error(tungstenite::Error::Http(response));
        assert!(matches!(error, WsError::Tungstenite(_)));
    }

    #[test]
    fn test_handshake_request_carries_bearer_header() {
        let tokens = ScriptedTokens::new([]);
        *tokens.current.lock() = Some(Credential::new("jwt-abc"));
        let manager = manager(tokens);

        let request = manager.handshake_request().unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer jwt-abc"
        );
    }

    #[test]
    fn test_handshake_request_without_credential_has_no_header() {
        let manager = manager(ScriptedTokens::new([]));
        let request = manager.handshake_request().unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(ConnectionState::Closed.as_str(), "closed");
        assert_eq!(ConnectionState::Reauthenticating.as_str(), "reauthenticating");
    }
}
