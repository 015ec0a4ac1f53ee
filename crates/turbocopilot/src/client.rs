//! Main client for the Copilot runtime
//!
//! A [`CopilotClient`] owns at most one connection at a time. `start` spawns
//! or dials the runtime, checks the protocol version, and installs a fresh
//! [`SessionRouter`]. `stop` destroys every live session and closes the
//! connection; a runtime the client only connected to is left running.

use crate::config::{ClientOptions, ConnectionMode, ResumeSessionConfig, SessionConfig, parse_cli_url};
use crate::connection::{Connection, ConnectionState, InboundHandler};
use crate::error::{CopilotError, Result};
use crate::lifecycle::{ListenerSet, Subscription};
use crate::routing::SessionRouter;
use crate::session::Session;
use crate::session::core::SessionShared;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use turbocopilot_protocol::rpc::{
    AuthStatus, CreateSessionResult, ForegroundSessionInfo, LastSessionIdResult,
    ListModelsResult, ListSessionsResult, ModelInfo, PingParams, PingResult,
    SessionMetadata, SetForegroundResult, StatusResult,
};
use turbocopilot_protocol::session::SessionIdParams;
use turbocopilot_protocol::{
    RpcErrorObject, SDK_PROTOCOL_VERSION, SessionLifecycleEvent, methods,
};
use turbocopilot_transport::tcp::DEFAULT_CONNECT_TIMEOUT;
use turbocopilot_transport::{
    ProcessHandle, ServerProcess, StdioTransport, TcpTransport, Transport,
};
use uuid::Uuid;

/// What a started client holds
#[derive(Clone)]
struct Running {
    connection: Connection,
    router: Arc<SessionRouter>,
    process: Option<ProcessHandle>,
}

struct ClientInner {
    options: ClientOptions,
    // A caller-supplied transport, consumed by the first start
    transport: Mutex<Option<Arc<dyn Transport>>>,
    transport_supplied: bool,
    running: Mutex<Option<Running>>,
    // Serializes start and stop
    lifecycle_lock: tokio::sync::Mutex<()>,
    lifecycle: ListenerSet<SessionLifecycleEvent>,
    models: tokio::sync::Mutex<Option<Vec<ModelInfo>>>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock()
            && let Some(running) = running.take()
        {
            running.connection.abort();
        }
    }
}

/// Client for the Copilot agent runtime
///
/// Cheap to clone; clones share the connection.
///
/// # Example
///
/// ```no_run
/// # use turbocopilot::{CopilotClient, ClientOptions, SessionConfig};
/// # async fn example() -> turbocopilot::Result<()> {
/// let client = CopilotClient::new(ClientOptions::from_env()?)?;
/// client.start().await?;
///
/// let session = client.create_session(SessionConfig::new()).await?;
/// let reply = session.send_and_wait("What is 2+2?", None).await?;
///
/// for err in client.stop().await {
///     eprintln!("cleanup failed: {}", err);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CopilotClient {
    inner: Arc<ClientInner>,
}

impl CopilotClient {
    /// Create a client; nothing is spawned until [`start`](Self::start)
    pub fn new(options: ClientOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::build(options, None))
    }

    /// Create a client that talks over an already-connected transport
    ///
    /// The transport is used by the first start only; once stopped, the client
    /// cannot be restarted.
    pub fn from_transport(transport: Arc<dyn Transport>, options: ClientOptions) -> Self {
        Self::build(options, Some(transport))
    }

    fn build(options: ClientOptions, transport: Option<Arc<dyn Transport>>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                options,
                transport_supplied: transport.is_some(),
                transport: Mutex::new(transport),
                running: Mutex::new(None),
                lifecycle_lock: tokio::sync::Mutex::new(()),
                lifecycle: ListenerSet::new(),
                models: tokio::sync::Mutex::new(None),
            }),
        }
    }

    /// Options this client was built with
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Connection state; `Closed` before the first start and after stop
    pub fn state(&self) -> ConnectionState {
        self.running()
            .map(|running| running.connection.state())
            .unwrap_or(ConnectionState::Closed)
    }

    fn running(&self) -> Option<Running> {
        self.inner.running.lock().ok().and_then(|running| running.clone())
    }

    /// Connect to the runtime
    ///
    /// Does nothing if already started. Fails with
    /// [`CopilotError::VersionMismatch`] when the runtime speaks another
    /// protocol version.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle_lock.lock().await;
        if self.running().is_some() {
            return Ok(());
        }

        info!(mode = ?self.inner.options.connection, "Starting Copilot client");
        let (transport, process) = self.open_transport().await?;
        let router = SessionRouter::new(self.inner.lifecycle.clone());
        let connection = Connection::start(
            transport,
            Arc::clone(&router) as Arc<dyn InboundHandler>,
            self.inner.options.request_timeout,
        );

        if let Err(err) = verify_protocol_version(&connection).await {
            connection.close().await;
            return Err(err);
        }

        if let Ok(mut running) = self.inner.running.lock() {
            *running = Some(Running {
                connection,
                router,
                process,
            });
        }
        info!("Copilot client started");
        Ok(())
    }

    async fn open_transport(&self) -> Result<(Arc<dyn Transport>, Option<ProcessHandle>)> {
        let supplied = self
            .inner
            .transport
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(transport) = supplied {
            return Ok((transport, None));
        }
        if self.inner.transport_supplied {
            return Err(CopilotError::Config(
                "the supplied transport was already used and cannot be restarted".to_string(),
            ));
        }

        let options = &self.inner.options;
        match &options.connection {
            ConnectionMode::Stdio => {
                let transport = StdioTransport::spawn(&options.process_config())?;
                let process = transport.process().clone();
                Ok((Arc::new(transport), Some(process)))
            }
            ConnectionMode::Tcp { .. } => {
                let server =
                    ServerProcess::spawn(&options.process_config(), options.port_discovery_timeout)
                        .await?;
                let (process, port) = server.into_parts();
                debug!(port, "Runtime announced its port");

                match TcpTransport::connect("localhost", port, DEFAULT_CONNECT_TIMEOUT).await {
                    Ok(transport) => Ok((
                        Arc::new(transport.with_process(process.clone())),
                        Some(process),
                    )),
                    Err(err) => {
                        if let Err(kill_err) = process.kill().await {
                            warn!(error = %kill_err, "Failed to kill runtime after connect error");
                        }
                        Err(err.into())
                    }
                }
            }
            ConnectionMode::Connect { url } => {
                let (host, port) = parse_cli_url(url)?;
                let transport = TcpTransport::connect(&host, port, DEFAULT_CONNECT_TIMEOUT).await?;
                Ok((Arc::new(transport), None))
            }
        }
    }

    /// Destroy every session and close the connection
    ///
    /// Never fails as a whole: each session that could not be destroyed
    /// contributes one error to the returned list. Safe to call when not
    /// started.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self) -> Vec<CopilotError> {
        let _lifecycle = self.inner.lifecycle_lock.lock().await;
        let Some(running) = self.take_running() else {
            return Vec::new();
        };

        let mut errors = Vec::new();
        for shared in running.router.sessions() {
            let session = Session::new(shared);
            if let Err(err) = session.destroy().await {
                warn!(session_id = %session.session_id(), error = %err, "Failed to destroy session");
                errors.push(err);
            }
        }

        running.connection.close().await;
        self.inner.models.lock().await.take();
        info!(failures = errors.len(), "Copilot client stopped");
        errors
    }

    /// Kill the runtime and drop the connection without destroying sessions
    #[tracing::instrument(skip(self))]
    pub async fn force_stop(&self) {
        let _lifecycle = self.inner.lifecycle_lock.lock().await;
        let Some(running) = self.take_running() else {
            return;
        };

        if let Some(process) = &running.process
            && let Err(err) = process.kill().await
        {
            warn!(error = %err, "Failed to kill runtime process");
        }
        running.connection.close().await;
        self.inner.models.lock().await.take();
        info!("Copilot client force-stopped");
    }

    fn take_running(&self) -> Option<Running> {
        self.inner.running.lock().ok().and_then(|mut running| running.take())
    }

    /// The running connection, starting it first when `auto_start` allows
    async fn ensure_started(&self) -> Result<Running> {
        if let Some(running) = self.running() {
            return Ok(running);
        }
        if !self.inner.options.auto_start {
            return Err(CopilotError::ConnectionClosed);
        }
        self.start().await?;
        self.running().ok_or(CopilotError::ConnectionClosed)
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let running = self.ensure_started().await?;
        running.connection.call(method, params).await
    }

    /// Open a new session
    ///
    /// The session is registered before the runtime is asked to create it, so
    /// no early event is lost.
    #[tracing::instrument(skip(self, config))]
    pub async fn create_session(&self, config: SessionConfig) -> Result<Session> {
        let running = self.ensure_started().await?;
        let (mut params, callbacks) = config.into_parts();
        let session_id = params
            .session_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone();

        let shared = SessionShared::new(
            session_id.clone(),
            running.connection.clone(),
            &running.router,
            callbacks,
        );
        running.router.register(Arc::clone(&shared));

        let result: CreateSessionResult =
            match running.connection.call(methods::SESSION_CREATE, &params).await {
                Ok(result) => result,
                Err(err) => {
                    running.router.unregister(&session_id);
                    return Err(err);
                }
            };

        if result.session_id != session_id {
            warn!(
                requested = %session_id,
                assigned = %result.session_id,
                "Runtime assigned a different session id"
            );
            running.router.rekey(&session_id, &result.session_id);
        }
        shared.set_workspace_path(result.workspace_path);
        info!(session_id = %result.session_id, "Session created");
        Ok(Session::new(shared))
    }

    /// Reattach to an existing session
    ///
    /// Fails with [`CopilotError::SessionNotFound`] when the runtime has no
    /// such session.
    #[tracing::instrument(skip(self, config), fields(session_id = %config.session_id))]
    pub async fn resume_session(&self, config: ResumeSessionConfig) -> Result<Session> {
        let running = self.ensure_started().await?;
        let (params, callbacks) = config.into_parts();
        let session_id = params.session_id.clone();

        let shared = SessionShared::new(
            session_id.clone(),
            running.connection.clone(),
            &running.router,
            callbacks,
        );
        running.router.register(Arc::clone(&shared));

        let result: CreateSessionResult =
            match running.connection.call(methods::SESSION_RESUME, &params).await {
                Ok(result) => result,
                Err(err) => {
                    running.router.unregister(&session_id);
                    if err.is_not_found() {
                        return Err(CopilotError::SessionNotFound(session_id));
                    }
                    return Err(err);
                }
            };

        if result.session_id != session_id {
            running.router.rekey(&session_id, &result.session_id);
        }
        shared.set_workspace_path(result.workspace_path);
        info!(session_id = %result.session_id, "Session resumed");
        Ok(Session::new(shared))
    }

    /// Liveness check; the runtime echoes `message`
    #[tracing::instrument(skip(self))]
    pub async fn ping(&self, message: Option<&str>) -> Result<PingResult> {
        let params = PingParams {
            message: message.map(str::to_string),
        };
        self.call(methods::PING, serde_json::to_value(params)?).await
    }

    /// Runtime version information
    #[tracing::instrument(skip(self))]
    pub async fn get_status(&self) -> Result<StatusResult> {
        self.call(methods::STATUS_GET, json!({})).await
    }

    /// Authentication state of the runtime
    #[tracing::instrument(skip(self))]
    pub async fn get_auth_status(&self) -> Result<AuthStatus> {
        self.call(methods::AUTH_GET_STATUS, json!({})).await
    }

    /// Models the runtime can use
    ///
    /// Fetched once per connection and cached until [`stop`](Self::stop).
    #[tracing::instrument(skip(self))]
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let mut cache = self.inner.models.lock().await;
        if let Some(models) = cache.as_ref() {
            return Ok(models.clone());
        }
        let result: ListModelsResult = self.call(methods::MODELS_LIST, json!({})).await?;
        *cache = Some(result.models.clone());
        Ok(result.models)
    }

    /// Sessions stored by the runtime
    #[tracing::instrument(skip(self))]
    pub async fn list_sessions(&self) -> Result<Vec<SessionMetadata>> {
        let result: ListSessionsResult = self.call(methods::SESSION_LIST, json!({})).await?;
        Ok(result.sessions)
    }

    /// Delete a session's stored data
    ///
    /// A live local handle for the session is released as well.
    #[tracing::instrument(skip(self))]
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let running = self.ensure_started().await?;
        running
            .connection
            .call::<_, Value>(methods::SESSION_DELETE, SessionIdParams::new(session_id))
            .await?;
        if let Some(shared) = running.router.session(session_id) {
            shared.release();
        }
        Ok(())
    }

    /// Most recently used session, if any
    #[tracing::instrument(skip(self))]
    pub async fn get_last_session_id(&self) -> Result<Option<String>> {
        let result: LastSessionIdResult = self.call(methods::SESSION_GET_LAST_ID, json!({})).await?;
        Ok(result.session_id)
    }

    /// Session shown in the runtime's foreground, if any
    #[tracing::instrument(skip(self))]
    pub async fn get_foreground_session_id(&self) -> Result<Option<String>> {
        let result: ForegroundSessionInfo =
            self.call(methods::SESSION_GET_FOREGROUND, json!({})).await?;
        Ok(result.session_id)
    }

    /// Move a session to the runtime's foreground
    #[tracing::instrument(skip(self))]
    pub async fn set_foreground_session_id(&self, session_id: &str) -> Result<()> {
        let result: SetForegroundResult = self
            .call(
                methods::SESSION_SET_FOREGROUND,
                serde_json::to_value(SessionIdParams::new(session_id))?,
            )
            .await?;
        if result.success {
            Ok(())
        } else {
            let message = result
                .error
                .unwrap_or_else(|| format!("failed to set foreground session {}", session_id));
            Err(RpcErrorObject::internal(message).into())
        }
    }

    /// Receive `session.lifecycle` notifications
    ///
    /// Registrations survive restarts of the client.
    pub fn on_lifecycle<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SessionLifecycleEvent) + Send + Sync + 'static,
    {
        self.inner.lifecycle.add(Arc::new(listener))
    }
}

impl std::fmt::Debug for CopilotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopilotClient")
            .field("connection", &self.inner.options.connection)
            .field("state", &self.state())
            .finish()
    }
}

/// Ping with a null message and compare protocol versions
async fn verify_protocol_version(connection: &Connection) -> Result<()> {
    let ping: PingResult = connection
        .call(methods::PING, PingParams { message: None })
        .await?;

    match ping.protocol_version {
        Some(version) if version != SDK_PROTOCOL_VERSION => {
            Err(CopilotError::VersionMismatch {
                expected: SDK_PROTOCOL_VERSION,
                got: version,
            })
        }
        Some(version) => {
            debug!(version, "Protocol version verified");
            Ok(())
        }
        None => {
            debug!("Runtime did not report a protocol version");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRuntime;

    #[test]
    fn test_new_validates_options() {
        let options = ClientOptions::new()
            .with_cli_url("localhost:1234")
            .with_github_token("t");
        assert!(matches!(
            CopilotClient::new(options),
            Err(CopilotError::Config(_))
        ));
    }

    #[test]
    fn test_state_before_start() {
        let client = CopilotClient::new(ClientOptions::default()).unwrap();
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_stop_without_start() {
        let client = CopilotClient::new(ClientOptions::default()).unwrap();
        assert!(client.stop().await.is_empty());
    }

    #[tokio::test]
    async fn test_no_auto_start() {
        let runtime = FakeRuntime::builder()
            .options(ClientOptions::default().with_auto_start(false))
            .build();
        let client = runtime.client();
        let err = client.list_sessions().await.unwrap_err();
        assert_eq!(err, CopilotError::ConnectionClosed);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let runtime = FakeRuntime::builder().build();
        let client = runtime.client();
        client.start().await.unwrap();
        client.start().await.unwrap();

        assert_eq!(client.state(), ConnectionState::Ready);
        assert_eq!(runtime.calls_to(methods::PING), 1);
    }

    #[tokio::test]
    async fn test_version_mismatch() {
        let runtime = FakeRuntime::builder()
            .respond(
                methods::PING,
                json!({"message": null, "timestamp": 0, "protocolVersion": 99}),
            )
            .build();
        let client = runtime.client();

        let err = client.start().await.unwrap_err();
        assert_eq!(
            err,
            CopilotError::VersionMismatch {
                expected: SDK_PROTOCOL_VERSION,
                got: 99
            }
        );
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_list_models_cached() {
        let runtime = FakeRuntime::builder()
            .respond(
                methods::MODELS_LIST,
                json!({"models": [{"id": "gpt-5", "name": "GPT-5"}]}),
            )
            .build();
        let client = runtime.client();

        let first = client.list_models().await.unwrap();
        let second = client.list_models().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].id, "gpt-5");
        assert_eq!(runtime.calls_to(methods::MODELS_LIST), 1);
    }

    #[tokio::test]
    async fn test_resume_unknown_session() {
        let runtime = FakeRuntime::builder()
            .fail(
                methods::SESSION_RESUME,
                RpcErrorObject::new(-32000, "Session not found: ghost"),
            )
            .build();
        let client = runtime.client();

        let err = client
            .resume_session(ResumeSessionConfig::new("ghost"))
            .await
            .unwrap_err();
        assert_eq!(err, CopilotError::SessionNotFound("ghost".to_string()));
    }

    #[tokio::test]
    async fn test_create_session_rekeys() {
        let runtime = FakeRuntime::builder()
            .respond(methods::SESSION_CREATE, json!({"sessionId": "runtime-chosen"}))
            .build();
        let client = runtime.client();

        let session = client.create_session(SessionConfig::new()).await.unwrap();
        assert_eq!(session.session_id(), "runtime-chosen");
    }

    #[tokio::test]
    async fn test_set_foreground_failure() {
        let runtime = FakeRuntime::builder()
            .respond(
                methods::SESSION_SET_FOREGROUND,
                json!({"success": false, "error": "not in TUI mode"}),
            )
            .build();
        let client = runtime.client();

        let err = client.set_foreground_session_id("s1").await.unwrap_err();
        assert!(err.to_string().contains("not in TUI mode"));
    }

    #[tokio::test]
    async fn test_lifecycle_listeners() {
        let runtime = FakeRuntime::builder().build();
        let client = runtime.client();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = client.on_lifecycle(move |event| {
            let _ = tx.send(event.session_id.clone());
        });
        client.start().await.unwrap();

        runtime.notify(
            methods::SESSION_LIFECYCLE,
            json!({"type": "session.created", "sessionId": "abc"}),
        );
        assert_eq!(rx.recv().await.as_deref(), Some("abc"));
    }
}
