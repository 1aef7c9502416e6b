//! Client-side session lifecycle.
//!
//! Holds the permission snapshot, publishes [`SessionState`] on a watch
//! channel, funnels 401s into a single shared refresh and runs the idle
//! countdown. The snapshot only gates what the UI offers; the server decides.

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use reqwest::header::{HeaderName, HeaderValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::error::ClientError;
use super::idle::{IdleEvent, IdleSettings, IdleTracker};
use super::refresh::{RefreshCoordinator, RefreshFailure, RefreshOutcome};
use super::transport::{ApiRequest, ApiResponse, HttpTransport, TransportError};
use crate::api::cookies::CSRF_HEADER;
use crate::api::dto::{LoginRequest, LoginResponse, MeResponse, UserView};
use crate::permissions::{self, PermissionCheck, Requirement, Role};

const LOGIN_PATH: &str = "/auth/login";
const REFRESH_PATH: &str = "/auth/refresh";
const LOGOUT_PATH: &str = "/auth/logout";
const ME_PATH: &str = "/auth/me";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing fetched yet.
    Unknown,
    Authenticated,
    RefreshPending,
    IdleWarning { remaining_secs: u64 },
    Unauthenticated,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub idle: IdleSettings,
    /// Upper bound for every auth call (login, refresh, logout, me).
    pub request_timeout: Duration,
    /// Where the UI sends the user once the session is gone.
    pub login_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            idle: IdleSettings::default(),
            request_timeout: Duration::from_secs(10),
            login_path: "/login".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials accepted; resend with the second-factor code.
    TwoFactorRequired { user: UserView },
    Authenticated { user: UserView },
}

pub struct ClientSessionManager {
    transport: Arc<dyn HttpTransport>,
    config: ClientConfig,
    state: watch::Sender<SessionState>,
    snapshot: RwLock<Option<UserView>>,
    refresh: RefreshCoordinator,
    /// Bumped every time the session ends.
    epoch: AtomicU64,
    idle: Mutex<IdleTracker>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl ClientSessionManager {
    pub fn new(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Unknown);
        let idle = IdleTracker::new(config.idle);
        Arc::new(Self {
            transport,
            config,
            state,
            snapshot: RwLock::new(None),
            refresh: RefreshCoordinator::new(),
            epoch: AtomicU64::new(0),
            idle: Mutex::new(idle),
            monitor: Mutex::new(None),
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<UserView> {
        self.snapshot.read().clone()
    }

    pub fn login_redirect(&self) -> &str {
        &self.config.login_path
    }

    /// Refreshes actually sent to the server so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh.started()
    }

    fn publish(&self, state: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            debug!(from = ?current, to = ?state, "session state");
            *current = state;
            true
        });
    }

    /// Fetch the signed-in user. Any failure leaves the session signed out.
    pub async fn bootstrap(self: &Arc<Self>) -> SessionState {
        let me = match self.request(ApiRequest::get(ME_PATH)).await {
            Ok(response) => response.json::<MeResponse>().map_err(ClientError::from),
            Err(e) => Err(e),
        };

        match me {
            Ok(MeResponse { user }) => self.establish(user),
            Err(e) => {
                debug!(error = %e, "no session at bootstrap");
                self.end_session();
            }
        }
        self.state()
    }

    pub async fn login(
        self: &Arc<Self>,
        email: &str,
        password: &str,
        two_factor_code: Option<&str>,
    ) -> Result<LoginOutcome, ClientError> {
        let body = serde_json::to_value(LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            two_factor_code: two_factor_code.map(str::to_string),
        })?;

        let response = match self.send(ApiRequest::post(LOGIN_PATH).json(body)).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "login request failed");
                self.end_session();
                return Err(e);
            }
        };

        if !response.status.is_success() {
            return Err(ClientError::from_response(&response));
        }

        let LoginResponse {
            user,
            two_factor_enabled,
        } = response.json()?;
        if two_factor_enabled {
            return Ok(LoginOutcome::TwoFactorRequired { user });
        }

        self.establish(user.clone());
        Ok(LoginOutcome::Authenticated { user })
    }

    /// Send an API call. A 401 triggers one shared refresh and one retry.
    pub async fn request(self: &Arc<Self>, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let seen = self.refresh.generation();
        let epoch = self.epoch();
        let response = self.send(request.clone()).await?;

        if response.status == reqwest::StatusCode::UNAUTHORIZED {
            if self.epoch() != epoch {
                return Err(ClientError::Unauthenticated);
            }
            self.refresh_session(seen).await?;
            // Signed out while the refresh was in flight: no retry.
            if self.epoch() != epoch {
                return Err(ClientError::Unauthenticated);
            }
            let retried = self.send(request).await?;
            return Self::settle(retried);
        }
        Self::settle(response)
    }

    pub async fn logout(&self) {
        let monitor = self.monitor.lock().take();
        if let Some(handle) = monitor {
            handle.abort();
        }
        self.sign_out().await;
    }

    /// Answer to the idle warning: refresh and restart the idle period.
    pub async fn stay_connected(self: &Arc<Self>) -> Result<(), ClientError> {
        let seen = self.refresh.generation();
        self.refresh_session(seen).await?;

        // The countdown may have run out while the refresh was in flight.
        if self.snapshot.read().is_none() {
            return Err(ClientError::Unauthenticated);
        }
        self.restart_idle();
        self.publish(SessionState::Authenticated);
        Ok(())
    }

    /// User input. Has no effect once the idle warning is showing.
    pub fn record_activity(&self) {
        self.idle.lock().record_activity(Instant::now());
    }

    pub fn can_perform(&self, resource: &str, action: &str) -> bool {
        self.with_role(|role| permissions::can_perform(role, resource, action))
    }

    pub fn has_role(&self, role_name: &str) -> bool {
        self.with_role(|role| permissions::has_role(role, role_name))
    }

    pub fn has_all(&self, checks: &[PermissionCheck]) -> bool {
        self.with_role(|role| permissions::all(role, checks))
    }

    pub fn has_any(&self, checks: &[PermissionCheck]) -> bool {
        self.with_role(|role| permissions::any(role, checks))
    }

    /// Same decision the server's route guard makes for `requirement`.
    pub fn allows(&self, requirement: &Requirement) -> bool {
        self.with_role(|role| requirement.is_satisfied_by(role))
    }

    fn with_role(&self, check: impl FnOnce(&Role) -> bool) -> bool {
        self.snapshot
            .read()
            .as_ref()
            .is_some_and(|user| check(&user.role))
    }

    fn settle(response: ApiResponse) -> Result<ApiResponse, ClientError> {
        if response.status.is_success() {
            Ok(response)
        } else {
            Err(ClientError::from_response(&response))
        }
    }

    async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ClientError> {
        if request.is_mutating()
            && let Some(token) = self.transport.csrf_token()
            && let Ok(value) = HeaderValue::from_str(&token)
        {
            request = request.header(HeaderName::from_static(CSRF_HEADER), value);
        }

        match tokio::time::timeout(self.config.request_timeout, self.transport.execute(request))
            .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(TransportError::Timeout.into()),
        }
    }

    async fn refresh_session(self: &Arc<Self>, seen: u64) -> Result<(), ClientError> {
        let outcome = self
            .refresh
            .refresh(seen, || {
                let manager = Arc::clone(self);
                async move { manager.call_refresh().await }.boxed()
            })
            .await;

        outcome.map_err(|_| ClientError::Unauthenticated)
    }

    /// The body of the shared refresh. Runs once per refresh, whoever polls it.
    async fn call_refresh(&self) -> RefreshOutcome {
        let epoch = self.epoch();
        self.publish(SessionState::RefreshPending);

        let outcome = match self.send(ApiRequest::post(REFRESH_PATH)).await {
            Ok(response) if response.status.is_success() => Ok(()),
            Ok(response) => {
                debug!(status = %response.status, "refresh rejected");
                Err(RefreshFailure::Rejected)
            }
            Err(ClientError::Transport(TransportError::Timeout)) => Err(RefreshFailure::TimedOut),
            Err(e) => {
                warn!(error = %e, "refresh failed");
                Err(RefreshFailure::Transport)
            }
        };

        if self.epoch() != epoch {
            // The session ended underneath us; whatever the server said, stay signed out.
            debug!("refresh settled after sign-out, discarding");
            return Err(RefreshFailure::Rejected);
        }

        match outcome {
            Ok(()) => self.publish(self.resting_state()),
            Err(failure) => {
                info!(reason = %failure, "session ended after failed refresh");
                self.end_session();
            }
        }
        outcome
    }

    /// State to fall back to once a refresh succeeds.
    fn resting_state(&self) -> SessionState {
        let idle = self.idle.lock();
        if let Some(remaining_secs) = idle.remaining(Instant::now()) {
            return SessionState::IdleWarning { remaining_secs };
        }
        drop(idle);

        if self.snapshot.read().is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unknown
        }
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn establish(self: &Arc<Self>, user: UserView) {
        *self.snapshot.write() = Some(user);
        self.restart_idle();
        self.publish(SessionState::Authenticated);
    }

    fn restart_idle(self: &Arc<Self>) {
        self.idle.lock().start(Instant::now());
        let handle = tokio::spawn(idle_monitor(Arc::downgrade(self)));
        let previous = self.monitor.lock().replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Local teardown: stop the countdown, drop the snapshot.
    fn end_session(&self) {
        let monitor = self.monitor.lock().take();
        if let Some(handle) = monitor {
            handle.abort();
        }
        self.idle.lock().stop();
        *self.snapshot.write() = None;
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.publish(SessionState::Unauthenticated);
    }

    async fn sign_out(&self) {
        if let Err(e) = self.send(ApiRequest::post(LOGOUT_PATH)).await {
            warn!(error = %e, "logout request failed, clearing local session anyway");
        }
        self.end_session();
    }

    /// Countdown hit zero. Called from the monitor task itself.
    async fn expire(&self) {
        // Detach rather than abort: this is the task being run.
        drop(self.monitor.lock().take());
        info!("idle timeout reached, signing out");
        self.sign_out().await;
    }
}

impl Drop for ClientSessionManager {
    fn drop(&mut self) {
        if let Some(handle) = self.monitor.get_mut().take() {
            handle.abort();
        }
    }
}

async fn idle_monitor(manager: Weak<ClientSessionManager>) {
    loop {
        let wake_at = {
            let Some(manager) = manager.upgrade() else {
                return;
            };
            let next = manager.idle.lock().next_wakeup(Instant::now());
            next
        };
        let Some(wake_at) = wake_at else {
            return;
        };

        tokio::time::sleep_until(wake_at).await;

        let Some(manager) = manager.upgrade() else {
            return;
        };
        let event = manager.idle.lock().poll(Instant::now());
        match event {
            Some(IdleEvent::WarningStarted { remaining_secs }) => {
                info!(remaining_secs, "idle warning");
                manager.publish(SessionState::IdleWarning { remaining_secs });
            }
            Some(IdleEvent::Countdown { remaining_secs }) => {
                manager.publish(SessionState::IdleWarning { remaining_secs });
            }
            Some(IdleEvent::Expired) => {
                manager.expire().await;
                return;
            }
            None => {}
        }
    }
}
