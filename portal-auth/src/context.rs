//! Authentication context
//!
//! [`AuthContext`] is the object UI callers hold. It owns the observable
//! authentication state, the cached current user and the session monitor of
//! the authenticated student. Storage and network failures never escape its
//! operations: they are logged and reported as failed outcomes, and the
//! in-memory state is left as it was.

use crate::account::{AccountStore, UserAccount};
use crate::backend::AuthBackend;
use crate::session::{
    LoginOutcome, MonitorStatus, OperationOutcome, SessionMonitor, SessionStore,
    DUPLICATE_EMAIL_MESSAGE, INVALID_CREDENTIALS_MESSAGE, PENDING_APPROVAL_MESSAGE,
    STUDENT_ADDED_MESSAGE, TRANSPORT_FAILURE_MESSAGE,
};
use crate::storage::{read_json, write_json, Storage, CURRENT_USER_KEY};
use crate::{AuthError, AuthResult};
use portal_core::{validation_error, PortalConfig, SeedAccount};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Observable authentication state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub is_authenticated: bool,
    pub current_user: Option<UserAccount>,
    pub session_expired: bool,
    /// Last account list loaded from the store
    pub users: Vec<UserAccount>,
}

/// Construction options
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Period of the student session liveness check
    pub poll_interval: Duration,
    /// Accounts written to a store that has never been initialized
    pub seed_accounts: Vec<SeedAccount>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            seed_accounts: portal_core::default_seed_accounts(),
        }
    }
}

impl From<&PortalConfig> for ContextOptions {
    fn from(config: &PortalConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.session.poll_interval_secs),
            seed_accounts: config.seed_accounts.clone(),
        }
    }
}

struct Inner {
    accounts: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    cache: Arc<dyn Storage>,
    poll_interval: Duration,
    state: RwLock<AuthState>,
    /// Bumped under the state lock whenever the identity changes, so a check
    /// started for an earlier login cannot expire a later one
    generation: AtomicU64,
    monitor: Mutex<Option<SessionMonitor>>,
}

/// Shared handle to one authentication context
///
/// Clones share the same state. The session monitor is cancelled by
/// [`AuthContext::shutdown`] or when the last clone is dropped.
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<Inner>,
}

impl AuthContext {
    /// Initialize a context: seed an empty store, load the account list and
    /// restore a cached current user.
    ///
    /// A restored student gets a session monitor right away; it does not
    /// count as proof of a live session until the first check passes.
    pub async fn init(backend: AuthBackend, options: ContextOptions) -> AuthResult<Self> {
        if options.poll_interval.is_zero() {
            let error =
                validation_error!("must be greater than 0", "poll_interval", "auth_context");
            return Err(error.into());
        }

        if backend.accounts.seed(&options.seed_accounts).await? {
            info!("Initialized account store with seed accounts");
        }

        let context = Self {
            inner: Arc::new(Inner {
                accounts: backend.accounts,
                sessions: backend.sessions,
                cache: backend.cache,
                poll_interval: options.poll_interval,
                state: RwLock::new(AuthState::default()),
                generation: AtomicU64::new(0),
                monitor: Mutex::new(None),
            }),
        };

        context.refresh_users().await;
        context.restore_current_user().await;

        Ok(context)
    }

    /// Validate `config`, build the backend it describes and initialize a
    /// context on it
    pub async fn from_config(config: &PortalConfig) -> AuthResult<Self> {
        config.validate()?;
        let backend = AuthBackend::from_config(config).await?;
        Self::init(backend, ContextOptions::from(config)).await
    }

    async fn restore_current_user(&self) {
        let cached: AuthResult<Option<UserAccount>> =
            read_json(self.inner.cache.as_ref(), CURRENT_USER_KEY).await;

        match cached {
            Ok(Some(user)) => {
                info!(user_id = user.id, "Restored cached user");
                let generation = self.set_current_user(&user).await;
                self.start_monitor(&user, generation).await;
            }
            Ok(None) => debug!("No cached user"),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable cached user");
                if let Err(e) = self.inner.cache.remove_item(CURRENT_USER_KEY).await {
                    warn!(error = %e, "Failed to clear cached user");
                }
            }
        }
    }

    /// Authenticate with email and password
    pub async fn login(&self, email: &str, password: &str) -> LoginOutcome {
        self.inner.state.write().await.session_expired = false;

        let user = match self.authenticate(email, password).await {
            Ok(user) => user,
            Err(AuthError::InvalidCredentials) => {
                debug!(email, "Login rejected: invalid credentials");
                return LoginOutcome::failure(INVALID_CREDENTIALS_MESSAGE);
            }
            Err(AuthError::AccountPendingApproval) => {
                debug!(email, "Login rejected: pending approval");
                return LoginOutcome::failure(PENDING_APPROVAL_MESSAGE);
            }
            Err(e) => {
                warn!(email, error = %e, "Login failed");
                return LoginOutcome::failure(TRANSPORT_FAILURE_MESSAGE);
            }
        };

        let is_admin = user.is_admin();
        self.stop_monitor().await;
        let generation = self.set_current_user(&user).await;
        self.start_monitor(&user, generation).await;

        info!(user_id = user.id, role = %user.role, "Login successful");
        LoginOutcome::success(is_admin)
    }

    async fn authenticate(&self, email: &str, password: &str) -> AuthResult<UserAccount> {
        let user = self
            .inner
            .accounts
            .find_by_credentials(email, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.approved {
            return Err(AuthError::AccountPendingApproval);
        }

        self.inner.sessions.activate(user.id).await?;
        write_json(self.inner.cache.as_ref(), CURRENT_USER_KEY, &user).await?;

        Ok(user)
    }

    /// End the current session. Always succeeds; store failures are logged.
    pub async fn logout(&self) {
        let current = self.inner.state.read().await.current_user.clone();

        if let Some(user) = &current {
            if let Err(e) = self.inner.sessions.deactivate(user.id).await {
                warn!(user_id = user.id, error = %e, "Failed to deactivate session");
            }
        }

        self.stop_monitor().await;

        {
            let mut state = self.inner.state.write().await;
            state.is_authenticated = false;
            state.current_user = None;
            state.session_expired = false;
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
        }

        if let Err(e) = self.inner.cache.remove_item(CURRENT_USER_KEY).await {
            warn!(error = %e, "Failed to clear cached user");
        }

        if let Some(user) = current {
            info!(user_id = user.id, "Logged out");
        }
    }

    /// Register a student account, pending unless `auto_approve`
    pub async fn add_student(
        &self,
        email: &str,
        password: &str,
        auto_approve: bool,
    ) -> OperationOutcome {
        match self.inner.accounts.add(email, password, auto_approve).await {
            Ok(_) => {
                self.refresh_users().await;
                OperationOutcome::success(STUDENT_ADDED_MESSAGE)
            }
            Err(AuthError::DuplicateEmail { .. }) => {
                OperationOutcome::failure(DUPLICATE_EMAIL_MESSAGE)
            }
            Err(e) => {
                warn!(email, error = %e, "Failed to add student");
                OperationOutcome::failure(TRANSPORT_FAILURE_MESSAGE)
            }
        }
    }

    /// Delete an account
    pub async fn delete_student(&self, email: &str) {
        match self.inner.accounts.remove(email).await {
            Ok(()) => self.refresh_users().await,
            Err(e) => warn!(email, error = %e, "Failed to delete student"),
        }
    }

    /// Approve a pending student
    pub async fn approve_student(&self, email: &str) {
        match self.inner.accounts.approve(email).await {
            Ok(()) => self.refresh_users().await,
            Err(e) => warn!(email, error = %e, "Failed to approve student"),
        }
    }

    /// Reject a student. The account is deleted, not flagged.
    pub async fn reject_student(&self, email: &str) {
        match self.inner.accounts.reject(email).await {
            Ok(()) => self.refresh_users().await,
            Err(e) => warn!(email, error = %e, "Failed to reject student"),
        }
    }

    /// Students awaiting approval, from the cached account list
    pub async fn get_pending_students(&self) -> Vec<UserAccount> {
        self.filter_users(UserAccount::is_pending_student).await
    }

    /// Approved students, from the cached account list
    pub async fn get_approved_students(&self) -> Vec<UserAccount> {
        self.filter_users(UserAccount::is_approved_student).await
    }

    async fn filter_users(&self, keep: fn(&UserAccount) -> bool) -> Vec<UserAccount> {
        let state = self.inner.state.read().await;
        state.users.iter().filter(|user| keep(user)).cloned().collect()
    }

    /// Reload the cached account list from the store
    pub async fn refresh_users(&self) {
        match self.inner.accounts.list_all().await {
            Ok(users) => {
                debug!("Loaded {} accounts", users.len());
                self.inner.state.write().await.users = users;
            }
            Err(e) => warn!(error = %e, "Failed to refresh users"),
        }
    }

    /// Run one liveness check for the current user now.
    ///
    /// Returns whether the context is still authenticated afterwards.
    /// Admins are never checked.
    pub async fn poll_session(&self) -> bool {
        let (current, generation) = {
            let state = self.inner.state.read().await;
            (
                state.current_user.clone(),
                self.inner.generation.load(Ordering::SeqCst),
            )
        };

        match current {
            Some(user) if user.is_admin() => true,
            Some(user) => {
                self.inner.check_session(user.id, generation).await;
                self.is_authenticated().await
            }
            None => false,
        }
    }

    /// Cancel background activity; the context stays usable
    pub async fn shutdown(&self) {
        self.stop_monitor().await;
        debug!("Auth context shut down");
    }

    /// Snapshot of the observable state
    pub async fn state(&self) -> AuthState {
        self.inner.state.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.state.read().await.is_authenticated
    }

    pub async fn current_user(&self) -> Option<UserAccount> {
        self.inner.state.read().await.current_user.clone()
    }

    pub async fn session_expired(&self) -> bool {
        self.inner.state.read().await.session_expired
    }

    pub async fn users(&self) -> Vec<UserAccount> {
        self.inner.state.read().await.users.clone()
    }

    /// User id the running session monitor checks, if any
    pub async fn monitored_user(&self) -> Option<u64> {
        self.inner
            .monitor
            .lock()
            .await
            .as_ref()
            .filter(|monitor| monitor.is_running())
            .map(SessionMonitor::user_id)
    }

    /// Install `user` as the authenticated identity and return its generation
    async fn set_current_user(&self, user: &UserAccount) -> u64 {
        let mut state = self.inner.state.write().await;
        state.is_authenticated = true;
        state.current_user = Some(user.clone());
        self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replace the session monitor for a newly authenticated identity
    async fn start_monitor(&self, user: &UserAccount, generation: u64) {
        let mut slot = self.inner.monitor.lock().await;
        // Dropping the previous monitor cancels it
        *slot = None;

        if user.is_admin() {
            return;
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let user_id = user.id;
        *slot = Some(SessionMonitor::spawn(
            user_id,
            self.inner.poll_interval,
            move || {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(inner) => inner.check_session(user_id, generation).await,
                        None => MonitorStatus::Stop,
                    }
                }
            },
        ));
    }

    async fn stop_monitor(&self) {
        if let Some(monitor) = self.inner.monitor.lock().await.take() {
            monitor.cancel();
        }
    }
}

impl Inner {
    fn is_current(&self, state: &AuthState, user_id: u64, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
            && state.current_user.as_ref().map(|user| user.id) == Some(user_id)
    }

    /// One liveness check for `user_id` as authenticated at `generation`
    async fn check_session(&self, user_id: u64, generation: u64) -> MonitorStatus {
        let still_current = {
            let state = self.state.read().await;
            self.is_current(&state, user_id, generation)
        };
        if !still_current {
            return MonitorStatus::Stop;
        }

        match self.sessions.is_active(user_id).await {
            Ok(true) => MonitorStatus::Continue,
            Ok(false) => {
                self.expire(user_id, generation).await;
                MonitorStatus::Stop
            }
            Err(e) => {
                warn!(user_id, error = %e, "Session check failed, keeping session");
                MonitorStatus::Continue
            }
        }
    }

    async fn expire(&self, user_id: u64, generation: u64) {
        {
            let mut state = self.state.write().await;
            if !self.is_current(&state, user_id, generation) {
                debug!(user_id, "Ignoring stale session check");
                return;
            }
            state.session_expired = true;
            state.is_authenticated = false;
            state.current_user = None;
            self.generation.fetch_add(1, Ordering::SeqCst);
        }

        if let Err(e) = self.cache.remove_item(CURRENT_USER_KEY).await {
            warn!(error = %e, "Failed to clear cached user");
        }

        info!(user_id, "Session expired");
    }
}
