//! Scoped access to an [`AuthContext`]
//!
//! Code running inside [`AuthProvider::scope`] can reach the context through
//! [`use_auth`] without threading it through every call.

use crate::context::AuthContext;
use std::future::Future;

tokio::task_local! {
    static CURRENT_AUTH: AuthContext;
}

pub struct AuthProvider;

impl AuthProvider {
    /// Run `future` with `context` installed as the current auth context
    pub async fn scope<F>(context: AuthContext, future: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_AUTH.scope(context, future).await
    }

    /// Current auth context, if the caller runs inside a scope
    pub fn try_current() -> Option<AuthContext> {
        CURRENT_AUTH.try_with(Clone::clone).ok()
    }
}

/// Current auth context
///
/// # Panics
///
/// Panics when called outside [`AuthProvider::scope`].
pub fn use_auth() -> AuthContext {
    match AuthProvider::try_current() {
        Some(context) => context,
        None => panic!("use_auth must be used within an AuthProvider"),
    }
}
