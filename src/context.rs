//! Per-request `Caller` plumbing (`spec.md` §4 "Context plumbing", §9
//! redesign note: "model as an explicit context value propagated through
//! all authorization calls; never read from global mutable state").
//!
//! `tokio::task_local!` scopes the bound value to the async task tree
//! rooted at [`with_caller`] — it is not process-global mutable state,
//! just the Rust-async idiom for "attach once at the top of a request,
//! retrieve anywhere below it" that other ecosystems reach for a
//! `context.Context` to do.

use std::future::Future;
use std::sync::Arc;

use crate::caller::Caller;

tokio::task_local! {
    static CURRENT_CALLER: Arc<Caller>;
}

/// Runs `fut` with `caller` attached as the active principal for its
/// entire task subtree. Every authorization call `fut` makes can recover
/// it via [`current_caller`].
pub async fn with_caller<F>(caller: Arc<Caller>, fut: F) -> F::Output
where
    F: Future,
{
    CURRENT_CALLER.scope(caller, fut).await
}

/// Retrieves the active `Caller`, if one was attached via [`with_caller`]
/// somewhere up the current task's scope chain.
pub fn current_caller() -> Option<Arc<Caller>> {
    CURRENT_CALLER.try_with(Arc::clone).ok()
}
