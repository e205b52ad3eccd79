//! Per-request correlation.
//!
//! Every engine call gets a [`RequestContext`]. The id is carried by a
//! task-local across awaits and by a thread-local inside blocking workers,
//! so logs from the async front and the blocking body share one id.

use std::cell::RefCell;
use std::future::Future;
use std::time::Instant;
use uuid::Uuid;

/// Per-request context with correlation id.
#[derive(Clone, Debug)]
pub struct RequestContext {
    request_id: String,
    operation: &'static str,
    started: Instant,
}

impl RequestContext {
    /// Creates a context with a fresh UUID.
    #[must_use]
    pub fn new(operation: &'static str) -> Self {
        Self::from_id(operation, Uuid::new_v4().to_string())
    }

    /// Creates a context with a caller-supplied id.
    #[must_use]
    pub fn from_id(operation: &'static str, request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            operation,
            started: Instant::now(),
        }
    }

    /// Returns the request id.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Returns the engine operation name.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        self.operation
    }

    /// Milliseconds since the context was created.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Span carrying the request id and operation.
    #[must_use]
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "launchgap.request",
            request_id = %self.request_id,
            operation = self.operation
        )
    }
}

tokio::task_local! {
    static TASK_CONTEXT: RequestContext;
}

thread_local! {
    static THREAD_CONTEXT: RefCell<Option<RequestContext>> = const { RefCell::new(None) };
}

/// Restores the previous thread-local context on drop.
pub struct RequestContextGuard {
    previous: Option<RequestContext>,
}

impl Drop for RequestContextGuard {
    fn drop(&mut self) {
        THREAD_CONTEXT.with(|slot| {
            *slot.borrow_mut() = self.previous.take();
        });
    }
}

/// Enters a context on the current thread, for blocking workers.
#[must_use]
pub fn enter_request_context(context: RequestContext) -> RequestContextGuard {
    let previous = THREAD_CONTEXT.with(|slot| slot.borrow_mut().replace(context));
    RequestContextGuard { previous }
}

/// Scopes a context across an async future.
pub async fn scope_request_context<F, T>(context: RequestContext, fut: F) -> T
where
    F: Future<Output = T>,
{
    TASK_CONTEXT.scope(context, fut).await
}

/// Returns the current context, task-local first.
#[must_use]
pub fn current_request_context() -> Option<RequestContext> {
    if let Ok(ctx) = TASK_CONTEXT.try_with(Clone::clone) {
        return Some(ctx);
    }
    THREAD_CONTEXT.with(|slot| slot.borrow().clone())
}

/// Returns the current request id, if any.
#[must_use]
pub fn current_request_id() -> Option<String> {
    current_request_context().map(|ctx| ctx.request_id)
}
