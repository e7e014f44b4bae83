//! Request context shared between the transport layer and the core.
//!
//! The embedding request layer enters a [`RequestContext`] for the duration of
//! a request. The processor reads the route to decide the flow direction and
//! the outbox reads the actor for payload metadata.

use parking_lot::RwLock;
use std::sync::Arc;

/// Route of the inbound synchronization endpoint.
pub const RECEIVER_ROUTE: &str = "api_synchronizations_sync_receive_collection";

/// Per-request metadata supplied by the embedding layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Route name of the current request.
    pub route: Option<String>,
    /// Identifier of the acting user.
    pub actor: Option<String>,
}

impl RequestContext {
    /// Creates a context for `route`.
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: Some(route.into()),
            actor: None,
        }
    }

    /// Sets the acting user.
    #[must_use]
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Shared handle to the current request context.
///
/// Cloning the scope shares the same slot.
#[derive(Debug, Clone)]
pub struct RequestScope {
    current: Arc<RwLock<Option<RequestContext>>>,
    receiver_route: Arc<str>,
}

impl Default for RequestScope {
    fn default() -> Self {
        Self::new(RECEIVER_ROUTE)
    }
}

impl RequestScope {
    /// Creates an empty scope that treats `receiver_route` as incoming.
    pub fn new(receiver_route: impl AsRef<str>) -> Self {
        Self {
            current: Arc::new(RwLock::new(None)),
            receiver_route: Arc::from(receiver_route.as_ref()),
        }
    }

    /// Makes `context` current until the returned guard is dropped.
    ///
    /// The previous context, if any, is restored afterwards.
    #[must_use = "the context is left as soon as the guard is dropped"]
    pub fn enter(&self, context: RequestContext) -> ScopeGuard {
        let previous = self.current.write().replace(context);
        ScopeGuard {
            slot: Arc::clone(&self.current),
            previous,
        }
    }

    /// Returns a copy of the current context.
    pub fn current(&self) -> Option<RequestContext> {
        self.current.read().clone()
    }

    /// Route of the current request.
    pub fn route(&self) -> Option<String> {
        self.current.read().as_ref().and_then(|c| c.route.clone())
    }

    /// Acting user of the current request.
    pub fn actor(&self) -> Option<String> {
        self.current.read().as_ref().and_then(|c| c.actor.clone())
    }

    /// True if the current request is the inbound synchronization endpoint.
    pub fn is_incoming(&self) -> bool {
        self.current
            .read()
            .as_ref()
            .and_then(|c| c.route.as_deref())
            .is_some_and(|route| route == &*self.receiver_route)
    }

    /// Route treated as incoming.
    pub fn receiver_route(&self) -> &str {
        &self.receiver_route
    }
}

/// Restores the previous context when dropped.
#[derive(Debug)]
pub struct ScopeGuard {
    slot: Arc<RwLock<Option<RequestContext>>>,
    previous: Option<RequestContext>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        *self.slot.write() = self.previous.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scope_is_outgoing() {
        let scope = RequestScope::default();
        assert!(!scope.is_incoming());
        assert!(scope.current().is_none());
    }

    #[test]
    fn receiver_route_marks_incoming() {
        let scope = RequestScope::default();
        let _guard = scope.enter(RequestContext::new(RECEIVER_ROUTE).with_actor("api"));
        assert!(scope.is_incoming());
        assert_eq!(scope.actor().as_deref(), Some("api"));
    }

    #[test]
    fn guard_restores_previous_context() {
        let scope = RequestScope::default();
        let shared = scope.clone();

        let outer = scope.enter(RequestContext::new("admin_product_update").with_actor("admin"));
        {
            let _inner = scope.enter(RequestContext::new(RECEIVER_ROUTE));
            assert!(shared.is_incoming());
        }
        assert_eq!(shared.route().as_deref(), Some("admin_product_update"));
        drop(outer);
        assert!(shared.current().is_none());
    }
}
