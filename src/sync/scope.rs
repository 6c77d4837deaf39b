use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Lifetime of one screen. Every remote call a screen makes runs through
/// [`ScreenScope::guard`]; once the scope is closed (or dropped) pending calls
/// resolve to `None` and live subscriptions stop.
#[derive(Debug, Default)]
pub struct ScreenScope {
    token: CancellationToken,
}

impl ScreenScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A nested scope closed together with this one, or on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn guard<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

impl Drop for ScreenScope {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn guard_passes_through_while_open() {
        let scope = ScreenScope::new();
        assert_eq!(scope.guard(async { 7 }).await, Some(7));
    }

    #[tokio::test]
    async fn closed_scope_drops_the_call() {
        let scope = ScreenScope::new();
        scope.close();
        assert_eq!(scope.guard(async { 7 }).await, None);
    }

    #[tokio::test]
    async fn dropping_a_child_leaves_the_parent_open() {
        let parent = ScreenScope::new();
        let child = parent.child();
        let token = child.token();
        drop(child);
        assert!(token.is_cancelled());
        assert!(!parent.is_closed());

        let child = parent.child();
        parent.close();
        assert!(child.is_closed());
    }
}
