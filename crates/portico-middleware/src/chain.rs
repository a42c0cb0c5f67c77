//! Ordered stage composition.
//!
//! A [`StageChain`] holds an ordered list of stages and folds them
//! right-to-left around a terminal handler, so stage *i* always runs before
//! stage *i+1* and decides whether *i+1* runs at all.
//!
//! ```text
//! request → Authorization → BusinessRules → Response → terminal
//!              │                 │
//!              └─ Redirect       └─ Redirect
//! ```
//!
//! The order is fixed once the chain is built.

use crate::context::StageContext;
use crate::stage::{BoxFuture, Next, Stage};
use portico_core::{RouteRequest, RouteResponse};
use portico_telemetry::metrics::{record_decision, InFlightGuard};
use std::sync::Arc;
use tracing::debug;

/// A type-erased stage that can be stored in a vector.
pub type BoxedStage = Arc<dyn Stage>;

/// An immutable, ordered chain of stages.
///
/// # Example
///
/// ```ignore
/// let chain = StageChain::builder("administration")
///     .stage(authorization)
///     .stage(business_rules)
///     .stage(ResponseStage::new())
///     .build();
///
/// let mut ctx = StageContext::new();
/// let response = chain.process(&mut ctx, &request).await;
/// ```
pub struct StageChain {
    label: &'static str,
    stages: Vec<BoxedStage>,
}

impl StageChain {
    /// Creates a builder. `label` names the application in metrics.
    #[must_use]
    pub fn builder(label: &'static str) -> StageChainBuilder {
        StageChainBuilder::new(label)
    }

    /// Runs the request through every stage with the default terminal.
    ///
    /// The terminal yields the rewrite recorded in the context, if any, and
    /// otherwise a pass-through.
    pub async fn process(&self, ctx: &mut StageContext, request: &RouteRequest) -> RouteResponse {
        self.process_with(ctx, request, Next::rewrite_or_pass()).await
    }

    /// Runs the request through every stage with a custom terminal.
    pub async fn process_with<'a>(
        &'a self,
        ctx: &mut StageContext,
        request: &RouteRequest,
        terminal: Next<'a>,
    ) -> RouteResponse {
        let _in_flight = InFlightGuard::new();

        let response = self.build_chain(terminal).run(ctx, request).await;

        let decision = response.decision();
        record_decision(self.label, decision.kind());
        debug!(
            request_id = %ctx.request_id(),
            app = self.label,
            decision = %decision,
            stages = ?ctx.visited(),
            "chain completed"
        );

        response
    }

    /// Builds a chain with a custom terminal closure.
    pub async fn process_fn<F>(
        &self,
        ctx: &mut StageContext,
        request: &RouteRequest,
        terminal: F,
    ) -> RouteResponse
    where
        F: FnOnce(&mut StageContext, &RouteRequest) -> BoxFuture<'static, RouteResponse> + Send,
    {
        self.process_with(ctx, request, Next::terminal(terminal)).await
    }

    fn build_chain<'a>(&'a self, terminal: Next<'a>) -> Next<'a> {
        let mut next = terminal;
        for stage in self.stages.iter().rev() {
            next = Next::new(stage.as_ref(), next);
        }
        next
    }

    /// Returns the application label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl std::fmt::Debug for StageChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageChain")
            .field("label", &self.label)
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for [`StageChain`].
pub struct StageChainBuilder {
    label: &'static str,
    stages: Vec<BoxedStage>,
}

impl StageChainBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            stages: Vec::new(),
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn stage<S: Stage>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Appends an already shared stage.
    #[must_use]
    pub fn boxed_stage(mut self, stage: BoxedStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Freezes the order.
    #[must_use]
    pub fn build(self) -> StageChain {
        StageChain {
            label: self.label,
            stages: self.stages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::RouteDecision;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct OrderTracking {
        name: &'static str,
        counter: Arc<AtomicUsize>,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Stage for OrderTracking {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut StageContext,
            request: &'a RouteRequest,
            next: Next<'a>,
        ) -> BoxFuture<'a, RouteResponse> {
            let counter = self.counter.clone();
            let order = self.order.clone();
            let name = self.name;

            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                order.lock().unwrap().push(name);
                next.run(ctx, request).await
            })
        }
    }

    struct Terminate;

    impl Stage for Terminate {
        fn name(&self) -> &'static str {
            "terminate"
        }

        fn process<'a>(
            &'a self,
            _ctx: &'a mut StageContext,
            _request: &'a RouteRequest,
            _next: Next<'a>,
        ) -> BoxFuture<'a, RouteResponse> {
            Box::pin(async { RouteResponse::redirect("/stop") })
        }
    }

    struct Rewriter;

    impl Stage for Rewriter {
        fn name(&self) -> &'static str {
            "rewriter"
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut StageContext,
            request: &'a RouteRequest,
            next: Next<'a>,
        ) -> BoxFuture<'a, RouteResponse> {
            Box::pin(async move {
                ctx.set_rewrite("/rewritten");
                next.run(ctx, request).await
            })
        }
    }

    fn tracker(
        name: &'static str,
        counter: &Arc<AtomicUsize>,
        order: &Arc<Mutex<Vec<&'static str>>>,
    ) -> OrderTracking {
        OrderTracking {
            name,
            counter: counter.clone(),
            order: order.clone(),
        }
    }

    #[tokio::test]
    async fn test_stages_execute_in_order() {
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let chain = StageChain::builder("test")
            .stage(tracker("first", &counter, &order))
            .stage(tracker("second", &counter, &order))
            .stage(tracker("third", &counter, &order))
            .build();

        let mut ctx = StageContext::new();
        let response = chain.process(&mut ctx, &RouteRequest::new("/x")).await;

        assert_eq!(response.decision(), &RouteDecision::PassThrough);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(ctx.visited(), &["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_later_stages() {
        let counter = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let chain = StageChain::builder("test")
            .stage(tracker("first", &counter, &order))
            .stage(Terminate)
            .stage(tracker("never", &counter, &order))
            .build();

        let mut ctx = StageContext::new();
        let response = chain.process(&mut ctx, &RouteRequest::new("/x")).await;

        assert_eq!(response.decision(), &RouteDecision::redirect("/stop"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.visited(), &["first", "terminate"]);
    }

    #[tokio::test]
    async fn test_recorded_rewrite_reaches_terminal() {
        let chain = StageChain::builder("test").stage(Rewriter).build();
        let mut ctx = StageContext::new();
        let response = chain.process(&mut ctx, &RouteRequest::new("/x")).await;
        assert_eq!(
            response.decision(),
            &RouteDecision::Rewrite("/rewritten".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_chain_passes_through() {
        let chain = StageChain::builder("test").build();
        let mut ctx = StageContext::new();
        let response = chain.process(&mut ctx, &RouteRequest::new("/x")).await;
        assert_eq!(response.decision(), &RouteDecision::PassThrough);
        assert_eq!(chain.stage_count(), 0);
    }

    #[tokio::test]
    async fn test_custom_terminal() {
        let chain = StageChain::builder("test").stage(Rewriter).build();
        let mut ctx = StageContext::new();
        let response = chain
            .process_fn(&mut ctx, &RouteRequest::new("/x"), |_ctx, _req| {
                Box::pin(async { RouteResponse::redirect("/custom") })
            })
            .await;
        assert!(response.decision().is_redirect());
    }

    #[test]
    fn test_stage_names() {
        let chain = StageChain::builder("test").stage(Terminate).stage(Rewriter).build();
        assert_eq!(chain.stage_names(), vec!["terminate", "rewriter"]);
        assert_eq!(chain.label(), "test");
    }
}
