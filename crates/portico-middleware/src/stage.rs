//! The stage trait and its continuation.
//!
//! A stage receives the per-request context, the read-only request and a
//! [`Next`] continuation. It either calls `next.run()` exactly once and
//! returns (or decorates) its result, or it terminates the chain by
//! returning its own [`RouteResponse`].
//!
//! # Example
//!
//! ```ignore
//! use portico_middleware::{BoxFuture, Next, Stage, StageContext};
//! use portico_core::{RouteRequest, RouteResponse};
//!
//! struct Audit;
//!
//! impl Stage for Audit {
//!     fn name(&self) -> &'static str {
//!         "audit"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut StageContext,
//!         request: &'a RouteRequest,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, RouteResponse> {
//!         Box::pin(async move {
//!             let response = next.run(ctx, request).await;
//!             tracing::debug!(decision = response.decision().kind(), "audited");
//!             response
//!         })
//!     }
//! }
//! ```

use crate::context::StageContext;
use portico_core::{RouteRequest, RouteResponse};
use std::future::Future;
use std::pin::Pin;

/// A boxed future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The terminal handler invoked after the last stage.
pub type TerminalFn<'a> =
    Box<dyn FnOnce(&mut StageContext, &RouteRequest) -> BoxFuture<'static, RouteResponse> + Send + 'a>;

/// A single routing stage.
///
/// # Invariants
///
/// - A stage that does not terminate MUST call `next.run()` exactly once
///   (enforced by `Next::run` taking `self`)
/// - A stage never mutates the request; the only permitted effects are
///   recording claims or a rewrite in the context, or returning a redirect
pub trait Stage: Send + Sync + 'static {
    /// Name used in logs and the visited-stage trail.
    fn name(&self) -> &'static str;

    /// Processes the request.
    fn process<'a>(
        &'a self,
        ctx: &'a mut StageContext,
        request: &'a RouteRequest,
        next: Next<'a>,
    ) -> BoxFuture<'a, RouteResponse>;
}

/// Continuation to the rest of the chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        stage: &'a dyn Stage,
        next: Box<Next<'a>>,
    },
    Terminal(TerminalFn<'a>),
}

impl<'a> Next<'a> {
    /// Wraps `next` so that `stage` runs first.
    pub(crate) fn new(stage: &'a dyn Stage, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                stage,
                next: Box::new(next),
            },
        }
    }

    /// Creates a terminal continuation.
    pub fn terminal<F>(f: F) -> Self
    where
        F: FnOnce(&mut StageContext, &RouteRequest) -> BoxFuture<'static, RouteResponse> + Send + 'a,
    {
        Self {
            inner: NextInner::Terminal(Box::new(f)),
        }
    }

    /// The default terminal: the recorded rewrite if any, else pass-through.
    pub fn rewrite_or_pass() -> Self {
        Self::terminal(|ctx, _request| {
            let response = match ctx.rewrite() {
                Some(path) => RouteResponse::rewrite(path),
                None => RouteResponse::pass_through(),
            };
            Box::pin(async move { response })
        })
    }

    /// Runs the next stage, or the terminal handler.
    ///
    /// Consumes `self`, so it can only be called once.
    pub async fn run(self, ctx: &mut StageContext, request: &RouteRequest) -> RouteResponse {
        match self.inner {
            NextInner::Chain { stage, next } => {
                ctx.record_stage(stage.name());
                stage.process(ctx, request, *next).await
            }
            NextInner::Terminal(handler) => handler(ctx, request).await,
        }
    }
}
