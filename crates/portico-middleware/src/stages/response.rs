//! Terminal response decoration.

use crate::context::StageContext;
use crate::stage::{BoxFuture, Next, Stage};
use http::header::{HeaderValue, CACHE_CONTROL};
use portico_core::{RouteRequest, RouteResponse, REQUEST_ID_HEADER};

/// Attaches `cache-control: no-store` and `x-request-id` to whatever the
/// rest of the chain decided. Never changes the decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseStage;

impl ResponseStage {
    /// Creates the stage.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Stage for ResponseStage {
    fn name(&self) -> &'static str {
        "response"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut StageContext,
        request: &'a RouteRequest,
        next: Next<'a>,
    ) -> BoxFuture<'a, RouteResponse> {
        Box::pin(async move {
            let mut response = next.run(ctx, request).await;

            let headers = response.headers_mut();
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
            if let Ok(value) = HeaderValue::from_str(&ctx.request_id().to_string()) {
                headers.insert(REQUEST_ID_HEADER, value);
            }

            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::StageChain;
    use portico_core::RouteDecision;

    #[tokio::test]
    async fn test_adds_headers_without_changing_decision() {
        let chain = StageChain::builder("test").stage(ResponseStage::new()).build();
        let mut ctx = StageContext::new();
        ctx.set_rewrite("/dashboard/idir/cas_admin");

        let response = chain.process(&mut ctx, &RouteRequest::new("/dashboard")).await;

        assert_eq!(
            response.decision(),
            &RouteDecision::Rewrite("/dashboard/idir/cas_admin".to_string())
        );
        assert_eq!(response.headers()[CACHE_CONTROL], "no-store");
        assert_eq!(
            response.headers()[REQUEST_ID_HEADER],
            ctx.request_id().to_string().as_str()
        );
    }
}
