//! Request Pipeline
//!
//! Every command and query is a [`Request`] dispatched through the
//! [`Mediator`] to the single [`RequestHandler`] registered for its type.
//! Behaviors wrap the handler in a fixed order:
//!
//! 1. authorization ([`AuthRequirement`])
//! 2. validation ([`Request::validate`])
//! 3. caching (only when [`Request::cache_policy`] returns a policy)
//! 4. handler

pub mod behavior;
pub mod context;
pub mod validation;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kernel::error::app_error::{AppError, AppResult};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::cache::CacheService;

pub use behavior::{AuthRequirement, cache_key};
pub use context::{Principal, RequestContext};
pub use validation::{FieldError, ValidationErrors};

/// Opt-in response caching for a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Explicit key suffix; derived from the request's fields when `None`
    pub key: Option<String>,
    /// Absolute lifetime; 30 minutes when `None`
    pub ttl: Option<Duration>,
}

impl CachePolicy {
    pub fn derived() -> Self {
        Self::default()
    }

    pub fn keyed(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// A command or query
pub trait Request: Serialize + Send + Sync + 'static {
    type Response: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Stable name, used as the cache key prefix
    const NAME: &'static str;

    const AUTH: AuthRequirement = AuthRequirement::Public;

    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }

    fn cache_policy(&self) -> Option<CachePolicy> {
        None
    }
}

#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync + 'static {
    async fn handle(&self, request: R, ctx: &RequestContext) -> AppResult<R::Response>;
}

/// Dispatches requests to their registered handler through the behaviors
#[derive(Clone)]
pub struct Mediator {
    handlers: Arc<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    cache: Arc<dyn CacheService>,
}

/// Collects handlers before the mediator is frozen
pub struct MediatorBuilder {
    handlers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    cache: Arc<dyn CacheService>,
}

impl MediatorBuilder {
    /// Register the handler for `R`, replacing any earlier one
    pub fn register<R, H>(mut self, handler: H) -> Self
    where
        R: Request,
        H: RequestHandler<R>,
    {
        let handler: Arc<dyn RequestHandler<R>> = Arc::new(handler);
        self.handlers.insert(TypeId::of::<R>(), Box::new(handler));
        self
    }

    pub fn build(self) -> Mediator {
        Mediator {
            handlers: Arc::new(self.handlers),
            cache: self.cache,
        }
    }
}

impl Mediator {
    pub fn builder(cache: Arc<dyn CacheService>) -> MediatorBuilder {
        MediatorBuilder {
            handlers: HashMap::new(),
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<dyn CacheService> {
        &self.cache
    }

    pub async fn send<R: Request>(&self, request: R, ctx: &RequestContext) -> AppResult<R::Response> {
        let handler = self
            .handlers
            .get(&TypeId::of::<R>())
            .and_then(|h| h.downcast_ref::<Arc<dyn RequestHandler<R>>>())
            .cloned()
            .ok_or_else(|| {
                tracing::error!(request = R::NAME, "No handler registered");
                AppError::internal(format!("No handler registered for {}", R::NAME))
            })?;

        R::AUTH.check(ctx, R::NAME)?;

        if let Err(errors) = request.validate() {
            tracing::debug!(request = R::NAME, errors = %errors, "Validation failed");
            return Err(errors.into());
        }

        let Some(policy) = request.cache_policy() else {
            return handler.handle(request, ctx).await;
        };

        let key = cache_key(&request, &policy)?;
        behavior::cached::<R, _>(
            self.cache.as_ref(),
            &key,
            policy.ttl,
            handler.handle(request, ctx),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheService;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Serialize)]
    struct Echo {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    }

    impl Request for Echo {
        type Response = String;
        const NAME: &'static str = "EchoQuery";

        fn validate(&self) -> Result<(), ValidationErrors> {
            let mut v = ValidationErrors::new();
            v.required("text", &self.text, "Text is required.");
            v.into_result()
        }

        fn cache_policy(&self) -> Option<CachePolicy> {
            Some(CachePolicy::derived())
        }
    }

    #[derive(Serialize)]
    struct AdminOnly;

    impl Request for AdminOnly {
        type Response = u32;
        const NAME: &'static str = "AdminOnlyQuery";
        const AUTH: AuthRequirement = AuthRequirement::Roles("Admin");
    }

    #[derive(Serialize)]
    struct Nothing;

    impl Request for Nothing {
        type Response = Option<u8>;
        const NAME: &'static str = "NothingQuery";

        fn cache_policy(&self) -> Option<CachePolicy> {
            Some(CachePolicy::keyed("none"))
        }
    }

    #[derive(Clone, Default)]
    struct Counter(Arc<AtomicUsize>);

    impl Counter {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RequestHandler<Echo> for Counter {
        async fn handle(&self, request: Echo, _ctx: &RequestContext) -> AppResult<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(request.text.to_uppercase())
        }
    }

    #[async_trait]
    impl RequestHandler<AdminOnly> for Counter {
        async fn handle(&self, _request: AdminOnly, _ctx: &RequestContext) -> AppResult<u32> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        }
    }

    #[async_trait]
    impl RequestHandler<Nothing> for Counter {
        async fn handle(&self, _request: Nothing, _ctx: &RequestContext) -> AppResult<Option<u8>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    fn mediator(counter: &Counter) -> Mediator {
        Mediator::builder(Arc::new(MemoryCacheService::default()))
            .register::<Echo, _>(counter.clone())
            .register::<AdminOnly, _>(counter.clone())
            .register::<Nothing, _>(counter.clone())
            .build()
    }

    fn user(role: &str) -> RequestContext {
        RequestContext::authenticated(Principal {
            subject: "u1".into(),
            role: role.into(),
            token_id: "jti".into(),
        })
    }

    #[test]
    fn test_cache_key_is_sorted_and_skips_nulls() {
        let request = Echo {
            text: "hi".into(),
            tag: None,
        };
        assert_eq!(cache_key(&request, &CachePolicy::derived()).unwrap(), "EchoQuery:text=hi");

        let tagged = Echo {
            text: "hi".into(),
            tag: Some("t".into()),
        };
        assert_eq!(
            cache_key(&tagged, &CachePolicy::derived()).unwrap(),
            "EchoQuery:tag=t:text=hi"
        );
        assert_eq!(
            cache_key(&tagged, &CachePolicy::keyed("fixed")).unwrap(),
            "EchoQuery:fixed"
        );
        assert_eq!(cache_key(&AdminOnly, &CachePolicy::derived()).unwrap(), "AdminOnlyQuery");
    }

    #[tokio::test]
    async fn test_second_send_is_served_from_cache() {
        let counter = Counter::default();
        let mediator = mediator(&counter);
        let ctx = RequestContext::anonymous();

        let first = mediator
            .send(Echo { text: "hi".into(), tag: None }, &ctx)
            .await
            .unwrap();
        let second = mediator
            .send(Echo { text: "hi".into(), tag: None }, &ctx)
            .await
            .unwrap();

        assert_eq!(first, "HI");
        assert_eq!(second, "HI");
        assert_eq!(counter.count(), 1);
        assert_eq!(
            mediator.cache().get::<String>("EchoQuery:text=hi").await.as_deref(),
            Some("HI")
        );
    }

    #[tokio::test]
    async fn test_authorization_runs_before_handler() {
        let counter = Counter::default();
        let mediator = mediator(&counter);

        let err = mediator.send(AdminOnly, &RequestContext::anonymous()).await.unwrap_err();
        assert_eq!(err.status_code(), 401);

        let err = mediator.send(AdminOnly, &user("User")).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
        assert_eq!(counter.count(), 0);

        assert_eq!(mediator.send(AdminOnly, &user("Admin")).await.unwrap(), 7);
        assert_eq!(counter.count(), 1);
    }

    #[tokio::test]
    async fn test_validation_failure_skips_handler() {
        let counter = Counter::default();
        let mediator = mediator(&counter);

        let err = mediator
            .send(Echo { text: "  ".into(), tag: None }, &RequestContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(counter.count(), 0);
    }

    #[tokio::test]
    async fn test_null_response_is_not_cached() {
        let counter = Counter::default();
        let mediator = mediator(&counter);

        let err = mediator.send(Nothing, &RequestContext::anonymous()).await.unwrap_err();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.message(), "Response cannot be null");
        assert_eq!(mediator.cache().get_raw("NothingQuery:none").await, None);
    }

    #[tokio::test]
    async fn test_unregistered_request_is_internal_error() {
        let mediator = Mediator::builder(Arc::new(MemoryCacheService::default())).build();
        let err = mediator
            .send(Echo { text: "x".into(), tag: None }, &RequestContext::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 500);
    }
}
