//! Pipeline behaviors: authorization and cache-aside

use std::time::Duration;

use kernel::error::app_error::{AppError, AppResult};
use serde_json::Value;

use super::context::RequestContext;
use super::{CachePolicy, Request};
use crate::cache::{CacheService, DEFAULT_TTL};

/// Who may dispatch a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRequirement {
    /// No check
    Public,
    /// Any authenticated principal
    Authenticated,
    /// Authenticated and holding one of the comma-separated roles
    /// (exact, case-sensitive match)
    Roles(&'static str),
}

impl AuthRequirement {
    pub fn check(&self, ctx: &RequestContext, request_name: &str) -> AppResult<()> {
        let roles = match self {
            AuthRequirement::Public => return Ok(()),
            AuthRequirement::Authenticated => None,
            AuthRequirement::Roles(roles) => Some(*roles),
        };

        let Some(principal) = ctx.principal() else {
            tracing::warn!(request = request_name, "Anonymous access to protected request");
            return Err(AppError::unauthorized("Not authorized"));
        };

        if let Some(roles) = roles {
            let allowed = roles
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .any(|r| r == principal.role);
            if !allowed {
                tracing::warn!(
                    request = request_name,
                    user_id = %principal.subject,
                    role = %principal.role,
                    required = roles,
                    "Role check failed"
                );
                return Err(AppError::forbidden(format!("Requires role: {}", roles)));
            }
        }

        Ok(())
    }
}

/// `{Name}:{key}` when a key is declared, otherwise
/// `{Name}:{field}={value}...` over the non-null serialized fields,
/// sorted by field name
pub fn cache_key<R: Request>(request: &R, policy: &CachePolicy) -> AppResult<String> {
    let mut key = String::from(R::NAME);

    if let Some(declared) = policy.key.as_deref().filter(|k| !k.is_empty()) {
        key.push(':');
        key.push_str(declared);
        return Ok(key);
    }

    let mut fields: Vec<(String, String)> = match serde_json::to_value(request)? {
        Value::Object(map) => map
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k, render(v)))
            .collect(),
        Value::Null => Vec::new(),
        other => vec![("value".to_string(), render(other))],
    };
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, value) in fields {
        key.push(':');
        key.push_str(&name);
        key.push('=');
        key.push_str(&value);
    }
    Ok(key)
}

fn render(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Cache-aside around `next`
///
/// A hit returns the stored response without running `next`. A miss runs
/// it and stores the result for the declared TTL (30 minutes by default).
pub async fn cached<R, F>(
    cache: &dyn CacheService,
    key: &str,
    ttl: Option<Duration>,
    next: F,
) -> AppResult<R::Response>
where
    R: Request,
    F: Future<Output = AppResult<R::Response>> + Send,
{
    if let Some(hit) = cache.get::<R::Response>(key).await {
        tracing::debug!(cache_key = key, "Cache hit");
        return Ok(hit);
    }
    tracing::debug!(cache_key = key, "Cache miss");

    let response = next.await?;

    if serde_json::to_value(&response)?.is_null() {
        return Err(AppError::internal("Response cannot be null"));
    }

    let ttl = ttl.unwrap_or(DEFAULT_TTL);
    cache.set(key, &response, Some(ttl)).await;
    tracing::debug!(cache_key = key, ttl_secs = ttl.as_secs(), "Response cached");

    Ok(response)
}
