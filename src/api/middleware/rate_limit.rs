use std::future::{ready, Future, Ready};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderMap, HeaderName, HeaderValue},
    Error, HttpResponse,
};
use chrono::Utc;
use serde_json::json;
use tracing::warn;

use crate::config::RateLimitConfig;
use crate::ratelimit::{RateLimitResult, RateLimiter, RateLimiterConfig};

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RESET_HEADER: &str = "x-ratelimit-reset";

/// Rejects requests over the configured window budget with `429`.
///
/// A disabled instance passes everything through untouched.
#[derive(Clone)]
pub struct RateLimit {
    limiter: Option<Arc<RateLimiter>>,
}

impl RateLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter: Some(limiter),
        }
    }

    pub fn disabled() -> Self {
        Self { limiter: None }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::new(Arc::new(RateLimiter::new(RateLimiterConfig {
            window: Duration::from_millis(config.window_ms),
            max_requests: config.max_requests,
            key_generator: None,
        })))
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddleware {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: Option<Arc<RateLimiter>>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();

        let Some(limiter) = self.limiter.as_ref() else {
            return Box::pin(async move { Ok(srv.call(req).await?.map_into_left_body()) });
        };

        let limit = limiter.max_requests();
        let result = limiter.check_limit(req.headers());

        if !result.allowed {
            warn!(path = %req.path(), reset_time = %result.reset_time, "Rate limit exceeded");

            let mut response = HttpResponse::TooManyRequests().json(json!({
                "error": "Too Many Requests",
                "message": "Rate limit exceeded. Please try again later."
            }));
            apply_headers(response.headers_mut(), limit, &result);
            let retry_after = seconds_until(&result).to_string();
            if let Ok(value) = HeaderValue::from_str(&retry_after) {
                response
                    .headers_mut()
                    .insert(actix_web::http::header::RETRY_AFTER, value);
            }

            return Box::pin(async move { Ok(req.into_response(response).map_into_right_body()) });
        }

        Box::pin(async move {
            let mut res = srv.call(req).await?;
            apply_headers(res.headers_mut(), limit, &result);
            Ok(res.map_into_left_body())
        })
    }
}

/// Whole seconds until the window resets, rounded up.
fn seconds_until(result: &RateLimitResult) -> i64 {
    let millis = (result.reset_time - Utc::now()).num_milliseconds().max(0);
    (millis + 999) / 1000
}

fn apply_headers(headers: &mut HeaderMap, limit: u32, result: &RateLimitResult) {
    let reset_epoch = (result.reset_time.timestamp_millis() + 999) / 1000;
    let values = [
        (LIMIT_HEADER, limit.to_string()),
        (REMAINING_HEADER, result.remaining.to_string()),
        (RESET_HEADER, reset_epoch.to_string()),
    ];
    for (name, value) in values {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
}
