#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::{http::StatusCode, test, web, App, HttpResponse};
    use chatgate::api::middleware::RateLimit;
    use chatgate::config::RateLimitConfig;
    use chatgate::ratelimit::{RateLimiter, RateLimiterConfig};
    use serde_json::{json, Value};

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().json(json!({ "ok": true }))
    }

    fn limited(max_requests: u32) -> RateLimit {
        RateLimit::new(Arc::new(RateLimiter::new(RateLimiterConfig {
            window: Duration::from_secs(60),
            max_requests,
            key_generator: None,
        })))
    }

    #[actix_web::test]
    async fn test_disabled_never_rejects() {
        let app = test::init_service(
            App::new().service(
                web::scope("/api/v1")
                    .wrap(RateLimit::from_config(&RateLimitConfig::default()))
                    .route("/ping", web::get().to(ok)),
            ),
        )
        .await;

        for _ in 0..100 {
            let req = test::TestRequest::get()
                .uri("/api/v1/ping")
                .insert_header(("x-forwarded-for", "10.0.0.1"))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert!(resp.headers().get("x-ratelimit-limit").is_none());
        }
    }

    #[actix_web::test]
    async fn test_third_request_is_rejected() {
        let app = test::init_service(
            App::new().service(
                web::scope("/api/v1")
                    .wrap(limited(2))
                    .route("/ping", web::get().to(ok)),
            ),
        )
        .await;

        let request = || {
            test::TestRequest::get()
                .uri("/api/v1/ping")
                .insert_header(("x-forwarded-for", "10.0.0.1"))
                .to_request()
        };

        let first = test::call_service(&app, request()).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers().get("x-ratelimit-limit").unwrap(), "2");
        assert_eq!(first.headers().get("x-ratelimit-remaining").unwrap(), "1");

        let second = test::call_service(&app, request()).await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers().get("x-ratelimit-remaining").unwrap(), "0");

        let third = test::call_service(&app, request()).await;
        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(third.headers().get("x-ratelimit-remaining").unwrap(), "0");
        assert!(third.headers().get("x-ratelimit-reset").is_some());

        let retry_after: i64 = third
            .headers()
            .get("retry-after")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(retry_after > 0 && retry_after <= 60);

        let body: Value = test::read_body_json(third).await;
        assert_eq!(
            body,
            json!({
                "error": "Too Many Requests",
                "message": "Rate limit exceeded. Please try again later."
            })
        );

        // A different client still has its own budget.
        let other = test::TestRequest::get()
            .uri("/api/v1/ping")
            .insert_header(("x-forwarded-for", "10.0.0.2"))
            .to_request();
        assert_eq!(test::call_service(&app, other).await.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_enabled_from_config() {
        let config = RateLimitConfig {
            enabled: true,
            window_ms: 60_000,
            max_requests: 1,
        };
        let app = test::init_service(
            App::new().service(
                web::scope("/api/v1")
                    .wrap(RateLimit::from_config(&config))
                    .route("/ping", web::get().to(ok)),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/ping").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        let req = test::TestRequest::get().uri("/api/v1/ping").to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[actix_web::test]
    async fn test_health_is_outside_the_limited_scope() {
        let app = test::init_service(
            App::new().configure(chatgate::api::configure(limited(1))),
        )
        .await;

        for _ in 0..3 {
            let req = test::TestRequest::get().uri("/health").to_request();
            assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        }
    }
}
