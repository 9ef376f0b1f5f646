#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test, web, App};
    use chatgate::api::routes_openai;
    use chatgate::config::GatewayConfig;
    use chatgate::proxy::GatewayClient;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SSE_BODY: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: [DONE]\n\n",
    );

    fn gateway(url: Option<String>) -> web::Data<GatewayClient> {
        web::Data::new(GatewayClient::new(&GatewayConfig {
            url,
            api_key: Some("secret".to_string()),
        }))
    }

    macro_rules! app {
        ($gateway:expr) => {
            test::init_service(
                App::new()
                    .app_data($gateway)
                    .service(web::scope("/api/v1").configure(routes_openai::configure)),
            )
            .await
        };
    }

    fn completion(stream: bool) -> Value {
        json!({
            "model": "openai/gpt-4o",
            "messages": [{ "role": "user", "content": "hi" }],
            "stream": stream
        })
    }

    #[actix_web::test]
    async fn test_stream_is_relayed_byte_for_byte() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .and(header("accept", "text/event-stream"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(SSE_BODY.as_bytes().to_vec(), "text/event-stream"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let app = app!(gateway(Some(server.uri())));
        let req = test::TestRequest::post()
            .uri("/api/v1/chat/completions")
            .set_json(completion(true))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers().get("content-type").unwrap(), "text/event-stream");
        assert_eq!(resp.headers().get("cache-control").unwrap(), "no-cache, no-transform");
        assert_eq!(resp.headers().get("x-accel-buffering").unwrap(), "no");

        let body = test::read_body(resp).await;
        assert_eq!(body, SSE_BODY.as_bytes());
    }

    #[actix_web::test]
    async fn test_non_streaming_request_never_reaches_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let app = app!(gateway(Some(server.uri())));

        let req = test::TestRequest::post()
            .uri("/api/v1/chat/completions")
            .set_json(completion(false))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/v1/chat/completions")
            .set_json(json!({ "model": "m", "messages": [] }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/v1/chat/completions")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_missing_gateway_url() {
        let app = app!(gateway(None));
        let req = test::TestRequest::post()
            .uri("/api/v1/chat/completions")
            .set_json(completion(true))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Gateway URL configuration missing" }));
    }

    #[actix_web::test]
    async fn test_upstream_status_is_mirrored() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let app = app!(gateway(Some(server.uri())));
        let req = test::TestRequest::post()
            .uri("/api/v1/chat/completions")
            .set_json(completion(true))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], 429);
        assert!(body["error"].is_string());
    }

    #[actix_web::test]
    async fn test_empty_upstream_body_is_bad_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let app = app!(gateway(Some(server.uri())));
        let req = test::TestRequest::post()
            .uri("/api/v1/chat/completions")
            .set_json(completion(true))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[actix_web::test]
    async fn test_transport_fault_is_bad_gateway() {
        // Nothing listens on port 9 of the loopback interface.
        let app = app!(gateway(Some("http://127.0.0.1:9".to_string())));
        let req = test::TestRequest::post()
            .uri("/api/v1/chat/completions")
            .set_json(completion(true))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[actix_web::test]
    async fn test_models_passthrough() {
        let server = MockServer::start().await;
        let models = json!({ "object": "list", "data": [{ "id": "openai/gpt-4o" }] });
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(models.clone()))
            .mount(&server)
            .await;

        let app = app!(gateway(Some(server.uri())));
        let req = test::TestRequest::get().uri("/api/v1/models").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, models);
    }

    #[actix_web::test]
    async fn test_models_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let app = app!(gateway(Some(server.uri())));
        let req = test::TestRequest::get().uri("/api/v1/models").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Failed to fetch models from inference gateway" }));
    }
}
