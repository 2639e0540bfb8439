// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 抓取层集成测试：限速与重试语义

use crate::helpers::fast_settings;
use futures::future::join_all;
use permitrs::fetcher::{FetchError, Fetcher, PageRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn ok_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\":[]}"))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_per_host_rate_limit_spaces_requests() {
    let server = ok_server().await;

    // 每主机每秒20个请求，即50ms一个闸口
    let mut settings = fast_settings();
    settings.requests_per_second_per_host = 20.0;
    let fetcher = Arc::new(Fetcher::new(&settings).unwrap());

    let start = Instant::now();
    let fetches = (0..10).map(|i| {
        let fetcher = fetcher.clone();
        let url = server.uri();
        async move {
            fetcher
                .fetch(&format!("listing:新北市:2024:建造執照:p{}", i), &PageRequest::get(url))
                .await
        }
    });
    let results = join_all(fetches).await;
    let elapsed = start.elapsed();

    assert!(results.iter().all(Result::is_ok));
    // 首个请求立即放行，其余9个各等一个周期
    assert!(
        elapsed >= Duration::from_millis(400),
        "10 requests finished in {:?}, limiter not engaged",
        elapsed
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_hosts_have_independent_budgets() {
    let server_a = ok_server().await;
    let server_b = ok_server().await;

    let mut settings = fast_settings();
    settings.requests_per_second_per_host = 10.0;
    let fetcher = Arc::new(Fetcher::new(&settings).unwrap());

    let start = Instant::now();
    let fetches = (0..3)
        .flat_map(|i| {
            [server_a.uri(), server_b.uri()].map(|url| {
                let fetcher = fetcher.clone();
                let key = format!("date:竹科:2024-06-0{}", i + 1);
                async move { fetcher.fetch(&key, &PageRequest::get(url)).await }
            })
        })
        .collect::<Vec<_>>();
    let results = join_all(fetches).await;
    let elapsed = start.elapsed();

    assert!(results.iter().all(Result::is_ok));
    // 每主机3个请求约耗两个周期；共享预算则需五个周期以上
    assert!(
        elapsed < Duration::from_millis(450),
        "6 requests across 2 hosts took {:?}, budgets look shared",
        elapsed
    );
}

#[tokio::test]
async fn test_client_error_is_permanent_and_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut settings = fast_settings();
    settings.max_retries = 3;
    let fetcher = Fetcher::new(&settings).unwrap();

    let result = fetcher
        .fetch("detail:竹科:K1", &PageRequest::get(server.uri()))
        .await;
    assert!(matches!(result, Err(FetchError::Permanent { .. })));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_server_error_exhausts_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut settings = fast_settings();
    settings.max_retries = 3;
    let fetcher = Fetcher::new(&settings).unwrap();

    let result = fetcher
        .fetch("detail:竹科:K1", &PageRequest::get(server.uri()))
        .await;
    match result {
        Err(FetchError::Transient { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected transient exhaustion, got {:?}", other),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_invalid_url_fails_without_request() {
    let fetcher = Fetcher::new(&fast_settings()).unwrap();
    let result = fetcher
        .fetch("detail:竹科:K1", &PageRequest::get("not a url"))
        .await;
    assert!(matches!(result, Err(FetchError::Permanent { .. })));
}
