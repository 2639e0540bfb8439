// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::crawl_run_repository::CrawlRunRepository;
use crate::domain::repositories::permit_repository::PermitRepository;
use crate::domain::repositories::work_unit_repository::WorkUnitRepository;
use crate::orchestrator::Orchestrator;
use crate::presentation::handlers::{crawl_handler, permit_handler};
use crate::store::UpsertStore;
use axum::extract::Extension;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// 创建应用路由
///
/// 编排器与存储经由Extension注入各处理器。
pub fn routes<P, W, C>(
    orchestrator: Arc<Orchestrator<P, W, C>>,
    store: Arc<UpsertStore<P>>,
) -> Router
where
    P: PermitRepository + 'static,
    W: WorkUnitRepository + 'static,
    C: CrawlRunRepository + 'static,
{
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/v1/version", get(version));

    let api_routes = Router::new()
        .route("/v1/crawls", post(crawl_handler::trigger_crawl::<P, W, C>))
        .route("/v1/crawls/{id}", get(crawl_handler::get_crawl::<P, W, C>))
        .route(
            "/v1/crawls/{id}",
            delete(crawl_handler::cancel_crawl::<P, W, C>),
        )
        .route("/v1/permits", get(permit_handler::list_permits::<P>))
        .route("/v1/permits/{key}", get(permit_handler::get_permit::<P>))
        .route(
            "/v1/permits/{key}/history",
            get(permit_handler::get_permit_history::<P>),
        );

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(Extension(orchestrator))
        .layer(Extension(store))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查端点
pub async fn health_check() -> &'static str {
    "OK"
}

/// 版本信息端点
pub async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
