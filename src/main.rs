// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use migration::{Migrator, MigratorTrait};
use permitrs::config::settings::Settings;
use permitrs::config::sources::SourceRegistry;
use permitrs::fetcher::Fetcher;
use permitrs::infrastructure::database::connection;
use permitrs::infrastructure::repositories::{
    CrawlRunRepositoryImpl, PermitRepositoryImpl, WorkUnitRepositoryImpl,
};
use permitrs::orchestrator::Orchestrator;
use permitrs::presentation::routes;
use permitrs::store::UpsertStore;
use permitrs::utils::telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动服务
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting permitrs...");

    // 2. Load configuration
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    // 3. Connect to database and run migrations
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    Migrator::up(db.as_ref(), None).await?;
    info!("Database ready");

    // 4. Initialize components
    let registry = Arc::new(SourceRegistry::default());
    let fetcher = Arc::new(Fetcher::new(&settings.crawler)?);
    let permit_repo = Arc::new(PermitRepositoryImpl::new(db.clone()));
    let unit_repo = Arc::new(WorkUnitRepositoryImpl::new(db.clone()));
    let run_repo = Arc::new(CrawlRunRepositoryImpl::new(db.clone()));
    let store = Arc::new(UpsertStore::new(permit_repo));
    let orchestrator = Arc::new(Orchestrator::new(
        fetcher,
        store.clone(),
        unit_repo,
        run_repo,
        registry,
        settings.crawler.clone(),
    ));

    // 5. Resume runs interrupted by the previous shutdown
    let resumed = orchestrator.resume_interrupted().await?;
    if resumed > 0 {
        info!(resumed, "interrupted crawl runs resumed");
    }

    // 6. Start HTTP server
    let app = routes::routes(orchestrator, store);
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
