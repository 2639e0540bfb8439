// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 集成测试辅助设施
//!
//! 用内存仓库和本地 mock 上游搭一套完整流水线。

use permitrs::config::settings::CrawlerSettings;
use permitrs::config::sources::{SourceRegistry, SourceSystem};
use permitrs::fetcher::Fetcher;
use permitrs::infrastructure::memory::{
    InMemoryCrawlRunRepository, InMemoryPermitRepository, InMemoryWorkUnitRepository,
};
use permitrs::orchestrator::{Orchestrator, RunReport};
use permitrs::store::UpsertStore;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

pub type TestOrchestrator = Orchestrator<
    InMemoryPermitRepository,
    InMemoryWorkUnitRepository,
    InMemoryCrawlRunRepository,
>;

pub struct Harness {
    pub orchestrator: Arc<TestOrchestrator>,
    pub store: Arc<UpsertStore<InMemoryPermitRepository>>,
    pub permits: Arc<InMemoryPermitRepository>,
    pub units: Arc<InMemoryWorkUnitRepository>,
    pub runs: Arc<InMemoryCrawlRunRepository>,
}

/// 测试用的爬取配置：极小退避、低重试预算
pub fn fast_settings() -> CrawlerSettings {
    CrawlerSettings {
        max_concurrent_workers: 4,
        requests_per_second_per_host: 500.0,
        max_retries: 1,
        backoff_base_ms: 1,
        request_timeout_ms: 2_000,
        unit_max_retries: 2,
    }
}

/// 指向 mock 服务器的 MCGBM 来源
pub fn mcgbm_source(server_uri: &str) -> SourceSystem {
    SourceSystem::Mcgbm {
        base_url: format!("{}/opendata/OpenDataSearchUrl.do", server_uri),
    }
}

/// 指向 mock 服务器的 NBUPIC 来源
pub fn nbupic_source(server_uri: &str) -> SourceSystem {
    SourceSystem::Nbupic {
        organ: "B10".to_string(),
        base_url: format!("{}/NBUPIC", server_uri),
    }
}

/// 指向 mock 服务器的高雄市来源
pub fn kaohsiung_source(server_uri: &str) -> SourceSystem {
    SourceSystem::Kaohsiung {
        base_url: format!("{}/bupic", server_uri),
    }
}

/// 组装一套基于内存仓库的完整流水线
pub fn harness(registry: SourceRegistry, settings: CrawlerSettings) -> Harness {
    let permits = Arc::new(InMemoryPermitRepository::new());
    let units = Arc::new(InMemoryWorkUnitRepository::new());
    let runs = Arc::new(InMemoryCrawlRunRepository::new());
    let store = Arc::new(UpsertStore::new(permits.clone()));
    let fetcher = Arc::new(Fetcher::new(&settings).expect("fetcher"));
    let orchestrator = Arc::new(Orchestrator::new(
        fetcher,
        store.clone(),
        units.clone(),
        runs.clone(),
        Arc::new(registry),
        settings,
    ));
    Harness {
        orchestrator,
        store,
        permits,
        units,
        runs,
    }
}

/// 构造一行 MCGBM 开放资料记录
pub fn mcgbm_row(oid: &str, permit_no: &str, issue_date: &str, applicant: &str) -> Value {
    json!({
        "_id": { "$oid": oid },
        "核發執照字號": permit_no,
        "發照日期": issue_date,
        "起造人代表人": applicant,
        "棟數": "1棟",
        "地上層數": "6",
        "工程造價": "($12,345,678)"
    })
}

/// 包装 MCGBM 响应信封
pub fn mcgbm_body(rows: Vec<Value>) -> String {
    json!({ "data": rows }).to_string()
}

/// 轮询批次状态直到终态，超时则 panic
pub async fn wait_terminal(orchestrator: &Arc<TestOrchestrator>, run_id: uuid::Uuid) -> RunReport {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let report = orchestrator.status(run_id).await.expect("run status");
        if report.run.status.is_terminal() {
            return report;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("run {} did not reach a terminal state", run_id);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
