// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 崩溃恢复集成测试
//!
//! 直接向进度表写入"进程崩溃现场"：Running 批次 +
//! 各状态混杂的工作单元，验证 resume_interrupted 能把
//! 批次推到终态且重放不产生重复记录。

use crate::helpers::{fast_settings, harness, mcgbm_body, mcgbm_row, mcgbm_source, wait_terminal};
use permitrs::domain::models::crawl_run::{CrawlRun, CrawlRunStatus, EnumerationSpec};
use permitrs::domain::models::work_unit::{WorkUnit, WorkUnitKind, WorkUnitStatus};
use permitrs::domain::repositories::crawl_run_repository::CrawlRunRepository;
use permitrs::domain::repositories::work_unit_repository::WorkUnitRepository;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn listing_unit(run_id: uuid::Uuid, page: u32) -> WorkUnit {
    WorkUnit::new(
        run_id,
        WorkUnitKind::ListingPage {
            authority: "新北市".to_string(),
            page,
            license_kind: "建造執照".to_string(),
            year: 2024,
        },
        2,
    )
}

#[tokio::test]
async fn test_resume_converges_interrupted_run() {
    let server = MockServer::start().await;
    let body = mcgbm_body(vec![
        mcgbm_row("a1", "113信建字第1號", "113/01/05", "甲"),
        mcgbm_row("a2", "113信建字第2號", "113/02/10", "乙"),
    ]);
    Mock::given(method("GET"))
        .and(path("/opendata/OpenDataSearchUrl.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let mut registry = permitrs::config::sources::SourceRegistry::default();
    registry.insert("新北市", mcgbm_source(&server.uri()));
    let h = harness(registry, fast_settings());

    // 崩溃现场：一个已完成单元、一个在途单元、一个待处理单元
    let run = CrawlRun::new(EnumerationSpec::PageRange {
        authority: "新北市".to_string(),
        year: 2024,
        start_page: 1,
        end_page: 3,
    });
    let run_id = run.id;
    h.runs.create(&run).await.unwrap();

    let done = listing_unit(run_id, 1).start().unwrap().complete().unwrap();
    let in_progress = listing_unit(run_id, 2).start().unwrap();
    let pending = listing_unit(run_id, 3);
    h.units
        .create_many(&[done, in_progress, pending])
        .await
        .unwrap();

    let resumed = h.orchestrator.resume_interrupted().await.unwrap();
    assert_eq!(resumed, 1);

    let report = wait_terminal(&h.orchestrator, run_id).await;
    assert_eq!(report.run.status, CrawlRunStatus::Completed);
    assert_eq!(report.counts.done, 3);
    assert_eq!(report.counts.in_progress, 0);

    // 在途单元被重置后重跑，不计入失败
    let failed = h
        .units
        .find_by_status(run_id, WorkUnitStatus::Failed)
        .await
        .unwrap();
    assert!(failed.is_empty());

    // 两个单元各解析到相同的2条记录，合并写入吸收重放
    assert_eq!(h.permits.len(), 2);
    assert_eq!(report.run.created_records, 2);
    assert_eq!(report.run.unchanged_records, 2);
}

#[tokio::test]
async fn test_resume_reruns_interrupted_unit_from_scratch() {
    let server = MockServer::start().await;
    let body = mcgbm_body(vec![mcgbm_row("a1", "113信建字第9號", "113/03/01", "丙")]);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let mut registry = permitrs::config::sources::SourceRegistry::default();
    registry.insert("新北市", mcgbm_source(&server.uri()));
    let h = harness(registry, fast_settings());

    let run = CrawlRun::new(EnumerationSpec::PageRange {
        authority: "新北市".to_string(),
        year: 2024,
        start_page: 1,
        end_page: 1,
    });
    let run_id = run.id;
    h.runs.create(&run).await.unwrap();

    let in_progress = listing_unit(run_id, 1).start().unwrap();
    let attempts_before = in_progress.attempt_count;
    h.units.create_many(&[in_progress]).await.unwrap();

    h.orchestrator.resume_interrupted().await.unwrap();
    let report = wait_terminal(&h.orchestrator, run_id).await;

    assert_eq!(report.run.status, CrawlRunStatus::Completed);
    assert_eq!(h.permits.len(), 1);

    // 重置不消耗重试预算，重跑的启动又计一次
    let done = h
        .units
        .find_by_status(run_id, WorkUnitStatus::Done)
        .await
        .unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].attempt_count, attempts_before + 1);
}

#[tokio::test]
async fn test_resume_with_no_running_runs_is_noop() {
    let registry = permitrs::config::sources::SourceRegistry::default();
    let h = harness(registry, fast_settings());
    let resumed = h.orchestrator.resume_interrupted().await.unwrap();
    assert_eq!(resumed, 0);
}
