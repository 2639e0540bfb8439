// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 流水线端到端集成测试
//!
//! mock 上游 + 内存仓库，驱动 抓取 → 解析 → 标准化 →
//! 合并写入 全链路。

use crate::helpers::{
    fast_settings, harness, kaohsiung_source, mcgbm_body, mcgbm_row, mcgbm_source, nbupic_source,
    wait_terminal,
};
use chrono::NaiveDate;
use permitrs::config::sources::SourceRegistry;
use permitrs::domain::models::crawl_run::{CrawlRunStatus, EnumerationSpec};
use permitrs::domain::repositories::permit_repository::{Page, PermitFilter};
use permitrs::orchestrator::OrchestratorError;
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn page_range(authority: &str) -> EnumerationSpec {
    EnumerationSpec::PageRange {
        authority: authority.to_string(),
        year: 2024,
        start_page: 1,
        end_page: 1,
    }
}

#[tokio::test]
async fn test_mcgbm_pipeline_end_to_end() {
    let server = MockServer::start().await;
    // 三行完整记录加一行缺执照字号的残缺记录
    let body = mcgbm_body(vec![
        mcgbm_row("a1", "113信建字第1號", "113/01/05", "甲"),
        mcgbm_row("a2", "113信建字第2號", "113/02/10", "乙"),
        mcgbm_row("a3", "113使字第3號", "113/03/15", "丙"),
        json!({ "_id": { "$oid": "a4" }, "發照日期": "113/04/01" }),
    ]);
    Mock::given(method("GET"))
        .and(path("/opendata/OpenDataSearchUrl.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let mut registry = SourceRegistry::default();
    registry.insert("新北市", mcgbm_source(&server.uri()));
    let h = harness(registry, fast_settings());

    let run_id = h.orchestrator.trigger(page_range("新北市")).await.unwrap();
    let report = wait_terminal(&h.orchestrator, run_id).await;

    // 两个执照类别各查一页，内容相同：残缺行被排除，
    // 第一单元创建，第二单元全部未变更
    assert_eq!(report.run.status, CrawlRunStatus::Completed);
    assert_eq!(report.run.created_records, 3);
    assert_eq!(report.run.unchanged_records, 3);
    assert_eq!(report.run.updated_records, 0);
    assert_eq!(report.run.failed_units, 0);
    assert_eq!(report.counts.done, 2);
    assert_eq!(h.permits.len(), 3);

    // 查询面拿到的就是标准化后的记录
    let hits = h
        .store
        .query(
            &PermitFilter {
                authority: Some("新北市".to_string()),
                date_from: NaiveDate::from_ymd_opt(2024, 2, 1),
                ..PermitFilter::default()
            },
            Page::default(),
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].permit_no, "113使字第3號");
    assert_eq!(hits[0].construction_cost, Some(12_345_678));
}

fn nbupic_detail_html(permit_no: &str) -> String {
    format!(
        r#"<html><body>
        <div class="main-header"><table><tr>
            <td>執照字號</td><td>{}</td>
            <td>發照日期：</td><td>113/06/01</td>
            <td>起造人</td><td>某公司</td>
            <td>層棧戶數</td><td>1棟，地上10層，地下2層，共20戶</td>
        </tr></table></div>
        </body></html>"#,
        permit_no
    )
}

#[tokio::test]
async fn test_nbupic_date_slice_follows_details() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/NBUPIC/nbupic_lst.jsp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
            <a onclick="run_button('K1','x')">1</a>
            <a onclick="run_button('K2','x')">2</a>
            </body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/NBUPIC/licInfo.jsp"))
        .and(body_string_contains("IndexKey=K1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(nbupic_detail_html("113建字第0001號")),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/NBUPIC/licInfo.jsp"))
        .and(body_string_contains("IndexKey=K2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(nbupic_detail_html("113使字第0002號")),
        )
        .mount(&server)
        .await;

    let mut registry = SourceRegistry::default();
    registry.insert("竹科", nbupic_source(&server.uri()));
    let h = harness(registry, fast_settings());

    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let run_id = h
        .orchestrator
        .trigger(EnumerationSpec::DateWindow {
            authority: "竹科".to_string(),
            start_date: date,
            end_date: date,
        })
        .await
        .unwrap();
    let report = wait_terminal(&h.orchestrator, run_id).await;

    // 日期切片发现两条详情并在同一批次内跟进
    assert_eq!(report.run.status, CrawlRunStatus::Completed);
    assert_eq!(report.counts.done, 3);
    assert_eq!(report.run.created_records, 2);
    assert_eq!(h.permits.len(), 2);

    let key = permitrs::domain::models::permit::PermitRecord::derive_natural_key(
        "竹科",
        "113建字第0001號",
    );
    let stored = h.store.find_by_key(&key).await.unwrap().unwrap();
    assert_eq!(stored.floors_above, 10);
    assert_eq!(stored.units, 20);
    assert_eq!(
        stored.issue_date,
        NaiveDate::from_ymd_opt(2024, 6, 1)
    );
}

#[tokio::test]
async fn test_upstream_errors_exhaust_retries_and_degrade_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/opendata/OpenDataSearchUrl.do"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut registry = SourceRegistry::default();
    registry.insert("新北市", mcgbm_source(&server.uri()));
    let h = harness(registry, fast_settings());

    let run_id = h.orchestrator.trigger(page_range("新北市")).await.unwrap();
    let report = wait_terminal(&h.orchestrator, run_id).await;

    assert_eq!(report.run.status, CrawlRunStatus::Degraded);
    assert_eq!(report.run.failed_units, 2);
    assert_eq!(report.counts.failed, 2);
    assert!(h.permits.is_empty());

    // 状态报告带回失败单元键与最后错误，便于定位
    assert_eq!(report.failed.len(), 2);
    for failure in &report.failed {
        assert!(failure.unit_key.starts_with("listing:新北市:"));
        let message = failure.last_error.as_deref().unwrap();
        assert!(message.contains("500"), "unexpected error: {message}");
    }
}

#[tokio::test]
async fn test_page_with_only_invalid_records_fails_unit() {
    let server = MockServer::start().await;
    // 解析成功但全部缺执照字号：按结构漂移处理
    let body = mcgbm_body(vec![json!({ "_id": { "$oid": "z1" }, "發照日期": "113/04/01" })]);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let mut registry = SourceRegistry::default();
    registry.insert("新北市", mcgbm_source(&server.uri()));
    let h = harness(registry, fast_settings());

    let run_id = h.orchestrator.trigger(page_range("新北市")).await.unwrap();
    let report = wait_terminal(&h.orchestrator, run_id).await;

    assert_eq!(report.run.status, CrawlRunStatus::Degraded);
    assert_eq!(report.counts.failed, 2);
}

#[tokio::test]
async fn test_unknown_authority_is_rejected() {
    let h = harness(SourceRegistry::default(), fast_settings());
    let result = h.orchestrator.trigger(page_range("不存在的城市")).await;
    assert!(matches!(
        result,
        Err(OrchestratorError::UnknownAuthority(_))
    ));
}

#[tokio::test]
async fn test_store_outage_degrades_run() {
    let server = MockServer::start().await;
    let body = mcgbm_body(vec![mcgbm_row("a1", "113信建字第1號", "113/01/05", "甲")]);
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;

    let mut registry = SourceRegistry::default();
    registry.insert("新北市", mcgbm_source(&server.uri()));
    let h = harness(registry, fast_settings());
    h.permits.set_unavailable(true);

    let run_id = h.orchestrator.trigger(page_range("新北市")).await.unwrap();
    let report = wait_terminal(&h.orchestrator, run_id).await;

    // 存储不可用停止派发，未完成的单元计入失败数
    assert_eq!(report.run.status, CrawlRunStatus::Degraded);
    assert_eq!(report.run.failed_units, 2);
    assert_eq!(report.counts.done, 0);
}

#[tokio::test]
async fn test_cancellation_stops_dispatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/NBUPIC/nbupic_lst.jsp"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body></body></html>")
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let mut registry = SourceRegistry::default();
    registry.insert("竹科", nbupic_source(&server.uri()));
    let h = harness(registry, fast_settings());

    let run_id = h
        .orchestrator
        .trigger(EnumerationSpec::DateWindow {
            authority: "竹科".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    h.orchestrator.cancel(run_id).await.unwrap();
    let report = wait_terminal(&h.orchestrator, run_id).await;

    assert_eq!(report.run.status, CrawlRunStatus::Cancelled);
    // 30个日期切片不可能全部跑完
    assert!(report.counts.pending > 0);

    // 终态批次不可重复取消
    assert!(matches!(
        h.orchestrator.cancel(run_id).await,
        Err(OrchestratorError::RunAlreadyFinished(_))
    ));
}

#[tokio::test]
async fn test_cancellation_interrupts_in_flight_fetch() {
    let server = MockServer::start().await;
    // 上游响应远慢于取消信号
    Mock::given(method("POST"))
        .and(path("/NBUPIC/nbupic_lst.jsp"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body></body></html>")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut registry = SourceRegistry::default();
    registry.insert("竹科", nbupic_source(&server.uri()));
    let h = harness(registry, fast_settings());

    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let started = Instant::now();
    let run_id = h
        .orchestrator
        .trigger(EnumerationSpec::DateWindow {
            authority: "竹科".to_string(),
            start_date: date,
            end_date: date,
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    h.orchestrator.cancel(run_id).await.unwrap();
    let report = wait_terminal(&h.orchestrator, run_id).await;

    // 在途抓取被中断，批次立即落终态而不是等上游超时
    assert_eq!(report.run.status, CrawlRunStatus::Cancelled);
    assert!(started.elapsed() < Duration::from_millis(1500));

    // 被中断的单元退回 pending，未计入失败
    assert_eq!(report.counts.pending, 1);
    assert_eq!(report.counts.in_progress, 0);
    assert_eq!(report.counts.failed, 0);
}

#[tokio::test]
async fn test_empty_listing_page_skips_later_pages() {
    let server = MockServer::start().await;
    // 只有第一页有数据，之后的页全部为空
    let body = mcgbm_body(vec![mcgbm_row("a1", "113信建字第1號", "113/01/05", "甲")]);
    Mock::given(method("GET"))
        .and(path("/opendata/OpenDataSearchUrl.do"))
        .and(query_param("Start", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/opendata/OpenDataSearchUrl.do"))
        .respond_with(ResponseTemplate::new(200).set_body_string(mcgbm_body(vec![])))
        .mount(&server)
        .await;

    let mut registry = SourceRegistry::default();
    registry.insert("新北市", mcgbm_source(&server.uri()));
    let mut settings = fast_settings();
    settings.max_concurrent_workers = 1;
    let h = harness(registry, settings);

    let run_id = h
        .orchestrator
        .trigger(EnumerationSpec::PageRange {
            authority: "新北市".to_string(),
            year: 2024,
            start_page: 1,
            end_page: 9,
        })
        .await
        .unwrap();
    let report = wait_terminal(&h.orchestrator, run_id).await;

    // 两类执照各9页共18个单元，空页之后的页不再访问上游
    assert_eq!(report.run.status, CrawlRunStatus::Completed);
    assert_eq!(report.counts.done, 18);
    assert_eq!(report.counts.failed, 0);
    let requests = server.received_requests().await.unwrap();
    assert!(
        requests.len() < 18,
        "expected short-circuit, got {} requests",
        requests.len()
    );
}

#[tokio::test]
async fn test_kaohsiung_date_slice_follows_details() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bupic/pages/jsapi/querylic"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            json!([
                { "dkey": "KH-001", "licdate": "1130601" },
                { "dkey": "KH-002", "licdate": "1130601" }
            ])
            .to_string(),
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bupic/pages/jsapi/getLicenseInfo"))
        .and(body_string_contains("key=KH-001"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            json!({
                "license_desc": "113高市工建築字第00001號",
                "IDlicedate": "113/06/01",
                "buildfloor": "1棟，地上15層，地下3層，共60戶",
                "bmp02_name": "張三"
            })
            .to_string(),
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bupic/pages/jsapi/getLicenseInfo"))
        .and(body_string_contains("key=KH-002"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            json!({
                "license_desc": "113高市工建使字第00002號",
                "IDlicedate": "113/06/01"
            })
            .to_string(),
        ))
        .mount(&server)
        .await;

    let mut registry = SourceRegistry::default();
    registry.insert("高雄市", kaohsiung_source(&server.uri()));
    let h = harness(registry, fast_settings());

    let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let run_id = h
        .orchestrator
        .trigger(EnumerationSpec::DateWindow {
            authority: "高雄市".to_string(),
            start_date: date,
            end_date: date,
        })
        .await
        .unwrap();
    let report = wait_terminal(&h.orchestrator, run_id).await;

    // 日期切片发现两条详情并在同一批次内跟进
    assert_eq!(report.run.status, CrawlRunStatus::Completed);
    assert_eq!(report.counts.done, 3);
    assert_eq!(report.run.created_records, 2);

    let key = permitrs::domain::models::permit::PermitRecord::derive_natural_key(
        "高雄市",
        "113高市工建築字第00001號",
    );
    let stored = h.store.find_by_key(&key).await.unwrap().unwrap();
    assert_eq!(stored.floors_above, 15);
    assert_eq!(stored.floors_below, 3);
    assert_eq!(stored.units, 60);
    assert_eq!(stored.issue_date, NaiveDate::from_ymd_opt(2024, 6, 1));
}
