// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_run::EnumerationSpec;
use crate::domain::repositories::crawl_run_repository::CrawlRunRepository;
use crate::domain::repositories::permit_repository::PermitRepository;
use crate::domain::repositories::work_unit_repository::WorkUnitRepository;
use crate::orchestrator::{FailedUnit, Orchestrator, RunReport};
use crate::presentation::errors::AppError;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// 批次触发响应
#[derive(Debug, Serialize)]
pub struct CrawlTriggeredDto {
    /// 批次ID
    pub run_id: Uuid,
}

/// 工作单元计数响应
#[derive(Debug, Serialize)]
pub struct UnitCountsDto {
    pub pending: u64,
    pub in_progress: u64,
    pub done: u64,
    pub failed: u64,
}

/// 失败工作单元摘要
#[derive(Debug, Serialize)]
pub struct FailedUnitDto {
    /// 工作单元键
    pub unit_key: String,
    /// 最后一次失败的错误信息
    pub last_error: Option<String>,
}

impl From<FailedUnit> for FailedUnitDto {
    fn from(unit: FailedUnit) -> Self {
        Self {
            unit_key: unit.unit_key,
            last_error: unit.last_error,
        }
    }
}

/// 批次状态响应
#[derive(Debug, Serialize)]
pub struct CrawlStatusDto {
    pub run_id: Uuid,
    pub status: String,
    pub spec: EnumerationSpec,
    pub created_records: i64,
    pub updated_records: i64,
    pub unchanged_records: i64,
    pub failed_units: i64,
    /// 永久失败的工作单元及其最后错误
    pub failed: Vec<FailedUnitDto>,
    pub units: UnitCountsDto,
    pub started_at: DateTime<FixedOffset>,
    pub finished_at: Option<DateTime<FixedOffset>>,
}

impl From<RunReport> for CrawlStatusDto {
    fn from(report: RunReport) -> Self {
        Self {
            run_id: report.run.id,
            status: report.run.status.to_string(),
            spec: report.run.spec,
            created_records: report.run.created_records,
            updated_records: report.run.updated_records,
            unchanged_records: report.run.unchanged_records,
            failed_units: report.run.failed_units,
            failed: report.failed.into_iter().map(FailedUnitDto::from).collect(),
            units: UnitCountsDto {
                pending: report.counts.pending,
                in_progress: report.counts.in_progress,
                done: report.counts.done,
                failed: report.counts.failed,
            },
            started_at: report.run.started_at,
            finished_at: report.run.finished_at,
        }
    }
}

/// 触发爬取批次
///
/// POST /v1/crawls，请求体为枚举策略。批次在后台调度，
/// 立即返回批次ID。
pub async fn trigger_crawl<P, W, C>(
    Extension(orchestrator): Extension<Arc<Orchestrator<P, W, C>>>,
    Json(spec): Json<EnumerationSpec>,
) -> Result<(StatusCode, Json<CrawlTriggeredDto>), AppError>
where
    P: PermitRepository + 'static,
    W: WorkUnitRepository + 'static,
    C: CrawlRunRepository + 'static,
{
    let run_id = orchestrator.trigger(spec).await?;
    Ok((StatusCode::ACCEPTED, Json(CrawlTriggeredDto { run_id })))
}

/// 查询批次状态
///
/// GET /v1/crawls/{id}
pub async fn get_crawl<P, W, C>(
    Extension(orchestrator): Extension<Arc<Orchestrator<P, W, C>>>,
    Path(run_id): Path<Uuid>,
) -> Result<Json<CrawlStatusDto>, AppError>
where
    P: PermitRepository + 'static,
    W: WorkUnitRepository + 'static,
    C: CrawlRunRepository + 'static,
{
    let report = orchestrator.status(run_id).await?;
    Ok(Json(report.into()))
}

/// 取消批次
///
/// DELETE /v1/crawls/{id}。取消是协作式的：在途单元跑完
/// 当前工作后停止派发，响应确认请求已受理。
pub async fn cancel_crawl<P, W, C>(
    Extension(orchestrator): Extension<Arc<Orchestrator<P, W, C>>>,
    Path(run_id): Path<Uuid>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError>
where
    P: PermitRepository + 'static,
    W: WorkUnitRepository + 'static,
    C: CrawlRunRepository + 'static,
{
    orchestrator.cancel(run_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "run_id": run_id, "status": "cancelling" })),
    ))
}
