// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::change_event::ChangeEvent;
use crate::domain::models::permit::{LicenseKind, PermitRecord};
use crate::domain::repositories::permit_repository::{
    Page, PermitFilter, PermitRepository, RepositoryError,
};
use crate::presentation::errors::{AppError, BadRequest};
use crate::store::UpsertStore;
use axum::extract::{Extension, Path, Query};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 执照查询参数
#[derive(Debug, Default, Deserialize)]
pub struct PermitQueryDto {
    /// 按发照机关过滤
    pub authority: Option<String>,
    /// 发照日期下界（含），ISO格式
    pub date_from: Option<NaiveDate>,
    /// 发照日期上界（含），ISO格式
    pub date_to: Option<NaiveDate>,
    /// 按执照类别过滤：construction/occupancy/other
    pub kind: Option<String>,
    /// 对执照字号、地址、起造人的子串匹配
    pub q: Option<String>,
    /// 页码，从1开始
    pub page: Option<u64>,
    /// 每页条数
    pub per_page: Option<u64>,
}

/// 执照列表响应
#[derive(Debug, Serialize)]
pub struct PermitListDto {
    pub page: u64,
    pub per_page: u64,
    pub permits: Vec<PermitRecord>,
}

/// 变更历史响应
#[derive(Debug, Serialize)]
pub struct PermitHistoryDto {
    pub natural_key: String,
    pub events: Vec<ChangeEvent>,
}

/// 查询执照
///
/// GET /v1/permits，按发照日期降序分页返回。
pub async fn list_permits<P>(
    Extension(store): Extension<Arc<UpsertStore<P>>>,
    Query(params): Query<PermitQueryDto>,
) -> Result<Json<PermitListDto>, AppError>
where
    P: PermitRepository + 'static,
{
    let kind = match params.kind.as_deref() {
        Some(raw) => Some(
            raw.parse::<LicenseKind>()
                .map_err(|_| BadRequest(format!("invalid license kind: {}", raw)))?,
        ),
        None => None,
    };

    let filter = PermitFilter {
        authority: params.authority,
        date_from: params.date_from,
        date_to: params.date_to,
        kind,
        text: params.q,
    };
    let defaults = Page::default();
    let page = Page {
        page: params.page.unwrap_or(defaults.page).max(1),
        per_page: params.per_page.unwrap_or(defaults.per_page).clamp(1, 200),
    };

    let permits = store.query(&filter, page).await?;
    Ok(Json(PermitListDto {
        page: page.page,
        per_page: page.per_page,
        permits,
    }))
}

/// 查询单条执照
///
/// GET /v1/permits/{key}
pub async fn get_permit<P>(
    Extension(store): Extension<Arc<UpsertStore<P>>>,
    Path(natural_key): Path<String>,
) -> Result<Json<PermitRecord>, AppError>
where
    P: PermitRepository + 'static,
{
    let record = store
        .find_by_key(&natural_key)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    Ok(Json(record))
}

/// 查询执照的变更历史
///
/// GET /v1/permits/{key}/history，时间升序。执照不存在时
/// 返回404，与空历史区分。
pub async fn get_permit_history<P>(
    Extension(store): Extension<Arc<UpsertStore<P>>>,
    Path(natural_key): Path<String>,
) -> Result<Json<PermitHistoryDto>, AppError>
where
    P: PermitRepository + 'static,
{
    if store.find_by_key(&natural_key).await?.is_none() {
        return Err(RepositoryError::NotFound.into());
    }
    let events = store.history(&natural_key).await?;
    Ok(Json(PermitHistoryDto {
        natural_key,
        events,
    }))
}
