// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::change_event::ChangeEvent;
use crate::domain::models::permit::{LicenseKind, PermitRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::DbErr;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 写入冲突（同键并发写入或唯一键约束冲突）
    #[error("Write conflict on key {0}")]
    Conflict(String),
    /// 存储不可用
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<DbErr> for RepositoryError {
    /// 连接层故障归为 Unavailable，其余归为单行数据库错误
    fn from(e: DbErr) -> Self {
        match &e {
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => {
                RepositoryError::Unavailable(e.to_string())
            }
            _ => RepositoryError::Database(e),
        }
    }
}

/// 执照查询过滤条件
#[derive(Debug, Default, Clone)]
pub struct PermitFilter {
    /// 按发照机关过滤
    pub authority: Option<String>,
    /// 发照日期下界（含）
    pub date_from: Option<NaiveDate>,
    /// 发照日期上界（含）
    pub date_to: Option<NaiveDate>,
    /// 按执照类别过滤
    pub kind: Option<LicenseKind>,
    /// 对执照字号、地址、起造人的子串匹配
    pub text: Option<String>,
}

/// 分页参数
#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// 页码，从1开始
    pub page: u64,
    /// 每页条数
    pub per_page: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 50,
        }
    }
}

/// 执照仓库特质
///
/// 执照记录与变更事件的数据访问接口。自然键在实现中
/// 必须唯一；insert 对已存在的键返回 Conflict，由上层的
/// 去重存储决定走更新路径。
#[async_trait]
pub trait PermitRepository: Send + Sync {
    /// 按自然键查找执照
    async fn find_by_key(&self, natural_key: &str)
        -> Result<Option<PermitRecord>, RepositoryError>;
    /// 插入新执照，键已存在时返回 Conflict
    async fn insert(&self, record: &PermitRecord) -> Result<(), RepositoryError>;
    /// 整行更新既有执照并同时追加变更事件
    ///
    /// 行更新与事件写入必须在同一原子单元内完成，否则
    /// 中途失败会留下无事件佐证的新值或反过来。
    async fn update(
        &self,
        record: &PermitRecord,
        events: &[ChangeEvent],
    ) -> Result<(), RepositoryError>;
    /// 按过滤条件分页查询，按发照日期降序
    async fn query(
        &self,
        filter: &PermitFilter,
        page: Page,
    ) -> Result<Vec<PermitRecord>, RepositoryError>;
    /// 按自然键读取变更历史，时间升序
    async fn history(&self, natural_key: &str) -> Result<Vec<ChangeEvent>, RepositoryError>;
}
