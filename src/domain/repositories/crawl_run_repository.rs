// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_run::{CrawlRun, CrawlRunStatus};
use crate::domain::repositories::permit_repository::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 爬取批次仓库特质
#[async_trait]
pub trait CrawlRunRepository: Send + Sync {
    /// 创建新批次
    async fn create(&self, run: &CrawlRun) -> Result<(), RepositoryError>;
    /// 按ID查找批次
    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlRun>, RepositoryError>;
    /// 整行更新批次
    async fn update(&self, run: &CrawlRun) -> Result<(), RepositoryError>;
    /// 列出处于指定状态的批次（启动恢复时查找 Running 批次）
    async fn find_by_status(
        &self,
        status: CrawlRunStatus,
    ) -> Result<Vec<CrawlRun>, RepositoryError>;
}
