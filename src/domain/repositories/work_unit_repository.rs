// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::work_unit::{WorkUnit, WorkUnitStatus};
use crate::domain::repositories::permit_repository::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 批次内各状态的工作单元计数
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnitCounts {
    pub pending: u64,
    pub in_progress: u64,
    pub done: u64,
    pub failed: u64,
}

impl UnitCounts {
    /// 批次内工作单元总数
    pub fn total(&self) -> u64 {
        self.pending + self.in_progress + self.done + self.failed
    }

    /// 判断是否所有单元均到达终态
    pub fn all_terminal(&self) -> bool {
        self.pending == 0 && self.in_progress == 0
    }
}

/// 工作单元仓库特质
///
/// 工作单元状态是显式持久化的进度表：崩溃后的恢复逻辑
/// 就是重读这张表并重置遗留的 in_progress 单元，而不是
/// 特例化的恢复代码。
#[async_trait]
pub trait WorkUnitRepository: Send + Sync {
    /// 批量创建工作单元，批次内键重复的单元被跳过
    async fn create_many(&self, units: &[WorkUnit]) -> Result<u64, RepositoryError>;
    /// 更新工作单元
    async fn update(&self, unit: &WorkUnit) -> Result<(), RepositoryError>;
    /// 取出批次内一批待处理单元
    async fn find_pending(&self, run_id: Uuid, limit: u64)
        -> Result<Vec<WorkUnit>, RepositoryError>;
    /// 将批次内遗留的 in_progress 单元重置为 pending，返回重置数量
    async fn reset_in_progress(&self, run_id: Uuid) -> Result<u64, RepositoryError>;
    /// 统计批次内各状态的单元数量
    async fn count_by_status(&self, run_id: Uuid) -> Result<UnitCounts, RepositoryError>;
    /// 列出批次内处于指定状态的单元
    async fn find_by_status(
        &self,
        run_id: Uuid,
        status: WorkUnitStatus,
    ) -> Result<Vec<WorkUnit>, RepositoryError>;
}
