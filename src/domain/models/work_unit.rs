// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// 工作单元实体
///
/// 表示一次爬取批次中的一个可调度的工作切片：一个列表页、
/// 一个日期切片或一个执照详情页。工作单元具有状态机、
/// 重试预算和错误记录，其状态持久化在仓库中以支持
/// 中断后的恢复。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    /// 工作单元唯一标识符
    pub id: Uuid,
    /// 所属爬取批次ID
    pub run_id: Uuid,
    /// 工作单元键，在同一批次内唯一，用于恢复时去重
    pub unit_key: String,
    /// 工作单元类型，决定请求的构建方式和解析器的选择
    pub kind: WorkUnitKind,
    /// 工作单元状态
    pub status: WorkUnitStatus,
    /// 已尝试次数，由编排器在每次派发时递增
    pub attempt_count: i32,
    /// 编排层最大重试次数，与抓取层的HTTP重试预算相互独立
    pub max_retries: i32,
    /// 最近一次失败的错误信息
    pub last_error: Option<String>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 开始处理时间
    pub started_at: Option<DateTime<FixedOffset>>,
    /// 终态时间
    pub finished_at: Option<DateTime<FixedOffset>>,
}

/// 工作单元类型
///
/// 按上游页面类型区分：列表页产出多条摘要记录，
/// 日期切片产出待跟进的详情键，详情页产出单条完整记录。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkUnitKind {
    /// 列表页，按页码分页（MCGBM 开放资料系统）
    ListingPage {
        /// 发照机关名称
        authority: String,
        /// 页码，从1开始
        page: u32,
        /// 执照类别查询参数
        license_kind: String,
        /// 查询年份（西元）
        year: i32,
    },
    /// 日期切片，按单日查询（NBUPIC 与各独立建管系统）
    DateSlice {
        /// 发照机关名称
        authority: String,
        /// 查询日期
        date: NaiveDate,
    },
    /// 执照详情页
    Detail {
        /// 发照机关名称
        authority: String,
        /// 上游索引键
        index_key: String,
    },
}

impl WorkUnitKind {
    /// 生成工作单元键
    ///
    /// 键由类型和参数确定性导出，同一批次内重复枚举
    /// 产生相同的键。
    pub fn unit_key(&self) -> String {
        match self {
            WorkUnitKind::ListingPage {
                authority,
                page,
                license_kind,
                year,
            } => format!("listing:{}:{}:{}:p{}", authority, year, license_kind, page),
            WorkUnitKind::DateSlice { authority, date } => {
                format!("date:{}:{}", authority, date)
            }
            WorkUnitKind::Detail {
                authority,
                index_key,
            } => format!("detail:{}:{}", authority, index_key),
        }
    }

    /// 获取发照机关名称
    pub fn authority(&self) -> &str {
        match self {
            WorkUnitKind::ListingPage { authority, .. } => authority,
            WorkUnitKind::DateSlice { authority, .. } => authority,
            WorkUnitKind::Detail { authority, .. } => authority,
        }
    }
}

/// 工作单元状态
///
/// 状态转换遵循以下流程：
/// Pending → InProgress → Done/Failed，失败且预算未耗尽时
/// 回到 Pending 等待重新派发。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkUnitStatus {
    /// 等待派发
    #[default]
    Pending,
    /// 正在处理
    InProgress,
    /// 已完成
    Done,
    /// 已失败，重试预算已耗尽
    Failed,
}

impl fmt::Display for WorkUnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WorkUnitStatus::Pending => write!(f, "pending"),
            WorkUnitStatus::InProgress => write!(f, "in_progress"),
            WorkUnitStatus::Done => write!(f, "done"),
            WorkUnitStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for WorkUnitStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WorkUnitStatus::Pending),
            "in_progress" => Ok(WorkUnitStatus::InProgress),
            "done" => Ok(WorkUnitStatus::Done),
            "failed" => Ok(WorkUnitStatus::Failed),
            _ => Err(()),
        }
    }
}

/// 领域错误类型
#[derive(Error, Debug)]
pub enum DomainError {
    /// 无效的状态转换
    #[error("Invalid state transition")]
    InvalidStateTransition,

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl WorkUnit {
    /// 创建一个新的工作单元
    pub fn new(run_id: Uuid, kind: WorkUnitKind, max_retries: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            unit_key: kind.unit_key(),
            kind,
            status: WorkUnitStatus::Pending,
            attempt_count: 0,
            max_retries,
            last_error: None,
            created_at: Utc::now().into(),
            started_at: None,
            finished_at: None,
        }
    }

    /// 启动工作单元
    ///
    /// 将状态从 Pending 变更为 InProgress 并递增尝试次数
    pub fn start(mut self) -> Result<Self, DomainError> {
        match self.status {
            WorkUnitStatus::Pending => {
                self.status = WorkUnitStatus::InProgress;
                self.attempt_count += 1;
                self.started_at = Some(Utc::now().into());
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 完成工作单元
    pub fn complete(mut self) -> Result<Self, DomainError> {
        match self.status {
            WorkUnitStatus::InProgress => {
                self.status = WorkUnitStatus::Done;
                self.finished_at = Some(Utc::now().into());
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 记录一次失败
    ///
    /// 预算未耗尽时回到 Pending 等待重新派发，否则进入
    /// Failed 终态。
    pub fn fail(mut self, error: String) -> Result<Self, DomainError> {
        match self.status {
            WorkUnitStatus::InProgress => {
                self.last_error = Some(error);
                if self.attempt_count >= self.max_retries {
                    self.status = WorkUnitStatus::Failed;
                    self.finished_at = Some(Utc::now().into());
                } else {
                    self.status = WorkUnitStatus::Pending;
                }
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 不经抓取直接完成
    ///
    /// 列表枚举确认某页之后不再有数据时使用：待处理单元
    /// 跳过抓取落入 Done，不消耗尝试次数。
    pub fn skip(mut self) -> Result<Self, DomainError> {
        match self.status {
            WorkUnitStatus::Pending => {
                self.status = WorkUnitStatus::Done;
                self.finished_at = Some(Utc::now().into());
                Ok(self)
            }
            _ => Err(DomainError::InvalidStateTransition),
        }
    }

    /// 将遗留的 InProgress 单元重置为 Pending
    ///
    /// 用于进程崩溃后的恢复：重放同一单元是安全的，
    /// 因为整条流水线对同一原始文档的重复处理是幂等的。
    pub fn reset(mut self) -> Self {
        if self.status == WorkUnitStatus::InProgress {
            self.status = WorkUnitStatus::Pending;
            self.started_at = None;
        }
        self
    }

    /// 判断工作单元是否处于终态
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, WorkUnitStatus::Done | WorkUnitStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_kind() -> WorkUnitKind {
        WorkUnitKind::ListingPage {
            authority: "新北市".to_string(),
            page: 3,
            license_kind: "建造執照".to_string(),
            year: 2024,
        }
    }

    #[test]
    fn test_unit_key_is_deterministic() {
        assert_eq!(listing_kind().unit_key(), listing_kind().unit_key());
        assert_eq!(
            listing_kind().unit_key(),
            "listing:新北市:2024:建造執照:p3"
        );
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let unit = WorkUnit::new(Uuid::new_v4(), listing_kind(), 3);
        assert_eq!(unit.status, WorkUnitStatus::Pending);

        let unit = unit.start().unwrap();
        assert_eq!(unit.status, WorkUnitStatus::InProgress);
        assert_eq!(unit.attempt_count, 1);

        let unit = unit.complete().unwrap();
        assert_eq!(unit.status, WorkUnitStatus::Done);
        assert!(unit.is_terminal());
    }

    #[test]
    fn test_fail_requeues_until_budget_exhausted() {
        let mut unit = WorkUnit::new(Uuid::new_v4(), listing_kind(), 2);

        unit = unit.start().unwrap();
        unit = unit.fail("timeout".to_string()).unwrap();
        assert_eq!(unit.status, WorkUnitStatus::Pending);
        assert_eq!(unit.last_error.as_deref(), Some("timeout"));

        unit = unit.start().unwrap();
        unit = unit.fail("timeout".to_string()).unwrap();
        assert_eq!(unit.status, WorkUnitStatus::Failed);
        assert!(unit.is_terminal());
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let unit = WorkUnit::new(Uuid::new_v4(), listing_kind(), 3);
        assert!(unit.clone().complete().is_err());
        assert!(unit.fail("boom".to_string()).is_err());
    }

    #[test]
    fn test_skip_completes_pending_without_attempt() {
        let unit = WorkUnit::new(Uuid::new_v4(), listing_kind(), 3);
        let unit = unit.skip().unwrap();
        assert_eq!(unit.status, WorkUnitStatus::Done);
        assert_eq!(unit.attempt_count, 0);
        assert!(unit.finished_at.is_some());

        let started = WorkUnit::new(Uuid::new_v4(), listing_kind(), 3)
            .start()
            .unwrap();
        assert!(started.skip().is_err());
    }

    #[test]
    fn test_reset_only_touches_in_progress() {
        let unit = WorkUnit::new(Uuid::new_v4(), listing_kind(), 3)
            .start()
            .unwrap();
        let unit = unit.reset();
        assert_eq!(unit.status, WorkUnitStatus::Pending);

        let done = WorkUnit::new(Uuid::new_v4(), listing_kind(), 3)
            .start()
            .unwrap()
            .complete()
            .unwrap();
        assert_eq!(done.reset().status, WorkUnitStatus::Done);
    }
}
