// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 枚举策略
///
/// 描述一次爬取批次覆盖的工作单元集合：固定页码范围、
/// 日期窗口或一组详情种子键。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum EnumerationSpec {
    /// 按页码范围枚举列表页（MCGBM 系统）
    PageRange {
        /// 发照机关名称
        authority: String,
        /// 查询年份（西元）
        year: i32,
        /// 起始页码，从1开始
        start_page: u32,
        /// 结束页码（含）
        end_page: u32,
    },
    /// 按日期窗口逐日枚举（NBUPIC 系统）
    DateWindow {
        /// 发照机关名称
        authority: String,
        /// 开始日期（含）
        start_date: NaiveDate,
        /// 结束日期（含）
        end_date: NaiveDate,
    },
    /// 直接枚举一组详情种子
    DetailSeeds {
        /// 发照机关名称
        authority: String,
        /// 上游索引键列表
        index_keys: Vec<String>,
    },
}

/// 爬取批次状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CrawlRunStatus {
    /// 运行中
    #[default]
    Running,
    /// 已完成，所有工作单元均成功
    Completed,
    /// 降级完成，部分工作单元永久失败或调度被迫中止
    Degraded,
    /// 已取消
    Cancelled,
}

impl CrawlRunStatus {
    /// 判断是否为终态
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CrawlRunStatus::Running)
    }
}

impl fmt::Display for CrawlRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CrawlRunStatus::Running => write!(f, "running"),
            CrawlRunStatus::Completed => write!(f, "completed"),
            CrawlRunStatus::Degraded => write!(f, "degraded"),
            CrawlRunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for CrawlRunStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(CrawlRunStatus::Running),
            "completed" => Ok(CrawlRunStatus::Completed),
            "degraded" => Ok(CrawlRunStatus::Degraded),
            "cancelled" => Ok(CrawlRunStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// 爬取批次
///
/// 一次编排器调用的聚合实体，批次结束时汇总新建、更新、
/// 未变更的记录数以及永久失败的工作单元数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlRun {
    /// 批次唯一标识符
    pub id: Uuid,
    /// 枚举策略
    pub spec: EnumerationSpec,
    /// 批次状态
    pub status: CrawlRunStatus,
    /// 新建记录数
    pub created_records: i64,
    /// 更新记录数
    pub updated_records: i64,
    /// 未变更记录数
    pub unchanged_records: i64,
    /// 永久失败的工作单元数
    pub failed_units: i64,
    /// 开始时间
    pub started_at: DateTime<FixedOffset>,
    /// 结束时间
    pub finished_at: Option<DateTime<FixedOffset>>,
}

impl CrawlRun {
    /// 创建一个新的爬取批次
    pub fn new(spec: EnumerationSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            spec,
            status: CrawlRunStatus::Running,
            created_records: 0,
            updated_records: 0,
            unchanged_records: 0,
            failed_units: 0,
            started_at: Utc::now().into(),
            finished_at: None,
        }
    }

    /// 批次收尾
    ///
    /// 无失败单元为 Completed，有失败单元为 Degraded。
    /// 存储不可用中止调度时，未派发的单元计入失败数，
    /// 批次同样落 Degraded；只有取消走独立终态。
    pub fn finalize(mut self, failed_units: i64) -> Self {
        self.failed_units = failed_units;
        self.status = if failed_units > 0 {
            CrawlRunStatus::Degraded
        } else {
            CrawlRunStatus::Completed
        };
        self.finished_at = Some(Utc::now().into());
        self
    }

    /// 进入取消终态
    pub fn cancel(mut self) -> Self {
        self.status = CrawlRunStatus::Cancelled;
        self.finished_at = Some(Utc::now().into());
        self
    }
}
