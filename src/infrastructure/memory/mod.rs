// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 内存仓库实现
//!
//! 与数据库实现遵守同一套特质契约，供集成测试在无外部
//! 依赖的情况下驱动整条流水线。执照仓库可切换为不可用
//! 状态，模拟存储故障。

use crate::domain::models::change_event::ChangeEvent;
use crate::domain::models::crawl_run::{CrawlRun, CrawlRunStatus};
use crate::domain::models::permit::PermitRecord;
use crate::domain::models::work_unit::{WorkUnit, WorkUnitStatus};
use crate::domain::repositories::crawl_run_repository::CrawlRunRepository;
use crate::domain::repositories::permit_repository::{
    Page, PermitFilter, PermitRepository, RepositoryError,
};
use crate::domain::repositories::work_unit_repository::{UnitCounts, WorkUnitRepository};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// 内存执照仓库
#[derive(Default)]
pub struct InMemoryPermitRepository {
    permits: RwLock<BTreeMap<String, PermitRecord>>,
    events: RwLock<Vec<ChangeEvent>>,
    unavailable: AtomicBool,
}

impl InMemoryPermitRepository {
    /// 创建空仓库
    pub fn new() -> Self {
        Self::default()
    }

    /// 切换不可用状态
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 仓库中的执照总数
    pub fn len(&self) -> usize {
        self.permits.read().len()
    }

    /// 仓库是否为空
    pub fn is_empty(&self) -> bool {
        self.permits.read().is_empty()
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

fn matches(filter: &PermitFilter, record: &PermitRecord) -> bool {
    if let Some(authority) = &filter.authority {
        if &record.authority != authority {
            return false;
        }
    }
    if let Some(from) = filter.date_from {
        match record.issue_date {
            Some(date) if date >= from => {}
            _ => return false,
        }
    }
    if let Some(to) = filter.date_to {
        match record.issue_date {
            Some(date) if date <= to => {}
            _ => return false,
        }
    }
    if let Some(kind) = filter.kind {
        if record.kind != kind {
            return false;
        }
    }
    if let Some(text) = &filter.text {
        let hit = record.permit_no.contains(text.as_str())
            || record
                .address
                .as_deref()
                .is_some_and(|s| s.contains(text.as_str()))
            || record
                .applicant
                .as_deref()
                .is_some_and(|s| s.contains(text.as_str()));
        if !hit {
            return false;
        }
    }
    true
}

#[async_trait]
impl PermitRepository for InMemoryPermitRepository {
    async fn find_by_key(
        &self,
        natural_key: &str,
    ) -> Result<Option<PermitRecord>, RepositoryError> {
        self.check_available()?;
        Ok(self.permits.read().get(natural_key).cloned())
    }

    async fn insert(&self, record: &PermitRecord) -> Result<(), RepositoryError> {
        self.check_available()?;
        let mut permits = self.permits.write();
        if permits.contains_key(&record.natural_key) {
            return Err(RepositoryError::Conflict(record.natural_key.clone()));
        }
        permits.insert(record.natural_key.clone(), record.clone());
        Ok(())
    }

    async fn update(
        &self,
        record: &PermitRecord,
        events: &[ChangeEvent],
    ) -> Result<(), RepositoryError> {
        self.check_available()?;
        // 两张表同持锁写入，对外表现为原子更新
        let mut permits = self.permits.write();
        if !permits.contains_key(&record.natural_key) {
            return Err(RepositoryError::NotFound);
        }
        permits.insert(record.natural_key.clone(), record.clone());
        self.events.write().extend_from_slice(events);
        Ok(())
    }

    async fn query(
        &self,
        filter: &PermitFilter,
        page: Page,
    ) -> Result<Vec<PermitRecord>, RepositoryError> {
        self.check_available()?;
        let mut hits: Vec<PermitRecord> = self
            .permits
            .read()
            .values()
            .filter(|record| matches(filter, record))
            .cloned()
            .collect();
        // 发照日期降序，缺日期的排最后，同日期按自然键稳定排序
        hits.sort_by(|a, b| {
            b.issue_date
                .cmp(&a.issue_date)
                .then_with(|| a.natural_key.cmp(&b.natural_key))
        });
        let per_page = page.per_page.max(1) as usize;
        let offset = (page.page.saturating_sub(1) as usize) * per_page;
        Ok(hits.into_iter().skip(offset).take(per_page).collect())
    }

    async fn history(&self, natural_key: &str) -> Result<Vec<ChangeEvent>, RepositoryError> {
        self.check_available()?;
        let mut events: Vec<ChangeEvent> = self
            .events
            .read()
            .iter()
            .filter(|event| event.natural_key == natural_key)
            .cloned()
            .collect();
        events.sort_by_key(|event| event.changed_at);
        Ok(events)
    }
}

/// 内存工作单元仓库
#[derive(Default)]
pub struct InMemoryWorkUnitRepository {
    units: RwLock<Vec<WorkUnit>>,
}

impl InMemoryWorkUnitRepository {
    /// 创建空仓库
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkUnitRepository for InMemoryWorkUnitRepository {
    async fn create_many(&self, new_units: &[WorkUnit]) -> Result<u64, RepositoryError> {
        let mut units = self.units.write();
        let mut created = 0u64;
        for unit in new_units {
            let exists = units
                .iter()
                .any(|u| u.run_id == unit.run_id && u.unit_key == unit.unit_key);
            if !exists {
                units.push(unit.clone());
                created += 1;
            }
        }
        Ok(created)
    }

    async fn update(&self, unit: &WorkUnit) -> Result<(), RepositoryError> {
        let mut units = self.units.write();
        match units.iter_mut().find(|u| u.id == unit.id) {
            Some(slot) => {
                *slot = unit.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn find_pending(
        &self,
        run_id: Uuid,
        limit: u64,
    ) -> Result<Vec<WorkUnit>, RepositoryError> {
        let units = self.units.read();
        let mut pending: Vec<WorkUnit> = units
            .iter()
            .filter(|u| u.run_id == run_id && u.status == WorkUnitStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|u| u.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn reset_in_progress(&self, run_id: Uuid) -> Result<u64, RepositoryError> {
        let mut units = self.units.write();
        let mut reset = 0u64;
        for unit in units
            .iter_mut()
            .filter(|u| u.run_id == run_id && u.status == WorkUnitStatus::InProgress)
        {
            unit.status = WorkUnitStatus::Pending;
            unit.started_at = None;
            reset += 1;
        }
        Ok(reset)
    }

    async fn count_by_status(&self, run_id: Uuid) -> Result<UnitCounts, RepositoryError> {
        let units = self.units.read();
        let mut counts = UnitCounts::default();
        for unit in units.iter().filter(|u| u.run_id == run_id) {
            match unit.status {
                WorkUnitStatus::Pending => counts.pending += 1,
                WorkUnitStatus::InProgress => counts.in_progress += 1,
                WorkUnitStatus::Done => counts.done += 1,
                WorkUnitStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn find_by_status(
        &self,
        run_id: Uuid,
        status: WorkUnitStatus,
    ) -> Result<Vec<WorkUnit>, RepositoryError> {
        let units = self.units.read();
        let mut hits: Vec<WorkUnit> = units
            .iter()
            .filter(|u| u.run_id == run_id && u.status == status)
            .cloned()
            .collect();
        hits.sort_by_key(|u| u.created_at);
        Ok(hits)
    }
}

/// 内存爬取批次仓库
#[derive(Default)]
pub struct InMemoryCrawlRunRepository {
    runs: RwLock<BTreeMap<Uuid, CrawlRun>>,
}

impl InMemoryCrawlRunRepository {
    /// 创建空仓库
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CrawlRunRepository for InMemoryCrawlRunRepository {
    async fn create(&self, run: &CrawlRun) -> Result<(), RepositoryError> {
        self.runs.write().insert(run.id, run.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlRun>, RepositoryError> {
        Ok(self.runs.read().get(&id).cloned())
    }

    async fn update(&self, run: &CrawlRun) -> Result<(), RepositoryError> {
        let mut runs = self.runs.write();
        if !runs.contains_key(&run.id) {
            return Err(RepositoryError::NotFound);
        }
        runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn find_by_status(
        &self,
        status: CrawlRunStatus,
    ) -> Result<Vec<CrawlRun>, RepositoryError> {
        let mut hits: Vec<CrawlRun> = self
            .runs
            .read()
            .values()
            .filter(|run| run.status == status)
            .cloned()
            .collect();
        hits.sort_by_key(|run| run.started_at);
        Ok(hits)
    }
}
