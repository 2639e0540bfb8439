// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 去重存储
//!
//! 以自然键为单位对执照记录做插入或更新的合并写入。
//! 同键写入经每键互斥锁串行化，不同键并行；字段级差异
//! 产生变更事件，与记录更新一并落库。

use crate::domain::models::change_event::ChangeEvent;
use crate::domain::models::permit::PermitRecord;
use crate::domain::repositories::permit_repository::{
    Page, PermitFilter, PermitRepository, RepositoryError,
};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// 底层仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    /// 冲突重试后仍失败
    #[error("Persistent write conflict on key {0}")]
    PersistentConflict(String),
}

impl StoreError {
    /// 是否应中止整个爬取批次
    ///
    /// 存储不可用意味着后续写入都会失败，继续调度只会
    /// 空耗配额；单键冲突与单行数据库错误不在此列。
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreError::Repository(RepositoryError::Unavailable(_))
        )
    }
}

/// 一次合并写入的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 新键，已插入
    Created,
    /// 既有键，字段有差异，已更新并记录变更事件
    Updated {
        /// 发生变化的字段名
        changed_fields: Vec<String>,
    },
    /// 既有键，无差异，未写入
    Unchanged,
}

/// 去重存储
pub struct UpsertStore<R: PermitRepository> {
    repository: Arc<R>,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<R: PermitRepository> UpsertStore<R> {
    /// 创建一个新的去重存储
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            key_locks: DashMap::new(),
        }
    }

    fn lock_for(&self, natural_key: &str) -> Arc<Mutex<()>> {
        self.key_locks
            .entry(natural_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 合并写入一条执照记录
    ///
    /// 锁内执行读-比-写，保证同键并发写入串行化。插入
    /// 撞上其他进程先行写入的唯一键约束时，重读一次改走
    /// 更新路径。
    pub async fn upsert(
        &self,
        record: &PermitRecord,
        work_unit_key: &str,
    ) -> Result<UpsertOutcome, StoreError> {
        let lock = self.lock_for(&record.natural_key);
        let _guard = lock.lock().await;

        match self.try_upsert(record, work_unit_key).await {
            Err(StoreError::Repository(RepositoryError::Conflict(key))) => {
                warn!(natural_key = %key, "insert conflict, retrying as update");
                match self.try_upsert(record, work_unit_key).await {
                    Err(StoreError::Repository(RepositoryError::Conflict(key))) => {
                        Err(StoreError::PersistentConflict(key))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn try_upsert(
        &self,
        record: &PermitRecord,
        work_unit_key: &str,
    ) -> Result<UpsertOutcome, StoreError> {
        let existing = self.repository.find_by_key(&record.natural_key).await?;

        let Some(existing) = existing else {
            self.repository.insert(record).await?;
            debug!(natural_key = %record.natural_key, "permit created");
            return Ok(UpsertOutcome::Created);
        };

        let events = diff_records(&existing, record, work_unit_key);
        if events.is_empty() {
            return Ok(UpsertOutcome::Unchanged);
        }

        let changed_fields: Vec<String> = events.iter().map(|e| e.field.clone()).collect();
        self.repository.update(record, &events).await?;
        debug!(
            natural_key = %record.natural_key,
            fields = ?changed_fields,
            "permit updated"
        );
        Ok(UpsertOutcome::Updated { changed_fields })
    }

    /// 按过滤条件分页查询执照
    pub async fn query(
        &self,
        filter: &PermitFilter,
        page: Page,
    ) -> Result<Vec<PermitRecord>, StoreError> {
        Ok(self.repository.query(filter, page).await?)
    }

    /// 按自然键查找单条执照
    pub async fn find_by_key(
        &self,
        natural_key: &str,
    ) -> Result<Option<PermitRecord>, StoreError> {
        Ok(self.repository.find_by_key(natural_key).await?)
    }

    /// 读取一条执照的变更历史
    pub async fn history(&self, natural_key: &str) -> Result<Vec<ChangeEvent>, StoreError> {
        Ok(self.repository.history(natural_key).await?)
    }
}

/// 逐字段比较两条记录，产出变更事件
///
/// 记录序列化为JSON对象后按键比较，自然键本身不参与。
fn diff_records(old: &PermitRecord, new: &PermitRecord, work_unit_key: &str) -> Vec<ChangeEvent> {
    let old_value = serde_json::to_value(old).unwrap_or(Value::Null);
    let new_value = serde_json::to_value(new).unwrap_or(Value::Null);
    let (Value::Object(old_map), Value::Object(new_map)) = (old_value, new_value) else {
        return Vec::new();
    };

    new_map
        .into_iter()
        .filter(|(field, _)| field != "natural_key")
        .filter_map(|(field, new_val)| {
            let old_val = old_map.get(&field).cloned().unwrap_or(Value::Null);
            if old_val == new_val {
                None
            } else {
                Some(ChangeEvent::new(
                    &new.natural_key,
                    &field,
                    old_val,
                    new_val,
                    work_unit_key,
                ))
            }
        })
        .collect()
}
