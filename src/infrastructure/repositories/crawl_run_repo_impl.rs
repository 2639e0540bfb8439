// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_run::{CrawlRun, CrawlRunStatus};
use crate::domain::repositories::crawl_run_repository::CrawlRunRepository;
use crate::domain::repositories::permit_repository::RepositoryError;
use crate::infrastructure::database::entities::crawl_run as run_entity;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

/// 爬取批次仓库实现
#[derive(Clone)]
pub struct CrawlRunRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl CrawlRunRepositoryImpl {
    /// 创建新的批次仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn into_domain(model: run_entity::Model) -> Result<CrawlRun, RepositoryError> {
    let spec = serde_json::from_value(model.spec)
        .map_err(|e| RepositoryError::Database(DbErr::Json(e.to_string())))?;
    Ok(CrawlRun {
        id: model.id,
        spec,
        status: model.status.parse().unwrap_or_default(),
        created_records: model.created_records,
        updated_records: model.updated_records,
        unchanged_records: model.unchanged_records,
        failed_units: model.failed_units,
        started_at: model.started_at,
        finished_at: model.finished_at,
    })
}

fn to_active(run: &CrawlRun) -> Result<run_entity::ActiveModel, RepositoryError> {
    let spec = serde_json::to_value(&run.spec)
        .map_err(|e| RepositoryError::Database(DbErr::Json(e.to_string())))?;
    Ok(run_entity::ActiveModel {
        id: Set(run.id),
        spec: Set(spec),
        status: Set(run.status.to_string()),
        created_records: Set(run.created_records),
        updated_records: Set(run.updated_records),
        unchanged_records: Set(run.unchanged_records),
        failed_units: Set(run.failed_units),
        started_at: Set(run.started_at),
        finished_at: Set(run.finished_at),
    })
}

#[async_trait]
impl CrawlRunRepository for CrawlRunRepositoryImpl {
    async fn create(&self, run: &CrawlRun) -> Result<(), RepositoryError> {
        to_active(run)?.insert(self.db.as_ref()).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CrawlRun>, RepositoryError> {
        let model = run_entity::Entity::find_by_id(id).one(self.db.as_ref()).await?;
        model.map(into_domain).transpose()
    }

    async fn update(&self, run: &CrawlRun) -> Result<(), RepositoryError> {
        match to_active(run)?.update(self.db.as_ref()).await {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => Err(RepositoryError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_status(
        &self,
        status: CrawlRunStatus,
    ) -> Result<Vec<CrawlRun>, RepositoryError> {
        let models = run_entity::Entity::find()
            .filter(run_entity::Column::Status.eq(status.to_string()))
            .order_by_asc(run_entity::Column::StartedAt)
            .all(self.db.as_ref())
            .await?;
        models.into_iter().map(into_domain).collect()
    }
}
