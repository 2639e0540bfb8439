// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::work_unit::{WorkUnit, WorkUnitStatus};
use crate::domain::repositories::permit_repository::RepositoryError;
use crate::domain::repositories::work_unit_repository::{UnitCounts, WorkUnitRepository};
use crate::infrastructure::database::entities::work_unit as unit_entity;
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, Value,
};
use std::sync::Arc;
use uuid::Uuid;

/// 工作单元仓库实现
///
/// 基于SeaORM实现的进度表数据访问层
#[derive(Clone)]
pub struct WorkUnitRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl WorkUnitRepositoryImpl {
    /// 创建新的工作单元仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn into_domain(model: unit_entity::Model) -> Result<WorkUnit, RepositoryError> {
    let kind = serde_json::from_value(model.kind)
        .map_err(|e| RepositoryError::Database(DbErr::Json(e.to_string())))?;
    Ok(WorkUnit {
        id: model.id,
        run_id: model.run_id,
        unit_key: model.unit_key,
        kind,
        status: model.status.parse().unwrap_or_default(),
        attempt_count: model.attempt_count,
        max_retries: model.max_retries,
        last_error: model.last_error,
        created_at: model.created_at,
        started_at: model.started_at,
        finished_at: model.finished_at,
    })
}

fn to_active(unit: &WorkUnit) -> Result<unit_entity::ActiveModel, RepositoryError> {
    let kind = serde_json::to_value(&unit.kind)
        .map_err(|e| RepositoryError::Database(DbErr::Json(e.to_string())))?;
    Ok(unit_entity::ActiveModel {
        id: Set(unit.id),
        run_id: Set(unit.run_id),
        unit_key: Set(unit.unit_key.clone()),
        kind: Set(kind),
        status: Set(unit.status.to_string()),
        attempt_count: Set(unit.attempt_count),
        max_retries: Set(unit.max_retries),
        last_error: Set(unit.last_error.clone()),
        created_at: Set(unit.created_at),
        started_at: Set(unit.started_at),
        finished_at: Set(unit.finished_at),
    })
}

#[async_trait]
impl WorkUnitRepository for WorkUnitRepositoryImpl {
    async fn create_many(&self, units: &[WorkUnit]) -> Result<u64, RepositoryError> {
        if units.is_empty() {
            return Ok(0);
        }
        let models: Vec<unit_entity::ActiveModel> =
            units.iter().map(to_active).collect::<Result<_, _>>()?;

        // 批次内单元键唯一，重复枚举静默落空
        let inserted = unit_entity::Entity::insert_many(models)
            .on_conflict(
                OnConflict::columns([unit_entity::Column::RunId, unit_entity::Column::UnitKey])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;
        Ok(inserted)
    }

    async fn update(&self, unit: &WorkUnit) -> Result<(), RepositoryError> {
        match to_active(unit)?.update(self.db.as_ref()).await {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => Err(RepositoryError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_pending(
        &self,
        run_id: Uuid,
        limit: u64,
    ) -> Result<Vec<WorkUnit>, RepositoryError> {
        let models = unit_entity::Entity::find()
            .filter(unit_entity::Column::RunId.eq(run_id))
            .filter(unit_entity::Column::Status.eq(WorkUnitStatus::Pending.to_string()))
            .order_by_asc(unit_entity::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        models.into_iter().map(into_domain).collect()
    }

    async fn reset_in_progress(&self, run_id: Uuid) -> Result<u64, RepositoryError> {
        let result = unit_entity::Entity::update_many()
            .col_expr(
                unit_entity::Column::Status,
                Expr::value(WorkUnitStatus::Pending.to_string()),
            )
            .col_expr(
                unit_entity::Column::StartedAt,
                Expr::value(Value::ChronoDateTimeWithTimeZone(None)),
            )
            .filter(unit_entity::Column::RunId.eq(run_id))
            .filter(unit_entity::Column::Status.eq(WorkUnitStatus::InProgress.to_string()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }

    async fn count_by_status(&self, run_id: Uuid) -> Result<UnitCounts, RepositoryError> {
        let count = |status: WorkUnitStatus| {
            unit_entity::Entity::find()
                .filter(unit_entity::Column::RunId.eq(run_id))
                .filter(unit_entity::Column::Status.eq(status.to_string()))
                .count(self.db.as_ref())
        };
        Ok(UnitCounts {
            pending: count(WorkUnitStatus::Pending).await?,
            in_progress: count(WorkUnitStatus::InProgress).await?,
            done: count(WorkUnitStatus::Done).await?,
            failed: count(WorkUnitStatus::Failed).await?,
        })
    }

    async fn find_by_status(
        &self,
        run_id: Uuid,
        status: WorkUnitStatus,
    ) -> Result<Vec<WorkUnit>, RepositoryError> {
        let models = unit_entity::Entity::find()
            .filter(unit_entity::Column::RunId.eq(run_id))
            .filter(unit_entity::Column::Status.eq(status.to_string()))
            .order_by_asc(unit_entity::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?;
        models.into_iter().map(into_domain).collect()
    }
}
