// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::change_event::ChangeEvent;
use crate::domain::models::permit::PermitRecord;
use crate::domain::repositories::permit_repository::{
    Page, PermitFilter, PermitRepository, RepositoryError,
};
use crate::infrastructure::database::entities::change_event as event_entity;
use crate::infrastructure::database::entities::permit as permit_entity;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, NotSet,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;

/// 执照仓库实现
///
/// 基于SeaORM实现的执照数据访问层
#[derive(Clone)]
pub struct PermitRepositoryImpl {
    db: Arc<DatabaseConnection>,
}

impl PermitRepositoryImpl {
    /// 创建新的执照仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

fn to_event_active(event: &ChangeEvent) -> event_entity::ActiveModel {
    event_entity::ActiveModel {
        id: Set(event.id),
        natural_key: Set(event.natural_key.clone()),
        field: Set(event.field.clone()),
        old_value: Set(event.old_value.clone()),
        new_value: Set(event.new_value.clone()),
        work_unit_key: Set(event.work_unit_key.clone()),
        changed_at: Set(event.changed_at),
    }
}

/// 唯一键冲突在不同后端的报错文案不同，统一判别
fn is_unique_violation(e: &DbErr) -> bool {
    let message = e.to_string();
    message.contains("UNIQUE constraint failed")
        || message.contains("duplicate key")
        || matches!(e, DbErr::RecordNotInserted)
}

impl From<permit_entity::Model> for PermitRecord {
    fn from(model: permit_entity::Model) -> Self {
        Self {
            natural_key: model.natural_key,
            authority: model.authority,
            permit_no: model.permit_no,
            kind: model.kind.parse().unwrap_or_default(),
            issue_date: model.issue_date,
            applicant: model.applicant,
            designer: model.designer,
            designer_office: model.designer_office,
            supervisor: model.supervisor,
            supervisor_office: model.supervisor_office,
            contractor: model.contractor,
            contractor_office: model.contractor_office,
            address: model.address,
            land_lot: model.land_lot,
            zoning: model.zoning,
            building_usage: model.building_usage,
            construction_cost: model.construction_cost,
            buildings: model.buildings,
            blocks: model.blocks,
            floors_above: model.floors_above,
            floors_below: model.floors_below,
            units: model.units,
            floor_summary: model.floor_summary,
            extra: model.extra,
        }
    }
}

/// 构建写入用的活动模型
///
/// 存储时间戳不属于领域记录：first_seen_at 仅在插入时
/// 设置，updated_at 每次写入刷新。
fn to_active(record: &PermitRecord, inserting: bool) -> permit_entity::ActiveModel {
    let now = Utc::now().into();
    permit_entity::ActiveModel {
        natural_key: Set(record.natural_key.clone()),
        authority: Set(record.authority.clone()),
        permit_no: Set(record.permit_no.clone()),
        kind: Set(record.kind.to_string()),
        issue_date: Set(record.issue_date),
        applicant: Set(record.applicant.clone()),
        designer: Set(record.designer.clone()),
        designer_office: Set(record.designer_office.clone()),
        supervisor: Set(record.supervisor.clone()),
        supervisor_office: Set(record.supervisor_office.clone()),
        contractor: Set(record.contractor.clone()),
        contractor_office: Set(record.contractor_office.clone()),
        address: Set(record.address.clone()),
        land_lot: Set(record.land_lot.clone()),
        zoning: Set(record.zoning.clone()),
        building_usage: Set(record.building_usage.clone()),
        construction_cost: Set(record.construction_cost),
        buildings: Set(record.buildings),
        blocks: Set(record.blocks),
        floors_above: Set(record.floors_above),
        floors_below: Set(record.floors_below),
        units: Set(record.units),
        floor_summary: Set(record.floor_summary.clone()),
        extra: Set(record.extra.clone()),
        first_seen_at: if inserting { Set(now) } else { NotSet },
        updated_at: Set(now),
    }
}

#[async_trait]
impl PermitRepository for PermitRepositoryImpl {
    async fn find_by_key(
        &self,
        natural_key: &str,
    ) -> Result<Option<PermitRecord>, RepositoryError> {
        let model = permit_entity::Entity::find_by_id(natural_key)
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Into::into))
    }

    async fn insert(&self, record: &PermitRecord) -> Result<(), RepositoryError> {
        let active = to_active(record, true);
        match active.insert(self.db.as_ref()).await {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => {
                Err(RepositoryError::Conflict(record.natural_key.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(
        &self,
        record: &PermitRecord,
        events: &[ChangeEvent],
    ) -> Result<(), RepositoryError> {
        // 行更新与变更事件同事务提交
        let txn = self.db.begin().await?;
        let active = to_active(record, false);
        match active.update(&txn).await {
            Ok(_) => {}
            Err(DbErr::RecordNotUpdated) => {
                txn.rollback().await?;
                return Err(RepositoryError::NotFound);
            }
            Err(e) => {
                txn.rollback().await?;
                return Err(e.into());
            }
        }
        if !events.is_empty() {
            let models: Vec<event_entity::ActiveModel> =
                events.iter().map(to_event_active).collect();
            if let Err(e) = event_entity::Entity::insert_many(models).exec(&txn).await {
                txn.rollback().await?;
                return Err(e.into());
            }
        }
        txn.commit().await?;
        Ok(())
    }

    async fn query(
        &self,
        filter: &PermitFilter,
        page: Page,
    ) -> Result<Vec<PermitRecord>, RepositoryError> {
        let mut select = permit_entity::Entity::find();

        if let Some(authority) = &filter.authority {
            select = select.filter(permit_entity::Column::Authority.eq(authority));
        }
        if let Some(from) = filter.date_from {
            select = select.filter(permit_entity::Column::IssueDate.gte(from));
        }
        if let Some(to) = filter.date_to {
            select = select.filter(permit_entity::Column::IssueDate.lte(to));
        }
        if let Some(kind) = filter.kind {
            select = select.filter(permit_entity::Column::Kind.eq(kind.to_string()));
        }
        if let Some(text) = &filter.text {
            select = select.filter(
                Condition::any()
                    .add(permit_entity::Column::PermitNo.contains(text))
                    .add(permit_entity::Column::Address.contains(text))
                    .add(permit_entity::Column::Applicant.contains(text)),
            );
        }

        let models = select
            .order_by_desc(permit_entity::Column::IssueDate)
            .order_by_asc(permit_entity::Column::NaturalKey)
            .paginate(self.db.as_ref(), page.per_page.max(1))
            .fetch_page(page.page.saturating_sub(1))
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn history(&self, natural_key: &str) -> Result<Vec<ChangeEvent>, RepositoryError> {
        let models = event_entity::Entity::find()
            .filter(event_entity::Column::NaturalKey.eq(natural_key))
            .order_by_asc(event_entity::Column::ChangedAt)
            .all(self.db.as_ref())
            .await?;
        Ok(models
            .into_iter()
            .map(|model| ChangeEvent {
                id: model.id,
                natural_key: model.natural_key,
                field: model.field,
                old_value: model.old_value,
                new_value: model.new_value,
                work_unit_key: model.work_unit_key,
                changed_at: model.changed_at,
            })
            .collect())
    }
}
