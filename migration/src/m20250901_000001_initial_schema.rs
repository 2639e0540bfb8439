// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;

/// 数据库初始模式迁移
///
/// 创建执照、变更事件、工作单元和爬取批次四张表
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 1. Create permits table
        manager
            .create_table(
                Table::create()
                    .table(Permits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Permits::NaturalKey)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Permits::Authority).string().not_null())
                    .col(ColumnDef::new(Permits::PermitNo).string().not_null())
                    .col(ColumnDef::new(Permits::Kind).string().not_null())
                    .col(ColumnDef::new(Permits::IssueDate).date().null())
                    .col(ColumnDef::new(Permits::Applicant).string().null())
                    .col(ColumnDef::new(Permits::Designer).string().null())
                    .col(ColumnDef::new(Permits::DesignerOffice).string().null())
                    .col(ColumnDef::new(Permits::Supervisor).string().null())
                    .col(ColumnDef::new(Permits::SupervisorOffice).string().null())
                    .col(ColumnDef::new(Permits::Contractor).string().null())
                    .col(ColumnDef::new(Permits::ContractorOffice).string().null())
                    .col(ColumnDef::new(Permits::Address).string().null())
                    .col(ColumnDef::new(Permits::LandLot).string().null())
                    .col(ColumnDef::new(Permits::Zoning).string().null())
                    .col(ColumnDef::new(Permits::BuildingUsage).string().null())
                    .col(ColumnDef::new(Permits::ConstructionCost).big_integer().null())
                    .col(
                        ColumnDef::new(Permits::Buildings)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Permits::Blocks)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Permits::FloorsAbove)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Permits::FloorsBelow)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Permits::Units)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Permits::FloorSummary).json().not_null())
                    .col(ColumnDef::new(Permits::Extra).json().not_null())
                    .col(
                        ColumnDef::new(Permits::FirstSeenAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Permits::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_permits_authority_date")
                    .table(Permits::Table)
                    .col(Permits::Authority)
                    .col(Permits::IssueDate)
                    .to_owned(),
            )
            .await?;

        // 2. Create change_events table (append-only)
        manager
            .create_table(
                Table::create()
                    .table(ChangeEvents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChangeEvents::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ChangeEvents::NaturalKey).string().not_null())
                    .col(ColumnDef::new(ChangeEvents::Field).string().not_null())
                    .col(ColumnDef::new(ChangeEvents::OldValue).json().not_null())
                    .col(ColumnDef::new(ChangeEvents::NewValue).json().not_null())
                    .col(ColumnDef::new(ChangeEvents::WorkUnitKey).string().not_null())
                    .col(
                        ColumnDef::new(ChangeEvents::ChangedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_change_events_key_time")
                    .table(ChangeEvents::Table)
                    .col(ChangeEvents::NaturalKey)
                    .col(ChangeEvents::ChangedAt)
                    .to_owned(),
            )
            .await?;

        // 3. Create work_units table
        manager
            .create_table(
                Table::create()
                    .table(WorkUnits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WorkUnits::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WorkUnits::RunId).uuid().not_null())
                    .col(ColumnDef::new(WorkUnits::UnitKey).string().not_null())
                    .col(ColumnDef::new(WorkUnits::Kind).json().not_null())
                    .col(ColumnDef::new(WorkUnits::Status).string().not_null())
                    .col(
                        ColumnDef::new(WorkUnits::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WorkUnits::MaxRetries)
                            .integer()
                            .not_null()
                            .default(3),
                    )
                    .col(ColumnDef::new(WorkUnits::LastError).string().null())
                    .col(
                        ColumnDef::new(WorkUnits::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(WorkUnits::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(WorkUnits::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_work_units_run_status")
                    .table(WorkUnits::Table)
                    .col(WorkUnits::RunId)
                    .col(WorkUnits::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_work_units_run_key")
                    .table(WorkUnits::Table)
                    .col(WorkUnits::RunId)
                    .col(WorkUnits::UnitKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // 4. Create crawl_runs table
        manager
            .create_table(
                Table::create()
                    .table(CrawlRuns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CrawlRuns::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CrawlRuns::Spec).json().not_null())
                    .col(ColumnDef::new(CrawlRuns::Status).string().not_null())
                    .col(
                        ColumnDef::new(CrawlRuns::CreatedRecords)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CrawlRuns::UpdatedRecords)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CrawlRuns::UnchangedRecords)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CrawlRuns::FailedUnits)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(CrawlRuns::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(CrawlRuns::FinishedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CrawlRuns::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(WorkUnits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ChangeEvents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Permits::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum Permits {
    Table,
    NaturalKey,
    Authority,
    PermitNo,
    Kind,
    IssueDate,
    Applicant,
    Designer,
    DesignerOffice,
    Supervisor,
    SupervisorOffice,
    Contractor,
    ContractorOffice,
    Address,
    LandLot,
    Zoning,
    BuildingUsage,
    ConstructionCost,
    Buildings,
    Blocks,
    FloorsAbove,
    FloorsBelow,
    Units,
    FloorSummary,
    Extra,
    FirstSeenAt,
    UpdatedAt,
}

#[derive(Iden)]
enum ChangeEvents {
    Table,
    Id,
    NaturalKey,
    Field,
    OldValue,
    NewValue,
    WorkUnitKey,
    ChangedAt,
}

#[derive(Iden)]
enum WorkUnits {
    Table,
    Id,
    RunId,
    UnitKey,
    Kind,
    Status,
    AttemptCount,
    MaxRetries,
    LastError,
    CreatedAt,
    StartedAt,
    FinishedAt,
}

#[derive(Iden)]
enum CrawlRuns {
    Table,
    Id,
    Spec,
    Status,
    CreatedRecords,
    UpdatedRecords,
    UnchangedRecords,
    FailedUnits,
    StartedAt,
    FinishedAt,
}
