// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "permits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub natural_key: String,
    pub authority: String,
    pub permit_no: String,
    pub kind: String,
    pub issue_date: Option<Date>,
    pub applicant: Option<String>,
    pub designer: Option<String>,
    pub designer_office: Option<String>,
    pub supervisor: Option<String>,
    pub supervisor_office: Option<String>,
    pub contractor: Option<String>,
    pub contractor_office: Option<String>,
    pub address: Option<String>,
    pub land_lot: Option<String>,
    pub zoning: Option<String>,
    pub building_usage: Option<String>,
    pub construction_cost: Option<i64>,
    pub buildings: i32,
    pub blocks: i32,
    pub floors_above: i32,
    pub floors_below: i32,
    pub units: i32,
    pub floor_summary: Json,
    pub extra: Json,
    pub first_seen_at: ChronoDateTimeWithTimeZone,
    pub updated_at: ChronoDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
