// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 变更事件
///
/// 重复爬取发现既有执照的某个字段发生变化时产生，
/// 记录新旧值与产生它的工作单元。创建后不可变，仅追加。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// 事件唯一标识符
    pub id: Uuid,
    /// 所属执照的自然键
    pub natural_key: String,
    /// 变更的字段名
    pub field: String,
    /// 变更前的值
    pub old_value: serde_json::Value,
    /// 变更后的值
    pub new_value: serde_json::Value,
    /// 产生变更的工作单元键
    pub work_unit_key: String,
    /// 变更时间
    pub changed_at: DateTime<FixedOffset>,
}

impl ChangeEvent {
    /// 创建一个新的变更事件
    pub fn new(
        natural_key: &str,
        field: &str,
        old_value: serde_json::Value,
        new_value: serde_json::Value,
        work_unit_key: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            natural_key: natural_key.to_string(),
            field: field.to_string(),
            old_value,
            new_value,
            work_unit_key: work_unit_key.to_string(),
            changed_at: Utc::now().into(),
        }
    }
}
