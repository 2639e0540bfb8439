// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::raw::{RawDocument, RawRecord};
use crate::parser::{PageParser, ParseError, ParseOutput};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// MCGBM 开放资料列表解析器
///
/// 解析 `{"data": [ ... ]}` 信封，每行产出一条候选记录。
/// 上游响应中夹杂 0x05 控制字节，解析前剥除。单行缺字段
/// 不致错；信封结构无法识别时整个文档失败。
pub struct McgbmListingParser;

impl PageParser for McgbmListingParser {
    fn parse(&self, doc: &RawDocument) -> Result<ParseOutput, ParseError> {
        let body = doc.body.replace('\u{5}', "");
        let envelope: Value = serde_json::from_str(&body).map_err(|e| {
            ParseError::UnrecognizedStructure(format!("not json (hash={}): {}", doc.content_hash, e))
        })?;

        let rows = envelope
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ParseError::UnrecognizedStructure(format!(
                    "missing data array (hash={})",
                    doc.content_hash
                ))
            })?;

        let records = rows.iter().map(row_to_record).collect::<Vec<_>>();
        debug!(unit_key = %doc.unit_key, rows = records.len(), "mcgbm listing parsed");
        Ok(ParseOutput {
            records,
            discovered: Vec::new(),
        })
    }

    fn name(&self) -> &'static str {
        "mcgbm_listing"
    }
}

fn row_to_record(row: &Value) -> RawRecord {
    let Some(object) = row.as_object() else {
        // 残缺行产出空记录，由标准化器以缺键错误排除
        return RawRecord::new("");
    };

    let index_key = object
        .get("_id")
        .and_then(|v| v.get("$oid"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    let mut record = RawRecord::new(&index_key);

    for (key, value) in object {
        match (key.as_str(), value) {
            ("_id", _) => {}
            ("樓層概要", nested) => {
                record.nested = nested.clone();
            }
            (_, Value::String(s)) => {
                record.fields.insert(key.clone(), s.clone());
            }
            (_, Value::Number(n)) => {
                record.fields.insert(key.clone(), n.to_string());
            }
            (_, nested @ (Value::Array(_) | Value::Object(_))) => {
                // 地號、門牌等列表字段保留为JSON文本
                record
                    .fields
                    .insert(key.clone(), nested.to_string());
            }
            _ => {}
        }
    }

    // 建筑物用途：顶层字段与楼层概要的楼层用途合并去重
    let mut usages: BTreeSet<String> = BTreeSet::new();
    if let Some(top) = object.get("建築物用途").and_then(Value::as_str) {
        usages.extend(top.split(", ").map(str::to_string));
    }
    if let Some(floors) = object.get("樓層概要").and_then(Value::as_array) {
        for floor in floors {
            if let Some(usage) = floor.get("樓層用途").and_then(Value::as_str) {
                usages.extend(usage.split('、').map(str::to_string));
            }
        }
    }
    if !usages.is_empty() {
        record.fields.insert(
            "建築物用途".to_string(),
            usages.into_iter().collect::<Vec<_>>().join("、"),
        );
    }

    record
}
