// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::raw::{RawDocument, RawRecord};
use crate::domain::models::work_unit::WorkUnitKind;
use crate::normalizer::text::clean_text;
use crate::parser::{PageParser, ParseError, ParseOutput};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// 高雄市查询结果列表解析器
///
/// 列表接口返回 JSON 数组，每行带 `dkey` 与 `licdate`，
/// 逐一提取为待跟进的详情工作单元。缺任一字段的行
/// 跳过。
pub struct KaohsiungListingParser {
    /// 发照机关名称，传递给发现的详情单元
    pub authority: String,
}

impl PageParser for KaohsiungListingParser {
    fn parse(&self, doc: &RawDocument) -> Result<ParseOutput, ParseError> {
        let value: Value = serde_json::from_str(doc.body.trim()).map_err(|e| {
            ParseError::UnrecognizedStructure(format!(
                "not json: {} (hash={})",
                e, doc.content_hash
            ))
        })?;
        let Some(rows) = value.as_array() else {
            return Err(ParseError::UnrecognizedStructure(format!(
                "expected top-level array (hash={})",
                doc.content_hash
            )));
        };

        let mut seen = BTreeSet::new();
        let discovered = rows
            .iter()
            .filter(|row| row.get("licdate").and_then(Value::as_str).is_some())
            .filter_map(|row| row.get("dkey").and_then(Value::as_str))
            .map(str::to_string)
            .filter(|key| !key.is_empty() && seen.insert(key.clone()))
            .map(|index_key| WorkUnitKind::Detail {
                authority: self.authority.clone(),
                index_key,
            })
            .collect::<Vec<_>>();

        debug!(unit_key = %doc.unit_key, found = discovered.len(), "kaohsiung listing parsed");
        Ok(ParseOutput {
            records: Vec::new(),
            discovered,
        })
    }

    fn name(&self) -> &'static str {
        "kaohsiung_listing"
    }
}

/// 高雄市执照详情解析器
///
/// 详情接口直接返回 JSON 对象，字段名为英文缩写，
/// 映射为跨系统一致的规范键名。地址与地号在对象里是
/// 嵌套数组，压平后以顿号串接；楼层明细进入嵌套结构。
pub struct KaohsiungDetailParser;

/// 上游字段名到规范键名的映射
const FIELD_RENAMES: &[(&str, &str)] = &[
    ("license_desc", "核發執照字號"),
    ("license_desc_old", "原領執照字號"),
    ("IDlicedate", "發照日期"),
    ("buildfloor", "層棟戶數"),
    ("bmp01_name", "起造人代表人"),
    ("bmp02_name", "設計人"),
    ("p02_officename", "設計人事務所"),
    ("bmp03_name", "監造人"),
    ("p03_officename", "監造人事務所"),
    ("bmp04_boss", "承造人"),
    ("p04_companyname", "承造人營造廠"),
    ("lanusage", "土地使用分區"),
    ("price", "工程造價"),
    ("buildheight", "建築物高度"),
    ("buildkind", "構造別"),
    ("buildcategory", "建造類別"),
    ("base_area_total", "基地面積"),
    ("building_area_other", "建築面積"),
    ("total_con_area", "總樓地板面積"),
    ("coverrate", "設計建蔽率"),
    ("spacerate", "設計容積率"),
    ("airraid_d_area", "地下避難面積"),
    ("openspace", "法定空地面積"),
    ("commence_date", "開工日期"),
    ("complete_date", "竣工日期"),
];

/// 楼层明细行的字段映射
const STAIR_RENAMES: &[(&str, &str)] = &[
    ("building_no", "棟別"),
    ("story_code", "層別"),
    ("story_height", "樓層高度"),
    ("story_area", "申請面積"),
    ("veranda_area", "陽台面積"),
    ("terrace_area", "露台面積"),
    ("usage_code_desc", "使用類組"),
];

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// 门牌：单值字段优先，否则压平 p01addr 数组
fn address(value: &Value) -> Option<String> {
    if let Some(addr) = str_field(value, "addr") {
        return Some(addr.to_string());
    }
    let parts: Vec<&str> = value
        .get("p01addr")?
        .as_array()?
        .iter()
        .filter_map(|entry| str_field(entry, "addr"))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("、"))
    }
}

/// 地号：结构化的 lan_data 优先，否则取 lan 的首个空白分段
fn land_lot(value: &Value) -> Option<String> {
    if let Some(entries) = value.get("lan_data").and_then(Value::as_array) {
        let parts: Vec<String> = entries
            .iter()
            .filter_map(|entry| {
                let dist = str_field(entry, "dist")?;
                let section = str_field(entry, "section").unwrap_or("");
                let road = str_field(entry, "road").unwrap_or("");
                Some(format!("{}{}{}地號", dist, section, road))
            })
            .collect();
        if !parts.is_empty() {
            return Some(parts.join("、"));
        }
    }
    str_field(value, "lan")?
        .split_whitespace()
        .next()
        .map(str::to_string)
}

impl PageParser for KaohsiungDetailParser {
    fn parse(&self, doc: &RawDocument) -> Result<ParseOutput, ParseError> {
        let value: Value = serde_json::from_str(doc.body.trim()).map_err(|e| {
            ParseError::UnrecognizedStructure(format!(
                "not json: {} (hash={})",
                e, doc.content_hash
            ))
        })?;
        if !value.is_object() {
            return Err(ParseError::UnrecognizedStructure(format!(
                "expected top-level object (hash={})",
                doc.content_hash
            )));
        }

        let index_key = doc
            .unit_key
            .strip_prefix("detail:")
            .and_then(|rest| rest.split_once(':'))
            .map(|(_, key)| key)
            .unwrap_or(&doc.unit_key);
        let mut record = RawRecord::new(index_key);

        for (from, to) in FIELD_RENAMES {
            if let Some(field) = str_field(&value, from) {
                record.fields.insert((*to).to_string(), clean_text(field));
            }
        }
        if let Some(addr) = address(&value) {
            record.fields.insert("門牌".to_string(), clean_text(&addr));
        }
        if let Some(lot) = land_lot(&value) {
            record.fields.insert("地號".to_string(), clean_text(&lot));
        }

        // 楼层明细与使用类组合并
        if let Some(stairs) = value.get("stair").and_then(Value::as_array) {
            let mut rows = Vec::new();
            let mut usages: BTreeSet<String> = BTreeSet::new();
            for stair in stairs {
                let row: serde_json::Map<String, Value> = STAIR_RENAMES
                    .iter()
                    .filter_map(|(from, to)| {
                        str_field(stair, from)
                            .map(|v| ((*to).to_string(), Value::String(clean_text(v))))
                    })
                    .collect();
                if let Some(usage) = row.get("使用類組").and_then(Value::as_str) {
                    usages.extend(
                        usage.split('、').filter(|s| !s.is_empty()).map(str::to_string),
                    );
                }
                if !row.is_empty() {
                    rows.push(Value::Object(row));
                }
            }
            if !rows.is_empty() {
                record.nested = Value::Array(rows);
            }
            if !usages.is_empty() {
                record.fields.insert(
                    "建築物用途".to_string(),
                    usages.into_iter().collect::<Vec<_>>().join("、"),
                );
            }
        }

        debug!(unit_key = %doc.unit_key, fields = record.fields.len(), "kaohsiung detail parsed");
        Ok(ParseOutput {
            records: vec![record],
            discovered: Vec::new(),
        })
    }

    fn name(&self) -> &'static str {
        "kaohsiung_detail"
    }
}
