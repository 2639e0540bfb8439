// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::raw::{RawDocument, RawRecord};
use crate::domain::models::work_unit::WorkUnitKind;
use crate::normalizer::text::clean_text;
use crate::parser::{PageParser, ParseError, ParseOutput};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::debug;

static RUN_BUTTON: Lazy<Regex> = Lazy::new(|| Regex::new(r"run_button\('([^']+)'").unwrap());

/// NBUPIC 查询结果列表解析器
///
/// 日期切片查询返回的结果页内嵌 `run_button('<索引键>')`
/// 调用，逐一提取为待跟进的详情工作单元。结果页本身
/// 不含完整执照数据。
pub struct NbupicListingParser {
    /// 发照机关名称，传递给发现的详情单元
    pub authority: String,
}

impl PageParser for NbupicListingParser {
    fn parse(&self, doc: &RawDocument) -> Result<ParseOutput, ParseError> {
        if !doc.body.contains('<') {
            return Err(ParseError::UnrecognizedStructure(format!(
                "not html (hash={})",
                doc.content_hash
            )));
        }

        let mut seen = BTreeSet::new();
        let discovered = RUN_BUTTON
            .captures_iter(&doc.body)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|key| seen.insert(key.clone()))
            .map(|index_key| WorkUnitKind::Detail {
                authority: self.authority.clone(),
                index_key,
            })
            .collect::<Vec<_>>();

        debug!(unit_key = %doc.unit_key, found = discovered.len(), "nbupic listing parsed");
        Ok(ParseOutput {
            records: Vec::new(),
            discovered,
        })
    }

    fn name(&self) -> &'static str {
        "nbupic_listing"
    }
}

/// NBUPIC 执照详情页解析器
///
/// 详情页由若干 `div.main-header` 区块组成：首个区块是
/// 键值对表格，其余区块是带 h2 标题的明细表。上游键名
/// 映射为跨系统一致的规范键名后产出单条完整记录。
pub struct NbupicDetailParser;

static HEADER_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("div.main-header").unwrap());
static TD_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());
static H2_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").unwrap());
static THEAD_TH_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("thead th").unwrap());
static TBODY_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody").unwrap());
static TR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").unwrap());

/// 上游键名到规范键名的映射
const KEY_RENAMES: &[(&str, &str)] = &[
    ("執照字號", "核發執照字號"),
    ("設計人(姓名)", "設計人"),
    ("設計人(事務所)", "設計人事務所"),
    ("監造人(姓名)", "監造人"),
    ("監造人(事務所)", "監造人事務所"),
    ("承造人(姓名)", "承造人"),
    ("承造人(營造廠)", "承造人營造廠"),
    ("構造種類", "構造別"),
    ("建物高度", "建築物高度"),
    ("基地面積(合計)", "基地面積"),
    ("建築面積(其他)", "建築面積"),
    ("防空避難面積(地下)", "地下避難面積"),
];

fn clean_key(s: &str) -> String {
    // 键名额外折叠内部空白，上游同一键的空格写法不稳定
    clean_text(s).split_whitespace().collect()
}

fn canonical_key(key: String) -> String {
    for (from, to) in KEY_RENAMES {
        if key == *from {
            return (*to).to_string();
        }
    }
    key
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>()
}

impl PageParser for NbupicDetailParser {
    fn parse(&self, doc: &RawDocument) -> Result<ParseOutput, ParseError> {
        let document = Html::parse_document(&doc.body);
        let mut headers = document.select(&HEADER_SEL);

        let Some(basic) = headers.next() else {
            return Err(ParseError::UnrecognizedStructure(format!(
                "no main-header blocks (hash={})",
                doc.content_hash
            )));
        };

        let index_key = doc
            .unit_key
            .strip_prefix("detail:")
            .and_then(|rest| rest.split_once(':'))
            .map(|(_, key)| key)
            .unwrap_or(&doc.unit_key);
        let mut record = RawRecord::new(index_key);

        // 首个区块：相邻 td 成对构成键值
        let cells: Vec<String> = basic.select(&TD_SEL).map(element_text).collect();
        for pair in cells.chunks(2) {
            if let [key, value] = pair {
                let key = canonical_key(clean_key(key));
                if !key.is_empty() {
                    record.fields.insert(key, clean_text(value));
                }
            }
        }

        // 其余区块：h2 标题 + 明细表
        let mut tables = serde_json::Map::new();
        for section in headers {
            let Some(title) = section.select(&H2_SEL).next() else {
                continue;
            };
            let title = clean_key(&element_text(title));
            let detail_keys: Vec<String> = section
                .select(&THEAD_TH_SEL)
                .map(|th| clean_key(&element_text(th)))
                .skip(1)
                .collect();

            let mut rows = Vec::new();
            for tbody in section.select(&TBODY_SEL) {
                for tr in tbody.select(&TR_SEL) {
                    let values: Vec<String> = tr
                        .select(&TD_SEL)
                        .skip(1)
                        .map(|td| clean_text(&element_text(td)))
                        .collect();
                    if values.is_empty() {
                        continue;
                    }
                    let row: serde_json::Map<String, Value> = detail_keys
                        .iter()
                        .zip(values)
                        .map(|(k, v)| (k.clone(), Value::String(v)))
                        .collect();
                    rows.push(Value::Object(row));
                }
            }
            if !title.is_empty() {
                tables.insert(title, Value::Array(rows));
            }
        }

        // 楼层概要进入嵌套结构；建筑物用途由使用类组合并
        if let Some(floors) = tables.get("樓層概要資料") {
            record.nested = floors.clone();
            let mut usages: BTreeSet<String> = BTreeSet::new();
            if let Some(rows) = floors.as_array() {
                for row in rows {
                    if let Some(usage) = row.get("使用類組").and_then(Value::as_str) {
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
        } else if !tables.is_empty() {
            record.nested = json!(tables);
        }

        debug!(unit_key = %doc.unit_key, fields = record.fields.len(), "nbupic detail parsed");
        Ok(ParseOutput {
            records: vec![record],
            discovered: Vec::new(),
        })
    }

    fn name(&self) -> &'static str {
        "nbupic_detail"
    }
}
