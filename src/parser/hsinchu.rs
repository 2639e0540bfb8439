// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::raw::{RawDocument, RawRecord};
use crate::domain::models::work_unit::WorkUnitKind;
use crate::normalizer::text::clean_text;
use crate::parser::{PageParser, ParseError, ParseOutput};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// 新竹县查询结果列表解析器
///
/// 列表接口返回 JSONP（`ok({...})` 包裹的 JSON），`rows`
/// 数组的每行带 `index_key`，逐一提取为待跟进的详情
/// 工作单元。缺索引键的行无从跟进，直接跳过。
pub struct HsinchuListingParser {
    /// 发照机关名称，传递给发现的详情单元
    pub authority: String,
}

/// 剥掉 JSONP 回调包装，留下内层 JSON
fn strip_jsonp(body: &str) -> Option<&str> {
    let start = body.find('(')?;
    let end = body.rfind(')')?;
    body.get(start + 1..end)
}

impl PageParser for HsinchuListingParser {
    fn parse(&self, doc: &RawDocument) -> Result<ParseOutput, ParseError> {
        let inner = strip_jsonp(&doc.body).unwrap_or(&doc.body);
        let value: Value = serde_json::from_str(inner.trim()).map_err(|e| {
            ParseError::UnrecognizedStructure(format!(
                "not jsonp: {} (hash={})",
                e, doc.content_hash
            ))
        })?;
        let Some(rows) = value.get("rows").and_then(Value::as_array) else {
            return Err(ParseError::UnrecognizedStructure(format!(
                "missing rows array (hash={})",
                doc.content_hash
            )));
        };

        let mut seen = BTreeSet::new();
        let discovered = rows
            .iter()
            .filter_map(|row| row.get("index_key").and_then(Value::as_str))
            .map(str::to_string)
            .filter(|key| !key.is_empty() && seen.insert(key.clone()))
            .map(|index_key| WorkUnitKind::Detail {
                authority: self.authority.clone(),
                index_key,
            })
            .collect::<Vec<_>>();

        debug!(unit_key = %doc.unit_key, found = discovered.len(), "hsinchu listing parsed");
        Ok(ParseOutput {
            records: Vec::new(),
            discovered,
        })
    }

    fn name(&self) -> &'static str {
        "hsinchu_listing"
    }
}

/// 新竹县执照详情页解析器
///
/// 详情页由 `div.tableCon` 区块组成，键名写在 `tit01` 到
/// `tit09` 层级类的 span 上，值是 span 之后的文本节点。
/// 层级键按路径用连字号串起后映射为规范键名；顶层区块
/// 自身携带的前两个值即核发与原领执照字号。明细表以
/// 前一个兄弟元素的标题归类，楼层概要进入嵌套结构。
pub struct HsinchuDetailParser;

static TABLE_CON_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("div.tableCon").unwrap());
static TIT_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"span[class^="tit"]"#).unwrap());
static TABLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static THEAD_TH_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("thead th").unwrap());
static TBODY_TR_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody tr").unwrap());
static TD_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

/// 层级路径键到规范键名的映射
const KEY_RENAMES: &[(&str, &str)] = &[
    ("建物概要-發照日期", "發照日期"),
    ("建物概要-層棧戶數", "層棧戶數"),
    ("建物概要-工程造價", "工程造價"),
    ("建物概要-建造類別", "建造類別"),
    ("建物概要-建造類別-構造種類", "構造別"),
    ("建物概要-設計建蔽率", "設計建蔽率"),
    ("建物概要-設計容積率", "設計容積率"),
    ("建物概要-設計容積率-建物高度", "建築物高度"),
    ("基地概要-地號", "地號"),
    ("基地概要-地址", "門牌"),
    ("基地概要-使用分區", "使用分區"),
    ("起造人-姓名", "起造人"),
    ("設計人-姓名", "設計人"),
    ("設計人-姓名-事務所", "設計人事務所"),
    ("監造人-姓名", "監造人"),
    ("監造人-姓名-事務所", "監造人事務所"),
    ("承造人-姓名", "承造人"),
    ("承造人-姓名-營造廠", "承造人營造廠"),
];

fn canonical_key(key: String) -> String {
    for (from, to) in KEY_RENAMES {
        if key == *from {
            return (*to).to_string();
        }
    }
    key
}

/// span 的 tit 类名最后两位即层级深度
fn tit_level(el: ElementRef) -> Option<u8> {
    el.value()
        .classes()
        .find(|class| class.starts_with("tit"))
        .and_then(|class| class.get(3..))
        .and_then(|digits| digits.parse().ok())
}

/// span 之后、下一个元素之前的文本节点即该键的值
fn following_text(el: ElementRef) -> String {
    let mut value = String::new();
    let mut node = el.next_sibling();
    while let Some(current) = node {
        if current.value().is_element() {
            break;
        }
        if let Some(text) = current.value().as_text() {
            value.push_str(text);
        }
        node = current.next_sibling();
    }
    clean_text(&value)
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>()
}

impl PageParser for HsinchuDetailParser {
    fn parse(&self, doc: &RawDocument) -> Result<ParseOutput, ParseError> {
        let document = Html::parse_document(&doc.body);
        if document.select(&TABLE_CON_SEL).next().is_none() {
            return Err(ParseError::UnrecognizedStructure(format!(
                "no tableCon blocks (hash={})",
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

        // 层级键栈：同级或更深的旧路径在新键出现时弹出
        let mut stack: Vec<(u8, String)> = Vec::new();
        let mut top_values = 0usize;
        for section in document.select(&TABLE_CON_SEL) {
            for span in section.select(&TIT_SEL) {
                let Some(level) = tit_level(span) else {
                    continue;
                };
                let label = clean_text(&element_text(span));
                while stack.last().is_some_and(|(l, _)| *l >= level) {
                    stack.pop();
                }
                stack.push((level, label));

                let value = following_text(span);
                if value.is_empty() {
                    continue;
                }
                let key = if level == 1 {
                    // 顶层两个执照字号不带键名，按出现顺序归位
                    top_values += 1;
                    match top_values {
                        1 => "核發執照字號".to_string(),
                        _ => "原領執照字號".to_string(),
                    }
                } else {
                    // 路径不含顶层区块标题，只从二级键起串接
                    let path: Vec<&str> = stack
                        .iter()
                        .filter(|(l, _)| *l > 1)
                        .map(|(_, label)| label.as_str())
                        .collect();
                    canonical_key(path.join("-"))
                };
                if !key.is_empty() {
                    record.fields.insert(key, value);
                }
            }
        }

        // 楼层概要表：标题在表格的前一个兄弟元素上
        for table in document.select(&TABLE_SEL) {
            let heading = table
                .prev_siblings()
                .filter_map(ElementRef::wrap)
                .map(|el| clean_text(&element_text(el)))
                .find(|text| !text.is_empty());
            if heading.as_deref() != Some("樓層概要資料") {
                continue;
            }

            let keys: Vec<String> = table
                .select(&THEAD_TH_SEL)
                .map(|th| clean_text(&element_text(th)))
                .collect();
            let mut rows = Vec::new();
            let mut usages: BTreeSet<String> = BTreeSet::new();
            for tr in table.select(&TBODY_TR_SEL) {
                let row: serde_json::Map<String, Value> = keys
                    .iter()
                    .zip(tr.select(&TD_SEL))
                    .map(|(k, td)| {
                        (k.clone(), Value::String(clean_text(&element_text(td))))
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

        debug!(unit_key = %doc.unit_key, fields = record.fields.len(), "hsinchu detail parsed");
        Ok(ParseOutput {
            records: vec![record],
            discovered: Vec::new(),
        })
    }

    fn name(&self) -> &'static str {
        "hsinchu_detail"
    }
}
