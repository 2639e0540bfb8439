// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;

static BUILDINGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)棟").unwrap());
static BLOCKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)幢").unwrap());
static FLOORS_ABOVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"地上(\d+)層").unwrap());
static FLOORS_BELOW: Lazy<Regex> = Lazy::new(|| Regex::new(r"地下(\d+)層").unwrap());
static UNITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)戶").unwrap());
static COST: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\$([\d,]+)\)").unwrap());

/// 建筑概况
///
/// 从"層棟戶數"类字段解析出的五元组。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildingInfo {
    /// 栋数
    pub buildings: i32,
    /// 幢数
    pub blocks: i32,
    /// 地上层数
    pub floors_above: i32,
    /// 地下层数
    pub floors_below: i32,
    /// 户数
    pub units: i32,
}

fn capture_int(re: &Regex, s: &str) -> i32 {
    re.captures(s)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// 解析建筑概况字段
///
/// 如 `2幢2棟，地上15層，地下3層，共56戶`，缺失的分量取0。
pub fn parse_building_info(s: &str) -> BuildingInfo {
    if s.is_empty() {
        return BuildingInfo::default();
    }
    BuildingInfo {
        buildings: capture_int(&BUILDINGS, s),
        blocks: capture_int(&BLOCKS, s),
        floors_above: capture_int(&FLOORS_ABOVE, s),
        floors_below: capture_int(&FLOORS_BELOW, s),
        units: capture_int(&UNITS, s),
    }
}

/// 提取工程造价
///
/// 上游写法为 `...($12,345,678)`；去除千分位后取整，
/// 无法提取时返回 None。
pub fn extract_cost(s: &str) -> Option<i64> {
    let captured = COST.captures(s)?.get(1)?.as_str().replace(',', "");
    captured.parse::<f64>().ok().map(|v| v.round() as i64)
}

/// 从带单位后缀的字串中安全提取整数
///
/// `3棟` → 3，`15層` → 15，纯数字原样解析，其余取0。
pub fn suffixed_int(s: &str) -> i32 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0;
    }
    let stripped = trimmed
        .strip_suffix('棟')
        .or_else(|| trimmed.strip_suffix('層'))
        .or_else(|| trimmed.strip_suffix('戶'))
        .unwrap_or(trimmed);
    stripped.parse().unwrap_or(0)
}
