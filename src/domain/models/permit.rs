// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 执照类别
///
/// 上游执照字号中含"造字"或"建字"者归为建造执照，
/// 含"使字"（排除"變使字"）者归为使用执照。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LicenseKind {
    /// 建造執照
    Construction,
    /// 使用執照
    Occupancy,
    /// 其它
    #[default]
    Other,
}

impl fmt::Display for LicenseKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LicenseKind::Construction => write!(f, "construction"),
            LicenseKind::Occupancy => write!(f, "occupancy"),
            LicenseKind::Other => write!(f, "other"),
        }
    }
}

impl FromStr for LicenseKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "construction" => Ok(LicenseKind::Construction),
            "occupancy" => Ok(LicenseKind::Occupancy),
            "other" => Ok(LicenseKind::Other),
            _ => Err(()),
        }
    }
}

/// 建筑执照记录
///
/// 标准化后的执照实体。自然键由发照机关与执照字号
/// 确定性导出，在存储中唯一；其余字段在重复爬取时可变。
/// 不含存储时间戳，以保证同一原始记录的标准化结果
/// 逐字节一致。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermitRecord {
    /// 自然键：小写、空白折叠后的 `机关:执照字号`
    pub natural_key: String,
    /// 发照机关
    pub authority: String,
    /// 核发执照字号
    pub permit_no: String,
    /// 执照类别
    pub kind: LicenseKind,
    /// 发照日期（由民国纪年转换）
    pub issue_date: Option<NaiveDate>,
    /// 起造人代表人
    pub applicant: Option<String>,
    /// 设计人
    pub designer: Option<String>,
    /// 设计人事务所
    pub designer_office: Option<String>,
    /// 监造人
    pub supervisor: Option<String>,
    /// 监造人事务所
    pub supervisor_office: Option<String>,
    /// 承造人
    pub contractor: Option<String>,
    /// 承造人营造厂
    pub contractor_office: Option<String>,
    /// 门牌地址
    pub address: Option<String>,
    /// 地号
    pub land_lot: Option<String>,
    /// 土地使用分区
    pub zoning: Option<String>,
    /// 建筑物用途
    pub building_usage: Option<String>,
    /// 工程造价（新台币元）
    pub construction_cost: Option<i64>,
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
    /// 楼层概要（逐层明细）
    pub floor_summary: serde_json::Value,
    /// 来源特有的额外字段
    pub extra: serde_json::Value,
}

impl PermitRecord {
    /// 从机关与执照字号导出自然键
    ///
    /// 大小写不敏感、空白折叠，保证同一执照在不同页面
    /// 上的写法差异收敛到同一个键。
    pub fn derive_natural_key(authority: &str, permit_no: &str) -> String {
        let collapse = |s: &str| {
            s.split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase()
        };
        format!("{}:{}", collapse(authority), collapse(permit_no))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_key_case_and_whitespace_insensitive() {
        let a = PermitRecord::derive_natural_key("新北市", "113信建字第00123號");
        let b = PermitRecord::derive_natural_key(" 新北市 ", "113信建字第00123號 ");
        assert_eq!(a, b);
        assert_eq!(a, "新北市:113信建字第00123號".to_lowercase());
    }

    #[test]
    fn test_natural_key_collapses_inner_whitespace() {
        let a = PermitRecord::derive_natural_key("Hsinchu  County", "A  B");
        assert_eq!(a, "hsinchu county:a b");
    }

    #[test]
    fn test_license_kind_round_trip() {
        for kind in [
            LicenseKind::Construction,
            LicenseKind::Occupancy,
            LicenseKind::Other,
        ] {
            assert_eq!(kind.to_string().parse::<LicenseKind>().unwrap(), kind);
        }
    }
}
