// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::permit::{LicenseKind, PermitRecord};
use crate::domain::models::raw::RawRecord;
use thiserror::Error;

pub mod building;
pub mod roc;
pub mod text;

use building::{parse_building_info, suffixed_int, BuildingInfo};
use text::{clean_opt, clean_text};

/// 标准化错误类型
#[derive(Error, Debug)]
pub enum ValidationError {
    /// 无法导出自然键（缺少执照字号）
    #[error("Missing permit number, cannot derive natural key (index_key={0})")]
    MissingKey(String),

    /// 字段格式错误
    #[error("Malformed field {field}: {reason}")]
    MalformedField { field: String, reason: String },
}

/// 从执照字号判定执照类别
///
/// 含"造字"/"建字"/"建造"者为建造执照；含"使字"（排除
/// "變使字"）或"使用執照"/"用字"者为使用执照；其余归为其它。
pub fn classify_license(s: &str) -> LicenseKind {
    if s.contains("造字") || s.contains("建字") || s.contains("建造") {
        LicenseKind::Construction
    } else if (s.contains("使字") && !s.contains("變使字"))
        || s.contains("使用執照")
        || s.contains("用字")
    {
        LicenseKind::Occupancy
    } else {
        LicenseKind::Other
    }
}

/// 被映射进类型化字段的上游键名，其余键进入 extra
const TYPED_KEYS: &[&str] = &[
    "核發執照字號",
    "執照類別",
    "發照日期",
    "起造人代表人",
    "起造人",
    "設計人",
    "設計人事務所",
    "監造人",
    "監造人事務所",
    "承造人",
    "承造人營造廠",
    "門牌",
    "地址",
    "地號",
    "土地使用分區",
    "使用分區",
    "建築物用途",
    "工程造價",
    "層棟戶數",
    "層棧戶數",
    "棟數",
    "幢數",
    "地上層數",
    "地下層數",
    "戶數",
];

fn first_field<'a>(raw: &'a RawRecord, keys: &[&str]) -> &'a str {
    keys.iter()
        .map(|k| raw.field(k))
        .find(|v| !v.is_empty())
        .unwrap_or("")
}

fn building_info(raw: &RawRecord) -> BuildingInfo {
    // NBUPIC 合并写法优先；上游两种键名混用
    let combined = first_field(raw, &["層棟戶數", "層棧戶數"]);
    if !combined.is_empty() {
        return parse_building_info(combined);
    }
    BuildingInfo {
        buildings: suffixed_int(raw.field("棟數")),
        blocks: suffixed_int(raw.field("幢數")),
        floors_above: suffixed_int(raw.field("地上層數")),
        floors_below: suffixed_int(raw.field("地下層數")),
        units: suffixed_int(raw.field("戶數")),
    }
}

fn construction_cost(raw: &RawRecord) -> Option<i64> {
    let value = raw.field("工程造價");
    if value.is_empty() {
        return None;
    }
    // 上游有两种写法：带括号的 `($1,234)` 与裸数字
    building::extract_cost(value).or_else(|| {
        clean_text(value)
            .replace(',', "")
            .parse::<f64>()
            .ok()
            .map(|v| v.round() as i64)
    })
}

/// 标准化一条原始记录
///
/// 确定性转换：同一 RawRecord 的两次标准化产出逐字节
/// 一致的 PermitRecord。缺少执照字号时返回 MissingKey，
/// 由调用方记录日志并排除该条记录。
pub fn normalize(raw: &RawRecord, authority: &str) -> Result<PermitRecord, ValidationError> {
    let permit_no = clean_text(raw.field("核發執照字號"));
    if permit_no.is_empty() {
        return Err(ValidationError::MissingKey(raw.index_key.clone()));
    }

    let kind_source = first_field(raw, &["執照類別", "核發執照字號"]);
    let kind = classify_license(kind_source);

    let issue_date = roc::roc_str_to_date(&clean_text(raw.field("發照日期")));
    let info = building_info(raw);

    let extra: serde_json::Map<String, serde_json::Value> = raw
        .fields
        .iter()
        .filter(|(k, _)| !TYPED_KEYS.contains(&k.as_str()))
        .filter_map(|(k, v)| {
            clean_opt(v).map(|cleaned| (k.clone(), serde_json::Value::String(cleaned)))
        })
        .collect();

    Ok(PermitRecord {
        natural_key: PermitRecord::derive_natural_key(authority, &permit_no),
        authority: authority.to_string(),
        permit_no,
        kind,
        issue_date,
        applicant: clean_opt(first_field(raw, &["起造人代表人", "起造人"])),
        designer: clean_opt(raw.field("設計人")),
        designer_office: clean_opt(raw.field("設計人事務所")),
        supervisor: clean_opt(raw.field("監造人")),
        supervisor_office: clean_opt(raw.field("監造人事務所")),
        contractor: clean_opt(raw.field("承造人")),
        contractor_office: clean_opt(raw.field("承造人營造廠")),
        address: clean_opt(first_field(raw, &["門牌", "地址"])),
        land_lot: clean_opt(raw.field("地號")),
        zoning: clean_opt(first_field(raw, &["土地使用分區", "使用分區"])),
        building_usage: clean_opt(raw.field("建築物用途")),
        construction_cost: construction_cost(raw),
        buildings: info.buildings,
        blocks: info.blocks,
        floors_above: info.floors_above,
        floors_below: info.floors_below,
        units: info.units,
        floor_summary: raw.nested.clone(),
        extra: serde_json::Value::Object(extra),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_raw() -> RawRecord {
        let mut raw = RawRecord::new("abc123");
        raw.fields
            .insert("核發執照字號".to_string(), "113信建字第00123號".to_string());
        raw.fields
            .insert("發照日期".to_string(), "113/05/20".to_string());
        raw.fields
            .insert("起造人代表人".to_string(), "王小明\u{3000}".to_string());
        raw.fields
            .insert("層棟戶數".to_string(), "2棟，地上12層，地下2層，共48戶".to_string());
        raw.fields
            .insert("工程造價".to_string(), "($123,456,789)".to_string());
        raw.fields
            .insert("構造別".to_string(), "鋼筋混凝土造".to_string());
        raw
    }

    #[test]
    fn test_normalize_maps_typed_fields() {
        let record = normalize(&sample_raw(), "新北市").unwrap();
        assert_eq!(record.permit_no, "113信建字第00123號");
        assert_eq!(record.kind, LicenseKind::Construction);
        assert_eq!(
            record.issue_date,
            NaiveDate::from_ymd_opt(2024, 5, 20)
        );
        assert_eq!(record.applicant.as_deref(), Some("王小明"));
        assert_eq!(record.buildings, 2);
        assert_eq!(record.floors_above, 12);
        assert_eq!(record.units, 48);
        assert_eq!(record.construction_cost, Some(123_456_789));
        assert_eq!(record.extra["構造別"], "鋼筋混凝土造");
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let raw = sample_raw();
        let a = normalize(&raw, "新北市").unwrap();
        let b = normalize(&raw, "新北市").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.natural_key, b.natural_key);
    }

    #[test]
    fn test_missing_permit_no_is_validation_error() {
        let mut raw = sample_raw();
        raw.fields.remove("核發執照字號");
        match normalize(&raw, "新北市") {
            Err(ValidationError::MissingKey(key)) => assert_eq!(key, "abc123"),
            other => panic!("expected MissingKey, got {:?}", other),
        }
    }

    #[test]
    fn test_placeholder_permit_no_is_validation_error() {
        let mut raw = sample_raw();
        raw.fields
            .insert("核發執照字號".to_string(), "-".to_string());
        assert!(normalize(&raw, "新北市").is_err());
    }

    #[test]
    fn test_classify_license() {
        assert_eq!(classify_license("113信建字第00123號"), LicenseKind::Construction);
        assert_eq!(classify_license("113使字第00045號"), LicenseKind::Occupancy);
        assert_eq!(classify_license("113變使字第00045號"), LicenseKind::Other);
        assert_eq!(classify_license("拆除執照"), LicenseKind::Other);
    }

    #[test]
    fn test_explicit_count_fields() {
        let mut raw = RawRecord::new("x");
        raw.fields
            .insert("核發執照字號".to_string(), "113使字第1號".to_string());
        raw.fields.insert("棟數".to_string(), "3棟".to_string());
        raw.fields.insert("地上層數".to_string(), "8".to_string());
        let record = normalize(&raw, "台中市").unwrap();
        assert_eq!(record.buildings, 3);
        assert_eq!(record.floors_above, 8);
    }

    #[test]
    fn test_bare_numeric_cost() {
        let mut raw = RawRecord::new("x");
        raw.fields
            .insert("核發執照字號".to_string(), "113使字第1號".to_string());
        raw.fields
            .insert("工程造價".to_string(), "4560000".to_string());
        let record = normalize(&raw, "台中市").unwrap();
        assert_eq!(record.construction_cost, Some(4_560_000));
    }
}
