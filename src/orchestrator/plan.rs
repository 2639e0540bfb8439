// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::sources::SourceSystem;
use crate::domain::models::crawl_run::EnumerationSpec;
use crate::domain::models::work_unit::WorkUnitKind;
use crate::fetcher::PageRequest;
use crate::normalizer::roc::roc_format;
use thiserror::Error;
use url::Url;

/// MCGBM 列表页每页的记录条数，上游固定
pub const MCGBM_PAGE_SIZE: u32 = 100;

/// MCGBM 开放资料按执照类别分别查询
pub const LICENSE_QUERY_KINDS: [&str; 2] = ["建造執照", "使用執照"];

/// 计划错误类型
#[derive(Error, Debug)]
pub enum PlanError {
    /// 工作单元类型与来源系统不匹配
    #[error("Work unit {unit_key} cannot be served by a {system} source")]
    MismatchedSystem {
        unit_key: String,
        system: &'static str,
    },
    /// 注册表中的基础URL无法解析
    #[error("Invalid base url {0}")]
    InvalidBaseUrl(String),
}

/// 将枚举策略展开为工作单元集合
///
/// 展开是确定性的：同一策略总是产出同一组单元键，
/// 批次重建时借助键去重收敛到同一进度表。
pub fn enumerate(spec: &EnumerationSpec) -> Vec<WorkUnitKind> {
    match spec {
        EnumerationSpec::PageRange {
            authority,
            year,
            start_page,
            end_page,
        } => {
            let mut kinds = Vec::new();
            for license_kind in LICENSE_QUERY_KINDS {
                for page in *start_page..=*end_page {
                    kinds.push(WorkUnitKind::ListingPage {
                        authority: authority.clone(),
                        page,
                        license_kind: license_kind.to_string(),
                        year: *year,
                    });
                }
            }
            kinds
        }
        EnumerationSpec::DateWindow {
            authority,
            start_date,
            end_date,
        } => {
            let mut kinds = Vec::new();
            let mut date = *start_date;
            while date <= *end_date {
                kinds.push(WorkUnitKind::DateSlice {
                    authority: authority.clone(),
                    date,
                });
                let Some(next) = date.succ_opt() else { break };
                date = next;
            }
            kinds
        }
        EnumerationSpec::DetailSeeds {
            authority,
            index_keys,
        } => index_keys
            .iter()
            .map(|index_key| WorkUnitKind::Detail {
                authority: authority.clone(),
                index_key: index_key.clone(),
            })
            .collect(),
    }
}

/// 按工作单元类型与来源系统构建页面请求
pub fn build_request(
    kind: &WorkUnitKind,
    system: &SourceSystem,
) -> Result<PageRequest, PlanError> {
    match (kind, system) {
        (
            WorkUnitKind::ListingPage {
                page,
                license_kind,
                year,
                ..
            },
            SourceSystem::Mcgbm { base_url },
        ) => {
            let mut url = Url::parse(base_url)
                .map_err(|_| PlanError::InvalidBaseUrl(base_url.clone()))?;
            // 上游以1为起点的偏移量分页
            let start = 1 + (page - 1) * MCGBM_PAGE_SIZE;
            url.query_pairs_mut()
                .append_pair("d", "OPENDATA")
                .append_pair("c", "BUILDLIC")
                .append_pair("Start", &start.to_string())
                .append_pair("執照類別", license_kind)
                .append_pair("發照日期", &format!("{}年", year - 1911));
            Ok(PageRequest::get(url))
        }
        (WorkUnitKind::DateSlice { date, .. }, SourceSystem::Nbupic { organ, base_url }) => {
            let url = format!(
                "{}/nbupic_lst.jsp?queryparammode=true&cur_pagesize=200",
                base_url
            );
            let form = vec![
                ("Qry_LICENSING_UNIT".to_string(), organ.clone()),
                ("Qry_QryType".to_string(), "5".to_string()),
                ("Qry_license_yy".to_string(), String::new()),
                ("RC_Qry_regdat".to_string(), roc_format(*date, true)),
                ("Qry_regdat".to_string(), date.format("%Y%m%d").to_string()),
                ("fromajax".to_string(), "true".to_string()),
                (
                    "QueryParamButton_executeQuery".to_string(),
                    "執行查詢".to_string(),
                ),
            ];
            Ok(PageRequest::post_form(url, form))
        }
        (WorkUnitKind::Detail { index_key, .. }, SourceSystem::Nbupic { organ, base_url }) => {
            let url = format!("{}/licInfo.jsp", base_url);
            let form = vec![
                ("IndexKey".to_string(), index_key.clone()),
                ("organ".to_string(), organ.clone()),
                ("responseText".to_string(), "true".to_string()),
            ];
            Ok(PageRequest::post_form(url, form))
        }
        (WorkUnitKind::DateSlice { date, .. }, SourceSystem::HsinchuCounty { base_url }) => {
            let url = format!("{}/pages/api/getLicdata?callback=ok", base_url);
            let form = vec![
                ("_search".to_string(), "false".to_string()),
                ("rows".to_string(), "200".to_string()),
                ("page".to_string(), "1".to_string()),
                ("sidx".to_string(), String::new()),
                ("sord".to_string(), "asc".to_string()),
                ("inputcode".to_string(), "0".to_string()),
                ("code".to_string(), "0".to_string()),
                ("qtype".to_string(), "5".to_string()),
                ("regdat".to_string(), roc_format(*date, false)),
            ];
            Ok(PageRequest::post_form(url, form))
        }
        (WorkUnitKind::Detail { index_key, .. }, SourceSystem::HsinchuCounty { base_url }) => {
            let mut url = Url::parse(&format!("{}/pages/queryInfoAction.do", base_url))
                .map_err(|_| PlanError::InvalidBaseUrl(base_url.clone()))?;
            url.query_pairs_mut().append_pair("INDEX_KEY", index_key);
            let form = vec![("key".to_string(), index_key.clone())];
            Ok(PageRequest::post_form(url.to_string(), form))
        }
        (WorkUnitKind::DateSlice { date, .. }, SourceSystem::Kaohsiung { base_url }) => {
            let url = format!("{}/pages/jsapi/querylic", base_url);
            // 其余查询栏位留空即为不过滤
            let mut form: Vec<(String, String)> = [
                "lic_yy", "lic_kind", "lic_no1", "p01_name", "addradr", "dist", "section",
                "road_no1", "road_no2", "yy", "mon", "dd", "reg_yy", "reg_no", "reg_nochkcod",
            ]
            .into_iter()
            .map(|field| (field.to_string(), String::new()))
            .collect();
            form.push(("qrytyp".to_string(), "5".to_string()));
            form.push(("date_s".to_string(), roc_format(*date, false)));
            form.push(("date_e".to_string(), roc_format(*date, false)));
            Ok(PageRequest::post_form(url, form))
        }
        (WorkUnitKind::Detail { index_key, .. }, SourceSystem::Kaohsiung { base_url }) => {
            let url = format!("{}/pages/jsapi/getLicenseInfo", base_url);
            let form = vec![("key".to_string(), index_key.clone())];
            Ok(PageRequest::post_form(url, form))
        }
        (kind, system) => Err(PlanError::MismatchedSystem {
            unit_key: kind.unit_key(),
            system: match system {
                SourceSystem::Mcgbm { .. } => "mcgbm",
                SourceSystem::Nbupic { .. } => "nbupic",
                SourceSystem::HsinchuCounty { .. } => "hsinchu_county",
                SourceSystem::Kaohsiung { .. } => "kaohsiung",
            },
        }),
    }
}
