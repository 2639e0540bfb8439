// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 上游系统类型
///
/// 各发照机关的执照公开查询多数走两类系统：MCGBM 开放资料
/// 接口（JSON 列表）与 NBUPIC 云端系统（日期查询 + 详情页）。
/// 新竹县与高雄市各自运营独立系统，查询形态与 NBUPIC 同为
/// 日期切片加详情跟进，但接口与载荷格式不同。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "system", rename_all = "snake_case")]
pub enum SourceSystem {
    /// MCGBM 开放资料系统
    Mcgbm {
        /// 查询接口基础URL
        base_url: String,
    },
    /// NBUPIC 云端建管系统
    Nbupic {
        /// 机关代码（如竹科 B10）
        organ: String,
        /// 系统基础URL
        base_url: String,
    },
    /// 新竹县独立建管系统（JSONP 列表 + HTML 详情）
    HsinchuCounty {
        /// 系统基础URL
        base_url: String,
    },
    /// 高雄市独立建管系统（JSON 列表 + JSON 详情）
    Kaohsiung {
        /// 系统基础URL
        base_url: String,
    },
}

/// 上游来源注册表
///
/// 发照机关名称到其所属系统的映射。键即执照记录的
/// authority 字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRegistry {
    sources: BTreeMap<String, SourceSystem>,
}

const NBUPIC_BASE_URL: &str = "https://cloudbm.nlma.gov.tw/NBUPIC";

impl Default for SourceRegistry {
    fn default() -> Self {
        let mcgbm = |url: &str| SourceSystem::Mcgbm {
            base_url: url.to_string(),
        };
        let nbupic = |organ: &str| SourceSystem::Nbupic {
            organ: organ.to_string(),
            base_url: NBUPIC_BASE_URL.to_string(),
        };

        let mut sources = BTreeMap::new();
        sources.insert(
            "基隆市".to_string(),
            mcgbm("https://master.klcg.gov.tw/opendata/OpenDataSearchUrl.do"),
        );
        sources.insert(
            "新北市".to_string(),
            mcgbm("https://building-apply.publicwork.ntpc.gov.tw/opendata/OpenDataSearchUrl.do"),
        );
        sources.insert(
            "桃園市".to_string(),
            mcgbm("https://building.tycg.gov.tw/opendata/OpenDataSearchUrl.do"),
        );
        sources.insert(
            "新竹市".to_string(),
            mcgbm("https://build.hccg.gov.tw/opendata/OpenDataSearchUrl.do"),
        );
        sources.insert(
            "台中市".to_string(),
            mcgbm("https://mcgbm.taichung.gov.tw/opendata/OpenDataSearchUrl.do"),
        );
        sources.insert(
            "新竹縣".to_string(),
            SourceSystem::HsinchuCounty {
                base_url: "https://build.hsinchu.gov.tw/bupic".to_string(),
            },
        );
        sources.insert(
            "高雄市".to_string(),
            SourceSystem::Kaohsiung {
                base_url: "https://buildmis.kcg.gov.tw/bupic".to_string(),
            },
        );
        sources.insert("竹科".to_string(), nbupic("B10"));
        sources.insert("中科".to_string(), nbupic("B20"));
        sources.insert("南科".to_string(), nbupic("B30"));
        sources.insert("台南市".to_string(), nbupic("IF0"));
        Self { sources }
    }
}

impl SourceRegistry {
    /// 查找机关对应的系统配置
    pub fn get(&self, authority: &str) -> Option<&SourceSystem> {
        self.sources.get(authority)
    }

    /// 支持的机关名称列表
    pub fn authorities(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    /// 替换某个机关的系统配置（测试注入本地端点用）
    pub fn insert(&mut self, authority: &str, system: SourceSystem) {
        self.sources.insert(authority.to_string(), system);
    }
}
