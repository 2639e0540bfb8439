// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::sources::SourceSystem;
use crate::domain::models::raw::{RawDocument, RawRecord};
use crate::domain::models::work_unit::WorkUnitKind;
use thiserror::Error;

pub mod hsinchu;
pub mod kaohsiung;
pub mod mcgbm;
pub mod nbupic;

/// 解析错误类型
///
/// 单条记录的字段缺失不构成解析错误；只有文档整体结构
/// 无法识别时才失败，提示该工作单元需要人工排查而不是
/// 静默丢数据。
#[derive(Error, Debug)]
pub enum ParseError {
    /// 文档整体结构无法识别
    #[error("Unrecognized document structure ({0})")]
    UnrecognizedStructure(String),

    /// 不存在匹配该工作单元类型的解析器
    #[error("No parser for work unit kind ({0})")]
    UnsupportedKind(String),
}

/// 解析产出
///
/// 列表页产出多条候选记录；日期切片页产出待跟进的
/// 详情工作单元；详情页产出单条完整记录。
#[derive(Debug, Default)]
pub struct ParseOutput {
    /// 候选记录
    pub records: Vec<RawRecord>,
    /// 解析中发现的后续工作单元（链接跟进）
    pub discovered: Vec<WorkUnitKind>,
}

/// 页面解析器特质
///
/// 按上游页面类型实现多态，由工作单元类型选择具体变体。
pub trait PageParser: Send + Sync {
    /// 解析一个原始文档
    fn parse(&self, doc: &RawDocument) -> Result<ParseOutput, ParseError>;

    /// 获取解析器名称
    fn name(&self) -> &'static str;
}

/// 按工作单元类型与来源系统选择解析器
pub fn parser_for(
    kind: &WorkUnitKind,
    system: &SourceSystem,
) -> Result<Box<dyn PageParser>, ParseError> {
    match (kind, system) {
        (WorkUnitKind::ListingPage { .. }, SourceSystem::Mcgbm { .. }) => {
            Ok(Box::new(mcgbm::McgbmListingParser))
        }
        (WorkUnitKind::DateSlice { authority, .. }, SourceSystem::Nbupic { .. }) => {
            Ok(Box::new(nbupic::NbupicListingParser {
                authority: authority.clone(),
            }))
        }
        (WorkUnitKind::Detail { .. }, SourceSystem::Nbupic { .. }) => {
            Ok(Box::new(nbupic::NbupicDetailParser))
        }
        (WorkUnitKind::DateSlice { authority, .. }, SourceSystem::HsinchuCounty { .. }) => {
            Ok(Box::new(hsinchu::HsinchuListingParser {
                authority: authority.clone(),
            }))
        }
        (WorkUnitKind::Detail { .. }, SourceSystem::HsinchuCounty { .. }) => {
            Ok(Box::new(hsinchu::HsinchuDetailParser))
        }
        (WorkUnitKind::DateSlice { authority, .. }, SourceSystem::Kaohsiung { .. }) => {
            Ok(Box::new(kaohsiung::KaohsiungListingParser {
                authority: authority.clone(),
            }))
        }
        (WorkUnitKind::Detail { .. }, SourceSystem::Kaohsiung { .. }) => {
            Ok(Box::new(kaohsiung::KaohsiungDetailParser))
        }
        (kind, _) => Err(ParseError::UnsupportedKind(kind.unit_key())),
    }
}
