// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 变更事件（change_event）：执照字段变更的不可变流水
/// - 爬取批次（crawl_run）：一次编排器调用的聚合
/// - 执照记录（permit）：标准化后的建筑执照实体
/// - 原始文档与记录（raw）：抓取与解析之间的瞬态数据
/// - 工作单元（work_unit）：可调度的爬取工作切片
pub mod change_event;
pub mod crawl_run;
pub mod permit;
pub mod raw;
pub mod work_unit;
