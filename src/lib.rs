// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置、环境变量与上游来源注册表
pub mod config;

/// 领域模块
///
/// 包含核心业务实体和仓库接口
pub mod domain;

/// 抓取模块
///
/// 带限速与重试的HTTP页面获取
pub mod fetcher;

/// 基础设施模块
///
/// 提供数据库连接、实体定义与仓库实现
pub mod infrastructure;

/// 标准化模块
///
/// 将上游原始记录映射为类型化的执照记录
pub mod normalizer;

/// 编排模块
///
/// 工作单元的枚举、调度与批次生命周期管理
pub mod orchestrator;

/// 解析模块
///
/// 从上游页面中提取候选记录与后续工作单元
pub mod parser;

/// 表示层模块
///
/// 处理HTTP请求和响应，包括路由和处理器
pub mod presentation;

/// 存储模块
///
/// 以自然键去重的执照合并写入
pub mod store;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;
