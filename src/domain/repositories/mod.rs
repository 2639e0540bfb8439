// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 仓库接口定义了数据持久化的抽象契约，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 执照仓库（permit_repository）：管理执照记录与变更事件
/// - 工作单元仓库（work_unit_repository）：管理可恢复的爬取进度
/// - 爬取批次仓库（crawl_run_repository）：管理批次的生命周期
pub mod crawl_run_repository;
pub mod permit_repository;
pub mod work_unit_repository;

pub use permit_repository::RepositoryError;
