// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 基础设施层
//!
//! 仓库特质的具体实现：SeaORM 数据库实现用于生产，
//! 内存实现用于测试。

pub mod database;
pub mod memory;
pub mod repositories;
