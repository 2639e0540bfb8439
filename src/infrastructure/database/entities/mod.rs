// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 数据库实体定义

pub mod change_event;
pub mod crawl_run;
pub mod permit;
pub mod work_unit;
