// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 表示层
//!
//! HTTP API：批次的触发、查询与取消，以及执照数据的
//! 对外查询接口。

pub mod errors;
pub mod handlers;
pub mod routes;
