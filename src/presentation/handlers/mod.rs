// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! HTTP请求处理器

pub mod crawl_handler;
pub mod permit_handler;
