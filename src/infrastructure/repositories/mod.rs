// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 仓库实现

pub mod crawl_run_repo_impl;
pub mod permit_repo_impl;
pub mod work_unit_repo_impl;

pub use crawl_run_repo_impl::CrawlRunRepositoryImpl;
pub use permit_repo_impl::PermitRepositoryImpl;
pub use work_unit_repo_impl::WorkUnitRepositoryImpl;
