// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// 应用程序配置设置
///
/// 包含数据库、服务器和爬取行为的全部配置项
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// 爬取行为配置
    pub crawler: CrawlerSettings,
}

/// 数据库配置设置
#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 服务器配置设置
#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// 爬取行为配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerSettings {
    /// 工作器并发上限
    pub max_concurrent_workers: usize,
    /// 单个上游主机的每秒请求数上限，进程级共享
    pub requests_per_second_per_host: f64,
    /// 单次抓取调用内的HTTP重试次数上限
    pub max_retries: u32,
    /// 退避基准时间（毫秒）
    pub backoff_base_ms: u64,
    /// 单次HTTP请求超时（毫秒）
    pub request_timeout_ms: u64,
    /// 工作单元在编排层的重新派发预算
    pub unit_max_retries: i32,
}

impl CrawlerSettings {
    /// 单次请求超时
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 退避基准时间
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_workers: 4,
            requests_per_second_per_host: 2.0,
            max_retries: 3,
            backoff_base_ms: 500,
            request_timeout_ms: 30_000,
            unit_max_retries: 3,
        }
    }
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Start with default settings
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Default DB pool settings
            .set_default("database.url", "sqlite://permitrs.db?mode=rwc")?
            .set_default("database.max_connections", 20)?
            .set_default("database.min_connections", 2)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Default crawler settings
            .set_default("crawler.max_concurrent_workers", 4)?
            .set_default("crawler.requests_per_second_per_host", 2.0)?
            .set_default("crawler.max_retries", 3)?
            .set_default("crawler.backoff_base_ms", 500)?
            .set_default("crawler.request_timeout_ms", 30000)?
            .set_default("crawler.unit_max_retries", 3)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("PERMITRS").separator("__"));

        builder.build()?.try_deserialize()
    }
}
