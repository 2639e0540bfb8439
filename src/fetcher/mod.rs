// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::CrawlerSettings;
use crate::domain::models::raw::RawDocument;
use crate::utils::retry_policy::RetryPolicy;
use dashmap::DashMap;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

type HostLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// 抓取错误类型
///
/// 瞬时错误（超时、连接重置、5xx、429）在抓取层内按退避
/// 策略重试；永久错误（其余4xx、非法URL）立即失败，不重试。
#[derive(Error, Debug)]
pub enum FetchError {
    /// 瞬时错误，重试预算耗尽后上抛
    #[error("Transient fetch error after {attempts} attempts: {message}")]
    Transient { attempts: u32, message: String },

    /// 永久错误，不重试
    #[error("Permanent fetch error: {message}")]
    Permanent { message: String },
}

impl FetchError {
    fn permanent(message: impl Into<String>) -> Self {
        FetchError::Permanent {
            message: message.into(),
        }
    }
}

/// 页面请求
///
/// 上游两类端点：MCGBM 为 GET 查询，NBUPIC 为表单 POST。
#[derive(Debug, Clone)]
pub struct PageRequest {
    /// 请求URL
    pub url: String,
    /// 表单字段，非空时以 POST 发送
    pub form: Vec<(String, String)>,
    /// 附加请求头
    pub headers: Vec<(String, String)>,
}

impl PageRequest {
    /// 构建一个GET请求
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            form: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// 构建一个表单POST请求
    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            url: url.into(),
            form,
            headers: Vec::new(),
        }
    }
}

/// 抓取器
///
/// 对上游发起限速的HTTP请求。限流器按主机端口共享于整个
/// 进程：无论哪个工作器发起请求，都先经过同一上游的限流
/// 闸口。
pub struct Fetcher {
    client: reqwest::Client,
    limiters: DashMap<String, Arc<HostLimiter>>,
    retry_policy: RetryPolicy,
    per_host_period: Duration,
}

impl Fetcher {
    /// 创建新的抓取器实例
    ///
    /// # 参数
    ///
    /// * `settings` - 爬取行为配置
    ///
    /// # 返回值
    ///
    /// * `Ok(Fetcher)` - 抓取器
    /// * `Err(FetchError)` - HTTP客户端构建失败
    pub fn new(settings: &CrawlerSettings) -> Result<Self, FetchError> {
        // 政府网站证书链常不完整，跟随重定向、保留会话Cookie
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; permitrs/0.1; +https://github.com/permitrs)")
            .timeout(settings.request_timeout())
            .cookie_store(true)
            .build()
            .map_err(|e| FetchError::permanent(format!("client build failed: {}", e)))?;

        let rps = settings.requests_per_second_per_host;
        if !(rps > 0.0) {
            return Err(FetchError::permanent(
                "requests_per_second_per_host must be positive",
            ));
        }

        Ok(Self {
            client,
            limiters: DashMap::new(),
            retry_policy: RetryPolicy::new(settings.max_retries, settings.backoff_base()),
            per_host_period: Duration::from_secs_f64(1.0 / rps),
        })
    }

    fn limiter_for(&self, host: &str) -> Arc<HostLimiter> {
        self.limiters
            .entry(host.to_string())
            .or_insert_with(|| {
                let quota = Quota::with_period(self.per_host_period)
                    .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1).unwrap()));
                Arc::new(RateLimiter::direct(quota))
            })
            .clone()
    }

    /// 执行一次抓取
    ///
    /// 对瞬时失败按指数退避重试，重试预算由配置给定；
    /// 永久失败立即返回。返回的原始文档带内容摘要。
    ///
    /// # 参数
    ///
    /// * `unit_key` - 工作单元键，仅用于日志与文档标记
    /// * `request` - 页面请求
    ///
    /// # 返回值
    ///
    /// * `Ok(RawDocument)` - 原始文档
    /// * `Err(FetchError)` - 抓取失败
    pub async fn fetch(
        &self,
        unit_key: &str,
        request: &PageRequest,
    ) -> Result<RawDocument, FetchError> {
        let url = Url::parse(&request.url)
            .map_err(|e| FetchError::permanent(format!("invalid url {}: {}", request.url, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| FetchError::permanent(format!("url has no host: {}", request.url)))?;
        // 闸口按 主机:端口 区分，同一主机名上的不同服务互不占用配额
        let origin = match url.port_or_known_default() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let limiter = self.limiter_for(&origin);

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            limiter.until_ready().await;

            match self.try_once(request).await {
                Ok((status, body)) => {
                    debug!(unit_key, status, attempt, "fetch ok");
                    return Ok(RawDocument::new(unit_key, &request.url, status, body));
                }
                Err(Attempt::Transient(message)) => {
                    if !self.retry_policy.should_retry(attempt) {
                        return Err(FetchError::Transient {
                            attempts: attempt,
                            message,
                        });
                    }
                    let backoff = self.retry_policy.calculate_backoff(attempt);
                    warn!(
                        unit_key,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %message,
                        "transient fetch error, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(Attempt::Permanent(message)) => {
                    return Err(FetchError::Permanent { message });
                }
            }
        }
    }

    async fn try_once(&self, request: &PageRequest) -> Result<(u16, String), Attempt> {
        let mut builder = if request.form.is_empty() {
            self.client.get(&request.url)
        } else {
            self.client.post(&request.url).form(&request.form)
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() || e.is_request() {
                Attempt::Transient(e.to_string())
            } else {
                Attempt::Permanent(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            return Err(Attempt::Transient(format!("upstream returned {}", status)));
        }
        if status.is_client_error() {
            return Err(Attempt::Permanent(format!("upstream returned {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Attempt::Transient(format!("body read failed: {}", e)))?;
        Ok((status.as_u16(), body))
    }
}

enum Attempt {
    Transient(String),
    Permanent(String),
}
