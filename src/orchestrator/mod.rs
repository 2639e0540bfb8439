// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 编排器
//!
//! 将枚举策略展开为持久化的工作单元进度表，用有界并发的
//! 工作器池驱动 抓取 → 解析 → 标准化 → 合并写入 流水线，
//! 汇总批次结果。进程崩溃后的恢复只是重读进度表并重置
//! 遗留单元，无专门的恢复代码路径。

pub mod plan;

use crate::config::settings::CrawlerSettings;
use crate::config::sources::SourceRegistry;
use crate::domain::models::crawl_run::{CrawlRun, CrawlRunStatus, EnumerationSpec};
use crate::domain::models::work_unit::{WorkUnit, WorkUnitKind, WorkUnitStatus};
use crate::domain::repositories::crawl_run_repository::CrawlRunRepository;
use crate::domain::repositories::permit_repository::{PermitRepository, RepositoryError};
use crate::domain::repositories::work_unit_repository::{UnitCounts, WorkUnitRepository};
use crate::fetcher::Fetcher;
use crate::normalizer;
use crate::parser;
use crate::store::{UpsertOutcome, UpsertStore};
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

/// 编排错误类型
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// 注册表中不存在该发照机关
    #[error("Unknown authority: {0}")]
    UnknownAuthority(String),
    /// 批次未找到
    #[error("Crawl run not found")]
    RunNotFound,
    /// 批次已到达终态，无法取消
    #[error("Crawl run already finished with status {0}")]
    RunAlreadyFinished(CrawlRunStatus),
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 永久失败的工作单元摘要
#[derive(Debug, Clone)]
pub struct FailedUnit {
    /// 工作单元键
    pub unit_key: String,
    /// 最后一次失败的错误信息
    pub last_error: Option<String>,
}

/// 批次状态报告
#[derive(Debug, Clone)]
pub struct RunReport {
    /// 批次实体
    pub run: CrawlRun,
    /// 工作单元状态计数
    pub counts: UnitCounts,
    /// 永久失败的工作单元及其最后错误
    pub failed: Vec<FailedUnit>,
}

/// 单个工作单元处理后的记录计数增量
#[derive(Debug, Default, Clone, Copy)]
struct Delta {
    created: i64,
    updated: i64,
    unchanged: i64,
}

impl Delta {
    fn add(&mut self, other: Delta) {
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
    }
}

/// 致命错误，中止整个批次的派发
///
/// 存储不可用时继续派发只会逐个失败并耗尽上游配额，
/// 批次停止派发并落 Degraded，未完成的单元计入失败数。
#[derive(Error, Debug)]
enum FatalError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

/// 编排器
pub struct Orchestrator<P, W, C>
where
    P: PermitRepository + 'static,
    W: WorkUnitRepository + 'static,
    C: CrawlRunRepository + 'static,
{
    fetcher: Arc<Fetcher>,
    store: Arc<UpsertStore<P>>,
    units: Arc<W>,
    runs: Arc<C>,
    registry: Arc<SourceRegistry>,
    settings: CrawlerSettings,
    cancel_senders: DashMap<Uuid, watch::Sender<bool>>,
}

impl<P, W, C> Orchestrator<P, W, C>
where
    P: PermitRepository + 'static,
    W: WorkUnitRepository + 'static,
    C: CrawlRunRepository + 'static,
{
    /// 创建一个新的编排器
    pub fn new(
        fetcher: Arc<Fetcher>,
        store: Arc<UpsertStore<P>>,
        units: Arc<W>,
        runs: Arc<C>,
        registry: Arc<SourceRegistry>,
        settings: CrawlerSettings,
    ) -> Self {
        Self {
            fetcher,
            store,
            units,
            runs,
            registry,
            settings,
            cancel_senders: DashMap::new(),
        }
    }

    /// 触发一次爬取批次
    ///
    /// 批次与其全部初始工作单元先持久化再调度，保证进程
    /// 随时崩溃都能从进度表恢复。返回批次ID，调度在后台
    /// 任务中进行。
    pub async fn trigger(
        self: &Arc<Self>,
        spec: EnumerationSpec,
    ) -> Result<Uuid, OrchestratorError> {
        let authority = match &spec {
            EnumerationSpec::PageRange { authority, .. } => authority,
            EnumerationSpec::DateWindow { authority, .. } => authority,
            EnumerationSpec::DetailSeeds { authority, .. } => authority,
        };
        if self.registry.get(authority).is_none() {
            return Err(OrchestratorError::UnknownAuthority(authority.clone()));
        }

        let run = CrawlRun::new(spec);
        self.runs.create(&run).await?;

        let units: Vec<WorkUnit> = plan::enumerate(&run.spec)
            .into_iter()
            .map(|kind| WorkUnit::new(run.id, kind, self.settings.unit_max_retries))
            .collect();
        let created = self.units.create_many(&units).await?;
        info!(run_id = %run.id, units = created, "crawl run triggered");

        self.spawn_driver(run.id);
        Ok(run.id)
    }

    /// 查询批次状态
    ///
    /// 除状态计数外带回永久失败单元的键与最后错误，便于
    /// 排查是哪些页面拖垮了批次。
    pub async fn status(&self, run_id: Uuid) -> Result<RunReport, OrchestratorError> {
        let run = self
            .runs
            .find_by_id(run_id)
            .await?
            .ok_or(OrchestratorError::RunNotFound)?;
        let counts = self.units.count_by_status(run_id).await?;
        let failed = self
            .units
            .find_by_status(run_id, WorkUnitStatus::Failed)
            .await?
            .into_iter()
            .map(|unit| FailedUnit {
                unit_key: unit.unit_key,
                last_error: unit.last_error,
            })
            .collect();
        Ok(RunReport { run, counts, failed })
    }

    /// 取消批次
    ///
    /// 向驱动任务发送取消信号；在途单元完成当前工作后
    /// 停止派发。无在途驱动任务（进程重启后未恢复）时
    /// 直接落终态。
    pub async fn cancel(&self, run_id: Uuid) -> Result<(), OrchestratorError> {
        let run = self
            .runs
            .find_by_id(run_id)
            .await?
            .ok_or(OrchestratorError::RunNotFound)?;
        if run.status.is_terminal() {
            return Err(OrchestratorError::RunAlreadyFinished(run.status));
        }

        if let Some(sender) = self.cancel_senders.get(&run_id) {
            let _ = sender.send(true);
            info!(run_id = %run_id, "cancellation requested");
            return Ok(());
        }
        self.runs.update(&run.cancel()).await?;
        info!(run_id = %run_id, "orphan run cancelled directly");
        Ok(())
    }

    /// 恢复中断的批次
    ///
    /// 启动时调用：所有 Running 批次的遗留 in_progress 单元
    /// 重置为 pending，然后重新挂上驱动任务。返回恢复的
    /// 批次数量。
    pub async fn resume_interrupted(self: &Arc<Self>) -> Result<usize, OrchestratorError> {
        let running = self.runs.find_by_status(CrawlRunStatus::Running).await?;
        for run in &running {
            let reset = self.units.reset_in_progress(run.id).await?;
            info!(run_id = %run.id, reset, "resuming interrupted run");
            self.spawn_driver(run.id);
        }
        Ok(running.len())
    }

    fn spawn_driver(self: &Arc<Self>, run_id: Uuid) {
        let (tx, rx) = watch::channel(false);
        self.cancel_senders.insert(run_id, tx);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.drive(run_id, rx).await;
            this.cancel_senders.remove(&run_id);
        });
    }

    /// 驱动一个批次直到终态
    async fn drive(&self, run_id: Uuid, cancel_rx: watch::Receiver<bool>) {
        let mut totals = Delta::default();
        loop {
            if *cancel_rx.borrow() {
                self.settle(run_id, true, totals).await;
                return;
            }

            let batch_size = (self.settings.max_concurrent_workers as u64).max(1) * 4;
            let pending = match self.units.find_pending(run_id, batch_size).await {
                Ok(pending) => pending,
                Err(e) => {
                    error!(run_id = %run_id, error = %e, "failed to load pending units");
                    self.settle(run_id, false, totals).await;
                    return;
                }
            };

            if pending.is_empty() {
                match self.units.count_by_status(run_id).await {
                    Ok(counts) if counts.all_terminal() => {
                        self.settle(run_id, false, totals).await;
                    }
                    Ok(_) => {
                        // 另一驱动任务仍持有在途单元，等待其收敛
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        continue;
                    }
                    Err(e) => {
                        error!(run_id = %run_id, error = %e, "failed to count units");
                        self.settle(run_id, false, totals).await;
                    }
                }
                return;
            }

            let results: Vec<Result<Delta, FatalError>> = stream::iter(pending)
                .map(|unit| self.process_unit(unit, cancel_rx.clone()))
                .buffer_unordered(self.settings.max_concurrent_workers.max(1))
                .collect()
                .await;

            for result in results {
                match result {
                    Ok(delta) => totals.add(delta),
                    Err(e) => {
                        error!(run_id = %run_id, error = %e, "fatal error, halting dispatch");
                        self.settle(run_id, false, totals).await;
                        return;
                    }
                }
            }
        }
    }

    /// 将批次写入终态
    ///
    /// 取消走独立终态；其余情况交给 finalize 判定，尚未
    /// 到达终态的单元一并计入失败数，调度被迫中止的批次
    /// 因此落 Degraded。
    async fn settle(&self, run_id: Uuid, cancelled: bool, totals: Delta) {
        let run = match self.runs.find_by_id(run_id).await {
            Ok(Some(run)) => run,
            Ok(None) => {
                error!(run_id = %run_id, "run vanished before settlement");
                return;
            }
            Err(e) => {
                error!(run_id = %run_id, error = %e, "failed to load run for settlement");
                return;
            }
        };
        if run.status.is_terminal() {
            return;
        }

        let failed = self
            .units
            .count_by_status(run_id)
            .await
            .map(|c| (c.failed + c.pending + c.in_progress) as i64)
            .unwrap_or(0);

        let mut run = if cancelled {
            run.cancel()
        } else {
            run.finalize(failed)
        };
        run.created_records = totals.created;
        run.updated_records = totals.updated;
        run.unchanged_records = totals.unchanged;

        if let Err(e) = self.runs.update(&run).await {
            error!(run_id = %run_id, error = %e, "failed to persist run settlement");
            return;
        }
        info!(
            run_id = %run_id,
            status = %run.status,
            created = run.created_records,
            updated = run.updated_records,
            unchanged = run.unchanged_records,
            failed_units = run.failed_units,
            "crawl run settled"
        );
    }

    /// 处理单个工作单元
    ///
    /// 任何非致命失败都记在单元自身的状态机上：预算未耗尽
    /// 回到 pending 等待重新派发，耗尽则进入 failed，批次
    /// 继续处理其余单元。取消信号在单元启动前与抓取期间
    /// 均被观察：前者直接不启动，后者中断抓取并把单元退
    /// 回 pending。
    async fn process_unit(
        &self,
        unit: WorkUnit,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Delta, FatalError> {
        if *cancel.borrow() {
            return Ok(Delta::default());
        }
        let unit = match unit.start() {
            Ok(unit) => unit,
            // 并发派发撞上已启动的单元，让驱动循环重新加载
            Err(_) => return Ok(Delta::default()),
        };
        self.persist_unit(&unit).await?;

        let authority = unit.kind.authority().to_string();
        let Some(system) = self.registry.get(&authority).cloned() else {
            let unit_key = unit.unit_key.clone();
            self.fail_unit(unit, format!("unknown authority {}", authority))
                .await?;
            warn!(unit_key = %unit_key, "unit references unknown authority");
            return Ok(Delta::default());
        };

        let request = match plan::build_request(&unit.kind, &system) {
            Ok(request) => request,
            Err(e) => {
                self.fail_unit(unit, e.to_string()).await?;
                return Ok(Delta::default());
            }
        };

        let fetched = tokio::select! {
            biased;
            // 发送端仍在时等到 true；发送端已丢弃则该分支失效
            Ok(_) = async { cancel.wait_for(|cancelled| *cancelled).await.map(|_| ()) } => {
                self.persist_unit(&unit.reset()).await?;
                return Ok(Delta::default());
            }
            result = self.fetcher.fetch(&unit.unit_key, &request) => result,
        };
        let doc = match fetched {
            Ok(doc) => doc,
            Err(e) => {
                self.fail_unit(unit, e.to_string()).await?;
                return Ok(Delta::default());
            }
        };

        let output = match parser::parser_for(&unit.kind, &system)
            .and_then(|parser| parser.parse(&doc))
        {
            Ok(output) => output,
            Err(e) => {
                self.fail_unit(unit, e.to_string()).await?;
                return Ok(Delta::default());
            }
        };

        // 分页短路：列表页为空说明该年份该类别已翻到尽头，
        // 后续更大页码不再派发
        if output.records.is_empty() {
            if let WorkUnitKind::ListingPage {
                authority: ref a,
                page,
                license_kind: ref kind,
                ..
            } = unit.kind
            {
                let skipped = self.skip_following_pages(&unit, a, kind, page).await?;
                if skipped > 0 {
                    info!(unit_key = %unit.unit_key, skipped, "empty listing page, later pages skipped");
                }
            }
        }

        // 链接跟进：日期切片发现的详情页追加进同一批次，
        // 重复发现由单元键去重吸收
        if !output.discovered.is_empty() {
            let followups: Vec<WorkUnit> = output
                .discovered
                .into_iter()
                .map(|kind| WorkUnit::new(unit.run_id, kind, self.settings.unit_max_retries))
                .collect();
            let appended = self
                .units
                .create_many(&followups)
                .await
                .map_err(fatal_if_unavailable)?;
            info!(unit_key = %unit.unit_key, appended, "follow-up units discovered");
        }

        let mut delta = Delta::default();
        let mut valid = 0usize;
        let attempted = output.records.len();
        for raw in &output.records {
            let record = match normalizer::normalize(raw, &authority) {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        unit_key = %unit.unit_key,
                        index_key = %raw.index_key,
                        error = %e,
                        "record dropped during normalization"
                    );
                    continue;
                }
            };
            match self.store.upsert(&record, &unit.unit_key).await {
                Ok(UpsertOutcome::Created) => delta.created += 1,
                Ok(UpsertOutcome::Updated { .. }) => delta.updated += 1,
                Ok(UpsertOutcome::Unchanged) => delta.unchanged += 1,
                Err(e) if e.is_fatal() => {
                    return Err(FatalError::StoreUnavailable(e.to_string()));
                }
                Err(e) => {
                    warn!(
                        unit_key = %unit.unit_key,
                        natural_key = %record.natural_key,
                        error = %e,
                        "record dropped during upsert"
                    );
                    continue;
                }
            }
            valid += 1;
        }

        // 解析出记录却无一有效，视为单元失败，提示上游
        // 结构漂移；空列表页是正常的
        if attempted > 0 && valid == 0 {
            self.fail_unit(unit, "no valid records in parsed document".to_string())
                .await?;
            return Ok(delta);
        }

        match unit.complete() {
            Ok(done) => self.persist_unit(&done).await?,
            Err(_) => warn!("unit left in-progress after processing"),
        }
        Ok(delta)
    }

    /// 跳过同一机关同一类别下页码更大的待处理列表页
    async fn skip_following_pages(
        &self,
        unit: &WorkUnit,
        authority: &str,
        license_kind: &str,
        page: u32,
    ) -> Result<u64, FatalError> {
        let pending = self
            .units
            .find_by_status(unit.run_id, WorkUnitStatus::Pending)
            .await
            .map_err(fatal_if_unavailable)?;
        let mut skipped = 0u64;
        for candidate in pending {
            let follows = matches!(
                &candidate.kind,
                WorkUnitKind::ListingPage {
                    authority: a,
                    license_kind: k,
                    page: p,
                    ..
                } if a == authority && k == license_kind && *p > page
            );
            if !follows {
                continue;
            }
            match candidate.skip() {
                Ok(done) => {
                    self.persist_unit(&done).await?;
                    skipped += 1;
                }
                Err(_) => continue,
            }
        }
        Ok(skipped)
    }

    async fn fail_unit(&self, unit: WorkUnit, error: String) -> Result<(), FatalError> {
        match unit.fail(error) {
            Ok(unit) => self.persist_unit(&unit).await,
            Err(_) => Ok(()),
        }
    }

    async fn persist_unit(&self, unit: &WorkUnit) -> Result<(), FatalError> {
        self.units.update(unit).await.map_err(fatal_if_unavailable)?;
        Ok(())
    }
}

/// 进度表写不进去与执照存储不可用同等对待：单元状态
/// 丢失会让恢复逻辑失真
fn fatal_if_unavailable(e: RepositoryError) -> FatalError {
    FatalError::StoreUnavailable(e.to_string())
}
