//! 题池批量补货 - 编排层
//!
//! ## 职责
//!
//! 本模块是补货程序的入口，负责把每个 (级别, 类别) 题池补到目标数量。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：从题目文件载入题池，创建 LLM 客户端
//! 2. **盘点缺口**：扫描每个题池，计算还差多少道题
//! 3. **并发控制**：使用 Semaphore 限制并发数量
//! 4. **分批处理**：将生成任务分批，每批完成后再开始下一批
//! 5. **全局统计**：汇总所有任务的结果
//! 6. **写回文件**：补货结束后把题池写回题目文件

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::clients::generator::ContentGenerator;
use crate::clients::llm_client::LlmClient;
use crate::config::{Config, ReplenishConfig};
use crate::infrastructure::store::ItemStore;
use crate::infrastructure::InMemoryStore;
use crate::models::category::Category;
use crate::services::GenerationFallback;
use crate::utils::clock::{Clock, SystemClock};
use crate::utils::logging;

/// 应用主结构
pub struct App {
    replenisher: PoolReplenisher,
    /// 题目文件；设置后运行结束时写回
    items_file: Option<(Arc<InMemoryStore>, PathBuf)>,
}

impl App {
    /// 初始化应用（题目文件 + LLM 生成器）
    ///
    /// 未配置题目文件时直接报错，否则生成的题目会随进程退出丢失。
    pub async fn initialize(config: Config) -> Result<Self> {
        if config.llm.api_key.trim().is_empty() {
            bail!("未设置 LLM_API_KEY，无法生成题目");
        }
        let Some(path) = config.replenish.items_file.clone() else {
            bail!("未设置 REPLENISH_ITEMS_FILE（replenish.items_file），生成的题目无处保存");
        };

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let generator: Arc<dyn ContentGenerator> = Arc::new(LlmClient::new(&config.llm));
        info!("✓ LLM 客户端已就绪，模型: {}", config.llm.model_name);

        Self::with_items_file(config, PathBuf::from(path), generator, clock).await
    }

    /// 以题目文件为存储组装应用：先载入已有题目，运行结束后写回
    pub async fn with_items_file(
        config: Config,
        path: PathBuf,
        generator: Arc<dyn ContentGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let store = Arc::new(InMemoryStore::with_clock(clock.clone()));
        store
            .load_items(&path)
            .await
            .with_context(|| format!("载入题目文件失败: {}", path.display()))?;

        let mut app = Self::with_parts(config, store.clone(), generator, clock);
        app.items_file = Some((store, path));
        Ok(app)
    }

    /// 用给定的存储和生成器组装应用
    pub fn with_parts(
        config: Config,
        store: Arc<dyn ItemStore>,
        generator: Arc<dyn ContentGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let replenish = ReplenishConfig {
            levels: config.replenish_levels(),
            ..config.replenish.clone()
        };
        let generation = Arc::new(GenerationFallback::new(store.clone(), generator, clock));
        let replenisher = PoolReplenisher::new(store, generation, replenish);
        Self {
            replenisher,
            items_file: None,
        }
    }

    /// 运行一次补货
    pub async fn run(&self) -> Result<ReplenishStats> {
        let replenish = &self.replenisher.config;
        logging::log_startup(
            &replenish.levels,
            replenish.target_per_category,
            replenish.max_concurrent,
        );

        let stats = self.replenisher.run().await?;
        logging::print_final_stats(stats.success, stats.failed, stats.total);

        if let Some((store, path)) = &self.items_file {
            store
                .save_items(path)
                .await
                .with_context(|| format!("写回题目文件失败: {}", path.display()))?;
        }
        Ok(stats)
    }
}

/// 补货统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplenishStats {
    pub success: usize,
    pub failed: usize,
    pub total: usize,
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    success: usize,
    failed: usize,
}

/// 题池补货器
pub struct PoolReplenisher {
    store: Arc<dyn ItemStore>,
    generation: Arc<GenerationFallback>,
    config: ReplenishConfig,
}

impl PoolReplenisher {
    pub fn new(
        store: Arc<dyn ItemStore>,
        generation: Arc<GenerationFallback>,
        config: ReplenishConfig,
    ) -> Self {
        Self {
            store,
            generation,
            config,
        }
    }

    /// 盘点缺口并分批生成
    pub async fn run(&self) -> Result<ReplenishStats> {
        let tasks = self.plan().await;
        let total = tasks.len();
        let mut stats = ReplenishStats {
            total,
            ..Default::default()
        };

        if tasks.is_empty() {
            info!("✓ 所有题池都已达到目标数量，无需补货");
            return Ok(stats);
        }

        let batch_size = self.config.max_concurrent.max(1);
        info!("✓ 共需生成 {} 道题", total);
        info!("📋 将以每批 {} 个的方式处理", batch_size);

        let semaphore = Arc::new(Semaphore::new(batch_size));
        let total_batches = total.div_ceil(batch_size);

        for (batch_idx, batch) in tasks.chunks(batch_size).enumerate() {
            let batch_num = batch_idx + 1;
            let batch_start = batch_idx * batch_size;
            logging::log_batch_start(
                batch_num,
                total_batches,
                batch_start + 1,
                batch_start + batch.len(),
                total,
            );

            let result = self.process_batch(batch, semaphore.clone()).await?;
            stats.success += result.success;
            stats.failed += result.failed;

            logging::log_batch_complete(batch_num, result.success, batch.len());
        }

        Ok(stats)
    }

    /// 计算每个题池还差的题目，展开成任务列表
    async fn plan(&self) -> Vec<(String, Category)> {
        let target = self.config.target_per_category;
        let mut tasks = Vec::new();

        for level in &self.config.levels {
            for category in Category::ALL {
                let have = match self.store.scan_items(level, category, target).await {
                    Ok(items) => items.len(),
                    Err(e) => {
                        warn!("⚠️ 盘点题池失败 ({}, {}): {}", level, category, e);
                        continue;
                    }
                };

                let missing = target.saturating_sub(have);
                if missing > 0 {
                    info!("📚 ({}, {}) 现有 {}，需补 {}", level, category, have, missing);
                }
                tasks.extend(std::iter::repeat((level.clone(), category)).take(missing));
            }
        }
        tasks
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch: &[(String, Category)],
        semaphore: Arc<Semaphore>,
    ) -> Result<BatchResult> {
        let mut handles = Vec::new();

        for (level, category) in batch {
            let permit = semaphore.clone().acquire_owned().await?;
            let generation = self.generation.clone();
            let level = level.clone();
            let category = *category;

            let handle = tokio::spawn(async move {
                let _permit = permit;
                generation.generate(&level, category, &[]).await
            });
            handles.push((category, handle));
        }

        let mut result = BatchResult::default();
        for (category, handle) in handles {
            match handle.await {
                Ok(Ok(_)) => result.success += 1,
                Ok(Err(_)) => result.failed += 1,
                Err(e) => {
                    error!("[{}] 任务执行失败: {}", category, e);
                    result.failed += 1;
                }
            }
        }
        Ok(result)
    }
}
