//! 模拟考试组卷 - 编排层
//!
//! ## 职责
//!
//! 1. **一次扣费**：整套试卷只按 `"exam"` 扣一次额度
//! 2. **并发出题**：每个部分一个任务，Semaphore 限制并发，单个部分有超时
//!    （超时只停止等待，出题任务继续运行，生成的题照常入库）
//! 3. **按序汇总**：按固定的部分顺序输出，与完成先后无关
//! 4. **容忍部分失败**：失败或超时的部分直接省略，记入 `missing`

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::ExamConfig;
use crate::error::ServeError;
use crate::models::category::Category;
use crate::models::exam::ExamAssembly;
use crate::models::item::{Item, ItemId};
use crate::models::quota::EXAM_QUOTA_KEY;
use crate::workflow::{ItemCtx, ItemFlow};

/// 组卷器
pub struct ExamAssembler {
    flow: Arc<ItemFlow>,
    config: ExamConfig,
}

/// 单个部分的结果
enum PartResult {
    Ready(Box<Item>),
    Failed(String),
    TimedOut,
}

impl ExamAssembler {
    pub fn new(flow: Arc<ItemFlow>, config: ExamConfig) -> Self {
        Self { flow, config }
    }

    /// 为用户组一套模拟考试
    ///
    /// 只有额度不足会返回错误；各部分的失败只会让该部分缺席。
    pub async fn assemble_exam(
        &self,
        user_id: &str,
        level: &str,
    ) -> Result<ExamAssembly, ServeError> {
        // ========== 步骤 1: 整套扣一次额度 ==========
        self.flow.quota().admit(user_id, EXAM_QUOTA_KEY).await?;

        let mut exam = ExamAssembly::new(level, self.config.duration_minutes);
        log_exam_start(&exam, user_id);

        // ========== 步骤 2: 并发出题 ==========
        let exclude = Arc::new(self.flow.progress().completed_ids(user_id).await);
        let mut results = self.run_parts(user_id, level, exclude).await;

        // ========== 步骤 3: 按固定顺序汇总 ==========
        for category in Category::EXAM_STRUCTURE {
            match results.remove(&category) {
                Some(PartResult::Ready(item)) => exam.ordered_parts.push(*item),
                Some(PartResult::Failed(reason)) => {
                    warn!("[组卷 {}] ⚠️ {} 缺席: {}", exam.id, category, reason);
                    exam.missing.push(category);
                }
                Some(PartResult::TimedOut) => {
                    warn!(
                        "[组卷 {}] ⚠️ {} 超时 ({}s)，已省略",
                        exam.id, category, self.config.part_timeout_secs
                    );
                    exam.missing.push(category);
                }
                None => exam.missing.push(category),
            }
        }

        log_exam_complete(&exam);
        Ok(exam)
    }

    /// 为每个部分启动一个任务，等待全部结束
    async fn run_parts(
        &self,
        user_id: &str,
        level: &str,
        exclude: Arc<HashSet<ItemId>>,
    ) -> HashMap<Category, PartResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers));
        let part_timeout = Duration::from_secs(self.config.part_timeout_secs);
        let mut handles = Vec::new();

        for category in Category::EXAM_STRUCTURE {
            let flow = self.flow.clone();
            let exclude = exclude.clone();
            let semaphore = semaphore.clone();
            let ctx = ItemCtx::new(user_id, level, category);

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return PartResult::Failed("并发控制已关闭".to_string());
                };

                // 出题放到独立任务里，超时时丢弃的只是 JoinHandle
                let fetch = tokio::spawn(async move { flow.fetch_part(&ctx, &exclude).await });

                match tokio::time::timeout(part_timeout, fetch).await {
                    Ok(Ok(Ok(delivered))) => PartResult::Ready(Box::new(delivered.item)),
                    Ok(Ok(Err(e))) => PartResult::Failed(e.to_string()),
                    Ok(Err(e)) => PartResult::Failed(format!("出题任务异常: {}", e)),
                    Err(_) => PartResult::TimedOut,
                }
            });
            handles.push((category, handle));
        }

        // 等待全部部分完成（超时已在各任务内处理）
        let (categories, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        let mut results = HashMap::new();
        for (category, joined) in categories.into_iter().zip(joined) {
            let result = match joined {
                Ok(result) => result,
                Err(e) => {
                    error!("[组卷] {} 任务执行失败: {}", category, e);
                    PartResult::Failed(e.to_string())
                }
            };
            results.insert(category, result);
        }
        results
    }
}

// ========== 日志辅助函数 ==========

fn log_exam_start(exam: &ExamAssembly, user_id: &str) {
    info!(
        "[组卷 {}] 📝 开始组卷: {} (用户 {}, {} 个部分)",
        exam.id,
        exam.title,
        user_id,
        Category::EXAM_STRUCTURE.len()
    );
}

fn log_exam_complete(exam: &ExamAssembly) {
    if exam.is_complete() {
        info!(
            "[组卷 {}] ✓ 组卷完成: {} 个部分",
            exam.id,
            exam.ordered_parts.len()
        );
    } else {
        warn!(
            "[组卷 {}] ⚠️ 组卷完成: {}/{} 个部分，缺少 {:?}",
            exam.id,
            exam.ordered_parts.len(),
            Category::EXAM_STRUCTURE.len(),
            exam.missing
        );
    }
}
