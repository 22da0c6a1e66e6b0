//! 每日额度闸门 - 业务能力层
//!
//! 判断用户能否消耗一份当日额度。会员在有效期内直接放行且不计数；
//! 其余用户通过存储的带上限原子自增扣减，跨天自动清零。
//!
//! 存储故障时的行为由 `FailurePolicy` 决定（默认放行）。

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::config::{FailurePolicy, QuotaConfig};
use crate::error::{ServeError, StoreError, StoreResult};
use crate::infrastructure::store::{credits_doc, ItemStore, CREDITS_FIELD};
use crate::models::category::Category;
use crate::models::quota::{BoundedIncrement, QuotaSnapshot, UserQuotaState, AD_REWARD_KEY};
use crate::utils::clock::Clock;

/// 额度闸门
pub struct QuotaGate {
    store: Arc<dyn ItemStore>,
    clock: Arc<dyn Clock>,
    config: QuotaConfig,
}

impl QuotaGate {
    pub fn new(store: Arc<dyn ItemStore>, clock: Arc<dyn Clock>, config: QuotaConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    /// 尝试消耗 `cost` 份 `key` 的当日额度
    ///
    /// `key` 为类别名或 `"exam"`。返回 false 表示额度不足。
    pub async fn try_consume(&self, user_id: &str, key: &str, cost: u32) -> bool {
        let now = self.clock.now();

        // ========== 会员直接放行 ==========
        match self.store.get_quota_state(user_id).await {
            Ok(Some(state)) if state.premium_active(now) => {
                debug!("[额度] 用户 {} 为有效会员，跳过计数 ({})", user_id, key);
                return true;
            }
            Ok(_) => {}
            Err(e) => return self.on_store_failure(user_id, key, &e),
        }

        // ========== 带上限的原子自增 ==========
        let limit = self.config.limit_for(key);
        match self
            .store
            .increment_bounded(user_id, self.clock.today(), key, cost, limit)
            .await
        {
            Ok(BoundedIncrement::Applied { value }) => {
                debug!("[额度] 用户 {} 消耗 {} 份 {} ({}/{})", user_id, cost, key, value, limit);
                true
            }
            Ok(BoundedIncrement::Rejected { current }) => {
                info!(
                    "[额度] 用户 {} 今日 {} 额度不足 ({}/{}, 本次需要 {})",
                    user_id, key, current, limit, cost
                );
                false
            }
            Err(e) => self.on_store_failure(user_id, key, &e),
        }
    }

    /// 按配置的消耗扣减，不足时返回 `QuotaExceeded`
    pub async fn admit(&self, user_id: &str, key: &str) -> Result<(), ServeError> {
        let cost = self.config.cost_for(key);
        if self.try_consume(user_id, key, cost).await {
            Ok(())
        } else {
            Err(ServeError::QuotaExceeded {
                key: key.to_string(),
                limit: self.config.limit_for(key),
            })
        }
    }

    /// 只读的额度视图（跨天的计数显示为空）
    pub async fn get_quota_state(&self, user_id: &str) -> StoreResult<QuotaSnapshot> {
        let state = self
            .store
            .get_quota_state(user_id)
            .await?
            .unwrap_or_else(|| UserQuotaState::new(user_id));
        Ok(state.snapshot(self.clock.today(), self.clock.now()))
    }

    // ========== 会员 ==========

    /// 开通或续期会员，从 max(现在, 当前到期时间) 起顺延 `days` 天
    pub async fn grant_premium(&self, user_id: &str, days: u32) -> StoreResult<DateTime<Utc>> {
        let now = self.clock.now();
        let current = self
            .store
            .get_quota_state(user_id)
            .await?
            .and_then(|state| state.premium_expiry);

        let base = match current {
            Some(expiry) if expiry > now => expiry,
            _ => now,
        };
        let expiry = base + Duration::days(i64::from(days));

        self.store.set_premium(user_id, Some(expiry)).await?;
        info!("[会员] 用户 {} 会员有效期至 {}", user_id, expiry);
        Ok(expiry)
    }

    // ========== 批改点数 ==========

    /// 增加批改点数，返回增加后的余额
    pub async fn add_credits(&self, user_id: &str, amount: u32) -> StoreResult<i64> {
        let balance = self
            .store
            .atomic_increment(&credits_doc(user_id), CREDITS_FIELD, i64::from(amount))
            .await?;
        info!("[点数] 用户 {} +{}，余额 {}", user_id, amount, balance);
        Ok(balance)
    }

    /// 使用一个批改点数；余额为 0 时返回 false
    pub async fn use_credit(&self, user_id: &str) -> StoreResult<bool> {
        let used = self
            .store
            .decrement_if_positive(&credits_doc(user_id), CREDITS_FIELD)
            .await?;
        if !used {
            debug!("[点数] 用户 {} 余额不足", user_id);
        }
        Ok(used)
    }

    // ========== 广告奖励 ==========

    /// 看完广告后返还一份该类别的当日额度
    ///
    /// 每天最多奖励 `max_ad_rewards_per_day` 次，超出时返回 false。
    pub async fn reward_ad_view(&self, user_id: &str, category: Category) -> StoreResult<bool> {
        let today = self.clock.today();
        let granted = self
            .store
            .increment_bounded(
                user_id,
                today,
                AD_REWARD_KEY,
                1,
                self.config.max_ad_rewards_per_day,
            )
            .await?;

        if !granted.is_applied() {
            info!("[广告] 用户 {} 今日广告奖励次数已用完", user_id);
            return Ok(false);
        }

        let remaining = self
            .store
            .release_bounded(user_id, today, category.name(), 1)
            .await?;
        info!(
            "[广告] 用户 {} 获得 1 份 {} 额度，当前已用 {}",
            user_id, category, remaining
        );
        Ok(true)
    }

    fn on_store_failure(&self, user_id: &str, key: &str, error: &StoreError) -> bool {
        match self.config.failure_policy {
            FailurePolicy::FailOpen => {
                warn!("[额度] ⚠️ 存储故障，放行用户 {} ({}): {}", user_id, key, error);
                true
            }
            FailurePolicy::FailClosed => {
                warn!("[额度] ⚠️ 存储故障，拒绝用户 {} ({}): {}", user_id, key, error);
                false
            }
        }
    }
}
