use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// 整套模拟考试使用的额度键
pub const EXAM_QUOTA_KEY: &str = "exam";

/// 看广告奖励次数使用的额度键
pub const AD_REWARD_KEY: &str = "ad_rewards";

/// 用户额度状态（每个用户一条记录）
///
/// `date` 与当天不同时，`counts` 视为清零，不需要单独的清理任务。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserQuotaState {
    pub user_id: String,
    /// `counts` 所属的日期
    pub date: Option<NaiveDate>,
    /// 额度键 → 当天已用数量
    pub counts: HashMap<String, u32>,
    pub is_premium: bool,
    pub premium_expiry: Option<DateTime<Utc>>,
    /// 批改点数
    pub credits: i64,
}

/// 只读的额度视图
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub counts_today: HashMap<String, u32>,
    /// 会员是否仍在有效期内
    pub is_premium: bool,
    pub premium_expiry: Option<DateTime<Utc>>,
    pub credits: i64,
}

/// 带上限的原子自增结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundedIncrement {
    /// 已自增，`value` 为自增后的值
    Applied { value: u32 },
    /// 超出上限被拒绝，计数未变
    Rejected { current: u32 },
}

impl BoundedIncrement {
    pub fn is_applied(self) -> bool {
        matches!(self, BoundedIncrement::Applied { .. })
    }
}

impl UserQuotaState {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// 会员是否有效
    pub fn premium_active(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.premium_expiry.is_some_and(|expiry| expiry > now)
    }

    /// 指定日期某个键的已用数量（日期不符时为 0）
    pub fn count_on(&self, day: NaiveDate, key: &str) -> u32 {
        if self.date == Some(day) {
            self.counts.get(key).copied().unwrap_or(0)
        } else {
            0
        }
    }

    /// 日期翻页：日期不同则清空计数
    fn roll_to(&mut self, day: NaiveDate) {
        if self.date != Some(day) {
            self.counts.clear();
            self.date = Some(day);
        }
    }

    /// 带上限的自增：`current + delta > ceiling` 时拒绝
    pub fn apply_bounded(
        &mut self,
        day: NaiveDate,
        key: &str,
        delta: u32,
        ceiling: u32,
    ) -> BoundedIncrement {
        let current = self.count_on(day, key);
        let next = current.saturating_add(delta);
        if next > ceiling {
            return BoundedIncrement::Rejected { current };
        }

        self.roll_to(day);
        self.counts.insert(key.to_string(), next);
        BoundedIncrement::Applied { value: next }
    }

    /// 归还额度，最低减到 0，返回归还后的值
    pub fn release(&mut self, day: NaiveDate, key: &str, delta: u32) -> u32 {
        self.roll_to(day);
        let entry = self.counts.entry(key.to_string()).or_insert(0);
        *entry = entry.saturating_sub(delta);
        *entry
    }

    /// 生成只读视图
    pub fn snapshot(&self, today: NaiveDate, now: DateTime<Utc>) -> QuotaSnapshot {
        let counts_today = if self.date == Some(today) {
            self.counts.clone()
        } else {
            HashMap::new()
        };

        QuotaSnapshot {
            counts_today,
            is_premium: self.premium_active(now),
            premium_expiry: self.premium_expiry,
            credits: self.credits,
        }
    }
}
