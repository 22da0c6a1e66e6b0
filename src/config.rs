//! 程序配置
//!
//! 三层加载：内置默认值 → TOML 配置文件（可选）→ 环境变量覆盖。

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::quota::EXAM_QUOTA_KEY;

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "EXERCISE_POOL_CONFIG";

/// 程序配置
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pool: PoolConfig,
    pub quota: QuotaConfig,
    pub reports: ReportConfig,
    pub backfill: BackfillConfig,
    pub exam: ExamConfig,
    pub replenish: ReplenishConfig,
    pub llm: LlmConfig,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

/// 题池选择配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// 单次扫描的候选上限
    pub scan_limit: usize,
    /// 默认级别；补货未指定级别时使用
    pub default_level: String,
    /// 选中后占用的租约秒数；为空时不占用（同一题可能同时发给多人）
    pub lease_secs: Option<u64>,
}

/// 存储故障时额度闸门的策略
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 放行（可用性优先）
    #[default]
    FailOpen,
    /// 拒绝（正确性优先）
    FailClosed,
}

/// 每日额度配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub default_daily_limit: u32,
    pub default_cost: u32,
    /// 额度键 → 每日上限
    pub limits: HashMap<String, u32>,
    /// 额度键 → 单次消耗
    pub costs: HashMap<String, u32>,
    pub exam_cost: u32,
    pub exam_daily_limit: u32,
    pub failure_policy: FailurePolicy,
    pub max_ad_rewards_per_day: u32,
}

/// 举报下架配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// 达到该举报数即下架
    pub flag_threshold: u32,
}

/// 后台补货配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BackfillConfig {
    pub enabled: bool,
    /// 同时进行的补货任务上限，超出时直接跳过
    pub max_concurrent: usize,
}

/// 组卷配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamConfig {
    pub max_workers: usize,
    /// 单个部分的超时秒数
    pub part_timeout_secs: u64,
    pub duration_minutes: u32,
}

/// 批量补货任务配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplenishConfig {
    /// 要补货的级别；为空时只补 `pool.default_level`
    pub levels: Vec<String>,
    pub target_per_category: usize,
    pub max_concurrent: usize,
    /// 题目文件（JSON）；补货前载入、补货后写回
    pub items_file: Option<String>,
}

/// LLM 配置
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            scan_limit: 20,
            default_level: "C1".to_string(),
            lease_secs: None,
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_daily_limit: 3,
            default_cost: 1,
            limits: HashMap::new(),
            costs: HashMap::new(),
            exam_cost: 5,
            exam_daily_limit: 5,
            failure_policy: FailurePolicy::FailOpen,
            max_ad_rewards_per_day: 3,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { flag_threshold: 3 }
    }
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrent: 4,
        }
    }
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            part_timeout_secs: 120,
            duration_minutes: 90,
        }
    }
}

impl Default for ReplenishConfig {
    fn default() -> Self {
        Self {
            levels: Vec::new(),
            target_per_category: 3,
            max_concurrent: 4,
            items_file: None,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            model_name: "gpt-4o".to_string(),
            temperature: 0.7,
            max_tokens: 4096,
        }
    }
}

impl QuotaConfig {
    /// 某个额度键的每日上限
    pub fn limit_for(&self, key: &str) -> u32 {
        if let Some(limit) = self.limits.get(key) {
            return *limit;
        }
        if key == EXAM_QUOTA_KEY {
            self.exam_daily_limit
        } else {
            self.default_daily_limit
        }
    }

    /// 某个额度键的单次消耗
    pub fn cost_for(&self, key: &str) -> u32 {
        if let Some(cost) = self.costs.get(key) {
            return *cost;
        }
        if key == EXAM_QUOTA_KEY {
            self.exam_cost
        } else {
            self.default_cost
        }
    }
}

impl Config {
    /// 加载配置：默认值 → 配置文件 → 环境变量
    ///
    /// 未传入路径时读取 `EXERCISE_POOL_CONFIG`，两者都没有则只用默认值。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var(CONFIG_PATH_ENV).ok();
        let path = path.map(Path::to_path_buf).or_else(|| env_path.map(Into::into));

        let base = match path {
            Some(path) => Self::from_toml_file(&path)?,
            None => Self::default(),
        };

        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::TomlParseFailed { source, .. } => ConfigError::TomlParseFailed {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    /// 从 TOML 文本解析
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: String::new(),
            source,
        })
    }

    /// 只用默认值 + 环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(v) = env_string("LLM_API_KEY") {
            self.llm.api_key = v;
        }
        if let Some(v) = env_string("LLM_API_BASE_URL") {
            self.llm.api_base_url = v;
        }
        if let Some(v) = env_string("LLM_MODEL_NAME") {
            self.llm.model_name = v;
        }
        if let Some(v) = env_parse::<usize>("POOL_SCAN_LIMIT", "usize")? {
            self.pool.scan_limit = v;
        }
        if let Some(v) = env_string("POOL_DEFAULT_LEVEL") {
            self.pool.default_level = v;
        }
        if let Some(v) = env_parse::<u64>("POOL_LEASE_SECS", "u64")? {
            self.pool.lease_secs = Some(v);
        }
        if let Some(v) = env_parse::<u32>("QUOTA_DAILY_LIMIT", "u32")? {
            self.quota.default_daily_limit = v;
        }
        if let Some(v) = env_string("QUOTA_FAILURE_POLICY") {
            self.quota.failure_policy = parse_failure_policy(&v)?;
        }
        if let Some(v) = env_parse::<u32>("REPORT_FLAG_THRESHOLD", "u32")? {
            self.reports.flag_threshold = v;
        }
        if let Some(v) = env_parse::<usize>("BACKFILL_MAX_CONCURRENT", "usize")? {
            self.backfill.max_concurrent = v;
        }
        if let Some(v) = env_parse::<u64>("EXAM_PART_TIMEOUT_SECS", "u64")? {
            self.exam.part_timeout_secs = v;
        }
        if let Some(v) = env_parse::<usize>("REPLENISH_TARGET", "usize")? {
            self.replenish.target_per_category = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_CONCURRENT_GENERATIONS", "usize")? {
            self.replenish.max_concurrent = v;
        }
        if let Some(v) = env_string("REPLENISH_ITEMS_FILE") {
            self.replenish.items_file = Some(v);
        }
        if let Some(v) = env_parse::<bool>("VERBOSE_LOGGING", "bool")? {
            self.verbose_logging = v;
        }
        Ok(self)
    }

    /// 补货实际处理的级别
    pub fn replenish_levels(&self) -> Vec<String> {
        if self.replenish.levels.is_empty() {
            vec![self.pool.default_level.clone()]
        } else {
            self.replenish.levels.clone()
        }
    }

    /// 校验取值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.scan_limit == 0 {
            return Err(invalid("pool.scan_limit", "必须大于 0"));
        }
        if self.reports.flag_threshold == 0 {
            return Err(invalid("reports.flag_threshold", "必须大于 0"));
        }
        if self.exam.max_workers == 0 {
            return Err(invalid("exam.max_workers", "必须大于 0"));
        }
        if self.replenish.max_concurrent == 0 {
            return Err(invalid("replenish.max_concurrent", "必须大于 0"));
        }
        if self.quota.exam_cost > self.quota.limit_for(EXAM_QUOTA_KEY) {
            return Err(invalid(
                "quota.exam_cost",
                "单次组卷消耗超过了每日上限，组卷将永远被拒绝",
            ));
        }
        Ok(())
    }
}

fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(var_name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match env_string(var_name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
    }
}

fn parse_failure_policy(value: &str) -> Result<FailurePolicy, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "fail_open" | "open" => Ok(FailurePolicy::FailOpen),
        "fail_closed" | "closed" => Ok(FailurePolicy::FailClosed),
        _ => Err(ConfigError::EnvVarParseFailed {
            var_name: "QUOTA_FAILURE_POLICY".to_string(),
            value: value.to_string(),
            expected_type: "fail_open | fail_closed".to_string(),
        }),
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_observed_policy() {
        let config = Config::default();
        assert_eq!(config.pool.scan_limit, 20);
        assert_eq!(config.reports.flag_threshold, 3);
        assert_eq!(config.quota.limit_for("reading_and_use_of_language1"), 3);
        assert_eq!(config.quota.cost_for("reading_and_use_of_language1"), 1);
        assert_eq!(config.quota.cost_for(EXAM_QUOTA_KEY), 5);
        assert_eq!(config.quota.failure_policy, FailurePolicy::FailOpen);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_policy_table() {
        let config = Config::from_toml_str(
            r#"
            verbose_logging = true

            [pool]
            scan_limit = 10
            lease_secs = 30

            [quota]
            default_daily_limit = 10
            failure_policy = "fail_closed"

            [quota.limits]
            writing1 = 1

            [quota.costs]
            exam = 4
            "#,
        )
        .unwrap();

        assert!(config.verbose_logging);
        assert_eq!(config.pool.scan_limit, 10);
        assert_eq!(config.pool.lease_secs, Some(30));
        assert_eq!(config.pool.default_level, "C1");
        assert_eq!(config.quota.limit_for("writing1"), 1);
        assert_eq!(config.quota.limit_for("writing2"), 10);
        assert_eq!(config.quota.cost_for(EXAM_QUOTA_KEY), 4);
        assert_eq!(config.quota.failure_policy, FailurePolicy::FailClosed);
        assert_eq!(config.reports.flag_threshold, 3);
    }

    #[test]
    fn test_replenish_levels_fall_back_to_default_level() {
        let mut config = Config::default();
        assert_eq!(config.replenish_levels(), vec!["C1".to_string()]);

        config.pool.default_level = "B2".to_string();
        assert_eq!(config.replenish_levels(), vec!["B2".to_string()]);

        let config = Config::from_toml_str(
            r#"
            [replenish]
            levels = ["B2", "C2"]
            items_file = "data/items.json"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.replenish_levels(),
            vec!["B2".to_string(), "C2".to_string()]
        );
        assert_eq!(config.replenish.items_file.as_deref(), Some("data/items.json"));
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let err = Config::from_toml_str("[pool\nscan_limit = ").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParseFailed { .. }));
    }

    #[test]
    fn test_validate_rejects_unreachable_exam_cost() {
        let mut config = Config::default();
        config.quota.exam_cost = 6;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_parse_failure_policy() {
        assert_eq!(parse_failure_policy("closed").unwrap(), FailurePolicy::FailClosed);
        assert_eq!(parse_failure_policy("FAIL_OPEN").unwrap(), FailurePolicy::FailOpen);
        assert!(parse_failure_policy("maybe").is_err());
    }
}
