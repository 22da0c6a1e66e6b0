use thiserror::Error;

use crate::models::category::Category;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 存储相关错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
    /// 内容生成错误
    #[error("生成错误: {0}")]
    Generation(#[from] GenerationError),
    /// 面向用户的服务错误
    #[error("{0}")]
    Serve(#[from] ServeError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 存储适配器错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 存储暂时不可用（网络、超时等瞬时故障）
    #[error("存储不可用 ({operation}): {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },
    /// 记录不存在
    #[error("记录不存在: {id}")]
    NotFound { id: String },
    /// 乐观锁版本冲突
    #[error("版本冲突 (记录: {id}, 期望版本: {expected}, 实际版本: {actual})")]
    VersionConflict {
        id: String,
        expected: u64,
        actual: u64,
    },
    /// 序列化失败
    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 读写题目文件失败
    #[error("读写题目文件失败 ({path}): {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 内容生成错误
#[derive(Debug, Error)]
pub enum GenerationError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    Api { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyResponse { model: String },
    /// 返回内容无法解析为题目
    #[error("生成内容无法解析 ({category}): {message}")]
    InvalidPayload { category: Category, message: String },
    /// 返回内容与请求的类别不匹配
    #[error("生成内容类别不符: 期望 {expected}, 实际 {actual}")]
    SchemaMismatch { expected: String, actual: String },
    /// 生成成功但保存失败
    #[error("生成结果保存失败: {0}")]
    Store(#[from] StoreError),
}

/// 服务错误
///
/// 用户只会看到这两种错误：额度用完、服务暂不可用。
/// 其余故障都会降级为尽力而为的结果。
#[derive(Debug, Error)]
pub enum ServeError {
    /// 今日额度已用完（正常业务结果，不是故障）
    #[error("今日额度已用完 ({key}, 上限 {limit})，请明天再来")]
    QuotaExceeded { key: String, limit: u32 },
    /// 某个类别暂时无法提供题目
    #[error("服务暂不可用 ({category}): {source}")]
    Unavailable {
        category: Category,
        #[source]
        source: GenerationError,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置项取值无效
    #[error("配置项 {field} 无效: {message}")]
    Invalid { field: String, message: String },
}

// ========== 便捷构造函数 ==========

impl StoreError {
    /// 创建存储不可用错误
    pub fn unavailable(operation: &'static str, message: impl std::fmt::Display) -> Self {
        StoreError::Unavailable {
            operation,
            message: message.to_string(),
        }
    }

    /// 是否为瞬时故障
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}

impl GenerationError {
    /// 创建 LLM API 调用错误
    pub fn api(model: impl Into<String>, source: impl std::fmt::Display) -> Self {
        GenerationError::Api {
            model: model.into(),
            message: source.to_string(),
        }
    }

    /// 创建内容解析错误
    pub fn invalid_payload(category: Category, message: impl std::fmt::Display) -> Self {
        GenerationError::InvalidPayload {
            category,
            message: message.to_string(),
        }
    }
}

impl ServeError {
    /// 是否为额度用完
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, ServeError::QuotaExceeded { .. })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

/// 存储操作结果类型
pub type StoreResult<T> = Result<T, StoreError>;
