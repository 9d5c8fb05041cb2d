//! 路由内核错误类型定义
//!
//! 本模块定义了内核中使用的所有错误类型。
//! 加载类错误（模块、样式）只作为节点状态保存，不会越过加载器边界；
//! 只有缺少渲染导出且未配置错误渲染器时才会作为硬错误返回。

use thiserror::Error;

/// 路由内核错误类型
#[derive(Error, Debug, Clone)]
pub enum RouteError {
    // ==================== 资源加载错误 ====================

    /// 组件模块加载失败
    #[error("模块加载失败: '{url}' - {reason}")]
    ModuleLoadFailed {
        url: String,
        reason: String,
    },

    /// 样式加载失败
    #[error("样式加载失败: '{source_url}' - {reason}")]
    StyleLoadFailed {
        source_url: String,
        reason: String,
    },

    /// 样式解析等待超时
    #[error("样式解析超时: 等待 {waited_ms} ms 仍未解析出任何规则")]
    StyleParseTimeout {
        waited_ms: u64,
    },

    // ==================== 渲染错误 ====================

    /// 模块缺少渲染导出
    #[error("模块缺少渲染导出: '{export}'")]
    MissingRenderExport {
        export: String,
    },

    /// 模块缺少卸载导出（仅警告）
    #[error("模块缺少卸载导出 destroy: '{url}'")]
    MissingTeardownExport {
        url: String,
    },

    /// 自定义渲染挂载点不存在
    #[error("自定义渲染挂载点不存在: path '{0}'")]
    MountPointMissing(String),

    /// 渲染回调执行失败
    #[error("渲染回调执行失败: path '{path}' - {reason}")]
    RenderFailed {
        path: String,
        reason: String,
    },

    /// 卸载回调执行失败
    #[error("卸载回调执行失败: path '{path}' - {reason}")]
    TeardownFailed {
        path: String,
        reason: String,
    },

    // ==================== 元素树错误 ====================

    /// 元素不存在
    #[error("元素不存在: {0}")]
    ElementNotFound(usize),

    /// 父元素无效
    #[error("父元素无效: {0}")]
    InvalidParent(String),

    /// 元素不是路由节点
    #[error("元素不是路由节点: {0}")]
    NotARoute(usize),

    /// 元素不是路由容器
    #[error("元素不是路由容器: {0}")]
    NotAContainer(usize),

    /// 属性值无效
    #[error("属性值无效: '{name}' - {reason}")]
    InvalidAttribute {
        name: String,
        reason: String,
    },

    // ==================== 导航错误 ====================

    /// 订阅未找到
    #[error("订阅未找到: '{0}'")]
    SubscriptionNotFound(String),

    /// 导航地址无效
    #[error("导航地址无效: {0}")]
    InvalidUrl(String),

    // ==================== 配置错误 ====================

    /// 配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// 配置值无效
    #[error("配置值无效: '{key}' - {reason}")]
    InvalidConfigValue {
        key: String,
        reason: String,
    },

    // ==================== 通用错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(String),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(String),

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    /// 宿主已关闭
    #[error("路由宿主已关闭")]
    HostClosed,

    /// 其他错误
    #[error("{0}")]
    Other(String),
}

// 错误需要 Clone（加载结果会在节点状态与渲染路径之间共享），
// 因此外部错误在转换时只保留其文本。

impl From<std::io::Error> for RouteError {
    fn from(e: std::io::Error) -> Self {
        RouteError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for RouteError {
    fn from(e: serde_json::Error) -> Self {
        RouteError::Json(e.to_string())
    }
}

impl From<serde_yaml::Error> for RouteError {
    fn from(e: serde_yaml::Error) -> Self {
        RouteError::Yaml(e.to_string())
    }
}

impl From<url::ParseError> for RouteError {
    fn from(e: url::ParseError) -> Self {
        RouteError::InvalidUrl(e.to_string())
    }
}

impl From<anyhow::Error> for RouteError {
    fn from(e: anyhow::Error) -> Self {
        RouteError::Other(format!("{:#}", e))
    }
}

/// 内核操作结果类型别名
pub type Result<T> = std::result::Result<T, RouteError>;

/// 错误码常量
pub mod error_code {
    // 加载错误 (LOAD-xxx)
    pub const MODULE_LOAD_FAILED: &str = "LOAD-001";
    pub const STYLE_LOAD_FAILED: &str = "LOAD-002";
    pub const STYLE_PARSE_TIMEOUT: &str = "LOAD-003";

    // 渲染错误 (RENDER-xxx)
    pub const MISSING_RENDER_EXPORT: &str = "RENDER-001";
    pub const MISSING_TEARDOWN_EXPORT: &str = "RENDER-002";
    pub const MOUNT_POINT_MISSING: &str = "RENDER-003";
    pub const RENDER_FAILED: &str = "RENDER-004";
    pub const TEARDOWN_FAILED: &str = "RENDER-005";

    // 元素错误 (ELEMENT-xxx)
    pub const ELEMENT_NOT_FOUND: &str = "ELEMENT-001";
    pub const INVALID_PARENT: &str = "ELEMENT-002";
    pub const WRONG_ELEMENT_KIND: &str = "ELEMENT-003";
    pub const INVALID_ATTRIBUTE: &str = "ELEMENT-004";

    // 导航错误 (NAV-xxx)
    pub const SUBSCRIPTION_NOT_FOUND: &str = "NAV-001";
    pub const INVALID_URL: &str = "NAV-002";

    // 配置错误 (CONFIG-xxx)
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-001";
    pub const CONFIG_INVALID_VALUE: &str = "CONFIG-002";
}

impl RouteError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            RouteError::ModuleLoadFailed { .. } => error_code::MODULE_LOAD_FAILED,
            RouteError::StyleLoadFailed { .. } => error_code::STYLE_LOAD_FAILED,
            RouteError::StyleParseTimeout { .. } => error_code::STYLE_PARSE_TIMEOUT,
            RouteError::MissingRenderExport { .. } => error_code::MISSING_RENDER_EXPORT,
            RouteError::MissingTeardownExport { .. } => error_code::MISSING_TEARDOWN_EXPORT,
            RouteError::MountPointMissing(_) => error_code::MOUNT_POINT_MISSING,
            RouteError::RenderFailed { .. } => error_code::RENDER_FAILED,
            RouteError::TeardownFailed { .. } => error_code::TEARDOWN_FAILED,
            RouteError::ElementNotFound(_) => error_code::ELEMENT_NOT_FOUND,
            RouteError::InvalidParent(_) => error_code::INVALID_PARENT,
            RouteError::NotARoute(_) | RouteError::NotAContainer(_) => {
                error_code::WRONG_ELEMENT_KIND
            }
            RouteError::InvalidAttribute { .. } => error_code::INVALID_ATTRIBUTE,
            RouteError::SubscriptionNotFound(_) => error_code::SUBSCRIPTION_NOT_FOUND,
            RouteError::InvalidUrl(_) => error_code::INVALID_URL,
            RouteError::ConfigLoadFailed(_) => error_code::CONFIG_LOAD_FAILED,
            RouteError::InvalidConfigValue { .. } => error_code::CONFIG_INVALID_VALUE,
            _ => "UNKNOWN",
        }
    }

    /// 是否为只需记录警告的错误
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            RouteError::MissingTeardownExport { .. } | RouteError::MountPointMissing(_)
        )
    }
}
