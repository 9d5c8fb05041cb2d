//! 内核配置
//!
//! 定义路由内核的配置结构和加载逻辑。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::utils::{Result, RouteError};

/// 路由配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// 节点未声明 cache-valid-time 时的回收等待时长（毫秒）
    #[serde(default = "default_cache_valid_ms")]
    pub default_cache_valid_ms: u64,

    /// 样式解析轮询间隔（毫秒）
    #[serde(default = "default_css_poll_interval_ms")]
    pub css_poll_interval_ms: u64,

    /// 样式解析等待上限（毫秒）
    #[serde(default = "default_css_poll_timeout_ms")]
    pub css_poll_timeout_ms: u64,

    /// 节点未声明 lock-loading-time 时的最短加载展示时间（毫秒）
    #[serde(default)]
    pub default_lock_loading_ms: Option<u64>,

    /// 是否使用进程级导航通知器
    #[serde(default = "default_true")]
    pub install_global_notifier: bool,
}

fn default_cache_valid_ms() -> u64 {
    60_000
}

fn default_css_poll_interval_ms() -> u64 {
    50
}

fn default_css_poll_timeout_ms() -> u64 {
    5 * 60 * 1000
}

fn default_true() -> bool {
    true
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_cache_valid_ms: default_cache_valid_ms(),
            css_poll_interval_ms: default_css_poll_interval_ms(),
            css_poll_timeout_ms: default_css_poll_timeout_ms(),
            default_lock_loading_ms: None,
            install_global_notifier: true,
        }
    }
}

impl RouterConfig {
    /// 节点的回收等待时长
    pub fn cache_valid(&self, declared: Option<u64>) -> Duration {
        Duration::from_millis(declared.unwrap_or(self.default_cache_valid_ms))
    }

    /// 节点的最短加载展示时间
    pub fn lock_loading(&self, declared: Option<u64>) -> Option<Duration> {
        declared
            .or(self.default_lock_loading_ms)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// 样式解析轮询间隔
    pub fn css_poll_interval(&self) -> Duration {
        Duration::from_millis(self.css_poll_interval_ms)
    }

    /// 样式解析等待上限
    pub fn css_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.css_poll_timeout_ms)
    }

    /// 校验取值
    pub fn validate(&self) -> Result<()> {
        if self.css_poll_interval_ms == 0 {
            return Err(RouteError::InvalidConfigValue {
                key: "router.css_poll_interval_ms".to_string(),
                reason: "必须大于 0".to_string(),
            });
        }
        if self.css_poll_timeout_ms < self.css_poll_interval_ms {
            return Err(RouteError::InvalidConfigValue {
                key: "router.css_poll_timeout_ms".to_string(),
                reason: "不能小于轮询间隔".to_string(),
            });
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
        }
    }
}

/// 内核配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 路由配置
    #[serde(default)]
    pub router: RouterConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 是否为开发模式
    #[serde(default)]
    pub dev_mode: bool,
}

impl CoreConfig {
    /// 创建配置构建器
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::new()
    }

    /// 从文件加载配置（`.json` 按 JSON 解析，其余按 YAML）
    pub async fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| RouteError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;

        let mut config: CoreConfig = if path.extension().map(|e| e == "json").unwrap_or(false) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.router.validate()?;
        config.config_path = Some(path);
        Ok(config)
    }

    /// 合并另一个配置（用于覆盖）
    pub fn merge(&mut self, other: CoreConfig) {
        // 只覆盖非默认值的配置
        let defaults = RouterConfig::default();
        if other.router.default_cache_valid_ms != defaults.default_cache_valid_ms {
            self.router.default_cache_valid_ms = other.router.default_cache_valid_ms;
        }
        if other.router.css_poll_interval_ms != defaults.css_poll_interval_ms {
            self.router.css_poll_interval_ms = other.router.css_poll_interval_ms;
        }
        if other.router.css_poll_timeout_ms != defaults.css_poll_timeout_ms {
            self.router.css_poll_timeout_ms = other.router.css_poll_timeout_ms;
        }
        if other.router.default_lock_loading_ms.is_some() {
            self.router.default_lock_loading_ms = other.router.default_lock_loading_ms;
        }
        if !other.router.install_global_notifier {
            self.router.install_global_notifier = false;
        }
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.json_format {
            self.logging.json_format = true;
        }
        if other.dev_mode {
            self.dev_mode = true;
        }
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: CoreConfig::default(),
        }
    }

    /// 设置配置文件路径
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_path = Some(path.into());
        self
    }

    /// 设置默认回收等待时长
    pub fn cache_valid_ms(mut self, ms: u64) -> Self {
        self.config.router.default_cache_valid_ms = ms;
        self
    }

    /// 设置样式解析轮询参数
    pub fn css_poll(mut self, interval_ms: u64, timeout_ms: u64) -> Self {
        self.config.router.css_poll_interval_ms = interval_ms;
        self.config.router.css_poll_timeout_ms = timeout_ms;
        self
    }

    /// 设置默认最短加载展示时间
    pub fn lock_loading_ms(mut self, ms: u64) -> Self {
        self.config.router.default_lock_loading_ms = Some(ms);
        self
    }

    /// 使用独立的导航通知器，而不是进程级实例
    pub fn isolated_notifier(mut self) -> Self {
        self.config.router.install_global_notifier = false;
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用文件日志
    pub fn file_logging(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.config.logging.file_output = true;
        self.config.logging.log_dir = Some(log_dir.into());
        self
    }

    /// 启用 JSON 格式日志
    pub fn json_logging(mut self) -> Self {
        self.config.logging.json_format = true;
        self
    }

    /// 启用开发模式
    pub fn dev_mode(mut self) -> Self {
        self.config.dev_mode = true;
        self
    }

    /// 构建配置
    pub fn build(self) -> CoreConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert!(!config.dev_mode);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.router.default_cache_valid_ms, 60_000);
        assert_eq!(config.router.css_poll_interval_ms, 50);
        assert_eq!(config.router.css_poll_timeout_ms, 300_000);
        assert!(config.router.install_global_notifier);
    }

    #[test]
    fn test_config_builder() {
        let config = CoreConfig::builder()
            .cache_valid_ms(1000)
            .lock_loading_ms(200)
            .isolated_notifier()
            .log_level("debug")
            .dev_mode()
            .build();

        assert_eq!(config.router.cache_valid(None), Duration::from_millis(1000));
        assert_eq!(config.router.cache_valid(Some(5)), Duration::from_millis(5));
        assert_eq!(config.router.lock_loading(None), Some(Duration::from_millis(200)));
        assert_eq!(config.router.lock_loading(Some(0)), None);
        assert!(!config.router.install_global_notifier);
        assert_eq!(config.logging.level, "debug");
        assert!(config.dev_mode);
    }

    #[test]
    fn test_config_merge() {
        let mut base = CoreConfig::default();
        let override_config = CoreConfig::builder()
            .log_level("debug")
            .cache_valid_ms(10)
            .dev_mode()
            .build();

        base.merge(override_config);

        assert_eq!(base.logging.level, "debug");
        assert_eq!(base.router.default_cache_valid_ms, 10);
        assert_eq!(base.router.css_poll_interval_ms, 50);
        assert!(base.dev_mode);
    }

    #[test]
    fn test_validate() {
        assert!(RouterConfig::default().validate().is_ok());

        let config = CoreConfig::builder().css_poll(0, 10).build();
        assert!(config.router.validate().is_err());

        let config = CoreConfig::builder().css_poll(100, 10).build();
        assert!(matches!(
            config.router.validate(),
            Err(RouteError::InvalidConfigValue { .. })
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = CoreConfig::builder()
            .cache_valid_ms(4)
            .log_level("warn")
            .build();

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: CoreConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.router.default_cache_valid_ms, 4);
        assert_eq!(parsed.logging.level, "warn");
    }
}
