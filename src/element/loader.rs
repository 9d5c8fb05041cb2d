//! 资源加载
//!
//! 路由节点的两类资源：组件模块与样式。两者相互独立、并发加载，
//! 各自维护 [`LoadState`]；渲染调度是唯一的同步点。
//!
//! 模块的获取方式通过 [`ComponentLoader`] 注入，样式内容通过
//! [`StyleFetcher`] 注入，内核不依赖任何具体的加载机制。

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::element::render::{MountPoint, StyleSheet};
use crate::utils::{Result, RouteError};

/// 加载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    /// 尚未加载
    #[default]
    Unloaded,
    /// 加载中
    Loading,
    /// 已就绪
    Ready,
    /// 加载失败
    Failed,
}

impl LoadState {
    /// 是否已经有结果（成功或失败）
    pub fn is_settled(&self) -> bool {
        matches!(self, LoadState::Ready | LoadState::Failed)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadState::Unloaded => "unloaded",
            LoadState::Loading => "loading",
            LoadState::Ready => "ready",
            LoadState::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ==================== 组件模块 ====================

/// 渲染导出：把内容渲染进挂载点
pub type RenderFn = Arc<dyn Fn(&mut MountPoint) -> anyhow::Result<()> + Send + Sync>;

/// 卸载导出：释放已渲染的实例
pub type TeardownFn = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// 已加载的组件模块
#[derive(Clone)]
pub struct ComponentModule {
    url: String,
    exports: HashMap<String, RenderFn>,
    destroy: Option<TeardownFn>,
}

impl ComponentModule {
    /// 创建没有任何导出的模块
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            exports: HashMap::new(),
            destroy: None,
        }
    }

    /// 添加渲染导出
    pub fn with_render<F>(mut self, name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&mut MountPoint) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.exports.insert(name.into(), Arc::new(render));
        self
    }

    /// 添加卸载导出
    pub fn with_destroy<F>(mut self, destroy: F) -> Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.destroy = Some(Arc::new(destroy));
        self
    }

    /// 模块地址
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 查找渲染导出
    pub fn render_export(&self, name: &str) -> Option<RenderFn> {
        self.exports.get(name).cloned()
    }

    /// 卸载导出
    pub fn teardown(&self) -> Option<TeardownFn> {
        self.destroy.clone()
    }
}

impl fmt::Debug for ComponentModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut exports: Vec<&String> = self.exports.keys().collect();
        exports.sort();
        f.debug_struct("ComponentModule")
            .field("url", &self.url)
            .field("exports", &exports)
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

// ==================== 加载接口 ====================

/// 组件加载接口
///
/// 地址 -> 模块。实现可以从注册表、文件或网络获取。
#[async_trait]
pub trait ComponentLoader: Send + Sync {
    /// 加载模块
    async fn load(&self, url: &str) -> Result<Arc<ComponentModule>>;
}

/// 样式获取接口
#[async_trait]
pub trait StyleFetcher: Send + Sync {
    /// 获取单个样式来源的文本内容
    async fn fetch(&self, source: &str) -> Result<String>;
}

/// 基于注册表的组件加载器
///
/// 模块预先注册，可为单个地址设置加载延迟以模拟网络耗时。
#[derive(Default)]
pub struct StaticComponentLoader {
    modules: RwLock<HashMap<String, Arc<ComponentModule>>>,
    delays: RwLock<HashMap<String, Duration>>,
    loads: AtomicUsize,
}

impl StaticComponentLoader {
    /// 创建空加载器
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模块
    pub fn register(&self, module: ComponentModule) {
        let url = module.url().to_string();
        debug!(url = %url, "注册组件模块");
        self.modules
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url, Arc::new(module));
    }

    /// 注册模块并设置加载延迟
    pub fn register_with_delay(&self, module: ComponentModule, delay: Duration) {
        self.delays
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(module.url().to_string(), delay);
        self.register(module);
    }

    /// 累计加载次数
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComponentLoader for StaticComponentLoader {
    async fn load(&self, url: &str) -> Result<Arc<ComponentModule>> {
        self.loads.fetch_add(1, Ordering::SeqCst);

        let delay = self
            .delays
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(url)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.modules
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(url)
            .cloned()
            .ok_or_else(|| RouteError::ModuleLoadFailed {
                url: url.to_string(),
                reason: "模块未注册".to_string(),
            })
    }
}

/// 基于内存表的样式获取器
#[derive(Default)]
pub struct StaticStyleFetcher {
    sheets: RwLock<HashMap<String, String>>,
    delays: RwLock<HashMap<String, Duration>>,
    fetches: AtomicUsize,
}

impl StaticStyleFetcher {
    /// 创建空获取器
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册样式内容
    pub fn insert(&self, source: impl Into<String>, content: impl Into<String>) {
        self.sheets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(source.into(), content.into());
    }

    /// 注册样式内容并设置获取延迟
    pub fn insert_with_delay(
        &self,
        source: impl Into<String>,
        content: impl Into<String>,
        delay: Duration,
    ) {
        let source = source.into();
        self.delays
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(source.clone(), delay);
        self.insert(source, content);
    }

    /// 累计获取次数
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StyleFetcher for StaticStyleFetcher {
    async fn fetch(&self, source: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = self
            .delays
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(source)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.sheets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(source)
            .cloned()
            .ok_or_else(|| RouteError::StyleLoadFailed {
                source_url: source.to_string(),
                reason: "样式不存在".to_string(),
            })
    }
}

/// 从文件系统读取样式
///
/// 接受普通路径或 `file://` 地址，相对路径基于 `base_dir`。
#[derive(Debug, Clone, Default)]
pub struct FsStyleFetcher {
    base_dir: Option<PathBuf>,
}

impl FsStyleFetcher {
    /// 以 base_dir 为相对路径基准
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve(&self, source: &str) -> PathBuf {
        let raw = source.strip_prefix("file://").unwrap_or(source);
        let path = PathBuf::from(raw);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }
}

#[async_trait]
impl StyleFetcher for FsStyleFetcher {
    async fn fetch(&self, source: &str) -> Result<String> {
        let path = self.resolve(source);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| RouteError::StyleLoadFailed {
                source_url: source.to_string(),
                reason: e.to_string(),
            })
    }
}

// ==================== 加载流程 ====================

/// 并行获取全部样式，按声明顺序拼接
///
/// 任一来源失败则整体失败。
pub async fn fetch_styles(fetcher: &dyn StyleFetcher, sources: &[String]) -> Result<String> {
    let results = join_all(sources.iter().map(|source| fetcher.fetch(source))).await;

    let mut contents = Vec::with_capacity(results.len());
    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(content) => contents.push(content),
            Err(e) => {
                warn!(url = %source, error = %e, "样式获取失败");
                return Err(e);
            }
        }
    }
    Ok(contents.join("\n"))
}

/// 等待样式表解析出至少一条规则
///
/// 以固定间隔轮询，超过 `timeout` 返回 [`RouteError::StyleParseTimeout`]。
/// 节点在等待期间失活时放弃等待，返回 `Ok(false)`。
pub async fn wait_for_stylesheet(
    sheet: Arc<StyleSheet>,
    interval: Duration,
    timeout: Duration,
    still_active: Arc<AtomicBool>,
) -> Result<bool> {
    let started = Instant::now();
    loop {
        if sheet.is_ready() {
            return Ok(true);
        }
        if !still_active.load(Ordering::SeqCst) {
            debug!("节点已失活，放弃等待样式解析");
            return Ok(false);
        }
        let waited = started.elapsed();
        if waited >= timeout {
            warn!(waited_ms = waited.as_millis() as u64, "样式解析等待超时");
            return Err(RouteError::StyleParseTimeout {
                waited_ms: waited.as_millis() as u64,
            });
        }
        tokio::time::sleep(interval).await;
    }
}

/// 资源加载能力集合
#[derive(Clone)]
pub struct AssetLoader {
    components: Arc<dyn ComponentLoader>,
    styles: Arc<dyn StyleFetcher>,
}

impl AssetLoader {
    /// 组合组件加载器与样式获取器
    pub fn new(components: Arc<dyn ComponentLoader>, styles: Arc<dyn StyleFetcher>) -> Self {
        info!("创建资源加载器");
        Self { components, styles }
    }

    /// 组件加载器
    pub fn components(&self) -> Arc<dyn ComponentLoader> {
        Arc::clone(&self.components)
    }

    /// 样式获取器
    pub fn styles(&self) -> Arc<dyn StyleFetcher> {
        Arc::clone(&self.styles)
    }
}

impl Default for AssetLoader {
    fn default() -> Self {
        Self::new(
            Arc::new(StaticComponentLoader::new()),
            Arc::new(FsStyleFetcher::default()),
        )
    }
}
