//! 导航通知服务
//!
//! 进程级共享的导航通知器：维护内存中的历史栈与当前地址，
//! 每次导航操作（push、replace、back、forward、go 以及原生前进后退）
//! 完成后，按订阅顺序向所有订阅者发送 [`NavigationEvent`]。
//!
//! # 主要功能
//!
//! - **历史栈**: push 截断前进分支，replace 原地替换，go 越界时不做任何事
//! - **地址解析**: 相对地址基于当前地址解析，使用 `url` crate 提取 pathname
//! - **订阅管理**: 订阅返回订阅 ID，节点销毁时凭 ID 取消订阅
//! - **全局实例**: [`NavigationNotifier::install`] 带幂等保护，
//!   无论挂载多少棵路由树都只安装一次
//!
//! 回调在导航操作所在线程同步执行。回调内部不应再次发起导航，
//! 而应把工作投递回宿主任务队列。

use std::fmt;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, trace};
use url::Url;

use crate::utils::{generate_subscription_id, generate_uuid, Result, RouteError};

/// 解析相对地址时使用的基准源
pub const DEFAULT_ORIGIN: &str = "http://localhost/";

/// 导航类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationType {
    Push,
    Replace,
    Back,
    Forward,
    Go,
}

impl NavigationType {
    /// 字符串形式
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationType::Push => "push",
            NavigationType::Replace => "replace",
            NavigationType::Back => "back",
            NavigationType::Forward => "forward",
            NavigationType::Go => "go",
        }
    }
}

impl fmt::Display for NavigationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 导航事件
///
/// 在底层历史变更完成之后发出，携带 `{type, data, url}`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationEvent {
    /// 事件 ID（UUID）
    pub event_id: String,

    /// 导航类型
    #[serde(rename = "type")]
    pub nav_type: NavigationType,

    /// 随导航保存的状态数据
    pub data: Value,

    /// 导航后的完整地址
    pub url: String,

    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl NavigationEvent {
    /// 创建导航事件
    pub fn new(nav_type: NavigationType, data: Value, url: impl Into<String>) -> Self {
        Self {
            event_id: generate_uuid(),
            nav_type,
            data,
            url: url.into(),
            timestamp: Utc::now(),
        }
    }
}

/// 当前地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    url: Url,
}

impl Location {
    /// 解析地址，相对地址基于 [`DEFAULT_ORIGIN`]
    pub fn parse(input: &str) -> Result<Self> {
        let base = Url::parse(DEFAULT_ORIGIN)?;
        Ok(Self {
            url: base.join(input)?,
        })
    }

    /// 基于当前地址解析新地址
    pub fn join(&self, input: &str) -> Result<Self> {
        Ok(Self {
            url: self.url.join(input)?,
        })
    }

    /// 路径部分
    pub fn pathname(&self) -> &str {
        self.url.path()
    }

    /// 查询串（不含 `?`）
    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// 片段（不含 `#`）
    pub fn fragment(&self) -> Option<&str> {
        self.url.fragment()
    }

    /// 完整地址
    pub fn href(&self) -> &str {
        self.url.as_str()
    }
}

impl Default for Location {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_ORIGIN).unwrap_or_else(|_| unreachable!("常量基准地址有效")),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.href())
    }
}

/// 历史条目
#[derive(Debug, Clone)]
struct HistoryEntry {
    location: Location,
    data: Value,
}

/// 内存历史栈
#[derive(Debug, Clone)]
struct History {
    entries: Vec<HistoryEntry>,
    index: usize,
}

impl History {
    fn new(location: Location) -> Self {
        Self {
            entries: vec![HistoryEntry {
                location,
                data: Value::Null,
            }],
            index: 0,
        }
    }

    fn current(&self) -> &HistoryEntry {
        &self.entries[self.index]
    }

    fn push(&mut self, entry: HistoryEntry) {
        self.entries.truncate(self.index + 1);
        self.entries.push(entry);
        self.index = self.entries.len() - 1;
    }

    fn replace(&mut self, entry: HistoryEntry) {
        self.entries[self.index] = entry;
    }

    /// 移动游标，越界返回 false
    fn traverse(&mut self, delta: i64) -> bool {
        let Some(target) = (self.index as i64).checked_add(delta) else {
            return false;
        };
        if target < 0 || target >= self.entries.len() as i64 {
            return false;
        }
        self.index = target as usize;
        true
    }
}

/// 导航回调函数类型
pub type NavigationCallback = Arc<dyn Fn(&NavigationEvent) + Send + Sync>;

struct NotifierInner {
    history: RwLock<History>,
    subscribers: RwLock<Vec<(String, NavigationCallback)>>,
}

/// 导航通知器
///
/// 克隆开销很小，所有克隆共享同一份历史与订阅表。
#[derive(Clone)]
pub struct NavigationNotifier {
    inner: Arc<NotifierInner>,
}

static GLOBAL_NOTIFIER: OnceLock<NavigationNotifier> = OnceLock::new();

impl NavigationNotifier {
    /// 创建独立的通知器，初始地址为 `/`
    pub fn new() -> Self {
        Self::with_location(Location::default())
    }

    /// 以指定初始地址创建通知器
    pub fn with_initial_url(url: &str) -> Result<Self> {
        Ok(Self::with_location(Location::parse(url)?))
    }

    fn with_location(location: Location) -> Self {
        Self {
            inner: Arc::new(NotifierInner {
                history: RwLock::new(History::new(location)),
                subscribers: RwLock::new(Vec::new()),
            }),
        }
    }

    /// 安装进程级通知器
    ///
    /// 多次调用返回同一个实例。
    pub fn install() -> NavigationNotifier {
        GLOBAL_NOTIFIER
            .get_or_init(|| {
                info!("安装全局导航通知器");
                NavigationNotifier::new()
            })
            .clone()
    }

    /// 已安装的进程级通知器
    pub fn global() -> Option<NavigationNotifier> {
        GLOBAL_NOTIFIER.get().cloned()
    }

    /// 两个句柄是否指向同一个通知器
    pub fn ptr_eq(&self, other: &NavigationNotifier) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ==================== 查询 ====================

    /// 当前地址
    pub fn location(&self) -> Location {
        self.history().current().location.clone()
    }

    /// 当前 pathname
    pub fn pathname(&self) -> String {
        self.history().current().location.pathname().to_string()
    }

    /// 当前历史条目的状态数据
    pub fn state(&self) -> Value {
        self.history().current().data.clone()
    }

    /// 历史栈长度
    pub fn history_len(&self) -> usize {
        self.history().entries.len()
    }

    /// 订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.subscribers().len()
    }

    // ==================== 订阅 ====================

    /// 订阅导航事件，返回订阅 ID
    pub fn subscribe(&self, callback: NavigationCallback) -> String {
        let id = generate_subscription_id();
        self.subscribers_mut().push((id.clone(), callback));
        debug!(subscription_id = %id, "导航订阅成功");
        id
    }

    /// 取消订阅
    pub fn unsubscribe(&self, subscription_id: &str) -> Result<()> {
        let mut subscribers = self.subscribers_mut();
        let before = subscribers.len();
        subscribers.retain(|(id, _)| id != subscription_id);
        if subscribers.len() == before {
            return Err(RouteError::SubscriptionNotFound(subscription_id.to_string()));
        }
        debug!(subscription_id = %subscription_id, "导航订阅已取消");
        Ok(())
    }

    /// 移除全部订阅
    pub fn shutdown(&self) {
        let count = {
            let mut subscribers = self.subscribers_mut();
            let count = subscribers.len();
            subscribers.clear();
            count
        };
        info!(subscribers = count, "导航通知器已关闭");
    }

    // ==================== 导航操作 ====================

    /// 压入新地址
    pub fn push(&self, url: &str, data: Value) -> Result<()> {
        let event = {
            let mut history = self.history_mut();
            let location = history.current().location.join(url)?;
            let event = NavigationEvent::new(NavigationType::Push, data.clone(), location.href());
            history.push(HistoryEntry { location, data });
            event
        };
        self.notify(event);
        Ok(())
    }

    /// 替换当前地址
    pub fn replace(&self, url: &str, data: Value) -> Result<()> {
        let event = {
            let mut history = self.history_mut();
            let location = history.current().location.join(url)?;
            let event =
                NavigationEvent::new(NavigationType::Replace, data.clone(), location.href());
            history.replace(HistoryEntry { location, data });
            event
        };
        self.notify(event);
        Ok(())
    }

    /// 后退一步，已在栈底时不做任何事
    pub fn back(&self) {
        self.traverse(-1, NavigationType::Back);
    }

    /// 前进一步，已在栈顶时不做任何事
    pub fn forward(&self) {
        self.traverse(1, NavigationType::Forward);
    }

    /// 按偏移量移动，`go(0)` 原地重新通知
    pub fn go(&self, delta: i64) {
        self.traverse(delta, NavigationType::Go);
    }

    /// 原生前进后退（用户操作浏览器按钮）
    pub fn pop_state(&self, delta: i64) {
        let nav_type = if delta < 0 {
            NavigationType::Back
        } else {
            NavigationType::Forward
        };
        self.traverse(delta, nav_type);
    }

    /// 跟随链接：以空状态压入 href
    pub fn follow_link(&self, href: &str) -> Result<()> {
        trace!(href = %href, "拦截链接点击");
        self.push(href, Value::Object(Default::default()))
    }

    fn traverse(&self, delta: i64, nav_type: NavigationType) {
        let event = {
            let mut history = self.history_mut();
            if !history.traverse(delta) {
                debug!(delta, "历史游标越界，忽略导航");
                return;
            }
            let entry = history.current();
            NavigationEvent::new(nav_type, entry.data.clone(), entry.location.href())
        };
        self.notify(event);
    }

    /// 按订阅顺序分发，回调在锁外执行
    fn notify(&self, event: NavigationEvent) {
        let snapshot: Vec<NavigationCallback> = self
            .subscribers()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        debug!(
            navigation = %event.nav_type,
            url = %event.url,
            subscribers = snapshot.len(),
            "分发导航事件"
        );

        for callback in snapshot {
            callback(&event);
        }
    }

    // 锁中毒只会发生在回调外的短临界区，直接恢复内部数据

    fn history(&self) -> RwLockReadGuard<'_, History> {
        self.inner
            .history
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn history_mut(&self) -> RwLockWriteGuard<'_, History> {
        self.inner
            .history
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn subscribers(&self) -> RwLockReadGuard<'_, Vec<(String, NavigationCallback)>> {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn subscribers_mut(&self) -> RwLockWriteGuard<'_, Vec<(String, NavigationCallback)>> {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for NavigationNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NavigationNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationNotifier")
            .field("location", &self.location().href().to_string())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
