//! 路由事件
//!
//! 节点激活状态、完全匹配状态以及容器状态变化时发出的事件。
//! 所有事件都会冒泡：先交给目标元素上的监听器，再沿祖先链逐级向上直到根。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::element::container::ContainerStatus;
use crate::element::tree::ElementId;
use crate::utils::{generate_subscription_id, Result, RouteError};

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "kebab-case")]
pub enum RouteEventKind {
    /// 节点激活状态变化
    ActiveChanged(bool),
    /// 节点完全匹配状态变化
    ExactMatchChanged(bool),
    /// 容器状态变化
    ContainerStatusChanged(ContainerStatus),
}

impl RouteEventKind {
    /// 事件名
    pub fn name(&self) -> &'static str {
        match self {
            RouteEventKind::ActiveChanged(_) => "active-change",
            RouteEventKind::ExactMatchChanged(_) => "exact-match-change",
            RouteEventKind::ContainerStatusChanged(_) => "status-change",
        }
    }
}

/// 路由事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEvent {
    /// 事件类型与载荷
    pub kind: RouteEventKind,

    /// 发出事件的元素
    pub target: ElementId,

    /// 目标节点的完整路径（容器事件为其 root path）
    pub path: String,

    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl RouteEvent {
    /// 创建事件
    pub fn new(kind: RouteEventKind, target: ElementId, path: impl Into<String>) -> Self {
        Self {
            kind,
            target,
            path: path.into(),
            timestamp: Utc::now(),
        }
    }
}

/// 事件监听函数
///
/// 第二个参数是当前正在处理事件的元素（冒泡路径上的某一级）。
pub type RouteEventListener = Arc<dyn Fn(&RouteEvent, ElementId) + Send + Sync>;

/// 冒泡事件分发器
#[derive(Default)]
pub struct EventDispatcher {
    listeners: HashMap<ElementId, Vec<(String, RouteEventListener)>>,
}

impl EventDispatcher {
    /// 创建分发器
    pub fn new() -> Self {
        Self::default()
    }

    /// 在元素上添加监听器，返回监听 ID
    pub fn add_listener(&mut self, element: ElementId, listener: RouteEventListener) -> String {
        let id = generate_subscription_id();
        self.listeners
            .entry(element)
            .or_default()
            .push((id.clone(), listener));
        trace!(element = %element, listener_id = %id, "添加事件监听器");
        id
    }

    /// 移除监听器
    pub fn remove_listener(&mut self, listener_id: &str) -> Result<()> {
        for entries in self.listeners.values_mut() {
            if let Some(pos) = entries.iter().position(|(id, _)| id == listener_id) {
                entries.remove(pos);
                return Ok(());
            }
        }
        Err(RouteError::SubscriptionNotFound(listener_id.to_string()))
    }

    /// 移除元素上的全部监听器（元素被移除时调用）
    pub fn remove_element(&mut self, element: ElementId) {
        self.listeners.remove(&element);
    }

    /// 元素上的监听器数量
    pub fn listener_count(&self, element: ElementId) -> usize {
        self.listeners.get(&element).map(Vec::len).unwrap_or(0)
    }

    /// 沿冒泡路径分发
    ///
    /// `bubble_path` 以目标元素开头，依次是它的祖先。
    /// 监听器先被收集再调用，回调中不持有分发器。
    pub fn dispatch(&self, event: &RouteEvent, bubble_path: &[ElementId]) -> usize {
        let calls: Vec<(ElementId, RouteEventListener)> = bubble_path
            .iter()
            .flat_map(|element| {
                self.listeners
                    .get(element)
                    .into_iter()
                    .flatten()
                    .map(move |(_, listener)| (*element, Arc::clone(listener)))
            })
            .collect();

        debug!(
            event = event.kind.name(),
            target = %event.target,
            path = %event.path,
            listeners = calls.len(),
            "分发路由事件"
        );

        for (current, listener) in &calls {
            listener(event, *current);
        }
        calls.len()
    }
}
