//! 可观察字段
//!
//! 节点的派生状态以可观察字段保存，每个字段声明自己的变更策略：
//! - `Notify`：值变化时记录一次变更，驱动后续的渲染与副作用
//! - `Silent`：静默更新，从不产生变更（完整路径、样式内容等）
//!
//! 变更记录保存在 [`ChangeSet`] 中，由宿主在一次刷新中统一消费，
//! 同时拿到变更前的旧值。

/// 变更策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangePolicy {
    Notify,
    Silent,
}

/// 可观察字段
#[derive(Debug, Clone)]
pub struct Observable<T> {
    value: T,
    policy: ChangePolicy,
}

impl<T: Clone + PartialEq> Observable<T> {
    /// 值变化时通知
    pub fn notify(value: T) -> Self {
        Self {
            value,
            policy: ChangePolicy::Notify,
        }
    }

    /// 静默字段
    pub fn silent(value: T) -> Self {
        Self {
            value,
            policy: ChangePolicy::Silent,
        }
    }

    /// 当前值
    pub fn get(&self) -> &T {
        &self.value
    }

    /// 变更策略
    pub fn policy(&self) -> ChangePolicy {
        self.policy
    }

    /// 写入新值
    ///
    /// 仅当策略为 `Notify` 且值确实变化时返回旧值。
    pub fn set(&mut self, value: T) -> Option<T> {
        if self.value == value {
            return None;
        }
        let previous = std::mem::replace(&mut self.value, value);
        match self.policy {
            ChangePolicy::Notify => Some(previous),
            ChangePolicy::Silent => None,
        }
    }
}

impl<T: Copy> Observable<T> {
    /// 当前值（Copy 类型）
    pub fn value(&self) -> T {
        self.value
    }
}

/// 待处理的变更集合
///
/// 同一字段在一次刷新前多次变化时只保留最早的旧值。
#[derive(Debug, Clone)]
pub struct ChangeSet<C> {
    changes: Vec<C>,
}

impl<C> Default for ChangeSet<C> {
    fn default() -> Self {
        Self {
            changes: Vec::new(),
        }
    }
}

impl<C: ChangeKey> ChangeSet<C> {
    /// 记录变更
    pub fn record(&mut self, change: C) {
        if !self.changes.iter().any(|c| c.key() == change.key()) {
            self.changes.push(change);
        }
    }

    /// 是否有待处理变更
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// 取出全部变更
    pub fn take(&mut self) -> Vec<C> {
        std::mem::take(&mut self.changes)
    }
}

/// 变更的字段键
pub trait ChangeKey {
    fn key(&self) -> &'static str;
}
