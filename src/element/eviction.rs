//! 缓存回收计时器
//!
//! 节点失活后，若启用了自定义渲染、未设置 `drop` 且模块已就绪，
//! 则为其启动一个计时器；计时结束仍未重新激活时调用模块的卸载导出，
//! 并把实例标记为已回收，下一次激活会强制重新渲染。
//!
//! 状态机：
//!
//! ```text
//! Idle --失活--> Armed --到期--> Fired
//!   ^              |
//!   +----重新激活---+
//! ```
//!
//! 每个节点任一时刻最多只有一个计时器；重新启动前总是先取消旧计时器。
//! 计时器任务只负责把 [`HostTask::EvictionFired`] 投递回宿主队列，
//! 携带的代号用来识别已经被取消的过期通知。

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::element::tree::ElementId;
use crate::router::queue::{HostTask, TaskSender};

/// 计时器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionState {
    #[default]
    Idle,
    Armed,
    Fired,
}

/// 失活时应采取的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivationAction {
    /// 什么都不做
    None,
    /// 启动回收计时器
    Arm,
    /// 立即卸载（drop 模式）
    TeardownNow,
}

/// 根据节点配置决定失活动作
pub fn deactivation_action(
    custom_render: bool,
    drop: bool,
    module_ready: bool,
) -> DeactivationAction {
    if !custom_render || !module_ready {
        return DeactivationAction::None;
    }
    if drop {
        DeactivationAction::TeardownNow
    } else {
        DeactivationAction::Arm
    }
}

/// 回收计时器
#[derive(Debug, Default)]
pub struct EvictionTimer {
    state: EvictionState,
    generation: u64,
    handle: Option<JoinHandle<()>>,
    armed_count: u64,
}

impl EvictionTimer {
    /// 创建空闲计时器
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前状态
    pub fn state(&self) -> EvictionState {
        self.state
    }

    /// 是否已启动
    pub fn is_armed(&self) -> bool {
        self.state == EvictionState::Armed
    }

    /// 累计启动次数
    pub fn armed_count(&self) -> u64 {
        self.armed_count
    }

    /// 启动计时器，已启动时先取消旧计时器
    pub fn arm(&mut self, element: ElementId, after: Duration, sender: &TaskSender) {
        self.cancel();

        self.generation += 1;
        self.armed_count += 1;
        let generation = self.generation;
        self.handle = Some(sender.spawn_timer(async move {
            tokio::time::sleep(after).await;
            HostTask::EvictionFired {
                element,
                generation,
            }
        }));
        self.state = EvictionState::Armed;
        debug!(element = %element, after_ms = after.as_millis() as u64, generation, "启动回收计时器");
    }

    /// 取消计时器，返回是否确实取消了一个已启动的计时器
    pub fn cancel(&mut self) -> bool {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        if self.state == EvictionState::Armed {
            // 代号前移，已经在队列里的到期通知随之失效
            self.generation += 1;
            self.state = EvictionState::Idle;
            trace!("取消回收计时器");
            return true;
        }
        false
    }

    /// 处理到期通知，代号匹配且仍处于 Armed 时转为 Fired 并返回 true
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.state != EvictionState::Armed || generation != self.generation {
            trace!(generation, current = self.generation, "忽略过期的回收通知");
            return false;
        }
        self.handle = None;
        self.state = EvictionState::Fired;
        true
    }

    /// 回到空闲（重新激活并完成渲染后调用）
    pub fn reset(&mut self) {
        self.cancel();
        self.state = EvictionState::Idle;
    }
}

impl Drop for EvictionTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
