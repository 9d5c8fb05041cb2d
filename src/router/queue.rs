//! 宿主任务队列
//!
//! 单线程协作式执行模型中唯一的任务队列：严格 FIFO，
//! 导航通知、异步加载完成、计时器到期都以 [`HostTask`] 的形式回到这里，
//! 由宿主逐个处理。处理一个任务期间不会重入处理下一个任务。
//!
//! 异步边界（模块加载、样式获取、样式解析轮询、计时器）由
//! [`TaskSender`] 派生为 tokio 任务，完成后把结果投递回队列。

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::element::loader::ComponentModule;
use crate::element::tree::ElementId;
use crate::router::navigation::NavigationEvent;
use crate::utils::{Result, RouteError};

/// 宿主任务
pub enum HostTask {
    /// 元素收到导航通知
    Navigate {
        element: ElementId,
        event: NavigationEvent,
    },

    /// 容器在后代节点完成判定之后汇总状态
    SettleContainer { element: ElementId },

    /// 模块加载完成
    ModuleLoaded {
        element: ElementId,
        generation: u64,
        result: Result<Arc<ComponentModule>>,
        started: Instant,
    },

    /// 模块在最短加载展示时间之后就绪
    ModuleReady {
        element: ElementId,
        generation: u64,
        module: Arc<ComponentModule>,
    },

    /// 样式内容获取完成
    StylesFetched {
        element: ElementId,
        generation: u64,
        result: Result<String>,
    },

    /// 样式解析轮询结束
    StyleParsed {
        element: ElementId,
        generation: u64,
        result: Result<bool>,
    },

    /// 回收计时器到期
    EvictionFired { element: ElementId, generation: u64 },
}

impl HostTask {
    /// 任务名（日志用）
    pub fn name(&self) -> &'static str {
        match self {
            HostTask::Navigate { .. } => "navigate",
            HostTask::SettleContainer { .. } => "settle-container",
            HostTask::ModuleLoaded { .. } => "module-loaded",
            HostTask::ModuleReady { .. } => "module-ready",
            HostTask::StylesFetched { .. } => "styles-fetched",
            HostTask::StyleParsed { .. } => "style-parsed",
            HostTask::EvictionFired { .. } => "eviction-fired",
        }
    }

    /// 任务所属元素
    pub fn element(&self) -> ElementId {
        match self {
            HostTask::Navigate { element, .. }
            | HostTask::SettleContainer { element }
            | HostTask::ModuleLoaded { element, .. }
            | HostTask::ModuleReady { element, .. }
            | HostTask::StylesFetched { element, .. }
            | HostTask::StyleParsed { element, .. }
            | HostTask::EvictionFired { element, .. } => *element,
        }
    }
}

impl fmt::Debug for HostTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostTask")
            .field("name", &self.name())
            .field("element", &self.element())
            .finish()
    }
}

/// 队列项
#[derive(Debug)]
pub struct QueueItem {
    /// 任务
    pub task: HostTask,

    /// 入队序号
    pub sequence: u64,

    /// 入队时间
    pub enqueued_at: Instant,
}

/// 队列统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// 累计入队数
    pub enqueued: u64,

    /// 仍在进行中的异步操作数（不含计时器）
    pub in_flight: usize,
}

struct QueueShared {
    sequence: AtomicU64,
    in_flight: AtomicUsize,
}

/// 任务发送端
///
/// 可克隆，导航回调与派生出的异步任务都通过它把工作投递回队列。
#[derive(Clone)]
pub struct TaskSender {
    tx: mpsc::UnboundedSender<QueueItem>,
    shared: Arc<QueueShared>,
}

impl TaskSender {
    /// 投递任务
    pub fn send(&self, task: HostTask) -> Result<()> {
        let sequence = self.shared.sequence.fetch_add(1, Ordering::SeqCst);
        trace!(task = task.name(), element = %task.element(), sequence, "任务入队");
        self.tx
            .send(QueueItem {
                task,
                sequence,
                enqueued_at: Instant::now(),
            })
            .map_err(|_| RouteError::HostClosed)
    }

    /// 派生一个异步操作，完成后把产出的任务投递回队列
    ///
    /// 进行中的操作会计入 `in_flight`，宿主据此判断是否已经空闲。
    pub fn spawn<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = HostTask> + Send + 'static,
    {
        self.shared.in_flight.fetch_add(1, Ordering::SeqCst);
        let sender = self.clone();
        tokio::spawn(async move {
            let task = future.await;
            // 先入队再减计数，宿主不会在两者之间误判为空闲
            let _ = sender.send(task);
            sender.shared.in_flight.fetch_sub(1, Ordering::SeqCst);
        })
    }

    /// 派生一个计时器任务，不计入 `in_flight`
    pub fn spawn_timer<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = HostTask> + Send + 'static,
    {
        let sender = self.clone();
        tokio::spawn(async move {
            let task = future.await;
            let _ = sender.send(task);
        })
    }

    /// 进行中的异步操作数
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }
}

/// 宿主任务队列
pub struct TaskQueue {
    rx: mpsc::UnboundedReceiver<QueueItem>,
    sender: TaskSender,
}

impl TaskQueue {
    /// 创建队列
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            sender: TaskSender {
                tx,
                shared: Arc::new(QueueShared {
                    sequence: AtomicU64::new(0),
                    in_flight: AtomicUsize::new(0),
                }),
            },
        }
    }

    /// 获取发送端
    pub fn sender(&self) -> TaskSender {
        self.sender.clone()
    }

    /// 非阻塞取出下一个任务
    pub fn try_next(&mut self) -> Option<QueueItem> {
        self.rx.try_recv().ok()
    }

    /// 等待下一个任务
    ///
    /// 队列自身持有一个发送端，因此只要队列存在就不会返回 None。
    pub async fn next(&mut self) -> Option<QueueItem> {
        self.rx.recv().await
    }

    /// 统计信息
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            enqueued: self.sender.shared.sequence.load(Ordering::SeqCst),
            in_flight: self.sender.in_flight(),
        }
    }

    /// 队列为空且没有进行中的异步操作
    pub fn is_idle(&self) -> bool {
        self.rx.is_empty() && self.sender.in_flight() == 0
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}
