//! 路由模块
//!
//! 包含路由匹配与导航的核心组件：
//! - 路径解析
//! - 路径分组解析
//! - 匹配判定
//! - 导航通知服务
//! - 路由事件与冒泡分发
//! - 宿主任务队列

pub mod event;
pub mod group;
pub mod matcher;
pub mod navigation;
pub mod path;
pub mod queue;

// 重导出常用类型
pub use event::{EventDispatcher, RouteEvent, RouteEventKind, RouteEventListener};
pub use group::{parse_groups, MatchSegment, ParsedPath};
pub use matcher::{MatchOutcome, RouteMatcher};
pub use navigation::{
    Location, NavigationCallback, NavigationEvent, NavigationNotifier, NavigationType,
};
pub use path::{normalize, resolve_full_path, Ancestry};
pub use queue::{HostTask, QueueItem, QueueStats, TaskQueue, TaskSender};
