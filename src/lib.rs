//! # Native Route - 声明式客户端路由
//!
//! 以元素树描述路由：每个路由节点声明一个路径模式，根据当前地址判定自身是否
//! 激活、是否精确匹配，并管理与之关联的组件模块、样式和渲染输出。
//!
//! - **路径匹配**: 完整路径由祖先节点拼接而成，支持正则分段和分组匹配
//! - **导航通知**: 进程内的历史记录与订阅者广播
//! - **资源加载**: 按需加载组件模块与样式，支持最短加载展示时间
//! - **渲染调度**: 空 / 错误 / 加载中 / 内容四种输出，样式隔离
//! - **缓存回收**: 失活后延迟卸载自定义渲染的组件实例
//! - **路由容器**: 汇总后代匹配结果，提供 NotFound 兜底
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use native_route::{CoreConfig, RouteAttributes, RouteHost};
//!
//! #[tokio::main]
//! async fn main() -> native_route::Result<()> {
//!     let config = CoreConfig::default();
//!     let mut host = RouteHost::builder().config(config.router).build();
//!
//!     let root = host.tree().root();
//!     let parent = host.append_route(root, RouteAttributes::new("/root"))?;
//!     let child = host.append_route(parent, RouteAttributes::new("hello"))?;
//!
//!     host.navigate("/root/hello")?;
//!     host.run_until_idle().await?;
//!     assert!(host.route(child)?.is_exact());
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `router` - 路径解析、匹配、导航通知、事件与任务队列
//! - `element` - 元素树、路由节点、容器、加载与渲染
//! - `utils` - 工具函数和错误类型
//! - `core` - 配置与路由树声明
//! - `api` - 路由宿主

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod api;
pub mod core;
pub mod element;
pub mod router;
pub mod utils;

// 重导出常用类型，方便使用
pub use router::{
    MatchOutcome, MatchSegment, NavigationEvent, NavigationNotifier, NavigationType, RouteEvent,
    RouteEventKind, RouteMatcher,
};

pub use element::{
    ComponentModule, ContainerAttributes, ContainerStatus, CustomRender, ElementId, LoadState,
    NotFoundContent, RouteAttributes, StaticComponentLoader, StaticStyleFetcher,
};

pub use utils::{error_code, generate_id, generate_uuid, Result, RouteError};
pub use utils::logger::{LogGuard, Logger, LoggerConfig, LoggerConfigBuilder, RotationStrategy};

pub use crate::core::config::{CoreConfig, CoreConfigBuilder, LogConfig, RouterConfig};
pub use crate::core::declaration::{NavigationStep, RouteDecl, RouteTreeConfig};
pub use api::{HostSnapshot, RouteHost, RouteHostBuilder};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
