//! API 模块
//!
//! 对外提供路由宿主 [`RouteHost`]：元素树的增删、属性修改、事件监听，
//! 以及驱动整个生命周期的任务循环。
//!
//! # 示例
//!
//! ```rust,no_run
//! use native_route::api::RouteHost;
//! use native_route::core::RouteTreeConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let tree = RouteTreeConfig::from_file("routes.yaml").await?;
//!     let mut host = RouteHost::builder().build();
//!     host.mount_declaration(&tree)?;
//!     host.replay(&tree.navigation).await?;
//!     println!("{}", serde_json::to_string_pretty(&host.snapshot())?);
//!     Ok(())
//! }
//! ```

pub mod host;

// 重导出主要类型
pub use host::{ContainerSnapshot, HostSnapshot, RouteHost, RouteHostBuilder};
