//! 核心模块
//!
//! 包含内核配置与路由树声明。

pub mod config;
pub mod declaration;

pub use config::{CoreConfig, CoreConfigBuilder, LogConfig, RouterConfig};
pub use declaration::{NavigationStep, RouteDecl, RouteTreeConfig};
