//! 元素层
//!
//! 路由节点与路由容器的数据模型及其组成部分：
//! - 元素树
//! - 声明式属性
//! - 可观察字段
//! - 资源加载
//! - 渲染调度
//! - 缓存回收计时器

pub mod attributes;
pub mod container;
pub mod eviction;
pub mod loader;
pub mod observable;
pub mod render;
pub mod route;
pub mod tree;

pub use attributes::{AppendDirection, ContainerAttributes, CssSources, CustomRender, RouteAttributes};
pub use container::{ContainerStatus, NotFoundContent, RouteContainer};
pub use eviction::{DeactivationAction, EvictionState, EvictionTimer};
pub use loader::{
    AssetLoader, ComponentLoader, ComponentModule, FsStyleFetcher, LoadState, RenderFn,
    StaticComponentLoader, StaticStyleFetcher, StyleFetcher, TeardownFn,
};
pub use observable::{ChangePolicy, Observable};
pub use render::{decide, Fragment, MountPoint, RenderInputs, RenderOutcome, RenderRoot, StyleSheet};
pub use route::{ErrorRenderFn, RouteNode, RouteSnapshot};
pub use tree::{ElementId, ElementKind, ElementTree};
