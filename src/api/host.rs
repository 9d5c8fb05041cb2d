//! 路由宿主
//!
//! [`RouteHost`] 持有元素树、全部路由节点与容器，并从单一的 FIFO 任务队列
//! 驱动它们的生命周期：
//!
//! 1. 导航通知到达 → 每个节点同步重新判定 `active` / `exact`
//! 2. 状态变化 → 先提交渲染，再依次处理变更（加载资源、自定义渲染、
//!    启动或取消回收计时器），直到节点不再产生新的变更
//! 3. 异步加载与计时器完成后以任务形式回到队列，继续上述流程
//!
//! 处理一个任务期间不会处理下一个任务；回调内发起的导航也只会入队。
//!
//! # 示例
//!
//! ```rust,no_run
//! use native_route::api::RouteHost;
//! use native_route::element::RouteAttributes;
//! use native_route::CoreConfig;
//!
//! #[tokio::main]
//! async fn main() -> native_route::Result<()> {
//!     let config = CoreConfig::builder().isolated_notifier().build();
//!     let mut host = RouteHost::builder().config(config.router).build();
//!
//!     let root = host.tree().root();
//!     let about = host.append_route(root, RouteAttributes::new("/about"))?;
//!
//!     host.navigate("/about")?;
//!     host.run_until_idle().await?;
//!     assert!(host.route(about)?.is_active());
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::core::config::RouterConfig;
use crate::core::declaration::{NavigationStep, RouteDecl, RouteTreeConfig};
use crate::element::attributes::{ContainerAttributes, RouteAttributes};
use crate::element::container::{any_matched, ContainerStatus, MatchSnapshot, NotFoundContent, RouteContainer};
use crate::element::eviction::{deactivation_action, DeactivationAction};
use crate::element::loader::{
    fetch_styles, wait_for_stylesheet, AssetLoader, ComponentLoader, ComponentModule, LoadState,
    StyleFetcher,
};
use crate::element::route::{ErrorRenderFn, NodeChange, RouteNode, RouteSnapshot};
use crate::element::tree::{ElementId, ElementTree};
use crate::router::event::{EventDispatcher, RouteEvent, RouteEventKind, RouteEventListener};
use crate::router::navigation::{Location, NavigationEvent, NavigationNotifier};
use crate::router::path::resolve_full_path;
use crate::router::queue::{HostTask, TaskQueue, TaskSender};
use crate::utils::{Result, RouteError};

/// 单个节点一次刷新中处理变更的最大轮数
const MAX_FLUSH_ROUNDS: usize = 16;

/// 容器状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSnapshot {
    /// 容器元素
    pub element: ElementId,
    /// 作用域根路径
    pub root_path: String,
    /// 当前地址是否在作用域内
    pub active: bool,
    /// 容器状态
    pub status: ContainerStatus,
    /// NotFound 时的兜底内容
    pub fallback: Option<String>,
}

/// 宿主快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostSnapshot {
    /// 当前地址路径
    pub pathname: String,
    /// 全部路由节点（文档顺序）
    pub routes: Vec<RouteSnapshot>,
    /// 全部容器（文档顺序）
    pub containers: Vec<ContainerSnapshot>,
}

// ============================================================================
// 构建器
// ============================================================================

/// 宿主构建器
#[derive(Default)]
pub struct RouteHostBuilder {
    config: RouterConfig,
    notifier: Option<NavigationNotifier>,
    components: Option<Arc<dyn ComponentLoader>>,
    styles: Option<Arc<dyn StyleFetcher>>,
}

impl RouteHostBuilder {
    /// 路由配置
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// 指定导航通知器
    pub fn notifier(mut self, notifier: NavigationNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 组件加载器
    pub fn component_loader(mut self, loader: Arc<dyn ComponentLoader>) -> Self {
        self.components = Some(loader);
        self
    }

    /// 样式获取器
    pub fn style_fetcher(mut self, fetcher: Arc<dyn StyleFetcher>) -> Self {
        self.styles = Some(fetcher);
        self
    }

    /// 构建宿主
    pub fn build(self) -> RouteHost {
        let notifier = match self.notifier {
            Some(notifier) => notifier,
            None if self.config.install_global_notifier => NavigationNotifier::install(),
            None => NavigationNotifier::new(),
        };
        let defaults = AssetLoader::default();
        let loader = AssetLoader::new(
            self.components.unwrap_or_else(|| defaults.components()),
            self.styles.unwrap_or_else(|| defaults.styles()),
        );
        RouteHost::new(self.config, notifier, loader)
    }
}

// ============================================================================
// 宿主
// ============================================================================

/// 路由宿主
pub struct RouteHost {
    config: RouterConfig,
    tree: ElementTree,
    routes: HashMap<ElementId, RouteNode>,
    containers: HashMap<ElementId, RouteContainer>,
    notifier: NavigationNotifier,
    loader: AssetLoader,
    queue: TaskQueue,
    sender: TaskSender,
    events: EventDispatcher,
}

impl RouteHost {
    /// 创建构建器
    pub fn builder() -> RouteHostBuilder {
        RouteHostBuilder::default()
    }

    fn new(config: RouterConfig, notifier: NavigationNotifier, loader: AssetLoader) -> Self {
        info!(
            cache_valid_ms = config.default_cache_valid_ms,
            css_poll_interval_ms = config.css_poll_interval_ms,
            "创建路由宿主"
        );
        let queue = TaskQueue::new();
        let sender = queue.sender();
        Self {
            config,
            tree: ElementTree::new(),
            routes: HashMap::new(),
            containers: HashMap::new(),
            notifier,
            loader,
            queue,
            sender,
            events: EventDispatcher::new(),
        }
    }

    // ==================== 查询 ====================

    /// 路由配置
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// 元素树
    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    /// 导航通知器
    pub fn notifier(&self) -> &NavigationNotifier {
        &self.notifier
    }

    /// 路由节点
    pub fn route(&self, id: ElementId) -> Result<&RouteNode> {
        self.routes.get(&id).ok_or_else(|| self.kind_error(id, false))
    }

    /// 路由容器
    pub fn container(&self, id: ElementId) -> Result<&RouteContainer> {
        self.containers.get(&id).ok_or_else(|| self.kind_error(id, true))
    }

    fn kind_error(&self, id: ElementId, container: bool) -> RouteError {
        if !self.tree.contains(id) {
            RouteError::ElementNotFound(id.index())
        } else if container {
            RouteError::NotAContainer(id.index())
        } else {
            RouteError::NotARoute(id.index())
        }
    }

    /// 按文档顺序列出全部路由节点
    pub fn route_ids(&self) -> Vec<ElementId> {
        self.tree
            .descendants(self.tree.root())
            .into_iter()
            .filter(|id| self.routes.contains_key(id))
            .collect()
    }

    /// 按文档顺序列出全部容器
    pub fn container_ids(&self) -> Vec<ElementId> {
        self.tree
            .descendants(self.tree.root())
            .into_iter()
            .filter(|id| self.containers.contains_key(id))
            .collect()
    }

    /// 宿主快照
    pub fn snapshot(&self) -> HostSnapshot {
        HostSnapshot {
            pathname: self.notifier.pathname(),
            routes: self
                .route_ids()
                .into_iter()
                .filter_map(|id| self.routes.get(&id).map(RouteNode::snapshot))
                .collect(),
            containers: self
                .container_ids()
                .into_iter()
                .filter_map(|id| {
                    self.containers.get(&id).map(|c| ContainerSnapshot {
                        element: id,
                        root_path: c.root_path().to_string(),
                        active: c.is_active(),
                        status: c.status(),
                        fallback: c.fallback(),
                    })
                })
                .collect(),
        }
    }

    // ==================== 元素树操作 ====================

    /// 追加普通元素
    pub fn append_element(&mut self, parent: ElementId, tag: &str) -> Result<ElementId> {
        self.tree.insert_element(parent, tag)
    }

    /// 追加路由节点
    ///
    /// 插入后立即计算完整路径、订阅导航，非 lazy 节点立即开始加载资源，
    /// 然后对当前地址做一次判定。
    pub fn append_route(&mut self, parent: ElementId, attributes: RouteAttributes) -> Result<ElementId> {
        let id = self.tree.insert_route(parent, attributes.path.clone())?;

        let mut node = RouteNode::new(attributes);
        node.set_full_path(resolve_full_path(&node.attributes.path, id, &self.tree));
        node.subscription = Some(self.subscribe(id));
        debug!(element = %id, path = %node.full_path(), "路由节点已连接");

        let eager = !node.attributes.lazy && node.attributes.has_assets();
        self.routes.insert(id, node);

        if eager {
            self.load_assets(id);
        }

        let pathname = self.notifier.pathname();
        if let Some(node) = self.routes.get_mut(&id) {
            node.apply_location(&pathname);
        }
        self.flush(id)?;
        Ok(id)
    }

    /// 追加路由容器
    pub fn append_container(
        &mut self,
        parent: ElementId,
        attributes: ContainerAttributes,
    ) -> Result<ElementId> {
        let id = self.tree.insert_container(parent)?;

        let mut container = RouteContainer::new(attributes);
        container.set_subscription(Some(self.subscribe(id)));
        container.evaluate_scope(&self.notifier.pathname());
        debug!(element = %id, root_path = %container.root_path(), "路由容器已连接");
        self.containers.insert(id, container);

        // 同一批次中随后插入的路由节点也会计入汇总
        self.sender.send(HostTask::SettleContainer { element: id })?;
        Ok(id)
    }

    /// 按声明构建路由树，返回全部路由节点
    pub fn mount_declaration(&mut self, declaration: &RouteTreeConfig) -> Result<Vec<ElementId>> {
        let root = self.tree.root();
        let parent = match &declaration.container {
            Some(attributes) => self.append_container(root, attributes.clone())?,
            None => root,
        };

        let mut created = Vec::with_capacity(declaration.route_count());
        for decl in &declaration.routes {
            self.mount_decl(parent, decl, &mut created)?;
        }
        info!(routes = created.len(), "路由树声明已挂载");
        Ok(created)
    }

    fn mount_decl(
        &mut self,
        parent: ElementId,
        decl: &RouteDecl,
        created: &mut Vec<ElementId>,
    ) -> Result<()> {
        let id = self.append_route(parent, decl.attributes.clone())?;
        created.push(id);
        for child in &decl.children {
            self.mount_decl(id, child, created)?;
        }
        Ok(())
    }

    /// 移除元素及其子树
    ///
    /// 子树中的路由节点与容器取消导航订阅，回收计时器随节点一起取消。
    pub fn remove(&mut self, id: ElementId) -> Result<()> {
        let removed = self.tree.remove(id)?;
        for element in removed {
            self.events.remove_element(element);

            let subscription = if let Some(mut node) = self.routes.remove(&element) {
                node.eviction.cancel();
                debug!(element = %element, path = %node.full_path(), "路由节点已断开");
                node.subscription.take()
            } else if let Some(mut container) = self.containers.remove(&element) {
                let subscription = container.subscription().map(str::to_string);
                container.set_subscription(None);
                subscription
            } else {
                None
            };

            if let Some(subscription) = subscription {
                if let Err(e) = self.notifier.unsubscribe(&subscription) {
                    warn!(element = %element, error = %e, "取消导航订阅失败");
                }
            }
        }
        Ok(())
    }

    /// 设置错误渲染器
    pub fn set_error_render(&mut self, id: ElementId, render: ErrorRenderFn) -> Result<()> {
        self.route_mut(id)?.error_render = Some(render);
        self.flush(id)
    }

    /// 设置容器的兜底内容
    pub fn set_not_found_content(&mut self, id: ElementId, content: NotFoundContent) -> Result<()> {
        self.containers
            .get_mut(&id)
            .ok_or(RouteError::NotAContainer(id.index()))?
            .set_not_found(content);
        Ok(())
    }

    /// 设置或移除路由节点的属性
    ///
    /// 修改 path 会重新计算该节点及其所有后代路由节点的完整路径，
    /// 修改 exact / group-match-mode 会重建匹配器；随后按当前地址重新判定。
    pub fn set_route_attribute(&mut self, id: ElementId, name: &str, value: Option<&str>) -> Result<bool> {
        let recognized = self.route_mut(id)?.attributes.apply(name, value)?;
        if !recognized {
            trace!(element = %id, attribute = %name, "忽略未知属性");
            return Ok(false);
        }

        match name.to_ascii_lowercase().as_str() {
            "path" => {
                let path = self.route(id)?.attributes.path.clone();
                self.tree.set_route_path(id, path)?;
                let mut affected = vec![id];
                affected.extend(
                    self.tree
                        .descendants(id)
                        .into_iter()
                        .filter(|d| self.routes.contains_key(d)),
                );
                self.recompute_paths(&affected)
            }
            "exact" | "group-match-mode" | "groupmatchmode" => self.recompute_paths(&[id]),
            "disable-shadow" => {
                debug!(element = %id, "渲染根在连接时确定，disable-shadow 的修改不影响已连接节点");
                Ok(true)
            }
            "url" | "css-url" | "shadow-css-url" => {
                let node = self.route_mut(id)?;
                if name.eq_ignore_ascii_case("url") {
                    node.module_generation += 1;
                    node.module = None;
                    node.module_error = None;
                    node.render_error = None;
                    node.set_module_state(LoadState::Unloaded);
                } else {
                    node.style_generation += 1;
                    node.style_error = None;
                    node.set_css_content("");
                    node.set_style_state(LoadState::Unloaded);
                }
                if !node.attributes.lazy || node.is_active() {
                    self.load_assets(id);
                }
                self.flush(id).map(|_| true)
            }
            "custom-render" => {
                self.route_mut(id)?.render_error = None;
                self.flush(id)?;
                self.try_custom_render(id)?;
                Ok(true)
            }
            _ => self.flush(id).map(|_| true),
        }
    }

    fn recompute_paths(&mut self, affected: &[ElementId]) -> Result<bool> {
        let pathname = self.notifier.pathname();
        for element in affected {
            let declared = match self.routes.get(element) {
                Some(node) => node.attributes.path.clone(),
                None => continue,
            };
            let full_path = resolve_full_path(&declared, *element, &self.tree);
            if let Some(node) = self.routes.get_mut(element) {
                debug!(element = %element, path = %full_path, "重新计算完整路径");
                node.set_full_path(full_path);
                node.apply_location(&pathname);
            }
        }
        for element in affected {
            self.flush(*element)?;
        }
        Ok(true)
    }

    // ==================== 事件 ====================

    /// 在元素上添加路由事件监听器（接收自身及后代冒泡上来的事件）
    pub fn add_event_listener(&mut self, id: ElementId, listener: RouteEventListener) -> Result<String> {
        if !self.tree.contains(id) {
            return Err(RouteError::ElementNotFound(id.index()));
        }
        Ok(self.events.add_listener(id, listener))
    }

    /// 移除事件监听器
    pub fn remove_event_listener(&mut self, listener_id: &str) -> Result<()> {
        self.events.remove_listener(listener_id)
    }

    fn emit(&self, id: ElementId, kind: RouteEventKind, path: String) {
        let event = RouteEvent::new(kind, id, path);
        self.events.dispatch(&event, &self.tree.bubble_path(id));
    }

    // ==================== 导航与执行 ====================

    /// 压入新地址（等价于点击链接）
    pub fn navigate(&self, url: &str) -> Result<()> {
        self.notifier.push(url, Value::Null)
    }

    /// 处理队列中已有的全部任务，不等待异步操作
    pub fn process_pending(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Some(item) = self.queue.try_next() {
            self.handle(item.task)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// 处理任务直到队列为空且没有进行中的加载
    ///
    /// 回收计时器不计入，等待它们请使用 [`RouteHost::run_for`]。
    pub async fn run_until_idle(&mut self) -> Result<()> {
        loop {
            self.process_pending()?;
            if self.queue.is_idle() {
                return Ok(());
            }
            if let Some(item) = self.queue.next().await {
                self.handle(item.task)?;
            }
        }
    }

    /// 在给定时长内持续处理任务（包括到期的计时器）
    pub async fn run_for(&mut self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.process_pending()?;
            let item = tokio::select! {
                item = self.queue.next() => item,
                _ = tokio::time::sleep_until(deadline) => break,
            };
            if let Some(item) = item {
                self.handle(item.task)?;
            }
        }
        self.process_pending()?;
        Ok(())
    }

    /// 回放导航脚本，每一步之后处理到空闲
    pub async fn replay(&mut self, steps: &[NavigationStep]) -> Result<()> {
        for step in steps {
            debug!(step = ?step, "回放导航步骤");
            match step {
                NavigationStep::Push { url } => self.notifier.push(url, Value::Null)?,
                NavigationStep::Replace { url } => self.notifier.replace(url, Value::Null)?,
                NavigationStep::Back => self.notifier.back(),
                NavigationStep::Forward => self.notifier.forward(),
                NavigationStep::Go { delta } => self.notifier.go(*delta),
                NavigationStep::Wait { ms } => {
                    self.run_for(Duration::from_millis(*ms)).await?;
                    continue;
                }
            }
            self.run_until_idle().await?;
        }
        Ok(())
    }

    fn handle(&mut self, task: HostTask) -> Result<()> {
        let element = task.element();
        if !self.tree.contains(element) {
            trace!(task = task.name(), element = %element, "元素已移除，丢弃任务");
            return Ok(());
        }

        match task {
            HostTask::Navigate { element, event } => self.on_navigate(element, &event),
            HostTask::SettleContainer { element } => {
                self.settle_container(element);
                Ok(())
            }
            HostTask::ModuleLoaded {
                element,
                generation,
                result,
                started,
            } => self.on_module_loaded(element, generation, result, started),
            HostTask::ModuleReady {
                element,
                generation,
                module,
            } => {
                if let Some(node) = self.routes.get_mut(&element) {
                    if node.module_generation != generation {
                        trace!(
                            path = %node.full_path(),
                            url = %module.url(),
                            "模块地址已变更，丢弃过期模块"
                        );
                        return Ok(());
                    }
                    node.module = Some(module);
                    node.set_module_state(LoadState::Ready);
                }
                self.flush(element)
            }
            HostTask::StylesFetched {
                element,
                generation,
                result,
            } => self.on_styles_fetched(element, generation, result),
            HostTask::StyleParsed {
                element,
                generation,
                result,
            } => {
                if let Some(node) = self.routes.get_mut(&element) {
                    if node.style_generation != generation {
                        trace!(path = %node.full_path(), "样式地址已变更，丢弃过期解析结果");
                        return Ok(());
                    }
                    match result {
                        Ok(true) => node.set_style_state(LoadState::Ready),
                        Ok(false) => node.set_style_state(LoadState::Unloaded),
                        Err(e) => {
                            warn!(path = %node.full_path(), error = %e, "样式解析失败");
                            node.style_error = Some(e);
                            node.set_style_state(LoadState::Failed);
                        }
                    }
                }
                self.flush(element)
            }
            HostTask::EvictionFired {
                element,
                generation,
            } => {
                self.on_eviction_fired(element, generation);
                self.flush(element)
            }
        }
    }

    fn subscribe(&self, id: ElementId) -> String {
        let sender = self.sender.clone();
        self.notifier.subscribe(Arc::new(move |event: &NavigationEvent| {
            let task = HostTask::Navigate {
                element: id,
                event: event.clone(),
            };
            if sender.send(task).is_err() {
                trace!(element = %id, "宿主已关闭，忽略导航通知");
            }
        }))
    }

    fn on_navigate(&mut self, id: ElementId, event: &NavigationEvent) -> Result<()> {
        let location = Location::parse(&event.url)?;
        let pathname = location.pathname();

        if let Some(node) = self.routes.get_mut(&id) {
            let outcome = node.apply_location(pathname);
            trace!(
                path = %node.full_path(),
                navigation = %event.nav_type,
                active = outcome.active,
                exact = outcome.exact,
                "路由判定"
            );
            return self.flush(id);
        }

        if let Some(container) = self.containers.get_mut(&id) {
            let changed = container.evaluate_scope(pathname);
            let (status, root_path) = (container.status(), container.root_path().to_string());
            if changed {
                self.emit(id, RouteEventKind::ContainerStatusChanged(status), root_path);
            }
            if self.containers.get(&id).map(RouteContainer::is_active).unwrap_or(false) {
                // 排在本次导航的所有节点判定之后
                self.sender.send(HostTask::SettleContainer { element: id })?;
            }
        }
        Ok(())
    }

    fn settle_container(&mut self, id: ElementId) {
        let matched = any_matched(self.tree.descendants(id).into_iter().filter_map(|d| {
            self.routes.get(&d).map(|node| MatchSnapshot {
                active: node.is_active(),
                exact: node.is_exact(),
                virtual_node: node.attributes.virtual_node,
            })
        }));

        if let Some(container) = self.containers.get_mut(&id) {
            if container.settle(matched) {
                let (status, root_path) = (container.status(), container.root_path().to_string());
                info!(element = %id, path = %root_path, status = %status, "容器状态已更新");
                self.emit(id, RouteEventKind::ContainerStatusChanged(status), root_path);
            }
        }
    }

    // ==================== 刷新与反应 ====================

    fn route_mut(&mut self, id: ElementId) -> Result<&mut RouteNode> {
        if !self.routes.contains_key(&id) {
            return Err(self.kind_error(id, false));
        }
        self.routes.get_mut(&id).ok_or(RouteError::NotARoute(id.index()))
    }

    /// 提交渲染并处理变更，直到节点稳定
    fn flush(&mut self, id: ElementId) -> Result<()> {
        for _ in 0..MAX_FLUSH_ROUNDS {
            let changes = match self.routes.get_mut(&id) {
                Some(node) => {
                    node.commit_render();
                    node.take_changes()
                }
                None => return Ok(()),
            };
            if changes.is_empty() {
                return Ok(());
            }
            for change in changes {
                self.react(id, change)?;
            }
        }
        warn!(element = %id, "节点在刷新轮数上限内仍未稳定");
        Ok(())
    }

    fn react(&mut self, id: ElementId, change: NodeChange) -> Result<()> {
        let (active, exact, path) = match self.routes.get(&id) {
            Some(node) => (node.is_active(), node.is_exact(), node.full_path().to_string()),
            None => return Ok(()),
        };

        match change {
            NodeChange::Active(_) => {
                self.emit(id, RouteEventKind::ActiveChanged(active), path);
                if active {
                    self.on_activate(id)
                } else {
                    self.on_deactivate(id);
                    Ok(())
                }
            }
            NodeChange::Exact(_) => {
                self.emit(id, RouteEventKind::ExactMatchChanged(exact), path);
                Ok(())
            }
            NodeChange::ModuleState(previous) | NodeChange::StyleState(previous) => {
                if previous == LoadState::Loading {
                    self.try_custom_render(id)
                } else {
                    Ok(())
                }
            }
        }
    }

    fn on_activate(&mut self, id: ElementId) -> Result<()> {
        let needs_load = match self.routes.get_mut(&id) {
            Some(node) => {
                if node.eviction.cancel() {
                    debug!(path = %node.full_path(), "重新激活，取消回收计时器");
                }
                debug!(path = %node.full_path(), "路由激活");
                // lazy 节点首次激活时加载；失败或被放弃的资源在激活时重新加载
                !(node.module_ready() && node.styles_ready())
            }
            None => return Ok(()),
        };

        if needs_load {
            self.load_assets(id);
            Ok(())
        } else {
            self.try_custom_render(id)
        }
    }

    fn on_deactivate(&mut self, id: ElementId) {
        let Some(node) = self.routes.get_mut(&id) else {
            return;
        };
        debug!(path = %node.full_path(), "路由失活");

        let module_ready = node.module.is_some() && node.module_state() == LoadState::Ready;
        let action = deactivation_action(
            node.attributes.custom_render.is_enabled(),
            node.attributes.drop,
            module_ready,
        );
        match action {
            DeactivationAction::Arm => {
                let after = self.config.cache_valid(node.attributes.cache_valid_time);
                node.eviction.arm(id, after, &self.sender);
            }
            DeactivationAction::TeardownNow => Self::invoke_teardown(node),
            DeactivationAction::None => {}
        }
    }

    // ==================== 资源加载 ====================

    fn load_assets(&mut self, id: ElementId) {
        let Some(node) = self.routes.get_mut(&id) else {
            return;
        };
        debug!(path = %node.full_path(), "开始加载资源");

        let idle = |state: LoadState| !matches!(state, LoadState::Ready | LoadState::Loading);

        if let Some(url) = node.attributes.url.clone() {
            if idle(node.module_state()) {
                node.module_error = None;
                node.set_module_state(LoadState::Loading);
                let generation = node.module_generation;
                let components = self.loader.components();
                self.sender.spawn(async move {
                    let started = Instant::now();
                    let result = components.load(&url).await;
                    HostTask::ModuleLoaded {
                        element: id,
                        generation,
                        result,
                        started,
                    }
                });
            }
        }

        if node.attributes.has_styles() && idle(node.style_state()) {
            node.style_error = None;
            node.set_style_state(LoadState::Loading);
            let sources = node.attributes.css_url.to_vec();
            let generation = node.style_generation;
            let styles = self.loader.styles();
            self.sender.spawn(async move {
                let result = fetch_styles(styles.as_ref(), &sources).await;
                HostTask::StylesFetched {
                    element: id,
                    generation,
                    result,
                }
            });
        }
    }

    fn on_module_loaded(
        &mut self,
        id: ElementId,
        generation: u64,
        result: Result<Arc<ComponentModule>>,
        started: Instant,
    ) -> Result<()> {
        let Some(node) = self.routes.get_mut(&id) else {
            return Ok(());
        };
        if node.module_generation != generation {
            trace!(path = %node.full_path(), "模块地址已变更，丢弃过期加载结果");
            return Ok(());
        }

        match result {
            Ok(module) => {
                let lock = self.config.lock_loading(node.attributes.lock_loading_time);
                let elapsed = started.elapsed();
                match lock {
                    Some(lock) if elapsed < lock => {
                        let remaining = lock - elapsed;
                        debug!(
                            path = %node.full_path(),
                            remaining_ms = remaining.as_millis() as u64,
                            "模块已加载，等待最短加载展示时间"
                        );
                        self.sender.spawn(async move {
                            tokio::time::sleep(remaining).await;
                            HostTask::ModuleReady {
                                element: id,
                                generation,
                                module,
                            }
                        });
                        return Ok(());
                    }
                    _ => {
                        debug!(path = %node.full_path(), url = %module.url(), "模块加载完成");
                        node.module = Some(module);
                        node.set_module_state(LoadState::Ready);
                    }
                }
            }
            Err(e) => {
                error!(path = %node.full_path(), error = %e, code = e.error_code(), "模块加载失败");
                node.module_error = Some(e);
                node.set_module_state(LoadState::Failed);
            }
        }
        self.flush(id)
    }

    fn on_styles_fetched(
        &mut self,
        id: ElementId,
        generation: u64,
        result: Result<String>,
    ) -> Result<()> {
        let Some(node) = self.routes.get_mut(&id) else {
            return Ok(());
        };
        if node.style_generation != generation {
            trace!(path = %node.full_path(), "样式地址已变更，丢弃过期样式");
            return Ok(());
        }

        match result {
            Ok(css) => {
                node.set_css_content(&css);
                if node.attributes.render_after_ready {
                    let sheet = node.render_root.stylesheet();
                    let active = node.active_flag();
                    let (interval, timeout) =
                        (self.config.css_poll_interval(), self.config.css_poll_timeout());
                    self.sender.spawn(async move {
                        let result = wait_for_stylesheet(sheet, interval, timeout, active).await;
                        HostTask::StyleParsed {
                            element: id,
                            generation,
                            result,
                        }
                    });
                } else {
                    node.set_style_state(LoadState::Ready);
                }
            }
            Err(e) => {
                error!(path = %node.full_path(), error = %e, code = e.error_code(), "样式加载失败");
                node.style_error = Some(e);
                node.set_style_state(LoadState::Failed);
            }
        }
        self.flush(id)
    }

    // ==================== 自定义渲染与回收 ====================

    fn try_custom_render(&mut self, id: ElementId) -> Result<()> {
        let Some(node) = self.routes.get_mut(&id) else {
            return Ok(());
        };

        // 失活后才完成的加载只更新状态，不触发渲染
        if !node.is_active() {
            return Ok(());
        }
        let Some(export) = node.attributes.custom_render.export_name().map(str::to_string) else {
            return Ok(());
        };
        if !node.assets_settled() {
            trace!(path = %node.full_path(), "资源尚未全部就绪，推迟自定义渲染");
            return Ok(());
        }

        let module = match (node.module_state(), node.module.clone()) {
            (LoadState::Ready, Some(module)) => module,
            (LoadState::Failed, _) => {
                // 有错误渲染器时由渲染决策展示错误，否则什么都不渲染
                return Ok(());
            }
            _ => {
                debug!(path = %node.full_path(), "未配置组件模块，跳过自定义渲染");
                return Ok(());
            }
        };

        let Some(render) = module.render_export(&export) else {
            let err = RouteError::MissingRenderExport { export };
            if node.error_render.is_some() {
                warn!(path = %node.full_path(), error = %err, "缺少渲染导出，展示错误内容");
                node.render_error = Some(err);
                node.commit_render();
                return Ok(());
            }
            error!(path = %node.full_path(), error = %err, code = err.error_code(), "缺少渲染导出");
            return Err(err);
        };

        // 之前缺少导出时提交的是错误内容，恢复挂载点
        if node.render_error.take().is_some() {
            node.commit_render();
        }

        if !node.attributes.drop && module.teardown().is_none() {
            let warning = RouteError::MissingTeardownExport {
                url: module.url().to_string(),
            };
            warn!(path = %node.full_path(), error = %warning, "模块没有卸载导出，回收时不会释放实例");
        }

        let drop = node.attributes.drop;
        let evicted = node.evicted;
        let path = node.full_path().to_string();
        let Some(mount) = node.render_root.mount_mut() else {
            let err = RouteError::MountPointMissing(path);
            warn!(error = %err, "挂载点不存在，跳过自定义渲染");
            return Ok(());
        };

        if drop || evicted {
            mount.clear();
        } else if mount.has_children() {
            trace!(path = %path, "挂载点已有内容，跳过自定义渲染");
            return Ok(());
        }

        debug!(path = %path, export = %export, evicted, "调用自定义渲染");
        if let Err(reason) = run_guarded(|| render(mount)) {
            let err = RouteError::RenderFailed {
                path: path.clone(),
                reason,
            };
            error!(error = %err, code = err.error_code(), "自定义渲染失败");
        }
        node.render_invocations += 1;
        node.evicted = false;
        node.eviction.reset();
        Ok(())
    }

    fn on_eviction_fired(&mut self, id: ElementId, generation: u64) {
        let Some(node) = self.routes.get_mut(&id) else {
            return;
        };
        if !node.eviction.fire(generation) {
            return;
        }
        if node.is_active() {
            node.eviction.reset();
            return;
        }

        info!(path = %node.full_path(), "缓存到期，回收组件实例");
        Self::invoke_teardown(node);
        node.evicted = true;
        node.render_root.discard_cache();
    }

    fn invoke_teardown(node: &mut RouteNode) {
        let Some(module) = node.module.clone() else {
            return;
        };
        let Some(teardown) = module.teardown() else {
            let warning = RouteError::MissingTeardownExport {
                url: module.url().to_string(),
            };
            warn!(path = %node.full_path(), error = %warning, "无法卸载组件实例");
            return;
        };

        node.teardown_invocations += 1;
        if let Err(reason) = run_guarded(|| teardown()) {
            let err = RouteError::TeardownFailed {
                path: node.full_path().to_string(),
                reason,
            };
            error!(error = %err, code = err.error_code(), "卸载组件实例失败");
        }
    }
}

impl Drop for RouteHost {
    fn drop(&mut self) {
        let subscriptions: Vec<String> = self
            .routes
            .values()
            .filter_map(|node| node.subscription.clone())
            .chain(
                self.containers
                    .values()
                    .filter_map(|c| c.subscription().map(str::to_string)),
            )
            .collect();
        for subscription in &subscriptions {
            let _ = self.notifier.unsubscribe(subscription);
        }
        debug!(subscriptions = subscriptions.len(), "路由宿主已释放");
    }
}

/// 执行用户回调，错误与 panic 都转为文本
fn run_guarded<F>(callback: F) -> std::result::Result<(), String>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{:#}", e)),
        Err(panic) => Err(panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::render::MountPoint;
    use crate::element::loader::StaticComponentLoader;

    fn host_with(loader: Arc<StaticComponentLoader>) -> RouteHost {
        RouteHost::builder()
            .notifier(NavigationNotifier::new())
            .component_loader(loader)
            .build()
    }

    #[tokio::test]
    async fn test_append_route_evaluates_current_location() {
        let mut host = host_with(Arc::new(StaticComponentLoader::new()));
        let root = host.tree().root();
        let home = host.append_route(root, RouteAttributes::new("/")).unwrap();
        let about = host.append_route(root, RouteAttributes::new("/about")).unwrap();

        assert!(host.route(home).unwrap().is_exact());
        assert!(!host.route(about).unwrap().is_active());

        host.navigate("/about").unwrap();
        host.run_until_idle().await.unwrap();
        assert!(host.route(about).unwrap().is_exact());
        assert!(host.route(home).unwrap().is_active());
        assert!(!host.route(home).unwrap().is_exact());
    }

    #[tokio::test]
    async fn test_kind_errors() {
        let mut host = host_with(Arc::new(StaticComponentLoader::new()));
        let root = host.tree().root();
        let div = host.append_element(root, "div").unwrap();
        assert!(matches!(host.route(div), Err(RouteError::NotARoute(_))));
        assert!(matches!(host.container(div), Err(RouteError::NotAContainer(_))));
        assert!(matches!(
            host.route(ElementId::new(99)),
            Err(RouteError::ElementNotFound(99))
        ));
    }

    #[tokio::test]
    async fn test_custom_render_invoked_once() {
        let loader = Arc::new(StaticComponentLoader::new());
        loader.register(
            ComponentModule::new("/page.js").with_render("render", |mount: &mut MountPoint| {
                mount.append("<p>page</p>");
                Ok(())
            }),
        );
        let mut host = host_with(Arc::clone(&loader));
        let root = host.tree().root();

        let mut attrs = RouteAttributes::new("/page");
        attrs.url = Some("/page.js".to_string());
        attrs.custom_render = crate::element::CustomRender::Default;
        let page = host.append_route(root, attrs).unwrap();

        host.navigate("/page").unwrap();
        host.run_until_idle().await.unwrap();
        host.navigate("/page/sub").unwrap();
        host.run_until_idle().await.unwrap();

        let node = host.route(page).unwrap();
        assert_eq!(node.render_invocations(), 1);
        assert!(node.html().contains("<p>page</p>"));
    }

    #[test]
    fn test_run_guarded_catches_panics() {
        assert!(run_guarded(|| Ok(())).is_ok());
        assert_eq!(
            run_guarded(|| Err(anyhow::anyhow!("bad"))).unwrap_err(),
            "bad"
        );
        assert_eq!(run_guarded(|| panic!("boom")).unwrap_err(), "boom");
    }
}
