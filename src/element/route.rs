//! 路由节点
//!
//! 每个声明的路由对应一个 [`RouteNode`]：属性是配置，其余都是派生状态。
//!
//! - `full_path` 与匹配器总是一起更新，匹配时不会用到过期的片段
//! - `active` / `exact` 在每次导航通知时同步重新计算，先于任何加载或渲染副作用
//! - 需要驱动副作用的字段（激活、完全匹配、两个加载状态）以 Notify 策略保存，
//!   变化记录在变更集中由宿主消费；完整路径与样式内容静默更新

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::element::attributes::RouteAttributes;
use crate::element::eviction::{EvictionState, EvictionTimer};
use crate::element::loader::{ComponentModule, LoadState};
use crate::element::observable::{ChangeKey, ChangeSet, Observable};
use crate::element::render::{decide, ContentBody, Fragment, RenderInputs, RenderOutcome, RenderRoot};
use crate::router::group::MatchSegment;
use crate::router::matcher::{MatchOutcome, RouteMatcher};
use crate::utils::RouteError;

/// 错误渲染函数：错误 -> 标记
pub type ErrorRenderFn = Arc<dyn Fn(&RouteError) -> String + Send + Sync>;

/// 节点状态变更
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeChange {
    /// 激活状态变化，携带旧值
    Active(bool),
    /// 完全匹配状态变化，携带旧值
    Exact(bool),
    /// 模块加载状态变化，携带旧值
    ModuleState(LoadState),
    /// 样式加载状态变化，携带旧值
    StyleState(LoadState),
}

impl ChangeKey for NodeChange {
    fn key(&self) -> &'static str {
        match self {
            NodeChange::Active(_) => "active",
            NodeChange::Exact(_) => "exact",
            NodeChange::ModuleState(_) => "module_state",
            NodeChange::StyleState(_) => "style_state",
        }
    }
}

/// 路由节点
pub struct RouteNode {
    pub(crate) attributes: RouteAttributes,
    pub(crate) error_render: Option<ErrorRenderFn>,

    full_path: Observable<String>,
    matcher: RouteMatcher,

    active: Observable<bool>,
    exact: Observable<bool>,
    active_flag: Arc<AtomicBool>,

    module_state: Observable<LoadState>,
    style_state: Observable<LoadState>,
    css_content: Observable<String>,

    pub(crate) module: Option<Arc<ComponentModule>>,
    pub(crate) module_error: Option<RouteError>,
    pub(crate) style_error: Option<RouteError>,
    pub(crate) render_error: Option<RouteError>,

    /// 资源来源代数，url / css-url 变化时递增，过期的加载结果被丢弃
    pub(crate) module_generation: u64,
    pub(crate) style_generation: u64,

    pub(crate) evicted: bool,
    pub(crate) eviction: EvictionTimer,
    pub(crate) render_root: RenderRoot,
    pub(crate) subscription: Option<String>,
    pub(crate) render_invocations: usize,
    pub(crate) teardown_invocations: usize,

    changes: ChangeSet<NodeChange>,
}

impl RouteNode {
    /// 以属性创建节点，完整路径由宿主随后设置
    pub fn new(attributes: RouteAttributes) -> Self {
        let matcher = RouteMatcher::new("/", &attributes.path, attributes.exact, false);
        let isolated = !attributes.disable_shadow;
        Self {
            attributes,
            error_render: None,
            full_path: Observable::silent("/".to_string()),
            matcher,
            active: Observable::notify(false),
            exact: Observable::notify(false),
            active_flag: Arc::new(AtomicBool::new(false)),
            module_state: Observable::notify(LoadState::Unloaded),
            style_state: Observable::notify(LoadState::Unloaded),
            css_content: Observable::silent(String::new()),
            module: None,
            module_error: None,
            style_error: None,
            render_error: None,
            module_generation: 0,
            style_generation: 0,
            evicted: false,
            eviction: EvictionTimer::new(),
            render_root: RenderRoot::new(isolated),
            subscription: None,
            render_invocations: 0,
            teardown_invocations: 0,
            changes: ChangeSet::default(),
        }
    }

    // ==================== 路径与匹配 ====================

    /// 属性
    pub fn attributes(&self) -> &RouteAttributes {
        &self.attributes
    }

    /// 完整路径
    pub fn full_path(&self) -> &str {
        self.full_path.get()
    }

    /// 匹配片段
    pub fn segments(&self) -> &[MatchSegment] {
        self.matcher.segments()
    }

    /// 设置完整路径并重建匹配器
    pub fn set_full_path(&mut self, full_path: String) {
        self.matcher = RouteMatcher::new(
            full_path.clone(),
            &self.attributes.path,
            self.attributes.exact,
            self.attributes.group_match_mode,
        );
        self.full_path.set(full_path);
    }

    /// 对地址判定并写入激活状态
    pub fn apply_location(&mut self, pathname: &str) -> MatchOutcome {
        let outcome = self.matcher.evaluate(pathname);
        if let Some(previous) = self.active.set(outcome.active) {
            self.changes.record(NodeChange::Active(previous));
        }
        if let Some(previous) = self.exact.set(outcome.exact) {
            self.changes.record(NodeChange::Exact(previous));
        }
        self.active_flag.store(outcome.active, Ordering::SeqCst);
        outcome
    }

    /// 是否激活
    pub fn is_active(&self) -> bool {
        self.active.value()
    }

    /// 是否完全匹配
    pub fn is_exact(&self) -> bool {
        self.exact.value()
    }

    /// 供异步任务查询的激活标记
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active_flag)
    }

    // ==================== 加载状态 ====================

    /// 模块加载状态
    pub fn module_state(&self) -> LoadState {
        self.module_state.value()
    }

    /// 样式加载状态
    pub fn style_state(&self) -> LoadState {
        self.style_state.value()
    }

    pub(crate) fn set_module_state(&mut self, state: LoadState) {
        if let Some(previous) = self.module_state.set(state) {
            self.changes.record(NodeChange::ModuleState(previous));
        }
    }

    pub(crate) fn set_style_state(&mut self, state: LoadState) {
        if let Some(previous) = self.style_state.set(state) {
            self.changes.record(NodeChange::StyleState(previous));
        }
    }

    /// 写入样式内容（静默，不单独触发渲染）
    pub(crate) fn set_css_content(&mut self, content: &str) {
        self.render_root.stylesheet().set_content(content);
        self.css_content.set(content.to_string());
    }

    /// 样式内容
    pub fn css_content(&self) -> &str {
        self.css_content.get()
    }

    /// 已加载模块的地址
    pub fn loaded_module_url(&self) -> Option<&str> {
        self.module.as_deref().map(ComponentModule::url)
    }

    /// 是否配置了组件模块
    pub fn has_module(&self) -> bool {
        self.attributes.url.is_some()
    }

    /// 模块是否可用（未配置模块视为可用）
    pub fn module_ready(&self) -> bool {
        !self.has_module() || self.module_state() == LoadState::Ready
    }

    /// 样式是否可用（未配置样式视为可用）
    pub fn styles_ready(&self) -> bool {
        !self.attributes.has_styles() || self.style_state() == LoadState::Ready
    }

    /// 已配置的资源是否都有了结果
    pub fn assets_settled(&self) -> bool {
        let module_settled = !self.has_module() || self.module_state().is_settled();
        let styles_settled = !self.attributes.has_styles() || self.style_state().is_settled();
        module_settled && styles_settled
    }

    // ==================== 渲染 ====================

    /// 取出待处理变更
    pub(crate) fn take_changes(&mut self) -> Vec<NodeChange> {
        self.changes.take()
    }

    /// 是否有待处理变更
    pub(crate) fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// 渲染决策输入
    pub fn render_inputs(&self) -> RenderInputs {
        RenderInputs {
            active: self.is_active(),
            has_error_render: self.error_render.is_some(),
            has_module: self.has_module(),
            module_state: self.module_state(),
            has_styles: self.attributes.has_styles(),
            style_state: self.style_state(),
            render_after_ready: self.attributes.render_after_ready,
            has_loading_placeholder: self.attributes.loading_element.is_some(),
            render_error: self.render_error.is_some(),
        }
    }

    /// 当前渲染结果类别
    pub fn outcome(&self) -> RenderOutcome {
        decide(&self.render_inputs())
    }

    /// 构造当前片段
    pub fn build_fragment(&self) -> Fragment {
        match self.outcome() {
            RenderOutcome::Empty => Fragment::Empty,
            RenderOutcome::Error => {
                let markup = match (&self.error_render, self.current_error()) {
                    (Some(render), Some(error)) => render(&error),
                    _ => String::new(),
                };
                Fragment::Error { markup }
            }
            RenderOutcome::Loading => self.content(ContentBody::Loading(
                self.attributes.loading_element.clone().unwrap_or_default(),
            )),
            RenderOutcome::Content => {
                if self.attributes.custom_render.is_enabled() {
                    self.content(ContentBody::Mount)
                } else {
                    self.content(ContentBody::Markup(self.attributes.element.clone()))
                }
            }
        }
    }

    fn content(&self, body: ContentBody) -> Fragment {
        Fragment::Content {
            style: self.css_content().to_string(),
            body,
            slot: self.attributes.append_direction,
        }
    }

    /// 错误渲染器收到的错误：模块失败优先，其次样式，最后是渲染路径上的错误
    fn current_error(&self) -> Option<RouteError> {
        if self.has_module() && self.module_state() == LoadState::Failed {
            return Some(self.module_error.clone().unwrap_or_else(|| {
                RouteError::Other("module load rejected".to_string())
            }));
        }
        if self.attributes.has_styles() && self.style_state() == LoadState::Failed {
            return Some(
                self.style_error
                    .clone()
                    .unwrap_or_else(|| RouteError::Other("css load rejected".to_string())),
            );
        }
        self.render_error.clone()
    }

    /// 把当前片段提交到渲染根，返回是否重建
    pub(crate) fn commit_render(&mut self) -> bool {
        let fragment = self.build_fragment();
        self.render_root.commit(fragment, self.attributes.drop)
    }

    /// 渲染根
    pub fn render_root(&self) -> &RenderRoot {
        &self.render_root
    }

    /// 渲染后的标记
    pub fn html(&self) -> String {
        self.render_root.html()
    }

    // ==================== 统计 ====================

    /// 实例是否已被回收
    pub fn is_evicted(&self) -> bool {
        self.evicted
    }

    /// 回收计时器状态
    pub fn eviction_state(&self) -> EvictionState {
        self.eviction.state()
    }

    /// 回收计时器累计启动次数
    pub fn eviction_armed_count(&self) -> u64 {
        self.eviction.armed_count()
    }

    /// 渲染导出累计调用次数
    pub fn render_invocations(&self) -> usize {
        self.render_invocations
    }

    /// 卸载导出累计调用次数
    pub fn teardown_invocations(&self) -> usize {
        self.teardown_invocations
    }

    /// 导航订阅 ID
    pub fn subscription(&self) -> Option<&str> {
        self.subscription.as_deref()
    }

    /// 状态快照
    pub fn snapshot(&self) -> RouteSnapshot {
        RouteSnapshot {
            path: self.attributes.path.clone(),
            full_path: self.full_path().to_string(),
            segments: self.segments().iter().map(ToString::to_string).collect(),
            active: self.is_active(),
            exact: self.is_exact(),
            module_state: self.module_state(),
            style_state: self.style_state(),
            evicted: self.evicted,
            render_invocations: self.render_invocations,
            teardown_invocations: self.teardown_invocations,
        }
    }
}

/// 节点状态快照（命令行输出用）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSnapshot {
    pub path: String,
    pub full_path: String,
    pub segments: Vec<String>,
    pub active: bool,
    pub exact: bool,
    pub module_state: LoadState,
    pub style_state: LoadState,
    pub evicted: bool,
    pub render_invocations: usize,
    pub teardown_invocations: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::attributes::CustomRender;

    #[test]
    fn test_apply_location_records_changes() {
        let mut node = RouteNode::new(RouteAttributes::new("/a"));
        node.set_full_path("/a".to_string());

        node.apply_location("/a/b");
        assert!(node.is_active());
        assert!(!node.is_exact());
        assert_eq!(node.take_changes(), vec![NodeChange::Active(false)]);

        node.apply_location("/a/b");
        assert!(!node.has_changes());

        node.apply_location("/a");
        assert_eq!(node.take_changes(), vec![NodeChange::Exact(false)]);
        assert!(node.active_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_full_path_updates_matcher() {
        let mut node = RouteNode::new(RouteAttributes::new("x"));
        node.set_full_path("/root/x".to_string());
        assert_eq!(node.segments().len(), 3);
        assert!(node.apply_location("/root/x/y").active);
        // 完整路径变化不产生变更
        assert_eq!(node.take_changes(), vec![NodeChange::Active(false)]);
    }

    #[test]
    fn test_fragment_markup_and_mount() {
        let mut attrs = RouteAttributes::new("/");
        attrs.element = "<p>home</p>".to_string();
        let mut node = RouteNode::new(attrs);
        node.set_full_path("/".to_string());
        assert_eq!(node.build_fragment(), Fragment::Empty);

        node.apply_location("/");
        assert!(node.commit_render());
        assert!(node.html().contains("<p>home</p>"));

        node.attributes.custom_render = CustomRender::Default;
        assert!(node.build_fragment().has_mount());
    }

    #[test]
    fn test_error_fragment_uses_module_error() {
        let mut attrs = RouteAttributes::new("/");
        attrs.url = Some("/m.js".to_string());
        let mut node = RouteNode::new(attrs);
        node.error_render = Some(Arc::new(|e: &RouteError| format!("<b>{}</b>", e)));
        node.set_full_path("/".to_string());
        node.apply_location("/");

        node.module_error = Some(RouteError::ModuleLoadFailed {
            url: "/m.js".to_string(),
            reason: "boom".to_string(),
        });
        node.set_module_state(LoadState::Failed);

        match node.build_fragment() {
            Fragment::Error { markup } => assert!(markup.contains("boom")),
            other => panic!("unexpected fragment {:?}", other),
        }
    }

    #[test]
    fn test_readiness_without_assets() {
        let node = RouteNode::new(RouteAttributes::new("/"));
        assert!(node.module_ready());
        assert!(node.styles_ready());
        assert!(node.assets_settled());
    }
}
