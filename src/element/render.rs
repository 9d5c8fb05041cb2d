//! 渲染调度
//!
//! [`decide`] 是一个全函数：只根据节点当前状态决定输出
//! `Empty` / `Error` / `Loading` / `Content` 之一。
//! 决定结果被构造成 [`Fragment`] 提交给节点的 [`RenderRoot`]。
//!
//! # 缓存
//!
//! 相同的片段不会引起重建。离开内容片段时，自定义渲染挂载点
//! 会被缓存下来，再次进入时原样恢复（已渲染的子节点仍在），
//! 因此自定义渲染回调不会被重复调用；`drop` 模式下挂载点直接丢弃。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::element::attributes::AppendDirection;
use crate::element::loader::LoadState;

/// 渲染结果类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Empty,
    Error,
    Loading,
    Content,
}

/// 渲染决策输入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderInputs {
    pub active: bool,
    pub has_error_render: bool,
    /// 是否配置了组件模块地址
    pub has_module: bool,
    pub module_state: LoadState,
    pub has_styles: bool,
    pub style_state: LoadState,
    pub render_after_ready: bool,
    pub has_loading_placeholder: bool,
    /// 渲染路径上出现的错误（如缺少渲染导出且配置了错误渲染器）
    pub render_error: bool,
}

/// 决定渲染结果
///
/// 没有配置模块地址的节点，模块视为已就绪。
pub fn decide(inputs: &RenderInputs) -> RenderOutcome {
    if !inputs.active {
        return RenderOutcome::Empty;
    }

    let module_failed = inputs.has_module && inputs.module_state == LoadState::Failed;
    let style_failed = inputs.has_styles && inputs.style_state == LoadState::Failed;
    if inputs.has_error_render && (module_failed || style_failed || inputs.render_error) {
        return RenderOutcome::Error;
    }

    if inputs.render_after_ready && inputs.has_loading_placeholder {
        let module_pending = inputs.has_module && inputs.module_state != LoadState::Ready;
        let style_pending = inputs.has_styles && inputs.style_state != LoadState::Ready;
        if module_pending || style_pending {
            return RenderOutcome::Loading;
        }
    }

    RenderOutcome::Content
}

// ==================== 片段 ====================

/// 内容主体
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBody {
    /// 加载占位标记
    Loading(String),
    /// element 属性的标记
    Markup(String),
    /// 自定义渲染挂载点
    Mount,
}

/// 渲染片段
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Fragment {
    #[default]
    Empty,
    Error {
        markup: String,
    },
    Content {
        style: String,
        body: ContentBody,
        slot: AppendDirection,
    },
}

impl Fragment {
    /// 是否包含自定义渲染挂载点
    pub fn has_mount(&self) -> bool {
        matches!(
            self,
            Fragment::Content {
                body: ContentBody::Mount,
                ..
            }
        )
    }

    /// 对应的渲染结果类别
    pub fn outcome(&self) -> RenderOutcome {
        match self {
            Fragment::Empty => RenderOutcome::Empty,
            Fragment::Error { .. } => RenderOutcome::Error,
            Fragment::Content {
                body: ContentBody::Loading(_),
                ..
            } => RenderOutcome::Loading,
            Fragment::Content { .. } => RenderOutcome::Content,
        }
    }
}

// ==================== 挂载点 ====================

/// 自定义渲染挂载点
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPoint {
    children: Vec<String>,
}

impl MountPoint {
    /// 创建空挂载点
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加子节点标记
    pub fn append(&mut self, markup: impl Into<String>) {
        self.children.push(markup.into());
    }

    /// 清空
    pub fn clear(&mut self) {
        self.children.clear();
    }

    /// 是否已有渲染内容
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// 子节点
    pub fn children(&self) -> &[String] {
        &self.children
    }

    /// 拼接后的标记
    pub fn html(&self) -> String {
        self.children.concat()
    }
}

// ==================== 样式表 ====================

/// 节点渲染根中的样式表
///
/// 写入内容时同步统计顶层规则数。内容为空视为已就绪；
/// 非空但解析不出任何规则时视为尚未就绪。
#[derive(Debug, Default)]
pub struct StyleSheet {
    content: RwLock<String>,
    rules: AtomicUsize,
}

impl StyleSheet {
    /// 创建空样式表
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入样式内容
    pub fn set_content(&self, content: &str) {
        self.rules.store(count_rules(content), Ordering::SeqCst);
        *self
            .content
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = content.to_string();
    }

    /// 样式内容
    pub fn content(&self) -> String {
        self.content
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 已解析的顶层规则数
    pub fn rule_count(&self) -> usize {
        self.rules.load(Ordering::SeqCst)
    }

    /// 是否可以用于渲染
    pub fn is_ready(&self) -> bool {
        let empty = self
            .content
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .trim()
            .is_empty();
        empty || self.rule_count() > 0
    }
}

/// 统计顶层规则：`selector { ... }` 块与 `@import ...;` 之类的语句
fn count_rules(css: &str) -> usize {
    let mut rules = 0;
    let mut depth = 0usize;
    let mut prelude = String::new();
    let mut chars = css.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            let mut prev = '\0';
            for inner in chars.by_ref() {
                if prev == '*' && inner == '/' {
                    break;
                }
                prev = inner;
            }
            continue;
        }

        match c {
            '{' => {
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if !prelude.trim().is_empty() {
                        rules += 1;
                    }
                    prelude.clear();
                }
            }
            ';' if depth == 0 => {
                if prelude.trim_start().starts_with('@') {
                    rules += 1;
                }
                prelude.clear();
            }
            _ if depth == 0 => prelude.push(c),
            _ => {}
        }
    }
    rules
}

// ==================== 渲染根 ====================

/// 节点的渲染根
#[derive(Debug)]
pub struct RenderRoot {
    isolated: bool,
    fragment: Fragment,
    mount: Option<MountPoint>,
    cached_mount: Option<MountPoint>,
    stylesheet: Arc<StyleSheet>,
    commits: usize,
}

impl RenderRoot {
    /// 创建渲染根，`isolated` 为 false 时内容直接渲染在节点自身之下
    pub fn new(isolated: bool) -> Self {
        Self {
            isolated,
            fragment: Fragment::Empty,
            mount: None,
            cached_mount: None,
            stylesheet: Arc::new(StyleSheet::new()),
            commits: 0,
        }
    }

    /// 是否为隔离渲染根
    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    /// 当前片段
    pub fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    /// 当前挂载点
    pub fn mount(&self) -> Option<&MountPoint> {
        self.mount.as_ref()
    }

    /// 当前挂载点（可写）
    pub fn mount_mut(&mut self) -> Option<&mut MountPoint> {
        self.mount.as_mut()
    }

    /// 样式表
    pub fn stylesheet(&self) -> Arc<StyleSheet> {
        Arc::clone(&self.stylesheet)
    }

    /// 实际重建次数
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// 提交片段，返回是否发生重建
    pub fn commit(&mut self, fragment: Fragment, drop: bool) -> bool {
        if fragment == self.fragment {
            return false;
        }

        if self.fragment.has_mount() && !fragment.has_mount() {
            let mount = self.mount.take();
            self.cached_mount = if drop { None } else { mount };
        }

        if fragment.has_mount() && self.mount.is_none() {
            self.mount = Some(if drop {
                MountPoint::new()
            } else {
                self.cached_mount.take().unwrap_or_default()
            });
        }

        self.fragment = fragment;
        self.commits += 1;
        true
    }

    /// 丢弃缓存的挂载点
    pub fn discard_cache(&mut self) {
        self.cached_mount = None;
    }

    /// 渲染后的标记
    pub fn html(&self) -> String {
        match &self.fragment {
            Fragment::Empty => String::new(),
            Fragment::Error { markup } => markup.clone(),
            Fragment::Content { style, body, slot } => {
                let body = match body {
                    ContentBody::Loading(markup) => {
                        format!("<div class=\"loading-wrapper\">{}</div>", markup)
                    }
                    ContentBody::Markup(markup) => markup.clone(),
                    ContentBody::Mount => format!(
                        "<div class=\"custom-render-container\">{}</div>",
                        self.mount.as_ref().map(MountPoint::html).unwrap_or_default()
                    ),
                };
                let style = format!("<style>{}</style>", style);
                match slot {
                    AppendDirection::Before => format!("<slot></slot>{}{}", style, body),
                    AppendDirection::After => format!("{}{}<slot></slot>", style, body),
                }
            }
        }
    }
}
