//! 路由容器
//!
//! 容器为一组路由节点划定作用范围（root path），并在范围内没有任何
//! 节点匹配时切换到 not-found 状态、展示兜底内容。
//! 地址离开作用范围时容器强制回到 normal，不展示兜底内容。

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::element::attributes::{AppendDirection, ContainerAttributes};
use crate::element::render::{ContentBody, Fragment, RenderRoot};

/// 容器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerStatus {
    #[default]
    Normal,
    NotFound,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerStatus::Normal => f.write_str("normal"),
            ContainerStatus::NotFound => f.write_str("not-found"),
        }
    }
}

/// 兜底内容生成函数
pub type NotFoundProducer = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// 兜底内容
#[derive(Clone)]
pub enum NotFoundContent {
    /// 固定文本
    Text(String),
    /// 根据当前 pathname 生成
    Producer(NotFoundProducer),
}

impl NotFoundContent {
    /// 生成兜底内容
    pub fn produce(&self, pathname: &str) -> String {
        match self {
            NotFoundContent::Text(text) => text.clone(),
            NotFoundContent::Producer(producer) => producer(pathname),
        }
    }
}

impl fmt::Debug for NotFoundContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundContent::Text(text) => f.debug_tuple("Text").field(text).finish(),
            NotFoundContent::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// 后代节点的匹配快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSnapshot {
    pub active: bool,
    pub exact: bool,
    pub virtual_node: bool,
}

/// 汇总后代节点：任一非虚拟节点完全匹配或前缀匹配即视为命中
pub fn any_matched<I>(snapshots: I) -> bool
where
    I: IntoIterator<Item = MatchSnapshot>,
{
    snapshots
        .into_iter()
        .filter(|s| !s.virtual_node)
        .any(|s| s.exact || s.active)
}

/// 路由容器
#[derive(Debug)]
pub struct RouteContainer {
    attributes: ContainerAttributes,
    not_found: Option<NotFoundContent>,
    active: bool,
    status: ContainerStatus,
    pathname: String,
    render_root: RenderRoot,
    subscription: Option<String>,
}

impl RouteContainer {
    /// 创建容器
    pub fn new(attributes: ContainerAttributes) -> Self {
        let not_found = attributes.not_found.clone().map(NotFoundContent::Text);
        let isolated = attributes.isolated_render_root;
        let mut container = Self {
            attributes,
            not_found,
            active: false,
            status: ContainerStatus::Normal,
            pathname: String::new(),
            render_root: RenderRoot::new(isolated),
            subscription: None,
        };
        container.refresh_render();
        container
    }

    /// 属性
    pub fn attributes(&self) -> &ContainerAttributes {
        &self.attributes
    }

    /// 修改属性
    pub fn attributes_mut(&mut self) -> &mut ContainerAttributes {
        &mut self.attributes
    }

    /// 设置兜底内容
    pub fn set_not_found(&mut self, content: NotFoundContent) {
        self.not_found = Some(content);
        self.refresh_render();
    }

    /// 作用范围
    pub fn root_path(&self) -> &str {
        &self.attributes.root_path
    }

    /// 地址是否在作用范围内
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// 当前状态
    pub fn status(&self) -> ContainerStatus {
        self.status
    }

    /// 渲染根
    pub fn render_root(&self) -> &RenderRoot {
        &self.render_root
    }

    /// 导航订阅 ID
    pub fn subscription(&self) -> Option<&str> {
        self.subscription.as_deref()
    }

    pub(crate) fn set_subscription(&mut self, id: Option<String>) {
        self.subscription = id;
    }

    /// 根据新地址重新判断是否在作用范围内
    ///
    /// 离开范围时立即回到 normal，返回状态是否变化。
    pub fn evaluate_scope(&mut self, pathname: &str) -> bool {
        self.pathname = pathname.to_string();
        self.active = pathname.starts_with(self.root_path());
        if !self.active {
            return self.set_status(ContainerStatus::Normal);
        }
        false
    }

    /// 后代节点判定完成后汇总，返回状态是否变化
    pub fn settle(&mut self, matched: bool) -> bool {
        let status = if !self.active || matched {
            ContainerStatus::Normal
        } else {
            ContainerStatus::NotFound
        };
        let changed = self.set_status(status);
        // 兜底内容可能依赖 pathname，状态不变时也要刷新
        self.refresh_render();
        changed
    }

    /// 当前应展示的兜底内容
    pub fn fallback(&self) -> Option<String> {
        match self.status {
            ContainerStatus::NotFound => self
                .not_found
                .as_ref()
                .map(|content| content.produce(&self.pathname)),
            ContainerStatus::Normal => None,
        }
    }

    fn set_status(&mut self, status: ContainerStatus) -> bool {
        if self.status == status {
            return false;
        }
        debug!(
            path = %self.attributes.root_path,
            from = %self.status,
            to = %status,
            "容器状态变化"
        );
        self.status = status;
        self.refresh_render();
        true
    }

    /// normal 状态只输出插槽，not-found 状态在插槽前输出兜底内容
    fn refresh_render(&mut self) {
        let body = ContentBody::Markup(self.fallback().unwrap_or_default());
        self.render_root.commit(
            Fragment::Content {
                style: String::new(),
                body,
                slot: AppendDirection::After,
            },
            false,
        );
    }
}
