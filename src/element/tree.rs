//! 元素树
//!
//! 以 arena 方式保存的类 DOM 元素树。路由节点、路由容器和普通元素
//! 都是树上的元素；路径解析、容器汇总和事件冒泡都通过这棵树查询祖先与后代。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::router::path::Ancestry;
use crate::utils::{Result, RouteError};

/// 元素标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(usize);

impl ElementId {
    /// 由下标构造
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// arena 下标
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 元素种类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    /// 文档根
    Root,
    /// 路由节点，携带声明的 path 属性
    Route { path: String },
    /// 路由容器
    Container,
    /// 普通元素
    Plain(String),
}

#[derive(Debug, Clone)]
struct ElementEntry {
    kind: ElementKind,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

/// 元素树
#[derive(Debug, Clone)]
pub struct ElementTree {
    entries: Vec<Option<ElementEntry>>,
}

impl ElementTree {
    /// 创建只有根元素的树
    pub fn new() -> Self {
        Self {
            entries: vec![Some(ElementEntry {
                kind: ElementKind::Root,
                parent: None,
                children: Vec::new(),
            })],
        }
    }

    /// 根元素
    pub fn root(&self) -> ElementId {
        ElementId(0)
    }

    /// 现存元素数量（含根）
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// 是否只剩根元素
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// 元素是否存在
    pub fn contains(&self, id: ElementId) -> bool {
        self.entry(id).is_ok()
    }

    // ==================== 插入与移除 ====================

    /// 在 parent 下追加元素
    pub fn insert(&mut self, parent: ElementId, kind: ElementKind) -> Result<ElementId> {
        if matches!(kind, ElementKind::Root) {
            return Err(RouteError::InvalidParent("不能插入第二个根元素".to_string()));
        }
        self.entry(parent)?;

        let id = ElementId(self.entries.len());
        self.entries.push(Some(ElementEntry {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        }));
        self.entry_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// 追加路由节点
    pub fn insert_route(&mut self, parent: ElementId, path: impl Into<String>) -> Result<ElementId> {
        self.insert(parent, ElementKind::Route { path: path.into() })
    }

    /// 追加路由容器
    pub fn insert_container(&mut self, parent: ElementId) -> Result<ElementId> {
        self.insert(parent, ElementKind::Container)
    }

    /// 追加普通元素
    pub fn insert_element(&mut self, parent: ElementId, tag: impl Into<String>) -> Result<ElementId> {
        self.insert(parent, ElementKind::Plain(tag.into()))
    }

    /// 移除元素及其整棵子树，返回被移除的元素（先序）
    pub fn remove(&mut self, id: ElementId) -> Result<Vec<ElementId>> {
        if id == self.root() {
            return Err(RouteError::InvalidParent("不能移除根元素".to_string()));
        }
        let parent = self.entry(id)?.parent;

        let mut removed = vec![id];
        removed.extend(self.descendants(id));

        if let Some(parent) = parent {
            if let Ok(entry) = self.entry_mut(parent) {
                entry.children.retain(|child| *child != id);
            }
        }
        for element in &removed {
            self.entries[element.0] = None;
        }
        Ok(removed)
    }

    // ==================== 查询 ====================

    /// 元素种类
    pub fn kind(&self, id: ElementId) -> Result<&ElementKind> {
        Ok(&self.entry(id)?.kind)
    }

    /// 是否为路由节点
    pub fn is_route(&self, id: ElementId) -> bool {
        matches!(self.kind(id), Ok(ElementKind::Route { .. }))
    }

    /// 是否为路由容器
    pub fn is_container(&self, id: ElementId) -> bool {
        matches!(self.kind(id), Ok(ElementKind::Container))
    }

    /// 子元素
    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.entry(id)
            .map(|entry| entry.children.as_slice())
            .unwrap_or(&[])
    }

    /// 全部后代（先序，不含自身）
    pub fn descendants(&self, id: ElementId) -> Vec<ElementId> {
        let mut result = Vec::new();
        let mut stack: Vec<ElementId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        result
    }

    /// 祖先链（由近及远，不含自身）
    pub fn ancestors(&self, id: ElementId) -> Vec<ElementId> {
        let mut result = Vec::new();
        let mut current = id;
        while let Some(parent) = Ancestry::parent(self, current) {
            result.push(parent);
            current = parent;
        }
        result
    }

    /// 冒泡路径：自身加祖先链
    pub fn bubble_path(&self, id: ElementId) -> Vec<ElementId> {
        let mut path = vec![id];
        path.extend(self.ancestors(id));
        path
    }

    /// 修改路由节点声明的 path
    pub fn set_route_path(&mut self, id: ElementId, path: impl Into<String>) -> Result<()> {
        match &mut self.entry_mut(id)?.kind {
            ElementKind::Route { path: current } => {
                *current = path.into();
                Ok(())
            }
            _ => Err(RouteError::NotARoute(id.0)),
        }
    }

    fn entry(&self, id: ElementId) -> Result<&ElementEntry> {
        self.entries
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(RouteError::ElementNotFound(id.0))
    }

    fn entry_mut(&mut self, id: ElementId) -> Result<&mut ElementEntry> {
        self.entries
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(RouteError::ElementNotFound(id.0))
    }
}

impl Default for ElementTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Ancestry for ElementTree {
    type Id = ElementId;

    fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.entry(id).ok().and_then(|entry| entry.parent)
    }

    fn route_path(&self, id: ElementId) -> Option<&str> {
        match self.kind(id) {
            Ok(ElementKind::Route { path }) => Some(path.as_str()),
            _ => None,
        }
    }
}
