//! 路径解析
//!
//! 根据节点自身声明的 path 与祖先链计算完整路径。
//!
//! # 解析规则
//!
//! - 沿祖先链向上：父元素是路由节点时，把父节点**声明的原始 path 属性**
//!   （不是父节点解析后的完整路径）以 `/` 拼接到前面，然后从父节点继续向上
//! - 父节点 path 为空或 `/` 时立即停止，结果就是当前已拼接的路径
//! - 非路由祖先直接跳过
//! - 最后补齐前导 `/`，去掉结尾 `/`（整条路径就是 `/` 时除外）
//!
//! 解析永远不会失败，畸形输入得到尽力而为的路径。

/// 元素树的祖先查询接口
///
/// 路径解析不依赖真实 DOM，任何能回答“父元素是谁”和
/// “该元素是否为路由节点、声明的 path 是什么”的结构都可以使用。
pub trait Ancestry {
    /// 元素标识
    type Id: Copy;

    /// 父元素，到达根时返回 None
    fn parent(&self, id: Self::Id) -> Option<Self::Id>;

    /// 若元素是路由节点，返回其声明的 path 属性
    fn route_path(&self, id: Self::Id) -> Option<&str>;
}

/// 计算节点的完整路径
///
/// # Arguments
///
/// * `declared` - 节点声明的 path（以 `/` 开头视为绝对，否则相对父路由）
/// * `node` - 节点在树中的标识
/// * `tree` - 祖先查询接口
///
/// # Example
///
/// ```
/// use native_route::element::ElementTree;
/// use native_route::router::path::resolve_full_path;
///
/// let mut tree = ElementTree::new();
/// let parent = tree.insert_route(tree.root(), "/root").unwrap();
/// let child = tree.insert_route(parent, "child").unwrap();
///
/// assert_eq!(resolve_full_path("child", child, &tree), "/root/child");
/// ```
pub fn resolve_full_path<A: Ancestry>(declared: &str, node: A::Id, tree: &A) -> String {
    let mut url = declared.to_string();
    let mut current = node;

    while let Some(parent) = tree.parent(current) {
        if let Some(parent_path) = tree.route_path(parent) {
            let joined = if url.starts_with('/') {
                url
            } else {
                format!("/{}", url)
            };
            if parent_path.is_empty() || parent_path == "/" {
                return normalize(&joined);
            }
            url = format!("{}{}", parent_path, joined);
        }
        current = parent;
    }

    normalize(&url)
}

/// 规范化路径：保证前导 `/`，去掉结尾 `/`
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
