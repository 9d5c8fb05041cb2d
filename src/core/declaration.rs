//! 路由树声明
//!
//! 以 YAML/JSON 描述一棵路由树（可选的容器 + 嵌套路由）以及一段导航脚本，
//! 命令行据此构建宿主并回放导航。
//!
//! ```yaml
//! initial-url: /
//! container:
//!   root-path: /
//!   not-found: "404"
//! routes:
//!   - path: /root
//!     children:
//!       - path: ":(?:hello)|(?:world)"
//!         group-match-mode: true
//! navigation:
//!   - action: push
//!     url: /root/hello
//!   - action: wait
//!     ms: 100
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::element::attributes::{ContainerAttributes, RouteAttributes};
use crate::utils::{Result, RouteError};

/// 路由声明
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteDecl {
    /// 节点属性
    #[serde(flatten)]
    pub attributes: RouteAttributes,

    /// 子路由
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RouteDecl>,
}

impl RouteDecl {
    /// 当前声明及其全部子声明的数量
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(RouteDecl::count).sum::<usize>()
    }
}

/// 导航步骤
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum NavigationStep {
    /// 压入地址
    Push { url: String },
    /// 替换地址
    Replace { url: String },
    /// 后退
    Back,
    /// 前进
    Forward,
    /// 按偏移移动
    Go { delta: i64 },
    /// 推进时间（毫秒），让加载与计时器有机会完成
    Wait { ms: u64 },
}

fn default_initial_url() -> String {
    "/".to_string()
}

/// 路由树声明
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RouteTreeConfig {
    /// 初始地址
    #[serde(default = "default_initial_url")]
    pub initial_url: String,

    /// 外层容器，缺省时路由直接挂在根下
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerAttributes>,

    /// 顶层路由
    #[serde(default)]
    pub routes: Vec<RouteDecl>,

    /// 导航脚本
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub navigation: Vec<NavigationStep>,
}

impl Default for RouteTreeConfig {
    fn default() -> Self {
        Self {
            initial_url: default_initial_url(),
            container: None,
            routes: Vec::new(),
            navigation: Vec::new(),
        }
    }
}

impl RouteTreeConfig {
    /// 从 YAML 文本解析
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// 从文件加载（`.json` 按 JSON 解析，其余按 YAML）
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| RouteError::ConfigLoadFailed(format!("{}: {}", path.display(), e)))?;

        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Ok(serde_json::from_str(&content)?)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// 声明的路由总数
    pub fn route_count(&self) -> usize {
        self.routes.iter().map(RouteDecl::count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::attributes::CustomRender;

    const TREE: &str = r#"
initial-url: /root
container:
  root-path: /
  not-found: "404"
routes:
  - path: /root
    element: "<h1>root</h1>"
    children:
      - path: ":(?:hello)|(?:world)"
        group-match-mode: true
        custom-render: true
        url: /hello.js
navigation:
  - action: push
    url: /root/hello
  - action: go
    delta: -1
  - action: wait
    ms: 20
  - action: back
"#;

    #[test]
    fn test_parse_tree() {
        let tree = RouteTreeConfig::from_yaml_str(TREE).unwrap();
        assert_eq!(tree.initial_url, "/root");
        assert_eq!(tree.route_count(), 2);
        assert_eq!(tree.container.as_ref().unwrap().not_found.as_deref(), Some("404"));

        let child = &tree.routes[0].children[0];
        assert!(child.attributes.group_match_mode);
        assert_eq!(child.attributes.custom_render, CustomRender::Default);
        assert_eq!(child.attributes.url.as_deref(), Some("/hello.js"));

        assert_eq!(
            tree.navigation,
            vec![
                NavigationStep::Push {
                    url: "/root/hello".to_string()
                },
                NavigationStep::Go { delta: -1 },
                NavigationStep::Wait { ms: 20 },
                NavigationStep::Back,
            ]
        );
    }

    #[test]
    fn test_defaults() {
        let tree = RouteTreeConfig::from_yaml_str("routes: []").unwrap();
        assert_eq!(tree.initial_url, "/");
        assert!(tree.container.is_none());
        assert!(tree.navigation.is_empty());
    }

    #[tokio::test]
    async fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        std::fs::write(&path, r#"{"routes": [{"path": "/a", "exact": true}]}"#).unwrap();

        let tree = RouteTreeConfig::from_file(&path).await.unwrap();
        assert!(tree.routes[0].attributes.exact);

        let missing = RouteTreeConfig::from_file(dir.path().join("nope.yaml")).await;
        assert!(matches!(missing, Err(RouteError::ConfigLoadFailed(_))));
    }
}
