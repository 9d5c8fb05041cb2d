//! 声明式属性
//!
//! 路由节点与路由容器的配置面。属性既可以逐个以字符串形式设置
//! （对应 DOM attribute，[`RouteAttributes::apply`]），
//! 也可以整体从 YAML/JSON 反序列化（字段名使用 kebab-case）。
//!
//! 布尔属性遵循 DOM 语义：只要属性存在就是 true，移除才是 false。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::trace;

use crate::utils::{Result, RouteError};

/// 默认渲染导出名
pub const DEFAULT_RENDER_EXPORT: &str = "render";

/// 插槽位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppendDirection {
    /// 插槽位于内容之前
    Before,
    /// 插槽位于内容之后
    #[default]
    After,
}

impl AppendDirection {
    /// 解析属性值，非 `before` 一律视为 `after`
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("before") {
            AppendDirection::Before
        } else {
            AppendDirection::After
        }
    }
}

/// 自定义渲染配置
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CustomRender {
    /// 不使用自定义渲染，直接输出 element 属性的标记
    #[default]
    Disabled,
    /// 调用模块的 `render` 导出
    Default,
    /// 调用模块的指定导出
    Named(String),
}

impl CustomRender {
    /// 解析属性值：空串或 `true` 为默认导出，`false` 为关闭，其余为导出名
    pub fn parse(value: &str) -> Self {
        match value {
            "" | "true" => CustomRender::Default,
            "false" => CustomRender::Disabled,
            name => CustomRender::Named(name.to_string()),
        }
    }

    /// 是否启用
    pub fn is_enabled(&self) -> bool {
        !matches!(self, CustomRender::Disabled)
    }

    /// 需要调用的导出名
    pub fn export_name(&self) -> Option<&str> {
        match self {
            CustomRender::Disabled => None,
            CustomRender::Default => Some(DEFAULT_RENDER_EXPORT),
            CustomRender::Named(name) => Some(name.as_str()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CustomRenderRepr {
    Flag(bool),
    Export(String),
}

impl Serialize for CustomRender {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CustomRender::Disabled => CustomRenderRepr::Flag(false),
            CustomRender::Default => CustomRenderRepr::Flag(true),
            CustomRender::Named(name) => CustomRenderRepr::Export(name.clone()),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CustomRender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match CustomRenderRepr::deserialize(deserializer)? {
            CustomRenderRepr::Flag(true) => CustomRender::Default,
            CustomRenderRepr::Flag(false) => CustomRender::Disabled,
            CustomRenderRepr::Export(value) => CustomRender::parse(&value),
        })
    }
}

/// 样式来源（单个地址或地址列表）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CssSources(Vec<String>);

impl CssSources {
    /// 由地址列表构造，忽略空地址
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            sources
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.trim().is_empty())
                .collect(),
        )
    }

    /// 解析属性值：以 `[` 开头按 JSON 数组解析，否则视为单个地址
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.starts_with('[') {
            let list: Vec<String> =
                serde_json::from_str(trimmed).map_err(|e| RouteError::InvalidAttribute {
                    name: "css-url".to_string(),
                    reason: e.to_string(),
                })?;
            Ok(Self::new(list))
        } else {
            Ok(Self::new([trimmed]))
        }
    }

    /// 是否配置了样式
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 地址数量
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 按声明顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// 转为列表
    pub fn to_vec(&self) -> Vec<String> {
        self.0.clone()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CssSourcesRepr {
    One(String),
    Many(Vec<String>),
}

impl Serialize for CssSources {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [single] => CssSourcesRepr::One(single.clone()),
            _ => CssSourcesRepr::Many(self.0.clone()),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CssSources {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match CssSourcesRepr::deserialize(deserializer)? {
            CssSourcesRepr::One(value) => {
                CssSources::parse(&value).map_err(serde::de::Error::custom)
            }
            CssSourcesRepr::Many(list) => Ok(CssSources::new(list)),
        }
    }
}

/// 路由节点属性
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RouteAttributes {
    /// 声明的 path，以 `/` 开头为绝对路径，否则相对父路由
    pub path: String,

    /// 只接受完全匹配
    pub exact: bool,

    /// 非自定义渲染时输出的标记
    pub element: String,

    /// 组件模块地址
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// 激活时才加载资源
    pub lazy: bool,

    /// 插槽位置
    pub append_direction: AppendDirection,

    /// 自定义渲染
    pub custom_render: CustomRender,

    /// 资源就绪前显示加载占位
    pub render_after_ready: bool,

    /// 不使用隔离渲染根
    pub disable_shadow: bool,

    /// 样式来源
    #[serde(alias = "shadow-css-url", skip_serializing_if = "CssSources::is_empty")]
    pub css_url: CssSources,

    /// 失活后保留实例的时长（毫秒），缺省使用全局配置
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_valid_time: Option<u64>,

    /// 分组匹配模式
    #[serde(alias = "groupmatchmode")]
    pub group_match_mode: bool,

    /// 不缓存：每次激活都重新渲染，失活立即卸载
    pub drop: bool,

    /// 容器汇总时忽略此节点
    pub virtual_node: bool,

    /// 加载占位标记
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loading_element: Option<String>,

    /// 最短加载展示时间（毫秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_loading_time: Option<u64>,
}

impl RouteAttributes {
    /// 以 path 创建
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// 由属性列表构造
    pub fn from_attributes<'a, I>(attributes: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut result = Self::default();
        for (name, value) in attributes {
            result.apply(name, Some(value))?;
        }
        Ok(result)
    }

    /// 设置或移除单个属性
    ///
    /// `value` 为 None 表示移除属性。返回属性名是否可识别，
    /// 未知属性被忽略。
    pub fn apply(&mut self, name: &str, value: Option<&str>) -> Result<bool> {
        let present = value.is_some();
        let text = value.unwrap_or_default();
        trace!(attribute = %name, value = ?value, "应用路由属性");

        match name.to_ascii_lowercase().as_str() {
            "path" => self.path = text.to_string(),
            "exact" => self.exact = present,
            "element" => self.element = text.to_string(),
            "url" => self.url = value.filter(|v| !v.is_empty()).map(str::to_string),
            "lazy" => self.lazy = present,
            "append-direction" => self.append_direction = AppendDirection::parse(text),
            "custom-render" => {
                self.custom_render = match value {
                    Some(v) => CustomRender::parse(v),
                    None => CustomRender::Disabled,
                }
            }
            "render-after-ready" => self.render_after_ready = present,
            "disable-shadow" => self.disable_shadow = present,
            "css-url" | "shadow-css-url" => {
                self.css_url = match value {
                    Some(v) => CssSources::parse(v)?,
                    None => CssSources::default(),
                }
            }
            "cache-valid-time" => self.cache_valid_time = parse_millis(name, value)?,
            "group-match-mode" | "groupmatchmode" => self.group_match_mode = present,
            "drop" => self.drop = present,
            "virtual-node" => self.virtual_node = present,
            "loading-element" => {
                self.loading_element = value.filter(|v| !v.is_empty()).map(str::to_string)
            }
            "lock-loading-time" => self.lock_loading_time = parse_millis(name, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// 是否配置了样式
    pub fn has_styles(&self) -> bool {
        !self.css_url.is_empty()
    }

    /// 是否有需要加载的资源
    pub fn has_assets(&self) -> bool {
        self.url.is_some() || self.has_styles()
    }
}

fn parse_millis(name: &str, value: Option<&str>) -> Result<Option<u64>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => v
            .parse::<u64>()
            .map(Some)
            .map_err(|e| RouteError::InvalidAttribute {
                name: name.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// 路由容器属性
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ContainerAttributes {
    /// 容器作用范围
    pub root_path: String,

    /// 未匹配时显示的文本
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_found: Option<String>,

    /// 使用隔离渲染根
    pub isolated_render_root: bool,
}

impl Default for ContainerAttributes {
    fn default() -> Self {
        Self {
            root_path: "/".to_string(),
            not_found: None,
            isolated_render_root: false,
        }
    }
}

impl ContainerAttributes {
    /// 设置或移除单个属性
    pub fn apply(&mut self, name: &str, value: Option<&str>) -> Result<bool> {
        match name.to_ascii_lowercase().as_str() {
            "root-path" => {
                self.root_path = value
                    .filter(|v| !v.is_empty())
                    .unwrap_or("/")
                    .to_string()
            }
            "not-found" => self.not_found = value.map(str::to_string),
            "isolated-render-root" => self.isolated_render_root = value.is_some(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}
