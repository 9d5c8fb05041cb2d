//! Native Route 命令行入口
//!
//! 声明式路由的命令行工具，用于检查配置、查看路由树的解析结果以及回放导航。
//!
//! # 命令概览
//!
//! - `version` - 显示版本信息
//! - `check-config` - 验证配置文件
//! - `resolve` - 打印路由树中每个节点的完整路径与匹配分段
//! - `simulate` - 构建路由树并回放导航脚本，打印每一步后的状态
//!
//! # 使用示例
//!
//! ```bash
//! # 检查配置文件
//! native-route check-config -c config.yaml
//!
//! # 查看路由树在某个地址下的匹配结果
//! native-route resolve routes.yaml --url /root/hello
//!
//! # 回放导航脚本
//! native-route simulate routes.yaml --json
//! ```

use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use native_route::element::{FsStyleFetcher, MountPoint};
use native_route::{
    ComponentModule, CoreConfig, HostSnapshot, LogGuard, Logger, LoggerConfig, NavigationNotifier,
    NavigationStep, RouteDecl, RouteHost, RouteTreeConfig, StaticComponentLoader,
};

/// Native Route - 声明式客户端路由
#[derive(Parser)]
#[command(name = "native-route")]
#[command(version, about = "声明式客户端路由的调试工具", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: PathBuf,

    /// 日志级别 (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 开发模式（显示文件与行号）
    #[arg(long, global = true)]
    dev: bool,

    /// 子命令
    #[command(subcommand)]
    command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 查看版本信息
    Version,

    /// 验证配置文件
    ///
    /// 检查配置文件是否有效，并显示解析后的配置内容。
    CheckConfig {
        /// 配置文件路径（不指定则使用全局 -c 选项）
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
    },

    /// 打印路由树的解析结果
    ///
    /// 显示每个路由节点的完整路径、匹配分段，以及在给定地址下的 active / exact。
    Resolve {
        /// 路由树声明文件
        tree: PathBuf,

        /// 判定使用的地址（不指定则使用声明中的 initial-url）
        #[arg(short, long)]
        url: Option<String>,
    },

    /// 回放导航脚本
    ///
    /// 组件模块以占位实现代替，样式从声明文件所在目录读取。
    Simulate {
        /// 路由树声明文件
        tree: PathBuf,

        /// 以 JSON 输出每一步的快照
        #[arg(long)]
        json: bool,
    },
}

/// 初始化日志系统
fn init_logging(config: &CoreConfig, level: Option<&str>, dev_mode: bool) -> LogGuard {
    let mut logger = LoggerConfig::from_log_config(&config.logging);
    if let Some(level) = level {
        logger.level = level.to_string();
    }
    logger.show_file_line = dev_mode;
    Logger::try_init(logger)
}

/// 加载配置文件
async fn load_config(path: &Path, dev_mode: bool) -> Result<CoreConfig, Box<dyn std::error::Error>> {
    let mut config = if path.exists() {
        CoreConfig::from_file(path).await?
    } else {
        // 命令行默认只输出警告，避免日志与结果混在一起
        CoreConfig::builder().log_level("warn").build()
    };
    if dev_mode {
        config.dev_mode = true;
    }
    Ok(config)
}

/// 检查配置文件
async fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("检查配置文件: {}", path.display());
    println!();

    if !path.exists() {
        println!("⚠️  警告: 配置文件不存在，将使用默认配置");
        println!();
        print_config(&CoreConfig::default());
        return Ok(());
    }

    match CoreConfig::from_file(path).await {
        Ok(config) => {
            println!("✅ 配置文件有效！");
            println!();
            print_config(&config);
            Ok(())
        }
        Err(e) => {
            println!("❌ 配置文件无效: {}", e);
            Err(Box::new(e))
        }
    }
}

/// 打印配置内容
fn print_config(config: &CoreConfig) {
    let router = &config.router;
    println!("配置内容:");
    println!("────────────────────────────────────────");
    println!("  [路由配置]");
    println!("    默认缓存时长:   {} ms", router.default_cache_valid_ms);
    println!("    样式轮询间隔:   {} ms", router.css_poll_interval_ms);
    println!("    样式轮询上限:   {} ms", router.css_poll_timeout_ms);
    match router.default_lock_loading_ms {
        Some(ms) => println!("    最短加载展示:   {} ms", ms),
        None => println!("    最短加载展示:   无"),
    }
    println!("    全局通知器:     {}", if router.install_global_notifier { "是" } else { "否" });
    println!();
    println!("  [日志配置]");
    println!("    日志级别:       {}", config.logging.level);
    println!("    文件输出:       {}", if config.logging.file_output { "是" } else { "否" });
    println!("    JSON 格式:      {}", if config.logging.json_format { "是" } else { "否" });
    println!();
    println!("  [其他]");
    println!("    开发模式:       {}", if config.dev_mode { "是" } else { "否" });
    println!("────────────────────────────────────────");
}

/// 打印版本信息
fn print_version() {
    println!();
    println!("Native Route - 声明式客户端路由");
    println!("═══════════════════════════════════════");
    println!("  版本:             {}", native_route::VERSION);
    println!();
    println!("构建信息:");
    println!("  目标平台:         {}", std::env::consts::ARCH);
    println!("  操作系统:         {}", std::env::consts::OS);
    println!("═══════════════════════════════════════");
    println!();
}

/// 为声明中出现的每个模块地址注册占位模块
fn stub_loader(tree: &RouteTreeConfig) -> StaticComponentLoader {
    fn collect<'a>(decls: &'a [RouteDecl], out: &mut Vec<&'a RouteDecl>) {
        for decl in decls {
            out.push(decl);
            collect(&decl.children, out);
        }
    }

    let mut decls = Vec::new();
    collect(&tree.routes, &mut decls);

    let loader = StaticComponentLoader::new();
    let mut seen = HashSet::new();
    for decl in decls {
        let Some(url) = decl.attributes.url.clone() else {
            continue;
        };
        if !seen.insert(url.clone()) {
            continue;
        }
        let export = decl
            .attributes
            .custom_render
            .export_name()
            .unwrap_or(native_route::element::attributes::DEFAULT_RENDER_EXPORT)
            .to_string();
        let markup = format!("<div data-module=\"{}\"></div>", url);
        loader.register(
            ComponentModule::new(url)
                .with_render(export, move |mount: &mut MountPoint| {
                    mount.append(markup.clone());
                    Ok(())
                })
                .with_destroy(|| Ok(())),
        );
    }
    loader
}

async fn build_host(
    config: &CoreConfig,
    tree_path: &Path,
    initial_url: Option<&str>,
) -> Result<(RouteHost, RouteTreeConfig), Box<dyn std::error::Error>> {
    let tree = RouteTreeConfig::from_file(tree_path).await?;
    let url = initial_url.unwrap_or(&tree.initial_url);
    let notifier = NavigationNotifier::with_initial_url(url)?;
    let base_dir = tree_path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut host = RouteHost::builder()
        .config(config.router.clone())
        .notifier(notifier)
        .component_loader(Arc::new(stub_loader(&tree)))
        .style_fetcher(Arc::new(FsStyleFetcher::new(base_dir)))
        .build();
    host.mount_declaration(&tree)?;
    host.run_until_idle().await?;
    Ok((host, tree))
}

/// 打印路由树的解析结果
async fn resolve(
    config: &CoreConfig,
    tree_path: &Path,
    url: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (host, _) = build_host(config, tree_path, url).await?;
    let snapshot = host.snapshot();

    println!("地址: {}", snapshot.pathname);
    println!("────────────────────────────────────────");
    for route in &snapshot.routes {
        println!(
            "  {:<24} active={:<5} exact={:<5} [{}]",
            route.full_path,
            route.active,
            route.exact,
            route.segments.join(", ")
        );
    }
    println!("────────────────────────────────────────");
    Ok(())
}

fn print_snapshot(step: &str, snapshot: &HostSnapshot, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        let value = serde_json::json!({ "step": step, "snapshot": snapshot });
        println!("{}", serde_json::to_string(&value)?);
        return Ok(());
    }

    println!("[{}] {}", step, snapshot.pathname);
    for route in &snapshot.routes {
        println!(
            "    {:<24} active={:<5} exact={:<5} module={} style={} renders={} teardowns={}",
            route.full_path,
            route.active,
            route.exact,
            route.module_state,
            route.style_state,
            route.render_invocations,
            route.teardown_invocations
        );
    }
    for container in &snapshot.containers {
        println!(
            "    container {:<14} status={}",
            container.root_path, container.status
        );
    }
    Ok(())
}

fn describe(step: &NavigationStep) -> String {
    match step {
        NavigationStep::Push { url } => format!("push {}", url),
        NavigationStep::Replace { url } => format!("replace {}", url),
        NavigationStep::Back => "back".to_string(),
        NavigationStep::Forward => "forward".to_string(),
        NavigationStep::Go { delta } => format!("go {}", delta),
        NavigationStep::Wait { ms } => format!("wait {}ms", ms),
    }
}

/// 回放导航脚本
async fn simulate(
    config: &CoreConfig,
    tree_path: &Path,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut host, tree) = build_host(config, tree_path, None).await?;
    info!(steps = tree.navigation.len(), "开始回放导航脚本");

    print_snapshot("initial", &host.snapshot(), json)?;
    for step in &tree.navigation {
        host.replay(std::slice::from_ref(step)).await?;
        print_snapshot(&describe(step), &host.snapshot(), json)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => print_version(),

        Commands::CheckConfig { file } => {
            let path = file.unwrap_or(cli.config);
            check_config(&path).await?;
        }

        Commands::Resolve { tree, url } => {
            let config = load_config(&cli.config, cli.dev).await?;
            let _guard = init_logging(&config, cli.log_level.as_deref(), cli.dev);
            resolve(&config, &tree, url.as_deref()).await?;
        }

        Commands::Simulate { tree, json } => {
            let config = load_config(&cli.config, cli.dev).await?;
            let _guard = init_logging(&config, cli.log_level.as_deref(), cli.dev);
            simulate(&config, &tree, json).await?;
        }
    }

    Ok(())
}
