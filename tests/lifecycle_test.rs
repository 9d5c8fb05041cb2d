//! 路由节点生命周期集成测试
//!
//! 覆盖资源加载、自定义渲染、缓存回收与错误渲染。
//! 计时相关的用例使用暂停的 tokio 时钟。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use native_route::element::{CssSources, EvictionState, MountPoint, RenderOutcome};
use native_route::{
    ComponentModule, CoreConfig, CustomRender, ElementId, LoadState, NavigationNotifier,
    RouteAttributes, RouteError, RouteEvent, RouteEventKind, RouteHost, StaticComponentLoader,
    StaticStyleFetcher,
};

// ============================================================================
// 测试辅助
// ============================================================================

struct Fixture {
    host: RouteHost,
    loader: Arc<StaticComponentLoader>,
    styles: Arc<StaticStyleFetcher>,
    teardowns: Arc<AtomicUsize>,
}

fn fixture(config: CoreConfig) -> Fixture {
    let loader = Arc::new(StaticComponentLoader::new());
    let styles = Arc::new(StaticStyleFetcher::new());
    let teardowns = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&teardowns);
    loader.register(
        ComponentModule::new("/page.js")
            .with_render("render", |mount: &mut MountPoint| {
                mount.append("<p>page</p>");
                Ok(())
            })
            .with_destroy(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
    );

    let host = RouteHost::builder()
        .config(config.router)
        .notifier(NavigationNotifier::new())
        .component_loader(loader.clone())
        .style_fetcher(styles.clone())
        .build();

    Fixture {
        host,
        loader,
        styles,
        teardowns,
    }
}

fn custom_page(path: &str) -> RouteAttributes {
    let mut attrs = RouteAttributes::new(path);
    attrs.url = Some("/page.js".to_string());
    attrs.custom_render = CustomRender::Default;
    attrs
}

async fn go(host: &mut RouteHost, url: &str) {
    host.navigate(url).unwrap();
    host.run_until_idle().await.unwrap();
}

fn cache_config(ms: u64) -> CoreConfig {
    CoreConfig::builder()
        .isolated_notifier()
        .cache_valid_ms(ms)
        .build()
}

// ============================================================================
// 资源加载
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_eager_load_without_render() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let page = f.host.append_route(root, custom_page("/page")).unwrap();
    f.host.run_until_idle().await.unwrap();

    assert_eq!(f.loader.load_count(), 1);
    let node = f.host.route(page).unwrap();
    assert_eq!(node.module_state(), LoadState::Ready);
    assert_eq!(node.render_invocations(), 0);
    assert_eq!(node.outcome(), RenderOutcome::Empty);
}

#[tokio::test(start_paused = true)]
async fn test_lazy_load_on_activation() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let mut attrs = custom_page("/page");
    attrs.lazy = true;
    let page = f.host.append_route(root, attrs).unwrap();
    f.host.run_until_idle().await.unwrap();
    assert_eq!(f.loader.load_count(), 0);

    go(&mut f.host, "/page").await;
    assert_eq!(f.loader.load_count(), 1);
    let node = f.host.route(page).unwrap();
    assert_eq!(node.module_state(), LoadState::Ready);
    assert_eq!(node.render_invocations(), 1);
    assert!(node.html().contains("<p>page</p>"));

    // 已就绪的模块不会重复加载
    go(&mut f.host, "/").await;
    go(&mut f.host, "/page").await;
    assert_eq!(f.loader.load_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_load_resolving_after_deactivation_does_not_render() {
    let mut f = fixture(cache_config(1000));
    f.loader.register_with_delay(
        ComponentModule::new("/slow.js").with_render("render", |mount: &mut MountPoint| {
            mount.append("<p>slow</p>");
            Ok(())
        }),
        Duration::from_millis(200),
    );
    let root = f.host.tree().root();
    let mut attrs = custom_page("/slow");
    attrs.url = Some("/slow.js".to_string());
    attrs.lazy = true;
    let slow = f.host.append_route(root, attrs).unwrap();

    f.host.navigate("/slow").unwrap();
    f.host.process_pending().unwrap();
    assert_eq!(f.host.route(slow).unwrap().module_state(), LoadState::Loading);

    f.host.navigate("/elsewhere").unwrap();
    f.host.run_until_idle().await.unwrap();

    let node = f.host.route(slow).unwrap();
    assert_eq!(node.module_state(), LoadState::Ready);
    assert_eq!(node.render_invocations(), 0);
    assert_eq!(node.eviction_state(), EvictionState::Idle);

    go(&mut f.host, "/slow").await;
    assert_eq!(f.host.route(slow).unwrap().render_invocations(), 1);
    assert_eq!(f.loader.load_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_lock_loading_time_shows_placeholder() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let mut attrs = custom_page("/page");
    attrs.lazy = true;
    attrs.render_after_ready = true;
    attrs.loading_element = Some("<i>loading</i>".to_string());
    attrs.lock_loading_time = Some(300);
    let page = f.host.append_route(root, attrs).unwrap();

    f.host.navigate("/page").unwrap();
    f.host.run_for(Duration::from_millis(100)).await.unwrap();
    let node = f.host.route(page).unwrap();
    assert_eq!(node.module_state(), LoadState::Loading);
    assert_eq!(node.outcome(), RenderOutcome::Loading);
    assert!(node.html().contains("<i>loading</i>"));

    f.host.run_until_idle().await.unwrap();
    let node = f.host.route(page).unwrap();
    assert_eq!(node.module_state(), LoadState::Ready);
    assert_eq!(node.outcome(), RenderOutcome::Content);
    assert_eq!(node.render_invocations(), 1);
}

// ============================================================================
// 样式
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_styles_concatenated_in_order() {
    let mut f = fixture(cache_config(1000));
    f.styles.insert("a.css", ".a { color: red; }");
    f.styles.insert("b.css", ".b { color: blue; }");

    let root = f.host.tree().root();
    let mut attrs = RouteAttributes::new("/styled");
    attrs.element = "<h1>styled</h1>".to_string();
    attrs.css_url = CssSources::new(["a.css", "b.css"]);
    attrs.render_after_ready = true;
    let styled = f.host.append_route(root, attrs).unwrap();

    go(&mut f.host, "/styled").await;
    let node = f.host.route(styled).unwrap();
    assert_eq!(node.style_state(), LoadState::Ready);
    assert_eq!(node.css_content(), ".a { color: red; }\n.b { color: blue; }");
    assert!(node.html().contains("<style>.a { color: red; }\n.b { color: blue; }</style>"));
    assert!(node.html().contains("<h1>styled</h1>"));
}

#[tokio::test(start_paused = true)]
async fn test_style_parse_timeout_fails() {
    let config = CoreConfig::builder()
        .isolated_notifier()
        .css_poll(50, 500)
        .build();
    let mut f = fixture(config);
    f.styles.insert("broken.css", "this is not a stylesheet");

    let root = f.host.tree().root();
    let mut attrs = RouteAttributes::new("/broken");
    attrs.element = "<h1>broken</h1>".to_string();
    attrs.css_url = CssSources::new(["broken.css"]);
    attrs.render_after_ready = true;
    let broken = f.host.append_route(root, attrs).unwrap();
    f.host
        .set_error_render(broken, Arc::new(|e: &RouteError| format!("<b>{}</b>", e.error_code())))
        .unwrap();

    go(&mut f.host, "/broken").await;
    let node = f.host.route(broken).unwrap();
    assert_eq!(node.style_state(), LoadState::Failed);
    assert_eq!(node.outcome(), RenderOutcome::Error);
    assert!(node.html().contains("<b>"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_style_source_fails() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let mut attrs = RouteAttributes::new("/nostyle");
    attrs.css_url = CssSources::new(["missing.css"]);
    let node_id = f.host.append_route(root, attrs).unwrap();

    go(&mut f.host, "/nostyle").await;
    let node = f.host.route(node_id).unwrap();
    assert_eq!(node.style_state(), LoadState::Failed);
    // 没有错误渲染器时照常输出内容
    assert_eq!(node.outcome(), RenderOutcome::Content);
}

// ============================================================================
// 缓存回收
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_eviction_cycle() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let page = f.host.append_route(root, custom_page("/page")).unwrap();

    go(&mut f.host, "/page").await;
    assert_eq!(f.host.route(page).unwrap().render_invocations(), 1);

    // 失活：只启动一个计时器
    go(&mut f.host, "/other").await;
    let node = f.host.route(page).unwrap();
    assert_eq!(node.eviction_state(), EvictionState::Armed);
    assert_eq!(node.eviction_armed_count(), 1);

    // 到期前重新激活：取消，不卸载，不重复渲染
    f.host.run_for(Duration::from_millis(500)).await.unwrap();
    go(&mut f.host, "/page").await;
    let node = f.host.route(page).unwrap();
    assert_eq!(node.eviction_state(), EvictionState::Idle);
    assert_eq!(f.teardowns.load(Ordering::SeqCst), 0);
    assert_eq!(node.render_invocations(), 1);
    assert!(node.html().contains("<p>page</p>"));

    // 到期：卸载一次并标记回收
    go(&mut f.host, "/other").await;
    f.host.run_for(Duration::from_millis(1500)).await.unwrap();
    let node = f.host.route(page).unwrap();
    assert_eq!(f.teardowns.load(Ordering::SeqCst), 1);
    assert_eq!(node.teardown_invocations(), 1);
    assert!(node.is_evicted());
    assert_eq!(node.eviction_state(), EvictionState::Fired);

    // 再次激活：渲染恰好一次
    go(&mut f.host, "/page").await;
    let node = f.host.route(page).unwrap();
    assert_eq!(node.render_invocations(), 2);
    assert!(!node.is_evicted());
    assert_eq!(node.eviction_state(), EvictionState::Idle);
    assert_eq!(node.render_root().mount().map(MountPoint::children).map(<[String]>::len), Some(1));
}

#[tokio::test(start_paused = true)]
async fn test_node_cache_valid_time_overrides_default() {
    let mut f = fixture(cache_config(60_000));
    let root = f.host.tree().root();
    let mut attrs = custom_page("/page");
    attrs.cache_valid_time = Some(100);
    let page = f.host.append_route(root, attrs).unwrap();

    go(&mut f.host, "/page").await;
    go(&mut f.host, "/other").await;
    f.host.run_for(Duration::from_millis(200)).await.unwrap();

    assert!(f.host.route(page).unwrap().is_evicted());
    assert_eq!(f.teardowns.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_tears_down_immediately() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let mut attrs = custom_page("/page");
    attrs.drop = true;
    let page = f.host.append_route(root, attrs).unwrap();

    go(&mut f.host, "/page").await;
    assert_eq!(f.host.route(page).unwrap().render_invocations(), 1);

    go(&mut f.host, "/other").await;
    let node = f.host.route(page).unwrap();
    assert_eq!(f.teardowns.load(Ordering::SeqCst), 1);
    assert_eq!(node.eviction_armed_count(), 0);
    assert_eq!(node.eviction_state(), EvictionState::Idle);

    go(&mut f.host, "/page").await;
    let node = f.host.route(page).unwrap();
    assert_eq!(node.render_invocations(), 2);
    assert_eq!(node.render_root().mount().map(MountPoint::children).map(<[String]>::len), Some(1));

    f.host.run_for(Duration::from_millis(5000)).await.unwrap();
    assert_eq!(f.teardowns.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_removed_node_never_fires() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let page = f.host.append_route(root, custom_page("/page")).unwrap();

    go(&mut f.host, "/page").await;
    go(&mut f.host, "/other").await;
    f.host.remove(page).unwrap();
    f.host.run_for(Duration::from_millis(2000)).await.unwrap();

    assert_eq!(f.teardowns.load(Ordering::SeqCst), 0);
    assert!(f.host.route(page).is_err());
    assert_eq!(f.host.notifier().subscriber_count(), 0);
}

// ============================================================================
// 错误处理
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_module_failure_uses_error_render() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let mut attrs = custom_page("/broken");
    attrs.url = Some("/missing.js".to_string());
    let broken = f.host.append_route(root, attrs).unwrap();
    f.host
        .set_error_render(broken, Arc::new(|e: &RouteError| format!("<b>{}</b>", e.error_code())))
        .unwrap();

    go(&mut f.host, "/broken").await;
    let node = f.host.route(broken).unwrap();
    assert_eq!(node.module_state(), LoadState::Failed);
    assert_eq!(node.outcome(), RenderOutcome::Error);
    assert_eq!(node.render_invocations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_module_failure_without_error_render_is_silent() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let mut attrs = custom_page("/broken");
    attrs.url = Some("/missing.js".to_string());
    let broken = f.host.append_route(root, attrs).unwrap();

    go(&mut f.host, "/broken").await;
    let node = f.host.route(broken).unwrap();
    assert_eq!(node.module_state(), LoadState::Failed);
    assert_eq!(node.render_invocations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_render_export_is_fatal() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let mut attrs = custom_page("/page");
    attrs.custom_render = CustomRender::Named("mount".to_string());
    f.host.append_route(root, attrs).unwrap();

    f.host.navigate("/page").unwrap();
    let result = f.host.run_until_idle().await;
    assert!(matches!(result, Err(RouteError::MissingRenderExport { ref export }) if export == "mount"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_render_export_with_error_render() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let mut attrs = custom_page("/page");
    attrs.custom_render = CustomRender::Named("mount".to_string());
    let page = f.host.append_route(root, attrs).unwrap();
    f.host
        .set_error_render(page, Arc::new(|e: &RouteError| format!("<b>{}</b>", e.error_code())))
        .unwrap();

    go(&mut f.host, "/page").await;
    let node = f.host.route(page).unwrap();
    assert_eq!(node.outcome(), RenderOutcome::Error);
    assert!(node.html().contains("<b>"));
}

#[tokio::test(start_paused = true)]
async fn test_render_error_clears_when_export_fixed() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let mut attrs = custom_page("/page");
    attrs.custom_render = CustomRender::Named("mount".to_string());
    let page = f.host.append_route(root, attrs).unwrap();
    f.host
        .set_error_render(page, Arc::new(|e: &RouteError| format!("<b>{}</b>", e.error_code())))
        .unwrap();

    go(&mut f.host, "/page").await;
    assert_eq!(f.host.route(page).unwrap().outcome(), RenderOutcome::Error);

    f.host
        .set_route_attribute(page, "custom-render", Some("render"))
        .unwrap();
    f.host.run_until_idle().await.unwrap();
    let node = f.host.route(page).unwrap();
    assert_eq!(node.outcome(), RenderOutcome::Content);
    assert_eq!(node.render_invocations(), 1);
    assert!(node.html().contains("<p>page</p>"));

    // 缓存期内重新激活复用已渲染的实例
    go(&mut f.host, "/").await;
    go(&mut f.host, "/page").await;
    let node = f.host.route(page).unwrap();
    assert_eq!(node.outcome(), RenderOutcome::Content);
    assert_eq!(node.render_invocations(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_module_load_is_discarded() {
    let mut f = fixture(cache_config(1000));
    f.loader.register_with_delay(
        ComponentModule::new("/slow.js").with_render("render", |mount: &mut MountPoint| {
            mount.append("<p>slow</p>");
            Ok(())
        }),
        Duration::from_millis(500),
    );
    f.loader.register(
        ComponentModule::new("/fast.js").with_render("render", |mount: &mut MountPoint| {
            mount.append("<p>fast</p>");
            Ok(())
        }),
    );

    let root = f.host.tree().root();
    let mut attrs = custom_page("/page");
    attrs.url = Some("/slow.js".to_string());
    let page = f.host.append_route(root, attrs).unwrap();
    assert_eq!(f.host.route(page).unwrap().module_state(), LoadState::Loading);

    // 慢模块仍在加载时切换地址
    f.host.set_route_attribute(page, "url", Some("/fast.js")).unwrap();
    f.host.run_until_idle().await.unwrap();

    assert_eq!(f.loader.load_count(), 2);
    let node = f.host.route(page).unwrap();
    assert_eq!(node.module_state(), LoadState::Ready);
    assert_eq!(node.loaded_module_url(), Some("/fast.js"));

    go(&mut f.host, "/page").await;
    let html = f.host.route(page).unwrap().html();
    assert!(html.contains("<p>fast</p>"));
    assert!(!html.contains("<p>slow</p>"));
}

#[tokio::test(start_paused = true)]
async fn test_stale_style_fetch_is_discarded() {
    let mut f = fixture(cache_config(1000));
    f.styles
        .insert_with_delay("old.css", ".old { color: red; }", Duration::from_millis(500));
    f.styles.insert("new.css", ".new { color: blue; }");

    let root = f.host.tree().root();
    let mut attrs = RouteAttributes::new("/styled");
    attrs.element = "<h1>styled</h1>".to_string();
    attrs.css_url = CssSources::new(["old.css"]);
    let styled = f.host.append_route(root, attrs).unwrap();

    f.host.set_route_attribute(styled, "css-url", Some("new.css")).unwrap();
    f.host.run_until_idle().await.unwrap();

    assert_eq!(f.styles.fetch_count(), 2);
    let node = f.host.route(styled).unwrap();
    assert_eq!(node.style_state(), LoadState::Ready);
    assert_eq!(node.css_content(), ".new { color: blue; }");
}

#[tokio::test(start_paused = true)]
async fn test_failing_render_and_teardown_are_contained() {
    let mut f = fixture(cache_config(100));
    f.loader.register(
        ComponentModule::new("/bad.js")
            .with_render("render", |_mount: &mut MountPoint| Err(anyhow::anyhow!("render exploded")))
            .with_destroy(|| panic!("teardown exploded")),
    );
    let root = f.host.tree().root();
    let mut attrs = custom_page("/bad");
    attrs.url = Some("/bad.js".to_string());
    let bad = f.host.append_route(root, attrs).unwrap();

    go(&mut f.host, "/bad").await;
    go(&mut f.host, "/other").await;
    f.host.run_for(Duration::from_millis(500)).await.unwrap();

    let node = f.host.route(bad).unwrap();
    assert_eq!(node.render_invocations(), 1);
    assert_eq!(node.teardown_invocations(), 1);
    assert!(node.is_evicted());

    // 之后的激活照常进行
    go(&mut f.host, "/bad").await;
    assert_eq!(f.host.route(bad).unwrap().render_invocations(), 2);
}

// ============================================================================
// 事件
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_events_bubble_to_ancestors() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let parent = f.host.append_route(root, RouteAttributes::new("/a")).unwrap();
    let child = f.host.append_route(parent, RouteAttributes::new("b")).unwrap();

    let seen: Arc<Mutex<Vec<(String, ElementId, ElementId)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    f.host
        .add_event_listener(
            root,
            Arc::new(move |event: &RouteEvent, current: ElementId| {
                sink.lock()
                    .unwrap()
                    .push((event.kind.name().to_string(), event.target, current));
            }),
        )
        .unwrap();

    go(&mut f.host, "/a/b").await;

    let seen = seen.lock().unwrap().clone();
    assert!(seen.contains(&("active-change".to_string(), parent, root)));
    assert!(seen.contains(&("active-change".to_string(), child, root)));
    assert!(seen.contains(&("exact-match-change".to_string(), child, root)));
    assert!(!seen.iter().any(|(name, target, _)| name == "exact-match-change" && *target == parent));
}

#[tokio::test(start_paused = true)]
async fn test_event_payload_carries_new_value() {
    let mut f = fixture(cache_config(1000));
    let root = f.host.tree().root();
    let page = f.host.append_route(root, RouteAttributes::new("/page")).unwrap();

    let kinds: Arc<Mutex<Vec<RouteEventKind>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&kinds);
    f.host
        .add_event_listener(
            page,
            Arc::new(move |event: &RouteEvent, _| sink.lock().unwrap().push(event.kind.clone())),
        )
        .unwrap();

    go(&mut f.host, "/page").await;
    go(&mut f.host, "/").await;

    let kinds = kinds.lock().unwrap().clone();
    assert_eq!(
        kinds,
        vec![
            RouteEventKind::ActiveChanged(true),
            RouteEventKind::ExactMatchChanged(true),
            RouteEventKind::ActiveChanged(false),
            RouteEventKind::ExactMatchChanged(false),
        ]
    );
}

#[test]
fn test_global_notifier_installed_once() {
    let first = NavigationNotifier::install();
    let second = NavigationNotifier::install();
    assert!(first.ptr_eq(&second));
    assert!(NavigationNotifier::global().is_some_and(|g| g.ptr_eq(&first)));
}
