//! 路由容器集成测试
//!
//! 测试容器作用范围、NotFound 汇总与声明式挂载。

use std::sync::{Arc, Mutex};

use native_route::element::ContainerStatus;
use native_route::{
    ContainerAttributes, NavigationNotifier, NotFoundContent, RouteAttributes, RouteEvent,
    RouteEventKind, RouteHost, RouteTreeConfig,
};

fn host() -> RouteHost {
    RouteHost::builder()
        .notifier(NavigationNotifier::new())
        .build()
}

fn container_attrs(root_path: &str) -> ContainerAttributes {
    ContainerAttributes {
        root_path: root_path.to_string(),
        not_found: Some("404".to_string()),
        ..Default::default()
    }
}

fn exact(path: &str) -> RouteAttributes {
    let mut attrs = RouteAttributes::new(path);
    attrs.exact = true;
    attrs
}

async fn go(host: &mut RouteHost, url: &str) {
    host.navigate(url).unwrap();
    host.run_until_idle().await.unwrap();
}

#[tokio::test]
async fn test_not_found_when_nothing_matches() {
    let mut host = host();
    let root = host.tree().root();
    let container = host.append_container(root, container_attrs("/")).unwrap();
    host.append_route(container, exact("/a")).unwrap();
    host.append_route(container, RouteAttributes::new("/b")).unwrap();
    host.run_until_idle().await.unwrap();

    // 初始地址 / 没有任何节点匹配
    assert_eq!(host.container(container).unwrap().status(), ContainerStatus::NotFound);

    go(&mut host, "/a").await;
    assert_eq!(host.container(container).unwrap().status(), ContainerStatus::Normal);
    assert_eq!(host.container(container).unwrap().fallback(), None);

    go(&mut host, "/c").await;
    let c = host.container(container).unwrap();
    assert_eq!(c.status(), ContainerStatus::NotFound);
    assert_eq!(c.fallback().as_deref(), Some("404"));
    assert!(c.render_root().html().contains("404"));

    // 前缀匹配同样算作命中
    go(&mut host, "/b/deep").await;
    assert_eq!(host.container(container).unwrap().status(), ContainerStatus::Normal);
}

#[tokio::test]
async fn test_virtual_nodes_are_ignored() {
    let mut host = host();
    let root = host.tree().root();
    let container = host.append_container(root, container_attrs("/")).unwrap();

    let mut layout = RouteAttributes::new("/");
    layout.virtual_node = true;
    host.append_route(container, layout).unwrap();
    host.append_route(container, exact("/home")).unwrap();

    go(&mut host, "/missing").await;
    assert_eq!(host.container(container).unwrap().status(), ContainerStatus::NotFound);

    go(&mut host, "/home").await;
    assert_eq!(host.container(container).unwrap().status(), ContainerStatus::Normal);
}

#[tokio::test]
async fn test_out_of_scope_forces_normal() {
    let mut host = host();
    let root = host.tree().root();
    let container = host.append_container(root, container_attrs("/app")).unwrap();
    host.append_route(container, exact("/app/home")).unwrap();

    go(&mut host, "/app/nothing").await;
    assert_eq!(host.container(container).unwrap().status(), ContainerStatus::NotFound);

    go(&mut host, "/elsewhere").await;
    let c = host.container(container).unwrap();
    assert!(!c.is_active());
    assert_eq!(c.status(), ContainerStatus::Normal);
    assert_eq!(c.fallback(), None);
}

#[tokio::test]
async fn test_nested_descendants_count() {
    let mut host = host();
    let root = host.tree().root();
    let container = host.append_container(root, container_attrs("/")).unwrap();
    let wrapper = host.append_element(container, "section").unwrap();
    let parent = host.append_route(wrapper, exact("/shop")).unwrap();
    host.append_route(parent, exact("item")).unwrap();

    go(&mut host, "/item").await;
    assert_eq!(host.container(container).unwrap().status(), ContainerStatus::NotFound);

    go(&mut host, "/shop/item").await;
    assert_eq!(host.container(container).unwrap().status(), ContainerStatus::Normal);
}

#[tokio::test]
async fn test_not_found_producer_receives_pathname() {
    let mut host = host();
    let root = host.tree().root();
    let container = host.append_container(root, container_attrs("/")).unwrap();
    host.append_route(container, exact("/known")).unwrap();
    host.set_not_found_content(
        container,
        NotFoundContent::Producer(Arc::new(|pathname: &str| format!("no page at {}", pathname))),
    )
    .unwrap();

    go(&mut host, "/unknown").await;
    assert_eq!(
        host.container(container).unwrap().fallback().as_deref(),
        Some("no page at /unknown")
    );
}

#[tokio::test]
async fn test_status_change_event() {
    let mut host = host();
    let root = host.tree().root();
    let container = host.append_container(root, container_attrs("/")).unwrap();
    host.append_route(container, exact("/")).unwrap();
    host.run_until_idle().await.unwrap();

    let statuses: Arc<Mutex<Vec<RouteEventKind>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&statuses);
    host.add_event_listener(
        root,
        Arc::new(move |event: &RouteEvent, _| {
            if let RouteEventKind::ContainerStatusChanged(_) = event.kind {
                sink.lock().unwrap().push(event.kind);
            }
        }),
    )
    .unwrap();

    go(&mut host, "/nope").await;
    go(&mut host, "/").await;

    assert_eq!(
        *statuses.lock().unwrap(),
        vec![
            RouteEventKind::ContainerStatusChanged(ContainerStatus::NotFound),
            RouteEventKind::ContainerStatusChanged(ContainerStatus::Normal),
        ]
    );
}

#[tokio::test]
async fn test_removed_route_no_longer_counts() {
    let mut host = host();
    let root = host.tree().root();
    let container = host.append_container(root, container_attrs("/")).unwrap();
    let only = host.append_route(container, exact("/only")).unwrap();

    go(&mut host, "/only").await;
    assert_eq!(host.container(container).unwrap().status(), ContainerStatus::Normal);

    host.remove(only).unwrap();
    go(&mut host, "/only").await;
    assert_eq!(host.container(container).unwrap().status(), ContainerStatus::NotFound);
}

#[tokio::test]
async fn test_mount_declaration() {
    let yaml = r#"
initial-url: /
container:
  root-path: /
  not-found: "404"
routes:
  - path: /root
    children:
      - path: ":(?:hello)|(?:world)"
        group-match-mode: true
  - path: /about
    exact: true
"#;
    let declaration = RouteTreeConfig::from_yaml_str(yaml).unwrap();
    let mut host = host();
    let routes = host.mount_declaration(&declaration).unwrap();
    assert_eq!(routes.len(), 3);

    let containers = host.container_ids();
    assert_eq!(containers.len(), 1);

    go(&mut host, "/root/hello").await;
    let snapshot = host.snapshot();
    assert_eq!(snapshot.pathname, "/root/hello");
    assert_eq!(snapshot.routes.len(), 3);
    assert!(snapshot.routes[0].active);
    assert!(snapshot.routes[1].active);
    assert!(!snapshot.routes[2].active);
    assert_eq!(snapshot.containers[0].status, ContainerStatus::Normal);

    go(&mut host, "/void").await;
    assert_eq!(host.snapshot().containers[0].status, ContainerStatus::NotFound);
    assert_eq!(host.snapshot().containers[0].fallback.as_deref(), Some("404"));
}
