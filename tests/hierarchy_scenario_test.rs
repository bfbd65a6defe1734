//! Library-level scenario tests for tree building, caching, navigation and
//! source selection.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rigview::FetchError;
use rigview::api::Payload;
use rigview::cache::{FetchOptions, ResponseCache};
use rigview::models::hierarchy::{build_tree, completed, descendants, parent_id, preorder};
use rigview::models::{Issue, IssueStatus};
use rigview::store::{PushMessage, Scope, Selection, Store, StoreEvent};
use rigview::tree::{KeyMode, Navigator, TreeView};
use tokio::time::Instant;

fn items(ids: &[&str]) -> Vec<Arc<Issue>> {
    ids.iter()
        .map(|id| Arc::new(Issue::new(*id, format!("Issue {}", id))))
        .collect()
}

#[test]
fn test_tree_reconstruction_visits_every_item_once() {
    let list = items(&[
        "gt-1", "gt-1.1", "gt-1.1.1", "gt-1.2", "gt-2", "gt-2.1", "gt-3", "gt-1.1.2",
    ]);
    let forest = build_tree(&list);

    let mut visited = HashSet::new();
    for (node, traversal_parent) in preorder(&forest) {
        assert!(visited.insert(node.id().to_string()), "{} visited twice", node.id());
        if let Some(parent) = parent_id(node.id()) {
            assert_eq!(traversal_parent, Some(parent));
        } else {
            assert_eq!(traversal_parent, None);
        }
    }
    assert_eq!(visited.len(), list.len());
}

#[test]
fn test_orphan_becomes_root() {
    let forest = build_tree(&items(&["r.1", "r.1.2"]));
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].id(), "r.1");
    let children: Vec<&str> = forest[0].children.iter().map(|c| c.id()).collect();
    assert_eq!(children, vec!["r.1.2"]);
}

#[test]
fn test_completed_work_scenario() {
    let list = vec![
        Arc::new(Issue::new("to-1", "Epic")),
        Arc::new(Issue::new("to-1.1", "Done").with_status(IssueStatus::Closed)),
        Arc::new(Issue::new("to-1.2", "Open")),
    ];

    let forest = build_tree(&list);
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].id(), "to-1");
    assert_eq!(forest[0].children.len(), 2);

    assert_eq!(descendants(&list, "to-1").len(), 3);

    let done: Vec<String> = completed(&list).iter().map(|i| i.id.clone()).collect();
    assert_eq!(done, vec!["to-1.1".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_cache_ttl_and_stale_on_error() {
    let cache: ResponseCache<String> = ResponseCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let options = FetchOptions::new(Duration::from_millis(1000));

    let loader = |calls: Arc<AtomicUsize>| {
        move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, FetchError>("issues".to_string())
        }
    };

    cache.fetch("k", loader(calls.clone()), options).await.unwrap();
    tokio::time::advance(Duration::from_millis(500)).await;
    cache.fetch("k", loader(calls.clone()), options).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_millis(600)).await;
    cache.fetch("k", loader(calls.clone()), options).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    tokio::time::advance(Duration::from_millis(1500)).await;
    let served = cache
        .fetch(
            "k",
            || async { Err::<String, _>(FetchError::Transport("refused".to_string())) },
            options,
        )
        .await
        .unwrap();
    assert_eq!(served.value, "issues");
    assert!(served.stale);
    assert!(served.error.is_some());
}

#[test]
fn test_focus_stays_visible_through_navigation() {
    let forest = build_tree(&items(&[
        "a", "a.1", "a.1.1", "a.1.2", "a.2", "b", "b.1", "c",
    ]));
    let mut nav = Navigator::new(KeyMode::Id);
    let check = |nav: &Navigator| {
        if let Some(focused) = nav.focused() {
            assert!(
                nav.visible(&forest).iter().any(|row| row.key == focused),
                "focus {} not visible",
                focused
            );
        }
    };

    for step in 0..40 {
        match step % 5 {
            0 | 1 => nav.move_next(&forest),
            2 => nav.move_previous(&forest),
            3 => nav.toggle_focused(&forest),
            _ => nav.move_next(&forest),
        }
        check(&nav);
    }

    // Collapsing an ancestor moves focus onto it
    let mut nav = Navigator::new(KeyMode::Id);
    assert!(nav.reveal(&forest, "a.1.2"));
    assert_eq!(nav.focused(), Some("a.1.2"));
    nav.toggle_expand(&forest, "a");
    assert_eq!(nav.focused(), Some("a"));
    check(&nav);
}

#[test]
fn test_tree_view_path_keys_and_selection() {
    let mut view = TreeView::new();
    view.set_items(Arc::new(items(&["gt-1", "gt-1.1", "gt-2"])));
    assert!(view.reveal("gt-1/gt-1.1"));
    assert_eq!(view.selected().map(|issue| issue.id.clone()), Some("gt-1.1".to_string()));
}

#[test]
fn test_source_selection_is_referentially_stable() {
    let mut store = Store::new();
    let now = Instant::now();
    store.apply(StoreEvent::Connected, now);
    store.apply(
        StoreEvent::Message(PushMessage::IssuesSnapshot {
            rig: "gastown".to_string(),
            payload: vec![Issue::new("gt-1", "Root")],
        }),
        now,
    );

    let scope = Scope::Issues("gastown".to_string());
    let first = store.select(&scope);
    let second = store.select(&scope);
    assert!(first.same_as(&second));
    match (first, second) {
        (Selection::Live(Payload::Issues(a)), Selection::Live(Payload::Issues(b))) => {
            assert!(Arc::ptr_eq(&a, &b));
        }
        other => panic!("expected live selections, got {:?}", other),
    }

    // Without a connection the same scope resolves to the fallback path
    store.apply(StoreEvent::Disconnected, now);
    assert!(matches!(
        store.select(&scope),
        Selection::Fallback { ref cache_key, .. } if cache_key == "/api/rigs/gastown/issues?all=true"
    ));
}
