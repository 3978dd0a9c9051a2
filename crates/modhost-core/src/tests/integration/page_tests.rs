#![cfg(test)]

use futures::future::join_all;

use super::common::{TestHost, BLOCK_NAME, SIDEBAR_NAME};
use crate::blocks::error::BlockSystemError;
use crate::kernel::error::Error;
use crate::plugin_system::PluginType;

const CONTEXT: i64 = 5;

async fn add(host: &TestHost, name: &str, page_type: &str, region: &str, config: &str) -> i64 {
    host.app
        .blocks()
        .create_instance(name, page_type, region, config.as_bytes().to_vec(), CONTEXT)
        .await
        .expect("Failed to create block instance")
}

async fn rendered_ids(host: &TestHost, page_type: &str) -> Vec<i64> {
    host.app
        .blocks()
        .resolve_for_page(page_type, CONTEXT)
        .await
        .unwrap()
        .iter()
        .map(|b| b.instance.id)
        .collect()
}

#[tokio::test]
async fn test_page_renders_in_weight_order_and_skips_failing_blocks() {
    let host = TestHost::new();
    host.ready().await;
    host.enable(PluginType::Block, SIDEBAR_NAME).await;

    let alpha = add(&host, BLOCK_NAME, "course-view-*", "side-pre", "alpha").await;
    let vetoed = add(&host, BLOCK_NAME, "course-view-*", "side-pre", "hidden").await;
    let broken = add(&host, BLOCK_NAME, "course-view-*", "side-pre", "broken").await;
    let sidebar = add(&host, SIDEBAR_NAME, "*", "side-post", "delta").await;
    host.app
        .blocks()
        .create_instance(BLOCK_NAME, "course-view-*", "side-pre", b"elsewhere".to_vec(), CONTEXT + 1)
        .await
        .unwrap();

    let weights: Vec<i64> = {
        let mut weights = Vec::new();
        for id in [alpha, vetoed, broken, sidebar] {
            weights.push(host.app.blocks().positions(id).await[0].weight);
        }
        weights
    };
    assert_eq!(weights, vec![0, 1, 2, 0]);

    let rendered = host
        .app
        .blocks()
        .resolve_for_page("course-view-topics", CONTEXT)
        .await
        .unwrap();
    let ids: Vec<i64> = rendered.iter().map(|b| b.instance.id).collect();
    assert_eq!(ids, vec![alpha, sidebar]);
    assert_eq!(rendered[0].content.text, "alpha");
    assert!(rendered[0].html.starts_with("<section class=\"block block_notes\""));

    let grouped = host
        .app
        .blocks()
        .resolve_grouped("course-view-topics", CONTEXT)
        .await
        .unwrap();
    assert_eq!(grouped.keys().cloned().collect::<Vec<_>>(), vec!["side-post", "side-pre"]);
    assert_eq!(grouped["side-pre"].len(), 1);

    assert_eq!(rendered_ids(&host, "mod-quiz-view").await, vec![sidebar]);
}

#[tokio::test]
async fn test_most_specific_position_wins() {
    let host = TestHost::new();
    host.ready().await;
    let id = add(&host, BLOCK_NAME, "course-view-*", "side-pre", "text").await;
    host.app
        .blocks()
        .add_position(id, CONTEXT, "course-view-topics", "side-post", 3)
        .await
        .unwrap();

    let topics = host
        .app
        .blocks()
        .resolve_for_page("course-view-topics", CONTEXT)
        .await
        .unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].region(), "side-post");
    assert_eq!(topics[0].position.weight, 3);

    let weeks = host
        .app
        .blocks()
        .resolve_for_page("course-view-weeks", CONTEXT)
        .await
        .unwrap();
    assert_eq!(weeks.len(), 1);
    assert_eq!(weeks[0].region(), "side-pre");
}

#[tokio::test]
async fn test_disabled_block_plugin_is_skipped_and_rejected() {
    let host = TestHost::new();
    host.ready().await;
    add(&host, BLOCK_NAME, "*", "side-pre", "text").await;

    host.app.registry().disable(PluginType::Block, BLOCK_NAME).await.unwrap();

    assert!(rendered_ids(&host, "course-view").await.is_empty());
    let err = host
        .app
        .blocks()
        .create_instance(BLOCK_NAME, "*", "side-pre", Vec::new(), CONTEXT)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BlockSystem(BlockSystemError::PluginDisabled { .. })));
}

#[tokio::test]
async fn test_region_outside_declared_set_is_rejected() {
    let host = TestHost::new();
    host.enable(PluginType::Block, SIDEBAR_NAME).await;

    let err = host
        .app
        .blocks()
        .create_instance(SIDEBAR_NAME, "*", "content", Vec::new(), CONTEXT)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::BlockSystem(BlockSystemError::UnsupportedRegion { .. })
    ));
    let instances = host.app.store().read(|r| r.block_instances().count()).await;
    assert_eq!(instances, 0);
}

#[tokio::test]
async fn test_move_toggle_and_hide() {
    let host = TestHost::new();
    host.ready().await;
    let first = add(&host, BLOCK_NAME, "*", "side-pre", "first").await;
    let second = add(&host, BLOCK_NAME, "*", "side-pre", "second").await;
    assert_eq!(rendered_ids(&host, "site-index").await, vec![first, second]);

    host.app
        .blocks()
        .move_instance(second, "side-pre", -5, CONTEXT)
        .await
        .unwrap();
    assert_eq!(rendered_ids(&host, "site-index").await, vec![second, first]);

    assert!(!host.app.blocks().toggle_visibility(second, CONTEXT).await.unwrap());
    assert_eq!(rendered_ids(&host, "site-index").await, vec![first]);
    assert!(host.app.blocks().toggle_visibility(second, CONTEXT).await.unwrap());

    host.app.blocks().set_instance_visible(first, false).await.unwrap();
    assert_eq!(rendered_ids(&host, "site-index").await, vec![second]);

    let err = host
        .app
        .blocks()
        .toggle_visibility(first, CONTEXT + 1)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::BlockSystem(BlockSystemError::PositionNotFound { .. })
    ));
}

#[tokio::test]
async fn test_concurrent_creates_get_distinct_weights() {
    let host = TestHost::new();
    host.ready().await;

    let creates = (0..8).map(|i| {
        host.app
            .blocks()
            .create_instance(BLOCK_NAME, "course-view-*", "side-pre", format!("{}", i).into_bytes(), CONTEXT)
    });
    let ids: Vec<i64> = join_all(creates)
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    let mut weights = Vec::new();
    for id in ids {
        weights.push(host.app.blocks().positions(id).await[0].weight);
    }
    weights.sort();
    assert_eq!(weights, (0..8).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_equal_weights_render_by_instance_id() {
    let host = TestHost::new();
    host.ready().await;
    let first = add(&host, BLOCK_NAME, "*", "side-pre", "first").await;
    let second = add(&host, BLOCK_NAME, "*", "side-pre", "second").await;

    host.app.blocks().move_instance(second, "side-pre", 5, CONTEXT).await.unwrap();
    host.app.blocks().move_instance(first, "side-pre", 5, CONTEXT).await.unwrap();

    assert_eq!(rendered_ids(&host, "site-index").await, vec![first, second]);
    assert_eq!(rendered_ids(&host, "site-index").await, vec![first, second]);
}
