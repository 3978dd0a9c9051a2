#![cfg(test)]

use std::sync::Arc;

use serde_json::json;

use super::common::{factories, host_config, plugin_root, FlakyProvider, Probe, TestHost, BLOCK_NAME, MODULE_NAME};
use crate::course::NewCourseModule;
use crate::kernel::bootstrap::{Application, Collaborators};
use crate::kernel::constants::RECORDS_FILE;
use crate::plugin_system::PluginType;
use crate::storage::RecordStore;

#[tokio::test]
async fn test_records_survive_restart() {
    let root = plugin_root();
    let config = host_config(root.path());
    let probe = Probe::new();

    let block_id = {
        let app = Application::new(config.clone(), factories(&probe)).unwrap();
        app.registry().enable(PluginType::Block, BLOCK_NAME).await.unwrap();
        app.lifecycle().install(PluginType::Block, BLOCK_NAME).await.unwrap();
        app.blocks()
            .create_instance(BLOCK_NAME, "*", "side-pre", b"kept".to_vec(), 1)
            .await
            .unwrap()
    };
    assert!(config.data_dir.join(RECORDS_FILE).is_file());

    let app = Application::new(config, factories(&probe)).unwrap();
    assert!(app.registry().is_enabled(PluginType::Block, BLOCK_NAME).await);
    let installed = app.store().read(|r| r.installed_version("block_notes")).await;
    assert!(installed.is_some());
    let rendered = app.blocks().resolve_for_page("site-index", 1).await.unwrap();
    assert_eq!(rendered.len(), 1);
    assert_eq!(rendered[0].instance.id, block_id);
    assert_eq!(rendered[0].content.text, "kept");
}

#[tokio::test]
async fn test_failed_snapshot_write_rolls_back() {
    let provider = FlakyProvider::new();
    let store = Arc::new(RecordStore::open(provider.clone(), RECORDS_FILE).unwrap());
    let host = TestHost::with_store(store, Collaborators::default());
    host.ready().await;
    let section = host.app.modules().add_section(2).await.unwrap();

    provider.set_failing(true);
    let result = host
        .app
        .modules()
        .create_instance(MODULE_NAME, 2, section, NewCourseModule::new(json!({ "name": "Quiz" })))
        .await;
    assert!(result.is_err());
    let modules = host.app.store().read(|r| r.course_modules_of_type(MODULE_NAME).count()).await;
    assert_eq!(modules, 0);

    provider.set_failing(false);
    let created = host
        .app
        .modules()
        .create_instance(MODULE_NAME, 2, section, NewCourseModule::new(json!({ "name": "Quiz" })))
        .await
        .unwrap();
    assert_eq!(
        host.app.modules().section_sequence(section).await.unwrap().ids(),
        &[created.course_module_id]
    );
}
