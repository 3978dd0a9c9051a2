#![cfg(test)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::kernel::bootstrap::{Application, Collaborators};
use crate::kernel::constants::{HOST_VERSION, MANIFEST_FILE};
use crate::kernel::error::{Error, Result as KernelResult};
use crate::plugin_system::capability::{AccessType, CapabilityDefinition, CONTEXT_BLOCK, CONTEXT_MODULE};
use crate::plugin_system::traits::{
    BlockContent, BlockPlugin, BlockRenderContext, ModuleFeatures, ModulePlugin, ModuleView, Plugin,
};
use crate::plugin_system::{PluginFactories, PluginType};
use crate::storage::error::StorageSystemError;
use crate::storage::provider::StorageProvider;
use crate::storage::records::{CourseModuleRecord, Records};
use crate::storage::{HostConfig, RecordStore, StoreTransaction};

pub const MODULE_NAME: &str = "quiz";
pub const BLOCK_NAME: &str = "notes";
pub const SIDEBAR_NAME: &str = "sidebar";
pub const THEME_NAME: &str = "plain";
pub const PLUGIN_VERSION: i64 = 2024010100;

// ===== HOOK PROBE =====

/// Records hook calls and makes chosen hooks fail.
#[derive(Debug, Default)]
pub struct Probe {
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl Probe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, hook: &str) {
        self.failing.lock().unwrap().insert(hook.to_string());
    }

    pub fn heal(&self, hook: &str) {
        self.failing.lock().unwrap().remove(hook);
    }

    pub fn count(&self, hook: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == hook).count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn hit(&self, hook: &str) -> KernelResult<()> {
        self.calls.lock().unwrap().push(hook.to_string());
        if self.failing.lock().unwrap().contains(hook) {
            return Err(Error::from(format!("{} hook failed", hook)));
        }
        Ok(())
    }
}

// ===== MOCK PLUGINS =====

/// Module storing its instances as plugin rows `{course, name}`.
pub struct TestModule {
    name: String,
    features: ModuleFeatures,
    probe: Arc<Probe>,
}

impl TestModule {
    pub fn new(name: &str, features: ModuleFeatures, probe: Arc<Probe>) -> Self {
        Self {
            name: name.to_string(),
            features,
            probe,
        }
    }

    fn component(&self) -> String {
        format!("mod_{}", self.name)
    }
}

impl Plugin for TestModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<CapabilityDefinition> {
        vec![
            CapabilityDefinition::new(format!("mod/{}:view", self.name), AccessType::Read, CONTEXT_MODULE),
            CapabilityDefinition::new(format!("mod/{}:addinstance", self.name), AccessType::Write, CONTEXT_MODULE),
        ]
    }

    fn init(&self, _tx: &mut StoreTransaction<'_>) -> KernelResult<()> {
        self.probe.hit("init")
    }

    fn install(&self, tx: &mut StoreTransaction<'_>) -> KernelResult<()> {
        tx.set_setting(&self.component(), "installed_by_hook", json!(true));
        self.probe.hit("install")
    }

    fn upgrade(&self, tx: &mut StoreTransaction<'_>, old_version: i64, new_version: i64) -> KernelResult<()> {
        tx.set_setting(&self.component(), "upgraded", json!([old_version, new_version]));
        self.probe.hit("upgrade")
    }

    fn uninstall(&self, _tx: &mut StoreTransaction<'_>) -> KernelResult<()> {
        self.probe.hit("uninstall")
    }
}

impl ModulePlugin for TestModule {
    fn supported_features(&self) -> ModuleFeatures {
        self.features
    }

    fn add_instance(&self, tx: &mut StoreTransaction<'_>, course_id: i64, data: &Value) -> KernelResult<i64> {
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::from("name is required"))?;
        let id = tx.insert_plugin_row(&self.component(), json!({ "course": course_id, "name": name }));
        self.probe.hit("add_instance")?;
        Ok(id)
    }

    fn update_instance(&self, tx: &mut StoreTransaction<'_>, instance_id: i64, data: &Value) -> KernelResult<()> {
        self.probe.hit("update_instance")?;
        let mut row = tx
            .plugin_row(&self.component(), instance_id)
            .cloned()
            .ok_or_else(|| Error::from("instance row missing"))?;
        if let Some(name) = data.get("name") {
            row["name"] = name.clone();
        }
        tx.update_plugin_row(&self.component(), instance_id, row)
    }

    fn delete_instance(&self, tx: &mut StoreTransaction<'_>, instance_id: i64) -> KernelResult<()> {
        tx.delete_plugin_row(&self.component(), instance_id)?;
        self.probe.hit("delete_instance")
    }

    fn view(&self, records: &Records, course_module: &CourseModuleRecord, user_id: i64) -> KernelResult<ModuleView> {
        let row = records
            .plugin_row(&self.component(), course_module.instance_id)
            .ok_or_else(|| Error::from("instance row missing"))?;
        Ok(ModuleView {
            title: row["name"].as_str().unwrap_or_default().to_string(),
            body: format!("user {}", user_id),
        })
    }

    fn dispatch_ajax(
        &self,
        tx: &mut StoreTransaction<'_>,
        course_module: &CourseModuleRecord,
        action: &str,
        args: &Value,
    ) -> KernelResult<Value> {
        match action {
            "echo" => Ok(json!({ "cm": course_module.id, "args": args })),
            "note" => {
                tx.set_setting(&self.component(), "note", args.clone());
                Ok(Value::Null)
            }
            "fail_after_write" => {
                tx.set_setting(&self.component(), "note", args.clone());
                Err(Error::from("ajax failed"))
            }
            other => Err(Error::from(format!("unknown action '{}'", other))),
        }
    }
}

/// Block whose content is its config text. Config `hidden` vetoes the block
/// and `broken` makes content fail.
pub struct TestBlock {
    name: String,
    regions: Vec<String>,
    probe: Arc<Probe>,
}

impl TestBlock {
    pub fn new(name: &str, regions: &[&str], probe: Arc<Probe>) -> Self {
        Self {
            name: name.to_string(),
            regions: regions.iter().map(|r| r.to_string()).collect(),
            probe,
        }
    }
}

impl Plugin for TestBlock {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Vec<CapabilityDefinition> {
        vec![CapabilityDefinition::new(
            format!("block/{}:addinstance", self.name),
            AccessType::Write,
            CONTEXT_BLOCK,
        )]
    }

    fn init(&self, _tx: &mut StoreTransaction<'_>) -> KernelResult<()> {
        self.probe.hit("init")
    }

    fn uninstall(&self, _tx: &mut StoreTransaction<'_>) -> KernelResult<()> {
        self.probe.hit("uninstall")
    }
}

#[async_trait]
impl BlockPlugin for TestBlock {
    fn regions(&self) -> Vec<String> {
        self.regions.clone()
    }

    async fn content(&self, ctx: &BlockRenderContext) -> KernelResult<BlockContent> {
        if ctx.config() == b"broken" {
            return Err(Error::from("content failed"));
        }
        Ok(BlockContent {
            title: format!("{} {}", self.name, ctx.instance.id),
            text: String::from_utf8_lossy(ctx.config()).into_owned(),
            footer: String::new(),
        })
    }

    fn is_visible(&self, ctx: &BlockRenderContext) -> bool {
        ctx.config() != b"hidden"
    }
}

// ===== FIXTURES =====

pub fn write_manifest(root: &Path, plugin_type: PluginType, name: &str, manifest: Value) -> PathBuf {
    let dir = root.join(plugin_type.dir_name()).join(name);
    fs::create_dir_all(&dir).expect("Failed to create plugin directory");
    let path = dir.join(MANIFEST_FILE);
    fs::write(&path, serde_json::to_string_pretty(&manifest).expect("manifest serializes"))
        .expect("Failed to write manifest");
    path
}

/// A plugin root with `mod_quiz`, `block_notes`, `block_sidebar` and
/// `theme_plain`, all at [`PLUGIN_VERSION`].
pub fn plugin_root() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let root = dir.path();
    write_manifest(
        root,
        PluginType::Module,
        MODULE_NAME,
        json!({ "component": "mod_quiz", "version": PLUGIN_VERSION, "requires": 2024010100 }),
    );
    write_manifest(
        root,
        PluginType::Block,
        BLOCK_NAME,
        json!({ "component": "block_notes", "version": PLUGIN_VERSION }),
    );
    write_manifest(
        root,
        PluginType::Block,
        SIDEBAR_NAME,
        json!({ "component": "block_sidebar", "version": PLUGIN_VERSION }),
    );
    write_manifest(
        root,
        PluginType::Theme,
        THEME_NAME,
        json!({ "component": "theme_plain", "version": PLUGIN_VERSION, "dependencies": { "block_notes": "any" } }),
    );
    dir
}

pub fn host_config(root: &Path) -> HostConfig {
    HostConfig {
        plugin_root: root.to_path_buf(),
        data_dir: root.join("data"),
        host_version: HOST_VERSION,
        cache_ttl: Duration::from_secs(300),
    }
}

pub fn graded_features() -> ModuleFeatures {
    ModuleFeatures {
        grade: true,
        completion_tracks_views: true,
        groups: false,
    }
}

/// Factories for the fixture plugins, all reporting to `probe`.
pub fn factories(probe: &Arc<Probe>) -> PluginFactories {
    let mut factories = PluginFactories::new();
    let module_probe = Arc::clone(probe);
    factories.register_module(MODULE_NAME, move || {
        Arc::new(TestModule::new(MODULE_NAME, graded_features(), Arc::clone(&module_probe)))
    });
    let block_probe = Arc::clone(probe);
    factories.register_block(BLOCK_NAME, move || {
        Arc::new(TestBlock::new(BLOCK_NAME, &[], Arc::clone(&block_probe)))
    });
    let sidebar_probe = Arc::clone(probe);
    factories.register_block(SIDEBAR_NAME, move || {
        Arc::new(TestBlock::new(SIDEBAR_NAME, &["side-pre", "side-post"], Arc::clone(&sidebar_probe)))
    });
    factories
}

/// In-memory application over a fresh fixture root.
pub struct TestHost {
    pub root: TempDir,
    pub probe: Arc<Probe>,
    pub app: Application,
}

impl TestHost {
    pub fn new() -> Self {
        let root = plugin_root();
        let probe = Probe::new();
        let app = Application::in_memory(host_config(root.path()), factories(&probe));
        Self { root, probe, app }
    }

    pub fn with_store(store: Arc<RecordStore>, collaborators: Collaborators) -> Self {
        let root = plugin_root();
        let probe = Probe::new();
        let app = Application::with_store(host_config(root.path()), factories(&probe), store, collaborators);
        Self { root, probe, app }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub async fn enable(&self, plugin_type: PluginType, name: &str) {
        self.app
            .registry()
            .enable(plugin_type, name)
            .await
            .expect("Failed to enable plugin");
    }

    /// Enable and install `mod_quiz` and `block_notes`.
    pub async fn ready(&self) {
        for (plugin_type, name) in [(PluginType::Module, MODULE_NAME), (PluginType::Block, BLOCK_NAME)] {
            self.enable(plugin_type, name).await;
            self.app
                .lifecycle()
                .install(plugin_type, name)
                .await
                .expect("Failed to install plugin");
        }
    }
}

// ===== STORAGE DOUBLES =====

/// Provider that accepts writes into the void until told to fail them.
#[derive(Debug, Default)]
pub struct FlakyProvider {
    fail_writes: AtomicBool,
}

impl FlakyProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }
}

impl StorageProvider for FlakyProvider {
    fn is_file(&self, _path: &Path) -> bool {
        false
    }

    fn create_dir_all(&self, _path: &Path) -> KernelResult<()> {
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> KernelResult<String> {
        Err(Error::io(
            std::io::Error::from(std::io::ErrorKind::NotFound),
            "read_to_string",
            path.to_path_buf(),
        ))
    }

    fn read_to_bytes(&self, path: &Path) -> KernelResult<Vec<u8>> {
        Err(Error::io(
            std::io::Error::from(std::io::ErrorKind::NotFound),
            "read_to_bytes",
            path.to_path_buf(),
        ))
    }

    fn write_bytes(&self, path: &Path, _contents: &[u8]) -> KernelResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageSystemError::OperationFailed {
                operation: "write_bytes".to_string(),
                path: Some(path.to_path_buf()),
                message: "disk full".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
