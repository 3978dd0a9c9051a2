//! # Modhost Plugin Contracts
//!
//! Every plugin implements [`Plugin`]; modules additionally implement
//! [`ModulePlugin`] and blocks [`BlockPlugin`]. Themes are descriptor-only.
//!
//! Hooks that write receive the open [`StoreTransaction`] of the operation
//! that triggered them, so plugin-owned rows commit or roll back together with
//! the host's own writes.
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::course::ledger::GradingInfo;
use crate::kernel::error::Result;
use crate::plugin_system::capability::CapabilityDefinition;
use crate::plugin_system::descriptor::PluginType;
use crate::storage::records::{BlockInstanceRecord, BlockPositionRecord, CourseModuleRecord, Records};
use crate::storage::StoreTransaction;

/// Base contract shared by all plugin types.
pub trait Plugin: Send + Sync {
    /// Plugin name without the type prefix; must match the manifest location.
    fn name(&self) -> &str;

    /// Capabilities registered when the plugin is loaded.
    fn capabilities(&self) -> Vec<CapabilityDefinition> {
        Vec::new()
    }

    /// Runs once per load, after capabilities are registered.
    fn init(&self, _tx: &mut StoreTransaction<'_>) -> Result<()> {
        Ok(())
    }

    fn install(&self, _tx: &mut StoreTransaction<'_>) -> Result<()> {
        Ok(())
    }

    fn upgrade(&self, _tx: &mut StoreTransaction<'_>, _old_version: i64, _new_version: i64) -> Result<()> {
        Ok(())
    }

    fn uninstall(&self, _tx: &mut StoreTransaction<'_>) -> Result<()> {
        Ok(())
    }
}

/// Optional features a module declares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFeatures {
    /// The module keeps a grade item in the grading ledger
    pub grade: bool,
    /// Viewing the module can complete it
    pub completion_tracks_views: bool,
    pub groups: bool,
}

/// What a module shows to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleView {
    pub title: String,
    pub body: String,
}

/// Activity module contract: instance CRUD, view and ajax dispatch.
pub trait ModulePlugin: Plugin {
    fn supported_features(&self) -> ModuleFeatures {
        ModuleFeatures::default()
    }

    /// Stores the plugin-owned instance row and returns its id.
    fn add_instance(&self, tx: &mut StoreTransaction<'_>, course_id: i64, data: &Value) -> Result<i64>;

    fn update_instance(&self, tx: &mut StoreTransaction<'_>, instance_id: i64, data: &Value) -> Result<()>;

    fn delete_instance(&self, tx: &mut StoreTransaction<'_>, instance_id: i64) -> Result<()>;

    /// Grade item parameters; only asked of modules declaring `grade`.
    fn grading_info(&self, _records: &Records, instance_id: i64) -> Result<GradingInfo> {
        Ok(GradingInfo::new(format!("{} {}", self.name(), instance_id), 100.0))
    }

    fn view(&self, records: &Records, course_module: &CourseModuleRecord, user_id: i64) -> Result<ModuleView>;

    fn dispatch_ajax(
        &self,
        tx: &mut StoreTransaction<'_>,
        course_module: &CourseModuleRecord,
        action: &str,
        args: &Value,
    ) -> Result<Value>;
}

/// Everything a block sees while rendering one placement.
#[derive(Debug, Clone)]
pub struct BlockRenderContext {
    pub instance: BlockInstanceRecord,
    pub position: BlockPositionRecord,
    pub page_type: String,
    pub context_id: i64,
}

impl BlockRenderContext {
    pub fn config(&self) -> &[u8] {
        &self.instance.config_data
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContent {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub footer: String,
}

impl BlockContent {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.footer.is_empty()
    }
}

/// Page block contract: content, html, visibility predicate and regions.
#[async_trait]
pub trait BlockPlugin: Plugin {
    /// Regions the block may be placed in; empty means any region.
    fn regions(&self) -> Vec<String> {
        Vec::new()
    }

    async fn content(&self, ctx: &BlockRenderContext) -> Result<BlockContent>;

    fn html(&self, ctx: &BlockRenderContext, content: &BlockContent) -> String {
        let mut html = format!(
            "<section class=\"block block_{}\" data-instance-id=\"{}\"><h2>{}</h2><div class=\"content\">{}</div>",
            self.name(),
            ctx.instance.id,
            escape_html(&content.title),
            content.text
        );
        if !content.footer.is_empty() {
            html.push_str(&format!("<div class=\"footer\">{}</div>", content.footer));
        }
        html.push_str("</section>");
        html
    }

    /// Plugin-level veto, independent of the stored visibility flags.
    fn is_visible(&self, _ctx: &BlockRenderContext) -> bool {
        true
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// A resolved plugin implementation, by type.
#[derive(Clone)]
pub enum PluginImplementation {
    Module(Arc<dyn ModulePlugin>),
    Block(Arc<dyn BlockPlugin>),
    Theme,
}

impl PluginImplementation {
    pub fn plugin_type(&self) -> PluginType {
        match self {
            PluginImplementation::Module(_) => PluginType::Module,
            PluginImplementation::Block(_) => PluginType::Block,
            PluginImplementation::Theme => PluginType::Theme,
        }
    }

    /// `None` for themes, which carry no code.
    pub fn name(&self) -> Option<&str> {
        match self {
            PluginImplementation::Module(m) => Some(m.name()),
            PluginImplementation::Block(b) => Some(b.name()),
            PluginImplementation::Theme => None,
        }
    }

    pub fn capabilities(&self) -> Vec<CapabilityDefinition> {
        match self {
            PluginImplementation::Module(m) => m.capabilities(),
            PluginImplementation::Block(b) => b.capabilities(),
            PluginImplementation::Theme => Vec::new(),
        }
    }

    pub fn init(&self, tx: &mut StoreTransaction<'_>) -> Result<()> {
        match self {
            PluginImplementation::Module(m) => m.init(tx),
            PluginImplementation::Block(b) => b.init(tx),
            PluginImplementation::Theme => Ok(()),
        }
    }

    pub fn install(&self, tx: &mut StoreTransaction<'_>) -> Result<()> {
        match self {
            PluginImplementation::Module(m) => m.install(tx),
            PluginImplementation::Block(b) => b.install(tx),
            PluginImplementation::Theme => Ok(()),
        }
    }

    pub fn upgrade(&self, tx: &mut StoreTransaction<'_>, old_version: i64, new_version: i64) -> Result<()> {
        match self {
            PluginImplementation::Module(m) => m.upgrade(tx, old_version, new_version),
            PluginImplementation::Block(b) => b.upgrade(tx, old_version, new_version),
            PluginImplementation::Theme => Ok(()),
        }
    }

    pub fn uninstall(&self, tx: &mut StoreTransaction<'_>) -> Result<()> {
        match self {
            PluginImplementation::Module(m) => m.uninstall(tx),
            PluginImplementation::Block(b) => b.uninstall(tx),
            PluginImplementation::Theme => Ok(()),
        }
    }
}

impl std::fmt::Debug for PluginImplementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({})", self.plugin_type(), name),
            None => write!(f, "{}", self.plugin_type()),
        }
    }
}
