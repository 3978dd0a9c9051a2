//! HTML block: a title and free-form text set per instance.
//!
//! Instance configuration is JSON, `{"title": "...", "text": "..."}`. A
//! block with neither title nor text is hidden.
use std::sync::Arc;

use async_trait::async_trait;
use modhost_core::kernel::error::Result as KernelResult;
use modhost_core::plugin_system::capability::{
    AccessType, CapabilityDefinition, CONTEXT_BLOCK, CONTEXT_SYSTEM, RISK_SPAM, RISK_XSS,
};
use modhost_core::plugin_system::traits::{BlockContent, BlockPlugin, BlockRenderContext, Plugin};
use modhost_core::plugin_system::PluginFactories;
use serde::{Deserialize, Serialize};

pub const NAME: &str = "html";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtmlBlockConfig {
    pub title: String,
    pub text: String,
}

impl HtmlBlockConfig {
    /// Empty configuration decodes to the default.
    pub fn decode(bytes: &[u8]) -> KernelResult<Self> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes).map_err(|e| format!("invalid html block configuration: {}", e).into())
    }

    pub fn encode(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub struct HtmlBlock;

impl Plugin for HtmlBlock {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Vec<CapabilityDefinition> {
        vec![
            CapabilityDefinition::new("block/html:addinstance", AccessType::Write, CONTEXT_BLOCK)
                .with_risks(RISK_SPAM | RISK_XSS),
            CapabilityDefinition::new("block/html:myaddinstance", AccessType::Write, CONTEXT_SYSTEM),
        ]
    }
}

#[async_trait]
impl BlockPlugin for HtmlBlock {
    async fn content(&self, ctx: &BlockRenderContext) -> KernelResult<BlockContent> {
        let config = HtmlBlockConfig::decode(ctx.config())?;
        Ok(BlockContent {
            title: config.title,
            text: config.text,
            footer: String::new(),
        })
    }

    fn is_visible(&self, ctx: &BlockRenderContext) -> bool {
        match HtmlBlockConfig::decode(ctx.config()) {
            Ok(config) if config.title.is_empty() && config.text.is_empty() => {
                log::debug!("Html block {} has nothing to show", ctx.instance.id);
                false
            }
            Ok(_) => true,
            Err(_) => true,
        }
    }
}

pub fn register(factories: &mut PluginFactories) {
    factories.register_block(NAME, || Arc::new(HtmlBlock));
}
