//! Navigation block: the path of the current page as a trail of links.
//!
//! Only placeable in the side regions.
use std::sync::Arc;

use async_trait::async_trait;
use modhost_core::kernel::error::Result as KernelResult;
use modhost_core::plugin_system::capability::{AccessType, CapabilityDefinition, CONTEXT_BLOCK};
use modhost_core::plugin_system::traits::{escape_html, BlockContent, BlockPlugin, BlockRenderContext, Plugin};
use modhost_core::plugin_system::PluginFactories;
use serde::Deserialize;

pub const NAME: &str = "navigation";
pub const REGIONS: [&str; 2] = ["side-pre", "side-post"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NavigationConfig {
    /// Title override
    title: Option<String>,
}

#[derive(Debug, Default)]
pub struct NavigationBlock;

impl NavigationBlock {
    /// `course-view-topics` becomes `/course`, `/course/view`,
    /// `/course/view/topics`.
    pub fn trail(page_type: &str) -> Vec<(String, String)> {
        let mut path = String::new();
        page_type
            .split('-')
            .filter(|s| !s.is_empty())
            .map(|segment| {
                path.push('/');
                path.push_str(segment);
                (segment.to_string(), path.clone())
            })
            .collect()
    }
}

impl Plugin for NavigationBlock {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> Vec<CapabilityDefinition> {
        vec![CapabilityDefinition::new(
            "block/navigation:addinstance",
            AccessType::Write,
            CONTEXT_BLOCK,
        )]
    }
}

#[async_trait]
impl BlockPlugin for NavigationBlock {
    fn regions(&self) -> Vec<String> {
        REGIONS.iter().map(|r| r.to_string()).collect()
    }

    async fn content(&self, ctx: &BlockRenderContext) -> KernelResult<BlockContent> {
        let config: NavigationConfig = if ctx.config().is_empty() {
            NavigationConfig::default()
        } else {
            serde_json::from_slice(ctx.config()).unwrap_or_else(|e| {
                log::warn!("Navigation block {} has unreadable config: {}", ctx.instance.id, e);
                NavigationConfig::default()
            })
        };
        let items: String = Self::trail(&ctx.page_type)
            .into_iter()
            .map(|(label, href)| format!("<li><a href=\"{}\">{}</a></li>", escape_html(&href), escape_html(&label)))
            .collect();
        Ok(BlockContent {
            title: config.title.unwrap_or_else(|| "Navigation".to_string()),
            text: format!("<ul class=\"trail\">{}</ul>", items),
            footer: String::new(),
        })
    }
}

pub fn register(factories: &mut PluginFactories) {
    factories.register_block(NAME, || Arc::new(NavigationBlock));
}
