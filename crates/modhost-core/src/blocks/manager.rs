//! # Modhost Block Manager
//!
//! Creates, moves, toggles and deletes block placements and answers "what
//! renders on page X".
//!
//! Every write is one store transaction, including the `max + 1` weight
//! computation of [`BlockManager::create_instance`], which therefore cannot
//! race with another create at the same coordinate. Positions are always
//! read fresh from the store; only plugin implementations are cached.
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;

use crate::blocks::error::BlockSystemError;
use crate::blocks::pattern::PageTypePattern;
use crate::kernel::constants::FIRST_BLOCK_WEIGHT;
use crate::kernel::error::Result;
use crate::plugin_system::descriptor::{PluginKey, PluginType};
use crate::plugin_system::loader::PluginLoader;
use crate::plugin_system::traits::{BlockContent, BlockRenderContext};
use crate::storage::records::{BlockInstanceRecord, BlockPositionRecord, Records};
use crate::storage::RecordStore;

/// One block ready for a page, in render order.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedBlock {
    pub instance: BlockInstanceRecord,
    pub position: BlockPositionRecord,
    pub content: BlockContent,
    pub html: String,
}

impl RenderedBlock {
    pub fn region(&self) -> &str {
        &self.position.region
    }
}

/// Group an already ordered list by region, keeping the order within each
/// region.
pub fn group_by_region(blocks: Vec<RenderedBlock>) -> BTreeMap<String, Vec<RenderedBlock>> {
    let mut regions: BTreeMap<String, Vec<RenderedBlock>> = BTreeMap::new();
    for block in blocks {
        regions.entry(block.position.region.clone()).or_default().push(block);
    }
    regions
}

fn block_component(block_name: &str) -> String {
    PluginKey::new(PluginType::Block, block_name).component()
}

fn require_text(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BlockSystemError::InvalidPageType(format!("empty {}", what)).into());
    }
    Ok(())
}

#[derive(Debug)]
pub struct BlockManager {
    loader: Arc<PluginLoader>,
    store: Arc<RecordStore>,
}

impl BlockManager {
    pub fn new(loader: Arc<PluginLoader>, store: Arc<RecordStore>) -> Self {
        Self { loader, store }
    }

    /// Add a block to a page and return the new instance id.
    ///
    /// The instance and its first position are written together; the weight
    /// is one more than the heaviest block already at
    /// `(region, page_type, context_id)`, or [`FIRST_BLOCK_WEIGHT`].
    pub async fn create_instance(
        &self,
        block_name: &str,
        page_type: &str,
        region: &str,
        config: Vec<u8>,
        context_id: i64,
    ) -> Result<i64> {
        require_text(page_type, "page type")?;
        require_text(region, "region")?;
        let component = block_component(block_name);
        if !self.store.read(|r| r.is_enabled(&component)).await {
            return Err(BlockSystemError::PluginDisabled {
                block: block_name.to_string(),
            }
            .into());
        }
        let block = self.loader.load_block(block_name).await?;
        let regions = block.regions();
        if !regions.is_empty() && !regions.iter().any(|r| r == region) {
            return Err(BlockSystemError::UnsupportedRegion {
                block: block_name.to_string(),
                region: region.to_string(),
            }
            .into());
        }

        let now = Utc::now().timestamp();
        let (id, weight) = self
            .store
            .transaction(|tx| {
                if !tx.is_enabled(&component) {
                    return Err(BlockSystemError::PluginDisabled {
                        block: block_name.to_string(),
                    }
                    .into());
                }
                let weight = match tx.max_block_weight(region, page_type, context_id) {
                    None => FIRST_BLOCK_WEIGHT,
                    Some(max) => max.checked_add(1).ok_or_else(|| BlockSystemError::WeightOverflow {
                        region: region.to_string(),
                        page_type: page_type.to_string(),
                        context_id,
                        weight: max,
                    })?,
                };
                let id = tx.insert_block_instance(BlockInstanceRecord {
                    id: 0,
                    block_name: block_name.to_string(),
                    parent_context_id: context_id,
                    show_in_subcontexts: false,
                    page_type_pattern: page_type.to_string(),
                    default_region: region.to_string(),
                    default_weight: weight,
                    config_data: config,
                    visible: true,
                    time_created: now,
                    time_modified: now,
                });
                tx.insert_block_position(BlockPositionRecord {
                    id: 0,
                    block_instance_id: id,
                    context_id,
                    page_type: page_type.to_string(),
                    subpage: String::new(),
                    visible: true,
                    region: region.to_string(),
                    weight,
                })?;
                Ok((id, weight))
            })
            .await?;
        info!(
            "Added block {} instance {} to {}/{} in context {} at weight {}",
            block_name, id, page_type, region, context_id, weight
        );
        Ok(id)
    }

    /// Place an existing instance on another page of a context.
    pub async fn add_position(
        &self,
        instance_id: i64,
        context_id: i64,
        page_type: &str,
        region: &str,
        weight: i64,
    ) -> Result<i64> {
        require_text(page_type, "page type")?;
        require_text(region, "region")?;
        self.store
            .transaction(|tx| {
                if tx.block_instance(instance_id).is_none() {
                    return Err(BlockSystemError::InstanceNotFound(instance_id).into());
                }
                tx.insert_block_position(BlockPositionRecord {
                    id: 0,
                    block_instance_id: instance_id,
                    context_id,
                    page_type: page_type.to_string(),
                    subpage: String::new(),
                    visible: true,
                    region: region.to_string(),
                    weight,
                })
            })
            .await
    }

    /// Replace the opaque configuration. Positions are untouched.
    pub async fn update_instance(&self, instance_id: i64, config: Vec<u8>) -> Result<()> {
        let now = Utc::now().timestamp();
        self.store
            .transaction(|tx| {
                let mut instance = tx
                    .block_instance(instance_id)
                    .cloned()
                    .ok_or(BlockSystemError::InstanceNotFound(instance_id))?;
                instance.config_data = config;
                instance.time_modified = now;
                tx.update_block_instance(instance)
            })
            .await
    }

    pub async fn set_instance_visible(&self, instance_id: i64, visible: bool) -> Result<()> {
        self.store
            .transaction(|tx| {
                let mut instance = tx
                    .block_instance(instance_id)
                    .cloned()
                    .ok_or(BlockSystemError::InstanceNotFound(instance_id))?;
                instance.visible = visible;
                tx.update_block_instance(instance)
            })
            .await
    }

    /// Delete the instance and every position referencing it.
    pub async fn delete_instance(&self, instance_id: i64) -> Result<()> {
        let removed = self
            .store
            .transaction(|tx| {
                if tx.block_instance(instance_id).is_none() {
                    return Err(BlockSystemError::InstanceNotFound(instance_id).into());
                }
                let removed = tx.delete_positions_for_instance(instance_id);
                tx.delete_block_instance(instance_id)?;
                Ok(removed)
            })
            .await?;
        info!("Deleted block instance {} and {} positions", instance_id, removed);
        Ok(())
    }

    /// Set region and weight of the instance's positions in `context_id`.
    /// Siblings are not renumbered.
    pub async fn move_instance(&self, instance_id: i64, region: &str, weight: i64, context_id: i64) -> Result<()> {
        require_text(region, "region")?;
        self.store
            .transaction(|tx| {
                for mut position in context_positions(tx, instance_id, context_id)? {
                    position.region = region.to_string();
                    position.weight = weight;
                    tx.update_block_position(position)?;
                }
                Ok(())
            })
            .await?;
        debug!(
            "Moved block instance {} to {} weight {} in context {}",
            instance_id, region, weight, context_id
        );
        Ok(())
    }

    /// Flip visibility of the instance's positions in `context_id` and return
    /// the new value.
    pub async fn toggle_visibility(&self, instance_id: i64, context_id: i64) -> Result<bool> {
        self.store
            .transaction(|tx| {
                let positions = context_positions(tx, instance_id, context_id)?;
                let visible = !positions.iter().all(|p| p.visible);
                for mut position in positions {
                    position.visible = visible;
                    tx.update_block_position(position)?;
                }
                Ok(visible)
            })
            .await
    }

    pub async fn instance(&self, instance_id: i64) -> Result<BlockInstanceRecord> {
        self.store
            .read(|r| r.block_instance(instance_id).cloned())
            .await
            .ok_or_else(|| BlockSystemError::InstanceNotFound(instance_id).into())
    }

    pub async fn positions(&self, instance_id: i64) -> Vec<BlockPositionRecord> {
        self.store
            .read(|r| r.positions_for_instance(instance_id).cloned().collect())
            .await
    }

    /// Blocks rendered on `page_type` in `context_id`, sorted by weight then
    /// instance id.
    ///
    /// Blocks whose plugin is disabled, fails to load, vetoes itself or fails
    /// to produce content are left out.
    pub async fn resolve_for_page(&self, page_type: &str, context_id: i64) -> Result<Vec<RenderedBlock>> {
        let candidates = self
            .store
            .read(|r| visible_placements(r, page_type, context_id))
            .await;

        let mut rendered = Vec::with_capacity(candidates.len());
        for (instance, position, enabled) in candidates {
            if !enabled {
                debug!("Block {} instance {} skipped, plugin disabled", instance.block_name, instance.id);
                continue;
            }
            let block = match self.loader.load_block(&instance.block_name).await {
                Ok(block) => block,
                Err(e) => {
                    warn!("Block {} instance {} skipped: {}", instance.block_name, instance.id, e);
                    continue;
                }
            };
            let ctx = BlockRenderContext {
                instance,
                position,
                page_type: page_type.to_string(),
                context_id,
            };
            if !block.is_visible(&ctx) {
                debug!("Block instance {} hidden by its plugin", ctx.instance.id);
                continue;
            }
            let content = match block.content(&ctx).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Block instance {} produced no content: {}", ctx.instance.id, e);
                    continue;
                }
            };
            let html = block.html(&ctx, &content);
            rendered.push(RenderedBlock {
                instance: ctx.instance,
                position: ctx.position,
                content,
                html,
            });
        }
        Ok(rendered)
    }

    pub async fn resolve_grouped(
        &self,
        page_type: &str,
        context_id: i64,
    ) -> Result<BTreeMap<String, Vec<RenderedBlock>>> {
        Ok(group_by_region(self.resolve_for_page(page_type, context_id).await?))
    }
}

fn context_positions(records: &Records, instance_id: i64, context_id: i64) -> Result<Vec<BlockPositionRecord>> {
    if records.block_instance(instance_id).is_none() {
        return Err(BlockSystemError::InstanceNotFound(instance_id).into());
    }
    let positions: Vec<BlockPositionRecord> = records
        .positions_for_instance(instance_id)
        .filter(|p| p.context_id == context_id)
        .cloned()
        .collect();
    if positions.is_empty() {
        return Err(BlockSystemError::PositionNotFound {
            instance_id,
            context_id,
        }
        .into());
    }
    Ok(positions)
}

/// For each instance, its most specific position matching the page; then
/// only visible positions of visible instances, in render order. The flag
/// tells whether the block plugin is enabled.
fn visible_placements(
    records: &Records,
    page_type: &str,
    context_id: i64,
) -> Vec<(BlockInstanceRecord, BlockPositionRecord, bool)> {
    let mut best: HashMap<i64, (PageTypePattern, &BlockPositionRecord)> = HashMap::new();
    for position in records.block_positions() {
        if position.context_id != context_id {
            continue;
        }
        let pattern = PageTypePattern::new(position.page_type.as_str());
        if !pattern.matches(page_type) {
            continue;
        }
        let replace = match best.get(&position.block_instance_id) {
            Some((current, _)) => pattern.cmp_specificity(current).is_gt(),
            None => true,
        };
        if replace {
            best.insert(position.block_instance_id, (pattern, position));
        }
    }

    let mut placements: Vec<(BlockInstanceRecord, BlockPositionRecord, bool)> = best
        .into_values()
        .filter(|(_, position)| position.visible)
        .filter_map(|(_, position)| {
            let instance = records.block_instance(position.block_instance_id)?;
            if !instance.visible {
                return None;
            }
            let enabled = records.is_enabled(&block_component(&instance.block_name));
            Some((instance.clone(), position.clone(), enabled))
        })
        .collect();
    placements.sort_by_key(|(instance, position, _)| (position.weight, instance.id));
    placements
}
