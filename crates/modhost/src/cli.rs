//! Subcommands and their handlers.
use clap::Subcommand;
use modhost_core::blocks::manager::group_by_region;
use modhost_core::kernel::error::Result;
use modhost_core::plugin_system::lifecycle::UpgradeOutcome;
use modhost_core::{Application, PluginKey};

#[derive(Subcommand, Debug)]
pub enum PluginCommand {
    /// List available plugins
    List {
        /// Print JSON summaries instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Enable a plugin, e.g. `block_html`
    Enable { component: String },
    /// Disable a plugin
    Disable { component: String },
    /// Show the install state of a plugin
    Status { component: String },
    /// Install a plugin
    Install { component: String },
    /// Upgrade one plugin, or every installed plugin with --all
    Upgrade {
        #[arg(required_unless_present = "all")]
        component: Option<String>,
        #[arg(long, conflicts_with = "component")]
        all: bool,
    },
    /// Uninstall a plugin and remove its records
    Uninstall { component: String },
}

#[derive(Subcommand, Debug)]
pub enum BlockCommand {
    /// Add a block to a page
    Add {
        /// Block plugin name, e.g. `html`
        name: String,
        #[arg(long)]
        page_type: String,
        #[arg(long)]
        region: String,
        #[arg(long)]
        context: i64,
        /// Opaque instance configuration, passed to the block as is
        #[arg(long = "block-config", default_value = "")]
        block_config: String,
    },
    /// Show the blocks rendered on a page, grouped by region
    Page {
        #[arg(long)]
        page_type: String,
        #[arg(long)]
        context: i64,
        #[arg(long)]
        json: bool,
    },
    /// Move a block to another region or weight
    Move {
        id: i64,
        #[arg(long)]
        region: String,
        #[arg(long, allow_negative_numbers = true)]
        weight: i64,
        #[arg(long)]
        context: i64,
    },
    /// Show or hide a block in a context
    Toggle {
        id: i64,
        #[arg(long)]
        context: i64,
    },
    /// Delete a block instance and its positions
    Delete { id: i64 },
}

pub async fn run_plugin_command(app: &Application, command: &PluginCommand) -> Result<()> {
    match command {
        PluginCommand::List { json } => {
            let discovery = app.registry().discover().await?;
            for skipped in &discovery.skipped {
                eprintln!("Skipped {}_{}: {}", skipped.plugin_type, skipped.name, skipped.reason);
            }
            if *json {
                let summaries: Vec<_> = discovery
                    .plugins
                    .iter()
                    .map(modhost_core::plugin_system::PluginSummary::from)
                    .collect();
                let text = serde_json::to_string_pretty(&summaries).map_err(|e| e.to_string())?;
                println!("{}", text);
            } else if discovery.plugins.is_empty() {
                println!("No plugins found under {}", app.config().plugin_root.display());
            } else {
                for plugin in &discovery.plugins {
                    println!(
                        "{:<24} {:>12}  {}",
                        plugin.descriptor.component(),
                        plugin.descriptor.version,
                        if plugin.enabled { "enabled" } else { "disabled" }
                    );
                }
            }
        }
        PluginCommand::Enable { component } => {
            let key = PluginKey::parse_component(component)?;
            app.registry().enable(key.plugin_type, &key.name).await?;
            println!("Enabled {}", key);
        }
        PluginCommand::Disable { component } => {
            let key = PluginKey::parse_component(component)?;
            app.registry().disable(key.plugin_type, &key.name).await?;
            println!("Disabled {}", key);
        }
        PluginCommand::Status { component } => {
            let key = PluginKey::parse_component(component)?;
            let status = app.lifecycle().status(key.plugin_type, &key.name).await?;
            let text = serde_json::to_string(&status).map_err(|e| e.to_string())?;
            println!("{} {}", key, text);
        }
        PluginCommand::Install { component } => {
            let key = PluginKey::parse_component(component)?;
            let version = app.lifecycle().install(key.plugin_type, &key.name).await?;
            println!("Installed {} version {}", key, version);
        }
        PluginCommand::Upgrade { component, all } => {
            let outcomes = if *all {
                app.lifecycle().upgrade_all().await?
            } else {
                let component = component.as_deref().unwrap_or_default();
                let key = PluginKey::parse_component(component)?;
                let outcome = app.lifecycle().upgrade(key.plugin_type, &key.name).await?;
                vec![(key, outcome)]
            };
            for (key, outcome) in outcomes {
                match outcome {
                    UpgradeOutcome::Skipped { installed } => println!("{} is up to date ({})", key, installed),
                    UpgradeOutcome::Upgraded { from, to } => println!("Upgraded {} from {} to {}", key, from, to),
                }
            }
        }
        PluginCommand::Uninstall { component } => {
            let key = PluginKey::parse_component(component)?;
            app.lifecycle().uninstall(key.plugin_type, &key.name).await?;
            println!("Uninstalled {}", key);
        }
    }
    Ok(())
}

pub async fn run_block_command(app: &Application, command: &BlockCommand) -> Result<()> {
    let blocks = app.blocks();
    match command {
        BlockCommand::Add {
            name,
            page_type,
            region,
            context,
            block_config,
        } => {
            let id = blocks
                .create_instance(name, page_type, region, block_config.as_bytes().to_vec(), *context)
                .await?;
            let weight = blocks
                .positions(id)
                .await
                .first()
                .map(|p| p.weight)
                .unwrap_or_default();
            println!("Created block instance {} in {} at weight {}", id, region, weight);
        }
        BlockCommand::Page {
            page_type,
            context,
            json,
        } => {
            let rendered = blocks.resolve_for_page(page_type, *context).await?;
            let grouped = group_by_region(rendered);
            if *json {
                let text = serde_json::to_string_pretty(&grouped).map_err(|e| e.to_string())?;
                println!("{}", text);
            } else if grouped.is_empty() {
                println!("No blocks on {} in context {}", page_type, context);
            } else {
                for (region, blocks) in &grouped {
                    println!("{}:", region);
                    for block in blocks {
                        println!(
                            "  [{}] {} (weight {}) {}",
                            block.instance.id, block.instance.block_name, block.position.weight, block.content.title
                        );
                    }
                }
            }
        }
        BlockCommand::Move {
            id,
            region,
            weight,
            context,
        } => {
            blocks.move_instance(*id, region, *weight, *context).await?;
            println!("Moved block instance {} to {} at weight {}", id, region, weight);
        }
        BlockCommand::Toggle { id, context } => {
            let visible = blocks.toggle_visibility(*id, *context).await?;
            println!(
                "Block instance {} is now {}",
                id,
                if visible { "visible" } else { "hidden" }
            );
        }
        BlockCommand::Delete { id } => {
            blocks.delete_instance(*id).await?;
            println!("Deleted block instance {}", id);
        }
    }
    Ok(())
}
