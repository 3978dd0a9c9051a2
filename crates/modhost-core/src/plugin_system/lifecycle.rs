//! # Modhost Plugin Lifecycle
//!
//! Install, upgrade and uninstall transitions and the version bookkeeping
//! behind them.
//!
//! Each transition runs its plugin hook and its record writes inside one
//! store transaction. A failing hook therefore leaves the previous state in
//! place: no version after a failed install, the old version after a failed
//! upgrade, everything intact after a failed uninstall.
//!
//! The host itself is component `core`, always enabled and installed at the
//! configured host version.
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use crate::kernel::constants::CORE_COMPONENT;
use crate::kernel::error::Result;
use crate::plugin_system::descriptor::{PluginDescriptor, PluginKey, PluginType};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::loader::{check_host_compatibility, PluginLoader};
use crate::plugin_system::traits::PluginImplementation;
use crate::storage::{RecordStore, Records};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum InstallStatus {
    NotInstalled,
    Installed { version: i64 },
    UpgradePending { installed: i64, available: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UpgradeOutcome {
    /// Installed version already at or above the descriptor's
    Skipped { installed: i64 },
    Upgraded { from: i64, to: i64 },
}

#[derive(Debug)]
pub struct LifecycleManager {
    loader: Arc<PluginLoader>,
    store: Arc<RecordStore>,
}

impl LifecycleManager {
    pub fn new(loader: Arc<PluginLoader>, store: Arc<RecordStore>) -> Self {
        Self { loader, store }
    }

    fn host_version(&self) -> i64 {
        self.loader.host_version()
    }

    async fn installed_version(&self, component: &str) -> Option<i64> {
        if component == CORE_COMPONENT {
            return Some(self.host_version());
        }
        self.store.read(|r| r.installed_version(component)).await
    }

    pub async fn status(&self, plugin_type: PluginType, name: &str) -> Result<InstallStatus> {
        let component = PluginKey::new(plugin_type, name).component();
        let Some(installed) = self.installed_version(&component).await else {
            return Ok(InstallStatus::NotInstalled);
        };
        match self.loader.reader().read(plugin_type, name).await {
            Ok(descriptor) if descriptor.version > installed => Ok(InstallStatus::UpgradePending {
                installed,
                available: descriptor.version,
            }),
            Ok(_) => Ok(InstallStatus::Installed { version: installed }),
            Err(e) if e.is_not_found() => Ok(InstallStatus::Installed { version: installed }),
            Err(e) => Err(e),
        }
    }

    /// Every dependency must be installed at its minimum version and enabled.
    /// Fails on the first unsatisfied one, in declaration order.
    pub async fn check_dependencies(&self, descriptor: &PluginDescriptor) -> Result<()> {
        let host_version = self.host_version();
        self.store
            .read(|records| dependency_failure(records, descriptor, host_version))
            .await
            .map_or(Ok(()), |e| Err(e.into()))
    }

    /// Install a plugin and return the recorded version.
    ///
    /// A plugin that is already installed is left untouched.
    pub async fn install(&self, plugin_type: PluginType, name: &str) -> Result<i64> {
        let descriptor = self.loader.reader().read(plugin_type, name).await?;
        let component = descriptor.component();
        if let Some(version) = self.installed_version(&component).await {
            debug!("{} already installed at version {}", component, version);
            return Ok(version);
        }
        check_host_compatibility(&descriptor, self.host_version())?;
        self.check_dependencies(&descriptor).await?;

        let loaded = self.loader.load(plugin_type, name).await?;
        let version = descriptor.version;
        let recorded = self
            .store
            .transaction(|tx| {
                if let Some(existing) = tx.installed_version(&component) {
                    return Ok(existing);
                }
                loaded.implementation.install(tx)?;
                tx.set_installed_version(&component, version);
                Ok(version)
            })
            .await?;
        info!("Installed {} version {}", component, recorded);
        Ok(recorded)
    }

    /// Bring the installed version up to the descriptor's.
    pub async fn upgrade(&self, plugin_type: PluginType, name: &str) -> Result<UpgradeOutcome> {
        let component = PluginKey::new(plugin_type, name).component();
        let installed = self
            .store
            .read(|r| r.installed_version(&component))
            .await
            .ok_or_else(|| PluginSystemError::NotInstalled {
                component: component.clone(),
            })?;
        let descriptor = self.loader.reader().read(plugin_type, name).await?;
        if installed >= descriptor.version {
            return Ok(UpgradeOutcome::Skipped { installed });
        }
        check_host_compatibility(&descriptor, self.host_version())?;
        self.check_dependencies(&descriptor).await?;

        // The cached instance may predate the new descriptor
        self.loader.evict(plugin_type, name).await;
        let loaded = self.loader.load(plugin_type, name).await?;
        let target = descriptor.version;
        let outcome = self
            .store
            .transaction(|tx| {
                let current = tx.installed_version(&component).ok_or_else(|| PluginSystemError::NotInstalled {
                    component: component.clone(),
                })?;
                if current >= target {
                    return Ok(UpgradeOutcome::Skipped { installed: current });
                }
                loaded.implementation.upgrade(tx, current, target)?;
                tx.set_installed_version(&component, target);
                Ok(UpgradeOutcome::Upgraded {
                    from: current,
                    to: target,
                })
            })
            .await?;
        if let UpgradeOutcome::Upgraded { from, to } = outcome {
            info!("Upgraded {} from {} to {}", component, from, to);
        }
        Ok(outcome)
    }

    /// Upgrade every installed plugin, stopping at the first failure.
    pub async fn upgrade_all(&self) -> Result<Vec<(PluginKey, UpgradeOutcome)>> {
        let components: Vec<String> = self
            .store
            .read(|r| r.installed().map(|(c, _)| c.to_string()).collect())
            .await;
        let mut outcomes = Vec::new();
        for component in components {
            let key = match PluginKey::parse_component(&component) {
                Ok(key) => key,
                Err(_) => continue,
            };
            match self.upgrade(key.plugin_type, &key.name).await {
                Ok(outcome) => outcomes.push((key, outcome)),
                Err(e) if e.is_not_found() => {
                    warn!("Installed plugin {} has no descriptor, not upgraded", component);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcomes)
    }

    /// Installed plugins declaring a dependency on `component`.
    pub async fn dependents(&self, component: &str) -> Result<Vec<PluginKey>> {
        let components: Vec<String> = self
            .store
            .read(|r| r.installed().map(|(c, _)| c.to_string()).collect())
            .await;
        let mut dependents = Vec::new();
        for candidate in components {
            if candidate == component {
                continue;
            }
            let Ok(key) = PluginKey::parse_component(&candidate) else {
                continue;
            };
            match self.loader.reader().read(key.plugin_type, &key.name).await {
                Ok(descriptor) if descriptor.depends_on(component) => dependents.push(key),
                Ok(_) => {}
                Err(e) => debug!("Ignoring {} while looking for dependents: {}", candidate, e),
            }
        }
        Ok(dependents)
    }

    /// Run the uninstall hook and remove every durable trace of the plugin:
    /// version, settings, enable record and, for blocks, their placements.
    pub async fn uninstall(&self, plugin_type: PluginType, name: &str) -> Result<()> {
        let key = PluginKey::new(plugin_type, name);
        let component = key.component();
        if self.store.read(|r| r.installed_version(&component)).await.is_none() {
            return Err(PluginSystemError::NotInstalled { component }.into());
        }

        let blocking: Vec<String> = {
            let dependents = self.dependents(&component).await?;
            self.store
                .read(|r| {
                    dependents
                        .iter()
                        .map(PluginKey::component)
                        .filter(|c| r.is_enabled(c))
                        .collect()
                })
                .await
        };
        if !blocking.is_empty() {
            return Err(PluginSystemError::DependencyInUse {
                component,
                dependents: blocking,
            }
            .into());
        }
        if plugin_type == PluginType::Module {
            let in_use = self.store.read(|r| r.course_modules_of_type(name).count()).await;
            if in_use > 0 {
                return Err(PluginSystemError::PluginInUse {
                    component,
                    message: format!("{} course modules exist", in_use),
                }
                .into());
            }
        }

        let implementation = self.implementation_for_uninstall(plugin_type, name).await?;
        self.store
            .transaction(|tx| {
                if tx.installed_version(&component).is_none() {
                    return Err(PluginSystemError::NotInstalled {
                        component: component.clone(),
                    }
                    .into());
                }
                if let Some(implementation) = &implementation {
                    implementation.uninstall(tx)?;
                }
                tx.remove_installed_version(&component);
                tx.remove_settings(&component);
                tx.set_enabled(&component, false);
                if plugin_type == PluginType::Block {
                    let purged = tx.purge_block_instances(name);
                    debug!("Removed {} instances of {}", purged, component);
                }
                Ok(())
            })
            .await?;
        self.loader.evict(plugin_type, name).await;
        info!("Uninstalled {}", component);
        Ok(())
    }

    /// The implementation whose uninstall hook should run, resolved without
    /// initializing it. Plugins whose code or manifest is gone are removed
    /// without a hook.
    async fn implementation_for_uninstall(
        &self,
        plugin_type: PluginType,
        name: &str,
    ) -> Result<Option<PluginImplementation>> {
        let descriptor = match self.loader.reader().read(plugin_type, name).await {
            Ok(descriptor) => descriptor,
            Err(e) if e.is_not_found() => {
                warn!("No descriptor for {}_{}, uninstall hook skipped", plugin_type, name);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        match self.loader.resolve(&descriptor) {
            Ok(implementation) => Ok(Some(implementation)),
            Err(e) => {
                warn!("Uninstall hook of {} skipped: {}", descriptor.component(), e);
                Ok(None)
            }
        }
    }
}

fn dependency_failure(records: &Records, descriptor: &PluginDescriptor, host_version: i64) -> Option<PluginSystemError> {
    for dependency in &descriptor.dependencies {
        let (installed, enabled) = if dependency.component == CORE_COMPONENT {
            (Some(host_version), true)
        } else {
            (
                records.installed_version(&dependency.component),
                records.is_enabled(&dependency.component),
            )
        };
        let version_ok = match (installed, dependency.min_version) {
            (Some(installed), Some(required)) => installed >= required,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !version_ok || !enabled {
            return Some(PluginSystemError::UnsatisfiedDependency {
                component: descriptor.component(),
                dependency: dependency.component.clone(),
                required: dependency.min_version,
                installed,
                enabled,
            });
        }
    }
    None
}
