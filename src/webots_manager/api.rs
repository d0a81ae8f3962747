//! # API Facade
//!
//! A thin facade over the command layer and the single entry point for UI
//! clients. It parses user-supplied version text into [`Version`] values,
//! dispatches to `commands/*.rs` and hands back [`CmdResult`]s. No business
//! logic and no terminal output live here.
//!
//! `ManagerApi<C: ArchiveCatalog>` is generic over the catalog, so tests run
//! against a local mirror with [`DirCatalog`](crate::catalog::dir::DirCatalog)
//! while production uses whatever [`catalog::from_config`] picks.

use crate::catalog::{self, ArchiveCatalog};
use crate::commands;
use crate::config::ManagerConfig;
use crate::error::Result;
use crate::instance::InstanceStore;
use crate::version::Version;
use std::path::Path;

pub struct ManagerApi<C: ArchiveCatalog> {
    store: InstanceStore<C>,
}

impl ManagerApi<Box<dyn ArchiveCatalog>> {
    /// Opens the work root described by `config` with the catalog it names.
    pub fn from_config(config: &ManagerConfig) -> Result<Self> {
        let catalog = catalog::from_config(config)?;
        Ok(Self::new(InstanceStore::open(config, catalog)?))
    }
}

impl<C: ArchiveCatalog> ManagerApi<C> {
    pub fn new(store: InstanceStore<C>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &InstanceStore<C> {
        &self.store
    }

    pub fn list(&self, all: bool) -> Result<commands::CmdResult> {
        commands::list::run(&self.store, all)
    }

    pub fn install<V: AsRef<str>>(&mut self, versions: &[V]) -> Result<commands::CmdResult> {
        let versions = parse_versions(versions)?;
        commands::install::run(&mut self.store, &versions)
    }

    pub fn use_version(&mut self, version: &str) -> Result<commands::CmdResult> {
        commands::use_version::run(&mut self.store, Version::parse(version)?)
    }

    pub fn init(&self) -> Result<commands::CmdResult> {
        commands::init::run(self.store.layout())
    }

    pub fn add_template(
        &mut self,
        source: &Path,
        install_path: &str,
    ) -> Result<commands::CmdResult> {
        commands::templates::add(&mut self.store, source, install_path)
    }

    pub fn remove_template(&mut self, install_path: &str) -> Result<commands::CmdResult> {
        commands::templates::remove(&mut self.store, install_path)
    }

    pub fn whitelist<V: AsRef<str>>(
        &mut self,
        install_path: &str,
        versions: &[V],
    ) -> Result<commands::CmdResult> {
        let versions = parse_versions(versions)?;
        commands::templates::rule(&mut self.store, RuleKind::Whitelist, install_path, &versions)
    }

    pub fn blacklist<V: AsRef<str>>(
        &mut self,
        install_path: &str,
        versions: &[V],
    ) -> Result<commands::CmdResult> {
        let versions = parse_versions(versions)?;
        commands::templates::rule(&mut self.store, RuleKind::Blacklist, install_path, &versions)
    }

    pub fn list_templates(&self) -> Result<commands::CmdResult> {
        commands::templates::list(&self.store)
    }

    pub fn apply_templates(&mut self) -> Result<commands::CmdResult> {
        commands::templates::apply(&mut self.store)
    }
}

/// All-or-nothing: one malformed version rejects the whole request.
fn parse_versions<V: AsRef<str>>(inputs: &[V]) -> Result<Vec<Version>> {
    inputs.iter().map(|s| Version::parse(s.as_ref())).collect()
}

pub use commands::templates::RuleKind;
pub use commands::{CmdMessage, CmdResult, MessageLevel, VersionLine};
