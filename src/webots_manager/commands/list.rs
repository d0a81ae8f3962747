use crate::catalog::ArchiveCatalog;
use crate::commands::{CmdMessage, CmdResult, VersionLine};
use crate::error::Result;
use crate::instance::InstanceStore;

/// Installed versions, or every catalog version when `all` is set.
pub fn run<C: ArchiveCatalog>(store: &InstanceStore<C>, all: bool) -> Result<CmdResult> {
    let versions = if all {
        let mut versions = store.available()?;
        // Installed versions no longer offered upstream still show up.
        versions.extend(store.installed());
        versions.sort();
        versions.dedup();
        versions
    } else {
        store.installed()
    };

    let lines: Vec<VersionLine> = versions
        .into_iter()
        .map(|version| VersionLine {
            version,
            installed: store.is_installed(version),
            active: store.is_used(version),
        })
        .collect();

    let mut result = CmdResult::default();
    if lines.is_empty() {
        result.add_message(CmdMessage::info(if all {
            "No versions available"
        } else {
            "No versions installed"
        }));
    }
    Ok(result.with_listed_versions(lines))
}
