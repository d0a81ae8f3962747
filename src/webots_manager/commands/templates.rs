//! Template commands. Every change to the rule set is followed by a
//! reconciliation of all installed versions.

use crate::catalog::ArchiveCatalog;
use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::instance::InstanceStore;
use crate::template::ApplyReport;
use crate::version::Version;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Whitelist,
    Blacklist,
}

pub fn add<C: ArchiveCatalog>(
    store: &mut InstanceStore<C>,
    source: &Path,
    install_path: &str,
) -> Result<CmdResult> {
    let record = store.templates().register_template(source, install_path)?;
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Registered {} as {}",
        source.display(),
        record.install_path
    )));
    reconcile(store, result)
}

pub fn remove<C: ArchiveCatalog>(
    store: &mut InstanceStore<C>,
    install_path: &str,
) -> Result<CmdResult> {
    let record = store.templates().remove_template(install_path)?;
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "Removed template {}",
        record.install_path
    )));
    reconcile(store, result)
}

pub fn rule<C: ArchiveCatalog>(
    store: &mut InstanceStore<C>,
    kind: RuleKind,
    install_path: &str,
    versions: &[Version],
) -> Result<CmdResult> {
    let templates = store.templates();
    let record = match kind {
        RuleKind::Whitelist => templates.whitelist(install_path, versions)?,
        RuleKind::Blacklist => templates.blacklist(install_path, versions)?,
    };
    let (label, set) = match kind {
        RuleKind::Whitelist => ("whitelist", &record.whitelist),
        RuleKind::Blacklist => ("blacklist", &record.blacklist),
    };
    let mut result = CmdResult::default();
    result.add_message(CmdMessage::success(format!(
        "{} {}: {}",
        record.install_path,
        label,
        join(set.iter())
    )));
    reconcile(store, result)
}

pub fn list<C: ArchiveCatalog>(store: &InstanceStore<C>) -> Result<CmdResult> {
    let records = store.templates().templates()?;
    let mut result = CmdResult::default();
    if records.is_empty() {
        result.add_message(CmdMessage::info("No templates registered"));
    }
    Ok(result.with_listed_templates(records))
}

pub fn apply<C: ArchiveCatalog>(store: &mut InstanceStore<C>) -> Result<CmdResult> {
    reconcile(store, CmdResult::default())
}

fn reconcile<C: ArchiveCatalog>(
    store: &mut InstanceStore<C>,
    mut result: CmdResult,
) -> Result<CmdResult> {
    let reports = store.apply_all_templates()?;
    for (v, report) in &reports {
        if let Some(summary) = summarize(report) {
            result.add_message(CmdMessage::info(format!("{}: {}", v, summary)));
        }
    }
    Ok(result.with_reports(reports))
}

fn summarize(report: &ApplyReport) -> Option<String> {
    let mut parts = Vec::new();
    if !report.linked.is_empty() {
        parts.push(format!("linked {}", report.linked.join(", ")));
    }
    if !report.unlinked.is_empty() {
        parts.push(format!("unlinked {}", report.unlinked.join(", ")));
    }
    Some(parts.join("; ")).filter(|s| !s.is_empty())
}

fn join<'a>(versions: impl Iterator<Item = &'a Version>) -> String {
    let parts: Vec<String> = versions.map(Version::to_string).collect();
    if parts.is_empty() {
        "(none)".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::dir::DirCatalog;
    use crate::error::ManagerError;
    use crate::test_utils::TestEnv;
    use std::fs;

    fn installed_store(env: &TestEnv, versions: &[Version]) -> InstanceStore<DirCatalog> {
        for &v in versions {
            env.publish(v);
        }
        let catalog = DirCatalog::new(&env.mirror, &env.config.arch).unwrap();
        let mut store = InstanceStore::open(&env.config, catalog).unwrap();
        for &v in versions {
            store.install(v).unwrap();
        }
        store
    }

    #[test]
    fn add_links_into_every_installed_version() {
        let env = TestEnv::new();
        let versions = [Version::new(2020, 1, 0), Version::new(2021, 0, 0)];
        let mut store = installed_store(&env, &versions);
        let src = env.source_file("license", "key");

        let result = add(&mut store, &src, "resources/license").unwrap();
        assert_eq!(result.reports.len(), 2);
        for v in versions {
            let link = env.layout().version_dir(v).join("resources/license");
            assert_eq!(fs::read_to_string(link).unwrap(), "key");
        }
    }

    #[test]
    fn blacklist_unlinks_from_that_version() {
        let env = TestEnv::new();
        let old = Version::new(2020, 1, 0);
        let new = Version::new(2021, 0, 0);
        let mut store = installed_store(&env, &[old, new]);
        add(&mut store, &env.source_file("a", "a"), "a.conf").unwrap();

        let result = rule(&mut store, RuleKind::Blacklist, "a.conf", &[old]).unwrap();
        assert_eq!(result.messages[0].content, "a.conf blacklist: 2020.1.0");
        assert!(fs::symlink_metadata(env.layout().version_dir(old).join("a.conf")).is_err());
        assert!(env.layout().version_dir(new).join("a.conf").exists());
    }

    #[test]
    fn remove_unlinks_everywhere() {
        let env = TestEnv::new();
        let v = Version::new(2021, 0, 0);
        let mut store = installed_store(&env, &[v]);
        add(&mut store, &env.source_file("a", "a"), "a.conf").unwrap();

        remove(&mut store, "a.conf").unwrap();
        assert!(fs::symlink_metadata(env.layout().version_dir(v).join("a.conf")).is_err());
        assert!(list(&store).unwrap().listed_templates.is_empty());
    }

    #[test]
    fn rule_on_unknown_template_fails() {
        let env = TestEnv::new();
        let mut store = installed_store(&env, &[]);
        let err =
            rule(&mut store, RuleKind::Whitelist, "nope", &[Version::new(1, 0, 0)]).unwrap_err();
        assert!(matches!(err, ManagerError::NotFound(_)));
    }

    #[test]
    fn apply_is_quiet_when_nothing_changes() {
        let env = TestEnv::new();
        let mut store = installed_store(&env, &[Version::new(1, 0, 0)]);
        add(&mut store, &env.source_file("a", "a"), "a.conf").unwrap();

        let result = apply(&mut store).unwrap();
        assert!(result.messages.is_empty());
        assert!(result.reports[0].1.is_noop());
    }
}
