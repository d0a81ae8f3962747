use crate::catalog::ArchiveCatalog;
use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::instance::InstanceStore;
use crate::version::Version;

/// Installs each version in turn, stopping at the first failure.
pub fn run<C: ArchiveCatalog>(
    store: &mut InstanceStore<C>,
    versions: &[Version],
) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    for &v in versions {
        let reinstall = store.is_installed(v);
        store.install(v)?;
        result.add_message(CmdMessage::success(if reinstall {
            format!("Reinstalled {}", v)
        } else {
            format!("Installed {}", v)
        }));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::dir::DirCatalog;
    use crate::error::ManagerError;
    use crate::test_utils::TestEnv;

    #[test]
    fn installs_in_order_and_stops_on_failure() {
        let env = TestEnv::new();
        env.publish(Version::new(1, 0, 0));
        let catalog = DirCatalog::new(&env.mirror, &env.config.arch).unwrap();
        let mut store = InstanceStore::open(&env.config, catalog).unwrap();

        let err = run(
            &mut store,
            &[Version::new(1, 0, 0), Version::new(2, 0, 0), Version::new(1, 0, 0)],
        )
        .unwrap_err();
        assert!(matches!(err, ManagerError::NotFound(_)));
        assert_eq!(store.installed(), vec![Version::new(1, 0, 0)]);

        let result = run(&mut store, &[Version::new(1, 0, 0)]).unwrap();
        assert_eq!(result.messages[0].content, "Reinstalled 1.0.0");
    }
}
