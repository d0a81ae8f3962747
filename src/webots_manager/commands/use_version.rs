use crate::catalog::ArchiveCatalog;
use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::instance::InstanceStore;
use crate::version::Version;

pub fn run<C: ArchiveCatalog>(store: &mut InstanceStore<C>, v: Version) -> Result<CmdResult> {
    let was_installed = store.is_installed(v);
    store.use_version(v)?;

    let mut result = CmdResult::default();
    if !was_installed {
        result.add_message(CmdMessage::info(format!("Installed {}", v)));
    }
    result.add_message(CmdMessage::success(format!("Now using {}", v)));
    Ok(result)
}
