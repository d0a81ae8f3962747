use crate::commands::{CmdMessage, CmdResult};
use crate::config::Layout;
use crate::error::Result;
use crate::setup::{self, HomeLinkStatus};

pub fn run(layout: &Layout) -> Result<CmdResult> {
    let mut result = CmdResult::default();
    match setup::ensure_home_link(layout)? {
        HomeLinkStatus::Created => result.add_message(CmdMessage::success(format!(
            "Linked {} -> {}",
            layout.home_link.display(),
            layout.used_link().display()
        ))),
        HomeLinkStatus::AlreadyPresent => result.add_message(CmdMessage::info(format!(
            "{} is already set up",
            layout.home_link.display()
        ))),
    }
    if let Some(advice) = setup::check_home_env(layout) {
        result.add_message(CmdMessage::warning(advice));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::MessageLevel;
    use tempfile::TempDir;

    #[test]
    fn creates_then_reports_present() {
        let temp = TempDir::new().unwrap();
        let layout = Layout::new(temp.path().join("w"), temp.path().join("webots"));

        let first = run(&layout).unwrap();
        assert_eq!(first.messages[0].level, MessageLevel::Success);
        let second = run(&layout).unwrap();
        assert_eq!(second.messages[0].level, MessageLevel::Info);
    }
}
