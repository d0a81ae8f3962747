use crate::template::{ApplyReport, TemplateRecord};
use crate::version::Version;

pub mod init;
pub mod install;
pub mod list;
pub mod templates;
pub mod use_version;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }
}

/// One row of `list` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionLine {
    pub version: Version,
    pub installed: bool,
    pub active: bool,
}

#[derive(Debug, Default)]
pub struct CmdResult {
    pub listed_versions: Vec<VersionLine>,
    pub listed_templates: Vec<TemplateRecord>,
    pub reports: Vec<(Version, ApplyReport)>,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_listed_versions(mut self, versions: Vec<VersionLine>) -> Self {
        self.listed_versions = versions;
        self
    }

    pub fn with_listed_templates(mut self, templates: Vec<TemplateRecord>) -> Self {
        self.listed_templates = templates;
        self
    }

    pub fn with_reports(mut self, reports: Vec<(Version, ApplyReport)>) -> Self {
        self.reports = reports;
        self
    }
}
