use regex::RegexBuilder;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use webdeploy::ssh::{CommandOutput, Remote, SedEdit};
use webdeploy::{Error, Result};

pub const COMMIT: &str = "0123456789abcdef0123456789abcdef01234567";

/// In-memory server: records every call, answers existence checks from a
/// path set, and applies sed edits to uploaded file contents.
#[derive(Default)]
pub struct FakeRemote {
    pub existing: RefCell<BTreeSet<String>>,
    pub files: RefCell<BTreeMap<String, String>>,
    pub log: RefCell<Vec<String>>,
    pub fail_on: Vec<String>,
    pub fail_upload: bool,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(paths: &[&str]) -> Self {
        let remote = Self::new();
        remote
            .existing
            .borrow_mut()
            .extend(paths.iter().map(|p| p.to_string()));
        remote
    }

    #[allow(dead_code)]
    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on.push(fragment.to_string());
        self
    }

    #[allow(dead_code)]
    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    #[allow(dead_code)]
    pub fn file(&self, path: &str) -> Option<String> {
        self.files.borrow().get(path).cloned()
    }

    /// Index of the first log entry containing `fragment`.
    pub fn position(&self, fragment: &str) -> Option<usize> {
        self.log.borrow().iter().position(|e| e.contains(fragment))
    }

    pub fn count(&self, fragment: &str) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|e| e.contains(fragment))
            .count()
    }

    fn record(&self, entry: String) {
        self.log.borrow_mut().push(entry);
    }
}

/// The raw replacement of `s/pattern/replacement/flags`, split on
/// unescaped delimiters.
fn replacement_part(expression: &str) -> String {
    let mut parts = vec![String::new()];
    let mut chars = expression.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let part = parts.last_mut().unwrap();
                part.push(c);
                if let Some(next) = chars.next() {
                    part.push(next);
                }
            }
            '/' => parts.push(String::new()),
            _ => parts.last_mut().unwrap().push(c),
        }
    }
    assert_eq!(parts.len(), 4, "malformed sed expression `{}`", expression);
    parts.swap_remove(2)
}

/// Translate an escaped sed replacement into `regex` replacement syntax,
/// reading it the way GNU sed does: `&` is the whole match, `\N` a group,
/// `\n` or backslash-newline a newline, any other `\x` a literal `x`.
fn sed_replacement(escaped: &str) -> String {
    let mut out = String::new();
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str("${0}"),
            '$' => out.push_str("$$"),
            '\\' => match chars.next() {
                Some('n') | Some('\n') => out.push('\n'),
                Some(d) if d.is_ascii_digit() => out.push_str(&format!("${{{}}}", d)),
                Some('$') => out.push_str("$$"),
                Some(other) => out.push(other),
                None => {}
            },
            other => out.push(other),
        }
    }
    out
}

impl Remote for FakeRemote {
    fn user(&self) -> &str {
        "deploy"
    }

    fn host(&self) -> &str {
        "example.com"
    }

    fn execute(&self, command: &str, privileged: bool) -> CommandOutput {
        let prefix = if privileged { "sudo" } else { "run" };
        self.record(format!("{}: {}", prefix, command));

        if self.fail_on.iter().any(|f| command.contains(f.as_str())) {
            return CommandOutput {
                stdout: String::new(),
                stderr: "simulated failure".to_string(),
                success: false,
                exit_code: 1,
            };
        }

        CommandOutput {
            success: true,
            ..CommandOutput::default()
        }
    }

    fn exists(&self, path: &str) -> Result<bool> {
        self.record(format!("exists: {}", path));
        Ok(self.existing.borrow().contains(path))
    }

    fn sed(&self, path: &str, edit: &SedEdit) -> Result<()> {
        let prefix = if edit.use_sudo { "sudo" } else { "run" };
        self.record(format!("{}: sed {} {}", prefix, edit.expression(), path));

        let mut files = self.files.borrow_mut();
        if let Some(content) = files.get_mut(path) {
            let regex = RegexBuilder::new(&edit.before)
                .case_insensitive(edit.flags.contains('i'))
                .build()
                .map_err(|e| Error::internal_unexpected(e.to_string()))?;
            let global = edit.flags.contains('g');
            let replacement = sed_replacement(&replacement_part(&edit.expression()));

            let edited: Vec<String> = content
                .split('\n')
                .map(|line| {
                    if global {
                        regex.replace_all(line, replacement.as_str()).to_string()
                    } else {
                        regex.replace(line, replacement.as_str()).to_string()
                    }
                })
                .collect();
            *content = edited.join("\n");
        }
        Ok(())
    }

    fn upload(&self, local_path: &Path, remote_path: &str, mode: Option<u32>) -> Result<()> {
        self.record(format!(
            "upload: {} -> {} ({:o})",
            local_path.display(),
            remote_path,
            mode.unwrap_or(0o644)
        ));

        if self.fail_upload {
            return Err(Error::deploy_upload_failed(
                local_path.display().to_string(),
                remote_path,
                "simulated failure",
            ));
        }

        let content = std::fs::read_to_string(local_path)
            .map_err(|e| Error::internal_io(e.to_string(), None))?;
        self.files
            .borrow_mut()
            .insert(remote_path.to_string(), content);
        self.existing.borrow_mut().insert(remote_path.to_string());
        Ok(())
    }

    fn local(&self, command: &str) -> Result<String> {
        self.record(format!("local: {}", command));
        Ok(COMMIT.to_string())
    }
}
