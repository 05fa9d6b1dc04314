//! Exclusion rules and the matcher that applies them during a walk.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Named, closed set of rule templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RuleTemplate {
    /// Tooling caches, virtualenvs and workspace metadata
    #[default]
    #[serde(alias = "replit-python")]
    #[value(alias = "replit-python")]
    DefaultExclusions,
    /// Keep everything
    None,
}

impl RuleTemplate {
    pub const ALL: [RuleTemplate; 2] = [RuleTemplate::DefaultExclusions, RuleTemplate::None];

    pub fn name(&self) -> &'static str {
        match self {
            RuleTemplate::DefaultExclusions => "default-exclusions",
            RuleTemplate::None => "none",
        }
    }

    /// Build the immutable rule set for this template.
    pub fn rules(&self) -> RuleSet {
        match self {
            RuleTemplate::DefaultExclusions => RuleSet::builder(self.name())
                .dir_prefix(".config")
                .dir_prefix("venv")
                .dir_prefix(".upm")
                .dir_prefix(".cache")
                .dir_name_anywhere("__pycache__")
                .top_level_file("poetry.lock")
                .top_level_file("pyproject.toml")
                .top_level_file(".replit")
                .top_level_file("replit.nix")
                .top_level_file(".breakpoints")
                .build(),
            RuleTemplate::None => RuleSet::builder(self.name()).build(),
        }
    }
}

impl fmt::Display for RuleTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One matching strategy. Name variants hold bare names, the rest hold
/// tree-relative paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Directory subtree rooted at this relative path
    DirPrefix(PathBuf),
    /// Directory name excluding its subtree at any depth
    DirNameAnywhere(String),
    /// File name excluded only directly in the tree root
    TopLevelFile(String),
    /// Exact relative file path
    FullPath(PathBuf),
    /// File name excluded at any depth
    FileNameAnywhere(String),
}

impl Rule {
    fn applies_to_dirs(&self) -> bool {
        matches!(self, Rule::DirPrefix(_) | Rule::DirNameAnywhere(_))
    }

    fn order(&self) -> u8 {
        match self {
            Rule::DirPrefix(_) => 0,
            Rule::DirNameAnywhere(_) => 1,
            Rule::TopLevelFile(_) => 2,
            Rule::FullPath(_) => 3,
            Rule::FileNameAnywhere(_) => 4,
        }
    }

    fn matches_dir(&self, relative: &Path) -> bool {
        match self {
            Rule::DirPrefix(prefix) => relative.starts_with(prefix),
            Rule::DirNameAnywhere(name) => relative
                .components()
                .any(|c| c.as_os_str() == name.as_str()),
            _ => false,
        }
    }

    fn matches_file(&self, relative: &Path, name: &str, at_root: bool) -> bool {
        match self {
            Rule::TopLevelFile(top) => at_root && top == name,
            Rule::FullPath(path) => relative == path,
            Rule::FileNameAnywhere(any) => any == name,
            _ => false,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::DirPrefix(p) => write!(f, "directory prefix '{}'", p.display()),
            Rule::DirNameAnywhere(n) => write!(f, "directory name '{n}'"),
            Rule::TopLevelFile(n) => write!(f, "top-level file '{n}'"),
            Rule::FullPath(p) => write!(f, "path '{}'", p.display()),
            Rule::FileNameAnywhere(n) => write!(f, "file name '{n}'"),
        }
    }
}

/// Immutable, ordered list of exclusion rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    name: String,
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn builder(name: &str) -> RuleSetBuilder {
        RuleSetBuilder {
            name: name.to_string(),
            rules: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub struct RuleSetBuilder {
    name: String,
    rules: Vec<Rule>,
}

impl RuleSetBuilder {
    pub fn dir_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.rules.push(Rule::DirPrefix(normalize(prefix.into())));
        self
    }

    pub fn dir_name_anywhere(mut self, name: impl Into<String>) -> Self {
        self.rules.push(Rule::DirNameAnywhere(name.into()));
        self
    }

    pub fn top_level_file(mut self, name: impl Into<String>) -> Self {
        self.rules.push(Rule::TopLevelFile(name.into()));
        self
    }

    pub fn full_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rules.push(Rule::FullPath(normalize(path.into())));
        self
    }

    pub fn file_name_anywhere(mut self, name: impl Into<String>) -> Self {
        self.rules.push(Rule::FileNameAnywhere(name.into()));
        self
    }

    /// Freeze the rules, sorted into evaluation order.
    pub fn build(mut self) -> RuleSet {
        // stable: keeps insertion order within a strategy
        self.rules.sort_by_key(Rule::order);
        RuleSet {
            name: self.name,
            rules: self.rules,
        }
    }
}

// Drops `./` segments so `./venv` and `venv` compare equal.
fn normalize(path: PathBuf) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Why an entry was left out of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    Rule(Rule),
    /// The entry is the archive being written
    SelfArchive,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exclusion::Rule(rule) => write!(f, "{rule}"),
            Exclusion::SelfArchive => f.write_str("destination archive"),
        }
    }
}

/// Receives every exclusion decision. Must not influence the walk.
pub trait ExclusionObserver {
    fn excluded(&self, path: &Path, reason: &Exclusion);
}

/// Observer that only emits debug events.
pub struct TraceObserver;

impl ExclusionObserver for TraceObserver {
    fn excluded(&self, path: &Path, reason: &Exclusion) {
        tracing::debug!(path = %path.display(), %reason, "excluded");
    }
}

/// Applies a rule set to entries under one tree root.
pub struct Matcher<'a> {
    rules: &'a RuleSet,
    root: &'a Path,
    archive: Option<PathBuf>,
    observer: &'a dyn ExclusionObserver,
}

impl<'a> Matcher<'a> {
    /// `archive` is the resolved destination path, if it might sit in the tree.
    pub fn new(
        rules: &'a RuleSet,
        root: &'a Path,
        archive: Option<PathBuf>,
        observer: &'a dyn ExclusionObserver,
    ) -> Self {
        Self {
            rules,
            root,
            archive,
            observer,
        }
    }

    /// Decide whether to descend into `dir`. The root itself is always kept.
    pub fn include_dir(&self, dir: &Path) -> bool {
        let relative = self.relative(dir);
        if relative.as_os_str().is_empty() {
            return true;
        }

        let hit = self
            .rules
            .rules()
            .iter()
            .filter(|r| r.applies_to_dirs())
            .find(|r| r.matches_dir(relative));

        self.report(dir, hit)
    }

    /// Decide whether `file` goes into the archive.
    pub fn include_file(&self, file: &Path) -> bool {
        let relative = self.relative(file);
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        let at_root = relative.components().count() == 1;

        let hit = self
            .rules
            .rules()
            .iter()
            .filter(|r| !r.applies_to_dirs())
            .find(|r| r.matches_file(relative, &name, at_root));

        if hit.is_some() {
            return self.report(file, hit);
        }

        if self.is_archive(file) {
            self.observer.excluded(file, &Exclusion::SelfArchive);
            return false;
        }

        true
    }

    fn report(&self, path: &Path, hit: Option<&Rule>) -> bool {
        match hit {
            Some(rule) => {
                self.observer.excluded(path, &Exclusion::Rule(rule.clone()));
                false
            }
            None => true,
        }
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(self.root).unwrap_or(path)
    }

    fn is_archive(&self, file: &Path) -> bool {
        let Some(archive) = &self.archive else {
            return false;
        };
        // a plain file is the archive only under its own name; a link can alias it from anywhere
        let is_link = file
            .symlink_metadata()
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if !is_link && file.file_name() != archive.file_name() {
            return false;
        }
        match file.canonicalize() {
            Ok(resolved) => &resolved == archive,
            Err(_) => file == archive,
        }
    }
}
