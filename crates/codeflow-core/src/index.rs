//! Workspace discovery of diagram files.
//!
//! One walker serves both listings the host needs: the diagram index (JSON
//! files whose content starts with the diagram signature) and the plain file
//! listing answered to `listFiles`. [`ScanOptions`] selects between them.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use icu_collator::options::CollatorOptions;
use icu_collator::{Collator, CollatorBorrowed};
use ignore::WalkBuilder;
use log::{debug, info};

use crate::document::{is_diagram_signature, DIAGRAM_SIGNATURE};
use crate::error::{CodeflowError, Result};
use crate::link::relative_label;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// What to walk and what to keep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Glob a file's workspace-relative label must match.
    pub include: String,
    /// Globs for files and directories to skip. A matching directory is not
    /// descended into. A trailing `/**` is accepted and means the directory.
    pub exclude: Vec<String>,
    /// Keep only files that start with the diagram signature.
    pub filter_to_diagrams_only: bool,
}

impl ScanOptions {
    /// JSON files carrying the diagram signature.
    pub fn diagrams() -> Self {
        Self {
            include: "**/*.json".to_string(),
            exclude: default_excludes(),
            filter_to_diagrams_only: true,
        }
    }

    /// Every file in the workspace.
    pub fn all_files() -> Self {
        Self {
            include: "**/*".to_string(),
            exclude: default_excludes(),
            filter_to_diagrams_only: false,
        }
    }

    fn compile(&self) -> Result<Matcher> {
        let compile = |raw: &str| {
            let trimmed = raw.strip_suffix("/**").unwrap_or(raw);
            Pattern::new(trimmed).map_err(|source| CodeflowError::Pattern {
                pattern: raw.to_string(),
                source,
            })
        };
        Ok(Matcher {
            include: compile(self.include.as_str())?,
            exclude: self
                .exclude
                .iter()
                .map(|raw| compile(raw.as_str()))
                .collect::<Result<_>>()?,
            diagrams_only: self.filter_to_diagrams_only,
        })
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::diagrams()
    }
}

pub(crate) fn default_excludes() -> Vec<String> {
    vec!["**/node_modules".to_string(), "**/.git".to_string()]
}

#[derive(Debug, Clone)]
struct Matcher {
    include: Pattern,
    exclude: Vec<Pattern>,
    diagrams_only: bool,
}

impl Matcher {
    fn is_excluded(&self, label: &str) -> bool {
        self.exclude
            .iter()
            .any(|p| p.matches_with(label, MATCH_OPTIONS))
    }

    fn is_included(&self, label: &str) -> bool {
        self.include.matches_with(label, MATCH_OPTIONS)
    }
}

/// One discovered file, identified by its workspace-relative label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    label: String,
}

impl IndexEntry {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Absolute path of the entry under the current `root`.
    pub fn locate(&self, root: &Path) -> PathBuf {
        self.label
            .split('/')
            .fold(root.to_path_buf(), |path, segment| path.join(segment))
    }
}

/// Walks `root` and returns the matching files, sorted by [`LabelCollator`].
///
/// Files that cannot be read are treated as non-diagrams and left out.
pub fn scan_workspace(root: &Path, options: &ScanOptions) -> Result<Vec<IndexEntry>> {
    walk(root, options, &HashSet::new())
}

/// Labels in `known` count as diagrams whatever their content.
fn walk(root: &Path, options: &ScanOptions, known: &HashSet<String>) -> Result<Vec<IndexEntry>> {
    let matcher = options.compile()?;

    let prune_root = root.to_path_buf();
    let prune = matcher.clone();
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(move |entry| match relative_label(&prune_root, entry.path()) {
            Some(label) => !prune.is_excluded(&label),
            None => true,
        })
        .build();

    let mut entries = Vec::new();
    for result in walker {
        let entry = match result {
            Ok(entry) => entry,
            Err(err) => {
                debug!(error:% = err; "Skipping unreadable workspace entry");
                continue;
            }
        };
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let Some(label) = relative_label(root, entry.path()) else {
            continue;
        };
        if !matcher.is_included(&label) {
            continue;
        }
        if matcher.diagrams_only && !known.contains(&label) {
            match read_prefix(entry.path()) {
                Ok(prefix) if is_diagram_signature(&prefix) => {}
                Ok(_) => continue,
                Err(err) => {
                    debug!(label = label.as_str(), error:% = err; "Excluding unreadable file");
                    continue;
                }
            }
        }
        entries.push(IndexEntry { label });
    }

    // Stable: ties keep discovery order.
    let collator = LabelCollator::new()?;
    entries.sort_by(|a, b| collator.compare(&a.label, &b.label));
    Ok(entries)
}

fn read_prefix(path: &Path) -> io::Result<Vec<u8>> {
    let mut prefix = Vec::with_capacity(DIAGRAM_SIGNATURE.len());
    File::open(path)?
        .take(DIAGRAM_SIGNATURE.len() as u64)
        .read_to_end(&mut prefix)?;
    Ok(prefix)
}

/// Locale-aware ordering for labels, using the CLDR root collation.
///
/// Punctuation sorts before digits before letters, accents are secondary to
/// the base letter and lowercase precedes uppercase.
pub struct LabelCollator(CollatorBorrowed<'static>);

impl LabelCollator {
    pub fn new() -> Result<Self> {
        Collator::try_new(Default::default(), CollatorOptions::default())
            .map(Self)
            .map_err(|e| CodeflowError::Collation(e.to_string()))
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        self.0.compare(a, b)
    }
}

impl fmt::Debug for LabelCollator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LabelCollator")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Idle,
    Scanning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexEvent {
    /// The cached listing was dropped; consumers should scan again.
    Refreshed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&IndexEvent) + Send>;

/// Cached, refreshable listing of the workspace's diagrams.
///
/// Files saved through [`DiagramIndex::note_saved`] are listed even when
/// their content does not start with the signature, so a diagram the
/// renderer saved with another key order still shows up on the next scan.
pub struct DiagramIndex {
    options: ScanOptions,
    state: IndexState,
    cache: Option<Arc<[IndexEntry]>>,
    saved: HashSet<String>,
    subscribers: Vec<(SubscriptionId, Handler)>,
    next_subscription: u64,
}

impl DiagramIndex {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            state: IndexState::Idle,
            cache: None,
            saved: HashSet::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    /// Last completed listing, if it has not been invalidated since.
    pub fn cached(&self) -> Option<Arc<[IndexEntry]>> {
        self.cache.clone()
    }

    /// Scans `root` and swaps the result in as the cached listing.
    ///
    /// On error the previous cache is kept.
    pub fn scan(&mut self, root: &Path) -> Result<Arc<[IndexEntry]>> {
        self.state = IndexState::Scanning;
        let result = walk(root, &self.options, &self.saved);
        self.state = IndexState::Idle;

        let listing: Arc<[IndexEntry]> = result?.into();
        info!(root:? = root, entries = listing.len(); "Diagram index scanned");
        self.cache = Some(listing.clone());
        Ok(listing)
    }

    /// Records that `label` was written as a diagram by this host.
    pub fn note_saved(&mut self, label: impl Into<String>) {
        self.saved.insert(label.into());
    }

    /// Forgets a label recorded by [`Self::note_saved`], e.g. after the file
    /// was rewritten by someone else. Its content decides from then on.
    pub fn forget_saved(&mut self, label: &str) -> bool {
        self.saved.remove(label)
    }

    /// Drops the cached listing and notifies subscribers. Does not rescan.
    pub fn refresh(&mut self) {
        self.cache = None;
        debug!(subscribers = self.subscribers.len(); "Diagram index refreshed");
        for (_, handler) in &mut self.subscribers {
            handler(&IndexEvent::Refreshed);
        }
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&IndexEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(handler)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub, _)| *sub != id);
        self.subscribers.len() != before
    }
}

impl Default for DiagramIndex {
    fn default() -> Self {
        Self::new(ScanOptions::diagrams())
    }
}

impl std::fmt::Debug for DiagramIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagramIndex")
            .field("options", &self.options)
            .field("state", &self.state)
            .field("cached", &self.cache.as_ref().map(|c| c.len()))
            .field("saved", &self.saved.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    use tempfile::tempdir;

    use super::*;

    const DIAGRAM: &str = r#"{"diagData":{"nodes":[]},"metaData":{"fileName":"x"}}"#;

    fn write(root: &Path, label: &str, content: &str) {
        let path = root.join(label);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn labels(entries: &[IndexEntry]) -> Vec<&str> {
        entries.iter().map(IndexEntry::label).collect()
    }

    #[test]
    fn keeps_only_signed_json_files() {
        let dir = tempdir().unwrap();
        write(dir.path(), "flows/login.json", DIAGRAM);
        write(dir.path(), "package.json", r#"{"other":1}"#);
        write(dir.path(), "notes.txt", DIAGRAM);
        write(dir.path(), "tiny.json", "{}");

        let entries = scan_workspace(dir.path(), &ScanOptions::diagrams()).unwrap();
        assert_eq!(labels(&entries), ["flows/login.json"]);
        assert_eq!(
            entries[0].locate(dir.path()),
            dir.path().join("flows").join("login.json")
        );
    }

    #[test]
    fn skips_excluded_directories() {
        let dir = tempdir().unwrap();
        write(dir.path(), "node_modules/pkg/d.json", DIAGRAM);
        write(dir.path(), "web/node_modules/pkg/d.json", DIAGRAM);
        write(dir.path(), "web/d.json", DIAGRAM);

        let entries = scan_workspace(dir.path(), &ScanOptions::diagrams()).unwrap();
        assert_eq!(labels(&entries), ["web/d.json"]);
    }

    #[test]
    fn trailing_double_star_excludes_directory() {
        let dir = tempdir().unwrap();
        write(dir.path(), "build/out.json", DIAGRAM);
        write(dir.path(), "src/a.json", DIAGRAM);

        let options = ScanOptions {
            exclude: vec!["build/**".to_string()],
            ..ScanOptions::diagrams()
        };
        let entries = scan_workspace(dir.path(), &options).unwrap();
        assert_eq!(labels(&entries), ["src/a.json"]);
    }

    #[test]
    fn all_files_listing_is_unfiltered() {
        let dir = tempdir().unwrap();
        write(dir.path(), "b.rs", "fn main() {}");
        write(dir.path(), "a/c.json", r#"{"other":1}"#);
        write(dir.path(), "node_modules/x.js", "");

        let entries = scan_workspace(dir.path(), &ScanOptions::all_files()).unwrap();
        assert_eq!(labels(&entries), ["a/c.json", "b.rs"]);
    }

    #[test]
    fn rejects_bad_patterns() {
        let options = ScanOptions {
            include: "[".to_string(),
            ..ScanOptions::diagrams()
        };
        let dir = tempdir().unwrap();
        assert!(matches!(
            scan_workspace(dir.path(), &options),
            Err(CodeflowError::Pattern { .. })
        ));
    }

    #[test]
    fn collation_follows_locale_rules() {
        let collator = LabelCollator::new().unwrap();
        let mut labels = vec!["b.json", "B.json", "a.json", "_z.json", "10.json", "C.json"];
        labels.sort_by(|a, b| collator.compare(a, b));
        assert_eq!(
            labels,
            ["_z.json", "10.json", "a.json", "b.json", "B.json", "C.json"]
        );
        assert_eq!(collator.compare("same", "same"), Ordering::Equal);
    }

    #[test]
    fn accents_and_punctuation_sort_like_the_renderer() {
        let collator = LabelCollator::new().unwrap();
        assert_eq!(collator.compare("é.json", "f.json"), Ordering::Less);
        assert_eq!(collator.compare("e.json", "é.json"), Ordering::Less);
        assert_eq!(collator.compare("Ärger.json", "Zebra.json"), Ordering::Less);
        assert_eq!(collator.compare("a_b.json", "a-b.json"), Ordering::Less);
    }

    #[test]
    fn scan_sorts_non_ascii_labels() {
        let dir = tempdir().unwrap();
        for label in ["f.json", "é.json", "a-b.json", "a_b.json", "Zebra.json", "Ärger.json"] {
            write(dir.path(), label, DIAGRAM);
        }

        let entries = scan_workspace(dir.path(), &ScanOptions::diagrams()).unwrap();
        assert_eq!(
            labels(&entries),
            ["a_b.json", "a-b.json", "Ärger.json", "é.json", "f.json", "Zebra.json"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_files_are_left_out() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        write(dir.path(), "a.json", DIAGRAM);
        write(dir.path(), "locked.json", DIAGRAM);
        let locked = dir.path().join("locked.json");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::File::open(&locked).is_ok() {
            // Permissions are not enforced for this user (e.g. root).
            return;
        }

        let entries = scan_workspace(dir.path(), &ScanOptions::diagrams()).unwrap();
        assert_eq!(labels(&entries), ["a.json"]);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
    }

    #[test]
    fn scan_populates_cache_and_refresh_clears_it() {
        let dir = tempdir().unwrap();
        write(dir.path(), "a.json", DIAGRAM);

        let mut index = DiagramIndex::default();
        assert!(index.cached().is_none());
        let listing = index.scan(dir.path()).unwrap();
        assert_eq!(labels(&listing), ["a.json"]);
        assert_eq!(index.state(), IndexState::Idle);
        assert_eq!(index.cached().as_deref().map(labels), Some(vec!["a.json"]));

        // Refresh only invalidates; the new file shows up on the next scan.
        write(dir.path(), "b.json", DIAGRAM);
        index.refresh();
        assert!(index.cached().is_none());
        assert_eq!(labels(&index.scan(dir.path()).unwrap()), ["a.json", "b.json"]);
    }

    #[test]
    fn saved_labels_count_as_diagrams() {
        let dir = tempdir().unwrap();
        write(dir.path(), "x.json", r#"{"metaData":{"fileName":"x.json"},"diagData":{}}"#);
        write(dir.path(), "y.json", r#"{"metaData":{"fileName":"y.json"},"diagData":{}}"#);

        let mut index = DiagramIndex::default();
        assert!(index.scan(dir.path()).unwrap().is_empty());
        index.note_saved("x.json");
        assert_eq!(labels(&index.scan(dir.path()).unwrap()), ["x.json"]);
        // The free function knows nothing about saves.
        assert!(scan_workspace(dir.path(), &ScanOptions::diagrams())
            .unwrap()
            .is_empty());

        assert!(index.forget_saved("x.json"));
        assert!(!index.forget_saved("x.json"));
        assert!(index.scan(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn refresh_notifies_subscribers_until_unsubscribed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut index = DiagramIndex::default();

        let counter = hits.clone();
        let id = index.subscribe(move |event| {
            assert_eq!(*event, IndexEvent::Refreshed);
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        });
        let other = hits.clone();
        index.subscribe(move |_| {
            other.fetch_add(10, AtomicOrdering::SeqCst);
        });

        index.refresh();
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 11);

        assert!(index.unsubscribe(id));
        assert!(!index.unsubscribe(id));
        index.refresh();
        assert_eq!(hits.load(AtomicOrdering::SeqCst), 21);
    }
}
