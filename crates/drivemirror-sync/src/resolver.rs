//! Path resolver
//!
//! Maps a label-path onto the mirror. The remote graph has no paths of its
//! own, so a node's label-path is recomputed while walking down from the
//! root, one label per level. A walk that does not reach the target still
//! reports the deepest directory it confirmed, which is where the
//! materializer starts creating.

use tracing::warn;

use drivemirror_core::domain::{LabelPath, RemoteItem};

use crate::mirror::{RemoteNode, RemoteTree};

/// A node whose label-path equals the requested one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNode {
    pub item: RemoteItem,
    pub label_path: LabelPath,
}

/// Deepest directory found on the way to an unresolved path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosestAncestor {
    /// The directory node itself (the root when nothing matched)
    pub item: RemoteItem,
    /// Its label-path, a prefix of the requested one
    pub label_path: LabelPath,
    /// Number of labels in `label_path`
    pub depth: usize,
}

/// Result of [`RemoteTree::resolve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(ResolvedNode),
    NotFound(ClosestAncestor),
}

impl Resolution {
    /// The matched node, if any
    pub fn found(&self) -> Option<&RemoteItem> {
        match self {
            Resolution::Found(node) => Some(&node.item),
            Resolution::NotFound(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }
}

/// State carried through one depth-first walk
struct Walk<'t, 'n> {
    target: &'t [&'t str],
    /// First exact match, in walk order
    found: Option<(&'n RemoteNode, LabelPath)>,
    /// Number of exact matches seen; more than one is ambiguous
    matches: usize,
    ancestor: (&'n RemoteNode, LabelPath, usize),
}

impl<'t, 'n> Walk<'t, 'n> {
    /// Visits the children of `dir`, whose label-path is the first `depth` labels
    fn visit(&mut self, dir: &'n RemoteNode, path: &LabelPath, depth: usize) {
        if depth > self.ancestor.2 {
            self.ancestor = (dir, path.clone(), depth);
        }

        let Some(wanted) = self.target.get(depth) else {
            return;
        };
        let last = depth + 1 == self.target.len();

        for child in dir.children() {
            if child.item().label != *wanted {
                continue;
            }

            let child_path = path.child(wanted);
            if last {
                self.matches += 1;
                if self.found.is_none() {
                    self.found = Some((child, child_path));
                }
            } else if child.item().is_directory() {
                self.visit(child, &child_path, depth + 1);
            }
        }
    }
}

/// Resolves `target` against the subtree rooted at `root`
///
/// Homonymous siblings are visited in id order and the first exact match
/// wins; the ambiguity is logged.
pub fn resolve_in(root: &RemoteNode, target: &LabelPath) -> Resolution {
    if target.is_root() {
        return Resolution::Found(ResolvedNode {
            item: root.item().clone(),
            label_path: LabelPath::root(),
        });
    }

    let segments = target.segments();
    let mut walk = Walk {
        target: &segments,
        found: None,
        matches: 0,
        ancestor: (root, LabelPath::root(), 0),
    };
    walk.visit(root, &LabelPath::root(), 0);

    if walk.matches > 1 {
        warn!(
            path = %target,
            matches = walk.matches,
            "Ambiguous label-path, using the first match"
        );
    }

    match walk.found {
        Some((node, label_path)) => Resolution::Found(ResolvedNode {
            item: node.item().clone(),
            label_path,
        }),
        None => {
            let (node, label_path, depth) = walk.ancestor;
            Resolution::NotFound(ClosestAncestor {
                item: node.item().clone(),
                label_path,
                depth,
            })
        }
    }
}

impl RemoteTree {
    /// Finds the node whose label-path equals `target`
    ///
    /// The empty label-path resolves to the root. The match may be a file
    /// even when the caller expects a directory; check the kind before
    /// creating under it.
    pub fn resolve(&self, target: &LabelPath) -> Resolution {
        resolve_in(&self.read(), target)
    }
}
