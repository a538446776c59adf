//! # Directory Tree
//!
//! In-memory hierarchy of directories, songs, and playlists backing a
//! [`LibraryDatabase`](crate::db::LibraryDatabase).
//!
//! ## Arena Layout
//!
//! Nodes live in a slot arena indexed by [`DirectoryId`]; slot 0 is always
//! the root. Each node stores its parent's id and a name→id map of its
//! children, so parent links never create ownership cycles and removed
//! slots are recycled through a free list.
//!
//! ```text
//! Tree
//! ├── nodes: Vec<Option<DirectoryNode>>   # slot arena, root at 0
//! └── free:  Vec<u32>                     # recycled slot indexes
//! ```
//!
//! ## Mount Points
//!
//! A node may own a nested database (`mounted`). Such a node acts as a
//! leaf of the local tree: it has no songs, playlists, or children of its
//! own, and path resolution stops there regardless of any remaining
//! suffix.
//!
//! ## Thread Safety
//!
//! `Tree` itself is not synchronized; the owning database wraps it in a
//! mutex and every traversal happens under that guard.

use std::sync::Arc;
use std::time::SystemTime;

use hashbrown::HashMap;

use crate::db::Database;
use crate::playlist::PlaylistInfo;
use crate::song::Song;

/// Identifier of a directory slot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct DirectoryId(u32);

pub(crate) struct DirectoryNode {
    pub name: String,
    pub parent: Option<DirectoryId>,
    pub children: HashMap<String, DirectoryId>,
    pub songs: Vec<Song>,
    pub playlists: Vec<PlaylistInfo>,
    pub mtime: Option<SystemTime>,
    /// Nested database when this node is a mount point.
    pub mounted: Option<Arc<dyn Database>>,
}

impl DirectoryNode {
    fn new(name: String, parent: Option<DirectoryId>) -> Self {
        Self {
            name,
            parent,
            children: HashMap::new(),
            songs: Vec::new(),
            playlists: Vec::new(),
            mtime: None,
            mounted: None,
        }
    }

    pub fn is_mount(&self) -> bool {
        self.mounted.is_some()
    }

    /// A node is empty when it holds nothing worth persisting: no songs,
    /// no playlists, no children.
    fn is_empty(&self) -> bool {
        self.songs.is_empty() && self.playlists.is_empty() && self.children.is_empty()
    }
}

/// Result of resolving a slash-delimited path against the tree.
///
/// `rest` is `None` when the path fully resolved to `directory`, and
/// otherwise holds the unresolved suffix: a bare name the caller may
/// interpret as a song, a mount-relative path when `directory` is a mount
/// point, or a multi-segment suffix meaning the sub-path does not exist.
pub(crate) struct Lookup<'a> {
    pub directory: DirectoryId,
    pub rest: Option<&'a str>,
}

pub(crate) struct Tree {
    nodes: Vec<Option<DirectoryNode>>,
    free: Vec<u32>,
}

impl std::fmt::Debug for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tree")
            .field("nodes", &self.nodes.len())
            .field("free", &self.free.len())
            .finish()
    }
}

impl Tree {
    pub const ROOT: DirectoryId = DirectoryId(0);

    pub fn new() -> Self {
        Self {
            nodes: vec![Some(DirectoryNode::new(String::new(), None))],
            free: Vec::new(),
        }
    }

    pub fn node(&self, id: DirectoryId) -> &DirectoryNode {
        self.nodes[id.0 as usize].as_ref().expect("stale directory id")
    }

    pub fn node_mut(&mut self, id: DirectoryId) -> &mut DirectoryNode {
        self.nodes[id.0 as usize].as_mut().expect("stale directory id")
    }

    fn alloc(&mut self, node: DirectoryNode) -> DirectoryId {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot as usize] = Some(node);
            DirectoryId(slot)
        } else {
            self.nodes.push(Some(node));
            DirectoryId((self.nodes.len() - 1) as u32)
        }
    }

    /// Creates a child of `parent`. The name must not already be taken.
    pub fn create_child(&mut self, parent: DirectoryId, name: &str) -> DirectoryId {
        debug_assert!(!self.node(parent).children.contains_key(name));
        let id = self.alloc(DirectoryNode::new(name.to_owned(), Some(parent)));
        self.node_mut(parent)
            .children
            .insert(name.to_owned(), id);
        id
    }

    /// Detaches `id` from its parent and frees its subtree. The root
    /// cannot be removed.
    pub fn remove(&mut self, id: DirectoryId) {
        let (name, parent) = {
            let node = self.node(id);
            (node.name.clone(), node.parent)
        };
        let parent = parent.expect("cannot remove the root directory");
        self.node_mut(parent).children.remove(&name);
        self.free_subtree(id);
    }

    fn free_subtree(&mut self, id: DirectoryId) {
        let node = self.nodes[id.0 as usize]
            .take()
            .expect("stale directory id");
        self.free.push(id.0);
        for (_, child) in node.children {
            self.free_subtree(child);
        }
    }

    /// Resolves `uri` segment by segment from the root.
    ///
    /// Resolution stops early when a segment has no matching child or when
    /// a mount point is reached with path left over; see [`Lookup`].
    pub fn lookup<'a>(&self, uri: &'a str) -> Lookup<'a> {
        let mut current = Tree::ROOT;
        let mut remaining = uri;
        loop {
            if remaining.is_empty() {
                return Lookup {
                    directory: current,
                    rest: None,
                };
            }
            if self.node(current).is_mount() {
                return Lookup {
                    directory: current,
                    rest: Some(remaining),
                };
            }
            let (segment, rest) = match remaining.split_once('/') {
                Some((segment, rest)) => (segment, Some(rest)),
                None => (remaining, None),
            };
            match self.node(current).children.get(segment) {
                Some(&child) => {
                    current = child;
                    remaining = rest.unwrap_or("");
                }
                None => {
                    return Lookup {
                        directory: current,
                        rest: Some(remaining),
                    }
                }
            }
        }
    }

    /// Full path of a directory relative to the root; empty for the root.
    pub fn path_of(&self, id: DirectoryId) -> String {
        let mut segments = Vec::new();
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            segments.push(self.node(current).name.as_str());
            current = parent;
        }
        segments.reverse();
        segments.join("/")
    }

    pub fn find_song(&self, id: DirectoryId, uri: &str) -> Option<&Song> {
        self.node(id).songs.iter().find(|s| s.uri == uri)
    }

    /// Inserts a song, replacing any existing song with the same uri.
    pub fn add_song(&mut self, id: DirectoryId, song: Song) {
        let node = self.node_mut(id);
        node.songs.retain(|s| s.uri != song.uri);
        node.songs.push(song);
    }

    /// Removes directories that transitively contain no songs, playlists,
    /// or mount points.
    pub fn prune_empty(&mut self) {
        self.prune_children(Tree::ROOT);
    }

    fn prune_children(&mut self, id: DirectoryId) {
        let children: Vec<DirectoryId> = self.node(id).children.values().copied().collect();
        for child in children {
            if self.node(child).is_mount() {
                continue;
            }
            self.prune_children(child);
            if self.node(child).is_empty() {
                self.remove(child);
            }
        }
    }

    /// Sorts songs and playlists by name, recursively. Child directories
    /// are keyed by name already; the codec emits them in sorted order.
    pub fn sort(&mut self) {
        self.sort_node(Tree::ROOT);
    }

    fn sort_node(&mut self, id: DirectoryId) {
        let node = self.node_mut(id);
        node.songs.sort_by(|a, b| a.uri.cmp(&b.uri));
        node.playlists.sort_by(|a, b| a.name.cmp(&b.name));
        let children: Vec<DirectoryId> = node.children.values().copied().collect();
        for child in children {
            self.sort_node(child);
        }
    }

    /// Number of mount points anywhere in the tree.
    pub fn mount_count(&self) -> usize {
        self.nodes
            .iter()
            .flatten()
            .filter(|n| n.is_mount())
            .count()
    }
}
