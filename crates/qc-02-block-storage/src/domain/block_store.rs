//! # Block Store
//!
//! Arena of processed blocks keyed by ID, plus the height-indexed canonical
//! path from genesis to the head.
//!
//! ## Invariants
//!
//! | Invariant | Description |
//! |-----------|-------------|
//! | Linked | Every non-genesis block's parent is in the arena |
//! | Heights | `block.height == parent.height + 1` |
//! | Path | `path[h]` has height `h` and parent `path[h-1]` |
//!
//! The store performs no fork choice; callers decide which path mutations
//! happen.

use std::collections::{HashMap, HashSet};

use shared_types::{BlockHeight, BlockId, Timestamp};

use super::{ProcessedBlock, StorageError};

#[derive(Debug, Clone)]
pub struct BlockStore {
    blocks: HashMap<BlockId, ProcessedBlock>,
    children: HashMap<BlockId, Vec<BlockId>>,
    path: Vec<BlockId>,
    invalid: HashSet<BlockId>,
}

impl BlockStore {
    /// Start a store holding only the genesis block.
    pub fn new(genesis: ProcessedBlock) -> Result<Self, StorageError> {
        if genesis.height != 0 {
            return Err(StorageError::HeightMismatch {
                id: genesis.id,
                expected: 0,
                actual: genesis.height,
            });
        }
        let id = genesis.id;
        let mut blocks = HashMap::new();
        blocks.insert(id, genesis);
        Ok(Self {
            blocks,
            children: HashMap::new(),
            path: vec![id],
            invalid: HashSet::new(),
        })
    }

    /// Rebuild from persisted records, checking every structural invariant.
    pub fn from_parts(
        blocks: Vec<ProcessedBlock>,
        path: Vec<BlockId>,
        invalid: impl IntoIterator<Item = BlockId>,
    ) -> Result<Self, StorageError> {
        let mut by_id: HashMap<BlockId, ProcessedBlock> =
            blocks.into_iter().map(|pb| (pb.id, pb)).collect();
        let genesis_id = *path.first().ok_or_else(|| StorageError::DataCorruption {
            message: "empty canonical path".into(),
        })?;
        let genesis = by_id
            .remove(&genesis_id)
            .ok_or(StorageError::BlockNotFound { id: genesis_id })?;

        let mut store = Self::new(genesis)?;

        // Insert in height order so parents always precede children.
        let mut rest: Vec<ProcessedBlock> = by_id.into_values().collect();
        rest.sort_by_key(|pb| (pb.height, pb.id));
        for pb in rest {
            store.insert(pb)?;
        }
        for id in path.into_iter().skip(1) {
            store.push_path(id)?;
        }
        store.invalid.extend(invalid);
        Ok(store)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn get(&self, id: &BlockId) -> Option<&ProcessedBlock> {
        self.blocks.get(id)
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn path_at(&self, height: BlockHeight) -> Option<BlockId> {
        usize::try_from(height)
            .ok()
            .and_then(|h| self.path.get(h))
            .copied()
    }

    pub fn path(&self) -> &[BlockId] {
        &self.path
    }

    pub fn head_id(&self) -> BlockId {
        // The path always holds at least genesis.
        self.path[self.path.len() - 1]
    }

    pub fn head(&self) -> &ProcessedBlock {
        &self.blocks[&self.head_id()]
    }

    pub fn height(&self) -> BlockHeight {
        (self.path.len() - 1) as BlockHeight
    }

    pub fn genesis_id(&self) -> BlockId {
        self.path[0]
    }

    pub fn is_canonical(&self, id: &BlockId) -> bool {
        self.get(id)
            .is_some_and(|pb| self.path_at(pb.height) == Some(*id))
    }

    pub fn is_invalid(&self, id: &BlockId) -> bool {
        self.invalid.contains(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Timestamps of `id` and up to `count - 1` of its ancestors, newest first.
    pub fn recent_timestamps(&self, id: &BlockId, count: usize) -> Vec<Timestamp> {
        let mut timestamps = Vec::with_capacity(count);
        let mut cursor = self.get(id);
        while let Some(pb) = cursor {
            if timestamps.len() == count {
                break;
            }
            timestamps.push(pb.timestamp());
            if pb.height == 0 {
                break;
            }
            cursor = self.get(&pb.parent_id());
        }
        timestamps
    }

    /// Ancestor of `id` at `height`, walking parent links.
    pub fn ancestor_at(&self, id: &BlockId, height: BlockHeight) -> Option<&ProcessedBlock> {
        let mut current = self.get(id)?;
        while current.height > height {
            current = self.get(&current.parent_id())?;
        }
        (current.height == height).then_some(current)
    }

    /// Every stored descendant of `id`, excluding `id` itself.
    pub fn descendants(&self, id: &BlockId) -> Vec<BlockId> {
        let mut found = Vec::new();
        let mut stack = vec![*id];
        while let Some(next) = stack.pop() {
            if let Some(children) = self.children.get(&next) {
                for child in children {
                    found.push(*child);
                    stack.push(*child);
                }
            }
        }
        found
    }

    // =========================================================================
    // MUTATIONS
    // =========================================================================

    /// Add a block to the arena. Its parent must already be stored.
    pub fn insert(&mut self, block: ProcessedBlock) -> Result<(), StorageError> {
        if self.blocks.contains_key(&block.id) {
            return Err(StorageError::BlockExists { id: block.id });
        }
        let parent_id = block.parent_id();
        let parent = self
            .blocks
            .get(&parent_id)
            .ok_or(StorageError::ParentNotFound { parent: parent_id })?;
        if block.height != parent.height + 1 {
            return Err(StorageError::HeightMismatch {
                id: block.id,
                expected: parent.height + 1,
                actual: block.height,
            });
        }
        self.children.entry(parent_id).or_default().push(block.id);
        self.blocks.insert(block.id, block);
        Ok(())
    }

    /// Mutable access for recording diffs after first application.
    pub fn get_mut(&mut self, id: &BlockId) -> Option<&mut ProcessedBlock> {
        self.blocks.get_mut(id)
    }

    /// Append a stored block whose parent is the current head.
    pub fn push_path(&mut self, id: BlockId) -> Result<(), StorageError> {
        let head = self.head_id();
        let pb = self.get(&id).ok_or(StorageError::BlockNotFound { id })?;
        if pb.parent_id() != head {
            return Err(StorageError::NotExtendingHead { id });
        }
        self.path.push(id);
        Ok(())
    }

    /// Remove the head from the canonical path. Genesis cannot be removed.
    pub fn pop_path(&mut self) -> Result<BlockId, StorageError> {
        if self.path.len() == 1 {
            return Err(StorageError::GenesisImmutable);
        }
        self.path.pop().ok_or(StorageError::GenesisImmutable)
    }

    /// Drop a childless, non-canonical block from the arena.
    pub fn remove_leaf(&mut self, id: &BlockId) -> Result<ProcessedBlock, StorageError> {
        if self.is_canonical(id) || self.children.get(id).is_some_and(|c| !c.is_empty()) {
            return Err(StorageError::DataCorruption {
                message: format!("{} is not a removable leaf", id),
            });
        }
        let pb = self
            .blocks
            .remove(id)
            .ok_or(StorageError::BlockNotFound { id: *id })?;
        if let Some(siblings) = self.children.get_mut(&pb.parent_id()) {
            siblings.retain(|child| child != id);
        }
        self.children.remove(id);
        Ok(pb)
    }

    pub fn mark_invalid(&mut self, id: BlockId) {
        self.invalid.insert(id);
    }
}
