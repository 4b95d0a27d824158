//! B+tree index (C5): an ordered index of `(key, value)` pairs over paged
//! nodes, read and mutated entirely through the buffer pool so every write
//! is visible to later lookups in the same process before any eviction
//! (spec.md §4.4, §5).


use buffer::BufferPool;
use common::{DbError, DbResult, Lsn, PageOffset, TableId};
use storage::{
    HeaderPage, InternalPage, Key, LeafPage, NodeKind, Page, RawValue, INTERNAL_MIN_KEYS,
    INTERNAL_ORDER, LEAF_MIN_KEYS, LEAF_ORDER,
};

/// A handle for operating on one table's tree through a borrowed buffer
/// pool. Short-lived: callers construct one per operation.
pub struct BTree<'a> {
    pool: &'a mut BufferPool,
    table: TableId,
}

impl<'a> BTree<'a> {
    pub fn new(pool: &'a mut BufferPool, table: TableId) -> Self {
        Self { pool, table }
    }

    fn header(&mut self) -> DbResult<Page> {
        self.pool.get_page(self.table, PageOffset(0))
    }

    fn put_header(&mut self, page: Page) -> DbResult<()> {
        self.pool.put_page(self.table, PageOffset(0), page)
    }

    pub fn root_offset(&mut self) -> DbResult<PageOffset> {
        Ok(HeaderPage::root_offset(&self.header()?))
    }

    /// The first (lowest-key) leaf, reached by always descending into child
    /// 0. `PageOffset::NONE` if the tree is empty. Used by the join
    /// operator to find each table's minimum key.
    pub fn leftmost_leaf(&mut self) -> DbResult<PageOffset> {
        let mut current = self.root_offset()?;
        while !current.is_none() {
            let page = self.pool.get_page(self.table, current)?;
            match NodeKind::of(&page) {
                NodeKind::Leaf => return Ok(current),
                NodeKind::Internal => current = InternalPage::child(&page, 0),
            }
        }
        Ok(current)
    }

    /// The leaf that would hold `key`, or `PageOffset::NONE` for an empty tree.
    pub fn find_leaf_offset(&mut self, key: Key) -> DbResult<PageOffset> {
        self.find_leaf(key)
    }

    fn find_leaf(&mut self, key: Key) -> DbResult<PageOffset> {
        let mut current = self.root_offset()?;
        loop {
            if current.is_none() {
                return Ok(current);
            }
            let page = self.pool.get_page(self.table, current)?;
            match NodeKind::of(&page) {
                NodeKind::Leaf => return Ok(current),
                NodeKind::Internal => {
                    let n = InternalPage::num_keys(&page);
                    let mut i = 0;
                    while i < n && key >= InternalPage::key(&page, i + 1) {
                        i += 1;
                    }
                    current = InternalPage::child(&page, i);
                }
            }
        }
    }

    fn leaf_slot(&self, page: &Page, key: Key) -> Option<usize> {
        let n = LeafPage::num_keys(page);
        (0..n).find(|&i| LeafPage::key(page, i) == key)
    }

    pub fn find(&mut self, key: Key) -> DbResult<Option<RawValue>> {
        let leaf = self.find_leaf(key)?;
        if leaf.is_none() {
            return Ok(None);
        }
        let page = self.pool.get_page(self.table, leaf)?;
        Ok(self.leaf_slot(&page, key).map(|slot| LeafPage::value(&page, slot)))
    }

    /// Locate a key's `(leaf, slot)` without reading its value, for the
    /// non-structural update driven by an active transaction (spec.md §4.6).
    pub fn locate(&mut self, key: Key) -> DbResult<Option<(PageOffset, usize)>> {
        let leaf = self.find_leaf(key)?;
        if leaf.is_none() {
            return Ok(None);
        }
        let page = self.pool.get_page(self.table, leaf)?;
        Ok(self.leaf_slot(&page, key).map(|slot| (leaf, slot)))
    }

    /// Overwrite a leaf record's value in place and stamp `page_lsn`,
    /// returning the bytes that were replaced. Never changes tree shape.
    pub fn apply_update(
        &mut self,
        leaf: PageOffset,
        slot: usize,
        new_value: &RawValue,
        lsn: Lsn,
    ) -> DbResult<RawValue> {
        let mut page = self.pool.get_page(self.table, leaf)?;
        let old = LeafPage::value(&page, slot);
        LeafPage::set_value(&mut page, slot, new_value);
        LeafPage::set_page_lsn(&mut page, lsn);
        self.pool.put_page(self.table, leaf, page)?;
        Ok(old)
    }

    pub fn insert(&mut self, key: Key, value: RawValue) -> DbResult<()> {
        if self.find(key)?.is_some() {
            return Err(DbError::Duplicate);
        }

        let root = self.root_offset()?;
        if root.is_none() {
            let leaf_offset = self.pool.allocate_page(self.table)?;
            let mut leaf = Page::zeroed();
            LeafPage::init(&mut leaf, PageOffset::NONE);
            LeafPage::set_key(&mut leaf, 0, key);
            LeafPage::set_value(&mut leaf, 0, &value);
            LeafPage::set_num_keys(&mut leaf, 1);
            self.pool.put_page(self.table, leaf_offset, leaf)?;

            let mut header = self.header()?;
            HeaderPage::set_root_offset(&mut header, leaf_offset);
            self.put_header(header)?;
            return Ok(());
        }

        let leaf_offset = self.find_leaf(key)?;
        self.insert_into_leaf(leaf_offset, key, value)
    }

    fn insert_into_leaf(&mut self, leaf_offset: PageOffset, key: Key, value: RawValue) -> DbResult<()> {
        let mut leaf = self.pool.get_page(self.table, leaf_offset)?;
        let n = LeafPage::num_keys(&leaf);
        let insert_at = (0..n).find(|&i| LeafPage::key(&leaf, i) > key).unwrap_or(n);

        if n < LEAF_ORDER - 1 {
            for i in (insert_at..n).rev() {
                let k = LeafPage::key(&leaf, i);
                let v = LeafPage::value(&leaf, i);
                LeafPage::set_key(&mut leaf, i + 1, k);
                LeafPage::set_value(&mut leaf, i + 1, &v);
            }
            LeafPage::set_key(&mut leaf, insert_at, key);
            LeafPage::set_value(&mut leaf, insert_at, &value);
            LeafPage::set_num_keys(&mut leaf, n + 1);
            self.pool.put_page(self.table, leaf_offset, leaf)?;
            return Ok(());
        }

        // Full: build the logical sorted sequence of the L-1 existing
        // records plus the new one, then split it across old and new leaf.
        let mut keys = Vec::with_capacity(LEAF_ORDER);
        let mut values = Vec::with_capacity(LEAF_ORDER);
        for i in 0..n {
            keys.push(LeafPage::key(&leaf, i));
            values.push(LeafPage::value(&leaf, i));
        }
        keys.insert(insert_at, key);
        values.insert(insert_at, value);

        let s = (LEAF_ORDER - 1).div_ceil(2);
        let parent = LeafPage::parent(&leaf);
        let old_sibling = LeafPage::sibling(&leaf);

        LeafPage::init(&mut leaf, parent);
        for i in 0..s {
            LeafPage::set_key(&mut leaf, i, keys[i]);
            LeafPage::set_value(&mut leaf, i, &values[i]);
        }
        LeafPage::set_num_keys(&mut leaf, s);

        let new_offset = self.pool.allocate_page(self.table)?;
        let mut new_leaf = Page::zeroed();
        LeafPage::init(&mut new_leaf, parent);
        for (slot, i) in (s..keys.len()).enumerate() {
            LeafPage::set_key(&mut new_leaf, slot, keys[i]);
            LeafPage::set_value(&mut new_leaf, slot, &values[i]);
        }
        LeafPage::set_num_keys(&mut new_leaf, keys.len() - s);
        LeafPage::set_sibling(&mut new_leaf, old_sibling);
        self.pool.put_page(self.table, new_offset, new_leaf)?;

        LeafPage::set_sibling(&mut leaf, new_offset);
        self.pool.put_page(self.table, leaf_offset, leaf)?;

        let sep = keys[s];
        self.insert_into_parent(leaf_offset, sep, new_offset)
    }

    fn set_parent(&mut self, node: PageOffset, parent: PageOffset) -> DbResult<()> {
        let mut page = self.pool.get_page(self.table, node)?;
        match NodeKind::of(&page) {
            NodeKind::Leaf => LeafPage::set_parent(&mut page, parent),
            NodeKind::Internal => InternalPage::set_parent(&mut page, parent),
        }
        self.pool.put_page(self.table, node, page)
    }

    fn insert_into_parent(&mut self, left: PageOffset, sep: Key, right: PageOffset) -> DbResult<()> {
        let left_page = self.pool.get_page(self.table, left)?;
        let parent = match NodeKind::of(&left_page) {
            NodeKind::Leaf => LeafPage::parent(&left_page),
            NodeKind::Internal => InternalPage::parent(&left_page),
        };

        if parent.is_none() {
            let new_root_offset = self.pool.allocate_page(self.table)?;
            let mut new_root = Page::zeroed();
            InternalPage::init(&mut new_root, PageOffset::NONE);
            InternalPage::set_child(&mut new_root, 0, left);
            InternalPage::set_key(&mut new_root, 1, sep);
            InternalPage::set_child(&mut new_root, 1, right);
            InternalPage::set_num_keys(&mut new_root, 1);
            self.pool.put_page(self.table, new_root_offset, new_root)?;

            self.set_parent(left, new_root_offset)?;
            self.set_parent(right, new_root_offset)?;

            let mut header = self.header()?;
            HeaderPage::set_root_offset(&mut header, new_root_offset);
            self.put_header(header)?;
            return Ok(());
        }

        let mut parent_page = self.pool.get_page(self.table, parent)?;
        let n = InternalPage::num_keys(&parent_page);
        let li = (0..=n)
            .find(|&i| InternalPage::child(&parent_page, i) == left)
            .ok_or_else(|| DbError::Corrupt("insert_into_parent: left child missing from parent".into()))?;

        if n < INTERNAL_ORDER - 1 {
            for i in (li + 1..=n).rev() {
                let k = InternalPage::key(&parent_page, i);
                let c = InternalPage::child(&parent_page, i);
                InternalPage::set_key(&mut parent_page, i + 1, k);
                InternalPage::set_child(&mut parent_page, i + 1, c);
            }
            InternalPage::set_key(&mut parent_page, li + 1, sep);
            InternalPage::set_child(&mut parent_page, li + 1, right);
            InternalPage::set_num_keys(&mut parent_page, n + 1);
            self.pool.put_page(self.table, parent, parent_page)?;
            self.set_parent(right, parent)?;
            return Ok(());
        }

        // Parent full: build the augmented key/child sequence and split it.
        let mut keys = Vec::with_capacity(n + 1);
        let mut children = Vec::with_capacity(n + 2);
        children.push(InternalPage::child(&parent_page, 0));
        for i in 1..=n {
            keys.push(InternalPage::key(&parent_page, i));
            children.push(InternalPage::child(&parent_page, i));
        }
        keys.insert(li, sep);
        children.insert(li + 1, right);

        let s = INTERNAL_ORDER.div_ceil(2);
        let grandparent = InternalPage::parent(&parent_page);
        let left_children = &children[0..s];
        let left_keys = &keys[0..s - 1];
        let promoted = keys[s - 1];
        let right_children = &children[s..];
        let right_keys = &keys[s..];

        let mut left_node = Page::zeroed();
        InternalPage::init(&mut left_node, grandparent);
        InternalPage::set_child(&mut left_node, 0, left_children[0]);
        for (idx, &k) in left_keys.iter().enumerate() {
            InternalPage::set_key(&mut left_node, idx + 1, k);
            InternalPage::set_child(&mut left_node, idx + 1, left_children[idx + 1]);
        }
        InternalPage::set_num_keys(&mut left_node, left_keys.len());
        self.pool.put_page(self.table, parent, left_node)?;
        for &c in left_children {
            self.set_parent(c, parent)?;
        }

        let right_offset = self.pool.allocate_page(self.table)?;
        let mut right_node = Page::zeroed();
        InternalPage::init(&mut right_node, grandparent);
        InternalPage::set_child(&mut right_node, 0, right_children[0]);
        for (idx, &k) in right_keys.iter().enumerate() {
            InternalPage::set_key(&mut right_node, idx + 1, k);
            InternalPage::set_child(&mut right_node, idx + 1, right_children[idx + 1]);
        }
        InternalPage::set_num_keys(&mut right_node, right_keys.len());
        self.pool.put_page(self.table, right_offset, right_node)?;
        for &c in right_children {
            self.set_parent(c, right_offset)?;
        }

        self.insert_into_parent(parent, promoted, right_offset)
    }

    pub fn delete(&mut self, key: Key) -> DbResult<()> {
        let leaf_offset = self.find_leaf(key)?;
        if leaf_offset.is_none() {
            return Err(DbError::NotFound);
        }
        let mut leaf = self.pool.get_page(self.table, leaf_offset)?;
        let slot = self.leaf_slot(&leaf, key).ok_or(DbError::NotFound)?;
        let n = LeafPage::num_keys(&leaf);
        for i in slot..n - 1 {
            let k = LeafPage::key(&leaf, i + 1);
            let v = LeafPage::value(&leaf, i + 1);
            LeafPage::set_key(&mut leaf, i, k);
            LeafPage::set_value(&mut leaf, i, &v);
        }
        LeafPage::clear_slot(&mut leaf, n - 1);
        LeafPage::set_num_keys(&mut leaf, n - 1);
        self.pool.put_page(self.table, leaf_offset, leaf)?;

        self.delete_entry(leaf_offset)
    }

    /// Remove the `(key, child)` pair from an internal node, searching for
    /// each independently (a ghost key or dangling pointer is a bug, caught
    /// here rather than silently shifting the wrong slot).
    fn remove_from_internal(&mut self, parent: PageOffset, key_to_remove: Key, child_to_remove: PageOffset) -> DbResult<()> {
        let mut page = self.pool.get_page(self.table, parent)?;
        let n = InternalPage::num_keys(&page);

        let key_idx = (1..=n)
            .find(|&i| InternalPage::key(&page, i) == key_to_remove)
            .ok_or_else(|| DbError::Corrupt("ghost key in parent during delete".into()))?;
        for i in key_idx..n {
            let k = InternalPage::key(&page, i + 1);
            InternalPage::set_key(&mut page, i, k);
        }

        let child_idx = (0..=n)
            .find(|&i| InternalPage::child(&page, i) == child_to_remove)
            .ok_or_else(|| DbError::Corrupt("dangling child pointer in parent during delete".into()))?;
        for i in child_idx..n {
            let c = InternalPage::child(&page, i + 1);
            InternalPage::set_child(&mut page, i, c);
        }

        InternalPage::set_num_keys(&mut page, n - 1);
        self.pool.put_page(self.table, parent, page)
    }

    fn delete_entry(&mut self, node: PageOffset) -> DbResult<()> {
        let root = self.root_offset()?;
        if node == root {
            return self.adjust_root(node);
        }

        let page = self.pool.get_page(self.table, node)?;
        let (is_leaf, num_keys, parent) = match NodeKind::of(&page) {
            NodeKind::Leaf => (true, LeafPage::num_keys(&page), LeafPage::parent(&page)),
            NodeKind::Internal => (false, InternalPage::num_keys(&page), InternalPage::parent(&page)),
        };

        let min_keys = if is_leaf { LEAF_MIN_KEYS } else { INTERNAL_MIN_KEYS };
        if num_keys >= min_keys {
            return Ok(());
        }

        let parent_page = self.pool.get_page(self.table, parent)?;
        let pn = InternalPage::num_keys(&parent_page);
        let node_index = (0..=pn)
            .find(|&i| InternalPage::child(&parent_page, i) == node)
            .ok_or_else(|| DbError::Corrupt("delete_entry: node missing from its parent".into()))?;

        let (neighbor_index, k_prime_index) = if node_index == 0 {
            (1usize, 1usize)
        } else {
            (node_index - 1, node_index)
        };
        let neighbor = InternalPage::child(&parent_page, neighbor_index);
        let k_prime = InternalPage::key(&parent_page, k_prime_index);

        let neighbor_page = self.pool.get_page(self.table, neighbor)?;
        let neighbor_keys = match NodeKind::of(&neighbor_page) {
            NodeKind::Leaf => LeafPage::num_keys(&neighbor_page),
            NodeKind::Internal => InternalPage::num_keys(&neighbor_page),
        };

        let capacity = if is_leaf { LEAF_ORDER } else { INTERNAL_ORDER - 1 };

        if neighbor_keys + num_keys < capacity {
            if node_index == 0 {
                // Node is the leftmost child: swap roles so the merge always
                // appends the larger-keyed side onto the smaller-keyed one,
                // and the surviving node's sibling pointer is inherited from
                // the side being released rather than from itself (spec.md
                // §4.4; matches the C reference's `neighbor_index == -1`
                // pointer swap in `coalesce_nodes`).
                self.coalesce(parent, node, neighbor, k_prime, is_leaf)
            } else {
                self.coalesce(parent, neighbor, node, k_prime, is_leaf)
            }
        } else {
            self.redistribute(parent, node, neighbor, node_index == 0, k_prime_index, is_leaf)
        }
    }

    /// Root shrank to zero keys: collapse a leaf root to an empty tree, or
    /// promote an internal root's sole remaining child.
    fn adjust_root(&mut self, root: PageOffset) -> DbResult<()> {
        let page = self.pool.get_page(self.table, root)?;
        match NodeKind::of(&page) {
            NodeKind::Leaf => {
                if LeafPage::num_keys(&page) == 0 {
                    self.pool.release_page(self.table, root)?;
                    let mut header = self.header()?;
                    HeaderPage::set_root_offset(&mut header, PageOffset::NONE);
                    self.put_header(header)?;
                }
            }
            NodeKind::Internal => {
                if InternalPage::num_keys(&page) == 0 {
                    let only_child = InternalPage::child(&page, 0);
                    self.set_parent(only_child, PageOffset::NONE)?;
                    self.pool.release_page(self.table, root)?;
                    let mut header = self.header()?;
                    HeaderPage::set_root_offset(&mut header, only_child);
                    self.put_header(header)?;
                }
            }
        }
        Ok(())
    }

    /// Merge `node`'s contents into `neighbor` (which always plays the role
    /// of the left-hand node per spec.md §4.4's coalesce rule, the
    /// leftmost-child case included), release `node`, and recurse upward.
    fn coalesce(&mut self, parent: PageOffset, neighbor: PageOffset, node: PageOffset, k_prime: Key, is_leaf: bool) -> DbResult<()> {
        if is_leaf {
            let mut dst = self.pool.get_page(self.table, neighbor)?;
            let src = self.pool.get_page(self.table, node)?;
            let dn = LeafPage::num_keys(&dst);
            let sn = LeafPage::num_keys(&src);
            for i in 0..sn {
                let k = LeafPage::key(&src, i);
                let v = LeafPage::value(&src, i);
                LeafPage::set_key(&mut dst, dn + i, k);
                LeafPage::set_value(&mut dst, dn + i, &v);
            }
            LeafPage::set_num_keys(&mut dst, dn + sn);
            LeafPage::set_sibling(&mut dst, LeafPage::sibling(&src));
            self.pool.put_page(self.table, neighbor, dst)?;
        } else {
            let mut dst = self.pool.get_page(self.table, neighbor)?;
            let src = self.pool.get_page(self.table, node)?;
            let dn = InternalPage::num_keys(&dst);
            let sn = InternalPage::num_keys(&src);

            InternalPage::set_key(&mut dst, dn + 1, k_prime);
            InternalPage::set_child(&mut dst, dn + 1, InternalPage::child(&src, 0));
            for i in 1..=sn {
                let k = InternalPage::key(&src, i);
                let c = InternalPage::child(&src, i);
                InternalPage::set_key(&mut dst, dn + 1 + i, k);
                InternalPage::set_child(&mut dst, dn + 1 + i, c);
            }
            let new_num = dn + 1 + sn;
            InternalPage::set_num_keys(&mut dst, new_num);
            self.pool.put_page(self.table, neighbor, dst)?;

            for i in (dn + 1)..=new_num {
                let dst_now = self.pool.get_page(self.table, neighbor)?;
                let child = InternalPage::child(&dst_now, i);
                self.set_parent(child, neighbor)?;
            }
        }

        self.pool.release_page(self.table, node)?;
        self.remove_from_internal(parent, k_prime, node)?;
        self.delete_entry(parent)
    }

    /// Rotate one entry between `node` (deficient) and `neighbor` through
    /// their shared `parent`, per spec.md §4.4's redistribute rule.
    fn redistribute(
        &mut self,
        parent: PageOffset,
        node: PageOffset,
        neighbor: PageOffset,
        node_is_leftmost: bool,
        k_prime_index: usize,
        is_leaf: bool,
    ) -> DbResult<()> {
        if !node_is_leftmost {
            // Left neighbor donates its last entry to node's front.
            if is_leaf {
                let mut neighbor_page = self.pool.get_page(self.table, neighbor)?;
                let mut node_page = self.pool.get_page(self.table, node)?;
                let nn = LeafPage::num_keys(&neighbor_page);
                let moved_key = LeafPage::key(&neighbor_page, nn - 1);
                let moved_val = LeafPage::value(&neighbor_page, nn - 1);
                LeafPage::clear_slot(&mut neighbor_page, nn - 1);
                LeafPage::set_num_keys(&mut neighbor_page, nn - 1);

                let dn = LeafPage::num_keys(&node_page);
                for i in (0..dn).rev() {
                    let k = LeafPage::key(&node_page, i);
                    let v = LeafPage::value(&node_page, i);
                    LeafPage::set_key(&mut node_page, i + 1, k);
                    LeafPage::set_value(&mut node_page, i + 1, &v);
                }
                LeafPage::set_key(&mut node_page, 0, moved_key);
                LeafPage::set_value(&mut node_page, 0, &moved_val);
                LeafPage::set_num_keys(&mut node_page, dn + 1);

                self.pool.put_page(self.table, neighbor, neighbor_page)?;
                self.pool.put_page(self.table, node, node_page)?;

                let mut parent_page = self.pool.get_page(self.table, parent)?;
                InternalPage::set_key(&mut parent_page, k_prime_index, moved_key);
                self.pool.put_page(self.table, parent, parent_page)?;
            } else {
                let mut neighbor_page = self.pool.get_page(self.table, neighbor)?;
                let mut node_page = self.pool.get_page(self.table, node)?;
                let nn = InternalPage::num_keys(&neighbor_page);
                let moved_child = InternalPage::child(&neighbor_page, nn);
                let moved_key = InternalPage::key(&neighbor_page, nn);
                InternalPage::set_num_keys(&mut neighbor_page, nn - 1);

                let parent_page = self.pool.get_page(self.table, parent)?;
                let k_prime = InternalPage::key(&parent_page, k_prime_index);

                let dn = InternalPage::num_keys(&node_page);
                for i in (0..=dn).rev() {
                    let c = InternalPage::child(&node_page, i);
                    InternalPage::set_child(&mut node_page, i + 1, c);
                }
                for i in (1..=dn).rev() {
                    let k = InternalPage::key(&node_page, i);
                    InternalPage::set_key(&mut node_page, i + 1, k);
                }
                InternalPage::set_child(&mut node_page, 0, moved_child);
                InternalPage::set_key(&mut node_page, 1, k_prime);
                InternalPage::set_num_keys(&mut node_page, dn + 1);

                self.pool.put_page(self.table, neighbor, neighbor_page)?;
                self.pool.put_page(self.table, node, node_page)?;
                self.set_parent(moved_child, node)?;

                let mut parent_page = self.pool.get_page(self.table, parent)?;
                InternalPage::set_key(&mut parent_page, k_prime_index, moved_key);
                self.pool.put_page(self.table, parent, parent_page)?;
            }
        } else {
            // Node is the leftmost child; right neighbor donates its first
            // entry to node's end.
            if is_leaf {
                let mut neighbor_page = self.pool.get_page(self.table, neighbor)?;
                let mut node_page = self.pool.get_page(self.table, node)?;
                let nn = LeafPage::num_keys(&neighbor_page);
                let moved_key = LeafPage::key(&neighbor_page, 0);
                let moved_val = LeafPage::value(&neighbor_page, 0);
                let new_first = if nn > 1 { LeafPage::key(&neighbor_page, 1) } else { 0 };

                for i in 0..nn - 1 {
                    let k = LeafPage::key(&neighbor_page, i + 1);
                    let v = LeafPage::value(&neighbor_page, i + 1);
                    LeafPage::set_key(&mut neighbor_page, i, k);
                    LeafPage::set_value(&mut neighbor_page, i, &v);
                }
                LeafPage::clear_slot(&mut neighbor_page, nn - 1);
                LeafPage::set_num_keys(&mut neighbor_page, nn - 1);

                let dn = LeafPage::num_keys(&node_page);
                LeafPage::set_key(&mut node_page, dn, moved_key);
                LeafPage::set_value(&mut node_page, dn, &moved_val);
                LeafPage::set_num_keys(&mut node_page, dn + 1);

                self.pool.put_page(self.table, neighbor, neighbor_page)?;
                self.pool.put_page(self.table, node, node_page)?;

                let mut parent_page = self.pool.get_page(self.table, parent)?;
                InternalPage::set_key(&mut parent_page, k_prime_index, new_first);
                self.pool.put_page(self.table, parent, parent_page)?;
            } else {
                let mut neighbor_page = self.pool.get_page(self.table, neighbor)?;
                let mut node_page = self.pool.get_page(self.table, node)?;
                let moved_child = InternalPage::child(&neighbor_page, 0);
                let nn = InternalPage::num_keys(&neighbor_page);
                let new_k_prime = InternalPage::key(&neighbor_page, 1);

                let parent_page = self.pool.get_page(self.table, parent)?;
                let k_prime = InternalPage::key(&parent_page, k_prime_index);

                for i in 0..nn {
                    let c = InternalPage::child(&neighbor_page, i + 1);
                    InternalPage::set_child(&mut neighbor_page, i, c);
                }
                for i in 1..nn {
                    let k = InternalPage::key(&neighbor_page, i + 1);
                    InternalPage::set_key(&mut neighbor_page, i, k);
                }
                InternalPage::set_num_keys(&mut neighbor_page, nn - 1);

                let dn = InternalPage::num_keys(&node_page);
                InternalPage::set_key(&mut node_page, dn + 1, k_prime);
                InternalPage::set_child(&mut node_page, dn + 1, moved_child);
                InternalPage::set_num_keys(&mut node_page, dn + 1);

                self.pool.put_page(self.table, neighbor, neighbor_page)?;
                self.pool.put_page(self.table, node, node_page)?;
                self.set_parent(moved_child, node)?;

                let mut parent_page = self.pool.get_page(self.table, parent)?;
                InternalPage::set_key(&mut parent_page, k_prime_index, new_k_prime);
                self.pool.put_page(self.table, parent, parent_page)?;
            }
        }
        Ok(())
    }
}
