//! Incremental Bounding Volume Hierarchy over static geometry
//!
//! Entries are inserted one at a time and tagged with a group; after a batch
//! of inserts, `propagate` refits every internal node bottom-up. Whole groups
//! are evicted with `remove_group`.

use void_math::{FrustumPlanes, FrustumTestResult, Sphere, Vec3, AABB};

/// Entries held by a leaf before it splits
pub const LEAF_CAPACITY: usize = 8;

/// Stable handle of an inserted entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub usize);

/// One indexed region
#[derive(Clone, Debug)]
pub struct IndexEntry<P, G> {
    pub bounds: AABB,
    pub payload: P,
    pub group: G,
}

#[derive(Clone, Debug)]
enum NodeContent {
    Leaf(Vec<usize>),
    Branch { left: usize, right: usize },
}

/// BVH node internal representation
#[derive(Clone, Debug)]
struct BVHNodeInternal {
    bounds: AABB,
    content: NodeContent,
}

impl BVHNodeInternal {
    fn empty_leaf() -> Self {
        Self {
            bounds: AABB::EMPTY,
            content: NodeContent::Leaf(Vec::new()),
        }
    }
}

/// Bounding volume index keyed by payload `P` and eviction group `G`.
///
/// Node 0 is the root. Children are always stored after their parent, so a
/// reverse sweep over the node list visits every child before its parent.
#[derive(Clone, Debug)]
pub struct StaticSpatialIndex<P, G> {
    nodes: Vec<BVHNodeInternal>,
    entries: Vec<Option<IndexEntry<P, G>>>,
    free: Vec<usize>,
    seed: AABB,
    live: usize,
    dirty: bool,
    version: u32,
}

impl<P: Copy, G: Copy + Eq> StaticSpatialIndex<P, G> {
    /// Create a new empty index
    pub fn new() -> Self {
        Self {
            nodes: vec![BVHNodeInternal::empty_leaf()],
            entries: Vec::new(),
            free: Vec::new(),
            seed: AABB::EMPTY,
            live: 0,
            dirty: false,
            version: 0,
        }
    }

    /// Give the root an initial volume. The root never shrinks below it.
    pub fn seed_root(&mut self, bounds: AABB) {
        self.seed = bounds;
        self.nodes[0].bounds = self.nodes[0].bounds.union(&bounds);
    }

    pub fn is_seeded(&self) -> bool {
        !self.seed.is_empty()
    }

    /// Insert a region. Internal bounds are stale until `propagate`.
    pub fn insert(&mut self, bounds: AABB, payload: P, group: G) -> EntryId {
        let entry = IndexEntry {
            bounds,
            payload,
            group,
        };
        let id = match self.free.pop() {
            Some(slot) => {
                self.entries[slot] = Some(entry);
                slot
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };

        let leaf = self.choose_leaf(&bounds);
        let overflow = match &mut self.nodes[leaf].content {
            NodeContent::Leaf(items) => {
                items.push(id);
                items.len() > LEAF_CAPACITY
            }
            NodeContent::Branch { .. } => false,
        };
        if overflow {
            self.split_leaf(leaf);
        }

        self.live += 1;
        self.dirty = true;
        EntryId(id)
    }

    /// Refit all node bounds bottom-up
    pub fn propagate(&mut self) {
        for node_idx in (0..self.nodes.len()).rev() {
            let bounds = match &self.nodes[node_idx].content {
                NodeContent::Leaf(items) => self.items_bounds(items),
                NodeContent::Branch { left, right } => {
                    self.nodes[*left].bounds.union(&self.nodes[*right].bounds)
                }
            };
            self.nodes[node_idx].bounds = bounds;
        }
        self.nodes[0].bounds = self.nodes[0].bounds.union(&self.seed);
        self.dirty = false;
        self.version = self.version.wrapping_add(1);
    }

    /// Evict every entry of a group; returns how many were removed
    pub fn remove_group(&mut self, group: G) -> usize {
        let mut removed = Vec::new();
        for node in &mut self.nodes {
            if let NodeContent::Leaf(items) = &mut node.content {
                let entries = &self.entries;
                items.retain(|&id| {
                    let in_group = entries[id].as_ref().map_or(false, |e| e.group == group);
                    if in_group {
                        removed.push(id);
                    }
                    !in_group
                });
            }
        }

        for &id in &removed {
            self.entries[id] = None;
            self.free.push(id);
        }
        self.live -= removed.len();

        if removed.is_empty() {
            return 0;
        }

        if self.live == 0 {
            self.reset();
        } else if self.nodes.len() > 4 * (self.live / LEAF_CAPACITY + 1) {
            self.rebuild();
        } else {
            self.propagate();
        }
        removed.len()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Incremented on every refit or rebuild
    pub fn version(&self) -> u32 {
        self.version
    }

    /// True after inserts that have not been propagated yet
    pub fn needs_propagation(&self) -> bool {
        self.dirty
    }

    /// Bounds of the root; `None` before anything was seeded or inserted
    pub fn root_bounds(&self) -> Option<AABB> {
        let bounds = self.nodes[0].bounds;
        (!bounds.is_empty()).then_some(bounds)
    }

    pub fn get(&self, id: EntryId) -> Option<&IndexEntry<P, G>> {
        self.entries.get(id.0).and_then(Option::as_ref)
    }

    pub fn group_len(&self, group: G) -> usize {
        self.iter().filter(|entry| entry.group == group).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry<P, G>> {
        self.entries.iter().filter_map(Option::as_ref)
    }

    /// Query payloads whose bounds overlap the window
    pub fn query_aabb(&self, query: &AABB) -> Vec<P> {
        let mut results = Vec::new();
        self.query_recursive(
            0,
            &|bounds: &AABB| bounds.intersects(query),
            &mut results,
        );
        results
    }

    /// Query payloads whose bounds touch the sphere
    pub fn query_sphere(&self, sphere: &Sphere) -> Vec<P> {
        let mut results = Vec::new();
        self.query_recursive(
            0,
            &|bounds: &AABB| sphere.intersects_aabb(bounds),
            &mut results,
        );
        results
    }

    /// Frustum cull - return payloads not fully outside the frustum
    pub fn frustum_cull(&self, frustum: &FrustumPlanes) -> Vec<P> {
        let mut results = Vec::new();
        self.frustum_cull_recursive(0, frustum, &mut results);
        results
    }

    fn query_recursive<F>(&self, node_idx: usize, test: &F, results: &mut Vec<P>)
    where
        F: Fn(&AABB) -> bool,
    {
        let node = &self.nodes[node_idx];
        if !test(&node.bounds) {
            return;
        }

        match &node.content {
            NodeContent::Leaf(items) => {
                for entry in items.iter().filter_map(|&id| self.entries[id].as_ref()) {
                    if test(&entry.bounds) {
                        results.push(entry.payload);
                    }
                }
            }
            NodeContent::Branch { left, right } => {
                self.query_recursive(*left, test, results);
                self.query_recursive(*right, test, results);
            }
        }
    }

    fn frustum_cull_recursive(&self, node_idx: usize, frustum: &FrustumPlanes, results: &mut Vec<P>) {
        let node = &self.nodes[node_idx];

        match frustum.contains_aabb(&node.bounds) {
            FrustumTestResult::Outside => return,
            FrustumTestResult::Inside => {
                self.collect_all(node_idx, results);
                return;
            }
            FrustumTestResult::Intersecting => {}
        }

        match &node.content {
            NodeContent::Leaf(items) => {
                for entry in items.iter().filter_map(|&id| self.entries[id].as_ref()) {
                    if frustum.is_aabb_visible(&entry.bounds) {
                        results.push(entry.payload);
                    }
                }
            }
            NodeContent::Branch { left, right } => {
                self.frustum_cull_recursive(*left, frustum, results);
                self.frustum_cull_recursive(*right, frustum, results);
            }
        }
    }

    fn collect_all(&self, node_idx: usize, results: &mut Vec<P>) {
        match &self.nodes[node_idx].content {
            NodeContent::Leaf(items) => {
                results.extend(
                    items
                        .iter()
                        .filter_map(|&id| self.entries[id].as_ref())
                        .map(|entry| entry.payload),
                );
            }
            NodeContent::Branch { left, right } => {
                self.collect_all(*left, results);
                self.collect_all(*right, results);
            }
        }
    }

    /// Descend towards the child whose surface area grows least
    fn choose_leaf(&self, bounds: &AABB) -> usize {
        let mut node_idx = 0;
        while let NodeContent::Branch { left, right } = self.nodes[node_idx].content {
            let growth = |child: usize| {
                let current = &self.nodes[child].bounds;
                current.union(bounds).surface_area() - current.surface_area()
            };
            node_idx = if growth(right) < growth(left) { right } else { left };
        }
        node_idx
    }

    /// Split an overfull leaf at the median centroid along its widest axis
    fn split_leaf(&mut self, node_idx: usize) {
        let mut items = match &mut self.nodes[node_idx].content {
            NodeContent::Leaf(items) => core::mem::take(items),
            NodeContent::Branch { .. } => return,
        };
        self.sort_along_widest_axis(&mut items);
        let right_items = items.split_off(items.len() / 2);

        let left = self.push_leaf(items);
        let right = self.push_leaf(right_items);
        self.nodes[node_idx].content = NodeContent::Branch { left, right };
    }

    fn push_leaf(&mut self, items: Vec<usize>) -> usize {
        let bounds = self.items_bounds(&items);
        self.nodes.push(BVHNodeInternal {
            bounds,
            content: NodeContent::Leaf(items),
        });
        self.nodes.len() - 1
    }

    fn sort_along_widest_axis(&self, items: &mut [usize]) {
        let centroid = |id: usize| {
            self.entries[id]
                .as_ref()
                .map_or(Vec3::ZERO, |entry| entry.bounds.center())
        };
        let spread = items
            .iter()
            .fold(AABB::EMPTY, |acc, &id| acc.expand_to_include(centroid(id)))
            .size();
        let axis = if spread.x > spread.y && spread.x > spread.z {
            0
        } else if spread.y > spread.z {
            1
        } else {
            2
        };
        items.sort_by(|&a, &b| centroid(a)[axis].total_cmp(&centroid(b)[axis]));
    }

    fn items_bounds(&self, items: &[usize]) -> AABB {
        items
            .iter()
            .filter_map(|&id| self.entries[id].as_ref())
            .fold(AABB::EMPTY, |acc, entry| acc.union(&entry.bounds))
    }

    /// Drop every node and entry, keep the seed
    fn reset(&mut self) {
        self.nodes.clear();
        self.nodes.push(BVHNodeInternal::empty_leaf());
        self.entries.clear();
        self.free.clear();
        self.live = 0;
        self.propagate();
    }

    /// Rebuild the tree top-down from the live entries
    fn rebuild(&mut self) {
        let mut items: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter_map(|(id, entry)| entry.as_ref().map(|_| id))
            .collect();

        self.nodes.clear();
        self.build_recursive(&mut items);
        self.propagate();
        log::debug!(
            "Rebuilt static index: {} entries in {} nodes",
            self.live,
            self.nodes.len()
        );
    }

    fn build_recursive(&mut self, items: &mut [usize]) -> usize {
        let node_index = self.nodes.len();
        if items.len() <= LEAF_CAPACITY {
            self.nodes.push(BVHNodeInternal {
                bounds: AABB::EMPTY,
                content: NodeContent::Leaf(items.to_vec()),
            });
            return node_index;
        }

        self.sort_along_widest_axis(items);
        let mid = items.len() / 2;
        let (left_items, right_items) = items.split_at_mut(mid);

        // Reserve the parent slot so children land after it
        self.nodes.push(BVHNodeInternal::empty_leaf());
        let left = self.build_recursive(left_items);
        let right = self.build_recursive(right_items);
        self.nodes[node_index].content = NodeContent::Branch { left, right };

        node_index
    }
}

impl<P: Copy, G: Copy + Eq> Default for StaticSpatialIndex<P, G> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(x: f32, z: f32) -> AABB {
        AABB::new(Vec3::new(x, 0.0, z), Vec3::new(x + 1.0, 1.0, z + 1.0))
    }

    /// Entries on a grid; payload is `x * 100 + z`, group is the row
    fn grid(rows: u32, cols: u32) -> StaticSpatialIndex<u32, u32> {
        let mut index = StaticSpatialIndex::new();
        for row in 0..rows {
            for col in 0..cols {
                index.insert(cube(col as f32 * 2.0, row as f32 * 2.0), col * 100 + row, row);
            }
            index.propagate();
        }
        index
    }

    #[test]
    fn test_index_empty() {
        let index: StaticSpatialIndex<u32, u32> = StaticSpatialIndex::new();
        assert!(index.is_empty());
        assert!(index.root_bounds().is_none());
        assert!(index.query_aabb(&cube(0.0, 0.0)).is_empty());
    }

    #[test]
    fn test_seed_sets_root_bounds() {
        let mut index: StaticSpatialIndex<u32, u32> = StaticSpatialIndex::new();
        let seed = AABB::from_center_half_extents(Vec3::new(8.0, 0.0, 8.0), Vec3::splat(8.0));
        index.seed_root(seed);
        assert!(index.is_seeded());
        assert_eq!(index.root_bounds(), Some(seed));

        index.insert(cube(40.0, 40.0), 1, 0);
        index.propagate();
        let root = index.root_bounds().unwrap();
        assert!(root.contains_aabb(&seed));
        assert!(root.contains_aabb(&cube(40.0, 40.0)));
    }

    #[test]
    fn test_insert_splits_leaves() {
        let index = grid(4, 6);
        assert_eq!(index.len(), 24);
        assert!(index.node_count() > 1);
        assert!(!index.needs_propagation());
    }

    #[test]
    fn test_propagate_covers_children() {
        let mut index: StaticSpatialIndex<u32, u32> = StaticSpatialIndex::new();
        for i in 0..40 {
            index.insert(cube(i as f32 * 3.0, (i % 5) as f32), i, 0);
        }
        assert!(index.needs_propagation());
        index.propagate();

        for (node_idx, node) in index.nodes.iter().enumerate() {
            if let NodeContent::Branch { left, right } = node.content {
                assert!(left > node_idx && right > node_idx);
                assert!(node.bounds.contains_aabb(&index.nodes[left].bounds));
                assert!(node.bounds.contains_aabb(&index.nodes[right].bounds));
            }
        }
        assert!(index
            .iter()
            .all(|entry| index.root_bounds().unwrap().contains_aabb(&entry.bounds)));
    }

    #[test]
    fn test_query_aabb() {
        let index = grid(5, 5);
        let mut hits = index.query_aabb(&AABB::new(Vec3::new(3.5, 0.0, 3.5), Vec3::new(4.5, 1.0, 4.5)));
        hits.sort();
        assert_eq!(hits, vec![202]);

        let all = index.query_aabb(&AABB::new(Vec3::splat(-10.0), Vec3::splat(100.0)));
        assert_eq!(all.len(), 25);
    }

    #[test]
    fn test_query_sphere() {
        let index = grid(3, 3);
        let hits = index.query_sphere(&Sphere::new(Vec3::new(0.5, 0.5, 0.5), 0.25));
        assert_eq!(hits, vec![0]);
    }

    #[test]
    fn test_frustum_cull() {
        use void_math::Plane;

        let index = grid(4, 4);
        // Keep x in [0, 3]
        let mut frustum = FrustumPlanes {
            planes: [Plane::from_point_normal(Vec3::new(-100.0, 0.0, 0.0), Vec3::X); 6],
        };
        frustum.planes[0] = Plane::from_point_normal(Vec3::ZERO, Vec3::X);
        frustum.planes[1] = Plane::from_point_normal(Vec3::new(3.0, 0.0, 0.0), Vec3::NEG_X);

        let mut hits = index.frustum_cull(&frustum);
        hits.sort();
        // Columns 0 and 1 (x in [0,1] and [2,3])
        assert_eq!(hits, vec![0, 1, 2, 3, 100, 101, 102, 103]);
    }

    #[test]
    fn test_remove_group() {
        let mut index = grid(4, 6);
        assert_eq!(index.group_len(2), 6);

        assert_eq!(index.remove_group(2), 6);
        assert_eq!(index.group_len(2), 0);
        assert_eq!(index.len(), 18);
        assert!(index.query_aabb(&cube(0.0, 4.0)).iter().all(|p| p % 100 != 2));

        assert_eq!(index.remove_group(2), 0);
    }

    #[test]
    fn test_remove_all_groups_resets() {
        let mut index = grid(3, 10);
        for row in 0..3 {
            index.remove_group(row);
        }
        assert!(index.is_empty());
        assert_eq!(index.node_count(), 1);
        assert!(index.root_bounds().is_none());

        // Reusable after reset
        index.insert(cube(0.0, 0.0), 7, 9);
        index.propagate();
        assert_eq!(index.query_aabb(&cube(0.0, 0.0)), vec![7]);
    }

    #[test]
    fn test_rebuild_after_fragmentation() {
        let mut index = grid(12, 12);
        let before = index.node_count();
        for row in 0..11 {
            index.remove_group(row);
        }
        assert_eq!(index.len(), 12);
        assert!(index.node_count() < before);
        assert_eq!(index.query_aabb(&AABB::new(Vec3::splat(-1.0), Vec3::splat(100.0))).len(), 12);
    }

    #[test]
    fn test_free_slots_are_reused() {
        let mut index: StaticSpatialIndex<u32, u32> = StaticSpatialIndex::new();
        let first = index.insert(cube(0.0, 0.0), 1, 0);
        index.insert(cube(5.0, 0.0), 2, 1);
        index.propagate();
        index.remove_group(0);
        assert!(index.get(first).is_none());

        let reused = index.insert(cube(9.0, 0.0), 3, 2);
        assert_eq!(reused, first);
        assert_eq!(index.get(reused).map(|e| e.payload), Some(3));
    }
}
