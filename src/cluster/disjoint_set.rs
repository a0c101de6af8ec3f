/// A disjoint-set forest over the indexes `0..len`.
///
/// Uses union by rank and path halving, so any sequence of unions ends in the same partition
/// regardless of the order they were applied in.
#[derive(Debug)]
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    pub(crate) fn new(len: usize) -> Self {
        DisjointSet {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    /// Find the representative of the set containing `item`.
    pub(crate) fn find(&mut self, mut item: usize) -> usize {
        while self.parent[item] != item {
            let grandparent = self.parent[self.parent[item]];
            self.parent[item] = grandparent;
            item = grandparent;
        }
        item
    }

    /// Merge the sets containing `a` and `b`. Returns `false` if they were already joined.
    pub(crate) fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);

        if root_a == root_b {
            return false;
        }

        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] = self.rank[root_a].saturating_add(1);
            }
        }

        true
    }

    pub(crate) fn same_set(&mut self, a: usize, b: usize) -> bool {
        self.find(a) == self.find(b)
    }
}
