use crate::error::Result;
use crate::types::{validate_value, Key, Value};

/// Smallest legal minimum degree. Anything lower is clamped up to this.
pub const MIN_DEGREE: usize = 2;

/// Index of a node inside `BTree::nodes`.
type NodeId = usize;

/// A single node in the B-tree.
///
/// `keys` and `values` are parallel and strictly increasing by key.
/// Internal nodes carry `keys.len() + 1` children; leaves carry none.
///
/// ```text
///                  [ 10 | 20 ]
///                 /     |     \
///          [5 | 6]  [12 | 15]  [30]
/// ```
///
/// Everything in `children[i]` is < `keys[i]`, everything in
/// `children[i + 1]` is > `keys[i]`.
#[derive(Debug)]
struct Node {
    keys: Vec<Key>,
    values: Vec<Value>,
    children: Vec<NodeId>,
    leaf: bool,
}

impl Node {
    fn new(leaf: bool) -> Self {
        Node {
            keys: Vec::new(),
            values: Vec::new(),
            children: Vec::new(),
            leaf,
        }
    }
}

/// In-memory ordered map from integer keys to values.
///
/// Nodes live in an arena and refer to their children by index, so a split
/// just moves the upper half of a `Vec` into a freshly pushed node. Nothing is
/// ever deleted, so indices stay valid for the lifetime of the tree.
///
/// Insertion uses the proactive-split discipline: any full node met on the
/// way down is split before we enter it, so the leaf we finally reach always
/// has room and nothing has to be fixed up on the way back.
#[derive(Debug)]
pub struct BTree {
    nodes: Vec<Node>,
    root: NodeId,
    degree: usize,
    len: usize,
}

impl BTree {
    /// Create an empty tree. `degree` below 2 is clamped to 2.
    pub fn new(degree: usize) -> Self {
        BTree {
            nodes: vec![Node::new(true)],
            root: 0,
            degree: degree.max(MIN_DEGREE),
            len: 0,
        }
    }

    /// Minimum degree of every node.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels, counting the root. An empty tree has height 1.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut id = self.root;
        while !self.nodes[id].leaf {
            id = self.nodes[id].children[0];
            height += 1;
        }
        height
    }

    fn max_keys(&self) -> usize {
        2 * self.degree - 1
    }

    fn is_full(&self, id: NodeId) -> bool {
        self.nodes[id].keys.len() == self.max_keys()
    }

    /// Insert or overwrite. Returns the previous value for `key`, if any.
    ///
    /// Fails with `InvalidArgument` on an empty value; the tree is untouched
    /// in that case.
    pub fn insert(&mut self, key: Key, value: Value) -> Result<Option<Value>> {
        validate_value(&value)?;

        if self.is_full(self.root) {
            let old_root = self.root;
            let mut new_root = Node::new(false);
            new_root.children.push(old_root);
            self.root = self.push(new_root);
            self.split_child(self.root, 0);
        }

        let mut id = self.root;
        loop {
            let pos = match self.nodes[id].keys.binary_search(&key) {
                Ok(pos) => {
                    let slot = &mut self.nodes[id].values[pos];
                    return Ok(Some(std::mem::replace(slot, value)));
                }
                Err(pos) => pos,
            };

            if self.nodes[id].leaf {
                let node = &mut self.nodes[id];
                node.keys.insert(pos, key);
                node.values.insert(pos, value);
                self.len += 1;
                return Ok(None);
            }

            let mut child_pos = pos;
            if self.is_full(self.nodes[id].children[pos]) {
                self.split_child(id, pos);
                // The promoted median now sits at keys[pos].
                let median = self.nodes[id].keys[pos];
                if key == median {
                    let slot = &mut self.nodes[id].values[pos];
                    return Ok(Some(std::mem::replace(slot, value)));
                }
                if key > median {
                    child_pos += 1;
                }
            }
            id = self.nodes[id].children[child_pos];
        }
    }

    /// Point lookup.
    pub fn get(&self, key: Key) -> Option<&Value> {
        let mut id = self.root;
        loop {
            let node = &self.nodes[id];
            match node.keys.binary_search(&key) {
                Ok(pos) => return Some(&node.values[pos]),
                Err(_) if node.leaf => return None,
                Err(pos) => id = node.children[pos],
            }
        }
    }

    /// In-order iterator over all entries, ascending by key.
    pub fn iter(&self) -> Iter<'_> {
        let mut iter = Iter {
            tree: self,
            stack: Vec::new(),
        };
        iter.descend_leftmost(self.root);
        iter
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Split the full child at `parent.children[index]` around its median.
    ///
    /// The median moves up into `parent` at `index`; everything after it moves
    /// to a new right sibling placed at `parent.children[index + 1]`.
    fn split_child(&mut self, parent: NodeId, index: usize) {
        let mid = self.degree - 1;
        let child_id = self.nodes[parent].children[index];

        let child = &mut self.nodes[child_id];
        debug_assert_eq!(child.keys.len(), 2 * self.degree - 1);

        let mut right = Node::new(child.leaf);
        right.keys = child.keys.split_off(mid + 1);
        right.values = child.values.split_off(mid + 1);
        if !child.leaf {
            right.children = child.children.split_off(mid + 1);
        }
        // After split_off the median is the last element left behind.
        let median_key = child.keys.pop();
        let median_value = child.values.pop();

        let right_id = self.push(right);
        if let (Some(k), Some(v)) = (median_key, median_value) {
            let parent = &mut self.nodes[parent];
            parent.keys.insert(index, k);
            parent.values.insert(index, v);
            parent.children.insert(index + 1, right_id);
        }
    }
}

/// In-order iterator over a `BTree`.
///
/// Keeps an explicit stack of `(node, next key index)` frames, so the walk
/// needs no parent pointers and no recursion.
pub struct Iter<'a> {
    tree: &'a BTree,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> Iter<'a> {
    fn descend_leftmost(&mut self, mut id: NodeId) {
        loop {
            self.stack.push((id, 0));
            let node = &self.tree.nodes[id];
            if node.leaf {
                break;
            }
            id = node.children[0];
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (Key, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        loop {
            let frame = self.stack.last_mut()?;
            let node = &tree.nodes[frame.0];
            if frame.1 < node.keys.len() {
                let i = frame.1;
                frame.1 += 1;
                if !node.leaf {
                    self.descend_leftmost(node.children[i + 1]);
                }
                return Some((node.keys[i], &node.values[i]));
            }
            self.stack.pop();
        }
    }
}
