use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub type CompareFn<T> = dyn Fn(&T, &T) -> Ordering + Send + Sync;

type Link<T> = Option<Arc<Node<T>>>;

#[derive(Clone)]
struct Node<T> {
    value: T,
    red: bool,
    /// Number of values in the subtree rooted here
    size: usize,
    left: Link<T>,
    right: Link<T>,
}

/// Persistent ordered set backed by a left-leaning red-black tree.
///
/// Mutations copy only the path from the root to the touched node; every
/// other node is shared with earlier versions. `clone()` is O(1).
/// Subtree sizes give O(log n) rank and positional lookups.
pub struct SortedSet<T> {
    root: Link<T>,
    cmp: Arc<CompareFn<T>>,
}

impl<T> Clone for SortedSet<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            cmp: self.cmp.clone(),
        }
    }
}

impl<T: Clone> SortedSet<T> {
    pub fn new<F>(cmp: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self::with_comparator(Arc::new(cmp))
    }

    pub fn with_comparator(cmp: Arc<CompareFn<T>>) -> Self {
        Self { root: None, cmp }
    }

    pub fn len(&self) -> usize {
        size(&self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Inserts `value`, replacing an element that compares equal.
    ///
    /// Returns `true` when the set grew.
    pub fn insert(
        &mut self,
        value: T,
    ) -> bool {
        let before = self.len();
        let mut root = insert_at(self.root.take(), value, &*self.cmp);
        root.red = false;
        self.root = Some(Arc::new(root));
        self.len() > before
    }

    /// Removes the element comparing equal to `value`.
    ///
    /// Returns `false` when no such element exists.
    pub fn remove(
        &mut self,
        value: &T,
    ) -> bool {
        if !self.contains(value) {
            return false;
        }
        let Some(root) = self.root.take() else {
            return false;
        };

        let mut root = owned(root);
        if !is_red(&root.left) && !is_red(&root.right) {
            root.red = true;
        }
        self.root = remove_at(root, value, &*self.cmp).map(|mut root| {
            root.red = false;
            Arc::new(root)
        });
        true
    }

    pub fn contains(
        &self,
        value: &T,
    ) -> bool {
        self.find(value).is_some()
    }

    pub fn find(
        &self,
        value: &T,
    ) -> Option<&T> {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            match (self.cmp)(value, &n.value) {
                Ordering::Less => node = n.left.as_deref(),
                Ordering::Greater => node = n.right.as_deref(),
                Ordering::Equal => return Some(&n.value),
            }
        }
        None
    }

    /// Zero-based position of `value` in iteration order
    pub fn index_of(
        &self,
        value: &T,
    ) -> Option<usize> {
        let mut node = self.root.as_deref();
        let mut rank = 0;
        while let Some(n) = node {
            match (self.cmp)(value, &n.value) {
                Ordering::Less => node = n.left.as_deref(),
                Ordering::Greater => {
                    rank += size(&n.left) + 1;
                    node = n.right.as_deref();
                }
                Ordering::Equal => return Some(rank + size(&n.left)),
            }
        }
        None
    }

    /// Element at zero-based position `index`
    pub fn get(
        &self,
        mut index: usize,
    ) -> Option<&T> {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            let left = size(&n.left);
            match index.cmp(&left) {
                Ordering::Less => node = n.left.as_deref(),
                Ordering::Equal => return Some(&n.value),
                Ordering::Greater => {
                    index -= left + 1;
                    node = n.right.as_deref();
                }
            }
        }
        None
    }

    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    pub fn iter(&self) -> Iter<'_, T> {
        let mut iter = Iter {
            stack: Vec::new(),
            remaining: self.len(),
        };
        iter.push_left(self.root.as_deref());
        iter
    }

    /// Verifies the red-black shape, the subtree sizes and the ordering.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> std::result::Result<(), String> {
        if is_red(&self.root) {
            return Err("root is red".to_string());
        }
        check_node(self.root.as_deref(), &*self.cmp).map(|_| ())
    }
}

impl<T: fmt::Debug + Clone> fmt::Debug for SortedSet<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<'a, T: Clone> IntoIterator for &'a SortedSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// In-order iterator over a [`SortedSet`]
pub struct Iter<'a, T> {
    stack: Vec<&'a Node<T>>,
    remaining: usize,
}

impl<'a, T> Iter<'a, T> {
    fn push_left(
        &mut self,
        mut node: Option<&'a Node<T>>,
    ) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

// -
// Tree internals (Sedgewick's LLRB with path copying)

fn size<T>(link: &Link<T>) -> usize {
    link.as_ref().map_or(0, |n| n.size)
}

fn is_red<T>(link: &Link<T>) -> bool {
    link.as_ref().map_or(false, |n| n.red)
}

fn left_is_red<T>(link: &Link<T>) -> bool {
    link.as_ref().map_or(false, |n| is_red(&n.left))
}

/// Takes the node out of its `Arc`, copying it only when another version
/// still references it.
fn owned<T: Clone>(node: Arc<Node<T>>) -> Node<T> {
    Arc::try_unwrap(node).unwrap_or_else(|shared| (*shared).clone())
}

impl<T: Clone> Node<T> {
    fn leaf(value: T) -> Self {
        Self {
            value,
            red: true,
            size: 1,
            left: None,
            right: None,
        }
    }

    fn update_size(&mut self) {
        self.size = 1 + size(&self.left) + size(&self.right);
    }

    fn rotate_left(mut self) -> Self {
        let Some(right) = self.right.take() else {
            return self;
        };
        let mut x = owned(right);
        self.right = x.left.take();
        x.red = self.red;
        self.red = true;
        self.update_size();
        x.left = Some(Arc::new(self));
        x.update_size();
        x
    }

    fn rotate_right(mut self) -> Self {
        let Some(left) = self.left.take() else {
            return self;
        };
        let mut x = owned(left);
        self.left = x.right.take();
        x.red = self.red;
        self.red = true;
        self.update_size();
        x.right = Some(Arc::new(self));
        x.update_size();
        x
    }

    fn flip_colors(&mut self) {
        self.red = !self.red;
        for child in [&mut self.left, &mut self.right] {
            *child = child.take().map(|n| {
                let mut n = owned(n);
                n.red = !n.red;
                Arc::new(n)
            });
        }
    }

    fn balance(mut self) -> Self {
        if is_red(&self.right) && !is_red(&self.left) {
            self = self.rotate_left();
        }
        if is_red(&self.left) && left_is_red(&self.left) {
            self = self.rotate_right();
        }
        if is_red(&self.left) && is_red(&self.right) {
            self.flip_colors();
        }
        self.update_size();
        self
    }

    fn move_red_left(mut self) -> Self {
        self.flip_colors();
        if left_is_red(&self.right) {
            self.right = self.right.take().map(|r| Arc::new(owned(r).rotate_right()));
            self = self.rotate_left();
            self.flip_colors();
        }
        self
    }

    fn move_red_right(mut self) -> Self {
        self.flip_colors();
        if left_is_red(&self.left) {
            self = self.rotate_right();
            self.flip_colors();
        }
        self
    }

    fn remove_min(mut self) -> (T, Option<Self>) {
        if self.left.is_none() {
            return (self.value, None);
        }
        if !is_red(&self.left) && !left_is_red(&self.left) {
            self = self.move_red_left();
        }
        match self.left.take() {
            Some(left) => {
                let (min, rest) = owned(left).remove_min();
                self.left = rest.map(Arc::new);
                (min, Some(self.balance()))
            }
            None => (self.value, None),
        }
    }
}

fn insert_at<T: Clone>(
    link: Link<T>,
    value: T,
    cmp: &CompareFn<T>,
) -> Node<T> {
    let Some(node) = link else {
        return Node::leaf(value);
    };

    let mut h = owned(node);
    match cmp(&value, &h.value) {
        Ordering::Less => h.left = Some(Arc::new(insert_at(h.left.take(), value, cmp))),
        Ordering::Greater => h.right = Some(Arc::new(insert_at(h.right.take(), value, cmp))),
        Ordering::Equal => h.value = value,
    }
    h.balance()
}

/// Caller guarantees `value` is present in the subtree rooted at `h`.
fn remove_at<T: Clone>(
    mut h: Node<T>,
    value: &T,
    cmp: &CompareFn<T>,
) -> Option<Node<T>> {
    if cmp(value, &h.value) == Ordering::Less {
        if !is_red(&h.left) && !left_is_red(&h.left) {
            h = h.move_red_left();
        }
        h.left = h.left.take().and_then(|l| remove_at(owned(l), value, cmp)).map(Arc::new);
    } else {
        if is_red(&h.left) {
            h = h.rotate_right();
        }
        if cmp(value, &h.value) == Ordering::Equal && h.right.is_none() {
            return None;
        }
        if !is_red(&h.right) && !left_is_red(&h.right) {
            h = h.move_red_right();
        }
        if cmp(value, &h.value) == Ordering::Equal {
            if let Some(right) = h.right.take() {
                let (min, rest) = owned(right).remove_min();
                h.value = min;
                h.right = rest.map(Arc::new);
            }
        } else {
            h.right = h.right.take().and_then(|r| remove_at(owned(r), value, cmp)).map(Arc::new);
        }
    }
    Some(h.balance())
}

/// Returns the black height of the subtree.
#[cfg(test)]
fn check_node<T>(
    node: Option<&Node<T>>,
    cmp: &CompareFn<T>,
) -> std::result::Result<usize, String> {
    let Some(n) = node else {
        return Ok(1);
    };

    if is_red(&n.right) {
        return Err("right-leaning red link".to_string());
    }
    if n.red && is_red(&n.left) {
        return Err("two consecutive red links".to_string());
    }
    if n.size != 1 + size(&n.left) + size(&n.right) {
        return Err(format!("subtree size {} is stale", n.size));
    }
    if let Some(left) = n.left.as_deref() {
        if cmp(&left.value, &n.value) != Ordering::Less {
            return Err("left child out of order".to_string());
        }
    }
    if let Some(right) = n.right.as_deref() {
        if cmp(&right.value, &n.value) != Ordering::Greater {
            return Err("right child out of order".to_string());
        }
    }

    let left_height = check_node(n.left.as_deref(), cmp)?;
    let right_height = check_node(n.right.as_deref(), cmp)?;
    if left_height != right_height {
        return Err(format!("black height differs ({left_height} vs {right_height})"));
    }
    Ok(left_height + usize::from(!n.red))
}
