use rustc_hash::FxHashMap;

/// A trie over `(q-constant, constant)` pairs.
///
/// Each root-to-leaf path stores one substitution option under which an
/// operator indirectly supports a fact. Sharing prefixes keeps the
/// per-position indirect-support tables small when many options agree on
/// their first substitutions.
///
/// An empty path (a leaf at the root) means the support is unconditional.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathTree {
    children: FxHashMap<(usize, usize), PathTree>,
    terminal: bool,
}

impl PathTree {
    /// Inserts a substitution path.
    pub fn insert(&mut self, path: &[(usize, usize)]) {
        match path.split_first() {
            None => self.terminal = true,
            Some((head, tail)) => self.children.entry(*head).or_default().insert(tail),
        }
    }

    /// Returns `true` if and only if no path was inserted.
    pub fn is_empty(&self) -> bool {
        !self.terminal && self.children.is_empty()
    }

    /// Returns `true` if and only if the empty path was inserted.
    pub fn has_empty_path(&self) -> bool {
        self.terminal
    }

    /// Collects all stored paths.
    pub fn paths(&self) -> Vec<Vec<(usize, usize)>> {
        let mut result = Vec::new();
        let mut prefix = Vec::new();
        self.collect(&mut prefix, &mut result);
        result
    }

    fn collect(&self, prefix: &mut Vec<(usize, usize)>, out: &mut Vec<Vec<(usize, usize)>>) {
        if self.terminal {
            out.push(prefix.clone());
        }
        for (pair, child) in &self.children {
            prefix.push(*pair);
            child.collect(prefix, out);
            prefix.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        let t = PathTree::default();
        assert!(t.is_empty());
        assert!(!t.has_empty_path());
        assert!(t.paths().is_empty());
    }

    #[test]
    fn test_empty_path_is_unconditional() {
        let mut t = PathTree::default();
        t.insert(&[]);
        assert!(!t.is_empty());
        assert!(t.has_empty_path());
        assert_eq!(vec![Vec::<(usize, usize)>::new()], t.paths());
    }

    #[test]
    fn test_shared_prefixes() {
        let mut t = PathTree::default();
        t.insert(&[(1, 2), (3, 4)]);
        t.insert(&[(1, 2), (3, 5)]);
        t.insert(&[(7, 8)]);
        let mut paths = t.paths();
        paths.sort();
        assert_eq!(
            vec![
                vec![(1, 2), (3, 4)],
                vec![(1, 2), (3, 5)],
                vec![(7, 8)],
            ],
            paths
        );
    }

    #[test]
    fn test_duplicate_insert() {
        let mut t = PathTree::default();
        t.insert(&[(1, 2)]);
        t.insert(&[(1, 2)]);
        assert_eq!(1, t.paths().len());
    }
}
