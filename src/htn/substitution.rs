use anyhow::{anyhow, Result};

/// A finite mapping from argument ids to argument ids.
///
/// Substitutions replace q-constants by concrete constants (or other
/// q-constants). They are value types: two substitutions with the same
/// mappings are equal and hash identically, so they can be collected in
/// sets, e.g. the forbidden-substitution tables.
///
/// The mappings are kept sorted by source argument, which makes equality,
/// hashing and lookup independent of insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Substitution {
    entries: Vec<(usize, usize)>,
}

impl Substitution {
    /// Builds the substitution pairing `from[i]` with `to[i]` wherever the
    /// two differ.
    ///
    /// Fails if the vectors have different lengths or if some `from[i]` is
    /// paired with two distinct targets.
    ///
    /// # Example
    ///
    /// ```
    /// # use stratasat::Substitution;
    /// let s = Substitution::between(&[1, 2, 3], &[1, 9, 8]).unwrap();
    /// assert_eq!(None, s.get(1));
    /// assert_eq!(Some(9), s.get(2));
    /// assert!(Substitution::between(&[2, 2], &[5, 6]).is_err());
    /// ```
    pub fn between(from: &[usize], to: &[usize]) -> Result<Self> {
        if from.len() != to.len() {
            return Err(anyhow!(
                "cannot pair argument vectors of lengths {} and {}",
                from.len(),
                to.len()
            ));
        }
        let mut s = Substitution::default();
        for (f, t) in from.iter().zip(to.iter()) {
            if f != t {
                s.insert(*f, *t)?;
            }
        }
        Ok(s)
    }

    /// Adds a mapping, failing if `from` is already mapped to another value.
    pub fn insert(&mut self, from: usize, to: usize) -> Result<()> {
        match self.entries.binary_search_by_key(&from, |e| e.0) {
            Ok(i) if self.entries[i].1 == to => Ok(()),
            Ok(i) => Err(anyhow!(
                "conflicting mappings {} -> {} and {} -> {}",
                from,
                self.entries[i].1,
                from,
                to
            )),
            Err(i) => {
                self.entries.insert(i, (from, to));
                Ok(())
            }
        }
    }

    /// Returns the image of an argument, or `None` if it is unmapped.
    pub fn get(&self, from: usize) -> Option<usize> {
        self.entries
            .binary_search_by_key(&from, |e| e.0)
            .ok()
            .map(|i| self.entries[i].1)
    }

    /// Returns `true` if and only if no argument is mapped.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number of mapped arguments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over the `(from, to)` pairs in increasing `from` order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.entries.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between_pairs_differing_positions() {
        let s = Substitution::between(&[10, 11, 12], &[10, 20, 30]).unwrap();
        assert_eq!(2, s.len());
        assert_eq!(Some(20), s.get(11));
        assert_eq!(Some(30), s.get(12));
        assert_eq!(None, s.get(10));
    }

    #[test]
    fn test_between_detects_conflicts() {
        assert!(Substitution::between(&[1, 1], &[2, 3]).is_err());
        // mapping the same source twice to the same target is fine
        assert!(Substitution::between(&[1, 1], &[2, 2]).is_ok());
    }

    #[test]
    fn test_between_length_mismatch() {
        assert!(Substitution::between(&[1], &[]).is_err());
    }

    #[test]
    fn test_order_independence() {
        let mut a = Substitution::default();
        a.insert(1, 2).unwrap();
        a.insert(3, 4).unwrap();
        let mut b = Substitution::default();
        b.insert(3, 4).unwrap();
        b.insert(1, 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_iter_sorted() {
        let mut s = Substitution::default();
        s.insert(9, 1).unwrap();
        s.insert(2, 7).unwrap();
        let pairs: Vec<_> = s.iter().collect();
        assert_eq!(vec![(2, 7), (9, 1)], pairs);
    }
}
