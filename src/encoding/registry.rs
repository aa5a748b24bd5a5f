use log::trace;

/// Monotonic allocator of SAT variable ids.
///
/// The registry is owned by its [Encoding](super::Encoding); all variables
/// of one encoding come from one registry, so ids are dense and never
/// reassigned.
///
/// During plan extraction the registry is [locked](Self::lock): allocation
/// attempts while locked indicate a query for a signature that was never
/// encoded, which is a programming error.
#[derive(Default)]
pub struct VariableRegistry {
    next: usize,
    locked: bool,
}

impl VariableRegistry {
    /// Builds a registry whose first variable is `1`.
    pub fn new() -> Self {
        VariableRegistry {
            next: 1,
            locked: false,
        }
    }

    /// Allocates the next unused variable.
    ///
    /// # Panics
    ///
    /// Panics if the registry is locked.
    pub fn next_var(&mut self) -> usize {
        assert!(
            !self.locked,
            "variable allocation while the registry is locked"
        );
        let var = self.next;
        self.next += 1;
        var
    }

    /// The highest variable allocated so far (`0` if none).
    pub fn max_var(&self) -> usize {
        self.next - 1
    }

    /// Forbids further allocation; entered for the extraction phase.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Re-allows allocation; entered when encoding resumes.
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    /// `true` iff the registry is locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// The diagnostic name of a variable standing for `sig` at a grid
    /// coordinate. Used in log output and panic messages only.
    pub fn var_name(layer: usize, pos: usize, sig: &str) -> String {
        format!("{}@({},{})", sig, layer, pos)
    }

    /// Logs a freshly allocated variable under its diagnostic name.
    pub fn trace_var(var: usize, layer: usize, pos: usize, sig: &str) {
        trace!("VARMAP {} {}", var, Self::var_name(layer, pos, sig));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_allocation() {
        let mut r = VariableRegistry::new();
        assert_eq!(0, r.max_var());
        assert_eq!(1, r.next_var());
        assert_eq!(2, r.next_var());
        assert_eq!(3, r.next_var());
        assert_eq!(3, r.max_var());
    }

    #[test]
    fn test_lock_unlock() {
        let mut r = VariableRegistry::new();
        r.next_var();
        r.lock();
        assert!(r.is_locked());
        r.unlock();
        assert_eq!(2, r.next_var());
    }

    #[test]
    #[should_panic(expected = "locked")]
    fn test_allocation_while_locked_panics() {
        let mut r = VariableRegistry::new();
        r.lock();
        r.next_var();
    }

    #[test]
    fn test_var_name() {
        assert_eq!(
            "at(loc0)@(1,2)",
            VariableRegistry::var_name(1, 2, "at(loc0)")
        );
    }
}
