use super::operator::{Action, Reduction};
use super::signature::{Sig, USig};
use anyhow::{anyhow, Result};
use rustc_hash::{FxHashMap, FxHashSet};

/// The reserved name of the sentinel signature marking impossible children.
pub const NONE_NAME: &str = "__NONE___";
/// The reserved name of the per-position primitiveness variable.
pub const PRIMITIVE_NAME: &str = "__PRIMITIVE___";
/// The reserved name of the blank no-op action.
pub const BLANK_NAME: &str = "__BLANK___";
/// The reserved name of the decomposition tree's root item.
pub const ROOT_NAME: &str = "__ROOT___";

/// The static side of an HTN planning problem, as delivered by the parsing
/// and grounding stages.
///
/// The instance interns all symbolic names to non-negative integer ids,
/// stores the operator definitions keyed by their (possibly q-constant
/// carrying) signatures, and knows the domain of every q-constant.
///
/// # Example
///
/// ```
/// # use stratasat::{Action, HtnInstance, Sig, USig};
/// let mut htn = HtnInstance::new();
/// let at = htn.intern("at");
/// let loc0 = htn.intern("loc0");
/// let loc1 = htn.intern("loc1");
/// let mv = htn.intern("move");
/// htn.add_action(Action::new(
///     USig::new(mv, vec![loc0, loc1]),
///     vec![Sig::new(at, vec![loc0], false)],
///     vec![Sig::new(at, vec![loc0], true), Sig::new(at, vec![loc1], false)],
/// ));
/// assert_eq!("move(loc0,loc1)", htn.render(&USig::new(mv, vec![loc0, loc1])));
/// ```
#[derive(Default)]
pub struct HtnInstance {
    names: Vec<String>,
    name_ids: FxHashMap<String, usize>,
    q_constant_domains: FxHashMap<usize, Vec<usize>>,
    actions: FxHashMap<USig, Action>,
    reductions: FxHashMap<USig, Reduction>,
    rigid_predicates: FxHashSet<usize>,
    primitive_name_id: usize,
    blank_name_id: usize,
    root_name_id: usize,
}

impl HtnInstance {
    /// Builds an empty instance with the reserved names interned.
    pub fn new() -> Self {
        let mut htn = HtnInstance::default();
        let _none = htn.intern(NONE_NAME);
        debug_assert_eq!(_none, USig::none().name);
        htn.primitive_name_id = htn.intern(PRIMITIVE_NAME);
        htn.blank_name_id = htn.intern(BLANK_NAME);
        htn.root_name_id = htn.intern(ROOT_NAME);
        htn
    }

    /// Interns a name, returning its id.
    ///
    /// Interning the same name twice yields the same id.
    pub fn intern(&mut self, name: &str) -> usize {
        if let Some(id) = self.name_ids.get(name) {
            return *id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.name_ids.insert(name.to_string(), id);
        id
    }

    /// Returns the name behind an id.
    ///
    /// # Panics
    ///
    /// Panics if the id was never returned by [intern](Self::intern).
    pub fn name(&self, id: usize) -> &str {
        &self.names[id]
    }

    /// Returns the id of a previously interned name.
    pub fn name_id(&self, name: &str) -> Result<usize> {
        self.name_ids
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("no such name: {}", name))
    }

    /// The signature of the per-position primitiveness variable.
    pub fn primitive_sig(&self) -> USig {
        USig::new(self.primitive_name_id, Vec::new())
    }

    /// The signature of the blank no-op action.
    pub fn blank_sig(&self) -> USig {
        USig::new(self.blank_name_id, Vec::new())
    }

    /// The signature of the decomposition tree's root item.
    pub fn root_sig(&self) -> USig {
        USig::new(self.root_name_id, Vec::new())
    }

    /// Declares a fresh q-constant with the given domain of concrete
    /// constants.
    ///
    /// The domain order is preserved; substitution variables and plan
    /// decoding iterate it in this order.
    pub fn add_q_constant(&mut self, name: &str, domain: Vec<usize>) -> usize {
        let id = self.intern(name);
        debug_assert!(domain.iter().all(|c| *c < self.names.len()));
        self.q_constant_domains.insert(id, domain);
        id
    }

    /// Returns `true` if and only if the argument id is a q-constant.
    pub fn is_q_constant(&self, id: usize) -> bool {
        self.q_constant_domains.contains_key(&id)
    }

    /// The domain of a q-constant.
    ///
    /// # Panics
    ///
    /// Panics if the id is not a q-constant.
    pub fn domain_of(&self, q: usize) -> &[usize] {
        &self.q_constant_domains[&q]
    }

    /// Returns `true` if and only if the signature carries a q-constant
    /// argument.
    pub fn has_q_constants(&self, sig: &USig) -> bool {
        sig.args.iter().any(|a| self.is_q_constant(*a))
    }

    /// Registers an action under its signature.
    pub fn add_action(&mut self, action: Action) {
        self.actions.insert(action.sig.clone(), action);
    }

    /// Registers a reduction under its signature.
    pub fn add_reduction(&mut self, reduction: Reduction) {
        self.reductions.insert(reduction.sig.clone(), reduction);
    }

    /// Looks an action up by signature.
    pub fn action(&self, sig: &USig) -> Result<&Action> {
        self.actions
            .get(sig)
            .ok_or_else(|| anyhow!("no such action: {}", self.render(sig)))
    }

    /// Looks a reduction up by signature.
    pub fn reduction(&self, sig: &USig) -> Result<&Reduction> {
        self.reductions
            .get(sig)
            .ok_or_else(|| anyhow!("no such reduction: {}", self.render(sig)))
    }

    /// Returns `true` if and only if an action with this signature exists.
    pub fn has_action(&self, sig: &USig) -> bool {
        self.actions.contains_key(sig)
    }

    /// Returns `true` if and only if a reduction with this signature exists.
    pub fn has_reduction(&self, sig: &USig) -> bool {
        self.reductions.contains_key(sig)
    }

    /// Marks a predicate as rigid.
    ///
    /// Rigid predicates are fully determined by the initial state and are
    /// never encoded as SAT variables.
    pub fn set_rigid(&mut self, predicate: usize) {
        self.rigid_predicates.insert(predicate);
    }

    /// Returns `true` if and only if the predicate is rigid.
    pub fn is_rigid(&self, predicate: usize) -> bool {
        self.rigid_predicates.contains(&predicate)
    }

    /// Renders a signature as `name(arg,...)` for diagnostics and plan
    /// output.
    pub fn render(&self, sig: &USig) -> String {
        if sig.args.is_empty() {
            return self.name(sig.name).to_string();
        }
        let args: Vec<&str> = sig.args.iter().map(|a| self.name(*a)).collect();
        format!("{}({})", self.name(sig.name), args.join(","))
    }

    /// Renders a signed signature, prefixing `!` when negated.
    pub fn render_sig(&self, sig: &Sig) -> String {
        if sig.negated {
            format!("!{}", self.render(&sig.usig))
        } else {
            self.render(&sig.usig)
        }
    }
}
