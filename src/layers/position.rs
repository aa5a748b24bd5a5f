use super::path_tree::PathTree;
use crate::htn::{OccSig, Sig, Substitution, TypeConstraint, USig};
use rustc_hash::{FxHashMap, FxHashSet};

/// The two variable namespaces of a position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarKind {
    /// Fact variables, keyed by unsigned fact signatures.
    Fact,
    /// Operator variables, keyed by operator signatures.
    Op,
}

/// A variable table entry: the SAT variable and the position index at which
/// it was first introduced.
///
/// The introduction index travels with the variable when it is reused by a
/// later position, which is how re-emission of propagation clauses is
/// detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VarEntry {
    /// The SAT variable.
    pub var: usize,
    /// The position index where the variable was allocated.
    pub first_pos: usize,
}

type SupportMap = FxHashMap<USig, FxHashSet<USig>>;
type IndirectSupportMap = FxHashMap<USig, FxHashMap<USig, PathTree>>;

/// A single time step within a layer.
///
/// A position is created empty, populated by the fact-analysis stage with
/// candidate operators, facts and their supporting relationships, then
/// encoded exactly once. After the encoding frontier has moved past it,
/// [clear_unneeded](Self::clear_unneeded) drops every table that cannot
/// influence a later position; the variable tables survive until plan
/// decoding.
#[derive(Default)]
pub struct Position {
    layer_idx: usize,
    pos: usize,

    actions: FxHashSet<USig>,
    reductions: FxHashSet<USig>,
    axiomatic_ops: FxHashSet<USig>,

    facts: FxHashSet<USig>,
    true_facts: FxHashSet<USig>,
    false_facts: FxHashSet<USig>,

    qfacts: FxHashSet<USig>,
    qfacts_by_predicate: FxHashMap<usize, FxHashSet<USig>>,
    pos_qfact_decodings: FxHashMap<USig, FxHashSet<USig>>,
    neg_qfact_decodings: FxHashMap<USig, FxHashSet<USig>>,

    pos_fact_supports: SupportMap,
    neg_fact_supports: SupportMap,
    pos_indirect_supports: IndirectSupportMap,
    neg_indirect_supports: IndirectSupportMap,

    q_constant_type_constraints: FxHashMap<USig, Vec<TypeConstraint>>,
    forbidden_substitutions: FxHashSet<Substitution>,

    expansions: FxHashMap<OccSig, FxHashSet<USig>>,
    expansion_substitutions: FxHashMap<USig, FxHashMap<USig, Substitution>>,
    predecessors: FxHashMap<usize, FxHashSet<USig>>,
    max_expansion_size: usize,

    op_variables: FxHashMap<USig, VarEntry>,
    fact_variables: FxHashMap<USig, VarEntry>,

    has_primitive_ops: bool,
    has_nonprimitive_ops: bool,
}

impl Position {
    /// Builds an empty position at the given grid coordinates.
    pub fn new(layer_idx: usize, pos: usize) -> Self {
        Position {
            layer_idx,
            pos,
            max_expansion_size: 1,
            ..Position::default()
        }
    }

    /// The index of the layer owning this position.
    pub fn layer_index(&self) -> usize {
        self.layer_idx
    }

    /// The index of this position within its layer.
    pub fn position_index(&self) -> usize {
        self.pos
    }

    // Candidate operators

    /// Adds a candidate action.
    pub fn add_action(&mut self, action: USig) {
        self.actions.insert(action);
    }

    /// Removes a candidate action.
    pub fn remove_action(&mut self, action: &USig) {
        self.actions.remove(action);
    }

    /// Returns `true` iff the signature is a candidate action here.
    pub fn has_action(&self, action: &USig) -> bool {
        self.actions.contains(action)
    }

    /// Iterates over the candidate actions.
    pub fn actions(&self) -> impl Iterator<Item = &USig> + '_ {
        self.actions.iter()
    }

    /// Adds a candidate reduction.
    pub fn add_reduction(&mut self, reduction: USig) {
        self.reductions.insert(reduction);
    }

    /// Removes a candidate reduction.
    pub fn remove_reduction(&mut self, reduction: &USig) {
        self.reductions.remove(reduction);
    }

    /// Returns `true` iff the signature is a candidate reduction here.
    pub fn has_reduction(&self, reduction: &USig) -> bool {
        self.reductions.contains(reduction)
    }

    /// Iterates over the candidate reductions.
    pub fn reductions(&self) -> impl Iterator<Item = &USig> + '_ {
        self.reductions.iter()
    }

    /// Marks an operator as axiomatic: the top-level task network asserts
    /// that one of the axiomatic operators is chosen.
    pub fn add_axiomatic_op(&mut self, op: USig) {
        self.axiomatic_ops.insert(op);
    }

    /// Iterates over the axiomatic operators.
    pub fn axiomatic_ops(&self) -> impl Iterator<Item = &USig> + '_ {
        self.axiomatic_ops.iter()
    }

    // Facts

    /// Registers a fact as possibly occurring at this position.
    pub fn add_fact(&mut self, fact: USig) {
        self.facts.insert(fact);
    }

    /// Registers a fact that must hold here.
    pub fn add_true_fact(&mut self, fact: USig) {
        self.facts.insert(fact.clone());
        self.true_facts.insert(fact);
    }

    /// Registers a fact that must not hold here.
    pub fn add_false_fact(&mut self, fact: USig) {
        self.facts.insert(fact.clone());
        self.false_facts.insert(fact);
    }

    /// Returns `true` iff the fact occurs at this position.
    pub fn has_fact(&self, fact: &USig) -> bool {
        self.facts.contains(fact)
    }

    /// Iterates over all facts occurring here.
    pub fn facts(&self) -> impl Iterator<Item = &USig> + '_ {
        self.facts.iter()
    }

    /// The facts that must hold here.
    pub fn true_facts(&self) -> impl Iterator<Item = &USig> + '_ {
        self.true_facts.iter()
    }

    /// Returns `true` iff the fact is asserted true here.
    pub fn has_true_fact(&self, fact: &USig) -> bool {
        self.true_facts.contains(fact)
    }

    /// The facts that must not hold here.
    pub fn false_facts(&self) -> impl Iterator<Item = &USig> + '_ {
        self.false_facts.iter()
    }

    /// Returns `true` iff the fact is asserted false here.
    pub fn has_false_fact(&self, fact: &USig) -> bool {
        self.false_facts.contains(fact)
    }

    // Q-facts and their decodings

    /// Registers a q-fact (a fact signature carrying q-constants).
    pub fn add_qfact(&mut self, qfact: USig) {
        self.facts.insert(qfact.clone());
        self.qfacts_by_predicate
            .entry(qfact.name)
            .or_default()
            .insert(qfact.clone());
        self.qfacts.insert(qfact);
    }

    /// Returns `true` iff the signature is a q-fact here.
    pub fn has_qfact(&self, qfact: &USig) -> bool {
        self.qfacts.contains(qfact)
    }

    /// Iterates over the q-facts.
    pub fn qfacts(&self) -> impl Iterator<Item = &USig> + '_ {
        self.qfacts.iter()
    }

    /// The q-facts sharing the given predicate name, if any.
    pub fn qfacts_with_predicate(&self, predicate: usize) -> Option<&FxHashSet<USig>> {
        self.qfacts_by_predicate.get(&predicate)
    }

    /// Adds a possibly valid decoding of a q-fact.
    pub fn add_qfact_decoding(&mut self, qfact: USig, decoded: USig, negated: bool) {
        let decodings = if negated {
            &mut self.neg_qfact_decodings
        } else {
            &mut self.pos_qfact_decodings
        };
        decodings.entry(qfact).or_default().insert(decoded);
    }

    /// Removes a decoding invalidated by the substitution-legality stage.
    pub fn remove_qfact_decoding(&mut self, qfact: &USig, decoded: &USig, negated: bool) {
        let decodings = if negated {
            &mut self.neg_qfact_decodings
        } else {
            &mut self.pos_qfact_decodings
        };
        if let Some(set) = decodings.get_mut(qfact) {
            set.remove(decoded);
        }
    }

    /// The decodings of a q-fact for the given polarity.
    pub fn qfact_decodings(&self, qfact: &USig, negated: bool) -> Option<&FxHashSet<USig>> {
        if negated {
            self.neg_qfact_decodings.get(qfact)
        } else {
            self.pos_qfact_decodings.get(qfact)
        }
    }

    /// Returns `true` iff the q-fact has decodings of the given polarity.
    pub fn has_qfact_decodings(&self, qfact: &USig, negated: bool) -> bool {
        self.qfact_decodings(qfact, negated)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }

    // Fact supports

    /// Records that the operator may cause the signed fact at this position.
    pub fn add_fact_support(&mut self, fact: &Sig, op: USig) {
        let supports = if fact.negated {
            &mut self.neg_fact_supports
        } else {
            &mut self.pos_fact_supports
        };
        supports.entry(fact.usig.clone()).or_default().insert(op);
    }

    /// The operators directly supporting a fact of the given polarity.
    pub fn fact_supports(&self, fact: &USig, negated: bool) -> Option<&FxHashSet<USig>> {
        if negated {
            self.neg_fact_supports.get(fact)
        } else {
            self.pos_fact_supports.get(fact)
        }
    }

    /// Returns `true` iff the fact has direct support of the given polarity.
    pub fn has_fact_support(&self, fact: &USig, negated: bool) -> bool {
        self.fact_supports(fact, negated)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }

    /// Records that the operator may cause the fact through a q-fact
    /// abstraction, under any of the substitution paths.
    pub fn add_indirect_fact_support(
        &mut self,
        fact: &USig,
        negated: bool,
        op: USig,
        path: &[(usize, usize)],
    ) {
        let supports = if negated {
            &mut self.neg_indirect_supports
        } else {
            &mut self.pos_indirect_supports
        };
        supports
            .entry(fact.clone())
            .or_default()
            .entry(op)
            .or_default()
            .insert(path);
    }

    /// The indirect supporters of a fact, with their substitution trees.
    pub fn indirect_fact_supports(
        &self,
        fact: &USig,
        negated: bool,
    ) -> Option<&FxHashMap<USig, PathTree>> {
        if negated {
            self.neg_indirect_supports.get(fact)
        } else {
            self.pos_indirect_supports.get(fact)
        }
    }

    /// Returns `true` iff the fact has indirect support of the polarity.
    pub fn has_indirect_fact_support(&self, fact: &USig, negated: bool) -> bool {
        self.indirect_fact_supports(fact, negated)
            .map(|m| !m.is_empty())
            .unwrap_or(false)
    }

    // Q-constant constraints

    /// Attaches a type constraint to an operator candidate.
    pub fn add_q_constant_type_constraint(&mut self, op: USig, constraint: TypeConstraint) {
        self.q_constant_type_constraints
            .entry(op)
            .or_default()
            .push(constraint);
    }

    /// Iterates over the per-operator type constraints.
    pub fn q_constant_type_constraints(
        &self,
    ) -> impl Iterator<Item = (&USig, &Vec<TypeConstraint>)> + '_ {
        self.q_constant_type_constraints.iter()
    }

    /// Forbids a substitution tuple.
    pub fn add_forbidden_substitution(&mut self, s: Substitution) {
        self.forbidden_substitutions.insert(s);
    }

    /// Iterates over the forbidden substitution tuples.
    pub fn forbidden_substitutions(&self) -> impl Iterator<Item = &Substitution> + '_ {
        self.forbidden_substitutions.iter()
    }

    // Expansions

    /// Links a parent operator occurrence (at the layer above) to one of
    /// its candidate children here.
    ///
    /// A `NONE` child marks the parent as impossible.
    pub fn add_expansion(&mut self, parent: OccSig, child: USig) {
        self.expansions.entry(parent).or_default().insert(child);
    }

    /// Iterates over the parent-to-children expansion sets.
    pub fn expansions(&self) -> impl Iterator<Item = (&OccSig, &FxHashSet<USig>)> + '_ {
        self.expansions.iter()
    }

    /// Records the substitution renaming a parent's arguments into a
    /// child's.
    pub fn add_expansion_substitution(&mut self, parent: USig, child: USig, s: Substitution) {
        self.expansion_substitutions
            .entry(parent)
            .or_default()
            .insert(child, s);
    }

    /// The substitution attached to a parent/child expansion edge.
    pub fn expansion_substitution(&self, parent: &USig, child: &USig) -> Option<&Substitution> {
        self.expansion_substitutions
            .get(parent)
            .and_then(|m| m.get(child))
    }

    /// Records a parent of a child occurrence, keyed by the child's unique
    /// occurrence id.
    pub fn add_predecessor(&mut self, child_uid: usize, parent: USig) {
        self.predecessors.entry(child_uid).or_default().insert(parent);
    }

    /// The parents of a child occurrence.
    pub fn predecessors_of(&self, child_uid: usize) -> Option<&FxHashSet<USig>> {
        self.predecessors.get(&child_uid)
    }

    /// Widens the maximum number of child positions a parent here expands
    /// into.
    pub fn add_expansion_size(&mut self, size: usize) {
        self.max_expansion_size = self.max_expansion_size.max(size);
    }

    /// The maximum expansion size registered so far.
    pub fn max_expansion_size(&self) -> usize {
        self.max_expansion_size
    }

    // Flags

    /// Sets whether primitive operators (actions, trivial reductions)
    /// occur here.
    pub fn set_has_primitive_ops(&mut self, has: bool) {
        self.has_primitive_ops = has;
    }

    /// Whether primitive operators occur here.
    pub fn has_primitive_ops(&self) -> bool {
        self.has_primitive_ops
    }

    /// Sets whether non-primitive operators occur here.
    pub fn set_has_nonprimitive_ops(&mut self, has: bool) {
        self.has_nonprimitive_ops = has;
    }

    /// Whether non-primitive operators occur here.
    pub fn has_nonprimitive_ops(&self) -> bool {
        self.has_nonprimitive_ops
    }

    // Variable tables

    fn table(&self, kind: VarKind) -> &FxHashMap<USig, VarEntry> {
        match kind {
            VarKind::Fact => &self.fact_variables,
            VarKind::Op => &self.op_variables,
        }
    }

    fn table_mut(&mut self, kind: VarKind) -> &mut FxHashMap<USig, VarEntry> {
        match kind {
            VarKind::Fact => &mut self.fact_variables,
            VarKind::Op => &mut self.op_variables,
        }
    }

    /// Records a freshly allocated or reused variable for a signature.
    ///
    /// `first_pos` is the position index at which the variable was
    /// originally allocated; for a fresh variable it equals this position's
    /// index.
    ///
    /// # Panics
    ///
    /// Panics if the signature already has a variable: variables are stable
    /// once assigned.
    pub fn set_variable(&mut self, kind: VarKind, sig: &USig, var: usize, first_pos: usize) {
        let (layer_idx, pos) = (self.layer_idx, self.pos);
        let prev = self
            .table_mut(kind)
            .insert(sig.clone(), VarEntry { var, first_pos });
        assert!(
            prev.is_none(),
            "variable for {:?} {:?} at ({},{}) assigned twice",
            kind,
            sig,
            layer_idx,
            pos,
        );
    }

    /// Returns `true` iff the signature has a variable here.
    pub fn has_variable(&self, kind: VarKind, sig: &USig) -> bool {
        self.table(kind).contains_key(sig)
    }

    /// The variable of a signature.
    ///
    /// # Panics
    ///
    /// Panics if no variable exists; this is a programming error in the
    /// encoder or the stage feeding it.
    pub fn variable(&self, kind: VarKind, sig: &USig) -> usize {
        match self.table(kind).get(sig) {
            Some(e) => e.var,
            None => panic!(
                "unknown {:?} variable {:?} queried at ({},{})",
                kind, sig, self.layer_idx, self.pos
            ),
        }
    }

    /// The variable of a signature, or `None` if it has none.
    pub fn variable_opt(&self, kind: VarKind, sig: &USig) -> Option<usize> {
        self.table(kind).get(sig).map(|e| e.var)
    }

    /// The position index at which a signature's variable was introduced.
    pub fn first_pos_of_variable(&self, kind: VarKind, sig: &USig) -> Option<usize> {
        self.table(kind).get(sig).map(|e| e.first_pos)
    }

    /// Forgets the variable of a signature.
    pub fn remove_variable(&mut self, kind: VarKind, sig: &USig) {
        self.table_mut(kind).remove(sig);
    }

    /// The number of variables of a kind, for diagnostics.
    pub fn num_variables(&self, kind: VarKind) -> usize {
        self.table(kind).len()
    }

    /// Drops every table that only served the encoding of this position.
    ///
    /// Retained: candidate operators, true facts and both variable tables,
    /// all of which later positions and the plan decoder read.
    pub fn clear_unneeded(&mut self) {
        self.axiomatic_ops = FxHashSet::default();
        self.facts = FxHashSet::default();
        self.false_facts = FxHashSet::default();
        self.qfacts = FxHashSet::default();
        self.qfacts_by_predicate = FxHashMap::default();
        self.pos_qfact_decodings = FxHashMap::default();
        self.neg_qfact_decodings = FxHashMap::default();
        self.pos_fact_supports = FxHashMap::default();
        self.neg_fact_supports = FxHashMap::default();
        self.pos_indirect_supports = FxHashMap::default();
        self.neg_indirect_supports = FxHashMap::default();
        self.q_constant_type_constraints = FxHashMap::default();
        self.forbidden_substitutions = FxHashSet::default();
        self.expansions = FxHashMap::default();
        self.expansion_substitutions = FxHashMap::default();
        self.predecessors = FxHashMap::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(name: usize) -> USig {
        USig::new(name, vec![])
    }

    #[test]
    fn test_variable_stability() {
        let mut p = Position::new(0, 3);
        let s = sig(5);
        p.set_variable(VarKind::Fact, &s, 17, 3);
        assert!(p.has_variable(VarKind::Fact, &s));
        assert_eq!(17, p.variable(VarKind::Fact, &s));
        assert_eq!(Some(17), p.variable_opt(VarKind::Fact, &s));
        assert_eq!(Some(3), p.first_pos_of_variable(VarKind::Fact, &s));
        // same signature in the other namespace is a distinct variable
        assert!(!p.has_variable(VarKind::Op, &s));
    }

    #[test]
    #[should_panic(expected = "assigned twice")]
    fn test_variable_reassignment_panics() {
        let mut p = Position::new(0, 0);
        p.set_variable(VarKind::Op, &sig(1), 2, 0);
        p.set_variable(VarKind::Op, &sig(1), 3, 0);
    }

    #[test]
    #[should_panic(expected = "unknown")]
    fn test_unknown_variable_panics() {
        let p = Position::new(1, 2);
        p.variable(VarKind::Fact, &sig(9));
    }

    #[test]
    fn test_reused_variable_keeps_first_pos() {
        let mut p = Position::new(0, 4);
        p.set_variable(VarKind::Fact, &sig(1), 8, 2);
        assert_eq!(Some(2), p.first_pos_of_variable(VarKind::Fact, &sig(1)));
    }

    #[test]
    fn test_fact_sets() {
        let mut p = Position::new(0, 0);
        p.add_true_fact(sig(1));
        p.add_false_fact(sig(2));
        p.add_fact(sig(3));
        assert!(p.has_fact(&sig(1)));
        assert!(p.has_fact(&sig(2)));
        assert!(p.has_true_fact(&sig(1)));
        assert!(p.has_false_fact(&sig(2)));
        assert!(!p.has_true_fact(&sig(3)));
        assert_eq!(3, p.facts().count());
    }

    #[test]
    fn test_supports() {
        let mut p = Position::new(0, 1);
        let f = Sig::new(1, vec![], false);
        p.add_fact_support(&f, sig(7));
        assert!(p.has_fact_support(&sig(1), false));
        assert!(!p.has_fact_support(&sig(1), true));
        assert!(p.fact_supports(&sig(1), false).unwrap().contains(&sig(7)));
    }

    #[test]
    fn test_indirect_supports() {
        let mut p = Position::new(0, 1);
        p.add_indirect_fact_support(&sig(1), false, sig(7), &[(10, 20)]);
        p.add_indirect_fact_support(&sig(1), false, sig(7), &[(10, 21)]);
        let tree = &p.indirect_fact_supports(&sig(1), false).unwrap()[&sig(7)];
        assert_eq!(2, tree.paths().len());
        assert!(p.has_indirect_fact_support(&sig(1), false));
        assert!(!p.has_indirect_fact_support(&sig(1), true));
    }

    #[test]
    fn test_qfact_index() {
        let mut p = Position::new(0, 0);
        let qf = USig::new(4, vec![100]);
        p.add_qfact(qf.clone());
        p.add_qfact_decoding(qf.clone(), sig(4), false);
        assert!(p.has_qfact(&qf));
        assert!(p.qfacts_with_predicate(4).unwrap().contains(&qf));
        assert!(p.has_qfact_decodings(&qf, false));
        assert!(!p.has_qfact_decodings(&qf, true));
        p.remove_qfact_decoding(&qf, &sig(4), false);
        assert!(!p.has_qfact_decodings(&qf, false));
    }

    #[test]
    fn test_expansions_and_predecessors() {
        let mut p = Position::new(1, 0);
        let parent = OccSig::new(sig(9), 0);
        p.add_expansion(parent.clone(), sig(5));
        p.add_expansion(parent.clone(), sig(6));
        p.add_predecessor(3, sig(9));
        assert_eq!(1, p.expansions().count());
        assert_eq!(2, p.expansions().next().unwrap().1.len());
        assert!(p.predecessors_of(3).unwrap().contains(&sig(9)));
        assert!(p.predecessors_of(4).is_none());
    }

    #[test]
    fn test_expansion_substitutions() {
        let mut p = Position::new(1, 0);
        let mut s = Substitution::default();
        s.insert(10, 20).unwrap();
        p.add_expansion_substitution(sig(9), sig(5), s.clone());
        assert_eq!(Some(&s), p.expansion_substitution(&sig(9), &sig(5)));
        assert!(p.expansion_substitution(&sig(9), &sig(6)).is_none());
    }

    #[test]
    fn test_clear_unneeded_retains_variables() {
        let mut p = Position::new(0, 0);
        p.add_action(sig(1));
        p.add_true_fact(sig(2));
        p.add_fact_support(&Sig::new(2, vec![], false), sig(1));
        p.set_variable(VarKind::Op, &sig(1), 1, 0);
        p.set_variable(VarKind::Fact, &sig(2), 2, 0);
        p.clear_unneeded();
        assert!(p.has_action(&sig(1)));
        assert!(p.has_true_fact(&sig(2)));
        assert_eq!(1, p.variable(VarKind::Op, &sig(1)));
        assert_eq!(2, p.variable(VarKind::Fact, &sig(2)));
        assert!(!p.has_fact_support(&sig(2), false));
        assert!(!p.has_fact(&sig(2)));
    }

    #[test]
    fn test_expansion_size() {
        let mut p = Position::new(0, 0);
        assert_eq!(1, p.max_expansion_size());
        p.add_expansion_size(3);
        p.add_expansion_size(2);
        assert_eq!(3, p.max_expansion_size());
    }
}
