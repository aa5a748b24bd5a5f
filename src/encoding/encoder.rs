use super::driver::SatDriver;
use super::dnf::DnfBuffer;
use super::options::EncodingOptions;
use super::registry::VariableRegistry;
use crate::htn::{HtnInstance, Sig, Substitution, USig};
use crate::layers::{Layer, Position, VarKind};
use crate::plan::{Plan, PlanDecoder};
use crate::sat::{default_solver, Assignment, CnfWriter, SatSolver, SolvingResult};
use log::{debug, info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use std::io;

/// The layered CNF encoding of an HTN planning problem.
///
/// The encoding owns the layer grid, the variable registry and the SAT
/// driver. The fact-analysis stage populates positions through
/// [layer_mut](Self::layer_mut); [encode](Self::encode) then walks each
/// position once, left to right and top layer down, emitting its clauses
/// incrementally. [solve](Self::solve) runs the backend under the
/// primitiveness assumptions of the deepest layer; on success
/// [extract_plan](Self::extract_plan) turns the model into a plan.
///
/// # Example
///
/// ```
/// # use stratasat::{Encoding, EncodingOptions, HtnInstance, Layer};
/// let htn = HtnInstance::new();
/// let mut enc = Encoding::new(&htn, EncodingOptions::default());
/// enc.push_layer(Layer::new(0, 1));
/// enc.encode(0, 0);
/// enc.add_assumptions(0, false);
/// assert!(enc.solve().is_satisfiable());
/// ```
pub struct Encoding<'a> {
    htn: &'a HtnInstance,
    options: EncodingOptions,
    layers: Vec<Layer>,
    vars: VariableRegistry,
    sat: SatDriver,
    frontier: Option<(usize, usize)>,
    seen_q_constants: FxHashSet<usize>,
    substitution_vars: FxHashMap<(usize, usize), usize>,
    q_equality_vars: FxHashMap<(usize, usize), usize>,
    emitted_forbidden: FxHashSet<Substitution>,
    propagation_links: FxHashSet<(usize, usize)>,
    dnf: DnfBuffer,
}

impl<'a> Encoding<'a> {
    /// Builds an encoding over the default SAT backend.
    pub fn new(htn: &'a HtnInstance, options: EncodingOptions) -> Self {
        Self::new_with_solver(htn, options, default_solver())
    }

    /// Builds an encoding over a caller-provided SAT backend.
    pub fn new_with_solver(
        htn: &'a HtnInstance,
        options: EncodingOptions,
        solver: Box<dyn SatSolver>,
    ) -> Self {
        let mirror = options.cnf_output.as_deref().map(CnfWriter::new);
        Encoding {
            htn,
            options,
            layers: Vec::new(),
            vars: VariableRegistry::new(),
            sat: SatDriver::new(solver, mirror),
            frontier: None,
            seen_q_constants: FxHashSet::default(),
            substitution_vars: FxHashMap::default(),
            q_equality_vars: FxHashMap::default(),
            emitted_forbidden: FxHashSet::default(),
            propagation_links: FxHashSet::default(),
            dnf: DnfBuffer::default(),
        }
    }

    /// Appends a refinement layer, returning its index.
    pub fn push_layer(&mut self, layer: Layer) -> usize {
        assert_eq!(
            layer.index(),
            self.layers.len(),
            "layer indices must be contiguous"
        );
        self.layers.push(layer);
        self.layers.len() - 1
    }

    /// The number of layers.
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// A shared view of a layer.
    pub fn layer(&self, idx: usize) -> &Layer {
        &self.layers[idx]
    }

    /// A mutable view of a layer, for the fact-analysis stage.
    pub fn layer_mut(&mut self, idx: usize) -> &mut Layer {
        &mut self.layers[idx]
    }

    /// The substitution variable standing for `q == c`, if it exists.
    pub fn substitution_variable(&self, q: usize, c: usize) -> Option<usize> {
        self.substitution_vars.get(&(q, c)).copied()
    }

    /// The number of clauses emitted so far.
    pub fn n_clauses(&self) -> usize {
        self.sat.n_clauses()
    }

    /// Adds a permanent unit constraint.
    pub fn add_unit_constraint(&mut self, lit: isize) {
        self.sat.add_unit(lit);
    }

    /// Installs a callback polled by the solver; returning `true` aborts
    /// the running solve call with [SolvingResult::Unknown].
    pub fn set_terminate(&mut self, callback: Box<dyn Fn() -> bool>) {
        self.sat.set_terminate(callback);
    }

    /// Encodes one position against its left neighbor and its parent above.
    ///
    /// Positions must be encoded in strictly increasing order within a
    /// layer, and layers in strictly increasing order.
    ///
    /// # Panics
    ///
    /// Panics on out-of-order calls and on malformed position data; both
    /// are programming errors in the caller or the stage feeding it.
    pub fn encode(&mut self, layer_idx: usize, pos: usize) {
        debug!("encoding position ({},{})", layer_idx, pos);
        if let Some((fl, fp)) = self.frontier {
            assert!(
                layer_idx > fl || (layer_idx == fl && pos > fp),
                "encode called out of order: ({},{}) after ({},{})",
                layer_idx,
                pos,
                fl,
                fp
            );
        }
        self.frontier = Some((layer_idx, pos));

        let Encoding {
            htn,
            options,
            layers,
            vars,
            sat,
            seen_q_constants,
            substitution_vars,
            q_equality_vars,
            emitted_forbidden,
            propagation_links,
            dnf,
            ..
        } = self;
        let htn: &HtnInstance = *htn;

        let (earlier, current) = layers.split_at_mut(layer_idx);
        let layer = &mut current[0];
        let layer_size = layer.size();
        let (old_pos, offset, above) = if layer_idx > 0 {
            let above_layer = &earlier[layer_idx - 1];
            let (op, off) = above_layer.parent_of(pos);
            (op, off, Some(above_layer.at(op)))
        } else {
            (0, 0, None)
        };
        let (cur, left) = layer.position_with_left(pos);

        let mut ctx = Ctx {
            htn,
            vars,
            sat,
            seen_q_constants,
            substitution_vars,
            q_equality_vars,
            emitted_forbidden,
            propagation_links,
            dnf,
        };

        // The per-position primitiveness variable is referenced by the frame
        // axioms of the next position, so it exists for every position.
        let prim_sig = htn.primitive_sig();
        let prim_var = {
            let v = ctx.vars.next_var();
            cur.set_variable(VarKind::Op, &prim_sig, v, pos);
            v as isize
        };

        // (a) fact variables, reuse, and the true/false units
        let mut ground_facts = Vec::new();
        let mut qfacts = Vec::new();
        for f in cur.facts() {
            if htn.has_q_constants(f) {
                qfacts.push(f.clone());
            } else {
                ground_facts.push(f.clone());
            }
        }
        encode_fact_variables(
            &mut ctx,
            cur,
            left,
            pos,
            options.reuse_fact_variables,
            &ground_facts,
            &qfacts,
        );
        for tf in cur.true_facts() {
            let v = cur.variable(VarKind::Fact, tf) as isize;
            ctx.sat.add_unit(v);
        }
        for ff in cur.false_facts() {
            let v = cur.variable(VarKind::Fact, ff) as isize;
            ctx.sat.add_unit(-v);
        }

        // operator variables and the primitive/non-primitive flags
        let action_sigs: Vec<USig> = cur.actions().cloned().collect();
        let reduction_sigs: Vec<USig> = cur.reductions().cloned().collect();
        let mut actions: Vec<(USig, isize)> = Vec::with_capacity(action_sigs.len());
        let mut reductions: Vec<(USig, isize, bool)> = Vec::with_capacity(reduction_sigs.len());
        for a in action_sigs {
            debug_assert!(!a.is_none(), "NONE is not a candidate operator");
            let v = ctx.vars.next_var();
            cur.set_variable(VarKind::Op, &a, v, pos);
            VariableRegistry::trace_var(v, layer_idx, pos, &htn.render(&a));
            actions.push((a, v as isize));
        }
        for r in reduction_sigs {
            debug_assert!(!r.is_none(), "NONE is not a candidate operator");
            let trivial = htn
                .reduction(&r)
                .unwrap_or_else(|e| panic!("{}", e))
                .is_trivial();
            let v = ctx.vars.next_var();
            cur.set_variable(VarKind::Op, &r, v, pos);
            VariableRegistry::trace_var(v, layer_idx, pos, &htn.render(&r));
            reductions.push((r, v as isize, trivial));
        }
        assert!(
            !actions.is_empty() || !reductions.is_empty() || pos + 1 == layer_size,
            "no operations to encode at ({},{})",
            layer_idx,
            pos
        );
        cur.set_has_primitive_ops(
            !actions.is_empty() || reductions.iter().any(|(_, _, trivial)| *trivial),
        );
        cur.set_has_nonprimitive_ops(reductions.iter().any(|(_, _, trivial)| !*trivial));

        let cur: &Position = cur;

        // (b) substitution variables for newly seen q-constants
        for (sig, var) in actions
            .iter()
            .map(|(s, v)| (s, *v))
            .chain(reductions.iter().map(|(s, v, _)| (s, *v)))
        {
            encode_substitution_vars(&mut ctx, sig, var);
        }

        // (c) q-fact semantics
        for qf in &qfacts {
            encode_qfact_semantics(&mut ctx, cur, qf);
        }

        // (d) vertical propagation from the parent position
        if offset == 0 {
            if let Some(above) = above {
                for f in &ground_facts {
                    if let Some(a_var) = above.variable_opt(VarKind::Fact, f) {
                        let p_var = cur.variable(VarKind::Fact, f);
                        if ctx.propagation_links.insert((a_var, p_var)) {
                            ctx.sat.add(&[-(a_var as isize), p_var as isize]);
                            ctx.sat.add(&[a_var as isize, -(p_var as isize)]);
                        }
                    }
                }
            }
        }

        // (e) frame axioms
        if let Some(left) = left {
            if !ground_facts.is_empty() {
                let prim_left = left.variable(VarKind::Op, &prim_sig) as isize;
                for f in &ground_facts {
                    encode_frame_axioms(&mut ctx, cur, left, f, prim_left);
                }
            }
        }

        // (f) effects of the operators at the left position
        if let Some(left) = left {
            for a in left.actions() {
                if a.is_none() {
                    continue;
                }
                let op_var = left.variable(VarKind::Op, a) as isize;
                let def = htn.action(a).unwrap_or_else(|e| panic!("{}", e));
                encode_left_op_effects(&mut ctx, cur, op_var, &def.effects);
            }
            for r in left.reductions() {
                if r.is_none() {
                    continue;
                }
                let def = htn.reduction(r).unwrap_or_else(|e| panic!("{}", e));
                if !def.is_trivial() || def.effects.is_empty() {
                    continue;
                }
                let op_var = left.variable(VarKind::Op, r) as isize;
                encode_left_op_effects(&mut ctx, cur, op_var, &def.effects);
            }
        }

        // (g) action constraints
        for (sig, var) in &actions {
            ctx.sat.add(&[-var, prim_var]);
            let def = htn.action(sig).unwrap_or_else(|e| panic!("{}", e));
            encode_preconditions(&mut ctx, cur, *var, &def.preconditions);
        }
        for i in 0..actions.len() {
            for j in i + 1..actions.len() {
                let (a, b) = (actions[i].1, actions[j].1);
                let (lo, hi) = if a < b { (a, b) } else { (b, a) };
                ctx.sat.add(&[-lo, -hi]);
            }
        }

        // (h) reduction constraints
        for (sig, var, trivial) in &reductions {
            let def = htn.reduction(sig).unwrap_or_else(|e| panic!("{}", e));
            encode_preconditions(&mut ctx, cur, *var, &def.preconditions);
            if *trivial {
                ctx.sat.add(&[-var, prim_var]);
                for (_, a_var) in &actions {
                    let (lo, hi) = if var < a_var { (*var, *a_var) } else { (*a_var, *var) };
                    ctx.sat.add(&[-lo, -hi]);
                }
            } else {
                ctx.sat.add(&[-var, -prim_var]);
            }
        }
        if reductions.len() <= options.at_most_one_reductions_cutoff {
            for i in 0..reductions.len() {
                for j in i + 1..reductions.len() {
                    let (a, b) = (reductions[i].1, reductions[j].1);
                    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
                    ctx.sat.add(&[-lo, -hi]);
                }
            }
        } else {
            warn!(
                "skipping at-most-one clauses over {} reductions at ({},{})",
                reductions.len(),
                layer_idx,
                pos
            );
        }

        // (i) q-constant type constraints and forbidden substitutions
        for (op, constraints) in cur.q_constant_type_constraints() {
            let op_var = cur.variable(VarKind::Op, op) as isize;
            for tc in constraints {
                if tc.sign {
                    ctx.sat.append(-op_var);
                    for c in &tc.constants {
                        let sv = ctx.substitution_var(tc.q_constant, *c) as isize;
                        ctx.sat.append(sv);
                    }
                    ctx.sat.end();
                } else {
                    for c in &tc.constants {
                        let sv = ctx.substitution_var(tc.q_constant, *c) as isize;
                        ctx.sat.add(&[-op_var, -sv]);
                    }
                }
            }
        }
        for s in cur.forbidden_substitutions() {
            if !ctx.emitted_forbidden.insert(s.clone()) {
                continue;
            }
            debug_assert!(!s.is_empty(), "empty forbidden substitution");
            for (q, c) in s.iter() {
                let sv = ctx.substitution_var(q, c) as isize;
                ctx.sat.append(-sv);
            }
            ctx.sat.end();
        }

        // (j) expansions and forbidden parents
        for (parent, children) in cur.expansions() {
            let above = above.expect("expansions listed at the topmost layer");
            let parent_var = above.variable(VarKind::Op, &parent.usig) as isize;
            if children.iter().any(|c| c.is_none()) {
                ctx.sat.add_unit(-parent_var);
                continue;
            }
            ctx.sat.append(-parent_var);
            for child in children {
                ctx.sat.append(cur.variable(VarKind::Op, child) as isize);
            }
            ctx.sat.end();
        }

        // (k) choice of axiomatic operators
        let axiomatic: Vec<isize> = cur
            .axiomatic_ops()
            .map(|op| cur.variable(VarKind::Op, op) as isize)
            .collect();
        if !axiomatic.is_empty() {
            ctx.sat.add(&axiomatic);
        }

        // prune the structures no future position can reference
        if pos >= 2 {
            self.layers[layer_idx].at_mut(pos - 2).clear_unneeded();
        }
        if layer_idx > 0 && offset == 0 && old_pos >= 1 {
            self.layers[layer_idx - 1]
                .at_mut(old_pos - 1)
                .clear_unneeded();
        }
        debug!("position ({},{}) done", layer_idx, pos);
    }

    /// Registers the primitiveness of every position of a layer, either as
    /// one-shot assumptions or (with `permanent`) as unit clauses.
    pub fn add_assumptions(&mut self, layer_idx: usize, permanent: bool) {
        let prim_sig = self.htn.primitive_sig();
        for pos in 0..self.layers[layer_idx].size() {
            if let Some(v) = self.layers[layer_idx]
                .at(pos)
                .variable_opt(VarKind::Op, &prim_sig)
            {
                if permanent {
                    self.sat.add_unit(v as isize);
                } else {
                    self.sat.assume(v as isize);
                }
            }
        }
    }

    /// Runs the SAT backend under the registered assumptions.
    pub fn solve(&mut self) -> SolvingResult {
        self.sat.solve()
    }

    /// After an unsatisfiable solve, the positions of a layer whose
    /// primitiveness assumption is part of the reason.
    pub fn failed_positions(&mut self, layer_idx: usize) -> Vec<usize> {
        let prim_sig = self.htn.primitive_sig();
        let mut failed = Vec::new();
        for pos in 0..self.layers[layer_idx].size() {
            if let Some(v) = self.layers[layer_idx]
                .at(pos)
                .variable_opt(VarKind::Op, &prim_sig)
            {
                if self.sat.is_failed(v as isize) {
                    failed.push(pos);
                }
            }
        }
        info!("failed primitiveness assumptions at positions {:?}", failed);
        failed
    }

    /// Turns a satisfying assignment into a classical plan and a
    /// decomposition tree.
    ///
    /// # Panics
    ///
    /// Panics if the model violates a plan validity check; that means the
    /// solver returned an incorrect model or the encoder an incorrect
    /// formula.
    pub fn extract_plan(&mut self, model: &Assignment) -> Plan {
        self.vars.lock();
        let plan = PlanDecoder::new(self.htn, &self.layers, model, &self.substitution_vars)
            .extract();
        self.vars.unlock();
        plan
    }

    /// Writes the CNF dump, if one was requested.
    ///
    /// When the last solve ran without assumptions, the primitiveness
    /// assumptions of the deepest layer are re-registered first so the
    /// dumped formula matches the planner's final query.
    pub fn finish(&mut self) -> io::Result<()> {
        let skip = self.options.keep_assumptions_out_of_dump;
        if !skip && !self.sat.has_last_assumptions() && !self.layers.is_empty() {
            self.add_assumptions(self.layers.len() - 1, false);
        }
        self.sat.finish(self.vars.max_var(), skip)
    }
}

struct Ctx<'e> {
    htn: &'e HtnInstance,
    vars: &'e mut VariableRegistry,
    sat: &'e mut SatDriver,
    seen_q_constants: &'e mut FxHashSet<usize>,
    substitution_vars: &'e mut FxHashMap<(usize, usize), usize>,
    q_equality_vars: &'e mut FxHashMap<(usize, usize), usize>,
    emitted_forbidden: &'e mut FxHashSet<Substitution>,
    propagation_links: &'e mut FxHashSet<(usize, usize)>,
    dnf: &'e mut DnfBuffer,
}

impl Ctx<'_> {
    fn substitution_var(&mut self, q: usize, c: usize) -> usize {
        if let Some(v) = self.substitution_vars.get(&(q, c)) {
            return *v;
        }
        let v = self.vars.next_var();
        self.substitution_vars.insert((q, c), v);
        v
    }

    /// The cached variable standing for "q1 and q2 decode to the same
    /// constant", creating it with its defining clauses on first use.
    fn q_equality_var(&mut self, q1: usize, q2: usize) -> usize {
        let key = if q1 < q2 { (q1, q2) } else { (q2, q1) };
        if let Some(v) = self.q_equality_vars.get(&key) {
            return *v;
        }
        let eq = self.vars.next_var() as isize;
        self.q_equality_vars.insert(key, eq as usize);
        let d1 = self.htn.domain_of(key.0).to_vec();
        let d2 = self.htn.domain_of(key.1).to_vec();
        let d2_set: FxHashSet<usize> = d2.iter().copied().collect();
        let mut any_shared = false;
        for c in &d1 {
            let s1 = self.substitution_var(key.0, *c) as isize;
            if d2_set.contains(c) {
                any_shared = true;
                let s2 = self.substitution_var(key.1, *c) as isize;
                self.sat.add(&[-eq, -s1, s2]);
                self.sat.add(&[-eq, s1, -s2]);
                self.sat.add(&[eq, -s1, -s2]);
            } else {
                self.sat.add(&[-eq, -s1]);
            }
        }
        for c in &d2 {
            if !d1.contains(c) {
                let s2 = self.substitution_var(key.1, *c) as isize;
                self.sat.add(&[-eq, -s2]);
            }
        }
        if !any_shared {
            self.sat.add_unit(-eq);
        }
        eq as usize
    }
}

/// Group (a): allocate or reuse a variable for every fact at the position.
fn encode_fact_variables(
    ctx: &mut Ctx,
    cur: &mut Position,
    left: Option<&Position>,
    pos: usize,
    reuse_enabled: bool,
    ground_facts: &[USig],
    qfacts: &[USig],
) {
    for f in ground_facts {
        debug_assert!(
            !ctx.htn.is_rigid(f.name),
            "rigid fact {} reached the encoder",
            ctx.htn.render(f)
        );
        let reused =
            reuse_enabled && left.map_or(false, |l| can_reuse_ground_fact(cur, l, f));
        set_fact_variable(ctx, cur, left, pos, f, reused);
    }
    // q-facts second: their reuse depends on the decisions just taken for
    // their decodings
    for qf in qfacts {
        let reused = reuse_enabled && left.map_or(false, |l| can_reuse_qfact(cur, l, qf));
        set_fact_variable(ctx, cur, left, pos, qf, reused);
    }
}

fn set_fact_variable(
    ctx: &mut Ctx,
    cur: &mut Position,
    left: Option<&Position>,
    pos: usize,
    f: &USig,
    reused: bool,
) {
    if reused {
        let l = left.unwrap();
        let var = l.variable(VarKind::Fact, f);
        let first = l.first_pos_of_variable(VarKind::Fact, f).unwrap();
        cur.set_variable(VarKind::Fact, f, var, first);
    } else {
        let var = ctx.vars.next_var();
        cur.set_variable(VarKind::Fact, f, var, pos);
        VariableRegistry::trace_var(var, cur.layer_index(), pos, &ctx.htn.render(f));
    }
}

/// A ground fact's variable can be reused from the left if nothing at this
/// position can change the fact: no direct or indirect support, and no
/// supported q-fact abstracting it.
fn can_reuse_ground_fact(cur: &Position, left: &Position, f: &USig) -> bool {
    if !left.has_variable(VarKind::Fact, f) {
        return false;
    }
    if cur.has_fact_support(f, false)
        || cur.has_fact_support(f, true)
        || cur.has_indirect_fact_support(f, false)
        || cur.has_indirect_fact_support(f, true)
    {
        return false;
    }
    match cur.qfacts_with_predicate(f.name) {
        None => true,
        Some(qfacts) => qfacts.iter().all(|qf| {
            let abstracts = cur
                .qfact_decodings(qf, false)
                .map_or(false, |d| d.contains(f))
                || cur.qfact_decodings(qf, true).map_or(false, |d| d.contains(f));
            !abstracts || (!cur.has_fact_support(qf, false) && !cur.has_fact_support(qf, true))
        }),
    }
}

/// A q-fact's variable can additionally only be reused if every valid
/// decoding kept its variable as well.
fn can_reuse_qfact(cur: &Position, left: &Position, qf: &USig) -> bool {
    if !left.has_variable(VarKind::Fact, qf) {
        return false;
    }
    if cur.has_fact_support(qf, false) || cur.has_fact_support(qf, true) {
        return false;
    }
    for negated in [false, true] {
        if let Some(decodings) = cur.qfact_decodings(qf, negated) {
            for df in decodings {
                let here = cur.variable_opt(VarKind::Fact, df);
                let there = left.variable_opt(VarKind::Fact, df);
                if here.is_none() || here != there {
                    return false;
                }
            }
        }
    }
    true
}

/// Group (b): at-least-one (given the introducing operator) and
/// at-most-one clauses over the substitution variables of each q-constant.
fn encode_substitution_vars(ctx: &mut Ctx, op: &USig, op_var: isize) {
    for arg in &op.args {
        if !ctx.htn.is_q_constant(*arg) || !ctx.seen_q_constants.insert(*arg) {
            continue;
        }
        let domain = ctx.htn.domain_of(*arg).to_vec();
        let sub_vars: Vec<isize> = domain
            .iter()
            .map(|c| ctx.substitution_var(*arg, *c) as isize)
            .collect();
        ctx.sat.append(-op_var);
        ctx.sat.append_all(&sub_vars);
        ctx.sat.end();
        for i in 0..sub_vars.len() {
            for j in i + 1..sub_vars.len() {
                ctx.sat.add(&[-sub_vars[i], -sub_vars[j]]);
            }
        }
    }
}

/// Group (c): a chosen substitution makes a q-fact equivalent to the
/// corresponding decoded fact.
fn encode_qfact_semantics(ctx: &mut Ctx, cur: &Position, qf: &USig) {
    let qf_var = cur.variable(VarKind::Fact, qf) as isize;
    for negated in [false, true] {
        let decodings = match cur.qfact_decodings(qf, negated) {
            Some(d) => d,
            None => continue,
        };
        for df in decodings {
            let df_var = cur.variable(VarKind::Fact, df) as isize;
            let mut sub_vars = Vec::new();
            for (qa, da) in qf.args.iter().zip(df.args.iter()) {
                if qa != da {
                    sub_vars.push(ctx.substitution_var(*qa, *da) as isize);
                }
            }
            for sv in &sub_vars {
                ctx.sat.append(-sv);
            }
            if negated {
                ctx.sat.append(qf_var);
                ctx.sat.append(-df_var);
            } else {
                ctx.sat.append(-qf_var);
                ctx.sat.append(df_var);
            }
            ctx.sat.end();
        }
    }
}

/// Group (e): frame axioms for one non-new ground fact, negative change
/// first, each preceded by its indirect no-change clauses.
fn encode_frame_axioms(
    ctx: &mut Ctx,
    cur: &Position,
    left: &Position,
    f: &USig,
    prim_left: isize,
) {
    if !left.has_variable(VarKind::Fact, f) {
        // first occurrence: must have been introduced as a false fact
        debug_assert!(
            cur.has_false_fact(f),
            "first occurrence of {:?} is not false",
            f
        );
        return;
    }
    let l_var = left.variable(VarKind::Fact, f) as isize;
    let p_var = cur.variable(VarKind::Fact, f) as isize;
    if l_var == p_var {
        // reused variable: the fact cannot change here
        return;
    }
    for negated in [true, false] {
        let (l_lit, p_lit) = if negated {
            (-l_var, p_var)
        } else {
            (l_var, -p_var)
        };
        let mut indirect_ops = Vec::new();
        if let Some(supports) = cur.indirect_fact_supports(f, negated) {
            for (op, tree) in supports {
                let op_var = left.variable(VarKind::Op, op) as isize;
                if !tree.has_empty_path() {
                    ctx.dnf.clear();
                    let mut option = Vec::new();
                    for path in tree.paths() {
                        option.clear();
                        for (q, c) in path {
                            option.push(ctx.substitution_var(q, c) as isize);
                        }
                        ctx.dnf.push_option(&option);
                    }
                    for cls in ctx.dnf.cnf_clauses() {
                        ctx.sat.append(l_lit);
                        ctx.sat.append(-prim_left);
                        ctx.sat.append(p_lit);
                        ctx.sat.append(-op_var);
                        ctx.sat.append_all(&cls);
                        ctx.sat.end();
                    }
                }
                indirect_ops.push(op_var);
            }
        }
        ctx.sat.append(l_lit);
        ctx.sat.append(p_lit);
        ctx.sat.append(-prim_left);
        if let Some(supports) = cur.fact_supports(f, negated) {
            for op in supports {
                ctx.sat.append(left.variable(VarKind::Op, op) as isize);
            }
        }
        ctx.sat.append_all(&indirect_ops);
        ctx.sat.end();
    }
}

/// Group (f): effect clauses of one operator at the left position. A
/// negative effect is suppressed when a positive effect of the same
/// predicate unifies with it under the chosen substitution.
fn encode_left_op_effects(ctx: &mut Ctx, cur: &Position, op_var: isize, effects: &[Sig]) {
    for eff in effects {
        let fact_var = cur.variable(VarKind::Fact, &eff.usig) as isize;
        debug_assert!(
            cur.fact_supports(&eff.usig, eff.negated)
                .map_or(false, |s| !s.is_empty()),
            "effect without a support entry"
        );
        if !eff.negated {
            ctx.sat.add(&[-op_var, fact_var]);
            continue;
        }
        ctx.dnf.clear();
        let mut unified_unconditionally = false;
        for pos_eff in effects {
            if pos_eff.negated || pos_eff.usig.name != eff.usig.name {
                continue;
            }
            let mut fits = true;
            let mut option = Vec::new();
            for (ea, pa) in eff.usig.args.iter().zip(pos_eff.usig.args.iter()) {
                if ea == pa {
                    continue;
                }
                let e_q = ctx.htn.is_q_constant(*ea);
                let p_q = ctx.htn.is_q_constant(*pa);
                if e_q && p_q {
                    option.push(ctx.q_equality_var(*ea, *pa) as isize);
                } else if e_q {
                    if ctx.htn.domain_of(*ea).contains(pa) {
                        option.push(ctx.substitution_var(*ea, *pa) as isize);
                    } else {
                        fits = false;
                    }
                } else if p_q {
                    if ctx.htn.domain_of(*pa).contains(ea) {
                        option.push(ctx.substitution_var(*pa, *ea) as isize);
                    } else {
                        fits = false;
                    }
                } else {
                    fits = false;
                }
                if !fits {
                    break;
                }
            }
            if fits && option.is_empty() {
                unified_unconditionally = true;
                break;
            }
            if fits {
                ctx.dnf.push_option(&option);
            }
        }
        if unified_unconditionally {
            // the positive twin always wins; the negative effect vanishes
            continue;
        }
        if ctx.dnf.is_empty() {
            ctx.sat.add(&[-op_var, -fact_var]);
        } else {
            for cls in ctx.dnf.cnf_clauses() {
                ctx.sat.append(-op_var);
                ctx.sat.append(-fact_var);
                ctx.sat.append_all(&cls);
                ctx.sat.end();
            }
        }
    }
}

/// Precondition clauses shared by groups (g) and (h).
fn encode_preconditions(ctx: &mut Ctx, cur: &Position, op_var: isize, preconditions: &[Sig]) {
    for pre in preconditions {
        debug_assert!(
            !ctx.htn.is_rigid(pre.usig.name),
            "rigid precondition reached the encoder"
        );
        let fact_var = cur.variable(VarKind::Fact, &pre.usig) as isize;
        ctx.sat.add(&[-op_var, pre.polarity() * fact_var]);
    }
}
