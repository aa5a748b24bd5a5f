use super::plan::{Plan, PlanItem};
use crate::htn::{HtnInstance, Sig, Substitution, USig};
use crate::layers::{Layer, VarKind};
use crate::sat::Assignment;
use log::{debug, info};
use rustc_hash::{FxHashMap, FxHashSet};

/// Reconstructs a plan from a satisfying assignment.
///
/// The classical plan is read off the final layer, left to right, checking
/// each chosen operator against a re-executed world state. The
/// decomposition tree is then rebuilt top-down: each chosen reduction
/// attaches to the parent whose decoded subtask at the child's offset it
/// fulfills, and actions contribute their final-layer variable so the
/// tree's leaves are exactly the classical plan's ids.
pub(crate) struct PlanDecoder<'a> {
    htn: &'a HtnInstance,
    layers: &'a [Layer],
    model: &'a Assignment,
    substitution_vars: &'a FxHashMap<(usize, usize), usize>,
}

struct TreeEntry {
    item: PlanItem,
    /// The decoded subtask list when the item is a reduction; `None` for
    /// the root, which accepts any child.
    subtasks: Option<Vec<USig>>,
}

impl<'a> PlanDecoder<'a> {
    pub(crate) fn new(
        htn: &'a HtnInstance,
        layers: &'a [Layer],
        model: &'a Assignment,
        substitution_vars: &'a FxHashMap<(usize, usize), usize>,
    ) -> Self {
        PlanDecoder {
            htn,
            layers,
            model,
            substitution_vars,
        }
    }

    /// Extracts the classical plan and the decomposition tree.
    pub(crate) fn extract(&self) -> Plan {
        let classical = self.extract_classical();
        let decomposition = self.extract_decomposition();
        Plan {
            classical,
            decomposition,
        }
    }

    fn var_true(&self, var: usize) -> bool {
        self.model.value_of(var) == Some(true)
    }

    /// Resolves the q-constant arguments of a chosen operator.
    ///
    /// Exactly one substitution variable per q-constant must be true; zero
    /// true substitutions is the sentinel for a discarded operator variant,
    /// reported as `None`.
    fn decode_args(&self, sig: &USig) -> Option<USig> {
        let mut args = sig.args.clone();
        for a in args.iter_mut() {
            if !self.htn.is_q_constant(*a) {
                continue;
            }
            let mut chosen = None;
            let mut n = 0;
            for c in self.htn.domain_of(*a) {
                if let Some(v) = self.substitution_vars.get(&(*a, *c)) {
                    if self.var_true(*v) {
                        n += 1;
                        chosen = Some(*c);
                    }
                }
            }
            match n {
                0 => return None,
                1 => *a = chosen.unwrap(),
                _ => panic!(
                    "{} substitutions chosen for q-constant {}",
                    n,
                    self.htn.name(*a)
                ),
            }
        }
        Some(USig::new(sig.name, args))
    }

    fn extract_classical(&self) -> Vec<PlanItem> {
        let final_layer = self.layers.last().expect("no layers to decode");
        let prim_sig = self.htn.primitive_sig();

        // re-execution starts from the asserted initial facts
        let mut state: FxHashSet<USig> = FxHashSet::default();
        let p0 = final_layer.at(0);
        for tf in p0.true_facts() {
            if let Some(v) = p0.variable_opt(VarKind::Fact, tf) {
                assert!(
                    self.var_true(v),
                    "{} does not hold initially",
                    self.htn.render(tf)
                );
            }
            state.insert(tf.clone());
        }

        let mut plan = Vec::new();
        for pos in 0..final_layer.size().saturating_sub(1) {
            let p = final_layer.at(pos);
            if let Some(v) = p.variable_opt(VarKind::Op, &prim_sig) {
                assert!(self.var_true(v), "position {} is not primitive", pos);
            }
            let mut chosen = 0;
            for a_sig in p.actions() {
                let v = match p.variable_opt(VarKind::Op, a_sig) {
                    Some(v) => v,
                    None => continue,
                };
                if !self.var_true(v) {
                    continue;
                }
                chosen += 1;
                let decoded = match self.decode_args(a_sig) {
                    Some(d) => d,
                    None => continue,
                };
                let def = self.htn.action(a_sig).unwrap_or_else(|e| panic!("{}", e));
                self.check_and_apply(
                    pos,
                    a_sig,
                    &decoded,
                    &def.preconditions,
                    &def.effects,
                    &mut state,
                );
                debug!("* {} @ {}", self.htn.render(&decoded), pos);
                plan.push(PlanItem {
                    id: v,
                    task_sig: decoded.clone(),
                    op_sig: decoded,
                    children: Vec::new(),
                });
            }
            if chosen == 0 {
                // a trivial reduction may occupy a primitive position
                for r_sig in p.reductions() {
                    let v = match p.variable_opt(VarKind::Op, r_sig) {
                        Some(v) => v,
                        None => continue,
                    };
                    if !self.var_true(v) {
                        continue;
                    }
                    let def = self.htn.reduction(r_sig).unwrap_or_else(|e| panic!("{}", e));
                    assert!(
                        def.is_trivial(),
                        "non-trivial reduction {} chosen at primitive position {}",
                        self.htn.render(r_sig),
                        pos
                    );
                    chosen += 1;
                    if let Some(decoded) = self.decode_args(r_sig) {
                        self.check_and_apply(
                            pos,
                            r_sig,
                            &decoded,
                            &def.preconditions,
                            &def.effects,
                            &mut state,
                        );
                    }
                }
            }
            assert!(chosen == 1, "{} operations chosen at step {}", chosen, pos);
        }
        info!("extracted classical plan with {} actions", plan.len());
        plan
    }

    /// Checks a chosen operator against the assignment and the re-executed
    /// state, then applies its effects.
    fn check_and_apply(
        &self,
        pos: usize,
        orig: &USig,
        decoded: &USig,
        preconditions: &[Sig],
        effects: &[Sig],
        state: &mut FxHashSet<USig>,
    ) {
        let final_layer = self.layers.last().unwrap();
        let p = final_layer.at(pos);
        let p_next = final_layer.at(pos + 1);
        let s = Substitution::between(&orig.args, &decoded.args)
            .expect("inconsistent operator decoding");

        for pre in preconditions {
            let dec_pre = pre.usig.substituted(&s);
            if let Some(v) = p.variable_opt(VarKind::Fact, &dec_pre) {
                if let Some(value) = self.model.value_of(v) {
                    assert!(
                        value != pre.negated,
                        "precondition {} of {} does not hold in the assignment at step {}",
                        self.htn.render_sig(pre),
                        self.htn.render(decoded),
                        pos
                    );
                }
            }
            if !self.htn.is_rigid(dec_pre.name) {
                let holds = state.contains(&dec_pre) != pre.negated;
                assert!(
                    holds,
                    "precondition {} of {} does not hold in the inferred state at step {}",
                    self.htn.render_sig(pre),
                    self.htn.render(decoded),
                    pos
                );
            }
        }

        let mut dec_effects: Vec<Sig> = effects
            .iter()
            .map(|e| e.usig.substituted(&s).to_sig(e.negated))
            .collect();
        // a decoded negative effect canceled by its positive twin vanishes
        let positives: FxHashSet<USig> = dec_effects
            .iter()
            .filter(|e| !e.negated)
            .map(|e| e.usig.clone())
            .collect();
        dec_effects.retain(|e| !e.negated || !positives.contains(&e.usig));
        for eff in &dec_effects {
            if let Some(v) = p_next.variable_opt(VarKind::Fact, &eff.usig) {
                if let Some(value) = self.model.value_of(v) {
                    assert!(
                        value != eff.negated,
                        "effect {} of {} does not hold at step {}",
                        self.htn.render_sig(eff),
                        self.htn.render(decoded),
                        pos + 1
                    );
                }
            }
            if eff.negated {
                state.remove(&eff.usig);
            } else {
                state.insert(eff.usig.clone());
            }
        }
    }

    fn extract_decomposition(&self) -> Vec<PlanItem> {
        let root = TreeEntry {
            item: PlanItem {
                id: 0,
                task_sig: self.htn.root_sig(),
                op_sig: self.htn.root_sig(),
                children: Vec::new(),
            },
            subtasks: None,
        };
        let mut items_old: Vec<Option<TreeEntry>> = vec![Some(root)];
        let mut plan = Vec::new();
        let blank = self.htn.blank_sig();

        for i in 0..self.layers.len() {
            let l = &self.layers[i];
            let mut items_new: Vec<Option<TreeEntry>> = (0..l.size()).map(|_| None).collect();
            let mut attributed: FxHashSet<(usize, usize)> = FxHashSet::default();

            for pos in 0..l.size() {
                let (pred_pos, offset) = if i > 0 {
                    self.layers[i - 1].parent_of(pos)
                } else {
                    (0, pos)
                };
                let p = l.at(pos);
                let mut items_this_pos = 0;

                for r_sig in p.reductions() {
                    if r_sig.is_none() {
                        continue;
                    }
                    let v = match p.variable_opt(VarKind::Op, r_sig) {
                        Some(v) => v,
                        None => continue,
                    };
                    if !self.var_true(v) {
                        continue;
                    }
                    items_this_pos += 1;
                    let decoded = match self.decode_args(r_sig) {
                        Some(d) => d,
                        None => continue,
                    };
                    let def = self.htn.reduction(r_sig).unwrap_or_else(|e| panic!("{}", e));
                    let s = Substitution::between(&r_sig.args, &decoded.args)
                        .expect("inconsistent reduction decoding");
                    for pre in &def.preconditions {
                        if let Some(fv) = p.variable_opt(VarKind::Fact, &pre.usig.substituted(&s))
                        {
                            if let Some(value) = self.model.value_of(fv) {
                                assert!(
                                    value != pre.negated,
                                    "precondition {} of reduction {} does not hold at step {}",
                                    self.htn.render_sig(pre),
                                    self.htn.render(&decoded),
                                    pos
                                );
                            }
                        }
                    }
                    let task_decoded = def.task.substituted(&s);
                    let subtasks_decoded: Vec<USig> =
                        def.subtasks.iter().map(|t| t.substituted(&s)).collect();
                    self.attribute(
                        &mut items_old,
                        &mut attributed,
                        pred_pos,
                        offset,
                        v,
                        &task_decoded,
                    );
                    items_new[pos] = Some(TreeEntry {
                        item: PlanItem {
                            id: v,
                            task_sig: task_decoded,
                            op_sig: decoded,
                            children: Vec::new(),
                        },
                        subtasks: Some(subtasks_decoded),
                    });
                }

                for a_sig in p.actions() {
                    if a_sig.is_none() {
                        continue;
                    }
                    let v = match p.variable_opt(VarKind::Op, a_sig) {
                        Some(v) => v,
                        None => continue,
                    };
                    if !self.var_true(v) {
                        continue;
                    }
                    items_this_pos += 1;
                    if *a_sig == blank {
                        continue;
                    }
                    let decoded = match self.decode_args(a_sig) {
                        Some(d) => d,
                        None => continue,
                    };
                    // the action's id in the tree is its final-layer variable
                    let mut li = i;
                    let mut ap = pos;
                    while li + 1 < self.layers.len() {
                        ap = self.layers[li].successor_position(ap);
                        li += 1;
                    }
                    let leaf_id = self
                        .chosen_action_id(ap)
                        .expect("no action chosen at the propagated leaf position");
                    self.attribute(
                        &mut items_old,
                        &mut attributed,
                        pred_pos,
                        offset,
                        leaf_id,
                        &decoded,
                    );
                }

                assert!(
                    (items_this_pos == 1) != (pos + 1 == l.size()),
                    "{} items at ({},{})",
                    items_this_pos,
                    i,
                    pos
                );
            }

            plan.extend(items_old.drain(..).flatten().map(|e| e.item));
            items_old = items_new;
        }
        plan.extend(items_old.drain(..).flatten().map(|e| e.item));
        info!("extracted decomposition tree with {} items", plan.len());
        plan
    }

    /// Attributes a child id to its parent item, unless the parent's
    /// decoded subtask at the offset does not match or the offset was
    /// already filled (duplicate attributions are discarded).
    fn attribute(
        &self,
        items_old: &mut [Option<TreeEntry>],
        attributed: &mut FxHashSet<(usize, usize)>,
        pred_pos: usize,
        offset: usize,
        child_id: usize,
        child_task: &USig,
    ) {
        let entry = match items_old.get_mut(pred_pos).and_then(|o| o.as_mut()) {
            Some(e) => e,
            None => return,
        };
        if let Some(subtasks) = &entry.subtasks {
            match subtasks.get(offset) {
                Some(expected) if self.task_matches(expected, child_task) => {}
                _ => return,
            }
        }
        if !attributed.insert((pred_pos, offset)) {
            return;
        }
        entry.item.children.push(child_id);
    }

    /// A decoded child task fulfills a parent subtask when the names agree
    /// and every argument is equal or an unresolved q-constant covering the
    /// child's constant.
    fn task_matches(&self, expected: &USig, child_task: &USig) -> bool {
        expected.name == child_task.name
            && expected.args.len() == child_task.args.len()
            && expected
                .args
                .iter()
                .zip(child_task.args.iter())
                .all(|(e, c)| {
                    e == c
                        || (self.htn.is_q_constant(*e) && self.htn.domain_of(*e).contains(c))
                })
    }

    fn chosen_action_id(&self, pos: usize) -> Option<usize> {
        let final_layer = self.layers.last().unwrap();
        let p = final_layer.at(pos);
        for a in p.actions() {
            if let Some(v) = p.variable_opt(VarKind::Op, a) {
                if self.var_true(v) {
                    return Some(v);
                }
            }
        }
        None
    }
}
