use crate::htn::HtnInstance;
use crate::htn::USig;
use std::io::{self, Write};

/// One entry of a plan: a chosen operator occurrence.
///
/// The id is the operator's SAT variable, which makes ids unique across the
/// whole plan and lets the decomposition tree reference classical actions
/// directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanItem {
    /// The unique item id.
    pub id: usize,
    /// The (decoded) task the operator fulfills.
    pub task_sig: USig,
    /// The (decoded) operator signature.
    pub op_sig: USig,
    /// The ids of the item's children in the decomposition tree.
    pub children: Vec<usize>,
}

/// A successfully extracted plan.
pub struct Plan {
    /// The primitive action sequence of the final layer, in position order.
    pub classical: Vec<PlanItem>,
    /// The decomposition tree, root first, layer by layer.
    pub decomposition: Vec<PlanItem>,
}

impl Plan {
    /// Writes the plan in its fixed textual format.
    ///
    /// Each classical action prints as `<id> <op_sig>`; each decomposition
    /// item as `<id> <task_sig> -> <op_sig> : <child_id>*`. Blank no-op
    /// actions occupy positions but are filtered from the output.
    pub fn write(&self, htn: &HtnInstance, out: &mut dyn Write) -> io::Result<()> {
        let blank = htn.blank_sig();
        for item in &self.classical {
            if item.op_sig == blank {
                continue;
            }
            writeln!(out, "{} {}", item.id, htn.render(&item.op_sig))?;
        }
        for item in &self.decomposition {
            let children: String = item
                .children
                .iter()
                .map(|c| format!(" {}", c))
                .collect();
            writeln!(
                out,
                "{} {} -> {} :{}",
                item.id,
                htn.render(&item.task_sig),
                htn.render(&item.op_sig),
                children
            )?;
        }
        Ok(())
    }

    /// Renders the plan to a string.
    pub fn render(&self, htn: &HtnInstance) -> String {
        let mut buf = Vec::new();
        self.write(htn, &mut buf).expect("writing to a vector");
        String::from_utf8(buf).expect("plan output is UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_output_format() {
        let mut htn = HtnInstance::new();
        let mv = htn.intern("move");
        let l0 = htn.intern("loc0");
        let l1 = htn.intern("loc1");
        let task = htn.intern("deliver");
        let meth = htn.intern("m_deliver");
        let plan = Plan {
            classical: vec![PlanItem {
                id: 4,
                task_sig: USig::new(mv, vec![l0, l1]),
                op_sig: USig::new(mv, vec![l0, l1]),
                children: vec![],
            }],
            decomposition: vec![PlanItem {
                id: 2,
                task_sig: USig::new(task, vec![]),
                op_sig: USig::new(meth, vec![]),
                children: vec![4],
            }],
        };
        assert_eq!(
            "4 move(loc0,loc1)\n2 deliver -> m_deliver : 4\n",
            plan.render(&htn)
        );
    }

    #[test]
    fn test_blank_actions_are_filtered() {
        let htn = HtnInstance::new();
        let plan = Plan {
            classical: vec![PlanItem {
                id: 9,
                task_sig: htn.blank_sig(),
                op_sig: htn.blank_sig(),
                children: vec![],
            }],
            decomposition: vec![],
        };
        assert_eq!("", plan.render(&htn));
    }

    #[test]
    fn test_childless_decomposition_item() {
        let mut htn = HtnInstance::new();
        let t = htn.intern("t");
        let m = htn.intern("m");
        let plan = Plan {
            classical: vec![],
            decomposition: vec![PlanItem {
                id: 3,
                task_sig: USig::new(t, vec![]),
                op_sig: USig::new(m, vec![]),
                children: vec![],
            }],
        };
        assert_eq!("3 t -> m :\n", plan.render(&htn));
    }
}
