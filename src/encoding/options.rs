use std::path::PathBuf;

/// Tuning knobs of the encoding.
#[derive(Clone, Debug)]
pub struct EncodingOptions {
    /// Maximum number of reduction candidates at a position for which the
    /// pairwise at-most-one-reduction clauses are still emitted. Beyond
    /// this threshold the group is skipped to avoid a quadratic blowup.
    pub at_most_one_reductions_cutoff: usize,
    /// If set, every emitted clause is mirrored into a DIMACS file at this
    /// path, written out when the encoding is finished.
    pub cnf_output: Option<PathBuf>,
    /// Suppresses the trailing assumption unit clauses in the DIMACS dump.
    pub keep_assumptions_out_of_dump: bool,
    /// Reuse the left neighbor's fact variables where the fact cannot
    /// change. Disabling this yields an equisatisfiable, larger formula;
    /// the switch exists for debugging and for testing that law.
    pub reuse_fact_variables: bool,
}

impl Default for EncodingOptions {
    fn default() -> Self {
        EncodingOptions {
            at_most_one_reductions_cutoff: 100,
            cnf_output: None,
            keep_assumptions_out_of_dump: false,
            reuse_fact_variables: true,
        }
    }
}
