use log::info;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const DEFAULT_BUFFER_CAP: usize = 1 << 20;

/// Mirrors the emitted formula into an on-disk DIMACS file.
///
/// The `p cnf <max_var> <num_clauses>` header can only be produced once the
/// encoding is complete, so clauses are buffered in memory and the file is
/// written as a whole by [finish](Self::finish): header first, then the
/// clause body, then (optionally) the last assumptions as unit clauses.
pub struct CnfWriter {
    path: PathBuf,
    clauses: String,
    n_clauses: usize,
}

impl CnfWriter {
    /// Builds a writer targeting the given path.
    pub fn new(path: &Path) -> Self {
        CnfWriter {
            path: path.to_path_buf(),
            clauses: String::with_capacity(DEFAULT_BUFFER_CAP),
            n_clauses: 0,
        }
    }

    /// Appends a literal to the clause under construction; `0` ends it.
    pub fn write_lit(&mut self, lit: isize) {
        if lit == 0 {
            self.clauses.push_str("0\n");
            self.n_clauses += 1;
        } else {
            self.clauses.push_str(&format!("{} ", lit));
        }
    }

    /// Appends a full clause.
    pub fn write_clause(&mut self, lits: &[isize]) {
        for l in lits {
            debug_assert_ne!(0, *l);
            self.write_lit(*l);
        }
        self.write_lit(0);
    }

    /// The number of complete clauses buffered so far.
    pub fn n_clauses(&self) -> usize {
        self.n_clauses
    }

    /// Writes the DIMACS file.
    ///
    /// Each literal of `assumptions` becomes a trailing unit clause, so the
    /// dumped formula is satisfiable exactly when the last incremental call
    /// was.
    pub fn finish(mut self, max_var: usize, assumptions: &[isize]) -> io::Result<()> {
        for a in assumptions {
            self.write_clause(&[*a]);
        }
        let mut file = File::create(&self.path)?;
        writeln!(file, "p cnf {} {}", max_var, self.n_clauses)?;
        file.write_all(self.clauses.as_bytes())?;
        file.flush()?;
        info!(
            "wrote CNF dump with {} clauses to {}",
            self.n_clauses,
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_format() {
        let dir = std::env::temp_dir().join("stratasat_cnf_writer_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("formula.cnf");
        let mut w = CnfWriter::new(&path);
        w.write_clause(&[1, -2]);
        w.write_lit(2);
        w.write_lit(0);
        assert_eq!(2, w.n_clauses());
        w.finish(2, &[1]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!("p cnf 2 3\n1 -2 0\n2 0\n1 0\n", content);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_dump_without_assumptions() {
        let dir = std::env::temp_dir().join("stratasat_cnf_writer_test2");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("formula.cnf");
        let mut w = CnfWriter::new(&path);
        w.write_clause(&[-1]);
        w.finish(1, &[]).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!("p cnf 1 1\n-1 0\n", content);
        std::fs::remove_file(&path).unwrap();
    }
}
