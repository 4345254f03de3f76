//! The append-only ordered constraint set carried by every `MachineState`.

use crate::smt::{SmtBackend, Term};
use serde::{Deserialize, Serialize};

/// An append-only ordered list of boolean SMT terms, with an auxiliary
/// `weighted` list of soft-weight terms appended on keccak concretisation —
/// the flag booleans that make the weighted terms available as soft
/// objectives to the solver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintSet {
    terms: Vec<Term>,
    /// Soft-weighted terms (flag booleans from keccak concretisation).
    pub weighted: Vec<Term>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, term: Term) {
        self.terms.push(term);
    }

    pub fn extend(&mut self, other: &ConstraintSet) {
        self.terms.extend(other.terms.iter().cloned());
        self.weighted.extend(other.weighted.iter().cloned());
    }

    pub fn last(&self) -> Option<&Term> {
        self.terms.last()
    }

    pub fn as_slice(&self) -> &[Term] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Satisfiability probe, delegated to the external solver.
    pub fn is_possible(&self, backend: &dyn SmtBackend) -> bool {
        backend.is_possible(&self.terms)
    }

    /// Removes a constraint by identity (structural equality stands in for
    /// identity here, since terms are immutable value objects). A no-op when
    /// the constraint is absent — this must never fail the engine.
    pub fn remove_by_identity(&mut self, constraint: &Term) -> bool {
        if let Some(pos) = self.terms.iter().position(|t| t == constraint) {
            self.terms.remove(pos);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smt::NaiveBackend;

    #[test]
    fn remove_absent_constraint_is_a_no_op() {
        let mut set = ConstraintSet::new();
        set.push(Term::BoolConst(true));
        assert!(!set.remove_by_identity(&Term::bool_var("nowhere")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn remove_present_constraint_drops_it() {
        let mut set = ConstraintSet::new();
        let marker = Term::bool_var("marker");
        set.push(marker.clone());
        set.push(Term::BoolConst(true));
        assert!(set.remove_by_identity(&marker));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn empty_set_is_possible() {
        let set = ConstraintSet::new();
        assert!(set.is_possible(&NaiveBackend));
    }

    #[test]
    fn set_containing_false_is_impossible() {
        let mut set = ConstraintSet::new();
        set.push(Term::FALSE);
        assert!(!set.is_possible(&NaiveBackend));
    }
}
