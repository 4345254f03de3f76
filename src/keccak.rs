//! Keccak concretisation: at transaction end, replace symbolic hash outputs
//! with concrete witnesses tied to a fixed roster of actor identities.
//!
//! The real hash-oracle bookkeeping (`keccak_parent`, `flag_conditions`) is
//! populated by the external instruction evaluator whenever it evaluates a
//! symbolic KECCAK256/SHA3 opcode — this module only owns the manager's
//! storage and the concretisation procedure that consumes it.

use crate::constraints::ConstraintSet;
use crate::errors::SvmError;
use crate::smt::{term_hash_name, BitVec, SmtBackend, Term, UninterpretedFunction};
use crate::state::GlobalState;
use ethereum_types::U256;
use rand::RngCore;
use rustc_hash::FxHashMap;
use sha3::{Digest, Keccak256};

/// The fixed roster of three actor addresses enumerated by concretisation.
/// Carried as a field rather than a hard-coded constant so a caller can
/// override it, even though these three values are the only roster this
/// crate ships.
pub fn default_actor_roster() -> Vec<BitVec> {
    // 0xAFFEAFFE...AFFE, 0xDEADBEEF...DEADBEEF, 0xDEADBEEF...DEADBEEE
    const ACTOR_1: [u8; 32] = [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xAF, 0xFE, 0xAF, 0xFE, 0xAF, 0xFE, 0xAF, 0xFE, 0xAF,
        0xFE, 0xAF, 0xFE, 0xAF, 0xFE, 0xAF, 0xFE, 0xAF, 0xFE, 0xAF, 0xFE,
    ];
    const ACTOR_2: [u8; 32] = [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF, 0xDE,
        0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF,
    ];
    const ACTOR_3: [u8; 32] = [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF, 0xDE,
        0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEF, 0xDE, 0xAD, 0xBE, 0xEE,
    ];
    vec![
        BitVec::const_value(U256::from_big_endian(&ACTOR_1), 256),
        BitVec::const_value(U256::from_big_endian(&ACTOR_2), 256),
        BitVec::const_value(U256::from_big_endian(&ACTOR_3), 256),
    ]
}

fn random_bitvec(width: u32) -> BitVec {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut value = U256::from_big_endian(&bytes);
    if width < 256 {
        value &= (U256::one() << (width as usize)) - U256::one();
    }
    BitVec::const_value(value, width)
}

/// Process-wide hash-oracle bookkeeping: the `(function, inverse)` table per
/// input width, the reverse value→topological-key index, per-key flag
/// conditions, the parent relation between derived and independent keys, and
/// the deletion set.
///
/// Threaded as an explicit value through the engine rather than carried as
/// ambient/global state, so tests get isolation for free.
#[derive(Debug, Default)]
pub struct KeccakManager {
    get_function: FxHashMap<u32, (UninterpretedFunction, UninterpretedFunction)>,
    values_for_size: FxHashMap<u32, Vec<BitVec>>,
    value_inverse: FxHashMap<BitVec, BitVec>,
    flag_conditions: FxHashMap<BitVec, (Term, Term)>,
    keccak_parent: FxHashMap<BitVec, Option<BitVec>>,
    /// Constraints superseded by a concretisation, removed from a state's
    /// constraint set when its transaction ends.
    pub delete_constraints: Vec<Term>,
    actor_roster: Vec<BitVec>,
}

impl KeccakManager {
    pub fn new(actor_roster: Vec<BitVec>) -> Self {
        Self {
            actor_roster,
            ..Self::default()
        }
    }

    pub fn with_default_roster() -> Self {
        Self::new(default_actor_roster())
    }

    /// Computes the concrete Keccak-256 digest of a concrete bit-vector,
    /// encoded big-endian over its declared width. Uses
    /// [`BitVec::concrete_bytes`] rather than [`BitVec::concrete_value`] so
    /// widths beyond 256 bits (the composite 512-bit pre-image split) hash
    /// correctly instead of being forced through a single `U256`.
    pub fn find_keccak(&self, input: &BitVec) -> Result<BitVec, SvmError> {
        let bytes = input
            .concrete_bytes()
            .ok_or_else(|| SvmError::Internal("find_keccak requires a concrete input".into()))?;
        let digest = Keccak256::digest(&bytes);
        Ok(BitVec::const_value(U256::from_big_endian(&digest), 256))
    }

    /// Records that `key` is known to equal a keccak output, optionally
    /// derived from `parent` (the pre-image term). Called by the external
    /// instruction evaluator when it symbolically evaluates a hash opcode.
    pub fn record_topo_key(&mut self, key: BitVec, parent: Option<BitVec>) {
        self.keccak_parent.insert(key, parent);
    }

    pub fn record_flag_condition(&mut self, key: BitVec, f1: Term, f2: Term) {
        self.flag_conditions.insert(key, (f1, f2));
    }

    /// The `(function, inverse)` pair for bit-vectors of `width`, creating it
    /// on first use.
    fn function_pair(&mut self, width: u32) -> (UninterpretedFunction, UninterpretedFunction) {
        self.get_function
            .entry(width)
            .or_insert_with(|| {
                (
                    UninterpretedFunction::new(format!("keccak256_{width}"), width, 256),
                    UninterpretedFunction::new(format!("keccak256_{width}-1"), 256, width),
                )
            })
            .clone()
    }

    /// Removes the deletion set from an arbitrary constraint set. Called
    /// again on a node's constraints right after copying them from a state
    /// whose constraints already had the same set removed during
    /// concretisation — a no-op in practice, kept since removal by identity
    /// never fails.
    pub fn strip_delete_constraints(&self, constraints: &mut ConstraintSet) {
        for constraint in &self.delete_constraints {
            constraints.remove_by_identity(constraint);
        }
    }

    /// Reconciles every unresolved topological key in `current.topo_keys`
    /// against the actor roster, mutating `current`'s constraint set (via
    /// deletion) and `returning`'s topological-key list (with freshly
    /// produced witnesses). Returns the new-condition term, the deleted-
    /// constraints term, the combined variable-condition term, and the
    /// weighted flag booleans.
    pub fn concretize(
        &mut self,
        current: &mut GlobalState,
        returning: &mut GlobalState,
        backend: &dyn SmtBackend,
    ) -> (Term, Term, Term, Vec<Term>) {
        let sender = current.environment.sender.clone();
        let mut model_tuples: Vec<(Term, BitVec)> = self
            .actor_roster
            .iter()
            .map(|actor| (sender.clone().eq_term(actor.clone()), actor.clone()))
            .collect();

        let mut stored_vals: FxHashMap<BitVec, FxHashMap<BitVec, BitVec>> = FxHashMap::default();
        let mut var_conds = Term::TRUE;
        let mut flag_weights = Vec::new();
        let mut hash_cond = Term::TRUE;

        let topo_keys = current.topo_keys().clone();
        for key in &topo_keys {
            if key.concrete_value().is_some() {
                continue;
            }
            let flag_var = Term::bool_var(term_hash_name(key));
            let mut var_cond = Term::FALSE;
            let parent = self.keccak_parent.get(key).cloned().flatten();

            if parent.is_none() {
                for (guard, actor) in &mut model_tuples {
                    let chosen = if key.width() == 256 {
                        let input = random_bitvec(160);
                        let (func, inverse) = self.function_pair(160);
                        let y = match self.find_keccak(&input) {
                            Ok(y) => y,
                            Err(_) => continue,
                        };
                        self.value_inverse.insert(y.clone(), key.clone());
                        self.values_for_size
                            .entry(160)
                            .or_default()
                            .push(y.clone());
                        returning.topo_keys_mut().push(y.clone());
                        hash_cond = hash_cond
                            .and(func.apply(input.clone()).eq_term(y.clone()))
                            .and(inverse.apply(y.clone()).eq_term(input.clone()));
                        var_cond = var_cond.or(key.clone().eq_term(y.clone()));
                        y
                    } else {
                        let value = random_bitvec(key.width());
                        var_cond = var_cond.or(key.clone().eq_term(value.clone()));
                        value
                    };
                    *guard = guard.clone().and(key.clone().eq_term(chosen.clone()));
                    stored_vals
                        .entry(key.clone())
                        .or_default()
                        .insert(actor.clone(), chosen);
                }
            } else {
                let parent = parent.unwrap_or_default();
                for (guard, actor) in &mut model_tuples {
                    let concrete_parent = if parent.width() == 512 {
                        let high = BitVec::extract(511, 256, parent.clone());
                        let low = BitVec::extract(255, 0, parent.clone());
                        let high = if high.is_symbolic() {
                            match stored_vals.get(&high).and_then(|m| m.get(actor)) {
                                Some(v) => v.clone(),
                                None => continue,
                            }
                        } else {
                            high
                        };
                        let low = if low.is_symbolic() {
                            match stored_vals.get(&low).and_then(|m| m.get(actor)) {
                                Some(v) => v.clone(),
                                None => continue,
                            }
                        } else {
                            low
                        };
                        BitVec::concat(high, low)
                    } else {
                        match stored_vals.get(&parent).and_then(|m| m.get(actor)) {
                            Some(v) => v.clone(),
                            None => continue,
                        }
                    };
                    let keccak_val = match self.find_keccak(&concrete_parent) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    stored_vals
                        .entry(key.clone())
                        .or_default()
                        .insert(actor.clone(), keccak_val.clone());
                    *guard = guard.clone().and(key.clone().eq_term(keccak_val.clone()));
                    var_cond = var_cond.or(key.clone().eq_term(keccak_val));
                }
            }

            if let Some((f1, f2)) = self.flag_conditions.get(key).cloned() {
                var_cond = var_cond
                    .clone()
                    .or(f2)
                    .iff(flag_var.clone())
                    .and(f1.iff(flag_var.clone().not()));
            } else {
                let flagged = flag_var.clone().and(var_cond.clone());
                var_cond = flagged
                    .clone()
                    .or(flagged.not())
                    .and(hash_cond.clone());
            }
            flag_weights.push(flag_var);
            var_conds = var_conds.and(var_cond);
        }

        let mut new_condition = Term::FALSE;
        for (guard, _actor) in &model_tuples {
            new_condition = guard.clone().or(new_condition);
        }

        let constraints = &mut current.mstate.constraints;
        let mut deleted_any = false;
        let mut deleted_constraints = Term::TRUE;
        for constraint in self.delete_constraints.clone() {
            if constraints.remove_by_identity(&constraint) {
                deleted_constraints = constraint.and(deleted_constraints);
                deleted_any = true;
            }
        }
        if !deleted_any {
            deleted_constraints = Term::FALSE;
        }

        var_conds = var_conds.and(hash_cond);
        new_condition = backend.simplify(&new_condition);

        (new_condition, deleted_constraints, var_conds, flag_weights)
    }
}
