//! Minimal symbolic term algebra.
//!
//! A real term algebra, simplifier and solver are external collaborators,
//! out of scope here. This module only carries enough structure for the
//! engine to *build* constraints (keccak concretisation assembles `And`/
//! `Or`/`Eq` terms itself) and to *ask* an external [`SmtBackend`] whether a
//! constraint set is satisfiable or how a term simplifies. Terms are
//! cheaply-cloned immutable value objects, in the same spirit as this
//! crate's other reference-counted value types.

use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// A symbolic or concrete bit-vector term of a fixed bit width.
///
/// `Serialize`/`Deserialize` let a recorded CFG (edge guard conditions
/// included) travel to a downstream vulnerability-detection collaborator
/// without that collaborator living in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitVec {
    /// A concrete value of the given width.
    Const { value: U256, width: u32 },
    /// A free variable of the given width.
    Var { name: Rc<str>, width: u32 },
    /// `Extract(hi, lo, inner)`, a bit-slice of a wider term.
    Extract {
        hi: u32,
        lo: u32,
        inner: Rc<BitVec>,
    },
    /// `Concat(high, low)`, joining two terms into a wider one.
    Concat { high: Rc<BitVec>, low: Rc<BitVec> },
    /// Application of an uninterpreted function to a single argument.
    Apply {
        function: UninterpretedFunction,
        arg: Rc<BitVec>,
    },
}

impl BitVec {
    pub fn const_value(value: U256, width: u32) -> Self {
        BitVec::Const { value, width }
    }

    pub fn var(name: impl Into<Rc<str>>, width: u32) -> Self {
        BitVec::Var {
            name: name.into(),
            width,
        }
    }

    pub fn extract(hi: u32, lo: u32, inner: BitVec) -> Self {
        BitVec::Extract {
            hi,
            lo,
            inner: Rc::new(inner),
        }
    }

    pub fn concat(high: BitVec, low: BitVec) -> Self {
        BitVec::Concat {
            high: Rc::new(high),
            low: Rc::new(low),
        }
    }

    /// Bit width of this term.
    pub fn width(&self) -> u32 {
        match self {
            BitVec::Const { width, .. } | BitVec::Var { width, .. } => *width,
            BitVec::Extract { hi, lo, .. } => hi.saturating_sub(*lo) + 1,
            BitVec::Concat { high, low } => high.width() + low.width(),
            BitVec::Apply { function, .. } => function.range_width,
        }
    }

    /// True if this term has no concrete value, i.e. it must be resolved
    /// before it can be used as a witness.
    pub fn is_symbolic(&self) -> bool {
        !matches!(self, BitVec::Const { .. })
    }

    /// The concrete value, if this term is fully concrete and fits in 256
    /// bits. Folds `Extract` of a concrete inner term, and `Concat` so long
    /// as the combined width doesn't exceed what `U256` can hold — wider
    /// concatenations (the 512-bit keccak pre-image split) must go through
    /// [`Self::concrete_bytes`] instead, since no single `U256` can
    /// represent them.
    pub fn concrete_value(&self) -> Option<U256> {
        match self {
            BitVec::Const { value, .. } => Some(*value),
            BitVec::Extract { hi, lo, inner } => {
                let value = inner.concrete_value()?;
                let width = hi.saturating_sub(*lo) + 1;
                let shifted = value >> (*lo as usize);
                Some(if width >= 256 {
                    shifted
                } else {
                    shifted & ((U256::one() << width as usize) - U256::one())
                })
            }
            BitVec::Concat { high, low } => {
                if high.width() + low.width() > 256 {
                    return None;
                }
                let high_value = high.concrete_value()?;
                let low_value = low.concrete_value()?;
                Some((high_value << low.width() as usize) | low_value)
            }
            _ => None,
        }
    }

    /// Big-endian byte representation of a fully concrete term, for widths
    /// that may exceed the 256 bits a single `U256` can hold (the 512-bit
    /// keccak pre-image split needs this: two concrete 256-bit halves joined
    /// into a 64-byte buffer to hash, not a single 512-bit integer).
    /// `Concat` recurses and concatenates each half's bytes; every other
    /// variant defers to [`Self::concrete_value`] since it is always at most
    /// 256 bits wide on its own.
    pub fn concrete_bytes(&self) -> Option<Vec<u8>> {
        if let BitVec::Concat { high, low } = self {
            let mut bytes = high.concrete_bytes()?;
            bytes.extend(low.concrete_bytes()?);
            return Some(bytes);
        }
        let value = self.concrete_value()?;
        let byte_len = (self.width() as usize).div_ceil(8);
        let mut full = [0u8; 32];
        value.to_big_endian(&mut full);
        Some(full[32 - byte_len..].to_vec())
    }

    pub fn eq_term(self, other: BitVec) -> Term {
        Term::Eq(Rc::new(self), Rc::new(other))
    }
}

impl Default for BitVec {
    fn default() -> Self {
        BitVec::const_value(U256::zero(), 256)
    }
}

impl fmt::Display for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BitVec::Const { value, width } => write!(f, "0x{value:x}:{width}"),
            BitVec::Var { name, width } => write!(f, "{name}:{width}"),
            BitVec::Extract { hi, lo, inner } => write!(f, "extract({hi},{lo},{inner})"),
            BitVec::Concat { high, low } => write!(f, "concat({high},{low})"),
            BitVec::Apply { function, arg } => write!(f, "{}({arg})", function.name),
        }
    }
}

/// A named, uninterpreted function from a bit-vector of `domain_width` bits
/// to a bit-vector of `range_width` bits (the keccak oracle and its
/// inverse).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UninterpretedFunction {
    pub name: Rc<str>,
    pub domain_width: u32,
    pub range_width: u32,
}

impl UninterpretedFunction {
    pub fn new(name: impl Into<Rc<str>>, domain_width: u32, range_width: u32) -> Self {
        Self {
            name: name.into(),
            domain_width,
            range_width,
        }
    }

    pub fn apply(&self, arg: BitVec) -> BitVec {
        BitVec::Apply {
            function: self.clone(),
            arg: Rc::new(arg),
        }
    }
}

/// A boolean SMT term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Term {
    BoolConst(bool),
    BoolVar(Rc<str>),
    Eq(Rc<BitVec>, Rc<BitVec>),
    And(Vec<Term>),
    Or(Vec<Term>),
    Not(Rc<Term>),
    /// Boolean equivalence (`a == b` between two boolean terms, as opposed to
    /// [`Term::Eq`] which compares bit-vectors). Needed by keccak flag
    /// rewriting, which equates a fresh flag boolean with a disjunction of
    /// other boolean terms.
    Iff(Rc<Term>, Rc<Term>),
}

impl Term {
    pub const TRUE: Term = Term::BoolConst(true);
    pub const FALSE: Term = Term::BoolConst(false);

    pub fn bool_var(name: impl Into<Rc<str>>) -> Self {
        Term::BoolVar(name.into())
    }

    /// Flattens nested `And`s the way a simplifier would, without needing one.
    pub fn and(self, other: Term) -> Term {
        match (self, other) {
            (Term::BoolConst(true), x) | (x, Term::BoolConst(true)) => x,
            (Term::And(mut xs), Term::And(ys)) => {
                xs.extend(ys);
                Term::And(xs)
            }
            (Term::And(mut xs), y) => {
                xs.push(y);
                Term::And(xs)
            }
            (x, Term::And(mut ys)) => {
                ys.insert(0, x);
                Term::And(ys)
            }
            (x, y) => Term::And(vec![x, y]),
        }
    }

    pub fn or(self, other: Term) -> Term {
        match (self, other) {
            (Term::BoolConst(false), x) | (x, Term::BoolConst(false)) => x,
            (Term::Or(mut xs), Term::Or(ys)) => {
                xs.extend(ys);
                Term::Or(xs)
            }
            (Term::Or(mut xs), y) => {
                xs.push(y);
                Term::Or(xs)
            }
            (x, Term::Or(mut ys)) => {
                ys.insert(0, x);
                Term::Or(ys)
            }
            (x, y) => Term::Or(vec![x, y]),
        }
    }

    pub fn not(self) -> Term {
        match self {
            Term::Not(inner) => (*inner).clone(),
            other => Term::Not(Rc::new(other)),
        }
    }

    pub fn iff(self, other: Term) -> Term {
        Term::Iff(Rc::new(self), Rc::new(other))
    }
}

/// Stand-in for a named hash of a simplified term, used to name the fresh
/// flag boolean minted during keccak concretisation.
pub fn term_hash_name(term: &BitVec) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    term.to_string().hash(&mut hasher);
    format!("{}_flag", hasher.finish())
}

/// External SMT backend: satisfiability probe and term simplification.
/// Neither is implemented by this crate — both are collaborator
/// responsibilities.
pub trait SmtBackend {
    /// Whether the conjunction of `constraints` is satisfiable.
    fn is_possible(&self, constraints: &[Term]) -> bool;
    /// A simplified, semantically equivalent term.
    fn simplify(&self, term: &Term) -> Term;
}

/// A trivial backend useful for tests and for running the engine without a
/// real solver wired in: a constraint set is possible unless it contains a
/// literal `false`, and `simplify` is the identity function.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaiveBackend;

impl SmtBackend for NaiveBackend {
    fn is_possible(&self, constraints: &[Term]) -> bool {
        !constraints.iter().any(|c| matches!(c, Term::BoolConst(false)))
    }

    fn simplify(&self, term: &Term) -> Term {
        term.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_within_256_bits_is_concrete_value() {
        let high = BitVec::const_value(U256::from(0xAAu64), 128);
        let low = BitVec::const_value(U256::from(0xBBu64), 128);
        let combined = BitVec::concat(high, low);
        assert_eq!(combined.width(), 256);
        let expected = (U256::from(0xAAu64) << 128) | U256::from(0xBBu64);
        assert_eq!(combined.concrete_value(), Some(expected));
    }

    #[test]
    fn concat_past_256_bits_has_no_concrete_value_but_has_concrete_bytes() {
        let high = BitVec::const_value(U256::from(0xAAu64), 256);
        let low = BitVec::const_value(U256::from(0xBBu64), 256);
        let combined = BitVec::concat(high, low);
        assert_eq!(combined.width(), 512);
        assert!(combined.concrete_value().is_none());

        let bytes = combined.concrete_bytes().expect("both halves are concrete");
        let mut expected = vec![0u8; 31];
        expected.push(0xAA);
        expected.extend(std::iter::repeat(0u8).take(31));
        expected.push(0xBB);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn extract_of_concrete_value_masks_and_shifts() {
        let value = BitVec::const_value(U256::from(0xABCDu64), 32);
        let low_byte = BitVec::extract(7, 0, value);
        assert_eq!(low_byte.width(), 8);
        assert_eq!(low_byte.concrete_value(), Some(U256::from(0xCDu64)));
    }

    #[test]
    fn extract_or_concat_of_symbolic_term_is_not_concrete() {
        let symbolic = BitVec::var("x", 256);
        assert!(BitVec::extract(255, 0, symbolic.clone()).concrete_value().is_none());
        assert!(BitVec::concat(symbolic.clone(), symbolic).concrete_value().is_none());
    }
}
