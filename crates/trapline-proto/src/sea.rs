//! Size Expression Algebra.
//!
//! Field widths in the wire schema are not always known until the device
//! answers the handshake — an axis coordinate array is sized by the number
//! of axes the firmware was compiled for, not by anything fixed at build
//! time. [`SizeExpr`] is the small symbolic arithmetic that lets a schema
//! describe such a width before the binding environment exists, and
//! [`SizeExpr::eval`] resolves it once the environment is known.

use std::collections::BTreeMap;

/// A symbolic non-negative integer expression.
///
/// Built from literals and named variables via `+`/`*`-shaped
/// constructors rather than `std::ops` overloads, so that identity folding
/// (`0 + x = x`, `1 * x = x`, `0 * x = 0`) always happens at construction
/// time and the tree never grows larger than the expression actually is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SizeExpr {
    /// A fixed literal.
    Const(u32),
    /// A named environment variable, resolved at [`SizeExpr::eval`] time.
    Var(&'static str),
    /// Sum of two subexpressions.
    Add(Box<SizeExpr>, Box<SizeExpr>),
    /// Product of two subexpressions.
    Mul(Box<SizeExpr>, Box<SizeExpr>),
}

impl SizeExpr {
    /// A fixed literal.
    #[must_use]
    pub const fn constant(value: u32) -> Self {
        SizeExpr::Const(value)
    }

    /// A named environment variable.
    #[must_use]
    pub const fn var(name: &'static str) -> Self {
        SizeExpr::Var(name)
    }

    /// Add `other`, folding away additive identities at construction time.
    #[must_use]
    pub fn add(self, other: SizeExpr) -> SizeExpr {
        match (self, other) {
            (SizeExpr::Const(0), rhs) => rhs,
            (lhs, SizeExpr::Const(0)) => lhs,
            (SizeExpr::Const(a), SizeExpr::Const(b)) => SizeExpr::Const(a.saturating_add(b)),
            (lhs, rhs) => SizeExpr::Add(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Multiply by `other`, folding away multiplicative identities and zero
    /// at construction time.
    #[must_use]
    pub fn mul(self, other: SizeExpr) -> SizeExpr {
        match (self, other) {
            (SizeExpr::Const(0), _) | (_, SizeExpr::Const(0)) => SizeExpr::Const(0),
            (SizeExpr::Const(1), rhs) => rhs,
            (lhs, SizeExpr::Const(1)) => lhs,
            (SizeExpr::Const(a), SizeExpr::Const(b)) => SizeExpr::Const(a.saturating_mul(b)),
            (lhs, rhs) => SizeExpr::Mul(Box::new(lhs), Box::new(rhs)),
        }
    }

    /// Resolve against a bound environment. `None` means some variable in
    /// the expression has no entry in `env` yet.
    #[must_use]
    pub fn eval(&self, env: &BTreeMap<&'static str, u32>) -> Option<u32> {
        match self {
            SizeExpr::Const(c) => Some(*c),
            SizeExpr::Var(name) => env.get(name).copied(),
            SizeExpr::Add(l, r) => Some(l.eval(env)?.saturating_add(r.eval(env)?)),
            SizeExpr::Mul(l, r) => Some(l.eval(env)?.saturating_mul(r.eval(env)?)),
        }
    }

    /// True if every variable the expression references is bound in `env`.
    #[must_use]
    pub fn is_bound(&self, env: &BTreeMap<&'static str, u32>) -> bool {
        self.eval(env).is_some()
    }

    /// Expand into a sum of monomials, each keyed by its sorted variable
    /// multiset and mapped to an accumulated coefficient. Used only by
    /// [`SizeExpr::compare_expanded`]; not on the hot path of encode/decode.
    #[must_use]
    pub fn expanded(&self) -> BTreeMap<Vec<&'static str>, u64> {
        match self {
            SizeExpr::Const(c) => {
                let mut monomials = BTreeMap::new();
                if *c != 0 {
                    monomials.insert(Vec::new(), u64::from(*c));
                }
                monomials
            }
            SizeExpr::Var(name) => BTreeMap::from([(vec![*name], 1)]),
            SizeExpr::Add(l, r) => {
                let mut monomials = l.expanded();
                for (key, coeff) in r.expanded() {
                    *monomials.entry(key).or_insert(0) += coeff;
                }
                monomials
            }
            SizeExpr::Mul(l, r) => {
                let lhs = l.expanded();
                let rhs = r.expanded();
                let mut monomials = BTreeMap::new();
                for (lkey, lcoeff) in &lhs {
                    for (rkey, rcoeff) in &rhs {
                        let mut key: Vec<&'static str> =
                            lkey.iter().chain(rkey.iter()).copied().collect();
                        key.sort_unstable();
                        *monomials.entry(key).or_insert(0) += lcoeff * rcoeff;
                    }
                }
                monomials
            }
        }
    }

    /// Compare two expressions monomial-by-monomial after expansion.
    ///
    /// Returns `Some((self_le_other, other_le_self))` when every monomial's
    /// coefficient in `self` is directly comparable (as a subset relation on
    /// an implicitly non-negative domain) to the matching one in `other`;
    /// returns `None` when neither dominates — some monomial favors `self`
    /// and another favors `other`. Firmware header generation uses this to
    /// pick the larger of two array bounds; the core protocol never needs it.
    #[must_use]
    pub fn compare_expanded(&self, other: &SizeExpr) -> Option<(bool, bool)> {
        let lhs = self.expanded();
        let rhs = other.expanded();

        let mut self_le_other = true;
        let mut other_le_self = true;

        let keys = lhs.keys().chain(rhs.keys());
        for key in keys {
            let l = lhs.get(key).copied().unwrap_or(0);
            let r = rhs.get(key).copied().unwrap_or(0);
            if l > r {
                self_le_other = false;
            }
            if r > l {
                other_le_self = false;
            }
        }

        if self_le_other || other_le_self {
            Some((self_le_other, other_le_self))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&'static str, u32)]) -> BTreeMap<&'static str, u32> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn add_identity_folds_away() {
        let x = SizeExpr::var("NUM_AXIS");
        assert_eq!(SizeExpr::constant(0).add(x.clone()), x);
        assert_eq!(x.clone().add(SizeExpr::constant(0)), x);
    }

    #[test]
    fn mul_identity_and_zero_fold() {
        let x = SizeExpr::var("NUM_AXIS");
        assert_eq!(SizeExpr::constant(1).mul(x.clone()), x);
        assert_eq!(x.clone().mul(SizeExpr::constant(0)), SizeExpr::constant(0));
    }

    #[test]
    fn const_folding_on_const_operands() {
        assert_eq!(SizeExpr::constant(2).add(SizeExpr::constant(3)), SizeExpr::constant(5));
        assert_eq!(SizeExpr::constant(2).mul(SizeExpr::constant(3)), SizeExpr::constant(6));
    }

    #[test]
    fn eval_resolves_bound_variables() {
        let expr = SizeExpr::constant(2).add(SizeExpr::var("NUM_AXIS"));
        assert_eq!(expr.eval(&env(&[("NUM_AXIS", 4)])), Some(6));
        assert_eq!(expr.eval(&BTreeMap::new()), None);
    }

    #[test]
    fn expanded_distributes_products() {
        let n = SizeExpr::var("NUM_AXIS");
        let expr = SizeExpr::constant(2).mul(n.clone()).add(SizeExpr::constant(3));
        let monomials = expr.expanded();
        assert_eq!(monomials.get(&vec!["NUM_AXIS"]), Some(&2));
        assert_eq!(monomials.get(&Vec::<&str>::new()), Some(&3));
    }

    #[test]
    fn compare_expanded_orders_strict_superset() {
        let n = SizeExpr::var("NUM_AXIS");
        let small = SizeExpr::constant(2).add(n.clone());
        let large = SizeExpr::constant(2).add(n).add(SizeExpr::constant(1));
        assert_eq!(small.compare_expanded(&large), Some((true, false)));
    }

    #[test]
    fn compare_expanded_incomparable_returns_none() {
        let a = SizeExpr::constant(1).add(SizeExpr::var("NUM_AXIS"));
        let b = SizeExpr::constant(2).add(SizeExpr::var("PERIPHERAL_STATUS"));
        assert_eq!(a.compare_expanded(&b), None);
    }
}
