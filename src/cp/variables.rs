//! CP variable and expression types.

use std::collections::HashMap;

/// A boolean decision variable.
///
/// A lightweight handle into a [`CpModel`](super::CpModel)'s variable
/// table. Handles are only meaningful for the model that created them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoolVar(pub(crate) usize);

impl BoolVar {
    /// Position of this variable in the model's variable table.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A linear combination of boolean variables with integer coefficients.
///
/// # Examples
///
/// ```
/// use u_allocate::cp::{CpModel, LinearExpr};
///
/// let mut model = CpModel::new("example");
/// let a = model.new_bool_var("a");
/// let b = model.new_bool_var("b");
///
/// let mut expr = LinearExpr::sum([a, b]);
/// expr.add_term(a, 2);
/// assert_eq!(expr.evaluate(&[true, false]), 3);
/// assert_eq!(expr.max_value(), 4);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinearExpr {
    /// (variable, coefficient) pairs. A variable may appear more than once.
    pub terms: Vec<(BoolVar, i64)>,
}

impl LinearExpr {
    /// Creates an empty expression (constant zero).
    pub fn new() -> Self {
        Self { terms: Vec::new() }
    }

    /// Unit-coefficient sum of the given variables.
    pub fn sum(vars: impl IntoIterator<Item = BoolVar>) -> Self {
        Self {
            terms: vars.into_iter().map(|v| (v, 1)).collect(),
        }
    }

    /// Weighted sum of the given (variable, coefficient) pairs.
    pub fn weighted(terms: impl IntoIterator<Item = (BoolVar, i64)>) -> Self {
        Self {
            terms: terms.into_iter().collect(),
        }
    }

    /// Appends `coef * var`.
    pub fn add_term(&mut self, var: BoolVar, coef: i64) {
        self.terms.push((var, coef));
    }

    /// Appends every term of `other`.
    pub fn extend(&mut self, other: &LinearExpr) {
        self.terms.extend_from_slice(&other.terms);
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value of the expression under a full assignment indexed by variable.
    pub fn evaluate(&self, values: &[bool]) -> i64 {
        self.terms
            .iter()
            .filter(|(v, _)| values[v.0])
            .map(|&(_, c)| c)
            .sum()
    }

    /// Smallest value the expression can take.
    pub fn min_value(&self) -> i64 {
        self.terms.iter().map(|&(_, c)| c.min(0)).sum()
    }

    /// Largest value the expression can take.
    pub fn max_value(&self) -> i64 {
        self.terms.iter().map(|&(_, c)| c.max(0)).sum()
    }

    /// Merges repeated variables into a single term and drops zero
    /// coefficients. Term order follows first occurrence.
    pub fn normalized(&self) -> Self {
        let mut position: HashMap<BoolVar, usize> = HashMap::with_capacity(self.terms.len());
        let mut out: Vec<(BoolVar, i64)> = Vec::with_capacity(self.terms.len());
        for &(var, coef) in &self.terms {
            match position.get(&var) {
                Some(&i) => out[i].1 += coef,
                None => {
                    position.insert(var, out.len());
                    out.push((var, coef));
                }
            }
        }
        out.retain(|&(_, c)| c != 0);
        Self { terms: out }
    }
}

impl FromIterator<(BoolVar, i64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (BoolVar, i64)>>(iter: I) -> Self {
        Self::weighted(iter)
    }
}
