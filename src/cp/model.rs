//! CP model definition.

use super::variables::{BoolVar, LinearExpr};

/// A constraint in the CP model.
///
/// Every constraint is linear over boolean variables. Logical
/// relations (conjunction, at-most-one, at-least-one) are expressed
/// through the convenience builders on [`CpModel`].
#[derive(Debug, Clone)]
pub enum Constraint {
    /// `lower <= expr <= upper`. A missing bound is unconstrained.
    Linear {
        /// Label used in diagnostics.
        name: String,
        expr: LinearExpr,
        lower: Option<i64>,
        upper: Option<i64>,
    },

    /// Fixes a variable to a constant value.
    Fix { var: BoolVar, value: bool },
}

/// Objective function for the CP model.
#[derive(Debug, Clone)]
pub enum Objective {
    /// Minimize a linear combination of boolean variables.
    Minimize { terms: LinearExpr },

    /// Maximize a linear combination of boolean variables.
    Maximize { terms: LinearExpr },
}

impl Objective {
    /// The objective as an expression to maximize.
    ///
    /// Minimization is expressed by negating every coefficient.
    pub fn as_maximization(&self) -> LinearExpr {
        match self {
            Objective::Maximize { terms } => terms.clone(),
            Objective::Minimize { terms } => {
                terms.terms.iter().map(|&(v, c)| (v, -c)).collect()
            }
        }
    }

    /// Objective value in its own sense (not negated).
    pub fn evaluate(&self, values: &[bool]) -> i64 {
        match self {
            Objective::Maximize { terms } | Objective::Minimize { terms } => {
                terms.evaluate(values)
            }
        }
    }
}

/// A 0/1 constraint programming model.
///
/// Contains boolean variables, linear constraints, and an optional
/// objective function.
///
/// # Examples
///
/// ```
/// use u_allocate::cp::{CpModel, LinearExpr, Objective};
///
/// let mut model = CpModel::new("example");
/// let a = model.new_bool_var("a");
/// let b = model.new_bool_var("b");
/// model.add_le("at most one", LinearExpr::sum([a, b]), 1);
/// model.set_objective(Objective::Maximize { terms: LinearExpr::sum([a, b]) });
/// assert!(model.validate().is_ok());
/// assert_eq!(model.var_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct CpModel {
    /// Model name.
    pub name: String,
    /// Variable names, indexed by [`BoolVar::index`].
    pub var_names: Vec<String>,
    /// Constraints.
    pub constraints: Vec<Constraint>,
    /// Objective function.
    pub objective: Option<Objective>,
}

impl CpModel {
    /// Creates a new empty model.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            var_names: Vec::new(),
            constraints: Vec::new(),
            objective: None,
        }
    }

    /// Declares a new boolean variable.
    pub fn new_bool_var(&mut self, name: impl Into<String>) -> BoolVar {
        self.var_names.push(name.into());
        BoolVar(self.var_names.len() - 1)
    }

    /// Name of a variable.
    pub fn var_name(&self, var: BoolVar) -> &str {
        &self.var_names[var.0]
    }

    /// Adds a constraint.
    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    /// Convenience: `lower <= expr <= upper`.
    pub fn add_range(&mut self, name: impl Into<String>, expr: LinearExpr, lower: i64, upper: i64) {
        self.constraints.push(Constraint::Linear {
            name: name.into(),
            expr,
            lower: Some(lower),
            upper: Some(upper),
        });
    }

    /// Convenience: `expr <= upper`.
    pub fn add_le(&mut self, name: impl Into<String>, expr: LinearExpr, upper: i64) {
        self.constraints.push(Constraint::Linear {
            name: name.into(),
            expr,
            lower: None,
            upper: Some(upper),
        });
    }

    /// Convenience: `expr >= lower`.
    pub fn add_ge(&mut self, name: impl Into<String>, expr: LinearExpr, lower: i64) {
        self.constraints.push(Constraint::Linear {
            name: name.into(),
            expr,
            lower: Some(lower),
            upper: None,
        });
    }

    /// Convenience: `expr == value`.
    pub fn add_eq(&mut self, name: impl Into<String>, expr: LinearExpr, value: i64) {
        self.add_range(name, expr, value, value);
    }

    /// Convenience: fix a variable.
    pub fn fix(&mut self, var: BoolVar, value: bool) {
        self.constraints.push(Constraint::Fix { var, value });
    }

    /// Convenience: `target == a AND b`.
    ///
    /// Linearized as `target <= a`, `target <= b`, `target >= a + b - 1`.
    pub fn add_and(&mut self, target: BoolVar, a: BoolVar, b: BoolVar) {
        let name = self.var_names[target.0].clone();
        self.add_le(
            format!("{name}<=a"),
            LinearExpr::weighted([(target, 1), (a, -1)]),
            0,
        );
        self.add_le(
            format!("{name}<=b"),
            LinearExpr::weighted([(target, 1), (b, -1)]),
            0,
        );
        self.add_ge(
            format!("{name}>=a+b-1"),
            LinearExpr::weighted([(target, 1), (a, -1), (b, -1)]),
            -1,
        );
    }

    /// Sets the objective function.
    pub fn set_objective(&mut self, objective: Objective) {
        self.objective = Some(objective);
    }

    /// Validates the model for consistency.
    ///
    /// Checks that all referenced variables exist. A range with
    /// `lower > upper` is valid but unsatisfiable; solvers report it as
    /// infeasible.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.var_names.len();
        let check_expr = |expr: &LinearExpr| -> Result<(), String> {
            match expr.terms.iter().find(|(v, _)| v.0 >= n) {
                Some((v, _)) => Err(format!("undefined variable: #{}", v.0)),
                None => Ok(()),
            }
        };

        for constraint in &self.constraints {
            match constraint {
                Constraint::Linear { expr, .. } => check_expr(expr)?,
                Constraint::Fix { var, .. } => {
                    if var.0 >= n {
                        return Err(format!("undefined variable: #{}", var.0));
                    }
                }
            }
        }

        if let Some(Objective::Maximize { terms } | Objective::Minimize { terms }) = &self.objective
        {
            check_expr(terms)?;
        }
        Ok(())
    }

    /// Returns the number of variables.
    pub fn var_count(&self) -> usize {
        self.var_names.len()
    }

    /// Returns the number of constraints.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_creation() {
        let mut model = CpModel::new("test");
        let a = model.new_bool_var("a");
        let b = model.new_bool_var("b");
        model.add_range("pair", LinearExpr::sum([a, b]), 1, 2);
        model.set_objective(Objective::Maximize {
            terms: LinearExpr::sum([a]),
        });

        assert_eq!(model.var_count(), 2);
        assert_eq!(model.constraint_count(), 1);
        assert_eq!(model.var_name(b), "b");
        assert!(model.objective.is_some());
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_add_and_emits_three_constraints() {
        let mut model = CpModel::new("test");
        let a = model.new_bool_var("a");
        let b = model.new_bool_var("b");
        let both = model.new_bool_var("both");
        model.add_and(both, a, b);

        assert_eq!(model.constraint_count(), 3);
        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_undefined_variable() {
        let mut model = CpModel::new("test");
        model.add_le("bad", LinearExpr::sum([BoolVar(7)]), 1);

        assert!(model.validate().is_err());
    }

    #[test]
    fn test_undefined_fix() {
        let mut model = CpModel::new("test");
        model.fix(BoolVar(0), false);

        assert!(model.validate().is_err());
    }

    #[test]
    fn test_inverted_range_is_valid() {
        let mut model = CpModel::new("test");
        let a = model.new_bool_var("a");
        model.add_range("inverted", LinearExpr::sum([a]), 2, 1);

        assert!(model.validate().is_ok());
    }

    #[test]
    fn test_minimize_as_maximization() {
        let mut model = CpModel::new("test");
        let a = model.new_bool_var("a");
        let objective = Objective::Minimize {
            terms: LinearExpr::weighted([(a, 3)]),
        };

        assert_eq!(objective.as_maximization().terms, vec![(a, -3)]);
        assert_eq!(objective.evaluate(&[true]), 3);
    }
}
