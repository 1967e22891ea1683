//! Canonical-form simplification.
//!
//! Sums and products are flattened, numeric constants folded, like terms
//! collected (`2*r - 2*r` -> `0`) and equal bases merged by adding exponents
//! (`r^-2 * r` -> `1/r`). Children are sorted by a fixed total order so that
//! structurally equal results compare equal. Nothing here is a full
//! computer-algebra normal form; it is enough to surface exact zeros and keep
//! compiled evaluators small.

use std::cmp::Ordering;

use crate::error::SymbolicError;
use crate::expr::{Expr, Function};

impl Expr {
    pub fn simplify(&self) -> Result<Expr, SymbolicError> {
        match self {
            Expr::Num(value) => finite(*value, self),
            Expr::Sym(_) => Ok(self.clone()),
            Expr::Add(terms) => {
                let terms = terms.iter().map(Expr::simplify).collect::<Result<Vec<_>, _>>()?;
                collect_sum(terms)
            }
            Expr::Mul(factors) => {
                let factors = factors.iter().map(Expr::simplify).collect::<Result<Vec<_>, _>>()?;
                collect_product(factors)
            }
            Expr::Pow(base, exponent) => simplify_pow(base.simplify()?, exponent.simplify()?),
            Expr::Call(function, argument) => simplify_call(*function, argument.simplify()?),
        }
    }
}

fn finite(value: f64, origin: &Expr) -> Result<Expr, SymbolicError> {
    if value.is_finite() {
        // Normalise -0.0 so that zero checks and ordering agree.
        Ok(Expr::Num(value + 0.0))
    } else {
        Err(SymbolicError::NonFinite {
            expr: origin.to_string(),
        })
    }
}

fn is_integer(value: f64) -> bool {
    value.fract() == 0.0
}

/// Splits `c * m` into `(c, m)`. Expressions without a numeric leading factor
/// have coefficient one.
fn split_coefficient(term: Expr) -> (f64, Expr) {
    match term {
        Expr::Mul(mut factors) => match factors.first() {
            Some(Expr::Num(c)) => {
                let c = *c;
                factors.remove(0);
                let rest = match factors.len() {
                    1 => factors.remove(0),
                    _ => Expr::Mul(factors),
                };
                (c, rest)
            }
            _ => (1.0, Expr::Mul(factors)),
        },
        other => (1.0, other),
    }
}

/// Multiplies an already-canonical monomial by a numeric coefficient.
fn scale(coefficient: f64, monomial: Expr) -> Expr {
    if coefficient == 1.0 {
        return monomial;
    }
    match monomial {
        Expr::Num(value) => Expr::Num(coefficient * value),
        Expr::Mul(mut factors) => {
            match factors.first_mut() {
                Some(Expr::Num(c)) => *c *= coefficient,
                _ => factors.insert(0, Expr::Num(coefficient)),
            }
            Expr::Mul(factors)
        }
        other => Expr::Mul(vec![Expr::Num(coefficient), other]),
    }
}

fn collect_sum(terms: Vec<Expr>) -> Result<Expr, SymbolicError> {
    let mut constant = 0.0;
    let mut collected: Vec<(Expr, f64)> = Vec::new();
    let mut pending = terms;

    while let Some(term) = pending.pop() {
        match term {
            Expr::Add(inner) => pending.extend(inner),
            Expr::Num(value) => constant += value,
            other => {
                let (coefficient, monomial) = split_coefficient(other);
                match collected.iter_mut().find(|(m, _)| *m == monomial) {
                    Some((_, c)) => *c += coefficient,
                    None => collected.push((monomial, coefficient)),
                }
            }
        }
    }

    let mut result: Vec<Expr> = collected
        .into_iter()
        .filter(|(_, c)| *c != 0.0)
        .map(|(m, c)| scale(c, m))
        .collect();
    if !constant.is_finite() {
        return Err(SymbolicError::NonFinite {
            expr: Expr::Add(result).to_string(),
        });
    }
    if constant != 0.0 {
        result.push(Expr::Num(constant));
    }
    result.sort_by(canonical_cmp);

    Ok(match result.len() {
        0 => Expr::zero(),
        1 => result.remove(0),
        _ => Expr::Add(result),
    })
}

fn collect_product(factors: Vec<Expr>) -> Result<Expr, SymbolicError> {
    let mut coefficient = 1.0;
    let mut powers: Vec<(Expr, Vec<Expr>)> = Vec::new();
    let mut pending = factors;

    while let Some(factor) = pending.pop() {
        let (base, exponent) = match factor {
            Expr::Mul(inner) => {
                pending.extend(inner);
                continue;
            }
            Expr::Num(value) => {
                coefficient *= value;
                continue;
            }
            Expr::Pow(base, exponent) => (*base, *exponent),
            other => (other, Expr::one()),
        };
        match powers.iter_mut().find(|(b, _)| *b == base) {
            Some((_, exponents)) => exponents.push(exponent),
            None => powers.push((base, vec![exponent])),
        }
    }

    if coefficient == 0.0 {
        return Ok(Expr::zero());
    }

    let mut rest = Vec::with_capacity(powers.len());
    for (base, exponents) in powers {
        let exponent = collect_sum(exponents)?;
        match simplify_pow(base, exponent)? {
            Expr::Num(value) => coefficient *= value,
            Expr::Mul(inner) => {
                for factor in inner {
                    match factor {
                        Expr::Num(value) => coefficient *= value,
                        other => rest.push(other),
                    }
                }
            }
            other => rest.push(other),
        }
    }

    if !coefficient.is_finite() {
        return Err(SymbolicError::NonFinite {
            expr: Expr::Mul(rest).to_string(),
        });
    }
    if coefficient == 0.0 {
        return Ok(Expr::zero());
    }
    rest.sort_by(canonical_cmp);

    // A number times a single sum distributes: 2*(1 - r) -> 2 - 2*r.
    if coefficient != 1.0 && rest.len() == 1 {
        if let Expr::Add(terms) = &rest[0] {
            let scaled = terms
                .iter()
                .cloned()
                .map(|t| {
                    let (c, m) = split_coefficient(t);
                    scale(c * coefficient, m)
                })
                .collect();
            return collect_sum(scaled);
        }
    }

    Ok(match (coefficient, rest.len()) {
        (c, 0) => Expr::Num(c),
        (c, 1) if c == 1.0 => rest.remove(0),
        (c, _) if c == 1.0 => Expr::Mul(rest),
        (c, _) => {
            rest.insert(0, Expr::Num(c));
            Expr::Mul(rest)
        }
    })
}

fn simplify_pow(base: Expr, exponent: Expr) -> Result<Expr, SymbolicError> {
    let integer_exponent = exponent.as_num().filter(|e| is_integer(*e));
    match (base, exponent) {
        (_, Expr::Num(e)) if e == 0.0 => Ok(Expr::one()),
        (base, Expr::Num(e)) if e == 1.0 => Ok(base),
        (Expr::Num(b), Expr::Num(e)) => {
            let origin = Expr::Num(b).powf(e);
            finite(b.powf(e), &origin)
        }
        (Expr::Num(b), _) if b == 1.0 => Ok(Expr::one()),
        // (b^m)^n = b^(m n) holds for integer n.
        (Expr::Pow(inner_base, inner_exponent), exponent) if integer_exponent.is_some() => {
            let combined = collect_product(vec![*inner_exponent, exponent])?;
            simplify_pow(*inner_base, combined)
        }
        // (a b)^n = a^n b^n holds for integer n.
        (Expr::Mul(factors), Expr::Num(e)) if integer_exponent.is_some() => {
            let mut powered = Vec::with_capacity(factors.len());
            for factor in factors {
                powered.push(simplify_pow(factor, Expr::Num(e))?);
            }
            collect_product(powered)
        }
        (base, exponent) => Ok(base.pow(exponent)),
    }
}

fn simplify_call(function: Function, argument: Expr) -> Result<Expr, SymbolicError> {
    match (function, argument) {
        (function, Expr::Num(value)) => {
            let origin = Expr::call(function, Expr::Num(value));
            finite(function.apply(value), &origin)
        }
        (Function::Ln, Expr::Call(Function::Exp, inner)) => Ok(*inner),
        (function, argument) => Ok(Expr::call(function, argument)),
    }
}

fn rank(expr: &Expr) -> u8 {
    match expr {
        Expr::Num(_) => 0,
        Expr::Sym(_) => 1,
        Expr::Call(..) => 2,
        Expr::Pow(..) => 3,
        Expr::Mul(_) => 4,
        Expr::Add(_) => 5,
    }
}

fn cmp_slices(a: &[Expr], b: &[Expr]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        let ordering = canonical_cmp(x, y);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.len().cmp(&b.len())
}

/// Total order used to sort the children of sums and products.
pub(crate) fn canonical_cmp(a: &Expr, b: &Expr) -> Ordering {
    match (a, b) {
        (Expr::Num(x), Expr::Num(y)) => x.total_cmp(y),
        (Expr::Sym(x), Expr::Sym(y)) => x.cmp(y),
        (Expr::Call(f, x), Expr::Call(g, y)) => f.cmp(g).then_with(|| canonical_cmp(x, y)),
        (Expr::Pow(b1, e1), Expr::Pow(b2, e2)) => {
            canonical_cmp(b1, b2).then_with(|| canonical_cmp(e1, e2))
        }
        (Expr::Mul(x), Expr::Mul(y)) | (Expr::Add(x), Expr::Add(y)) => cmp_slices(x, y),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn simplified(text: &str) -> Expr {
        parse(text).unwrap().simplify().unwrap()
    }

    #[test]
    fn test_constant_folding() {
        assert_eq!(simplified("2 * 3 + 4 - 10"), Expr::zero());
        assert_eq!(simplified("-(-1)"), Expr::one());
    }

    #[test]
    fn test_like_terms_cancel() {
        assert_eq!(simplified("2*r - 2*r"), Expr::zero());
        assert_eq!(simplified("r + r"), simplified("2*r"));
        assert_eq!(simplified("r*phi - phi*r"), Expr::zero());
    }

    #[test]
    fn test_powers_merge() {
        assert_eq!(simplified("r^-2 * r"), Expr::sym("r").recip());
        assert_eq!(simplified("r * r"), Expr::sym("r").powf(2.0));
        assert_eq!(simplified("(r^2)^-1"), Expr::sym("r").powf(-2.0));
        assert_eq!(simplified("r^2 / r^2"), Expr::one());
    }

    #[test]
    fn test_reciprocal_of_reciprocal() {
        assert_eq!(simplified("1/(1/(1 - 2/r))"), simplified("1 - 2/r"));
    }

    #[test]
    fn test_numeric_coefficient_distributes() {
        assert_eq!(simplified("2*(1 - r) + 2*r"), Expr::num(2.0));
        assert_eq!(simplified("(2*r)^2"), simplified("4*r^2"));
    }

    #[test]
    fn test_half_powers_are_kept() {
        // (r^2)^(1/2) is |r|, not r, so it must not collapse.
        let e = simplified("(r^2)^0.5");
        assert!(matches!(e, Expr::Pow(..)));
    }

    #[test]
    fn test_ordering_is_canonical() {
        assert_eq!(simplified("phi + r + 1"), simplified("1 + r + phi"));
        assert_eq!(simplified("sin(phi)*r"), simplified("r*sin(phi)"));
    }

    #[test]
    fn test_function_folding() {
        assert_eq!(simplified("sin(0) + cos(0)"), Expr::one());
        assert_eq!(simplified("ln(exp(r))"), Expr::sym("r"));
    }

    #[test]
    fn test_non_finite_constant_is_an_error() {
        let err = parse("1/0").unwrap().simplify().unwrap_err();
        assert!(matches!(err, SymbolicError::NonFinite { .. }));
        assert!(parse("ln(0) + r").unwrap().simplify().is_err());
    }

    #[test]
    fn test_simplify_preserves_value() {
        let e = parse("(1 - 2/r)^-1 * (2*r^-2) * r^3 + sin(phi)^2 + cos(phi)^2").unwrap();
        let s = e.simplify().unwrap();
        let bindings = [("r", 3.7), ("phi", 0.4)];
        let before = e.evaluate(&bindings).unwrap();
        let after = s.evaluate(&bindings).unwrap();
        assert!((before - after).abs() < 1e-12);
    }
}
