//! Symbolic scalar expressions over named coordinates.
//!
//! Expressions are plain trees. Building one with the arithmetic operators
//! never simplifies; call [`Expr::simplify`] to bring a tree into canonical
//! form (see `simplify.rs`).

use std::collections::BTreeSet;
use std::fmt;
use std::ops;

use crate::error::SymbolicError;

/// Elementary functions understood by the parser, differentiator and compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Abs,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Function::Sin),
            "cos" => Some(Function::Cos),
            "tan" => Some(Function::Tan),
            "exp" => Some(Function::Exp),
            "ln" | "log" => Some(Function::Ln),
            "abs" => Some(Function::Abs),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Abs => "abs",
        }
    }

    pub fn apply(self, x: f64) -> f64 {
        match self {
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Exp => x.exp(),
            Function::Ln => x.ln(),
            Function::Abs => x.abs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Sym(String),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Function, Box<Expr>),
}

impl Expr {
    pub fn num(value: f64) -> Self {
        Expr::Num(value)
    }

    pub fn sym(name: impl Into<String>) -> Self {
        Expr::Sym(name.into())
    }

    pub fn zero() -> Self {
        Expr::Num(0.0)
    }

    pub fn one() -> Self {
        Expr::Num(1.0)
    }

    pub fn pow(self, exponent: Expr) -> Self {
        Expr::Pow(Box::new(self), Box::new(exponent))
    }

    pub fn powf(self, exponent: f64) -> Self {
        self.pow(Expr::Num(exponent))
    }

    pub fn call(function: Function, argument: Expr) -> Self {
        Expr::Call(function, Box::new(argument))
    }

    pub fn recip(self) -> Self {
        self.powf(-1.0)
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Expr::Num(value) => Some(*value),
            _ => None,
        }
    }

    /// True only for the literal zero. Call on simplified expressions.
    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Num(value) if *value == 0.0)
    }

    pub fn depends_on(&self, name: &str) -> bool {
        match self {
            Expr::Num(_) => false,
            Expr::Sym(symbol) => symbol == name,
            Expr::Add(terms) | Expr::Mul(terms) => terms.iter().any(|t| t.depends_on(name)),
            Expr::Pow(base, exponent) => base.depends_on(name) || exponent.depends_on(name),
            Expr::Call(_, argument) => argument.depends_on(name),
        }
    }

    /// Names of all symbols referenced by the expression.
    pub fn symbols(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_symbols(&mut out);
        out
    }

    fn collect_symbols<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Expr::Num(_) => {}
            Expr::Sym(name) => {
                out.insert(name.as_str());
            }
            Expr::Add(terms) | Expr::Mul(terms) => {
                for term in terms {
                    term.collect_symbols(out);
                }
            }
            Expr::Pow(base, exponent) => {
                base.collect_symbols(out);
                exponent.collect_symbols(out);
            }
            Expr::Call(_, argument) => argument.collect_symbols(out),
        }
    }

    /// Replaces every occurrence of `name` with `value`.
    pub fn substitute(&self, name: &str, value: &Expr) -> Expr {
        match self {
            Expr::Sym(symbol) if symbol == name => value.clone(),
            Expr::Num(_) | Expr::Sym(_) => self.clone(),
            Expr::Add(terms) => Expr::Add(terms.iter().map(|t| t.substitute(name, value)).collect()),
            Expr::Mul(terms) => Expr::Mul(terms.iter().map(|t| t.substitute(name, value)).collect()),
            Expr::Pow(base, exponent) => Expr::Pow(
                Box::new(base.substitute(name, value)),
                Box::new(exponent.substitute(name, value)),
            ),
            Expr::Call(function, argument) => {
                Expr::Call(*function, Box::new(argument.substitute(name, value)))
            }
        }
    }

    /// Tree-walking evaluation. Setup and tests only; the step loop uses
    /// [`crate::compile::CompiledExpr`].
    pub fn evaluate(&self, bindings: &[(&str, f64)]) -> Result<f64, SymbolicError> {
        Ok(match self {
            Expr::Num(value) => *value,
            Expr::Sym(name) => bindings
                .iter()
                .find(|(symbol, _)| symbol == name)
                .map(|(_, value)| *value)
                .ok_or_else(|| SymbolicError::UnboundSymbol { name: name.clone() })?,
            Expr::Add(terms) => {
                let mut sum = 0.0;
                for term in terms {
                    sum += term.evaluate(bindings)?;
                }
                sum
            }
            Expr::Mul(terms) => {
                let mut product = 1.0;
                for term in terms {
                    product *= term.evaluate(bindings)?;
                }
                product
            }
            Expr::Pow(base, exponent) => base.evaluate(bindings)?.powf(exponent.evaluate(bindings)?),
            Expr::Call(function, argument) => function.apply(argument.evaluate(bindings)?),
        })
    }

    /// Partial derivative with respect to the symbol `var`. The result is not
    /// simplified.
    pub fn diff(&self, var: &str) -> Result<Expr, SymbolicError> {
        if !self.depends_on(var) {
            return Ok(Expr::zero());
        }
        Ok(match self {
            Expr::Num(_) => Expr::zero(),
            Expr::Sym(_) => Expr::one(),
            Expr::Add(terms) => Expr::Add(
                terms
                    .iter()
                    .map(|t| t.diff(var))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Expr::Mul(factors) => {
                let mut terms = Vec::with_capacity(factors.len());
                for (i, factor) in factors.iter().enumerate() {
                    if !factor.depends_on(var) {
                        continue;
                    }
                    let mut product = factors.clone();
                    product[i] = factor.diff(var)?;
                    terms.push(Expr::Mul(product));
                }
                Expr::Add(terms)
            }
            Expr::Pow(base, exponent) if !exponent.depends_on(var) => {
                // d(b^e) = e * b^(e - 1) * b'
                let lowered = (**exponent).clone() - Expr::one();
                Expr::Mul(vec![
                    (**exponent).clone(),
                    (**base).clone().pow(lowered),
                    base.diff(var)?,
                ])
            }
            Expr::Pow(base, exponent) if !base.depends_on(var) => {
                // d(b^e) = b^e * ln(b) * e'
                Expr::Mul(vec![
                    self.clone(),
                    Expr::call(Function::Ln, (**base).clone()),
                    exponent.diff(var)?,
                ])
            }
            Expr::Pow(base, exponent) => {
                // d(b^e) = b^e * (e' ln(b) + e b' / b)
                let log_term = exponent.diff(var)? * Expr::call(Function::Ln, (**base).clone());
                let ratio_term = (**exponent).clone() * base.diff(var)? / (**base).clone();
                Expr::Mul(vec![self.clone(), log_term + ratio_term])
            }
            Expr::Call(function, argument) => {
                let inner = argument.diff(var)?;
                let arg = (**argument).clone();
                let outer = match function {
                    Function::Sin => Expr::call(Function::Cos, arg),
                    Function::Cos => -Expr::call(Function::Sin, arg),
                    Function::Tan => Expr::one() + Expr::call(Function::Tan, arg).powf(2.0),
                    Function::Exp => Expr::call(Function::Exp, arg),
                    Function::Ln => arg.recip(),
                    Function::Abs => {
                        return Err(SymbolicError::Unsupported {
                            operation: "differentiate",
                            expr: self.to_string(),
                        })
                    }
                };
                outer * inner
            }
        })
    }
}

impl Default for Expr {
    fn default() -> Self {
        Expr::zero()
    }
}

impl ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::Add(vec![self, rhs])
    }
}

impl ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::Add(vec![self, -rhs])
    }
}

impl ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::Mul(vec![self, rhs])
    }
}

impl ops::Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        Expr::Mul(vec![self, rhs.recip()])
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Mul(vec![Expr::Num(-1.0), self])
    }
}

// Binding strength used to decide where parentheses are needed.
const PREC_SUM: u8 = 1;
const PREC_PRODUCT: u8 = 2;
const PREC_POWER: u8 = 3;
const PREC_ATOM: u8 = 4;

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Num(value) if *value < 0.0 => PREC_SUM,
        Expr::Num(_) | Expr::Sym(_) | Expr::Call(..) => PREC_ATOM,
        Expr::Add(_) => PREC_SUM,
        Expr::Mul(factors) => match factors.first() {
            Some(Expr::Num(value)) if *value < 0.0 => PREC_SUM,
            _ => PREC_PRODUCT,
        },
        Expr::Pow(..) => PREC_POWER,
    }
}

fn write_prec(f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
    if precedence(expr) < min {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

/// Returns `-term` when the term carries a negative leading coefficient.
fn negated(term: &Expr) -> Option<Expr> {
    match term {
        Expr::Num(value) if *value < 0.0 => Some(Expr::Num(-value)),
        Expr::Mul(factors) => match factors.split_first() {
            Some((Expr::Num(value), rest)) if *value < 0.0 => {
                let mut flipped = Vec::with_capacity(factors.len());
                if *value != -1.0 {
                    flipped.push(Expr::Num(-value));
                }
                flipped.extend(rest.iter().cloned());
                Some(match flipped.len() {
                    1 => flipped.remove(0),
                    _ => Expr::Mul(flipped),
                })
            }
            _ => None,
        },
        _ => None,
    }
}

fn write_product(f: &mut fmt::Formatter<'_>, factors: &[Expr]) -> fmt::Result {
    let mut numerator = Vec::new();
    let mut denominator = Vec::new();
    for factor in factors {
        if let Expr::Pow(base, exponent) = factor {
            if let Some(e) = exponent.as_num().filter(|e| *e < 0.0) {
                denominator.push(if e == -1.0 {
                    (**base).clone()
                } else {
                    (**base).clone().powf(-e)
                });
                continue;
            }
        }
        numerator.push(factor);
    }

    if numerator.is_empty() {
        f.write_str("1")?;
    }
    for (i, factor) in numerator.iter().enumerate() {
        match (i, factor) {
            (0, Expr::Num(value)) => write!(f, "{value}")?,
            (0, _) => write_prec(f, factor, PREC_PRODUCT)?,
            _ => {
                f.write_str("*")?;
                write_prec(f, factor, PREC_PRODUCT)?;
            }
        }
    }
    match denominator.len() {
        0 => Ok(()),
        1 => {
            f.write_str("/")?;
            write_prec(f, &denominator[0], PREC_POWER)
        }
        _ => write!(f, "/({})", Expr::Mul(denominator)),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(value) => write!(f, "{value}"),
            Expr::Sym(name) => f.write_str(name),
            Expr::Add(terms) if terms.is_empty() => f.write_str("0"),
            Expr::Add(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    match (i, negated(term)) {
                        (0, _) => write!(f, "{term}")?,
                        (_, Some(positive)) => {
                            f.write_str(" - ")?;
                            write_prec(f, &positive, PREC_PRODUCT)?;
                        }
                        (_, None) => {
                            f.write_str(" + ")?;
                            write_prec(f, term, PREC_SUM + 1)?;
                        }
                    }
                }
                Ok(())
            }
            Expr::Mul(factors) if factors.is_empty() => f.write_str("1"),
            Expr::Mul(factors) => match factors.split_first() {
                Some((Expr::Num(value), rest)) if *value == -1.0 && !rest.is_empty() => {
                    f.write_str("-")?;
                    write_product(f, rest)
                }
                _ => write_product(f, factors),
            },
            Expr::Pow(_, exponent) if exponent.as_num().is_some_and(|e| e < 0.0) => {
                write_product(f, std::slice::from_ref(self))
            }
            Expr::Pow(base, exponent) => {
                write_prec(f, base, PREC_ATOM)?;
                f.write_str("^")?;
                write_prec(f, exponent, PREC_ATOM)
            }
            Expr::Call(function, argument) => write!(f, "{}({argument})", function.name()),
        }
    }
}
