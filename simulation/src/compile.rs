//! Compiles symbolic expressions into flat stack programs.
//!
//! A [`CompiledExpr`] has all symbols resolved to slot indices, so evaluating
//! one is a single pass over a small instruction vector with no lookups and
//! no allocation beyond the operand stack.

use crate::error::SymbolicError;
use crate::expr::{Expr, Function};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Instruction {
    Const(f64),
    Load(usize),
    Add(usize),
    Mul(usize),
    Pow,
    PowI(i32),
    Sqrt,
    Call(Function),
}

/// Pure numeric evaluator of one expression over a fixed slot layout.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledExpr {
    code: Vec<Instruction>,
    stack_depth: usize,
}

impl CompiledExpr {
    /// Compiles `expr`, binding each symbol to its position in `slots`.
    pub fn compile<S: AsRef<str>>(expr: &Expr, slots: &[S]) -> Result<Self, SymbolicError> {
        let mut code = Vec::new();
        let stack_depth = emit(expr, slots, &mut code)?;
        Ok(Self { code, stack_depth })
    }

    /// Constant zero. Used for entries that simplified away.
    pub fn zero() -> Self {
        Self {
            code: vec![Instruction::Const(0.0)],
            stack_depth: 1,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.code.as_slice(), [Instruction::Const(_)])
    }

    /// Evaluates the program. `values` must cover every slot the program
    /// was compiled against.
    pub fn eval(&self, values: &[f64]) -> f64 {
        if let [Instruction::Const(value)] = self.code.as_slice() {
            return *value;
        }

        let mut stack: Vec<f64> = Vec::with_capacity(self.stack_depth);
        for instruction in &self.code {
            match *instruction {
                Instruction::Const(value) => stack.push(value),
                Instruction::Load(slot) => stack.push(values[slot]),
                Instruction::Add(count) => {
                    let start = stack.len() - count;
                    let sum: f64 = stack.drain(start..).sum();
                    stack.push(sum);
                }
                Instruction::Mul(count) => {
                    let start = stack.len() - count;
                    let product: f64 = stack.drain(start..).product();
                    stack.push(product);
                }
                Instruction::Pow => {
                    let exponent = stack.pop().unwrap_or(f64::NAN);
                    let base = stack.pop().unwrap_or(f64::NAN);
                    stack.push(base.powf(exponent));
                }
                Instruction::PowI(exponent) => {
                    if let Some(top) = stack.last_mut() {
                        *top = top.powi(exponent);
                    }
                }
                Instruction::Sqrt => {
                    if let Some(top) = stack.last_mut() {
                        *top = top.sqrt();
                    }
                }
                Instruction::Call(function) => {
                    if let Some(top) = stack.last_mut() {
                        *top = function.apply(*top);
                    }
                }
            }
        }
        stack.pop().unwrap_or(f64::NAN)
    }
}

impl Default for CompiledExpr {
    fn default() -> Self {
        CompiledExpr::zero()
    }
}

/// Appends code for `expr` and returns the stack depth it needs.
fn emit<S: AsRef<str>>(
    expr: &Expr,
    slots: &[S],
    code: &mut Vec<Instruction>,
) -> Result<usize, SymbolicError> {
    Ok(match expr {
        Expr::Num(value) => {
            code.push(Instruction::Const(*value));
            1
        }
        Expr::Sym(name) => {
            let slot = slots
                .iter()
                .position(|s| s.as_ref() == name)
                .ok_or_else(|| SymbolicError::UnboundSymbol { name: name.clone() })?;
            code.push(Instruction::Load(slot));
            1
        }
        Expr::Add(terms) | Expr::Mul(terms) if terms.is_empty() => {
            let identity = if matches!(expr, Expr::Add(_)) { 0.0 } else { 1.0 };
            code.push(Instruction::Const(identity));
            1
        }
        Expr::Add(terms) | Expr::Mul(terms) => {
            let mut depth = 0;
            for (i, term) in terms.iter().enumerate() {
                depth = depth.max(i + emit(term, slots, code)?);
            }
            code.push(match expr {
                Expr::Add(_) => Instruction::Add(terms.len()),
                _ => Instruction::Mul(terms.len()),
            });
            depth
        }
        Expr::Pow(base, exponent) => {
            let depth = emit(base, slots, code)?;
            match exponent.as_num() {
                Some(e) if e == 0.5 => {
                    code.push(Instruction::Sqrt);
                    depth
                }
                Some(e) if e.fract() == 0.0 && e.abs() <= f64::from(i32::MAX) => {
                    code.push(Instruction::PowI(e as i32));
                    depth
                }
                _ => {
                    let exponent_depth = emit(exponent, slots, code)?;
                    code.push(Instruction::Pow);
                    depth.max(1 + exponent_depth)
                }
            }
        }
        Expr::Call(function, argument) => {
            let depth = emit(argument, slots, code)?;
            code.push(Instruction::Call(*function));
            depth
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    const SLOTS: [&str; 3] = ["t", "r", "phi"];

    fn check(text: &str, values: [f64; 3]) {
        let expr = parse(text).unwrap();
        let compiled = CompiledExpr::compile(&expr, &SLOTS).unwrap();
        let bindings: Vec<(&str, f64)> = SLOTS.iter().copied().zip(values).collect();
        let expected = expr.evaluate(&bindings).unwrap();
        let actual = compiled.eval(&values);
        assert!(
            (expected - actual).abs() < 1e-12,
            "{text}: expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_matches_tree_evaluation() {
        check("-(1 - 2/r)", [0.0, 5.0, 0.3]);
        check("1/(1 - 2/r)", [0.0, 5.0, 0.3]);
        check("r^2 * sin(phi)^2 + t", [1.0, 2.5, 0.9]);
        check("sqrt(r) * r^1.5 - exp(-r)", [0.0, 3.0, 0.0]);
        check("r^phi + ln(r) * cos(phi) - tan(phi)", [0.0, 1.7, 0.4]);
        check("abs(phi - r)", [0.0, 1.0, 0.25]);
    }

    #[test]
    fn test_unbound_symbol() {
        let expr = parse("2*M/r").unwrap();
        let err = CompiledExpr::compile(&expr, &SLOTS).unwrap_err();
        assert_eq!(err, SymbolicError::UnboundSymbol { name: "M".into() });
    }

    #[test]
    fn test_constant_program() {
        let compiled = CompiledExpr::compile(&Expr::num(-1.0), &SLOTS).unwrap();
        assert!(compiled.is_constant());
        assert_eq!(compiled.eval(&[0.0, 1.0, 2.0]), -1.0);
        assert_eq!(CompiledExpr::zero().eval(&[]), 0.0);
    }

    #[test]
    fn test_empty_sum_and_product() {
        let sum = CompiledExpr::compile(&Expr::Add(vec![]), &SLOTS).unwrap();
        let product = CompiledExpr::compile(&Expr::Mul(vec![]), &SLOTS).unwrap();
        assert_eq!(sum.eval(&[0.0; 3]), 0.0);
        assert_eq!(product.eval(&[0.0; 3]), 1.0);
    }
}
