//! Levi-Civita connection of a symbolic metric and its compiled evaluators.
//!
//! The symbolic work (differentiation, contraction, simplification) happens
//! exactly once in [`Connection::build`]. Stepping only ever touches the
//! compiled programs behind the [`Spacetime`] trait.

use crate::compile::CompiledExpr;
use crate::error::ConfigError;
use crate::expr::Expr;
use crate::metric::{CoordinateSystem, MetricTensor};
use crate::DIM;

/// Coordinate values `(t, r, phi)`.
pub type Point = [f64; DIM];
/// Numeric g_{μν} at a point.
pub type MetricValues = [[f64; DIM]; DIM];
/// Numeric Γ^i_{jk} at a point, indexed `[i][j][k]`.
pub type ChristoffelValues = [[[f64; DIM]; DIM]; DIM];

/// Numeric view of a spacetime: metric and connection at a coordinate point.
///
/// Implementations must be pure functions of `point`.
pub trait Spacetime {
    fn metric_at(&self, point: &Point) -> MetricValues;
    fn christoffel_at(&self, point: &Point) -> ChristoffelValues;
}

impl<S: Spacetime + ?Sized> Spacetime for &S {
    fn metric_at(&self, point: &Point) -> MetricValues {
        (**self).metric_at(point)
    }

    fn christoffel_at(&self, point: &Point) -> ChristoffelValues {
        (**self).christoffel_at(point)
    }
}

/// Γ^i_{jk} in symbolic form, each entry simplified independently.
#[derive(Debug, Clone, PartialEq)]
pub struct ChristoffelSymbols {
    symbols: [[[Expr; DIM]; DIM]; DIM],
}

impl ChristoffelSymbols {
    /// Γ^i_{jk} = ½ Σ_l g^{il} (∂_k g_{jl} + ∂_j g_{kl} − ∂_l g_{jk})
    pub fn derive(metric: &MetricTensor) -> Result<Self, ConfigError> {
        // partials[a][b][c] = ∂_c g_{ab}
        let mut partials: [[[Expr; DIM]; DIM]; DIM] = Default::default();
        for (a, rows) in partials.iter_mut().enumerate() {
            for (b, entries) in rows.iter_mut().enumerate() {
                for (c, entry) in entries.iter_mut().enumerate() {
                    *entry = metric.partial(a, b, c)?;
                }
            }
        }

        let inverse = metric.inverse();
        let mut symbols: [[[Expr; DIM]; DIM]; DIM] = Default::default();
        for i in 0..DIM {
            for j in 0..DIM {
                for k in 0..DIM {
                    let mut terms = Vec::new();
                    for l in 0..DIM {
                        if inverse[i][l].is_zero() {
                            continue;
                        }
                        let bracket = Expr::Add(vec![
                            partials[j][l][k].clone(),
                            partials[k][l][j].clone(),
                            -partials[j][k][l].clone(),
                        ]);
                        terms.push(inverse[i][l].clone() * bracket);
                    }
                    symbols[i][j][k] = (Expr::num(0.5) * Expr::Add(terms)).simplify()?;
                }
            }
        }

        Ok(Self { symbols })
    }

    pub fn symbol(&self, i: usize, j: usize, k: usize) -> &Expr {
        &self.symbols[i][j][k]
    }

    /// Entries that did not simplify to zero, with their `(i, j, k)` index.
    pub fn non_zero(&self) -> impl Iterator<Item = ((usize, usize, usize), &Expr)> {
        self.symbols.iter().enumerate().flat_map(|(i, plane)| {
            plane.iter().enumerate().flat_map(move |(j, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, symbol)| !symbol.is_zero())
                    .map(move |(k, symbol)| ((i, j, k), symbol))
            })
        })
    }
}

/// Compiled numeric evaluators for a metric and its connection.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSpacetime {
    metric: [[CompiledExpr; DIM]; DIM],
    christoffel: [[[CompiledExpr; DIM]; DIM]; DIM],
}

impl CompiledSpacetime {
    pub fn compile(metric: &MetricTensor, symbols: &ChristoffelSymbols) -> Result<Self, ConfigError> {
        let slots = metric.coordinates().names();
        let compile = |expr: &Expr| -> Result<CompiledExpr, ConfigError> {
            if expr.is_zero() {
                Ok(CompiledExpr::zero())
            } else {
                Ok(CompiledExpr::compile(expr, slots)?)
            }
        };

        let mut compiled_metric: [[CompiledExpr; DIM]; DIM] = Default::default();
        let mut compiled_christoffel: [[[CompiledExpr; DIM]; DIM]; DIM] = Default::default();
        for i in 0..DIM {
            for j in 0..DIM {
                compiled_metric[i][j] = compile(metric.entry(i, j))?;
                for k in 0..DIM {
                    compiled_christoffel[i][j][k] = compile(symbols.symbol(i, j, k))?;
                }
            }
        }

        Ok(Self {
            metric: compiled_metric,
            christoffel: compiled_christoffel,
        })
    }
}

impl Spacetime for CompiledSpacetime {
    fn metric_at(&self, point: &Point) -> MetricValues {
        let mut values = [[0.0; DIM]; DIM];
        for (row, programs) in values.iter_mut().zip(&self.metric) {
            for (value, program) in row.iter_mut().zip(programs) {
                *value = program.eval(point);
            }
        }
        values
    }

    fn christoffel_at(&self, point: &Point) -> ChristoffelValues {
        let mut values = [[[0.0; DIM]; DIM]; DIM];
        for (plane, programs) in values.iter_mut().zip(&self.christoffel) {
            for (row, programs) in plane.iter_mut().zip(programs) {
                for (value, program) in row.iter_mut().zip(programs) {
                    *value = program.eval(point);
                }
            }
        }
        values
    }
}

/// A metric together with its derived connection, ready for stepping.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    metric: MetricTensor,
    symbols: ChristoffelSymbols,
    compiled: CompiledSpacetime,
}

impl Connection {
    /// Derives the Christoffel symbols and compiles both evaluators.
    ///
    /// Runs the O(n^4) symbolic derivation; call once per metric.
    pub fn build(metric: MetricTensor) -> Result<Self, ConfigError> {
        let symbols = ChristoffelSymbols::derive(&metric)?;
        let count = symbols.non_zero().count();
        log::info!("Derived {count} non-zero Christoffel symbols");
        let names = metric.coordinates().names();
        for ((i, j, k), symbol) in symbols.non_zero() {
            log::debug!("Γ^{}_{}{} = {symbol}", names[i], names[j], names[k]);
        }

        let compiled = CompiledSpacetime::compile(&metric, &symbols)?;
        log::info!("Compiled metric and connection evaluators");

        Ok(Self {
            metric,
            symbols,
            compiled,
        })
    }

    pub fn metric(&self) -> &MetricTensor {
        &self.metric
    }

    pub fn symbols(&self) -> &ChristoffelSymbols {
        &self.symbols
    }

    pub fn compiled(&self) -> &CompiledSpacetime {
        &self.compiled
    }
}

impl Spacetime for Connection {
    fn metric_at(&self, point: &Point) -> MetricValues {
        self.compiled.metric_at(point)
    }

    fn christoffel_at(&self, point: &Point) -> ChristoffelValues {
        self.compiled.christoffel_at(point)
    }
}

/// Builds a connection from a coordinate system and metric components.
pub fn build(coordinates: CoordinateSystem, components: [[Expr; DIM]; DIM]) -> Result<Connection, ConfigError> {
    Connection::build(MetricTensor::new(coordinates, components)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;
    use std::collections::BTreeMap;

    fn connection(diagonal: [&str; DIM]) -> Connection {
        let metric =
            MetricTensor::parse_diagonal(CoordinateSystem::polar(), diagonal, &BTreeMap::new()).unwrap();
        Connection::build(metric).unwrap()
    }

    fn simplified(text: &str) -> Expr {
        parse(text).unwrap().simplify().unwrap()
    }

    #[test]
    fn test_flat_polar_symbols() {
        let flat = connection(["-1", "1", "r^2"]);
        let symbols = flat.symbols();
        assert_eq!(symbols.symbol(1, 2, 2), &simplified("-r"));
        assert_eq!(symbols.symbol(2, 1, 2), &simplified("1/r"));
        assert_eq!(symbols.symbol(2, 2, 1), &simplified("1/r"));
        assert_eq!(symbols.non_zero().count(), 3);
    }

    #[test]
    fn test_cartesian_like_metric_has_no_connection() {
        let flat = connection(["-1", "1", "1"]);
        assert_eq!(flat.symbols().non_zero().count(), 0);
        let values = flat.christoffel_at(&[0.0, 3.0, 1.0]);
        assert!(values.iter().flatten().flatten().all(|v| *v == 0.0));
    }

    #[test]
    fn test_schwarzschild_values() {
        let bh = connection(["-(1 - 2/r)", "1/(1 - 2/r)", "r^2"]);
        let r = 5.0;
        let gamma = bh.christoffel_at(&[0.0, r, 0.3]);
        let f = 1.0 - 2.0 / r;
        assert!((gamma[0][0][1] - 1.0 / (r * r * f)).abs() < 1e-12);
        assert!((gamma[1][0][0] - f / (r * r)).abs() < 1e-12);
        assert!((gamma[1][1][1] + 1.0 / (r * r * f)).abs() < 1e-12);
        assert!((gamma[1][2][2] + r * f).abs() < 1e-12);
        assert!((gamma[2][1][2] - 1.0 / r).abs() < 1e-12);

        let g = bh.metric_at(&[0.0, r, 0.3]);
        assert!((g[0][0] + f).abs() < 1e-12);
        assert!((g[1][1] - 1.0 / f).abs() < 1e-12);
        assert!((g[2][2] - r * r).abs() < 1e-12);
        assert_eq!(g[0][1], 0.0);
    }

    #[test]
    fn test_lower_indices_symmetric() {
        let warped = connection([
            "-(1 - 2/r) * exp(sin(phi)/r)",
            "1/(1 - 2/r) + cos(phi)^2",
            "r^2 * (2 + sin(phi))",
        ]);
        for point in [[0.0, 4.0, 0.2], [0.0, 7.5, 2.9], [0.0, 2.5, -1.3]] {
            let gamma = warped.christoffel_at(&point);
            for (i, plane) in gamma.iter().enumerate() {
                for j in 0..DIM {
                    for k in 0..DIM {
                        assert!(
                            (plane[j][k] - plane[k][j]).abs() < 1e-12,
                            "Γ^{i}_{j}{k} != Γ^{i}_{k}{j} at {point:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_time_coordinate_held_constant() {
        // g_tt depending on t still compiles; the evaluator just takes t = 0.
        let c = connection(["-(1 + t^2)", "1", "r^2"]);
        let g = c.metric_at(&[0.0, 2.0, 0.0]);
        assert_eq!(g[0][0], -1.0);
    }

    #[test]
    fn test_unsupported_derivative_aborts_build() {
        let metric = MetricTensor::parse_diagonal(
            CoordinateSystem::polar(),
            ["-1", "abs(r - 3) + 1", "r^2"],
            &BTreeMap::new(),
        )
        .unwrap();
        assert!(matches!(
            Connection::build(metric),
            Err(ConfigError::Symbolic(crate::error::SymbolicError::Unsupported { .. }))
        ));
    }

    #[test]
    fn test_build_from_components() {
        let mut components: [[Expr; DIM]; DIM] = Default::default();
        components[0][0] = Expr::num(-1.0);
        components[1][1] = Expr::one();
        components[2][2] = Expr::sym("r").powf(2.0);
        let c = build(CoordinateSystem::polar(), components).unwrap();
        assert_eq!(c.symbols().non_zero().count(), 3);
    }
}
