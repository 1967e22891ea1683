//! Symbolic metric tensor over a (time, radius, angle) chart.

use std::collections::BTreeMap;

use crate::error::{ConfigError, SymbolicError};
use crate::expr::Expr;
use crate::parse::parse;
use crate::DIM;

/// Ordered coordinate names: time-like, radial, angular.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateSystem {
    names: [String; DIM],
}

impl CoordinateSystem {
    pub const TIME: usize = 0;
    pub const RADIUS: usize = 1;
    pub const ANGLE: usize = 2;

    pub fn new(time: impl Into<String>, radius: impl Into<String>, angle: impl Into<String>) -> Self {
        Self {
            names: [time.into(), radius.into(), angle.into()],
        }
    }

    /// `(t, r, phi)`.
    pub fn polar() -> Self {
        Self::new("t", "r", "phi")
    }

    pub fn names(&self) -> &[String; DIM] {
        &self.names
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn radial(&self) -> &str {
        &self.names[Self::RADIUS]
    }
}

impl Default for CoordinateSystem {
    fn default() -> Self {
        Self::polar()
    }
}

/// Diagonal metric g_{μν} held symbolically, with its inverse derived once
/// at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricTensor {
    coordinates: CoordinateSystem,
    components: [[Expr; DIM]; DIM],
    inverse: [[Expr; DIM]; DIM],
}

impl MetricTensor {
    /// Validates and simplifies `components`, then inverts them.
    ///
    /// Fails if an off-diagonal entry is not identically zero, if a diagonal
    /// entry reduces to zero, or if any entry references a symbol that is not
    /// one of the coordinates.
    pub fn new(coordinates: CoordinateSystem, components: [[Expr; DIM]; DIM]) -> Result<Self, ConfigError> {
        let mut simplified: [[Expr; DIM]; DIM] = Default::default();
        for (row, entries) in components.iter().enumerate() {
            for (col, entry) in entries.iter().enumerate() {
                if let Some(name) = entry
                    .symbols()
                    .into_iter()
                    .find(|s| !coordinates.names().iter().any(|c| c == s))
                {
                    return Err(ConfigError::UnknownSymbol { name: name.to_string() });
                }
                simplified[row][col] = entry.simplify()?;
            }
        }

        let mut inverse: [[Expr; DIM]; DIM] = Default::default();
        for i in 0..DIM {
            for j in 0..DIM {
                if i != j && !simplified[i][j].is_zero() {
                    return Err(ConfigError::NonDiagonal {
                        row: i,
                        col: j,
                        entry: simplified[i][j].to_string(),
                    });
                }
            }
            if simplified[i][i].is_zero() {
                return Err(ConfigError::Singular { index: i });
            }
            inverse[i][i] = simplified[i][i].clone().recip().simplify()?;
        }
        log::info!(
            "Inverted metric diag({}, {}, {})",
            simplified[0][0],
            simplified[1][1],
            simplified[2][2]
        );

        Ok(Self {
            coordinates,
            components: simplified,
            inverse,
        })
    }

    pub fn diagonal(coordinates: CoordinateSystem, diagonal: [Expr; DIM]) -> Result<Self, ConfigError> {
        let mut components: [[Expr; DIM]; DIM] = Default::default();
        for (i, entry) in diagonal.into_iter().enumerate() {
            components[i][i] = entry;
        }
        Self::new(coordinates, components)
    }

    /// Parses the three diagonal entries and substitutes `parameters` before
    /// building the tensor.
    pub fn parse_diagonal(
        coordinates: CoordinateSystem,
        diagonal: [&str; DIM],
        parameters: &BTreeMap<String, f64>,
    ) -> Result<Self, ConfigError> {
        let mut entries: [Expr; DIM] = Default::default();
        for (i, text) in diagonal.iter().enumerate() {
            let mut expr = parse(text).map_err(|source| ConfigError::Parse {
                component: component_label(&coordinates, i),
                source,
            })?;
            for (name, value) in parameters {
                expr = expr.substitute(name, &Expr::Num(*value));
            }
            log::debug!("g_{} = {expr}", component_label(&coordinates, i));
            entries[i] = expr;
        }
        log::info!("Parsed {} metric components", DIM);
        Self::diagonal(coordinates, entries)
    }

    pub fn coordinates(&self) -> &CoordinateSystem {
        &self.coordinates
    }

    pub fn entry(&self, row: usize, col: usize) -> &Expr {
        &self.components[row][col]
    }

    pub fn components(&self) -> &[[Expr; DIM]; DIM] {
        &self.components
    }

    pub fn inverse(&self) -> &[[Expr; DIM]; DIM] {
        &self.inverse
    }

    /// ∂_k g_{row,col}, simplified.
    pub fn partial(&self, row: usize, col: usize, k: usize) -> Result<Expr, SymbolicError> {
        self.components[row][col]
            .diff(self.coordinates.name(k))?
            .simplify()
    }
}

fn component_label(coordinates: &CoordinateSystem, index: usize) -> String {
    let name = coordinates.name(index);
    format!("{name}{name}")
}
