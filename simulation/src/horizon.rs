//! Event horizon detection from the radial metric component.
//!
//! A horizon sits where g_rr diverges, i.e. at a root of 1/g_rr. Roots are
//! found numerically: 1/g_rr is sampled on a log-spaced radial grid. Sign
//! changes are refined by bisection, and local minima of |1/g_rr| (roots of
//! even multiplicity, which touch zero without crossing it) by golden-section
//! search. Candidates whose residual is not close to zero, such as sign
//! changes across a pole of 1/g_rr, are discarded. The outermost root wins.
//!
//! While 1/g_rr is still varying at the end of the grid the scan continues
//! outward one decade at a time, up to [`MAX_EXTENSIONS`] decades.

use crate::compile::CompiledExpr;
use crate::error::HorizonError;
use crate::expr::Expr;

/// Largest absolute value of 1/g_rr accepted at a refined root.
const ROOT_RESIDUAL: f64 = 1e-6;
const MAX_BISECTIONS: usize = 200;
/// Decades the scan may run past `max_radius`.
pub const MAX_EXTENSIONS: usize = 6;
/// Relative change of 1/g_rr over the last decade below which it counts as
/// settled.
const SETTLED: f64 = 1e-2;
const INV_PHI: f64 = 0.618_033_988_749_894_9;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Horizon {
    radius: Option<f64>,
}

impl Horizon {
    pub fn none() -> Self {
        Self { radius: None }
    }

    pub fn at(radius: f64) -> Self {
        Self {
            radius: Some(radius),
        }
    }

    pub fn radius(&self) -> Option<f64> {
        self.radius
    }

    pub fn is_present(&self) -> bool {
        self.radius.is_some()
    }
}

pub trait HorizonDetector {
    /// Finds the outermost horizon of `g_rr`, a function of `radial` only.
    fn detect(&self, g_rr: &Expr, radial: &str) -> Result<Horizon, HorizonError>;
}

/// Scan of 1/g_rr over `[min_radius, max_radius]`, extended outward while
/// 1/g_rr has not settled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootScan {
    pub min_radius: f64,
    pub max_radius: f64,
    pub samples: usize,
    /// Relative width at which bisection stops.
    pub tolerance: f64,
}

impl Default for RootScan {
    fn default() -> Self {
        Self {
            min_radius: 1e-3,
            max_radius: 1e3,
            samples: 4096,
            tolerance: 1e-14,
        }
    }
}

impl RootScan {
    fn ratio(&self) -> f64 {
        let samples = self.samples.max(2);
        (self.max_radius / self.min_radius).powf(1.0 / (samples - 1) as f64)
    }

    fn grid(&self) -> impl Iterator<Item = f64> + '_ {
        let ratio = self.ratio();
        (0..self.samples.max(2)).map(move |k| self.min_radius * ratio.powi(k as i32))
    }

    /// Samples in `(start, 10 * start]` at the grid's density.
    fn decade(&self, start: f64) -> impl Iterator<Item = f64> {
        let steps = (10f64.ln() / self.ratio().ln()).ceil().max(1.0) as i32;
        let step = 10f64.powf(1.0 / steps as f64);
        (1..=steps).map(move |k| if k == steps { 10.0 * start } else { start * step.powi(k) })
    }

    /// Refines a bracketed sign change. `None` if the bracket closes on a
    /// pole or crosses a non-finite region.
    fn bisect(&self, f: impl Fn(f64) -> f64, mut lo: f64, mut f_lo: f64, mut hi: f64) -> Option<f64> {
        for _ in 0..MAX_BISECTIONS {
            if hi - lo <= self.tolerance * hi {
                break;
            }
            let mid = 0.5 * (lo + hi);
            let f_mid = f(mid);
            if !f_mid.is_finite() {
                return None;
            }
            if f_mid == 0.0 {
                return Some(mid);
            }
            if f_mid.signum() == f_lo.signum() {
                lo = mid;
                f_lo = f_mid;
            } else {
                hi = mid;
            }
        }
        accept(&f, 0.5 * (lo + hi))
    }

    /// Golden-section search for the minimum of |f| in `[lo, hi]`. `Some`
    /// only if that minimum is a root.
    fn touch(&self, f: impl Fn(f64) -> f64, mut lo: f64, mut hi: f64) -> Option<f64> {
        let g = |r: f64| f(r).abs();
        let mut a = hi - INV_PHI * (hi - lo);
        let mut b = lo + INV_PHI * (hi - lo);
        let (mut g_a, mut g_b) = (g(a), g(b));
        for _ in 0..MAX_BISECTIONS {
            if hi - lo <= self.tolerance * hi {
                break;
            }
            if !(g_a.is_finite() && g_b.is_finite()) {
                return None;
            }
            if g_a == 0.0 {
                return Some(a);
            }
            if g_a <= g_b {
                hi = b;
                b = a;
                g_b = g_a;
                a = hi - INV_PHI * (hi - lo);
                g_a = g(a);
            } else {
                lo = a;
                a = b;
                g_a = g_b;
                b = lo + INV_PHI * (hi - lo);
                g_b = g(b);
            }
        }
        accept(&f, 0.5 * (lo + hi))
    }
}

fn accept(f: impl Fn(f64) -> f64, root: f64) -> Option<f64> {
    let residual = f(root);
    (residual.is_finite() && residual.abs() <= ROOT_RESIDUAL).then_some(root)
}

/// Running state of one outward pass over the samples.
#[derive(Default)]
struct Sweep {
    any_finite: bool,
    outermost: Option<f64>,
    /// Last two finite samples, most recent last.
    before: Option<(f64, f64)>,
    previous: Option<(f64, f64)>,
}

impl Sweep {
    fn visit(&mut self, scan: &RootScan, f: impl Fn(f64) -> f64 + Copy, r: f64) {
        let value = f(r);
        if !value.is_finite() {
            self.before = None;
            self.previous = None;
            return;
        }
        self.any_finite = true;

        let crossing = match self.previous {
            _ if value == 0.0 => Some(r),
            Some((r0, v0)) if v0 != 0.0 && v0.signum() != value.signum() => scan.bisect(f, r0, v0, r),
            _ => None,
        };
        if let Some(root) = crossing {
            log::debug!("1/g_rr changes sign at r = {root}");
            self.record(root);
        }

        if let (Some((r0, v0)), Some((_, v1))) = (self.before, self.previous) {
            let same_sign = v0.signum() == v1.signum() && v1.signum() == value.signum();
            if same_sign && v1 != 0.0 && v1.abs() < v0.abs() && v1.abs() <= value.abs() {
                if let Some(root) = scan.touch(f, r0, r) {
                    log::debug!("1/g_rr touches zero at r = {root}");
                    self.record(root);
                }
            }
        }

        self.before = self.previous;
        self.previous = Some((r, value));
    }

    fn record(&mut self, root: f64) {
        self.outermost = Some(self.outermost.map_or(root, |current: f64| current.max(root)));
    }
}

/// Whether `f` barely changes over the decade ending at `r`.
fn settled(f: impl Fn(f64) -> f64, r: f64) -> bool {
    let (inner, outer) = (f(r / 10.0), f(r));
    if !(inner.is_finite() && outer.is_finite()) {
        return true;
    }
    (outer - inner).abs() <= SETTLED * outer.abs().max(1.0)
}

impl HorizonDetector for RootScan {
    fn detect(&self, g_rr: &Expr, radial: &str) -> Result<Horizon, HorizonError> {
        if let Some(name) = g_rr.symbols().into_iter().find(|s| *s != radial) {
            return Err(HorizonError::NotRadial {
                name: name.to_string(),
                radial: radial.to_string(),
            });
        }

        let reciprocal = g_rr.clone().recip().simplify()?;
        let program = CompiledExpr::compile(&reciprocal, &[radial])?;
        let f = |r: f64| program.eval(&[r]);

        let mut sweep = Sweep::default();
        for r in self.grid() {
            sweep.visit(self, f, r);
        }

        let mut end = self.max_radius;
        let mut extensions = 0;
        while !settled(f, end) {
            if extensions == MAX_EXTENSIONS {
                log::warn!(
                    "1/g_rr is still varying at {radial} = {end:e}; a horizon may lie further out"
                );
                break;
            }
            for r in self.decade(end) {
                sweep.visit(self, f, r);
            }
            end *= 10.0;
            extensions += 1;
        }
        if extensions > 0 {
            log::debug!("Horizon scan extended to {radial} = {end:e}");
        }

        if !sweep.any_finite {
            return Err(HorizonError::NoFiniteSamples);
        }
        Ok(sweep.outermost.map_or_else(Horizon::none, Horizon::at))
    }
}

/// Runs `detector`, treating any failure as a horizon-free spacetime.
pub fn detect_horizon(detector: &impl HorizonDetector, g_rr: &Expr, radial: &str) -> Horizon {
    match detector.detect(g_rr, radial) {
        Ok(horizon) => {
            match horizon.radius() {
                Some(radius) => log::info!("Event horizon at {radial} = {radius}"),
                None => log::info!("No event horizon found"),
            }
            horizon
        }
        Err(err) => {
            log::warn!("Horizon detection failed, continuing without a horizon: {err}");
            Horizon::none()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    fn scan(g_rr: &str) -> Result<Horizon, HorizonError> {
        RootScan::default().detect(&parse(g_rr).unwrap(), "r")
    }

    #[test]
    fn test_schwarzschild_horizon() {
        let radius = scan("1/(1 - 2/r)").unwrap().radius().unwrap();
        assert!((radius - 2.0).abs() < 1e-9);

        let radius = scan("1/(1 - 2*3/r)").unwrap().radius().unwrap();
        assert!((radius - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_outermost_root_wins() {
        // Reissner-Nordström with M = 1, Q² = 0.5: r = 1 ± sqrt(0.5).
        let radius = scan("1/(1 - 2/r + 0.5/r^2)").unwrap().radius().unwrap();
        assert!((radius - (1.0 + 0.5f64.sqrt())).abs() < 1e-9);
    }

    #[test]
    fn test_double_root_horizon() {
        // Extremal Reissner-Nordström, M = Q = 1: 1/g_rr = (1 - 1/r)² touches zero at r = 1.
        let radius = scan("1/(1 - 2/r + 1/r^2)").unwrap().radius().unwrap();
        assert!((radius - 1.0).abs() < 1e-6);

        let radius = scan("1/(1 - 1/r)^2").unwrap().radius().unwrap();
        assert!((radius - 1.0).abs() < 1e-6);

        let radius = scan("1/(1 - 2/r)^2").unwrap().radius().unwrap();
        assert!((radius - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_horizon_beyond_max_radius() {
        let radius = scan("1/(1 - 2000/r)").unwrap().radius().unwrap();
        assert!((radius - 2000.0).abs() < 1e-6);

        let narrow = RootScan {
            max_radius: 10.0,
            ..RootScan::default()
        };
        let radius = narrow.detect(&parse("1/(1 - 2*30/r)").unwrap(), "r").unwrap().radius().unwrap();
        assert!((radius - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_near_miss_is_not_a_horizon() {
        // min of 1 - 2/r + 1.1/r^2 is 1 - 1/1.1 > 0.
        assert_eq!(scan("1/(1 - 2/r + 1.1/r^2)").unwrap(), Horizon::none());
    }

    #[test]
    fn test_growing_reciprocal_stops_extending() {
        // 1/g_rr = r^2 never settles; the scan gives up without a horizon.
        assert_eq!(scan("1/r^2").unwrap(), Horizon::none());
    }

    #[test]
    fn test_flat_space_has_no_horizon() {
        assert_eq!(scan("1").unwrap(), Horizon::none());
        assert!(!scan("1 + 1/r^2").unwrap().is_present());
    }

    #[test]
    fn test_pole_is_not_a_horizon() {
        // 1/g_rr = 1/(r - 1) flips sign across its pole at r = 1.
        assert_eq!(scan("r - 1").unwrap(), Horizon::none());
    }

    #[test]
    fn test_angular_dependence_rejected() {
        let err = scan("1/(1 - 2/r) + sin(phi)").unwrap_err();
        assert_eq!(
            err,
            HorizonError::NotRadial {
                name: "phi".into(),
                radial: "r".into()
            }
        );
    }

    #[test]
    fn test_nothing_finite() {
        assert_eq!(scan("ln(-r)").unwrap_err(), HorizonError::NoFiniteSamples);
    }

    #[test]
    fn test_detect_horizon_degrades_to_none() {
        let g_rr = parse("1/(1 - 2/r) * cos(phi)").unwrap();
        assert_eq!(detect_horizon(&RootScan::default(), &g_rr, "r"), Horizon::none());

        let g_rr = parse("1/(1 - 2/r)").unwrap();
        assert!(detect_horizon(&RootScan::default(), &g_rr, "r").is_present());
    }
}
