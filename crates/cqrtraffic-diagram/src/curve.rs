//! Grid-aligned quantile curves and their derived scalars.

use cqrtraffic_core::{Regressors, ResponseKind, SolveDiagnostics};
use cqrtraffic_solver::QuantileFit;
use serde::{Deserialize, Serialize};

use crate::grid::DensityGrid;

/// Relative tolerance below which two flows count as level.
pub const DEFAULT_LEVEL_TOLERANCE: f64 = 1e-6;

/// One grid point of a quantile curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub density: f64,
    pub flow: f64,
    pub speed: f64,
    /// Forward-difference slope of flow to the next grid point. The last
    /// point reuses the previous segment; a single-point grid has slope 0.
    pub slope: f64,
    /// Density lies outside the observed range. The value comes from the
    /// same supporting-plane rule but has no accuracy guarantee.
    pub extrapolated: bool,
}

impl CurvePoint {
    /// The fitted quantity: flow or speed.
    pub fn response_value(&self, response: ResponseKind) -> f64 {
        match response {
            ResponseKind::Flow => self.flow,
            ResponseKind::Speed => self.speed,
        }
    }
}

/// Which side of the critical density a branch lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchKind {
    /// Flow increases with density.
    FreeFlow,
    /// Flow stays level or decreases with density.
    Congested,
}

/// Summary of the grid points belonging to one branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub kind: BranchKind,
    pub start_density: f64,
    pub end_density: f64,
    pub points: usize,
    /// Mean grid slope over the branch. Approximates the free-flow speed on
    /// the free-flow branch and the negated wave speed on the congested one.
    pub mean_slope: f64,
}

impl Branch {
    fn collect(kind: BranchKind, points: &[CurvePoint], rising: &[bool]) -> Option<Self> {
        let members: Vec<&CurvePoint> = points
            .iter()
            .zip(rising)
            .filter(|(_, &up)| up == (kind == BranchKind::FreeFlow))
            .map(|(p, _)| p)
            .collect();
        let (first, last) = (members.first()?, members.last()?);
        Some(Self {
            kind,
            start_density: first.density,
            end_density: last.density,
            points: members.len(),
            mean_slope: members.iter().map(|p| p.slope).sum::<f64>() / members.len() as f64,
        })
    }
}

/// A fundamental diagram curve for one quantile level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalDiagramCurve {
    pub tau: f64,
    pub response: ResponseKind,
    pub points: Vec<CurvePoint>,
    /// Largest flow on the grid.
    pub capacity: f64,
    /// Density at capacity; the smallest one whose flow is level with it.
    pub critical_density: f64,
    /// Slope of the fitted response at the minimum observed density. For a
    /// flow response this is the free-flow speed.
    pub free_flow_slope: f64,
    pub free_flow: Option<Branch>,
    pub congested: Option<Branch>,
    pub diagnostics: SolveDiagnostics,
}

impl FundamentalDiagramCurve {
    /// Evaluates a fit on `grid` with [`DEFAULT_LEVEL_TOLERANCE`].
    ///
    /// `covariates` fixes the non-density regressors; it is ignored for
    /// density-only fits.
    pub fn from_fit(
        fit: &QuantileFit,
        grid: &DensityGrid,
        covariates: &[f64],
        response: ResponseKind,
    ) -> Self {
        Self::with_level_tolerance(fit, grid, covariates, response, DEFAULT_LEVEL_TOLERANCE)
    }

    /// Evaluates a fit on `grid`.
    ///
    /// Flows within `max(tolerance, tolerance · |capacity|)` of each other
    /// count as level: they tie for capacity, and a segment rising by no
    /// more than that belongs to the congested branch.
    pub fn with_level_tolerance(
        fit: &QuantileFit,
        grid: &DensityGrid,
        covariates: &[f64],
        response: ResponseKind,
        tolerance: f64,
    ) -> Self {
        let frontier = &fit.frontier;
        let free_flow_slope = frontier.free_flow_slope();
        let dimension = frontier.regressors().first().map_or(1, |x| x.len());

        let mut points: Vec<CurvePoint> = grid
            .iter()
            .map(|&density| {
                let mut x: Regressors = Regressors::with_capacity(dimension);
                x.push(density);
                x.extend(covariates.iter().copied().take(dimension.saturating_sub(1)));
                let value = frontier.evaluate(&x);
                let (flow, speed) = match response {
                    ResponseKind::Flow => (value, flow_to_speed(value, density, free_flow_slope)),
                    ResponseKind::Speed => (value * density, value),
                };
                CurvePoint {
                    density,
                    flow,
                    speed,
                    slope: 0.0,
                    extrapolated: frontier.is_extrapolation(density),
                }
            })
            .collect();
        fill_slopes(&mut points);

        let peak = points
            .iter()
            .map(|p| p.flow)
            .fold(f64::NEG_INFINITY, f64::max);
        let level = tolerance.max(tolerance * peak.abs());
        let (critical_density, capacity) = points
            .iter()
            .find(|p| p.flow >= peak - level)
            .map_or((f64::NAN, peak), |p| (p.density, peak));
        let rising = rising_segments(&points, level);

        Self {
            tau: fit.tau.value(),
            response,
            free_flow: Branch::collect(BranchKind::FreeFlow, &points, &rising),
            congested: Branch::collect(BranchKind::Congested, &points, &rising),
            points,
            capacity,
            critical_density,
            free_flow_slope,
            diagnostics: fit.diagnostics.clone(),
        }
    }

    pub fn densities(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.density)
    }

    pub fn flows(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.flow)
    }

    /// Number of grid points outside the observed density range.
    pub fn extrapolated_count(&self) -> usize {
        self.points.iter().filter(|p| p.extrapolated).count()
    }
}

/// Speed at zero density is the free-flow slope.
fn flow_to_speed(flow: f64, density: f64, free_flow_slope: f64) -> f64 {
    if density > 0.0 {
        flow / density
    } else {
        free_flow_slope
    }
}

fn fill_slopes(points: &mut [CurvePoint]) {
    let n = points.len();
    if n < 2 {
        return;
    }
    for i in 0..n - 1 {
        points[i].slope =
            (points[i + 1].flow - points[i].flow) / (points[i + 1].density - points[i].density);
    }
    points[n - 1].slope = points[n - 2].slope;
}

/// Whether each point's forward segment gains more than `level` flow. The
/// last point follows the previous segment.
fn rising_segments(points: &[CurvePoint], level: f64) -> Vec<bool> {
    let n = points.len();
    (0..n)
        .map(|i| {
            let width = if i + 1 < n {
                points[i + 1].density - points[i].density
            } else if n >= 2 {
                points[i].density - points[i - 1].density
            } else {
                0.0
            };
            points[i].slope * width > level
        })
        .collect()
}
