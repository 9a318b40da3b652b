//! Synthetic Fundamental Diagram
//!
//! Samples noisy readings from a triangular flow-density relation, fits the
//! 10%, 50% and 90% quantile frontiers and prints the resulting curves.
//!
//! An optional first argument names a TOML configuration file; the built-in
//! defaults are used when it is missing.

use cqrtraffic::prelude::*;
use cqrtraffic::GridConfig;
use cqrtraffic_test::synthetic::TriangularDiagram;

fn main() {
    cqrtraffic::console::init();

    let config = match std::env::args().nth(1) {
        Some(path) => match CqrConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("failed to load {}: {}", path, e);
                std::process::exit(2);
            }
        },
        None => CqrConfig::default()
            .with_quantiles([0.1, 0.5, 0.9])
            .with_grid(GridConfig::Uniform {
                from: 0.0,
                to: 120.0,
                points: 25,
            }),
    };

    let truth = TriangularDiagram::default();
    let data = truth.sample(150, 120.0, 250.0, 42);

    let diagram = match estimate_diagram(&data, &config) {
        Ok(diagram) => diagram,
        Err(e) => {
            eprintln!("estimation failed: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "\nTrue capacity {:.0} at density {:.0}, free-flow speed {:.0}\n",
        truth.capacity(),
        truth.critical_density(),
        truth.free_flow_speed
    );
    for curve in diagram.curves() {
        print_curve(curve);
    }
    for (tau, error) in diagram.failures() {
        println!("tau {}: {}", tau, error);
    }
}

fn print_curve(curve: &FundamentalDiagramCurve) {
    println!(
        "tau {:.2}: capacity {:.1} at density {:.1}, free-flow slope {:.2}",
        curve.tau, curve.capacity, curve.critical_density, curve.free_flow_slope
    );
    println!("{:>10} {:>10} {:>10}", "density", "flow", "speed");
    for p in &curve.points {
        let marker = if p.extrapolated { " *" } else { "" };
        println!(
            "{:>10.1} {:>10.1} {:>10.2}{}",
            p.density, p.flow, p.speed, marker
        );
    }
    println!();
}
