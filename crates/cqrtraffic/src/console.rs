//! Colorful console output for estimation progress.
//!
//! Provides a `tracing` layer that formats the `event = ...` records of the
//! estimator and the diagram assembler. Enabled by the `console` feature.

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();

const TARGETS: [&str; 3] = ["cqrtraffic_solver", "cqrtraffic_diagram", "cqrtraffic"];

/// Initializes console output.
///
/// Safe to call multiple times - only the first call has effect. Does
/// nothing if another global subscriber is already installed.
pub fn init() {
    INIT.get_or_init(|| {
        print_banner();

        let mut filter = EnvFilter::from_default_env();
        for target in &TARGETS[..2] {
            if let Ok(directive) = format!("{}=info", target).parse() {
                filter = filter.add_directive(directive);
            }
        }

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(CqrConsoleLayer)
            .try_init();
    });
}

fn print_banner() {
    let title = format!(
        "cqrtraffic v{} - convex quantile fundamental diagrams",
        env!("CARGO_PKG_VERSION")
    );
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "\n{}\n", title.bright_white().bold());
    let _ = stdout.flush();
}

/// A tracing layer that formats estimation events with colors.
pub struct CqrConsoleLayer;

impl<S: Subscriber> Layer<S> for CqrConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();
        if !TARGETS.iter().any(|t| target.starts_with(t)) {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let output = format_event(&visitor);
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    event: Option<String>,
    status: Option<String>,
    error: Option<String>,
    backend: Option<String>,
    tau: Option<f64>,
    lower_tau: Option<f64>,
    upper_tau: Option<f64>,
    objective: Option<f64>,
    max_gap: Option<f64>,
    fraction: Option<f64>,
    observations: Option<u64>,
    quantiles: Option<u64>,
    grid_points: Option<u64>,
    threads: Option<u64>,
    iterations: Option<u64>,
    duration_ms: Option<u64>,
    solved: Option<u64>,
    failed: Option<u64>,
    cancelled: Option<u64>,
    crossings: Option<u64>,
    crossing_points: Option<u64>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value).trim_matches('"').to_string();
        match field.name() {
            "event" => self.event = Some(s),
            "status" => self.status = Some(s),
            "error" => self.error = Some(s),
            "backend" => self.backend = Some(s),
            _ => {}
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "event" => self.event = Some(value.to_string()),
            "status" => self.status = Some(value.to_string()),
            "error" => self.error = Some(value.to_string()),
            "backend" => self.backend = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        match field.name() {
            "tau" => self.tau = Some(value),
            "lower_tau" => self.lower_tau = Some(value),
            "upper_tau" => self.upper_tau = Some(value),
            "objective" => self.objective = Some(value),
            "max_gap" => self.max_gap = Some(value),
            "fraction" => self.fraction = Some(value),
            _ => {}
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "observations" => self.observations = Some(value),
            "quantiles" => self.quantiles = Some(value),
            "grid_points" => self.grid_points = Some(value),
            "threads" => self.threads = Some(value),
            "iterations" => self.iterations = Some(value),
            "duration_ms" => self.duration_ms = Some(value),
            "solved" => self.solved = Some(value),
            "failed" => self.failed = Some(value),
            "cancelled" => self.cancelled = Some(value),
            "crossings" => self.crossings = Some(value),
            "crossing_points" => self.crossing_points = Some(value),
            _ => {}
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_u64(field, value.max(0) as u64);
    }
}

fn format_event(v: &EventVisitor) -> String {
    match v.event.as_deref().unwrap_or("") {
        "diagram_start" => format_diagram_start(v),
        "quantile_end" => format_quantile_end(v),
        "quantile_failed" => format_quantile_failed(v),
        "curve_crossing" => format_crossing(v),
        "reduced_accuracy" => format_reduced_accuracy(v),
        "diagram_end" => format_diagram_end(v),
        _ => String::new(),
    }
}

fn prefix(level: &str, section: &str) -> String {
    let level = match level {
        "WARN" => level.bright_yellow().to_string(),
        _ => level.bright_green().to_string(),
    };
    format!(
        "{} {} {}",
        timestamp().bright_black(),
        level,
        format!("[{}]", section).bright_cyan()
    )
}

fn format_diagram_start(v: &EventVisitor) -> String {
    format!(
        "{} quantile levels ({}), observations ({}), grid points ({}), threads ({})",
        prefix("INFO", "Diagram"),
        v.quantiles.unwrap_or(0).to_string().bright_yellow(),
        v.observations
            .unwrap_or(0)
            .to_formatted_string(&Locale::en)
            .bright_yellow(),
        v.grid_points
            .unwrap_or(0)
            .to_formatted_string(&Locale::en)
            .bright_yellow(),
        v.threads.unwrap_or(1).to_string().bright_yellow()
    )
}

fn format_quantile_end(v: &EventVisitor) -> String {
    format!(
        "{} {} ended: status ({}), objective ({}), iterations ({}), time spent ({})",
        prefix("INFO", v.backend.as_deref().unwrap_or("Solver")),
        format_tau(v.tau).white().bold(),
        format_status(v.status.as_deref().unwrap_or("unknown")),
        v.objective
            .map(|o| format!("{:.4}", o))
            .unwrap_or_else(|| "N/A".to_string())
            .white(),
        v.iterations
            .unwrap_or(0)
            .to_formatted_string(&Locale::en)
            .white(),
        format_duration_ms(v.duration_ms.unwrap_or(0)).yellow()
    )
}

fn format_quantile_failed(v: &EventVisitor) -> String {
    format!(
        "{} {} failed: {}",
        prefix("WARN", "Diagram"),
        format_tau(v.tau).white().bold(),
        v.error.as_deref().unwrap_or("unknown error").bright_red()
    )
}

fn format_crossing(v: &EventVisitor) -> String {
    format!(
        "{} {} / {} cross at {} grid points ({:.1}%), max gap {}",
        prefix("WARN", "Diagram"),
        format_tau(v.lower_tau),
        format_tau(v.upper_tau),
        v.crossing_points.unwrap_or(0).to_string().bright_yellow(),
        v.fraction.unwrap_or(0.0) * 100.0,
        format!("{:.4}", v.max_gap.unwrap_or(0.0)).bright_red()
    )
}

fn format_reduced_accuracy(v: &EventVisitor) -> String {
    format!(
        "{} solution accepted at reduced accuracy after {} iterations",
        prefix("WARN", "Solver"),
        v.iterations.unwrap_or(0).to_string().yellow()
    )
}

fn format_diagram_end(v: &EventVisitor) -> String {
    let solved = v.solved.unwrap_or(0);
    let failed = v.failed.unwrap_or(0);
    let cancelled = v.cancelled.unwrap_or(0);
    let crossings = v.crossings.unwrap_or(0);

    let mut output = format!(
        "{} Diagram ended: time spent ({})",
        prefix("INFO", "Diagram"),
        format_duration_ms(v.duration_ms.unwrap_or(0)).yellow()
    );

    let rule = "══════════════════════════════════════════════════════════";
    output.push_str("\n\n");
    output.push_str(&format!("╔{}╗", rule).bright_cyan().to_string());
    output.push('\n');

    let (status_text, complete) = if failed == 0 && cancelled == 0 {
        ("ALL QUANTILES SOLVED", true)
    } else {
        ("SOME QUANTILES FAILED", false)
    };
    let padded = format!("{:^56}", status_text);
    let colored = if complete {
        padded.bright_green().bold().to_string()
    } else {
        padded.bright_red().bold().to_string()
    };
    output.push_str(&format!("{}{}{}", "║".bright_cyan(), colored, "║".bright_cyan()));
    output.push('\n');
    output.push_str(&format!("╠{}╣", rule).bright_cyan().to_string());
    output.push('\n');

    for (label, value) in [
        ("Solved:", solved),
        ("Failed:", failed),
        ("Cancelled:", cancelled),
        ("Crossings:", crossings),
    ] {
        output.push_str(&format!(
            "{}  {:<18}{:>36}  {}",
            "║".bright_cyan(),
            label,
            value.to_formatted_string(&Locale::en),
            "║".bright_cyan()
        ));
        output.push('\n');
    }

    output.push_str(&format!("╚{}╝", rule).bright_cyan().to_string());
    output.push('\n');
    output
}

fn format_tau(tau: Option<f64>) -> String {
    match tau {
        Some(t) => format!("tau {}", t),
        None => "tau ?".to_string(),
    }
}

fn format_status(status: &str) -> String {
    match status {
        "optimal" => status.bright_green().to_string(),
        "almost_optimal" => status.yellow().to_string(),
        _ => status.bright_red().to_string(),
    }
}

fn timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| {
            let secs = d.as_secs() % 100000;
            let millis = d.subsec_millis();
            format!("{:5}.{:03}", secs, millis)
        })
        .unwrap_or_else(|_| "    0.000".to_string())
}

fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}
