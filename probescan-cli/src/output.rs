//! Terminal output for scan results, plans, and session summaries.

use console::{style, Style};
use probescan::analysis::{
    AnalysisResult, ErrorDistribution, ErrorStatus, StatisticsSnapshot,
};
use probescan::coord::to_hardware;
use probescan::scan::{ScanPlan, SweepDirection};
use probescan::session::SessionSummary;

/// Width of the longest distribution bar.
const BAR_WIDTH: usize = 40;

/// Labels for the five distribution bins, most negative first.
const BIN_LABELS: [&str; 5] = ["< -1.5T", "-1.5T..-0.5T", "±0.5T", "0.5T..1.5T", "> 1.5T"];

// =============================================================================
// Formatting helpers
// =============================================================================

/// Signed millimetre value with micron resolution.
pub fn format_mm(value: f64) -> String {
    format!("{:+.4} mm", value)
}

/// Bar length for `count` scaled against the largest bin.
pub fn bar_len(count: usize, max: usize) -> usize {
    if max == 0 {
        return 0;
    }
    (count * BAR_WIDTH).div_ceil(max)
}

fn status_style(status: ErrorStatus) -> Style {
    match status {
        ErrorStatus::Qualified => Style::new().green(),
        ErrorStatus::Attention => Style::new().yellow(),
        ErrorStatus::OutOfTolerance => Style::new().red().bold(),
    }
}

/// One-line description of a result whose status is not qualified.
pub fn deviation_line(result: &AnalysisResult) -> String {
    let status = result.status();
    format!(
        "#{:<6} x={:>8.3} θ={:>8.3}°  r={:>9.4}  err={}  {}",
        result.sequence(),
        result.x_pos(),
        result.angle_deg(),
        result.measured_radius(),
        format_mm(result.errors.radius_error),
        status_style(status).apply_to(status.label())
    )
}

/// Short live-statistics message for the progress bar.
pub fn statistics_message(stats: &StatisticsSnapshot) -> String {
    format!(
        "avg {} σ {:.4} ok {:.1}%",
        format_mm(stats.avg_error),
        stats.std_error,
        stats.qualified_ratio() * 100.0
    )
}

// =============================================================================
// Plan
// =============================================================================

/// Prints the passes of a scan plan.
pub fn print_plan(plan: &ScanPlan, show_points: bool) {
    println!("{}", style("Scan Plan").bold());
    println!("─────────");
    println!(
        "  Stations:  {}\n  Points:    {}",
        plan.passes().len(),
        plan.len()
    );
    println!();

    for (i, pass) in plan.passes().iter().enumerate() {
        let direction = match pass.direction {
            SweepDirection::Forward => "forward",
            SweepDirection::Reverse => "reverse",
        };
        let angles: Vec<f64> = pass
            .points
            .iter()
            .map(|p| to_hardware(p).angle_deg)
            .collect();
        let (first, last) = match (angles.first(), angles.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => continue,
        };
        println!(
            "  Pass {:>3}  x = {:>9.3} mm  {:<7}  {:>5} points  {:>8.3}° → {:>8.3}°",
            i + 1,
            pass.x,
            direction,
            pass.points.len(),
            first,
            last
        );

        if show_points {
            for (point, angle) in pass.points.iter().zip(&angles) {
                let reading = to_hardware(point);
                println!(
                    "      θ = {:>8.3}°  r = {:>9.4}  ({:.3}, {:.3}, {:.3})",
                    angle, reading.radius, point.x, point.y, point.z
                );
            }
        }
    }
}

// =============================================================================
// Summary
// =============================================================================

/// Prints the end-of-session summary block.
pub fn print_summary(summary: &SessionSummary) {
    let stats = &summary.statistics;
    let duration = summary.duration();

    println!();
    println!("{}", style("Session Summary").bold());
    println!("───────────────");
    println!(
        "  Started:          {}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  Duration:         {}.{:03}s",
        duration.num_seconds(),
        duration.num_milliseconds().rem_euclid(1000)
    );
    println!(
        "  Points:           {} measured / {} planned",
        summary.records_measured, summary.records_planned
    );
    println!("  Analysed:         {}", stats.total_points);
    if summary.lookup_misses > 0 {
        println!(
            "  Unmatched:        {}",
            style(summary.lookup_misses).yellow()
        );
    }

    println!();
    println!("{}", style("Error Statistics").bold());
    println!("────────────────");
    if stats.total_points == 0 {
        println!("  No points analysed.");
    } else {
        println!("  Tolerance:        ±{:.4} mm", stats.tolerance_threshold);
        println!("  Max error:        {}", format_mm(stats.max_error));
        println!("  Min error:        {}", format_mm(stats.min_error));
        println!("  Mean error:       {}", format_mm(stats.avg_error));
        println!("  Std deviation:    {:.4} mm", stats.std_error);
        println!(
            "  Within tolerance: {} ({:.1}%)",
            stats.within_tolerance_count,
            stats.qualified_ratio() * 100.0
        );
        println!();
        print_distribution(&summary.distribution);
    }

    for (worker, error) in [
        ("Simulator", &summary.simulator_error),
        ("Analysis", &summary.analysis_error),
    ] {
        if let Some(error) = error {
            println!();
            println!("  {} {}: {}", style("✗").red(), worker, error);
        }
    }

    println!();
    if summary.is_complete() {
        println!("{} Scan complete", style("✓").green());
    } else {
        println!("{} Scan ended early", style("!").yellow());
    }
}

/// Prints a horizontal histogram of the error distribution.
pub fn print_distribution(distribution: &ErrorDistribution) {
    println!("{}", style("Error Distribution").bold());
    let bins = distribution.bins();
    let max = bins.iter().copied().max().unwrap_or(0);
    for (label, count) in BIN_LABELS.iter().zip(bins) {
        println!(
            "  {:>13} │{:<width$}│ {}",
            label,
            "█".repeat(bar_len(count, max)),
            count,
            width = BAR_WIDTH
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mm() {
        assert_eq!(format_mm(0.01234), "+0.0123 mm");
        assert_eq!(format_mm(-0.5), "-0.5000 mm");
    }

    #[test]
    fn test_bar_len_scales_to_max() {
        assert_eq!(bar_len(10, 10), BAR_WIDTH);
        assert_eq!(bar_len(0, 10), 0);
        assert_eq!(bar_len(1, 1000), 1);
        assert_eq!(bar_len(5, 0), 0);
    }
}
