//! Plain-text run summary.

use std::io::{self, Write};

use crate::pipeline::AnalysisReport;

/// Writes the headline probability, percentile cuts, and the coefficient
/// ranking.
pub fn write_console_summary<W: Write>(report: &AnalysisReport, out: &mut W) -> io::Result<()> {
    writeln!(out, "Participants analysed: {}", report.records)?;

    match report.cumulative.headline {
        Some(h) => writeln!(
            out,
            "Probability of pregnancy by cycle {}: {:.1}%",
            h.cycle, h.probability
        )?,
        None => writeln!(out, "Probability of pregnancy: fit unavailable")?,
    }

    if let Some(distribution) = &report.distribution {
        if let Some(summary) = &distribution.summary {
            writeln!(
                out,
                "Cycles to pregnancy: n = {}, mean = {:.2}, median = {:.1}",
                summary.n, summary.mean, summary.median
            )?;
        }
        for cut in &distribution.percentiles {
            writeln!(
                out,
                "{:.0}% of pregnancies by cycle {:.2}",
                cut.fraction * 100.0,
                cut.cycle
            )?;
        }
    }

    writeln!(out)?;
    writeln!(out, "Correlation with cycles to pregnancy (by |r|):")?;
    for (i, result) in report.ranking.iter().enumerate() {
        writeln!(out, "{:>3}. {:<40} {:+.3}", i + 1, result.label, result.coefficient)?;
    }
    for undefined in &report.undefined {
        writeln!(out, "   -  {:<40} undefined ({})", undefined.label, undefined.reason)?;
    }
    Ok(())
}
