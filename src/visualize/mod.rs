//! Rendering of the final ranking

use crate::config::OutputFormat;
use crate::mapreduce::coordinator::RunReport;
use crate::mapreduce::rank::RankedEntry;
use std::io::{self, Write};

const BAR_WIDTH: usize = 40;

pub trait Visualizer {
    fn render(&self, ranking: &[RankedEntry], out: &mut dyn Write) -> io::Result<()>;

    /// Render a whole run. Defaults to rendering just the ranking.
    fn render_report(&self, report: &RunReport, out: &mut dyn Write) -> io::Result<()> {
        self.render(&report.ranking, out)
    }
}

/// Pick the visualizer for an output format
pub fn visualizer_for(format: OutputFormat) -> Box<dyn Visualizer> {
    match format {
        OutputFormat::Bar => Box::new(BarChartVisualizer::default()),
        OutputFormat::Json => Box::new(JsonVisualizer),
        OutputFormat::Tsv => Box::new(TsvVisualizer),
    }
}

/// Horizontal bar chart, most frequent word on top
#[derive(Debug, Clone, Copy)]
pub struct BarChartVisualizer {
    width: usize,
}

impl Default for BarChartVisualizer {
    fn default() -> Self {
        Self { width: BAR_WIDTH }
    }
}

impl BarChartVisualizer {
    pub fn with_width(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    fn bar_len(&self, count: u64, max: u64) -> usize {
        if max == 0 {
            return 0;
        }
        let scaled = (count as f64 / max as f64 * self.width as f64).round() as usize;
        scaled.clamp(1, self.width)
    }
}

impl Visualizer for BarChartVisualizer {
    fn render(&self, ranking: &[RankedEntry], out: &mut dyn Write) -> io::Result<()> {
        if ranking.is_empty() {
            return writeln!(out, "No words to display.");
        }

        writeln!(out, "Top {} Most Frequent Words", ranking.len())?;
        let label_width = ranking
            .iter()
            .map(|e| e.token.as_str().chars().count())
            .max()
            .unwrap_or(0);
        let max = ranking.iter().map(|e| e.count).max().unwrap_or(0);

        for entry in ranking {
            writeln!(
                out,
                "{:>label_width$} | {} {}",
                entry.token.as_str(),
                "█".repeat(self.bar_len(entry.count, max)),
                entry.count,
            )?;
        }
        Ok(())
    }
}

/// JSON array of entries, or the full report through [`Visualizer::render_report`]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonVisualizer;

impl Visualizer for JsonVisualizer {
    fn render(&self, ranking: &[RankedEntry], out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, ranking)?;
        writeln!(out)
    }

    fn render_report(&self, report: &RunReport, out: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut *out, report)?;
        writeln!(out)
    }
}

/// `rank<TAB>token<TAB>count` lines
#[derive(Debug, Clone, Copy, Default)]
pub struct TsvVisualizer;

impl Visualizer for TsvVisualizer {
    fn render(&self, ranking: &[RankedEntry], out: &mut dyn Write) -> io::Result<()> {
        for entry in ranking {
            writeln!(out, "{}\t{}\t{}", entry.rank, entry.token, entry.count)?;
        }
        Ok(())
    }
}
