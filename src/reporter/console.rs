//! Console reporter with colored output

use crate::analyzer::BatchResult;
use crate::{Band, CompositeResult, FacetKind, Finding, Severity, Source};
use colored::Colorize;

/// Findings shown per facet unless verbose
const FINDINGS_SHOWN: usize = 5;

/// Reporter for terminal output
pub struct ConsoleReporter {
    /// Whether to use colors
    use_colors: bool,
    /// Whether to show verbose output
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
        }
    }

    pub fn without_colors(mut self) -> Self {
        self.use_colors = false;
        self
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// Report a single analysis result. `label` names the analyzed input.
    pub fn report(&self, label: &str, result: &CompositeResult) {
        self.print_header(label, result);
        self.print_score(result);
        self.print_breakdown(result);
        self.print_findings(result);
        self.print_feedback(result);
        println!();
    }

    /// Report every result of a batch, then its summary
    pub fn report_batch(&self, labels: &[String], batch: &BatchResult) {
        for (label, result) in labels.iter().zip(&batch.results) {
            self.report(label, result);
            println!("{}", "─".repeat(60));
        }
        self.print_summary(labels, batch);
    }

    /// Report in quiet mode (just score)
    pub fn report_quiet(&self, label: &str, result: &CompositeResult) {
        println!(
            "{}: {:.2} ({})",
            label,
            result.overall_score,
            self.colorize_band(result.band())
        );
    }

    fn print_header(&self, label: &str, result: &CompositeResult) {
        println!();
        println!("{}", format!("Text Quality Analysis: {}", label).bold());
        println!(
            "   Words: {} | Sentences: {} | Paragraphs: {} | {:.2}s",
            result.stats.word_count, result.stats.sentence_count, result.stats.paragraph_count, result.processing_time
        );
        println!();
    }

    fn print_score(&self, result: &CompositeResult) {
        let bar = self.create_score_bar(result.overall_score);
        println!("   Score: {} {}", bar, self.colorize_band(result.band()).bold());
        println!();
    }

    fn print_breakdown(&self, result: &CompositeResult) {
        println!("   {}", "Score Breakdown:".bold());
        for facet in FacetKind::ALL {
            let score = result.facet(facet).score;
            let weight = result.weights.get(facet);
            let score_str = format!("{:>6.2}", score);
            let colored_score = if !self.use_colors {
                score_str.normal()
            } else if score >= 80.0 {
                score_str.green()
            } else if score >= 60.0 {
                score_str.yellow()
            } else {
                score_str.red()
            };
            println!(
                "   {} {} {} (weight {:.0}%)",
                self.create_mini_bar(score),
                colored_score,
                facet.label(),
                weight * 100.0
            );
        }
        println!();
    }

    fn print_findings(&self, result: &CompositeResult) {
        let total: usize = FacetKind::ALL.iter().map(|&f| result.facet(f).findings.len()).sum();
        if total == 0 {
            return;
        }
        println!("   {}", "Findings:".bold());
        for facet in FacetKind::ALL {
            let findings = &result.facet(facet).findings;
            let shown = if self.verbose { findings.len() } else { FINDINGS_SHOWN };
            for finding in findings.iter().take(shown) {
                self.print_finding(finding);
            }
            if findings.len() > shown {
                println!(
                    "   {} {} more {} findings (use --verbose to show)",
                    "ℹ".blue(),
                    findings.len() - shown,
                    facet
                );
            }
        }
        println!();
    }

    fn print_finding(&self, finding: &Finding) {
        let icon = match finding.severity {
            Severity::Critical | Severity::High => "✗".red(),
            Severity::Medium => "⚠".yellow(),
            Severity::Low => "ℹ".blue(),
        };
        let location = format!("{}-{}", finding.span.start, finding.span.end);
        let source = match finding.source {
            Source::Local => "",
            Source::Remote => " (remote)",
        };
        println!(
            "   {} {} [{}]{} {}",
            icon,
            location.dimmed(),
            finding.kind.to_string().dimmed(),
            source.dimmed(),
            finding.message
        );
        if let Some(ref suggestion) = finding.suggestion {
            println!("       {} {}", "→".dimmed(), suggestion.italic());
        }
        if self.verbose {
            if let Some(ref explanation) = finding.explanation {
                println!("       {} {}", "↳".dimmed(), explanation.dimmed());
            }
        }
    }

    fn print_feedback(&self, result: &CompositeResult) {
        println!("   {}", result.feedback_summary);
        if !result.strengths.is_empty() {
            println!();
            println!("   {}", "Strengths:".bold());
            for strength in &result.strengths {
                println!("   {} {}", "✓".green(), strength);
            }
        }
        if !result.improvements.is_empty() {
            println!();
            println!("   {}", "Improvements:".bold());
            for improvement in &result.improvements {
                println!("   {} {}", "→".cyan(), improvement);
            }
        }
    }

    fn print_summary(&self, labels: &[String], batch: &BatchResult) {
        let stats = &batch.summary_statistics;
        println!();
        println!("{}", "═".repeat(60));
        println!("{}", "Summary".bold());
        println!("{}", "═".repeat(60));
        println!("   Texts analyzed: {}", stats.total_texts.to_string().bold());
        println!(
            "   Average score:  {} ({})",
            format!("{:.2}", stats.average_score).bold(),
            self.colorize_band(Band::from_score(stats.average_score))
        );
        println!("   Total words:    {}", stats.total_words);
        println!("   Average words:  {:.2}", stats.average_words);

        if let Some(ref comparison) = batch.comparative_analysis {
            let best = labels
                .get(comparison.best_text_index)
                .map(String::as_str)
                .unwrap_or("?");
            println!("   Best text:      {}", best.bold());
            for (dimension, consistent) in &comparison.consistency {
                let average = comparison.average_scores.get(dimension).copied().unwrap_or(0.0);
                let status = if *consistent { "consistent".green() } else { "varies".yellow() };
                println!("   {:<15} {:>6.2} {}", format!("{}:", dimension), average, status);
            }
        }
        println!();
    }

    fn colorize_band(&self, band: Band) -> colored::ColoredString {
        let s = band.to_string();
        if !self.use_colors {
            return s.normal();
        }
        match band {
            Band::Excellent => s.green().bold(),
            Band::VeryGood => s.green(),
            Band::Good => s.yellow(),
            Band::Fair => s.red(),
            Band::NeedsImprovement => s.red().bold(),
        }
    }

    fn create_score_bar(&self, score: f64) -> String {
        let filled = filled_cells(score, 20);
        let bar = format!("[{}{}] {:>6.2}", "█".repeat(filled), "░".repeat(20 - filled), score);

        if self.use_colors {
            if score >= 80.0 {
                bar.green().to_string()
            } else if score >= 60.0 {
                bar.yellow().to_string()
            } else {
                bar.red().to_string()
            }
        } else {
            bar
        }
    }

    fn create_mini_bar(&self, score: f64) -> String {
        let filled = filled_cells(score, 10);
        format!("[{}{}]", "▓".repeat(filled), "░".repeat(10 - filled))
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn filled_cells(score: f64, width: usize) -> usize {
    ((score.clamp(0.0, 100.0) / 100.0) * width as f64).floor() as usize
}
