use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::report::RunSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress to the tracing subscriber.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => {
                tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message)
            }
            None => tracing::info!("{}", event.message),
        }
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        Self::write_summary(&mut stdout, summary)
    }

    pub fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> io::Result<()> {
        let green = "\x1b[32m";
        let yellow = "\x1b[33m";
        let cyan = "\x1b[36m";
        let reset = "\x1b[0m";

        writeln!(out, "{cyan}mcbo-graph {} summary{reset}", summary.mode)?;
        if !summary.studies.is_empty() {
            writeln!(out, "  studies: {}", summary.studies.join(", "))?;
        }
        writeln!(
            out,
            "{green}  rows: {} seen, {} processed, {} skipped{reset}",
            summary.rows.seen, summary.rows.processed, summary.rows.skipped
        )?;
        for (kind, count) in &summary.process_types {
            writeln!(out, "    {kind}: {count}")?;
        }
        writeln!(
            out,
            "{green}  genes: {}, expression measurements: {}{reset}",
            summary.genes, summary.measurements
        )?;
        writeln!(
            out,
            "{green}  instance graph: {} nodes, {} triples ({} added){reset}",
            summary.instance_nodes, summary.instance_triples, summary.triples_added
        )?;
        writeln!(out, "{green}  output graph: {} triples{reset}", summary.output_triples)?;

        let warnings = &summary.warnings;
        let color = if warnings.total() == 0 { green } else { yellow };
        writeln!(out, "{color}  warnings: {}{reset}", warnings.total())?;
        let kinds = [
            ("row validation", warnings.row_validation),
            ("field parse", warnings.field_parse),
            ("join mismatch", warnings.join_mismatch),
            ("ambiguous classification", warnings.ambiguous_classification),
            ("already indexed", warnings.already_indexed),
        ];
        for (label, count) in kinds.iter().filter(|(_, count)| *count > 0) {
            writeln!(out, "{yellow}    {label}: {count}{reset}")?;
        }
        for path in &summary.outputs {
            writeln!(out, "{cyan}  wrote {path}{reset}")?;
        }
        Ok(())
    }
}
