pub mod ingest;
pub mod query;

use anyhow::Result;
use std::io::Write;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct OutputContext {
    pub json: bool,
    pub verbose: bool,
}

impl OutputContext {
    pub fn print_json<W: Write, T: serde::Serialize>(&self, out: &mut W, data: &T) -> Result<()> {
        writeln!(out, "{}", serde_json::to_string_pretty(data)?)?;
        Ok(())
    }

    pub fn print_success<W: Write>(&self, out: &mut W, message: &str) -> Result<()> {
        use colored::Colorize;
        writeln!(out, "{} {}", "✓".green(), message)?;
        Ok(())
    }

    pub fn print_info<W: Write>(&self, out: &mut W, message: &str) -> Result<()> {
        use colored::Colorize;
        writeln!(out, "{} {}", "ℹ".blue(), message)?;
        Ok(())
    }

    /// Timing line on stderr, kept out of the query output on stdout
    pub fn print_elapsed(&self, what: &str, elapsed: Duration) -> Result<()> {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.print_info(
            &mut std::io::stderr().lock(),
            &format!("{} finished in {:.3} ms", what, ms),
        )
    }

    pub fn print_error(&self, message: &str) {
        use colored::Colorize;
        eprintln!("{} {}", "✗".red(), message);
    }
}
