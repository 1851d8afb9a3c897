//! `lumen check` command implementation.

use std::path::PathBuf;

use clap::Args;
use lumen_config::Config;
use lumen_renderer::Pipeline;

use super::read_input;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the check command.
#[derive(Args)]
pub(crate) struct CheckArgs {
    /// Markdown document to check, or `-` for stdin.
    input: PathBuf,

    /// Path to configuration file (default: auto-discover lumen.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Fail when the document has any warning.
    #[arg(long)]
    strict: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CheckArgs {
    /// Execute the check command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, the input cannot be read, or
    /// `--strict` is set and the document has warnings.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = Config::load(self.config.as_deref(), None)?;
        let source = read_input(&self.input)?;

        let rendered = Pipeline::new(config.pipeline_options()).render(&source);
        let errors = rendered.blocks.iter().filter(|b| b.is_error()).count();

        if rendered.warnings.is_empty() {
            output.success(&format!(
                "{}: {} blocks, no problems",
                self.input.display(),
                rendered.blocks.len()
            ));
            return Ok(());
        }

        output.info(&format!("{}:", self.input.display()));
        for warning in &rendered.warnings {
            output.warning(&format!("  {warning}"));
        }
        output.detail(&format!(
            "{} warnings, {errors} blocks rendered as errors",
            rendered.warnings.len()
        ));

        if self.strict {
            return Err(CliError::Validation(format!(
                "{} warnings in {}",
                rendered.warnings.len(),
                self.input.display()
            )));
        }
        Ok(())
    }
}
