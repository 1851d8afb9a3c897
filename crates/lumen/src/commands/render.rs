//! `lumen render` command implementation.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use lumen_cache::{Cache, CacheBucketExt, FileCache, NullCache, content_key};
use lumen_config::{CliSettings, Config};
use lumen_renderer::{Pipeline, PipelineOptions, TabsMode, escape_html};
use serde::{Deserialize, Serialize};

use super::read_input;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Markdown document to render, or `-` for stdin.
    input: PathBuf,

    /// Write HTML to this file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to configuration file (default: auto-discover lumen.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render every tab pane up front.
    #[arg(long)]
    eager_tabs: bool,

    /// Wrap the fragment in a complete HTML page.
    #[arg(long)]
    standalone: bool,

    /// Disable caching.
    #[arg(long)]
    no_cache: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Rendered page as stored in the HTML cache.
#[derive(Serialize, Deserialize)]
struct CachedPage {
    html: String,
    warnings: Vec<String>,
}

impl RenderArgs {
    /// Execute the render command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the input or output cannot
    /// be read or written.
    pub(crate) fn execute(self, version: &str) -> Result<(), CliError> {
        let output = Output::new();

        let cli_settings = CliSettings {
            tabs: self.eager_tabs.then_some(TabsMode::Eager),
            cache_enabled: self.no_cache.then_some(false),
            ..CliSettings::default()
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;

        let mut options = config.pipeline_options();
        if self.standalone {
            options.extract_title = true;
        }

        let cache: Box<dyn Cache> = if config.cache_resolved.enabled {
            output.detail(&format!(
                "Cache directory: {}",
                config.cache_resolved.dir.display()
            ));
            Box::new(FileCache::new(config.cache_resolved.dir.clone(), version))
        } else {
            Box::new(NullCache)
        };

        let source = read_input(&self.input)?;
        let page = render_page(&source, options, cache.as_ref(), self.standalone, &self.input);

        for warning in &page.warnings {
            output.warning(&format!("warning: {warning}"));
        }

        match &self.output {
            Some(path) => {
                std::fs::write(path, &page.html)?;
                output.success(&format!("Wrote {}", path.display()));
            }
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(page.html.as_bytes())?;
                stdout.flush()?;
            }
        }
        Ok(())
    }
}

/// Render `source`, reusing the HTML cache when the same document was
/// rendered before with the same settings.
fn render_page(
    source: &str,
    options: PipelineOptions,
    cache: &dyn Cache,
    standalone: bool,
    input: &Path,
) -> CachedPage {
    let fingerprint = serde_json::to_string(&options).unwrap_or_default();
    let key = content_key(&[
        &fingerprint,
        if standalone { "page" } else { "fragment" },
        &input.to_string_lossy(),
        source,
    ]);
    let pages = cache.bucket("html");
    let pipeline = Pipeline::with_cache(options, cache);

    pages.get_or_insert_json_with(&key, "", || {
        let rendered = pipeline.render(source);
        tracing::info!(
            blocks = rendered.blocks.len(),
            warnings = rendered.warnings.len(),
            "rendered document"
        );
        let html = if standalone {
            let fallback = input
                .file_stem()
                .map_or_else(|| "Document".to_owned(), |s| s.to_string_lossy().into_owned());
            standalone_page(rendered.title.as_deref().unwrap_or(&fallback), &rendered.html)
        } else {
            rendered.html
        };
        CachedPage {
            html,
            warnings: rendered.warnings,
        }
    })
}

/// Minimal HTML page around a rendered fragment.
fn standalone_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n</head>\n<body>\n<main>\n{}\n</main>\n</body>\n</html>\n",
        escape_html(title),
        body.trim_end()
    )
}
