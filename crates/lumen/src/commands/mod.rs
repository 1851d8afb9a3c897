//! CLI command implementations.

pub(crate) mod check;
pub(crate) mod render;

pub(crate) use check::CheckArgs;
pub(crate) use render::RenderArgs;

use std::io::Read;
use std::path::Path;

use crate::error::CliError;

/// Read a document from a file, or from stdin when `input` is `-`.
pub(crate) fn read_input(input: &Path) -> Result<String, CliError> {
    if input == Path::new("-") {
        let mut source = String::new();
        std::io::stdin().read_to_string(&mut source)?;
        return Ok(source);
    }
    if !input.exists() {
        return Err(CliError::Validation(format!(
            "Input file not found: {}",
            input.display()
        )));
    }
    Ok(std::fs::read_to_string(input)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.md");
        std::fs::write(&path, "# Doc\n").unwrap();
        assert_eq!(read_input(&path).unwrap(), "# Doc\n");
    }

    #[test]
    fn test_read_input_missing_file() {
        let err = read_input(Path::new("/nonexistent/doc.md")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/doc.md"));
    }
}
