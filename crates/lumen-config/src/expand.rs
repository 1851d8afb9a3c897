//! Environment variable expansion for configuration strings.

use crate::ConfigError;

/// Expand `${VAR}` and `${VAR:-default}` references in `value`.
///
/// An unset variable without a default is an error naming `field`. Bare
/// `$VAR` is left alone.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, LookupError> {
        std::env::var(var).map(Some).map_err(|_| LookupError {
            var_name: var.to_owned(),
        })
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

struct LookupError {
    var_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_var_with_default() {
        // SAFETY: the variable name is unique to this test
        unsafe {
            std::env::set_var("LUMEN_TEST_AVATAR_HOST", "heads.example");
        }
        let result = expand_env(
            "https://${LUMEN_TEST_AVATAR_HOST:-mc-heads.net}/avatar/{name}",
            "avatars.minecraft_url",
        )
        .unwrap();
        assert_eq!(result, "https://heads.example/avatar/{name}");
        unsafe {
            std::env::remove_var("LUMEN_TEST_AVATAR_HOST");
        }
    }

    #[test]
    fn test_expand_falls_back_to_default() {
        let result = expand_env("${LUMEN_TEST_UNSET_DIR:-.cache}", "cache.dir").unwrap();
        assert_eq!(result, ".cache");
    }

    #[test]
    fn test_expand_missing_var_names_field() {
        let err = expand_env("${LUMEN_TEST_MISSING}", "cache.dir").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        let message = err.to_string();
        assert!(message.contains("LUMEN_TEST_MISSING"));
        assert!(message.contains("cache.dir"));
    }

    #[test]
    fn test_literal_and_braces_unchanged() {
        assert_eq!(expand_env("plain", "f").unwrap(), "plain");
        assert_eq!(
            expand_env("https://x/{name}.png", "f").unwrap(),
            "https://x/{name}.png"
        );
        assert_eq!(expand_env("$HOME/x", "f").unwrap(), "$HOME/x");
    }
}
