//! Options controlling a rewrite
use crate::error::MappingError;
use toml::Value;

/// Default bound on rewrite recursion (visitor and path resolution)
///
/// Sized so the guard trips before a default 2 MiB thread stack runs
/// out in an unoptimised build. Left-nested binary chains are walked
/// iteratively and do not count against it.
pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOptions {
    ignore_validations: bool,
    max_depth: usize,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        RewriteOptions {
            ignore_validations: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl RewriteOptions {
    /// Rebuild unary nodes directly rather than through the checked
    /// constructors
    pub fn with_ignore_validations(mut self, ignore: bool) -> Self {
        self.ignore_validations = ignore;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn ignore_validations(&self) -> bool {
        self.ignore_validations
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Read options from the `[rewrite]` table of a TOML document.
    /// Missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self, MappingError> {
        let value = text
            .parse::<Value>()
            .map_err(|e| MappingError::InvalidOptions(e.to_string()))?;
        let mut options = RewriteOptions::default();
        let table = match value.get("rewrite") {
            None => return Ok(options),
            Some(Value::Table(t)) => t,
            Some(_) => {
                return Err(MappingError::InvalidOptions(
                    "rewrite must be a table".to_string(),
                ))
            }
        };

        for (key, v) in table {
            match (key.as_str(), v) {
                ("ignore_validations", Value::Boolean(b)) => options.ignore_validations = *b,
                ("max_depth", Value::Integer(n)) if *n > 0 => options.max_depth = *n as usize,
                (k, v) => {
                    return Err(MappingError::InvalidOptions(format!(
                        "unexpected value {} for {}",
                        v, k
                    )))
                }
            }
        }
        Ok(options)
    }
}
