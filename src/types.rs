use crate::error::{ConfigError, Result};
use crate::partial::Partial;

/// Wire formats understood by the built-in decoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
    Toml,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Yaml, Format::Json, Format::Toml];

    /// Canonical name, as used in source descriptions.
    pub fn name(self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
            Format::Toml => "toml",
        }
    }

    /// Whether `name` designates this format. Case-insensitive; `yml` is
    /// accepted as an alias for YAML.
    pub fn matches(self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        match self {
            Format::Yaml => name == "yaml" || name == "yml",
            other => name == other.name(),
        }
    }

    /// Parse a complete document. Blank input decodes to an empty tree.
    pub fn parse(self, bytes: &[u8]) -> Result<Partial> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Partial::new());
        }
        match self {
            Format::Yaml => {
                serde_yaml::from_slice(bytes).map_err(|e| ConfigError::decode(self.name(), e))
            }
            Format::Json => {
                serde_json::from_slice(bytes).map_err(|e| ConfigError::decode(self.name(), e))
            }
            Format::Toml => {
                let text =
                    std::str::from_utf8(bytes).map_err(|e| ConfigError::decode(self.name(), e))?;
                toml::from_str(text).map_err(|e| ConfigError::decode(self.name(), e))
            }
        }
    }
}

/// Source kind names accepted by the built-in source strategies.
pub mod kind {
    pub const FILE: &str = "file";
    pub const OBSERVABLE_FILE: &str = "observable-file";
    pub const DIR: &str = "dir";
    pub const REST: &str = "rest";
    pub const OBSERVABLE_REST: &str = "observable-rest";
    pub const ENV: &str = "senv";
    pub const CONTAINER: &str = "container";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partial::ConfigRead;

    #[test]
    fn yml_is_yaml() {
        assert!(Format::Yaml.matches("yml"));
        assert!(Format::Yaml.matches("YAML"));
        assert!(!Format::Json.matches("yaml"));
    }

    #[test]
    fn blank_input_is_empty_tree() {
        for format in Format::ALL {
            assert!(format.parse(b"  \n").unwrap().is_empty());
        }
    }

    #[test]
    fn toml_tables_become_partials() {
        let p = Format::Toml
            .parse(b"[server]\nport = 8080\nratio = 2.0\n")
            .unwrap();
        assert_eq!(p.int("server.port").unwrap(), 8080);
        assert_eq!(p.int("server.ratio").unwrap(), 2);
    }

    #[test]
    fn toml_datetimes_are_strings() {
        let p = Format::Toml
            .parse(b"ts = 1979-05-27T07:32:00Z\n[window]\nopens = 07:32:00\n")
            .unwrap();
        assert_eq!(p.string("ts").unwrap(), "1979-05-27T07:32:00Z");
        assert_eq!(p.string("window.opens").unwrap(), "07:32:00");
    }

    #[test]
    fn malformed_json_is_decode_error() {
        let err = Format::Json.parse(b"{not json").unwrap_err();
        assert!(matches!(err, ConfigError::Decode { ref format, .. } if format == "json"));
    }

    #[test]
    fn top_level_list_is_rejected() {
        assert!(Format::Yaml.parse(b"- a\n- b\n").is_err());
    }
}
