// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs::read_to_string;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use studyloop_core::queue::SessionConfig;

use crate::error::Context;
use crate::error::Fallible;
use crate::error::fail;

pub const DEFAULT_CONFIG_PATH: &str = "studyloop.toml";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Namespace for all stored collections.
    pub user: String,
    /// Path to the SQLite database.
    pub database: PathBuf,
    pub grader: GraderConfig,
    pub session: SessionConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraderConfig {
    /// URL the open-response grader is POSTed to. Without one, open
    /// responses are always self-rated.
    pub endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            user: "default".to_string(),
            database: PathBuf::from("studyloop.db"),
            grader: GraderConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Load the configuration. An explicit path must exist; the default path
    /// may be absent, in which case the defaults are used.
    pub fn load(path: Option<&str>) -> Fallible<Self> {
        let (path, explicit) = match path {
            Some(p) => (Path::new(p), true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };
        if !path.exists() {
            if explicit {
                return fail(format!("config file not found: {}", path.display()));
            }
            log::debug!("no {DEFAULT_CONFIG_PATH}, using defaults");
            return Ok(Config::default());
        }
        let text = read_to_string(path)?;
        Config::parse(&text).context(&format!("invalid config {}", path.display()))
    }

    pub fn parse(text: &str) -> Fallible<Self> {
        let config: Config = toml::from_str(text).context("failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Fallible<()> {
        if self.user.trim().is_empty() {
            return fail("user must not be empty");
        }
        if let Some(endpoint) = &self.grader.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return fail(format!("grader endpoint is not an HTTP URL: {endpoint}"));
            }
        }
        self.session.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() -> Fallible<()> {
        assert_eq!(Config::parse("")?, Config::default());
        Ok(())
    }

    #[test]
    fn test_full_config() -> Fallible<()> {
        let config = Config::parse(
            r#"
            user = "ana"
            database = "/tmp/ana.db"

            [grader]
            endpoint = "http://localhost:9000/grade"

            [session]
            due_floor = 5
            session_size = 8
            failure_offset_max = 4
            "#,
        )?;
        assert_eq!(config.user, "ana");
        assert_eq!(config.database, PathBuf::from("/tmp/ana.db"));
        assert_eq!(
            config.grader.endpoint.as_deref(),
            Some("http://localhost:9000/grade")
        );
        assert_eq!(config.session.due_floor, 5);
        assert_eq!(config.session.session_size, 8);
        assert_eq!(config.session.failure_offset_min, 2);
        assert_eq!(config.session.failure_offset_max, 4);
        Ok(())
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(Config::parse("colour = \"blue\"").is_err());
        assert!(Config::parse("[session]\nmastery = 3").is_err());
    }

    #[test]
    fn test_invalid_offsets_rejected() {
        let err = Config::parse("[session]\nfailure_offset_min = 4\nfailure_offset_max = 3");
        assert!(err.is_err());
    }

    #[test]
    fn test_bad_endpoint_rejected() {
        assert!(Config::parse("[grader]\nendpoint = \"localhost\"").is_err());
    }

    #[test]
    fn test_missing_files() -> Fallible<()> {
        let dir = tempdir()?;
        let missing = dir.path().join("nope.toml");
        assert!(Config::load(missing.to_str()).is_err());

        let present = dir.path().join("studyloop.toml");
        write(&present, "user = \"bo\"\n")?;
        assert_eq!(Config::load(present.to_str())?.user, "bo");
        Ok(())
    }
}
