use std::path::PathBuf;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "quizbank";
const ENV_PREFIX: &str = "QUIZBANK";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    /// Source PDF.
    pub input: PathBuf,
    /// Directory the page images are written to.
    pub image_dir: PathBuf,
    /// JSON array of formatted records.
    pub output: PathBuf,
    /// Optional SQLite file holding the full question model.
    pub database: Option<PathBuf>,
}

impl Settings {
    /// Defaults, then `quizbank.toml` if present, then `QUIZBANK_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("input", "data.pdf")?
            .set_default("image_dir", "extracted_images")?
            .set_default("output", "output.json")
    }

    /// CLI flags take precedence over everything else.
    pub fn with_overrides(
        mut self,
        input: Option<PathBuf>,
        image_dir: Option<PathBuf>,
        output: Option<PathBuf>,
        database: Option<PathBuf>,
    ) -> Self {
        if let Some(p) = input {
            self.input = p;
        }
        if let Some(p) = image_dir {
            self.image_dir = p;
        }
        if let Some(p) = output {
            self.output = p;
        }
        if database.is_some() {
            self.database = database;
        }
        self
    }
}
