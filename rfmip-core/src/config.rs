//! Experiment configuration
//!
//! Describes which models, experiments and realizations make up an analysis and where their
//! CMIP6 output lives on disk. Nothing here reads model output; the resolved paths are handed
//! to whatever performs the ingestion.
//!
//! ```toml
//! data_root = "/data/CMIP6/RFMIP"
//!
//! [[models]]
//! model = "MPI-ESM1-2-LR"
//! realizations = ["r1i1p1f1", "r2i1p1f1", "r3i1p1f1"]
//! time_range = "184901-187912"
//! ```

use crate::errors::{RfmipError, RfmipResult};
use crate::flux::FluxVariable;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// CMIP6 DRS layout below the data root
pub const DEFAULT_PATH_TEMPLATE: &str =
    "{experiment}/{variable}/{variable}_{table}_{model}_{experiment}_{realization}_{grid}_{time_range}.nc";

fn default_aerosol_experiment() -> String {
    "piClim-spAer-aer".to_string()
}

fn default_control_experiment() -> String {
    "piClim-control".to_string()
}

fn default_realizations() -> Vec<String> {
    vec!["r1i1p1f1".to_string()]
}

fn default_grid_label() -> String {
    "gn".to_string()
}

fn default_table() -> String {
    "Amon".to_string()
}

fn default_path_template() -> String {
    DEFAULT_PATH_TEMPLATE.to_string()
}

/// One model's pair of experiments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Source identifier, e.g. `NorESM2-LM`
    pub model: String,
    #[serde(default = "default_aerosol_experiment")]
    pub aerosol_experiment: String,
    #[serde(default = "default_control_experiment")]
    pub control_experiment: String,
    /// Variant labels to average over
    #[serde(default = "default_realizations")]
    pub realizations: Vec<String>,
    /// `gn` for native grids, `gr` for regridded output
    #[serde(default = "default_grid_label")]
    pub grid_label: String,
    #[serde(default = "default_table")]
    pub table: String,
    /// Date range suffix of the file names, e.g. `000101-003012`
    pub time_range: String,
    #[serde(default = "default_path_template")]
    pub path_template: String,
}

/// Aerosol and control file of one realization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunPaths {
    pub realization: String,
    pub aerosol: PathBuf,
    pub control: PathBuf,
}

impl ModelConfig {
    pub fn new(model: &str, time_range: &str) -> Self {
        Self {
            model: model.to_string(),
            aerosol_experiment: default_aerosol_experiment(),
            control_experiment: default_control_experiment(),
            realizations: default_realizations(),
            grid_label: default_grid_label(),
            table: default_table(),
            time_range: time_range.to_string(),
            path_template: default_path_template(),
        }
    }

    pub fn validate(&self) -> RfmipResult<()> {
        if self.model.is_empty() {
            return Err(RfmipError::Config("model identifier is empty".to_string()));
        }
        if self.realizations.is_empty() {
            return Err(RfmipError::Config(format!(
                "model '{}' lists no realizations",
                self.model
            )));
        }
        if !self.path_template.contains("{variable}") {
            return Err(RfmipError::Config(format!(
                "path template for '{}' does not reference {{variable}}",
                self.model
            )));
        }
        // Surfaces unknown placeholders before any path is requested
        self.render(
            FluxVariable::Rsdt,
            &self.aerosol_experiment,
            &self.realizations[0],
        )?;
        Ok(())
    }

    /// File for one variable of one experiment and realization
    pub fn resolve_path(
        &self,
        data_root: &Path,
        variable: FluxVariable,
        experiment: &str,
        realization: &str,
    ) -> RfmipResult<PathBuf> {
        let relative = self.render(variable, experiment, realization)?;
        Ok(data_root.join(relative))
    }

    /// Aerosol and control files of `variable` for every realization
    pub fn run_paths(&self, data_root: &Path, variable: FluxVariable) -> RfmipResult<Vec<RunPaths>> {
        self.realizations
            .iter()
            .map(|realization| {
                Ok(RunPaths {
                    realization: realization.clone(),
                    aerosol: self.resolve_path(
                        data_root,
                        variable,
                        &self.aerosol_experiment,
                        realization,
                    )?,
                    control: self.resolve_path(
                        data_root,
                        variable,
                        &self.control_experiment,
                        realization,
                    )?,
                })
            })
            .collect()
    }

    fn render(
        &self,
        variable: FluxVariable,
        experiment: &str,
        realization: &str,
    ) -> RfmipResult<String> {
        let mut rendered = String::with_capacity(self.path_template.len() + 32);
        let mut rest = self.path_template.as_str();

        while let Some(start) = rest.find('{') {
            rendered.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let end = after.find('}').ok_or_else(|| {
                RfmipError::Config(format!(
                    "unclosed placeholder in path template '{}'",
                    self.path_template
                ))
            })?;
            let value = match &after[..end] {
                "model" => self.model.as_str(),
                "experiment" => experiment,
                "variable" => variable.short_name(),
                "realization" => realization,
                "grid" => self.grid_label.as_str(),
                "table" => self.table.as_str(),
                "time_range" => self.time_range.as_str(),
                unknown => {
                    return Err(RfmipError::Config(format!(
                        "unknown placeholder '{{{}}}' in path template",
                        unknown
                    )))
                }
            };
            rendered.push_str(value);
            rest = &after[end + 1..];
        }
        rendered.push_str(rest);
        Ok(rendered)
    }
}

/// All models of an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub data_root: PathBuf,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl ExperimentConfig {
    pub fn from_toml_str(content: &str) -> RfmipResult<Self> {
        let config: ExperimentConfig =
            toml::from_str(content).map_err(|e| RfmipError::Config(e.to_string()))?;
        config.validate()?;
        info!(
            "Loaded experiment configuration with {} models under {}",
            config.models.len(),
            config.data_root.display()
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> RfmipResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RfmipError::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> RfmipResult<String> {
        toml::to_string(self).map_err(|e| RfmipError::Config(e.to_string()))
    }

    pub fn validate(&self) -> RfmipResult<()> {
        if self.models.is_empty() {
            return Err(RfmipError::Config("no models configured".to_string()));
        }
        let mut seen = HashSet::new();
        for model in &self.models {
            model.validate()?;
            if !seen.insert(model.model.as_str()) {
                return Err(RfmipError::Config(format!(
                    "model '{}' is configured more than once",
                    model.model
                )));
            }
        }
        Ok(())
    }

    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.model == name)
    }

    pub fn run_paths(&self, model: &str, variable: FluxVariable) -> RfmipResult<Vec<RunPaths>> {
        let config = self
            .model(model)
            .ok_or_else(|| RfmipError::Config(format!("model '{}' is not configured", model)))?;
        config.run_paths(&self.data_root, variable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
data_root = "/data/CMIP6/RFMIP"

[[models]]
model = "NorESM2-LM"
time_range = "000101-003012"

[[models]]
model = "MPI-ESM1-2-LR"
realizations = ["r1i1p1f1", "r2i1p1f1", "r3i1p1f1"]
time_range = "184901-187912"

[[models]]
model = "IPSL-CM6A-LR"
grid_label = "gr"
time_range = "185001-187912"
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = ExperimentConfig::from_toml_str(CONFIG).unwrap();
        assert_eq!(config.models.len(), 3);

        let noresm = config.model("NorESM2-LM").unwrap();
        assert_eq!(noresm, &ModelConfig::new("NorESM2-LM", "000101-003012"));
        assert_eq!(config.model("MPI-ESM1-2-LR").unwrap().realizations.len(), 3);
        assert_eq!(config.model("IPSL-CM6A-LR").unwrap().grid_label, "gr");
    }

    #[test]
    fn test_resolve_cmip6_path() {
        let config = ExperimentConfig::from_toml_str(CONFIG).unwrap();
        let path = config
            .model("NorESM2-LM")
            .unwrap()
            .resolve_path(
                &config.data_root,
                FluxVariable::Rsdt,
                "piClim-spAer-aer",
                "r1i1p1f1",
            )
            .unwrap();
        assert_eq!(
            path,
            PathBuf::from("/data/CMIP6/RFMIP/piClim-spAer-aer/rsdt/rsdt_Amon_NorESM2-LM_piClim-spAer-aer_r1i1p1f1_gn_000101-003012.nc")
        );
    }

    #[test]
    fn test_run_paths_per_realization() {
        let config = ExperimentConfig::from_toml_str(CONFIG).unwrap();
        let runs = config.run_paths("MPI-ESM1-2-LR", FluxVariable::Clt).unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[1].realization, "r2i1p1f1");
        assert!(runs[1]
            .aerosol
            .ends_with("piClim-spAer-aer/clt/clt_Amon_MPI-ESM1-2-LR_piClim-spAer-aer_r2i1p1f1_gn_184901-187912.nc"));
        assert!(runs[1]
            .control
            .ends_with("piClim-control/clt/clt_Amon_MPI-ESM1-2-LR_piClim-control_r2i1p1f1_gn_184901-187912.nc"));

        assert!(matches!(
            config.run_paths("CanESM5", FluxVariable::Clt),
            Err(RfmipError::Config(_))
        ));
    }

    #[test]
    fn test_unknown_placeholder() {
        let mut model = ModelConfig::new("NorESM2-LM", "000101-003012");
        model.path_template = "{variable}/{member}.nc".to_string();
        match model.validate() {
            Err(RfmipError::Config(msg)) => assert!(msg.contains("{member}"), "{}", msg),
            other => panic!("Expected Config error, got {:?}", other),
        }

        model.path_template = "{variable}/{model.nc".to_string();
        assert!(matches!(model.validate(), Err(RfmipError::Config(_))));
    }

    #[test]
    fn test_template_requires_variable() {
        let mut model = ModelConfig::new("NorESM2-LM", "000101-003012");
        model.path_template = "{model}.nc".to_string();
        assert!(matches!(model.validate(), Err(RfmipError::Config(_))));
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            ExperimentConfig::from_toml_str("data_root = \"/data\""),
            Err(RfmipError::Config(_))
        ));

        let missing_time_range = "data_root = \"/data\"\n[[models]]\nmodel = \"NorESM2-LM\"\n";
        assert!(matches!(
            ExperimentConfig::from_toml_str(missing_time_range),
            Err(RfmipError::Config(_))
        ));

        let duplicated = format!(
            "{}\n[[models]]\nmodel = \"NorESM2-LM\"\ntime_range = \"000101-003012\"\n",
            CONFIG
        );
        assert!(matches!(
            ExperimentConfig::from_toml_str(&duplicated),
            Err(RfmipError::Config(_))
        ));

        let mut no_runs = ModelConfig::new("NorESM2-LM", "000101-003012");
        no_runs.realizations.clear();
        assert!(matches!(no_runs.validate(), Err(RfmipError::Config(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ExperimentConfig::from_toml_str(CONFIG).unwrap();
        let serialised = config.to_toml_string().unwrap();
        let restored = ExperimentConfig::from_toml_str(&serialised).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ExperimentConfig::from_file(Path::new("/nonexistent/rfmip.toml")),
            Err(RfmipError::Config(_))
        ));
    }
}
