use crate::candle_vae::{MlpVae, VaeConfig};
use crate::cli::output_file;
use crate::common_io::mkdir;

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use std::fs::File;
use std::io::{BufReader, BufWriter};

/// Write `{prefix}.model.json` (dimensions) and `{prefix}.safetensors`
/// (parameters)
pub fn save_model(variable_map: &VarMap, config: &VaeConfig, prefix: &str) -> anyhow::Result<()> {
    let config_file = output_file(prefix, "model.json");
    let param_file = output_file(prefix, "safetensors");
    mkdir(&config_file)?;

    serde_json::to_writer_pretty(BufWriter::new(File::create(&config_file)?), config)?;
    variable_map.save(&param_file)?;

    info!("Saved model to {} and {}", config_file, param_file);
    Ok(())
}

/// Rebuild the model from `{prefix}.model.json` and load
/// `{prefix}.safetensors` onto `device`
pub fn load_model(prefix: &str, device: &Device) -> anyhow::Result<(MlpVae, VarMap, VaeConfig)> {
    let config_file = output_file(prefix, "model.json");
    let param_file = output_file(prefix, "safetensors");

    let config: VaeConfig = serde_json::from_reader(BufReader::new(File::open(&config_file)?))
        .map_err(|e| anyhow::anyhow!("{}: {}", config_file, e))?;
    config.validate()?;

    let mut variable_map = VarMap::new();
    let vs = VarBuilder::from_varmap(&variable_map, DType::F32, device);
    let vae = MlpVae::new(&config, vs)?;
    variable_map.load(&param_file)?;

    info!(
        "Loaded model {} -> {} (hidden {}) from {}",
        config.input_dim, config.latent_dim, config.hidden_dim, param_file
    );
    Ok((vae, variable_map, config))
}
