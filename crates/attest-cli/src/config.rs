//! `attest config`: print the effective engine configuration.

use anyhow::Result;
use clap::Args;

use attest_service::EngineConfig;

#[derive(Args, Debug)]
pub struct ConfigArgs {}

pub fn run_config(_args: &ConfigArgs, config: &EngineConfig) -> Result<u8> {
    crate::print_json(config)?;
    Ok(0)
}
