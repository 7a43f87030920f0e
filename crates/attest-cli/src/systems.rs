//! `attest systems`: list the registered backends and their capabilities.

use anyhow::Result;
use clap::Args;

use attest_service::EngineConfig;

#[derive(Args, Debug)]
pub struct SystemsArgs {
    /// Print ids only, one per line.
    #[arg(long)]
    pub ids: bool,
}

pub fn run_systems(args: &SystemsArgs, config: &EngineConfig) -> Result<u8> {
    let engine = crate::engine(config)?;
    let systems = engine.proofs.systems();
    if args.ids {
        for info in &systems {
            println!("{}", info.id);
        }
    } else {
        crate::print_json(&systems)?;
    }
    Ok(0)
}
