// cfg2hdl - CFG to hardware state machine compiler
//
// Reads a JSON program, compiles its entry function to a module and writes
// the module as JSON for an HDL emitter. With --run the module is also
// simulated on the given arguments.
//
// Usage:
//   cfg2hdl program.json -o module.json
//   cfg2hdl program.json --run --arg 3 --arg 4

use anyhow::{Context, Result};
use cfg2hdl::{compile_program, load, GenConfig, SimConfig, Simulator, Value};
use clap::Parser;
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "cfg2hdl")]
#[command(about = "CFG to hardware state machine compiler")]
#[command(version)]
struct Args {
    /// Input program (JSON)
    input: PathBuf,

    /// Output module (JSON)
    #[arg(short, long, default_value = "module.json")]
    output: PathBuf,

    /// Width of datapath registers
    #[arg(long, default_value_t = 32)]
    data_width: u32,

    /// Width of the state register
    #[arg(long, default_value_t = 32)]
    state_width: u32,

    /// Simulate the module after compiling it
    #[arg(long)]
    run: bool,

    /// Argument value for --run, in parameter order
    #[arg(long = "arg", allow_negative_numbers = true)]
    args: Vec<i64>,

    /// Give up simulating after this many cycles
    #[arg(long, default_value_t = 10_000)]
    max_cycles: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let data = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let program = load::parse(&data).context("Failed to load program")?;

    let config = GenConfig {
        data_width: args.data_width,
        state_width: args.state_width,
    };
    let module = compile_program(&program, &config).context("Compilation failed")?;

    let json = serde_json::to_vec_pretty(&module).context("Failed to serialize module")?;
    std::fs::write(&args.output, json).context("Failed to write output")?;
    info!("Wrote: {}", args.output.display());

    if args.run {
        let values: Vec<Value> = module
            .args
            .iter()
            .zip(&args.args)
            .map(|(&(_, width), &n)| Value::new(width, n as u64))
            .collect();
        if values.len() != args.args.len() || values.len() != module.args.len() {
            anyhow::bail!(
                "`{}` takes {} argument(s), {} given",
                program.main,
                module.args.len(),
                args.args.len()
            );
        }

        let mut sim = Simulator::new(
            &module,
            SimConfig {
                max_cycles: args.max_cycles,
            },
        );
        let result = sim.run(&values).context("Simulation failed")?;
        println!("{} (after {} cycles)", result.signed(), sim.cycles());
    }

    Ok(())
}
