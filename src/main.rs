use std::{env, fs, path::PathBuf};

use anyhow::Result;
use clap::Parser;
use log::info;
use quadrotor::runner::{ScenarioRunner, write_csv};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Parameter file with the vehicle and the scenario
    #[arg(short, long, default_value = "config/params.toml")]
    params: PathBuf,

    /// Output csv file. Defaults to a timestamped folder under `out/`
    #[arg(short, long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }

    pretty_env_logger::init();

    let args = Args::parse();

    let mut runner = ScenarioRunner::new(&args.params)?;
    let samples = runner.run()?;

    let out_path = match args.out {
        Some(path) => path,
        None => PathBuf::from("out")
            .join(chrono::Local::now().format("%Y_%m_%d_%H-%M-%S").to_string())
            .join("trajectory.csv"),
    };

    if let Some(dir) = out_path.parent() {
        fs::create_dir_all(dir)?;
    }

    write_csv(&out_path, &samples)?;
    info!(
        "{} samples written to '{}'",
        samples.len(),
        out_path.display()
    );

    Ok(())
}
