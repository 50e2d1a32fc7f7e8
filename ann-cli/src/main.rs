use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use ann::library::looks_loadable;
use ann::logging::default_log_level;
use ann::{init_logging, Ann, NetworkId};
use ann_cli::config::{build_config, load_options, ConfigArgs};
use ann_cli::{random_inputs, read_tensor, write_tensor, BenchReport};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ndarray::ArrayD;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and run models through the Arm NN adapter")]
struct Cli {
    #[command(flatten)]
    settings: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the input and output shapes of a model
    Info { model: PathBuf },

    /// Run a model on raw f32 input files
    Run {
        model: PathBuf,

        /// Input tensor file, one per network input, in order
        #[arg(long = "input")]
        inputs: Vec<PathBuf>,

        /// Directory for output-<i>.f32 files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Time a model on random inputs
    Bench {
        model: PathBuf,

        #[arg(long, default_value_t = 10)]
        iterations: usize,

        #[arg(long, default_value_t = 1)]
        warmup: usize,
    },
}

impl Command {
    fn model(&self) -> &Path {
        match self {
            Command::Info { model } | Command::Run { model, .. } | Command::Bench { model, .. } => {
                model.as_path()
            }
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let log = cli.settings.log.as_deref().unwrap_or(default_log_level());
    init_logging(log)?;

    let config = build_config(&cli.settings, |key| std::env::var(key).ok())?;
    if let Some(library) = &config.library_path {
        if !looks_loadable(library) {
            bail!("adapter library {} does not exist", library.display());
        }
    }

    let ann = Ann::new(config.open_library()?, config.ann_options())?;
    let model = cli.command.model();
    let (options, cache) = load_options(&config, model, cli.settings.cache_file.as_deref())?;
    let id = match ann.load(model, &options) {
        Ok(id) => id,
        Err(err) => {
            if let Some(cache) = cache {
                cache.discard();
            }
            return Err(err.into());
        }
    };

    let outcome = match &cli.command {
        Command::Info { .. } => info_cmd(&ann, id),
        Command::Run {
            inputs, output_dir, ..
        } => run_cmd(&ann, id, inputs, output_dir),
        Command::Bench {
            iterations, warmup, ..
        } => bench_cmd(&ann, id, *iterations, *warmup),
    };
    ann.unload(id)?;
    outcome
}

fn info_cmd(ann: &Ann, id: NetworkId) -> Result<()> {
    let shapes = ann.network_shapes(id).context("network vanished")?;
    println!("network {id}");
    for (i, shape) in shapes.inputs.iter().enumerate() {
        println!("  input  {i}: {shape:?}");
    }
    for (i, shape) in shapes.outputs.iter().enumerate() {
        println!("  output {i}: {shape:?}");
    }
    Ok(())
}

fn run_cmd(ann: &Ann, id: NetworkId, inputs: &[PathBuf], output_dir: &Path) -> Result<()> {
    let shapes = ann.input_shapes(id).context("network vanished")?;
    if inputs.len() != shapes.len() {
        bail!("model has {} inputs, got {} --input files", shapes.len(), inputs.len());
    }
    let tensors = inputs
        .iter()
        .zip(&shapes)
        .map(|(path, shape)| read_tensor(path, shape))
        .collect::<Result<Vec<ArrayD<f32>>>>()?;
    let views: Vec<_> = tensors.iter().map(|t| t.view()).collect();

    let outputs = ann.execute(id, &views)?;
    fs::create_dir_all(output_dir)?;
    for (i, output) in outputs.iter().enumerate() {
        let path = output_dir.join(format!("output-{i}.f32"));
        write_tensor(&path, output)?;
        println!("{} {:?}", path.display(), output.shape());
    }
    Ok(())
}

fn bench_cmd(ann: &Ann, id: NetworkId, iterations: usize, warmup: usize) -> Result<()> {
    let shapes = ann.input_shapes(id).context("network vanished")?;
    let tensors = random_inputs(&shapes, &mut rand::thread_rng());
    let views: Vec<_> = tensors.iter().map(|t| t.view()).collect();

    for _ in 0..warmup {
        ann.execute(id, &views)?;
    }
    let mut samples = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        ann.execute(id, &views)?;
        samples.push(start.elapsed());
    }

    match BenchReport::from_samples(&samples) {
        Some(report) => {
            info!(network = %id, %report, "benchmark finished");
            println!("{report}");
        }
        None => println!("no iterations run"),
    }
    Ok(())
}
