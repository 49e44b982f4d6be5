// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction, parsed with `clap`.
// All real work is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `summary`     — parameter count per model component
//   2. `probe`       — forward pass over synthetic image pairs
//   3. `init-config` — save the model flags as JSON
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InitConfigArgs, ProbeArgs, SummaryArgs};

use crate::domain::traits::ReportSink;
use crate::infra::{config_store::ConfigStore, report::ReportWriter};
use crate::ml::DefaultBackend;

#[derive(Parser, Debug)]
#[command(
    name = "bit-cd",
    version = "0.1.0",
    about = "Bi-temporal image transformer for change detection between two images."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case. Routing only.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Summary(args)    => run_summary(args),
            Commands::Probe(args)      => run_probe(args),
            Commands::InitConfig(args) => run_init_config(args),
        }
    }
}

fn report_writer(dir: Option<&std::path::PathBuf>) -> Result<Option<ReportWriter>> {
    dir.map(ReportWriter::new).transpose()
}

fn run_summary(args: SummaryArgs) -> Result<()> {
    use crate::application::summary_use_case::SummaryUseCase;

    let config = args.model.resolve()?;
    let writer = report_writer(args.out_dir.as_ref())?;
    let device = Default::default();

    let summary = SummaryUseCase::new(config)
        .execute::<DefaultBackend>(&device, writer.as_ref().map(|w| w as &dyn ReportSink))?;

    println!("\n{} model", summary.architecture);
    println!("{:<24} {:>14}", "component", "parameters");
    for c in &summary.components {
        println!("{:<24} {:>14}", c.name, c.parameters);
    }
    println!("{:<24} {:>14}", "total", summary.total_parameters);
    Ok(())
}

fn run_probe(args: ProbeArgs) -> Result<()> {
    use crate::application::probe_use_case::ProbeUseCase;
    use crate::data::synthetic::SyntheticPairSource;

    let probe_cfg = (&args).into();
    let config = args.model.resolve()?;
    let side = args.size.unwrap_or_else(|| config.image_size());
    let mut source = SyntheticPairSource::new(
        args.seed,
        config.input_channels(),
        side,
        side,
        args.change_fraction,
    )?;
    let writer = report_writer(args.out_dir.as_ref())?;
    let device = Default::default();

    tracing::info!("Probing {} on {} pairs of {side}x{side}", config.architecture(), args.batch_size);
    let prediction = ProbeUseCase::new(config, probe_cfg).execute::<DefaultBackend>(
        &device,
        &mut source,
        writer.as_ref().map(|w| w as &dyn ReportSink),
    )?;

    let report = &prediction.report;
    println!("out.shape: {:?}", report.output_shape);
    println!("mean change probability: {:.4}", report.mean_probability);
    println!(
        "changed pixels at {:.2}: {:.2}%",
        report.threshold,
        report.changed_fraction * 100.0
    );
    Ok(())
}

fn run_init_config(args: InitConfigArgs) -> Result<()> {
    let config = args.model.resolve()?;
    let path = ConfigStore::new(&args.out_dir).save(&config)?;
    println!("Wrote {} config to '{}'", config.architecture(), path.display());
    Ok(())
}
