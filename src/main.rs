use clap::{ArgAction, Parser, ValueEnum};
use labelcrop::{
    imread, imwrite, DumpObserver, LabelPipeline, NoopObserver, PipelineConfig, Stage, StageObserver,
    TracingObserver,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "labelcrop")]
#[command(about = "labelcrop - Extract the symbol band from a photographed label", long_about = None)]
struct Cli {
    /// Input image path
    image: PathBuf,

    /// Where to write the final image
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON file overriding default tunables
    #[arg(long)]
    config: Option<PathBuf>,

    /// Last stage to run
    #[arg(long, value_enum, default_value_t = StageArg::Align)]
    until: StageArg,

    /// Write intermediate images into this directory
    #[arg(long)]
    dump_dir: Option<PathBuf>,

    /// Intermediate verbosity: 1 stage results, 2 key steps, 3 everything
    #[arg(long, default_value_t = 1)]
    dump_level: u8,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum StageArg {
    Label,
    Vertical,
    Horizontal,
    Align,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Label => Stage::Label,
            StageArg::Vertical => Stage::Vertical,
            StageArg::Horizontal => Stage::Horizontal,
            StageArg::Align => Stage::Align,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum OutputFormat {
    /// JSON report with per-stage sizes and timings
    Json,
    /// Plain text, one line per stage
    Text,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "labelcrop=info",
        1 => "labelcrop=debug",
        _ => "labelcrop=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    let pipeline = LabelPipeline::new(config);

    let mut observer: Box<dyn StageObserver> = match &cli.dump_dir {
        Some(dir) => Box::new(DumpObserver::new(dir, cli.dump_level)?),
        None if cli.verbose >= 2 => Box::new(TracingObserver { level: cli.dump_level }),
        None => Box::new(NoopObserver),
    };

    // Load image
    let mut img = imread(&cli.image)?;

    // Run stages
    let report = pipeline.run_on_mat(&mut img, cli.until.into(), observer.as_mut())?;

    if let Some(path) = &cli.output {
        imwrite(path, &img)?;
    }

    // Output report
    match cli.format {
        OutputFormat::Json => {
            let json_output = serde_json::json!({
                "image": cli.image.display().to_string(),
                "output": cli.output.as_ref().map(|p| p.display().to_string()),
                "input": report.input,
                "stages": report.stages,
                "elapse": report.elapse,
            });
            println!("{}", serde_json::to_string_pretty(&json_output)?);
        }
        OutputFormat::Text => {
            println!("input\t{}x{}", report.input.width, report.input.height);
            for stage in &report.stages {
                println!(
                    "{}\t{}x{}\t{:.1}ms",
                    stage.stage,
                    stage.width,
                    stage.height,
                    stage.elapse * 1000.0
                );
            }
            println!("total\t{:.1}ms", report.elapse * 1000.0);
        }
    }

    Ok(())
}
