//! kvbatch CLI: converts a `key: value` review dump into compressed CSV batches.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::info;

use kvbatch::logging::init_tracing;
use kvbatch::{LineSource, MalformedPolicy, RunConfig};

#[derive(Debug, Parser)]
#[command(name = "kvbatch", version, about)]
struct CliArgs {
    /// Input dump, optionally gzip/zstd/bzip2/xz compressed.
    input: Option<PathBuf>,

    /// Directory receiving `0.csv.gz`, `1.csv.gz`, ...
    output_dir: Option<PathBuf>,

    /// JSON run configuration; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Records per output artifact.
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Artifact codec (gzip, zstd, bzip2, xz, none).
    #[arg(long)]
    compression: Option<String>,

    /// Drop records with malformed lines instead of aborting.
    #[arg(long)]
    skip_malformed: bool,

    /// On failure, still write the incomplete batch in progress.
    #[arg(long)]
    flush_partial: bool,
}

impl CliArgs {
    fn into_config(self) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::from_path(path)?,
            None => RunConfig::default(),
        };
        if let Some(input) = self.input {
            cfg.input = Some(input);
        }
        if let Some(dir) = self.output_dir {
            cfg.output_dir = Some(dir);
        }
        if let Some(n) = self.batch_size {
            cfg.batch_size = n;
        }
        if let Some(codec) = self.compression {
            cfg.compression = codec;
        }
        if self.skip_malformed {
            cfg.malformed = MalformedPolicy::Skip;
        }
        if self.flush_partial {
            cfg.flush_partial = true;
        }
        Ok(cfg)
    }
}

fn try_main(args: CliArgs) -> Result<()> {
    let cfg = args.into_config()?;
    let (Some(input), Some(output_dir)) = (cfg.input.as_ref(), cfg.output_dir.as_ref()) else {
        bail!("both an input file and an output directory are required");
    };

    info!(
        input = %input.display(),
        output = %output_dir.display(),
        batch_size = cfg.batch_size,
        "starting conversion"
    );
    let runner = cfg.runner();
    // the file name picks the codec before magic bytes are consulted
    let lines = LineSource::open(input, &runner.codecs)?;
    let summary = runner.run_lines(lines, output_dir, |_| {})?;
    info!(
        batches = summary.batches_written,
        records = summary.records_written,
        "done"
    );
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();

    match try_main(CliArgs::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("kvbatch failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}
