mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cf_core::config::Config;
use cf_transcode::{
    Capabilities, CapabilityCache, ConcatInputFile, FfmpegState, OutputFormatKind, Pipeline,
    PipelineBuilder, ToolRegistry, TranscodeJob,
};
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise use defaults based on the verbose flag.
    // Logs go to stderr so stdout only carries generated commands.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "castforge=debug,cf_transcode=trace,cf_core=debug".to_string()
        } else {
            "castforge=info,cf_transcode=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<cf_core::Error>()
                .map_or(1, cf_core::Error::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Capabilities { json } => show_capabilities(config_path, json),
        Commands::Build {
            job,
            capabilities,
            json,
        } => build_job(&job, config_path, capabilities.as_deref(), json),
        Commands::Concat { url, channel_name } => {
            let config = Config::load_or_default(config_path);
            let mut ffmpeg = channel_state(&config, &channel_name);
            ffmpeg.output_format = config.transcode.output_format.parse::<OutputFormatKind>()?;
            let pipeline = builder(Capabilities::empty()).concat(ConcatInputFile::new(url), &ffmpeg)?;
            print_pipeline(&pipeline, false)
        }
        Commands::Segmenter { url, channel_name } => {
            let config = Config::load_or_default(config_path);
            let ffmpeg = channel_state(&config, &channel_name);
            let pipeline = builder(Capabilities::empty()).wrap_segmenter(url, &ffmpeg);
            print_pipeline(&pipeline, false)
        }
        Commands::Resize {
            input,
            output,
            height,
            width,
        } => {
            if height == 0 {
                anyhow::bail!("Height must be greater than zero");
            }
            let pipeline = builder(Capabilities::empty()).resize(input, output, height, width);
            print_pipeline(&pipeline, false)
        }
        Commands::CheckTools => check_tools(config_path),
        Commands::Validate {
            config: validate_path,
        } => {
            let path = validate_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("castforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn builder(capabilities: Capabilities) -> PipelineBuilder {
    PipelineBuilder::new(Arc::new(capabilities))
}

fn channel_state(config: &Config, channel_name: &str) -> FfmpegState {
    FfmpegState::concat(channel_name, config.transcode.service_provider.clone())
}

/// Probe the configured ffmpeg into the process-wide cache.
fn probe(config: &Config) -> Result<Arc<Capabilities>> {
    let registry = ToolRegistry::discover(&config.tools);
    let ffmpeg = registry.require("ffmpeg")?.to_path_buf();
    let timeout = Duration::from_secs(config.tools.probe_timeout_secs);

    let rt = tokio::runtime::Runtime::new()?;
    Ok(rt.block_on(CapabilityCache::global().refresh(&ffmpeg, timeout)))
}

fn show_capabilities(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path);
    let capabilities = probe(&config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(capabilities.as_ref())?);
        return Ok(());
    }

    let sections = [
        ("Hardware acceleration", &capabilities.hardware_accels),
        ("Encoders", &capabilities.encoders),
        ("Decoders", &capabilities.decoders),
        ("Filters", &capabilities.filters),
        ("Pixel formats", &capabilities.pixel_formats),
    ];
    for (title, names) in sections {
        println!("{title}: {}", names.len());
    }
    println!();
    println!(
        "Hardware acceleration methods: {}",
        capabilities
            .hardware_accels
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(())
}

fn build_job(
    job_path: &Path,
    config_path: Option<&Path>,
    snapshot: Option<&Path>,
    json: bool,
) -> Result<()> {
    if !job_path.exists() {
        anyhow::bail!("Job file does not exist: {:?}", job_path);
    }
    let config = Config::load_or_default(config_path);

    let mut job = TranscodeJob::from_json(&std::fs::read_to_string(job_path)?)?;
    job.apply_config(&config.transcode)?;

    let capabilities = match snapshot {
        Some(path) => {
            tracing::debug!("Loading capability snapshot from {:?}", path);
            let capabilities = Capabilities::from_json(&std::fs::read_to_string(path)?)?;
            CapabilityCache::global().replace(capabilities)
        }
        None => match probe(&config) {
            Ok(capabilities) => capabilities,
            Err(e) => {
                tracing::warn!("Capability probe unavailable ({e:#}); building for software only");
                Arc::new(Capabilities::empty())
            }
        },
    };

    let pipeline = job.compile(capabilities)?;
    print_pipeline(&pipeline, json)
}

fn print_pipeline(pipeline: &Pipeline, json: bool) -> Result<()> {
    let command = pipeline.command();
    if json {
        let output = serde_json::json!({
            "command": command,
            "steps": pipeline.steps,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for (name, value) in &command.environment {
            println!("{name}={value}");
        }
        for arg in &command.arguments {
            println!("{arg}");
        }
    }
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Capability probing will report no hardware support.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            Config::load(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("Configuration loaded with {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  - {}", warning);
        }
    }
    println!(
        "  Hardware acceleration: {}",
        config.transcode.hw_accel.as_deref().unwrap_or("none")
    );
    println!("  Output format: {}", config.transcode.output_format);
    println!("  Service provider: {}", config.transcode.service_provider);

    Ok(())
}
