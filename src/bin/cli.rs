use anyhow::{anyhow, bail, Context};
use colometry::config::ColometryConfig;
use colometry::hardware::{ConfiguredHardware, HardwareProvider};
use colometry::storage::{ArtifactKind, ArtifactLayout};
use colometry::testing::SimulatedHardware;
use colometry::{CancelFlag, CaptureSession, SessionManifest, SessionOutcome};
use std::env;
use std::path::PathBuf;

const USAGE: &str = "Usage: colometry-cli <command> [args]

Commands:
  run [--config PATH] [--count N] [--delay-ms MS] [--output DIR] [--simulate] [--json]
  latest <image|histogram|pdf> [--output DIR]
  init-config [PATH]";

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    colometry::init_logging();

    let command = &args[1];
    match command.as_str() {
        "run" => cmd_run(&args),
        "latest" => cmd_latest(&args),
        "init-config" => cmd_init_config(&args),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}\n\n{}", command, USAGE);
            std::process::exit(1);
        }
    }
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> anyhow::Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} requires a value", flag))
}

fn cmd_run(args: &[String]) -> anyhow::Result<()> {
    // Parse args: run [--config PATH] [--count N] [--delay-ms MS] [--output DIR] [--simulate] [--json]
    let mut config_path = ColometryConfig::default_path();
    let mut count = None;
    let mut delay_ms = None;
    let mut output = None;
    let mut simulate = false;
    let mut json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = PathBuf::from(flag_value(args, i, "--config")?);
            }
            "--count" => {
                i += 1;
                count = Some(flag_value(args, i, "--count")?.parse::<u32>()?);
            }
            "--delay-ms" => {
                i += 1;
                delay_ms = Some(flag_value(args, i, "--delay-ms")?.parse::<u64>()?);
            }
            "--output" => {
                i += 1;
                output = Some(flag_value(args, i, "--output")?.to_string());
            }
            "--simulate" => simulate = true,
            "--json" => json = true,
            other => bail!("Unknown argument for run: {}", other),
        }
        i += 1;
    }

    let mut config = ColometryConfig::load_from_file(&config_path)
        .with_context(|| format!("loading {:?}", config_path))?;
    if let Some(count) = count {
        config.session.capture_count = count;
    }
    if let Some(delay_ms) = delay_ms {
        config.session.inter_capture_delay_ms = delay_ms;
    }
    if let Some(output) = output {
        config.storage.output_root = output;
    }
    config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        log::warn!("Interrupt received, stopping after the current capture");
        handler_flag.cancel();
    })?;

    let manifest = if simulate {
        let [width, height] = config.camera.resolution;
        run_session(SimulatedHardware::new(width, height), &config, cancel, json)?
    } else {
        run_session(ConfiguredHardware::new(config.clone()), &config, cancel, json)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&manifest)?);
    } else {
        print_summary(&manifest);
    }
    Ok(())
}

fn run_session<P: HardwareProvider>(
    provider: P,
    config: &ColometryConfig,
    cancel: CancelFlag,
    json: bool,
) -> anyhow::Result<SessionManifest> {
    let mut session = CaptureSession::new(provider, config).with_cancel_flag(cancel);
    match session.run() {
        Ok(manifest) => Ok(manifest),
        Err(failure) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&failure.manifest)?);
            } else {
                print_summary(&failure.manifest);
            }
            Err(failure.into())
        }
    }
}

fn print_summary(manifest: &SessionManifest) {
    println!(
        "Session {}: {}/{} captures",
        manifest.session_id, manifest.completed_captures, manifest.target_capture_count
    );
    for record in &manifest.capture_records {
        println!("  capture {:02}: {}", record.capture_index, record.rgb_summary());
    }
    match &manifest.outcome {
        SessionOutcome::Completed => {}
        SessionOutcome::EndedEarly {
            failed_capture,
            reason,
        } => println!("  ended early at capture {}: {}", failed_capture, reason),
        SessionOutcome::Cancelled { after_capture } => {
            println!("  cancelled after capture {}", after_capture)
        }
        SessionOutcome::Aborted { reason } => println!("  aborted: {}", reason),
    }
    match &manifest.document_path {
        Some(path) => println!("Report: {} ({} pages)", path.display(), manifest.page_count),
        None => println!("Report: not written"),
    }
}

fn cmd_latest(args: &[String]) -> anyhow::Result<()> {
    // Parse args: latest <image|histogram|pdf> [--output DIR]
    let mut kind = None;
    let mut output = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--output" => {
                i += 1;
                output = Some(flag_value(args, i, "--output")?.to_string());
            }
            other => {
                if kind.is_none() {
                    kind = Some(other.parse::<ArtifactKind>()?);
                } else {
                    bail!("Unexpected argument for latest: {}", other);
                }
            }
        }
        i += 1;
    }

    let kind = kind.ok_or_else(|| anyhow!("artifact kind required (image, histogram or pdf)"))?;
    let root = match output {
        Some(root) => root,
        None => ColometryConfig::load_or_default().storage.output_root,
    };

    let layout = ArtifactLayout::new(root);
    match layout.latest(kind)? {
        Some(path) => println!("{}", path.display()),
        None => bail!("No {} artifacts under {:?}", kind.extension(), layout.dir(kind)),
    }
    Ok(())
}

fn cmd_init_config(args: &[String]) -> anyhow::Result<()> {
    let path = args
        .get(2)
        .map(PathBuf::from)
        .unwrap_or_else(ColometryConfig::default_path);
    if path.exists() {
        bail!("{:?} already exists", path);
    }
    ColometryConfig::default().save_to_file(&path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}
