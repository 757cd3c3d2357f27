use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempo_core::presets::{find_zone, zone_presets};
use tempo_core::*;

#[derive(Parser)]
#[command(name = "hrtempo")]
#[command(about = "Heart-rate driven music tempo control", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recorded readings CSV through a full session and export the log
    Replay {
        /// CSV with timestamp,bpm,sensor_contact,rr_intervals,energy_expended
        readings: PathBuf,

        /// JSON array of tracks to select from
        #[arg(long)]
        library: Option<PathBuf>,

        /// Target zone preset, e.g. "zone 3"
        #[arg(long)]
        zone: Option<String>,

        /// Export directory (defaults to data.export_dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Decode one heart-rate measurement payload given as hex
    Decode {
        /// e.g. "16 5a 00 04" or 0x165a0004
        hex: String,
    },

    /// List the built-in zone presets
    Zones,

    /// Show the effective configuration
    Config {
        /// Also save it to the default config path
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tempo_core::logging::init_with_level(&config.logging.level);

    match cli.command {
        Commands::Replay {
            readings,
            library,
            zone,
            out,
        } => cmd_replay(&readings, library.as_deref(), zone.as_deref(), out, &config),
        Commands::Decode { hex } => cmd_decode(&hex),
        Commands::Zones => cmd_zones(),
        Commands::Config { write } => cmd_config(&config, write),
    }
}

fn cmd_replay(
    readings_path: &Path,
    library_path: Option<&Path>,
    zone: Option<&str>,
    out: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let mut algorithm = config.algorithm.clone();
    if let Some(name) = zone {
        let preset = find_zone(name)
            .ok_or_else(|| Error::Config(format!("Unknown zone preset: {}", name)))?;
        algorithm.target_zone = preset.clone();
    }
    algorithm.validate()?;

    let readings = load_readings(readings_path)?;
    tracing::info!(
        "Replaying {} readings against {}",
        readings.len(),
        algorithm.target_zone.name
    );
    // Session time follows the recording, not the wall clock
    let start = readings.first().map_or(0, |r| r.timestamp);
    let clock = Rc::new(ManualClock::new(start));

    let library = match library_path {
        Some(path) => MusicLibrary::load_from(path, clock.clone())?,
        None => MusicLibrary::with_clock(clock.clone()),
    };
    let mut pipeline = Pipeline::new(
        EventBus::new(),
        algorithm,
        library,
        Box::new(SilentSink::default()),
        clock.clone(),
    );

    let session_id = pipeline.start_session()?;
    for reading in readings {
        clock.set(reading.timestamp);
        pipeline.feed(reading);
    }
    let log = pipeline.stop_session(StopReason::User)?;

    let out_dir = out.unwrap_or_else(|| config.data.export_dir.clone());
    let paths = write_exports(&log, &out_dir)?;

    display_summary(&session_id, &log);
    println!();
    println!("  Time series: {}", paths.time_series.display());
    println!("  Events:      {}", paths.events.display());
    println!("  JSON:        {}", paths.json.display());

    Ok(())
}

fn display_summary(session_id: &str, log: &SessionLog) {
    let zone = &log.config.target_zone;
    let meta = &log.metadata;
    let hr = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| v.to_string());

    println!("Session {}", session_id);
    println!(
        "  Zone: {} [{}-{}]",
        zone.name, zone.min_bpm, zone.max_bpm
    );
    println!("  Duration: {} ms", log.duration_ms);
    println!("  Readings: {}", log.time_series.len());
    println!(
        "  Heart rate: avg {} / min {} / max {}",
        hr(meta.avg_heart_rate),
        hr(meta.min_heart_rate),
        hr(meta.max_heart_rate)
    );
    println!(
        "  Time in zone: {} ms (below {} ms, above {} ms)",
        meta.time_in_zone_ms, meta.time_below_zone_ms, meta.time_above_zone_ms
    );
    println!("  Target changes: {}", meta.total_bpm_target_changes);
    println!("  Tracks played: {}", meta.total_tracks_played);
}

fn cmd_decode(hex: &str) -> Result<()> {
    let bytes = parse_hex(hex)?;
    let parsed = parse_measurement(&bytes)?;

    println!("bpm: {}", parsed.bpm);
    println!("sensor_contact: {}", parsed.sensor_contact);
    match parsed.energy_expended {
        Some(kj) => println!("energy_expended: {} kJ", kj),
        None => println!("energy_expended: -"),
    }
    let rr: Vec<String> = parsed.rr_intervals.iter().map(u32::to_string).collect();
    println!("rr_intervals: [{}]", rr.join(", "));
    Ok(())
}

fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let digits: String = input
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();

    if digits.len() % 2 != 0 {
        return Err(Error::Decode(format!(
            "hex payload has an odd number of digits: {}",
            input
        )));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            let pair = digits.get(i..i + 2).unwrap_or_default();
            u8::from_str_radix(pair, 16)
                .map_err(|_| Error::Decode(format!("invalid hex byte '{}'", pair)))
        })
        .collect()
}

fn cmd_zones() -> Result<()> {
    for zone in zone_presets() {
        println!(
            "{:<20} {:>3}-{:<3} bpm  {}",
            zone.name, zone.min_bpm, zone.max_bpm, zone.color
        );
    }
    Ok(())
}

fn cmd_config(config: &Config, write: bool) -> Result<()> {
    print!("{}", config.to_toml()?);

    if write {
        config.save()?;
        println!();
        println!("✓ Saved to {}", Config::default_config_path().display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("16 5a 00 04").unwrap(), vec![0x16, 0x5a, 0x00, 0x04]);
        assert_eq!(parse_hex("0x0048").unwrap(), vec![0x00, 0x48]);
        assert_eq!(parse_hex("00:48").unwrap(), vec![0x00, 0x48]);
        assert!(parse_hex("123").is_err());
        assert!(parse_hex("zz").is_err());
    }
}
