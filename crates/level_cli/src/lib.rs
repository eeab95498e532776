use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use level_engine::runtime::{FixedStepClock, MetricsAccumulator, MetricsHandle, TickReport};
use level_engine::{
    classify_payload, resolve_level_paths, write_level_file, Decompressor, EngineConfig, FsStorage,
    LevelLoader, PayloadKind, RuntimeLevel, SimulationConfig,
};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_SIMULATE_SECONDS: f32 = 10.0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommonOptions {
    pub root: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    Decode { input: PathBuf },
    Inspect { level_id: i64, section: Option<usize> },
    Simulate {
        level_id: i64,
        seconds: f32,
        realtime: bool,
    },
    Pack { level_id: i64, input: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Help,
    Run {
        options: CommonOptions,
        kind: CommandKind,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path} at {json_path}: {message}")]
    Parse {
        path: PathBuf,
        json_path: String,
        message: String,
    },
}

pub fn parse_args(args: &[String]) -> Result<Invocation, String> {
    if args.is_empty() {
        return Err(usage_text());
    }
    if args[0] == "-h" || args[0] == "--help" {
        return Ok(Invocation::Help);
    }

    let mut options = CommonOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        match args[index].as_str() {
            "--root" => {
                let value = flag_value(args, index, "--root")?;
                options.root = Some(PathBuf::from(value));
                index += 2;
            }
            "--config" => {
                let value = flag_value(args, index, "--config")?;
                options.config_path = Some(PathBuf::from(value));
                index += 2;
            }
            _ => break,
        }
    }

    let command = args
        .get(index)
        .ok_or_else(|| "missing subcommand".to_string())?
        .as_str();
    let command_args = &args[(index + 1)..];

    let kind = match command {
        "decode" => {
            let [input] = command_args else {
                return Err("decode requires exactly one file path".to_string());
            };
            CommandKind::Decode {
                input: PathBuf::from(input),
            }
        }
        "inspect" => {
            let level_id = level_id_arg(command_args, "inspect")?;
            let section = match &command_args[1..] {
                [] => None,
                [flag, value] if flag == "--section" => Some(value.parse::<usize>().map_err(
                    |_| format!("invalid --section value '{value}' (expected usize)"),
                )?),
                _ => return Err("inspect accepts only --section <usize>".to_string()),
            };
            CommandKind::Inspect { level_id, section }
        }
        "simulate" => {
            let level_id = level_id_arg(command_args, "simulate")?;
            let mut seconds = DEFAULT_SIMULATE_SECONDS;
            let mut realtime = false;
            let mut option_index = 1usize;
            while option_index < command_args.len() {
                match command_args[option_index].as_str() {
                    "--seconds" => {
                        let value = flag_value(command_args, option_index, "--seconds")?;
                        seconds = value
                            .parse::<f32>()
                            .ok()
                            .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                            .ok_or_else(|| {
                                format!(
                                    "invalid --seconds value '{value}' (expected non-negative f32)"
                                )
                            })?;
                        option_index += 2;
                    }
                    "--realtime" => {
                        realtime = true;
                        option_index += 1;
                    }
                    other => return Err(format!("unknown simulate option '{other}'")),
                }
            }
            CommandKind::Simulate {
                level_id,
                seconds,
                realtime,
            }
        }
        "pack" => {
            let level_id = level_id_arg(command_args, "pack")?;
            let [_, input] = command_args else {
                return Err("pack requires <level-id> <body-file>".to_string());
            };
            CommandKind::Pack {
                level_id,
                input: PathBuf::from(input),
            }
        }
        other => return Err(format!("unknown subcommand '{other}'")),
    };

    Ok(Invocation::Run { options, kind })
}

fn flag_value<'a>(args: &'a [String], index: usize, flag: &str) -> Result<&'a str, String> {
    args.get(index + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn level_id_arg(command_args: &[String], command: &str) -> Result<i64, String> {
    let value = command_args
        .first()
        .ok_or_else(|| format!("{command} requires a level id"))?;
    value
        .parse::<i64>()
        .map_err(|_| format!("invalid level id '{value}' (expected i64)"))
}

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_json(&raw).map_err(|(json_path, message)| ConfigError::Parse {
        path: path.to_path_buf(),
        json_path,
        message,
    })
}

fn parse_config_json(raw: &str) -> Result<EngineConfig, (String, String)> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, EngineConfig>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        let source = error.into_inner();
        (path, source.to_string())
    })
}

pub fn run<W: Write>(
    kind: CommandKind,
    opts: &CommonOptions,
    stdout: &mut W,
) -> Result<(), String> {
    let config = load_config(opts.config_path.as_deref()).map_err(|error| error.to_string())?;

    match kind {
        CommandKind::Decode { input } => run_decode(&input, &config, stdout),
        CommandKind::Inspect { level_id, section } => {
            let mut loader = open_loader(opts, config)?;
            run_inspect(&mut loader, level_id, section, stdout)
        }
        CommandKind::Simulate {
            level_id,
            seconds,
            realtime,
        } => {
            let mut loader = open_loader(opts, config)?;
            run_simulate(&mut loader, level_id, seconds, realtime, stdout)
        }
        CommandKind::Pack { level_id, input } => {
            let paths = resolve_level_paths(opts.root.as_deref(), &config.sources)
                .map_err(|error| error.to_string())?;
            let body = fs::read_to_string(&input).map_err(|error| {
                format!("failed to read body file '{}': {error}", input.display())
            })?;
            let written = write_level_file(&paths.root, &config.sources, level_id, body.trim())
                .map_err(|error| error.to_string())?;
            write_line(stdout, &format!("written: {}", written.display()))
        }
    }
}

fn open_loader(
    opts: &CommonOptions,
    config: EngineConfig,
) -> Result<LevelLoader<FsStorage>, String> {
    let paths = resolve_level_paths(opts.root.as_deref(), &config.sources)
        .map_err(|error| error.to_string())?;
    info!(root = %paths.root.display(), "level_root_resolved");
    Ok(LevelLoader::new(FsStorage::new(paths.root), config))
}

fn run_decode<W: Write>(input: &Path, config: &EngineConfig, stdout: &mut W) -> Result<(), String> {
    let payload = fs::read(input)
        .map_err(|error| format!("failed to read payload file '{}': {error}", input.display()))?;
    let kind = classify_payload(&payload);
    let text = match kind {
        PayloadKind::DelimitedText => String::from_utf8_lossy(&payload).trim().to_string(),
        PayloadKind::Compressed | PayloadKind::Unknown => Decompressor::new(config.decode)
            .decode(&payload)
            .map_err(|error| format!("failed to decode '{}': {error}", input.display()))?,
    };
    info!(payload_kind = ?kind, decoded_len = text.len(), "payload_decoded");
    write_line(stdout, &text)
}

fn run_inspect<W: Write>(
    loader: &mut LevelLoader<FsStorage>,
    level_id: i64,
    section: Option<usize>,
    stdout: &mut W,
) -> Result<(), String> {
    let loaded = loader.load(level_id).map_err(|error| error.to_string())?;
    let document = &loaded.document;
    let level = &loaded.runtime;

    write_line(stdout, &format!("level: {level_id}"))?;
    write_line(stdout, &format!("name: {}", document.name().unwrap_or("-")))?;
    write_line(stdout, &format!("creator: {}", document.creator().unwrap_or("-")))?;
    write_line(
        stdout,
        &format!(
            "source: {}",
            document.source().map_or("-", |source| source.label())
        ),
    )?;
    write_line(stdout, &format!("objects: {}", level.object_count()))?;
    write_line(stdout, &format!("skipped_records: {}", loaded.issues.len()))?;
    write_line(stdout, &format!("sections: {}", level.section_count()))?;
    write_line(
        stdout,
        &format!("occupied_sections: {}", level.sections().occupied_sections()),
    )?;
    write_line(stdout, &format!("game_mode: {}", level.header().game_mode()))?;
    write_line(stdout, &format!("speed: {}", level.header().speed()))?;

    if let Some(section) = section {
        let mut objects = level.objects_in_section(section).collect::<Vec<_>>();
        objects.sort_by_key(|object| object.id);
        write_line(stdout, &format!("section {section}: {} object(s)", objects.len()))?;
        for object in objects {
            write_line(
                stdout,
                &format!(
                    "  #{} type={} x={} y={}",
                    object.id.0, object.type_id, object.position.x, object.position.y
                ),
            )?;
        }
    }
    Ok(())
}

fn run_simulate<W: Write>(
    loader: &mut LevelLoader<FsStorage>,
    level_id: i64,
    seconds: f32,
    realtime: bool,
    stdout: &mut W,
) -> Result<(), String> {
    let simulation = loader.config().simulation.clone();
    let level = loader
        .load(level_id)
        .map_err(|error| error.to_string())?
        .runtime;

    let mut run = SimulationRun::new(level, &simulation);
    if realtime {
        run_realtime(&mut run, &simulation, seconds);
    } else {
        run_fixed_steps(&mut run, &simulation, seconds);
    }

    let level = &run.level;
    write_line(stdout, &format!("level: {level_id}"))?;
    write_line(stdout, &format!("ticks: {}", level.ticks()))?;
    write_line(stdout, &format!("player_x: {:.2}", level.player_x()))?;
    write_line(stdout, &format!("triggers_fired: {}", run.triggers_fired))?;
    write_line(stdout, &format!("moves_completed: {}", run.totals.completed))?;
    write_line(stdout, &format!("moves_active: {}", level.moves().active_count()))?;
    write_line(stdout, &format!("relocations: {}", run.totals.relocations))?;
    write_line(stdout, &format!("edits_applied: {}", run.edits_applied))?;
    write_line(stdout, &format!("sections: {}", level.section_count()))?;
    write_line(
        stdout,
        &format!("dropped_backlog_ms: {}", run.dropped_backlog.as_millis()),
    )?;
    write_line(stdout, &format!("last_tps: {:.1}", run.metrics.snapshot().tps))
}

struct SimulationRun {
    level: RuntimeLevel,
    started: Instant,
    totals: TickReport,
    triggers_fired: usize,
    edits_applied: usize,
    dropped_backlog: Duration,
    accumulator: MetricsAccumulator,
    metrics: MetricsHandle,
}

impl SimulationRun {
    fn new(level: RuntimeLevel, simulation: &SimulationConfig) -> Self {
        let started = Instant::now();
        Self {
            level,
            started,
            totals: TickReport::default(),
            triggers_fired: 0,
            edits_applied: 0,
            dropped_backlog: Duration::ZERO,
            accumulator: MetricsAccumulator::new(simulation.metrics_log_interval(), started),
            metrics: MetricsHandle::default(),
        }
    }

    fn step(&mut self, dt: Duration) {
        let tick_started = Instant::now();
        let report = self.level.tick(dt.as_secs_f32());
        self.accumulator.record_tick(
            tick_started.elapsed(),
            report.moves.relocations,
            report.edits_applied,
            self.level.moves().active_count(),
        );
        self.totals.absorb(report.moves);
        self.triggers_fired += report.triggers_fired;
        self.edits_applied += report.edits_applied;
    }

    fn record_dropped_backlog(&mut self, dropped: Duration) {
        if dropped > Duration::ZERO {
            debug!(dropped_ms = dropped.as_millis() as u64, "simulation_backlog_dropped");
        }
        self.dropped_backlog = self.dropped_backlog.saturating_add(dropped);
        self.accumulator.record_dropped_backlog(dropped);
    }

    fn publish_metrics(&mut self, now: Instant) {
        if let Some(snapshot) = self.accumulator.maybe_snapshot(now) {
            info!(
                tps = snapshot.tps,
                tick_time_ms = snapshot.tick_time_ms,
                relocations_per_sec = snapshot.relocations_per_sec,
                active_moves = snapshot.active_moves,
                dropped_backlog_ms = snapshot.dropped_backlog_ms,
                "simulation_metrics"
            );
            self.metrics.publish(snapshot);
        }
    }
}

/// Runs `round(seconds * target_tps)` ticks back to back. Metrics are stamped
/// with simulated time so the output does not depend on the host.
fn run_fixed_steps(run: &mut SimulationRun, simulation: &SimulationConfig, seconds: f32) {
    let fixed_dt = simulation.fixed_dt();
    let ticks = (f64::from(seconds) * f64::from(simulation.target_tps.max(1))).round() as u64;
    let mut simulated = Duration::ZERO;
    for _ in 0..ticks {
        run.step(fixed_dt);
        simulated = simulated.saturating_add(fixed_dt);
        run.publish_metrics(run.started + simulated);
    }
}

/// Paces ticks against the wall clock: each frame feeds its measured duration
/// to the fixed-step clock and runs the ticks it plans.
fn run_realtime(run: &mut SimulationRun, simulation: &SimulationConfig, seconds: f32) {
    let mut clock = FixedStepClock::new(
        simulation.fixed_dt(),
        simulation.max_ticks_per_frame,
        simulation.max_frame_delta(),
    );
    let fixed_dt = clock.fixed_dt();
    let total = Duration::try_from_secs_f32(seconds).unwrap_or(Duration::MAX);
    let deadline = run.started.checked_add(total);
    let mut last_frame = run.started;

    loop {
        let now = Instant::now();
        if deadline.is_some_and(|deadline| now >= deadline) {
            break;
        }
        let plan = clock.advance(now.saturating_duration_since(last_frame));
        last_frame = now;
        run.record_dropped_backlog(plan.dropped_backlog);
        for _ in 0..plan.ticks_to_run {
            run.step(fixed_dt);
        }
        run.publish_metrics(now);

        let remaining = deadline.map_or(fixed_dt, |deadline| {
            deadline.saturating_duration_since(Instant::now())
        });
        thread::sleep(fixed_dt.min(remaining));
    }
}

fn write_line<W: Write>(stdout: &mut W, line: &str) -> Result<(), String> {
    writeln!(stdout, "{line}").map_err(|error| format!("failed to write output: {error}"))
}

pub fn usage_text() -> String {
    [
        "level_cli - level payload tools",
        "",
        "Usage:",
        "  level_cli [--root <dir>] [--config <file>] decode <payload-file>",
        "  level_cli [--root <dir>] [--config <file>] inspect <level-id> [--section <usize>]",
        "  level_cli [--root <dir>] [--config <file>] simulate <level-id> [--seconds <f32>] [--realtime]",
        "  level_cli [--root <dir>] [--config <file>] pack <level-id> <body-file>",
        "",
        "Root:",
        "  --root, else LEVEL_ENGINE_ROOT, else the nearest ancestor of the executable",
        "  holding Cargo.toml and levels/ or Custom/",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use level_engine::encode_level_string;
    use tempfile::TempDir;

    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    fn run_to_string(kind: CommandKind, options: &CommonOptions) -> Result<String, String> {
        let mut out = Vec::new();
        run(kind, options, &mut out)?;
        Ok(String::from_utf8(out).expect("utf8 output"))
    }

    fn rooted(temp: &TempDir) -> CommonOptions {
        CommonOptions {
            root: Some(temp.path().to_path_buf()),
            config_path: None,
        }
    }

    #[test]
    fn parses_global_flags_then_subcommand() {
        let parsed = parse_args(&args(&[
            "--root", "/data", "--config", "engine.json", "inspect", "42", "--section", "3",
        ]))
        .expect("parse");
        assert_eq!(
            parsed,
            Invocation::Run {
                options: CommonOptions {
                    root: Some(PathBuf::from("/data")),
                    config_path: Some(PathBuf::from("engine.json")),
                },
                kind: CommandKind::Inspect {
                    level_id: 42,
                    section: Some(3),
                },
            }
        );
    }

    #[test]
    fn simulate_defaults_and_validates_seconds() {
        assert_eq!(
            parse_args(&args(&["simulate", "7"])).expect("parse"),
            Invocation::Run {
                options: CommonOptions::default(),
                kind: CommandKind::Simulate {
                    level_id: 7,
                    seconds: DEFAULT_SIMULATE_SECONDS,
                    realtime: false,
                },
            }
        );
        assert_eq!(
            parse_args(&args(&["simulate", "7", "--realtime", "--seconds", "0.5"])).expect("parse"),
            Invocation::Run {
                options: CommonOptions::default(),
                kind: CommandKind::Simulate {
                    level_id: 7,
                    seconds: 0.5,
                    realtime: true,
                },
            }
        );
        assert!(parse_args(&args(&["simulate", "7", "--seconds"])).is_err());
        assert!(parse_args(&args(&["simulate", "7", "--fast"])).is_err());
        assert!(parse_args(&args(&["simulate", "7", "--seconds", "-1"])).is_err());
        assert!(parse_args(&args(&["simulate", "7", "--seconds", "inf"])).is_err());
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(parse_args(&[]).is_err());
        assert!(parse_args(&args(&["--root"])).is_err());
        assert!(parse_args(&args(&["frobnicate"])).is_err());
        assert!(parse_args(&args(&["inspect", "abc"])).is_err());
        assert!(parse_args(&args(&["decode"])).is_err());
        assert!(parse_args(&args(&["pack", "3"])).is_err());
        assert_eq!(parse_args(&args(&["--help"])), Ok(Invocation::Help));
    }

    #[test]
    fn config_errors_carry_json_path() {
        let error = parse_config_json(r#"{"simulation": {"target_tps": "fast"}}"#)
            .expect_err("type mismatch");
        assert_eq!(error.0, "simulation.target_tps");

        let config = parse_config_json(r#"{"section_width": 64.0}"#).expect("partial config");
        assert_eq!(config.section_width, 64.0);
        assert_eq!(config.edit_queue_capacity, EngineConfig::default().edit_queue_capacity);
    }

    #[test]
    fn load_config_reports_missing_file() {
        let temp = TempDir::new().expect("temp");
        let error = load_config(Some(&temp.path().join("missing.json"))).expect_err("missing");
        assert!(matches!(error, ConfigError::Read { .. }));
    }

    #[test]
    fn decode_command_prints_plain_text() {
        let temp = TempDir::new().expect("temp");
        let input = temp.path().join("payload.txt");
        fs::write(&input, encode_level_string("1,1,2,15,3,15;").expect("encode")).expect("write");

        let output = run_to_string(CommandKind::Decode { input }, &CommonOptions::default())
            .expect("decode");
        assert_eq!(output, "1,1,2,15,3,15;\n");
    }

    #[test]
    fn pack_then_inspect_reports_level_summary() {
        let temp = TempDir::new().expect("temp");
        let body_path = temp.path().join("body.txt");
        fs::write(&body_path, "kA2,2,kA4,1;1,1,2,15,3,15;1,8,2,250,3,15;1,3").expect("body");
        let options = rooted(&temp);

        let packed = run_to_string(
            CommandKind::Pack {
                level_id: 21,
                input: body_path,
            },
            &options,
        )
        .expect("pack");
        assert!(packed.starts_with("written: "), "{packed}");

        let output = run_to_string(
            CommandKind::Inspect {
                level_id: 21,
                section: Some(1),
            },
            &options,
        )
        .expect("inspect");
        assert!(output.contains("objects: 2\n"), "{output}");
        assert!(output.contains("skipped_records: 1\n"), "{output}");
        assert!(output.contains("source: level_file\n"), "{output}");
        assert!(output.contains("game_mode: 2\n"), "{output}");
        assert!(output.contains("section 1: 1 object(s)\n  #1 type=8 x=250 y=15\n"), "{output}");
    }

    #[test]
    fn simulate_runs_trigger_and_reports_totals() {
        let temp = TempDir::new().expect("temp");
        let body = "1,901,2,30,3,15,10,0.5,28,250,51,1;1,1,2,150,3,15,57,1;";
        write_level_file(temp.path(), &Default::default(), 5, body).expect("write level");

        let output = run_to_string(
            CommandKind::Simulate {
                level_id: 5,
                seconds: 2.0,
                realtime: false,
            },
            &rooted(&temp),
        )
        .expect("simulate");
        assert!(output.contains("ticks: 120\n"), "{output}");
        assert!(output.contains("triggers_fired: 1\n"), "{output}");
        assert!(output.contains("moves_completed: 1\n"), "{output}");
        assert!(output.contains("moves_active: 0\n"), "{output}");
    }

    #[test]
    fn realtime_simulation_is_paced_by_the_clock() {
        let temp = TempDir::new().expect("temp");
        write_level_file(temp.path(), &Default::default(), 6, "1,1,2,150,3,15;")
            .expect("write level");

        let started = Instant::now();
        let output = run_to_string(
            CommandKind::Simulate {
                level_id: 6,
                seconds: 0.3,
                realtime: true,
            },
            &rooted(&temp),
        )
        .expect("simulate");
        assert!(started.elapsed() >= Duration::from_millis(300));

        let ticks = output
            .lines()
            .find_map(|line| line.strip_prefix("ticks: "))
            .and_then(|value| value.parse::<u64>().ok())
            .expect("ticks line");
        assert!(ticks >= 1, "{output}");
        assert!(ticks <= 60, "{output}");
    }

    #[test]
    fn inspect_missing_level_fails() {
        let temp = TempDir::new().expect("temp");
        let error = run_to_string(
            CommandKind::Inspect {
                level_id: 404,
                section: None,
            },
            &rooted(&temp),
        )
        .expect_err("missing");
        assert!(error.contains("404"), "{error}");
    }
}
