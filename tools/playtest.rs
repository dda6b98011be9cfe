/// Playtest — interactive terminal shell for test-playing a scenario.
///
/// Usage: playtest --scenario <file.json> [--config <file.ron>] [--seed <n>] [--start <scene>]
///
/// Commands:
///   <n>       — take the n-th offered choice (1-based)
///   next      — continue past a line without choices
///   vars      — print current variable values
///   history   — print the choices taken so far
///   score     — print the current score and ending
///   reset     — start the playthrough over
///   help      — list commands
///   quit      — exit
///
/// Set RUST_LOG (e.g. `RUST_LOG=narrative_playback=debug`) to trace the engine.

use narrative_playback::core::config::DirectorConfig;
use narrative_playback::core::director::NarrativeDirector;
use narrative_playback::schema::event::{DiceOutcome, EventKind, PlaybackEvent};
use narrative_playback::schema::scenario::Scenario;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut scenario_path = None;
    let mut config_path = None;
    let mut seed: Option<u64> = None;
    let mut start_scene = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scenario" if i + 1 < args.len() => {
                i += 1;
                scenario_path = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                match args[i].parse() {
                    Ok(n) => seed = Some(n),
                    Err(_) => {
                        eprintln!("Invalid seed: {}", args[i]);
                        std::process::exit(1);
                    }
                }
            }
            "--start" if i + 1 < args.len() => {
                i += 1;
                start_scene = Some(args[i].clone());
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(scenario_path) = scenario_path else {
        eprintln!("--scenario is required");
        print_usage();
        std::process::exit(1);
    };

    let scenario = match Scenario::load_from_json(Path::new(&scenario_path)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading {}: {}", scenario_path, e);
            std::process::exit(1);
        }
    };

    let mut config = match config_path {
        Some(ref path) => match DirectorConfig::load_from_ron(Path::new(path)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => DirectorConfig::default(),
    };
    if start_scene.is_some() {
        config.start_scene = start_scene;
    }

    println!("Loaded {} scenes from {}", scenario.len(), scenario_path);
    match seed.or(config.seed) {
        Some(seed) => println!("Seed: {}", seed),
        None => println!("Seed: random"),
    }
    println!("Type 'help' for commands.\n");

    let mut builder = NarrativeDirector::builder().scenario(scenario).config(config);
    if let Some(seed) = seed {
        builder = builder.seed(seed);
    }
    let mut director = match builder.build() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    attach_renderer(&mut director);

    if let Err(e) = director.start() {
        eprintln!("Playback error: {}", e);
        std::process::exit(1);
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("playtest> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = match line.to_lowercase().as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
                Ok(())
            }
            "next" | "n" => director.advance(),
            "vars" => {
                for (name, value) in director.snapshot().iter() {
                    println!("  {:<16} {}", name, value);
                }
                Ok(())
            }
            "history" => {
                if director.history().is_empty() {
                    println!("  (no choices yet)");
                }
                for (n, entry) in director.history().iter().enumerate() {
                    println!(
                        "  {:>2}. [{}] {} ({})",
                        n + 1,
                        entry.scene_id.as_deref().unwrap_or("-"),
                        entry.choice.text,
                        entry.timestamp.format("%H:%M:%S")
                    );
                }
                Ok(())
            }
            "score" => {
                print_score(&director);
                Ok(())
            }
            "reset" => {
                director.reset();
                println!("--- reset ---");
                director.start()
            }
            other => match other.parse::<usize>() {
                Ok(n) if n >= 1 => match director.choose(n - 1) {
                    Ok(true) => Ok(()),
                    Ok(false) => {
                        println!("No choice {} here.", n);
                        Ok(())
                    }
                    Err(e) => Err(e),
                },
                _ => {
                    println!("Unknown command: {}. Type 'help' for commands.", other);
                    Ok(())
                }
            },
        };

        if let Err(e) = result {
            eprintln!("Playback error: {}", e);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

/// Print events the way a presentation layer would render them.
fn attach_renderer(director: &mut NarrativeDirector) {
    let channel = director.channel_mut();
    channel.subscribe(EventKind::SceneChanged, |event| {
        if let PlaybackEvent::SceneChanged { scene_id } = event {
            println!("\n=== {} ===", scene_id);
        }
        Ok(())
    });
    channel.subscribe(EventKind::DialogueShow, |event| {
        if let PlaybackEvent::DialogueShow(shown) = event {
            if let Some(ref directions) = shown.stage_directions {
                println!("  ({})", directions);
            }
            println!("{}: {}", shown.speaker, shown.text);
            if shown.choices.is_empty() {
                println!("  [next]");
            }
        }
        Ok(())
    });
    channel.subscribe(EventKind::ChoicesShow, |event| {
        if let PlaybackEvent::ChoicesShow { choices } = event {
            for (n, choice) in choices.iter().enumerate() {
                println!("  {}) {}", n + 1, choice.text);
            }
        }
        Ok(())
    });
    channel.subscribe(EventKind::VariablesDelta, |event| {
        if let PlaybackEvent::VariablesDelta { deltas } = event {
            for d in deltas.iter().filter(|d| d.delta != 0.0) {
                println!("  * {} {:+} -> {}", d.variable, d.delta, d.value);
            }
        }
        Ok(())
    });
    channel.subscribe(EventKind::DiceRolled, |event| {
        if let PlaybackEvent::DiceRolled(roll) = event {
            let verdict = match roll.outcome {
                DiceOutcome::Success => "success",
                DiceOutcome::Failure => "failure",
            };
            println!(
                "  * rolled {} on d{} (need {}): {}",
                roll.roll, roll.sides, roll.difficulty, verdict
            );
        }
        Ok(())
    });
    channel.subscribe(EventKind::Diagnostic, |event| {
        if let PlaybackEvent::Diagnostic(diag) = event {
            println!("  ! {:?}: {}", diag.severity, diag.message);
        }
        Ok(())
    });
    channel.subscribe(EventKind::PlaybackEnded, |event| {
        if let PlaybackEvent::PlaybackEnded { reason } = event {
            println!("\n--- The end ({:?}). Type 'score' or 'reset'. ---", reason);
        }
        Ok(())
    });
}

fn print_score(director: &NarrativeDirector) {
    println!("Score: {}", director.final_score());
    if let Some(ending) = director.ending() {
        println!("Ending: {} [{}]", ending.title, ending.grade);
        println!("  {}", ending.message);
    }
}

fn print_usage() {
    println!(
        "Usage: playtest --scenario <file.json> [--config <file.ron>] [--seed <n>] [--start <scene>]"
    );
}

fn print_help() {
    println!("Commands:");
    println!("  <n>       — take the n-th offered choice");
    println!("  next      — continue past a line without choices");
    println!("  vars      — print current variable values");
    println!("  history   — print the choices taken so far");
    println!("  score     — print the current score and ending");
    println!("  reset     — start the playthrough over");
    println!("  help      — list commands");
    println!("  quit      — exit");
}
