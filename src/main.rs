/// Headless exam replay for native builds.
///
/// Usage: `exam-replay <script.json> [config.json]`, or
/// `exam-replay --init-config [config.json]` to write a default config.
///
/// Prints the submission payload produced by the replay as JSON.
#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use std::path::PathBuf;

    use exam_canvas::config::ExamConfig;
    use exam_canvas::logging;
    use exam_canvas::replay::{Replay, ReplayScript};

    let mut args = std::env::args().skip(1);
    let Some(first) = args.next() else {
        eprintln!("Usage: exam-replay <script.json> [config.json]");
        eprintln!("       exam-replay --init-config [config.json]");
        std::process::exit(2);
    };

    if first == "--init-config" {
        let Some(path) = args.next().map(PathBuf::from).or_else(ExamConfig::default_path) else {
            eprintln!("No config directory available; pass a path");
            std::process::exit(2);
        };
        logging::init(ExamConfig::default().log_level);
        if let Err(e) = ExamConfig::default().save_to(&path) {
            log::error!("Failed to write {:?}: {}", path, e);
            std::process::exit(1);
        }
        return;
    }

    let script_path = PathBuf::from(first);
    let config = match args.next() {
        Some(path) => ExamConfig::load_or_default(&PathBuf::from(path)),
        None => ExamConfig::load_from_default_path(),
    };
    logging::init(config.log_level);

    let script = match ReplayScript::load(&script_path) {
        Ok(script) => script,
        Err(e) => {
            log::error!("Failed to load {:?}: {}", script_path, e);
            std::process::exit(1);
        }
    };

    let outcome = match Replay::new(config, script).run() {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Replay failed: {}", e);
            std::process::exit(1);
        }
    };

    for message in &outcome.rejected {
        log::warn!("Rejected: {}", message);
    }
    match &outcome.submission {
        Some(submission) => match serde_json::to_string_pretty(submission) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                log::error!("Failed to serialize submission: {}", e);
                std::process::exit(1);
            }
        },
        None => log::warn!("Replay finished without a submission"),
    }
    if !outcome.finished {
        std::process::exit(1);
    }
}

// WASM doesn't use main(), it uses wasm_bindgen's start function
#[cfg(target_arch = "wasm32")]
fn main() {}
