use clap::{Arg, ArgAction, Command, value_parser};
use log::{debug, error};
use open_lnk::config::LOG_MAX_BYTES;
use open_lnk::desktop::{Dialog, SystemOpener, show_error};
use open_lnk::{
    Config, Diagnostics, FinalTarget, Opener, ResolveError, Resolver, open_target, read_shortcut,
    synthesize,
};
use percent_encoding::percent_decode_str;
use serde_json::json;
use std::fs::{self, File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

/// Exit status, worst outcome wins.
const EXIT_FAILED: i32 = 1;
const EXIT_UNRESOLVED: i32 = 2;

/// Accept plain paths and `file://` URIs as handed over by file managers.
fn shortcut_path(arg: &str) -> PathBuf {
    match arg.strip_prefix("file://") {
        Some(rest) => {
            let rest = rest.strip_prefix("localhost").unwrap_or(rest);
            PathBuf::from(percent_decode_str(rest).decode_utf8_lossy().into_owned())
        }
        None => PathBuf::from(arg),
    }
}

fn open_log_file(config: &Config) -> Option<File> {
    fs::create_dir_all(&config.cache_dir).ok()?;
    let path = config.log_file();
    let too_big = fs::metadata(&path).is_ok_and(|m| m.len() > LOG_MAX_BYTES);
    OpenOptions::new()
        .create(true)
        .write(true)
        .append(!too_big)
        .truncate(too_big)
        .open(path)
        .ok()
}

fn main() {
    let matches = Command::new("open_lnk")
        .version(env!("CARGO_PKG_VERSION"))
        .author("k1nd0ne")
        .about("Open the target of Windows .lnk shortcuts on this machine.")
        .arg(
            Arg::new("shortcuts")
                .value_parser(value_parser!(String))
                .num_args(1..)
                .required(true)
                .help("Shortcut files (.lnk) or file:// URIs."),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Log every resolution step (same as --log-level debug)."),
        )
        .arg(
            Arg::new("assist")
                .long("assist")
                .action(ArgAction::SetTrue)
                .help("Prompt on the terminal when no dialog tool is installed."),
        )
        .arg(
            Arg::new("json")
                .short('j')
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the decoded shortcut and its resolution in JSON format."),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::SetTrue)
                .help("Display the decoded shortcut fields."),
        )
        .arg(
            Arg::new("no_open")
                .long("no-open")
                .action(ArgAction::SetTrue)
                .help("Print the resolved target instead of opening it."),
        )
        .arg(
            Arg::new("log_level")
                .short('l')
                .long("log-level")
                .value_parser(["error", "warn", "info", "debug", "trace"])
                .default_value("warn")
                .help("Set the log verbosity level"),
        )
        .get_matches();

    let mut config = Config::from_env();
    config.debug = matches.get_flag("debug");
    config.assist = matches.get_flag("assist");
    config.log_to_file |= !io::stdin().is_terminal();
    let json_output = matches.get_flag("json");
    let no_open = matches.get_flag("no_open");
    let show_info = matches.get_flag("info");

    // Initialize logger.
    let level_filter = match matches.get_one::<String>("log_level").map(String::as_str) {
        _ if config.debug => log::LevelFilter::Debug,
        Some("error") => log::LevelFilter::Error,
        Some("info") => log::LevelFilter::Info,
        Some("debug") => log::LevelFilter::Debug,
        Some("trace") => log::LevelFilter::Trace,
        _ => log::LevelFilter::Warn,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level_filter);
    if config.log_to_file {
        if let Some(file) = open_log_file(&config) {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
    }
    builder.init();
    debug!("{:?}", config);

    let mut resolver = Resolver::from_config(&config);
    if let Some(dialog) = Dialog::detect(config.assist) {
        debug!("Assistant dialog: {:?}", dialog);
        resolver = resolver.with_assistant(Box::new(dialog.clone()), Some(Box::new(dialog)));
    }
    let opener = SystemOpener;

    let mut exit_code = 0;
    let shortcuts: Vec<&String> = matches
        .get_many::<String>("shortcuts")
        .map(|v| v.collect())
        .unwrap_or_default();

    for arg in shortcuts {
        let given = shortcut_path(arg);
        let lnk_path = std::path::absolute(&given).unwrap_or(given);
        let code = process(
            &mut resolver,
            &opener,
            &lnk_path,
            Output {
                json: json_output,
                info: show_info,
                no_open,
            },
        );
        exit_code = exit_code.max(code);
    }
    std::process::exit(exit_code);
}

#[derive(Clone, Copy)]
struct Output {
    json: bool,
    info: bool,
    no_open: bool,
}

fn process(resolver: &mut Resolver, opener: &dyn Opener, lnk_path: &Path, out: Output) -> i32 {
    let record = match read_shortcut(lnk_path) {
        Ok(r) => r,
        Err(e) => {
            error!("{}: {}", lnk_path.display(), e);
            show_error(&format!("Cannot read {}: {}", lnk_path.display(), e));
            return EXIT_FAILED;
        }
    };

    if out.info && !out.json {
        println!("{}", record.to_table());
    }

    let outcome = resolver.resolve(&record, lnk_path);

    if out.json {
        let (kind, target) = match &outcome {
            Ok(FinalTarget::Path(p)) => ("path", Some(p.as_str())),
            Ok(FinalTarget::Uri(u)) => ("uri", Some(u.as_str())),
            Err(ResolveError::NoTargetFound) => ("no_target", None),
            Err(ResolveError::Unresolved(_)) => ("unresolved", None),
        };
        let value = json!({
            "lnk": lnk_path.display().to_string(),
            "record": record.to_json(),
            "windows_target": synthesize(&record).map(|t| t.windows().to_string()),
            "resolution": kind,
            "target": target,
        });
        match serde_json::to_string_pretty(&value) {
            Ok(s) => println!("{}", s),
            Err(e) => error!("Error serializing result to JSON: {}", e),
        }
    }

    let failure = match outcome {
        Ok(target) if out.no_open => {
            if !out.json {
                println!("{}", target.as_str());
            }
            return 0;
        }
        Ok(target) => match open_target(opener, &target, &record, lnk_path) {
            Ok(true) => return 0,
            Ok(false) => {
                show_error(&format!("Could not open {}", target.as_str()));
                return EXIT_FAILED;
            }
            Err(e) => e,
        },
        Err(e) => e,
    };

    match failure {
        ResolveError::NoTargetFound => {
            show_error(&format!("{}: no target path found in shortcut", lnk_path.display()));
            EXIT_FAILED
        }
        ResolveError::Unresolved(diag) => report_unresolved(&diag),
    }
}

fn report_unresolved(diag: &Diagnostics) -> i32 {
    show_error(&format!(
        "Could not resolve {}",
        diag.windows_target.as_deref().unwrap_or("(unknown target)")
    ));
    eprintln!("{}", diag);
    EXIT_UNRESOLVED
}
