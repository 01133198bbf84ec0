use clap::{Arg, Command};
use log::LevelFilter;
use mailscope::{AnalyzerConfig, MessageAnalyzer};
use std::io::Read;
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("mailscope")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Heuristic threat assessment for raw email messages")
        .arg(
            Arg::new("message")
                .value_name("FILE")
                .help("Raw message file to analyze, or - for stdin")
                .index(1),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("offline")
                .long("offline")
                .help("Skip all external enrichment lookups")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        if let Err(e) = AnalyzerConfig::default().to_file(generate_path) {
            eprintln!("Error writing configuration: {e}");
            process::exit(1);
        }
        println!("Default configuration written to {generate_path}");
        return;
    }

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => match AnalyzerConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading configuration: {e}");
                process::exit(1);
            }
        },
        None => AnalyzerConfig::default(),
    };

    if matches.get_flag("offline") {
        config.enrichment_enabled = false;
    }

    let Some(message_path) = matches.get_one::<String>("message") else {
        eprintln!("No message file given; see --help");
        process::exit(1);
    };

    let raw = match read_message(message_path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error reading {message_path}: {e}");
            process::exit(1);
        }
    };

    let analyzer = MessageAnalyzer::new(config);
    let result = analyzer.analyze(&raw).await;

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error serializing result: {e}");
            process::exit(1);
        }
    }
}

fn read_message(path: &str) -> std::io::Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(path)
    }
}
