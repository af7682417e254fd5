use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use mbcorp_corpus::{CorpusConfig, CorpusError, build_validated_corpus, render_summary, write_corpus};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct CliConfig {
    corpus: CorpusConfig,
    summary: bool,
    log_json: bool,
}

fn print_help() {
    let help = "\
corpus_generator: deterministic Modbus/TCP conformance corpus

USAGE:
    corpus_generator [OPTIONS]

OPTIONS:
    --output <PATH>       Corpus root directory (default: corpus)
    --seed <u64>          Fuzz generator seed (default: 42)
    --fuzz-cap <N>        Fuzz messages kept (default: 250)
    --force               Replace an existing output directory
    --summary             Print the operator summary after writing
    --log-json            Emit logs as JSON lines
    -h, --help            Show this help

Log filtering follows RUST_LOG (default: info).
";
    println!("{help}");
}

fn parse_args(args: &[String]) -> Result<CliConfig, String> {
    let mut config = CliConfig {
        corpus: CorpusConfig::default(),
        summary: false,
        log_json: false,
    };

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--output" => {
                index += 1;
                if index >= args.len() {
                    return Err("--output requires a value".to_owned());
                }
                config.corpus.output_dir = PathBuf::from(&args[index]);
            }
            "--seed" => {
                index += 1;
                if index >= args.len() {
                    return Err("--seed requires a value".to_owned());
                }
                config.corpus.seed = args[index]
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --seed value: {}", args[index]))?;
            }
            "--fuzz-cap" => {
                index += 1;
                if index >= args.len() {
                    return Err("--fuzz-cap requires a value".to_owned());
                }
                config.corpus.fuzz_cap = args[index]
                    .parse::<usize>()
                    .map_err(|_| format!("invalid --fuzz-cap value: {}", args[index]))?;
            }
            "--force" => config.corpus.overwrite = true,
            "--summary" => config.summary = true,
            "--log-json" => config.log_json = true,
            "-h" | "--help" => {
                print_help();
                return Err(String::new());
            }
            unknown => return Err(format!("unknown option: {unknown}")),
        }
        index += 1;
    }

    Ok(config)
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn describe(error: CorpusError) -> String {
    if error.is_io() {
        format!("filesystem: {error}")
    } else {
        error.to_string()
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let config = parse_args(args)?;
    init_tracing(config.log_json);

    let corpus = build_validated_corpus(&config.corpus).map_err(describe)?;
    let report = write_corpus(&corpus, &config.corpus).map_err(describe)?;

    if config.summary {
        println!("{}", render_summary(corpus.manifest()));
    }
    println!(
        "wrote {} messages to {} (manifest sha256 {})",
        report.files_written,
        report.root.display(),
        report.manifest_sha256
    );
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) if error.is_empty() => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("ERROR corpus_generator failed: {error}");
            ExitCode::from(2)
        }
    }
}
