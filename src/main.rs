use anyhow::Context;
use clap::error::ErrorKind;
use logfiler::{Config, config, logging, pipeline};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        // 没有参数时打印帮助并以非零状态退出
        let _ = config::command().print_help();
        println!();
        return ExitCode::from(1);
    }

    let config = match Config::try_parse_from(&args) {
        Ok(Ok(config)) => config,
        Ok(Err(err)) => {
            eprintln!("error: {}", err);
            return ExitCode::from(1);
        }
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    logging::init_logging(config.verbose, config.silent);

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(1)
        }
    }
}

fn run(config: &Config) -> anyhow::Result<()> {
    let summary = pipeline::run(config)
        .with_context(|| format!("failed to import {}", config.file_path.display()))?;

    println!("{}", summary);
    println!("Done");
    Ok(())
}
