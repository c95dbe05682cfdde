//! Freyr binary - command line entry point.

use std::io::BufRead;

use freyr::orchestrator::{self, RunOptions};
use freyr::scan::{MultilineScanner, strip_comment};
use freyr::{Engine, FreyrError, Result};

const USAGE: &str = "\
usage: freyr [options]
  -h, --help                print this help text and exit normally
  -l, --load <file>         open a config file and process it line-by-line
  -c, --command <cmd>       process a single command as-is
  -t, --thread-count <n>    animator threads to run in parallel, 0 for
                            in-loop animation
  -r, --frame-rate <fps>    target frame rate, default: 60 Hz
";

fn load_config(engine: &mut Engine, path: &str) -> Result<()> {
    let file = std::fs::File::open(path).map_err(|e| FreyrError::Config {
        path: path.to_string(),
        message: e.to_string(),
    })?;
    log::info!("processing config file {path}");

    let reader = std::io::BufReader::new(file);
    let mut scanner = MultilineScanner::new();
    let mut lineno = 0usize;
    for line in reader.lines() {
        lineno += 1;
        let line = line.map_err(|e| FreyrError::Config {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        let source = format!("{path}:{lineno}");
        scanner.process_line(&line, &mut |logical| {
            let logical = strip_comment(logical);
            if !logical.is_empty() {
                engine.run_command(logical, &source);
            }
        });
    }
    scanner.flush(&mut |logical| {
        let logical = strip_comment(logical);
        if !logical.is_empty() {
            engine.run_command(logical, &format!("{path}:{lineno}"));
        }
    });
    Ok(())
}

fn parse_and_run() -> Result<()> {
    let mut engine = Engine::new();
    let mut options = RunOptions::default();

    fn next_value(args: &[String], i: &mut usize, name: &str) -> Result<String> {
        *i += 1;
        args.get(*i)
            .cloned()
            .ok_or_else(|| FreyrError::Cli(format!("missing value for {name}")))
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print!("{USAGE}");
                return Ok(());
            }
            "-l" | "--load" => {
                let path = next_value(&args, &mut i, "--load")?;
                load_config(&mut engine, &path)?;
            }
            "-c" | "--command" => {
                let command = next_value(&args, &mut i, "--command")?;
                engine.run_command(&command, "cmdline");
            }
            "-t" | "--thread-count" => {
                let n = next_value(&args, &mut i, "--thread-count")?;
                options.threads = n
                    .parse()
                    .map_err(|_| FreyrError::Cli(format!("invalid thread count '{n}'")))?;
            }
            "-r" | "--frame-rate" => {
                let fps = next_value(&args, &mut i, "--frame-rate")?;
                options.fps = fps
                    .parse()
                    .map_err(|_| FreyrError::Cli(format!("invalid frame rate '{fps}'")))?;
                if options.fps <= 0.0 {
                    return Err(FreyrError::Cli(format!("invalid frame rate '{fps}'")));
                }
            }
            other => {
                return Err(FreyrError::Cli(format!("unknown argument '{other}'")));
            }
        }
        i += 1;
    }

    orchestrator::run(&mut engine, &options)
}

fn main() {
    env_logger::init();
    if let Err(err) = parse_and_run() {
        log::error!("{err}");
        eprintln!("freyr: {err}");
        std::process::exit(1);
    }
}
