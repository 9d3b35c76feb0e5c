use clap::Parser;
use glossa::{
    cli::{Args, Commands},
    error::Result,
    io::{InputSource, LineBuffer, StdinInput},
    parser::parse,
    runtime::Interpreter,
};
use log::{debug, info};
use std::{fs, path::PathBuf, process::ExitCode};

fn run_file(file: PathBuf, input: Option<PathBuf>) -> Result<()> {
    let source = fs::read_to_string(file)?;
    let program = parse(&source)?;

    let input: Box<dyn InputSource> = match input {
        Some(path) => Box::new(LineBuffer::from_text(&fs::read_to_string(path)?)),
        None => Box::new(StdinInput),
    };

    let mut interpreter = Interpreter::new(input);
    let result = interpreter.run(&program);
    // output emitted before a runtime error still belongs to the user
    for line in interpreter.output() {
        println!("{line}");
    }
    result.map(|_| ())
}

fn check_file(file: PathBuf) -> Result<()> {
    let source = fs::read_to_string(file)?;
    let program = parse(&source)?;
    debug!("{program:#?}");
    println!("OK");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let result = match args.command {
        Commands::Run { file, input } => {
            info!("FILE MODE");
            debug!("file: {file:?}");
            run_file(file, input)
        }
        Commands::Check { file } => {
            info!("CHECK MODE");
            debug!("file: {file:?}");
            check_file(file)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
