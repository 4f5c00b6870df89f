use std::env;

use plox::runner::{run_file, run_prompt};

fn main() -> std::io::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => {
            if let Err(err) = run_prompt() {
                log::error!("repl error: {err}");
            }
        }
        2 => run_file(&args[1])?,
        _ => {
            println!("Usage: plox [script]");
            std::process::exit(64);
        }
    }
    Ok(())
}
