//! Drives the lex → parse → resolve → evaluate pipeline for both file and
//! REPL entry points, and owns the process exit-code convention.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs::UTF_8;
use encoding_rs_io::DecodeReaderBytesBuilder;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::errors;
use crate::evaluator::Evaluator;
use crate::lexer::Scanner;
use crate::parser::Parser;
use crate::resolver::Resolver;

pub fn run_file(path: &str) -> std::io::Result<()> {
    let mut file = File::open(path)?;
    let mut decoder = DecodeReaderBytesBuilder::new()
        .encoding(Some(UTF_8))
        .build(&mut file);
    let mut source = String::new();
    decoder.read_to_string(&mut source)?;

    log::debug!("running file {}", Path::new(path).display());

    let mut evaluator = Evaluator::new();
    run(&source, &mut evaluator);

    if errors::had_error() {
        std::process::exit(65);
    }
    if errors::had_runtime_error() {
        std::process::exit(70);
    }
    Ok(())
}

pub fn run_prompt() -> rustyline::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut evaluator = Evaluator::new();

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                errors::reset_flags();
                run(&line, &mut evaluator);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                log::error!("readline error: {err}");
                break;
            }
        }
    }
    Ok(())
}

fn run(source: &str, evaluator: &mut Evaluator) {
    let tokens = Scanner::new(source).scan_tokens();
    log::trace!("tokens: {tokens:?}");

    let mut parser = Parser::new(tokens);
    let statements = parser.parse();
    if errors::had_error() {
        return;
    }

    let locals = Resolver::new().resolve(&statements);
    if errors::had_error() {
        return;
    }
    for (id, depth) in locals {
        evaluator.resolve(id, depth);
    }

    evaluator.interpret(&statements);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_prevents_evaluation_from_running() {
        errors::reset_flags();
        let mut evaluator = Evaluator::new();
        run("1 + ;", &mut evaluator);
        assert!(errors::had_error());
        assert!(!errors::had_runtime_error());
    }

    #[test]
    fn well_formed_source_runs_without_error() {
        errors::reset_flags();
        let mut evaluator = Evaluator::new();
        run("print 1 + 2;", &mut evaluator);
        assert!(!errors::had_error());
        assert!(!errors::had_runtime_error());
    }
}
