// Rascal: a teaching interpreter for a Pascal subset.

use std::io::{IsTerminal, Read};
use std::path::Path;
use std::process;

use rascal::errors::{EXIT_INVALID_ARGUMENTS, EXIT_SOURCE_OPEN_FAILED, EXIT_TOO_MANY_ERRORS};
use rascal::executor::io::RuntimeConsole;
use rascal::executor::Executor;
use rascal::parser::Parser;
use rascal::scanner::source::SourceBuffer;
use rascal::scanner::Scanner;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() != 2 {
        let program_name = args.first().map(|s| s.as_str()).unwrap_or("rascal");
        eprintln!("Usage: {} <source.pas>", program_name);
        process::exit(EXIT_INVALID_ARGUMENTS);
    }

    let path = Path::new(&args[1]);
    let source = match SourceBuffer::open(path) {
        Ok(source) => source,
        Err(error) => {
            eprintln!("Error: cannot open '{}': {}", path.display(), error);
            process::exit(EXIT_SOURCE_OPEN_FAILED);
        }
    };

    eprintln!("Translating {}...", path.display());
    let parser = Parser::new(Scanner::new(source));
    let translation = match parser.parse_program() {
        Ok(translation) => translation,
        Err(abort) => {
            eprintln!("*** FATAL: {}", abort);
            process::exit(abort.exit_code());
        }
    };

    if translation.error_count > 0 {
        eprintln!(
            "Translation failed: {} syntax error(s).",
            translation.error_count
        );
        process::exit(EXIT_TOO_MANY_ERRORS);
    }
    eprintln!("Translation complete. Executing...");

    // Piped input becomes the interpreted program's read/readln stream.
    let mut input = String::new();
    if !std::io::stdin().is_terminal() {
        let _ = std::io::stdin().read_to_string(&mut input);
    }

    let mut executor = Executor::new(&translation, RuntimeConsole::new(&input));
    match executor.run() {
        Ok(()) => {
            print!("{}", executor.output());
            eprintln!("Executed {} statements.", executor.statement_count());
        }
        Err(error) => {
            print!("{}", executor.output());
            eprintln!(
                "*** RUNTIME ERROR after {} statements: {}",
                executor.statement_count(),
                error
            );
            process::exit(error.exit_code());
        }
    }
}
