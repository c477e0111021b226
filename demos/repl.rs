use plscript::Interpreter;
use plscript::ast::Value;
use plscript::builtinops::get_builtin_ops;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::fs;
use std::panic;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // `repl <file>` runs a script instead of starting the prompt
    if let Some(path) = std::env::args().nth(1) {
        process::exit(run_file(&path));
    }

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_file(path: &str) -> i32 {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Cannot read {path}: {err}");
            return 2;
        }
    };

    match plscript::run(&source) {
        Ok(_) => 0,
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

fn run_repl() {
    println!("plscript interactive interpreter");
    println!("Enter forms like: (var x 1) (print (+ x 1))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            process::exit(1);
        }
    };
    let mut interp = Interpreter::new();

    loop {
        match rl.readline("pl> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&interp);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                match interp.run(line) {
                    // Don't echo null results (e.g., from print or def)
                    Ok(Value::Null) => {}
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("plscript commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show variables and functions defined so far");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Forms:");
    println!("  Literals: 42, 2.5, \"text\", true, false, null");
    println!("  Blocks: (do e...), (then e...), (else e...)");
    println!("  Variables: (var name e), (set name e)");
    println!("  Conditionals: (if cond yes no), (? cond yes)");
    println!("  Loops: (loop cond body), (break), (continue)");
    println!("  Functions: (def name (params...) body), (call name args...), (return e)");
    // `-` is registered twice, unary and binary
    let mut operators: Vec<&str> = Vec::new();
    for op in get_builtin_ops() {
        if !operators.contains(&op.id) {
            operators.push(op.id);
        }
    }
    println!("  Operators: {}", operators.join(" "));
    println!("  Output: (print e...)");
    println!();
}

fn print_environment(interp: &Interpreter) {
    let env = interp.environment();
    let bindings = env.get_all_bindings();
    let functions = env.get_all_functions();

    if bindings.is_empty() && functions.is_empty() {
        println!("Environment is empty.");
        return;
    }

    if !bindings.is_empty() {
        println!("Variables ({}):", bindings.len());
        for (name, value) in bindings {
            println!("  {name} = {}", value.to_literal_text());
        }
    }

    if !functions.is_empty() {
        println!("Functions ({}):", functions.len());
        for signature in functions {
            println!("  {signature}");
        }
    }
}
