#![warn(clippy::all)]

mod ast;
mod code;
mod compiler;
mod diagnostic;
mod interpreter;
mod lexer;
mod object;
mod parser;
mod vm;

use std::io::{self, BufRead, Write};
use std::rc::Rc;

use compiler::symbol_table::SymbolTable;
use compiler::Compiler;
use diagnostic::{ansi::AnsiRenderer, json, registry, Diagnostic};
use object::builtins::BUILTINS;
use object::Object;
use vm::{Vm, GLOBALS_SIZE};

#[derive(Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Ansi,
    Text,
    Json,
}

/// Scan args for --json/-j, --text/-t, --ansi/-a and strip them out.
/// More than one format flag is an error.
fn detect_output_mode(args: Vec<String>) -> (OutputMode, Vec<String>) {
    let mut mode: Option<OutputMode> = None;
    let mut remaining = Vec::with_capacity(args.len());
    let mut conflict = false;

    for arg in args {
        let picked = match arg.as_str() {
            "--json" | "-j" => Some(OutputMode::Json),
            "--text" | "-t" => Some(OutputMode::Text),
            "--ansi" | "-a" => Some(OutputMode::Ansi),
            _ => {
                remaining.push(arg);
                None
            }
        };
        if picked.is_some() {
            if mode.is_some() {
                conflict = true;
            } else {
                mode = picked;
            }
        }
    }

    if conflict {
        eprintln!("error: --json, --text, and --ansi are mutually exclusive");
        std::process::exit(1);
    }

    let resolved = mode.unwrap_or_else(|| {
        // SAFETY: isatty(2) accepts any fd and returns 0 when the fd is
        // not a terminal; STDERR_FILENO is a well-known constant.
        let is_tty = unsafe { libc::isatty(libc::STDERR_FILENO) } != 0;
        let no_color = std::env::var("NO_COLOR").is_ok();
        match (is_tty, no_color) {
            (true, false) => OutputMode::Ansi,
            (true, true) => OutputMode::Text,
            (false, _) => OutputMode::Json,
        }
    });

    (resolved, remaining)
}

fn report_diagnostic(d: &Diagnostic, mode: OutputMode) {
    let s = match mode {
        OutputMode::Ansi => AnsiRenderer { use_color: true }.render(d),
        OutputMode::Text => AnsiRenderer { use_color: false }.render(d),
        // One JSON object per line so multiple errors stay parseable.
        OutputMode::Json => format!("{}\n", json::render(d)),
    };
    eprint!("{}", s);
}

fn print_usage() {
    println!("tarn, a small dynamic language\n");
    println!("Usage:");
    println!("  tarn                         Start the REPL");
    println!("  tarn <file.tarn> | <code>    Compile and run on the VM");
    println!("  tarn <src> --run-interp      Run on the tree-walking engine");
    println!("  tarn <src> --dump-ast        Print the AST as JSON");
    println!("  tarn <src> --dump-bytecode   Print a bytecode disassembly");
    println!("  tarn explain <code>          Explain an error code (e.g. TARN-C001)");
    println!("  tarn help | --help | -h      Show this help");
    println!("  tarn --version | -V          Show the version\n");
    println!("Diagnostics format (stderr):");
    println!("  --ansi / -a   Force ANSI colour (default when stderr is a TTY)");
    println!("  --text / -t   Force plain text");
    println!("  --json / -j   Force NDJSON (default when stderr is not a TTY)");
    println!("  NO_COLOR=1    Disable colour (same as --text)");
}

fn main() {
    let raw_args: Vec<String> = std::env::args().collect();
    let (mode, args) = detect_output_mode(raw_args);

    if args.len() < 2 {
        repl(mode);
        return;
    }

    match args[1].as_str() {
        "--version" | "-V" => {
            println!("tarn {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        "help" | "--help" | "-h" => {
            print_usage();
            return;
        }
        "explain" => {
            let Some(code) = args.get(2) else {
                eprintln!("usage: tarn explain <error-code>");
                std::process::exit(1);
            };
            match registry::lookup(code) {
                Some(entry) => {
                    println!("{}: {}\n", entry.code, entry.short);
                    print!("{}", entry.long);
                }
                None => {
                    eprintln!("error: unknown error code '{}'", code);
                    std::process::exit(1);
                }
            }
            return;
        }
        _ => {}
    }

    // A path that exists is a source file, anything else is inline code.
    let source = if std::path::Path::new(&args[1]).is_file() {
        match std::fs::read_to_string(&args[1]) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error reading {}: {}", args[1], e);
                std::process::exit(1);
            }
        }
    } else {
        if args[1].is_empty() {
            eprintln!("error: empty code string");
            std::process::exit(1);
        }
        args[1].clone()
    };

    let program = match parse_source(&source, mode) {
        Some(program) => program,
        None => std::process::exit(1),
    };

    match args.get(2).map(String::as_str) {
        Some("--dump-ast") => match serde_json::to_string_pretty(&program) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("error serializing AST: {}", e);
                std::process::exit(1);
            }
        },
        Some("--dump-bytecode") => dump_bytecode(&program, &source, mode),
        Some("--run-interp") => run_interp(&program, &source, mode),
        Some(other) => {
            eprintln!("error: unknown option '{}'", other);
            std::process::exit(1);
        }
        None => run_compiled(&program, &source, mode),
    }
}

fn parse_source(source: &str, mode: OutputMode) -> Option<ast::Program> {
    let tokens = match lexer::lex(source) {
        Ok(tokens) => tokens,
        Err(e) => {
            report_diagnostic(&Diagnostic::from(&e).with_source(source), mode);
            return None;
        }
    };

    let (program, errors) = parser::parse(tokens);
    if !errors.is_empty() {
        for e in &errors {
            report_diagnostic(&Diagnostic::from(e).with_source(source), mode);
        }
        return None;
    }
    Some(program)
}

fn compile_program(program: &ast::Program, source: &str, mode: OutputMode) -> compiler::Bytecode {
    let mut compiler = Compiler::new();
    if let Err(e) = compiler.compile(program) {
        report_diagnostic(&Diagnostic::from(&e).with_source(source), mode);
        std::process::exit(1);
    }
    compiler.bytecode()
}

fn run_compiled(program: &ast::Program, source: &str, mode: OutputMode) {
    let bytecode = compile_program(program, source, mode);
    let mut vm = Vm::new(bytecode);
    if let Err(e) = vm.run() {
        report_diagnostic(&Diagnostic::from(&e).with_source(source), mode);
        std::process::exit(1);
    }
    println!("{}", vm.last_popped());
}

fn run_interp(program: &ast::Program, source: &str, mode: OutputMode) {
    let env = interpreter::Environment::new();
    match interpreter::eval_program(program, &env) {
        Ok(result) => println!("{}", result),
        Err(e) => {
            report_diagnostic(&Diagnostic::from(&e).with_source(source), mode);
            std::process::exit(1);
        }
    }
}

fn dump_bytecode(program: &ast::Program, source: &str, mode: OutputMode) {
    let bytecode = compile_program(program, source, mode);
    print!("{}", code::disassemble(&bytecode.instructions));
    for (i, constant) in bytecode.constants.iter().enumerate() {
        if let Object::CompiledFunction(func) = constant {
            println!("-- fn at constant {} --", i);
            print!("{}", code::disassemble(&func.instructions));
        }
    }
}

/// Line-oriented REPL. The symbol table, constant pool, and globals all
/// persist, so a `let` on one line is visible on the next.
fn repl(mode: OutputMode) {
    println!("tarn {} (:bytecode toggles disassembly, :quit exits)", env!("CARGO_PKG_VERSION"));

    let symbol_table = SymbolTable::new();
    for (i, builtin) in BUILTINS.iter().enumerate() {
        symbol_table.borrow_mut().define_builtin(i, builtin.name);
    }
    let mut constants: Vec<Object> = Vec::new();
    let mut globals = vec![Object::Null; GLOBALS_SIZE];
    let mut show_bytecode = false;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!(">> ");
        let _ = io::stdout().flush();
        let line = match lines.next() {
            Some(Ok(line)) => line,
            _ => break,
        };
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" => break,
            ":bytecode" => {
                show_bytecode = !show_bytecode;
                println!("bytecode dump {}", if show_bytecode { "on" } else { "off" });
                continue;
            }
            _ => {}
        }

        let Some(program) = parse_source(line, mode) else {
            continue;
        };

        let mut compiler =
            Compiler::new_with_state(Rc::clone(&symbol_table), std::mem::take(&mut constants));
        let compiled = compiler.compile(&program);
        let bytecode = compiler.bytecode();
        constants = bytecode.constants.clone();
        if let Err(e) = compiled {
            report_diagnostic(&Diagnostic::from(&e).with_source(line), mode);
            continue;
        }

        if show_bytecode {
            print!("{}", code::disassemble(&bytecode.instructions));
        }

        let mut vm = Vm::new_with_globals(bytecode, std::mem::take(&mut globals));
        match vm.run() {
            Ok(()) => println!("{}", vm.last_popped()),
            Err(e) => report_diagnostic(&Diagnostic::from(&e).with_source(line), mode),
        }
        globals = vm.into_globals();
    }
}
