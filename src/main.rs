use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Context as _};
use clap::Parser;
use inkwell::context::Context;

use emberc::codegen::CodeGen;
use emberc::diagnostics::{self, Diagnostic};
use emberc::lexer::token::{Token, TokenKind};
use emberc::lexer::Lexer;
use emberc::parser::ast::{Expr, ExprKind, Item, ItemKind, Module, Stmt};
use emberc::sema::SemanticAnalyzer;

#[derive(Parser, Debug)]
#[command(name = "emberc", version, about = "Compiler for the Ember language")]
struct Cli {
    /// Input source file
    input: PathBuf,

    /// Write output to <FILE>
    #[arg(short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// Emit textual LLVM IR instead of an object file
    #[arg(long = "emit-llvm")]
    emit_llvm: bool,

    /// Print the AST and exit
    #[arg(long = "emit-ast")]
    emit_ast: bool,

    /// Print the token stream and exit
    #[arg(long = "emit-tokens")]
    emit_tokens: bool,

    /// Announce each phase's completion
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    // Exit 1 on bad usage (clap's default of 2 is reserved here), 0 for
    // --help/--version.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { 1 } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    if let Err(err) = run(&cli) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let path = cli.input.display().to_string();
    let source = fs::read_to_string(&cli.input)
        .with_context(|| format!("could not open input file '{path}'"))?;

    if cli.verbose {
        println!("Compiling: {path}");
    }

    // Lexical analysis
    let mut lexer = Lexer::new(&source);
    let tokens = lexer.tokenize_all();
    if lexer.has_errors() {
        report(&path, lexer.diagnostics());
        process::exit(1);
    }

    if cli.emit_tokens {
        print_tokens(&tokens);
        return Ok(());
    }

    if cli.verbose {
        println!("Lexing completed: {} tokens", tokens.len());
    }

    // Parsing
    let mut parser = emberc::parser::Parser::new(tokens);
    let module = parser.parse_module();
    if parser.has_errors() {
        report(&path, parser.diagnostics());
        process::exit(1);
    }

    if cli.emit_ast {
        print_ast(&module);
        return Ok(());
    }

    if cli.verbose {
        println!("Parsing completed");
    }

    // Semantic analysis
    let mut analyzer = SemanticAnalyzer::new();
    if !analyzer.analyze(&module) {
        report(&path, analyzer.diagnostics());
        process::exit(1);
    }
    for warning in analyzer.warnings() {
        eprintln!("{}", diagnostics::render(&path, warning));
    }

    if cli.verbose {
        println!("Semantic analysis completed");
    }

    // Code generation
    let context = Context::create();
    let mut codegen = CodeGen::new(&context, &path);
    codegen
        .generate(&module)
        .map_err(|err| anyhow!("code generation failed: {err}"))?;

    if cli.verbose {
        println!("Code generation completed");
        print!("{}", codegen.print_ir());
    }

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output(&cli.input, cli.emit_llvm));

    let emitted = if cli.emit_llvm {
        codegen.emit_llvm_ir(&output)
    } else {
        codegen.emit_object_file(&output)
    };
    emitted.with_context(|| format!("failed to write output file '{}'", output.display()))?;

    if cli.verbose {
        println!("Output written to: {}", output.display());
    }

    Ok(())
}

/// Strip any final extension from the input path and append `.o` (or
/// `.ll` when emitting IR).
fn default_output(input: &PathBuf, emit_llvm: bool) -> PathBuf {
    input.with_extension(if emit_llvm { "ll" } else { "o" })
}

fn report(path: &str, diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        eprintln!("{}", diagnostics::render(path, diagnostic));
    }
}

fn print_tokens(tokens: &[Token]) {
    for token in tokens {
        if token.kind == TokenKind::Eof {
            continue;
        }
        println!(
            "{}:{} {:?} \"{}\"",
            token.location.line, token.location.column, token.kind, token.lexeme
        );
    }
}

fn print_ast(module: &Module) {
    println!("Module: {}", module.name);
    for item in &module.items {
        print_item(item, 1);
    }
}

fn indent(depth: usize) {
    print!("{}", "  ".repeat(depth));
}

fn print_item(item: &Item, depth: usize) {
    indent(depth);
    match &item.kind {
        ItemKind::Function(function) => {
            println!("Function: {}", item.name);
            if let Some(body) = &function.body {
                print_expr(body, depth + 1);
            }
        }
        ItemKind::Struct { fields } => {
            println!("Struct: {}", item.name);
            for field in fields {
                indent(depth + 1);
                println!("Field: {}", field.name);
            }
        }
        ItemKind::Enum { variants } => {
            println!("Enum: {}", item.name);
            for variant in variants {
                indent(depth + 1);
                println!("Variant: {}", variant.name);
            }
        }
        ItemKind::Trait { items } => {
            println!("Trait: {}", item.name);
            for inner in items {
                print_item(inner, depth + 1);
            }
        }
        ItemKind::Impl { items, .. } => {
            println!("Impl: {}", item.name);
            for inner in items {
                print_item(inner, depth + 1);
            }
        }
        ItemKind::TypeAlias { .. } => println!("TypeAlias: {}", item.name),
        ItemKind::Module { items, .. } => {
            println!("Module: {}", item.name);
            for inner in items {
                print_item(inner, depth + 1);
            }
        }
        ItemKind::Import { path, .. } => println!("Import: {}", path.join("::")),
        ItemKind::Extern { items } => {
            println!("Extern");
            for inner in items {
                print_item(inner, depth + 1);
            }
        }
    }
}

fn print_stmt(stmt: &Stmt, depth: usize) {
    indent(depth);
    match stmt {
        Stmt::Let {
            pattern,
            initializer,
            ..
        } => {
            match pattern.binding_name() {
                Some(name) => println!("Let: {name}"),
                None => println!("Let"),
            }
            if let Some(init) = initializer {
                print_expr(init, depth + 1);
            }
        }
        Stmt::Expr { expr, .. } => {
            println!("ExprStmt");
            print_expr(expr, depth + 1);
        }
        Stmt::Item(item) => {
            println!("ItemStmt");
            print_item(item, depth + 1);
        }
    }
}

fn print_expr(expr: &Expr, depth: usize) {
    indent(depth);
    match &expr.kind {
        ExprKind::Literal(_) => println!("Literal"),
        ExprKind::Identifier(name) => println!("Identifier: {name}"),
        ExprKind::Binary { op, left, right } => {
            println!("Binary: {op:?}");
            print_expr(left, depth + 1);
            print_expr(right, depth + 1);
        }
        ExprKind::Unary { op, operand } => {
            println!("Unary: {op:?}");
            print_expr(operand, depth + 1);
        }
        ExprKind::Call { callee, args } => {
            println!("Call");
            print_expr(callee, depth + 1);
            for arg in args {
                print_expr(arg, depth + 1);
            }
        }
        ExprKind::Index { object, index } => {
            println!("Index");
            print_expr(object, depth + 1);
            print_expr(index, depth + 1);
        }
        ExprKind::FieldAccess { object, field } => {
            println!("FieldAccess: {field}");
            print_expr(object, depth + 1);
        }
        ExprKind::Cast { value, .. } => {
            println!("Cast");
            print_expr(value, depth + 1);
        }
        ExprKind::StructLiteral { path, fields } => {
            println!("StructLiteral: {}", path.join("::"));
            for field in fields {
                print_expr(&field.value, depth + 1);
            }
        }
        ExprKind::ArrayLiteral(elements) => {
            println!("ArrayLiteral");
            for element in elements {
                print_expr(element, depth + 1);
            }
        }
        ExprKind::ArrayRepeat { value, count } => {
            println!("ArrayRepeat");
            print_expr(value, depth + 1);
            print_expr(count, depth + 1);
        }
        ExprKind::Tuple(elements) => {
            println!("Tuple");
            for element in elements {
                print_expr(element, depth + 1);
            }
        }
        ExprKind::Block { stmts, tail } => {
            println!("Block");
            for stmt in stmts {
                print_stmt(stmt, depth + 1);
            }
            if let Some(tail) = tail {
                print_expr(tail, depth + 1);
            }
        }
        ExprKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            println!("If");
            print_expr(condition, depth + 1);
            print_expr(then_branch, depth + 1);
            if let Some(else_branch) = else_branch {
                print_expr(else_branch, depth + 1);
            }
        }
        ExprKind::Match { scrutinee, arms } => {
            println!("Match");
            print_expr(scrutinee, depth + 1);
            for arm in arms {
                print_expr(&arm.body, depth + 1);
            }
        }
        ExprKind::Range { start, end, .. } => {
            println!("Range");
            if let Some(start) = start {
                print_expr(start, depth + 1);
            }
            if let Some(end) = end {
                print_expr(end, depth + 1);
            }
        }
        ExprKind::Return(value) => {
            println!("Return");
            if let Some(value) = value {
                print_expr(value, depth + 1);
            }
        }
        ExprKind::While { condition, body } => {
            println!("While");
            print_expr(condition, depth + 1);
            print_expr(body, depth + 1);
        }
        ExprKind::For {
            pattern,
            iterator,
            body,
        } => {
            match pattern.binding_name() {
                Some(name) => println!("For: {name}"),
                None => println!("For"),
            }
            print_expr(iterator, depth + 1);
            print_expr(body, depth + 1);
        }
        ExprKind::Break(_) => println!("Break"),
        ExprKind::Continue(_) => println!("Continue"),
    }
}
