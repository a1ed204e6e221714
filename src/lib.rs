//! emberc — an ahead-of-time compiler for the Ember language.
//!
//! The pipeline is strictly one-way: source text → tokens → AST →
//! (checked AST, symbol tables) → LLVM module → object or textual-IR
//! file. The [`Compiler`] facade runs the front-end phases; code
//! generation is driven separately because the LLVM module borrows its
//! context.

pub mod codegen;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod sema;

use thiserror::Error;

use diagnostics::Diagnostic;
use parser::ast;

/// Compiler version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pipeline-level errors. The per-phase variants carry the collected
/// diagnostics for the driver to render.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("lexical analysis failed")]
    Lex(Vec<Diagnostic>),
    #[error("parsing failed")]
    Parse(Vec<Diagnostic>),
    #[error("semantic analysis failed")]
    Sema(Vec<Diagnostic>),
    #[error(transparent)]
    Codegen(#[from] codegen::CodegenError),
}

impl CompileError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Lex(diagnostics)
            | CompileError::Parse(diagnostics)
            | CompileError::Sema(diagnostics) => diagnostics,
            CompileError::Codegen(_) => &[],
        }
    }
}

/// Front-end facade: lex, parse, and analyze a single source buffer.
pub struct Compiler;

impl Compiler {
    pub fn new() -> Self {
        Self
    }

    /// Run the front end and hand back the checked module. Each phase must
    /// finish without errors before the next may start.
    pub fn compile_source(&self, source: &str) -> Result<ast::Module, CompileError> {
        let tokens = lexer::lex(source).map_err(CompileError::Lex)?;

        let mut parser = parser::Parser::new(tokens);
        let module = parser.parse_module();
        if parser.has_errors() {
            return Err(CompileError::Parse(parser.into_diagnostics()));
        }

        let mut analyzer = sema::SemanticAnalyzer::new();
        if !analyzer.analyze(&module) {
            return Err(CompileError::Sema(analyzer.into_diagnostics()));
        }

        Ok(module)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
