//! AST to LLVM IR lowering.
//!
//! Single-pass, left-to-right lowering of a checked module into an LLVM
//! module, followed by verification and object or textual-IR emission.
//! Mutable bindings live in stack slots; immutable bindings stay in SSA
//! form. Every alloca is placed in the function entry block through
//! [`CodeGen::entry_alloca`] so that slots whose lifetime spans a loop
//! iteration are allocated exactly once.

mod expr;

use std::collections::HashMap;
use std::path::Path;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::{Builder, BuilderError};
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, StructType};
use inkwell::values::{BasicValueEnum, FunctionValue, PointerValue};
use inkwell::{AddressSpace, OptimizationLevel};
use thiserror::Error;

use crate::parser::ast::{self, Item, ItemKind, TypeKind};

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("{0}")]
    Unsupported(String),
    #[error("function verification failed for '{0}'")]
    InvalidFunction(String),
    #[error("module verification failed: {0}")]
    InvalidModule(String),
    #[error("failed to write output: {0}")]
    Output(String),
    #[error("internal codegen error: {0}")]
    Internal(String),
    #[error("llvm builder error: {0}")]
    Builder(#[from] BuilderError),
}

/// A named aggregate plus its field order, for literal construction and
/// field access.
pub(crate) struct StructInfo<'ctx> {
    pub ty: StructType<'ctx>,
    pub field_names: Vec<String>,
}

/// A stack slot for a mutable binding; the element type is remembered for
/// loads through the opaque pointer.
#[derive(Clone, Copy)]
pub(crate) struct LocalSlot<'ctx> {
    pub ptr: PointerValue<'ctx>,
    pub ty: BasicTypeEnum<'ctx>,
}

/// Branch targets for the innermost loop.
#[derive(Clone, Copy)]
pub(crate) struct LoopBlocks<'ctx> {
    pub continue_block: BasicBlock<'ctx>,
    pub break_block: BasicBlock<'ctx>,
}

pub struct CodeGen<'ctx> {
    pub(crate) context: &'ctx Context,
    pub(crate) module: Module<'ctx>,
    pub(crate) builder: Builder<'ctx>,
    pub(crate) functions: HashMap<String, FunctionValue<'ctx>>,
    pub(crate) structs: HashMap<String, StructInfo<'ctx>>,
    // Immutable bindings and never-mutated parameters.
    pub(crate) ssa_values: HashMap<String, BasicValueEnum<'ctx>>,
    // Mutable bindings, loop counters, match result slots.
    pub(crate) allocas: HashMap<String, LocalSlot<'ctx>>,
    pub(crate) loops: Vec<LoopBlocks<'ctx>>,
}

impl<'ctx> CodeGen<'ctx> {
    pub fn new(context: &'ctx Context, module_name: &str) -> Self {
        let module = context.create_module(module_name);
        let builder = context.create_builder();
        Self {
            context,
            module,
            builder,
            functions: HashMap::new(),
            structs: HashMap::new(),
            ssa_values: HashMap::new(),
            allocas: HashMap::new(),
            loops: Vec::new(),
        }
    }

    pub fn module(&self) -> &Module<'ctx> {
        &self.module
    }

    /// Lower every item, then run the module-level verifier.
    pub fn generate(&mut self, module: &ast::Module) -> Result<(), CodegenError> {
        self.lower_items(&module.items)?;

        self.module
            .verify()
            .map_err(|message| CodegenError::InvalidModule(message.to_string()))
    }

    fn lower_items(&mut self, items: &[Item]) -> Result<(), CodegenError> {
        for item in items {
            match &item.kind {
                ItemKind::Function(function) => {
                    self.lower_function(&item.name, function)?;
                }
                ItemKind::Struct { fields } => self.lower_struct(&item.name, fields)?,
                ItemKind::Extern { items } | ItemKind::Module { items, .. } => {
                    self.lower_items(items)?;
                }
                // Traits, impls, type aliases, imports and enum payloads
                // have no lowering yet.
                _ => {}
            }
        }
        Ok(())
    }

    /// Translate each field type in declaration order and register a named
    /// aggregate keyed by the struct name.
    fn lower_struct(
        &mut self,
        name: &str,
        fields: &[ast::StructField],
    ) -> Result<(), CodegenError> {
        let mut field_types = Vec::with_capacity(fields.len());
        let mut field_names = Vec::with_capacity(fields.len());

        for field in fields {
            let ty = self.lower_type(&field.ty)?.ok_or_else(|| {
                CodegenError::Unsupported(format!(
                    "field '{}' of struct '{name}' has no runtime representation",
                    field.name
                ))
            })?;
            field_types.push(ty);
            field_names.push(field.name.clone());
        }

        let struct_type = self.context.opaque_struct_type(name);
        struct_type.set_body(&field_types, false);

        self.structs.insert(
            name.to_string(),
            StructInfo {
                ty: struct_type,
                field_names,
            },
        );
        Ok(())
    }

    fn lower_function(
        &mut self,
        name: &str,
        function: &ast::Function,
    ) -> Result<(), CodegenError> {
        let mut param_types = Vec::with_capacity(function.params.len());
        for param in &function.params {
            let ty = self.lower_type(&param.ty)?.ok_or_else(|| {
                CodegenError::Unsupported(format!(
                    "parameter in function '{name}' has no runtime representation"
                ))
            })?;
            param_types.push(BasicMetadataTypeEnum::from(ty));
        }

        let return_type = self.lower_type(&function.return_type)?;
        let fn_type = match return_type {
            Some(ty) => ty.fn_type(&param_types, false),
            None => self.context.void_type().fn_type(&param_types, false),
        };

        let fn_value = self
            .module
            .add_function(name, fn_type, Some(Linkage::External));
        self.functions.insert(name.to_string(), fn_value);

        for (param, value) in function.params.iter().zip(fn_value.get_param_iter()) {
            if let Some(param_name) = param.pattern.binding_name() {
                value.set_name(param_name);
            }
        }

        let Some(body) = &function.body else {
            // Declaration only (`extern` or a bodyless signature).
            return Ok(());
        };

        let entry = self.context.append_basic_block(fn_value, "entry");
        self.builder.position_at_end(entry);

        // Bindings never leak across functions.
        self.ssa_values.clear();
        self.allocas.clear();
        self.loops.clear();

        for (param, value) in function.params.iter().zip(fn_value.get_param_iter()) {
            let Some(param_name) = param.pattern.binding_name() else {
                continue;
            };
            if param.pattern.is_mutable() {
                let ty = value.get_type();
                let slot = self.entry_alloca(fn_value, ty, param_name)?;
                self.builder.build_store(slot, value)?;
                self.allocas
                    .insert(param_name.to_string(), LocalSlot { ptr: slot, ty });
            } else {
                self.ssa_values.insert(param_name.to_string(), value);
            }
        }

        let body_value = self.lower_expr(body)?;

        if self.current_block()?.get_terminator().is_none() {
            match (return_type, body_value) {
                (Some(_), Some(value)) => {
                    self.builder.build_return(Some(&value))?;
                }
                (Some(ty), None) => {
                    // No trailing value to return; fall back to zero.
                    let zero = ty.const_zero();
                    self.builder.build_return(Some(&zero))?;
                }
                (None, _) => {
                    self.builder.build_return(None)?;
                }
            }
        }

        self.terminate_dead_blocks(fn_value)?;

        if !fn_value.verify(true) {
            unsafe { fn_value.delete() };
            return Err(CodegenError::InvalidFunction(name.to_string()));
        }

        Ok(())
    }

    /// Blocks left behind by `return`/`break`/`continue` lowering have no
    /// predecessors; cap each with `unreachable` so that every block ends
    /// in exactly one terminator.
    fn terminate_dead_blocks(&self, function: FunctionValue<'ctx>) -> Result<(), CodegenError> {
        for block in function.get_basic_blocks() {
            if block.get_terminator().is_none() {
                self.builder.position_at_end(block);
                self.builder.build_unreachable()?;
            }
        }
        Ok(())
    }

    // ── Type translation ────────────────────────────────────────────────

    /// Map an AST type onto an LLVM type; `None` is `void`.
    pub(crate) fn lower_type(
        &self,
        ty: &ast::Type,
    ) -> Result<Option<BasicTypeEnum<'ctx>>, CodegenError> {
        let lowered = match &ty.kind {
            TypeKind::Primitive(name) => return Ok(self.primitive_type(name)),
            TypeKind::Pointer { .. }
            | TypeKind::Reference { .. }
            | TypeKind::Slice { .. }
            | TypeKind::Function { .. } => self
                .context
                .i8_type()
                .ptr_type(AddressSpace::default())
                .as_basic_type_enum(),
            TypeKind::Array { element, size } => {
                let element = self.lower_type(element)?.ok_or_else(|| {
                    CodegenError::Unsupported("array of void is not representable".to_string())
                })?;
                element.array_type(*size as u32).as_basic_type_enum()
            }
            TypeKind::Tuple(types) => {
                let mut fields = Vec::with_capacity(types.len());
                for inner in types {
                    let field = self.lower_type(inner)?.ok_or_else(|| {
                        CodegenError::Unsupported(
                            "tuple of void is not representable".to_string(),
                        )
                    })?;
                    fields.push(field);
                }
                self.context.struct_type(&fields, false).as_basic_type_enum()
            }
            TypeKind::Named { path, .. } => {
                let name = path.first().map(String::as_str).unwrap_or_default();
                if let Some(primitive) = self.primitive_type(name) {
                    primitive
                } else if let Some(info) = self.structs.get(name) {
                    info.ty.as_basic_type_enum()
                } else {
                    return Err(CodegenError::Unsupported(format!("unknown type '{name}'")));
                }
            }
        };
        Ok(Some(lowered))
    }

    fn primitive_type(&self, name: &str) -> Option<BasicTypeEnum<'ctx>> {
        let ty = match name {
            "void" => return None,
            "bool" => self.context.bool_type().as_basic_type_enum(),
            "i8" | "u8" | "byte" => self.context.i8_type().as_basic_type_enum(),
            "i16" | "u16" => self.context.i16_type().as_basic_type_enum(),
            "i32" | "u32" => self.context.i32_type().as_basic_type_enum(),
            // isize/usize assume a 64-bit target.
            "i64" | "u64" | "isize" | "usize" => self.context.i64_type().as_basic_type_enum(),
            "i128" | "u128" => self.context.i128_type().as_basic_type_enum(),
            "f32" => self.context.f32_type().as_basic_type_enum(),
            "f64" => self.context.f64_type().as_basic_type_enum(),
            "char" => self.context.i32_type().as_basic_type_enum(),
            _ => return None,
        };
        Some(ty)
    }

    // ── Shared lowering helpers ─────────────────────────────────────────

    pub(crate) fn current_block(&self) -> Result<BasicBlock<'ctx>, CodegenError> {
        self.builder
            .get_insert_block()
            .ok_or_else(|| CodegenError::Internal("builder has no insertion block".to_string()))
    }

    pub(crate) fn current_function(&self) -> Result<FunctionValue<'ctx>, CodegenError> {
        self.current_block()?
            .get_parent()
            .ok_or_else(|| CodegenError::Internal("block has no parent function".to_string()))
    }

    /// Build an alloca in the function entry block via a temporary builder
    /// positioned there. Stack slots whose lifetime spans a loop iteration
    /// must never be allocated in the current (possibly loop-nested) block.
    pub(crate) fn entry_alloca(
        &self,
        function: FunctionValue<'ctx>,
        ty: BasicTypeEnum<'ctx>,
        name: &str,
    ) -> Result<PointerValue<'ctx>, CodegenError> {
        let entry = function.get_first_basic_block().ok_or_else(|| {
            CodegenError::Internal("function has no entry block".to_string())
        })?;

        let builder = self.context.create_builder();
        match entry.get_first_instruction() {
            Some(first) => builder.position_before(&first),
            None => builder.position_at_end(entry),
        }

        Ok(builder.build_alloca(ty, name)?)
    }

    // ── Emission ────────────────────────────────────────────────────────

    /// Textual IR of the lowered module.
    pub fn print_ir(&self) -> String {
        self.module.print_to_string().to_string()
    }

    /// Write the module's textual IR; bypasses the pass manager.
    pub fn emit_llvm_ir(&self, path: &Path) -> Result<(), CodegenError> {
        self.module
            .print_to_file(path)
            .map_err(|message| CodegenError::Output(message.to_string()))
    }

    /// Emit a native object file through a target machine for the host
    /// triple with a generic CPU and the default relocation model.
    pub fn emit_object_file(&self, path: &Path) -> Result<(), CodegenError> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(CodegenError::Output)?;

        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple)
            .map_err(|message| CodegenError::Output(message.to_string()))?;
        let machine = target
            .create_target_machine(
                &triple,
                "generic",
                "",
                OptimizationLevel::None,
                RelocMode::Default,
                CodeModel::Default,
            )
            .ok_or_else(|| {
                CodegenError::Output("failed to create target machine".to_string())
            })?;

        self.module.set_triple(&triple);
        self.module
            .set_data_layout(&machine.get_target_data().get_data_layout());

        machine
            .write_to_file(&self.module, FileType::Object, path)
            .map_err(|message| CodegenError::Output(message.to_string()))
    }
}
