//! Expression and statement lowering.

use inkwell::basic_block::BasicBlock;
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, IntValue};
use inkwell::types::BasicType;
use inkwell::{FloatPredicate, IntPredicate};

use crate::parser::ast::{
    BinaryOp, Expr, ExprKind, FieldInit, Literal, MatchArm, Pattern, PatternKind, Stmt, Type,
    UnaryOp,
};

use super::{CodeGen, CodegenError, LocalSlot, LoopBlocks};

/// The previous occupants of both binding maps for one name, captured
/// before a loop counter or match-arm binding shadows them.
pub(crate) struct SavedBinding<'ctx> {
    name: String,
    ssa: Option<BasicValueEnum<'ctx>>,
    slot: Option<LocalSlot<'ctx>>,
}

impl<'ctx> CodeGen<'ctx> {
    pub(crate) fn lower_expr(
        &mut self,
        expr: &Expr,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(Some(self.lower_literal(literal)?)),
            ExprKind::Identifier(name) => self.lower_identifier(name),
            ExprKind::Binary { op, left, right } => {
                if op.is_assignment() {
                    self.lower_assignment(*op, left, right)
                } else {
                    let lhs = expect_value(self.lower_expr(left)?, "left operand")?;
                    let rhs = expect_value(self.lower_expr(right)?, "right operand")?;
                    Ok(Some(self.lower_binary_value(*op, lhs, rhs)?))
                }
            }
            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand),
            ExprKind::Call { callee, args } => self.lower_call(callee, args),
            ExprKind::Index { object, index } => self.lower_index(object, index),
            ExprKind::FieldAccess { object, field } => self.lower_field_access(object, field),
            ExprKind::Cast { value, target } => self.lower_cast(value, target),
            ExprKind::StructLiteral { path, fields } => self.lower_struct_literal(path, fields),
            ExprKind::ArrayLiteral(elements) => self.lower_array_literal(elements),
            ExprKind::ArrayRepeat { value, count } => self.lower_array_repeat(value, count),
            ExprKind::Tuple(elements) => self.lower_tuple(elements),
            ExprKind::Block { stmts, tail } => {
                for stmt in stmts {
                    self.lower_stmt(stmt)?;
                }
                match tail {
                    Some(tail) => self.lower_expr(tail),
                    None => Ok(None),
                }
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.lower_if(condition, then_branch, else_branch.as_deref()),
            ExprKind::Match { scrutinee, arms } => self.lower_match(scrutinee, arms),
            ExprKind::Range { .. } => Err(CodegenError::Unsupported(
                "range expressions are only supported as for-loop iterators".to_string(),
            )),
            ExprKind::Return(value) => self.lower_return(value.as_deref()),
            ExprKind::While { condition, body } => self.lower_while(condition, body),
            ExprKind::For {
                pattern,
                iterator,
                body,
            } => self.lower_for(pattern, iterator, body),
            ExprKind::Break(_) => self.lower_break(),
            ExprKind::Continue(_) => self.lower_continue(),
        }
    }

    pub(crate) fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match stmt {
            Stmt::Expr { expr, .. } => {
                self.lower_expr(expr)?;
                Ok(())
            }
            Stmt::Let {
                pattern,
                ty,
                initializer,
                ..
            } => self.lower_let(pattern, ty.as_ref(), initializer.as_ref()),
            // Nested items are accepted by the parser but not lowered.
            Stmt::Item(_) => Ok(()),
        }
    }

    /// Immutable `let` records the initializer's SSA value; mutable `let`
    /// stores it through an entry-block stack slot.
    fn lower_let(
        &mut self,
        pattern: &Pattern,
        ty: Option<&Type>,
        initializer: Option<&Expr>,
    ) -> Result<(), CodegenError> {
        let Some(name) = pattern.binding_name() else {
            // `let _ = e;` still evaluates e.
            if let Some(init) = initializer {
                self.lower_expr(init)?;
            }
            return Ok(());
        };
        let name = name.to_string();

        let init_value = match initializer {
            Some(init) => self.lower_expr(init)?,
            None => None,
        };

        if pattern.is_mutable() {
            let slot_ty = match ty {
                Some(ty) => self.lower_type(ty)?.ok_or_else(|| {
                    CodegenError::Unsupported(format!("binding '{name}' cannot have type void"))
                })?,
                // Without type inference the slot takes the initializer's
                // type, or the 32-bit integer default.
                None => match init_value {
                    Some(value) => value.get_type(),
                    None => self.context.i32_type().as_basic_type_enum(),
                },
            };

            let function = self.current_function()?;
            let slot = self.entry_alloca(function, slot_ty, &name)?;
            if let Some(value) = init_value {
                self.builder.build_store(slot, value)?;
            }

            self.ssa_values.remove(&name);
            self.allocas.insert(
                name,
                LocalSlot {
                    ptr: slot,
                    ty: slot_ty,
                },
            );
        } else if let Some(value) = init_value {
            self.allocas.remove(&name);
            self.ssa_values.insert(name, value);
        }

        Ok(())
    }

    /// Probe the alloca map first, then the SSA map, then the function
    /// table.
    fn lower_identifier(
        &mut self,
        name: &str,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        if let Some(slot) = self.allocas.get(name) {
            let value = self.builder.build_load(slot.ptr, name)?;
            return Ok(Some(value));
        }
        if let Some(value) = self.ssa_values.get(name) {
            return Ok(Some(*value));
        }
        if let Some(function) = self.functions.get(name) {
            return Ok(Some(
                function.as_global_value().as_pointer_value().into(),
            ));
        }
        Err(CodegenError::Unsupported(format!(
            "undefined identifier '{name}'"
        )))
    }

    /// Assignments store through the target's alloca; a missing alloca
    /// means the binding is immutable (or undefined) and this is where
    /// that becomes a hard error.
    fn lower_assignment(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let ExprKind::Identifier(name) = &left.kind else {
            return Err(CodegenError::Unsupported(
                "assignment target must be an identifier".to_string(),
            ));
        };

        let Some(slot) = self.allocas.get(name).copied() else {
            return Err(CodegenError::Unsupported(format!(
                "cannot assign to immutable binding '{name}'"
            )));
        };

        let rhs = expect_value(self.lower_expr(right)?, "assignment value")?;

        let value = match op.compound_base() {
            Some(base) => {
                let current = self.builder.build_load(slot.ptr, name)?;
                self.lower_binary_value(base, current, rhs)?
            }
            None => rhs,
        };

        self.builder.build_store(slot.ptr, value)?;
        Ok(None)
    }

    fn lower_binary_value(
        &mut self,
        op: BinaryOp,
        lhs: BasicValueEnum<'ctx>,
        rhs: BasicValueEnum<'ctx>,
    ) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        if let (BasicValueEnum::IntValue(l), BasicValueEnum::IntValue(r)) = (lhs, rhs) {
            let value: BasicValueEnum = match op {
                BinaryOp::Add => self.builder.build_int_add(l, r, "addtmp")?.into(),
                BinaryOp::Sub => self.builder.build_int_sub(l, r, "subtmp")?.into(),
                BinaryOp::Mul => self.builder.build_int_mul(l, r, "multmp")?.into(),
                BinaryOp::Div => self.builder.build_int_signed_div(l, r, "divtmp")?.into(),
                BinaryOp::Mod => self.builder.build_int_signed_rem(l, r, "modtmp")?.into(),
                BinaryOp::Eq => self
                    .builder
                    .build_int_compare(IntPredicate::EQ, l, r, "eqtmp")?
                    .into(),
                BinaryOp::Ne => self
                    .builder
                    .build_int_compare(IntPredicate::NE, l, r, "netmp")?
                    .into(),
                BinaryOp::Lt => self
                    .builder
                    .build_int_compare(IntPredicate::SLT, l, r, "lttmp")?
                    .into(),
                BinaryOp::Le => self
                    .builder
                    .build_int_compare(IntPredicate::SLE, l, r, "letmp")?
                    .into(),
                BinaryOp::Gt => self
                    .builder
                    .build_int_compare(IntPredicate::SGT, l, r, "gttmp")?
                    .into(),
                BinaryOp::Ge => self
                    .builder
                    .build_int_compare(IntPredicate::SGE, l, r, "getmp")?
                    .into(),
                // Logical and/or lower the same as bitwise on i1;
                // short-circuiting is a future refinement.
                BinaryOp::And | BinaryOp::BitAnd => {
                    self.builder.build_and(l, r, "andtmp")?.into()
                }
                BinaryOp::Or | BinaryOp::BitOr => self.builder.build_or(l, r, "ortmp")?.into(),
                BinaryOp::BitXor => self.builder.build_xor(l, r, "xortmp")?.into(),
                BinaryOp::Shl => self.builder.build_left_shift(l, r, "shltmp")?.into(),
                BinaryOp::Shr => self
                    .builder
                    .build_right_shift(l, r, true, "shrtmp")?
                    .into(),
                _ => {
                    return Err(CodegenError::Unsupported(format!(
                        "operator {op:?} is not a value operator"
                    )))
                }
            };
            return Ok(value);
        }

        if let (BasicValueEnum::FloatValue(l), BasicValueEnum::FloatValue(r)) = (lhs, rhs) {
            let value: BasicValueEnum = match op {
                BinaryOp::Add => self.builder.build_float_add(l, r, "addtmp")?.into(),
                BinaryOp::Sub => self.builder.build_float_sub(l, r, "subtmp")?.into(),
                BinaryOp::Mul => self.builder.build_float_mul(l, r, "multmp")?.into(),
                BinaryOp::Div => self.builder.build_float_div(l, r, "divtmp")?.into(),
                BinaryOp::Mod => self.builder.build_float_rem(l, r, "modtmp")?.into(),
                BinaryOp::Eq => self
                    .builder
                    .build_float_compare(FloatPredicate::OEQ, l, r, "eqtmp")?
                    .into(),
                BinaryOp::Ne => self
                    .builder
                    .build_float_compare(FloatPredicate::ONE, l, r, "netmp")?
                    .into(),
                BinaryOp::Lt => self
                    .builder
                    .build_float_compare(FloatPredicate::OLT, l, r, "lttmp")?
                    .into(),
                BinaryOp::Le => self
                    .builder
                    .build_float_compare(FloatPredicate::OLE, l, r, "letmp")?
                    .into(),
                BinaryOp::Gt => self
                    .builder
                    .build_float_compare(FloatPredicate::OGT, l, r, "gttmp")?
                    .into(),
                BinaryOp::Ge => self
                    .builder
                    .build_float_compare(FloatPredicate::OGE, l, r, "getmp")?
                    .into(),
                _ => {
                    return Err(CodegenError::Unsupported(format!(
                        "operator {op:?} is not supported on floating-point values"
                    )))
                }
            };
            return Ok(value);
        }

        Err(CodegenError::Unsupported(
            "binary operands must both be integers or both be floats".to_string(),
        ))
    }

    fn lower_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        if matches!(op, UnaryOp::AddrOf | UnaryOp::AddrOfMut) {
            let ExprKind::Identifier(name) = &operand.kind else {
                return Err(CodegenError::Unsupported(
                    "can only take the address of a named binding".to_string(),
                ));
            };
            let Some(slot) = self.allocas.get(name) else {
                return Err(CodegenError::Unsupported(format!(
                    "cannot take the address of immutable binding '{name}'"
                )));
            };
            return Ok(Some(slot.ptr.into()));
        }

        let value = expect_value(self.lower_expr(operand)?, "unary operand")?;

        let result: BasicValueEnum = match (op, value) {
            (UnaryOp::Neg, BasicValueEnum::IntValue(v)) => {
                self.builder.build_int_neg(v, "negtmp")?.into()
            }
            (UnaryOp::Neg, BasicValueEnum::FloatValue(v)) => {
                self.builder.build_float_neg(v, "negtmp")?.into()
            }
            (UnaryOp::Not, BasicValueEnum::IntValue(v))
            | (UnaryOp::BitNot, BasicValueEnum::IntValue(v)) => {
                self.builder.build_not(v, "nottmp")?.into()
            }
            (UnaryOp::Deref, BasicValueEnum::PointerValue(ptr)) => {
                // Without inference the pointee defaults to 32-bit.
                self.builder
                    .build_load(ptr, "dereftmp")?
            }
            _ => {
                return Err(CodegenError::Unsupported(format!(
                    "unary operator {op:?} is not supported on this operand"
                )))
            }
        };
        Ok(Some(result))
    }

    fn lower_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let ExprKind::Identifier(name) = &callee.kind else {
            return Err(CodegenError::Unsupported(
                "calls must target a named function".to_string(),
            ));
        };
        let Some(function) = self.functions.get(name).copied() else {
            return Err(CodegenError::Unsupported(format!(
                "call to undefined function '{name}'"
            )));
        };

        let mut lowered = Vec::with_capacity(args.len());
        for arg in args {
            let value = expect_value(self.lower_expr(arg)?, "call argument")?;
            lowered.push(BasicMetadataValueEnum::from(value));
        }

        // Void call results cannot carry a name.
        let name = if function.get_type().get_return_type().is_some() {
            "calltmp"
        } else {
            ""
        };
        let call = self.builder.build_call(function, &lowered, name)?;
        Ok(call.try_as_basic_value().left())
    }

    fn lower_index(
        &mut self,
        object: &Expr,
        index: &Expr,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let object = expect_value(self.lower_expr(object)?, "indexed value")?;
        let BasicValueEnum::ArrayValue(array) = object else {
            return Err(CodegenError::Unsupported(
                "only arrays can be indexed".to_string(),
            ));
        };
        let index = expect_int(self.lower_expr(index)?, "index")?;

        // Spill the aggregate to an entry-block slot so the element can be
        // addressed dynamically.
        let array_ty = array.get_type();
        let function = self.current_function()?;
        let slot = self.entry_alloca(function, array_ty.into(), "idxtmp")?;
        self.builder.build_store(slot, array)?;

        let zero = self.context.i32_type().const_zero();
        let element_ptr = unsafe {
            self.builder
                .build_in_bounds_gep(slot, &[zero, index], "idxptr")?
        };
        let element = self
            .builder
            .build_load(element_ptr, "idxval")?;
        Ok(Some(element))
    }

    fn lower_field_access(
        &mut self,
        object: &Expr,
        field: &str,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let value = expect_value(self.lower_expr(object)?, "field object")?;
        let BasicValueEnum::StructValue(struct_value) = value else {
            return Err(CodegenError::Unsupported(format!(
                "field '{field}' accessed on a non-struct value"
            )));
        };

        let struct_name = struct_value
            .get_type()
            .get_name()
            .and_then(|name| name.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let info = self.structs.get(&struct_name).ok_or_else(|| {
            CodegenError::Unsupported(format!("unknown struct type '{struct_name}'"))
        })?;

        let index = info
            .field_names
            .iter()
            .position(|name| name == field)
            .ok_or_else(|| {
                CodegenError::Unsupported(format!(
                    "struct '{struct_name}' has no field '{field}'"
                ))
            })?;

        let value = self
            .builder
            .build_extract_value(struct_value, index as u32, field)?;
        Ok(Some(value))
    }

    fn lower_cast(
        &mut self,
        value: &Expr,
        target: &Type,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let value = expect_value(self.lower_expr(value)?, "cast operand")?;
        let target = self.lower_type(target)?.ok_or_else(|| {
            CodegenError::Unsupported("cannot cast to void".to_string())
        })?;

        let result: BasicValueEnum = match (value, target) {
            (BasicValueEnum::IntValue(v), inkwell::types::BasicTypeEnum::IntType(t)) => self
                .builder
                .build_int_cast_sign_flag(v, t, true, "casttmp")?
                .into(),
            (BasicValueEnum::IntValue(v), inkwell::types::BasicTypeEnum::FloatType(t)) => self
                .builder
                .build_signed_int_to_float(v, t, "casttmp")?
                .into(),
            (BasicValueEnum::FloatValue(v), inkwell::types::BasicTypeEnum::IntType(t)) => self
                .builder
                .build_float_to_signed_int(v, t, "casttmp")?
                .into(),
            (BasicValueEnum::FloatValue(v), inkwell::types::BasicTypeEnum::FloatType(t)) => {
                self.builder.build_float_cast(v, t, "casttmp")?.into()
            }
            (BasicValueEnum::PointerValue(v), inkwell::types::BasicTypeEnum::PointerType(_)) => {
                v.into()
            }
            _ => {
                return Err(CodegenError::Unsupported(
                    "unsupported cast".to_string(),
                ))
            }
        };
        Ok(Some(result))
    }

    fn lower_struct_literal(
        &mut self,
        path: &[String],
        fields: &[FieldInit],
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let name = path.first().map(String::as_str).unwrap_or_default();
        let (struct_type, field_names) = {
            let info = self.structs.get(name).ok_or_else(|| {
                CodegenError::Unsupported(format!("unknown struct '{name}'"))
            })?;
            (info.ty, info.field_names.clone())
        };

        let mut aggregate = struct_type.get_undef();
        for field in fields {
            let index = field_names
                .iter()
                .position(|candidate| candidate == &field.name)
                .ok_or_else(|| {
                    CodegenError::Unsupported(format!(
                        "struct '{name}' has no field '{}'",
                        field.name
                    ))
                })?;
            let value = expect_value(self.lower_expr(&field.value)?, "field value")?;
            aggregate = self
                .builder
                .build_insert_value(aggregate, value, index as u32, &field.name)?
                .into_struct_value();
        }

        Ok(Some(aggregate.into()))
    }

    fn lower_array_literal(
        &mut self,
        elements: &[Expr],
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        if elements.is_empty() {
            let ty = self.context.i32_type().array_type(0);
            return Ok(Some(ty.get_undef().into()));
        }

        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            values.push(expect_value(self.lower_expr(element)?, "array element")?);
        }

        let element_ty = values[0].get_type();
        let array_ty = element_ty.array_type(values.len() as u32);
        let mut aggregate = array_ty.get_undef();
        for (i, value) in values.into_iter().enumerate() {
            aggregate = self
                .builder
                .build_insert_value(aggregate, value, i as u32, "arrtmp")?
                .into_array_value();
        }
        Ok(Some(aggregate.into()))
    }

    fn lower_array_repeat(
        &mut self,
        value: &Expr,
        count: &Expr,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let count = match &count.kind {
            ExprKind::Literal(Literal::Int(v)) if *v >= 0 => *v as u64,
            ExprKind::Literal(Literal::UInt(v)) => *v,
            _ => {
                return Err(CodegenError::Unsupported(
                    "array repeat count must be an integer literal".to_string(),
                ))
            }
        };

        let value = expect_value(self.lower_expr(value)?, "array repeat value")?;
        let array_ty = value.get_type().array_type(count as u32);
        let mut aggregate = array_ty.get_undef();
        for i in 0..count {
            aggregate = self
                .builder
                .build_insert_value(aggregate, value, i as u32, "arrtmp")?
                .into_array_value();
        }
        Ok(Some(aggregate.into()))
    }

    fn lower_tuple(
        &mut self,
        elements: &[Expr],
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        // `()` is the unit value.
        if elements.is_empty() {
            return Ok(None);
        }

        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            values.push(expect_value(self.lower_expr(element)?, "tuple element")?);
        }

        let field_types: Vec<_> = values.iter().map(|value| value.get_type()).collect();
        let tuple_ty = self.context.struct_type(&field_types, false);
        let mut aggregate = tuple_ty.get_undef();
        for (i, value) in values.into_iter().enumerate() {
            aggregate = self
                .builder
                .build_insert_value(aggregate, value, i as u32, "tupletmp")?
                .into_struct_value();
        }
        Ok(Some(aggregate.into()))
    }

    /// `if` lowers to then/else blocks plus a merge block that is only
    /// appended when at least one branch falls through; a PHI merges the
    /// branch values only when both fall through with values of one type.
    fn lower_if(
        &mut self,
        condition: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let cond = expect_int(self.lower_expr(condition)?, "if condition")?;
        let function = self.current_function()?;

        let then_bb = self.context.append_basic_block(function, "then");
        let else_bb = self.context.append_basic_block(function, "else");
        self.builder.build_conditional_branch(cond, then_bb, else_bb)?;

        let mut merge_bb: Option<BasicBlock<'ctx>> = None;

        self.builder.position_at_end(then_bb);
        let then_value = self.lower_expr(then_branch)?;
        let then_end = self.current_block()?;
        let then_terminated = then_end.get_terminator().is_some();
        if !then_terminated {
            let merge = *merge_bb
                .get_or_insert_with(|| self.context.append_basic_block(function, "ifcont"));
            self.builder.build_unconditional_branch(merge)?;
        }

        self.builder.position_at_end(else_bb);
        let else_value = match else_branch {
            Some(else_branch) => self.lower_expr(else_branch)?,
            None => None,
        };
        let else_end = self.current_block()?;
        let else_terminated = else_end.get_terminator().is_some();
        if !else_terminated {
            let merge = *merge_bb
                .get_or_insert_with(|| self.context.append_basic_block(function, "ifcont"));
            self.builder.build_unconditional_branch(merge)?;
        }

        match merge_bb {
            Some(merge) => {
                self.builder.position_at_end(merge);
                if !then_terminated && !else_terminated {
                    if let (Some(then_value), Some(else_value)) = (then_value, else_value) {
                        if then_value.get_type() == else_value.get_type() {
                            let phi = self.builder.build_phi(then_value.get_type(), "iftmp")?;
                            phi.add_incoming(&[
                                (&then_value, then_end),
                                (&else_value, else_end),
                            ]);
                            return Ok(Some(phi.as_basic_value()));
                        }
                    }
                }
                Ok(None)
            }
            None => {
                // Both branches terminated; the merge block is discarded
                // and anything that follows is unreachable.
                let dead = self.context.append_basic_block(function, "afterif");
                self.builder.position_at_end(dead);
                Ok(None)
            }
        }
    }

    fn lower_while(
        &mut self,
        condition: &Expr,
        body: &Expr,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let function = self.current_function()?;
        let cond_bb = self.context.append_basic_block(function, "whilecond");
        let body_bb = self.context.append_basic_block(function, "whilebody");
        let end_bb = self.context.append_basic_block(function, "whileend");

        self.builder.build_unconditional_branch(cond_bb)?;

        self.builder.position_at_end(cond_bb);
        let cond = expect_int(self.lower_expr(condition)?, "while condition")?;
        self.builder.build_conditional_branch(cond, body_bb, end_bb)?;

        self.builder.position_at_end(body_bb);
        self.loops.push(LoopBlocks {
            continue_block: cond_bb,
            break_block: end_bb,
        });
        self.lower_expr(body)?;
        self.loops.pop();

        if self.current_block()?.get_terminator().is_none() {
            self.builder.build_unconditional_branch(cond_bb)?;
        }

        self.builder.position_at_end(end_bb);
        Ok(None)
    }

    /// `for` over a range lowers to cond/body/inc/end with the loop
    /// counter in an entry-block alloca; the counter temporarily shadows
    /// any prior binding of the loop variable's name.
    fn lower_for(
        &mut self,
        pattern: &Pattern,
        iterator: &Expr,
        body: &Expr,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let ExprKind::Range {
            start: Some(start),
            end: Some(end),
            inclusive,
        } = &iterator.kind
        else {
            return Err(CodegenError::Unsupported(
                "only bounded ranges can be iterated".to_string(),
            ));
        };

        let start = expect_int(self.lower_expr(start)?, "range start")?;
        let end = expect_int(self.lower_expr(end)?, "range end")?;

        let function = self.current_function()?;
        let counter_name = pattern.binding_name().unwrap_or("counter");
        let counter_ty = start.get_type();
        let counter = self.entry_alloca(function, counter_ty.into(), counter_name)?;
        self.builder.build_store(counter, start)?;

        let cond_bb = self.context.append_basic_block(function, "forcond");
        let body_bb = self.context.append_basic_block(function, "forbody");
        let inc_bb = self.context.append_basic_block(function, "forinc");
        let end_bb = self.context.append_basic_block(function, "forend");

        self.builder.build_unconditional_branch(cond_bb)?;

        self.builder.position_at_end(cond_bb);
        let current = self
            .builder
            .build_load(counter, counter_name)?
            .into_int_value();
        let predicate = if *inclusive {
            IntPredicate::SLE
        } else {
            IntPredicate::SLT
        };
        let keep_going = self
            .builder
            .build_int_compare(predicate, current, end, "forcmp")?;
        self.builder
            .build_conditional_branch(keep_going, body_bb, end_bb)?;

        self.builder.position_at_end(body_bb);
        let saved = pattern.binding_name().map(|name| {
            self.bind_slot(
                name,
                LocalSlot {
                    ptr: counter,
                    ty: counter_ty.into(),
                },
            )
        });
        self.loops.push(LoopBlocks {
            continue_block: inc_bb,
            break_block: end_bb,
        });
        let body_result = self.lower_expr(body);
        self.loops.pop();
        if let Some(saved) = saved {
            self.restore_binding(saved);
        }
        body_result?;

        if self.current_block()?.get_terminator().is_none() {
            self.builder.build_unconditional_branch(inc_bb)?;
        }

        self.builder.position_at_end(inc_bb);
        let current = self
            .builder
            .build_load(counter, counter_name)?
            .into_int_value();
        let one = counter_ty.const_int(1, false);
        let next = self.builder.build_int_add(current, one, "fornext")?;
        self.builder.build_store(counter, next)?;
        self.builder.build_unconditional_branch(cond_bb)?;

        self.builder.position_at_end(end_bb);
        Ok(None)
    }

    /// Arms chain through test blocks; each matching body stores its value
    /// to a result slot in the entry block and branches to a shared merge
    /// block, which loads the slot as the match value.
    fn lower_match(
        &mut self,
        scrutinee: &Expr,
        arms: &[MatchArm],
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let function = self.current_function()?;

        // The result slot must live in the entry block: inside a loop body
        // a local alloca would be re-allocated every iteration.
        let result_ty = self.context.i32_type();
        let result = self.entry_alloca(function, result_ty.into(), "matchtmp")?;

        let scrutinee = expect_value(self.lower_expr(scrutinee)?, "match scrutinee")?;
        let merge_bb = self.context.append_basic_block(function, "matchend");

        for (i, arm) in arms.iter().enumerate() {
            let is_last = i + 1 == arms.len();
            let body_bb = self.context.append_basic_block(function, "matcharm");
            let next_bb = if is_last {
                merge_bb
            } else {
                self.context.append_basic_block(function, "matchnext")
            };

            // An identifier pattern binds the scrutinee for the guard and
            // the body, shadowing like a loop counter does.
            let saved = arm
                .pattern
                .binding_name()
                .map(|name| self.bind_value(name, scrutinee));

            let matched = self.lower_pattern_condition(&arm.pattern, scrutinee)?;
            match (matched, &arm.guard) {
                (None, None) => {
                    self.builder.build_unconditional_branch(body_bb)?;
                }
                (None, Some(guard)) => {
                    let guard = expect_int(self.lower_expr(guard)?, "match guard")?;
                    self.builder
                        .build_conditional_branch(guard, body_bb, next_bb)?;
                }
                (Some(cond), None) => {
                    self.builder.build_conditional_branch(cond, body_bb, next_bb)?;
                }
                (Some(cond), Some(guard)) => {
                    let guard_bb = self.context.append_basic_block(function, "matchguard");
                    self.builder
                        .build_conditional_branch(cond, guard_bb, next_bb)?;
                    self.builder.position_at_end(guard_bb);
                    let guard = expect_int(self.lower_expr(guard)?, "match guard")?;
                    self.builder
                        .build_conditional_branch(guard, body_bb, next_bb)?;
                }
            }

            self.builder.position_at_end(body_bb);
            let value = self.lower_expr(&arm.body);

            if let Some(saved) = saved {
                self.restore_binding(saved);
            }
            let value = value?;

            if self.current_block()?.get_terminator().is_none() {
                if let Some(value) = value {
                    self.builder.build_store(result, value)?;
                }
                self.builder.build_unconditional_branch(merge_bb)?;
            }

            if !is_last {
                self.builder.position_at_end(next_bb);
            }
        }

        self.builder.position_at_end(merge_bb);
        let value = self.builder.build_load(result, "matchval")?;
        Ok(Some(value))
    }

    /// A refutable pattern yields an i1 match condition; irrefutable
    /// patterns (wildcard, identifier) yield `None`.
    fn lower_pattern_condition(
        &mut self,
        pattern: &Pattern,
        scrutinee: BasicValueEnum<'ctx>,
    ) -> Result<Option<IntValue<'ctx>>, CodegenError> {
        match &pattern.kind {
            PatternKind::Wildcard | PatternKind::Identifier { .. } => Ok(None),
            PatternKind::Literal(literal) => {
                let expected = self.lower_literal(literal)?;
                Ok(Some(self.value_equals(scrutinee, expected)?))
            }
            PatternKind::Range {
                start,
                end,
                inclusive,
            } => {
                let scrutinee = match scrutinee {
                    BasicValueEnum::IntValue(v) => v,
                    _ => {
                        return Err(CodegenError::Unsupported(
                            "range patterns require an integer scrutinee".to_string(),
                        ))
                    }
                };
                let start = self.pattern_literal_int(start)?;
                let end = self.pattern_literal_int(end)?;
                let lower_bound = self.builder.build_int_compare(
                    IntPredicate::SGE,
                    scrutinee,
                    start,
                    "rangelo",
                )?;
                let predicate = if *inclusive {
                    IntPredicate::SLE
                } else {
                    IntPredicate::SLT
                };
                let upper_bound =
                    self.builder
                        .build_int_compare(predicate, scrutinee, end, "rangehi")?;
                Ok(Some(self.builder.build_and(
                    lower_bound,
                    upper_bound,
                    "rangetmp",
                )?))
            }
            PatternKind::Or(patterns) => {
                let mut combined: Option<IntValue<'ctx>> = None;
                for sub in patterns {
                    match self.lower_pattern_condition(sub, scrutinee)? {
                        // An irrefutable alternative matches everything.
                        None => return Ok(None),
                        Some(cond) => {
                            combined = Some(match combined {
                                Some(acc) => self.builder.build_or(acc, cond, "ortmp")?,
                                None => cond,
                            });
                        }
                    }
                }
                Ok(combined)
            }
            PatternKind::Tuple(_) | PatternKind::Struct { .. } | PatternKind::Enum { .. } => {
                Err(CodegenError::Unsupported(
                    "destructuring patterns are not supported in match lowering".to_string(),
                ))
            }
        }
    }

    fn pattern_literal_int(&mut self, pattern: &Pattern) -> Result<IntValue<'ctx>, CodegenError> {
        let PatternKind::Literal(literal) = &pattern.kind else {
            return Err(CodegenError::Unsupported(
                "range pattern bounds must be literals".to_string(),
            ));
        };
        match self.lower_literal(literal)? {
            BasicValueEnum::IntValue(v) => Ok(v),
            _ => Err(CodegenError::Unsupported(
                "range pattern bounds must be integers".to_string(),
            )),
        }
    }

    fn value_equals(
        &mut self,
        left: BasicValueEnum<'ctx>,
        right: BasicValueEnum<'ctx>,
    ) -> Result<IntValue<'ctx>, CodegenError> {
        match (left, right) {
            (BasicValueEnum::IntValue(l), BasicValueEnum::IntValue(r))
                if l.get_type() == r.get_type() =>
            {
                Ok(self
                    .builder
                    .build_int_compare(IntPredicate::EQ, l, r, "eqtmp")?)
            }
            (BasicValueEnum::FloatValue(l), BasicValueEnum::FloatValue(r)) => Ok(self
                .builder
                .build_float_compare(FloatPredicate::OEQ, l, r, "eqtmp")?),
            _ => Err(CodegenError::Unsupported(
                "pattern and scrutinee types do not match".to_string(),
            )),
        }
    }

    fn lower_return(
        &mut self,
        value: Option<&Expr>,
    ) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        match value {
            Some(value) => {
                let value = expect_value(self.lower_expr(value)?, "return value")?;
                self.builder.build_return(Some(&value))?;
            }
            None => {
                self.builder.build_return(None)?;
            }
        }

        // Instructions lowered after a return are unreachable; park the
        // builder in a fresh block so they cannot trail the terminator.
        let function = self.current_function()?;
        let dead = self.context.append_basic_block(function, "afterret");
        self.builder.position_at_end(dead);
        Ok(None)
    }

    fn lower_break(&mut self) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let Some(blocks) = self.loops.last().copied() else {
            return Err(CodegenError::Unsupported(
                "'break' outside of a loop".to_string(),
            ));
        };
        self.builder.build_unconditional_branch(blocks.break_block)?;

        let function = self.current_function()?;
        let dead = self.context.append_basic_block(function, "afterbreak");
        self.builder.position_at_end(dead);
        Ok(None)
    }

    fn lower_continue(&mut self) -> Result<Option<BasicValueEnum<'ctx>>, CodegenError> {
        let Some(blocks) = self.loops.last().copied() else {
            return Err(CodegenError::Unsupported(
                "'continue' outside of a loop".to_string(),
            ));
        };
        self.builder
            .build_unconditional_branch(blocks.continue_block)?;

        let function = self.current_function()?;
        let dead = self.context.append_basic_block(function, "aftercontinue");
        self.builder.position_at_end(dead);
        Ok(None)
    }

    pub(crate) fn lower_literal(
        &mut self,
        literal: &Literal,
    ) -> Result<BasicValueEnum<'ctx>, CodegenError> {
        let value: BasicValueEnum = match literal {
            // Integer literals default to 32-bit signed pending inference.
            Literal::Int(v) => self.context.i32_type().const_int(*v as u64, true).into(),
            Literal::UInt(v) => self.context.i32_type().const_int(*v, false).into(),
            Literal::Float(v) => self.context.f64_type().const_float(*v).into(),
            Literal::Bool(v) => self
                .context
                .bool_type()
                .const_int(u64::from(*v), false)
                .into(),
            Literal::Char(v) => self
                .context
                .i32_type()
                .const_int(u64::from(u32::from(*v)), false)
                .into(),
            Literal::Str(v) => self
                .builder
                .build_global_string_ptr(v, "strtmp")?
                .as_pointer_value()
                .into(),
            Literal::Null => self.context.i32_type().const_zero().into(),
        };
        Ok(value)
    }

    // ── Binding save/restore ────────────────────────────────────────────

    fn bind_value(&mut self, name: &str, value: BasicValueEnum<'ctx>) -> SavedBinding<'ctx> {
        SavedBinding {
            name: name.to_string(),
            ssa: self.ssa_values.insert(name.to_string(), value),
            slot: self.allocas.remove(name),
        }
    }

    fn bind_slot(&mut self, name: &str, slot: LocalSlot<'ctx>) -> SavedBinding<'ctx> {
        SavedBinding {
            name: name.to_string(),
            slot: self.allocas.insert(name.to_string(), slot),
            ssa: self.ssa_values.remove(name),
        }
    }

    fn restore_binding(&mut self, saved: SavedBinding<'ctx>) {
        match saved.ssa {
            Some(value) => {
                self.ssa_values.insert(saved.name.clone(), value);
            }
            None => {
                self.ssa_values.remove(&saved.name);
            }
        }
        match saved.slot {
            Some(slot) => {
                self.allocas.insert(saved.name, slot);
            }
            None => {
                self.allocas.remove(&saved.name);
            }
        }
    }

}

fn expect_value<'ctx>(
    value: Option<BasicValueEnum<'ctx>>,
    what: &str,
) -> Result<BasicValueEnum<'ctx>, CodegenError> {
    value.ok_or_else(|| CodegenError::Unsupported(format!("{what} has no value")))
}

fn expect_int<'ctx>(
    value: Option<BasicValueEnum<'ctx>>,
    what: &str,
) -> Result<IntValue<'ctx>, CodegenError> {
    match value {
        Some(BasicValueEnum::IntValue(v)) => Ok(v),
        Some(_) => Err(CodegenError::Unsupported(format!(
            "{what} must be an integer value"
        ))),
        None => Err(CodegenError::Unsupported(format!("{what} has no value"))),
    }
}
