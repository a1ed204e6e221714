use crate::lexer::token::SourceLocation;

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub items: Vec<Item>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenericParam {
    pub name: String,
    pub bounds: Vec<Vec<String>>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub kind: ItemKind,
    pub visibility: Visibility,
    pub name: String,
    pub generic_params: Vec<GenericParam>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    Function(Function),
    Struct {
        fields: Vec<StructField>,
    },
    Enum {
        variants: Vec<EnumVariant>,
    },
    Trait {
        items: Vec<Item>,
    },
    Impl {
        target: Type,
        trait_path: Option<Vec<String>>,
        items: Vec<Item>,
    },
    TypeAlias {
        aliased: Type,
    },
    Module {
        items: Vec<Item>,
        // `mod name;` with the body elsewhere
        external: bool,
    },
    Import {
        path: Vec<String>,
        alias: Option<String>,
    },
    Extern {
        items: Vec<Item>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub params: Vec<Param>,
    pub return_type: Type,
    pub body: Option<Expr>,
    pub is_extern: bool,
    pub is_unsafe: bool,
}

/// A parameter binds through the full pattern grammar so `mut x: i32` works.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub pattern: Pattern,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub visibility: Visibility,
    pub name: String,
    pub ty: Type,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    pub name: String,
    pub payload: Vec<Type>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub kind: TypeKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Primitive(String),
    Pointer {
        mutable: bool,
        pointee: Box<Type>,
    },
    Reference {
        mutable: bool,
        pointee: Box<Type>,
    },
    Array {
        element: Box<Type>,
        size: u64,
    },
    Slice {
        element: Box<Type>,
    },
    Tuple(Vec<Type>),
    Function {
        params: Vec<Type>,
        return_type: Option<Box<Type>>,
    },
    Named {
        path: Vec<String>,
        generic_args: Vec<Type>,
    },
}

impl Type {
    pub fn primitive(name: &str, location: SourceLocation) -> Self {
        Self {
            kind: TypeKind::Primitive(name.to_string()),
            location,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(&self.kind, TypeKind::Primitive(name) if name == "void")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Char(char),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
}

impl BinaryOp {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
                | BinaryOp::ModAssign
                | BinaryOp::AndAssign
                | BinaryOp::OrAssign
                | BinaryOp::XorAssign
                | BinaryOp::ShlAssign
                | BinaryOp::ShrAssign
        )
    }

    /// The underlying operator of a compound assignment, if any.
    pub fn compound_base(self) -> Option<BinaryOp> {
        let base = match self {
            BinaryOp::AddAssign => BinaryOp::Add,
            BinaryOp::SubAssign => BinaryOp::Sub,
            BinaryOp::MulAssign => BinaryOp::Mul,
            BinaryOp::DivAssign => BinaryOp::Div,
            BinaryOp::ModAssign => BinaryOp::Mod,
            BinaryOp::AndAssign => BinaryOp::BitAnd,
            BinaryOp::OrAssign => BinaryOp::BitOr,
            BinaryOp::XorAssign => BinaryOp::BitXor,
            BinaryOp::ShlAssign => BinaryOp::Shl,
            BinaryOp::ShrAssign => BinaryOp::Shr,
            _ => return None,
        };
        Some(base)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    BitNot,
    Deref,
    AddrOf,
    AddrOfMut,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInit {
    pub name: String,
    pub value: Expr,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Identifier(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    FieldAccess {
        object: Box<Expr>,
        field: String,
    },
    Cast {
        value: Box<Expr>,
        target: Box<Type>,
    },
    StructLiteral {
        path: Vec<String>,
        fields: Vec<FieldInit>,
    },
    ArrayLiteral(Vec<Expr>),
    ArrayRepeat {
        value: Box<Expr>,
        count: Box<Expr>,
    },
    Tuple(Vec<Expr>),
    Block {
        stmts: Vec<Stmt>,
        // Trailing expression without a semicolon; the block's value.
        tail: Option<Box<Expr>>,
    },
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    Match {
        scrutinee: Box<Expr>,
        arms: Vec<MatchArm>,
    },
    Range {
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
        inclusive: bool,
    },
    Return(Option<Box<Expr>>),
    While {
        condition: Box<Expr>,
        body: Box<Expr>,
    },
    For {
        pattern: Box<Pattern>,
        iterator: Box<Expr>,
        body: Box<Expr>,
    },
    Break(Option<String>),
    Continue(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    Wildcard,
    Identifier {
        name: String,
        mutable: bool,
    },
    Literal(Literal),
    Tuple(Vec<Pattern>),
    Struct {
        path: Vec<String>,
        fields: Vec<(String, Pattern)>,
    },
    Enum {
        path: Vec<String>,
        args: Vec<Pattern>,
    },
    Range {
        start: Box<Pattern>,
        end: Box<Pattern>,
        inclusive: bool,
    },
    Or(Vec<Pattern>),
}

impl Pattern {
    /// The bound name for the simple binding patterns; `None` otherwise.
    pub fn binding_name(&self) -> Option<&str> {
        match &self.kind {
            PatternKind::Identifier { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_mutable(&self) -> bool {
        matches!(&self.kind, PatternKind::Identifier { mutable: true, .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        pattern: Pattern,
        ty: Option<Type>,
        initializer: Option<Expr>,
        location: SourceLocation,
    },
    Expr {
        expr: Expr,
        has_semicolon: bool,
    },
    Item(Box<Item>),
}
