//! Loop-nest intermediate representation for image pipelines
//!
//! The IR is deliberately small: it covers the statement forms that survive
//! scheduling (perfectly nested loops, buffer reads and writes, `let`
//! bindings) plus the expression vocabulary needed to describe coordinate
//! arithmetic.  Backend lowering passes (see [`crate::lower`]) rewrite these
//! nodes in place of a full compiler.
//!
//! Rewrites are expressed with the [`Mutator`] trait: implementors override
//! the node kinds they care about and delegate everything else to
//! [`walk_stmt`] / [`walk_expr`], which rebuild the tree bottom-up.

use crate::Error;

/// Scalar element types that appear in coordinate arithmetic
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ScalarType {
    Int32,
    Float32,
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarType::Int32 => write!(f, "int32"),
            ScalarType::Float32 => write!(f, "float32"),
        }
    }
}

/// Binary arithmetic operators
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    fn symbol(&self) -> char {
        match self {
            BinOp::Add => '+',
            BinOp::Sub => '-',
            BinOp::Mul => '*',
            BinOp::Div => '/',
        }
    }
}

/// Distinguishes reads of a pipeline buffer from calls to backend intrinsics
///
/// A [`CallKind::Buffer`] call is a coordinate-indexed read of a named image;
/// it is the form lowering passes rewrite.  A [`CallKind::Intrinsic`] call is
/// already backend-specific and is left alone by further rewrites.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CallKind {
    Buffer,
    Intrinsic,
}

/// An expression node
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    IntConst(i32),
    FloatConst(f32),
    /// A string immediate, used to pass buffer names to intrinsics
    StrConst(String),
    Var(String),
    Cast(ScalarType, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call {
        kind: CallKind,
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Builds a variable reference
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    /// Builds an integer constant
    pub fn int(v: i32) -> Self {
        Expr::IntConst(v)
    }

    /// Builds a floating-point constant
    pub fn float(v: f32) -> Self {
        Expr::FloatConst(v)
    }

    /// Builds a string immediate
    pub fn str(s: impl Into<String>) -> Self {
        Expr::StrConst(s.into())
    }

    /// Builds a cast to the given scalar type
    pub fn cast(ty: ScalarType, e: Expr) -> Self {
        Expr::Cast(ty, Box::new(e))
    }

    /// Builds a coordinate-indexed read of the named buffer
    pub fn read(name: impl Into<String>, coords: Vec<Expr>) -> Self {
        Expr::Call {
            kind: CallKind::Buffer,
            name: name.into(),
            args: coords,
        }
    }

    /// Builds a call to a backend intrinsic
    pub fn intrinsic(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            kind: CallKind::Intrinsic,
            name: name.into(),
            args,
        }
    }

    /// Checks whether this expression is the integer constant zero
    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::IntConst(0))
    }
}

macro_rules! impl_binary {
    ($trait:ident, $fn:ident, $op:ident) => {
        impl std::ops::$trait for Expr {
            type Output = Expr;
            fn $fn(self, rhs: Expr) -> Expr {
                Expr::Binary(BinOp::$op, Box::new(self), Box::new(rhs))
            }
        }
    };
}

impl_binary!(Add, add, Add);
impl_binary!(Sub, sub, Sub);
impl_binary!(Mul, mul, Mul);
impl_binary!(Div, div, Div);

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::IntConst(v) => write!(f, "{v}"),
            Expr::FloatConst(v) => write!(f, "{v:?}"),
            Expr::StrConst(s) => write!(f, "{s:?}"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Cast(ty, e) => write!(f, "{ty}({e})"),
            Expr::Binary(op, a, b) => write!(f, "({a} {} {b})", op.symbol()),
            Expr::Call { name, args, .. } => {
                write!(f, "{name}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Execution strategy of a [`Stmt::For`] loop
#[allow(missing_docs)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ForKind {
    Serial,
    Parallel,
}

/// A statement node
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    For {
        name: String,
        kind: ForKind,
        min: Expr,
        extent: Expr,
        body: Box<Stmt>,
    },
    /// A coordinate-indexed write into the named buffer
    ///
    /// Carries one value per tuple component; scheduling normally reduces
    /// this to a single value before backend lowering runs.
    Store {
        name: String,
        coords: Vec<Expr>,
        values: Vec<Expr>,
    },
    Let {
        name: String,
        value: Expr,
        body: Box<Stmt>,
    },
    /// Evaluates an expression for its side effect
    Eval(Expr),
    Seq(Vec<Stmt>),
}

impl Stmt {
    /// Builds a loop statement
    pub fn loop_over(
        name: impl Into<String>,
        kind: ForKind,
        min: Expr,
        extent: Expr,
        body: Stmt,
    ) -> Self {
        Stmt::For {
            name: name.into(),
            kind,
            min,
            extent,
            body: Box::new(body),
        }
    }

    /// Builds a single-valued store statement
    pub fn store(name: impl Into<String>, coords: Vec<Expr>, value: Expr) -> Self {
        Stmt::Store {
            name: name.into(),
            coords,
            values: vec![value],
        }
    }

    /// Builds a `let` binding scoped over `body`
    pub fn bind(name: impl Into<String>, value: Expr, body: Stmt) -> Self {
        Stmt::Let {
            name: name.into(),
            value,
            body: Box::new(body),
        }
    }

    fn fmt_indented(
        &self,
        f: &mut std::fmt::Formatter<'_>,
        depth: usize,
    ) -> std::fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            Stmt::For {
                name,
                kind,
                min,
                extent,
                body,
            } => {
                let tag = match kind {
                    ForKind::Serial => "for",
                    ForKind::Parallel => "parallel",
                };
                writeln!(f, "{pad}{tag} ({name}, {min}, {extent}) {{")?;
                body.fmt_indented(f, depth + 1)?;
                writeln!(f, "{pad}}}")
            }
            Stmt::Store {
                name,
                coords,
                values,
            } => {
                write!(f, "{pad}{name}(")?;
                for (i, c) in coords.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, ") = ")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                writeln!(f)
            }
            Stmt::Let { name, value, body } => {
                writeln!(f, "{pad}let {name} = {value} in")?;
                body.fmt_indented(f, depth)
            }
            Stmt::Eval(e) => writeln!(f, "{pad}{e}"),
            Stmt::Seq(stmts) => {
                for s in stmts {
                    s.fmt_indented(f, depth)?;
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Display for Stmt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_indented(f, 0)
    }
}

////////////////////////////////////////////////////////////////////////////////

/// A bottom-up IR rewriter
///
/// The default implementations rebuild every node unchanged, so an
/// implementor only overrides the node kinds it rewrites.  Overrides that
/// recurse should call [`walk_stmt`] / [`walk_expr`] to visit children.
pub trait Mutator {
    /// Rewrites a statement; the default delegates to [`walk_stmt`]
    fn mutate_stmt(&mut self, stmt: &Stmt) -> Result<Stmt, Error> {
        walk_stmt(self, stmt)
    }

    /// Rewrites an expression; the default delegates to [`walk_expr`]
    fn mutate_expr(&mut self, expr: &Expr) -> Result<Expr, Error> {
        walk_expr(self, expr)
    }
}

/// Rebuilds a statement, recursing into children through the mutator
pub fn walk_stmt<M: Mutator + ?Sized>(m: &mut M, stmt: &Stmt) -> Result<Stmt, Error> {
    Ok(match stmt {
        Stmt::For {
            name,
            kind,
            min,
            extent,
            body,
        } => Stmt::For {
            name: name.clone(),
            kind: *kind,
            min: m.mutate_expr(min)?,
            extent: m.mutate_expr(extent)?,
            body: Box::new(m.mutate_stmt(body)?),
        },
        Stmt::Store {
            name,
            coords,
            values,
        } => Stmt::Store {
            name: name.clone(),
            coords: coords
                .iter()
                .map(|c| m.mutate_expr(c))
                .collect::<Result<_, _>>()?,
            values: values
                .iter()
                .map(|v| m.mutate_expr(v))
                .collect::<Result<_, _>>()?,
        },
        Stmt::Let { name, value, body } => Stmt::Let {
            name: name.clone(),
            value: m.mutate_expr(value)?,
            body: Box::new(m.mutate_stmt(body)?),
        },
        Stmt::Eval(e) => Stmt::Eval(m.mutate_expr(e)?),
        Stmt::Seq(stmts) => Stmt::Seq(
            stmts
                .iter()
                .map(|s| m.mutate_stmt(s))
                .collect::<Result<_, _>>()?,
        ),
    })
}

/// Rebuilds an expression, recursing into children through the mutator
pub fn walk_expr<M: Mutator + ?Sized>(m: &mut M, expr: &Expr) -> Result<Expr, Error> {
    Ok(match expr {
        Expr::IntConst(_) | Expr::FloatConst(_) | Expr::StrConst(_) | Expr::Var(_) => {
            expr.clone()
        }
        Expr::Cast(ty, e) => Expr::Cast(*ty, Box::new(m.mutate_expr(e)?)),
        Expr::Binary(op, a, b) => Expr::Binary(
            *op,
            Box::new(m.mutate_expr(a)?),
            Box::new(m.mutate_expr(b)?),
        ),
        Expr::Call { kind, name, args } => Expr::Call {
            kind: *kind,
            name: name.clone(),
            args: args
                .iter()
                .map(|a| m.mutate_expr(a))
                .collect::<Result<_, _>>()?,
        },
    })
}

struct Substitute<'a> {
    name: &'a str,
    with: &'a Expr,
}

impl Mutator for Substitute<'_> {
    fn mutate_stmt(&mut self, stmt: &Stmt) -> Result<Stmt, Error> {
        // A loop or binding that redefines the name shadows the substitution
        // in its body.
        match stmt {
            Stmt::For {
                name,
                kind,
                min,
                extent,
                body,
            } if name == self.name => Ok(Stmt::For {
                name: name.clone(),
                kind: *kind,
                min: self.mutate_expr(min)?,
                extent: self.mutate_expr(extent)?,
                body: body.clone(),
            }),
            Stmt::Let { name, value, body } if name == self.name => Ok(Stmt::Let {
                name: name.clone(),
                value: self.mutate_expr(value)?,
                body: body.clone(),
            }),
            _ => walk_stmt(self, stmt),
        }
    }

    fn mutate_expr(&mut self, expr: &Expr) -> Result<Expr, Error> {
        match expr {
            Expr::Var(n) if n == self.name => Ok(self.with.clone()),
            _ => walk_expr(self, expr),
        }
    }
}

/// Replaces every free reference to `name` in `stmt` with `with`
pub fn substitute(name: &str, with: &Expr, stmt: &Stmt) -> Result<Stmt, Error> {
    Substitute { name, with }.mutate_stmt(stmt)
}
