//! Module for generating random C# programs for property-based testing.
//!
//! This module defines the `CSharpProgram` type and the declaration, statement and
//! expression enums it is built from. Each can be generated randomly and rendered
//! back to C# source with `to_code()`.
//!
//! The generator covers the constructs the structural search cares about: nested
//! namespaces, classes and structs, fields with several declarators, auto, get-only
//! and arrow properties, block and arrow methods, and method bodies mixing if/else,
//! try/catch/finally, loops and nested blocks.
//!
//! Generation functions take a depth parameter that bounds recursion. Identifiers
//! are a fixed stem plus a number, so they can never collide with C# keywords.

use quickcheck::{Arbitrary, Gen};
use std::fmt;

/// Access modifier written in front of a declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Access {
    None,
    Public,
    Private,
    Protected,
    Internal,
    ProtectedInternal,
    PrivateProtected,
}

/// Binary operator in an expression.
#[derive(Clone, Debug)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Lt,
    Eq,
    And,
}

/// An expression.
#[derive(Clone, Debug)]
pub enum Expr {
    IntLit(i32),
    BoolLit(bool),
    StringLit(String),
    Var(String),
    Binary { op: BinOp, left: Box<Expr>, right: Box<Expr> },
    Invocation { target: String, args: Vec<Expr> },
    Parenthesized(Box<Expr>),
}

/// A statement inside a method or accessor body.
#[derive(Clone, Debug)]
pub enum Stmt {
    Local { name: String, value: Expr },
    Expression(Expr),
    Return(Option<Expr>),
    Block(Vec<Stmt>),
    If { condition: Expr, consequence: Box<Stmt>, alternative: Option<Box<Stmt>> },
    Try { body: Vec<Stmt>, catch: Option<Vec<Stmt>>, finally: Option<Vec<Stmt>> },
    While { condition: Expr, body: Box<Stmt> },
    For { var: String, bound: Expr, body: Box<Stmt> },
    ForEach { var: String, collection: Expr, body: Box<Stmt> },
}

/// Form of a property.
#[derive(Clone, Debug)]
pub enum PropertyForm {
    /// `{ get; set; }`
    Auto,
    /// `{ get; }`
    GetOnly,
    /// `=> expr;`
    Arrow(Expr),
    /// `{ get { ... } set { ... } }`
    Accessors { getter: Vec<Stmt>, setter: Vec<Stmt> },
}

/// Body of a method.
#[derive(Clone, Debug)]
pub enum MethodBody {
    Block(Vec<Stmt>),
    Arrow(Expr),
}

/// A member of a class or struct.
#[derive(Clone, Debug)]
pub enum Member {
    Field { access: Access, is_static: bool, names: Vec<String> },
    Property { access: Access, name: String, form: PropertyForm },
    Method { access: Access, is_static: bool, name: String, params: Vec<String>, body: MethodBody },
    Type(TypeDecl),
}

/// Kind of a type declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKeyword {
    Class,
    Struct,
}

/// A class or struct declaration.
#[derive(Clone, Debug)]
pub struct TypeDecl {
    pub access: Access,
    pub keyword: TypeKeyword,
    pub name: String,
    pub members: Vec<Member>,
}

/// A namespace block and its contents.
#[derive(Clone, Debug)]
pub struct Namespace {
    pub name: String,
    pub types: Vec<TypeDecl>,
    pub namespaces: Vec<Namespace>,
}

/// A complete compilation unit.
#[derive(Clone, Debug)]
pub struct CSharpProgram {
    pub types: Vec<TypeDecl>,
    pub namespaces: Vec<Namespace>,
}

/// Maximum recursion depth for generation to prevent excessive tree depth.
const MAX_DEPTH: usize = 4;

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::None => Ok(()),
            Access::Public => write!(f, "public "),
            Access::Private => write!(f, "private "),
            Access::Protected => write!(f, "protected "),
            Access::Internal => write!(f, "internal "),
            Access::ProtectedInternal => write!(f, "protected internal "),
            Access::PrivateProtected => write!(f, "private protected "),
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinOp::Add => write!(f, "+"),
            BinOp::Sub => write!(f, "-"),
            BinOp::Mul => write!(f, "*"),
            BinOp::Lt => write!(f, "<"),
            BinOp::Eq => write!(f, "=="),
            BinOp::And => write!(f, "&&"),
        }
    }
}

/// Generates a random number in the range [min, max] inclusive.
fn gen_range(g: &mut Gen, min: u32, max: u32) -> u32 {
    min + (u32::arbitrary(g) % (max - min + 1))
}

/// Generates an identifier from a stem, e.g. `Cat12` or `x3`.
fn gen_ident(g: &mut Gen, stems: &[&str]) -> String {
    format!("{}{}", g.choose(stems).unwrap(), gen_range(g, 0, 99))
}

fn gen_type_name(g: &mut Gen) -> String {
    gen_ident(g, &["Cat", "Dog", "Zoo", "Keeper", "Cage", "Bowl"])
}

fn gen_member_name(g: &mut Gen) -> String {
    gen_ident(g, &["Run", "Spin", "Feed", "Size", "Count", "Name"])
}

fn gen_var_name(g: &mut Gen) -> String {
    gen_ident(g, &["x", "y", "count", "item", "total"])
}

fn gen_access(g: &mut Gen) -> Access {
    const CHOICES: &[Access] = &[
        Access::None,
        Access::Public,
        Access::Private,
        Access::Protected,
        Access::Internal,
        Access::ProtectedInternal,
        Access::PrivateProtected,
    ];
    g.choose(CHOICES).unwrap().clone()
}

fn gen_expr(g: &mut Gen, depth: usize) -> Expr {
    const LEAVES: &[&str] = &["int", "bool", "string", "var"];
    const CHOICES: &[&str] = &["int", "bool", "string", "var", "binary", "invocation", "paren"];
    let choices = if depth == 0 { LEAVES } else { CHOICES };
    match *g.choose(choices).unwrap() {
        "int" => Expr::IntLit(gen_range(g, 0, 1000) as i32),
        "bool" => Expr::BoolLit(bool::arbitrary(g)),
        "string" => Expr::StringLit(gen_ident(g, &["meow", "woof", "hello"])),
        "var" => Expr::Var(gen_var_name(g)),
        "binary" => Expr::Binary {
            op: BinOp::arbitrary(g),
            left: Box::new(gen_expr(g, depth - 1)),
            right: Box::new(gen_expr(g, depth - 1)),
        },
        "invocation" => Expr::Invocation {
            target: gen_member_name(g),
            args: (0..gen_range(g, 0, 2)).map(|_| gen_expr(g, depth - 1)).collect(),
        },
        "paren" => Expr::Parenthesized(Box::new(gen_expr(g, depth - 1))),
        _ => unreachable!(),
    }
}

fn gen_stmts(g: &mut Gen, depth: usize) -> Vec<Stmt> {
    (0..gen_range(g, 0, 3)).map(|_| gen_stmt(g, depth)).collect()
}

fn gen_stmt(g: &mut Gen, depth: usize) -> Stmt {
    const LEAVES: &[&str] = &["local", "expression", "return"];
    const CHOICES: &[&str] = &[
        "local", "expression", "return", "block", "if", "try", "while", "for", "foreach",
    ];
    let choices = if depth == 0 { LEAVES } else { CHOICES };
    match *g.choose(choices).unwrap() {
        "local" => Stmt::Local {
            name: gen_var_name(g),
            value: gen_expr(g, depth.min(2)),
        },
        "expression" => Stmt::Expression(Expr::Invocation {
            target: gen_member_name(g),
            args: (0..gen_range(g, 0, 2)).map(|_| gen_expr(g, depth.min(1))).collect(),
        }),
        "return" => Stmt::Return(None),
        "block" => Stmt::Block(gen_stmts(g, depth - 1)),
        "if" => Stmt::If {
            condition: gen_expr(g, depth.min(2)),
            consequence: Box::new(gen_embedded(g, depth - 1)),
            alternative: if bool::arbitrary(g) {
                Some(Box::new(gen_embedded(g, depth - 1)))
            } else {
                None
            },
        },
        "try" => {
            let has_catch = bool::arbitrary(g);
            Stmt::Try {
                body: gen_stmts(g, depth - 1),
                catch: has_catch.then(|| gen_stmts(g, depth - 1)),
                // A try needs at least one of catch or finally.
                finally: (!has_catch || bool::arbitrary(g)).then(|| gen_stmts(g, depth - 1)),
            }
        }
        "while" => Stmt::While {
            condition: gen_expr(g, depth.min(2)),
            body: Box::new(gen_embedded(g, depth - 1)),
        },
        "for" => Stmt::For {
            var: gen_var_name(g),
            bound: gen_expr(g, depth.min(1)),
            body: Box::new(gen_embedded(g, depth - 1)),
        },
        "foreach" => Stmt::ForEach {
            var: gen_var_name(g),
            collection: Expr::Var(gen_var_name(g)),
            body: Box::new(gen_embedded(g, depth - 1)),
        },
        _ => unreachable!(),
    }
}

/// Generates the body of an if, else or loop. Declarations are not allowed there.
fn gen_embedded(g: &mut Gen, depth: usize) -> Stmt {
    match gen_range(g, 0, 3) {
        0 => Stmt::Expression(Expr::Invocation {
            target: gen_member_name(g),
            args: Vec::new(),
        }),
        1 if depth > 0 => gen_stmt(g, depth).into_embedded(),
        _ => Stmt::Block(gen_stmts(g, depth)),
    }
}

fn gen_property_form(g: &mut Gen, depth: usize) -> PropertyForm {
    match gen_range(g, 0, 3) {
        0 => PropertyForm::Auto,
        1 => PropertyForm::GetOnly,
        2 => PropertyForm::Arrow(gen_expr(g, depth.min(2))),
        _ => PropertyForm::Accessors {
            getter: vec![Stmt::Return(Some(gen_expr(g, depth.min(1))))],
            setter: gen_stmts(g, depth.saturating_sub(1)),
        },
    }
}

fn gen_member(g: &mut Gen, depth: usize) -> Member {
    const LEAVES: &[&str] = &["field", "property", "method"];
    const CHOICES: &[&str] = &["field", "property", "method", "method", "type"];
    let choices = if depth <= 1 { LEAVES } else { CHOICES };
    match *g.choose(choices).unwrap() {
        "field" => Member::Field {
            access: gen_access(g),
            is_static: bool::arbitrary(g),
            names: (0..gen_range(g, 1, 3)).map(|_| gen_var_name(g)).collect(),
        },
        "property" => Member::Property {
            access: gen_access(g),
            name: gen_member_name(g),
            form: gen_property_form(g, depth),
        },
        "method" => Member::Method {
            access: gen_access(g),
            is_static: bool::arbitrary(g),
            name: gen_member_name(g),
            params: (0..gen_range(g, 0, 2)).map(|_| gen_var_name(g)).collect(),
            body: if bool::arbitrary(g) {
                MethodBody::Block(gen_stmts(g, depth))
            } else {
                MethodBody::Arrow(gen_expr(g, depth.min(2)))
            },
        },
        "type" => Member::Type(gen_type_decl(g, depth - 1)),
        _ => unreachable!(),
    }
}

fn gen_type_decl(g: &mut Gen, depth: usize) -> TypeDecl {
    TypeDecl {
        access: gen_access(g),
        keyword: if bool::arbitrary(g) { TypeKeyword::Class } else { TypeKeyword::Struct },
        name: gen_type_name(g),
        members: (0..gen_range(g, 0, 4)).map(|_| gen_member(g, depth)).collect(),
    }
}

fn gen_namespace(g: &mut Gen, depth: usize) -> Namespace {
    Namespace {
        name: gen_type_name(g),
        types: (0..gen_range(g, 0, 2)).map(|_| gen_type_decl(g, depth)).collect(),
        namespaces: if depth > 1 {
            (0..gen_range(g, 0, 1)).map(|_| gen_namespace(g, depth - 1)).collect()
        } else {
            Vec::new()
        },
    }
}

impl Arbitrary for BinOp {
    fn arbitrary(g: &mut Gen) -> Self {
        const CHOICES: &[BinOp] = &[BinOp::Add, BinOp::Sub, BinOp::Mul, BinOp::Lt, BinOp::Eq, BinOp::And];
        g.choose(CHOICES).unwrap().clone()
    }
}

impl Arbitrary for CSharpProgram {
    fn arbitrary(g: &mut Gen) -> Self {
        let depth = g.size().clamp(1, MAX_DEPTH);
        CSharpProgram {
            types: (0..gen_range(g, 0, 2)).map(|_| gen_type_decl(g, depth)).collect(),
            namespaces: (0..gen_range(g, 0, 2)).map(|_| gen_namespace(g, depth)).collect(),
        }
    }
}

fn indent(level: usize) -> String {
    "    ".repeat(level)
}

fn block_code(stmts: &[Stmt], level: usize) -> String {
    let mut code = String::from("{\n");
    for stmt in stmts {
        code.push_str(&indent(level + 1));
        code.push_str(&stmt.to_code(level + 1));
        code.push('\n');
    }
    code.push_str(&indent(level));
    code.push('}');
    code
}

impl Expr {
    pub fn to_code(&self) -> String {
        match self {
            Expr::IntLit(n) => n.to_string(),
            Expr::BoolLit(b) => b.to_string(),
            Expr::StringLit(s) => format!("\"{}\"", s),
            Expr::Var(name) => name.clone(),
            Expr::Binary { op, left, right } => {
                format!("{} {} {}", left.to_code(), op, right.to_code())
            }
            Expr::Invocation { target, args } => {
                let args = args.iter().map(|a| a.to_code()).collect::<Vec<_>>().join(", ");
                format!("{}({})", target, args)
            }
            Expr::Parenthesized(inner) => format!("({})", inner.to_code()),
        }
    }
}

impl Stmt {
    /// Wraps a declaration in a block so it can stand as an embedded statement.
    fn into_embedded(self) -> Stmt {
        match self {
            Stmt::Local { .. } => Stmt::Block(vec![self]),
            other => other,
        }
    }

    pub fn to_code(&self, level: usize) -> String {
        match self {
            Stmt::Local { name, value } => format!("var {} = {};", name, value.to_code()),
            Stmt::Expression(expr) => format!("{};", expr.to_code()),
            Stmt::Return(None) => "return;".to_string(),
            Stmt::Return(Some(expr)) => format!("return {};", expr.to_code()),
            Stmt::Block(stmts) => block_code(stmts, level),
            Stmt::If { condition, consequence, alternative } => {
                let mut code = format!("if ({}) {}", condition.to_code(), consequence.to_code(level));
                if let Some(alternative) = alternative {
                    code.push_str(&format!("\n{}else {}", indent(level), alternative.to_code(level)));
                }
                code
            }
            Stmt::Try { body, catch, finally } => {
                let mut code = format!("try {}", block_code(body, level));
                if let Some(catch) = catch {
                    code.push_str(&format!("\n{}catch {}", indent(level), block_code(catch, level)));
                }
                if let Some(finally) = finally {
                    code.push_str(&format!("\n{}finally {}", indent(level), block_code(finally, level)));
                }
                code
            }
            Stmt::While { condition, body } => {
                format!("while ({}) {}", condition.to_code(), body.to_code(level))
            }
            Stmt::For { var, bound, body } => format!(
                "for (int {v} = 0; {v} < {}; {v}++) {}",
                bound.to_code(),
                body.to_code(level),
                v = var
            ),
            Stmt::ForEach { var, collection, body } => format!(
                "foreach (var {} in {}) {}",
                var,
                collection.to_code(),
                body.to_code(level)
            ),
        }
    }
}

impl Member {
    pub fn to_code(&self, level: usize) -> String {
        match self {
            Member::Field { access, is_static, names } => format!(
                "{}{}int {};",
                access,
                if *is_static { "static " } else { "" },
                names.join(", ")
            ),
            Member::Property { access, name, form } => match form {
                PropertyForm::Auto => format!("{}int {} {{ get; set; }}", access, name),
                PropertyForm::GetOnly => format!("{}int {} {{ get; }}", access, name),
                PropertyForm::Arrow(expr) => format!("{}int {} => {};", access, name, expr.to_code()),
                PropertyForm::Accessors { getter, setter } => format!(
                    "{}int {} {{\n{}get {}\n{}set {}\n{}}}",
                    access,
                    name,
                    indent(level + 1),
                    block_code(getter, level + 1),
                    indent(level + 1),
                    block_code(setter, level + 1),
                    indent(level)
                ),
            },
            Member::Method { access, is_static, name, params, body } => {
                let params = params.iter().map(|p| format!("int {}", p)).collect::<Vec<_>>().join(", ");
                let modifiers = format!("{}{}", access, if *is_static { "static " } else { "" });
                match body {
                    MethodBody::Block(stmts) => {
                        format!("{}void {}({}) {}", modifiers, name, params, block_code(stmts, level))
                    }
                    MethodBody::Arrow(expr) => {
                        format!("{}object {}({}) => {};", modifiers, name, params, expr.to_code())
                    }
                }
            }
            Member::Type(decl) => decl.to_code(level),
        }
    }
}

impl TypeDecl {
    pub fn to_code(&self, level: usize) -> String {
        let keyword = match self.keyword {
            TypeKeyword::Class => "class",
            TypeKeyword::Struct => "struct",
        };
        let mut code = format!("{}{} {}\n{}{{\n", self.access, keyword, self.name, indent(level));
        for member in &self.members {
            code.push_str(&indent(level + 1));
            code.push_str(&member.to_code(level + 1));
            code.push('\n');
        }
        code.push_str(&indent(level));
        code.push('}');
        code
    }
}

impl Namespace {
    pub fn to_code(&self, level: usize) -> String {
        let mut code = format!("namespace {}\n{}{{\n", self.name, indent(level));
        for decl in &self.types {
            code.push_str(&indent(level + 1));
            code.push_str(&decl.to_code(level + 1));
            code.push('\n');
        }
        for namespace in &self.namespaces {
            code.push_str(&indent(level + 1));
            code.push_str(&namespace.to_code(level + 1));
            code.push('\n');
        }
        code.push_str(&indent(level));
        code.push('}');
        code
    }
}

impl CSharpProgram {
    pub fn to_code(&self) -> String {
        let mut code = String::new();
        for decl in &self.types {
            code.push_str(&decl.to_code(0));
            code.push('\n');
        }
        for namespace in &self.namespaces {
            code.push_str(&namespace.to_code(0));
            code.push('\n');
        }
        code
    }

    /// Number of method declarations anywhere in the program.
    pub fn method_count(&self) -> usize {
        fn in_type(decl: &TypeDecl) -> usize {
            decl.members
                .iter()
                .map(|member| match member {
                    Member::Method { .. } => 1,
                    Member::Type(nested) => in_type(nested),
                    _ => 0,
                })
                .sum()
        }
        fn in_namespace(namespace: &Namespace) -> usize {
            namespace.types.iter().map(in_type).sum::<usize>()
                + namespace.namespaces.iter().map(in_namespace).sum::<usize>()
        }
        self.types.iter().map(in_type).sum::<usize>()
            + self.namespaces.iter().map(in_namespace).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_is_balanced() {
        let mut g = Gen::new(MAX_DEPTH);
        for _ in 0..50 {
            let code = CSharpProgram::arbitrary(&mut g).to_code();
            assert_eq!(code.matches('{').count(), code.matches('}').count(), "{}", code);
            assert_eq!(code.matches('(').count(), code.matches(')').count(), "{}", code);
        }
    }

    #[test]
    fn test_for_loop_rendering() {
        let stmt = Stmt::For {
            var: "x1".to_string(),
            bound: Expr::IntLit(3),
            body: Box::new(Stmt::Block(Vec::new())),
        };
        assert_eq!(stmt.to_code(0), "for (int x1 = 0; x1 < 3; x1++) {\n}");
    }
}
