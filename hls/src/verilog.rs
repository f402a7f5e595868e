// verilog.rs - Hardware module IR
//
// A small subset of Verilog: expressions over registers, procedural
// statements with blocking and non-blocking assignment, and a module made of
// declarations and always-processes. Textual emission is left to whoever
// consumes the serialized `Module`.

use crate::rtl::{Node, Reg};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Binary operators. Signed and unsigned forms are distinct opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// Signed division
    Div,
    DivU,
    /// Signed remainder
    Mod,
    ModU,
    Lt,
    LtU,
    Gt,
    GtU,
    Le,
    LeU,
    Ge,
    GeU,
    Eq,
    Ne,
    And,
    Or,
    Xor,
    Shl,
    /// Arithmetic shift right
    Shr,
    /// Logical shift right
    ShrU,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Lit(Value),
    Var(Reg),
    /// Sampled external input
    Input(Reg),
    Binop(BinOp, Box<Expr>, Box<Expr>),
    Unop(UnOp, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stmt {
    Skip,
    Seq(Box<Stmt>, Box<Stmt>),
    Cond(Expr, Box<Stmt>, Box<Stmt>),
    /// Scrutinee, arms tested in order, optional default
    Case(Expr, Vec<(Expr, Stmt)>, Option<Box<Stmt>>),
    /// `reg = expr;`
    Blocking(Reg, Expr),
    /// `reg <= expr;`
    NonBlocking(Reg, Expr),
}

impl BinOp {
    /// Does the operator yield a 1-bit truth value?
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Lt
                | BinOp::LtU
                | BinOp::Gt
                | BinOp::GtU
                | BinOp::Le
                | BinOp::LeU
                | BinOp::Ge
                | BinOp::GeU
                | BinOp::Eq
                | BinOp::Ne
        )
    }

    /// Are the operands interpreted as two's complement?
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            BinOp::Div
                | BinOp::Mod
                | BinOp::Lt
                | BinOp::Gt
                | BinOp::Le
                | BinOp::Ge
                | BinOp::Shr
        )
    }
}

impl Expr {
    pub fn var(reg: Reg) -> Self {
        Expr::Var(reg)
    }

    /// 32-bit literal
    pub fn int(n: i32) -> Self {
        Expr::Lit(Value::from_i32(n))
    }

    /// Literal naming a state of the FSM
    pub fn node(node: Node, width: u32) -> Self {
        Expr::Lit(Value::new(width, node.0 as u64))
    }

    pub fn binop(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binop(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn unop(op: UnOp, e: Expr) -> Self {
        Expr::Unop(op, Box::new(e))
    }

    pub fn ternary(cond: Expr, ifso: Expr, ifnot: Expr) -> Self {
        Expr::Ternary(Box::new(cond), Box::new(ifso), Box::new(ifnot))
    }
}

impl Stmt {
    pub fn seq(first: Stmt, second: Stmt) -> Self {
        Stmt::Seq(Box::new(first), Box::new(second))
    }

    pub fn cond(cond: Expr, ifso: Stmt, ifnot: Stmt) -> Self {
        Stmt::Cond(cond, Box::new(ifso), Box::new(ifnot))
    }
}

/// Port direction of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Io {
    Input,
    Output,
}

/// Sensitivity list of an always-process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    PosEdge(Reg),
    NegEdge(Reg),
    Or(Box<Event>, Box<Event>),
    /// `@(*)`
    Star,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Item {
    Decl {
        reg: Reg,
        width: u32,
        io: Option<Io>,
    },
    Always {
        event: Event,
        stmt: Stmt,
    },
}

/// A synthesized hardware module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub start: (Reg, u32),
    pub reset: (Reg, u32),
    pub clock: (Reg, u32),
    pub finish: (Reg, u32),
    /// Return value register
    pub ret: (Reg, u32),
    /// FSM state register
    pub state: (Reg, u32),
    pub args: Vec<(Reg, u32)>,
    /// State entered on reset
    pub entry: Node,
    pub body: Vec<Item>,
}

impl Module {
    /// Declared width of `reg`, if any
    pub fn width_of(&self, reg: Reg) -> Option<u32> {
        self.body.iter().find_map(|item| match item {
            Item::Decl { reg: r, width, .. } if *r == reg => Some(*width),
            _ => None,
        })
    }

    pub fn processes(&self) -> impl Iterator<Item = (&Event, &Stmt)> {
        self.body.iter().filter_map(|item| match item {
            Item::Always { event, stmt } => Some((event, stmt)),
            Item::Decl { .. } => None,
        })
    }

    pub fn decl_count(&self) -> usize {
        self.body
            .iter()
            .filter(|item| matches!(item, Item::Decl { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_classes() {
        assert!(BinOp::LtU.is_comparison());
        assert!(!BinOp::LtU.is_signed());
        assert!(BinOp::Lt.is_signed());
        assert!(!BinOp::Add.is_comparison());
        assert!(BinOp::Shr.is_signed() && !BinOp::ShrU.is_signed());
    }

    #[test]
    fn test_node_literal_width() {
        assert_eq!(Expr::node(Node(5), 8), Expr::Lit(Value::new(8, 5)));
    }
}
