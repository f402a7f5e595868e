// rtl.rs - Register-transfer CFG input
//
// The front-end hands us one function per CFG: a table from node to a single
// instruction. Every instruction names its successors explicitly, so the
// table is the whole control-flow graph.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A control point in the CFG (and, after translation, a state of the FSM)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Node(pub u32);

/// A pseudo-register (and, after translation, a hardware register)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reg(pub u32);

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reg_{}", self.0)
    }
}

/// Comparison operator shared by signed and unsigned conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Branch / compare conditions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    /// Signed register-register comparison
    Comp(Comparison),
    /// Unsigned register-register comparison
    CompU(Comparison),
    /// Signed comparison against an immediate
    CompImm(Comparison, i32),
    /// Unsigned comparison against an immediate
    CompUImm(Comparison, i32),
    /// `(r & mask) == 0`
    MaskZero(i32),
    /// `(r & mask) != 0`
    MaskNotZero(i32),
}

/// Addressing modes, as produced for `lea`-style operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Addressing {
    /// `r1 + offset`
    Indexed(i32),
    /// `r1 + r2 + offset`
    Indexed2(i32),
    /// `r1 * scale + offset`
    Scaled(i32, i32),
    /// `r1 + r2 * scale + offset`
    Indexed2Scaled(i32, i32),
    /// Address of a global symbol plus offset
    Global(String, i32),
    /// `symbol + r1 + offset`
    Based(String, i32),
    /// `symbol + r1 * scale + offset`
    BasedScaled(i32, String, i32),
    /// Stack slot address
    Instack(i32),
}

/// Operations computing a value into a destination register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Move,
    IntConst(i32),
    Neg,
    Not,
    Add,
    AddImm(i32),
    Sub,
    Mul,
    MulImm(i32),
    /// High half of a signed multiply
    MulHs,
    /// High half of an unsigned multiply
    MulHu,
    Div,
    DivU,
    Mod,
    ModU,
    And,
    AndImm(i32),
    Or,
    OrImm(i32),
    Xor,
    XorImm(i32),
    Shl,
    ShlImm(i32),
    Shr,
    ShrImm(i32),
    /// Signed shift right rounding towards zero
    ShrxImm(i32),
    ShrU,
    ShrUImm(i32),
    /// Rotate right by an immediate
    RorImm(i32),
    /// Funnel shift left by an immediate
    ShldImm(i32),
    Cmp(Condition),
    /// `cond(args[2..]) ? args[0] : args[1]`
    Sel(Condition),
    Lea(Addressing),
}

/// One CFG node's instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instr {
    Nop(Node),
    Op {
        op: Operation,
        args: Vec<Reg>,
        dst: Reg,
        next: Node,
    },
    Load {
        addr: Addressing,
        args: Vec<Reg>,
        dst: Reg,
        next: Node,
    },
    Store {
        addr: Addressing,
        args: Vec<Reg>,
        src: Reg,
        next: Node,
    },
    Call {
        func: String,
        args: Vec<Reg>,
        dst: Reg,
        next: Node,
    },
    TailCall {
        func: String,
        args: Vec<Reg>,
    },
    Builtin {
        name: String,
        args: Vec<Reg>,
        dst: Option<Reg>,
        next: Node,
    },
    Cond {
        cond: Condition,
        args: Vec<Reg>,
        ifso: Node,
        ifnot: Node,
    },
    JumpTable {
        arg: Reg,
        targets: Vec<Node>,
    },
    Return(Option<Reg>),
}

impl Comparison {
    pub fn name(&self) -> &'static str {
        match self {
            Comparison::Eq => "Ceq",
            Comparison::Ne => "Cne",
            Comparison::Lt => "Clt",
            Comparison::Le => "Cle",
            Comparison::Gt => "Cgt",
            Comparison::Ge => "Cge",
        }
    }
}

impl Condition {
    pub fn name(&self) -> &'static str {
        match self {
            Condition::Comp(_) => "Ccomp",
            Condition::CompU(_) => "Ccompu",
            Condition::CompImm(..) => "Ccompimm",
            Condition::CompUImm(..) => "Ccompuimm",
            Condition::MaskZero(_) => "Cmaskzero",
            Condition::MaskNotZero(_) => "Cmasknotzero",
        }
    }
}

impl Addressing {
    pub fn name(&self) -> &'static str {
        match self {
            Addressing::Indexed(_) => "Aindexed",
            Addressing::Indexed2(_) => "Aindexed2",
            Addressing::Scaled(..) => "Ascaled",
            Addressing::Indexed2Scaled(..) => "Aindexed2scaled",
            Addressing::Global(..) => "Aglobal",
            Addressing::Based(..) => "Abased",
            Addressing::BasedScaled(..) => "Abasedscaled",
            Addressing::Instack(_) => "Ainstack",
        }
    }
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Move => "Omove",
            Operation::IntConst(_) => "Ointconst",
            Operation::Neg => "Oneg",
            Operation::Not => "Onot",
            Operation::Add => "Oadd",
            Operation::AddImm(_) => "Oaddimm",
            Operation::Sub => "Osub",
            Operation::Mul => "Omul",
            Operation::MulImm(_) => "Omulimm",
            Operation::MulHs => "Omulhs",
            Operation::MulHu => "Omulhu",
            Operation::Div => "Odiv",
            Operation::DivU => "Odivu",
            Operation::Mod => "Omod",
            Operation::ModU => "Omodu",
            Operation::And => "Oand",
            Operation::AndImm(_) => "Oandimm",
            Operation::Or => "Oor",
            Operation::OrImm(_) => "Oorimm",
            Operation::Xor => "Oxor",
            Operation::XorImm(_) => "Oxorimm",
            Operation::Shl => "Oshl",
            Operation::ShlImm(_) => "Oshlimm",
            Operation::Shr => "Oshr",
            Operation::ShrImm(_) => "Oshrimm",
            Operation::ShrxImm(_) => "Oshrximm",
            Operation::ShrU => "Oshru",
            Operation::ShrUImm(_) => "Oshruimm",
            Operation::RorImm(_) => "Ororimm",
            Operation::ShldImm(_) => "Oshldimm",
            Operation::Cmp(_) => "Ocmp",
            Operation::Sel(_) => "Osel",
            Operation::Lea(_) => "Olea",
        }
    }
}

impl Instr {
    /// Instruction class name, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Instr::Nop(_) => "Inop",
            Instr::Op { .. } => "Iop",
            Instr::Load { .. } => "Iload",
            Instr::Store { .. } => "Istore",
            Instr::Call { .. } => "Icall",
            Instr::TailCall { .. } => "Itailcall",
            Instr::Builtin { .. } => "Ibuiltin",
            Instr::Cond { .. } => "Icond",
            Instr::JumpTable { .. } => "Ijumptable",
            Instr::Return(_) => "Ireturn",
        }
    }

    /// Successor nodes, in branch order
    pub fn successors(&self) -> Vec<Node> {
        match self {
            Instr::Nop(next)
            | Instr::Op { next, .. }
            | Instr::Load { next, .. }
            | Instr::Store { next, .. }
            | Instr::Call { next, .. }
            | Instr::Builtin { next, .. } => vec![*next],
            Instr::Cond { ifso, ifnot, .. } => vec![*ifso, *ifnot],
            Instr::JumpTable { targets, .. } => targets.clone(),
            Instr::TailCall { .. } | Instr::Return(_) => Vec::new(),
        }
    }

    /// Every register the instruction reads or writes
    pub fn registers(&self) -> Vec<Reg> {
        match self {
            Instr::Nop(_) => Vec::new(),
            Instr::Op { args, dst, .. }
            | Instr::Load { args, dst, .. }
            | Instr::Call { args, dst, .. } => {
                let mut regs = args.clone();
                regs.push(*dst);
                regs
            }
            Instr::Store { args, src, .. } => {
                let mut regs = args.clone();
                regs.push(*src);
                regs
            }
            Instr::TailCall { args, .. } | Instr::Cond { args, .. } => args.clone(),
            Instr::Builtin { args, dst, .. } => {
                let mut regs = args.clone();
                regs.extend(dst.iter().copied());
                regs
            }
            Instr::JumpTable { arg, .. } => vec![*arg],
            Instr::Return(r) => r.iter().copied().collect(),
        }
    }
}

/// A function in CFG form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// Parameter registers, in calling order
    pub params: Vec<Reg>,
    /// Instruction at each node
    pub code: BTreeMap<Node, Instr>,
    /// Entry node
    pub entry: Node,
}

impl Function {
    /// Largest register id mentioned anywhere in the function (0 if none)
    pub fn max_reg(&self) -> u32 {
        let from_code = self
            .code
            .values()
            .flat_map(|instr| instr.registers())
            .map(|r| r.0);
        let from_params = self.params.iter().map(|r| r.0);
        from_code.chain(from_params).max().unwrap_or(0)
    }

    /// Largest node id mentioned anywhere in the function (0 if none)
    pub fn max_node(&self) -> u32 {
        let keys = self.code.keys().map(|n| n.0);
        let succs = self
            .code
            .values()
            .flat_map(|instr| instr.successors())
            .map(|n| n.0);
        keys.chain(succs)
            .chain(std::iter::once(self.entry.0))
            .max()
            .unwrap_or(0)
    }
}

/// A whole program: named functions plus the name of the one to synthesize
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub functions: BTreeMap<String, Function>,
    pub main: String,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_cover_params_and_successors() {
        let mut code = BTreeMap::new();
        code.insert(
            Node(1),
            Instr::Op {
                op: Operation::Add,
                args: vec![Reg(1), Reg(2)],
                dst: Reg(3),
                next: Node(7),
            },
        );
        code.insert(Node(7), Instr::Return(Some(Reg(3))));
        let func = Function {
            params: vec![Reg(1), Reg(9)],
            code,
            entry: Node(1),
        };

        assert_eq!(func.max_reg(), 9);
        assert_eq!(func.max_node(), 7);
    }

    #[test]
    fn test_empty_function_bounds() {
        let func = Function {
            params: Vec::new(),
            code: BTreeMap::new(),
            entry: Node(1),
        };
        assert_eq!(func.max_reg(), 0);
        assert_eq!(func.max_node(), 1);
    }

    #[test]
    fn test_instruction_kinds() {
        let load = Instr::Load {
            addr: Addressing::Indexed(0),
            args: vec![Reg(1)],
            dst: Reg(2),
            next: Node(2),
        };
        assert_eq!(load.kind(), "Iload");
        assert_eq!(load.successors(), vec![Node(2)]);
        assert_eq!(Instr::Return(None).kind(), "Ireturn");
        assert!(Instr::Return(None).successors().is_empty());
    }
}
