// builder.rs - Compiler state accumulated while lowering a function
//
// The builder has exactly one owner, the driver's fold over the CFG. Each
// node contributes at most one datapath statement and at most one control
// transition; fresh register and node ids are handed out from counters that
// only ever move forward.

use crate::error::{GenError, GenResult};
use crate::rtl::{Function, Instr, Node, Reg};
use crate::translate::{translate_condition, translate_op};
use crate::value::{valid_width, Value};
use crate::verilog::{Expr, Stmt};
use log::trace;
use std::collections::BTreeMap;

/// Outgoing control edge of one state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Goto(Node),
    Branch { cond: Expr, ifso: Node, ifnot: Node },
}

/// Per-state statements and transitions plus register declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Builder {
    fresh_reg: u32,
    fresh_node: u32,
    statements: BTreeMap<Node, Stmt>,
    transitions: BTreeMap<Node, Transition>,
    declarations: BTreeMap<Reg, u32>,
}

/// What the assembler consumes once the fold is done
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accumulated {
    pub statements: BTreeMap<Node, Stmt>,
    pub transitions: BTreeMap<Node, Transition>,
    pub declarations: BTreeMap<Reg, u32>,
}

impl Builder {
    pub fn new(fresh_reg: Reg, fresh_node: Node) -> Self {
        Builder {
            fresh_reg: fresh_reg.0,
            fresh_node: fresh_node.0,
            statements: BTreeMap::new(),
            transitions: BTreeMap::new(),
            declarations: BTreeMap::new(),
        }
    }

    /// Seed the counters past every id `func` already uses
    pub fn for_function(func: &Function) -> GenResult<Self> {
        let reg = next_id(func.max_reg(), GenError::RegisterOverflow)?;
        let node = next_id(func.max_node(), GenError::NodeOverflow)?;
        Ok(Builder::new(Reg(reg), Node(node)))
    }

    pub fn fresh_reg(&self) -> Reg {
        Reg(self.fresh_reg)
    }

    pub fn fresh_node(&self) -> Node {
        Node(self.fresh_node)
    }

    pub fn statements(&self) -> &BTreeMap<Node, Stmt> {
        &self.statements
    }

    pub fn transitions(&self) -> &BTreeMap<Node, Transition> {
        &self.transitions
    }

    pub fn declarations(&self) -> &BTreeMap<Reg, u32> {
        &self.declarations
    }

    /// Hand out a new register of `width` bits
    pub fn allocate_register(&mut self, width: u32) -> GenResult<Reg> {
        if !valid_width(width) {
            return Err(GenError::InvalidWidth(width));
        }
        let reg = Reg(self.fresh_reg);
        self.fresh_reg = next_id(self.fresh_reg, GenError::RegisterOverflow)?;
        self.declarations.insert(reg, width);
        trace!("allocated {} ({} bits)", reg, width);
        Ok(reg)
    }

    /// Record the width of an existing register. Redeclaring with the same
    /// width is allowed; changing it is not.
    pub fn declare_register(&mut self, reg: Reg, width: u32) -> GenResult<()> {
        if !valid_width(width) {
            return Err(GenError::InvalidWidth(width));
        }
        let past = next_id(reg.0, GenError::RegisterOverflow)?;
        match self.declarations.get(&reg) {
            Some(&old) if old != width => {
                return Err(GenError::WidthConflict {
                    reg,
                    old,
                    new: width,
                })
            }
            Some(_) => {}
            None => {
                self.declarations.insert(reg, width);
            }
        }
        self.fresh_reg = self.fresh_reg.max(past);
        Ok(())
    }

    fn check_free(&self, node: Node) -> GenResult<()> {
        if self.statements.contains_key(&node) || self.transitions.contains_key(&node) {
            return Err(GenError::DuplicateNode(node));
        }
        Ok(())
    }

    fn bump_node(&mut self, target: Node) -> GenResult<()> {
        let past = next_id(target.0, GenError::NodeOverflow)?;
        self.fresh_node = self.fresh_node.max(past);
        Ok(())
    }

    /// `node` runs `stmt` and then moves to `successor`
    pub fn add_transition(&mut self, node: Node, successor: Node, stmt: Stmt) -> GenResult<()> {
        self.check_free(node)?;
        self.bump_node(successor)?;
        self.statements.insert(node, stmt);
        self.transitions.insert(node, Transition::Goto(successor));
        Ok(())
    }

    /// `node` moves to `ifso` or `ifnot` depending on `cond`. Its datapath
    /// arm is empty, so the state still shows up in both processes.
    pub fn add_conditional(
        &mut self,
        node: Node,
        cond: Expr,
        ifso: Node,
        ifnot: Node,
    ) -> GenResult<()> {
        self.check_free(node)?;
        self.bump_node(ifso)?;
        self.bump_node(ifnot)?;
        self.statements.insert(node, Stmt::Skip);
        self.transitions
            .insert(node, Transition::Branch { cond, ifso, ifnot });
        Ok(())
    }

    /// Declare `reg` and register `node` as writing it before moving on
    pub fn add_instruction_with_register(
        &mut self,
        reg: Reg,
        width: u32,
        node: Node,
        successor: Node,
        stmt: Stmt,
    ) -> GenResult<()> {
        self.check_free(node)?;
        self.declare_register(reg, width)?;
        self.add_transition(node, successor, stmt)
    }

    /// A state with a statement and no outgoing transition. The FSM stays in
    /// it once entered.
    pub fn add_terminal(&mut self, node: Node, stmt: Stmt) -> GenResult<()> {
        self.check_free(node)?;
        self.statements.insert(node, stmt);
        Ok(())
    }

    /// Declare every register `func` mentions that is neither a parameter
    /// nor already declared, so the module never reads an undeclared name.
    pub fn declare_operands(&mut self, func: &Function, width: u32) -> GenResult<()> {
        for instr in func.code.values() {
            for reg in instr.registers() {
                if !func.params.contains(&reg) && !self.declarations.contains_key(&reg) {
                    self.declare_register(reg, width)?;
                }
            }
        }
        Ok(())
    }

    /// Lower one CFG node. `fin` and `ret` are the finish flag and return
    /// registers; `data_width` is the width of every datapath register.
    pub fn transl_instr(
        &mut self,
        fin: Reg,
        ret: Reg,
        data_width: u32,
        node: Node,
        instr: &Instr,
    ) -> GenResult<()> {
        trace!("node {}: {}", node, instr.kind());
        match instr {
            Instr::Nop(next) => self.add_transition(node, *next, Stmt::Skip),
            Instr::Op {
                op,
                args,
                dst,
                next,
            } => {
                let expr = translate_op(op, args)?;
                let stmt = Stmt::Blocking(*dst, expr);
                self.add_instruction_with_register(*dst, data_width, node, *next, stmt)
            }
            Instr::Cond {
                cond,
                args,
                ifso,
                ifnot,
            } => {
                let expr = translate_condition(cond, args)?;
                self.add_conditional(node, expr, *ifso, *ifnot)
            }
            Instr::Return(value) => {
                let raise = Stmt::Blocking(fin, Expr::Lit(Value::from_bool(true)));
                let stmt = match value {
                    Some(r) => Stmt::seq(raise, Stmt::Blocking(ret, Expr::var(*r))),
                    None => raise,
                };
                self.add_terminal(node, stmt)
            }
            Instr::Load { .. }
            | Instr::Store { .. }
            | Instr::Call { .. }
            | Instr::TailCall { .. }
            | Instr::Builtin { .. }
            | Instr::JumpTable { .. } => Err(GenError::UnsupportedInstruction(instr.kind())),
        }
    }

    pub fn into_parts(self) -> Accumulated {
        Accumulated {
            statements: self.statements,
            transitions: self.transitions,
            declarations: self.declarations,
        }
    }
}

fn next_id(id: u32, overflow: GenError) -> GenResult<u32> {
    id.checked_add(1).ok_or(overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtl::{Addressing, Comparison, Condition, Operation};
    use crate::verilog::BinOp;

    fn builder() -> Builder {
        Builder::new(Reg(10), Node(10))
    }

    #[test]
    fn test_allocate_register() {
        let mut b = builder();
        let r = b.allocate_register(32).unwrap();
        assert_eq!(r, Reg(10));
        assert_eq!(b.fresh_reg(), Reg(11));
        assert_eq!(b.declarations().get(&r), Some(&32));
        assert_eq!(b.allocate_register(0), Err(GenError::InvalidWidth(0)));
        assert_eq!(b.fresh_reg(), Reg(11));
    }

    #[test]
    fn test_add_transition_advances_node_counter() {
        let mut b = builder();
        b.add_transition(Node(1), Node(20), Stmt::Skip).unwrap();
        assert_eq!(b.fresh_node(), Node(21));
        assert_eq!(b.transitions().get(&Node(1)), Some(&Transition::Goto(Node(20))));
        assert_eq!(b.statements().get(&Node(1)), Some(&Stmt::Skip));

        // A lower successor never moves the counter back
        b.add_transition(Node(2), Node(3), Stmt::Skip).unwrap();
        assert_eq!(b.fresh_node(), Node(21));
    }

    #[test]
    fn test_conditional_has_empty_statement() {
        let mut b = builder();
        let cond = Expr::binop(BinOp::Lt, Expr::var(Reg(1)), Expr::int(10));
        b.add_conditional(Node(1), cond, Node(2), Node(3)).unwrap();
        assert_eq!(b.statements().get(&Node(1)), Some(&Stmt::Skip));
        assert_eq!(b.fresh_node(), Node(10));
        assert!(matches!(
            b.transitions().get(&Node(1)),
            Some(Transition::Branch {
                ifso: Node(2),
                ifnot: Node(3),
                ..
            })
        ));
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut b = builder();
        b.add_transition(Node(1), Node(2), Stmt::Skip).unwrap();
        assert_eq!(
            b.add_terminal(Node(1), Stmt::Skip),
            Err(GenError::DuplicateNode(Node(1)))
        );
    }

    #[test]
    fn test_width_never_changes() {
        let mut b = builder();
        b.declare_register(Reg(3), 32).unwrap();
        b.declare_register(Reg(3), 32).unwrap();
        assert_eq!(
            b.declare_register(Reg(3), 8),
            Err(GenError::WidthConflict {
                reg: Reg(3),
                old: 32,
                new: 8
            })
        );
        assert_eq!(b.declarations().get(&Reg(3)), Some(&32));
    }

    #[test]
    fn test_counters_are_monotonic() {
        let mut b = builder();
        let mut issued = Vec::new();
        let mut last = (b.fresh_reg(), b.fresh_node());

        for i in 0..20u32 {
            match i % 4 {
                0 => issued.push(b.allocate_register(1 + i % 32).unwrap()),
                1 => b.add_transition(Node(i), Node(i / 2), Stmt::Skip).unwrap(),
                2 => b.declare_register(Reg(100 + i), 32).unwrap(),
                _ => b
                    .add_conditional(Node(i), Expr::int(1), Node(i + 30), Node(1))
                    .unwrap(),
            }
            let now = (b.fresh_reg(), b.fresh_node());
            assert!(now.0 >= last.0 && now.1 >= last.1);
            last = now;
        }

        let mut unique = issued.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), issued.len());
    }

    #[test]
    fn test_transl_op_declares_destination() {
        let mut b = builder();
        let instr = Instr::Op {
            op: Operation::Add,
            args: vec![Reg(1), Reg(2)],
            dst: Reg(3),
            next: Node(2),
        };
        b.transl_instr(Reg(10), Reg(11), 32, Node(1), &instr).unwrap();
        assert_eq!(b.declarations().get(&Reg(3)), Some(&32));
        assert_eq!(
            b.statements().get(&Node(1)),
            Some(&Stmt::Blocking(
                Reg(3),
                Expr::binop(BinOp::Add, Expr::var(Reg(1)), Expr::var(Reg(2)))
            ))
        );
    }

    #[test]
    fn test_transl_cond() {
        let mut b = builder();
        let instr = Instr::Cond {
            cond: Condition::CompImm(Comparison::Lt, 10),
            args: vec![Reg(1)],
            ifso: Node(2),
            ifnot: Node(3),
        };
        b.transl_instr(Reg(10), Reg(11), 32, Node(1), &instr).unwrap();
        assert_eq!(b.statements().get(&Node(1)), Some(&Stmt::Skip));
        assert_eq!(b.transitions().len(), 1);
    }

    #[test]
    fn test_transl_return() {
        let mut b = builder();
        b.transl_instr(Reg(10), Reg(11), 32, Node(5), &Instr::Return(Some(Reg(3))))
            .unwrap();
        let expected = Stmt::seq(
            Stmt::Blocking(Reg(10), Expr::Lit(Value::from_bool(true))),
            Stmt::Blocking(Reg(11), Expr::var(Reg(3))),
        );
        assert_eq!(b.statements().get(&Node(5)), Some(&expected));
        assert!(b.transitions().get(&Node(5)).is_none());

        b.transl_instr(Reg(10), Reg(11), 32, Node(6), &Instr::Return(None))
            .unwrap();
        assert_eq!(
            b.statements().get(&Node(6)),
            Some(&Stmt::Blocking(Reg(10), Expr::Lit(Value::from_bool(true))))
        );
    }

    #[test]
    fn test_transl_rejects_memory_and_calls() {
        let mut b = builder();
        let load = Instr::Load {
            addr: Addressing::Indexed(0),
            args: vec![Reg(1)],
            dst: Reg(2),
            next: Node(2),
        };
        assert_eq!(
            b.transl_instr(Reg(10), Reg(11), 32, Node(1), &load),
            Err(GenError::UnsupportedInstruction("Iload"))
        );
        let jt = Instr::JumpTable {
            arg: Reg(1),
            targets: vec![Node(2)],
        };
        assert_eq!(
            b.transl_instr(Reg(10), Reg(11), 32, Node(1), &jt),
            Err(GenError::UnsupportedInstruction("Ijumptable"))
        );
        assert!(b.statements().is_empty() && b.transitions().is_empty());
    }

    #[test]
    fn test_id_overflow_is_an_error() {
        let mut code = BTreeMap::new();
        code.insert(Node(1), Instr::Return(Some(Reg(u32::MAX))));
        let func = Function {
            params: Vec::new(),
            code,
            entry: Node(1),
        };
        assert_eq!(Builder::for_function(&func), Err(GenError::RegisterOverflow));

        let mut b = builder();
        assert_eq!(
            b.declare_register(Reg(u32::MAX), 32),
            Err(GenError::RegisterOverflow)
        );
        assert_eq!(
            b.add_transition(Node(1), Node(u32::MAX), Stmt::Skip),
            Err(GenError::NodeOverflow)
        );
        assert!(b.transitions().is_empty());

        let mut b = Builder::new(Reg(u32::MAX), Node(1));
        assert_eq!(b.allocate_register(1), Err(GenError::RegisterOverflow));
        assert!(b.declarations().is_empty());
    }

    #[test]
    fn test_declare_operands_skips_params() {
        let mut code = BTreeMap::new();
        code.insert(
            Node(1),
            Instr::Op {
                op: Operation::Add,
                args: vec![Reg(1), Reg(2)],
                dst: Reg(3),
                next: Node(2),
            },
        );
        code.insert(Node(2), Instr::Return(Some(Reg(3))));
        let func = Function {
            params: vec![Reg(1)],
            code,
            entry: Node(1),
        };
        let mut b = Builder::for_function(&func).unwrap();
        b.declare_operands(&func, 16).unwrap();
        let declared: Vec<_> = b.declarations().keys().copied().collect();
        assert_eq!(declared, vec![Reg(2), Reg(3)]);
        assert_eq!(b.declarations().get(&Reg(2)), Some(&16));
    }
}
