// assemble.rs - Package the builder's state into a module
//
// The module is a two-process FSM:
//
//   always @(posedge clk or posedge rst)
//     if (rst) state <= entry;
//     else case (state)
//       n: state <= succ;                 // Goto
//       m: state <= cond ? ifso : ifnot;  // Branch
//     endcase
//
//   always @(*)
//     case (state)
//       n: <datapath statement of n>
//     endcase
//
// A return state has a datapath arm but no transition arm, so the FSM parks
// there with the finish flag raised.

use crate::builder::{Accumulated, Transition};
use crate::config::GenConfig;
use crate::rtl::{Node, Reg};
use crate::verilog::{Event, Expr, Io, Item, Module, Stmt};
use std::collections::BTreeMap;

/// The six registers the module's interface is built around
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRegs {
    pub start: Reg,
    pub reset: Reg,
    pub clock: Reg,
    pub finish: Reg,
    pub ret: Reg,
    pub state: Reg,
}

impl ControlRegs {
    fn direction(&self, reg: Reg) -> Option<Io> {
        if reg == self.clock || reg == self.reset || reg == self.start {
            Some(Io::Input)
        } else if reg == self.finish || reg == self.ret {
            Some(Io::Output)
        } else {
            None
        }
    }
}

fn width(decls: &BTreeMap<Reg, u32>, reg: Reg, default: u32) -> u32 {
    decls.get(&reg).copied().unwrap_or(default)
}

/// Build the module from the accumulated state
pub fn assemble(
    acc: Accumulated,
    ctrl: &ControlRegs,
    params: &[Reg],
    entry: Node,
    config: &GenConfig,
) -> Module {
    let Accumulated {
        statements,
        transitions,
        declarations,
    } = acc;

    let state_width = width(&declarations, ctrl.state, config.state_width);
    let mut body = Vec::with_capacity(declarations.len() + params.len() + 2);

    // ==========================================================================
    // Declarations
    // ==========================================================================
    for (&reg, &w) in &declarations {
        body.push(Item::Decl {
            reg,
            width: w,
            io: ctrl.direction(reg),
        });
    }

    // Arguments nobody writes are plain inputs; an argument that is also
    // written keeps its internal declaration.
    let mut args = Vec::with_capacity(params.len());
    for &param in params {
        let w = width(&declarations, param, config.data_width);
        if !declarations.contains_key(&param) {
            body.push(Item::Decl {
                reg: param,
                width: w,
                io: Some(Io::Input),
            });
        }
        args.push((param, w));
    }

    // ==========================================================================
    // Transition process
    // ==========================================================================
    let state_lit = |n: Node| Expr::node(n, state_width);
    let trans_arms: Vec<(Expr, Stmt)> = transitions
        .into_iter()
        .map(|(node, trans)| {
            let next = match trans {
                Transition::Goto(target) => state_lit(target),
                Transition::Branch { cond, ifso, ifnot } => {
                    Expr::ternary(cond, state_lit(ifso), state_lit(ifnot))
                }
            };
            (state_lit(node), Stmt::NonBlocking(ctrl.state, next))
        })
        .collect();

    body.push(Item::Always {
        event: Event::Or(
            Box::new(Event::PosEdge(ctrl.clock)),
            Box::new(Event::PosEdge(ctrl.reset)),
        ),
        stmt: Stmt::cond(
            Expr::var(ctrl.reset),
            Stmt::NonBlocking(ctrl.state, state_lit(entry)),
            Stmt::Case(Expr::var(ctrl.state), trans_arms, None),
        ),
    });

    // ==========================================================================
    // Statement process
    // ==========================================================================
    let stmt_arms: Vec<(Expr, Stmt)> = statements
        .into_iter()
        .map(|(node, stmt)| (state_lit(node), stmt))
        .collect();

    body.push(Item::Always {
        event: Event::Star,
        stmt: Stmt::Case(Expr::var(ctrl.state), stmt_arms, None),
    });

    let pair = |reg: Reg, default: u32| (reg, width(&declarations, reg, default));
    Module {
        start: pair(ctrl.start, 1),
        reset: pair(ctrl.reset, 1),
        clock: pair(ctrl.clock, 1),
        finish: pair(ctrl.finish, 1),
        ret: pair(ctrl.ret, config.data_width),
        state: (ctrl.state, state_width),
        args,
        entry,
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::verilog::BinOp;

    fn ctrl(b: &mut Builder) -> ControlRegs {
        ControlRegs {
            finish: b.allocate_register(1).unwrap(),
            ret: b.allocate_register(32).unwrap(),
            start: b.allocate_register(1).unwrap(),
            reset: b.allocate_register(1).unwrap(),
            clock: b.allocate_register(1).unwrap(),
            state: b.allocate_register(32).unwrap(),
        }
    }

    #[test]
    fn test_two_processes() {
        let mut b = Builder::new(Reg(10), Node(10));
        let c = ctrl(&mut b);
        b.add_transition(Node(1), Node(2), Stmt::Skip).unwrap();
        let cond = Expr::binop(BinOp::Eq, Expr::var(Reg(1)), Expr::int(0));
        b.add_conditional(Node(2), cond.clone(), Node(1), Node(3)).unwrap();
        b.add_terminal(Node(3), Stmt::Skip).unwrap();

        let m = assemble(b.into_parts(), &c, &[Reg(1)], Node(1), &GenConfig::default());
        let procs: Vec<_> = m.processes().collect();
        assert_eq!(procs.len(), 2);

        let (event, trans) = procs[0];
        assert!(matches!(event, Event::Or(..)));
        let Stmt::Cond(Expr::Var(rst), on_reset, dispatch) = trans else {
            panic!("transition process must test reset first");
        };
        assert_eq!(*rst, c.reset);
        assert_eq!(
            **on_reset,
            Stmt::NonBlocking(c.state, Expr::node(Node(1), 32))
        );
        let Stmt::Case(_, arms, None) = &**dispatch else {
            panic!("expected a case without default");
        };
        assert_eq!(arms.len(), 2);
        assert_eq!(
            arms[1].1,
            Stmt::NonBlocking(
                c.state,
                Expr::ternary(cond, Expr::node(Node(1), 32), Expr::node(Node(3), 32))
            )
        );

        let (event, datapath) = procs[1];
        assert_eq!(*event, Event::Star);
        let Stmt::Case(_, arms, None) = datapath else {
            panic!("expected a case without default");
        };
        let keys: Vec<_> = arms.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(
            keys,
            vec![
                Expr::node(Node(1), 32),
                Expr::node(Node(2), 32),
                Expr::node(Node(3), 32)
            ]
        );
    }

    #[test]
    fn test_declarations_and_ports() {
        let mut b = Builder::new(Reg(10), Node(10));
        let c = ctrl(&mut b);
        b.declare_register(Reg(3), 32).unwrap();

        let m = assemble(
            b.into_parts(),
            &c,
            &[Reg(1), Reg(2)],
            Node(1),
            &GenConfig::default(),
        );
        // six control registers, one datapath register, two arguments
        assert_eq!(m.decl_count(), 9);
        assert_eq!(m.args, vec![(Reg(1), 32), (Reg(2), 32)]);
        assert_eq!(m.finish, (c.finish, 1));
        assert_eq!(m.state, (c.state, 32));

        let io_of = |reg: Reg| {
            m.body.iter().find_map(|item| match item {
                Item::Decl { reg: r, io, .. } if *r == reg => Some(*io),
                _ => None,
            })
        };
        assert_eq!(io_of(c.clock), Some(Some(Io::Input)));
        assert_eq!(io_of(c.ret), Some(Some(Io::Output)));
        assert_eq!(io_of(c.state), Some(None));
        assert_eq!(io_of(Reg(1)), Some(Some(Io::Input)));
        assert_eq!(io_of(Reg(3)), Some(None));
    }
}
