// translate.rs - CFG operations to hardware expressions
//
// Pure mapping from an operation (immediates included) and its argument
// registers to an expression tree. Anything the datapath cannot express in a
// single cycle is rejected by name rather than approximated.

use crate::error::{GenError, GenResult};
use crate::rtl::{Addressing, Comparison, Condition, Operation, Reg};
use crate::verilog::{BinOp, Expr, UnOp};

fn bop(op: BinOp, r1: Reg, r2: Reg) -> Expr {
    Expr::binop(op, Expr::var(r1), Expr::var(r2))
}

fn boplit(op: BinOp, r: Reg, n: i32) -> Expr {
    Expr::binop(op, Expr::var(r), Expr::int(n))
}

fn arity(op: &'static str, args: &[Reg], expected: usize) -> GenResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(GenError::ArityMismatch {
            op,
            expected,
            found: args.len(),
        })
    }
}

fn unsupported(op: &'static str, args: &[Reg]) -> GenError {
    GenError::UnsupportedOperator {
        op,
        arity: args.len(),
    }
}

fn comparison(c: Comparison) -> BinOp {
    match c {
        Comparison::Eq => BinOp::Eq,
        Comparison::Ne => BinOp::Ne,
        Comparison::Lt => BinOp::Lt,
        Comparison::Le => BinOp::Le,
        Comparison::Gt => BinOp::Gt,
        Comparison::Ge => BinOp::Ge,
    }
}

fn comparison_unsigned(c: Comparison) -> BinOp {
    match c {
        Comparison::Eq => BinOp::Eq,
        Comparison::Ne => BinOp::Ne,
        Comparison::Lt => BinOp::LtU,
        Comparison::Le => BinOp::LeU,
        Comparison::Gt => BinOp::GtU,
        Comparison::Ge => BinOp::GeU,
    }
}

/// Number of argument registers a condition consumes, if supported
fn condition_arity(cond: &Condition) -> Option<usize> {
    match cond {
        Condition::Comp(_) | Condition::CompU(_) => Some(2),
        Condition::CompImm(..) | Condition::CompUImm(..) => Some(1),
        Condition::MaskZero(_) | Condition::MaskNotZero(_) => None,
    }
}

/// Translate a branch / compare condition to a 1-bit expression
pub fn translate_condition(cond: &Condition, args: &[Reg]) -> GenResult<Expr> {
    let name = cond.name();
    match cond {
        Condition::Comp(c) => {
            arity(name, args, 2)?;
            Ok(bop(comparison(*c), args[0], args[1]))
        }
        Condition::CompU(c) => {
            arity(name, args, 2)?;
            Ok(bop(comparison_unsigned(*c), args[0], args[1]))
        }
        Condition::CompImm(c, n) => {
            arity(name, args, 1)?;
            Ok(boplit(comparison(*c), args[0], *n))
        }
        Condition::CompUImm(c, n) => {
            arity(name, args, 1)?;
            Ok(boplit(comparison_unsigned(*c), args[0], *n))
        }
        Condition::MaskZero(_) | Condition::MaskNotZero(_) => Err(unsupported(name, args)),
    }
}

/// Translate an effective-address computation. Only register-relative forms
/// are supported; symbols and stack slots need memory.
pub fn translate_addressing(addr: &Addressing, args: &[Reg]) -> GenResult<Expr> {
    let name = addr.name();
    match addr {
        Addressing::Indexed(off) => {
            arity(name, args, 1)?;
            Ok(boplit(BinOp::Add, args[0], *off))
        }
        Addressing::Indexed2(off) => {
            arity(name, args, 2)?;
            Ok(Expr::binop(
                BinOp::Add,
                Expr::var(args[0]),
                boplit(BinOp::Add, args[1], *off),
            ))
        }
        Addressing::Scaled(scale, off) => {
            arity(name, args, 1)?;
            Ok(Expr::binop(
                BinOp::Add,
                boplit(BinOp::Mul, args[0], *scale),
                Expr::int(*off),
            ))
        }
        Addressing::Indexed2Scaled(scale, off) => {
            arity(name, args, 2)?;
            Ok(Expr::binop(
                BinOp::Add,
                Expr::var(args[0]),
                Expr::binop(
                    BinOp::Add,
                    boplit(BinOp::Mul, args[1], *scale),
                    Expr::int(*off),
                ),
            ))
        }
        Addressing::Global(..)
        | Addressing::Based(..)
        | Addressing::BasedScaled(..)
        | Addressing::Instack(_) => Err(unsupported(name, args)),
    }
}

/// Translate an operation applied to `args`
pub fn translate_op(op: &Operation, args: &[Reg]) -> GenResult<Expr> {
    let name = op.name();

    let binary = |bin: BinOp| -> GenResult<Expr> {
        arity(name, args, 2)?;
        Ok(bop(bin, args[0], args[1]))
    };
    let immediate = |bin: BinOp, n: i32| -> GenResult<Expr> {
        arity(name, args, 1)?;
        Ok(boplit(bin, args[0], n))
    };

    match op {
        // =====================================================================
        // Moves and constants
        // =====================================================================
        Operation::Move => {
            arity(name, args, 1)?;
            Ok(Expr::var(args[0]))
        }
        Operation::IntConst(n) => {
            arity(name, args, 0)?;
            Ok(Expr::int(*n))
        }

        // =====================================================================
        // Unary
        // =====================================================================
        Operation::Neg => {
            arity(name, args, 1)?;
            Ok(Expr::unop(UnOp::Neg, Expr::var(args[0])))
        }
        Operation::Not => {
            arity(name, args, 1)?;
            Ok(Expr::unop(UnOp::Not, Expr::var(args[0])))
        }

        // =====================================================================
        // Arithmetic (register-register)
        // =====================================================================
        Operation::Add => binary(BinOp::Add),
        Operation::Sub => binary(BinOp::Sub),
        Operation::Mul => binary(BinOp::Mul),
        Operation::Div => binary(BinOp::Div),
        Operation::DivU => binary(BinOp::DivU),
        Operation::Mod => binary(BinOp::Mod),
        Operation::ModU => binary(BinOp::ModU),
        Operation::And => binary(BinOp::And),
        Operation::Or => binary(BinOp::Or),
        Operation::Xor => binary(BinOp::Xor),
        Operation::Shl => binary(BinOp::Shl),
        Operation::Shr => binary(BinOp::Shr),
        Operation::ShrU => binary(BinOp::ShrU),

        // =====================================================================
        // Arithmetic (immediate)
        // =====================================================================
        Operation::AddImm(n) => immediate(BinOp::Add, *n),
        Operation::MulImm(n) => immediate(BinOp::Mul, *n),
        Operation::AndImm(n) => immediate(BinOp::And, *n),
        Operation::OrImm(n) => immediate(BinOp::Or, *n),
        Operation::XorImm(n) => immediate(BinOp::Xor, *n),
        Operation::ShlImm(n) => immediate(BinOp::Shl, *n),
        Operation::ShrImm(n) => immediate(BinOp::Shr, *n),
        Operation::ShrUImm(n) => immediate(BinOp::ShrU, *n),

        // =====================================================================
        // Comparisons, select, address arithmetic
        // =====================================================================
        Operation::Cmp(cond) => translate_condition(cond, args),
        Operation::Sel(cond) => {
            let Some(n) = condition_arity(cond) else {
                return Err(unsupported(cond.name(), args));
            };
            arity(name, args, n + 2)?;
            let test = translate_condition(cond, &args[2..])?;
            Ok(Expr::ternary(test, Expr::var(args[0]), Expr::var(args[1])))
        }
        Operation::Lea(addr) => translate_addressing(addr, args),

        // =====================================================================
        // Not expressible in one cycle of this datapath
        // =====================================================================
        Operation::MulHs
        | Operation::MulHu
        | Operation::ShrxImm(_)
        | Operation::RorImm(_)
        | Operation::ShldImm(_) => Err(unsupported(name, args)),
    }
}
