// eval.rs - Execution semantics of the hardware IR
//
// Statements run against two association stores:
//
// - the blocking store: writes are visible to every later statement of the
//   same cycle, and every read resolves here;
// - the non-blocking store: writes are buffered and only become visible
//   after the end-of-cycle merge.
//
// A module step runs every always-process in body order against one pair of
// stores and then merges once. Non-blocking writes win the merge, and among
// several non-blocking writes to the same register in one cycle the last one
// in evaluation order wins.

use crate::config::SimConfig;
use crate::error::EvalError;
use crate::rtl::Reg;
use crate::value::Value;
use crate::verilog::{BinOp, Expr, Item, Module, Stmt, UnOp};
use log::{debug, trace};
use std::collections::BTreeMap;

/// Register contents
pub type Assoc = BTreeMap<Reg, Value>;

/// Width assumed for registers nobody declared
pub const DEFAULT_WIDTH: u32 = 32;

/// The two stores threaded through one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stores {
    pub blocking: Assoc,
    pub nonblocking: Assoc,
}

impl Stores {
    /// Start of a cycle: the merged state becomes the blocking store
    pub fn new(blocking: Assoc) -> Self {
        Stores {
            blocking,
            nonblocking: Assoc::new(),
        }
    }
}

/// Everything an evaluation reads besides the stores: the sampled external
/// inputs and the declared register widths.
#[derive(Debug, Clone, Default)]
pub struct Env {
    inputs: Assoc,
    widths: BTreeMap<Reg, u32>,
}

impl Env {
    pub fn new() -> Self {
        Env::default()
    }

    /// Widths taken from the module's declarations
    pub fn from_module(module: &Module) -> Self {
        let widths = module
            .body
            .iter()
            .filter_map(|item| match item {
                Item::Decl { reg, width, .. } => Some((*reg, *width)),
                Item::Always { .. } => None,
            })
            .collect();
        Env {
            inputs: Assoc::new(),
            widths,
        }
    }

    pub fn with_inputs(mut self, inputs: Assoc) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn declare(&mut self, reg: Reg, width: u32) {
        self.widths.insert(reg, width);
    }

    pub fn width_of(&self, reg: Reg) -> u32 {
        self.widths.get(&reg).copied().unwrap_or(DEFAULT_WIDTH)
    }

    /// Read-before-write yields zero of the register's width
    fn read(&self, store: &Assoc, reg: Reg) -> Value {
        store
            .get(&reg)
            .copied()
            .unwrap_or_else(|| Value::zero(self.width_of(reg)))
    }

    /// Truncate or zero-extend to the register's declared width
    fn fit(&self, reg: Reg, value: Value) -> Value {
        match self.widths.get(&reg) {
            Some(&w) => value.zext(w),
            None => value,
        }
    }
}

fn eval_shift(op: BinOp, lhs: Value, amount: u64) -> Value {
    let w = lhs.width();
    let out_of_range = amount >= w as u64;
    let bits = match op {
        BinOp::Shl if out_of_range => 0,
        BinOp::Shl => lhs.bits() << amount,
        BinOp::ShrU if out_of_range => 0,
        BinOp::ShrU => lhs.bits() >> amount,
        BinOp::Shr if out_of_range => {
            if lhs.signed() < 0 {
                u64::MAX
            } else {
                0
            }
        }
        BinOp::Shr => (lhs.signed() >> amount) as u64,
        _ => unreachable!("not a shift: {:?}", op),
    };
    Value::new(w, bits)
}

/// Apply a binary operator. Operands are extended to the wider of the two
/// widths (sign-extended for signed operators); comparisons yield one bit,
/// shifts keep the width of their left operand. Division and remainder by
/// zero yield zero.
pub fn eval_binop(op: BinOp, lhs: Value, rhs: Value) -> Value {
    if matches!(op, BinOp::Shl | BinOp::Shr | BinOp::ShrU) {
        return eval_shift(op, lhs, rhs.bits());
    }

    let w = lhs.width().max(rhs.width());
    let (a, b) = if op.is_signed() {
        (lhs.sext(w), rhs.sext(w))
    } else {
        (lhs.zext(w), rhs.zext(w))
    };
    let (ua, ub) = (a.bits(), b.bits());
    let (sa, sb) = (a.signed(), b.signed());

    let bits = match op {
        BinOp::Add => ua.wrapping_add(ub),
        BinOp::Sub => ua.wrapping_sub(ub),
        BinOp::Mul => ua.wrapping_mul(ub),
        BinOp::Div if sb == 0 => 0,
        BinOp::Div => sa.wrapping_div(sb) as u64,
        BinOp::DivU if ub == 0 => 0,
        BinOp::DivU => ua / ub,
        BinOp::Mod if sb == 0 => 0,
        BinOp::Mod => sa.wrapping_rem(sb) as u64,
        BinOp::ModU if ub == 0 => 0,
        BinOp::ModU => ua % ub,
        BinOp::And => ua & ub,
        BinOp::Or => ua | ub,
        BinOp::Xor => ua ^ ub,

        BinOp::Lt => return Value::from_bool(sa < sb),
        BinOp::LtU => return Value::from_bool(ua < ub),
        BinOp::Gt => return Value::from_bool(sa > sb),
        BinOp::GtU => return Value::from_bool(ua > ub),
        BinOp::Le => return Value::from_bool(sa <= sb),
        BinOp::LeU => return Value::from_bool(ua <= ub),
        BinOp::Ge => return Value::from_bool(sa >= sb),
        BinOp::GeU => return Value::from_bool(ua >= ub),
        BinOp::Eq => return Value::from_bool(ua == ub),
        BinOp::Ne => return Value::from_bool(ua != ub),

        BinOp::Shl | BinOp::Shr | BinOp::ShrU => unreachable!(),
    };
    Value::new(w, bits)
}

pub fn eval_unop(op: UnOp, v: Value) -> Value {
    let bits = match op {
        UnOp::Neg => v.bits().wrapping_neg(),
        UnOp::Not => !v.bits(),
    };
    Value::new(v.width(), bits)
}

/// Evaluate `expr`; registers resolve against the blocking store only
pub fn eval_expr(env: &Env, blocking: &Assoc, expr: &Expr) -> Value {
    match expr {
        Expr::Lit(v) => *v,
        Expr::Var(r) => env.read(blocking, *r),
        Expr::Input(r) => env.read(&env.inputs, *r),
        Expr::Binop(op, lhs, rhs) => {
            let l = eval_expr(env, blocking, lhs);
            let r = eval_expr(env, blocking, rhs);
            eval_binop(*op, l, r)
        }
        Expr::Unop(op, e) => eval_unop(*op, eval_expr(env, blocking, e)),
        Expr::Ternary(c, ifso, ifnot) => {
            if eval_expr(env, blocking, c).is_true() {
                eval_expr(env, blocking, ifso)
            } else {
                eval_expr(env, blocking, ifnot)
            }
        }
    }
}

fn values_equal(a: Value, b: Value) -> bool {
    eval_binop(BinOp::Eq, a, b).is_true()
}

/// Execute one statement, producing the stores after it
pub fn exec_stmt(env: &Env, mut stores: Stores, stmt: &Stmt) -> Stores {
    match stmt {
        Stmt::Skip => stores,
        Stmt::Seq(first, second) => {
            let stores = exec_stmt(env, stores, first);
            exec_stmt(env, stores, second)
        }
        Stmt::Cond(cond, ifso, ifnot) => {
            if eval_expr(env, &stores.blocking, cond).is_true() {
                exec_stmt(env, stores, ifso)
            } else {
                exec_stmt(env, stores, ifnot)
            }
        }
        Stmt::Case(scrutinee, arms, default) => {
            let v = eval_expr(env, &stores.blocking, scrutinee);
            let hit = arms
                .iter()
                .find(|(key, _)| values_equal(eval_expr(env, &stores.blocking, key), v));
            match (hit, default) {
                (Some((_, body)), _) => exec_stmt(env, stores, body),
                (None, Some(body)) => exec_stmt(env, stores, body),
                // No arm and no default: nothing happens
                (None, None) => stores,
            }
        }
        Stmt::Blocking(reg, e) => {
            let v = env.fit(*reg, eval_expr(env, &stores.blocking, e));
            trace!("{} = {}", reg, v);
            stores.blocking.insert(*reg, v);
            stores
        }
        Stmt::NonBlocking(reg, e) => {
            let v = env.fit(*reg, eval_expr(env, &stores.blocking, e));
            trace!("{} <= {}", reg, v);
            stores.nonblocking.insert(*reg, v);
            stores
        }
    }
}

/// End-of-cycle merge: `nonblocking` wins wherever both stores hold a key
pub fn merge(nonblocking: &Assoc, blocking: &Assoc) -> Assoc {
    let mut merged = blocking.clone();
    merged.extend(nonblocking.iter().map(|(r, v)| (*r, *v)));
    merged
}

/// One clock edge: run every process in body order, then merge once
pub fn step_module(env: &Env, module: &Module, assoc: Assoc) -> Assoc {
    let mut stores = Stores::new(assoc);
    for (_, stmt) in module.processes() {
        stores = exec_stmt(env, stores, stmt);
    }
    merge(&stores.nonblocking, &stores.blocking)
}

/// Clocked execution of one module
#[derive(Debug, Clone)]
pub struct Simulator<'m> {
    module: &'m Module,
    env: Env,
    assoc: Assoc,
    cycles: u64,
    config: SimConfig,
}

impl<'m> Simulator<'m> {
    pub fn new(module: &'m Module, config: SimConfig) -> Self {
        Simulator {
            module,
            env: Env::from_module(module),
            assoc: Assoc::new(),
            cycles: 0,
            config,
        }
    }

    /// Sample the external inputs with `inputs` from now on
    pub fn with_inputs(mut self, inputs: Assoc) -> Self {
        self.env = self.env.with_inputs(inputs);
        self
    }

    /// Force a register value into the merged state
    pub fn poke(&mut self, reg: Reg, value: Value) {
        let v = self.env.fit(reg, value);
        self.assoc.insert(reg, v);
    }

    pub fn peek(&self, reg: Reg) -> Value {
        self.env.read(&self.assoc, reg)
    }

    /// Merged state at the last cycle boundary
    pub fn state(&self) -> &Assoc {
        &self.assoc
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn step(&mut self) {
        let assoc = std::mem::take(&mut self.assoc);
        self.assoc = step_module(&self.env, self.module, assoc);
        self.cycles += 1;
        debug!(
            "cycle {}: state = {}",
            self.cycles,
            self.peek(self.module.state.0)
        );
    }

    /// Hold reset high for one clock edge
    pub fn reset(&mut self) {
        let (rst, _) = self.module.reset;
        self.poke(rst, Value::from_bool(true));
        self.step();
        self.poke(rst, Value::from_bool(false));
    }

    pub fn finished(&self) -> bool {
        self.peek(self.module.finish.0).is_true()
    }

    pub fn return_value(&self) -> Value {
        self.peek(self.module.ret.0)
    }

    /// Load the argument registers, in parameter order
    pub fn load_args(&mut self, args: &[Value]) -> Result<(), EvalError> {
        if args.len() != self.module.args.len() {
            return Err(EvalError::ArgumentCount {
                expected: self.module.args.len(),
                found: args.len(),
            });
        }
        for (&(reg, _), &value) in self.module.args.iter().zip(args) {
            self.poke(reg, value);
        }
        Ok(())
    }

    /// Start over from an empty state, reset, then clock until the finish
    /// flag is raised. The result is the return register at that same cycle
    /// boundary.
    pub fn run(&mut self, args: &[Value]) -> Result<Value, EvalError> {
        self.assoc.clear();
        self.cycles = 0;
        self.load_args(args)?;
        self.reset();
        while !self.finished() {
            if self.cycles >= self.config.max_cycles {
                return Err(EvalError::CycleLimit(self.config.max_cycles));
            }
            self.step();
        }
        debug!("finished after {} cycles", self.cycles);
        Ok(self.return_value())
    }
}
