// cfg2hdl - CFG to hardware state machine compiler
//
// Lowers one function in control-flow-graph form to a single hardware
// module: a state register that tracks the current CFG node, a datapath that
// performs each node's operation, and a finish flag plus return register that
// signal completion.
//
// # Architecture
//
// 1. **Input** (`rtl.rs`, `load.rs`): CFG functions and programs, read from JSON
// 2. **Translation** (`translate.rs`): one operation to one expression tree
// 3. **Building** (`builder.rs`): fold over the CFG, one state per node
// 4. **Assembly** (`assemble.rs`): two always-processes plus declarations
// 5. **Simulation** (`eval.rs`): blocking / non-blocking execution semantics
//
// # Timing contract
//
// The module changes state once per clock edge. After reset the state
// register holds the entry node; once a return node is reached the finish
// flag goes high and the return register holds the result.
//
// # Unsupported input
//
// Loads, stores, calls, tail calls, builtins and jump tables are rejected
// with a named error. No partial module is ever produced.

pub mod assemble;
pub mod builder;
pub mod config;
pub mod error;
pub mod eval;
pub mod load;
pub mod rtl;
pub mod translate;
pub mod value;
pub mod verilog;

pub use assemble::ControlRegs;
pub use builder::{Builder, Transition};
pub use config::{GenConfig, SimConfig};
pub use error::{EvalError, GenError, GenResult, LoadError};
pub use eval::{Assoc, Env, Simulator, Stores};
pub use rtl::{Function, Instr, Node, Program, Reg};
pub use value::Value;
pub use verilog::{Expr, Module, Stmt};

use log::{debug, info};
use value::valid_width;

/// Compile one function to a module
pub fn compile_function(func: &Function, config: &GenConfig) -> GenResult<Module> {
    for width in [config.data_width, config.state_width] {
        if !valid_width(width) {
            return Err(GenError::InvalidWidth(width));
        }
    }

    let mut builder = Builder::for_function(func)?;
    debug!(
        "seeded builder: fresh reg {}, fresh node {}",
        builder.fresh_reg(),
        builder.fresh_node()
    );

    let finish = builder.allocate_register(1)?;
    let ret = builder.allocate_register(config.data_width)?;

    // Fail fast: the first unsupported node aborts the whole function
    for (&node, instr) in &func.code {
        builder.transl_instr(finish, ret, config.data_width, node, instr)?;
    }
    builder.declare_operands(func, config.data_width)?;

    // Distinct nodes must stay distinct case keys once encoded
    let max_node = Node(builder.fresh_node().0 - 1);
    if !fits(max_node.0, config.state_width) {
        return Err(GenError::StateWidthTooSmall {
            width: config.state_width,
            max_node,
        });
    }

    let start = builder.allocate_register(1)?;
    let reset = builder.allocate_register(1)?;
    let clock = builder.allocate_register(1)?;
    let state = builder.allocate_register(config.state_width)?;

    let ctrl = ControlRegs {
        start,
        reset,
        clock,
        finish,
        ret,
        state,
    };
    let module = assemble::assemble(builder.into_parts(), &ctrl, &func.params, func.entry, config);
    debug!(
        "assembled module: {} declarations, {} argument(s)",
        module.decl_count(),
        module.args.len()
    );
    Ok(module)
}

fn fits(n: u32, width: u32) -> bool {
    width >= 32 || n >> width == 0
}

/// Compile the program's designated entry function
pub fn compile_program(program: &Program, config: &GenConfig) -> GenResult<Module> {
    let func = program
        .function(&program.main)
        .ok_or_else(|| GenError::EntryNotFound(program.main.clone()))?;
    info!(
        "compiling `{}` ({} nodes, {} params)",
        program.main,
        func.code.len(),
        func.params.len()
    );
    compile_function(func, config)
}
