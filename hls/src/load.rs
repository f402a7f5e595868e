// load.rs - Read a serialized CFG program
//
// The front-end writes programs as JSON (see `rtl::Program`). Parsing checks
// that the graph is closed: every entry and every successor names a node
// that carries an instruction.

use crate::error::LoadError;
use crate::rtl::Program;
use log::debug;

/// Parse and check a program
pub fn parse(data: &[u8]) -> Result<Program, LoadError> {
    let program: Program = serde_json::from_slice(data)?;
    check(&program)?;
    debug!(
        "loaded {} function(s), main = {}",
        program.functions.len(),
        program.main
    );
    Ok(program)
}

/// Check that every function's graph is closed
pub fn check(program: &Program) -> Result<(), LoadError> {
    for (name, func) in &program.functions {
        if !func.code.contains_key(&func.entry) {
            return Err(LoadError::MissingEntry {
                func: name.clone(),
                entry: func.entry,
            });
        }
        for (&node, instr) in &func.code {
            if let Some(target) = instr
                .successors()
                .into_iter()
                .find(|succ| !func.code.contains_key(succ))
            {
                return Err(LoadError::DanglingSuccessor {
                    func: name.clone(),
                    node,
                    target,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtl::{Instr, Node, Operation, Reg};

    const ADD: &str = r#"{
        "main": "add",
        "functions": {
            "add": {
                "params": [1, 2],
                "entry": 1,
                "code": {
                    "1": { "Op": { "op": "Add", "args": [1, 2], "dst": 3, "next": 2 } },
                    "2": { "Return": 3 }
                }
            }
        }
    }"#;

    #[test]
    fn test_parse_program() {
        let program = parse(ADD.as_bytes()).unwrap();
        let func = program.function("add").unwrap();
        assert_eq!(func.params, vec![Reg(1), Reg(2)]);
        assert_eq!(
            func.code.get(&Node(1)),
            Some(&Instr::Op {
                op: Operation::Add,
                args: vec![Reg(1), Reg(2)],
                dst: Reg(3),
                next: Node(2),
            })
        );
        assert_eq!(func.code.get(&Node(2)), Some(&Instr::Return(Some(Reg(3)))));
    }

    #[test]
    fn test_rejects_dangling_successor() {
        let text = ADD.replace(r#""next": 2"#, r#""next": 9"#);
        let err = parse(text.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            LoadError::DanglingSuccessor {
                node: Node(1),
                target: Node(9),
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_missing_entry() {
        let text = ADD.replace(r#""entry": 1"#, r#""entry": 5"#);
        assert!(matches!(
            parse(text.as_bytes()),
            Err(LoadError::MissingEntry { entry: Node(5), .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(parse(b"{ not json"), Err(LoadError::Json(_))));
    }
}
