//! Command runner that performs local copies in place of rsync.

use std::cell::RefCell;
use std::ffi::OsString;
use std::rc::Rc;

use rtox::{CommandOutput, CommandRunner, SyncError};

use super::rsync_simulator::{parse_args, simulate};

/// Emulates rsync for local destinations and records every argument list.
#[derive(Clone, Debug, Default)]
pub struct LocalCopyRunner {
    calls: Rc<RefCell<Vec<Vec<String>>>>,
}

impl LocalCopyRunner {
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for LocalCopyRunner {
    fn run(&self, _program: &str, args: &[OsString]) -> Result<CommandOutput, SyncError> {
        let strings: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        self.calls.borrow_mut().push(strings.clone());

        let invocation = parse_args(&strings)?;
        simulate(&invocation)?;
        Ok(CommandOutput {
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}
