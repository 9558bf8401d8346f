//! Sub-procedure call descriptors.

use std::fmt;

use crate::types::Value;

/// One sub-transaction invocation queued by a stage.
///
/// Immutable once queued: the dispatcher receives it by value.
#[derive(Debug, Clone, PartialEq)]
pub struct CallDescriptor {
    procedure: String,
    args: Vec<Value>,
}

impl CallDescriptor {
    pub fn new(procedure: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            procedure: procedure.into(),
            args,
        }
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.procedure, self.args)
    }
}

impl fmt::Display for CallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.procedure)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}

/// Build a call argument list from heterogeneous values.
///
/// ```
/// use stagewright::call_args;
/// let args = call_args!["Mr. Customer", 3i32];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! call_args {
    () => { ::std::vec::Vec::<$crate::types::Value>::new() };
    ($($arg:expr),+ $(,)?) => {
        vec![$($crate::types::Value::from($arg)),+]
    };
}
