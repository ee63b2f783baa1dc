//! Positional argument decoding

use otter_bridge_sys::{AccessMethod, BoundaryArg, BoundaryFault, FaultKind, ManagedRef};

pub(crate) struct Args<'a, 'b> {
    method: AccessMethod,
    args: &'a [BoundaryArg<'b>],
}

impl<'a, 'b> Args<'a, 'b> {
    /// Check the arity up front so the accessors can index freely
    pub(crate) fn new(
        method: AccessMethod,
        args: &'a [BoundaryArg<'b>],
        arity: usize,
    ) -> Result<Self, BoundaryFault> {
        if args.len() != arity {
            return Err(BoundaryFault::new(
                method,
                FaultKind::BadArguments,
                format!("expected {} arguments, got {}", arity, args.len()),
            ));
        }
        Ok(Self { method, args })
    }

    fn mismatch(&self, index: usize, expected: &str) -> BoundaryFault {
        BoundaryFault::new(
            self.method,
            FaultKind::BadArguments,
            format!("argument {} must be {}, got {:?}", index, expected, self.args[index]),
        )
    }

    pub(crate) fn reference(&self, index: usize) -> Result<ManagedRef, BoundaryFault> {
        match self.args[index] {
            BoundaryArg::Ref(raw) => Ok(raw),
            _ => Err(self.mismatch(index, "a reference")),
        }
    }

    pub(crate) fn optional_reference(
        &self,
        index: usize,
    ) -> Result<Option<ManagedRef>, BoundaryFault> {
        match self.args[index] {
            BoundaryArg::Ref(raw) => Ok(Some(raw)),
            BoundaryArg::Null => Ok(None),
            _ => Err(self.mismatch(index, "a reference or null")),
        }
    }

    pub(crate) fn int(&self, index: usize) -> Result<i32, BoundaryFault> {
        match self.args[index] {
            BoundaryArg::Int(n) => Ok(n),
            _ => Err(self.mismatch(index, "an int")),
        }
    }

    pub(crate) fn long(&self, index: usize) -> Result<i64, BoundaryFault> {
        match self.args[index] {
            BoundaryArg::Long(n) => Ok(n),
            _ => Err(self.mismatch(index, "a long")),
        }
    }

    /// A callback address, which travels as a long
    pub(crate) fn address(&self, index: usize) -> Result<u64, BoundaryFault> {
        self.long(index).map(|n| n as u64)
    }

    pub(crate) fn boolean(&self, index: usize) -> Result<bool, BoundaryFault> {
        match self.args[index] {
            BoundaryArg::Bool(b) => Ok(b),
            _ => Err(self.mismatch(index, "a boolean")),
        }
    }

    pub(crate) fn utf8(&self, index: usize) -> Result<&'b str, BoundaryFault> {
        match self.args[index] {
            BoundaryArg::Utf8(s) => Ok(s),
            _ => Err(self.mismatch(index, "a string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_is_checked() {
        let err = Args::new(AccessMethod::ValueCopy, &[], 1).err().unwrap();
        assert_eq!(err.kind, FaultKind::BadArguments);
    }

    #[test]
    fn test_type_mismatch() {
        let raw = [BoundaryArg::Int(3)];
        let args = Args::new(AccessMethod::ValueCopy, &raw, 1).unwrap();
        assert_eq!(args.int(0).unwrap(), 3);
        let err = args.reference(0).unwrap_err();
        assert!(err.message.contains("argument 0"));
    }

    #[test]
    fn test_optional_reference() {
        let raw = [BoundaryArg::Null, BoundaryArg::Ref(9)];
        let args = Args::new(AccessMethod::TemplateGet, &raw, 2).unwrap();
        assert_eq!(args.optional_reference(0).unwrap(), None);
        assert_eq!(args.optional_reference(1).unwrap(), Some(9));
    }
}
