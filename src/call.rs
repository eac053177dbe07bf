//! Call path (§4.G.call): pins a binding's Module across invocation of its
//! resolved entry point.

use std::rc::Rc;

use crate::binding::Binding;
use crate::error::{Error, Result};
use crate::linker::Address;
use crate::scheduler::{ScratchArena, TaskExecutor};

/// Outcome of one native invocation, as reported by the (external) calling
/// convention: zero means success, non-zero means failure, optionally with
/// a diagnostic the callee set itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeOutcome {
    /// The callee returned zero.
    Success,
    /// The callee returned non-zero, with a diagnostic if it set one.
    Failure(Option<String>),
}

/// Invokes `binding`'s resolved entry point, pinning its Module for the
/// duration of the call (§4.G.call step 2) so a concurrent reload cannot
/// unmap the image out from under a suspended callee.
///
/// `binding` must already be resolved. Resolving an unresolved legacy
/// binding on first call (§4.G.call step 1) is the caller's job — see
/// [`crate::subsystem`] — since it needs collaborators (a
/// [`crate::legacy::LazyResolver`]) this function has no reason to know
/// about otherwise.
///
/// # Panics
/// Panics if `binding` is not resolved.
pub fn invoke<E, F>(binding: &Rc<Binding>, executor: &E, invoke_native: F) -> Result<()>
where
    E: TaskExecutor,
    F: FnOnce(Address, &mut E::Task) -> NativeOutcome,
{
    let address = binding
        .address()
        .expect("call::invoke on an unresolved binding");
    // The pin: an owned Rc clone held on the stack for the call's
    // duration. It drops at the end of this function, which is the
    // `unref(M)` half of step 2 — even if `invoke_native` suspended in
    // between, a concurrent reload saw this extra reference and could not
    // destroy the Module out from under it.
    let module = binding.module().expect("resolved binding always has a module");

    let mut task = executor.current_task();
    let outcome = invoke_native(address, &mut task);
    drop(module);

    match outcome {
        NativeOutcome::Success => Ok(()),
        NativeOutcome::Failure(diagnostic) => Err(Error::native_error(binding.name(), diagnostic)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::attach;
    use crate::identity::Identity;
    use crate::linker::testing::{FakeImageSpec, FakeLinker};
    use crate::linker::DynamicLinker;
    use crate::module::{refcount, Module};
    use crate::scheduler::InlineExecutor;
    use std::path::Path;

    fn resolved_binding() -> (Rc<Binding>, Rc<Module>) {
        let linker = FakeLinker::new();
        let path = Path::new("/fake/m.so");
        linker.stage(path, FakeImageSpec::with_symbols(10, &["f1"]));
        let image = unsafe { linker.open(path) }.unwrap();
        let module = Rc::new(Module::new("m".to_string(), Box::new(image), Identity::default()));
        let binding = Binding::unresolved("m.f1");
        attach(&binding, Rc::clone(&module), Address(10));
        (binding, module)
    }

    #[test]
    fn success_outcome_propagates_ok() {
        let (binding, _module) = resolved_binding();
        let executor = InlineExecutor;
        let result = invoke(&binding, &executor, |addr, _scratch| {
            assert_eq!(addr, Address(10));
            NativeOutcome::Success
        });
        assert!(result.is_ok());
    }

    #[test]
    fn failure_without_diagnostic_synthesizes_message() {
        let (binding, _module) = resolved_binding();
        let executor = InlineExecutor;
        let err = invoke(&binding, &executor, |_addr, _scratch| NativeOutcome::Failure(None)).unwrap_err();
        assert!(err.to_string().contains("no diagnostic set"));
    }

    #[test]
    fn failure_with_diagnostic_is_propagated() {
        let (binding, _module) = resolved_binding();
        let executor = InlineExecutor;
        let err = invoke(&binding, &executor, |_addr, _scratch| {
            NativeOutcome::Failure(Some("disk full".to_string()))
        })
        .unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn pin_is_released_after_call_returns() {
        let (binding, module) = resolved_binding();
        let baseline = refcount(&module);
        let executor = InlineExecutor;

        invoke(&binding, &executor, |_addr, _scratch| NativeOutcome::Success).unwrap();
        assert_eq!(refcount(&module), baseline, "pin must be released once the call returns");
    }

    #[test]
    fn pin_is_held_for_duration_of_callback() {
        let (binding, module) = resolved_binding();
        let baseline = refcount(&module);
        let executor = InlineExecutor;

        invoke(&binding, &executor, |_addr, _scratch| {
            assert_eq!(refcount(&module), baseline + 1, "module must be pinned while the callback runs");
            NativeOutcome::Success
        })
        .unwrap();
    }
}
