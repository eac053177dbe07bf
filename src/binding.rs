//! Symbol Binding (§3, §4.F): a named `(logical name → address)` mapping,
//! optionally resolved against a [`Module`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::linker::Address;
use crate::module::Module;

struct BindingState {
    module: Option<Rc<Module>>,
    address: Option<Address>,
}

/// One `(logical name → address)` mapping exposed to callers.
///
/// Holding `binding.module()` (an `Rc<Module>` clone) is what keeps a
/// resolved binding's Module alive even if the cache entry pointing at it is
/// later replaced by a reload — this is invariant 4 of §3 made concrete.
pub struct Binding {
    name: String,
    state: RefCell<BindingState>,
}

impl Binding {
    /// Creates a binding with no resolved address yet (§4.G precondition).
    pub fn unresolved(name: impl Into<String>) -> Rc<Binding> {
        Rc::new(Binding {
            name: name.into(),
            state: RefCell::new(BindingState {
                module: None,
                address: None,
            }),
        })
    }

    /// The dotted logical name this binding was created for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `true` once this binding has a resolved address (invariant 1 of §3).
    pub fn is_resolved(&self) -> bool {
        self.state.borrow().address.is_some()
    }

    /// The Module currently providing this binding's symbol, if resolved.
    pub fn module(&self) -> Option<Rc<Module>> {
        self.state.borrow().module.clone()
    }

    /// The resolved entry-point address, if any.
    pub fn address(&self) -> Option<Address> {
        self.state.borrow().address
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Binding")
            .field("name", &self.name)
            .field("resolved", &state.address.is_some())
            .field("module", &state.module.as_ref().map(|m| m.package().to_string()))
            .finish()
    }
}

/// Resolves `binding` against `module` at `address`, linking it into
/// `module`'s binding list. §4.E/F: "ref(M); link(binding, M.bindings)".
///
/// Here, "ref(M)" is simply cloning `module` into the binding's own state —
/// the clone is the reference.
pub fn attach(binding: &Rc<Binding>, module: Rc<Module>, address: Address) {
    module.link(binding);
    let mut state = binding.state.borrow_mut();
    state.module = Some(module);
    state.address = Some(address);
}

/// Detaches `binding` from whatever Module it is currently resolved
/// against, if any. §4.E/F: "unlink(binding); unref(M)" — order matters
/// there only because a manual `unref` might destroy `M` while it is still
/// being unlinked; with `Rc` the unlink must still happen first so the
/// Module's binding list does not retain a weak reference to a binding that
/// has already forgotten about it.
pub fn detach(binding: &Rc<Binding>) {
    let module = {
        let mut state = binding.state.borrow_mut();
        state.address = None;
        state.module.take()
    };
    if let Some(module) = module {
        module.unlink(binding);
        // `module` (the local Rc) drops here, releasing the binding's hold.
    }
}
