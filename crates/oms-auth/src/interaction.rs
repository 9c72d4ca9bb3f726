//! Interactions: the ordered set of principals acting in one operation.
//!
//! An [`Interaction`] is created per operation (shell command, HTTP request,
//! startup routine) and passed explicitly to every secure proxy. Principals
//! are bound with [`Interaction::enter`] and released with
//! [`Interaction::exit`] in strict LIFO order.
//!
//! ```text
//! Interaction::for_principal(user1)       stack: [user1]
//!   ├─ enter(System)      → binding #1    stack: [user1, system]
//!   │    ├─ enter(user2)  → binding #2    stack: [user1, system, user2]
//!   │    └─ exit(#2)                      stack: [user1, system]
//!   └─ exit(#1)                           stack: [user1]
//! ```
//!
//! Exiting anything but the most recent binding is a programming error and
//! is reported as [`InteractionError::OutOfOrder`].

use crate::InteractionError;
use oms_types::Principal;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Binding ids are unique across all interactions, so a token can only
/// ever match the interaction that issued it. 0 marks the base binding.
static NEXT_BINDING: AtomicU64 = AtomicU64::new(1);

/// Token returned by [`Interaction::enter`].
///
/// Not `Clone`: each binding can be exited exactly once.
#[derive(Debug)]
#[must_use = "a binding must be passed back to Interaction::exit"]
pub struct Binding {
    id: u64,
    principal: Principal,
}

impl Binding {
    /// Process-wide unique id of this binding.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The principal this binding brought into the interaction.
    #[must_use]
    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

/// Ordered principal bindings of one operation.
///
/// Thread-safe; typically shared as `Arc<Interaction>` between the proxies
/// created for the operation.
///
/// # Example
///
/// ```
/// use oms_auth::Interaction;
/// use oms_types::Principal;
///
/// let interaction = Interaction::for_principal(Principal::user("user1"));
/// assert_eq!(interaction.depth(), 1);
///
/// let binding = interaction.enter(Principal::System);
/// assert!(interaction.principals().contains(&Principal::System));
///
/// interaction.exit(binding).unwrap();
/// assert_eq!(interaction.principals(), vec![Principal::user("user1")]);
/// ```
#[derive(Debug)]
pub struct Interaction {
    stack: Mutex<Vec<(u64, Principal)>>,
}

impl Interaction {
    /// Creates an interaction with no bound principal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stack: Mutex::new(Vec::new()),
        }
    }

    /// Creates an interaction with `principal` permanently bound at the base.
    ///
    /// The base binding has no [`Binding`] token and is never exited.
    #[must_use]
    pub fn for_principal(principal: Principal) -> Self {
        Self {
            stack: Mutex::new(vec![(0, principal)]),
        }
    }

    /// Binds `principal` on top of the stack.
    pub fn enter(&self, principal: Principal) -> Binding {
        let id = NEXT_BINDING.fetch_add(1, Ordering::Relaxed);
        self.stack.lock().push((id, principal.clone()));
        tracing::trace!(binding = id, principal = %principal, "interaction enter");
        Binding { id, principal }
    }

    /// Releases `binding`, which must be the most recent one.
    ///
    /// # Errors
    ///
    /// - [`InteractionError::NotActive`] if no exitable binding is active
    /// - [`InteractionError::OutOfOrder`] if `binding` is not on top
    pub fn exit(&self, binding: Binding) -> Result<(), InteractionError> {
        let mut stack = self.stack.lock();
        match stack.last() {
            Some((top, _)) if *top == binding.id => {
                stack.pop();
                tracing::trace!(binding = binding.id, "interaction exit");
                Ok(())
            }
            Some((top, _)) if *top != 0 => Err(InteractionError::OutOfOrder {
                expected: *top,
                got: binding.id,
            }),
            _ => Err(InteractionError::NotActive(binding.id)),
        }
    }

    /// Runs `f` with `principal` bound, exiting afterwards.
    ///
    /// # Errors
    ///
    /// Propagates [`InteractionError`] if `f` left a binding of its own
    /// on the stack.
    pub fn scoped<T>(
        &self,
        principal: Principal,
        f: impl FnOnce() -> T,
    ) -> Result<T, InteractionError> {
        let binding = self.enter(principal);
        let out = f();
        self.exit(binding)?;
        Ok(out)
    }

    /// Principals currently bound, oldest first.
    #[must_use]
    pub fn principals(&self) -> Vec<Principal> {
        self.stack.lock().iter().map(|(_, p)| p.clone()).collect()
    }

    /// Returns `true` if at least one principal is bound.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.stack.lock().is_empty()
    }

    /// Number of bound principals, including the base one.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.lock().len()
    }

    /// Returns `true` if [`Principal::System`] is bound.
    #[must_use]
    pub fn has_system(&self) -> bool {
        self.stack.lock().iter().any(|(_, p)| p.is_system())
    }
}

impl Default for Interaction {
    fn default() -> Self {
        Self::new()
    }
}
