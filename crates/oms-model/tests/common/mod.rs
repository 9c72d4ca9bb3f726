//! Shared fixtures for model integration tests.

#![allow(dead_code)]

use oms_auth::{Permission, Role, RoleStore};
use oms_model::{builtin, EventSink, Model, ModelEvent, ProviderRegistry};
use oms_types::{NodeId, PrincipalId};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Role store keeping bindings in a vector.
#[derive(Default)]
pub struct VecRoles {
    bindings: Mutex<Vec<(NodeId, PrincipalId, Role)>>,
}

impl RoleStore for VecRoles {
    fn granted_permissions(&self, _principal: &PrincipalId) -> BTreeSet<Permission> {
        BTreeSet::new()
    }

    fn roles_on(&self, node: NodeId, principal: &PrincipalId) -> Vec<Role> {
        self.bindings
            .lock()
            .iter()
            .filter(|(n, p, _)| *n == node && p == principal)
            .map(|(_, _, r)| r.clone())
            .collect()
    }

    fn role_permissions(&self, _role: &Role) -> BTreeSet<Permission> {
        BTreeSet::new()
    }

    fn assign_role(&self, node: NodeId, principal: &PrincipalId, role: Role) {
        self.bindings.lock().push((node, principal.clone(), role));
    }

    fn unset_role(&self, node: NodeId, principal: &PrincipalId, role: &Role) -> bool {
        let mut b = self.bindings.lock();
        let before = b.len();
        b.retain(|(n, p, r)| !(*n == node && p == principal && r == role));
        b.len() != before
    }

    fn principals_for_role(&self, node: NodeId, role: &Role) -> Vec<PrincipalId> {
        self.bindings
            .lock()
            .iter()
            .filter(|(n, _, r)| *n == node && r == role)
            .map(|(_, p, _)| p.clone())
            .collect()
    }
}

/// Sink recording every event.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<ModelEvent>>,
}

impl Recorder {
    pub fn take(&self) -> Vec<ModelEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for Recorder {
    fn publish(&self, event: ModelEvent) {
        self.events.lock().push(event);
    }
}

pub struct Fixture {
    pub model: Model,
    pub roles: Arc<VecRoles>,
    pub events: Arc<Recorder>,
}

pub fn fixture() -> Fixture {
    let roles = Arc::new(VecRoles::default());
    let events = Arc::new(Recorder::default());
    let model = Model::new(
        Arc::new(builtin::registry().expect("builtin types")),
        Arc::new(ProviderRegistry::new()),
        Arc::clone(&roles) as Arc<dyn RoleStore>,
        Arc::clone(&events) as Arc<dyn EventSink>,
    );
    Fixture {
        model,
        roles,
        events,
    }
}
