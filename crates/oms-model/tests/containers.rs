//! Container add / rename / remove semantics and ownership.

mod common;

use common::fixture;
use oms_auth::{Role, RoleStore};
use oms_model::{ContainerCore, ContainerMut, ModelError, ModelEvent};
use oms_types::PrincipalId;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn add_sets_parent_and_name() {
    let fx = fixture();
    let root = fx.model.create("Root").unwrap();
    let vm_folder = fx.model.create_named("Computes", "computes").unwrap();

    let name = fx.model.container(&root).unwrap().add(Arc::clone(&vm_folder)).unwrap();

    assert_eq!(name, "computes");
    assert!(Arc::ptr_eq(&vm_folder.parent().unwrap(), &root));
    assert_eq!(vm_folder.path(), "/computes");
    assert_eq!(
        fx.events.take(),
        vec![ModelEvent::Created {
            node: vm_folder.id(),
            parent: root.id(),
            name: "computes".into(),
        }]
    );
}

#[test]
fn unnamed_item_gets_uuid_name() {
    let fx = fixture();
    let root = fx.model.create("Root").unwrap();
    let item = fx.model.create("Folder").unwrap();

    let name = fx.model.container(&root).unwrap().add(Arc::clone(&item)).unwrap();

    assert!(uuid::Uuid::parse_str(&name).is_ok(), "got {name}");
    assert_eq!(item.name(), Some(name));
}

#[test]
fn containment_rejected() {
    let fx = fixture();
    let computes = fx.model.create("Computes").unwrap();
    let task = fx.model.create("Task").unwrap();

    let container = fx.model.container(&computes).unwrap();
    assert!(!container.can_contain(&task).unwrap());
    let err = container.add(task).unwrap_err();
    assert!(
        matches!(err, ModelError::ContainmentRejected { ref expected, .. } if expected.contains("compute")),
        "{err:?}"
    );
    assert!(fx.events.take().is_empty());
}

#[test]
fn capability_containment() {
    let fx = fixture();
    let computes = fx.model.create("Computes").unwrap();
    let container = fx.model.container(&computes).unwrap();

    // provides the capability through its type
    let vm = fx.model.create("Compute").unwrap();
    assert!(container.can_contain(&vm).unwrap());

    // a plain folder does not
    let folder = fx.model.create("Folder").unwrap();
    assert!(!container.can_contain(&folder).unwrap());
}

#[test]
fn read_only_container_rejects_everything() {
    let fx = fixture();
    let actions = fx.model.create("Actions").unwrap();
    let folder = fx.model.create("Folder").unwrap();
    let err = fx.model.container(&actions).unwrap().add(folder).unwrap_err();
    assert!(matches!(err, ModelError::ContainmentRejected { .. }));
}

#[test]
fn leaf_is_not_a_container() {
    let fx = fixture();
    let vm = fx.model.create("Compute").unwrap();
    assert_eq!(
        fx.model.container(&vm).unwrap_err(),
        ModelError::NotAContainer("Compute".into())
    );
}

#[test]
fn move_between_containers() {
    let fx = fixture();
    let a = fx.model.create_named("Folder", "a").unwrap();
    let b = fx.model.create_named("Folder", "b").unwrap();
    let item = fx.model.create_named("Folder", "item").unwrap();

    let ca = fx.model.container(&a).unwrap();
    let cb = fx.model.container(&b).unwrap();
    ca.add(Arc::clone(&item)).unwrap();
    fx.events.take();

    cb.add(Arc::clone(&item)).unwrap();

    assert!(ca.list_names().unwrap().is_empty());
    assert_eq!(cb.list_names().unwrap(), ["item"]);
    assert!(Arc::ptr_eq(&item.parent().unwrap(), &b));
    assert_eq!(
        fx.events.take(),
        vec![ModelEvent::Moved {
            node: item.id(),
            from: a.id(),
            to: b.id(),
            old_name: "item".into(),
            new_name: "item".into(),
        }]
    );
}

#[test]
fn adding_to_current_parent_is_noop() {
    let fx = fixture();
    let a = fx.model.create("Folder").unwrap();
    let item = fx.model.create_named("Folder", "item").unwrap();
    let ca = fx.model.container(&a).unwrap();
    ca.add(Arc::clone(&item)).unwrap();
    fx.events.take();

    assert_eq!(ca.add(Arc::clone(&item)).unwrap(), "item");
    assert!(fx.events.take().is_empty());
    assert_eq!(ca.list_names().unwrap().len(), 1);
}

#[test]
fn duplicate_name_conflicts() {
    let fx = fixture();
    let a = fx.model.create("Folder").unwrap();
    let ca = fx.model.container(&a).unwrap();
    ca.add(fx.model.create_named("Folder", "x").unwrap()).unwrap();

    let err = ca.add(fx.model.create_named("Folder", "x").unwrap()).unwrap_err();
    assert!(matches!(err, ModelError::NameConflict { .. }));
}

#[test]
fn cannot_add_ancestor() {
    let fx = fixture();
    let outer = fx.model.create_named("Folder", "outer").unwrap();
    let inner = fx.model.create_named("Folder", "inner").unwrap();
    fx.model.container(&outer).unwrap().add(Arc::clone(&inner)).unwrap();

    let err = fx
        .model
        .container(&inner)
        .unwrap()
        .add(Arc::clone(&outer))
        .unwrap_err();
    assert!(matches!(err, ModelError::WouldCycle { .. }));

    let err = fx
        .model
        .container(&inner)
        .unwrap()
        .add(Arc::clone(&inner))
        .unwrap_err();
    assert!(matches!(err, ModelError::WouldCycle { .. }));
}

#[test]
fn rename_moves_key_and_name() {
    let fx = fixture();
    let a = fx.model.create("Folder").unwrap();
    let item = fx.model.create_named("Folder", "old").unwrap();
    let ca = fx.model.container(&a).unwrap();
    ca.add(Arc::clone(&item)).unwrap();
    fx.events.take();

    ca.rename("old", "new").unwrap();

    assert_eq!(ca.list_names().unwrap(), ["new"]);
    assert_eq!(item.name().as_deref(), Some("new"));
    assert!(Arc::ptr_eq(&ca.get("new").unwrap(), &item));
    assert!(matches!(
        fx.events.take().as_slice(),
        [ModelEvent::Moved { old_name, new_name, .. }] if old_name == "old" && new_name == "new"
    ));
}

#[test]
fn rename_errors() {
    let fx = fixture();
    let a = fx.model.create("Folder").unwrap();
    let ca = fx.model.container(&a).unwrap();
    ca.add(fx.model.create_named("Folder", "x").unwrap()).unwrap();
    ca.add(fx.model.create_named("Folder", "y").unwrap()).unwrap();

    assert!(matches!(
        ca.rename("missing", "z").unwrap_err(),
        ModelError::NotFound { .. }
    ));
    assert!(matches!(
        ca.rename("x", "y").unwrap_err(),
        ModelError::NameConflict { .. }
    ));
    assert_eq!(ca.list_names().unwrap(), ["x", "y"]);
}

#[test]
fn remove_detaches() {
    let fx = fixture();
    let a = fx.model.create("Folder").unwrap();
    let item = fx.model.create_named("Folder", "gone").unwrap();
    let ca = fx.model.container(&a).unwrap();
    ca.add(Arc::clone(&item)).unwrap();
    fx.events.take();

    let removed = ca.remove("gone").unwrap();
    assert!(Arc::ptr_eq(&removed, &item));
    assert!(item.parent().is_none());
    assert!(matches!(
        fx.events.take().as_slice(),
        [ModelEvent::Removed { name, .. }] if name == "gone"
    ));

    assert!(matches!(
        ca.remove("gone").unwrap_err(),
        ModelError::NotFound { .. }
    ));
}

#[test]
fn owner_is_unique() {
    let fx = fixture();
    let vm = fx.model.create("Compute").unwrap();
    let alice = PrincipalId::new("alice");
    let bob = PrincipalId::new("bob");

    assert_eq!(fx.model.owner(&vm).unwrap(), None);

    fx.model.set_owner(&vm, Some(alice.clone()));
    fx.model.set_owner(&vm, Some(bob.clone()));
    assert_eq!(fx.model.owner(&vm).unwrap(), Some(bob.clone()));
    assert_eq!(vm.owner_mirror(), Some(bob.clone()));
    assert_eq!(
        fx.roles.principals_for_role(vm.id(), &Role::OWNER),
        vec![bob.clone()]
    );

    let events = fx.events.take();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1],
        ModelEvent::OwnerChanged {
            node: vm.id(),
            old: Some(alice),
            new: Some(bob.clone()),
        }
    );

    // same owner again: no event
    fx.model.set_owner(&vm, Some(bob));
    assert!(fx.events.take().is_empty());
}

#[test]
fn multiple_owners_reported_and_repaired() {
    let fx = fixture();
    let vm = fx.model.create("Compute").unwrap();
    fx.roles.assign_role(vm.id(), &PrincipalId::new("a"), Role::OWNER);
    fx.roles.assign_role(vm.id(), &PrincipalId::new("b"), Role::OWNER);

    let err = fx.model.owner(&vm).unwrap_err();
    assert!(matches!(err, ModelError::OwnerInvariant { ref owners, .. } if owners.len() == 2));

    fx.model.set_owner(&vm, Some(PrincipalId::new("c")));
    assert_eq!(fx.model.owner(&vm).unwrap(), Some(PrincipalId::new("c")));
}

#[test]
fn concurrent_owner_changes_leave_one_owner() {
    let fx = fixture();
    for _ in 0..200 {
        let vm = fx.model.create("Compute").unwrap();
        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = ["alice", "bob"]
            .into_iter()
            .map(|name| {
                let model = fx.model.clone();
                let vm = Arc::clone(&vm);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    model.set_owner(&vm, Some(PrincipalId::new(name)));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let owner = fx.model.owner(&vm).unwrap();
        assert!(owner.is_some());
        assert_eq!(vm.owner_mirror(), owner);
    }
}

#[test]
fn concurrent_moves_file_item_once() {
    let fx = fixture();
    for _ in 0..200 {
        let home = fx.model.create_named("Computes", "home").unwrap();
        let left = fx.model.create_named("Computes", "left").unwrap();
        let right = fx.model.create_named("Computes", "right").unwrap();
        let vm = fx.model.create_named("Compute", "vm1").unwrap();
        fx.model.container(&home).unwrap().add(Arc::clone(&vm)).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [&left, &right]
            .into_iter()
            .map(|target| {
                let container = fx.model.container(target).unwrap();
                let vm = Arc::clone(&vm);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    container.add(vm).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let holders: Vec<_> = [&home, &left, &right]
            .into_iter()
            .filter(|c| c.persisted_children().unwrap().contains_key("vm1"))
            .collect();
        assert_eq!(holders.len(), 1);
        assert!(Arc::ptr_eq(&vm.parent().unwrap(), holders[0]));
        assert!(!Arc::ptr_eq(holders[0], &home));
    }
}

#[test]
fn rename_and_move_through_nested_folders() {
    let fx = fixture();
    let outer = fx.model.create_named("Folder", "outer").unwrap();
    let inner = fx.model.create_named("Folder", "inner").unwrap();
    let vm = fx.model.create_named("Compute", "vm1").unwrap();
    fx.model.container(&outer).unwrap().add(Arc::clone(&inner)).unwrap();
    fx.model.container(&inner).unwrap().add(Arc::clone(&vm)).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let mover = {
        let (outer, inner) = (
            fx.model.container(&outer).unwrap(),
            fx.model.container(&inner).unwrap(),
        );
        let vm = Arc::clone(&vm);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..200 {
                outer.add(Arc::clone(&vm)).unwrap();
                inner.add(Arc::clone(&vm)).unwrap();
            }
        })
    };
    let renamer = {
        let outer = fx.model.container(&outer).unwrap();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            for _ in 0..200 {
                outer.rename("inner", "nested").unwrap();
                outer.rename("nested", "inner").unwrap();
            }
        })
    };
    mover.join().unwrap();
    renamer.join().unwrap();

    assert_eq!(inner.name().as_deref(), Some("inner"));
    assert_eq!(
        outer.persisted_children().unwrap().keys().collect::<Vec<_>>(),
        ["inner"]
    );
    assert_eq!(inner.persisted_children().unwrap().len(), 1);
    assert!(Arc::ptr_eq(&vm.parent().unwrap(), &inner));
}
