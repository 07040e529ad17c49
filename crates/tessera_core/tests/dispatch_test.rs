//! # System Dispatch Tests
//!
//! Membership maintenance, lifecycle dispatch and deferred structural changes:
//!
//! 1. **Movement**: a Position/Velocity system integrates over two frames
//! 2. **Subset rule**: systems match entities owning a superset of their needs
//! 3. **Commands**: structural changes queued by a system land after it returns
//! 4. **Policies**: eager and lazy registration behave as configured
//!
//! Run with: cargo test --package tessera_core --test dispatch_test

use bytemuck::{Pod, Zeroable};
use tessera_core::{
    EcsConfig, EcsError, EcsResult, EntityId, LifecycleEvent, MembershipPolicy, SceneManager,
    Signature, SystemContext, SystemStatus,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    vx: f32,
    vy: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Lifetime {
    frames: u32,
}

tessera_core::component!(Position, Velocity, Lifetime);

/// Frame parameters handed to the movement system.
struct FrameTime {
    dt: f32,
}

fn movement(ctx: &mut SystemContext<'_>) -> EcsResult<()> {
    let dt = ctx
        .args::<FrameTime>()
        .ok_or_else(|| EcsError::SystemFailed("movement needs a FrameTime".into()))?
        .dt;
    for &entity in ctx.entities() {
        let velocity = *ctx.get::<Velocity>(entity)?;
        let position = ctx.get_mut::<Position>(entity)?;
        position.x += velocity.vx * dt;
        position.y += velocity.vy * dt;
    }
    Ok(())
}

fn noop(_: &mut SystemContext<'_>) -> EcsResult<()> {
    Ok(())
}

fn always_fails(_: &mut SystemContext<'_>) -> EcsResult<()> {
    Err(EcsError::SystemFailed("boom".into()))
}

/// Ages every entity and queues expired ones for deletion.
fn expire(ctx: &mut SystemContext<'_>) -> EcsResult<()> {
    for &entity in ctx.entities() {
        let lifetime = ctx.get_mut::<Lifetime>(entity)?;
        lifetime.frames = lifetime.frames.saturating_sub(1);
        if lifetime.frames == 0 {
            ctx.commands().delete(entity);
        }
    }
    Ok(())
}

/// Gives every matched entity a velocity.
fn launch(ctx: &mut SystemContext<'_>) -> EcsResult<()> {
    for &entity in ctx.entities() {
        if !ctx.has::<Velocity>(entity) {
            ctx.commands().add(entity, Velocity { vx: 0.0, vy: 1.0 });
        }
    }
    Ok(())
}

fn manager(config: EcsConfig) -> SceneManager {
    let mut ecs = SceneManager::new(config);
    let scene = ecs.create_scene().unwrap();
    ecs.bind_scene(scene).unwrap();
    ecs.register_component::<Position>().unwrap();
    ecs.register_component::<Velocity>().unwrap();
    ecs.register_component::<Lifetime>().unwrap();
    ecs
}

fn matched(ecs: &SceneManager, system: &str) -> Vec<EntityId> {
    let mut entities = ecs
        .bound_scene()
        .unwrap()
        .systems()
        .matched(system)
        .unwrap()
        .to_vec();
    entities.sort();
    entities
}

/// Every live entity is in a system's list exactly when it satisfies it.
fn assert_membership_consistent(ecs: &SceneManager) {
    let scene = ecs.bound_scene().unwrap();
    for system in scene.systems().names() {
        let required = scene.systems().signature(system).unwrap();
        let list = scene.systems().matched(system).unwrap();
        for record in scene.entities().iter() {
            assert_eq!(
                record.signature.matches(required),
                list.contains(&record.id),
                "system {system}, entity {}",
                record.id
            );
        }
        assert!(list.iter().all(|&e| scene.entities().contains(e)));
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[test]
fn test_movement_integrates_each_update() {
    let mut ecs = manager(EcsConfig::default());
    let entity = ecs.create_entity().unwrap();
    ecs.add_component(entity, Position { x: 0.0, y: 0.0 }).unwrap();
    ecs.add_component(entity, Velocity { vx: 1.0, vy: 1.0 }).unwrap();

    let moving = ecs.build_signature("Position,Velocity").unwrap();
    ecs.register_system("movement", movement, moving, LifecycleEvent::OnUpdate)
        .unwrap();
    ecs.set_system_parameters("movement", FrameTime { dt: 1.0 }).unwrap();

    ecs.dispatch(LifecycleEvent::OnUpdate).unwrap();
    assert_eq!(ecs.get_component::<Position>(entity), Ok(&Position { x: 1.0, y: 1.0 }));

    ecs.dispatch(LifecycleEvent::OnUpdate).unwrap();
    assert_eq!(ecs.get_component::<Position>(entity), Ok(&Position { x: 2.0, y: 2.0 }));
    assert_eq!(ecs.system_status("movement"), Ok(&SystemStatus::Succeeded));

    // Other events do not run it.
    ecs.dispatch(LifecycleEvent::OnEnd).unwrap();
    assert_eq!(ecs.get_component::<Position>(entity), Ok(&Position { x: 2.0, y: 2.0 }));
}

#[test]
fn test_subset_rule() {
    let mut ecs = manager(EcsConfig::default());
    let positioned = ecs.build_signature(" Position ").unwrap();
    ecs.register_system("render", noop, positioned, LifecycleEvent::OnUpdate)
        .unwrap();

    let entity = ecs.create_entity().unwrap();
    ecs.add_component(entity, Position::default()).unwrap();
    ecs.add_component(entity, Velocity::default()).unwrap();
    assert_eq!(matched(&ecs, "render"), vec![entity]);

    ecs.remove_component::<Velocity>(entity).unwrap();
    assert_eq!(matched(&ecs, "render"), vec![entity]);

    ecs.remove_component::<Position>(entity).unwrap();
    assert!(matched(&ecs, "render").is_empty());
}

#[test]
fn test_membership_tracks_every_mutation() {
    let mut ecs = manager(EcsConfig::default());
    let everything = Signature::EMPTY;
    let moving = ecs.build_signature("Position,Velocity").unwrap();
    let mortal = ecs.build_signature("Lifetime").unwrap();
    ecs.register_system("all", noop, everything, LifecycleEvent::OnUpdate).unwrap();
    ecs.register_system("moving", noop, moving, LifecycleEvent::OnUpdate).unwrap();
    ecs.register_system("mortal", noop, mortal, LifecycleEvent::OnUpdate).unwrap();

    let entities: Vec<EntityId> = (0..12).map(|_| ecs.create_entity().unwrap()).collect();
    assert_membership_consistent(&ecs);

    for (i, &entity) in entities.iter().enumerate() {
        if i % 2 == 0 {
            ecs.add_component(entity, Position::default()).unwrap();
        }
        if i % 3 == 0 {
            ecs.add_component(entity, Velocity::default()).unwrap();
        }
        if i % 4 == 0 {
            ecs.add_component(entity, Lifetime { frames: 1 }).unwrap();
        }
        assert_membership_consistent(&ecs);
    }

    ecs.remove_component::<Position>(entities[6]).unwrap();
    assert_membership_consistent(&ecs);
    ecs.delete_entity(entities[0]).unwrap();
    ecs.delete_entity(entities[11]).unwrap();
    assert_membership_consistent(&ecs);
    ecs.unregister_component("Velocity").unwrap();
    assert_membership_consistent(&ecs);
    assert!(matched(&ecs, "moving").is_empty());
    assert_eq!(matched(&ecs, "all").len(), 10);
}

#[test]
fn test_reused_slot_does_not_revive_stale_requirement() {
    let mut ecs = manager(EcsConfig::default());
    ecs.register_component_by_name("Armor", 4).unwrap();
    let armored = ecs.build_signature("Armor").unwrap();
    ecs.register_system("armor", noop, armored, LifecycleEvent::OnUpdate)
        .unwrap();

    ecs.unregister_component("Armor").unwrap();
    ecs.register_component_by_name("Poison", 4).unwrap();
    let entity = ecs.create_entity().unwrap();
    ecs.add_component_by_name(entity, "Poison", None).unwrap();

    assert!(matched(&ecs, "armor").is_empty());
    assert_membership_consistent(&ecs);
}

// ============================================================================
// DISPATCH
// ============================================================================

#[test]
fn test_failing_system_does_not_halt_dispatch() {
    let mut ecs = manager(EcsConfig::default());
    let entity = ecs.create_entity().unwrap();
    ecs.add_component(entity, Position::default()).unwrap();
    ecs.add_component(entity, Velocity { vx: 2.0, vy: 0.0 }).unwrap();

    let moving = ecs.build_signature("Position,Velocity").unwrap();
    ecs.register_system("first", always_fails, Signature::EMPTY, LifecycleEvent::OnUpdate)
        .unwrap();
    ecs.register_system("movement", movement, moving, LifecycleEvent::OnUpdate)
        .unwrap();

    // No parameters yet: movement fails too, and still records its status.
    ecs.dispatch(LifecycleEvent::OnUpdate).unwrap();
    assert!(matches!(ecs.system_status("movement"), Ok(SystemStatus::Failed(_))));

    ecs.set_system_parameters("movement", FrameTime { dt: 0.5 }).unwrap();
    ecs.dispatch(LifecycleEvent::OnUpdate).unwrap();
    assert_eq!(
        ecs.system_status("first"),
        Ok(&SystemStatus::Failed(EcsError::SystemFailed("boom".into())))
    );
    assert_eq!(ecs.system_status("movement"), Ok(&SystemStatus::Succeeded));
    assert_eq!(ecs.get_component::<Position>(entity).unwrap().x, 1.0);
}

#[test]
fn test_unregistered_system_leaves_dispatch() {
    let mut ecs = manager(EcsConfig::default());
    let entity = ecs.create_entity().unwrap();
    ecs.add_component(entity, Position::default()).unwrap();
    ecs.add_component(entity, Velocity { vx: 1.0, vy: 0.0 }).unwrap();

    let moving = ecs.build_signature("Position,Velocity").unwrap();
    ecs.register_system("before", noop, Signature::EMPTY, LifecycleEvent::OnUpdate)
        .unwrap();
    ecs.register_system("movement", movement, moving, LifecycleEvent::OnUpdate)
        .unwrap();
    ecs.set_system_parameters("movement", FrameTime { dt: 1.0 }).unwrap();
    ecs.register_system("after", noop, Signature::EMPTY, LifecycleEvent::OnUpdate)
        .unwrap();

    ecs.unregister_system("before").unwrap();
    ecs.unregister_system("movement").unwrap();
    ecs.dispatch(LifecycleEvent::OnUpdate).unwrap();

    assert_eq!(ecs.get_component::<Position>(entity).unwrap().x, 0.0);
    assert_eq!(ecs.system_status("after"), Ok(&SystemStatus::Succeeded));
    assert!(ecs.system_status("movement").unwrap_err().is_not_found());
    assert!(ecs.invoke_system("movement").unwrap_err().is_not_found());
}

#[test]
fn test_invoke_runs_one_system() {
    let mut ecs = manager(EcsConfig::default());
    let entity = ecs.create_entity().unwrap();
    ecs.add_component(entity, Position::default()).unwrap();
    ecs.add_component(entity, Velocity { vx: 0.0, vy: 3.0 }).unwrap();
    let moving = ecs.build_signature("Position,Velocity").unwrap();
    ecs.register_system("movement", movement, moving, LifecycleEvent::OnInit)
        .unwrap();
    ecs.set_system_parameters("movement", FrameTime { dt: 1.0 }).unwrap();

    assert_eq!(ecs.system_status("movement"), Ok(&SystemStatus::Pending));
    ecs.invoke_system("movement").unwrap();
    assert_eq!(ecs.get_component::<Position>(entity).unwrap().y, 3.0);
}

// ============================================================================
// DEFERRED COMMANDS
// ============================================================================

#[test]
fn test_deletions_apply_after_system_returns() {
    let mut ecs = manager(EcsConfig::default());
    let mortal = ecs.build_signature("Lifetime").unwrap();
    ecs.register_system("expire", expire, mortal, LifecycleEvent::OnUpdate)
        .unwrap();

    let entities: Vec<EntityId> = [1, 2, 1, 3]
        .into_iter()
        .map(|frames| {
            let e = ecs.create_entity().unwrap();
            ecs.add_component(e, Lifetime { frames }).unwrap();
            e
        })
        .collect();

    ecs.dispatch(LifecycleEvent::OnUpdate).unwrap();
    assert_eq!(matched(&ecs, "expire"), vec![entities[1], entities[3]]);
    assert_eq!(ecs.get_component::<Lifetime>(entities[1]), Ok(&Lifetime { frames: 1 }));

    ecs.dispatch(LifecycleEvent::OnUpdate).unwrap();
    ecs.dispatch(LifecycleEvent::OnUpdate).unwrap();
    assert!(matched(&ecs, "expire").is_empty());
    assert!(ecs.bound_scene().unwrap().entities().is_empty());
    assert_eq!(ecs.system_status("expire"), Ok(&SystemStatus::Succeeded));
}

#[test]
fn test_later_systems_see_earlier_commands() {
    let mut ecs = manager(EcsConfig::default());
    let positioned = ecs.build_signature("Position").unwrap();
    let moving = ecs.build_signature("Position,Velocity").unwrap();
    ecs.register_system("launch", launch, positioned, LifecycleEvent::OnUpdate)
        .unwrap();
    ecs.register_system("movement", movement, moving, LifecycleEvent::OnUpdate)
        .unwrap();
    ecs.set_system_parameters("movement", FrameTime { dt: 1.0 }).unwrap();

    let entity = ecs.create_entity().unwrap();
    ecs.add_component(entity, Position::default()).unwrap();
    assert!(matched(&ecs, "movement").is_empty());

    ecs.dispatch(LifecycleEvent::OnUpdate).unwrap();
    assert_eq!(ecs.get_component::<Position>(entity), Ok(&Position { x: 0.0, y: 1.0 }));
    assert_eq!(matched(&ecs, "movement"), vec![entity]);
}

// ============================================================================
// POLICIES AND CONFIG
// ============================================================================

#[test]
fn test_lazy_registration_skips_existing_entities() {
    let mut ecs = manager(EcsConfig::lazy());
    let early = ecs.create_entity().unwrap();
    ecs.add_component(early, Position::default()).unwrap();

    let positioned = ecs.build_signature("Position").unwrap();
    ecs.register_system("render", noop, positioned, LifecycleEvent::OnUpdate)
        .unwrap();
    assert!(matched(&ecs, "render").is_empty());

    // The next add on the entity brings it in.
    ecs.add_component(early, Velocity::default()).unwrap();
    assert_eq!(matched(&ecs, "render"), vec![early]);

    let late = ecs.create_entity().unwrap();
    ecs.add_component(late, Position::default()).unwrap();
    assert_eq!(matched(&ecs, "render"), vec![early, late]);
}

#[test]
fn test_eager_registration_scans_existing_entities() {
    let mut ecs = manager(EcsConfig::default());
    let early = ecs.create_entity().unwrap();
    ecs.add_component(early, Position::default()).unwrap();
    let bare = ecs.create_entity().unwrap();

    let positioned = ecs.build_signature("Position").unwrap();
    ecs.register_system("render", noop, positioned, LifecycleEvent::OnUpdate)
        .unwrap();
    ecs.register_system("all", noop, Signature::EMPTY, LifecycleEvent::OnUpdate)
        .unwrap();

    assert_eq!(matched(&ecs, "render"), vec![early]);
    assert_eq!(matched(&ecs, "all"), vec![early, bare]);
}

#[test]
fn test_config_drives_scene_behaviour() {
    let config = EcsConfig::from_toml_str(
        r#"
        membership = "lazy"
        signature_delimiter = "|"
        "#,
    )
    .unwrap();
    assert_eq!(config.membership, MembershipPolicy::Lazy);

    let ecs = manager(config);
    let both = ecs.build_signature("Position | Velocity").unwrap();
    assert_eq!(both, ecs.build_signature("Position|Velocity|").unwrap());
    assert_eq!(both.bits(), 0b11);
    assert_eq!(
        ecs.build_signature("Position,Velocity"),
        Err(EcsError::ComponentNotRegistered("Position,Velocity".into()))
    );
}
