//! Demo home: a handful of simulated accessories, a light group and an
//! evening scene, plus a short scripted session exercising them.

use std::time::Duration;

use homesync_adapter_virtual::{AlarmPanel, Covering, GarageDoor, Lock, Switch, Valve};
use homesync_domain::actuator::{ActuatorBindings, ActuatorKind};
use homesync_domain::alarm::{AlarmMode, SecuritySystem};
use homesync_domain::error::HomeSyncError;
use homesync_domain::group::{DeviceGroup, GroupAction, GroupMember, GroupRole};
use homesync_domain::id::{CharacteristicId, DeviceId, GroupId, SceneId};
use homesync_domain::scene::{Scene, SceneAction, ValueKind};
use homesync_domain::value::CharacteristicValue;

use crate::wiring::Services;

const ALARM_CODE: &str = "1234";

/// Handles to everything the demo installed.
#[derive(Debug, Clone, Copy)]
pub struct Demo {
    pub blind: DeviceId,
    pub front_lock: DeviceId,
    pub garage: DeviceId,
    pub sprinkler: DeviceId,
    pub alarm: DeviceId,
    pub living_room: GroupId,
    pub evening: SceneId,
}

/// Populate the simulated home and register every device with the services.
///
/// # Errors
///
/// Returns a validation error if a group or scene is malformed.
pub fn install(services: &Services) -> Result<Demo, HomeSyncError> {
    let Services {
        store,
        home,
        actuators,
        groups,
        scenes,
        security,
        ..
    } = services;

    let seed = |id: CharacteristicId, value: CharacteristicValue| {
        store.apply_remote(id, value);
    };

    let blind_target = CharacteristicId::new();
    let blind_current = CharacteristicId::new();
    home.add(Covering::new(blind_target, blind_current, 45));
    seed(blind_target, 45_i64.into());
    seed(blind_current, 45_i64.into());
    let blind = actuators.register(
        ActuatorBindings {
            kind: ActuatorKind::WindowCovering,
            command_id: blind_target,
            state_id: blind_current,
            obstruction_id: None,
        },
        45_i64.into(),
    );

    let lock_target = CharacteristicId::new();
    let lock_current = CharacteristicId::new();
    home.add(Lock::new(lock_target, lock_current, true));
    seed(lock_target, 1_i64.into());
    seed(lock_current, "locked".into());
    let front_lock = actuators.register(
        ActuatorBindings {
            kind: ActuatorKind::Lock,
            command_id: lock_target,
            state_id: lock_current,
            obstruction_id: None,
        },
        1_i64.into(),
    );

    let door_target = CharacteristicId::new();
    let door_current = CharacteristicId::new();
    let door_obstruction = CharacteristicId::new();
    home.add(GarageDoor::new(door_target, door_current, door_obstruction, true));
    seed(door_target, 1_i64.into());
    seed(door_current, 1_i64.into());
    seed(door_obstruction, false.into());
    let garage = actuators.register(
        ActuatorBindings {
            kind: ActuatorKind::GarageDoor,
            command_id: door_target,
            state_id: door_current,
            obstruction_id: Some(door_obstruction),
        },
        1_i64.into(),
    );

    let valve_active = CharacteristicId::new();
    let valve_in_use = CharacteristicId::new();
    home.add(Valve::new(valve_active, valve_in_use));
    seed(valve_active, 0_i64.into());
    seed(valve_in_use, 0_i64.into());
    let sprinkler = actuators.register(
        ActuatorBindings {
            kind: ActuatorKind::Valve,
            command_id: valve_active,
            state_id: valve_in_use,
            obstruction_id: None,
        },
        0_i64.into(),
    );

    let alarm_target = CharacteristicId::new();
    let alarm_current = CharacteristicId::new();
    home.add(AlarmPanel::new(alarm_target, alarm_current, Some(ALARM_CODE.to_string())));
    seed(alarm_current, AlarmMode::Disarmed.into());
    let alarm = security.register(SecuritySystem::new(alarm_target, alarm_current, true));

    let mut group = DeviceGroup::builder().name("Living room");
    let mut lamps = Vec::new();
    for (name, on, level) in [("sofa", true, 80_i64), ("reading", true, 20), ("corner", false, 0)] {
        let power = CharacteristicId::new();
        let brightness = CharacteristicId::new();
        home.add(Switch::new(power));
        home.add(Switch::new(brightness));
        seed(power, on.into());
        seed(brightness, level.into());
        group = group
            .member(GroupMember::new(name, GroupRole::Power, power))
            .member(GroupMember::new(name, GroupRole::Brightness, brightness));
        lamps.push((power, brightness));
    }
    let living_room = groups.register(group.build()?)?;

    let (sofa_power, sofa_brightness) = lamps[0];
    let evening = Scene::new(
        "Evening",
        vec![
            SceneAction::new(blind_target, ValueKind::TargetPosition, 20_i64),
            SceneAction::new(sofa_power, ValueKind::PowerState, true),
            SceneAction::new(sofa_brightness, ValueKind::Brightness, 40_i64),
            SceneAction::new(lock_target, ValueKind::LockTargetState, 1_i64),
        ],
    );
    let evening_id = evening.id;
    scenes.register(evening)?;

    tracing::info!(devices = 5, lamps = lamps.len(), "demo home installed");
    Ok(Demo {
        blind,
        front_lock,
        garage,
        sprinkler,
        alarm,
        living_room,
        evening: evening_id,
    })
}

/// Drive the demo home through a short scripted session.
pub async fn run(services: Services, demo: Demo) {
    let pause = Duration::from_secs(3);

    tokio::time::sleep(Duration::from_secs(1)).await;
    report(
        "open blind to 80%",
        services.actuators.command(demo.blind, 80_i64.into()),
    );

    tokio::time::sleep(pause).await;
    report(
        "toggle living room",
        services
            .groups
            .act(demo.living_room, GroupAction::Toggle(GroupRole::Power)),
    );

    tokio::time::sleep(pause).await;
    report("activate evening scene", services.scenes.activate(demo.evening));

    tokio::time::sleep(pause).await;
    report(
        "unlock front door",
        services.actuators.command(demo.front_lock, 0_i64.into()),
    );

    tokio::time::sleep(pause).await;
    report(
        "open garage",
        services.actuators.command(demo.garage, 0_i64.into()),
    );

    tokio::time::sleep(pause).await;
    report(
        "start sprinkler",
        services.actuators.command(demo.sprinkler, 1_i64.into()),
    );

    tokio::time::sleep(pause).await;
    report(
        "arm away",
        services
            .security
            .command(demo.alarm, AlarmMode::ArmedAway, Some(ALARM_CODE))
            .await,
    );

    tokio::time::sleep(pause).await;
    for (step, outcome) in [
        ("blind", services.actuators.state(demo.blind).map(|s| s.to_string())),
        ("front lock", services.actuators.state(demo.front_lock).map(|s| s.to_string())),
        ("garage", services.actuators.state(demo.garage).map(|s| s.to_string())),
        ("alarm", services.security.mode(demo.alarm).map(|m| m.to_string())),
    ] {
        report(step, outcome);
    }
    tracing::info!(
        evening_active = services.scenes.is_active(demo.evening),
        "demo session finished"
    );
}

fn report<T: std::fmt::Debug>(step: &str, outcome: Result<T, HomeSyncError>) {
    match outcome {
        Ok(value) => tracing::info!(step, ?value, "demo step done"),
        Err(err) => tracing::warn!(step, error = %err, "demo step failed"),
    }
}
