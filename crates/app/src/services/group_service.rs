//! Group service: aggregates member values and fans group actions out to
//! every member.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use homesync_domain::error::{HomeSyncError, NotFoundError};
use homesync_domain::group::{DeviceGroup, GroupAction, GroupAggregateState, GroupRole, GroupWrite};
use homesync_domain::id::{CharacteristicId, GroupId};

use crate::ports::{ChangePublisher, Clock, Transport};
use crate::services::dispatch;
use crate::store::CharacteristicStore;

/// Recomputed aggregate of a group's primary role.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupUpdate {
    pub group_id: GroupId,
    pub state: GroupAggregateState,
}

pub struct GroupService<T, P, C> {
    store: Arc<CharacteristicStore<P, C>>,
    transport: T,
    groups: Mutex<HashMap<GroupId, DeviceGroup>>,
}

impl<T, P, C> GroupService<T, P, C>
where
    T: Transport + Clone + Send + Sync + 'static,
    P: ChangePublisher,
    C: Clock,
{
    pub fn new(store: Arc<CharacteristicStore<P, C>>, transport: T) -> Self {
        Self {
            store,
            transport,
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// Register an externally defined group.
    ///
    /// # Errors
    ///
    /// Returns [`HomeSyncError::Validation`] if the group is invalid.
    #[tracing::instrument(skip(self, group), fields(group_name = %group.name))]
    pub fn register(&self, group: DeviceGroup) -> Result<GroupId, HomeSyncError> {
        group.validate()?;
        let id = group.id;
        self.lock().insert(id, group);
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns [`HomeSyncError::NotFound`] for an unknown group.
    pub fn get(&self, id: GroupId) -> Result<DeviceGroup, HomeSyncError> {
        self.lock().get(&id).cloned().ok_or_else(|| not_found(id))
    }

    /// Aggregate of `role` across the group, or `None` when no member has
    /// that role.
    ///
    /// # Errors
    ///
    /// Returns [`HomeSyncError::NotFound`] for an unknown group.
    pub fn aggregate(&self, id: GroupId, role: GroupRole) -> Result<Option<GroupAggregateState>, HomeSyncError> {
        let group = self.get(id)?;
        Ok(group.aggregate(role, |member| self.store.get(member)))
    }

    /// Aggregate of the group's primary role.
    ///
    /// # Errors
    ///
    /// Returns [`HomeSyncError::NotFound`] for an unknown group.
    pub fn primary_state(&self, id: GroupId) -> Result<Option<GroupAggregateState>, HomeSyncError> {
        let group = self.get(id)?;
        Ok(Self::primary_aggregate(&group, &self.store))
    }

    /// Apply a user action to every member.
    ///
    /// Every member record is set optimistically, with its window opened in
    /// the same step, before any write is dispatched. Writes are
    /// independent and never awaited: a failing member is logged and the
    /// others still receive theirs; nothing is rolled back.
    ///
    /// # Errors
    ///
    /// - [`HomeSyncError::NotFound`] for an unknown group
    /// - [`HomeSyncError::Validation`] when the action does not apply to
    ///   the role
    #[tracing::instrument(skip(self))]
    pub fn act(&self, id: GroupId, action: GroupAction) -> Result<Vec<GroupWrite>, HomeSyncError> {
        let group = self.get(id)?;
        let writes = group.plan(action, |member| self.store.get(member))?;

        for write in &writes {
            self.store
                .set_local_suppressed(write.state_id, write.value.clone(), write.policy);
        }
        tracing::info!(group = %group.name, writes = writes.len(), "group action dispatched");

        for write in &writes {
            dispatch(&self.transport, write.write_id, write.value.clone(), "group");
        }
        Ok(writes)
    }

    /// Every characteristic any group depends on.
    pub fn watched_ids(&self) -> Vec<CharacteristicId> {
        self.lock()
            .values()
            .flat_map(DeviceGroup::characteristic_ids)
            .collect()
    }

    /// Recompute the groups that contain `changed`.
    pub fn on_change(&self, changed: CharacteristicId) -> Vec<GroupUpdate> {
        let affected: Vec<DeviceGroup> = self
            .lock()
            .values()
            .filter(|g| g.members.iter().any(|m| m.state_id == changed))
            .cloned()
            .collect();
        affected
            .iter()
            .filter_map(|group| {
                Self::primary_aggregate(group, &self.store).map(|state| GroupUpdate {
                    group_id: group.id,
                    state,
                })
            })
            .collect()
    }

    fn primary_aggregate(
        group: &DeviceGroup,
        store: &CharacteristicStore<P, C>,
    ) -> Option<GroupAggregateState> {
        let role = group.primary_role()?;
        group.aggregate(role, |member| store.get(member))
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<GroupId, DeviceGroup>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn not_found(id: GroupId) -> HomeSyncError {
    NotFoundError {
        entity: "Group",
        id: id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use homesync_domain::error::ValidationError;
    use homesync_domain::group::GroupMember;
    use homesync_domain::time::seconds;
    use homesync_domain::value::CharacteristicValue;

    use crate::services::test_support::{Harness, SpyTransport, StalledTransport, flush, harness};

    type Service = GroupService<Arc<SpyTransport>, Arc<crate::change_bus::ChangeBus>, Arc<crate::ports::ManualClock>>;

    fn make_service(h: &Harness) -> Service {
        GroupService::new(Arc::clone(&h.store), Arc::clone(&h.transport))
    }

    fn power_group(ids: &[CharacteristicId]) -> DeviceGroup {
        ids.iter()
            .enumerate()
            .fold(DeviceGroup::builder().name("Kitchen"), |b, (i, id)| {
                b.member(GroupMember::new(format!("light-{i}"), GroupRole::Power, *id))
            })
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_report_two_of_three_on() {
        let h = harness();
        let svc = make_service(&h);
        let ids = [CharacteristicId::new(), CharacteristicId::new(), CharacteristicId::new()];
        let group_id = svc.register(power_group(&ids)).unwrap();
        h.store.apply_remote(ids[0], true.into());
        h.store.apply_remote(ids[1], true.into());
        h.store.apply_remote(ids[2], false.into());

        let state = svc.primary_state(group_id).unwrap().unwrap();

        assert_eq!(state.fraction_label().as_deref(), Some("2/3"));
        assert_eq!(state.representative_value, Some(CharacteristicValue::Bool(true)));
    }

    #[tokio::test]
    async fn should_write_and_optimistically_update_every_member_on_toggle() {
        let h = harness();
        let svc = make_service(&h);
        let ids = [CharacteristicId::new(), CharacteristicId::new()];
        let group_id = svc.register(power_group(&ids)).unwrap();
        let mut rx = h.bus.subscribe(ids[1]);

        svc.act(group_id, GroupAction::Toggle(GroupRole::Power)).unwrap();
        flush().await;

        for id in ids {
            assert_eq!(h.transport.writes_to(id), vec![CharacteristicValue::Bool(true)]);
            assert_eq!(h.store.get(id), Some(true.into()));
        }
        let change = rx.recv().await.unwrap();
        assert!(change.is_local_change);
    }

    #[tokio::test]
    async fn should_keep_other_members_when_one_write_fails() {
        let h = harness();
        let svc = make_service(&h);
        let ids = [CharacteristicId::new(), CharacteristicId::new()];
        let group_id = svc.register(power_group(&ids)).unwrap();
        h.transport.fail(ids[0]);

        let writes = svc.act(group_id, GroupAction::Toggle(GroupRole::Power)).unwrap();
        flush().await;

        assert_eq!(writes.len(), 2);
        assert_eq!(h.transport.writes_to(ids[1]), vec![CharacteristicValue::Bool(true)]);
        assert_eq!(h.store.get(ids[0]), Some(true.into()));
    }

    #[tokio::test]
    async fn should_suppress_stale_position_reports_after_group_move() {
        let h = harness();
        let svc = make_service(&h);
        let current = CharacteristicId::new();
        let target = CharacteristicId::new();
        let group = DeviceGroup::builder()
            .name("Blinds")
            .member(GroupMember::with_target("blind", GroupRole::Position, current, Some(target)))
            .build()
            .unwrap();
        let group_id = svc.register(group).unwrap();

        svc.act(group_id, GroupAction::SetLevel(GroupRole::Position, 80.0))
            .unwrap();
        flush().await;
        h.clock.advance(seconds(2));

        assert!(!h.store.apply_remote(current, 45_i64.into()));
        assert_eq!(h.transport.writes_to(target), vec![CharacteristicValue::Int(80)]);
        assert_eq!(h.store.get(current), Some(80_i64.into()));
    }

    #[tokio::test]
    async fn should_not_wait_for_member_writes_to_be_acknowledged() {
        let h = harness();
        let transport = Arc::new(StalledTransport::default());
        let svc = GroupService::new(Arc::clone(&h.store), Arc::clone(&transport));
        let ids = [CharacteristicId::new(), CharacteristicId::new(), CharacteristicId::new()];
        let group_id = svc.register(power_group(&ids)).unwrap();

        let writes = svc.act(group_id, GroupAction::Toggle(GroupRole::Power)).unwrap();
        flush().await;

        assert_eq!(writes.len(), 3);
        assert_eq!(transport.started(), 3);
        for id in ids {
            assert_eq!(h.store.get(id), Some(true.into()));
        }
    }

    #[tokio::test]
    async fn should_recompute_only_groups_containing_changed_member() {
        let h = harness();
        let svc = make_service(&h);
        let a = CharacteristicId::new();
        let b = CharacteristicId::new();
        let first = svc.register(power_group(&[a])).unwrap();
        svc.register(power_group(&[b])).unwrap();

        h.store.apply_remote(a, true.into());
        let updates = svc.on_change(a);

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].group_id, first);
        assert_eq!(updates[0].state.on_count, 1);
    }

    #[tokio::test]
    async fn should_reject_invalid_group() {
        let h = harness();
        let svc = make_service(&h);
        let result = svc.register(DeviceGroup {
            id: GroupId::new(),
            name: "Empty".to_string(),
            members: Vec::new(),
        });
        assert!(matches!(
            result,
            Err(HomeSyncError::Validation(ValidationError::NoMembers))
        ));
    }
}
