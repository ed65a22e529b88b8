//! Device groups: N member characteristics presented as one control.
//!
//! A group lists members by role. The group control aggregates the
//! members of one role into a [`GroupAggregateState`] and fans a single
//! [`GroupAction`] out to every member as a list of [`GroupWrite`]s.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actuator::{ActuatorKind, Reading};
use crate::error::ValidationError;
use crate::id::{CharacteristicId, GroupId};
use crate::suppression::SuppressionPolicy;
use crate::value::CharacteristicValue;

/// Semantic role of a member characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    /// On/off power state (bool).
    Power,
    /// Active flag of fans, purifiers, valves (int 0/1).
    Active,
    /// Lock state, locked counts as "on" (int 0/1 or "locked"/"unlocked").
    Lock,
    /// Window covering position 0–100.
    Position,
    Brightness,
    Hue,
    Saturation,
    ColorTemperature,
}

/// How member values of one role are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationRule {
    /// Logical OR; unknown members count as off.
    AnyOn,
    /// Arithmetic mean of known members; unknown members are excluded.
    Mean,
}

impl GroupRole {
    /// Roles in the order used to pick a group's primary control.
    pub const PRIORITY: [Self; 8] = [
        Self::Power,
        Self::Active,
        Self::Lock,
        Self::Position,
        Self::Brightness,
        Self::Hue,
        Self::Saturation,
        Self::ColorTemperature,
    ];

    #[must_use]
    pub fn rule(self) -> AggregationRule {
        match self {
            Self::Power | Self::Active | Self::Lock => AggregationRule::AnyOn,
            Self::Position
            | Self::Brightness
            | Self::Hue
            | Self::Saturation
            | Self::ColorTemperature => AggregationRule::Mean,
        }
    }

    /// Encode an on/off state for this role.
    #[must_use]
    pub fn switch_value(self, on: bool) -> CharacteristicValue {
        match self {
            Self::Power => CharacteristicValue::Bool(on),
            _ => CharacteristicValue::Int(i64::from(on)),
        }
    }

    /// Encode a numeric level for this role, clamped to its range.
    ///
    /// Hue and saturation are floats, everything else is an integer.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn level_value(self, level: f64) -> CharacteristicValue {
        match self {
            Self::Hue => CharacteristicValue::Float(level.clamp(0.0, 360.0)),
            Self::Saturation => CharacteristicValue::Float(level.clamp(0.0, 100.0)),
            Self::Position | Self::Brightness => {
                CharacteristicValue::Int(level.clamp(0.0, 100.0).round() as i64)
            }
            Self::ColorTemperature => CharacteristicValue::Int(level.max(0.0).round() as i64),
            Self::Power | Self::Active | Self::Lock => CharacteristicValue::Int(i64::from(level > 0.0)),
        }
    }

    /// Whether `value` reads as "on" for this role.
    #[must_use]
    pub fn is_on(self, value: &CharacteristicValue) -> bool {
        match self {
            Self::Lock => matches!(
                ActuatorKind::Lock.decode(value),
                Reading::Settled(state) if state.as_i64() == Some(1)
            ),
            _ => value.as_bool().unwrap_or(false),
        }
    }

    /// Suppression applied to the state characteristic after a group write.
    #[must_use]
    pub fn suppression(self) -> SuppressionPolicy {
        match self {
            Self::Power | Self::Active | Self::Lock | Self::Position => SuppressionPolicy::Positional,
            Self::Brightness | Self::Hue | Self::Saturation | Self::ColorTemperature => {
                SuppressionPolicy::Immediate
            }
        }
    }
}

impl fmt::Display for GroupRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Power => "power",
            Self::Active => "active",
            Self::Lock => "lock",
            Self::Position => "position",
            Self::Brightness => "brightness",
            Self::Hue => "hue",
            Self::Saturation => "saturation",
            Self::ColorTemperature => "color_temperature",
        };
        f.write_str(name)
    }
}

/// One member characteristic of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Key of the device this characteristic belongs to; pairs the power
    /// and brightness members of the same light.
    pub device: String,
    pub role: GroupRole,
    /// Characteristic read for aggregation and updated optimistically.
    pub state_id: CharacteristicId,
    /// Characteristic written on user action. Defaults to `state_id`;
    /// `None` when the device cannot be commanded for this role.
    #[serde(default)]
    pub write_id: Option<CharacteristicId>,
}

impl GroupMember {
    /// A member read and written through the same characteristic.
    #[must_use]
    pub fn new(device: impl Into<String>, role: GroupRole, id: CharacteristicId) -> Self {
        Self {
            device: device.into(),
            role,
            state_id: id,
            write_id: Some(id),
        }
    }

    /// A member with distinct state and write characteristics.
    #[must_use]
    pub fn with_target(
        device: impl Into<String>,
        role: GroupRole,
        state_id: CharacteristicId,
        write_id: Option<CharacteristicId>,
    ) -> Self {
        Self {
            device: device.into(),
            role,
            state_id,
            write_id,
        }
    }
}

/// A user-defined device group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGroup {
    pub id: GroupId,
    pub name: String,
    pub members: Vec<GroupMember>,
}

impl DeviceGroup {
    #[must_use]
    pub fn builder() -> DeviceGroupBuilder {
        DeviceGroupBuilder::default()
    }

    /// Validate invariants of a deserialized or hand-built group.
    ///
    /// # Errors
    ///
    /// Empty name, no members, or a state characteristic listed twice.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.members.is_empty() {
            return Err(ValidationError::NoMembers);
        }
        let mut seen = HashSet::new();
        for member in &self.members {
            if !seen.insert(member.state_id) {
                return Err(ValidationError::DuplicateMember(member.state_id));
            }
        }
        Ok(())
    }

    /// Role shown as the main control of the group.
    #[must_use]
    pub fn primary_role(&self) -> Option<GroupRole> {
        GroupRole::PRIORITY
            .into_iter()
            .find(|role| self.members.iter().any(|m| m.role == *role))
    }

    fn members_with(&self, role: GroupRole) -> impl Iterator<Item = &GroupMember> {
        self.members.iter().filter(move |m| m.role == role)
    }

    /// Every state characteristic this group depends on.
    #[must_use]
    pub fn characteristic_ids(&self) -> Vec<CharacteristicId> {
        self.members.iter().map(|m| m.state_id).collect()
    }

    /// Combine the current values of the members of `role`.
    ///
    /// Returns `None` when the group has no member with that role.
    pub fn aggregate<F>(&self, role: GroupRole, lookup: F) -> Option<GroupAggregateState>
    where
        F: Fn(CharacteristicId) -> Option<CharacteristicValue>,
    {
        let values: Vec<Option<CharacteristicValue>> =
            self.members_with(role).map(|m| lookup(m.state_id)).collect();
        if values.is_empty() {
            return None;
        }

        let total_count = values.len();
        let known: Vec<&CharacteristicValue> = values.iter().flatten().collect();
        let on_count = known.iter().filter(|v| role.is_on(v)).count();

        let representative_value = match role.rule() {
            AggregationRule::AnyOn => Some(role.switch_value(on_count > 0)),
            AggregationRule::Mean => {
                let numbers: Vec<f64> = known.iter().filter_map(|v| v.as_f64()).collect();
                #[allow(clippy::cast_precision_loss)]
                let mean = (!numbers.is_empty())
                    .then(|| numbers.iter().sum::<f64>() / numbers.len() as f64);
                mean.map(CharacteristicValue::Float)
            }
        };

        Some(GroupAggregateState {
            role,
            representative_value,
            on_count,
            total_count,
            known_count: known.len(),
        })
    }

    /// Turn a user action into the writes to issue, one per commandable
    /// member. Members without a write characteristic are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::RoleMismatch`] when the action does not
    /// apply to the requested role.
    pub fn plan<F>(&self, action: GroupAction, lookup: F) -> Result<Vec<GroupWrite>, ValidationError>
    where
        F: Fn(CharacteristicId) -> Option<CharacteristicValue>,
    {
        match action {
            GroupAction::Toggle(role) => self.plan_toggle(role, lookup),
            GroupAction::SetLevel(role, level) => self.plan_level(role, level, lookup),
        }
    }

    fn plan_toggle<F>(&self, role: GroupRole, lookup: F) -> Result<Vec<GroupWrite>, ValidationError>
    where
        F: Fn(CharacteristicId) -> Option<CharacteristicValue>,
    {
        let Some(state) = self.aggregate(role, &lookup) else {
            return Ok(Vec::new());
        };
        let turn_on = state.on_count == 0;
        let value = match role.rule() {
            AggregationRule::AnyOn => role.switch_value(turn_on),
            AggregationRule::Mean if role == GroupRole::Position => {
                role.level_value(if turn_on { 100.0 } else { 0.0 })
            }
            AggregationRule::Mean => {
                return Err(ValidationError::RoleMismatch {
                    role,
                    action: "toggle",
                });
            }
        };
        Ok(self.writes_for(role, &value, |_| true))
    }

    fn plan_level<F>(
        &self,
        role: GroupRole,
        level: f64,
        lookup: F,
    ) -> Result<Vec<GroupWrite>, ValidationError>
    where
        F: Fn(CharacteristicId) -> Option<CharacteristicValue>,
    {
        if role.rule() != AggregationRule::Mean {
            return Err(ValidationError::RoleMismatch {
                role,
                action: "set_level",
            });
        }
        let value = role.level_value(level);
        if role != GroupRole::Brightness {
            return Ok(self.writes_for(role, &value, |_| true));
        }

        let powered: HashMap<&str, bool> = self
            .members_with(GroupRole::Power)
            .map(|m| {
                let on = lookup(m.state_id).is_some_and(|v| GroupRole::Power.is_on(&v));
                (m.device.as_str(), on)
            })
            .collect();
        let all_off = !powered.is_empty() && powered.values().all(|on| !on);

        if all_off && level > 0.0 {
            let mut writes = self.writes_for(GroupRole::Power, &GroupRole::Power.switch_value(true), |_| true);
            writes.extend(self.writes_for(role, &value, |_| true));
            return Ok(writes);
        }
        Ok(self.writes_for(role, &value, |m| {
            powered.get(m.device.as_str()).copied().unwrap_or(true)
        }))
    }

    fn writes_for<P>(&self, role: GroupRole, value: &CharacteristicValue, keep: P) -> Vec<GroupWrite>
    where
        P: Fn(&GroupMember) -> bool,
    {
        self.members_with(role)
            .filter(|m| keep(m))
            .filter_map(|m| {
                m.write_id.map(|write_id| GroupWrite {
                    write_id,
                    state_id: m.state_id,
                    value: value.clone(),
                    policy: role.suppression(),
                })
            })
            .collect()
    }
}

/// Aggregate of one role across a group. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregateState {
    pub role: GroupRole,
    /// OR of members for switch roles, mean of known members otherwise.
    /// `None` when no member value is known yet.
    pub representative_value: Option<CharacteristicValue>,
    pub on_count: usize,
    pub total_count: usize,
    /// Members with a known value.
    pub known_count: usize,
}

impl GroupAggregateState {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.on_count > 0 && self.on_count < self.total_count
    }

    /// `"on/total"`, only shown when the group is partially on.
    #[must_use]
    pub fn fraction_label(&self) -> Option<String> {
        self.is_partial()
            .then(|| format!("{}/{}", self.on_count, self.total_count))
    }
}

/// A user action against the group control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupAction {
    /// Flip the aggregate: anything on turns everything off.
    Toggle(GroupRole),
    /// Set every member to an absolute level.
    SetLevel(GroupRole, f64),
}

/// One member write produced by [`DeviceGroup::plan`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupWrite {
    pub write_id: CharacteristicId,
    /// Characteristic to update optimistically.
    pub state_id: CharacteristicId,
    pub value: CharacteristicValue,
    pub policy: SuppressionPolicy,
}

/// Builder for [`DeviceGroup`].
#[derive(Debug, Default)]
pub struct DeviceGroupBuilder {
    id: Option<GroupId>,
    name: Option<String>,
    members: Vec<GroupMember>,
}

impl DeviceGroupBuilder {
    #[must_use]
    pub fn id(mut self, id: GroupId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn member(mut self, member: GroupMember) -> Self {
        self.members.push(member);
        self
    }

    /// # Errors
    ///
    /// Same conditions as [`DeviceGroup::validate`].
    pub fn build(self) -> Result<DeviceGroup, ValidationError> {
        let group = DeviceGroup {
            id: self.id.unwrap_or_else(GroupId::new),
            name: self.name.unwrap_or_default(),
            members: self.members,
        };
        group.validate()?;
        Ok(group)
    }
}
