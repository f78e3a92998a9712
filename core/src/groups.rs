//! Session-start partition of participants into fixed-size groups.

use std::collections::HashMap;

use serde::Serialize;

use search_types::{ConfigurationError, GroupId, ParticipantId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    id: GroupId,
    members: Vec<ParticipantId>,
}

impl Group {
    #[must_use]
    pub fn id(&self) -> GroupId {
        self.id
    }

    #[must_use]
    pub fn members(&self) -> &[ParticipantId] {
        &self.members
    }

    #[must_use]
    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.members.contains(&participant)
    }
}

/// Write-once group membership for a session.
///
/// There is no mutating API: once formed, membership stays fixed for every
/// round of the experiment.
#[derive(Debug, Clone, Serialize)]
pub struct GroupAssignment {
    groups: Vec<Group>,
    #[serde(skip)]
    membership: HashMap<ParticipantId, GroupId>,
}

impl GroupAssignment {
    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        // Ids are assigned 1..=n in formation order.
        let index = usize::try_from(id.value()).ok()?.checked_sub(1)?;
        self.groups.get(index)
    }

    #[must_use]
    pub fn group_of(&self, participant: ParticipantId) -> Option<GroupId> {
        self.membership.get(&participant).copied()
    }

    /// Everyone sharing a group with `participant`, including itself.
    #[must_use]
    pub fn members_with(&self, participant: ParticipantId) -> Option<&[ParticipantId]> {
        self.group_of(participant)
            .and_then(|id| self.group(id))
            .map(Group::members)
    }
}

/// Partition `participants` into contiguous chunks of `group_size`, in the
/// order given.
///
/// Fails without creating anything when the list is empty, contains a
/// duplicate id, or does not divide evenly.
pub fn form_groups(
    participants: &[ParticipantId],
    group_size: u32,
) -> Result<GroupAssignment, ConfigurationError> {
    if group_size == 0 {
        return Err(ConfigurationError::ZeroGroupSize);
    }
    if participants.is_empty() {
        return Err(ConfigurationError::NoParticipants);
    }
    let size = group_size as usize;
    if !participants.len().is_multiple_of(size) {
        return Err(ConfigurationError::IndivisibleGroups {
            participants: participants.len(),
            group_size,
        });
    }

    let mut membership = HashMap::with_capacity(participants.len());
    let mut groups = Vec::with_capacity(participants.len() / size);
    for (index, chunk) in participants.chunks(size).enumerate() {
        let id = GroupId::new(index as u32 + 1);
        for &participant in chunk {
            if membership.insert(participant, id).is_some() {
                return Err(ConfigurationError::DuplicateParticipant(participant));
            }
        }
        groups.push(Group {
            id,
            members: chunk.to_vec(),
        });
    }

    tracing::info!(
        groups = groups.len(),
        group_size,
        participants = participants.len(),
        "Groups formed"
    );
    Ok(GroupAssignment { groups, membership })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: u32) -> Vec<ParticipantId> {
        (1..=n).map(ParticipantId::new).collect()
    }

    #[test]
    fn ten_participants_in_pairs() {
        let participants = ids(10);
        let assignment = form_groups(&participants, 2).unwrap();
        assert_eq!(assignment.len(), 5);
        for group in assignment.groups() {
            assert_eq!(group.members().len(), 2);
        }
        for participant in &participants {
            let holding: Vec<_> = assignment
                .groups()
                .iter()
                .filter(|group| group.contains(*participant))
                .collect();
            assert_eq!(holding.len(), 1);
            assert_eq!(assignment.group_of(*participant), Some(holding[0].id()));
        }
    }

    #[test]
    fn ten_participants_in_threes_is_rejected() {
        assert_eq!(
            form_groups(&ids(10), 3).unwrap_err(),
            ConfigurationError::IndivisibleGroups {
                participants: 10,
                group_size: 3
            }
        );
    }

    #[test]
    fn chunks_follow_encounter_order() {
        let participants = [7, 3, 9, 1].map(ParticipantId::new);
        let assignment = form_groups(&participants, 2).unwrap();
        assert_eq!(
            assignment.groups()[0].members(),
            &[ParticipantId::new(7), ParticipantId::new(3)]
        );
        assert_eq!(
            assignment.members_with(ParticipantId::new(1)),
            Some(&[ParticipantId::new(9), ParticipantId::new(1)][..])
        );
    }

    #[test]
    fn singletons_for_group_size_one() {
        let assignment = form_groups(&ids(3), 1).unwrap();
        assert_eq!(assignment.len(), 3);
        assert_eq!(
            assignment.group(GroupId::new(2)).map(Group::members),
            Some(&[ParticipantId::new(2)][..])
        );
        assert!(assignment.group(GroupId::new(0)).is_none());
        assert!(assignment.group(GroupId::new(4)).is_none());
    }

    #[test]
    fn rejects_duplicates_and_empty_sessions() {
        let participants = [1, 2, 2, 3].map(ParticipantId::new);
        assert_eq!(
            form_groups(&participants, 2).unwrap_err(),
            ConfigurationError::DuplicateParticipant(ParticipantId::new(2))
        );
        assert_eq!(
            form_groups(&[], 2).unwrap_err(),
            ConfigurationError::NoParticipants
        );
        assert_eq!(
            form_groups(&ids(2), 0).unwrap_err(),
            ConfigurationError::ZeroGroupSize
        );
    }
}
