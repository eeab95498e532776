use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::level::{LevelHeader, ObjectId, ObjectKind, ObjectRecord, Vec2};

use super::easing::Easing;
use super::edits::{EditQueue, EditSender, LevelEdit};
use super::moves::{MoveCommand, MoveHandle, MoveScheduler, TickReport};
use super::sections::SectionIndex;
use super::store::{GroupTable, ObjectStore, PlacedObject};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldTickReport {
    pub edits_applied: usize,
    pub triggers_fired: usize,
    pub moves: TickReport,
}

/// A level that is being simulated: its objects, their section buckets and the
/// moves driving them.
#[derive(Debug)]
pub struct RuntimeLevel {
    level_id: i64,
    header: LevelHeader,
    objects: ObjectStore,
    groups: GroupTable,
    sections: SectionIndex,
    moves: MoveScheduler,
    edits: EditQueue,
    player_x: f32,
    player_speed: f32,
    triggers: Vec<ObjectId>,
    next_trigger: usize,
    ticks: u64,
}

impl RuntimeLevel {
    pub fn new(
        level_id: i64,
        header: LevelHeader,
        records: impl IntoIterator<Item = ObjectRecord>,
        config: &EngineConfig,
    ) -> Self {
        let mut objects = ObjectStore::new();
        let mut groups = GroupTable::new();
        let mut sections = SectionIndex::new(config.effective_section_width());
        let mut triggers = Vec::new();

        for record in records {
            let id = objects.next_id();
            let section = sections.bucket_for(record.position.x);
            let object = PlacedObject::from_record(id, record, section);
            for group in &object.groups {
                groups.add(*group, id);
            }
            if matches!(object.kind, ObjectKind::MoveTrigger(_)) {
                triggers.push(id);
            }
            sections.insert(id, section);
            objects.push(object);
        }

        triggers.sort_by(|left, right| {
            let left_x = objects.get(*left).map_or(0.0, |object| object.position.x);
            let right_x = objects.get(*right).map_or(0.0, |object| object.position.x);
            left_x.total_cmp(&right_x).then(left.cmp(right))
        });

        let edits = EditQueue::new(config.edit_queue_capacity);
        info!(
            level_id,
            object_count = objects.len(),
            section_count = sections.section_count(),
            occupied_sections = sections.occupied_sections(),
            group_count = groups.group_count(),
            move_trigger_count = triggers.len(),
            edit_queue_capacity = edits.capacity(),
            "section_index_built"
        );

        Self {
            level_id,
            header,
            objects,
            groups,
            sections,
            moves: MoveScheduler::new(),
            edits,
            player_x: 0.0,
            player_speed: config.simulation.player_speed,
            triggers,
            next_trigger: 0,
            ticks: 0,
        }
    }

    pub fn level_id(&self) -> i64 {
        self.level_id
    }

    pub fn header(&self) -> &LevelHeader {
        &self.header
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn object(&self, id: ObjectId) -> Option<&PlacedObject> {
        self.objects.get(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = &PlacedObject> {
        self.objects.iter()
    }

    pub fn sections(&self) -> &SectionIndex {
        &self.sections
    }

    pub fn section_count(&self) -> usize {
        self.sections.section_count()
    }

    /// Read-only view of one section for renderers and inspectors.
    pub fn objects_in_section(&self, section: usize) -> impl Iterator<Item = &PlacedObject> {
        self.sections
            .objects_in_section(section)
            .filter_map(|id| self.objects.get(id))
    }

    pub fn moves(&self) -> &MoveScheduler {
        &self.moves
    }

    pub fn schedule_move(&mut self, command: MoveCommand) -> MoveHandle {
        self.moves.schedule(command)
    }

    pub fn cancel_move(&mut self, handle: MoveHandle) -> bool {
        self.moves.cancel(handle)
    }

    pub fn edit_sender(&self) -> EditSender {
        self.edits.sender()
    }

    pub fn player_x(&self) -> f32 {
        self.player_x
    }

    pub fn set_player_speed(&mut self, speed: f32) {
        if speed.is_finite() {
            self.player_speed = speed;
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advances the level by one step: queued edits first, then move triggers
    /// the player has reached, then running moves.
    pub fn tick(&mut self, dt_secs: f32) -> WorldTickReport {
        let dt_secs = if dt_secs.is_finite() { dt_secs.max(0.0) } else { 0.0 };
        let mut report = WorldTickReport::default();

        for edit in self.edits.drain() {
            self.apply_edit(edit);
            report.edits_applied += 1;
        }

        self.player_x += self.player_speed * dt_secs;
        report.triggers_fired = self.fire_reached_triggers();

        report.moves = self.moves.tick(
            dt_secs,
            &self.groups,
            &mut self.objects,
            &mut self.sections,
        );
        self.ticks = self.ticks.saturating_add(1);
        report
    }

    fn fire_reached_triggers(&mut self) -> usize {
        let mut fired = 0;
        while let Some(id) = self.triggers.get(self.next_trigger).copied() {
            let Some(object) = self.objects.get(id) else {
                self.next_trigger += 1;
                continue;
            };
            if object.position.x > self.player_x {
                break;
            }
            self.next_trigger += 1;

            let ObjectKind::MoveTrigger(trigger) = &object.kind else {
                continue;
            };
            let Some(target) = trigger.target_group else {
                debug!(trigger = id.0, "move_trigger_without_target");
                continue;
            };
            let command = MoveCommand {
                target,
                delta: trigger.offset,
                duration_secs: trigger.duration_secs,
                easing: Easing::from_id(trigger.easing_id, trigger.easing_rate),
            };
            debug!(
                trigger = id.0,
                trigger_x = object.position.x,
                player_x = self.player_x,
                group = target.0,
                "move_trigger_fired"
            );
            self.moves.schedule(command);
            fired += 1;
        }
        fired
    }

    fn apply_edit(&mut self, edit: LevelEdit) {
        match edit {
            LevelEdit::SetPosition { object, position } => self.place(object, |_| position),
            LevelEdit::Translate { object, delta } => {
                self.place(object, |current| current + delta)
            }
            LevelEdit::CancelMovesForGroup(group) => {
                let cancelled = self.moves.cancel_group(group);
                debug!(group = group.0, cancelled, "level_edit_cancelled_moves");
            }
        }
    }

    fn place(&mut self, id: ObjectId, next: impl FnOnce(Vec2) -> Vec2) {
        let Some(object) = self.objects.get_mut(id) else {
            debug!(object = id.0, "level_edit_unknown_object");
            return;
        };
        let position = next(object.position);
        if !position.x.is_finite() || !position.y.is_finite() {
            debug!(object = id.0, "level_edit_non_finite_position");
            return;
        }

        object.position = position;
        let section = self.sections.bucket_for(position.x);
        if section != object.section {
            self.sections.relocate(id, object.section, section);
            object.section = section;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::level::{parse_body, GroupId};
    use crate::runtime::{EditQueueError, MoveState, MAX_SECTION};

    fn level(body: &str) -> RuntimeLevel {
        let parsed = parse_body(body);
        RuntimeLevel::new(1, parsed.header, parsed.objects, &EngineConfig::default())
    }

    fn member_sections(level: &RuntimeLevel, id: ObjectId) -> Vec<usize> {
        (0..level.section_count())
            .filter(|section| level.sections().contains(id, *section))
            .collect()
    }

    #[test]
    fn objects_are_bucketed_on_load() {
        let level = level("kA2,0;1,1,2,15,3,15;1,1,2,250,3,15;1,1,2,950,3,15;");

        assert_eq!(level.object_count(), 3);
        assert_eq!(level.section_count(), 9);
        let in_zero = level
            .objects_in_section(0)
            .map(|object| object.id)
            .collect::<Vec<_>>();
        assert_eq!(in_zero, vec![ObjectId(0)]);
        assert_eq!(level.objects_in_section(1).count(), 1);
        assert_eq!(level.objects_in_section(8).count(), 1);
        assert_eq!(level.objects_in_section(50).count(), 0);
    }

    #[test]
    fn far_right_object_is_indexed_without_dense_allocation() {
        let level = level("1,1,2,3e38,3,0;1,1,2,15,3,0;");

        assert_eq!(level.object_count(), 2);
        assert_eq!(level.sections().occupied_sections(), 2);
        assert_eq!(level.section_count(), MAX_SECTION + 1);
        let far = level.object(ObjectId(0)).expect("far object");
        assert_eq!(far.section, MAX_SECTION);
        assert_eq!(level.objects_in_section(MAX_SECTION).count(), 1);
    }

    #[test]
    fn move_trigger_fires_when_player_passes_it() {
        let mut level = level(
            "1,901,2,100,3,0,10,0.5,28,400,51,3;1,1,2,300,3,0,57,3;1,1,2,300,3,30;",
        );

        let mut fired = 0;
        for _ in 0..10 {
            fired += level.tick(0.1).triggers_fired;
        }
        assert_eq!(fired, 1);

        let moved = level.object(ObjectId(1)).expect("moved");
        assert!((moved.position.x - 700.0).abs() < 1e-3, "{}", moved.position.x);
        assert_eq!(member_sections(&level, ObjectId(1)), vec![6]);

        let untouched = level.object(ObjectId(2)).expect("untouched");
        assert_eq!(untouched.position.x, 300.0);
    }

    #[test]
    fn trigger_without_target_fires_nothing() {
        let mut level = level("1,901,2,0,3,0,10,1,28,100;1,1,2,50,3,0,57,1;");
        let report = level.tick(0.016);
        assert_eq!(report.triggers_fired, 0);
        assert_eq!(level.moves().pending_count() + level.moves().active_count(), 0);
    }

    #[test]
    fn edits_apply_before_moves_on_the_next_tick() {
        let mut level = level("1,1,2,0,3,0,57,2;");
        let handle = level.schedule_move(MoveCommand {
            target: GroupId(2),
            delta: Vec2::new(100.0, 0.0),
            duration_secs: 1.0,
            easing: Easing::Linear,
        });
        let sender = level.edit_sender();

        thread::spawn(move || {
            sender
                .try_send(LevelEdit::SetPosition {
                    object: ObjectId(0),
                    position: Vec2::new(1_000.0, 0.0),
                })
                .expect("send");
        })
        .join()
        .expect("join");

        let report = level.tick(0.5);
        assert_eq!(report.edits_applied, 1);
        let object = level.object(ObjectId(0)).expect("object");
        assert!((object.position.x - 1_050.0).abs() < 1e-3, "{}", object.position.x);
        assert_eq!(member_sections(&level, ObjectId(0)), vec![9]);
        assert_eq!(level.moves().state(handle), Some(MoveState::Active));
    }

    #[test]
    fn cancel_edit_stops_group_moves() {
        let mut level = level("1,1,2,0,3,0,57,2;");
        let handle = level.schedule_move(MoveCommand {
            target: GroupId(2),
            delta: Vec2::new(100.0, 0.0),
            duration_secs: 1.0,
            easing: Easing::Linear,
        });
        level.tick(0.25);
        level
            .edit_sender()
            .try_send(LevelEdit::CancelMovesForGroup(GroupId(2)))
            .expect("send");
        level.tick(0.25);

        assert_eq!(level.moves().state(handle), Some(MoveState::Cancelled));
        let object = level.object(ObjectId(0)).expect("object");
        assert!((object.position.x - 25.0).abs() < 1e-3);
    }

    #[test]
    fn translate_edit_relocates_and_ignores_unknown_objects() {
        let mut level = level("1,1,2,0,3,0;");
        let sender = level.edit_sender();
        sender
            .try_send(LevelEdit::Translate {
                object: ObjectId(0),
                delta: Vec2::new(450.0, 0.0),
            })
            .expect("translate");
        sender
            .try_send(LevelEdit::Translate {
                object: ObjectId(7),
                delta: Vec2::new(1.0, 0.0),
            })
            .expect("unknown");

        assert_eq!(level.tick(0.0).edits_applied, 2);
        assert_eq!(member_sections(&level, ObjectId(0)), vec![3]);
        assert_eq!(level.sections().len(), 1);
    }

    #[test]
    fn edit_queue_reports_full() {
        let parsed = parse_body("1,1,2,0,3,0;");
        let config = EngineConfig {
            edit_queue_capacity: 1,
            ..EngineConfig::default()
        };
        let level = RuntimeLevel::new(1, parsed.header, parsed.objects, &config);
        let sender = level.edit_sender();
        let edit = LevelEdit::CancelMovesForGroup(GroupId(1));

        assert_eq!(sender.try_send(edit), Ok(()));
        assert_eq!(sender.try_send(edit), Err(EditQueueError::Full));
    }
}
