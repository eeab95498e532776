use std::collections::VecDeque;

use tracing::debug;

use crate::level::{GroupId, ObjectId, Vec2};

use super::easing::Easing;
use super::sections::SectionIndex;
use super::store::{GroupTable, ObjectStore};

/// Slack for accumulated tick durations that land just short of a command's
/// duration.
const COMPLETION_EPSILON_SECS: f64 = 1e-6;

/// How many finished moves keep a queryable outcome.
pub const FINISHED_HISTORY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveCommand {
    pub target: GroupId,
    pub delta: Vec2,
    pub duration_secs: f32,
    pub easing: Easing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MoveHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    Pending,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub activated: usize,
    pub completed: usize,
    pub objects_moved: usize,
    pub relocations: usize,
}

impl TickReport {
    pub fn absorb(&mut self, other: TickReport) {
        self.activated += other.activated;
        self.completed += other.completed;
        self.objects_moved += other.objects_moved;
        self.relocations += other.relocations;
    }
}

#[derive(Debug, Clone, Copy)]
struct ObjectTrack {
    id: ObjectId,
    start: Vec2,
    previous: Vec2,
}

#[derive(Debug, Clone)]
struct MoveRun {
    handle: MoveHandle,
    command: MoveCommand,
    state: MoveState,
    elapsed_secs: f64,
    tracks: Vec<ObjectTrack>,
}

/// Runs timed group moves. Several moves may drive the same object at once;
/// each one rebases its start on displacement applied by others since its
/// previous step, so the displacements add up.
///
/// A finished move releases its state; only the outcomes of the last
/// [`FINISHED_HISTORY`] finished moves stay queryable.
#[derive(Debug, Default)]
pub struct MoveScheduler {
    next_handle: u64,
    runs: Vec<MoveRun>,
    finished: VecDeque<(MoveHandle, MoveState)>,
}

impl MoveScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a move. It starts on the next [`MoveScheduler::tick`].
    pub fn schedule(&mut self, command: MoveCommand) -> MoveHandle {
        let handle = MoveHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.runs.push(MoveRun {
            handle,
            command,
            state: MoveState::Pending,
            elapsed_secs: 0.0,
            tracks: Vec::new(),
        });
        debug!(
            handle = handle.0,
            group = command.target.0,
            delta_x = command.delta.x,
            delta_y = command.delta.y,
            duration_secs = command.duration_secs,
            "move_command_scheduled"
        );
        handle
    }

    /// Stops a pending or active move where it is. Returns false when the
    /// handle is unknown or already finished.
    pub fn cancel(&mut self, handle: MoveHandle) -> bool {
        let Some(position) = self.runs.iter().position(|run| run.handle == handle) else {
            return false;
        };
        let run = self.runs.remove(position);
        self.record_finished(run.handle, MoveState::Cancelled);
        debug!(handle = handle.0, "move_command_cancelled");
        true
    }

    pub fn cancel_group(&mut self, group: GroupId) -> usize {
        let handles = self
            .runs
            .iter()
            .filter(|run| run.command.target == group)
            .map(|run| run.handle)
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .filter(|handle| self.cancel(*handle))
            .count()
    }

    /// `None` for unknown handles and for finished moves older than the
    /// retained history.
    pub fn state(&self, handle: MoveHandle) -> Option<MoveState> {
        self.runs
            .iter()
            .find(|run| run.handle == handle)
            .map(|run| run.state)
            .or_else(|| {
                self.finished
                    .iter()
                    .find(|(finished, _)| *finished == handle)
                    .map(|(_, state)| *state)
            })
    }

    pub fn finished_history_len(&self) -> usize {
        self.finished.len()
    }

    fn record_finished(&mut self, handle: MoveHandle, state: MoveState) {
        if self.finished.len() == FINISHED_HISTORY {
            self.finished.pop_front();
        }
        self.finished.push_back((handle, state));
    }

    pub fn active_count(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| run.state == MoveState::Active)
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| run.state == MoveState::Pending)
            .count()
    }

    pub fn tick(
        &mut self,
        dt_secs: f32,
        groups: &GroupTable,
        objects: &mut ObjectStore,
        sections: &mut SectionIndex,
    ) -> TickReport {
        let mut report = TickReport::default();
        let dt_secs = if dt_secs.is_finite() { dt_secs.max(0.0) } else { 0.0 };

        for run in &mut self.runs {
            if run.state == MoveState::Pending {
                activate(run, groups, objects);
                report.activated += 1;
            }

            run.elapsed_secs += f64::from(dt_secs);
            let progress = run_progress(run);
            let eased = run.command.easing.apply(progress);
            step_run(run, eased, objects, sections, &mut report);

            if progress >= 1.0 {
                run.state = MoveState::Completed;
                run.tracks = Vec::new();
                report.completed += 1;
                debug!(
                    handle = run.handle.0,
                    group = run.command.target.0,
                    elapsed_secs = run.elapsed_secs,
                    "move_command_completed"
                );
            }
        }

        let mut completed = Vec::new();
        self.runs.retain(|run| {
            if run.state == MoveState::Completed {
                completed.push(run.handle);
                false
            } else {
                true
            }
        });
        for handle in completed {
            self.record_finished(handle, MoveState::Completed);
        }

        report
    }
}

fn activate(run: &mut MoveRun, groups: &GroupTable, objects: &ObjectStore) {
    run.tracks = groups
        .members(run.command.target)
        .iter()
        .filter_map(|id| objects.get(*id))
        .map(|object| ObjectTrack {
            id: object.id,
            start: object.position,
            previous: object.position,
        })
        .collect();
    run.state = MoveState::Active;
}

fn run_progress(run: &MoveRun) -> f32 {
    let duration = f64::from(run.command.duration_secs);
    let done = duration.is_nan()
        || duration <= 0.0
        || run.elapsed_secs + COMPLETION_EPSILON_SECS >= duration;
    if done {
        return 1.0;
    }
    (run.elapsed_secs / duration) as f32
}

fn step_run(
    run: &mut MoveRun,
    eased: f32,
    objects: &mut ObjectStore,
    sections: &mut SectionIndex,
    report: &mut TickReport,
) {
    let delta = run.command.delta;
    for track in &mut run.tracks {
        let Some(object) = objects.get_mut(track.id) else {
            continue;
        };

        let moved_by_others = object.position - track.previous;
        track.start += moved_by_others;
        let next = track.start + delta * eased;
        object.position = next;
        track.previous = next;
        report.objects_moved += 1;

        let section = sections.bucket_for(next.x);
        if section != object.section {
            sections.relocate(object.id, object.section, section);
            object.section = section;
            report.relocations += 1;
        }
    }
}
