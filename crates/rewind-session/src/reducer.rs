//! Session reducer
//!
//! `transition(state, action) -> (state', effects)`. The input state is never
//! touched: the reducer edits a private copy and hands it back only when the
//! action is accepted, so a rejected action leaves no partial edits behind.
//!
//! Effects are computed alongside the edit they describe. The caller executes
//! them in order: `Send` goes to the outbound channel, `CancelTimer` to the
//! timer service.

use std::collections::BTreeMap;

use rewind_tabs::{TabId, TabPayload, TabSession};

use crate::action::{Action, StepOrigin, TabBatch};
use crate::effect::{Effect, OutboundMessage};
use crate::error::SessionError;
use crate::session::{Session, TabElection};
use crate::Result;

/// Outcome of an accepted action
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Session,
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn messages(&self) -> impl Iterator<Item = &OutboundMessage> {
        self.effects.iter().filter_map(Effect::message)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reducer {
    election: TabElection,
}

/// Apply one action with the default tab election rule
pub fn transition(state: &Session, action: Action) -> Result<Transition> {
    Reducer::default().transition(state, action)
}

impl Reducer {
    pub fn new(election: TabElection) -> Self {
        Self { election }
    }

    pub fn election(&self) -> TabElection {
        self.election
    }

    pub fn transition(&self, state: &Session, action: Action) -> Result<Transition> {
        let kind = action.kind();
        let mut next = state.clone();
        let mut effects = Vec::new();

        self.apply(&mut next, action, &mut effects)?;

        tracing::debug!(
            action = %kind,
            active_tab = ?next.active_tab,
            cursor = ?next.active().map(|(_, tab)| tab.cursor_index),
            effects = effects.len(),
            "Applied transition"
        );

        Ok(Transition {
            state: next,
            effects,
        })
    }

    fn apply(&self, session: &mut Session, action: Action, effects: &mut Vec<Effect>) -> Result<()> {
        match action {
            Action::MoveBackward => {
                let (id, tab) = session.active_mut()?;
                if let Some(index) = tab.step_backward() {
                    effects.push(jump(id, tab, index));
                    interrupt_playback(tab, effects);
                }
            }
            Action::MoveForward { origin } => {
                let (id, tab) = session.active_mut()?;
                if origin == StepOrigin::Timer && !tab.playing {
                    tracing::debug!(tab_id = %id, "Ignoring stale playback tick");
                    return Ok(());
                }
                if let Some(index) = tab.step_forward() {
                    effects.push(jump(id, tab, index));
                    if origin == StepOrigin::User {
                        interrupt_playback(tab, effects);
                    }
                }
            }
            Action::ChangeView(index) => {
                let (_, tab) = session.active_mut()?;
                tab.toggle_view(index)?;
            }
            Action::ChangeSlider(index) => {
                let (id, tab) = session.active_mut()?;
                let moved = tab.cursor_index != index;
                tab.seek(index)?;
                effects.push(jump(id, tab, index));
                if moved {
                    interrupt_playback(tab, effects);
                }
            }
            Action::Empty => {
                let (id, tab) = session.active_mut()?;
                let timer = tab.empty();
                effects.push(Effect::Send(OutboundMessage::empty_snap(id)));
                effects.extend(timer.map(Effect::CancelTimer));
            }
            Action::SetChannel(handle) => {
                session.channel = Some(handle);
            }
            Action::Import(snapshots) => {
                let (id, tab) = session.active_mut()?;
                tab.import(snapshots.clone());
                effects.push(Effect::Send(OutboundMessage::import(id, snapshots)));
            }
            Action::ToggleMode(flag) => {
                let (id, tab) = session.active_mut()?;
                let value = tab.toggle_mode(flag);
                effects.push(Effect::Send(OutboundMessage::set_mode(id, flag, value)));
            }
            Action::Pause => {
                let (_, tab) = session.active_mut()?;
                interrupt_playback(tab, effects);
            }
            Action::Play(handle) => {
                let (_, tab) = session.active_mut()?;
                effects.extend(tab.start_playback(handle).map(Effect::CancelTimer));
            }
            Action::InitialConnect(batch) => self.connect(session, batch)?,
            Action::NewSnapshots(batch) => self.refresh(session, batch, effects)?,
            Action::SetTab(id) => {
                if !session.tabs.contains_key(&id) {
                    return Err(SessionError::TabNotFound(id));
                }
                // Playback only runs on the focused tab
                if let Some(previous) = session.active_tab.filter(|previous| *previous != id) {
                    if let Some(tab) = session.tabs.get_mut(&previous) {
                        interrupt_playback(tab, effects);
                    }
                }
                session.active_tab = Some(id);
            }
            Action::DeleteTab(id) => {
                remove_tab(session, id, effects);
                if session.active_tab == Some(id) {
                    session.active_tab = session.tabs.keys().next().copied();
                    tracing::info!(
                        deleted = %id,
                        active_tab = ?session.active_tab,
                        "Reassigned active tab"
                    );
                }
            }
        }

        Ok(())
    }

    /// Create sessions for newly reported targets. Known targets keep their state.
    fn connect(&self, session: &mut Session, batch: TabBatch) -> Result<()> {
        let reported: Vec<TabId> = batch.iter().map(|(id, _)| *id).collect();

        for (id, payload) in batch {
            if session.tabs.contains_key(&id) {
                tracing::debug!(tab_id = %id, "Tab already connected, keeping its state");
                continue;
            }
            let tab = TabSession::from_payload(payload)?;
            tracing::info!(tab_id = %id, snapshots = tab.len(), "Connected tab");
            session.tabs.insert(id, tab);
        }

        self.elect_if_unfocused(session, &reported);
        Ok(())
    }

    /// Merge a full push from the target. Targets missing from it are gone.
    fn refresh(&self, session: &mut Session, batch: TabBatch, effects: &mut Vec<Effect>) -> Result<()> {
        let reported: Vec<TabId> = batch.iter().map(|(id, _)| *id).collect();
        let mut payloads: BTreeMap<TabId, TabPayload> = batch.into_iter().collect();

        let existing: Vec<TabId> = session.tabs.keys().copied().collect();
        for id in existing {
            match payloads.remove(&id) {
                Some(payload) => {
                    if let Some(tab) = session.tabs.get_mut(&id) {
                        tab.merge(payload)?;
                    }
                }
                None => remove_tab(session, id, effects),
            }
        }

        for id in payloads.keys() {
            tracing::debug!(tab_id = %id, "Ignoring snapshots for unconnected tab");
        }

        session.forget_stale_focus();
        self.elect_if_unfocused(session, &reported);
        Ok(())
    }

    fn elect_if_unfocused(&self, session: &mut Session, reported: &[TabId]) {
        if session.active_tab.is_some() {
            return;
        }

        session.active_tab = self
            .election
            .elect(reported, &session.tabs)
            .or_else(|| session.tabs.keys().next().copied());

        if let Some(id) = session.active_tab {
            tracing::info!(tab_id = %id, rule = ?self.election, "Elected active tab");
        }
    }
}

fn jump(id: TabId, tab: &TabSession, index: usize) -> Effect {
    Effect::Send(OutboundMessage::jump_to_snap(
        id,
        tab.snapshot(index).cloned(),
        index,
    ))
}

fn interrupt_playback(tab: &mut TabSession, effects: &mut Vec<Effect>) {
    effects.extend(tab.stop_playback().map(Effect::CancelTimer));
}

fn remove_tab(session: &mut Session, id: TabId, effects: &mut Vec<Effect>) {
    match session.tabs.remove(&id) {
        Some(mut tab) => {
            effects.extend(tab.stop_playback().map(Effect::CancelTimer));
            tracing::info!(tab_id = %id, "Removed tab");
        }
        None => tracing::debug!(tab_id = %id, "Tab already gone"),
    }
}
