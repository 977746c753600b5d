//! Session store
//!
//! Owns the current [`Session`], feeds actions through the reducer one at a
//! time and executes the resulting effects. The session is swapped only when
//! the reducer accepts an action, so observers never see a half-applied one.
//!
//! Effects are queued while the session lock is held and delivered after it
//! is released. Channels may therefore dispatch back into the store; their
//! effects are delivered after the ones already queued.

use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rewind_session::{
    Action, ChannelHandle, Effect, Reducer, Session, SessionError, StepOrigin, Transition,
};
use rewind_tabs::{TabId, TabSession, TimerHandle};

use crate::channel::OutboundChannel;
use crate::config::Config;
use crate::journal::{Journal, JournalEntry, Outcome};
use crate::timer::TimerService;
use crate::Result;

type ChannelRegistry = HashMap<ChannelHandle, Arc<dyn OutboundChannel>>;

/// An effect together with the channel that was current when it was produced
type Delivery = (Option<Arc<dyn OutboundChannel>>, Effect);

/// Cloneable handle to one debugging session. Clones share state.
pub struct Store {
    config: Config,
    reducer: Reducer,
    session: Arc<RwLock<Session>>,
    channels: Arc<RwLock<ChannelRegistry>>,
    timers: Arc<dyn TimerService>,
    journal: Arc<RwLock<Journal>>,
    outbox: Arc<Mutex<VecDeque<Delivery>>>,
    flushing: Arc<AtomicBool>,
}

impl Store {
    pub fn new(config: Config, timers: Arc<dyn TimerService>) -> Self {
        let reducer = Reducer::new(config.tab_election);
        let journal = Journal::new(config.journal_capacity);

        Self {
            config,
            reducer,
            session: Arc::new(RwLock::new(Session::new())),
            channels: Arc::new(RwLock::new(HashMap::new())),
            timers,
            journal: Arc::new(RwLock::new(journal)),
            outbox: Arc::new(Mutex::new(VecDeque::new())),
            flushing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply one action and execute its effects.
    ///
    /// Rejected actions leave the session untouched and are returned as errors.
    pub fn dispatch(&self, action: Action) -> Result<Vec<Effect>> {
        let kind = action.kind();

        let mut session = self.session.write();
        let focused = session.active_tab;

        match self.reducer.transition(&session, action) {
            Ok(Transition { state, effects }) => {
                *session = state;
                self.enqueue(&session, &effects);
                drop(session);
                self.flush();

                self.journal.write().record(
                    kind,
                    focused,
                    Outcome::Applied {
                        effects: effects.len(),
                    },
                );
                Ok(effects)
            }
            Err(err) => {
                drop(session);

                if err.is_protocol() {
                    tracing::error!(action = %kind, error = %err, "Protocol error");
                } else {
                    tracing::warn!(action = %kind, tab_id = ?focused, error = %err, "Rejected action");
                }
                self.journal.write().record(
                    kind,
                    focused,
                    Outcome::Rejected {
                        reason: err.to_string(),
                    },
                );
                Err(err.into())
            }
        }
    }

    /// Decode a wire action and dispatch it
    pub fn dispatch_json(&self, input: &str) -> Result<Vec<Effect>> {
        let action = Action::from_json(input).inspect_err(|err: &SessionError| {
            tracing::error!(error = %err, "Undecodable action");
        })?;
        self.dispatch(action)
    }

    /// Register a channel and route all further messages through it
    pub fn connect_channel(&self, channel: Arc<dyn OutboundChannel>) -> Result<ChannelHandle> {
        let handle = ChannelHandle::new();
        let previous = self.session.read().channel;

        self.channels.write().insert(handle, channel);
        if let Err(err) = self.dispatch(Action::SetChannel(handle)) {
            self.channels.write().remove(&handle);
            return Err(err);
        }

        if let Some(previous) = previous.filter(|p| *p != handle) {
            self.channels.write().remove(&previous);
        }

        tracing::info!(channel = %handle, "Connected outbound channel");
        Ok(handle)
    }

    /// Start automatic playback of the focused tab
    pub fn play(&self) -> Result<TimerHandle> {
        let store = self.clone();
        let handle = self.timers.start(
            self.config.playback_interval(),
            Box::new(move |handle| store.tick(handle)),
        );

        if let Err(err) = self.dispatch(Action::Play(handle)) {
            self.timers.cancel(handle);
            return Err(err);
        }

        tracing::info!(timer = %handle, tab_id = ?self.session.read().active_tab, "Playback started");
        Ok(handle)
    }

    /// One playback step; playback ends on the last snapshot.
    ///
    /// Only the timer held by the focused tab may step it. Any other timer
    /// is left over from a tab that lost focus or playback and is cancelled.
    fn tick(&self, handle: TimerHandle) {
        let owned = self
            .session
            .read()
            .active()
            .is_some_and(|(_, tab)| tab.timer_handle == Some(handle));
        if !owned {
            tracing::debug!(timer = %handle, "Cancelling orphaned playback timer");
            self.timers.cancel(handle);
            return;
        }

        if let Err(err) = self.dispatch(Action::MoveForward {
            origin: StepOrigin::Timer,
        }) {
            tracing::warn!(error = %err, "Playback tick failed");
            return;
        }

        let finished = self
            .active_tab()
            .is_some_and(|(_, tab)| tab.playing && tab.at_end());
        if finished {
            if let Err(err) = self.dispatch(Action::Pause) {
                tracing::warn!(error = %err, "Failed to stop finished playback");
            }
        }
    }

    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    pub fn active_tab(&self) -> Option<(TabId, TabSession)> {
        self.session
            .read()
            .active()
            .map(|(id, tab)| (id, tab.clone()))
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.read().entries().to_vec()
    }

    fn enqueue(&self, session: &Session, effects: &[Effect]) {
        let channel = session
            .channel
            .and_then(|handle| self.channels.read().get(&handle).cloned());

        let mut outbox = self.outbox.lock();
        for effect in effects {
            outbox.push_back((channel.clone(), effect.clone()));
        }
    }

    /// Deliver queued effects in dispatch order. Only one caller drains the
    /// queue at a time; others return and leave their effects to it.
    fn flush(&self) {
        loop {
            if self.flushing.swap(true, Ordering::AcqRel) {
                return;
            }

            loop {
                let next = self.outbox.lock().pop_front();
                let Some((channel, effect)) = next else {
                    break;
                };
                self.execute(channel.as_deref(), &effect);
            }

            self.flushing.store(false, Ordering::Release);
            // Effects queued between the last pop and the release
            if self.outbox.lock().is_empty() {
                return;
            }
        }
    }

    fn execute(&self, channel: Option<&dyn OutboundChannel>, effect: &Effect) {
        match effect {
            Effect::Send(message) => match channel {
                Some(channel) => {
                    if let Err(err) = channel.send(message) {
                        tracing::warn!(
                            action = %message.action,
                            tab_id = %message.target_id,
                            error = %err,
                            "Failed to deliver message"
                        );
                    }
                }
                None => tracing::warn!(
                    action = %message.action,
                    tab_id = %message.target_id,
                    "No outbound channel, dropping message"
                ),
            },
            Effect::CancelTimer(handle) => self.timers.cancel(*handle),
        }
    }
}

impl Clone for Store {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            reducer: self.reducer,
            session: Arc::clone(&self.session),
            channels: Arc::clone(&self.channels),
            timers: Arc::clone(&self.timers),
            journal: Arc::clone(&self.journal),
            outbox: Arc::clone(&self.outbox),
            flushing: Arc::clone(&self.flushing),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MpscChannel;
    use crate::error::{ChannelError, CoreError};
    use crate::timer::{PlaybackRuntime, Tick};
    use rewind_session::{MessageKind, OutboundMessage};
    use rewind_tabs::{ModeFlag, Snapshot, TabPayload};
    use serde_json::json;
    use std::sync::OnceLock;
    use std::time::Duration;

    /// Records calls instead of running timers; ticks fire on demand
    #[derive(Default)]
    struct ManualTimers {
        started: Mutex<Vec<TimerHandle>>,
        cancelled: Mutex<Vec<TimerHandle>>,
        ticks: Mutex<HashMap<TimerHandle, Tick>>,
    }

    impl ManualTimers {
        fn fire(&self, handle: TimerHandle) {
            if let Some(tick) = self.ticks.lock().get(&handle) {
                tick(handle);
            }
        }
    }

    impl TimerService for ManualTimers {
        fn start(&self, _period: Duration, tick: Tick) -> TimerHandle {
            let handle = TimerHandle::new();
            self.started.lock().push(handle);
            self.ticks.lock().insert(handle, tick);
            handle
        }

        fn cancel(&self, handle: TimerHandle) {
            self.cancelled.lock().push(handle);
        }
    }

    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<OutboundMessage>>,
    }

    impl OutboundChannel for RecordingChannel {
        fn send(&self, message: &OutboundMessage) -> std::result::Result<(), ChannelError> {
            self.sent.lock().push(message.clone());
            Ok(())
        }
    }

    fn snaps(n: i64) -> Vec<Snapshot> {
        (0..n).map(|i| Snapshot::new(json!({ "s": i }))).collect()
    }

    fn connect(store: &Store, tabs: &[(u64, i64)]) {
        let batch = tabs
            .iter()
            .map(|&(id, n)| {
                (
                    TabId(id),
                    TabPayload {
                        snapshots: Some(snaps(n)),
                        ..Default::default()
                    },
                )
            })
            .collect();
        store.dispatch(Action::InitialConnect(batch)).unwrap();
    }

    fn manual_store() -> (Store, Arc<ManualTimers>, Arc<RecordingChannel>) {
        let timers = Arc::new(ManualTimers::default());
        let store = Store::new(Config::default(), timers.clone());
        let channel = Arc::new(RecordingChannel::default());
        store.connect_channel(channel.clone()).unwrap();
        (store, timers, channel)
    }

    #[test]
    fn test_dispatch_routes_messages() {
        let (store, _, channel) = manual_store();
        connect(&store, &[(3, 3)]);

        store.dispatch(Action::ChangeSlider(2)).unwrap();
        store.dispatch(Action::ToggleMode(ModeFlag::Paused)).unwrap();

        let sent = channel.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].action, MessageKind::JumpToSnap);
        assert_eq!(sent[0].index, Some(2));
        assert_eq!(sent[0].target_id, TabId(3));
        assert_eq!(sent[1].action, MessageKind::SetPause);
    }

    #[test]
    fn test_rejected_action_keeps_state() {
        let (store, _, channel) = manual_store();
        connect(&store, &[(1, 2)]);
        let before = store.session();

        let err = store.dispatch(Action::ChangeSlider(5)).unwrap_err();
        assert!(matches!(err, CoreError::Session(_)));
        assert_eq!(store.session(), before);
        assert!(channel.sent.lock().is_empty());

        let journal = store.journal();
        assert!(matches!(
            journal.last().map(|e| &e.outcome),
            Some(Outcome::Rejected { .. })
        ));
    }

    #[test]
    fn test_dispatch_json_unknown_kind() {
        let (store, _, _) = manual_store();
        let err = store.dispatch_json(r#"{"type": "SELF_DESTRUCT"}"#).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Session(SessionError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_dispatch_json_applies() {
        let (store, _, _) = manual_store();
        store
            .dispatch_json(r#"{"type": "INITIAL_CONNECT", "payload": {"8": {"snapshots": [{"a": 1}]}}}"#)
            .unwrap();
        assert_eq!(store.active_tab().map(|(id, _)| id), Some(TabId(8)));
    }

    #[test]
    fn test_messages_dropped_without_channel() {
        let store = Store::new(Config::default(), Arc::new(ManualTimers::default()));
        connect(&store, &[(1, 2)]);

        let effects = store.dispatch(Action::Empty).unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(store.active_tab().unwrap().1.len(), 1);
    }

    #[test]
    fn test_reconnecting_channel_replaces_route() {
        let (store, _, first) = manual_store();
        connect(&store, &[(1, 2)]);

        let second = Arc::new(RecordingChannel::default());
        let handle = store.connect_channel(second.clone()).unwrap();
        assert_eq!(store.session().channel, Some(handle));

        store.dispatch(Action::Empty).unwrap();
        assert!(first.sent.lock().is_empty());
        assert_eq!(second.sent.lock().len(), 1);
    }

    #[test]
    fn test_play_then_user_step_cancels_timer() {
        let (store, timers, _) = manual_store();
        connect(&store, &[(1, 3)]);

        let handle = store.play().unwrap();
        assert_eq!(timers.started.lock().as_slice(), &[handle]);
        assert!(store.active_tab().unwrap().1.playing);

        store
            .dispatch(Action::MoveForward {
                origin: StepOrigin::User,
            })
            .unwrap();
        assert_eq!(timers.cancelled.lock().as_slice(), &[handle]);
        let (_, tab) = store.active_tab().unwrap();
        assert!(!tab.playing);
        assert!(tab.timer_handle.is_none());
    }

    #[test]
    fn test_play_without_tab_releases_timer() {
        let timers = Arc::new(ManualTimers::default());
        let store = Store::new(Config::default(), timers.clone());

        assert!(store.play().is_err());
        assert_eq!(*timers.started.lock(), *timers.cancelled.lock());
    }

    #[test]
    fn test_tick_stops_at_last_snapshot() {
        let (store, timers, channel) = manual_store();
        connect(&store, &[(1, 2)]);
        let handle = store.play().unwrap();

        timers.fire(handle);

        let (_, tab) = store.active_tab().unwrap();
        assert_eq!(tab.cursor_index, 1);
        assert!(!tab.playing);
        assert_eq!(timers.cancelled.lock().as_slice(), &[handle]);
        assert_eq!(channel.sent.lock().len(), 1);
    }

    #[test]
    fn test_timer_of_unfocused_tab_is_cancelled_on_tick() {
        let (store, timers, _) = manual_store();
        connect(&store, &[(1, 3), (2, 3)]);

        let first = store.play().unwrap();
        store.dispatch(Action::SetTab(TabId(2))).unwrap();
        let second = store.play().unwrap();
        let before = store.session();
        assert!(!before.tab(TabId(1)).unwrap().playing);

        // A late tick of the first timer must not step the focused tab
        timers.fire(first);
        assert_eq!(store.session(), before);
        assert_eq!(timers.cancelled.lock().last(), Some(&first));

        timers.fire(second);
        assert_eq!(store.active_tab().unwrap().1.cursor_index, 1);
        assert_eq!(store.session().tab(TabId(1)).unwrap().cursor_index, 0);
    }

    /// Answers every jump by toggling pause from inside `send`
    #[derive(Default)]
    struct EchoChannel {
        store: OnceLock<Store>,
        sent: Mutex<Vec<MessageKind>>,
    }

    impl OutboundChannel for EchoChannel {
        fn send(&self, message: &OutboundMessage) -> std::result::Result<(), ChannelError> {
            self.sent.lock().push(message.action);
            if message.action == MessageKind::JumpToSnap {
                if let Some(store) = self.store.get() {
                    store.dispatch(Action::ToggleMode(ModeFlag::Paused)).unwrap();
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_channel_may_dispatch_back_into_store() {
        let store = Store::new(Config::default(), Arc::new(ManualTimers::default()));
        let channel = Arc::new(EchoChannel::default());
        store.connect_channel(channel.clone()).unwrap();
        assert!(channel.store.set(store.clone()).is_ok());
        connect(&store, &[(1, 3)]);

        store.dispatch(Action::ChangeSlider(1)).unwrap();

        assert_eq!(
            *channel.sent.lock(),
            vec![MessageKind::JumpToSnap, MessageKind::SetPause]
        );
        assert!(store.active_tab().unwrap().1.mode.paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_tabs_hands_playback_over() {
        let runtime = PlaybackRuntime::new();
        let config = Config {
            playback_interval_ms: 100,
            ..Default::default()
        };
        let store = Store::new(config, Arc::new(runtime.clone()));
        connect(&store, &[(1, 3), (2, 3)]);

        store.play().unwrap();
        store.dispatch(Action::SetTab(TabId(2))).unwrap();
        store.play().unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let session = store.session();
        let left = session.tab(TabId(1)).unwrap();
        assert_eq!(left.cursor_index, 0);
        assert!(!left.playing);
        let focused = session.tab(TabId(2)).unwrap();
        assert_eq!(focused.cursor_index, 1);
        assert!(focused.playing);
        assert_eq!(runtime.active_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_runs_to_the_end() {
        let runtime = PlaybackRuntime::new();
        let config = Config {
            playback_interval_ms: 100,
            ..Default::default()
        };
        let store = Store::new(config, Arc::new(runtime.clone()));
        let (channel, mut rx) = MpscChannel::new();
        store.connect_channel(Arc::new(channel)).unwrap();
        connect(&store, &[(1, 3)]);

        store.play().unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;

        let (_, tab) = store.active_tab().unwrap();
        assert_eq!(tab.cursor_index, 2);
        assert!(!tab.playing);
        assert!(tab.timer_handle.is_none());
        assert_eq!(runtime.active_timers(), 0);

        let indices: Vec<Option<usize>> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|m| m.index)
            .collect();
        assert_eq!(indices, vec![Some(1), Some(2)]);
    }
}
