//! In-memory host used by tests, benches and headless tooling.
//!
//! Widgets are plain records, timers fire only when [`SimulatedHost::advance`]
//! moves the simulated clock. Callbacks run outside the host lock so they can
//! call straight back into the display.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{
    ContextHost, ControllerHandle, DisplayHost, TimerCallback, TimerHandle, TimerHost, UiLayer,
    Visibility, WidgetHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attachment {
    Detached,
    Display(UiLayer),
    Container(WidgetHandle),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetRecord {
    pub class_name: String,
    pub owner: Option<ControllerHandle>,
    pub attachment: Attachment,
    pub visibility: Visibility,
}

struct PendingTimer {
    handle: TimerHandle,
    due: Duration,
    callback: TimerCallback,
}

#[derive(Default)]
struct SimulatedState {
    next_widget: u64,
    next_timer: u64,
    now: Duration,
    widgets: BTreeMap<WidgetHandle, WidgetRecord>,
    timers: Vec<PendingTimer>,
}

impl SimulatedState {
    fn take_next_due(&mut self, deadline: Duration) -> Option<PendingTimer> {
        let idx = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.due <= deadline)
            .min_by_key(|(_, timer)| (timer.due, timer.handle))
            .map(|(idx, _)| idx)?;
        Some(self.timers.remove(idx))
    }
}

#[derive(Default)]
pub struct SimulatedHost {
    state: Mutex<SimulatedState>,
    headless: AtomicBool,
    default_controller: Mutex<Option<ControllerHandle>>,
}

impl SimulatedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host that reports itself as a dedicated server.
    pub fn headless() -> Self {
        let host = Self::default();
        host.set_headless(true);
        host
    }

    pub fn set_headless(&self, headless: bool) {
        self.headless.store(headless, Ordering::SeqCst);
    }

    pub fn set_default_controller(&self, controller: Option<ControllerHandle>) {
        if let Ok(mut guard) = self.default_controller.lock() {
            *guard = controller;
        }
    }

    pub fn widget(&self, handle: WidgetHandle) -> Option<WidgetRecord> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.widgets.get(&handle).cloned())
    }

    pub fn attachment(&self, handle: WidgetHandle) -> Option<Attachment> {
        self.widget(handle).map(|record| record.attachment)
    }

    pub fn visibility(&self, handle: WidgetHandle) -> Option<Visibility> {
        self.widget(handle).map(|record| record.visibility)
    }

    pub fn is_on_display(&self, handle: WidgetHandle) -> bool {
        matches!(self.attachment(handle), Some(Attachment::Display(_)))
    }

    pub fn children_of(&self, container: WidgetHandle) -> Vec<WidgetHandle> {
        self.state
            .lock()
            .map(|state| {
                state
                    .widgets
                    .iter()
                    .filter(|(_, record)| record.attachment == Attachment::Container(container))
                    .map(|(handle, _)| *handle)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Widgets currently attached anywhere (display or container).
    pub fn attached_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| {
                state
                    .widgets
                    .values()
                    .filter(|record| record.attachment != Attachment::Detached)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn widget_count(&self) -> usize {
        self.state.lock().map(|state| state.widgets.len()).unwrap_or(0)
    }

    pub fn pending_timers(&self) -> usize {
        self.state.lock().map(|state| state.timers.len()).unwrap_or(0)
    }

    pub fn now(&self) -> Duration {
        self.state.lock().map(|state| state.now).unwrap_or_default()
    }

    /// Moves the clock forward, firing due timers in order. Returns the
    /// number of callbacks run.
    pub fn advance(&self, delta: Duration) -> usize {
        let deadline = match self.state.lock() {
            Ok(state) => state.now + delta,
            Err(_) => return 0,
        };

        let mut fired = 0;
        loop {
            let next = match self.state.lock() {
                Ok(mut state) => {
                    let next = state.take_next_due(deadline);
                    if let Some(timer) = next.as_ref() {
                        state.now = timer.due;
                    }
                    next
                }
                Err(_) => None,
            };
            let Some(timer) = next else {
                break;
            };
            (timer.callback)();
            fired += 1;
        }

        if let Ok(mut state) = self.state.lock() {
            state.now = deadline;
        }
        fired
    }

    fn update_widget(&self, handle: WidgetHandle, update: impl FnOnce(&mut WidgetRecord)) {
        if let Ok(mut state) = self.state.lock() {
            if let Some(record) = state.widgets.get_mut(&handle) {
                update(record);
            }
        }
    }
}

impl DisplayHost for SimulatedHost {
    fn create_widget(&self, class_name: &str, owner: Option<ControllerHandle>) -> WidgetHandle {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.next_widget += 1;
        let handle = WidgetHandle(state.next_widget);
        state.widgets.insert(
            handle,
            WidgetRecord {
                class_name: class_name.to_string(),
                owner,
                attachment: Attachment::Detached,
                visibility: Visibility::Visible,
            },
        );
        handle
    }

    fn attach_to_display(&self, widget: WidgetHandle, layer: UiLayer) {
        self.update_widget(widget, |record| {
            record.attachment = Attachment::Display(layer);
        });
    }

    fn attach_to_container(&self, container: WidgetHandle, child: WidgetHandle) {
        self.update_widget(child, |record| {
            record.attachment = Attachment::Container(container);
        });
    }

    fn detach(&self, widget: WidgetHandle) {
        self.update_widget(widget, |record| {
            record.attachment = Attachment::Detached;
        });
    }

    fn set_visibility(&self, widget: WidgetHandle, visibility: Visibility) {
        self.update_widget(widget, |record| {
            record.visibility = visibility;
        });
    }

    fn release_widget(&self, widget: WidgetHandle) {
        if let Ok(mut state) = self.state.lock() {
            state.widgets.remove(&widget);
        }
    }
}

impl TimerHost for SimulatedHost {
    fn schedule_once(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.next_timer += 1;
        let handle = TimerHandle(state.next_timer);
        let due = state.now + delay;
        state.timers.push(PendingTimer {
            handle,
            due,
            callback,
        });
        handle
    }

    fn cancel(&self, timer: TimerHandle) {
        if let Ok(mut state) = self.state.lock() {
            state.timers.retain(|pending| pending.handle != timer);
        }
    }
}

impl ContextHost for SimulatedHost {
    fn is_headless(&self) -> bool {
        self.headless.load(Ordering::SeqCst)
    }

    fn default_controller(&self) -> Option<ControllerHandle> {
        self.default_controller.lock().ok().and_then(|guard| *guard)
    }
}
