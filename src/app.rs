use crate::coordinator::LocationCoordinator;
use crate::events::Event;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Top-level UI state: the search box plus the coordinator that owns the
/// lookup results and the map.
pub struct App {
    pub input: String,
    pub coordinator: LocationCoordinator,
    pub tick_count: usize,
    pub should_quit: bool,
}

impl App {
    pub fn new(coordinator: LocationCoordinator) -> Self {
        Self {
            input: String::new(),
            coordinator,
            tick_count: 0,
            should_quit: false,
        }
    }

    /// Brings the map up at the home coordinate. Call once the runtime is
    /// running, before the first frame.
    pub fn mount(&mut self) {
        self.coordinator.mount();
    }

    pub fn on_tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Tick => self.on_tick(),
            Event::Input(key) => self.handle_key(key),
            lookup => self.coordinator.apply(lookup),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if let KeyCode::Char('c') = key.code {
                self.should_quit = true;
            }
            return;
        }

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => {
                // The submit control is disabled while a lookup is running.
                if !self.coordinator.is_loading() {
                    self.coordinator.submit_query(&self.input);
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::PageUp => {
                self.coordinator.map_mut().zoom_in();
            }
            KeyCode::PageDown => {
                self.coordinator.map_mut().zoom_out();
            }
            KeyCode::Char(c) if !c.is_control() => self.input.push(c),
            _ => {}
        }
    }
}
