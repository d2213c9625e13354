//! Mock scenarios for testing drivers.
//!
//! A scenario is the script a fake child follows: what it prints, when it
//! waits for a line of input, and how it ends. A script that runs out of
//! events exits with code 0.

use super::event::MockEvent;

/// A scripted child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scenario {
    events: Vec<MockEvent>,
}

impl Scenario {
    /// Create an empty scenario.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Print `text`.
    #[must_use]
    pub fn output(mut self, text: impl AsRef<str>) -> Self {
        self.events.push(MockEvent::output_str(text.as_ref()));
        self
    }

    /// Wait for one line of input.
    #[must_use]
    pub fn read_line(mut self) -> Self {
        self.events.push(MockEvent::ReadLine);
        self
    }

    /// Print `text`, then wait for one line of input.
    #[must_use]
    pub fn prompt(self, text: impl AsRef<str>) -> Self {
        self.output(text).read_line()
    }

    /// Exit with `code`.
    #[must_use]
    pub fn exit(mut self, code: i32) -> Self {
        self.events.push(MockEvent::Exit(code));
        self
    }

    /// Stop responding until killed.
    #[must_use]
    pub fn hang(mut self) -> Self {
        self.events.push(MockEvent::Hang);
        self
    }

    /// Append a raw event.
    #[must_use]
    pub fn event(mut self, event: MockEvent) -> Self {
        self.events.push(event);
        self
    }

    /// The scripted events.
    #[must_use]
    pub fn events(&self) -> &[MockEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_output_then_read() {
        let scenario = Scenario::new().prompt("Type MASTER passphrase: ").exit(1);
        assert_eq!(
            scenario.events(),
            [
                MockEvent::output_str("Type MASTER passphrase: "),
                MockEvent::ReadLine,
                MockEvent::Exit(1),
            ]
        );
        assert!(scenario.events()[2].is_terminal());
        assert!(scenario.events()[0].is_output());
    }
}
