//! Mock events for scripting a fake child process.

/// One step in the life of a scripted child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// Print data.
    Output(Vec<u8>),
    /// Block until a full line of input arrives, or stdin is closed.
    ReadLine,
    /// Close output and exit with a code. Later events never run.
    Exit(i32),
    /// Stop making progress until killed.
    Hang,
}

impl MockEvent {
    /// Create an output event from a string.
    #[must_use]
    pub fn output_str(s: &str) -> Self {
        Self::Output(s.as_bytes().to_vec())
    }

    /// Check if this is an output event.
    #[must_use]
    pub const fn is_output(&self) -> bool {
        matches!(self, Self::Output(_))
    }

    /// Check if this event ends the script.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Exit(_) | Self::Hang)
    }
}
