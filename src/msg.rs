use crate::mem::layout::Layout;

use chrono::Local;

#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub timestamp: String,
    pub message: String,
}

impl Message {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            timestamp: format!("{}", Local::now().format("[ %d:%m:%Y | %H:%M:%S ]")),
            message: message.into(),
        }
    }
}

/// Notifications emitted by a client.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Open,
    Close,
    /// Snapshot of the layout after a successful update.
    Update(Layout),
    Error(Message),
}

impl Event {
    pub fn error<S: Into<String>>(message: S) -> Self {
        Self::Error(Message::new(message))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::Open => "open",
            Event::Close => "close",
            Event::Update(_) => "update",
            Event::Error(_) => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Event;

    #[test]
    fn ut_error_event() {
        let Event::Error(msg) = Event::error("Reading holding failed") else {
            panic!("Expected error event");
        };
        assert_eq!(msg.message, "Reading holding failed");
        assert!(msg.timestamp.starts_with("[ ") && msg.timestamp.ends_with(" ]"));
        assert_eq!(Event::Open.name(), "open");
    }
}
