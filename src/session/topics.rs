//! Topic construction for one device session.

/// The two logical channels of a device: status out, commands in.
#[derive(Debug, Clone)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Device status channel: `<prefix>/commandOut`.
    pub fn command_out(&self) -> String {
        format!("{}/commandOut", self.prefix)
    }

    /// Device command channel: `<prefix>/commandIn`.
    pub fn command_in(&self) -> String {
        format!("{}/commandIn", self.prefix)
    }
}
