use std::fmt;

/// Lifecycle of one simulated delivery.
///
/// `Pending -> HeadersSent -> Streaming -> Completed`, `Pending -> Failed`,
/// and any non-terminal state `-> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryState {
    Pending,
    HeadersSent,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl DeliveryState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryState::Completed | DeliveryState::Failed | DeliveryState::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryState::Pending => "pending",
            DeliveryState::HeadersSent => "headers_sent",
            DeliveryState::Streaming => "streaming",
            DeliveryState::Completed => "completed",
            DeliveryState::Failed => "failed",
            DeliveryState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DeliveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
