use async_channel::{Receiver, Sender};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// A user-facing notification emitted by the draft machine and gateway.
/// The embedding UI drains the receiver and renders these however it
/// renders transient messages.
#[derive(Clone, Debug)]
pub struct Notice {
    pub severity: Severity,
    pub title: String,
    pub detail: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            title: title.into(),
            detail: detail.into(),
        }
    }

    pub fn success(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            title: title.into(),
            detail: detail.into(),
        }
    }

    pub fn error(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            title: title.into(),
            detail: detail.into(),
        }
    }
}

pub type NoticeSender = Sender<Notice>;

pub fn channel() -> (Sender<Notice>, Receiver<Notice>) {
    async_channel::unbounded()
}

/// Best-effort send: a closed channel means no UI is listening, which must
/// never fail the operation that produced the notice.
pub(crate) fn post(tx: &Sender<Notice>, notice: Notice) {
    let _ = tx.try_send(notice);
}

#[test]
fn dropped_receiver_does_not_panic() {
    let (tx, rx) = channel();
    drop(rx);
    post(&tx, Notice::info("ignored", ""));
}
