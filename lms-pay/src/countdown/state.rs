//! Countdown state and its reducer
//!
//! Expiry ticks, hub statuses and navigation ticks all pass through
//! [`PaymentStates::reduce`]. Precedence rules:
//! - the first terminal status wins, whichever source delivers it
//! - `PENDING` from the hub never changes anything
//! - a later terminal status that disagrees is recorded once and otherwise ignored
//! - nothing changes after navigation

use serde::Serialize;

use lms_common::{PaymentStatus, ResolutionSource};

/// Countdown state of one awaiting dialog
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStates {
    /// Milliseconds until the payment link expires (0 once resolved)
    pub left_time_ms: i64,
    pub can_navigate: bool,
    pub navigate_countdown_seconds: u32,
    pub status: PaymentStatus,
    pub resolved_by: Option<ResolutionSource>,
    pub navigated: bool,
    pub conflicting_status: Option<PaymentStatus>,
}

/// Input to the reducer
#[derive(Debug, Clone, PartialEq)]
pub enum CountdownEvent {
    /// Expiry timer fired; `left_time_ms` may be negative
    ExpiryTick { left_time_ms: i64 },
    /// Status pushed by the hub
    SocketStatus(PaymentStatus),
    /// Navigation timer fired
    NavTick,
}

/// Effect of one reducer step
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Unchanged,
    Updated,
    Resolved {
        status: PaymentStatus,
        source: ResolutionSource,
    },
    Conflict {
        kept: PaymentStatus,
        ignored: PaymentStatus,
    },
    Navigate,
}

impl PaymentStates {
    pub fn new(left_time_ms: i64, navigate_countdown_seconds: u32) -> Self {
        Self {
            left_time_ms: left_time_ms.max(0),
            can_navigate: false,
            navigate_countdown_seconds,
            status: PaymentStatus::Pending,
            resolved_by: None,
            navigated: false,
            conflicting_status: None,
        }
    }

    pub fn reduce(&mut self, event: CountdownEvent) -> Transition {
        if self.navigated {
            return Transition::Unchanged;
        }

        match event {
            CountdownEvent::ExpiryTick { left_time_ms } => {
                if self.can_navigate {
                    return Transition::Unchanged;
                }
                if left_time_ms <= 0 {
                    return self.resolve(PaymentStatus::Expired, ResolutionSource::Clock);
                }
                if left_time_ms == self.left_time_ms {
                    Transition::Unchanged
                } else {
                    self.left_time_ms = left_time_ms;
                    Transition::Updated
                }
            }
            CountdownEvent::SocketStatus(status) => {
                if !status.is_terminal() {
                    return Transition::Unchanged;
                }
                if !self.can_navigate {
                    return self.resolve(status, ResolutionSource::Hub);
                }
                if status == self.status || self.conflicting_status.is_some() {
                    return Transition::Unchanged;
                }
                self.conflicting_status = Some(status.clone());
                Transition::Conflict {
                    kept: self.status.clone(),
                    ignored: status,
                }
            }
            CountdownEvent::NavTick => {
                if !self.can_navigate {
                    return Transition::Unchanged;
                }
                self.navigate_countdown_seconds = self.navigate_countdown_seconds.saturating_sub(1);
                if self.navigate_countdown_seconds == 0 {
                    self.navigated = true;
                    Transition::Navigate
                } else {
                    Transition::Updated
                }
            }
        }
    }

    fn resolve(&mut self, status: PaymentStatus, source: ResolutionSource) -> Transition {
        self.status = status.clone();
        self.can_navigate = true;
        self.left_time_ms = 0;
        self.resolved_by = Some(source);
        Transition::Resolved { status, source }
    }
}
