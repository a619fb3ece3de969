//! Event monitor middleware

use super::Middleware;
use crate::error::{Result, RuntimeError};
use crate::events::{EventKind, Handler, Payload};
use std::ops::BitOr;
use tracing::info;

/// Bitmask selecting which event kinds the monitor reports.
///
/// Bit positions follow [`EventKind::index`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorMask(u32);

impl MonitorMask {
    pub const NONE: Self = Self(0);
    pub const TICKS: Self = Self(1 << 0);
    pub const BARS: Self = Self(1 << 1);
    pub const EQUITY: Self = Self(1 << 2);
    pub const BALANCE: Self = Self(1 << 3);
    pub const POSITIONS_OPENED: Self = Self(1 << 4);
    pub const POSITIONS_CLOSED: Self = Self(1 << 5);
    pub const POSITIONS_PNL_UPDATED: Self = Self(1 << 6);
    pub const ORDERS: Self = Self(1 << 7);
    pub const ALL: Self = Self((1 << EventKind::COUNT) - 1);

    pub fn contains(self, kind: EventKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    /// Build a mask from config-file names (`"ticks"`, `"bars"`, ...,
    /// `"all"`).
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let mut mask = Self::NONE;
        for name in names {
            mask = mask | Self::from_name(name.as_ref())?;
        }
        Ok(mask)
    }

    fn from_name(name: &str) -> Result<Self> {
        Ok(match name {
            "ticks" => Self::TICKS,
            "bars" => Self::BARS,
            "equity" => Self::EQUITY,
            "balance" => Self::BALANCE,
            "positions-opened" => Self::POSITIONS_OPENED,
            "positions-closed" => Self::POSITIONS_CLOSED,
            "positions-pnl-updated" => Self::POSITIONS_PNL_UPDATED,
            "orders" => Self::ORDERS,
            "all" => Self::ALL,
            other => {
                return Err(RuntimeError::Config(format!(
                    "unknown monitor event {other:?}"
                )))
            }
        })
    }
}

impl BitOr for MonitorMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Logs every event of the selected kinds at info level, payload included,
/// then forwards it untouched.
pub struct Monitor {
    mask: MonitorMask,
}

impl Monitor {
    pub fn new(mask: MonitorMask) -> Self {
        Self { mask }
    }
}

impl<T: Payload> Middleware<T> for Monitor {
    fn wrap(&self, kind: EventKind, mut inner: Handler<T>) -> Handler<T> {
        let enabled = self.mask.contains(kind);
        Box::new(move |payload| {
            if enabled {
                info!(kind = %kind, payload = ?payload, "event");
            }
            inner(payload)
        })
    }
}
