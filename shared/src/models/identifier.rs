//! Human-readable identifiers
//!
//! Each kind owns a named counter. The printed form is the prefix plus the
//! counter value zero-padded to a minimum width; other systems parse these
//! ids, so prefixes and widths must not change.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    Member,
    Application,
    Employee,
    Event,
    Payment,
    Trainer,
    Announcement,
}

impl IdKind {
    /// Key of the backing row in the `counters` table
    pub const fn counter_name(self) -> &'static str {
        match self {
            IdKind::Member => "member",
            IdKind::Application => "application",
            IdKind::Employee => "employee",
            IdKind::Event => "event",
            IdKind::Payment => "payment",
            IdKind::Trainer => "trainer",
            IdKind::Announcement => "announcement",
        }
    }

    pub const fn prefix(self) -> &'static str {
        match self {
            IdKind::Member => "KB-M",
            IdKind::Application => "KB-APP",
            IdKind::Employee => "KB-EMP",
            IdKind::Event => "KBE",
            IdKind::Payment => "KBP",
            IdKind::Trainer => "KB-TR",
            IdKind::Announcement => "KB-ANN",
        }
    }

    pub const fn width(self) -> usize {
        match self {
            IdKind::Member | IdKind::Application | IdKind::Trainer => 2,
            IdKind::Employee | IdKind::Event | IdKind::Announcement => 3,
            IdKind::Payment => 4,
        }
    }

    /// Format a counter value; sequences past the width keep every digit
    pub fn format(self, sequence: i64) -> String {
        format!("{}{:0width$}", self.prefix(), sequence, width = self.width())
    }
}
