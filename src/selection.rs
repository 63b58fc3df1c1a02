//! The coordinate the user picked and the label being typed for it.

use crate::projection::GeoPos;

/// Number of decimal places shown for a picked coordinate.
pub const DISPLAY_DECIMALS: i32 = 4;

/// The pending selection. Only the most recent pick is kept.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selection {
    pos: Option<GeoPos>,

    /// The label typed for the next favorite.
    pub label: String,
}

impl Selection {
    /// Replaces the pending coordinate.
    pub fn record(&mut self, pos: GeoPos) {
        self.pos = Some(pos);
    }

    /// Forgets the pending coordinate. The label is kept.
    pub fn clear(&mut self) {
        self.pos = None;
    }

    /// The pending coordinate, if any.
    pub fn pos(&self) -> Option<GeoPos> {
        self.pos
    }

    /// Takes the typed label, leaving the input empty.
    pub fn take_label(&mut self) -> String {
        std::mem::take(&mut self.label)
    }

    /// The pending coordinate rounded for display.
    pub fn display(&self) -> Option<GeoPos> {
        self.pos.map(|pos| pos.rounded(DISPLAY_DECIMALS))
    }
}
