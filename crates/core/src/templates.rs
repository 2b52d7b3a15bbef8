//! Built-in reminder templates for common lab samples.

use serde::Serialize;

pub const CUSTOM_TEMPLATE_ID: &str = "custom";

/// A named preset of day offsets from a task's start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReminderTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub offsets: &'static [u32],
    pub icon: &'static str,
}

impl ReminderTemplate {
    /// The custom template carries no offsets; dates come from the caller instead.
    pub fn is_custom(&self) -> bool {
        self.offsets.is_empty()
    }
}

static TEMPLATES: [ReminderTemplate; 4] = [
    ReminderTemplate {
        id: "swab",
        name: "Swab Test",
        description: "Read results after 2 days",
        offsets: &[2],
        icon: "microscope",
    },
    ReminderTemplate {
        id: "water",
        name: "Water Sample",
        description: "Read on 2nd, 7th, and 14th day",
        offsets: &[2, 7, 14],
        icon: "water",
    },
    ReminderTemplate {
        id: "bacteria",
        name: "Bacteria Culture",
        description: "Check on 1st, 3rd, and 5th day",
        offsets: &[1, 3, 5],
        icon: "bacteria",
    },
    ReminderTemplate {
        id: CUSTOM_TEMPLATE_ID,
        name: "Custom Schedule",
        description: "Set your own reminder days",
        offsets: &[],
        icon: "calendar-clock",
    },
];

pub fn all() -> &'static [ReminderTemplate] {
    &TEMPLATES
}

pub fn lookup(id: &str) -> Option<&'static ReminderTemplate> {
    let needle = id.trim();
    TEMPLATES
        .iter()
        .find(|template| template.id.eq_ignore_ascii_case(needle))
}
