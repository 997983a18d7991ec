//! Contact classification and the display gate.
//!
//! Every detected box is split two ways: person-class or object-class. The
//! class selects the confidence threshold and the render color, nothing else.

use crate::telemetry::DetectionBox;

/// Display gate for person-class contacts.
pub const PERSON_MIN_CONFIDENCE: f32 = 0.20;

/// Display gate for object-class contacts. Kept in lockstep with the
/// backend's own alerting threshold so the operator never sees a box that
/// did not itself drive backend behavior.
pub const OBJECT_MIN_CONFIDENCE: f32 = 0.40;

/// Case-insensitive marker distinguishing person-class labels.
const PERSON_MARKER: &str = "person";

/// Two-way classification of a detected box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactClass {
    Person,
    Object,
}

impl ContactClass {
    /// Classify a backend label. A label containing the person marker
    /// (case-insensitive substring) is person-class; everything else is
    /// object-class.
    pub fn of_label(label: &str) -> Self {
        if label.to_lowercase().contains(PERSON_MARKER) {
            ContactClass::Person
        } else {
            ContactClass::Object
        }
    }

    /// Minimum confidence for a box of this class to be displayed.
    pub fn min_confidence(self) -> f32 {
        match self {
            ContactClass::Person => PERSON_MIN_CONFIDENCE,
            ContactClass::Object => OBJECT_MIN_CONFIDENCE,
        }
    }
}

/// Whether a box of the given class and confidence qualifies as a
/// displayable contact.
pub fn passes_display_gate(class: ContactClass, confidence: f32) -> bool {
    confidence >= class.min_confidence()
}

/// Classify and gate in one step. `None` means the box is not rendered; it
/// still never affects the displayed counts, which come from the message's
/// own aggregate fields.
pub fn displayable(bx: &DetectionBox) -> Option<ContactClass> {
    let class = ContactClass::of_label(&bx.label);
    passes_display_gate(class, bx.conf).then_some(class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn person_marker_is_case_insensitive_substring() {
        assert_eq!(ContactClass::of_label("person"), ContactClass::Person);
        assert_eq!(ContactClass::of_label("[PERSON/GEN] 0.91"), ContactClass::Person);
        assert_eq!(ContactClass::of_label("Person_2"), ContactClass::Person);
        assert_eq!(ContactClass::of_label("[GUN/SPEC] 0.55"), ContactClass::Object);
        assert_eq!(ContactClass::of_label("knife"), ContactClass::Object);
    }

    #[test]
    fn person_gate_boundary() {
        assert!(passes_display_gate(ContactClass::Person, 0.20));
        assert!(!passes_display_gate(ContactClass::Person, 0.19));
    }

    #[test]
    fn object_gate_boundary() {
        assert!(passes_display_gate(ContactClass::Object, 0.40));
        assert!(!passes_display_gate(ContactClass::Object, 0.39));
    }
}
