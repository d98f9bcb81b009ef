//! Lock-preserving plan merge
//!
//! A locked field survives any automated revision verbatim — value,
//! source, and confidence all come from the old plan; the proposal for
//! that field is discarded entirely. Validity checking and the single
//! escalated retry live in the replan stage; this module is pure.

use strophe_core::Plan;

/// Merge a proposed plan over the old one, keeping every locked field
pub fn preserve_locks(old: &Plan, proposed: Plan) -> Plan {
    let mut merged = proposed;
    if old.form.locked {
        merged.form = old.form.clone();
    }
    if old.rhyme.locked {
        merged.rhyme = old.rhyme.clone();
    }
    if old.meter.locked {
        merged.meter = old.meter.clone();
    }
    if old.target_unit_count.locked {
        merged.target_unit_count = old.target_unit_count.clone();
    }
    if old.persona.locked {
        merged.persona = old.persona.clone();
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use strophe_core::PlanField;

    #[test]
    fn test_locked_persona_survives_revision() {
        let mut old = Plan::fallback();
        old.persona = PlanField::new("frontman".to_string(), "user")
            .with_confidence(1.0)
            .locked();

        let mut proposed = Plan::fallback();
        proposed.persona = PlanField::new("narrator".to_string(), "replanner");

        let merged = preserve_locks(&old, proposed);
        assert_eq!(merged.persona.value, "frontman");
        assert_eq!(merged.persona.source, "user");
        assert!((merged.persona.confidence - 1.0).abs() < f32::EPSILON);
        assert!(merged.persona.locked);
    }

    #[test]
    fn test_unlocked_fields_take_proposal() {
        let old = Plan::fallback();

        let mut proposed = Plan::fallback();
        proposed.rhyme = PlanField::new("AABB".to_string(), "replanner");
        proposed.meter = PlanField::new("anapest_3".to_string(), "replanner");

        let merged = preserve_locks(&old, proposed);
        assert_eq!(merged.rhyme.value, "AABB");
        assert_eq!(merged.meter.value, "anapest_3");
    }

    #[test]
    fn test_all_locked_yields_old_values() {
        let mut old = Plan::fallback();
        old.form.locked = true;
        old.rhyme.locked = true;
        old.meter.locked = true;
        old.target_unit_count.locked = true;
        old.persona.locked = true;

        let mut proposed = Plan::fallback();
        proposed.form = PlanField::new("sonnet".to_string(), "replanner");
        proposed.rhyme = PlanField::new("ABBA".to_string(), "replanner");
        proposed.target_unit_count = PlanField::new(9, "replanner");

        let merged = preserve_locks(&old, proposed);
        assert_eq!(merged.form.value, old.form.value);
        assert_eq!(merged.rhyme.value, old.rhyme.value);
        assert_eq!(merged.target_unit_count.value, old.target_unit_count.value);
    }

    #[test]
    fn test_beats_always_take_proposal() {
        let old = Plan::fallback();
        let mut proposed = Plan::fallback();
        proposed.beats.clear();

        let merged = preserve_locks(&old, proposed);
        assert!(merged.beats.is_empty());
    }
}
