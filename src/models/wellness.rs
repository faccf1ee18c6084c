use super::{Field, FieldDefault, Resource};

const fn reported(name: &'static str) -> Field {
    Field {
        column: name,
        input: Some(name),
        default: None,
        updatable: true,
    }
}

/// Self-reported wellness check-in. `created_at` is stamped once at creation
/// and never taken from, or overwritten by, a request body.
pub const WELLNESS_CHECKINS: Resource = Resource {
    route: "wellnessCheckin",
    table: "wellness_checkins",
    order_by: "created_at",
    fields: &[
        reported("energy_level"),
        reported("mood"),
        reported("caffeine_craving"),
        reported("notes"),
        Field {
            column: "created_at",
            input: None,
            default: Some(FieldDefault::Now),
            updatable: false,
        },
    ],
};
