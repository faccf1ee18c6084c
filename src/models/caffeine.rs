use super::{Field, FieldDefault, Resource};

/// Caffeine intake log. The body calls the beverage `type`; the column is
/// `beverage_type`.
pub const CAFFEINE_ENTRIES: Resource = Resource {
    route: "caffeineTimer",
    table: "caffeine_entries",
    order_by: "consumed_at",
    fields: &[
        Field {
            column: "amount",
            input: Some("amount"),
            default: Some(FieldDefault::Integer(0)),
            updatable: true,
        },
        Field {
            column: "beverage_type",
            input: Some("type"),
            default: Some(FieldDefault::Text("coffee")),
            updatable: true,
        },
        Field {
            column: "consumed_at",
            input: Some("consumed_at"),
            default: Some(FieldDefault::Now),
            updatable: true,
        },
    ],
};
