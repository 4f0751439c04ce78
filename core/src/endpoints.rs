//! SIGN AT endpoint catalog.
//!
//! Each endpoint is a static `Endpoint` plus a constructor that demands every
//! path identifier up front. Identifiers are chosen by the caller and are
//! expected to be UUIDv4 strings; [`new_id`] produces one. The framework does
//! not check the format.

use std::fmt::Display;

use uuid::Uuid;

use crate::http::HttpMethod;
use crate::operation::{Endpoint, Operation};
use crate::types::Payload;
use crate::validation::{Constraint, RuleSet, Shape, ShapeField};

/// Fresh UUIDv4 for a new resource.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub mod cash_registers {
    use super::*;

    /// States a cash register can be moved to with an update.
    pub const STATES: &[&str] = &[
        "REGISTERED",
        "INITIALIZED",
        "DECOMMISSIONED",
        "DEFECTIVE",
        "OUTAGE",
    ];

    pub static CREATE: Endpoint = Endpoint {
        name: "cash_registers.create",
        method: HttpMethod::Put,
        path: "/cash-register/{cash_register_id}",
        rules: RuleSet {
            required: &[],
            optional: &["description", "metadata"],
            constraints: &[("description", Constraint::String)],
        },
    };

    pub static UPDATE: Endpoint = Endpoint {
        name: "cash_registers.update",
        method: HttpMethod::Patch,
        path: "/cash-register/{cash_register_id}",
        rules: RuleSet {
            required: &["state"],
            optional: &["description", "metadata"],
            constraints: &[
                ("state", Constraint::OneOf(STATES)),
                ("description", Constraint::String),
            ],
        },
    };

    /// Create a cash register. It starts out `CREATED`.
    pub fn create(
        token: impl Into<String>,
        cash_register_id: impl Display,
        payload: Payload,
    ) -> Operation {
        Operation::new(&CREATE, token)
            .with_path_param("cash_register_id", cash_register_id)
            .with_payload(payload)
    }

    /// Move a cash register to another state (e.g. `INITIALIZED` before
    /// signing, `DECOMMISSIONED` at end of life).
    pub fn update(
        token: impl Into<String>,
        cash_register_id: impl Display,
        payload: Payload,
    ) -> Operation {
        Operation::new(&UPDATE, token)
            .with_path_param("cash_register_id", cash_register_id)
            .with_payload(payload)
    }
}

pub mod receipts {
    use super::*;

    pub const RECEIPT_TYPES: &[&str] = &["NORMAL", "CANCELLATION", "TRAINING"];

    const AMOUNT_PER_VAT_RATE: Shape = Shape::Object(&[
        ShapeField {
            name: "vat_rate",
            required: true,
            shape: Shape::Present,
        },
        ShapeField {
            name: "amount",
            required: true,
            shape: Shape::Present,
        },
    ]);

    const AMOUNT_PER_PAYMENT_TYPE: Shape = Shape::Object(&[
        ShapeField {
            name: "payment_type",
            required: true,
            shape: Shape::Present,
        },
        ShapeField {
            name: "amount",
            required: true,
            shape: Shape::Present,
        },
        ShapeField {
            name: "currency_code",
            required: true,
            shape: Shape::Present,
        },
    ]);

    const LINE_ITEM: Shape = Shape::Object(&[
        ShapeField {
            name: "quantity",
            required: true,
            shape: Shape::Present,
        },
        ShapeField {
            name: "text",
            required: true,
            shape: Shape::Present,
        },
        ShapeField {
            name: "price_per_unit",
            required: true,
            shape: Shape::Present,
        },
    ]);

    const STANDARD_V1: Shape = Shape::Object(&[
        ShapeField {
            name: "amounts_per_vat_rate",
            required: true,
            shape: Shape::NonEmptyArrayOf(&AMOUNT_PER_VAT_RATE),
        },
        ShapeField {
            name: "amounts_per_payment_type",
            required: false,
            shape: Shape::ArrayOf(&AMOUNT_PER_PAYMENT_TYPE),
        },
        ShapeField {
            name: "line_items",
            required: false,
            shape: Shape::ArrayOf(&LINE_ITEM),
        },
    ]);

    pub const SCHEMA: Shape = Shape::Object(&[ShapeField {
        name: "standard_v1",
        required: true,
        shape: STANDARD_V1,
    }]);

    pub const SCHEMA_DESCRIPTION: &str = "{ standard_v1: { \
        amounts_per_vat_rate: [{ vat_rate, amount }], \
        amounts_per_payment_type?: [{ payment_type, amount, currency_code }], \
        line_items?: [{ quantity, text, price_per_unit }] } }";

    pub static UPSERT: Endpoint = Endpoint {
        name: "receipts.upsert",
        method: HttpMethod::Put,
        path: "/cash-register/{cash_register_id}/receipt/{receipt_id}",
        rules: RuleSet {
            required: &["schema", "receipt_type"],
            optional: &["metadata"],
            constraints: &[
                ("receipt_type", Constraint::OneOf(RECEIPT_TYPES)),
                (
                    "schema",
                    Constraint::Shape {
                        shape: &SCHEMA,
                        description: SCHEMA_DESCRIPTION,
                    },
                ),
            ],
        },
    };

    /// Sign a receipt on an `INITIALIZED` cash register. Signing the same
    /// receipt id again returns the stored result.
    pub fn upsert(
        token: impl Into<String>,
        cash_register_id: impl Display,
        receipt_id: impl Display,
        payload: Payload,
    ) -> Operation {
        Operation::new(&UPSERT, token)
            .with_path_param("cash_register_id", cash_register_id)
            .with_path_param("receipt_id", receipt_id)
            .with_payload(payload)
    }
}

pub mod signature_creation_units {
    use super::*;

    pub const STATES: &[&str] = &["INITIALIZED", "DECOMMISSIONED"];

    pub static CREATE: Endpoint = Endpoint {
        name: "signature_creation_units.create",
        method: HttpMethod::Put,
        path: "/signature-creation-unit/{scu_id}",
        rules: RuleSet {
            required: &["legal_entity_id"],
            optional: &["legal_entity_name", "metadata"],
            constraints: &[
                ("legal_entity_id", Constraint::NonNull),
                ("legal_entity_name", Constraint::String),
            ],
        },
    };

    pub static UPDATE: Endpoint = Endpoint {
        name: "signature_creation_units.update",
        method: HttpMethod::Patch,
        path: "/signature-creation-unit/{scu_id}",
        rules: RuleSet {
            required: &["state"],
            optional: &["metadata"],
            constraints: &[("state", Constraint::OneOf(STATES))],
        },
    };

    pub fn create(token: impl Into<String>, scu_id: impl Display, payload: Payload) -> Operation {
        Operation::new(&CREATE, token)
            .with_path_param("scu_id", scu_id)
            .with_payload(payload)
    }

    pub fn update(token: impl Into<String>, scu_id: impl Display, payload: Payload) -> Operation {
        Operation::new(&UPDATE, token)
            .with_path_param("scu_id", scu_id)
            .with_payload(payload)
    }
}

pub mod fon {
    use super::*;

    pub static AUTHENTICATE: Endpoint = Endpoint {
        name: "fon.authenticate",
        method: HttpMethod::Put,
        path: "/fon/auth",
        rules: RuleSet {
            required: &["fon_participant_id", "fon_user_id", "fon_user_pin"],
            optional: &["metadata"],
            constraints: &[
                ("fon_participant_id", Constraint::String),
                ("fon_user_id", Constraint::String),
                ("fon_user_pin", Constraint::String),
            ],
        },
    };

    /// Register the taxpayer's FinanzOnline web service user. Needed once,
    /// before any SCU or cash register can be initialized.
    pub fn authenticate(token: impl Into<String>, payload: Payload) -> Operation {
        Operation::new(&AUTHENTICATE, token).with_payload(payload)
    }
}

/// Every endpoint in the catalog.
pub fn all() -> [&'static Endpoint; 6] {
    [
        &cash_registers::CREATE,
        &cash_registers::UPDATE,
        &receipts::UPSERT,
        &signature_creation_units::CREATE,
        &signature_creation_units::UPDATE,
        &fon::AUTHENTICATE,
    ]
}
