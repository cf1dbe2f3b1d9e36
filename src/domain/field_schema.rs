use crate::domain::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical target fields every imported row is normalized into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    RecipientName,
    RecipientPhone,
    DeliveryAddress,
    ProductName,
    ProductSpec,
    Quantity,
    Remarks,
}

impl FieldKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::RecipientName => "recipient_name",
            FieldKey::RecipientPhone => "recipient_phone",
            FieldKey::DeliveryAddress => "delivery_address",
            FieldKey::ProductName => "product_name",
            FieldKey::ProductSpec => "product_spec",
            FieldKey::Quantity => "quantity",
            FieldKey::Remarks => "remarks",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        FieldSchema::fields()
            .iter()
            .map(|field| field.key)
            .find(|key| key.as_str() == s)
            .ok_or_else(|| AppError::InvalidMapping(format!("unknown field '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Numeric,
}

/// How the values of several source columns combine into one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Concat,
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Concat => "concat",
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Operation::Concat => "拼接",
            Operation::Add => "加",
            Operation::Subtract => "减",
            Operation::Multiply => "乘",
            Operation::Divide => "除",
        }
    }
}

const TEXT_OPERATIONS: &[Operation] = &[Operation::Concat];
const NUMERIC_OPERATIONS: &[Operation] = &[
    Operation::Add,
    Operation::Subtract,
    Operation::Multiply,
    Operation::Divide,
];

impl FieldKind {
    pub fn allowed_operations(&self) -> &'static [Operation] {
        match self {
            FieldKind::Text => TEXT_OPERATIONS,
            FieldKind::Numeric => NUMERIC_OPERATIONS,
        }
    }

    pub fn allows(&self, operation: Operation) -> bool {
        self.allowed_operations().contains(&operation)
    }

    /// Operator preselected in the mapping panel.
    pub fn default_operation(&self) -> Operation {
        self.allowed_operations()[0]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldConfig {
    pub key: FieldKey,
    pub label: &'static str,
    pub kind: FieldKind,
    /// Written by the backend when the field is absent from a mapping.
    pub default_value: &'static str,
}

static FIELDS: [FieldConfig; 7] = [
    FieldConfig {
        key: FieldKey::RecipientName,
        label: "收件人姓名",
        kind: FieldKind::Text,
        default_value: "",
    },
    FieldConfig {
        key: FieldKey::RecipientPhone,
        label: "收件人手机号",
        kind: FieldKind::Text,
        default_value: "",
    },
    FieldConfig {
        key: FieldKey::DeliveryAddress,
        label: "收货地址",
        kind: FieldKind::Text,
        default_value: "",
    },
    FieldConfig {
        key: FieldKey::ProductName,
        label: "商品名称",
        kind: FieldKind::Text,
        default_value: "",
    },
    FieldConfig {
        key: FieldKey::ProductSpec,
        label: "商品规格",
        kind: FieldKind::Text,
        default_value: "",
    },
    FieldConfig {
        key: FieldKey::Quantity,
        label: "商品数量",
        kind: FieldKind::Numeric,
        default_value: "1",
    },
    FieldConfig {
        key: FieldKey::Remarks,
        label: "备注",
        kind: FieldKind::Text,
        default_value: "",
    },
];

/// Static registry of canonical fields. Order is presentation order only.
pub struct FieldSchema;

impl FieldSchema {
    pub fn fields() -> &'static [FieldConfig] {
        &FIELDS
    }

    pub fn get(key: FieldKey) -> &'static FieldConfig {
        // FIELDS is laid out in FieldKey declaration order.
        &FIELDS[key as usize]
    }
}
