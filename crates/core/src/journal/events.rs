//! Business event templates.
//!
//! Each recognized event type maps to a pure function that turns a payload
//! into journal lines. The table is the single place where the debit/credit
//! mapping of business events is defined.

use coffer_shared::types::round_money;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::codes;
use super::error::JournalError;
use super::types::JournalLineInput;

/// Recognized business event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Point-of-sale sale.
    PosSale,
    /// Marketplace order settled through the clearing account.
    SvmOrder,
    /// Customer refund of a sale.
    Refund,
    /// Stock count correction.
    InventoryAdjustment,
    /// Payout of vendor payables.
    VendorPayout,
    /// Platform fee charged to a vendor.
    PlatformFee,
}

impl EventType {
    /// All event types, in table order.
    pub const ALL: [Self; 6] = [
        Self::PosSale,
        Self::SvmOrder,
        Self::Refund,
        Self::InventoryAdjustment,
        Self::VendorPayout,
        Self::PlatformFee,
    ];

    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PosSale => "POS_SALE",
            Self::SvmOrder => "SVM_ORDER",
            Self::Refund => "REFUND",
            Self::InventoryAdjustment => "INVENTORY_ADJUSTMENT",
            Self::VendorPayout => "VENDOR_PAYOUT",
            Self::PlatformFee => "PLATFORM_FEE",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| JournalError::UnknownEventType(s.to_string()))
    }
}

/// How a sale or refund was paid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Cash drawer.
    #[default]
    Cash,
    /// Bank transfer.
    Bank,
    /// Card, settled to the bank account.
    Card,
    /// Platform wallet, settled through clearing.
    Wallet,
}

impl PaymentMethod {
    /// Asset account that receives or pays the money.
    #[must_use]
    pub const fn account_code(self) -> &'static str {
        match self {
            Self::Cash => codes::CASH,
            Self::Bank | Self::Card => codes::BANK,
            Self::Wallet => codes::CLEARING,
        }
    }
}

/// Direction of an inventory adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentDirection {
    /// Stock found.
    Increase,
    /// Stock lost or written off.
    Decrease,
}

/// Amounts carried by a business event.
///
/// Amounts are rounded to 2 decimal places before any line is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Gross amount of the event, tax included.
    #[serde(alias = "amount")]
    pub gross_amount: Decimal,
    /// Tax included in the gross amount.
    #[serde(default)]
    pub tax_amount: Decimal,
    /// Cost of goods moved out of (or back into) inventory.
    #[serde(default)]
    pub cost_amount: Decimal,
    /// Platform commission withheld from the vendor.
    #[serde(default)]
    pub platform_fee: Decimal,
    /// Payment channel for sales and refunds.
    #[serde(default)]
    pub payment_method: PaymentMethod,
    /// Required for inventory adjustments.
    #[serde(default)]
    pub direction: Option<AdjustmentDirection>,
    /// Overrides the generated entry description.
    #[serde(default)]
    pub memo: Option<String>,
}

impl EventPayload {
    fn rounded(&self) -> Result<Self, JournalError> {
        let payload = Self {
            gross_amount: round_money(self.gross_amount),
            tax_amount: round_money(self.tax_amount),
            cost_amount: round_money(self.cost_amount),
            platform_fee: round_money(self.platform_fee),
            ..self.clone()
        };

        if payload.gross_amount <= Decimal::ZERO {
            return Err(invalid("gross_amount must be positive"));
        }
        for (name, value) in [
            ("tax_amount", payload.tax_amount),
            ("cost_amount", payload.cost_amount),
            ("platform_fee", payload.platform_fee),
        ] {
            if value < Decimal::ZERO {
                return Err(invalid(&format!("{name} cannot be negative")));
            }
        }
        Ok(payload)
    }

    /// Gross amount less tax.
    fn net_of_tax(&self) -> Result<Decimal, JournalError> {
        let net = self.gross_amount - self.tax_amount;
        if net <= Decimal::ZERO {
            return Err(invalid("tax_amount must be less than gross_amount"));
        }
        Ok(net)
    }
}

/// Builds journal lines from a validated payload.
pub type LineBuilder = fn(&EventPayload) -> Result<Vec<JournalLineInput>, JournalError>;

/// One row of the template table.
#[derive(Debug, Clone, Copy)]
pub struct EventTemplate {
    /// Event type handled by this row.
    pub event_type: EventType,
    /// Default entry description prefix.
    pub description: &'static str,
    /// Line builder.
    pub build: LineBuilder,
}

/// The event template table.
pub const EVENT_TEMPLATES: &[EventTemplate] = &[
    EventTemplate {
        event_type: EventType::PosSale,
        description: "POS sale",
        build: pos_sale_lines,
    },
    EventTemplate {
        event_type: EventType::SvmOrder,
        description: "Marketplace order",
        build: svm_order_lines,
    },
    EventTemplate {
        event_type: EventType::Refund,
        description: "Refund",
        build: refund_lines,
    },
    EventTemplate {
        event_type: EventType::InventoryAdjustment,
        description: "Inventory adjustment",
        build: inventory_adjustment_lines,
    },
    EventTemplate {
        event_type: EventType::VendorPayout,
        description: "Vendor payout",
        build: vendor_payout_lines,
    },
    EventTemplate {
        event_type: EventType::PlatformFee,
        description: "Platform fee",
        build: platform_fee_lines,
    },
];

/// Looks up the template for an event type.
///
/// # Errors
///
/// Returns `UnknownEventType` if no row handles the type.
pub fn template_for(event_type: EventType) -> Result<&'static EventTemplate, JournalError> {
    EVENT_TEMPLATES
        .iter()
        .find(|t| t.event_type == event_type)
        .ok_or_else(|| JournalError::UnknownEventType(event_type.to_string()))
}

/// Parses a raw event payload.
///
/// # Errors
///
/// Returns `InvalidPayload` if the JSON does not match [`EventPayload`].
pub fn parse_payload(value: &serde_json::Value) -> Result<EventPayload, JournalError> {
    serde_json::from_value(value.clone()).map_err(|e| JournalError::InvalidPayload(e.to_string()))
}

/// Lines and description for an event.
///
/// # Errors
///
/// Returns `InvalidPayload` if the amounts are inconsistent for the template.
pub fn lines_for_event(
    event_type: EventType,
    source_id: &str,
    payload: &EventPayload,
) -> Result<(String, Vec<JournalLineInput>), JournalError> {
    let template = template_for(event_type)?;
    let payload = payload.rounded()?;
    let lines = (template.build)(&payload)?;
    let description = payload
        .memo
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map_or_else(|| format!("{} {source_id}", template.description), str::to_string);
    Ok((description, lines))
}

fn invalid(reason: &str) -> JournalError {
    JournalError::InvalidPayload(reason.to_string())
}

fn push_if_positive(lines: &mut Vec<JournalLineInput>, line: JournalLineInput) {
    if line.debit_amount > Decimal::ZERO || line.credit_amount > Decimal::ZERO {
        lines.push(line);
    }
}

fn pos_sale_lines(p: &EventPayload) -> Result<Vec<JournalLineInput>, JournalError> {
    let net = p.net_of_tax()?;
    let mut lines = vec![
        JournalLineInput::debit(p.payment_method.account_code(), p.gross_amount),
        JournalLineInput::credit(codes::SALES, net),
    ];
    push_if_positive(&mut lines, JournalLineInput::credit(codes::TAX_PAYABLE, p.tax_amount));
    push_if_positive(&mut lines, JournalLineInput::debit(codes::COGS, p.cost_amount));
    push_if_positive(&mut lines, JournalLineInput::credit(codes::INVENTORY, p.cost_amount));
    Ok(lines)
}

fn svm_order_lines(p: &EventPayload) -> Result<Vec<JournalLineInput>, JournalError> {
    let vendor_share = p.gross_amount - p.tax_amount - p.platform_fee;
    if vendor_share <= Decimal::ZERO {
        return Err(invalid("tax_amount and platform_fee exceed gross_amount"));
    }
    let mut lines = vec![
        JournalLineInput::debit(codes::CLEARING, p.gross_amount),
        JournalLineInput::credit(codes::VENDOR_PAYABLE, vendor_share),
    ];
    push_if_positive(
        &mut lines,
        JournalLineInput::credit(codes::PLATFORM_FEE_REVENUE, p.platform_fee),
    );
    push_if_positive(&mut lines, JournalLineInput::credit(codes::TAX_PAYABLE, p.tax_amount));
    Ok(lines)
}

fn refund_lines(p: &EventPayload) -> Result<Vec<JournalLineInput>, JournalError> {
    let net = p.net_of_tax()?;
    let mut lines = vec![JournalLineInput::debit(codes::SALES, net)];
    push_if_positive(&mut lines, JournalLineInput::debit(codes::TAX_PAYABLE, p.tax_amount));
    lines.push(JournalLineInput::credit(
        p.payment_method.account_code(),
        p.gross_amount,
    ));
    push_if_positive(&mut lines, JournalLineInput::debit(codes::INVENTORY, p.cost_amount));
    push_if_positive(&mut lines, JournalLineInput::credit(codes::COGS, p.cost_amount));
    Ok(lines)
}

fn inventory_adjustment_lines(p: &EventPayload) -> Result<Vec<JournalLineInput>, JournalError> {
    let amount = p.gross_amount;
    match p.direction {
        Some(AdjustmentDirection::Decrease) => Ok(vec![
            JournalLineInput::debit(codes::SHRINKAGE, amount),
            JournalLineInput::credit(codes::INVENTORY, amount),
        ]),
        Some(AdjustmentDirection::Increase) => Ok(vec![
            JournalLineInput::debit(codes::INVENTORY, amount),
            JournalLineInput::credit(codes::OTHER_INCOME, amount),
        ]),
        None => Err(invalid("direction is required for inventory adjustments")),
    }
}

fn vendor_payout_lines(p: &EventPayload) -> Result<Vec<JournalLineInput>, JournalError> {
    Ok(vec![
        JournalLineInput::debit(codes::VENDOR_PAYABLE, p.gross_amount),
        JournalLineInput::credit(codes::BANK, p.gross_amount),
    ])
}

fn platform_fee_lines(p: &EventPayload) -> Result<Vec<JournalLineInput>, JournalError> {
    Ok(vec![
        JournalLineInput::debit(codes::VENDOR_PAYABLE, p.gross_amount),
        JournalLineInput::credit(codes::PLATFORM_FEE_REVENUE, p.gross_amount),
    ])
}
