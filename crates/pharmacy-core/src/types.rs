//! # Domain Types
//!
//! Catalog, branch and actor types shared by every workflow.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │ UnitDefinition  │   │  BranchStock    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │──►│  unit_label     │   │  branch_code    │       │
//! │  │  code (business)│   │  qty_per_unit   │   │  product_code   │       │
//! │  │  name           │   │  price (Money)  │   │  quantity       │       │
//! │  │  campaign_code? │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   ActorRole     │   │ PaymentMethod   │   │ ReceivingMethod │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Customer       │   │  CashOnDelivery │   │  Delivery       │       │
//! │  │  Staff          │   │  BankTransfer   │   │  BranchPickup   │       │
//! │  │  Admin          │   └─────────────────┘   └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Products carry both:
//! - `id`: UUID v4, used for relations (cart lines, campaign assignment)
//! - `code`: human-readable, used on order lines, receipts and stock rows

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::{validate_code, validate_name, ValidationResult};
use crate::{MAX_QUANTITY_PER_UNIT, MAX_UNIT_PRICE};

// =============================================================================
// Product
// =============================================================================

/// One way a product is sold: a box, a blister strip, a single tablet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UnitDefinition {
    /// Label shown to the customer ("Hộp", "Vỉ", "Viên").
    pub unit_label: String,

    /// How many base units this selling unit contains.
    pub quantity_per_unit: i64,

    /// Base price of one selling unit.
    pub price: Money,
}

/// A catalog product. Read-only to the commerce core.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Business identifier printed on order lines and receipts.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Selling units, at least one.
    pub units: Vec<UnitDefinition>,

    /// Campaign currently assigned to this product, if any.
    ///
    /// Assignment is last-wins; expiry is evaluated when the campaign is read.
    pub campaign_code: Option<String>,

    /// Whether the product is listed (soft delete).
    pub is_active: bool,
}

impl Product {
    /// Looks up a selling unit by label.
    pub fn unit(&self, unit_label: &str) -> Option<&UnitDefinition> {
        self.units.iter().find(|u| u.unit_label == unit_label)
    }

    /// Base price for a selling unit, or `None` if the product is not sold that way.
    pub fn price_for(&self, unit_label: &str) -> Option<Money> {
        self.unit(unit_label).map(|u| u.price)
    }

    /// At least one unit, unit labels unique, pack sizes and prices within
    /// catalog bounds.
    pub fn validate(&self) -> ValidationResult<()> {
        validate_code("product.code", &self.code)?;
        validate_name("product.name", &self.name)?;
        if self.units.is_empty() {
            return Err(ValidationError::required("product.units"));
        }
        for (i, unit) in self.units.iter().enumerate() {
            validate_name("unit_label", &unit.unit_label)?;
            if unit.quantity_per_unit <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "quantity_per_unit".to_string(),
                });
            }
            if unit.quantity_per_unit > MAX_QUANTITY_PER_UNIT {
                return Err(ValidationError::OutOfRange {
                    field: "quantity_per_unit".to_string(),
                    min: 1,
                    max: MAX_QUANTITY_PER_UNIT,
                });
            }
            if unit.price.is_negative() || unit.price.minor() > MAX_UNIT_PRICE {
                return Err(ValidationError::OutOfRange {
                    field: "price".to_string(),
                    min: 0,
                    max: MAX_UNIT_PRICE,
                });
            }
            if self.units[..i].iter().any(|u| u.unit_label == unit.unit_label) {
                return Err(ValidationError::Duplicate {
                    field: "unit_label".to_string(),
                    value: unit.unit_label.clone(),
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Branch Stock
// =============================================================================

/// Quantity on hand of one product at one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BranchStock {
    pub branch_code: String,
    pub product_code: String,
    pub quantity: i64,
}

/// A physical pharmacy location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Branch {
    pub code: String,
    pub name: String,
    pub address: String,
}

// =============================================================================
// Actor Role
// =============================================================================

/// Who is performing an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Staff,
    Admin,
}

impl ActorRole {
    /// Staff and admins run the back office: order status, receipts, promotions.
    #[inline]
    pub const fn is_back_office(&self) -> bool {
        matches!(self, ActorRole::Staff | ActorRole::Admin)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Customer => "customer",
            ActorRole::Staff => "staff",
            ActorRole::Admin => "admin",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer pays for an order.
///
/// ## Checkout Branch
/// ```text
/// CashOnDelivery ──► order confirmation view
/// BankTransfer   ──► payment gateway redirect (status stays Pending)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum PaymentMethod {
    CashOnDelivery,
    BankTransfer,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 2] = [PaymentMethod::CashOnDelivery, PaymentMethod::BankTransfer];

    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "CashOnDelivery",
            PaymentMethod::BankTransfer => "BankTransfer",
        }
    }

    /// Whether checkout hands the customer off to the payment gateway.
    #[inline]
    pub const fn requires_redirect(&self) -> bool {
        matches!(self, PaymentMethod::BankTransfer)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: PaymentMethod::ALL.iter().map(|m| m.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Receiving Method
// =============================================================================

/// How the customer receives the goods.
///
/// Pickup has no shipping fee and an empty delivery address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ReceivingMethod {
    Delivery,
    BranchPickup,
}

impl ReceivingMethod {
    pub const ALL: [ReceivingMethod; 2] = [ReceivingMethod::Delivery, ReceivingMethod::BranchPickup];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ReceivingMethod::Delivery => "Delivery",
            ReceivingMethod::BranchPickup => "BranchPickup",
        }
    }

    /// Shipping fee for this receiving method given the configured delivery fee.
    pub fn shipping_fee(&self, delivery_fee: Money) -> Money {
        match self {
            ReceivingMethod::Delivery => delivery_fee,
            ReceivingMethod::BranchPickup => Money::zero(),
        }
    }
}

impl fmt::Display for ReceivingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceivingMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReceivingMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "receiving_method".to_string(),
                allowed: ReceivingMethod::ALL
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect(),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn paracetamol() -> Product {
        Product {
            id: "p-1".to_string(),
            code: "PARA-500".to_string(),
            name: "Paracetamol 500mg".to_string(),
            units: vec![
                UnitDefinition {
                    unit_label: "Hộp".to_string(),
                    quantity_per_unit: 100,
                    price: Money::from_minor(100_000),
                },
                UnitDefinition {
                    unit_label: "Vỉ".to_string(),
                    quantity_per_unit: 10,
                    price: Money::from_minor(12_000),
                },
            ],
            campaign_code: None,
            is_active: true,
        }
    }

    #[test]
    fn test_price_for_unit() {
        let product = paracetamol();
        assert_eq!(product.price_for("Vỉ"), Some(Money::from_minor(12_000)));
        assert_eq!(product.price_for("Chai"), None);
    }

    #[test]
    fn test_product_validation() {
        assert!(paracetamol().validate().is_ok());

        let mut no_units = paracetamol();
        no_units.units.clear();
        assert_eq!(
            no_units.validate(),
            Err(ValidationError::required("product.units"))
        );

        let mut twice = paracetamol();
        twice.units[1].unit_label = "Hộp".to_string();
        assert!(matches!(
            twice.validate(),
            Err(ValidationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_price_and_pack_size_are_bounded() {
        let mut at_limit = paracetamol();
        at_limit.units[0].price = Money::from_minor(MAX_UNIT_PRICE);
        at_limit.units[0].quantity_per_unit = MAX_QUANTITY_PER_UNIT;
        assert!(at_limit.validate().is_ok());

        let mut pricey = paracetamol();
        pricey.units[0].price = Money::from_minor(MAX_UNIT_PRICE + 1);
        assert!(matches!(
            pricey.validate(),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "price"
        ));

        let mut negative = paracetamol();
        negative.units[1].price = Money::from_minor(-1);
        assert!(negative.validate().is_err());

        let mut crate_of = paracetamol();
        crate_of.units[0].quantity_per_unit = MAX_QUANTITY_PER_UNIT + 1;
        assert!(matches!(
            crate_of.validate(),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "quantity_per_unit"
        ));

        // The largest allowed line still prices without saturating
        let line = Money::from_minor(MAX_UNIT_PRICE).checked_multiply_quantity(crate::MAX_LINE_QUANTITY);
        assert!(line.is_some());
    }

    #[test]
    fn test_back_office_roles() {
        assert!(!ActorRole::Customer.is_back_office());
        assert!(ActorRole::Staff.is_back_office());
        assert!(ActorRole::Admin.is_back_office());
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!(
            "BankTransfer".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BankTransfer
        );
        assert!("bank".parse::<PaymentMethod>().is_err());
        assert!(PaymentMethod::BankTransfer.requires_redirect());
        assert!(!PaymentMethod::CashOnDelivery.requires_redirect());
    }

    #[test]
    fn test_pickup_has_no_shipping_fee() {
        let fee = Money::from_minor(30_000);
        assert_eq!(ReceivingMethod::Delivery.shipping_fee(fee), fee);
        assert_eq!(ReceivingMethod::BranchPickup.shipping_fee(fee), Money::zero());
        assert_eq!(
            "BranchPickup".parse::<ReceivingMethod>().unwrap(),
            ReceivingMethod::BranchPickup
        );
    }
}
