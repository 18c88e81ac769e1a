//! Request payloads and their field validation.

use std::collections::{BTreeSet, HashSet};

use bigdecimal::{BigDecimal, Zero};
use common_http_errors::FieldMessage;
use common_security::Role;
use serde::Deserialize;

use crate::model::{Address, CustomerKind, EntityId};

const NAME_MIN: usize = 5;
const CATEGORY_NAME_MAX: usize = 80;
const CUSTOMER_NAME_MAX: usize = 120;
const MAX_PHONES: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryDto {
    pub name: String,
}

impl CategoryDto {
    pub fn validate(&self) -> Vec<FieldMessage> {
        let mut errors = Vec::new();
        check_length(&mut errors, "name", &self.name, NAME_MIN, CATEGORY_NAME_MAX);
        errors
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductDto {
    pub name: String,
    pub price: BigDecimal,
    #[serde(default)]
    pub category_ids: BTreeSet<EntityId>,
}

impl ProductDto {
    pub fn validate(&self) -> Vec<FieldMessage> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(FieldMessage::new("name", "Required field"));
        }
        if self.price < BigDecimal::zero() {
            errors.push(FieldMessage::new("price", "Price must not be negative"));
        }
        errors
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub document: String,
    pub kind: CustomerKind,
    pub password: String,
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    pub district: String,
    pub zip_code: String,
    pub city_id: EntityId,
    pub phones: Vec<String>,
    /// Extra roles to grant; CUSTOMER is always added.
    #[serde(default)]
    pub roles: BTreeSet<Role>,
}

impl NewCustomer {
    /// Field checks that need no store access.
    pub fn validate(&self) -> Vec<FieldMessage> {
        let mut errors = Vec::new();
        check_length(&mut errors, "name", &self.name, NAME_MIN, CUSTOMER_NAME_MAX);
        check_email(&mut errors, &self.email);
        if self.password.trim().is_empty() {
            errors.push(FieldMessage::new("password", "Required field"));
        }
        let digits = digits_only(&self.document);
        match self.kind {
            CustomerKind::Individual if !is_valid_cpf(&digits) => {
                errors.push(FieldMessage::new("document", "Invalid CPF"));
            }
            CustomerKind::Company if !is_valid_cnpj(&digits) => {
                errors.push(FieldMessage::new("document", "Invalid CNPJ"));
            }
            _ => {}
        }
        for (field, value) in [
            ("street", &self.street),
            ("number", &self.number),
            ("district", &self.district),
            ("zip_code", &self.zip_code),
        ] {
            if value.trim().is_empty() {
                errors.push(FieldMessage::new(field, "Required field"));
            }
        }
        let phones = self.phone_set();
        if phones.is_empty() {
            errors.push(FieldMessage::new("phones", "At least one phone is required"));
        } else if phones.len() > MAX_PHONES {
            errors.push(FieldMessage::new("phones", "At most three phones are accepted"));
        }
        errors
    }

    pub fn address(&self) -> Address {
        Address {
            street: self.street.trim().to_string(),
            number: self.number.trim().to_string(),
            complement: sanitize_optional(self.complement.clone()),
            district: self.district.trim().to_string(),
            zip_code: self.zip_code.trim().to_string(),
            city_id: self.city_id,
        }
    }

    pub fn phone_set(&self) -> BTreeSet<String> {
        self.phones
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerUpdate {
    pub name: String,
    pub email: String,
}

impl CustomerUpdate {
    pub fn validate(&self) -> Vec<FieldMessage> {
        let mut errors = Vec::new();
        check_length(&mut errors, "name", &self.name, NAME_MIN, CUSTOMER_NAME_MAX);
        check_email(&mut errors, &self.email);
        errors
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentRequest {
    Card { installments: i32 },
    Boleto,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderItem {
    pub product_id: EntityId,
    pub quantity: i32,
    #[serde(default = "BigDecimal::zero")]
    pub discount: BigDecimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    /// Defaults to the caller; only ADMIN may order for someone else.
    #[serde(default)]
    pub customer_id: Option<EntityId>,
    /// Defaults to the customer's first registered address.
    #[serde(default)]
    pub delivery_address: Option<Address>,
    pub payment: PaymentRequest,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn validate(&self) -> Vec<FieldMessage> {
        let mut errors = Vec::new();
        if self.items.is_empty() {
            errors.push(FieldMessage::new("items", "An order needs at least one item"));
        }
        let mut seen = HashSet::new();
        for (idx, item) in self.items.iter().enumerate() {
            if item.quantity <= 0 {
                errors.push(FieldMessage::new(format!("items[{idx}].quantity"), "Quantity must be positive"));
            }
            if item.discount < BigDecimal::zero() {
                errors.push(FieldMessage::new(format!("items[{idx}].discount"), "Discount must not be negative"));
            }
            if !seen.insert(item.product_id) {
                errors.push(FieldMessage::new(format!("items[{idx}].product_id"), "Product listed twice"));
            }
        }
        if let PaymentRequest::Card { installments } = self.payment {
            if installments < 1 {
                errors.push(FieldMessage::new("payment.installments", "At least one installment"));
            }
        }
        errors
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub fn normalize_email(value: &str) -> String {
    value.trim().to_ascii_lowercase()
}

fn sanitize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_length(errors: &mut Vec<FieldMessage>, field: &str, value: &str, min: usize, max: usize) {
    let len = value.trim().chars().count();
    if len == 0 {
        errors.push(FieldMessage::new(field, "Required field"));
    } else if len < min || len > max {
        errors.push(FieldMessage::new(field, format!("Length must be between {min} and {max} characters")));
    }
}

fn check_email(errors: &mut Vec<FieldMessage>, email: &str) {
    let email = email.trim();
    if email.is_empty() {
        errors.push(FieldMessage::new("email", "Required field"));
        return;
    }
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    };
    if !valid {
        errors.push(FieldMessage::new("email", "Invalid email"));
    }
}

fn digits_only(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

/// Brazilian individual taxpayer number: 11 digits with two mod-11 check digits.
pub fn is_valid_cpf(digits: &[u32]) -> bool {
    if digits.len() != 11 || all_same(digits) {
        return false;
    }
    let check = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        let rem = (sum * 10) % 11;
        if rem == 10 { 0 } else { rem }
    };
    check(9) == digits[9] && check(10) == digits[10]
}

/// Brazilian company registration number: 14 digits with two weighted check digits.
pub fn is_valid_cnpj(digits: &[u32]) -> bool {
    const FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    const SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    if digits.len() != 14 || all_same(digits) {
        return false;
    }
    let check = |weights: &[u32]| -> u32 {
        let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
        let rem = sum % 11;
        if rem < 2 { 0 } else { 11 - rem }
    };
    check(&FIRST) == digits[12] && check(&SECOND) == digits[13]
}
