use std::cmp::Ordering;
use std::collections::BTreeSet;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_security::Role;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

pub type EntityId = i64;

/// A persisted record with a store-assigned id.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Predicate type accepted by paged fetches.
    type Filter: EntityFilter<Self> + Send + Sync + 'static;

    const KIND: &'static str;
    /// Canonical sort keys accepted by paged fetches.
    const SORT_FIELDS: &'static [&'static str];

    fn id(&self) -> Option<EntityId>;
    fn set_id(&mut self, id: Option<EntityId>);
    fn compare_by(&self, other: &Self, field: &str) -> Ordering;
}

pub trait EntityFilter<E> {
    fn matches(&self, entity: &E) -> bool;
}

/// Accepts every record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoFilter;

impl<E> EntityFilter<E> for NoFilter {
    fn matches(&self, _entity: &E) -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Option<EntityId>,
    pub name: String,
}

impl Entity for Category {
    type Filter = NoFilter;
    const KIND: &'static str = "category";
    const SORT_FIELDS: &'static [&'static str] = &["id", "name"];

    fn id(&self) -> Option<EntityId> {
        self.id
    }
    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }
    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "name" => self.name.to_lowercase().cmp(&other.name.to_lowercase()),
            _ => self.id.cmp(&other.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Option<EntityId>,
    pub name: String,
    pub price: BigDecimal,
    pub category_ids: BTreeSet<EntityId>,
}

impl Entity for Product {
    type Filter = ProductFilter;
    const KIND: &'static str = "product";
    const SORT_FIELDS: &'static [&'static str] = &["id", "name", "price"];

    fn id(&self) -> Option<EntityId> {
        self.id
    }
    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }
    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "name" => self.name.to_lowercase().cmp(&other.name.to_lowercase()),
            "price" => self.price.cmp(&other.price),
            _ => self.id.cmp(&other.id),
        }
    }
}

/// Product predicate: case-insensitive name substring AND category membership.
///
/// `categories: None` omits the membership test; `Some(empty)` matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub name_contains: String,
    pub categories: Option<BTreeSet<EntityId>>,
}

impl EntityFilter<Product> for ProductFilter {
    fn matches(&self, product: &Product) -> bool {
        let needle = self.name_contains.to_lowercase();
        if !needle.is_empty() && !product.name.to_lowercase().contains(&needle) {
            return false;
        }
        match &self.categories {
            None => true,
            Some(wanted) => !wanted.is_disjoint(&product.category_ids),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerKind {
    Individual,
    Company,
}

impl CustomerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerKind::Individual => "INDIVIDUAL",
            CustomerKind::Company => "COMPANY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "INDIVIDUAL" => Some(CustomerKind::Individual),
            "COMPANY" => Some(CustomerKind::Company),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub complement: Option<String>,
    pub district: String,
    pub zip_code: String,
    pub city_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub id: Option<EntityId>,
    pub name: String,
    pub email: String,
    pub document: String,
    pub kind: CustomerKind,
    pub password_hash: String,
    pub phones: BTreeSet<String>,
    pub addresses: Vec<Address>,
    pub roles: BTreeSet<Role>,
}

impl Serialize for Customer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Customer", 8)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("email", &self.email)?;
        state.serialize_field("document", &self.document)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("phones", &self.phones)?;
        state.serialize_field("addresses", &self.addresses)?;
        state.serialize_field("roles", &self.roles)?;
        state.end()
    }
}

impl Entity for Customer {
    type Filter = NoFilter;
    const KIND: &'static str = "customer";
    const SORT_FIELDS: &'static [&'static str] = &["id", "name", "email"];

    fn id(&self) -> Option<EntityId> {
        self.id
    }
    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }
    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "name" => self.name.to_lowercase().cmp(&other.name.to_lowercase()),
            "email" => self.email.cmp(&other.email),
            _ => self.id.cmp(&other.id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Pending,
    Settled,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMethod {
    Card { installments: i32 },
    Boleto {
        due_date: DateTime<Utc>,
        #[serde(default)]
        paid_at: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub state: PaymentState,
    #[serde(flatten)]
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: EntityId,
    pub quantity: i32,
    pub discount: BigDecimal,
    /// Unit price captured when the order was placed.
    pub price: BigDecimal,
}

impl OrderItem {
    pub fn subtotal(&self) -> BigDecimal {
        (&self.price - &self.discount) * BigDecimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: Option<EntityId>,
    pub instant: DateTime<Utc>,
    pub customer_id: EntityId,
    pub delivery_address: Option<Address>,
    pub payment: Payment,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn total(&self) -> BigDecimal {
        self.items
            .iter()
            .fold(BigDecimal::from(0), |acc, item| acc + item.subtotal())
    }
}

impl Serialize for Order {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Order", 7)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("instant", &self.instant)?;
        state.serialize_field("customer_id", &self.customer_id)?;
        state.serialize_field("delivery_address", &self.delivery_address)?;
        state.serialize_field("payment", &self.payment)?;
        state.serialize_field("items", &self.items)?;
        state.serialize_field("total", &self.total())?;
        state.end()
    }
}

/// Restricts order pages to one customer when set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub customer_id: Option<EntityId>,
}

impl EntityFilter<Order> for OrderFilter {
    fn matches(&self, order: &Order) -> bool {
        self.customer_id.map_or(true, |id| order.customer_id == id)
    }
}

impl Entity for Order {
    type Filter = OrderFilter;
    const KIND: &'static str = "order";
    const SORT_FIELDS: &'static [&'static str] = &["id", "instant"];

    fn id(&self) -> Option<EntityId> {
        self.id
    }
    fn set_id(&mut self, id: Option<EntityId>) {
        self.id = id;
    }
    fn compare_by(&self, other: &Self, field: &str) -> Ordering {
        match field {
            "instant" => self.instant.cmp(&other.instant),
            _ => self.id.cmp(&other.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn product(id: EntityId, name: &str, cats: &[EntityId]) -> Product {
        Product {
            id: Some(id),
            name: name.to_string(),
            price: BigDecimal::from(10),
            category_ids: cats.iter().copied().collect(),
        }
    }

    #[test]
    fn product_filter_is_case_insensitive() {
        let filter = ProductFilter { name_contains: "SHIRT".into(), categories: None };
        assert!(filter.matches(&product(1, "Red shirt", &[])));
        assert!(!filter.matches(&product(2, "Mug", &[])));
    }

    #[test]
    fn empty_category_set_matches_nothing() {
        let filter = ProductFilter { name_contains: String::new(), categories: Some(BTreeSet::new()) };
        assert!(!filter.matches(&product(1, "Anything", &[1, 2])));
    }

    #[test]
    fn category_membership_intersects() {
        let filter = ProductFilter { name_contains: String::new(), categories: Some([3, 9].into_iter().collect()) };
        assert!(filter.matches(&product(1, "A", &[1, 3])));
        assert!(!filter.matches(&product(2, "B", &[4])));
    }

    #[test]
    fn order_total_subtracts_discount_per_unit() {
        let order = Order {
            id: None,
            instant: Utc::now(),
            customer_id: 1,
            delivery_address: None,
            payment: Payment { state: PaymentState::Pending, method: PaymentMethod::Card { installments: 1 } },
            items: vec![
                OrderItem {
                    product_id: 1,
                    quantity: 2,
                    discount: BigDecimal::from_str("1.50").unwrap(),
                    price: BigDecimal::from_str("10.00").unwrap(),
                },
                OrderItem {
                    product_id: 2,
                    quantity: 1,
                    discount: BigDecimal::from(0),
                    price: BigDecimal::from_str("4.25").unwrap(),
                },
            ],
        };
        assert_eq!(order.total(), BigDecimal::from_str("21.25").unwrap());
    }

    #[test]
    fn customer_json_omits_password_hash() {
        let customer = Customer {
            id: Some(1),
            name: "Maria Silva".into(),
            email: "maria@example.com".into(),
            document: "52998224725".into(),
            kind: CustomerKind::Individual,
            password_hash: "$argon2id$secret".into(),
            phones: BTreeSet::new(),
            addresses: Vec::new(),
            roles: [Role::Customer].into_iter().collect(),
        };
        let json = serde_json::to_string(&customer).unwrap();
        assert!(!json.contains("password"));
        assert!(json.contains("\"roles\":[\"CUSTOMER\"]"));
    }

    #[test]
    fn payment_serializes_flat_with_type_tag() {
        let payment = Payment { state: PaymentState::Pending, method: PaymentMethod::Card { installments: 3 } };
        let value = serde_json::to_value(&payment).unwrap();
        assert_eq!(value["type"], "card");
        assert_eq!(value["state"], "PENDING");
        assert_eq!(value["installments"], 3);
    }
}
