use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common_http_errors::FieldMessage;
use common_security::{require_principal, require_role_or_owner, Principal, Role, SecurityError};
use tracing::{info, warn};

use crate::dto::{NewOrder, PaymentRequest};
use crate::error::{ServiceError, ServiceResult};
use crate::model::{EntityId, Order, OrderFilter, OrderItem, Payment, PaymentMethod, PaymentState, Product};
use crate::query::{Page, PageRequest, SortDirection};
use crate::store::{CustomerRepository, Repository};

/// Bank slips fall due a week after the order.
const BOLETO_DUE_DAYS: i64 = 7;

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn Repository<Order>>,
    customers: Arc<dyn CustomerRepository>,
    products: Arc<dyn Repository<Product>>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn Repository<Order>>,
        customers: Arc<dyn CustomerRepository>,
        products: Arc<dyn Repository<Product>>,
    ) -> Self {
        Self { orders, customers, products }
    }

    /// Admin-or-owner against the ordering customer. Only ADMIN can tell a
    /// missing order from someone else's.
    pub async fn find(&self, principal: Option<&Principal>, id: EntityId) -> ServiceResult<Order> {
        let caller = require_principal(principal)?;
        let Some(order) = self.orders.find_by_id(id).await? else {
            if caller.has_role(Role::Admin) {
                return Err(ServiceError::not_found("order", id));
            }
            warn!(principal_id = caller.id, order_id = id, "authorization_denied");
            return Err(SecurityError::AccessDenied.into());
        };
        require_role_or_owner(principal, Role::Admin, order.customer_id)?;
        Ok(order)
    }

    /// The caller's own orders.
    pub async fn find_page(
        &self,
        principal: Option<&Principal>,
        page: i64,
        size: i64,
        order_by: &str,
        direction: SortDirection,
    ) -> ServiceResult<Page<Order>> {
        let caller = require_principal(principal)?;
        let request = PageRequest::for_entity::<Order>(page, size, order_by, direction)?;
        let filter = OrderFilter { customer_id: Some(caller.id) };
        Ok(self.orders.find_page(&filter, &request).await?)
    }

    pub async fn insert(&self, principal: Option<&Principal>, dto: NewOrder) -> ServiceResult<Order> {
        self.insert_at(principal, dto, Utc::now()).await
    }

    /// Places an order stamped with `now`; item prices are snapshotted from the product store.
    pub async fn insert_at(&self, principal: Option<&Principal>, dto: NewOrder, now: DateTime<Utc>) -> ServiceResult<Order> {
        let caller = require_principal(principal)?;
        let customer_id = dto.customer_id.unwrap_or(caller.id);
        require_role_or_owner(principal, Role::Admin, customer_id)?;
        ServiceError::check_fields(dto.validate())?;

        let customer = self
            .customers
            .find_by_id(customer_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("customer", customer_id))?;
        let delivery_address = match dto.delivery_address {
            Some(address) => address,
            None => customer.addresses.first().cloned().ok_or_else(|| {
                ServiceError::Validation(vec![FieldMessage::new(
                    "delivery_address",
                    "Customer has no registered address",
                )])
            })?,
        };

        let wanted: BTreeSet<EntityId> = dto.items.iter().map(|i| i.product_id).collect();
        let prices: BTreeMap<EntityId, Product> = self
            .products
            .find_all_by_id(&wanted)
            .await?
            .into_iter()
            .filter_map(|p| p.id.map(|id| (id, p)))
            .collect();
        let mut items = Vec::with_capacity(dto.items.len());
        for item in dto.items {
            let product = prices
                .get(&item.product_id)
                .ok_or_else(|| ServiceError::not_found("product", item.product_id))?;
            items.push(OrderItem {
                product_id: item.product_id,
                quantity: item.quantity,
                discount: item.discount,
                price: product.price.clone(),
            });
        }

        let method = match dto.payment {
            PaymentRequest::Card { installments } => PaymentMethod::Card { installments },
            PaymentRequest::Boleto => PaymentMethod::Boleto {
                due_date: now + Duration::days(BOLETO_DUE_DAYS),
                paid_at: None,
            },
        };
        let order = Order {
            id: None,
            instant: now,
            customer_id,
            delivery_address: Some(delivery_address),
            payment: Payment { state: PaymentState::Pending, method },
            items,
        };
        let saved = self.orders.save(order).await?;
        info!(
            order_id = ?saved.id,
            customer_id,
            total = %saved.total(),
            recipient = %customer.email,
            "order placed; confirmation handed to mail delivery"
        );
        Ok(saved)
    }
}
