use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_security::Role;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::warn;

use super::{CustomerRepository, Repository, StoreError};
use crate::model::{
    Address, Category, Customer, CustomerKind, EntityId, NoFilter, Order, OrderFilter, OrderItem, Payment,
    Product, ProductFilter,
};
use crate::query::{Page, PageRequest};

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.price, \
     ARRAY(SELECT pc.category_id FROM product_categories pc WHERE pc.product_id = p.id ORDER BY pc.category_id) AS category_ids";
const CUSTOMER_COLUMNS: &str =
    "c.id, c.name, c.email, c.document, c.kind, c.password_hash, c.phones, c.addresses, c.roles";
const CUSTOMER_RETURNING: &str =
    "id, name, email, document, kind, password_hash, phones, addresses, roles";
const ORDER_COLUMNS: &str = "o.id, o.instant, o.customer_id, o.delivery_address, o.payment";

/// Postgres-backed repositories sharing one pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::Backend(format!("migration failed: {err}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// ORDER BY expression for a validated sort key; ties fall back to the id.
fn order_clause(alias: &str, page: &PageRequest) -> String {
    let column = match page.sort_field() {
        "name" => format!("lower({alias}.name)"),
        "price" => format!("{alias}.price"),
        "email" => format!("{alias}.email"),
        "instant" => format!("{alias}.instant"),
        _ => format!("{alias}.id"),
    };
    format!("{column} {}, {alias}.id ASC", page.direction().as_sql())
}

/// Escapes LIKE metacharacters and wraps the needle for a substring match.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in needle.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Total from the `COUNT(*) OVER()` column, or `fallback` when the page came back empty.
fn window_total(rows: &[PgRow], fallback: i64) -> Result<u64, StoreError> {
    let total = match rows.first() {
        Some(row) => row.try_get::<i64, _>("total_count")?,
        None => fallback,
    };
    Ok(total.max(0) as u64)
}

fn category_from_row(row: &PgRow) -> Result<Category, StoreError> {
    Ok(Category {
        id: Some(row.try_get("id")?),
        name: row.try_get("name")?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let category_ids: Vec<i64> = row.try_get("category_ids")?;
    Ok(Product {
        id: Some(row.try_get("id")?),
        name: row.try_get("name")?,
        price: row.try_get::<BigDecimal, _>("price")?,
        category_ids: category_ids.into_iter().collect(),
    })
}

fn customer_from_row(row: &PgRow) -> Result<Customer, StoreError> {
    let kind: String = row.try_get("kind")?;
    let kind = CustomerKind::parse(&kind)
        .ok_or_else(|| StoreError::Backend(format!("unknown customer kind '{kind}'")))?;
    let phones: Vec<String> = row.try_get("phones")?;
    let Json(addresses): Json<Vec<Address>> = row.try_get("addresses")?;
    let raw_roles: Vec<String> = row.try_get("roles")?;
    let mut roles = BTreeSet::new();
    for raw in raw_roles {
        match raw.parse::<Role>() {
            Ok(role) => {
                roles.insert(role);
            }
            Err(err) => warn!(error = %err, "ignoring unknown stored role"),
        }
    }
    Ok(Customer {
        id: Some(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        document: row.try_get("document")?,
        kind,
        password_hash: row.try_get("password_hash")?,
        phones: phones.into_iter().collect(),
        addresses,
        roles,
    })
}

fn order_from_row(row: &PgRow, items: Vec<OrderItem>) -> Result<Order, StoreError> {
    let delivery_address: Option<Json<Address>> = row.try_get("delivery_address")?;
    let Json(payment): Json<Payment> = row.try_get("payment")?;
    Ok(Order {
        id: Some(row.try_get("id")?),
        instant: row.try_get::<DateTime<Utc>, _>("instant")?,
        customer_id: row.try_get("customer_id")?,
        delivery_address: delivery_address.map(|Json(a)| a),
        payment,
        items,
    })
}

impl PgStore {
    async fn items_for(&self, order_ids: &[i64]) -> Result<HashMap<i64, Vec<OrderItem>>, StoreError> {
        let rows = sqlx::query(
            "SELECT order_id, product_id, quantity, discount, price FROM order_items \
             WHERE order_id = ANY($1) ORDER BY order_id, product_id",
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;
        let mut grouped: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for row in rows {
            let order_id: i64 = row.try_get("order_id")?;
            grouped.entry(order_id).or_default().push(OrderItem {
                product_id: row.try_get("product_id")?,
                quantity: row.try_get("quantity")?,
                discount: row.try_get("discount")?,
                price: row.try_get("price")?,
            });
        }
        Ok(grouped)
    }

    async fn orders_with_items(&self, rows: &[PgRow]) -> Result<Vec<Order>, StoreError> {
        let ids = rows
            .iter()
            .map(|row| row.try_get::<i64, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut items = self.items_for(&ids).await?;
        rows.iter()
            .zip(ids)
            .map(|(row, id)| order_from_row(row, items.remove(&id).unwrap_or_default()))
            .collect()
    }
}

#[async_trait]
impl Repository<Category> for PgStore {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query("SELECT c.id, c.name FROM categories c WHERE c.id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(category_from_row).transpose()
    }

    async fn save(&self, entity: Category) -> Result<Category, StoreError> {
        let row = match entity.id {
            None => {
                sqlx::query("INSERT INTO categories (name) VALUES ($1) RETURNING id, name")
                    .bind(&entity.name)
                    .fetch_one(&self.pool)
                    .await?
            }
            Some(id) => {
                sqlx::query(
                    "INSERT INTO categories (id, name) VALUES ($1, $2) \
                     ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name RETURNING id, name",
                )
                .bind(id)
                .bind(&entity.name)
                .fetch_one(&self.pool)
                .await?
            }
        };
        category_from_row(&row)
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query("SELECT c.id, c.name FROM categories c ORDER BY c.id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(category_from_row).collect()
    }

    async fn find_all_by_id(&self, ids: &BTreeSet<EntityId>) -> Result<Vec<Category>, StoreError> {
        let ids: Vec<i64> = ids.iter().copied().collect();
        let rows = sqlx::query("SELECT c.id, c.name FROM categories c WHERE c.id = ANY($1) ORDER BY c.id")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(category_from_row).collect()
    }

    async fn find_page(&self, _filter: &NoFilter, page: &PageRequest) -> Result<Page<Category>, StoreError> {
        let sql = format!(
            "SELECT c.id, c.name, COUNT(*) OVER() AS total_count FROM categories c \
             ORDER BY {} LIMIT $1 OFFSET $2",
            order_clause("c", page)
        );
        let rows = sqlx::query(&sql)
            .bind(page.size())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        let fallback = if rows.is_empty() && page.offset() > 0 {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM categories")
                .fetch_one(&self.pool)
                .await?
        } else {
            0
        };
        let total = window_total(&rows, fallback)?;
        let items = rows.iter().map(category_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, page))
    }
}

#[async_trait]
impl Repository<Product> for PgStore {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn save(&self, entity: Product) -> Result<Product, StoreError> {
        let mut tx = self.pool.begin().await?;
        let id: i64 = match entity.id {
            None => {
                sqlx::query_scalar("INSERT INTO products (name, price) VALUES ($1, $2) RETURNING id")
                    .bind(&entity.name)
                    .bind(&entity.price)
                    .fetch_one(&mut *tx)
                    .await?
            }
            Some(id) => {
                sqlx::query_scalar(
                    "INSERT INTO products (id, name, price) VALUES ($1, $2, $3) \
                     ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, price = EXCLUDED.price RETURNING id",
                )
                .bind(id)
                .bind(&entity.name)
                .bind(&entity.price)
                .fetch_one(&mut *tx)
                .await?
            }
        };
        sqlx::query("DELETE FROM product_categories WHERE product_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let category_ids: Vec<i64> = entity.category_ids.iter().copied().collect();
        sqlx::query(
            "INSERT INTO product_categories (product_id, category_id) SELECT $1, UNNEST($2::BIGINT[])",
        )
        .bind(id)
        .bind(&category_ids)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(Product { id: Some(id), ..entity })
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products p ORDER BY p.id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn find_all_by_id(&self, ids: &BTreeSet<EntityId>) -> Result<Vec<Product>, StoreError> {
        let ids: Vec<i64> = ids.iter().copied().collect();
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = ANY($1) ORDER BY p.id");
        let rows = sqlx::query(&sql).bind(&ids).fetch_all(&self.pool).await?;
        rows.iter().map(product_from_row).collect()
    }

    async fn find_page(&self, filter: &ProductFilter, page: &PageRequest) -> Result<Page<Product>, StoreError> {
        const PREDICATE: &str = r"p.name ILIKE $1 ESCAPE '\'
             AND ($2::BIGINT[] IS NULL OR EXISTS (
                 SELECT 1 FROM product_categories f WHERE f.product_id = p.id AND f.category_id = ANY($2)))";
        let pattern = like_pattern(&filter.name_contains);
        let categories: Option<Vec<i64>> = filter
            .categories
            .as_ref()
            .map(|set| set.iter().copied().collect());

        let sql = format!(
            "SELECT {PRODUCT_COLUMNS}, COUNT(*) OVER() AS total_count FROM products p \
             WHERE {PREDICATE} ORDER BY {} LIMIT $3 OFFSET $4",
            order_clause("p", page)
        );
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(&categories)
            .bind(page.size())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        let fallback = if rows.is_empty() && page.offset() > 0 {
            let count_sql = format!("SELECT COUNT(*) FROM products p WHERE {PREDICATE}");
            sqlx::query_scalar::<_, i64>(&count_sql)
                .bind(&pattern)
                .bind(&categories)
                .fetch_one(&self.pool)
                .await?
        } else {
            0
        };
        let total = window_total(&rows, fallback)?;
        let items = rows.iter().map(product_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, page))
    }
}

#[async_trait]
impl Repository<Customer> for PgStore {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<Customer>, StoreError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers c WHERE c.id = $1");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(customer_from_row).transpose()
    }

    async fn save(&self, entity: Customer) -> Result<Customer, StoreError> {
        let roles: Vec<String> = entity.roles.iter().map(|r| r.as_str().to_string()).collect();
        let phones: Vec<String> = entity.phones.iter().cloned().collect();
        // A NULL id draws from the table sequence, a set id replaces the stored row.
        let sql = format!(
            "INSERT INTO customers (id, name, email, document, kind, password_hash, phones, addresses, roles) \
             VALUES (COALESCE($1, nextval(pg_get_serial_sequence('customers', 'id'))), $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, email = EXCLUDED.email, \
             document = EXCLUDED.document, kind = EXCLUDED.kind, password_hash = EXCLUDED.password_hash, \
             phones = EXCLUDED.phones, addresses = EXCLUDED.addresses, roles = EXCLUDED.roles \
             RETURNING {CUSTOMER_RETURNING}"
        );
        let row = sqlx::query(&sql)
            .bind(entity.id)
            .bind(&entity.name)
            .bind(&entity.email)
            .bind(&entity.document)
            .bind(entity.kind.as_str())
            .bind(&entity.password_hash)
            .bind(&phones)
            .bind(Json(&entity.addresses))
            .bind(&roles)
            .fetch_one(&self.pool)
            .await?;
        customer_from_row(&row)
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Customer>, StoreError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers c ORDER BY c.id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(customer_from_row).collect()
    }

    async fn find_all_by_id(&self, ids: &BTreeSet<EntityId>) -> Result<Vec<Customer>, StoreError> {
        let ids: Vec<i64> = ids.iter().copied().collect();
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers c WHERE c.id = ANY($1) ORDER BY c.id");
        let rows = sqlx::query(&sql).bind(&ids).fetch_all(&self.pool).await?;
        rows.iter().map(customer_from_row).collect()
    }

    async fn find_page(&self, _filter: &NoFilter, page: &PageRequest) -> Result<Page<Customer>, StoreError> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS}, COUNT(*) OVER() AS total_count FROM customers c \
             ORDER BY {} LIMIT $1 OFFSET $2",
            order_clause("c", page)
        );
        let rows = sqlx::query(&sql)
            .bind(page.size())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        let fallback = if rows.is_empty() && page.offset() > 0 {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM customers")
                .fetch_one(&self.pool)
                .await?
        } else {
            0
        };
        let total = window_total(&rows, fallback)?;
        let items = rows.iter().map(customer_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(items, total, page))
    }
}

#[async_trait]
impl CustomerRepository for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Customer>, StoreError> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers c WHERE lower(c.email) = lower($1)");
        let row = sqlx::query(&sql).bind(email).fetch_optional(&self.pool).await?;
        row.as_ref().map(customer_from_row).transpose()
    }
}

#[async_trait]
impl Repository<Order> for PgStore {
    async fn find_by_id(&self, id: EntityId) -> Result<Option<Order>, StoreError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1");
        let rows = sqlx::query(&sql).bind(id).fetch_all(&self.pool).await?;
        Ok(self.orders_with_items(&rows).await?.into_iter().next())
    }

    async fn save(&self, entity: Order) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        let delivery = entity.delivery_address.as_ref().map(Json);
        let id: i64 = match entity.id {
            None => {
                sqlx::query_scalar(
                    "INSERT INTO orders (instant, customer_id, delivery_address, payment) \
                     VALUES ($1, $2, $3, $4) RETURNING id",
                )
                .bind(entity.instant)
                .bind(entity.customer_id)
                .bind(&delivery)
                .bind(Json(&entity.payment))
                .fetch_one(&mut *tx)
                .await?
            }
            Some(id) => {
                sqlx::query_scalar(
                    "INSERT INTO orders (id, instant, customer_id, delivery_address, payment) \
                     VALUES ($1, $2, $3, $4, $5) \
                     ON CONFLICT (id) DO UPDATE SET instant = EXCLUDED.instant, customer_id = EXCLUDED.customer_id, \
                     delivery_address = EXCLUDED.delivery_address, payment = EXCLUDED.payment RETURNING id",
                )
                .bind(id)
                .bind(entity.instant)
                .bind(entity.customer_id)
                .bind(&delivery)
                .bind(Json(&entity.payment))
                .fetch_one(&mut *tx)
                .await?
            }
        };
        sqlx::query("DELETE FROM order_items WHERE order_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        for item in &entity.items {
            sqlx::query(
                "INSERT INTO order_items (order_id, product_id, quantity, discount, price) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(&item.discount)
            .bind(&item.price)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(Order { id: Some(id), ..entity })
    }

    async fn delete_by_id(&self, id: EntityId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_all(&self) -> Result<Vec<Order>, StoreError> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o ORDER BY o.id");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        self.orders_with_items(&rows).await
    }

    async fn find_all_by_id(&self, ids: &BTreeSet<EntityId>) -> Result<Vec<Order>, StoreError> {
        let ids: Vec<i64> = ids.iter().copied().collect();
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = ANY($1) ORDER BY o.id");
        let rows = sqlx::query(&sql).bind(&ids).fetch_all(&self.pool).await?;
        self.orders_with_items(&rows).await
    }

    async fn find_page(&self, filter: &OrderFilter, page: &PageRequest) -> Result<Page<Order>, StoreError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS}, COUNT(*) OVER() AS total_count FROM orders o \
             WHERE ($1::BIGINT IS NULL OR o.customer_id = $1) \
             ORDER BY {} LIMIT $2 OFFSET $3",
            order_clause("o", page)
        );
        let rows = sqlx::query(&sql)
            .bind(filter.customer_id)
            .bind(page.size())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;
        let fallback = if rows.is_empty() && page.offset() > 0 {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM orders o WHERE ($1::BIGINT IS NULL OR o.customer_id = $1)",
            )
            .bind(filter.customer_id)
            .fetch_one(&self.pool)
            .await?
        } else {
            0
        };
        let total = window_total(&rows, fallback)?;
        let items = self.orders_with_items(&rows).await?;
        Ok(Page::new(items, total, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortDirection;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("shirt"), "%shirt%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
        assert_eq!(like_pattern(""), "%%");
    }

    #[test]
    fn order_clause_uses_whitelisted_columns() {
        let req = PageRequest::for_entity::<Product>(0, 5, "nome", SortDirection::Desc).unwrap();
        assert_eq!(order_clause("p", &req), "lower(p.name) DESC, p.id ASC");
        let req = PageRequest::for_entity::<Order>(0, 5, "instante", SortDirection::Asc).unwrap();
        assert_eq!(order_clause("o", &req), "o.instant ASC, o.id ASC");
    }
}
